//! Utility functions shared by the upload pipeline.
//!
//! ## Components
//!
//! - **Hashing**: SHA-256 digests and the hashing tee that computes them
//!   while bytes are streamed to a remote target
//!
//! ## Common Use Cases
//!
//! ### Hashing a file while copying it
//!
//! ```no_run
//! use manifest_uploader::utils::hash::HashingTee;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let source = tokio::fs::File::open("/data/report.csv").await?;
//! let mut tee = HashingTee::new(source, tokio::io::sink());
//! tee.copy_to_end().await?;
//! let (digest, _sink) = tee.finalize();
//! println!("{}", digest);
//! # Ok(())
//! # }
//! ```

/// Cryptographic hash calculation utilities
pub mod hash;
