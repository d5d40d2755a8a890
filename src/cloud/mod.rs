//! Remote object storage for uploaded files and manifests.
//!
//! The pipeline only talks to the [`streaming_target::ObjectStore`] and
//! [`streaming_target::StreamingTarget`] traits: open a write stream for a
//! key, write bytes into it, then complete or abort it.
//!
//! ## Supported Providers
//!
//! - **Amazon S3**: S3 and S3-compatible storage through `rusoto_s3`
//! - **Google Cloud Storage**: through its S3-compatible XML API (`gs://`)
//! - **Memory**: in-process store used for tests and embedding
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐
//! │  Upload Task    │────▶│  Hashing Tee    │
//! └─────────────────┘     └────────┬────────┘
//!                                  │
//!                    ┌─────────────┴─────────────┐
//!                    │                           │
//!              ┌─────▼──────┐           ┌───────▼────────┐
//!              │ S3 Upload  │           │ Memory Target  │
//!              │  Stream    │           │                │
//!              └─────┬──────┘           └────────────────┘
//!                    │
//!              ┌─────▼──────┐
//!              │  S3 Bucket │
//!              └────────────┘
//! ```
//!
//! ## Usage Example
//!
//! ```no_run
//! use manifest_uploader::cloud::s3::S3Store;
//! use manifest_uploader::cloud::streaming_target::{ObjectStore, StreamingTarget};
//! use tokio::io::AsyncWriteExt;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = S3Store::new("my-bucket", Some("us-east-1"), None, None, 8)?;
//! let mut target = store.open_target("releases/v1/notes.txt").await?;
//! target.write_all(b"release notes").await?;
//! target.complete().await?;
//! # Ok(())
//! # }
//! ```

/// S3 object store
pub mod s3;

/// S3 streaming upload implementation
pub mod streaming;

/// S3 client construction (region, profile, endpoint)
pub mod client;

/// In-memory object store
pub mod memory;

/// Common traits for object stores and their streaming targets
pub mod streaming_target;
