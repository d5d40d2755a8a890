//! # manifest-uploader
//!
//! Uploads a local directory tree to an object store while computing the
//! SHA-256 digest of every file in the same pass, then publishes a manifest
//! of relative path to digest next to the uploaded objects and on local disk.
//!
//! ## Overview
//!
//! Each file is read once. Its bytes flow through a hashing tee straight into
//! a remote write stream, so the digest recorded in the manifest always
//! describes exactly the bytes that were uploaded. Uploads run concurrently
//! up to a fixed limit, and the run is all-or-nothing: the first failure
//! cancels outstanding uploads and no manifest is published.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use manifest_uploader::cloud::memory::MemoryStore;
//! use manifest_uploader::config::UploadConfig;
//! use manifest_uploader::pipeline::run_upload;
//!
//! # async fn example() -> Result<(), manifest_uploader::UploadError> {
//! let config = UploadConfig {
//!     source: PathBuf::from("/srv/releases/v1"),
//!     destination: "s3://artifacts/releases/v1".parse()?,
//!     manifest_dir: PathBuf::from("."),
//!     region: None,
//!     profile: None,
//!     endpoint: None,
//!     concurrency: 8,
//!     buffer_size_mb: 8,
//! };
//!
//! let store = Arc::new(MemoryStore::new("artifacts"));
//! let manifest = run_upload(store, &config).await?;
//! println!("{}", String::from_utf8_lossy(&manifest));
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions
//! - [`config`]: Validated run configuration and destination parsing
//! - [`pipeline`]: Tree walk, concurrent uploads, aggregation and publishing
//! - [`cloud`]: Object store traits, S3 streaming uploads, in-memory store
//! - [`models`]: Upload results and the manifest
//! - [`utils`]: Hashing tee and digests
//! - [`error`]: Error taxonomy of a run
//! - [`constants`]: Application-wide constants

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Run configuration and destination parsing
pub mod config;

/// Object storage integration (S3, GCS, memory)
pub mod cloud;

/// Application constants and configuration values
pub mod constants;

/// Errors that abort an upload run
pub mod error;

/// Upload results and the manifest
pub mod models;

/// The concurrent upload pipeline
pub mod pipeline;

/// Hashing utilities
pub mod utils;

pub use error::UploadError;
