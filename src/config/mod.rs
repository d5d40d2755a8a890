//! Run configuration.
//!
//! Command-line arguments are validated once into an [`UploadConfig`] before
//! any filesystem or network work starts, so malformed destinations fail
//! fast with a `Config` error.

mod destination;

pub use destination::{Destination, StoreScheme};

use std::path::{Path, PathBuf};

use log::debug;

use crate::cli::Args;
use crate::constants::{default_concurrency, S3_MIN_PART_SIZE_MB};
use crate::error::UploadError;

/// Validated settings for one upload run
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Absolute path of the file or directory to upload
    pub source: PathBuf,
    pub destination: Destination,
    /// Directory that receives the local `manifest.json`
    pub manifest_dir: PathBuf,
    pub region: Option<String>,
    pub profile: Option<String>,
    pub endpoint: Option<String>,
    /// Maximum number of files uploaded at the same time
    pub concurrency: usize,
    /// Multipart part size in megabytes
    pub buffer_size_mb: usize,
}

impl UploadConfig {
    /// Build and validate a configuration from parsed arguments.
    pub fn from_args(args: &Args) -> Result<Self, UploadError> {
        let destination: Destination = args.dst.parse()?;

        let concurrency = args.concurrency.unwrap_or_else(default_concurrency);
        if concurrency == 0 {
            return Err(UploadError::config("--concurrency 0", "concurrency must be at least 1"));
        }

        let buffer_size_mb = args.buffer_size;
        if buffer_size_mb < S3_MIN_PART_SIZE_MB {
            return Err(UploadError::config(
                format!("--buffer-size {}", buffer_size_mb),
                format!("buffer size must be at least {}MB", S3_MIN_PART_SIZE_MB),
            ));
        }

        let config = UploadConfig {
            source: resolve_root(&args.src)?,
            destination,
            manifest_dir: args.manifest.clone(),
            region: args.region.clone(),
            profile: args.profile.clone(),
            endpoint: args.endpoint.clone(),
            concurrency,
            buffer_size_mb,
        };
        debug!("Resolved configuration: {:?}", config);
        Ok(config)
    }
}

/// Make `path` absolute without touching the filesystem.
///
/// Symlinks are not resolved and the path does not need to exist yet; a
/// missing root shows up later as a traversal error.
pub fn resolve_root(path: &Path) -> Result<PathBuf, UploadError> {
    std::path::absolute(path).map_err(|e| {
        UploadError::config(path.display().to_string(), format!("cannot resolve path: {}", e))
    })
}
