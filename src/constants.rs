//! Global constants for manifest-uploader.
//!
//! Centralizes buffer sizes, retry policy and defaults so the pipeline and
//! the cloud clients agree on them.

// Buffer size constants
/// Read buffer used by the hashing tee for each chunk (64KB)
pub const STREAMING_BUFFER_SIZE: usize = 64 * 1024;

/// Default multipart part size for S3 uploads, in megabytes
pub const DEFAULT_PART_SIZE_MB: usize = 8;

/// S3 minimum part size for multipart uploads, in megabytes
pub const S3_MIN_PART_SIZE_MB: usize = 5;

/// Number of parts that may be queued for the background part uploader
pub const PART_QUEUE_DEPTH: usize = 4;

// Retry constants
/// Maximum upload retry attempts for a single request
pub const MAX_UPLOAD_RETRIES: usize = 3;

/// Base retry delay in milliseconds (doubled on every attempt)
pub const RETRY_BASE_DELAY_MS: u64 = 250;

// Concurrency constants
/// Hard ceiling for the default number of simultaneous file uploads
pub const MAX_CONCURRENT_UPLOADS: usize = 32;

// Manifest constants
/// Name of the manifest object / file
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Algorithm tag written in front of every digest
pub const DIGEST_ALGORITHM: &str = "sha256";

// Remote store constants
/// Endpoint for the S3-compatible XML API of Google Cloud Storage
pub const GCS_S3_ENDPOINT: &str = "https://storage.googleapis.com";

/// Region name sent to Google Cloud Storage
pub const GCS_REGION_NAME: &str = "auto";

/// Default concurrency for this machine.
pub fn default_concurrency() -> usize {
    std::cmp::min(num_cpus::get() * 2, MAX_CONCURRENT_UPLOADS)
}
