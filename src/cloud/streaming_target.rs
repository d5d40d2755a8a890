use anyhow::Result;
use async_trait::async_trait;
use tokio::io::AsyncWrite;

/// A trait for streaming targets that can receive data and complete or abort uploads.
///
/// Bytes written through `AsyncWrite` are staged; nothing is visible in the
/// store until [`StreamingTarget::complete`] succeeds.
#[async_trait]
pub trait StreamingTarget: AsyncWrite + Unpin + Send + 'static {
    /// Get the unique identifier for this target (for logs/errors)
    fn target_name(&self) -> String;

    /// Get the number of bytes uploaded so far
    fn bytes_uploaded(&self) -> u64;

    /// Flush remaining data and commit the object
    async fn complete(self) -> Result<()>;

    /// Abort the upload operation and clean up resources
    async fn abort(self) -> Result<()>;
}

/// A bucket-scoped object store that hands out one [`StreamingTarget`] per object.
///
/// The store itself is shared read-only between upload tasks; every target
/// is owned by the task that opened it.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    type Target: StreamingTarget;

    /// Open a write stream that creates or overwrites `key`
    async fn open_target(&self, key: &str) -> Result<Self::Target>;

    /// Human-readable location of `key` (e.g. `s3://bucket/key`)
    fn location(&self, key: &str) -> String;
}
