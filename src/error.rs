use std::io;
use std::path::PathBuf;

/// Errors that abort an upload run.
///
/// Every variant is fatal: the run stops, outstanding uploads are cancelled
/// and no manifest is published.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Malformed destination URI or invalid option, detected before any I/O.
    #[error("invalid configuration '{input}': {reason}")]
    Config { input: String, reason: String },

    /// The directory walk could not read an entry.
    #[error("failed to traverse {}: {reason}", .path.display())]
    Traversal { path: PathBuf, reason: String },

    /// A local file could not be opened or read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Opening, writing or committing a remote object failed.
    #[error("remote store error for {target}: {message}")]
    RemoteStore { target: String, message: String },

    /// The manifest could not be encoded.
    #[error("failed to encode manifest: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The local manifest copy could not be written.
    #[error("failed to write {}: {source}", .path.display())]
    LocalWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The same relative path was reported twice.
    #[error("duplicate manifest entry for {0}")]
    DuplicateEntry(String),

    /// The upload stopped because another part of the run failed.
    #[error("upload cancelled")]
    Cancelled,

    /// An upload task panicked or never reported.
    #[error("upload task failed: {0}")]
    Task(String),
}

impl UploadError {
    pub fn config(input: impl Into<String>, reason: impl Into<String>) -> Self {
        UploadError::Config {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a store-layer error; the alternate format keeps the context chain.
    pub fn remote(target: impl Into<String>, err: anyhow::Error) -> Self {
        UploadError::RemoteStore {
            target: target.into(),
            message: format!("{:#}", err),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            UploadError::Config { .. } => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn test_remote_keeps_context_chain() {
        let err: anyhow::Result<()> = Err(anyhow!("connection reset")).context("Failed to upload part 2");
        let err = UploadError::remote("s3://bucket/key", err.unwrap_err());
        let text = err.to_string();
        assert!(text.contains("s3://bucket/key"));
        assert!(text.contains("Failed to upload part 2"));
        assert!(text.contains("connection reset"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(UploadError::config("bucket", "missing prefix").exit_code(), 2);
        assert_eq!(UploadError::Cancelled.exit_code(), 1);
        assert_eq!(UploadError::DuplicateEntry("a".into()).exit_code(), 1);
    }

    #[test]
    fn test_io_error_display_includes_path() {
        let err = UploadError::Io {
            path: PathBuf::from("/tmp/data.bin"),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(err.to_string(), "failed to read /tmp/data.bin: no such file");
    }
}
