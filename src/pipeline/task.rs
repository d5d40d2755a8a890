use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cloud::streaming_target::{ObjectStore, StreamingTarget};
use crate::error::UploadError;
use crate::models::{UploadOutcome, UploadResult};
use crate::pipeline::walker::SourceFile;
use crate::utils::hash::{HashingTee, TeeError};

/// Uploads one file while hashing it.
///
/// The bytes pass through a [`HashingTee`] from the local file into the
/// remote target, so the digest covers exactly what was sent. The target is
/// committed only after the whole file went through; every failure path
/// aborts it instead.
pub struct FileUploadTask<S: ObjectStore> {
    store: Arc<S>,
    file: SourceFile,
    key: String,
    cancel: CancellationToken,
}

impl<S: ObjectStore> FileUploadTask<S> {
    pub fn new(store: Arc<S>, file: SourceFile, key: String, cancel: CancellationToken) -> Self {
        FileUploadTask {
            store,
            file,
            key,
            cancel,
        }
    }

    pub async fn run(self) -> Result<UploadResult, UploadError> {
        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let location = self.store.location(&self.key);
        debug!("Uploading {} to {}", self.file.path.display(), location);
        let target = self
            .store
            .open_target(&self.key)
            .await
            .map_err(|e| UploadError::remote(&location, e))?;

        let source = match tokio::fs::File::open(&self.file.path).await {
            Ok(file) => file,
            Err(source) => {
                abort_quietly(target).await;
                return Err(UploadError::Io {
                    path: self.file.path,
                    source,
                });
            }
        };

        let mut tee = HashingTee::new(source, target);
        let copied = tokio::select! {
            _ = self.cancel.cancelled() => None,
            result = tee.copy_to_end() => Some(result),
        };

        let bytes = match copied {
            Some(Ok(bytes)) => bytes,
            Some(Err(TeeError::Source(source))) => {
                abort_quietly(tee.into_sink()).await;
                return Err(UploadError::Io {
                    path: self.file.path,
                    source,
                });
            }
            Some(Err(TeeError::Sink(e))) => {
                abort_quietly(tee.into_sink()).await;
                let err = anyhow::Error::new(e).context(format!("Failed to write {}", self.file.relative_path));
                return Err(UploadError::remote(&location, err));
            }
            None => {
                debug!("Upload of {} cancelled after {} bytes", location, tee.bytes_forwarded());
                abort_quietly(tee.into_sink()).await;
                return Err(UploadError::Cancelled);
            }
        };

        let (digest, target) = tee.finalize();
        if self.cancel.is_cancelled() {
            abort_quietly(target).await;
            return Err(UploadError::Cancelled);
        }
        target
            .complete()
            .await
            .map_err(|e| UploadError::remote(&location, e))?;

        info!("Uploaded {} ({} bytes, {})", location, bytes, digest);
        Ok(UploadResult {
            relative_path: self.file.relative_path,
            digest,
        })
    }

    /// Run the upload and send its outcome to the aggregator.
    pub async fn report(self, tx: mpsc::Sender<UploadOutcome>) {
        let outcome = match self.run().await {
            Ok(result) => UploadOutcome::Uploaded(result),
            Err(err) => UploadOutcome::Failed(err),
        };
        if tx.send(outcome).await.is_err() {
            debug!("Aggregator stopped before the outcome was delivered");
        }
    }
}

/// Abort `target`, logging instead of failing.
pub(crate) async fn abort_quietly<T: StreamingTarget>(target: T) {
    let name = target.target_name();
    if let Err(e) = target.abort().await {
        warn!("Failed to abort upload to {}: {:#}", name, e);
    }
}
