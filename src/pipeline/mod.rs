//! The concurrent upload pipeline.
//!
//! ```text
//! TreeWalker ──files──▶ dispatcher ──spawn──▶ FileUploadTask × N
//!  (blocking)            (semaphore)               │
//!                                                  ▼ UploadOutcome
//!                       ManifestPublisher ◀── ManifestAggregator
//! ```
//!
//! The walker runs on a blocking thread and feeds the dispatcher through a
//! bounded channel. The dispatcher takes a semaphore permit before spawning
//! each upload, so at most `concurrency` files are in flight. Every task
//! reports exactly one outcome to the aggregator, which owns the manifest.
//! The first failure cancels the remaining uploads and nothing is published.

pub mod aggregator;
pub mod publisher;
pub mod task;
pub mod walker;

use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::cloud::streaming_target::ObjectStore;
use crate::config::{Destination, UploadConfig};
use crate::constants::MANIFEST_FILE_NAME;
use crate::error::UploadError;
use crate::models::{Manifest, UploadOutcome};

pub use aggregator::ManifestAggregator;
pub use publisher::ManifestPublisher;
pub use task::FileUploadTask;
pub use walker::{SourceFile, TreeWalker};

/// Uploads a tree into one destination prefix.
pub struct UploadPipeline<S: ObjectStore> {
    store: Arc<S>,
    destination: Destination,
    concurrency: usize,
}

impl<S: ObjectStore> UploadPipeline<S> {
    /// `concurrency` is clamped to at least one upload.
    pub fn new(store: Arc<S>, destination: Destination, concurrency: usize) -> Self {
        UploadPipeline {
            store,
            destination,
            concurrency: concurrency.max(1),
        }
    }

    /// Upload every regular file under `root` and return the manifest of
    /// what was uploaded.
    pub async fn upload_tree(&self, root: &Path) -> Result<Manifest, UploadError> {
        let cancel = CancellationToken::new();
        let channel_depth = self.concurrency * 2;

        let (file_tx, mut file_rx) = mpsc::channel(channel_depth);
        let walker = TreeWalker::new(root).spawn(file_tx);

        let (result_tx, result_rx) = mpsc::channel::<UploadOutcome>(channel_depth);
        let aggregator = tokio::spawn(ManifestAggregator::new(cancel.clone()).run(result_rx));

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut dispatched = 0usize;

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => break,
                next = file_rx.recv() => next,
            };
            let file = match next {
                Some(Ok(file)) => file,
                Some(Err(err)) => {
                    if result_tx.send(UploadOutcome::Failed(err)).await.is_err() {
                        debug!("Aggregator already stopped");
                    }
                    break;
                }
                None => break,
            };

            let permit = tokio::select! {
                _ = cancel.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            if file.relative_path == MANIFEST_FILE_NAME {
                warn!(
                    "{} will be replaced by the published manifest",
                    self.store.location(&self.destination.key_for(MANIFEST_FILE_NAME))
                );
            }

            let key = self.destination.key_for(&file.relative_path);
            let task = FileUploadTask::new(Arc::clone(&self.store), file, key, cancel.clone());
            let tx = result_tx.clone();
            tasks.spawn(async move {
                task.report(tx).await;
                drop(permit);
            });
            dispatched += 1;
        }

        // Closing both channels lets the walker and the aggregator finish.
        drop(file_rx);
        drop(result_tx);

        let mut panicked = None;
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                cancel.cancel();
                panicked.get_or_insert_with(|| UploadError::Task(e.to_string()));
            }
        }

        let aggregated = aggregator
            .await
            .map_err(|e| UploadError::Task(format!("aggregator: {}", e)))?;
        let walked = walker
            .await
            .map_err(|e| UploadError::Task(format!("walker: {}", e)))?;

        // A failure reported by a task outranks a panic; cancellations do not
        let manifest = match (aggregated, panicked) {
            (Ok(manifest), None) => manifest,
            (Ok(_), Some(panic)) | (Err(UploadError::Cancelled), Some(panic)) => return Err(panic),
            (Err(err), panic) => {
                if let Some(panic) = panic {
                    warn!("{} while the run was stopping", panic);
                }
                return Err(err);
            }
        };
        if manifest.len() != dispatched {
            return Err(UploadError::Task(format!(
                "{} uploads dispatched but {} reported",
                dispatched,
                manifest.len()
            )));
        }

        debug!("Walked {} files, uploaded {}", walked, dispatched);
        Ok(manifest)
    }
}

/// Upload `config.source` and publish its manifest. Returns the encoded
/// manifest that was published.
pub async fn run_upload<S: ObjectStore>(store: Arc<S>, config: &UploadConfig) -> Result<Vec<u8>, UploadError> {
    info!(
        "Uploading {} to {} (concurrency {})",
        config.source.display(),
        config.destination,
        config.concurrency
    );

    let pipeline = UploadPipeline::new(Arc::clone(&store), config.destination.clone(), config.concurrency);
    let manifest = pipeline.upload_tree(&config.source).await?;
    info!("Uploaded {} files", manifest.len());

    ManifestPublisher::new(store, &config.destination, &config.manifest_dir)
        .publish(&manifest)
        .await
}
