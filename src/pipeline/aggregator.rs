use log::{debug, error};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::UploadError;
use crate::models::{Manifest, UploadOutcome};

/// Sole owner of the manifest while uploads are running.
///
/// Upload tasks report through a channel; the manifest is complete once
/// every sender is gone and the channel closes. The first failure cancels
/// the run and ends aggregation with that error.
pub struct ManifestAggregator {
    manifest: Manifest,
    cancel: CancellationToken,
}

impl ManifestAggregator {
    pub fn new(cancel: CancellationToken) -> Self {
        ManifestAggregator {
            manifest: Manifest::new(),
            cancel,
        }
    }

    /// Apply one outcome to the manifest.
    pub fn accept(&mut self, outcome: UploadOutcome) -> Result<(), UploadError> {
        match outcome {
            UploadOutcome::Uploaded(result) => {
                debug!("{} -> {}", result.relative_path, result.digest);
                self.manifest.insert(result)
            }
            UploadOutcome::Failed(err) => Err(err),
        }
    }

    pub async fn run(mut self, mut rx: mpsc::Receiver<UploadOutcome>) -> Result<Manifest, UploadError> {
        while let Some(outcome) = rx.recv().await {
            if let Err(err) = self.accept(outcome) {
                error!("Upload failed: {}", err);
                self.cancel.cancel();
                return Err(err);
            }
        }
        Ok(self.manifest)
    }
}
