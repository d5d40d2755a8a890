use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;
use tokio::io::AsyncWriteExt;

use crate::cloud::streaming_target::{ObjectStore, StreamingTarget};
use crate::config::Destination;
use crate::constants::MANIFEST_FILE_NAME;
use crate::error::UploadError;
use crate::models::Manifest;
use crate::pipeline::task::abort_quietly;

/// Writes the finished manifest next to the uploaded objects and to a local
/// directory.
pub struct ManifestPublisher<S: ObjectStore> {
    store: Arc<S>,
    remote_key: String,
    local_dir: PathBuf,
}

impl<S: ObjectStore> ManifestPublisher<S> {
    pub fn new(store: Arc<S>, destination: &Destination, local_dir: &Path) -> Self {
        ManifestPublisher {
            store,
            remote_key: destination.key_for(MANIFEST_FILE_NAME),
            local_dir: local_dir.to_path_buf(),
        }
    }

    pub fn remote_key(&self) -> &str {
        &self.remote_key
    }

    pub fn local_path(&self) -> PathBuf {
        self.local_dir.join(MANIFEST_FILE_NAME)
    }

    /// Encode the manifest and write both copies concurrently.
    ///
    /// Both writes always run to completion; the remote error is reported
    /// first when both fail. Returns the encoded bytes.
    pub async fn publish(&self, manifest: &Manifest) -> Result<Vec<u8>, UploadError> {
        let bytes = manifest.to_json()?;

        let (remote, local) = tokio::join!(self.write_remote(&bytes), self.write_local(&bytes));
        remote?;
        local?;

        info!(
            "Published manifest with {} entries to {} and {}",
            manifest.len(),
            self.store.location(&self.remote_key),
            self.local_path().display()
        );
        Ok(bytes)
    }

    async fn write_remote(&self, bytes: &[u8]) -> Result<(), UploadError> {
        let location = self.store.location(&self.remote_key);
        let mut target = self
            .store
            .open_target(&self.remote_key)
            .await
            .map_err(|e| UploadError::remote(&location, e))?;

        if let Err(e) = target.write_all(bytes).await {
            abort_quietly(target).await;
            return Err(UploadError::remote(
                &location,
                anyhow::Error::new(e).context("Failed to write manifest"),
            ));
        }

        target
            .complete()
            .await
            .map_err(|e| UploadError::remote(&location, e))
    }

    async fn write_local(&self, bytes: &[u8]) -> Result<(), UploadError> {
        tokio::fs::create_dir_all(&self.local_dir)
            .await
            .map_err(|source| UploadError::LocalWrite {
                path: self.local_dir.clone(),
                source,
            })?;

        let path = self.local_path();
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| UploadError::LocalWrite { path, source })
    }
}
