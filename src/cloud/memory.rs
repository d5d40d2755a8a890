//! In-process object store.
//!
//! Objects live in a shared map and only become visible once their target
//! completes, mirroring how a real store commits an upload. Writes and
//! commits can be made to fail per key, which is how the pipeline's
//! all-or-nothing behavior is exercised without a network.

use std::collections::{HashMap, HashSet};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::cloud::streaming_target::{ObjectStore, StreamingTarget};

#[derive(Default)]
struct MemoryState {
    objects: HashMap<String, Vec<u8>>,
    failing_writes: HashSet<String>,
    failing_commits: HashSet<String>,
    aborted: Vec<String>,
    open_targets: usize,
    peak_open_targets: usize,
}

/// Bucket-scoped in-memory object store
#[derive(Clone)]
pub struct MemoryStore {
    bucket: String,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new(bucket: &str) -> Self {
        MemoryStore {
            bucket: bucket.to_string(),
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        lock_state(&self.state)
    }

    /// Make every write to `key` fail
    pub fn fail_writes_to(&self, key: &str) {
        self.lock().failing_writes.insert(key.to_string());
    }

    /// Make committing `key` fail
    pub fn fail_commits_to(&self, key: &str) {
        self.lock().failing_commits.insert(key.to_string());
    }

    /// Committed contents of `key`
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(key).cloned()
    }

    /// Committed keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().objects.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Keys whose uploads were aborted
    pub fn aborted_keys(&self) -> Vec<String> {
        self.lock().aborted.clone()
    }

    /// Largest number of targets that were open at the same time
    pub fn peak_open_targets(&self) -> usize {
        self.lock().peak_open_targets
    }
}

// A panic while holding the lock cannot leave the maps half-updated
fn lock_state(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ObjectStore for MemoryStore {
    type Target = MemoryTarget;

    async fn open_target(&self, key: &str) -> Result<MemoryTarget> {
        let fail_writes = {
            let mut state = self.lock();
            state.open_targets += 1;
            state.peak_open_targets = state.peak_open_targets.max(state.open_targets);
            state.failing_writes.contains(key)
        };

        Ok(MemoryTarget {
            location: self.location(key),
            key: key.to_string(),
            staged: Vec::new(),
            fail_writes,
            state: Arc::clone(&self.state),
        })
    }

    fn location(&self, key: &str) -> String {
        format!("memory://{}/{}", self.bucket, key)
    }
}

/// Write stream for one [`MemoryStore`] object
pub struct MemoryTarget {
    location: String,
    key: String,
    staged: Vec<u8>,
    fail_writes: bool,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTarget {
    fn close(&self) {
        let mut state = lock_state(&self.state);
        state.open_targets = state.open_targets.saturating_sub(1);
    }
}

#[async_trait]
impl StreamingTarget for MemoryTarget {
    fn target_name(&self) -> String {
        self.location.clone()
    }

    fn bytes_uploaded(&self) -> u64 {
        self.staged.len() as u64
    }

    async fn complete(self) -> Result<()> {
        self.close();
        let mut state = lock_state(&self.state);
        if state.failing_commits.contains(&self.key) {
            bail!("Failed to commit {}", self.location);
        }
        state.objects.insert(self.key, self.staged);
        Ok(())
    }

    async fn abort(self) -> Result<()> {
        self.close();
        lock_state(&self.state).aborted.push(self.key);
        Ok(())
    }
}

impl AsyncWrite for MemoryTarget {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.fail_writes {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                format!("write to {} rejected", self.location),
            )));
        }
        self.staged.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
