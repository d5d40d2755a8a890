use std::path::{Component, Path, PathBuf};

use log::debug;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use walkdir::{DirEntry, WalkDir};

use crate::error::UploadError;

/// A regular file discovered under the upload root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute local path
    pub path: PathBuf,
    /// Path relative to the root, `/`-separated
    pub relative_path: String,
}

pub type WalkItem = Result<SourceFile, UploadError>;

/// Depth-first walk over the regular files of a root path.
///
/// Symlinks are never followed, and directories or other non-regular
/// entries are skipped.
///
/// A root that is itself a regular file yields one entry whose relative
/// path is the file's name (`/srv/out/report.csv` becomes `report.csv`),
/// never its full path, so the object lands directly under the prefix.
pub struct TreeWalker {
    root: PathBuf,
}

impl TreeWalker {
    pub fn new(root: &Path) -> Self {
        TreeWalker {
            root: root.to_path_buf(),
        }
    }

    /// Iterate the files under the root in file-name order.
    ///
    /// Traversal failures are yielded in place; callers stop at the first one.
    pub fn files(&self) -> impl Iterator<Item = WalkItem> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |entry| match entry {
                Err(e) => Some(Err(UploadError::Traversal {
                    path: e.path().unwrap_or(&self.root).to_path_buf(),
                    reason: e.to_string(),
                })),
                Ok(entry) if entry.file_type().is_file() => Some(self.source_file(&entry)),
                Ok(entry) => {
                    if entry.path_is_symlink() {
                        debug!("Skipping symlink {}", entry.path().display());
                    }
                    None
                }
            })
    }

    /// Walk on a blocking thread, feeding `tx` until the walk ends, fails,
    /// or the receiver is dropped. Returns the number of files sent.
    pub fn spawn(self, tx: mpsc::Sender<WalkItem>) -> JoinHandle<usize> {
        tokio::task::spawn_blocking(move || {
            let mut sent = 0;
            for item in self.files() {
                let failed = item.is_err();
                if tx.blocking_send(item).is_err() {
                    debug!("Walk of {} stopped early", self.root.display());
                    break;
                }
                if failed {
                    break;
                }
                sent += 1;
            }
            debug!("Walked {} files under {}", sent, self.root.display());
            sent
        })
    }

    fn source_file(&self, entry: &DirEntry) -> WalkItem {
        let relative = if entry.depth() == 0 {
            Path::new(entry.file_name())
        } else {
            entry
                .path()
                .strip_prefix(&self.root)
                .map_err(|e| self.traversal_error(entry.path(), e.to_string()))?
        };

        Ok(SourceFile {
            path: entry.path().to_path_buf(),
            relative_path: self.slash_path(entry.path(), relative)?,
        })
    }

    fn slash_path(&self, full: &Path, relative: &Path) -> Result<String, UploadError> {
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(
                    part.to_str()
                        .ok_or_else(|| self.traversal_error(full, "path is not valid UTF-8".to_string()))?,
                ),
                other => {
                    return Err(self.traversal_error(
                        full,
                        format!("unexpected path component {:?}", other),
                    ))
                }
            }
        }
        if parts.is_empty() {
            return Err(self.traversal_error(full, "empty relative path".to_string()));
        }
        Ok(parts.join("/"))
    }

    fn traversal_error(&self, path: &Path, reason: String) -> UploadError {
        UploadError::Traversal {
            path: path.to_path_buf(),
            reason,
        }
    }
}
