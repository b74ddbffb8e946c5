//! Invalidator: single-entry purge and recursive subtree/full purge.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::paths::{ARTIFACT_FILENAME, PathMapper};

/// Outcome of a sweep. Per-entry failures are collected here instead of
/// aborting the traversal; partial purges self-heal on the next sweep or
/// targeted invalidation.
#[derive(Debug, Default)]
pub struct PurgeReport {
    pub removed_files: usize,
    pub removed_dirs: usize,
    pub failures: Vec<PurgeFailure>,
}

impl PurgeReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A single entry that could not be removed mid-sweep.
#[derive(Debug)]
pub struct PurgeFailure {
    pub path: PathBuf,
    pub error: std::io::Error,
}

/// Removes cached artifacts, tolerating races with concurrent writers:
/// entries that vanish mid-traversal are a no-op, and a recreated
/// artifact is simply caught by the next purge event or sweep.
#[derive(Debug, Clone)]
pub struct Invalidator {
    mapper: PathMapper,
}

impl Invalidator {
    pub fn new(mapper: PathMapper) -> Self {
        Self { mapper }
    }

    /// Remove the artifact for one public URL, plus the cache root's own
    /// top-level artifact: any content change invalidates the site root
    /// view, which commonly lists the changed item.
    ///
    /// Idempotent — purging an absent entry is a successful no-op.
    pub async fn purge_single(&self, url: &str) -> Result<(), CacheError> {
        let artifact = self.mapper.uri_to_cache_path(url)?;
        if remove_if_present(&artifact).await? {
            debug!(url, location = %artifact.display(), "artifact purged");
        }

        let root_index = self.mapper.root().join(ARTIFACT_FILENAME);
        remove_if_present(&root_index).await?;
        Ok(())
    }

    /// Recursively purge the entire cache root. The root directory itself
    /// survives (recreated if needed) so subsequent writes succeed.
    pub async fn purge_all(&self) -> PurgeReport {
        let root = self.mapper.root().to_path_buf();
        let report = self.sweep(&root, true).await;
        if let Err(err) = fs::create_dir_all(&root).await {
            warn!(root = %root.display(), error = %err, "could not recreate cache root after sweep");
        }
        report
    }

    /// Recursively purge one subtree, removing the swept directory itself
    /// once emptied. Callers may pass either a directory or a file-shaped
    /// path ending in the artifact filename; the filename is stripped.
    ///
    /// The target must lie under the cache root; anything else is refused
    /// before any filesystem action.
    pub async fn purge_tree(&self, dir: &Path) -> Result<PurgeReport, CacheError> {
        let mut target = dir.to_path_buf();
        if target
            .file_name()
            .is_some_and(|name| name == ARTIFACT_FILENAME)
        {
            target.pop();
        }

        // Containment must hold component-wise: a lexical prefix match
        // alone would accept `root/../sibling`, which resolves outside
        // the root.
        let relative =
            target
                .strip_prefix(self.mapper.root())
                .map_err(|_| CacheError::MappingOutOfRoot {
                    input: dir.display().to_string(),
                })?;
        if relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir))
        {
            return Err(CacheError::MappingOutOfRoot {
                input: dir.display().to_string(),
            });
        }

        Ok(self.sweep(&target, false).await)
    }

    /// Iterative worklist sweep: files are deleted as their directory is
    /// listed, directories are removed children-first afterwards.
    /// Best-effort throughout — per-entry failures are logged, recorded,
    /// and never abort the traversal.
    async fn sweep(&self, target: &Path, keep_target: bool) -> PurgeReport {
        let mut report = PurgeReport::default();
        let mut pending = vec![target.to_path_buf()];
        let mut visited: Vec<PathBuf> = Vec::new();

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                // Vanished mid-traversal, or never existed: nothing to do.
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "cannot list directory, skipping");
                    report.failures.push(PurgeFailure {
                        path: dir.clone(),
                        error: err,
                    });
                    continue;
                }
            };
            visited.push(dir.clone());

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(err) => {
                        warn!(dir = %dir.display(), error = %err, "directory listing failed mid-sweep");
                        report.failures.push(PurgeFailure {
                            path: dir.clone(),
                            error: err,
                        });
                        break;
                    }
                };

                let path = entry.path();
                let file_type = match entry.file_type().await {
                    Ok(file_type) => file_type,
                    Err(err) if err.kind() == ErrorKind::NotFound => continue,
                    Err(err) => {
                        report.failures.push(PurgeFailure { path, error: err });
                        continue;
                    }
                };

                if file_type.is_dir() {
                    pending.push(path);
                } else {
                    match fs::remove_file(&path).await {
                        Ok(()) => report.removed_files += 1,
                        Err(err) if err.kind() == ErrorKind::NotFound => {}
                        Err(err) => {
                            warn!(file = %path.display(), error = %err, "could not remove artifact");
                            report.failures.push(PurgeFailure { path, error: err });
                        }
                    }
                }
            }
        }

        // Children were pushed after their parents, so reverse visit
        // order removes the deepest directories first.
        for dir in visited.iter().rev() {
            if keep_target && dir.as_path() == target {
                continue;
            }
            match fs::remove_dir(dir).await {
                Ok(()) => report.removed_dirs += 1,
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => {
                    // A writer may have recreated content under us.
                    debug!(dir = %dir.display(), error = %err, "directory not removed");
                    report.failures.push(PurgeFailure {
                        path: dir.clone(),
                        error: err,
                    });
                }
            }
        }

        report
    }
}

async fn remove_if_present(path: &Path) -> Result<bool, CacheError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(source) => Err(CacheError::PurgeIo {
            path: path.to_path_buf(),
            source,
        }),
    }
}
