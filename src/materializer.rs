//! Scratch copies of stored files for the reasoning engine.
//!
//! Every dispatch writes into its own `dispatch-<uuid>` directory under the
//! configured scratch root, so two queries touching the same file never share
//! a path. The returned [`ArtifactSet`] owns that directory.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::storage::{FileId, FileStore, StorageError};

const DISPATCH_DIR_PREFIX: &str = "dispatch-";

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Writes resolved file content to per-dispatch scratch directories.
#[derive(Debug, Clone)]
pub struct Materializer {
    scratch_dir: PathBuf,
}

impl Materializer {
    pub fn new<P: AsRef<Path>>(scratch_dir: P) -> Result<Self, std::io::Error> {
        let scratch_dir = scratch_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&scratch_dir)?;
        Ok(Self { scratch_dir })
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Remove dispatch directories left behind by a process that died
    /// mid-dispatch. Returns how many were removed.
    pub fn sweep_stale(&self) -> usize {
        let entries = match std::fs::read_dir(&self.scratch_dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %self.scratch_dir.display(), error = %e, "Failed to scan scratch directory");
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let is_dispatch_dir = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(DISPATCH_DIR_PREFIX));
            if !is_dispatch_dir {
                continue;
            }
            match std::fs::remove_dir_all(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(dir = %entry.path().display(), error = %e, "Failed to remove stale scratch directory");
                }
            }
        }
        removed
    }

    /// Resolve each id and write its content to the dispatch directory.
    ///
    /// Ids the store does not know are skipped, so the set may hold fewer
    /// paths than ids were requested. On error, anything already written is
    /// removed when the partially filled set is dropped.
    pub async fn materialize(
        &self,
        store: &dyn FileStore,
        ids: &[FileId],
    ) -> Result<ArtifactSet, MaterializeError> {
        let dir = self
            .scratch_dir
            .join(format!("{DISPATCH_DIR_PREFIX}{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await?;

        let mut artifacts = ArtifactSet {
            dir,
            paths: Vec::with_capacity(ids.len()),
            released: false,
        };

        for &id in ids {
            let Some(content) = store.get(id).await? else {
                tracing::debug!(file_id = %id, "Skipping unknown file id");
                continue;
            };

            let path = artifacts.dir.join(format!("csv_{id}.csv"));
            if artifacts.paths.contains(&path) {
                continue;
            }
            tokio::fs::write(&path, &content).await?;
            artifacts.paths.push(path);
        }

        Ok(artifacts)
    }
}

/// Scratch files owned by a single dispatch.
///
/// Call [`ArtifactSet::release`] once the engine is done with the files. If
/// the set is dropped without being released the directory is removed
/// synchronously in `Drop`.
#[derive(Debug)]
pub struct ArtifactSet {
    dir: PathBuf,
    paths: Vec<PathBuf>,
    released: bool,
}

impl ArtifactSet {
    /// Paths in the order their ids were requested.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Remove every artifact and the dispatch directory. Failures are logged
    /// and otherwise ignored.
    pub async fn release(mut self) {
        for path in &self.paths {
            if let Err(e) = tokio::fs::remove_file(path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove scratch file");
                }
            }
        }
        if let Err(e) = tokio::fs::remove_dir_all(&self.dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(dir = %self.dir.display(), error = %e, "Failed to remove scratch directory");
            }
        }
        self.released = true;
    }
}

impl Drop for ArtifactSet {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(dir = %self.dir.display(), error = %e, "Failed to remove scratch directory on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use bytes::Bytes;

    async fn seeded_store() -> (SqliteStore, FileId, FileId) {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let a = store.put("a.csv", Bytes::from("x,y\n1,2\n")).await.unwrap();
        let b = store.put("b.csv", Bytes::from("x,y\n3,4\n")).await.unwrap();
        (store, a.id, b.id)
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_materialize_writes_content_in_request_order() {
        let scratch = tempfile::tempdir().unwrap();
        let materializer = Materializer::new(scratch.path()).unwrap();
        let (store, a, b) = seeded_store().await;

        let set = materializer.materialize(&store, &[b, a]).await.unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.paths()[0].ends_with(format!("csv_{b}.csv")));
        assert_eq!(std::fs::read(&set.paths()[1]).unwrap(), b"x,y\n1,2\n");

        set.release().await;
        assert_eq!(entries(scratch.path()), 0);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_skipped() {
        let scratch = tempfile::tempdir().unwrap();
        let materializer = Materializer::new(scratch.path()).unwrap();
        let (store, a, _) = seeded_store().await;

        let set = materializer
            .materialize(&store, &[FileId(999), a, FileId(1000)])
            .await
            .unwrap();
        assert_eq!(set.len(), 1);
        set.release().await;
    }

    #[tokio::test]
    async fn test_duplicate_ids_materialize_once() {
        let scratch = tempfile::tempdir().unwrap();
        let materializer = Materializer::new(scratch.path()).unwrap();
        let (store, a, _) = seeded_store().await;

        let set = materializer.materialize(&store, &[a, a]).await.unwrap();
        assert_eq!(set.len(), 1);
        set.release().await;
    }

    #[tokio::test]
    async fn test_concurrent_dispatches_use_separate_directories() {
        let scratch = tempfile::tempdir().unwrap();
        let materializer = Materializer::new(scratch.path()).unwrap();
        let (store, a, _) = seeded_store().await;

        let first = materializer.materialize(&store, &[a]).await.unwrap();
        let second = materializer.materialize(&store, &[a]).await.unwrap();
        assert_ne!(first.paths()[0], second.paths()[0]);

        first.release().await;
        assert!(second.paths()[0].exists());
        second.release().await;
        assert_eq!(entries(scratch.path()), 0);
    }

    #[tokio::test]
    async fn test_drop_without_release_cleans_up() {
        let scratch = tempfile::tempdir().unwrap();
        let materializer = Materializer::new(scratch.path()).unwrap();
        let (store, a, b) = seeded_store().await;

        let set = materializer.materialize(&store, &[a, b]).await.unwrap();
        let dir = set.dir().to_path_buf();
        assert!(dir.exists());
        drop(set);
        assert!(!dir.exists());
    }

    #[test]
    fn test_sweep_stale_only_touches_dispatch_dirs() {
        let scratch = tempfile::tempdir().unwrap();
        let materializer = Materializer::new(scratch.path()).unwrap();
        std::fs::create_dir_all(scratch.path().join("dispatch-old/nested")).unwrap();
        std::fs::create_dir_all(scratch.path().join("keep-me")).unwrap();

        assert_eq!(materializer.sweep_stale(), 1);
        assert!(scratch.path().join("keep-me").exists());
        assert!(!scratch.path().join("dispatch-old").exists());
    }
}
