//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── {project}.json        # Live snapshot
//! ├── {project}.json.bak    # Previous snapshot
//! └── {project}.md          # Markdown export
//! ```
//!
//! Snapshots are replaced atomically: the new content is written to
//! `{project}.json.tmp`, the live file is renamed to the backup, and the
//! temporary file is renamed into place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::Snapshot;
use crate::storage::{SnapshotStore, WriteMetadata, markdown};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root_dir: PathBuf,
}

impl LocalStore {
    /// Create a new LocalStore rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn snapshot_path(&self, project: &str) -> PathBuf {
        self.root_dir.join(format!("{project}.json"))
    }

    fn backup_path(&self, project: &str) -> PathBuf {
        self.root_dir.join(format!("{project}.json.bak"))
    }

    fn markdown_path(&self, project: &str) -> PathBuf {
        self.root_dir.join(format!("{project}.md"))
    }

    /// Write bytes to `path` through a temporary file.
    async fn write_tmp(&self, path: &Path, bytes: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root_dir).await?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);
        Ok(tmp)
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Load the backup snapshot of `project`, if any.
    pub async fn load_backup(&self, project: &str) -> Result<Option<Snapshot>> {
        match self.read_bytes(&self.backup_path(project)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SnapshotStore for LocalStore {
    async fn load(&self, project: &str) -> Result<Snapshot> {
        match self.read_bytes(&self.snapshot_path(project)).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => {
                log::info!("No previous snapshot for {}", project);
                Ok(Snapshot::new())
            }
        }
    }

    async fn save(&self, project: &str, snapshot: &Snapshot) -> Result<WriteMetadata> {
        let path = self.snapshot_path(project);
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.write_tmp(&path, &bytes).await?;

        let backed_up = match tokio::fs::rename(&path, self.backup_path(project)).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(AppError::Io(e)),
        };
        tokio::fs::rename(&tmp, &path).await?;

        log::debug!("Saved {} records to {}", snapshot.len(), path.display());
        Ok(WriteMetadata {
            record_count: snapshot.len(),
            location: path,
            backed_up,
            timestamp: Utc::now(),
        })
    }

    async fn export_markdown(&self, project: &str, snapshot: &Snapshot) -> Result<PathBuf> {
        let path = self.markdown_path(project);
        let tmp = self.write_tmp(&path, markdown::render(snapshot).as_bytes()).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(path)
    }
}
