//! Storage abstractions for release snapshots.
//!
//! ## Directory Structure
//!
//! ```text
//! data/
//! ├── la.json          # Live snapshot of project "la"
//! ├── la.json.bak      # Snapshot of the previous run
//! ├── la.md            # Markdown export of la.json
//! └── wiki.json
//! ```

pub mod git;
pub mod local;
pub mod markdown;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::Snapshot;

pub use git::{GitPublisher, PublishOutcome, Publisher};
pub use local::LocalStore;

/// Metadata about a snapshot write.
#[derive(Debug, Clone)]
pub struct WriteMetadata {
    /// Number of records written
    pub record_count: usize,
    /// Location of the live snapshot
    pub location: PathBuf,
    /// Whether a previous snapshot was kept as backup
    pub backed_up: bool,
    pub timestamp: DateTime<Utc>,
}

/// Trait for snapshot storage backends.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the live snapshot of `project`. Missing data is an empty snapshot.
    async fn load(&self, project: &str) -> Result<Snapshot>;

    /// Replace the live snapshot of `project`, keeping the old one as backup.
    async fn save(&self, project: &str, snapshot: &Snapshot) -> Result<WriteMetadata>;

    /// Write the human-readable export of `snapshot`.
    async fn export_markdown(&self, project: &str, snapshot: &Snapshot) -> Result<PathBuf>;
}
