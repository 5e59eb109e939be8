//! Persistence port for Viewed Records plus its adapters.
//!
//! The reconciler only ever talks to [`ViewedStore`]. Adapters decide the on-disk
//! format: [`SqliteStore`] (default, WAL-mode SQLite), [`JsonDirStore`] (one JSON
//! file per pull request) and [`MemoryStore`] (process-local).

mod json_dir;
mod memory;
mod schema;
mod sqlite;

use async_trait::async_trait;
use tracing::warn;

use crate::error::StoreError;
use crate::types::{PullRequestId, ViewedRecord};

pub use json_dir::JsonDirStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Async key-value port holding one [`ViewedRecord`] per pull request.
#[async_trait]
pub trait ViewedStore: Send + Sync {
    /// Returns the stored record, or an empty record when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing store cannot be read.
    async fn get_viewed_files(&self, pull_request: PullRequestId) -> Result<ViewedRecord, StoreError>;

    /// Replaces the stored record wholesale. Keys absent from `record` are removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write does not complete.
    async fn set_viewed_files(
        &self,
        pull_request: PullRequestId,
        record: &ViewedRecord,
    ) -> Result<(), StoreError>;
}

/// Reads the record for `pull_request`, treating any read failure as "no record".
///
/// A refresh must never fail because local review state is unreadable; every file
/// of that pull request simply shows as unviewed.
pub async fn load_viewed_or_empty(store: &dyn ViewedStore, pull_request: PullRequestId) -> ViewedRecord {
    match store.get_viewed_files(pull_request).await {
        Ok(record) => record,
        Err(err) => {
            warn!(%pull_request, error = %err, "failed to load viewed files; treating as unviewed");
            ViewedRecord::new()
        }
    }
}
