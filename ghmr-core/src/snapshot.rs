//! Pull request snapshot builder.
//!
//! Lists the user's open pull requests from a [`PullRequestSource`], fetches each
//! one's files, loads its Viewed Record and derives the `viewed` flags. Every
//! refresh yields brand new snapshots; nothing is patched in place.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use tracing::{error, info};

use crate::error::SourceError;
use crate::oracle;
use crate::persistence::{load_viewed_or_empty, ViewedStore};
use crate::types::{FileEntry, FileStatus, Fingerprint, PullRequestMeta, PullRequestSnapshot, ViewedRecord};

/// A changed file as reported by the hosting API's "list pull request files" call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteFile {
    pub filename: String,
    #[serde(default)]
    pub status: FileStatus,
    #[serde(default)]
    pub additions: u32,
    #[serde(default)]
    pub deletions: u32,
    #[serde(default)]
    pub patch: Option<String>,
    /// Content sha of the file at the pull request head.
    pub sha: Fingerprint,
}

impl From<RemoteFile> for FileEntry {
    fn from(remote: RemoteFile) -> Self {
        Self {
            filename: remote.filename,
            status: remote.status,
            fingerprint: remote.sha,
            additions: remote.additions,
            deletions: remote.deletions,
            patch: remote.patch,
            viewed: false,
        }
    }
}

/// Upstream data source for open pull requests (normally the hosting REST API).
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    /// Lists the open pull requests authored by the current user.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the listing itself fails.
    async fn list_open_pull_requests(&self) -> Result<Vec<PullRequestMeta>, SourceError>;

    /// Lists the changed files of one pull request, in API order.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the files cannot be fetched.
    async fn list_files(&self, pull_request: &PullRequestMeta) -> Result<Vec<RemoteFile>, SourceError>;
}

/// Derives a snapshot's `viewed` flags from `record` without mutating it.
pub fn build_snapshot(meta: PullRequestMeta, files: Vec<RemoteFile>, record: &ViewedRecord) -> PullRequestSnapshot {
    let mut files: Vec<FileEntry> = files.into_iter().map(FileEntry::from).collect();
    let flags = oracle::classify(record, &files);
    for (file, viewed) in files.iter_mut().zip(flags) {
        file.viewed = viewed;
    }
    PullRequestSnapshot { meta, files }
}

/// Builds fresh snapshots from a source and a store.
pub struct SnapshotBuilder {
    source: Arc<dyn PullRequestSource>,
    store: Arc<dyn ViewedStore>,
}

impl SnapshotBuilder {
    pub fn new(source: Arc<dyn PullRequestSource>, store: Arc<dyn ViewedStore>) -> Self {
        Self { source, store }
    }

    /// Builds one snapshot per open pull request, in listing order.
    ///
    /// Each pull request is processed concurrently. One whose files cannot be
    /// fetched is logged and left out; an unreadable Viewed Record counts as empty.
    /// Each snapshot is paired with the record it was derived from.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] only when listing the pull requests fails.
    pub async fn build_all(&self) -> Result<Vec<(PullRequestSnapshot, ViewedRecord)>, SourceError> {
        let pulls = self.source.list_open_pull_requests().await?;
        let total = pulls.len();

        let built = join_all(pulls.into_iter().map(|meta| self.build_one(meta))).await;
        let snapshots: Vec<_> = built.into_iter().flatten().collect();

        info!(listed = total, built = snapshots.len(), "refreshed pull request snapshots");
        Ok(snapshots)
    }

    async fn build_one(&self, meta: PullRequestMeta) -> Option<(PullRequestSnapshot, ViewedRecord)> {
        let files = match self.source.list_files(&meta).await {
            Ok(files) => files,
            Err(err) => {
                error!(pull_request = %meta.id, number = meta.number, error = %err, "failed to fetch pull request files");
                return None;
            }
        };
        let record = load_viewed_or_empty(self.store.as_ref(), meta.id).await;
        Some((build_snapshot(meta, files, &record), record))
    }
}
