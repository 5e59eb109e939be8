//! JSON fixture pull request source.
//!
//! Stands in for the hosting API. The file is re-read on every call, so editing
//! it between `refresh` commands simulates new pushes:
//!
//! ```json
//! { "pulls": [
//!   { "id": 1001, "number": 7, "title": "Add widgets", "author": "octo",
//!     "repository": "octo/widgets", "created_at": "2026-10-01T12:00:00Z",
//!     "files": [ { "filename": "src/a.ts", "status": "modified",
//!                  "additions": 3, "deletions": 1, "sha": "3f1c2e" } ] }
//! ] }
//! ```
//!
//! A pull request without a `files` key fails its file listing.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use ghmr_core::error::SourceError;
use ghmr_core::snapshot::{PullRequestSource, RemoteFile};
use ghmr_core::types::PullRequestMeta;

#[derive(Debug, Deserialize)]
struct Fixture {
    #[serde(default)]
    pulls: Vec<FixturePull>,
}

#[derive(Debug, Deserialize)]
struct FixturePull {
    #[serde(flatten)]
    meta: PullRequestMeta,
    files: Option<Vec<RemoteFile>>,
}

pub struct JsonFixtureSource {
    path: PathBuf,
}

impl JsonFixtureSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Fixture, SourceError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;
        serde_json::from_str(&raw).map_err(|source| SourceError::Malformed {
            path: self.path.clone(),
            source,
        })
    }
}

#[async_trait]
impl PullRequestSource for JsonFixtureSource {
    async fn list_open_pull_requests(&self) -> Result<Vec<PullRequestMeta>, SourceError> {
        Ok(self.read().await?.pulls.into_iter().map(|pull| pull.meta).collect())
    }

    async fn list_files(&self, pull_request: &PullRequestMeta) -> Result<Vec<RemoteFile>, SourceError> {
        self.read()
            .await?
            .pulls
            .into_iter()
            .find(|pull| pull.meta.id == pull_request.id)
            .and_then(|pull| pull.files)
            .ok_or(SourceError::FilesUnavailable(pull_request.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghmr_core::types::{FileStatus, PullRequestId};

    const FIXTURE: &str = r#"{
        "pulls": [
            { "id": 1001, "number": 7, "title": "Add widgets", "author": "octo",
              "repository": "octo/widgets", "created_at": "2026-10-01T12:00:00Z",
              "files": [
                { "filename": "src/a.ts", "status": "added", "additions": 3, "sha": "s1" },
                { "filename": "b.ts", "status": "copied", "sha": "s2" }
              ] },
            { "id": 1002, "number": 8, "title": "Broken", "author": "octo",
              "repository": "octo/widgets", "created_at": "2026-10-02T12:00:00Z" }
        ]
    }"#;

    fn source(raw: &str) -> (tempfile::TempDir, JsonFixtureSource) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pulls.json");
        std::fs::write(&path, raw).unwrap();
        (dir, JsonFixtureSource::new(path))
    }

    #[tokio::test]
    async fn lists_pull_requests_and_files() {
        let (_dir, source) = source(FIXTURE);
        let pulls = source.list_open_pull_requests().await.unwrap();
        assert_eq!(pulls.len(), 2);
        assert_eq!(pulls[0].id, PullRequestId(1001));
        assert_eq!(pulls[0].base_ref, "main");

        let files = source.list_files(&pulls[0]).await.unwrap();
        assert_eq!(files[0].status, FileStatus::Added);
        // Unknown remote statuses read as modified.
        assert_eq!(files[1].status, FileStatus::Modified);
        assert_eq!(files[1].additions, 0);
    }

    #[tokio::test]
    async fn missing_files_key_fails_the_listing() {
        let (_dir, source) = source(FIXTURE);
        let pulls = source.list_open_pull_requests().await.unwrap();
        let err = source.list_files(&pulls[1]).await.unwrap_err();
        assert!(matches!(err, SourceError::FilesUnavailable(PullRequestId(1002))));
    }

    #[tokio::test]
    async fn malformed_fixture_is_reported() {
        let (_dir, source) = source("{ not json");
        let err = source.list_open_pull_requests().await.unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));
    }
}
