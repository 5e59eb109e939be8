use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::ViewedStore;
use crate::error::StoreError;
use crate::types::{PullRequestId, ViewedRecord};

/// File-backed [`ViewedStore`] keeping one `<pull_request_id>.json` per pull request.
///
/// Each file holds the flat `{ "path": "sha" }` object of a single Viewed Record.
/// Every write goes to its own temp file in the same directory and is renamed over
/// the target, so readers only ever see a complete record.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    /// Uses `dir` as the reviews directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StoreError::Io { path: dir.clone(), source })?;
        Ok(Self { dir })
    }

    fn record_path(&self, pull_request: PullRequestId) -> PathBuf {
        self.dir.join(format!("{pull_request}.json"))
    }
}

#[async_trait]
impl ViewedStore for JsonDirStore {
    async fn get_viewed_files(&self, pull_request: PullRequestId) -> Result<ViewedRecord, StoreError> {
        let path = self.record_path(pull_request);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(ViewedRecord::new()),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        if raw.is_empty() {
            return Ok(ViewedRecord::new());
        }
        serde_json::from_slice(&raw).map_err(|source| StoreError::Corrupt { path, source })
    }

    async fn set_viewed_files(
        &self,
        pull_request: PullRequestId,
        record: &ViewedRecord,
    ) -> Result<(), StoreError> {
        let path = self.record_path(pull_request);
        let dir = self.dir.clone();
        let data = serde_json::to_vec(record).map_err(StoreError::Encode)?;

        tokio::task::spawn_blocking(move || write_atomically(&dir, &path, &data))
            .await
            .map_err(|err| StoreError::Unavailable(format!("json write task failed: {err}")))?
    }
}

/// Writes `data` to a uniquely named temp file in `dir`, then renames it over
/// `path`. Concurrent writers never share a temp file; the last rename wins.
fn write_atomically(dir: &Path, path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".viewed-")
        .suffix(".json.tmp")
        .tempfile_in(dir)
        .map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    tmp.write_all(data).map_err(|source| StoreError::Io {
        path: tmp.path().to_path_buf(),
        source,
    })?;
    tmp.persist(path).map_err(|err| StoreError::Io {
        path: path.to_path_buf(),
        source: err.error,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::Fingerprint;

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path().join("reviews")).await.unwrap();
        assert!(store.get_viewed_files(PullRequestId(9)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn writes_flat_json_object_per_pull_request() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).await.unwrap();
        let record: ViewedRecord = [("src/a.ts", Fingerprint::from("sha1"))].into_iter().collect();

        store.set_viewed_files(PullRequestId(123), &record).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("123.json")).unwrap();
        assert_eq!(raw, r#"{"src/a.ts":"sha1"}"#);
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("123.json")], "no temp files left behind");
        assert_eq!(store.get_viewed_files(PullRequestId(123)).await.unwrap(), record);
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).await.unwrap();
        std::fs::write(dir.path().join("5.json"), "{not json").unwrap();

        let err = store.get_viewed_files(PullRequestId(5)).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_leave_a_complete_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonDirStore::open(dir.path()).await.unwrap());
        let pr = PullRequestId(77);

        let writes = (0..64).map(|n| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let record: ViewedRecord = (0..n % 9)
                    .map(|i| (format!("src/file_{i}.ts"), Fingerprint::new(format!("sha-{n}-{i}"))))
                    .collect();
                store.set_viewed_files(pr, &record).await
            })
        });
        for result in futures::future::join_all(writes).await {
            result.unwrap().unwrap();
        }

        let stored = store.get_viewed_files(pr).await.unwrap();
        assert!(stored.len() < 9);
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1, "only {pr}.json should remain");
    }
}
