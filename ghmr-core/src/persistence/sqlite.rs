use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio_rusqlite::Connection;
use tracing::{debug, warn};

use super::schema;
use super::ViewedStore;
use crate::error::StoreError;
use crate::types::{Fingerprint, PullRequestId, ViewedRecord};

/// WAL-mode SQLite implementation of [`ViewedStore`].
///
/// The `rusqlite::Connection` lives on a dedicated background thread owned by
/// `tokio_rusqlite`; every operation is shipped there with `call`. Cloning the store
/// clones the handle, not the connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path`, configures WAL mode and applies
    /// schema migrations.
    ///
    /// `busy_timeout` is set through the `Connection` method rather than a PRAGMA
    /// string so it takes effect regardless of pragma caching.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] if the file cannot be opened and
    /// [`StoreError::Sqlite`] if WAL configuration or schema migration fails.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref()).await?;

        conn.call(|db| -> rusqlite::Result<()> {
            db.execute_batch(
                "PRAGMA journal_mode=WAL;
                 PRAGMA synchronous=NORMAL;",
            )?;
            db.busy_timeout(Duration::from_secs(5))?;
            Ok(())
        })
        .await?;

        // Checkpoint any leftover WAL from a previous run.
        conn.call(|db| -> rusqlite::Result<()> {
            db.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
            Ok(())
        })
        .await?;

        let version = conn
            .call(|db| -> rusqlite::Result<i64> { schema::migrate(db) })
            .await?;
        if version > schema::LATEST_VERSION {
            warn!(version, latest = schema::LATEST_VERSION, "database was written by a newer ghmr");
        }
        debug!(path = %path.as_ref().display(), version, "sqlite store ready");

        Ok(Self { conn })
    }

    /// Opens a private in-memory database with the full schema applied.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] if the database cannot be created and
    /// [`StoreError::Sqlite`] if migration fails.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        conn.call(|db| -> rusqlite::Result<i64> { schema::migrate(db) })
            .await?;
        Ok(Self { conn })
    }
}

/// Returns the current Unix timestamp in seconds.
fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[async_trait]
impl ViewedStore for SqliteStore {
    async fn get_viewed_files(&self, pull_request: PullRequestId) -> Result<ViewedRecord, StoreError> {
        let id = pull_request.0 as i64;
        let record = self
            .conn
            .call(move |db| -> rusqlite::Result<ViewedRecord> {
                let mut stmt = db.prepare(
                    "SELECT filename, fingerprint FROM viewed_files WHERE pull_request_id = ?1",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![id], |r| {
                        let filename: String = r.get(0)?;
                        let fingerprint: String = r.get(1)?;
                        Ok((filename, Fingerprint::from(fingerprint)))
                    })?
                    .collect::<rusqlite::Result<ViewedRecord>>()?;
                Ok(rows)
            })
            .await?;
        Ok(record)
    }

    /// Replaces every row of `pull_request` inside one `BEGIN IMMEDIATE` transaction,
    /// so readers see either the old record or the new one, never a mix.
    async fn set_viewed_files(
        &self,
        pull_request: PullRequestId,
        record: &ViewedRecord,
    ) -> Result<(), StoreError> {
        let id = pull_request.0 as i64;
        let rows: Vec<(String, String)> = record
            .iter()
            .map(|(name, fp)| (name.to_owned(), fp.as_str().to_owned()))
            .collect();
        let count = rows.len();

        self.conn
            .call(move |db| -> rusqlite::Result<()> {
                let now = now_secs();
                let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
                tx.execute(
                    "DELETE FROM viewed_files WHERE pull_request_id = ?1",
                    rusqlite::params![id],
                )?;
                {
                    let mut insert = tx.prepare(
                        "INSERT INTO viewed_files (pull_request_id, filename, fingerprint, viewed_at)
                         VALUES (?1, ?2, ?3, ?4)",
                    )?;
                    for (filename, fingerprint) in &rows {
                        insert.execute(rusqlite::params![id, filename, fingerprint, now])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await?;

        debug!(%pull_request, files = count, "persisted viewed record");
        Ok(())
    }
}
