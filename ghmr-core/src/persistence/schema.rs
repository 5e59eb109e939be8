//! SQLite layout of the viewed-record store.
//!
//! Each entry of [`MIGRATIONS`] moves the database one version forward. The
//! applied version lives in `schema_version`; a database already at or past
//! [`LATEST_VERSION`] is left alone.

use rusqlite::{Connection, TransactionBehavior};

const VERSION_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER NOT NULL
    ) STRICT;
";

/// Version 1: one row per viewed file. Unviewing a file deletes its row.
const VIEWED_FILES: &str = "
    CREATE TABLE IF NOT EXISTS viewed_files (
        pull_request_id INTEGER NOT NULL,
        filename        TEXT    NOT NULL,
        fingerprint     TEXT    NOT NULL,
        viewed_at       INTEGER NOT NULL,
        PRIMARY KEY (pull_request_id, filename)
    ) STRICT;
";

/// `(version, ddl)` pairs in ascending order.
const MIGRATIONS: &[(i64, &str)] = &[(1, VIEWED_FILES)];

pub const LATEST_VERSION: i64 = 1;

/// Applies every migration newer than the stored version, each in its own
/// `BEGIN IMMEDIATE` transaction together with its version row. Returns the
/// version the database ends at.
pub fn migrate(db: &mut Connection) -> rusqlite::Result<i64> {
    db.execute_batch(VERSION_TABLE)?;
    let current = stored_version(db)?;

    for &(version, ddl) in MIGRATIONS.iter().filter(|(version, _)| *version > current) {
        let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch(ddl)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
        tx.commit()?;
    }
    stored_version(db)
}

/// Highest applied version, 0 for a fresh database.
fn stored_version(db: &Connection) -> rusqlite::Result<i64> {
    db.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| row.get(0))
}
