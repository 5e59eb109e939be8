//! Typed error types for ghmr-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::PullRequestId;

/// Errors raised by a [`ViewedStore`](crate::persistence::ViewedStore) adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database file could not be opened.
    #[error("failed to open sqlite store: {0}")]
    Open(#[from] rusqlite::Error),

    /// SQLite failure inside the background connection thread.
    #[error("sqlite store: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),

    /// Filesystem failure in a file-backed store.
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted record could not be decoded.
    #[error("corrupt viewed record at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A record could not be encoded for writing.
    #[error("failed to encode viewed record: {0}")]
    Encode(#[source] serde_json::Error),

    /// The store refused the operation (used by adapters without a richer error).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by a [`PullRequestSource`](crate::snapshot::PullRequestSource).
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read pull request source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed pull request data in {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("files for pull request {0} are unavailable")]
    FilesUnavailable(PullRequestId),

    #[error("pull request source failed: {0}")]
    Remote(String),
}

/// Errors raised by reconciler operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReviewError {
    /// No snapshot is loaded for the pull request.
    #[error("pull request {0} is not loaded")]
    UnknownPullRequest(PullRequestId),

    /// The file is not part of the pull request's current snapshot.
    #[error("file {filename} is not part of pull request {pull_request}")]
    UnknownFile {
        pull_request: PullRequestId,
        filename: String,
    },
}

/// Errors raised while loading the TOML configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
