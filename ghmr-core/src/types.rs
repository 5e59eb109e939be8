use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque per-file content revision reported by the hosting API (the blob sha).
///
/// Fingerprints are assigned by the remote side on every fetch and are only ever
/// compared for equality. They are never computed locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Global pull request id from the hosting API.
///
/// This is the API's unique id, not the per-repository `#number`. It keys every
/// persisted Viewed Record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PullRequestId(pub u64);

impl fmt::Display for PullRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Filename to fingerprint map of files marked viewed within one pull request.
///
/// Absence of a key means the file was never marked viewed or the mark was
/// cleared. Serialized as a flat JSON object (`{"src/a.rs": "3f2c..."}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewedRecord(BTreeMap<String, Fingerprint>);

impl ViewedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, filename: &str) -> Option<&Fingerprint> {
        self.0.get(filename)
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.0.contains_key(filename)
    }

    /// Records `fingerprint` for `filename`, returning the previous value.
    pub fn insert(&mut self, filename: impl Into<String>, fingerprint: Fingerprint) -> Option<Fingerprint> {
        self.0.insert(filename.into(), fingerprint)
    }

    pub fn remove(&mut self, filename: &str) -> Option<Fingerprint> {
        self.0.remove(filename)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Fingerprint)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, Fingerprint)> for ViewedRecord {
    fn from_iter<I: IntoIterator<Item = (K, Fingerprint)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Change kind of a file within a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Removed,
    Renamed,
    /// Also stands in for statuses this client does not know (`copied`, `changed`).
    #[default]
    #[serde(other)]
    Modified,
}

impl FileStatus {
    /// Single-character badge used in file listings (`A`/`M`/`D`/`R`).
    pub fn badge(self) -> char {
        match self {
            FileStatus::Added => 'A',
            FileStatus::Modified => 'M',
            FileStatus::Removed => 'D',
            FileStatus::Renamed => 'R',
        }
    }
}

/// One changed file inside a [`PullRequestSnapshot`].
///
/// `viewed` is a memoized projection of the owning Viewed Record evaluated against
/// `fingerprint`. It is recomputed by the reconciler whenever the record changes and
/// must not be treated as independent state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Repository-relative path, case-sensitive, unique within the pull request.
    pub filename: String,
    pub status: FileStatus,
    pub fingerprint: Fingerprint,
    pub additions: u32,
    pub deletions: u32,
    /// Unified diff text; the API omits it for binary or very large files.
    pub patch: Option<String>,
    pub viewed: bool,
}

impl FileEntry {
    /// Builds an entry with `viewed` unset; the reconciler derives it later.
    pub fn new(filename: impl Into<String>, fingerprint: Fingerprint) -> Self {
        Self {
            filename: filename.into(),
            status: FileStatus::default(),
            fingerprint,
            additions: 0,
            deletions: 0,
            patch: None,
            viewed: false,
        }
    }

    /// Parent directory of the file, or `""` for root-level files.
    pub fn directory(&self) -> &str {
        self.filename
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or("")
    }
}

/// Identity and branch metadata of an open pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestMeta {
    pub id: PullRequestId,
    pub number: u64,
    pub title: String,
    pub author: String,
    /// `owner/repo`.
    pub repository: String,
    #[serde(default = "default_base_ref")]
    pub base_ref: String,
    #[serde(default = "default_head_ref")]
    pub head_ref: String,
    #[serde(default)]
    pub created_at: String,
}

fn default_base_ref() -> String {
    "main".to_owned()
}

fn default_head_ref() -> String {
    "branch".to_owned()
}

/// One refresh cycle's worth of data for a single pull request.
///
/// A refresh produces a new snapshot that replaces the previous one wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestSnapshot {
    pub meta: PullRequestMeta,
    pub files: Vec<FileEntry>,
}

impl PullRequestSnapshot {
    pub fn id(&self) -> PullRequestId {
        self.meta.id
    }

    pub fn file(&self, filename: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.filename == filename)
    }

    pub fn position(&self, filename: &str) -> Option<usize> {
        self.files.iter().position(|f| f.filename == filename)
    }
}
