//! Revision oracle: decides whether a previously recorded "viewed" mark still
//! applies to a file's current content.
//!
//! Pure functions only. A mark is valid exactly when it was recorded at the
//! fingerprint the file has now; any content change invalidates it.

use crate::types::{FileEntry, Fingerprint, ViewedRecord};

/// Returns `true` iff `saved` is present and equal to `current`.
///
/// An absent fingerprint means the file was never marked viewed. A mismatch means
/// the file changed since it was reviewed and must be reviewed again.
pub fn is_viewed(saved: Option<&Fingerprint>, current: &Fingerprint) -> bool {
    saved.is_some_and(|saved| saved == current)
}

/// Evaluates `record` against every file, in order, without touching the record.
pub fn classify(record: &ViewedRecord, files: &[FileEntry]) -> Vec<bool> {
    files
        .iter()
        .map(|f| is_viewed(record.get(&f.filename), &f.fingerprint))
        .collect()
}
