//! Review state reconciler.
//!
//! Owns the in-memory Viewed Record of every loaded pull request and keeps each
//! snapshot's `viewed` flags in step with it. Every toggle rebuilds the record from
//! the complete file list (never as a delta against the stored record) and hands
//! the result to the [`WriteQueue`] without waiting for it.
//!
//! Operations assume sequential invocation per pull request. Concurrent callers
//! must serialize among themselves.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::{ReviewError, SourceError};
use crate::oracle;
use crate::snapshot::SnapshotBuilder;
use crate::types::{FileEntry, PullRequestId, PullRequestSnapshot, ViewedRecord};
use crate::write_queue::WriteQueue;

/// One pull request's snapshot together with the record its flags derive from.
///
/// Pure and synchronous: no I/O happens here.
#[derive(Debug, Clone)]
pub struct ReviewState {
    snapshot: PullRequestSnapshot,
    record: ViewedRecord,
}

impl ReviewState {
    /// Installs `snapshot` and derives every file's `viewed` flag from `record`.
    ///
    /// `record` is kept as loaded, stale entries included, until the first toggle.
    pub fn new(snapshot: PullRequestSnapshot, record: ViewedRecord) -> Self {
        let mut state = Self { snapshot, record };
        state.refresh_projection();
        state
    }

    pub fn snapshot(&self) -> &PullRequestSnapshot {
        &self.snapshot
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.snapshot.files
    }

    /// The in-memory record the flags are currently derived from.
    pub fn record(&self) -> &ViewedRecord {
        &self.record
    }

    pub fn is_viewed(&self, filename: &str) -> Option<bool> {
        self.snapshot.file(filename).map(|f| f.viewed)
    }

    /// The record that mirrors the current flags: exactly the viewed files, each at
    /// its current fingerprint.
    pub fn persisted_record(&self) -> ViewedRecord {
        self.snapshot
            .files
            .iter()
            .filter(|f| f.viewed)
            .map(|f| (f.filename.clone(), f.fingerprint.clone()))
            .collect()
    }

    /// Flips the viewed flag of `filename` and returns the record to persist.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::UnknownFile`] when the snapshot has no such file.
    pub fn toggle_file(&mut self, filename: &str) -> Result<ViewedRecord, ReviewError> {
        let current = self.is_viewed(filename).ok_or_else(|| ReviewError::UnknownFile {
            pull_request: self.snapshot.id(),
            filename: filename.to_owned(),
        })?;
        Ok(self.apply(&HashSet::from([filename]), !current))
    }

    /// Sets every named file to `force`, or to "viewed unless all are already viewed"
    /// when `force` is `None`, and returns the record to persist.
    ///
    /// Names absent from the snapshot are ignored.
    pub fn set_files<S: AsRef<str>>(&mut self, filenames: &[S], force: Option<bool>) -> ViewedRecord {
        let targets: HashSet<&str> = filenames.iter().map(|name| name.as_ref()).collect();
        let force = force.unwrap_or_else(|| {
            !self
                .snapshot
                .files
                .iter()
                .filter(|f| targets.contains(f.filename.as_str()))
                .all(|f| f.viewed)
        });
        self.apply(&targets, force)
    }

    fn apply(&mut self, targets: &HashSet<&str>, viewed: bool) -> ViewedRecord {
        let record: ViewedRecord = self
            .snapshot
            .files
            .iter()
            .filter(|f| {
                if targets.contains(f.filename.as_str()) {
                    viewed
                } else {
                    f.viewed
                }
            })
            .map(|f| (f.filename.clone(), f.fingerprint.clone()))
            .collect();
        self.record = record.clone();
        self.refresh_projection();
        record
    }

    fn refresh_projection(&mut self) {
        let flags = oracle::classify(&self.record, &self.snapshot.files);
        for (file, viewed) in self.snapshot.files.iter_mut().zip(flags) {
            file.viewed = viewed;
        }
    }
}

/// Result of a toggle as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub pull_request: PullRequestId,
    /// New `viewed` flag of every touched file present in the snapshot.
    pub changes: Vec<(String, bool)>,
    /// Record submitted for persistence.
    pub record: ViewedRecord,
    /// Write-queue generation of the submitted record.
    pub generation: u64,
}

/// Owns the [`ReviewState`] of every loaded pull request plus the write queue.
pub struct Reconciler {
    reviews: HashMap<PullRequestId, ReviewState>,
    order: Vec<PullRequestId>,
    writer: WriteQueue,
}

impl Reconciler {
    pub fn new(writer: WriteQueue) -> Self {
        Self {
            reviews: HashMap::new(),
            order: Vec::new(),
            writer,
        }
    }

    /// Replaces every loaded snapshot with the result of a refresh.
    ///
    /// Pull requests missing from `snapshots` are dropped; in-memory state of the
    /// old snapshots is discarded.
    pub fn replace_snapshots(&mut self, snapshots: Vec<(PullRequestSnapshot, ViewedRecord)>) {
        self.reviews.clear();
        self.order.clear();
        for (snapshot, record) in snapshots {
            self.install(snapshot, record);
        }
    }

    /// Installs or replaces a single pull request's snapshot.
    pub fn install(&mut self, snapshot: PullRequestSnapshot, record: ViewedRecord) {
        let id = snapshot.id();
        if !self.reviews.contains_key(&id) {
            self.order.push(id);
        }
        self.reviews.insert(id, ReviewState::new(snapshot, record));
    }

    pub fn review(&self, pull_request: PullRequestId) -> Option<&ReviewState> {
        self.reviews.get(&pull_request)
    }

    /// Loaded snapshots in installation order.
    pub fn snapshots(&self) -> impl Iterator<Item = &PullRequestSnapshot> {
        self.order
            .iter()
            .filter_map(|id| self.reviews.get(id))
            .map(ReviewState::snapshot)
    }

    /// Flips one file and writes the rebuilt record through.
    ///
    /// The in-memory flip stands even if the later write fails.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError`] when the pull request or file is not loaded.
    pub fn toggle_file_viewed(
        &mut self,
        pull_request: PullRequestId,
        filename: &str,
    ) -> Result<ToggleOutcome, ReviewError> {
        let review = self
            .reviews
            .get_mut(&pull_request)
            .ok_or(ReviewError::UnknownPullRequest(pull_request))?;
        let record = review.toggle_file(filename)?;
        let viewed = record.contains(filename);
        debug!(%pull_request, filename, viewed, "toggled file");

        let generation = self.writer.submit(pull_request, record.clone());
        Ok(ToggleOutcome {
            pull_request,
            changes: vec![(filename.to_owned(), viewed)],
            record,
            generation,
        })
    }

    /// Sets a group of files to one absolute state and writes the rebuilt record.
    ///
    /// With `force == None` the group is marked viewed unless every member already is.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::UnknownPullRequest`] when the pull request is not loaded.
    pub fn toggle_files_viewed<S: AsRef<str>>(
        &mut self,
        pull_request: PullRequestId,
        filenames: &[S],
        force: Option<bool>,
    ) -> Result<ToggleOutcome, ReviewError> {
        let review = self
            .reviews
            .get_mut(&pull_request)
            .ok_or(ReviewError::UnknownPullRequest(pull_request))?;
        let record = review.set_files(filenames, force);

        let mut seen = HashSet::new();
        let changes: Vec<(String, bool)> = filenames
            .iter()
            .map(|name| -> &str { name.as_ref() })
            .filter(|name| seen.insert(*name))
            .filter_map(|name| review.is_viewed(name).map(|v| (name.to_owned(), v)))
            .collect();
        debug!(%pull_request, files = changes.len(), ?force, "bulk toggled files");

        let generation = self.writer.submit(pull_request, record.clone());
        Ok(ToggleOutcome {
            pull_request,
            changes,
            record,
            generation,
        })
    }

    /// Rebuilds every snapshot from `builder` and installs the result.
    ///
    /// Queued writes are flushed first, so the rebuild reads back every toggle
    /// already accepted and never resurrects a state the user has left. On error
    /// the current snapshots stay in place.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the pull requests cannot be listed.
    pub async fn refresh(&mut self, builder: &SnapshotBuilder) -> Result<(), SourceError> {
        self.writer.flush().await;
        let snapshots = builder.build_all().await?;
        self.replace_snapshots(snapshots);
        Ok(())
    }

    /// Waits for every queued persistence write to finish.
    pub async fn flush(&mut self) {
        self.writer.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Fingerprint, PullRequestMeta};

    fn snapshot(files: &[(&str, &str)]) -> PullRequestSnapshot {
        PullRequestSnapshot {
            meta: PullRequestMeta {
                id: PullRequestId(1),
                number: 7,
                title: "Add widgets".to_owned(),
                author: "octo".to_owned(),
                repository: "octo/widgets".to_owned(),
                base_ref: "main".to_owned(),
                head_ref: "widgets".to_owned(),
                created_at: String::new(),
            },
            files: files
                .iter()
                .map(|(name, sha)| FileEntry::new(*name, Fingerprint::from(*sha)))
                .collect(),
        }
    }

    fn record(entries: &[(&str, &str)]) -> ViewedRecord {
        entries
            .iter()
            .map(|(name, sha)| (*name, Fingerprint::from(*sha)))
            .collect()
    }

    #[test]
    fn flags_derive_from_record_at_install() {
        let state = ReviewState::new(
            snapshot(&[("a.ts", "sha1"), ("b.ts", "sha2")]),
            record(&[("a.ts", "sha1"), ("b.ts", "old")]),
        );
        assert_eq!(state.is_viewed("a.ts"), Some(true));
        assert_eq!(state.is_viewed("b.ts"), Some(false));
        // Reading never prunes the loaded record.
        assert_eq!(state.record().len(), 2);
    }

    #[test]
    fn toggle_is_its_own_inverse() {
        let initial = record(&[("a.ts", "sha1")]);
        let mut state = ReviewState::new(snapshot(&[("a.ts", "sha1"), ("b.ts", "sha2")]), initial.clone());

        let first = state.toggle_file("b.ts").unwrap();
        assert_eq!(first, record(&[("a.ts", "sha1"), ("b.ts", "sha2")]));
        let second = state.toggle_file("b.ts").unwrap();
        assert_eq!(second, initial);
        assert_eq!(state.is_viewed("b.ts"), Some(false));
    }

    #[test]
    fn unviewing_one_file_keeps_other_fingerprints() {
        let mut state = ReviewState::new(
            snapshot(&[("a.ts", "sha1"), ("b.ts", "sha2")]),
            record(&[("a.ts", "sha1"), ("b.ts", "sha2")]),
        );
        let persisted = state.toggle_file("a.ts").unwrap();
        assert_eq!(persisted, record(&[("b.ts", "sha2")]));
    }

    #[test]
    fn toggle_stores_current_fingerprint_and_drops_stale_entries() {
        let mut state = ReviewState::new(
            snapshot(&[("a.ts", "sha2"), ("b.ts", "sha5")]),
            record(&[("a.ts", "sha1"), ("removed.ts", "sha9")]),
        );
        assert_eq!(state.is_viewed("a.ts"), Some(false));

        let persisted = state.toggle_file("a.ts").unwrap();
        assert_eq!(persisted, record(&[("a.ts", "sha2")]));
        assert_eq!(state.record(), &persisted);
    }

    #[test]
    fn toggle_unknown_file_is_rejected() {
        let mut state = ReviewState::new(snapshot(&[("a.ts", "sha1")]), ViewedRecord::new());
        let err = state.toggle_file("A.ts").unwrap_err();
        assert_eq!(
            err,
            ReviewError::UnknownFile {
                pull_request: PullRequestId(1),
                filename: "A.ts".to_owned(),
            }
        );
        assert_eq!(state.is_viewed("a.ts"), Some(false));
    }

    #[test]
    fn bulk_force_true_marks_every_member() {
        let mut state = ReviewState::new(
            snapshot(&[("src/a.ts", "s1"), ("src/b.ts", "s2"), ("c.ts", "s3")]),
            record(&[("src/a.ts", "stale")]),
        );
        let persisted = state.set_files(&["src/a.ts", "src/b.ts"], Some(true));
        assert_eq!(persisted, record(&[("src/a.ts", "s1"), ("src/b.ts", "s2")]));
        assert_eq!(state.is_viewed("c.ts"), Some(false));
    }

    #[test]
    fn bulk_force_false_removes_every_member() {
        let mut state = ReviewState::new(
            snapshot(&[("a.ts", "s1"), ("b.ts", "s2"), ("c.ts", "s3")]),
            record(&[("a.ts", "s1"), ("b.ts", "s2"), ("c.ts", "s3")]),
        );
        let persisted = state.set_files(&["a.ts", "b.ts", "not-here.ts"], Some(false));
        assert_eq!(persisted, record(&[("c.ts", "s3")]));
    }

    #[test]
    fn bulk_default_marks_mixed_group_viewed() {
        let mut state = ReviewState::new(
            snapshot(&[("a.ts", "s1"), ("b.ts", "s2")]),
            record(&[("a.ts", "s1")]),
        );
        state.set_files(&["a.ts", "b.ts"], None);
        assert_eq!(state.is_viewed("a.ts"), Some(true));
        assert_eq!(state.is_viewed("b.ts"), Some(true));

        // Fully viewed group flips to unviewed.
        let persisted = state.set_files(&["a.ts", "b.ts"], None);
        assert!(persisted.is_empty());
    }

    #[test]
    fn persisted_record_round_trips_through_rebuild() {
        let mut state = ReviewState::new(
            snapshot(&[("a.ts", "s1"), ("b.ts", "s2"), ("c.ts", "s3")]),
            ViewedRecord::new(),
        );
        state.toggle_file("a.ts").unwrap();
        state.set_files(&["b.ts", "c.ts"], Some(true));
        let persisted = state.toggle_file("c.ts").unwrap();

        let rebuilt = ReviewState::new(state.snapshot().clone(), persisted.clone());
        assert_eq!(rebuilt.files(), state.files());
        assert_eq!(state.persisted_record(), persisted);
    }
}
