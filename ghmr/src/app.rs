//! Central application state for ghmr.
//!
//! Owns the [`Reconciler`] plus the review cursor: which pull request is open and
//! which of its files is current. No text rendering lives here. `app.rs` is pure
//! state that is read by the render module and mutated by the command dispatcher.

use ghmr_core::error::{ReviewError, SourceError};
use ghmr_core::layout;
use ghmr_core::reconciler::{Reconciler, ReviewState, ToggleOutcome};
use ghmr_core::snapshot::SnapshotBuilder;
use ghmr_core::types::{PullRequestId, PullRequestSnapshot};

/// Failures of a user command that leave the state untouched.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AppError {
    #[error("no pull request is open; use `open <number>` first")]
    NothingOpen,

    #[error("no open pull request matches {0}")]
    NoSuchPullRequest(u64),

    #[error("pull request has no files")]
    NoFiles,

    #[error("no folder named {0:?} in this pull request")]
    NoSuchFolder(String),

    #[error(transparent)]
    Review(#[from] ReviewError),
}

/// All mutable review state driven by the command loop.
pub struct AppState {
    pub reconciler: Reconciler,
    /// The pull request under review, if any.
    pub selected: Option<PullRequestId>,
    /// Index into the open snapshot's file list (API order).
    pub current: usize,
}

impl AppState {
    pub fn new(reconciler: Reconciler) -> Self {
        Self {
            reconciler,
            selected: None,
            current: 0,
        }
    }

    /// Flushes pending writes, rebuilds every snapshot from `builder` and
    /// re-anchors the review cursor.
    ///
    /// On error the previous snapshots and cursor are kept.
    pub async fn refresh(&mut self, builder: &SnapshotBuilder) -> Result<(), SourceError> {
        self.reconciler.refresh(builder).await?;
        self.reselect();
        Ok(())
    }

    /// Keeps the open pull request open when it is still listed, clamping the
    /// cursor to its new file list. Otherwise the review is closed.
    fn reselect(&mut self) {
        match self.selected.and_then(|id| self.reconciler.review(id)) {
            Some(review) => {
                self.current = self.current.min(review.files().len().saturating_sub(1));
            }
            None => {
                self.selected = None;
                self.current = 0;
            }
        }
    }

    /// Opens a pull request by its number (or, failing that, its global id) and
    /// places the cursor on the first unviewed file.
    pub fn open(&mut self, key: u64) -> Result<PullRequestId, AppError> {
        let id = self
            .reconciler
            .snapshots()
            .find(|s| s.meta.number == key)
            .or_else(|| self.reconciler.snapshots().find(|s| s.meta.id.0 == key))
            .map(PullRequestSnapshot::id)
            .ok_or(AppError::NoSuchPullRequest(key))?;
        let start = self
            .reconciler
            .review(id)
            .map(|review| layout::first_unviewed(review.files()))
            .unwrap_or(0);
        self.selected = Some(id);
        self.current = start;
        Ok(id)
    }

    /// The open pull request's review state.
    pub fn review(&self) -> Result<&ReviewState, AppError> {
        let id = self.selected.ok_or(AppError::NothingOpen)?;
        self.reconciler
            .review(id)
            .ok_or(AppError::Review(ReviewError::UnknownPullRequest(id)))
    }

    /// Filename under the cursor.
    pub fn current_file(&self) -> Result<&str, AppError> {
        self.review()?
            .files()
            .get(self.current)
            .map(|f| f.filename.as_str())
            .ok_or(AppError::NoFiles)
    }

    fn order(&self) -> Result<Vec<usize>, AppError> {
        let order = layout::visual_order(self.review()?.files());
        if order.is_empty() {
            return Err(AppError::NoFiles);
        }
        Ok(order)
    }

    pub fn next(&mut self) -> Result<(), AppError> {
        let order = self.order()?;
        self.current = layout::next_index(self.current, &order);
        Ok(())
    }

    pub fn prev(&mut self) -> Result<(), AppError> {
        let order = self.order()?;
        self.current = layout::prev_index(self.current, &order);
        Ok(())
    }

    /// Enter: marks the current file viewed if it is not, then advances unless
    /// it is the last file.
    pub fn mark(&mut self) -> Result<Option<ToggleOutcome>, AppError> {
        let order = self.order()?;
        let id = self.review()?.snapshot().id();
        let filename = self.current_file()?.to_owned();

        let outcome = if self.review()?.is_viewed(&filename) == Some(false) {
            Some(self.reconciler.toggle_file_viewed(id, &filename)?)
        } else {
            None
        };
        self.current = layout::next_index(self.current, &order);
        Ok(outcome)
    }

    /// Backspace: on the first file, unmarks it if viewed. Elsewhere, unmarks the
    /// previous file if viewed and moves back to it.
    pub fn unmark(&mut self) -> Result<Option<ToggleOutcome>, AppError> {
        let order = self.order()?;
        let id = self.review()?.snapshot().id();

        let target = if order.first() == Some(&self.current) {
            self.current
        } else {
            let previous = layout::prev_index(self.current, &order);
            self.current = previous;
            previous
        };
        let filename = self
            .review()?
            .files()
            .get(target)
            .map(|f| f.filename.clone())
            .ok_or(AppError::NoFiles)?;
        if self.review()?.is_viewed(&filename) == Some(true) {
            return Ok(Some(self.reconciler.toggle_file_viewed(id, &filename)?));
        }
        Ok(None)
    }

    /// Flips `filename`, or the current file when `None`.
    pub fn toggle(&mut self, filename: Option<&str>) -> Result<ToggleOutcome, AppError> {
        let id = self.review()?.snapshot().id();
        let filename = match filename {
            Some(name) => name.to_owned(),
            None => self.current_file()?.to_owned(),
        };
        Ok(self.reconciler.toggle_file_viewed(id, &filename)?)
    }

    /// Sets every file directly inside `directory` to `force`, or to the folder's
    /// default target when `None`.
    pub fn toggle_folder(&mut self, directory: &str, force: Option<bool>) -> Result<ToggleOutcome, AppError> {
        let review = self.review()?;
        let id = review.snapshot().id();
        let files = review.files();
        let group =
            layout::folder(files, directory).ok_or_else(|| AppError::NoSuchFolder(directory.to_owned()))?;
        let force = force.unwrap_or_else(|| group.state(files).default_force_status());
        let names: Vec<String> = group.filenames(files).into_iter().map(str::to_owned).collect();
        Ok(self.reconciler.toggle_files_viewed(id, &names, Some(force))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ghmr_core::error::StoreError;
    use ghmr_core::persistence::{MemoryStore, ViewedStore};

    use crate::fixture::JsonFixtureSource;
    use ghmr_core::types::{FileEntry, Fingerprint, PullRequestMeta, ViewedRecord};
    use ghmr_core::write_queue::{WriteMode, WriteQueue};

    fn snapshot(id: u64, number: u64, names: &[&str]) -> PullRequestSnapshot {
        PullRequestSnapshot {
            meta: PullRequestMeta {
                id: PullRequestId(id),
                number,
                title: "Tidy".to_owned(),
                author: "octo".to_owned(),
                repository: "octo/widgets".to_owned(),
                base_ref: "main".to_owned(),
                head_ref: "tidy".to_owned(),
                created_at: String::new(),
            },
            files: names
                .iter()
                .map(|name| FileEntry::new(*name, Fingerprint::new(format!("sha-{name}"))))
                .collect(),
        }
    }

    fn state(names: &[&str], viewed: &[&str]) -> AppState {
        let snapshot = snapshot(900, 12, names);
        let record: ViewedRecord = viewed
            .iter()
            .map(|name| (*name, Fingerprint::new(format!("sha-{name}"))))
            .collect();
        let mut state = AppState::new(Reconciler::new(WriteQueue::new(
            Arc::new(MemoryStore::new()),
            WriteMode::Serialized,
        )));
        install(&mut state, vec![(snapshot, record)]);
        state
    }

    fn install(state: &mut AppState, snapshots: Vec<(PullRequestSnapshot, ViewedRecord)>) {
        state.reconciler.replace_snapshots(snapshots);
        state.reselect();
    }

    #[tokio::test]
    async fn open_starts_at_first_unviewed_file() {
        let mut state = state(&["a.ts", "b.ts", "c.ts"], &["a.ts"]);
        assert_eq!(state.open(12), Ok(PullRequestId(900)));
        assert_eq!(state.current, 1);
        assert_eq!(state.open(900), Ok(PullRequestId(900)));
        assert_eq!(state.open(5), Err(AppError::NoSuchPullRequest(5)));
    }

    #[tokio::test]
    async fn mark_views_and_advances_but_stops_at_last() {
        let mut state = state(&["a.ts", "b.ts"], &[]);
        state.open(12).unwrap();

        let outcome = state.mark().unwrap().unwrap();
        assert_eq!(outcome.changes, vec![("a.ts".to_owned(), true)]);
        assert_eq!(state.current, 1);

        state.mark().unwrap();
        assert_eq!(state.current, 1);
        // Already viewed: no toggle, cursor stays on the last file.
        assert!(state.mark().unwrap().is_none());
        assert_eq!(state.review().unwrap().is_viewed("b.ts"), Some(true));
    }

    #[tokio::test]
    async fn unmark_on_first_file_only_unviews_it() {
        let mut state = state(&["a.ts", "b.ts"], &["a.ts"]);
        state.open(12).unwrap();
        state.current = 0;

        let outcome = state.unmark().unwrap().unwrap();
        assert_eq!(outcome.changes, vec![("a.ts".to_owned(), false)]);
        assert_eq!(state.current, 0);
        assert!(state.unmark().unwrap().is_none());
    }

    #[tokio::test]
    async fn unmark_elsewhere_unviews_previous_and_moves_back() {
        let mut state = state(&["a.ts", "b.ts", "c.ts"], &["a.ts", "b.ts"]);
        state.open(12).unwrap();
        assert_eq!(state.current, 2);

        let outcome = state.unmark().unwrap().unwrap();
        assert_eq!(outcome.changes, vec![("b.ts".to_owned(), false)]);
        assert_eq!(state.current, 1);
        assert_eq!(state.review().unwrap().is_viewed("c.ts"), Some(false));
    }

    #[tokio::test]
    async fn navigation_follows_folder_order() {
        let mut state = state(&["src/a.ts", "README.md"], &[]);
        state.open(12).unwrap();
        assert_eq!(state.current_file(), Ok("src/a.ts"));
        state.prev().unwrap();
        assert_eq!(state.current_file(), Ok("README.md"));
        state.prev().unwrap();
        assert_eq!(state.current_file(), Ok("README.md"));
        state.next().unwrap();
        state.next().unwrap();
        assert_eq!(state.current_file(), Ok("src/a.ts"));
    }

    #[tokio::test]
    async fn folder_toggle_uses_tri_state_default() {
        let mut state = state(&["src/a.ts", "src/b.ts", "c.ts"], &["src/a.ts"]);
        state.open(12).unwrap();
        state.toggle_folder("src", None).unwrap();
        assert_eq!(state.review().unwrap().is_viewed("src/b.ts"), Some(true));
        state.toggle_folder("src/", None).unwrap();
        assert_eq!(state.review().unwrap().is_viewed("src/a.ts"), Some(false));
        assert_eq!(
            state.toggle_folder("lib", None).unwrap_err(),
            AppError::NoSuchFolder("lib".to_owned())
        );
    }

    #[tokio::test]
    async fn refresh_closes_review_of_vanished_pull_request() {
        let mut state = state(&["a.ts", "b.ts"], &[]);
        state.open(12).unwrap();
        state.current = 1;

        install(&mut state, vec![(snapshot(900, 12, &["a.ts"]), ViewedRecord::new())]);
        assert_eq!(state.current, 0);

        install(&mut state, Vec::new());
        assert_eq!(state.selected, None);
        assert_eq!(state.review().unwrap_err(), AppError::NothingOpen);
    }

    #[test]
    fn commands_without_open_review_fail() {
        let mut state = AppState::new(Reconciler::new(WriteQueue::new(
            Arc::new(MemoryStore::new()),
            WriteMode::Serialized,
        )));
        assert_eq!(state.next(), Err(AppError::NothingOpen));
        assert!(matches!(state.toggle(None), Err(AppError::NothingOpen)));
    }

    /// Store whose writes land only after a delay.
    #[derive(Default)]
    struct LaggingStore {
        inner: MemoryStore,
    }

    #[async_trait::async_trait]
    impl ViewedStore for LaggingStore {
        async fn get_viewed_files(&self, pr: PullRequestId) -> Result<ViewedRecord, StoreError> {
            self.inner.get_viewed_files(pr).await
        }

        async fn set_viewed_files(&self, pr: PullRequestId, record: &ViewedRecord) -> Result<(), StoreError> {
            tokio::time::sleep(std::time::Duration::from_millis(30)).await;
            self.inner.set_viewed_files(pr, record).await
        }
    }

    #[tokio::test]
    async fn toggle_then_refresh_keeps_the_toggle() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = dir.path().join("pulls.json");
        std::fs::write(
            &fixture,
            r#"{ "pulls": [ { "id": 900, "number": 12, "title": "Tidy", "author": "octo",
                 "repository": "octo/widgets",
                 "files": [ { "filename": "README.md", "sha": "s1" },
                            { "filename": "src/a.ts", "sha": "s2" } ] } ] }"#,
        )
        .unwrap();
        let store: Arc<dyn ViewedStore> = Arc::new(LaggingStore::default());
        let builder = SnapshotBuilder::new(Arc::new(JsonFixtureSource::new(fixture)), Arc::clone(&store));
        let mut state = AppState::new(Reconciler::new(WriteQueue::new(
            Arc::clone(&store),
            WriteMode::Serialized,
        )));
        state.refresh(&builder).await.unwrap();
        state.open(12).unwrap();

        state.toggle(Some("README.md")).unwrap();
        state.refresh(&builder).await.unwrap();

        assert_eq!(state.review().unwrap().is_viewed("README.md"), Some(true));
        assert_eq!(state.selected, Some(PullRequestId(900)));
        assert!(store.get_viewed_files(PullRequestId(900)).await.unwrap().contains("README.md"));
    }
}
