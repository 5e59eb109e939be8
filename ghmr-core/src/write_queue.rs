//! Write-through of Viewed Records to the persistence port.
//!
//! In-memory toggles never wait for storage. Each submitted record is handed to a
//! background task and the outcome is reported afterwards on an optional channel.
//!
//! Two modes exist:
//!
//! - [`WriteMode::Serialized`] (default): one lane task per pull request drains an
//!   ordered channel. When several records queue up while a write is in flight,
//!   the lane skips straight to the newest one, so an older record can never land
//!   after a newer one.
//! - [`WriteMode::Detached`]: every write is its own task with no ordering between
//!   them. Two rapid toggles may complete out of order and leave the stored record
//!   one step behind the in-memory state until the next toggle.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::StoreError;
use crate::persistence::ViewedStore;
use crate::types::{PullRequestId, ViewedRecord};

/// How persistence writes for the same pull request are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Per-pull-request ordered lane with coalescing of queued records.
    #[default]
    Serialized,
    /// Fire-and-forget task per write; completion order is not guaranteed.
    Detached,
}

/// Outcome of one persisted write.
#[derive(Debug)]
pub struct WriteReport {
    pub pull_request: PullRequestId,
    /// Monotonic submission number of the record that was written.
    pub generation: u64,
    /// Number of older queued records skipped in favor of this one.
    pub superseded: usize,
    pub result: Result<(), StoreError>,
}

struct PendingWrite {
    generation: u64,
    record: ViewedRecord,
}

struct Lane {
    tx: mpsc::UnboundedSender<PendingWrite>,
    handle: JoinHandle<()>,
}

/// Dispatches Viewed Records to a [`ViewedStore`] without blocking the caller.
///
/// `submit` spawns onto the current tokio runtime and therefore must be called
/// from within one.
pub struct WriteQueue {
    store: Arc<dyn ViewedStore>,
    mode: WriteMode,
    lanes: HashMap<PullRequestId, Lane>,
    detached: Vec<JoinHandle<()>>,
    reports: Option<mpsc::UnboundedSender<WriteReport>>,
    generation: u64,
}

impl WriteQueue {
    pub fn new(store: Arc<dyn ViewedStore>, mode: WriteMode) -> Self {
        Self {
            store,
            mode,
            lanes: HashMap::new(),
            detached: Vec::new(),
            reports: None,
            generation: 0,
        }
    }

    /// Sends a [`WriteReport`] for every completed write to `tx`.
    pub fn with_reports(mut self, tx: mpsc::UnboundedSender<WriteReport>) -> Self {
        self.reports = Some(tx);
        self
    }

    /// Queues `record` to replace the stored record of `pull_request`.
    ///
    /// Returns the generation number assigned to this submission.
    pub fn submit(&mut self, pull_request: PullRequestId, record: ViewedRecord) -> u64 {
        self.generation += 1;
        let job = PendingWrite {
            generation: self.generation,
            record,
        };
        match self.mode {
            WriteMode::Serialized => self.enqueue(pull_request, job),
            WriteMode::Detached => self.spawn_detached(pull_request, job),
        }
        self.generation
    }

    fn enqueue(&mut self, pull_request: PullRequestId, job: PendingWrite) {
        let job = match self.lanes.get(&pull_request) {
            Some(lane) => match lane.tx.send(job) {
                Ok(()) => return,
                // The lane task is gone (it panicked); start a fresh one.
                Err(mpsc::error::SendError(job)) => job,
            },
            None => job,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_lane(
            pull_request,
            Arc::clone(&self.store),
            rx,
            self.reports.clone(),
        ));
        // A freshly created receiver is alive, so this send cannot fail.
        let _ = tx.send(job);
        self.lanes.insert(pull_request, Lane { tx, handle });
    }

    fn spawn_detached(&mut self, pull_request: PullRequestId, job: PendingWrite) {
        self.detached.retain(|handle| !handle.is_finished());
        let store = Arc::clone(&self.store);
        let reports = self.reports.clone();
        self.detached.push(tokio::spawn(async move {
            let result = store.set_viewed_files(pull_request, &job.record).await;
            report(&reports, pull_request, job.generation, 0, result);
        }));
    }

    /// Waits until every submitted write has completed.
    ///
    /// Lanes are closed and awaited; the next `submit` opens new ones.
    pub async fn flush(&mut self) {
        for (_, lane) in self.lanes.drain() {
            drop(lane.tx);
            if let Err(err) = lane.handle.await {
                error!(error = %err, "viewed-record write lane aborted");
            }
        }
        for handle in self.detached.drain(..) {
            if let Err(err) = handle.await {
                error!(error = %err, "detached viewed-record write aborted");
            }
        }
    }
}

async fn run_lane(
    pull_request: PullRequestId,
    store: Arc<dyn ViewedStore>,
    mut rx: mpsc::UnboundedReceiver<PendingWrite>,
    reports: Option<mpsc::UnboundedSender<WriteReport>>,
) {
    while let Some(mut job) = rx.recv().await {
        let mut superseded = 0;
        while let Ok(newer) = rx.try_recv() {
            job = newer;
            superseded += 1;
        }
        let result = store.set_viewed_files(pull_request, &job.record).await;
        report(&reports, pull_request, job.generation, superseded, result);
    }
}

fn report(
    reports: &Option<mpsc::UnboundedSender<WriteReport>>,
    pull_request: PullRequestId,
    generation: u64,
    superseded: usize,
    result: Result<(), StoreError>,
) {
    match &result {
        Ok(()) => debug!(%pull_request, generation, superseded, "viewed record written"),
        Err(err) => error!(%pull_request, generation, error = %err, "failed to persist viewed record"),
    }
    if let Some(tx) = reports {
        let _ = tx.send(WriteReport {
            pull_request,
            generation,
            superseded,
            result,
        });
    }
}
