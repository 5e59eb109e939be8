use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use super::ViewedStore;
use crate::error::StoreError;
use crate::types::{PullRequestId, ViewedRecord};

/// Process-local [`ViewedStore`]; nothing survives the process.
///
/// Clones share the same map, so a test can keep a handle and inspect what the
/// write queue persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<HashMap<PullRequestId, ViewedRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous read of the stored record, if any.
    pub fn snapshot(&self, pull_request: PullRequestId) -> Option<ViewedRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&pull_request)
            .cloned()
    }
}

#[async_trait]
impl ViewedStore for MemoryStore {
    async fn get_viewed_files(&self, pull_request: PullRequestId) -> Result<ViewedRecord, StoreError> {
        Ok(self.snapshot(pull_request).unwrap_or_default())
    }

    async fn set_viewed_files(
        &self,
        pull_request: PullRequestId,
        record: &ViewedRecord,
    ) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pull_request, record.clone());
        Ok(())
    }
}
