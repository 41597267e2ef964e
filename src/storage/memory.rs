//! In-memory store implementation.
//!
//! Keeps records in process and records every mutation call, so tests and
//! offline previews can see exactly what a run would send. Individual keys
//! can be made to fail to exercise the log-and-continue paths.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{RecordPatch, RemoteRecord};
use crate::storage::RecordStore;

/// A mutation received by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Create { id: String, patch: RecordPatch },
    Update { id: String, patch: RecordPatch },
}

#[derive(Debug, Default)]
struct State {
    records: Vec<(RemoteRecord, RecordPatch)>,
    calls: Vec<StoreCall>,
    next_id: usize,
    failing_keys: HashSet<String>,
    fail_fetch: bool,
}

/// In-memory backend for one table.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: String,
    state: Mutex<State>,
}

impl MemoryStore {
    /// Create an empty table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            state: Mutex::default(),
        }
    }

    /// Create a table pre-populated with `records`.
    pub fn with_records(table: impl Into<String>, records: Vec<RemoteRecord>) -> Self {
        let store = Self::new(table);
        store.lock().records = records
            .into_iter()
            .map(|r| (r, RecordPatch::default()))
            .collect();
        store
    }

    /// Make every create or update for `key` fail with status 400.
    pub fn fail_key(self, key: impl Into<String>) -> Self {
        self.lock().failing_keys.insert(key.into());
        self
    }

    /// Make `fetch_all` fail with status 503.
    pub fn fail_fetch(self) -> Self {
        self.lock().fail_fetch = true;
        self
    }

    /// Every mutation received so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    /// Number of create calls received, failed ones included.
    pub fn create_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, StoreCall::Create { .. }))
            .count()
    }

    /// Number of update calls received, failed ones included.
    pub fn update_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, StoreCall::Update { .. }))
            .count()
    }

    /// Current records.
    pub fn records(&self) -> Vec<RemoteRecord> {
        self.lock().records.iter().map(|(r, _)| r.clone()).collect()
    }

    /// Fields written to record `id` so far.
    pub fn fields(&self, id: &str) -> Option<RecordPatch> {
        self.lock()
            .records
            .iter()
            .find(|(r, _)| r.id == id)
            .map(|(_, fields)| fields.clone())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn rejected(key: &str) -> AppError {
        AppError::RemoteStatus {
            status: 400,
            body: format!("rejected write for {key}"),
        }
    }
}

fn merge(fields: &mut RecordPatch, patch: &RecordPatch) {
    let patch = patch.clone();
    fields.code = patch.code.or(fields.code.take());
    fields.subject = patch.subject.or(fields.subject.take());
    fields.workload = patch.workload.or(fields.workload);
    fields.grade = patch.grade.or(fields.grade);
    fields.period = patch.period.or(fields.period.take());
    fields.ordinal = patch.ordinal.or(fields.ordinal);
    fields.parent = patch.parent.or(fields.parent.take());
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn table(&self) -> &str {
        &self.table
    }

    async fn fetch_all(&self) -> Result<Vec<RemoteRecord>> {
        if self.lock().fail_fetch {
            return Err(AppError::RemoteStatus {
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(self.records())
    }

    async fn create(&self, patch: &RecordPatch) -> Result<String> {
        let mut state = self.lock();
        state.next_id += 1;
        let id = format!("{}-{}", self.table, state.next_id);
        state.calls.push(StoreCall::Create {
            id: id.clone(),
            patch: patch.clone(),
        });

        let key = patch.code.clone().unwrap_or_default();
        if state.failing_keys.contains(&key) {
            return Err(Self::rejected(&key));
        }

        let record = RemoteRecord {
            id: id.clone(),
            key: patch.code.clone(),
            parents: patch.parent.iter().cloned().collect(),
        };
        state.records.push((record, patch.clone()));
        Ok(id)
    }

    async fn update(&self, id: &str, patch: &RecordPatch) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Update {
            id: id.to_string(),
            patch: patch.clone(),
        });

        let failing = state.failing_keys.clone();
        let (record, fields) = state
            .records
            .iter_mut()
            .find(|(r, _)| r.id == id)
            .ok_or_else(|| AppError::RemoteStatus {
                status: 404,
                body: format!("no record {id}"),
            })?;

        if let Some(key) = record.key.as_deref().filter(|k| failing.contains(*k)) {
            return Err(Self::rejected(key));
        }

        merge(fields, patch);
        Ok(())
    }
}
