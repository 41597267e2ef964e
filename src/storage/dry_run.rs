//! Dry-run wrapper.
//!
//! Reads go to the wrapped store so matching behaves exactly like a real
//! run; writes are logged and dropped.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{RecordPatch, RemoteRecord};
use crate::storage::RecordStore;

pub struct DryRunStore<S> {
    inner: S,
    created: AtomicUsize,
}

impl<S: RecordStore> DryRunStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            created: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for DryRunStore<S> {
    fn table(&self) -> &str {
        self.inner.table()
    }

    async fn fetch_all(&self) -> Result<Vec<RemoteRecord>> {
        self.inner.fetch_all().await
    }

    async fn create(&self, patch: &RecordPatch) -> Result<String> {
        let n = self.created.fetch_add(1, Ordering::Relaxed) + 1;
        log::info!("[dry-run] create in {}: {:?}", self.table(), patch);
        Ok(format!("dry-run-{n}"))
    }

    async fn update(&self, id: &str, patch: &RecordPatch) -> Result<()> {
        log::info!("[dry-run] update {} in {}: {:?}", id, self.table(), patch);
        Ok(())
    }
}
