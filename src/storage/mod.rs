//! Remote record store abstractions.
//!
//! The engine only decides what to send and in which order; talking to the
//! remote database is the store's job. Each handle is bound to one remote
//! table.
//!
//! - `NotionStore`: paged-record store over HTTP
//! - `MemoryStore`: in-process store for tests and offline previews
//! - `DryRunStore`: reads from a real store, logs mutations instead of
//!   sending them

pub mod dry_run;
pub mod memory;
pub mod notion;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{RecordPatch, RemoteRecord};

// Re-export for convenience
pub use dry_run::DryRunStore;
pub use memory::{MemoryStore, StoreCall};
pub use notion::NotionStore;

/// Trait for remote table backends.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Identifier of the table this handle writes to.
    fn table(&self) -> &str;

    /// Fetch every record of the table. Pagination is handled here.
    async fn fetch_all(&self) -> Result<Vec<RemoteRecord>>;

    /// Create a record and return its identifier.
    async fn create(&self, patch: &RecordPatch) -> Result<String>;

    /// Write the set fields of `patch` onto an existing record.
    async fn update(&self, id: &str, patch: &RecordPatch) -> Result<()>;
}
