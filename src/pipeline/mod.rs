//! Pipeline entry points for synchronization.
//!
//! - `prepare_records`: Normalize a raw grid and resolve equivalences
//! - `run_sync`: Prepare records and reconcile every remote table
//! - `sync_table`: Index and reconcile a single remote table

pub mod guard;
pub mod index;
pub mod reconcile;
pub mod sync;

pub use guard::{GuardResult, RowGuard};
pub use index::{RemoteIndex, TimelineIndex, build_index, build_timeline_index};
pub use reconcile::Reconciler;
pub use sync::{Stores, prepare_records, run_sync, sync_records, sync_table};
