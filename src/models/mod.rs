// src/models/mod.rs

//! Domain models for the synchronization engine.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod record;
mod remote;
mod report;

// Re-export all public types
pub use config::{
    Config, EquivalenceGroup, FieldNames, NoiseRow, ReconcileConfig, RemoteConfig, TableConfig,
    TablesConfig,
};
pub use record::{Outcome, RawGrid, Record};
pub use remote::{RecordPatch, RemoteRecord};
pub use report::{Action, SyncOutcome, SyncReport, TableReport, TableVariant};
