//! Sync run outcome structures.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// The remote tables a run reconciles, in the order they are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableVariant {
    /// One record per course code
    Primary,
    /// Courses failed and pending re-examination
    Rejected,
    /// One record per academic term with linked course records
    Timeline,
}

impl fmt::Display for TableVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Primary => "primary",
            Self::Rejected => "pending-reexam",
            Self::Timeline => "timeline",
        };
        f.write_str(name)
    }
}

/// Kind of remote mutation attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Created,
    Updated,
}

/// One attempted remote mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    /// Business key the mutation was for
    pub key: String,
    pub action: Action,
    pub success: bool,
    /// HTTP status of a failed call, when the store reported one
    pub status: Option<u16>,
}

/// Outcome of reconciling one table variant.
#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub variant: TableVariant,
    /// Remote table identifier
    pub table: String,
    pub outcomes: Vec<SyncOutcome>,
    /// Remote identifiers left unmatched by any local row
    pub untouched: Vec<String>,
    /// Set when the pass could not run at all
    pub failure: Option<String>,
}

impl TableReport {
    pub fn new(variant: TableVariant, table: impl Into<String>) -> Self {
        Self {
            variant,
            table: table.into(),
            outcomes: Vec::new(),
            untouched: Vec::new(),
            failure: None,
        }
    }

    /// Report for a pass that aborted before any mutation.
    pub fn failed(variant: TableVariant, table: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            failure: Some(reason.to_string()),
            ..Self::new(variant, table)
        }
    }

    pub fn record(&mut self, key: &str, action: Action, status: Result<(), Option<u16>>) {
        self.outcomes.push(SyncOutcome {
            key: key.to_string(),
            action,
            success: status.is_ok(),
            status: status.err().flatten(),
        });
    }

    fn count(&self, action: Action, success: bool) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.action == action && o.success == success)
            .count()
    }

    /// Successful create calls.
    pub fn created(&self) -> usize {
        self.count(Action::Created, true)
    }

    /// Successful update calls.
    pub fn updated(&self) -> usize {
        self.count(Action::Updated, true)
    }

    /// Failed mutations of either kind.
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success).count()
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Records that survived normalization
    pub record_count: usize,
    pub tables: Vec<TableReport>,
}

impl SyncReport {
    /// Whether every pass ran and every mutation succeeded.
    pub fn is_clean(&self) -> bool {
        self.tables
            .iter()
            .all(|t| t.failure.is_none() && t.failures() == 0)
    }

    /// Log a per-table summary.
    pub fn log_summary(&self) {
        let elapsed = self.finished_at - self.started_at;
        log::info!(
            "[SUMMARY] {} records reconciled in {} ms",
            self.record_count,
            elapsed.num_milliseconds()
        );
        for table in &self.tables {
            match &table.failure {
                Some(reason) => log::error!("    {}: FAILED ({})", table.variant, reason),
                None => log::info!(
                    "    {}: {} updated, {} created, {} failed, {} untouched",
                    table.variant,
                    table.updated(),
                    table.created(),
                    table.failures(),
                    table.untouched.len()
                ),
            }
        }
    }
}
