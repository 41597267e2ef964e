//! Usable-data guard.
//!
//! Prevents a broken scrape from reaching the remote store: when the
//! transcript body is shorter than the configured minimum, or nothing
//! survives normalization, the run is aborted before any mutation.

use crate::error::{AppError, Result};

/// Guard for the scraped row count.
#[derive(Debug, Clone)]
pub struct RowGuard {
    /// Minimum body rows after boilerplate stripping
    min_rows: usize,
}

/// Result of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardResult {
    /// Safe to proceed
    Safe { body_rows: usize, records: usize },
    /// Body shorter than the minimum
    TooFewRows { body_rows: usize },
    /// Body present but no course row survived cleaning
    Empty { body_rows: usize },
}

impl RowGuard {
    pub fn new(min_rows: usize) -> Self {
        Self { min_rows }
    }

    /// Check body and record counts.
    pub fn check(&self, body_rows: usize, records: usize) -> GuardResult {
        if body_rows < self.min_rows {
            return GuardResult::TooFewRows { body_rows };
        }
        if records == 0 {
            return GuardResult::Empty { body_rows };
        }
        GuardResult::Safe { body_rows, records }
    }

    /// Return Ok if safe, `NoUsableData` otherwise.
    pub fn validate(&self, body_rows: usize, records: usize) -> Result<()> {
        match self.check(body_rows, records) {
            GuardResult::Safe { body_rows, records } => {
                log::info!("Row guard: SAFE ({records} records from {body_rows} body rows)");
                Ok(())
            }
            GuardResult::TooFewRows { body_rows } => {
                log::error!(
                    "Row guard: not enough rows found in table ({body_rows} < {})",
                    self.min_rows
                );
                Err(AppError::NoUsableData {
                    rows: body_rows,
                    minimum: self.min_rows,
                })
            }
            GuardResult::Empty { body_rows } => {
                log::error!("Row guard: EMPTY RESULT from {body_rows} body rows - aborting");
                Err(AppError::NoUsableData {
                    rows: 0,
                    minimum: 1,
                })
            }
        }
    }
}
