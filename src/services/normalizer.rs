// src/services/normalizer.rs

//! Table normalizer.
//!
//! Turns the raw transcript grid into typed [`Record`]s: strips the
//! boilerplate rows around the body, drops separator rows, forward-fills
//! the period column and coerces numeric cells.

use crate::models::{Outcome, Record, TableConfig};

/// Column positions in a transcript body row.
mod column {
    pub const PERIOD: usize = 0;
    pub const CODE: usize = 1;
    pub const SUBJECT: usize = 2;
    pub const WORKLOAD: usize = 3;
    pub const CREDITS: usize = 4;
    pub const GRADE: usize = 5;
    pub const RESULT: usize = 8;
}

/// Cell text meaning "no value".
const NO_VALUE: &str = "--";

/// Service converting raw grids into records.
#[derive(Debug, Clone)]
pub struct TableNormalizer {
    config: TableConfig,
}

impl TableNormalizer {
    pub fn new(config: TableConfig) -> Self {
        Self { config }
    }

    /// Rows left after removing the fixed header and footer blocks.
    pub fn body<'g>(&self, grid: &'g [Vec<String>]) -> &'g [Vec<String>] {
        let start = self.config.header_rows.min(grid.len());
        let end = grid.len().saturating_sub(self.config.footer_rows).max(start);
        &grid[start..end]
    }

    /// Normalize a full grid, boilerplate included.
    pub fn normalize(&self, grid: &[Vec<String>]) -> Vec<Record> {
        let body = self.body(grid);
        let mut records = Vec::with_capacity(body.len());
        let mut last_period: Option<String> = None;

        for row in body.iter().filter(|row| !self.is_noise(row)) {
            let period = cell(row, column::PERIOD);
            if !period.is_empty() {
                last_period = Some(period.to_string());
            }

            let code = cell(row, column::CODE);
            if code.is_empty() {
                continue;
            }

            let Some(period) = last_period.clone() else {
                log::debug!("Dropping {code}: no period seen before it");
                continue;
            };

            records.push(Record {
                period,
                code: code.to_string(),
                subject: cell(row, column::SUBJECT).to_string(),
                workload: parse_number(cell(row, column::WORKLOAD)),
                credits: parse_number(cell(row, column::CREDITS)),
                grade: parse_number(cell(row, column::GRADE)),
                result: Outcome::parse(cell(row, column::RESULT)),
            });
        }

        log::info!(
            "Normalized {} records from {} body rows",
            records.len(),
            body.len()
        );
        records
    }

    /// Whether a row is a separator, subtotal or other non-course row.
    pub fn is_noise(&self, row: &[String]) -> bool {
        let first = row.first().map(|c| c.trim()).unwrap_or("");

        if row.len() == 1 && first.is_empty() {
            return true;
        }

        if self
            .config
            .noise_rows
            .iter()
            .any(|noise| row.len() == noise.cells && first == noise.text)
        {
            return true;
        }

        let summary = &self.config.summary_prefix;
        row.len() == summary.cells && first.starts_with(&summary.text)
    }
}

fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(|c| c.trim()).unwrap_or("")
}

/// Parse a numeric cell. Blank, `--` and unparseable text yield `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let text = raw.trim();
    if text.is_empty() || text == NO_VALUE {
        return None;
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}
