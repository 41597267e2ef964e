// src/services/extract.rs

//! Raw grid extraction.
//!
//! Reads the transcript table either from a saved portal page or from a
//! JSON array of rows produced by the browser session.

use std::fs;
use std::path::Path;

use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{RawGrid, TableConfig};

/// Extracts the cell grid out of transcript HTML.
pub struct GridExtractor {
    rows: Selector,
    cells: Selector,
}

impl GridExtractor {
    pub fn new(config: &TableConfig) -> Result<Self> {
        Ok(Self {
            rows: Self::parse_selector(&config.row_selector)?,
            cells: Self::parse_selector(&config.cell_selector)?,
        })
    }

    /// One grid row per matched table row, one cell per matched cell.
    pub fn extract(&self, html: &str) -> RawGrid {
        let document = Html::parse_document(html);
        document
            .select(&self.rows)
            .map(|row| {
                row.select(&self.cells)
                    .map(|cell| normalize_whitespace(&cell.text().collect::<String>()))
                    .collect()
            })
            .collect()
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}

/// Read a grid from disk: `.html`/`.htm` files are parsed as a portal
/// page, anything else as JSON.
pub fn read_grid(path: impl AsRef<Path>, config: &TableConfig) -> Result<RawGrid> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;

    let is_html = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"));

    let grid = if is_html {
        GridExtractor::new(config)?.extract(&content)
    } else {
        serde_json::from_str(&content)?
    };

    log::info!("Read {} raw rows from {}", grid.len(), path.display());
    Ok(grid)
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
