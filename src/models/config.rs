//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Outcome;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Remote store connection settings
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Remote table identifiers per table variant
    #[serde(default)]
    pub tables: TablesConfig,

    /// Remote property names
    #[serde(default)]
    pub fields: FieldNames,

    /// Raw table cleaning rules
    #[serde(default)]
    pub table: TableConfig,

    /// Reconciliation rules
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Course equivalence groups
    #[serde(default = "defaults::equivalences")]
    pub equivalences: Vec<EquivalenceGroup>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.remote.base_url)?;
        if self.remote.timeout_secs == 0 {
            return Err(AppError::validation("remote.timeout_secs must be > 0"));
        }
        if self.remote.page_size == 0 || self.remote.page_size > 100 {
            return Err(AppError::validation(
                "remote.page_size must be between 1 and 100",
            ));
        }
        if self.fields.code.trim().is_empty() {
            return Err(AppError::validation("fields.code is empty"));
        }
        if self.table.row_selector.trim().is_empty() || self.table.cell_selector.trim().is_empty()
        {
            return Err(AppError::validation("table selectors must not be empty"));
        }
        if self.reconcile.priority.is_empty() {
            return Err(AppError::validation("reconcile.priority is empty"));
        }
        for group in &self.equivalences {
            if group.target.trim().is_empty() {
                return Err(AppError::validation("equivalence target is empty"));
            }
            if group.sources.is_empty() {
                return Err(AppError::validation(format!(
                    "equivalence group {} has no source codes",
                    group.target
                )));
            }
        }
        Ok(())
    }

    /// Validate that everything needed to reach the remote store is present.
    pub fn validate_remote(&self) -> Result<()> {
        self.validate()?;
        if self.remote.token.trim().is_empty() {
            return Err(AppError::config("remote.token is empty"));
        }
        if self.tables.main.trim().is_empty() {
            return Err(AppError::config("tables.main is empty"));
        }
        if self.tables.rejected.trim().is_empty() {
            return Err(AppError::config("tables.rejected is empty"));
        }
        Ok(())
    }

    /// Priority list parsed into outcome tags.
    pub fn priority(&self) -> Vec<Outcome> {
        self.reconcile
            .priority
            .iter()
            .map(|tag| Outcome::parse(tag))
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote: RemoteConfig::default(),
            tables: TablesConfig::default(),
            fields: FieldNames::default(),
            table: TableConfig::default(),
            reconcile: ReconcileConfig::default(),
            equivalences: defaults::equivalences(),
        }
    }
}

/// Remote store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// API root, e.g. `https://api.notion.com/v1`
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Bearer token
    #[serde(default)]
    pub token: String,

    /// Value of the API version header
    #[serde(default = "defaults::api_version")]
    pub api_version: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Records requested per query page
    #[serde(default = "defaults::page_size")]
    pub page_size: u32,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            token: String::new(),
            api_version: defaults::api_version(),
            timeout_secs: defaults::timeout(),
            user_agent: defaults::user_agent(),
            page_size: defaults::page_size(),
        }
    }
}

/// Remote table identifiers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TablesConfig {
    /// Primary table, one record per course
    #[serde(default)]
    pub main: String,

    /// Pending re-examination table
    #[serde(default)]
    pub rejected: String,

    /// Timeline table; the timeline pass is skipped when unset
    #[serde(default)]
    pub timeline: Option<String>,
}

/// Remote property names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldNames {
    /// Title property holding the business key
    #[serde(default = "defaults::field_code")]
    pub code: String,
    #[serde(default = "defaults::field_subject")]
    pub subject: String,
    #[serde(default = "defaults::field_workload")]
    pub workload: String,
    #[serde(default = "defaults::field_grade")]
    pub grade: String,
    #[serde(default = "defaults::field_period")]
    pub period: String,
    /// Relation property linking a course to its timeline period
    #[serde(default = "defaults::field_parent")]
    pub parent: String,
    #[serde(default = "defaults::field_ordinal")]
    pub ordinal: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            code: defaults::field_code(),
            subject: defaults::field_subject(),
            workload: defaults::field_workload(),
            grade: defaults::field_grade(),
            period: defaults::field_period(),
            parent: defaults::field_parent(),
            ordinal: defaults::field_ordinal(),
        }
    }
}

/// Raw table cleaning rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Boilerplate rows above the transcript body
    #[serde(default = "defaults::header_rows")]
    pub header_rows: usize,

    /// Boilerplate rows below the transcript body
    #[serde(default = "defaults::footer_rows")]
    pub footer_rows: usize,

    /// Fewer body rows than this means the scrape is unusable
    #[serde(default = "defaults::min_rows")]
    pub min_rows: usize,

    /// Section separators and other rows to discard
    #[serde(default = "defaults::noise_rows")]
    pub noise_rows: Vec<NoiseRow>,

    /// Workload summary rows start with this text
    #[serde(default = "defaults::summary_prefix")]
    pub summary_prefix: NoiseRow,

    /// CSS selector for table rows in a saved portal page
    #[serde(default = "defaults::row_selector")]
    pub row_selector: String,

    /// CSS selector for cells within a row
    #[serde(default = "defaults::cell_selector")]
    pub cell_selector: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            header_rows: defaults::header_rows(),
            footer_rows: defaults::footer_rows(),
            min_rows: defaults::min_rows(),
            noise_rows: defaults::noise_rows(),
            summary_prefix: defaults::summary_prefix(),
            row_selector: defaults::row_selector(),
            cell_selector: defaults::cell_selector(),
        }
    }
}

/// A row shape to discard: first cell text and total cell count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoiseRow {
    pub text: String,
    pub cells: usize,
}

impl NoiseRow {
    fn new(text: &str, cells: usize) -> Self {
        Self {
            text: text.to_string(),
            cells,
        }
    }
}

/// Reconciliation rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Result tags from best to worst
    #[serde(default = "defaults::priority")]
    pub priority: Vec<String>,

    /// Minimum derived grade for an approved equivalence
    #[serde(default = "defaults::pass_threshold")]
    pub pass_threshold: f64,

    /// Subject written on timeline period records
    #[serde(default = "defaults::semester_marker")]
    pub semester_marker: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            priority: defaults::priority(),
            pass_threshold: defaults::pass_threshold(),
            semester_marker: defaults::semester_marker(),
        }
    }
}

/// Historical course codes whose weighted grade stands in for a
/// new-curriculum code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquivalenceGroup {
    pub target: String,
    pub sources: Vec<String>,
}

mod defaults {
    use super::{EquivalenceGroup, NoiseRow};

    // Remote defaults
    pub fn base_url() -> String {
        "https://api.notion.com/v1".into()
    }
    pub fn api_version() -> String {
        "2022-06-28".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn user_agent() -> String {
        format!("transcript-sync/{}", env!("CARGO_PKG_VERSION"))
    }
    pub fn page_size() -> u32 {
        100
    }

    // Field defaults
    pub fn field_code() -> String {
        "CÓDIGO".into()
    }
    pub fn field_subject() -> String {
        "MATÉRIA".into()
    }
    pub fn field_workload() -> String {
        "CH".into()
    }
    pub fn field_grade() -> String {
        "NOTA".into()
    }
    pub fn field_period() -> String {
        "PERÍODO".into()
    }
    pub fn field_parent() -> String {
        "item principal".into()
    }
    pub fn field_ordinal() -> String {
        "SEMESTRE".into()
    }

    // Table defaults
    pub fn header_rows() -> usize {
        36
    }
    pub fn footer_rows() -> usize {
        14
    }
    pub fn min_rows() -> usize {
        1
    }
    pub fn noise_rows() -> Vec<NoiseRow> {
        vec![
            NoiseRow::new("Estudos Extracurriculares", 1),
            NoiseRow::new("Total Geral", 1),
            NoiseRow::new("Subtotal:", 4),
            NoiseRow::new("Período", 6),
        ]
    }
    pub fn summary_prefix() -> NoiseRow {
        NoiseRow::new("CH - Carga Horária", 2)
    }
    pub fn row_selector() -> String {
        "table tr".into()
    }
    pub fn cell_selector() -> String {
        "td".into()
    }

    // Reconcile defaults
    pub fn priority() -> Vec<String> {
        vec!["AP".into(), "DU".into(), "DI".into(), "RR".into()]
    }
    pub fn pass_threshold() -> f64 {
        5.0
    }
    pub fn semester_marker() -> String {
        "Semestre".into()
    }

    // Equivalence defaults
    pub fn equivalences() -> Vec<EquivalenceGroup> {
        [
            ("FIS122", ["FISD34", "FISD41"]),
            ("FIS123", ["FISD37", "FISD40"]),
            ("FIS121", ["FISD36", "FISD42"]),
        ]
        .into_iter()
        .map(|(target, sources)| EquivalenceGroup {
            target: target.to_string(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_remote_requires_token_and_tables() {
        let mut config = Config::default();
        assert!(config.validate_remote().is_err());

        config.remote.token = "secret".into();
        config.tables.main = "main-db".into();
        config.tables.rejected = "rr-db".into();
        assert!(config.validate_remote().is_ok());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.remote.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_equivalence_sources() {
        let mut config = Config::default();
        config.equivalences.push(EquivalenceGroup {
            target: "MAT99".into(),
            sources: vec![],
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_priority_is_best_first() {
        assert_eq!(
            Config::default().priority(),
            vec![
                Outcome::Approved,
                Outcome::Equivalence,
                Outcome::Dispensed,
                Outcome::Failed
            ]
        );
    }

    #[test]
    fn load_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[tables]
main = "abc"
rejected = "def"
timeline = "ghi"

[table]
header_rows = 2

[[equivalences]]
target = "MAT10"
sources = ["MAT01", "MAT02"]
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.tables.timeline.as_deref(), Some("ghi"));
        assert_eq!(config.table.header_rows, 2);
        assert_eq!(config.table.footer_rows, 14);
        assert_eq!(config.fields.grade, "NOTA");
        assert_eq!(config.equivalences.len(), 1);
        assert_eq!(config.equivalences[0].sources, vec!["MAT01", "MAT02"]);
    }

    #[test]
    fn load_or_default_falls_back() {
        let config = Config::load_or_default("/definitely/not/here.toml");
        assert_eq!(config.equivalences.len(), 3);
    }
}
