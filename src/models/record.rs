//! Transcript record data structures.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw text grid as extracted from the portal: rows of cells, no schema.
pub type RawGrid = Vec<Vec<String>>;

/// Result tag of a course entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Outcome {
    /// `AP`
    Approved,
    /// `DU`
    Equivalence,
    /// `DI`
    Dispensed,
    /// `RR`, failed and pending re-examination
    Failed,
    /// `--`, course still running
    InProgress,
    /// Any tag the portal emits that we have no rule for
    Other(String),
}

impl Outcome {
    /// Parse a result cell. Surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "AP" => Self::Approved,
            "DU" => Self::Equivalence,
            "DI" => Self::Dispensed,
            "RR" => Self::Failed,
            "--" => Self::InProgress,
            other => Self::Other(other.to_string()),
        }
    }

    /// Tag as shown on the portal.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Approved => "AP",
            Self::Equivalence => "DU",
            Self::Dispensed => "DI",
            Self::Failed => "RR",
            Self::InProgress => "--",
            Self::Other(tag) => tag,
        }
    }

    /// Outcome derived from a grade against the pass threshold.
    pub fn from_grade(grade: f64, pass_threshold: f64) -> Self {
        if grade >= pass_threshold {
            Self::Approved
        } else {
            Self::Failed
        }
    }
}

impl From<String> for Outcome {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<Outcome> for String {
    fn from(outcome: Outcome) -> Self {
        outcome.as_str().to_string()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One completed-course entry after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Academic term label, forward-filled from preceding rows
    pub period: String,

    /// Course code, never blank
    pub code: String,

    /// Course name
    pub subject: String,

    /// Workload hours (`CH`)
    pub workload: Option<f64>,

    /// Credits (`CR`)
    pub credits: Option<f64>,

    /// Grade from 0 to 10 (`NOTA`)
    pub grade: Option<f64>,

    /// Result tag (`RES`)
    pub result: Outcome,
}

impl Record {
    /// Whether the course is still running and has no grade yet.
    pub fn is_in_progress(&self) -> bool {
        self.result == Outcome::InProgress
    }
}
