//! Remote store record shapes.
//!
//! These are the only types that cross the store boundary. Internal logic
//! builds a [`RecordPatch`] and the store implementation decides how to
//! put it on the wire.

use serde::{Deserialize, Serialize};

/// A record as fetched from a remote table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Store-assigned identifier
    pub id: String,

    /// Business-key text (course code or period label); `None` when the
    /// title is empty or absent
    #[serde(default)]
    pub key: Option<String>,

    /// Identifiers of the records this one is linked to through the
    /// parent relation
    #[serde(default)]
    pub parents: Vec<String>,
}

impl RemoteRecord {
    pub fn new(id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: Some(key.into()),
            parents: Vec::new(),
        }
    }

    /// Link this record under a parent record.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parents.push(parent.into());
        self
    }

    /// Business key with blank titles treated as absent.
    pub fn business_key(&self) -> Option<&str> {
        self.key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// Field values to write on a remote record. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,

    /// Semester number of a timeline period record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<u32>,

    /// Identifier of the record to link to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl RecordPatch {
    /// True when the patch would send nothing.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Business key carried by the patch, used for log context.
    pub fn key(&self) -> Option<&str> {
        self.code.as_deref()
    }
}
