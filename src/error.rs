// src/error.rs

//! Unified error handling for the synchronization engine.

use std::fmt;

use thiserror::Error;

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed before a status was received
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// The scraped table has nothing worth sending
    #[error("No usable data: {rows} rows remain, at least {minimum} required")]
    NoUsableData { rows: usize, minimum: usize },

    /// The remote store answered with a non-success status
    #[error("Remote store returned status {status}: {body}")]
    RemoteStatus { status: u16, body: String },

    /// The remote store answered with something we could not interpret
    #[error("Remote store error: {0}")]
    Remote(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a malformed-response error.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote(message.into())
    }

    /// HTTP status carried by the error, if the store produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteStatus { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_remote_error() {
        let err = AppError::RemoteStatus {
            status: 409,
            body: "conflict".into(),
        };
        assert_eq!(err.status(), Some(409));
        assert!(err.to_string().contains("409"));
    }

    #[test]
    fn test_status_absent_for_domain_errors() {
        assert_eq!(AppError::config("missing table").status(), None);
        assert_eq!(AppError::remote("no id").status(), None);
    }
}
