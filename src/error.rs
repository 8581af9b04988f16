// src/error.rs

//! Unified error handling for sync, indexing, and search.

use std::fmt;

use thiserror::Error;

/// Result type alias for taggle operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// The remote source could not be reached or answered with an error
    #[error("Remote source unavailable: {0}")]
    RemoteUnavailable(String),

    /// A remote payload did not have the expected shape
    #[error("Parse error in {context}: {message}")]
    Parse { context: String, message: String },

    /// Bulk upsert still failing for some ids after the last attempt
    #[error("Indexing into '{index}' failed for {} document(s): {}", failed_ids.len(), failed_ids.join(", "))]
    PartialIndexFailure {
        index: String,
        failed_ids: Vec<String>,
    },

    /// Index creation or search failed
    #[error("Search index unavailable: {0}")]
    IndexUnavailable(String),

    /// Index creation was refused because the index is already there
    #[error("Index '{0}' already exists")]
    IndexExists(String),

    /// Field lookup on a document that has no such field
    #[error("Unknown document field '{0}'")]
    UnknownField(String),

    /// A remote call did not answer in time
    #[error("Timed out after {seconds}s while {action}")]
    Timeout { action: String, seconds: u64 },

    /// The refresh was cancelled before completion
    #[error("Operation cancelled")]
    Cancelled,

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

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
}

impl AppError {
    /// Create a remote-unavailable error.
    pub fn remote(message: impl fmt::Display) -> Self {
        Self::RemoteUnavailable(message.to_string())
    }

    /// Create a parse error with context.
    pub fn parse(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create an index-unavailable error.
    pub fn index(message: impl fmt::Display) -> Self {
        Self::IndexUnavailable(message.to_string())
    }

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

    /// Whether the error leaves the previous snapshot authoritative.
    pub fn is_remote_failure(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnavailable(_) | Self::Timeout { .. } | Self::Parse { .. }
        )
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::parse("response body", err)
        } else {
            Self::RemoteUnavailable(err.to_string())
        }
    }
}
