// src/error.rs

//! Unified error handling for the sync application.

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

    /// HTTP request failed
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

    /// Feed body is not well-formed XML
    #[error("XML error: {0}")]
    Xml(String),

    /// Feed is well-formed XML but does not have the expected shape
    #[error("Malformed feed: {0}")]
    MalformedFeed(String),

    /// Downstream API rejected or failed a change
    #[error("Dispatch error for job {id}: {message}")]
    Dispatch { id: String, message: String },

    /// Downstream API refused a change with a status that retrying won't fix
    #[error("Job {id} rejected with HTTP {status}: {message}")]
    Rejected {
        id: String,
        status: u16,
        message: String,
    },

    /// Cron scheduler error
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Feed shrank too much compared to the snapshot
    #[error(
        "Circuit breaker triggered: {previous_count} -> {current_count} jobs \
         ({drop_percent:.1}% drop > {threshold_percent}% threshold)"
    )]
    CircuitBreakerTriggered {
        current_count: usize,
        previous_count: usize,
        drop_percent: f64,
        threshold_percent: u8,
    },

    /// Feed returned no jobs while the snapshot is not empty
    #[error("Feed returned no jobs")]
    EmptyFeed,
}

impl AppError {
    /// Create an XML parsing error.
    pub fn xml(message: impl fmt::Display) -> Self {
        Self::Xml(message.to_string())
    }

    /// Create a malformed feed error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedFeed(message.into())
    }

    /// Create a dispatch error for a job id.
    pub fn dispatch(id: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Dispatch {
            id: id.into(),
            message: message.to_string(),
        }
    }

    /// Create a rejection error for a job id.
    pub fn rejected(id: impl Into<String>, status: u16, message: impl fmt::Display) -> Self {
        Self::Rejected {
            id: id.into(),
            status,
            message: message.to_string(),
        }
    }

    /// Whether retrying the operation cannot succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Create a scheduler error.
    pub fn scheduler(message: impl fmt::Debug) -> Self {
        Self::Scheduler(format!("{message:?}"))
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
