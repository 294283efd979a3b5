//! Error type definitions for folder-publisher
//!
//! The publishing pipeline distinguishes four failure categories: item
//! validation, transient API failures, quota exhaustion and archival. Only the
//! first three are errors in the type sense; archival failures are logged by
//! the pipeline and never surface here.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors (SeaORM)
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Ledger/repository layer errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Publishing API errors
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// Folder scanning and item validation errors
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Resource not found errors
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Ledger storage errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database errors from SeaORM
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Metadata snapshot serialization/deserialization failures
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Stored value could not be mapped back to a domain value
    #[error("Invalid stored value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Record not found
    #[error("Record not found: {table} with {field} = {value}")]
    RecordNotFound {
        table: String,
        field: String,
        value: String,
    },
}

/// Signals returned by a publishing API client
///
/// The variant decides the pipeline's reaction: `Transient` is retried with
/// backoff, `QuotaExceeded` is forwarded to the scheduler as a suspension and
/// `Validation` fails the item immediately.
#[derive(Error, Debug, Clone)]
pub enum PublishError {
    /// Retryable server-side or network failure
    #[error("Transient publish failure{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Transient {
        status: Option<u16>,
        message: String,
    },

    /// The API call allowance is exhausted until `resume_at`
    #[error("Publishing quota exceeded until {resume_at}: {message}")]
    QuotaExceeded {
        resume_at: DateTime<Utc>,
        message: String,
    },

    /// The request was rejected and retrying will not help
    #[error("Publish rejected: {message}")]
    Validation { message: String },
}

/// Folder scanning and item validation errors
#[derive(Error, Debug)]
pub enum ScanError {
    /// Filesystem access failure
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Item directory has no metadata descriptor
    #[error("Metadata file not found: {}", path.display())]
    MissingMetadata { path: PathBuf },

    /// Metadata descriptor could not be parsed
    #[error("Malformed metadata in {}: {source}", path.display())]
    MalformedMetadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Item directory has no recognized media file
    #[error("No media file found in {}", path.display())]
    MissingMedia { path: PathBuf },

    /// Item directory has more than one recognized media file
    #[error("Found {count} media files in {}, expected exactly one", path.display())]
    AmbiguousMedia { path: PathBuf, count: usize },
}

impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource: R, id: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl RepositoryError {
    /// Create a record-not-found error
    pub fn not_found<T: Into<String>, F: Into<String>, V: ToString>(
        table: T,
        field: F,
        value: V,
    ) -> Self {
        Self::RecordNotFound {
            table: table.into(),
            field: field.into(),
            value: value.to_string(),
        }
    }
}

impl PublishError {
    /// Create a transient error
    pub fn transient<S: Into<String>>(status: Option<u16>, message: S) -> Self {
        Self::Transient {
            status,
            message: message.into(),
        }
    }

    /// Create a validation (non-retryable) error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Whether the pipeline may retry this error locally
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

impl ScanError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(PublishError::transient(Some(503), "backend error").is_retryable());
        assert!(!PublishError::validation("bad title").is_retryable());
        assert!(
            !PublishError::QuotaExceeded {
                resume_at: Utc::now(),
                message: "quotaExceeded".to_string(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_transient_display_includes_status() {
        let err = PublishError::transient(Some(503), "backend error");
        assert_eq!(
            err.to_string(),
            "Transient publish failure (HTTP 503): backend error"
        );

        let err = PublishError::transient(None, "connection reset");
        assert_eq!(err.to_string(), "Transient publish failure: connection reset");
    }
}
