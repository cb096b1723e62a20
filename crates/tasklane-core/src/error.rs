//! Error types for the backend client and local stores.

use chrono::NaiveDate;
use reqwest::StatusCode;
use thiserror::Error;

/// Form-level validation failures, raised before any request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required text field was empty or whitespace only
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// Priority outside 1..=3
    #[error("invalid priority {0}; expected 1 (low), 2 (medium) or 3 (high)")]
    InvalidPriority(u8),

    /// Goal end date before its start date
    #[error("end date {end} is before start date {start}")]
    DateRange { start: NaiveDate, end: NaiveDate },
}

/// Errors returned by [`crate::api::ApiClient`] and the session gate.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// Response body did not match the expected schema
    #[error("unexpected {resource} payload: {source}")]
    Decode {
        resource: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Protected request attempted without a stored token
    #[error("not logged in")]
    Unauthenticated,

    /// Credentials refused by the backend
    #[error("login rejected ({status}); check username and password")]
    LoginRejected { status: StatusCode },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Token could not be persisted after a successful login
    #[error("failed to store session: {0}")]
    Store(#[from] StoreError),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Errors from the on-disk data store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings: {0}")]
    ParseSettings(#[from] toml::de::Error),

    #[error("failed to serialize settings: {0}")]
    SerializeSettings(#[from] toml::ser::Error),

    #[error("failed to persist {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: tempfile::PersistError,
    },
}
