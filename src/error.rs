//! Error types for collection, persistence, and merging.
//!
//! Two families are kept apart:
//! - [`SearchError`]: transient failures of a single search request. These are
//!   retried by [`crate::api::RetrySearch`] and, once retries run out, degraded
//!   to an empty result instead of being propagated.
//! - [`CollectError`]: everything that can abort an operation. Some variants are
//!   soft (logged and skipped by the caller, e.g. [`CollectError::PartFileLoad`]),
//!   others end the invocation with a non-zero exit.

use std::path::PathBuf;
use thiserror::Error;

/// A failed search request.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("search API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode search response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        SearchError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::Decode(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("missing API credential {0}; set it in the environment or .env before starting")]
    MissingCredentials(&'static str),

    #[error("{0} is required for this mode")]
    MissingArgument(&'static str),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid quarter label '{0}' (expected YYYY_Q1..YYYY_Q4)")]
    InvalidQuarter(String),

    #[error("quarter {0} has not started yet")]
    FutureQuarter(String),

    #[error("no part files could be loaded from {}", .0.display())]
    EmptyInput(PathBuf),

    #[error("failed to load part file {}: {reason}", path.display())]
    PartFileLoad { path: PathBuf, reason: String },

    #[error("unknown record column '{0}'")]
    UnknownColumn(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CollectError>;
