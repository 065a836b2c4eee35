//! Error taxonomy for AI service calls and pipeline stages.
//!
//! `ServiceError` describes what went wrong talking to the AI service and
//! knows whether the failure is worth retrying. `StageError` adds the local
//! failures a stage can hit before any network call. Both collapse into a
//! cloneable `StageFailure` once a group's outcome is recorded.

use crate::types::{FailureKind, StageFailure};
use thiserror::Error;

/// Abstract retry classification shared by every error source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// May succeed if the same call is repeated
    Transient,
    /// Repeating the call cannot help
    Terminal,
}

/// Failures of a single call to the AI service
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("connection error: {0}")]
    Connectivity(String),

    #[error("content blocked: {0}")]
    ContentBlocked(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("gave up after {attempts} attempts, last error: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<ServiceError>,
    },
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimited(_)
            | Self::Unavailable(_)
            | Self::DeadlineExceeded(_)
            | Self::Connectivity(_) => ErrorKind::Transient,
            Self::ContentBlocked(_)
            | Self::MalformedResponse(_)
            | Self::Api { .. }
            | Self::RetriesExhausted { .. } => ErrorKind::Terminal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Map a non-success HTTP status onto the taxonomy
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = truncate(body, 500);
        match status {
            429 => Self::RateLimited(message),
            500 | 502 | 503 => Self::Unavailable(format!("HTTP {status}: {message}")),
            408 | 504 => Self::DeadlineExceeded(format!("HTTP {status}: {message}")),
            _ => Self::Api { status, message },
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::DeadlineExceeded(err.to_string())
        } else if err.is_connect() || err.is_request() {
            Self::Connectivity(err.to_string())
        } else if err.is_decode() || err.is_body() {
            Self::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16(), &err.to_string())
        } else {
            Self::Connectivity(err.to_string())
        }
    }
}

/// Failures of one stage call for one document group
#[derive(Debug, Error)]
pub enum StageError {
    #[error("failed to read page file '{file}': {source}")]
    FileIo {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl StageError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::FileIo { .. } => FailureKind::FileIo,
            Self::Service(ServiceError::ContentBlocked(_)) => FailureKind::ContentBlocked,
            Self::Service(ServiceError::MalformedResponse(_)) => FailureKind::MalformedResponse,
            Self::Service(ServiceError::RetriesExhausted { .. }) => FailureKind::RetriesExhausted,
            Self::Service(_) => FailureKind::Service,
        }
    }

    pub fn into_failure(self) -> StageFailure {
        StageFailure::new(self.failure_kind(), self.to_string())
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        trimmed.to_string()
    } else {
        let mut cut: String = trimmed.chars().take(max_chars).collect();
        cut.push_str("...");
        cut
    }
}
