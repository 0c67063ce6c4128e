//! Error types for the queue client

use serde_json::Value;
use taskpush_traits::{AuthError, HttpMethod, TransportError};
use thiserror::Error;

use crate::batch::BatchFailure;

/// Message fragment the queue service returns when the caller's identity is not allowed.
const IAM_DENIAL: &str = "lacks iam permission";

/// Queue client error types
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid argument exception. 'schedule' {input} is an invalid date")]
    InvalidSchedule { input: String },

    #[error("Permission denied ({status}) on {method} {uri}: {message}")]
    Authorization {
        status: u16,
        message: String,
        method: HttpMethod,
        uri: String,
    },

    #[error("Token error: {0}")]
    Token(#[from] AuthError),

    #[error("HTTP {status} on {method} {uri}: {message}")]
    Http {
        status: u16,
        message: String,
        body: Option<Value>,
        method: HttpMethod,
        uri: String,
    },

    #[error("{method} {uri} failed: {source}")]
    Transport {
        method: HttpMethod,
        uri: String,
        #[source]
        source: TransportError,
    },

    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: Box<QueueError>,
    },

    #[error("Batch partially failed: {0}")]
    Batch(BatchFailure),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for queue operations
pub type Result<T> = std::result::Result<T, QueueError>;

impl QueueError {
    pub fn configuration(message: impl Into<String>) -> Self {
        QueueError::Configuration(message.into())
    }

    /// Build the error for a non-2xx response, recognising IAM denials.
    pub fn from_response(status: u16, body: Option<Value>, method: HttpMethod, uri: &str) -> Self {
        let message = error_message(status, body.as_ref());
        if message.to_lowercase().contains(IAM_DENIAL) {
            return QueueError::Authorization {
                status,
                message,
                method,
                uri: uri.to_string(),
            };
        }
        QueueError::Http {
            status,
            message,
            body,
            method,
            uri: uri.to_string(),
        }
    }

    /// Stable tag per error category.
    pub fn code(&self) -> &'static str {
        match self {
            QueueError::Configuration(_) => "configuration",
            QueueError::InvalidSchedule { .. } => "invalid_schedule",
            QueueError::Authorization { .. } => "authorization",
            QueueError::Token(_) => "token",
            QueueError::Http { .. } => "http",
            QueueError::Transport { .. } => "transport",
            QueueError::RetriesExhausted { .. } => "retries_exhausted",
            QueueError::Batch(_) => "batch_partial_failure",
            QueueError::Serialization(_) => "serialization",
        }
    }

    /// Errors that must stop a retry loop immediately.
    pub fn is_fatal(&self) -> bool {
        match self {
            QueueError::Http { .. } | QueueError::Transport { .. } => false,
            QueueError::RetriesExhausted { last_error, .. } => last_error.is_fatal(),
            _ => true,
        }
    }

    pub fn is_retryable(&self) -> bool {
        !self.is_fatal()
    }

    /// HTTP status of the response behind this error, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            QueueError::Http { status, .. } | QueueError::Authorization { status, .. } => {
                Some(*status)
            }
            QueueError::RetriesExhausted { last_error, .. } => last_error.status(),
            _ => None,
        }
    }

    /// True when the queue rejected a named task because it already exists.
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

/// Pull the service's error message out of a Google-style error body.
fn error_message(status: u16, body: Option<&Value>) -> String {
    let from_body = body.and_then(|value| {
        value
            .pointer("/error/message")
            .or_else(|| value.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| value.get("error").and_then(Value::as_str).map(str::to_string))
    });
    from_body.unwrap_or_else(|| match body {
        Some(value) if !value.is_null() => value.to_string(),
        _ => format!("request failed with status {}", status),
    })
}
