//! HTTP transport contract.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::http::{Headers, HttpMethod};

/// Transport-level failures (no HTTP status was received).
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request failed: {0}")]
    Other(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout)
    }
}

/// One outbound HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Headers,
    pub body: Option<String>,
}

impl TransportRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: None,
        }
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Status plus the decoded JSON body (`None` when the body was empty or not JSON).
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub data: Option<Value>,
}

impl TransportResponse {
    pub fn new(status: u16, data: Option<Value>) -> Self {
        Self { status, data }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends HTTP requests on behalf of the queue client.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;

    async fn get(&self, url: &str, headers: Headers) -> Result<TransportResponse, TransportError> {
        self.send(TransportRequest::new(HttpMethod::Get, url).with_headers(headers))
            .await
    }

    async fn post(
        &self,
        url: &str,
        headers: Headers,
        body: String,
    ) -> Result<TransportResponse, TransportError> {
        self.send(
            TransportRequest::new(HttpMethod::Post, url)
                .with_headers(headers)
                .with_body(body),
        )
        .await
    }
}
