//! Token provider contract.

use async_trait::async_trait;
use thiserror::Error;

/// Failures raised while obtaining credentials or tokens.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Token request failed: {0}")]
    TokenRequest(String),

    #[error("Token response could not be parsed: {0}")]
    InvalidResponse(String),
}

/// Produces bearer tokens for queue API calls.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Get a bearer token for one operation.
    async fn token(&self) -> Result<String, AuthError>;

    /// Look up the project id behind these credentials, if the provider knows it.
    ///
    /// Only consulted when no project id was configured statically.
    async fn project_id(&self) -> Result<Option<String>, AuthError> {
        Ok(None)
    }
}
