//! Token providers.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use taskpush_traits::{AuthError, TokenProvider};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::ServiceAccountCredentials;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Mints access tokens from a service-account key with the JWT-bearer grant.
pub struct ServiceAccountTokenProvider {
    client: Client,
    client_email: String,
    token_uri: String,
    project_id: Option<String>,
    key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenProvider {
    pub fn new(credentials: &ServiceAccountCredentials) -> Result<Self, AuthError> {
        let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())
            .map_err(|e| AuthError::InvalidCredentials(format!("private key: {}", e)))?;

        Ok(Self {
            client: Client::new(),
            client_email: credentials.client_email.clone(),
            token_uri: credentials
                .token_uri
                .clone()
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            project_id: None,
            key,
            cached: Mutex::new(None),
        })
    }

    pub fn with_project_id(mut self, project_id: Option<String>) -> Self {
        self.project_id = project_id;
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn sign_assertion(&self, now: DateTime<Utc>) -> Result<String, AuthError> {
        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| AuthError::InvalidCredentials(format!("signing assertion: {}", e)))
    }

    async fn exchange(&self, now: DateTime<Utc>) -> Result<CachedToken, AuthError> {
        let assertion = self.sign_assertion(now)?;

        let response = self
            .client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| AuthError::TokenRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenRequest(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

        let lifetime = token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);
        debug!(client_email = %self.client_email, expires_in = lifetime, "Obtained access token");

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: now + Duration::seconds(lifetime),
        })
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountTokenProvider {
    async fn token(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();

        if let Some(token) = cached.as_ref()
            && token.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) > now
        {
            return Ok(token.access_token.clone());
        }

        let fresh = self.exchange(now).await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    async fn project_id(&self) -> Result<Option<String>, AuthError> {
        Ok(self.project_id.clone())
    }
}

/// Hands out a fixed token. Used in bypass mode and tests.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
    project_id: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            project_id: None,
        }
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Result<String, AuthError> {
        Ok(self.token.clone())
    }

    async fn project_id(&self) -> Result<Option<String>, AuthError> {
        Ok(self.project_id.clone())
    }
}
