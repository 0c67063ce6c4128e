//! Service-account key files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::auth::AuthError;

/// Fields read from a service-account JSON key file.
///
/// `location_id` is not part of Google's key format; it is an extra property
/// callers add so one file describes where the queue lives.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub client_email: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("location_id", &self.location_id)
            .field("client_email", &self.client_email)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

/// Reads service-account keys. Injected so tests can supply keys without files.
pub trait KeyFileLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<ServiceAccountKey, AuthError>;
}

/// Loads keys from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsKeyFileLoader;

impl KeyFileLoader for FsKeyFileLoader {
    fn load(&self, path: &Path) -> Result<ServiceAccountKey, AuthError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AuthError::InvalidCredentials(format!(
                "Failed to read key file {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            AuthError::InvalidCredentials(format!(
                "Failed to parse key file {}: {}",
                path.display(),
                e
            ))
        })
    }
}
