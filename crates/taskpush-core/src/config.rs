//! Queue client configuration and its one-time resolution.
//!
//! Settings are looked up in a fixed precedence order of named sources:
//! explicit builder values, then the service-account key file, then the
//! process environment. Resolution runs once when the client is built and the
//! result is immutable afterwards.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use taskpush_traits::{FsKeyFileLoader, Headers, HttpMethod, KeyFileLoader, ServiceAccountKey};
use tracing::debug;
use url::Url;

use crate::error::{QueueError, Result};
use crate::request::{DEFAULT_API_BASE_URL, normalize_pathname};
use crate::retry::RetryPolicy;

pub const ENV_PROJECT_ID: &str = "TASKPUSH_PROJECT_ID";
pub const ENV_LOCATION_ID: &str = "TASKPUSH_LOCATION_ID";
pub const ENV_CLIENT_EMAIL: &str = "TASKPUSH_CLIENT_EMAIL";
pub const ENV_PRIVATE_KEY: &str = "TASKPUSH_PRIVATE_KEY";
pub const ENV_KEY_FILE: &str = "TASKPUSH_KEY_FILE";
pub const ENV_BYPASS_URL: &str = "TASKPUSH_BYPASS_URL";
pub const ENV_GOOGLE_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// A setting that can come from more than one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Setting {
    ProjectId,
    LocationId,
    ClientEmail,
    PrivateKey,
    TokenUri,
    KeyFile,
    BypassUrl,
}

/// Where a resolved setting came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingOrigin {
    Explicit,
    KeyFile,
    Environment,
}

impl fmt::Display for SettingOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingOrigin::Explicit => write!(f, "explicit"),
            SettingOrigin::KeyFile => write!(f, "key file"),
            SettingOrigin::Environment => write!(f, "environment"),
        }
    }
}

/// One named source of settings.
pub trait SettingSource: Send + Sync {
    fn origin(&self) -> SettingOrigin;

    fn lookup(&self, setting: Setting) -> Option<String>;
}

/// Caller-facing configuration, filled through `with_*` setters.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub queue_name: String,
    pub method: Option<String>,
    pub pathname: Option<String>,
    pub headers: Headers,
    pub project_id: Option<String>,
    pub location_id: Option<String>,
    pub client_email: Option<String>,
    pub private_key: Option<String>,
    pub key_file: Option<PathBuf>,
    pub bypass_service_url: Option<String>,
    pub api_base_url: Option<String>,
    pub retry: RetryPolicy,
}

impl QueueConfig {
    pub fn builder(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            method: None,
            pathname: None,
            headers: Headers::new(),
            project_id: None,
            location_id: None,
            client_email: None,
            private_key: None,
            key_file: None,
            bypass_service_url: None,
            api_base_url: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_pathname(mut self, pathname: impl Into<String>) -> Self {
        self.pathname = Some(pathname.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_location_id(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = Some(location_id.into());
        self
    }

    pub fn with_credentials(
        mut self,
        client_email: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        self.client_email = Some(client_email.into());
        self.private_key = Some(private_key.into());
        self
    }

    pub fn with_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_file = Some(path.into());
        self
    }

    pub fn with_bypass_service_url(mut self, url: impl Into<String>) -> Self {
        self.bypass_service_url = Some(url.into());
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Explicit values set on [`QueueConfig`].
struct ExplicitSource<'a> {
    config: &'a QueueConfig,
}

impl SettingSource for ExplicitSource<'_> {
    fn origin(&self) -> SettingOrigin {
        SettingOrigin::Explicit
    }

    fn lookup(&self, setting: Setting) -> Option<String> {
        let config = self.config;
        match setting {
            Setting::ProjectId => config.project_id.clone(),
            Setting::LocationId => config.location_id.clone(),
            Setting::ClientEmail => config.client_email.clone(),
            Setting::PrivateKey => config.private_key.clone(),
            Setting::TokenUri => None,
            Setting::KeyFile => config
                .key_file
                .as_ref()
                .map(|path| path.to_string_lossy().into_owned()),
            Setting::BypassUrl => config.bypass_service_url.clone(),
        }
    }
}

/// Fields of a loaded service-account key.
pub struct KeyFileSource {
    key: ServiceAccountKey,
}

impl KeyFileSource {
    pub fn new(key: ServiceAccountKey) -> Self {
        Self { key }
    }
}

impl SettingSource for KeyFileSource {
    fn origin(&self) -> SettingOrigin {
        SettingOrigin::KeyFile
    }

    fn lookup(&self, setting: Setting) -> Option<String> {
        match setting {
            Setting::ProjectId => self.key.project_id.clone(),
            Setting::LocationId => self.key.location_id.clone(),
            Setting::ClientEmail => self.key.client_email.clone(),
            Setting::PrivateKey => self.key.private_key.clone(),
            Setting::TokenUri => self.key.token_uri.clone(),
            Setting::KeyFile | Setting::BypassUrl => None,
        }
    }
}

type EnvReader = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Environment variables, read through a swappable reader.
#[derive(Clone)]
pub struct EnvSource {
    read: Arc<EnvReader>,
}

impl EnvSource {
    /// Read from the process environment.
    pub fn process() -> Self {
        Self {
            read: Arc::new(|name| std::env::var(name).ok()),
        }
    }

    /// Read from a fixed set of variables.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            read: Arc::new(move |name| vars.get(name).cloned()),
        }
    }

    fn variables(setting: Setting) -> &'static [&'static str] {
        match setting {
            Setting::ProjectId => &[ENV_PROJECT_ID],
            Setting::LocationId => &[ENV_LOCATION_ID],
            Setting::ClientEmail => &[ENV_CLIENT_EMAIL],
            Setting::PrivateKey => &[ENV_PRIVATE_KEY],
            Setting::TokenUri => &[],
            Setting::KeyFile => &[ENV_KEY_FILE, ENV_GOOGLE_CREDENTIALS],
            Setting::BypassUrl => &[ENV_BYPASS_URL],
        }
    }
}

impl Default for EnvSource {
    fn default() -> Self {
        Self::process()
    }
}

impl fmt::Debug for EnvSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EnvSource")
    }
}

impl SettingSource for EnvSource {
    fn origin(&self) -> SettingOrigin {
        SettingOrigin::Environment
    }

    fn lookup(&self, setting: Setting) -> Option<String> {
        Self::variables(setting)
            .iter()
            .find_map(|name| (self.read)(name))
    }
}

/// Service-account identity used to mint tokens.
#[derive(Clone)]
pub struct ServiceAccountCredentials {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: Option<String>,
}

impl fmt::Debug for ServiceAccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountCredentials")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

/// Immutable, validated configuration of one client.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub queue_name: String,
    pub default_method: HttpMethod,
    pub default_pathname: String,
    pub default_headers: Headers,
    /// `None` when the project id must be looked up from the token provider.
    pub project_id: Option<String>,
    pub location_id: String,
    pub credentials: Option<ServiceAccountCredentials>,
    pub bypass_service_url: Option<Url>,
    pub api_base_url: String,
    pub retry: RetryPolicy,
    origins: BTreeMap<Setting, SettingOrigin>,
}

impl ResolvedConfig {
    /// Source that supplied a setting, if any did.
    pub fn origin_of(&self, setting: Setting) -> Option<SettingOrigin> {
        self.origins.get(&setting).copied()
    }

    pub fn is_bypass(&self) -> bool {
        self.bypass_service_url.is_some()
    }
}

/// Resolves a [`QueueConfig`] against the key file and environment.
pub struct ConfigResolver {
    key_loader: Arc<dyn KeyFileLoader>,
    env: EnvSource,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self {
            key_loader: Arc::new(FsKeyFileLoader),
            env: EnvSource::process(),
        }
    }

    pub fn with_key_loader(mut self, key_loader: Arc<dyn KeyFileLoader>) -> Self {
        self.key_loader = key_loader;
        self
    }

    pub fn with_env(mut self, env: EnvSource) -> Self {
        self.env = env;
        self
    }

    pub fn resolve(&self, config: &QueueConfig) -> Result<ResolvedConfig> {
        let queue_name = config.queue_name.trim().to_string();
        if queue_name.is_empty() {
            return Err(QueueError::configuration("Parameter 'queueName' is required."));
        }

        let explicit = ExplicitSource { config };
        let mut origins = BTreeMap::new();

        // The key file location itself is resolved from the sources that can name it.
        let locators: [&dyn SettingSource; 2] = [&explicit, &self.env];
        let key_source = match first_of(&locators, Setting::KeyFile) {
            Some((path, origin)) => {
                origins.insert(Setting::KeyFile, origin);
                let key = self
                    .key_loader
                    .load(std::path::Path::new(&path))
                    .map_err(|e| QueueError::configuration(e.to_string()))?;
                Some(KeyFileSource::new(key))
            }
            None => None,
        };

        let mut sources: Vec<&dyn SettingSource> = Vec::with_capacity(3);
        sources.push(&explicit);
        if let Some(key_source) = &key_source {
            sources.push(key_source);
        }
        sources.push(&self.env);

        let mut resolve = |setting: Setting| {
            first_of(&sources, setting).map(|(value, origin)| {
                origins.insert(setting, origin);
                value
            })
        };

        let project_id = resolve(Setting::ProjectId);
        let location_id = resolve(Setting::LocationId).ok_or_else(|| {
            QueueError::configuration(
                "Missing required 'location_id'. Set it explicitly, in the service account key file, or in TASKPUSH_LOCATION_ID.",
            )
        })?;
        let client_email = resolve(Setting::ClientEmail);
        let private_key = resolve(Setting::PrivateKey);
        let token_uri = resolve(Setting::TokenUri);
        let bypass = resolve(Setting::BypassUrl);

        let credentials = match (client_email, private_key) {
            (Some(client_email), Some(private_key)) => Some(ServiceAccountCredentials {
                client_email,
                // Keys pasted into env vars usually carry escaped newlines.
                private_key: private_key.replace("\\n", "\n"),
                token_uri,
            }),
            _ => None,
        };

        let default_method = match &config.method {
            Some(method) => method
                .parse::<HttpMethod>()
                .map_err(|e| QueueError::configuration(format!("Invalid argument exception. {}", e)))?,
            None => HttpMethod::Get,
        };

        let bypass_service_url = bypass.map(|raw| parse_bypass_url(&raw)).transpose()?;

        let resolved = ResolvedConfig {
            queue_name,
            default_method,
            default_pathname: normalize_pathname(config.pathname.as_deref().unwrap_or("/")),
            default_headers: config.headers.clone(),
            project_id,
            location_id,
            credentials,
            bypass_service_url,
            api_base_url: config
                .api_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            retry: config.retry.clone(),
            origins,
        };

        debug!(
            queue = %resolved.queue_name,
            project_id = ?resolved.project_id,
            location_id = %resolved.location_id,
            bypass = resolved.is_bypass(),
            "Resolved queue configuration"
        );

        Ok(resolved)
    }
}

fn first_of(sources: &[&dyn SettingSource], setting: Setting) -> Option<(String, SettingOrigin)> {
    sources.iter().find_map(|source| {
        source
            .lookup(setting)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(|value| (value, source.origin()))
    })
}

/// Absolute http(s) URL. IPv6 hosts must be bracketed (`http://[::1]:4000`).
fn parse_bypass_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| QueueError::configuration(format!("Invalid bypass service URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(QueueError::configuration(format!(
            "Invalid bypass service URL '{}': only absolute http(s) URLs are supported",
            raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;
    use taskpush_traits::AuthError;

    struct StaticKeyLoader(ServiceAccountKey);

    impl KeyFileLoader for StaticKeyLoader {
        fn load(&self, _path: &Path) -> std::result::Result<ServiceAccountKey, AuthError> {
            Ok(self.0.clone())
        }
    }

    fn no_env() -> EnvSource {
        EnvSource::from_pairs(Vec::<(String, String)>::new())
    }

    fn resolver() -> ConfigResolver {
        ConfigResolver::new().with_env(no_env())
    }

    #[test]
    fn test_missing_queue_name_is_fatal() {
        let err = resolver()
            .resolve(&QueueConfig::builder("  ").with_location_id("l"))
            .unwrap_err();
        assert_eq!(err.code(), "configuration");
    }

    #[test]
    fn test_missing_location_is_fatal() {
        let err = resolver()
            .resolve(&QueueConfig::builder("q").with_project_id("p"))
            .unwrap_err();
        assert!(err.to_string().contains("location_id"));
    }

    #[test]
    fn test_invalid_method_is_fatal() {
        let err = resolver()
            .resolve(
                &QueueConfig::builder("q")
                    .with_location_id("l")
                    .with_method("FETCH"),
            )
            .unwrap_err();
        assert!(err.to_string().contains("'FETCH' is not a valid HTTP method"));
    }

    #[test]
    fn test_defaults() {
        let resolved = resolver()
            .resolve(&QueueConfig::builder("q").with_location_id("l"))
            .unwrap();
        assert_eq!(resolved.default_method, HttpMethod::Get);
        assert_eq!(resolved.default_pathname, "/");
        assert_eq!(resolved.api_base_url, DEFAULT_API_BASE_URL);
        assert!(resolved.project_id.is_none());
        assert!(resolved.credentials.is_none());
        assert!(!resolved.is_bypass());
    }

    #[test]
    fn test_method_is_trimmed_and_uppercased() {
        let resolved = resolver()
            .resolve(
                &QueueConfig::builder("q")
                    .with_location_id("l")
                    .with_method(" post ")
                    .with_pathname("hello"),
            )
            .unwrap();
        assert_eq!(resolved.default_method, HttpMethod::Post);
        assert_eq!(resolved.default_pathname, "/hello");
    }

    #[test]
    fn test_precedence_explicit_then_key_file_then_env() {
        let key = ServiceAccountKey {
            project_id: Some("key-project".to_string()),
            location_id: Some("key-location".to_string()),
            client_email: Some("svc@key.iam.gserviceaccount.com".to_string()),
            private_key: Some("key-pem".to_string()),
            token_uri: None,
        };
        let env = EnvSource::from_pairs([
            (ENV_PROJECT_ID, "env-project"),
            (ENV_LOCATION_ID, "env-location"),
            (ENV_BYPASS_URL, "http://localhost:4000"),
        ]);

        let resolved = ConfigResolver::new()
            .with_key_loader(Arc::new(StaticKeyLoader(key)))
            .with_env(env)
            .resolve(
                &QueueConfig::builder("q")
                    .with_key_file("/keys/service-account.json")
                    .with_project_id("explicit-project"),
            )
            .unwrap();

        assert_eq!(resolved.project_id.as_deref(), Some("explicit-project"));
        assert_eq!(resolved.origin_of(Setting::ProjectId), Some(SettingOrigin::Explicit));
        assert_eq!(resolved.location_id, "key-location");
        assert_eq!(resolved.origin_of(Setting::LocationId), Some(SettingOrigin::KeyFile));
        assert_eq!(
            resolved.bypass_service_url.as_ref().map(Url::as_str),
            Some("http://localhost:4000/")
        );
        assert_eq!(resolved.origin_of(Setting::BypassUrl), Some(SettingOrigin::Environment));
        assert_eq!(
            resolved.credentials.as_ref().map(|c| c.client_email.as_str()),
            Some("svc@key.iam.gserviceaccount.com")
        );
    }

    #[test]
    fn test_key_file_path_from_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"project_id":"file-project","location_id":"asia-northeast1"}}"#
        )
        .unwrap();

        let env = EnvSource::from_pairs([(
            ENV_GOOGLE_CREDENTIALS,
            file.path().to_string_lossy().into_owned(),
        )]);
        let resolved = ConfigResolver::new()
            .with_env(env)
            .resolve(&QueueConfig::builder("q"))
            .unwrap();

        assert_eq!(resolved.project_id.as_deref(), Some("file-project"));
        assert_eq!(resolved.location_id, "asia-northeast1");
        assert_eq!(resolved.origin_of(Setting::KeyFile), Some(SettingOrigin::Environment));
    }

    #[test]
    fn test_unreadable_key_file_is_fatal() {
        let err = resolver()
            .resolve(
                &QueueConfig::builder("q")
                    .with_location_id("l")
                    .with_key_file("/nonexistent/key.json"),
            )
            .unwrap_err();
        assert_eq!(err.code(), "configuration");
    }

    #[test]
    fn test_env_private_key_newlines_are_unescaped() {
        let env = EnvSource::from_pairs([
            (ENV_LOCATION_ID, "l"),
            (ENV_CLIENT_EMAIL, "svc@example.com"),
            (ENV_PRIVATE_KEY, "line1\\nline2"),
        ]);
        let resolved = ConfigResolver::new()
            .with_env(env)
            .resolve(&QueueConfig::builder("q"))
            .unwrap();
        let credentials = resolved.credentials.unwrap();
        assert_eq!(credentials.private_key, "line1\nline2");
        assert!(!format!("{:?}", credentials).contains("line1"));
    }

    #[test]
    fn test_bypass_url_validation() {
        for bad in [
            "localhost",
            "/localhost",
            "ftp://example.com",
            "http://localhost:w23",
            "http://2001:0db8:85a3:0000:0000:8a2e:0370:7334:4000",
        ] {
            let err = resolver()
                .resolve(
                    &QueueConfig::builder("q")
                        .with_location_id("l")
                        .with_bypass_service_url(bad),
                )
                .unwrap_err();
            assert_eq!(err.code(), "configuration", "{} should be rejected", bad);
        }

        for good in [
            "https://neap.co",
            "http://localhost:4000",
            "http://127.0.0.1",
            "http://[::1]:4000",
            "http://[2001:db8:85a3::8a2e:370:7334]:4000",
        ] {
            let resolved = resolver()
                .resolve(
                    &QueueConfig::builder("q")
                        .with_location_id("l")
                        .with_bypass_service_url(good),
                )
                .unwrap();
            assert!(resolved.is_bypass(), "{} should be accepted", good);
        }
    }
}
