//! CLI configuration file support
//!
//! Loads queue defaults from ~/.config/taskpush/config.toml

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use taskpush_core::{QueueConfig, RetryInterval, RetryPolicy};

use crate::cli::QueueArgs;

const ENV_QUEUE_NAME: &str = "TASKPUSH_QUEUE";

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub queue: QueueSection,
    #[serde(default)]
    pub retry: RetrySection,
}

/// Queue defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueSection {
    pub name: Option<String>,
    pub project_id: Option<String>,
    pub location_id: Option<String>,
    pub key_file: Option<PathBuf>,
    pub method: Option<String>,
    pub pathname: Option<String>,
    pub bypass_url: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Retry policy overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrySection {
    pub timeout_secs: Option<u64>,
    pub interval_ms: Option<u64>,
    /// Randomize the interval up to this many milliseconds.
    pub max_interval_ms: Option<u64>,
    pub ignore_failure: Option<bool>,
}

impl CliConfig {
    /// Load configuration from a specific path, or the default one
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path(),
        };
        let Some(path) = path else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring invalid config file");
                Self::default()
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read config file");
                Self::default()
            }
        }
    }

    /// Get the default configuration file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("taskpush").join("config.toml"))
    }

    fn retry_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::default();
        if let Some(secs) = self.retry.timeout_secs {
            policy = policy.with_timeout(Duration::from_secs(secs));
        }
        match (self.retry.interval_ms, self.retry.max_interval_ms) {
            (Some(min), Some(max)) => {
                policy = policy.with_interval(RetryInterval::range(
                    Duration::from_millis(min),
                    Duration::from_millis(max),
                ));
            }
            (Some(ms), None) => {
                policy = policy.with_interval(RetryInterval::Fixed(Duration::from_millis(ms)));
            }
            _ => {}
        }
        if let Some(ignore) = self.retry.ignore_failure {
            policy = policy.with_ignore_failure(ignore);
        }
        policy
    }

    /// Combine flags and file values into a queue configuration.
    ///
    /// Anything still unset is left to the environment during resolution.
    pub fn queue_config(&self, args: &QueueArgs) -> QueueConfig {
        let file = &self.queue;
        let name = args
            .queue
            .clone()
            .or_else(|| file.name.clone())
            .or_else(|| std::env::var(ENV_QUEUE_NAME).ok())
            .unwrap_or_default();

        let mut config = QueueConfig::builder(name)
            .with_headers(file.headers.clone())
            .with_retry_policy(self.retry_policy());

        if let Some(project) = args.project.clone().or_else(|| file.project_id.clone()) {
            config = config.with_project_id(project);
        }
        if let Some(location) = args.location.clone().or_else(|| file.location_id.clone()) {
            config = config.with_location_id(location);
        }
        if let Some(key_file) = args.key_file.clone().or_else(|| file.key_file.clone()) {
            config = config.with_key_file(key_file);
        }
        if let Some(method) = args.method.clone().or_else(|| file.method.clone()) {
            config = config.with_method(method);
        }
        if let Some(path) = args.path.clone().or_else(|| file.pathname.clone()) {
            config = config.with_pathname(path);
        }
        if let Some(url) = args.bypass_url.clone().or_else(|| file.bypass_url.clone()) {
            config = config.with_bypass_service_url(url);
        }
        config
    }
}
