//! TaskPush Core - push-task client for a managed task queue
//!
//! This crate provides:
//! - Task submission with schedule normalization and bounded retries
//! - Batch submission with per-task failure isolation
//! - Bounded-depth task listing and early-exit search
//! - Bypass delivery straight to a development service
//! - Classification of inbound requests triggered by the queue or its cron mode

pub mod auth;
pub mod batch;
pub mod client;
pub mod config;
pub mod error;
pub mod origin;
pub mod request;
pub mod retry;
pub mod scan;
pub mod schedule;
pub mod target;
pub mod task;
pub mod transport;

// Re-export commonly used types
pub use auth::{ServiceAccountTokenProvider, StaticTokenProvider};
pub use batch::{BatchFailure, BatchOptions, DEFAULT_BATCH_SIZE, TaskFailure};
pub use client::{QueueClient, QueueClientBuilder};
pub use config::{
    ConfigResolver, EnvSource, QueueConfig, ResolvedConfig, ServiceAccountCredentials, Setting,
    SettingOrigin,
};
pub use error::{QueueError, Result};
pub use origin::{HeaderLookup, is_from_cron, is_from_queue};
pub use request::QueuePath;
pub use retry::{RetryInterval, RetryOutcome, RetryPolicy};
pub use scan::{MAX_PAGES, RemoteTask, TaskFilter};
pub use schedule::Schedule;
pub use target::{SendOptions, TaskTarget};
pub use task::{PushOptions, PushResult, RetryCatch, TaskRequest};
pub use transport::ReqwestTransport;

pub use taskpush_traits::{Headers, HttpMethod};
