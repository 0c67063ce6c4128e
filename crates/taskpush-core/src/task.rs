//! Per-call task description, push options and results.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use taskpush_traits::{Headers, HttpMethod};

use crate::error::{QueueError, Result};
use crate::schedule::Schedule;

/// Successful delivery: the status and decoded response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushResult {
    pub status: u16,
    pub data: Option<Value>,
}

impl PushResult {
    pub fn new(status: u16, data: Option<Value>) -> Self {
        Self { status, data }
    }
}

/// One task to push. Unset fields fall back to the client defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskRequest {
    pub id: Option<String>,
    pub method: Option<HttpMethod>,
    pub pathname: Option<String>,
    pub headers: Headers,
    pub schedule: Option<Schedule>,
    pub body: Option<Value>,
}

impl TaskRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
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

    pub fn with_schedule(mut self, schedule: impl Into<Schedule>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize any payload as the task body.
    pub fn with_json_body<T: Serialize>(self, body: &T) -> Result<Self> {
        Ok(self.with_body(serde_json::to_value(body)?))
    }
}

/// Fallback invoked with the final delivery error. Its return value becomes the call's result.
pub type RetryCatch = Arc<dyn Fn(QueueError) -> Result<PushResult> + Send + Sync>;

/// Per-call options for a single push.
#[derive(Clone, Default)]
pub struct PushOptions {
    /// Overrides the client's retry timeout for this call.
    pub timeout: Option<Duration>,
    pub retry_catch: Option<RetryCatch>,
}

impl PushOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry_catch<F>(mut self, catch: F) -> Self
    where
        F: Fn(QueueError) -> Result<PushResult> + Send + Sync + 'static,
    {
        self.retry_catch = Some(Arc::new(catch));
        self
    }
}

impl fmt::Debug for PushOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushOptions")
            .field("timeout", &self.timeout)
            .field("retry_catch", &self.retry_catch.is_some())
            .finish()
    }
}
