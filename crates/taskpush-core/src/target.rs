//! Pathname-bound task targets.

use serde_json::Value;
use taskpush_traits::{Headers, HttpMethod};

use crate::batch::BatchOptions;
use crate::client::QueueClient;
use crate::error::Result;
use crate::schedule::Schedule;
use crate::task::{PushOptions, PushResult, TaskRequest};

/// Per-send task settings.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub id: Option<String>,
    pub method: Option<HttpMethod>,
    pub schedule: Option<Schedule>,
    pub headers: Headers,
    /// Only used by [`TaskTarget::send`]; batches take [`BatchOptions`].
    pub push: PushOptions,
}

impl SendOptions {
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

    pub fn with_schedule(mut self, schedule: impl Into<Schedule>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_push_options(mut self, push: PushOptions) -> Self {
        self.push = push;
        self
    }
}

/// Tasks sent to one pathname with a shared header layer.
///
/// Headers resolve as client defaults, then target headers, then send-time headers.
#[derive(Clone)]
pub struct TaskTarget {
    client: QueueClient,
    pathname: Option<String>,
    headers: Headers,
}

impl QueueClient {
    /// Bind a target to `pathname`, or to the client default when `None`.
    pub fn target(&self, pathname: Option<&str>) -> TaskTarget {
        TaskTarget {
            client: self.clone(),
            pathname: pathname.map(str::to_string),
            headers: Headers::new(),
        }
    }
}

impl TaskTarget {
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn pathname(&self) -> Option<&str> {
        self.pathname.as_deref()
    }

    fn task_for(&self, body: Value, options: SendOptions) -> TaskRequest {
        TaskRequest {
            id: options.id,
            method: options.method,
            pathname: self.pathname.clone(),
            headers: options.headers,
            schedule: options.schedule,
            body: Some(body),
        }
    }

    /// Push one body.
    pub async fn send(&self, body: Value, options: SendOptions) -> Result<PushResult> {
        let push = options.push.clone();
        let task = self.task_for(body, options);
        self.client
            .push_layered(&task, Some(&self.headers), &push)
            .await
    }

    /// Push many bodies as one batch. `derive` builds each task's settings from its body.
    pub async fn send_all<F>(
        &self,
        bodies: Vec<Value>,
        derive: F,
        batch: BatchOptions,
    ) -> Result<Vec<PushResult>>
    where
        F: Fn(&Value) -> SendOptions,
    {
        let tasks = bodies
            .into_iter()
            .map(|body| {
                let options = derive(&body);
                self.task_for(body, options)
            })
            .collect();
        self.client
            .batch_layered(tasks, Some(&self.headers), &batch)
            .await
    }
}
