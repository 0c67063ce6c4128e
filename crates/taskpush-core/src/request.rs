//! Request builder for the Cloud Tasks REST API.
//!
//! Turns a prepared task into the `tasks.create` payload, and computes the
//! queue-relative URLs used for creation, listing and bypass delivery.

use base64::Engine;
use serde::Serialize;
use serde_json::Value;
use taskpush_traits::{Headers, HttpMethod};

use crate::error::Result;

/// Default REST root of the queue service.
pub const DEFAULT_API_BASE_URL: &str = "https://cloudtasks.googleapis.com/v2beta3";

/// Page size requested from the listing endpoint.
pub const LIST_PAGE_SIZE: usize = 1000;

/// Fully-qualified location of one queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePath {
    pub project_id: String,
    pub location_id: String,
    pub queue_name: String,
}

impl QueuePath {
    pub fn new(
        project_id: impl Into<String>,
        location_id: impl Into<String>,
        queue_name: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            location_id: location_id.into(),
            queue_name: queue_name.into(),
        }
    }

    /// `projects/{p}/locations/{l}/queues/{q}`
    pub fn queue_path(&self) -> String {
        format!(
            "projects/{}/locations/{}/queues/{}",
            self.project_id, self.location_id, self.queue_name
        )
    }

    /// Resource name of a task with a caller-chosen id.
    pub fn task_name(&self, id: &str) -> String {
        format!("{}/tasks/{}", self.queue_path(), id)
    }

    /// Task collection URL under the given API root.
    pub fn tasks_url(&self, base_url: &str) -> String {
        format!("{}/{}/tasks", base_url.trim_end_matches('/'), self.queue_path())
    }

    /// One listing page. The continuation token is URL-encoded.
    pub fn list_url(&self, base_url: &str, page_token: Option<&str>) -> String {
        let mut url = format!("{}?pageSize={}", self.tasks_url(base_url), LIST_PAGE_SIZE);
        if let Some(token) = page_token {
            url.push_str("&pageToken=");
            url.push_str(&urlencoding::encode(token));
        }
        url
    }
}

/// A task with every default applied and its schedule already normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTask {
    pub id: Option<String>,
    pub method: HttpMethod,
    pub pathname: String,
    pub headers: Headers,
    pub schedule: Option<String>,
    pub body: Option<Value>,
}

/// Make sure a path starts with exactly one slash.
pub fn normalize_pathname(pathname: &str) -> String {
    format!("/{}", pathname.trim().trim_start_matches('/'))
}

/// Base64 of the JSON-serialized body.
pub fn encode_body(body: &Value) -> Result<String> {
    let json = serde_json::to_vec(body)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(json))
}

/// `tasks.create` request body.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub task: TaskResource,
    pub response_view: &'static str,
}

/// Task resource sent to the queue.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskResource {
    pub app_engine_http_request: AppEngineHttpRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_time: Option<String>,
}

/// HTTP callback the queue will invoke.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppEngineHttpRequest {
    pub headers: Headers,
    pub http_method: HttpMethod,
    pub relative_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Build the creation payload for a prepared task.
pub fn build_create_task(queue: &QueuePath, task: &PreparedTask) -> Result<CreateTaskRequest> {
    let body = match &task.body {
        Some(body) if task.method.allows_body() && !body.is_null() => Some(encode_body(body)?),
        _ => None,
    };

    Ok(CreateTaskRequest {
        task: TaskResource {
            app_engine_http_request: AppEngineHttpRequest {
                headers: task.headers.clone(),
                http_method: task.method,
                relative_uri: normalize_pathname(&task.pathname),
                body,
            },
            name: task
                .id
                .as_deref()
                .filter(|id| !id.is_empty())
                .map(|id| queue.task_name(id)),
            schedule_time: task.schedule.clone(),
        },
        response_view: "FULL",
    })
}

/// Direct delivery URL used in bypass mode.
pub fn bypass_url(service_url: &str, pathname: &str) -> String {
    format!(
        "{}{}",
        service_url.trim_end_matches('/'),
        normalize_pathname(pathname)
    )
}
