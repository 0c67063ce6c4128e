//! Queue scan: bounded pagination over the task listing.
//!
//! `list` collects every task that passes the filter; `find` stops at the first
//! task matching a predicate and never fetches another page after that.

use std::ops::ControlFlow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskpush_traits::{Headers, HttpMethod};
use tracing::debug;

use crate::client::QueueClient;
use crate::error::{QueueError, Result};
use crate::request::LIST_PAGE_SIZE;

/// Hard page bound of one scan (about 30k tasks).
pub const MAX_PAGES: usize = 31;

/// Task as read back from the queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteTask {
    /// Last segment of the resource name.
    pub id: String,
    /// Fully-qualified resource name.
    pub name: String,
    /// Upper-cased HTTP method.
    pub method: String,
    pub pathname: String,
    pub schedule: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTasksResponse {
    #[serde(default)]
    tasks: Vec<RawTask>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTask {
    #[serde(default)]
    name: String,
    app_engine_http_request: Option<RawHttpRequest>,
    schedule_time: Option<String>,
    create_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHttpRequest {
    http_method: Option<String>,
    relative_uri: Option<String>,
}

fn parse_time(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|t| t.with_timezone(&Utc))
}

impl From<RawTask> for RemoteTask {
    fn from(raw: RawTask) -> Self {
        let id = raw.name.rsplit('/').next().unwrap_or_default().to_string();
        let (method, pathname) = match raw.app_engine_http_request {
            Some(http) => (http.http_method, http.relative_uri),
            None => (None, None),
        };

        RemoteTask {
            id,
            method: method
                .map(|m| m.to_ascii_uppercase())
                .unwrap_or_else(|| HttpMethod::Get.as_str().to_string()),
            pathname: pathname.unwrap_or_else(|| "/".to_string()),
            schedule: parse_time(raw.schedule_time.as_deref()),
            created: parse_time(raw.create_time.as_deref()),
            name: raw.name,
        }
    }
}

/// Structural filter. Every criterion that is set must match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub pathname: Option<String>,
    pub method: Option<HttpMethod>,
    pub id_prefix: Option<String>,
}

impl TaskFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pathname(mut self, pathname: impl Into<String>) -> Self {
        self.pathname = Some(pathname.into());
        self
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = Some(prefix.into());
        self
    }

    pub fn matches(&self, task: &RemoteTask) -> bool {
        self.pathname.as_deref().is_none_or(|p| task.pathname == p)
            && self.method.is_none_or(|m| task.method == m.as_str())
            && self
                .id_prefix
                .as_deref()
                .is_none_or(|prefix| task.id.starts_with(prefix))
    }
}

impl QueueClient {
    /// Every task in the queue that passes `filter`, up to [`MAX_PAGES`] pages.
    pub async fn list(&self, filter: Option<&TaskFilter>) -> Result<Vec<RemoteTask>> {
        let mut found = Vec::new();
        self.scan(filter, |task| {
            found.push(task);
            ControlFlow::Continue(())
        })
        .await?;
        Ok(found)
    }

    /// First task passing `filter` and `predicate`.
    pub async fn find<P>(
        &self,
        predicate: P,
        filter: Option<&TaskFilter>,
    ) -> Result<Option<RemoteTask>>
    where
        P: Fn(&RemoteTask) -> bool,
    {
        let mut hit = None;
        self.scan(filter, |task| {
            if predicate(&task) {
                hit = Some(task);
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await?;
        Ok(hit)
    }

    /// Shared pagination loop. `visit` sees each filtered task and may stop the scan.
    async fn scan<V>(&self, filter: Option<&TaskFilter>, mut visit: V) -> Result<()>
    where
        V: FnMut(RemoteTask) -> ControlFlow<()>,
    {
        let queue = self.queue_path().await?;
        let token = self.token_provider().token().await?;
        let base_url = &self.config().api_base_url;

        let mut headers = Headers::new();
        headers.insert("Authorization".to_string(), format!("Bearer {}", token));

        let mut page_token: Option<String> = None;
        for page in 1..=MAX_PAGES {
            let url = queue.list_url(base_url, page_token.as_deref());
            let response = self
                .transport()
                .get(&url, headers.clone())
                .await
                .map_err(|source| QueueError::Transport {
                    method: HttpMethod::Get,
                    uri: url.clone(),
                    source,
                })?;

            if !response.is_success() {
                return Err(QueueError::from_response(
                    response.status,
                    response.data,
                    HttpMethod::Get,
                    &url,
                ));
            }

            let listing: ListTasksResponse = match response.data {
                Some(data) if !data.is_null() => serde_json::from_value(data)?,
                _ => ListTasksResponse::default(),
            };
            let count = listing.tasks.len();
            debug!(page, count, queue = %queue.queue_name, "Fetched task page");

            for raw in listing.tasks {
                let task = RemoteTask::from(raw);
                if filter.is_none_or(|f| f.matches(&task)) && visit(task).is_break() {
                    return Ok(());
                }
            }

            match listing.next_page_token {
                Some(next) if count >= LIST_PAGE_SIZE && !next.is_empty() => {
                    page_token = Some(next)
                }
                _ => return Ok(()),
            }
        }

        debug!(max_pages = MAX_PAGES, "Scan stopped at page limit");
        Ok(())
    }
}
