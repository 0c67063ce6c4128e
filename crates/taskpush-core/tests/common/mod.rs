#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use taskpush_core::{EnvSource, QueueClient, QueueConfig, RetryPolicy};
use taskpush_traits::{
    AuthError, HttpTransport, TokenProvider, TransportError, TransportRequest, TransportResponse,
};

pub const PROJECT: &str = "my-super-project";
pub const LOCATION: &str = "asia-northeast1";
pub const QUEUE: &str = "your-queue-name";
pub const TASKS_URL: &str = "https://cloudtasks.googleapis.com/v2beta3/projects/my-super-project/locations/asia-northeast1/queues/your-queue-name/tasks";

type Responder =
    dyn Fn(&TransportRequest, usize) -> Result<TransportResponse, TransportError> + Send + Sync;

/// In-memory transport that records every request and answers through a script.
pub struct MockTransport {
    responder: Box<Responder>,
    delay: Option<Duration>,
    requests: Mutex<Vec<TransportRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    completed: AtomicUsize,
}

impl MockTransport {
    /// `responder` gets the request and its 0-based call index.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&TransportRequest, usize) -> Result<TransportResponse, TransportError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: None,
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    pub fn ok() -> Self {
        Self::new(|_, _| Ok(TransportResponse::new(200, Some(json!({ "ok": true })))))
    }

    /// Every call waits this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Calls that ran to the end, including any delay.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// JSON body of the n-th request.
    pub fn body_json(&self, index: usize) -> Value {
        let requests = self.requests();
        let body = requests[index].body.as_deref().expect("request has no body");
        serde_json::from_str(body).unwrap()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);

        (self.responder)(&request, index)
    }
}

/// Token provider that counts how often it is asked.
pub struct CountingTokenProvider {
    token: String,
    project_id: Option<String>,
    token_calls: AtomicUsize,
    project_calls: AtomicUsize,
}

impl CountingTokenProvider {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            project_id: None,
            token_calls: AtomicUsize::new(0),
            project_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_project_id(mut self, project_id: &str) -> Self {
        self.project_id = Some(project_id.to_string());
        self
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn project_calls(&self) -> usize {
        self.project_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for CountingTokenProvider {
    async fn token(&self) -> Result<String, AuthError> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.token.clone())
    }

    async fn project_id(&self) -> Result<Option<String>, AuthError> {
        self.project_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.project_id.clone())
    }
}

/// Queue configuration with every required setting present.
pub fn base_config() -> QueueConfig {
    QueueConfig::builder(QUEUE)
        .with_project_id(PROJECT)
        .with_location_id(LOCATION)
}

/// Failures surface at once instead of being retried.
pub fn no_retries(config: QueueConfig) -> QueueConfig {
    config.with_retry_policy(RetryPolicy::no_retries())
}

pub fn empty_env() -> EnvSource {
    EnvSource::from_pairs(Vec::<(String, String)>::new())
}

pub fn build_client(
    config: QueueConfig,
    transport: Arc<MockTransport>,
    tokens: Arc<CountingTokenProvider>,
) -> QueueClient {
    QueueClient::builder(config)
        .with_env(empty_env())
        .with_transport(transport)
        .with_token_provider(tokens)
        .build()
        .expect("client should build")
}

pub fn status(code: u16, data: Value) -> Result<TransportResponse, TransportError> {
    Ok(TransportResponse::new(code, Some(data)))
}
