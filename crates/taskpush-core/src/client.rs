//! Queue client and the single-task submission path.
//!
//! A [`QueueClient`] is bound to one queue. Every push normalizes the schedule,
//! merges headers, acquires a token and runs one delivery attempt per retry
//! round, either against the queue service's task-creation endpoint or, in
//! bypass mode, directly against a development service.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::RngExt;
use taskpush_traits::{
    Headers, HttpMethod, HttpTransport, KeyFileLoader, TokenProvider, TransportError,
    TransportRequest, merge_headers,
};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::auth::{ServiceAccountTokenProvider, StaticTokenProvider};
use crate::config::{ConfigResolver, EnvSource, QueueConfig, ResolvedConfig};
use crate::error::{QueueError, Result};
use crate::request::{PreparedTask, QueuePath, build_create_task, bypass_url};
use crate::retry::{RetryOutcome, RetryPolicy, retry_queue_op};
use crate::schedule;
use crate::task::{PushOptions, PushResult, RetryCatch, TaskRequest};
use crate::transport::ReqwestTransport;

/// Per-attempt ceiling in bypass mode. Expiry counts as a delivered task.
pub const BYPASS_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(4);

/// Random pre-delivery delay in bypass mode when no schedule is set, in milliseconds.
const BYPASS_DELAY_RANGE_MS: (u64, u64) = (100, 1000);

const BYPASS_TOKEN: &str = "bypass";

/// Client bound to one queue. Cheap to clone.
#[derive(Clone)]
pub struct QueueClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ResolvedConfig,
    token_provider: Arc<dyn TokenProvider>,
    transport: Arc<dyn HttpTransport>,
    project_id: OnceCell<String>,
}

pub struct QueueClientBuilder {
    config: QueueConfig,
    resolver: ConfigResolver,
    token_provider: Option<Arc<dyn TokenProvider>>,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl QueueClientBuilder {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            resolver: ConfigResolver::new(),
            token_provider: None,
            transport: None,
        }
    }

    pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_key_loader(mut self, loader: Arc<dyn KeyFileLoader>) -> Self {
        self.resolver = self.resolver.with_key_loader(loader);
        self
    }

    pub fn with_env(mut self, env: EnvSource) -> Self {
        self.resolver = self.resolver.with_env(env);
        self
    }

    /// Resolve the configuration and wire the collaborators.
    pub fn build(self) -> Result<QueueClient> {
        let config = self.resolver.resolve(&self.config)?;

        let token_provider: Arc<dyn TokenProvider> = match self.token_provider {
            Some(provider) => provider,
            None => {
                if config.project_id.is_none() && !config.is_bypass() {
                    return Err(QueueError::configuration(
                        "Missing required 'project_id'. Set it explicitly, in the service account key file, or in TASKPUSH_PROJECT_ID.",
                    ));
                }
                match &config.credentials {
                    Some(credentials) => Arc::new(
                        ServiceAccountTokenProvider::new(credentials)
                            .map_err(|e| QueueError::configuration(e.to_string()))?
                            .with_project_id(config.project_id.clone()),
                    ),
                    None if config.is_bypass() => Arc::new(StaticTokenProvider::new(BYPASS_TOKEN)),
                    None => {
                        return Err(QueueError::configuration(
                            "Missing credentials. Provide 'client_email' and 'private_key' or a service account key file.",
                        ));
                    }
                }
            }
        };

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(
                ReqwestTransport::new().map_err(|e| QueueError::configuration(e.to_string()))?,
            ),
        };

        Ok(QueueClient {
            inner: Arc::new(ClientInner {
                config,
                token_provider,
                transport,
                project_id: OnceCell::new(),
            }),
        })
    }
}

impl QueueClient {
    pub fn builder(config: QueueConfig) -> QueueClientBuilder {
        QueueClientBuilder::new(config)
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.inner.config
    }

    /// Project id, looked up from the token provider once if not configured.
    pub async fn project_id(&self) -> Result<String> {
        if let Some(project_id) = &self.inner.config.project_id {
            return Ok(project_id.clone());
        }
        let project_id = self
            .inner
            .project_id
            .get_or_try_init(|| async {
                let found = self.inner.token_provider.project_id().await?;
                debug!(project_id = ?found, "Looked up project id from token provider");
                found.filter(|id| !id.trim().is_empty()).ok_or_else(|| {
                    QueueError::configuration(
                        "Missing required 'project_id' and the token provider could not report one.",
                    )
                })
            })
            .await?;
        Ok(project_id.clone())
    }

    pub async fn queue_path(&self) -> Result<QueuePath> {
        let config = &self.inner.config;
        Ok(QueuePath::new(
            self.project_id().await?,
            config.location_id.clone(),
            config.queue_name.clone(),
        ))
    }

    /// Push one task.
    ///
    /// Schedule errors surface before any network call and bypass `retry_catch`.
    pub async fn push(&self, task: TaskRequest, options: PushOptions) -> Result<PushResult> {
        self.push_layered(&task, None, &options).await
    }

    pub(crate) async fn push_layered(
        &self,
        task: &TaskRequest,
        layer: Option<&Headers>,
        options: &PushOptions,
    ) -> Result<PushResult> {
        let prepared = self.prepare(task, layer)?;
        let policy = self.policy_for(options.timeout);
        self.deliver_caught(&prepared, &policy, options.retry_catch.as_ref())
            .await
    }

    /// Apply defaults and normalize the schedule. Never touches the network.
    pub(crate) fn prepare(
        &self,
        task: &TaskRequest,
        layer: Option<&Headers>,
    ) -> Result<PreparedTask> {
        let config = &self.inner.config;
        let schedule = schedule::normalize(task.schedule.as_ref())?;
        let headers = match layer {
            Some(layer) => merge_headers([&config.default_headers, layer, &task.headers]),
            None => merge_headers([&config.default_headers, &task.headers]),
        };

        Ok(PreparedTask {
            id: task.id.clone(),
            method: task.method.unwrap_or(config.default_method),
            pathname: task
                .pathname
                .clone()
                .unwrap_or_else(|| config.default_pathname.clone()),
            headers,
            schedule,
            body: task.body.clone(),
        })
    }

    pub(crate) fn policy_for(&self, timeout: Option<Duration>) -> RetryPolicy {
        let policy = self.inner.config.retry.clone();
        match timeout {
            Some(timeout) => policy.with_timeout(timeout),
            None => policy,
        }
    }

    pub(crate) async fn deliver_caught(
        &self,
        task: &PreparedTask,
        policy: &RetryPolicy,
        retry_catch: Option<&RetryCatch>,
    ) -> Result<PushResult> {
        match self.deliver(task, policy).await {
            Ok(result) => Ok(result),
            Err(error) => match retry_catch {
                Some(catch) => {
                    debug!(error = %error, "Handing delivery error to retry_catch");
                    catch(error)
                }
                None => Err(error),
            },
        }
    }

    async fn deliver(&self, task: &PreparedTask, policy: &RetryPolicy) -> Result<PushResult> {
        match &self.inner.config.bypass_service_url {
            Some(service_url) => self.deliver_bypass(service_url.as_str(), task, policy).await,
            None => self.deliver_to_queue(task, policy).await,
        }
    }

    async fn deliver_to_queue(
        &self,
        task: &PreparedTask,
        policy: &RetryPolicy,
    ) -> Result<PushResult> {
        let queue = self.queue_path().await?;
        let payload = build_create_task(&queue, task)?;
        let token = self.inner.token_provider.token().await?;

        let mut headers = Headers::new();
        headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        let request = TransportRequest::new(
            HttpMethod::Post,
            queue.tasks_url(&self.inner.config.api_base_url),
        )
        .with_headers(headers)
        .with_body(serde_json::to_string(&payload)?);

        debug!(
            queue = %self.inner.config.queue_name,
            method = %task.method,
            pathname = %task.pathname,
            "Creating task"
        );

        let outcome = retry_queue_op(policy, |attempt| {
            let request = request.clone();
            async move {
                debug!(attempt, uri = %request.url, "Delivery attempt");
                self.execute(request).await
            }
        })
        .await;
        settle(outcome)
    }

    async fn deliver_bypass(
        &self,
        service_url: &str,
        task: &PreparedTask,
        policy: &RetryPolicy,
    ) -> Result<PushResult> {
        let token = self.inner.token_provider.token().await?;
        let url = bypass_url(service_url, &task.pathname);

        let mut headers = task.headers.clone();
        set_header(&mut headers, "Accept", "application/json".to_string());
        set_header(&mut headers, "Authorization", format!("Bearer {}", token));

        let mut request = TransportRequest::new(task.method, url).with_headers(headers);
        if let Some(body) = task.body.as_ref().filter(|_| task.method.allows_body()) {
            request = request.with_body(serde_json::to_string(body)?);
        }

        let delay = bypass_delay(task.schedule.as_deref(), Utc::now());
        debug!(uri = %request.url, delay_ms = delay.as_millis() as u64, "Bypass delivery scheduled");
        tokio::time::sleep(delay).await;

        let outcome = retry_queue_op(policy, |_| {
            let request = request.clone();
            let transport = Arc::clone(&self.inner.transport);
            async move {
                let method = request.method;
                let uri = request.url.clone();
                // The attempt runs detached so an expired ceiling leaves the request in flight.
                let attempt = tokio::spawn(exchange(transport, request));
                match tokio::time::timeout(BYPASS_ATTEMPT_TIMEOUT, attempt).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join_error)) => Err(QueueError::Transport {
                        method,
                        uri,
                        source: TransportError::Other(join_error.to_string()),
                    }),
                    Err(_) => {
                        info!(
                            uri = %uri,
                            "Bypass delivery still running after timeout, treating it as delivered"
                        );
                        Ok(PushResult::new(200, None))
                    }
                }
            }
        })
        .await;
        settle(outcome)
    }

    async fn execute(&self, request: TransportRequest) -> Result<PushResult> {
        exchange(Arc::clone(&self.inner.transport), request).await
    }

    pub(crate) fn token_provider(&self) -> &Arc<dyn TokenProvider> {
        &self.inner.token_provider
    }

    pub(crate) fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.inner.transport
    }
}

/// One HTTP exchange mapped onto the error taxonomy.
async fn exchange(
    transport: Arc<dyn HttpTransport>,
    request: TransportRequest,
) -> Result<PushResult> {
    let method = request.method;
    let uri = request.url.clone();
    let response = transport
        .send(request)
        .await
        .map_err(|source| QueueError::Transport {
            method,
            uri: uri.clone(),
            source,
        })?;

    if response.is_success() {
        Ok(PushResult::new(response.status, response.data))
    } else {
        Err(QueueError::from_response(
            response.status,
            response.data,
            method,
            &uri,
        ))
    }
}

/// Replace a header regardless of the case it was given in.
fn set_header(headers: &mut Headers, name: &str, value: String) {
    headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value);
}

/// Flatten a retry outcome. An exhausted budget becomes [`QueueError::RetriesExhausted`].
fn settle(outcome: Result<RetryOutcome<PushResult, QueueError>>) -> Result<PushResult> {
    match outcome? {
        RetryOutcome::Succeeded { value, .. } => Ok(value),
        RetryOutcome::Exhausted {
            last_error,
            attempts,
        } => Err(QueueError::RetriesExhausted {
            attempts,
            last_error: Box::new(last_error),
        }),
    }
}

/// Wait before a bypass delivery: until the schedule, or a short random pause.
fn bypass_delay(schedule: Option<&str>, now: DateTime<Utc>) -> Duration {
    match schedule.and_then(|s| DateTime::parse_from_rfc3339(s).ok()) {
        Some(at) => (at.with_timezone(&Utc) - now).to_std().unwrap_or(Duration::ZERO),
        None => {
            let (min, max) = BYPASS_DELAY_RANGE_MS;
            Duration::from_millis(rand::rng().random_range(min..=max))
        }
    }
}
