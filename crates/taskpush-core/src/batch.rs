//! Batch orchestration.
//!
//! Tasks are split into fixed-size chunks. Chunks run one after another; the
//! tasks inside a chunk are delivered concurrently and each failure is recorded
//! without disturbing its siblings. The batch fails as a whole only after every
//! chunk settled, and the aggregate error still reports the successes.

use std::fmt;
use std::time::Duration;

use futures::future::join_all;
use taskpush_traits::Headers;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::client::QueueClient;
use crate::error::{QueueError, Result};
use crate::request::PreparedTask;
use crate::task::{PushResult, RetryCatch, TaskRequest};

pub const DEFAULT_BATCH_SIZE: usize = 200;

#[derive(Clone)]
pub struct BatchOptions {
    pub batch_size: usize,
    /// Retry timeout for each task, overriding the client policy.
    pub timeout: Option<Duration>,
    /// Log chunk timing at info level.
    pub debug: bool,
    pub retry_catch: Option<RetryCatch>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            timeout: None,
            debug: false,
            retry_catch: None,
        }
    }
}

impl BatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_retry_catch<F>(mut self, catch: F) -> Self
    where
        F: Fn(QueueError) -> Result<PushResult> + Send + Sync + 'static,
    {
        self.retry_catch = Some(std::sync::Arc::new(catch));
        self
    }

    fn effective_batch_size(&self) -> usize {
        if self.batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            self.batch_size
        }
    }
}

impl fmt::Debug for BatchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchOptions")
            .field("batch_size", &self.batch_size)
            .field("timeout", &self.timeout)
            .field("debug", &self.debug)
            .field("retry_catch", &self.retry_catch.is_some())
            .finish()
    }
}

/// One task that could not be delivered.
#[derive(Debug, Clone)]
pub struct TaskFailure {
    /// Position in the submitted batch.
    pub index: usize,
    pub task: TaskRequest,
    pub status: Option<u16>,
    pub message: String,
}

/// Aggregate outcome of a batch with at least one failure.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub total: usize,
    /// Delivered tasks as `(index, result)`, in input order.
    pub successes: Vec<(usize, PushResult)>,
    /// Failed tasks, in input order.
    pub failures: Vec<TaskFailure>,
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed = self.failures.len();
        write!(
            f,
            "{} failed and {} succeeded out of {}",
            failed,
            self.total - failed,
            self.total
        )
    }
}

impl QueueClient {
    /// Push many tasks, chunk by chunk.
    ///
    /// Returns the results in input order when every task was delivered, and
    /// [`QueueError::Batch`] otherwise. Schedules are validated for all tasks
    /// before the first request; one invalid schedule aborts the whole batch.
    pub async fn batch(
        &self,
        tasks: Vec<TaskRequest>,
        options: BatchOptions,
    ) -> Result<Vec<PushResult>> {
        self.batch_layered(tasks, None, &options).await
    }

    pub(crate) async fn batch_layered(
        &self,
        tasks: Vec<TaskRequest>,
        layer: Option<&Headers>,
        options: &BatchOptions,
    ) -> Result<Vec<PushResult>> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let prepared = tasks
            .iter()
            .map(|task| self.prepare(task, layer))
            .collect::<Result<Vec<PreparedTask>>>()?;

        let total = prepared.len();
        let batch_size = options.effective_batch_size();
        let policy = self.policy_for(options.timeout);
        let mut successes = Vec::with_capacity(total);
        let mut failures = Vec::new();

        for (chunk_index, chunk) in prepared.chunks(batch_size).enumerate() {
            let offset = chunk_index * batch_size;
            let started = Instant::now();

            let outcomes = join_all(
                chunk
                    .iter()
                    .map(|task| self.deliver_caught(task, &policy, options.retry_catch.as_ref())),
            )
            .await;

            let mut chunk_failures = 0usize;
            for (slot, outcome) in outcomes.into_iter().enumerate() {
                let index = offset + slot;
                match outcome {
                    Ok(result) => successes.push((index, result)),
                    Err(error) => {
                        chunk_failures += 1;
                        debug!(index, error = %error, "Task in batch failed");
                        failures.push(TaskFailure {
                            index,
                            task: tasks[index].clone(),
                            status: error.status(),
                            message: error.to_string(),
                        });
                    }
                }
            }

            let elapsed_ms = started.elapsed().as_millis() as u64;
            if options.debug {
                info!(
                    chunk = chunk_index + 1,
                    size = chunk.len(),
                    failed = chunk_failures,
                    elapsed_ms,
                    "Batch chunk completed"
                );
            } else {
                debug!(
                    chunk = chunk_index + 1,
                    size = chunk.len(),
                    failed = chunk_failures,
                    elapsed_ms,
                    "Batch chunk completed"
                );
            }
        }

        if failures.is_empty() {
            Ok(successes.into_iter().map(|(_, result)| result).collect())
        } else {
            Err(QueueError::Batch(BatchFailure {
                total,
                successes,
                failures,
            }))
        }
    }
}
