use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;
use taskpush_core::{
    BatchFailure, BatchOptions, Headers, HttpMethod, QueueConfig, QueueError, Schedule,
    TaskRequest,
};

use super::build_client;
use crate::cli::BatchArgs;
use crate::output::{OutputFormat, or_dash, print_json, print_rows};

/// One entry of a batch file.
#[derive(Debug, Deserialize)]
struct TaskSpec {
    id: Option<String>,
    method: Option<String>,
    pathname: Option<String>,
    #[serde(default)]
    headers: Headers,
    #[serde(default)]
    schedule: Value,
    body: Option<Value>,
}

impl TaskSpec {
    fn into_request(self) -> Result<TaskRequest> {
        let mut task = TaskRequest::new().with_headers(self.headers);
        task.id = self.id;
        task.pathname = self.pathname;
        task.body = self.body;
        task.method = self
            .method
            .as_deref()
            .map(str::parse::<HttpMethod>)
            .transpose()?;
        task.schedule = Schedule::from_json(&self.schedule)?;
        Ok(task)
    }
}

fn read_tasks(path: &Path) -> Result<Vec<TaskRequest>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let specs: Vec<TaskSpec> = serde_json::from_str(&content)
        .with_context(|| format!("{} must hold a JSON array of tasks", path.display()))?;
    specs
        .into_iter()
        .enumerate()
        .map(|(index, spec)| {
            spec.into_request()
                .with_context(|| format!("Invalid task at index {}", index))
        })
        .collect()
}

pub async fn run(config: QueueConfig, args: BatchArgs, format: OutputFormat) -> Result<()> {
    let tasks = read_tasks(&args.file)?;
    let client = build_client(config)?;

    let mut options = BatchOptions::new()
        .with_batch_size(args.batch_size)
        .with_debug(args.debug);
    if let Some(secs) = args.timeout {
        options = options.with_timeout(Duration::from_secs(secs));
    }

    match client.batch(tasks, options).await {
        Ok(results) => {
            if format.is_json() {
                return print_json(&results);
            }
            println!("Pushed {} tasks", results.len());
            Ok(())
        }
        Err(QueueError::Batch(failure)) => {
            report_failures(&failure, format)?;
            Err(anyhow!("Batch partially failed: {}", failure))
        }
        Err(err) => Err(err.into()),
    }
}

fn report_failures(failure: &BatchFailure, format: OutputFormat) -> Result<()> {
    if format.is_json() {
        let failures: Vec<_> = failure
            .failures
            .iter()
            .map(|f| {
                serde_json::json!({
                    "index": f.index,
                    "id": f.task.id,
                    "status": f.status,
                    "message": f.message,
                })
            })
            .collect();
        return print_json(&serde_json::json!({
            "total": failure.total,
            "succeeded": failure.successes.len(),
            "failures": failures,
        }));
    }

    print_rows(
        &["Index", "ID", "Status", "Message"],
        failure.failures.iter().map(|f| {
            [
                f.index.to_string(),
                or_dash(f.task.id.as_deref()),
                or_dash(f.status),
                f.message.clone(),
            ]
        }),
    )
}
