use std::time::Duration;

use anyhow::{Context, Result};
use taskpush_core::{PushOptions, QueueConfig, TaskRequest};

use super::{build_client, parse_headers, parse_schedule};
use crate::cli::PushArgs;
use crate::output::{OutputFormat, print_json};

pub async fn run(config: QueueConfig, args: PushArgs, format: OutputFormat) -> Result<()> {
    let client = build_client(config)?;

    let mut task = TaskRequest::new().with_headers(parse_headers(&args.headers)?);
    if let Some(id) = args.id {
        task = task.with_id(id);
    }
    if let Some(schedule) = args.schedule.as_deref() {
        task = task.with_schedule(parse_schedule(schedule));
    }
    if let Some(body) = args.body.as_deref() {
        let body = serde_json::from_str(body).context("--body must be valid JSON")?;
        task = task.with_body(body);
    }

    let mut options = PushOptions::new();
    if let Some(secs) = args.timeout {
        options = options.with_timeout(Duration::from_secs(secs));
    }

    let result = client.push(task, options).await?;

    if format.is_json() {
        return print_json(&result);
    }

    println!("Pushed task (HTTP {})", result.status);
    if let Some(name) = result
        .data
        .as_ref()
        .and_then(|data| data.get("name"))
        .and_then(|name| name.as_str())
    {
        println!("Name: {}", name);
    }
    Ok(())
}
