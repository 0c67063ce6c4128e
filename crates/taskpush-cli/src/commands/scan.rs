use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use taskpush_core::{HttpMethod, QueueConfig, RemoteTask, TaskFilter};

use super::build_client;
use crate::cli::{FilterArgs, FindArgs};
use crate::output::{OutputFormat, or_dash, print_json, print_rows};

fn to_filter(args: &FilterArgs) -> Result<Option<TaskFilter>> {
    if args.pathname.is_none() && args.method.is_none() && args.id_prefix.is_none() {
        return Ok(None);
    }
    let mut filter = TaskFilter::new();
    if let Some(pathname) = &args.pathname {
        filter = filter.with_pathname(taskpush_core::request::normalize_pathname(pathname));
    }
    if let Some(method) = &args.method {
        filter = filter.with_method(method.parse::<HttpMethod>()?);
    }
    if let Some(prefix) = &args.id_prefix {
        filter = filter.with_id_prefix(prefix.clone());
    }
    Ok(Some(filter))
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    or_dash(time.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)))
}

fn print_tasks(tasks: &[RemoteTask], format: OutputFormat) -> Result<()> {
    if format.is_json() {
        return print_json(&tasks);
    }

    print_rows(
        &["ID", "Method", "Path", "Scheduled", "Created"],
        tasks.iter().map(|task| {
            [
                task.id.clone(),
                task.method.clone(),
                task.pathname.clone(),
                format_time(task.schedule),
                format_time(task.created),
            ]
        }),
    )
}

pub async fn list(config: QueueConfig, args: FilterArgs, format: OutputFormat) -> Result<()> {
    let filter = to_filter(&args)?;
    let client = build_client(config)?;

    let tasks = client.list(filter.as_ref()).await?;
    print_tasks(&tasks, format)?;
    if !format.is_json() {
        println!("{} tasks", tasks.len());
    }
    Ok(())
}

pub async fn find(config: QueueConfig, args: FindArgs, format: OutputFormat) -> Result<()> {
    let filter = to_filter(&args.filter)?;
    let client = build_client(config)?;

    let id = args.id;
    match client.find(|task| task.id == id, filter.as_ref()).await? {
        Some(task) => print_tasks(std::slice::from_ref(&task), format),
        None if format.is_json() => print_json(&serde_json::Value::Null),
        None => {
            println!("No task found with id {}", id);
            Ok(())
        }
    }
}
