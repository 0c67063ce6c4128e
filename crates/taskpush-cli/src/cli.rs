use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "taskpush")]
#[command(version, about = "TaskPush - push tasks to a Cloud Tasks queue")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Config file (defaults to ~/.config/taskpush/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub queue: QueueArgs,
}

/// Queue selection. Flags override the config file, which overrides the environment.
#[derive(Args, Debug, Clone, Default)]
pub struct QueueArgs {
    /// Queue name
    #[arg(long, global = true)]
    pub queue: Option<String>,

    /// Project id
    #[arg(long, global = true)]
    pub project: Option<String>,

    /// Location id, e.g. asia-northeast1
    #[arg(long, global = true)]
    pub location: Option<String>,

    /// Service account key file
    #[arg(long, global = true)]
    pub key_file: Option<PathBuf>,

    /// Default HTTP method of pushed tasks
    #[arg(long, global = true)]
    pub method: Option<String>,

    /// Default pathname of pushed tasks
    #[arg(long, global = true)]
    pub path: Option<String>,

    /// Deliver straight to this service instead of the queue
    #[arg(long, global = true)]
    pub bypass_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Push one task
    Push(PushArgs),

    /// Push every task of a JSON file
    Batch(BatchArgs),

    /// List tasks in the queue
    List(FilterArgs),

    /// Find a task by id
    Find(FindArgs),

    /// Classify a request by its headers
    Origin(OriginArgs),

    /// Show the resolved queue configuration
    Config,
}

#[derive(Args)]
pub struct PushArgs {
    /// JSON body
    #[arg(long)]
    pub body: Option<String>,

    /// Task id (makes the task name deterministic)
    #[arg(long)]
    pub id: Option<String>,

    /// Schedule: an ISO-8601 date or epoch milliseconds
    #[arg(long)]
    pub schedule: Option<String>,

    /// Extra header, as KEY=VALUE
    #[arg(long = "header", value_name = "KEY=VALUE")]
    pub headers: Vec<String>,

    /// Retry budget in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Args)]
pub struct BatchArgs {
    /// JSON file holding an array of tasks
    pub file: PathBuf,

    /// Tasks per chunk
    #[arg(long, default_value_t = taskpush_core::DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Retry budget per task in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Log the timing of every chunk
    #[arg(long)]
    pub debug: bool,
}

#[derive(Args, Default)]
pub struct FilterArgs {
    /// Only tasks with this pathname
    #[arg(long = "only-path")]
    pub pathname: Option<String>,

    /// Only tasks with this HTTP method
    #[arg(long = "only-method")]
    pub method: Option<String>,

    /// Only tasks whose id starts with this prefix
    #[arg(long)]
    pub id_prefix: Option<String>,
}

#[derive(Args)]
pub struct FindArgs {
    /// Task id
    #[arg(long)]
    pub id: String,

    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args)]
pub struct OriginArgs {
    /// Request header, as KEY=VALUE
    #[arg(long = "header", value_name = "KEY=VALUE")]
    pub headers: Vec<String>,
}
