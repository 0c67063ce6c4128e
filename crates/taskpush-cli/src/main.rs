mod cli;
mod commands;
mod config;
mod error;
mod output;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use config::CliConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries command output only
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(&cli))),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(err) = run(cli).await {
        error::handle_error(err);
    }
}

fn default_filter(cli: &Cli) -> &'static str {
    match &cli.command {
        _ if cli.verbose => "debug,taskpush_core=debug",
        Commands::Batch(args) if args.debug => "warn,taskpush_core::batch=info",
        _ => "warn",
    }
}

async fn run(cli: Cli) -> Result<()> {
    let file_config = CliConfig::load(cli.config.as_deref());
    let queue = file_config.queue_config(&cli.queue);
    let format = cli.format;

    match cli.command {
        Commands::Push(args) => commands::push::run(queue, args, format).await,
        Commands::Batch(args) => commands::batch::run(queue, args, format).await,
        Commands::List(args) => commands::scan::list(queue, args, format).await,
        Commands::Find(args) => commands::scan::find(queue, args, format).await,
        Commands::Origin(args) => commands::origin::run(args, format),
        Commands::Config => commands::config::run(queue, format),
    }
}
