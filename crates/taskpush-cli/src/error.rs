use colored::Colorize;

pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    let msg = format!("{:#}", err).to_lowercase();

    if msg.contains("configuration error") || msg.contains("is required") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Pass the queue settings as flags or in the config file:");
        eprintln!(
            "  {} taskpush --queue <NAME> --location <LOCATION> --key-file <KEY.json> config",
            "$".dimmed()
        );
    }

    if msg.contains("lacks iam permission") || msg.contains("permission denied") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Grant the service account the Cloud Tasks Enqueuer role on this queue.");
    }

    if msg.contains("connection") || msg.contains("timed out") || msg.contains("network") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Check your internet connection and try again.");
    }

    std::process::exit(1);
}
