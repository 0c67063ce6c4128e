use std::collections::HashMap;

use anyhow::Result;
use taskpush_core::{is_from_cron, is_from_queue};

use super::parse_headers;
use crate::cli::OriginArgs;
use crate::output::{OutputFormat, print_json};

pub fn run(args: OriginArgs, format: OutputFormat) -> Result<()> {
    let headers: HashMap<String, String> = parse_headers(&args.headers)?
        .into_iter()
        .map(|(key, value)| (key.to_ascii_lowercase(), value))
        .collect();

    let from_queue = is_from_queue(&headers);
    let from_cron = is_from_cron(&headers);

    if format.is_json() {
        return print_json(&serde_json::json!({
            "from_queue": from_queue,
            "from_cron": from_cron,
        }));
    }

    let origin = if from_queue {
        "queue"
    } else if from_cron {
        "cron"
    } else {
        "other"
    };
    println!("{}", origin);
    Ok(())
}
