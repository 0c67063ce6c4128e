pub mod batch;
pub mod config;
pub mod origin;
pub mod push;
pub mod scan;

use anyhow::{Context, Result, anyhow};
use taskpush_core::{Headers, QueueClient, QueueConfig, Schedule};

/// Parse `KEY=VALUE` pairs into a header map.
pub fn parse_headers(pairs: &[String]) -> Result<Headers> {
    pairs
        .iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("Invalid header '{}', expected KEY=VALUE", pair))?;
            Ok((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// A CLI schedule: digits are epoch milliseconds, anything else an ISO-8601 date.
pub fn parse_schedule(raw: &str) -> Schedule {
    match raw.trim().parse::<i64>() {
        Ok(millis) => Schedule::epoch_millis(millis),
        Err(_) => Schedule::iso(raw.trim()),
    }
}

pub fn build_client(config: QueueConfig) -> Result<QueueClient> {
    QueueClient::builder(config)
        .build()
        .context("Failed to create queue client")
}
