use anyhow::{Context, Result};
use taskpush_core::{ConfigResolver, QueueConfig, ResolvedConfig, Setting};

use crate::output::{OutputFormat, or_dash, print_json, print_rows};

fn source(config: &ResolvedConfig, setting: Setting) -> String {
    or_dash(config.origin_of(setting))
}

fn given_or_default(given: bool) -> String {
    if given { "explicit" } else { "default" }.to_string()
}

pub fn run(config: QueueConfig, format: OutputFormat) -> Result<()> {
    let resolved = ConfigResolver::new()
        .resolve(&config)
        .context("Failed to resolve queue configuration")?;

    let rows = [
        ("queue", resolved.queue_name.clone(), "explicit".to_string()),
        (
            "project_id",
            or_dash(resolved.project_id.as_deref()),
            source(&resolved, Setting::ProjectId),
        ),
        (
            "location_id",
            resolved.location_id.clone(),
            source(&resolved, Setting::LocationId),
        ),
        (
            "client_email",
            or_dash(resolved.credentials.as_ref().map(|c| &c.client_email)),
            source(&resolved, Setting::ClientEmail),
        ),
        (
            "bypass_url",
            or_dash(resolved.bypass_service_url.as_ref()),
            source(&resolved, Setting::BypassUrl),
        ),
        (
            "method",
            resolved.default_method.to_string(),
            given_or_default(config.method.is_some()),
        ),
        (
            "pathname",
            resolved.default_pathname.clone(),
            given_or_default(config.pathname.is_some()),
        ),
    ];

    if format.is_json() {
        let map: serde_json::Map<String, serde_json::Value> = rows
            .iter()
            .map(|(name, value, source)| {
                (
                    name.to_string(),
                    serde_json::json!({ "value": value, "source": source }),
                )
            })
            .collect();
        return print_json(&map);
    }

    print_rows(
        &["Setting", "Value", "Source"],
        rows.iter()
            .map(|(name, value, source)| [name.to_string(), value.clone(), source.clone()]),
    )
}
