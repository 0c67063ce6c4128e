//! Command output: pretty JSON or a plain comfy table.

use std::fmt::Display;

use anyhow::Result;
use clap::ValueEnum;
use comfy_table::{Cell, Table};
use serde::Serialize;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

/// Table cell text for an optional value.
pub fn or_dash<T: Display>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn rows_table<R>(header: &[&str], rows: impl IntoIterator<Item = R>) -> Table
where
    R: IntoIterator,
    R::Item: Display,
{
    let mut table = Table::new();
    table.set_header(header.to_vec());
    for row in rows {
        table.add_row(row.into_iter().map(Cell::new).collect::<Vec<_>>());
    }
    table
}

pub fn print_rows<R>(header: &[&str], rows: impl IntoIterator<Item = R>) -> Result<()>
where
    R: IntoIterator,
    R::Item: Display,
{
    println!("{}", rows_table(header, rows));
    Ok(())
}
