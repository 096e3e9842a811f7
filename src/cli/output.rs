//! Output formatting for CLI commands. Results go to stdout as JSON.

use anyhow::{Context, Result};
use serde::Serialize;

/// Print data as pretty JSON
pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).context("Failed to serialize to JSON")?;
    println!("{}", json);
    Ok(())
}
