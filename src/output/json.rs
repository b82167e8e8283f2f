//! JSON output formatter

use anyhow::Context;
use serde::Serialize;
use std::path::Path;

/// Print any serializable result as pretty JSON on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// Write pretty JSON to a file
pub fn write_json_file<T: Serialize + ?Sized>(value: &T, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write JSON report to {}", path.display()))?;
    Ok(())
}
