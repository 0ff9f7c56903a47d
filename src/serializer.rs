//! Serialization module for route batches and router dumps.
//!
//! This module renders collected routes as YAML or JSON for inspection, writes them to files,
//! and reads the router dumps host processes produce.

use crate::extractor::RouteBatch;
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;

/// Serializes a route batch to YAML format.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_yaml(batch: &RouteBatch) -> Result<String> {
    debug!("Serializing route batch to YAML");
    serde_yaml::to_string(batch).context("Failed to serialize route batch to YAML")
}

/// Serializes a route batch to JSON format with pretty printing.
///
/// The field names match the registration payload, so the output can be posted to the
/// documentation service as is.
///
/// # Example
///
/// ```
/// use atomicdocs::extractor::{RouteBatch, RouteDescriptor};
/// use atomicdocs::serializer::serialize_json;
///
/// let batch = RouteBatch::new(vec![RouteDescriptor::new("GET", "/users", "")], 3000);
/// let json = serialize_json(&batch).unwrap();
/// assert!(json.contains("\"port\": 3000"));
/// ```
pub fn serialize_json(batch: &RouteBatch) -> Result<String> {
    debug!("Serializing route batch to JSON");
    serde_json::to_string_pretty(batch).context("Failed to serialize route batch to JSON")
}

/// Writes string content to a file.
///
/// Creates the file if it doesn't exist, or overwrites it if it does. Missing parent
/// directories are created.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

/// Reads a router dump, YAML for `.yaml`/`.yml` and JSON otherwise.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn read_dump(path: &Path) -> Result<serde_json::Value> {
    debug!("Reading router dump: {}", path.display());
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read router dump: {}", path.display()))?;

    let is_yaml = matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("yaml") | Some("yml")
    );
    let dump = if is_yaml {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML router dump: {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON router dump: {}", path.display()))?
    };
    Ok(dump)
}
