//! Output materialization: flatten extraction results into a row-oriented
//! table and persist timestamped JSON/CSV/raw-text artifacts.

use crate::ScrapeError;
use chrono::Local;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Timestamp used in artifact filenames: `{artifact}_{YYYYMMDD_HHMMSS}.{ext}`.
pub fn timestamp_now() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Flat row-oriented view of an extraction result.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn cell_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Flattens a result into a table. Accepts a mapping (unwrapping a
/// single-key container such as `{"listings": [...]}`) or a sequence of
/// mappings; anything else fails with a `SerializationError`. Columns are
/// ordered by first appearance; missing cells are left empty.
pub fn to_rows(result: &Value) -> Result<Table, ScrapeError> {
    let unwrapped = match result {
        Value::Object(map) if map.len() == 1 => map
            .values()
            .next()
            .ok_or_else(|| ScrapeError::SerializationError("empty mapping".to_string()))?,
        other => other,
    };

    match unwrapped {
        Value::Array(items) => {
            let mut columns: Vec<String> = Vec::new();
            let mut records = Vec::with_capacity(items.len());

            for item in items {
                let record = item.as_object().ok_or_else(|| {
                    ScrapeError::SerializationError(
                        "sequence items must be mappings to form table rows".to_string(),
                    )
                })?;
                for key in record.keys() {
                    if !columns.iter().any(|c| c == key) {
                        columns.push(key.clone());
                    }
                }
                records.push(record);
            }

            let rows = records
                .into_iter()
                .map(|record| {
                    columns
                        .iter()
                        .map(|column| record.get(column).map(cell_to_string).unwrap_or_default())
                        .collect()
                })
                .collect();

            Ok(Table { columns, rows })
        }
        Value::Object(map) => {
            let columns: Vec<String> = map.keys().cloned().collect();
            let row = map.values().map(cell_to_string).collect();
            Ok(Table {
                columns,
                rows: vec![row],
            })
        }
        _ => Err(ScrapeError::SerializationError(
            "result is neither a mapping nor a sequence of mappings".to_string(),
        )),
    }
}

/// Persists the normalized page text. Written before extraction runs, so the
/// artifact survives later-stage failures.
pub fn save_raw_data(
    text: &str,
    timestamp: &str,
    output_dir: &Path,
) -> Result<PathBuf, ScrapeError> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(format!("raw_data_{timestamp}.md"));
    fs::write(&path, text)?;
    info!(path = %path.display(), "Raw data saved");
    Ok(path)
}

/// Persists the structured result as pretty-printed JSON plus a flat CSV
/// table. Returns `(json_path, table_path)`.
pub fn save_structured_data(
    result: &Value,
    timestamp: &str,
    output_dir: &Path,
) -> Result<(PathBuf, PathBuf), ScrapeError> {
    fs::create_dir_all(output_dir)?;

    let json_path = output_dir.join(format!("extracted_data_{timestamp}.json"));
    let rendered = serde_json::to_string_pretty(result)
        .map_err(|e| ScrapeError::SerializationError(e.to_string()))?;
    fs::write(&json_path, rendered)?;
    info!(path = %json_path.display(), "Structured data saved to JSON");

    let table = to_rows(result)?;
    let table_path = output_dir.join(format!("extracted_data_{timestamp}.csv"));
    let mut writer = csv::Writer::from_path(&table_path)
        .map_err(|e| ScrapeError::SerializationError(e.to_string()))?;
    writer
        .write_record(&table.columns)
        .map_err(|e| ScrapeError::SerializationError(e.to_string()))?;
    for row in &table.rows {
        writer
            .write_record(row)
            .map_err(|e| ScrapeError::SerializationError(e.to_string()))?;
    }
    writer
        .flush()
        .map_err(|e| ScrapeError::SerializationError(e.to_string()))?;
    info!(path = %table_path.display(), "Structured data saved to CSV");

    Ok((json_path, table_path))
}
