//! Dataset loading.
//!
//! The interview spreadsheet is exported as JSON: either a top-level array
//! of row objects or JSON Lines (`.jsonl` / `.ndjson`). The whole file is
//! read once and every required column is checked before any row is used.

use super::{DEMO_COLS, RESPONSE_COLS};
use crate::error::ExplorerError;
use crate::models::{Demographics, ParticipantRecord};
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info};

type Row = Map<String, Value>;

/// Load the dataset at `path` and validate its columns.
pub fn load_dataset(path: &Path) -> Result<Vec<ParticipantRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read data file: {}", path.display()))?;

    let rows = parse_rows(&content, is_json_lines(path))
        .with_context(|| format!("Failed to parse data file: {}", path.display()))?;

    let records = records_from_rows(&rows)?;
    info!("Loaded {} rows from {}", records.len(), path.display());

    Ok(records)
}

fn is_json_lines(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("jsonl") | Some("ndjson")
    )
}

/// Parse raw file content into row objects.
fn parse_rows(content: &str, json_lines: bool) -> Result<Vec<Row>> {
    if json_lines {
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str::<Row>(line)
                    .with_context(|| format!("Line {} is not a JSON object", i + 1))
            })
            .collect()
    } else {
        serde_json::from_str::<Vec<Row>>(content)
            .context("Expected a JSON array of row objects")
    }
}

/// Validate columns and convert rows into participant records.
pub fn records_from_rows(rows: &[Row]) -> Result<Vec<ParticipantRecord>> {
    let missing = missing_columns(rows);
    if !missing.is_empty() {
        return Err(ExplorerError::MissingColumns(missing).into());
    }

    debug!("All {} required columns present", DEMO_COLS.len() + RESPONSE_COLS.len());
    Ok(rows.iter().map(record_from_row).collect())
}

/// Required columns absent from at least one row, in declaration order.
pub fn missing_columns(rows: &[Row]) -> Vec<String> {
    DEMO_COLS
        .iter()
        .chain(RESPONSE_COLS.iter())
        .filter(|col| rows.iter().any(|row| !row.contains_key(**col)))
        .map(|col| col.to_string())
        .collect()
}

fn record_from_row(row: &Row) -> ParticipantRecord {
    let demographic = |col: &str| row.get(col).and_then(cell_text).filter(|s| !s.trim().is_empty());

    let demographics = Demographics {
        age: row.get("age").and_then(cell_age),
        city_of_residence: demographic("city_of_residence"),
        state_of_residence: demographic("state_of_residence"),
        region_of_residence: demographic("region_of_residence"),
        income: demographic("income"),
        pizza_consumption: demographic("pizza_consumption"),
        food_restrictions: demographic("food_restrictions"),
    };

    ParticipantRecord {
        participant_id: row.get("participant_id").and_then(cell_text).unwrap_or_default(),
        demographics,
        responses: RESPONSE_COLS.map(|col| row.get(col).and_then(cell_text)),
    }
}

/// String form of a cell; `None` for null.
fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        }),
        other => Some(other.to_string()),
    }
}

fn cell_age(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
