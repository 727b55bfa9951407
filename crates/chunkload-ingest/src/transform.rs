//! Per-batch cleaning
//!
//! Normalizes column names, drops rows with no data, and replaces missing
//! values with the empty-string sentinel. Missing and empty string are
//! indistinguishable downstream.

use crate::batch::{Batch, Value};
use crate::error::TransformError;
use std::collections::HashMap;
use tracing::{debug, error};

/// Normalize a header: trim, lower-case, spaces to underscores
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Clean one batch
///
/// Fails if the batch has no columns or if two headers collapse to the same
/// normalized name.
pub fn clean(batch: Batch) -> Result<Batch, TransformError> {
    let (columns, rows) = batch.into_parts();

    if columns.is_empty() {
        error!("Cannot clean a batch without columns");
        return Err(TransformError::NoColumns);
    }

    let columns = normalize_columns(&columns)?;

    let total = rows.len();
    let rows = rows
        .into_iter()
        .filter(|row| !row.iter().all(Value::is_null))
        .map(|row| {
            row.into_iter()
                .map(|value| if value.is_null() { Value::empty() } else { value })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let dropped = total - rows.len();
    if dropped > 0 {
        debug!(dropped, "Dropped rows with every field empty");
    }

    Ok(Batch::new(columns, rows))
}

fn normalize_columns(columns: &[String]) -> Result<Vec<String>, TransformError> {
    let mut seen: HashMap<String, &str> = HashMap::with_capacity(columns.len());
    let mut normalized = Vec::with_capacity(columns.len());

    for original in columns {
        let name = normalize_column_name(original);
        if let Some(first) = seen.get(&name) {
            let err = TransformError::DuplicateColumn {
                normalized: name,
                first: (*first).to_string(),
                second: original.clone(),
            };
            error!(error = %err, "Column names collide after normalization");
            return Err(err);
        }
        seen.insert(name.clone(), original);
        normalized.push(name);
    }

    Ok(normalized)
}
