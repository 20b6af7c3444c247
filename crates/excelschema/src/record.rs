//! Record shapes
//!
//! Everything the engine ingests is a [`RawRecord`]: an ordered
//! field -> cell map. Spreadsheet readers usually hand over a 2-D array
//! with a header row instead; [`records_from_array`] converts that shape.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::error::{SchemaError, SchemaResult};
use crate::types::{Cell, Value};

/// A record before normalization, fields in source order
pub type RawRecord = IndexMap<String, Cell>;

/// A normalized record, fields in source order (elided fields removed)
pub type Record = IndexMap<String, Value>;

/// Build a raw record from `(field, cell)` pairs.
pub fn raw_record<K, V, I>(pairs: I) -> RawRecord
where
    K: Into<String>,
    V: Into<Cell>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Convert a 2-D array whose first row is the header into raw records.
///
/// Rows are zipped against the header: a short row yields fewer fields and
/// cells beyond the header are ignored.
///
/// # Errors
///
/// `InvalidArgument` if the array has no header row, or the header has a
/// blank or repeated column name.
pub fn records_from_array(array: Vec<Vec<Cell>>) -> SchemaResult<Vec<RawRecord>> {
    let mut rows = array.into_iter();
    let header_row = rows
        .next()
        .ok_or_else(|| SchemaError::invalid_argument("array has no header row"))?;

    let mut header = Vec::with_capacity(header_row.len());
    let mut names = HashSet::new();
    for (idx, cell) in header_row.iter().enumerate() {
        let name = cell.as_header().ok_or_else(|| {
            SchemaError::invalid_argument(format!("header column {} is blank", idx))
        })?;
        if !names.insert(name.clone()) {
            return Err(SchemaError::invalid_argument(format!(
                "header column '{}' appears more than once",
                name
            )));
        }
        header.push(name);
    }

    Ok(rows
        .map(|row| header.iter().cloned().zip(row).collect())
        .collect())
}

/// Convert a normalized record back into raw cells.
///
/// Normalizing the result gives back an equal record, which is what lets
/// committed records be validated again after a schema change.
pub fn to_raw(record: &Record) -> RawRecord {
    record
        .iter()
        .map(|(field, value)| (field.clone(), value.to_cell()))
        .collect()
}

/// Render a normalized record as a JSON object (datetimes as ISO-8601 text).
pub fn jsonify(record: &Record) -> serde_json::Map<String, serde_json::Value> {
    record
        .iter()
        .map(|(field, value)| {
            let json = match value {
                Value::Integer(n) => serde_json::Value::from(*n),
                Value::Float(f) => serde_json::Number::from_f64(*f)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null),
                Value::Boolean(b) => serde_json::Value::Bool(*b),
                other => serde_json::Value::String(other.to_string()),
            };
            (field.clone(), json)
        })
        .collect()
}
