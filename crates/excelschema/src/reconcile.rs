//! Batch reconciliation
//!
//! [`reconcile`] runs the ingestion algorithm for one batch against a
//! borrowed [`ConstraintMapping`] and returns the mapping the batch would
//! leave behind, together with the normalized records. The input mapping is
//! never touched, so a trial run is simply a call whose result is dropped
//! and a commit is a call whose mapping is adopted.
//!
//! Per record, in input order:
//!
//! 1. interpret every cell and collect its type tag (elided cells have none)
//! 2. check each tag against the recorded type; a string field may widen a
//!    numeric value, every other mismatch is `NonUniformType`
//! 3. record newly inferred types (widened fields stay `String`)
//! 4. render the values, coercing widened fields to text
//! 5. check required fields are present (`NotNull`)
//!
//! Uniqueness runs as a second pass once every record has cleared the first,
//! so a type or presence failure later in the batch wins over a duplicate.

use tracing::debug;

use crate::constraint::ConstraintMapping;
use crate::error::{SchemaError, SchemaResult};
use crate::normalize::{datetime, interpret, NormalizeOptions};
use crate::record::{RawRecord, Record};
use crate::types::Value;

/// Outcome of a batch that passed validation
#[derive(Debug, Clone)]
pub struct Reconciled {
    /// Mapping after the batch's type observations and seen values
    pub mapping: ConstraintMapping,
    /// Normalized records, in input order
    pub records: Vec<Record>,
}

/// Validate and normalize a batch against `mapping`.
///
/// # Errors
///
/// - `InvalidArgument` for an empty batch
/// - `NonUniformType`, `NotNull`, `Duplicate` for the first offending record
pub fn reconcile(
    mapping: &ConstraintMapping,
    batch: &[RawRecord],
    options: &NormalizeOptions,
) -> SchemaResult<Reconciled> {
    if batch.is_empty() {
        return Err(SchemaError::invalid_argument("batch contains no records"));
    }

    debug!(rows = batch.len(), "Reconciling batch");

    let mut working = mapping.clone();
    let mut records = Vec::with_capacity(batch.len());

    for (row, raw) in batch.iter().enumerate() {
        records.push(reconcile_record(&mut working, row, raw, options)?);
    }

    check_unique(&mut working, &records)?;

    Ok(Reconciled {
        mapping: working,
        records,
    })
}

fn reconcile_record(
    working: &mut ConstraintMapping,
    row: usize,
    raw: &RawRecord,
    options: &NormalizeOptions,
) -> SchemaResult<Record> {
    let interpreted: Vec<(&String, Value)> = raw
        .iter()
        .filter_map(|(field, cell)| interpret(cell).map(|v| (field, v)))
        .collect();

    let mut widened: Vec<&str> = Vec::new();
    for &(field, ref value) in &interpreted {
        let inferred = value.data_type();
        let expected = working.field_type(field);
        if expected.accepts(inferred) {
            continue;
        }
        if expected.widens_from(inferred) {
            debug!(row, field = %field, from = %inferred, "Widening numeric value to string");
            widened.push(field.as_str());
            continue;
        }
        return Err(SchemaError::NonUniformType {
            row,
            field: field.clone(),
            found: inferred,
            expected,
            schema: working.view(),
        });
    }

    for &(field, ref value) in &interpreted {
        if !widened.contains(&field.as_str()) {
            working.observe_type(field, value.data_type());
        }
    }

    let record: Record = interpreted
        .into_iter()
        .map(|(field, value)| {
            let value = if widened.contains(&field.as_str()) {
                Value::String(value.to_widened_string())
            } else {
                datetime::round_trip(value, options.as_datetime_str)
            };
            (field.clone(), value)
        })
        .collect();

    let missing: Vec<String> = working
        .not_null_fields()
        .iter()
        .filter(|field| !record.contains_key(field.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(SchemaError::NotNull {
            row,
            fields: missing,
        });
    }

    Ok(record)
}

fn check_unique(working: &mut ConstraintMapping, records: &[Record]) -> SchemaResult<()> {
    let unique: Vec<String> = working.unique_fields().map(str::to_string).collect();
    if unique.is_empty() {
        return Ok(());
    }

    for (row, record) in records.iter().enumerate() {
        for field in &unique {
            let Some(value) = record.get(field) else {
                continue;
            };
            if !working.track_value(field, value.clone()) {
                return Err(SchemaError::Duplicate {
                    row,
                    field: field.clone(),
                    value: value.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{Constraint, SchemaDecl};
    use crate::error::ErrorKind;
    use crate::record::raw_record;
    use crate::types::{Cell, DataType};

    fn opts() -> NormalizeOptions {
        NormalizeOptions::default()
    }

    fn unique_id() -> ConstraintMapping {
        ConstraintMapping::from_decl(
            &SchemaDecl::new().field("id", Constraint::typed(DataType::Integer).with_unique()),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_batch_rejected() {
        let err = reconcile(&ConstraintMapping::new(), &[], &opts()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_input_mapping_untouched() {
        let mapping = ConstraintMapping::new();
        let batch = vec![raw_record([("x", "5"), ("y", "abc")])];
        let out = reconcile(&mapping, &batch, &opts()).unwrap();
        assert!(mapping.is_empty());
        assert_eq!(out.mapping.field_type("x"), DataType::Integer);
        assert_eq!(out.mapping.field_type("y"), DataType::String);
    }

    #[test]
    fn test_types_inferred_within_batch() {
        let batch = vec![raw_record([("x", "5")]), raw_record([("x", "5.5")])];
        let err = reconcile(&ConstraintMapping::new(), &batch, &opts()).unwrap_err();
        match err {
            SchemaError::NonUniformType {
                row,
                field,
                found,
                expected,
                ..
            } => {
                assert_eq!(row, 1);
                assert_eq!(field, "x");
                assert_eq!(found, DataType::Float);
                assert_eq!(expected, DataType::Integer);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_string_field_widens_numbers() {
        let mapping =
            ConstraintMapping::from_decl(&SchemaDecl::new().field("f", DataType::String)).unwrap();
        let batch = vec![
            raw_record([("f", "42")]),
            raw_record([("f", "5.0")]),
            raw_record([("f", "abc")]),
        ];
        let out = reconcile(&mapping, &batch, &opts()).unwrap();
        assert_eq!(out.records[0]["f"], Value::from("42"));
        assert_eq!(out.records[1]["f"], Value::from("5.0"));
        assert_eq!(out.records[2]["f"], Value::from("abc"));
        assert_eq!(out.mapping.field_type("f"), DataType::String);
    }

    #[test]
    fn test_widened_native_float_keeps_fraction() {
        let mapping =
            ConstraintMapping::from_decl(&SchemaDecl::new().field("f", DataType::String)).unwrap();
        let batch = vec![raw_record([("f", Cell::Float(5.0))])];
        let out = reconcile(&mapping, &batch, &opts()).unwrap();
        assert_eq!(out.records[0]["f"], Value::from("5.0"));
    }

    #[test]
    fn test_numeric_field_rejects_text() {
        let batch = vec![raw_record([("f", "42")]), raw_record([("f", "abc")])];
        let err = reconcile(&ConstraintMapping::new(), &batch, &opts()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NonUniformType);
        assert_eq!(err.row(), Some(1));
    }

    #[test]
    fn test_not_null_names_every_missing_field() {
        let mapping = ConstraintMapping::from_decl(
            &SchemaDecl::new()
                .field("b", Constraint::any().with_not_null())
                .field("a", Constraint::any().with_not_null()),
        )
        .unwrap();
        let batch = vec![raw_record([("a", "-"), ("z", "1")])];
        match reconcile(&mapping, &batch, &opts()).unwrap_err() {
            SchemaError::NotNull { row, fields } => {
                assert_eq!(row, 0);
                assert_eq!(fields, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_within_batch() {
        let batch = vec![raw_record([("id", "1")]), raw_record([("id", "1")])];
        match reconcile(&unique_id(), &batch, &opts()).unwrap_err() {
            SchemaError::Duplicate { row, field, value } => {
                assert_eq!(row, 1);
                assert_eq!(field, "id");
                assert_eq!(value, Value::Integer(1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_against_seen_values() {
        let first = reconcile(&unique_id(), &[raw_record([("id", "1")])], &opts()).unwrap();
        let err = reconcile(&first.mapping, &[raw_record([("id", "1")])], &opts()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Duplicate);
        assert_eq!(err.row(), Some(0));
    }

    #[test]
    fn test_type_failure_wins_over_earlier_duplicate() {
        let batch = vec![
            raw_record([("id", "1")]),
            raw_record([("id", "1")]),
            raw_record([("id", "abc")]),
        ];
        let err = reconcile(&unique_id(), &batch, &opts()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NonUniformType);
    }

    #[test]
    fn test_elided_unique_field_not_tracked() {
        let batch = vec![raw_record([("id", "-")]), raw_record([("id", "")])];
        let out = reconcile(&unique_id(), &batch, &opts()).unwrap();
        assert!(out.records.iter().all(|r| r.is_empty()));
    }

    #[test]
    fn test_datetime_rendering_follows_options() {
        let batch = vec![raw_record([("d", "2024-01-02")])];
        let out = reconcile(&ConstraintMapping::new(), &batch, &NormalizeOptions::new(true)).unwrap();
        assert_eq!(out.records[0]["d"], Value::from("2024-01-02T00:00:00"));
        assert_eq!(out.mapping.field_type("d"), DataType::DateTime);
    }
}
