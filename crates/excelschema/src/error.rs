//! Errors raised by schema declaration and batch ingestion.
//!
//! Three families:
//!
//! - `InvalidArgument`: caller bug (bad construction arguments, empty batch),
//!   rejected before any value is normalized.
//! - `TypeConflict`: a declared schema contradicts itself or earlier inference.
//! - `NonUniformType`, `NotNull`, `Duplicate`: the data does not fit the
//!   schema. The batch is aborted as a whole and the schema is left as it was.

use thiserror::Error;

use crate::constraint::SchemaView;
use crate::types::{DataType, Value};

/// Errors that can occur while declaring a schema or ingesting records.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Type conflict on '{field}': declared {declared}, but schema already has {existing}")]
    TypeConflict {
        field: String,
        declared: DataType,
        existing: DataType,
    },

    #[error("Row {row}: {found} for '{field}' not in table schema (expected {expected}) {schema}")]
    NonUniformType {
        row: usize,
        field: String,
        found: DataType,
        expected: DataType,
        schema: SchemaView,
    },

    #[error("Row {row}: {} is null", .fields.join(", "))]
    NotNull { row: usize, fields: Vec<String> },

    #[error("Row {row}: duplicate {value} for '{field}' exists")]
    Duplicate {
        row: usize,
        field: String,
        value: Value,
    },
}

/// Fieldless discriminant of [`SchemaError`], for matching in callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    TypeConflict,
    NonUniformType,
    NotNull,
    Duplicate,
}

impl SchemaError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        SchemaError::InvalidArgument(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SchemaError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            SchemaError::TypeConflict { .. } => ErrorKind::TypeConflict,
            SchemaError::NonUniformType { .. } => ErrorKind::NonUniformType,
            SchemaError::NotNull { .. } => ErrorKind::NotNull,
            SchemaError::Duplicate { .. } => ErrorKind::Duplicate,
        }
    }

    /// True for failures caused by the records rather than by the caller.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NonUniformType | ErrorKind::NotNull | ErrorKind::Duplicate
        )
    }

    /// Index of the offending record within its batch, for data errors.
    pub fn row(&self) -> Option<usize> {
        match self {
            SchemaError::NonUniformType { row, .. }
            | SchemaError::NotNull { row, .. }
            | SchemaError::Duplicate { row, .. } => Some(*row),
            _ => None,
        }
    }
}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// A type name that does not map to any [`DataType`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown data type '{0}'")]
pub struct UnknownDataType(pub String);
