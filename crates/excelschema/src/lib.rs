//! Schema inference and validation for spreadsheet records
//!
//! # How a batch is handled
//!
//! 1. **Normalize**: every raw cell becomes a typed value (or is elided)
//! 2. **Reconcile**: each value's type is checked against the field's
//!    recorded type. Unknown fields take the first concrete type they see.
//! 3. **Validate**: required fields must be present, unique fields must not
//!    repeat a value
//! 4. **Commit or discard**: a trial run reports what would happen and keeps
//!    nothing. A commit keeps the schema effects and the records.
//!
//! A batch is all or nothing. The only implicit coercion is a number landing
//! in a string field, which is kept as its text.
//!
//! # Modules
//!
//! - [`normalize`]: raw cell to typed value, including flexible date parsing
//! - [`constraint`]: per-field constraints and the running constraint mapping
//! - [`reconcile`]: the batch algorithm as a pure function
//! - [`engine`]: the stateful engine with trial/commit ingestion
//! - [`record`]: record shapes and conversions
//! - [`config`]: serializable engine options

pub mod config;
pub mod constraint;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod reconcile;
pub mod record;
pub mod types;

pub use config::EngineConfig;
pub use constraint::{Constraint, ConstraintMapping, FieldDecl, SchemaDecl, SchemaView};
pub use engine::{SchemaEngine, SchemaEngineBuilder};
pub use error::{ErrorKind, SchemaError, SchemaResult, UnknownDataType};
pub use normalize::{normalize, normalize_record, type_of, NormalizeOptions};
pub use reconcile::{reconcile, Reconciled};
pub use record::{jsonify, raw_record, records_from_array, RawRecord, Record};
pub use types::{Cell, DataType, Value};
