//! Schema engine
//!
//! [`SchemaEngine`] owns one [`ConstraintMapping`] and the list of committed
//! records. Every batch goes through [`reconcile`]; the engine only decides
//! whether to keep the outcome.
//!
//! # Example
//!
//! ```
//! use excelschema::{raw_record, Constraint, DataType, SchemaDecl, SchemaEngine, Value};
//!
//! let mut engine = SchemaEngine::builder()
//!     .schema(SchemaDecl::new().field("id", Constraint::typed(DataType::Integer).with_unique()))
//!     .build()
//!     .unwrap();
//!
//! let rows = engine
//!     .ingest(&[raw_record([("id", "1"), ("name", "Alice")])], true)
//!     .unwrap();
//! assert_eq!(rows[0]["id"], Value::Integer(1));
//! assert_eq!(engine.schema()["name"].data_type, DataType::String);
//! ```

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::constraint::{ConstraintMapping, SchemaDecl, SchemaView};
use crate::error::{SchemaError, SchemaResult};
use crate::normalize::NormalizeOptions;
use crate::reconcile::{reconcile, Reconciled};
use crate::record::{records_from_array, to_raw, RawRecord, Record};
use crate::types::Cell;

/// Incremental schema inference and validation over batches of records.
#[derive(Debug, Clone, Default)]
pub struct SchemaEngine {
    options: NormalizeOptions,
    mapping: ConstraintMapping,
    records: Vec<Record>,
}

impl SchemaEngine {
    /// Empty engine, datetimes kept as datetime values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> SchemaEngineBuilder {
        SchemaEngineBuilder::default()
    }

    /// Validate and normalize a batch.
    ///
    /// With `commit` the batch's schema effects are kept and its records
    /// appended to [`records`](Self::records). Without it the engine is left
    /// exactly as it was. Either way the normalized records are returned in
    /// input order.
    ///
    /// A failing batch changes nothing, whatever `commit` says.
    pub fn ingest(&mut self, batch: &[RawRecord], commit: bool) -> SchemaResult<Vec<Record>> {
        let Reconciled { mapping, records } = reconcile(&self.mapping, batch, &self.options)
            .map_err(|e| {
                warn!(rows = batch.len(), commit, error = %e, "Batch rejected");
                e
            })?;

        if commit {
            self.mapping = mapping;
            self.records.extend(records.iter().cloned());
            info!(
                rows = records.len(),
                total = self.records.len(),
                "Committed batch"
            );
        } else {
            debug!(rows = records.len(), "Trial batch passed");
        }

        Ok(records)
    }

    /// [`ingest`](Self::ingest) for a single record.
    pub fn ingest_one(&mut self, record: RawRecord, commit: bool) -> SchemaResult<Record> {
        self.ingest(std::slice::from_ref(&record), commit)?
            .pop()
            .ok_or_else(|| SchemaError::invalid_argument("record produced no output"))
    }

    /// Snapshot of the current constraints, ordered by field name
    pub fn schema(&self) -> SchemaView {
        self.mapping.view()
    }

    /// The underlying constraint mapping
    pub fn constraints(&self) -> &ConstraintMapping {
        &self.mapping
    }

    /// Records committed so far
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn as_datetime_str(&self) -> bool {
        self.options.as_datetime_str
    }

    /// Merge a declaration into the current constraints.
    ///
    /// Committed records are validated again against the merged constraints.
    /// On any failure (`TypeConflict` or a data error from an existing
    /// record) the engine is unchanged.
    pub fn update_schema(&mut self, decl: &SchemaDecl) -> SchemaResult<()> {
        let mut candidate = self.mapping.clone();
        candidate.update(decl)?;
        self.revalidate(candidate)
    }

    /// Replace all constraint state with a fresh declaration.
    ///
    /// Type and uniqueness history is dropped; committed records are kept
    /// and validated again, re-inferring types for undeclared fields.
    pub fn set_schema(&mut self, decl: &SchemaDecl) -> SchemaResult<()> {
        let candidate = ConstraintMapping::from_decl(decl)?;
        self.revalidate(candidate)
    }

    /// Run every committed record through `candidate` and adopt the result.
    fn revalidate(&mut self, mut candidate: ConstraintMapping) -> SchemaResult<()> {
        if self.records.is_empty() {
            self.mapping = candidate;
            return Ok(());
        }

        candidate.clear_seen();
        let raw: Vec<RawRecord> = self.records.iter().map(to_raw).collect();
        let Reconciled { mapping, records } = reconcile(&candidate, &raw, &self.options)
            .map_err(|e| {
                warn!(rows = raw.len(), error = %e, "Committed records rejected by new schema");
                e
            })?;

        info!(rows = records.len(), "Revalidated committed records");
        self.mapping = mapping;
        self.records = records;
        Ok(())
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`SchemaEngine`].
#[derive(Debug, Clone, Default)]
pub struct SchemaEngineBuilder {
    as_datetime_str: bool,
    schema: Option<SchemaDecl>,
    records: Option<Vec<RawRecord>>,
    array: Option<Vec<Vec<Cell>>>,
}

impl SchemaEngineBuilder {
    /// Emit datetimes as ISO-8601 strings
    pub fn as_datetime_str(mut self, enabled: bool) -> Self {
        self.as_datetime_str = enabled;
        self
    }

    /// Initial schema
    pub fn schema(mut self, decl: SchemaDecl) -> Self {
        self.schema = Some(decl);
        self
    }

    /// Initial records, committed on build
    pub fn records(mut self, records: Vec<RawRecord>) -> Self {
        self.records = Some(records);
        self
    }

    /// Initial 2-D data whose first row is the header, committed on build
    pub fn array(mut self, array: Vec<Vec<Cell>>) -> Self {
        self.array = Some(array);
        self
    }

    /// Apply a loaded configuration. A schema in the config replaces any
    /// schema set earlier on the builder.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.as_datetime_str = config.as_datetime_str;
        if let Some(schema) = config.schema {
            self.schema = Some(schema);
        }
        self
    }

    /// Build the engine, committing any initial data.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if both records and an array were given, or the
    ///   array header is missing, blank or repeated
    /// - `TypeConflict` from the schema declaration
    /// - any data error from the initial records
    pub fn build(self) -> SchemaResult<SchemaEngine> {
        let initial = match (self.records, self.array) {
            (Some(_), Some(_)) => {
                return Err(SchemaError::invalid_argument(
                    "records and array are mutually exclusive",
                ))
            }
            (Some(records), None) => records,
            (None, Some(array)) => records_from_array(array)?,
            (None, None) => Vec::new(),
        };

        let mapping = match &self.schema {
            Some(decl) => ConstraintMapping::from_decl(decl)?,
            None => ConstraintMapping::new(),
        };

        let mut engine = SchemaEngine {
            options: NormalizeOptions::new(self.as_datetime_str),
            mapping,
            records: Vec::new(),
        };

        if !initial.is_empty() {
            engine.ingest(&initial, true)?;
        }

        debug!(
            fields = engine.mapping.view().len(),
            rows = engine.records.len(),
            "Schema engine ready"
        );
        Ok(engine)
    }
}
