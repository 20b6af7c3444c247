//! Constraint model
//!
//! A field's schema is three independent facts, each kept in its own
//! structure inside [`ConstraintMapping`]:
//!
//! - its type (`Any` until the first concrete type is seen)
//! - whether it is unique (the set of values seen so far)
//! - whether it is required (not-null)
//!
//! Each structure has its own merge rule, and [`ConstraintMapping::view`]
//! stitches them back into one [`Constraint`] per field.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::ops::Index;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, SchemaResult};
use crate::types::{DataType, Value};

// ============================================================================
// Constraint declarations
// ============================================================================

/// Per-field rule set: type, uniqueness, required-presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Constraint {
    #[serde(rename = "type", default)]
    pub data_type: DataType,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub not_null: bool,
}

impl Constraint {
    pub fn new(data_type: DataType, unique: bool, not_null: bool) -> Self {
        Self {
            data_type,
            unique,
            not_null,
        }
    }

    /// A constraint that only fixes the type
    pub fn typed(data_type: DataType) -> Self {
        Self::new(data_type, false, false)
    }

    /// A constraint with no type, not unique, nullable
    pub fn any() -> Self {
        Self::default()
    }

    /// Mark the field unique
    pub fn with_unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Mark the field required
    pub fn with_not_null(mut self) -> Self {
        self.not_null = true;
        self
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.data_type)?;
        if self.unique {
            write!(f, " unique")?;
        }
        if self.not_null {
            write!(f, " not_null")?;
        }
        Ok(())
    }
}

/// One entry of a schema declaration: a bare type or a full constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldDecl {
    Type(DataType),
    Constraint(Constraint),
}

impl FieldDecl {
    pub fn constraint(&self) -> Constraint {
        match self {
            FieldDecl::Type(data_type) => Constraint::typed(*data_type),
            FieldDecl::Constraint(c) => *c,
        }
    }
}

impl From<DataType> for FieldDecl {
    fn from(data_type: DataType) -> Self {
        FieldDecl::Type(data_type)
    }
}

impl From<Constraint> for FieldDecl {
    fn from(c: Constraint) -> Self {
        FieldDecl::Constraint(c)
    }
}

/// A caller-supplied schema: `{field: type | constraint}`, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaDecl(IndexMap<String, FieldDecl>);

impl SchemaDecl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a field declaration
    pub fn field(mut self, name: impl Into<String>, decl: impl Into<FieldDecl>) -> Self {
        self.0.insert(name.into(), decl.into());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldDecl)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, D> FromIterator<(K, D)> for SchemaDecl
where
    K: Into<String>,
    D: Into<FieldDecl>,
{
    fn from_iter<I: IntoIterator<Item = (K, D)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, d)| (k.into(), d.into()))
                .collect(),
        )
    }
}

// ============================================================================
// Constraint mapping
// ============================================================================

/// The running schema of one engine.
///
/// Cloning a mapping takes a full snapshot, including the uniqueness sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintMapping {
    /// Field -> recorded type (`Any` until a concrete type is seen)
    types: BTreeMap<String, DataType>,
    /// Field -> values seen so far; presence of the key means "unique"
    seen: BTreeMap<String, HashSet<Value>>,
    /// Fields that must be present in every record
    not_null: BTreeSet<String>,
}

impl ConstraintMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mapping from a declaration.
    pub fn from_decl(decl: &SchemaDecl) -> SchemaResult<Self> {
        let mut mapping = Self::new();
        mapping.update(decl)?;
        Ok(mapping)
    }

    /// Merge a declaration into this mapping.
    ///
    /// Idempotent. Fails with `TypeConflict` if a field is declared with a
    /// concrete type different from the concrete type already recorded; in
    /// that case nothing is changed. Uniqueness and not-null only ever get
    /// switched on.
    pub fn update(&mut self, decl: &SchemaDecl) -> SchemaResult<()> {
        for (field, entry) in decl.iter() {
            let declared = entry.constraint().data_type;
            let existing = self.field_type(field);
            if !declared.is_wildcard() && !existing.is_wildcard() && declared != existing {
                return Err(SchemaError::TypeConflict {
                    field: field.to_string(),
                    declared,
                    existing,
                });
            }
        }

        for (field, entry) in decl.iter() {
            let c = entry.constraint();
            self.observe_type(field, c.data_type);
            if c.unique {
                self.seen.entry(field.to_string()).or_default();
            }
            if c.not_null {
                self.not_null.insert(field.to_string());
            }
        }

        Ok(())
    }

    /// Recorded type for a field (`Any` if nothing is known)
    pub fn field_type(&self, field: &str) -> DataType {
        self.types.get(field).copied().unwrap_or_default()
    }

    /// Record an inferred type. A concrete type already recorded is kept.
    pub fn observe_type(&mut self, field: &str, data_type: DataType) {
        let recorded = self.types.entry(field.to_string()).or_default();
        if recorded.is_wildcard() {
            *recorded = data_type;
        }
    }

    pub fn is_unique(&self, field: &str) -> bool {
        self.seen.contains_key(field)
    }

    /// Fields tracked for uniqueness
    pub fn unique_fields(&self) -> impl Iterator<Item = &str> {
        self.seen.keys().map(|k| k.as_str())
    }

    pub fn is_seen(&self, field: &str, value: &Value) -> bool {
        self.seen
            .get(field)
            .map(|values| values.contains(value))
            .unwrap_or(false)
    }

    /// Add a value to a unique field's set.
    ///
    /// Returns false if the value was already present. Fields that are not
    /// unique are ignored (and report true).
    pub fn track_value(&mut self, field: &str, value: Value) -> bool {
        match self.seen.get_mut(field) {
            Some(values) => values.insert(value),
            None => true,
        }
    }

    /// Forget seen values but keep which fields are unique.
    pub fn clear_seen(&mut self) {
        for values in self.seen.values_mut() {
            values.clear();
        }
    }

    /// Required fields, sorted by name
    pub fn not_null_fields(&self) -> &BTreeSet<String> {
        &self.not_null
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.seen.is_empty() && self.not_null.is_empty()
    }

    /// Externally visible `{field: Constraint}` snapshot.
    pub fn view(&self) -> SchemaView {
        let fields: BTreeSet<&String> = self
            .types
            .keys()
            .chain(self.seen.keys())
            .chain(self.not_null.iter())
            .collect();

        SchemaView(
            fields
                .into_iter()
                .map(|field| {
                    let constraint = Constraint::new(
                        self.field_type(field),
                        self.is_unique(field),
                        self.not_null.contains(field),
                    );
                    (field.clone(), constraint)
                })
                .collect(),
        )
    }
}

impl fmt::Display for ConstraintMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.view())
    }
}

// ============================================================================
// Schema view
// ============================================================================

/// Read-only `{field: Constraint}` picture of a mapping, ordered by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SchemaView(BTreeMap<String, Constraint>);

impl SchemaView {
    pub fn get(&self, field: &str) -> Option<&Constraint> {
        self.0.get(field)
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Constraint)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Index<&str> for SchemaView {
    type Output = Constraint;

    fn index(&self, field: &str) -> &Constraint {
        &self.0[field]
    }
}

impl fmt::Display for SchemaView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (field, constraint)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", field, constraint)?;
        }
        write!(f, "}}")
    }
}
