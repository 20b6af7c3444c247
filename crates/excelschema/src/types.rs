//! Type tags, raw cells and normalized values.
//!
//! Three layers:
//!
//! - [`Cell`] is what a spreadsheet reader hands us: loosely typed, often text.
//! - [`Value`] is what the normalizer produces: a canonical typed value.
//! - [`DataType`] is the closed set of type tags the schema stores per field,
//!   plus the `Any` wildcard for "no type observed yet".

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::UnknownDataType;
use crate::normalize::datetime::{format_naive, format_offset};

// ============================================================================
// Data Types
// ============================================================================

/// Type tag recorded per field in the schema.
///
/// The normalizer only ever produces the concrete variants; `Any` is the
/// placeholder a field carries until its first concrete value is seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum DataType {
    /// Wildcard - no type observed yet
    #[default]
    Any,
    /// 64-bit signed integer
    Integer,
    /// 64-bit floating point
    Float,
    /// UTF-8 string (after compatibility normalization)
    String,
    /// Boolean
    Boolean,
    /// Date and time (date-only values are promoted to midnight)
    DateTime,
}

impl DataType {
    /// Returns all concrete data types
    pub fn all() -> Vec<DataType> {
        vec![
            DataType::Integer,
            DataType::Float,
            DataType::String,
            DataType::Boolean,
            DataType::DateTime,
        ]
    }

    /// Returns true if this is the wildcard
    pub fn is_wildcard(&self) -> bool {
        matches!(self, DataType::Any)
    }

    /// Returns true if this type is numeric
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Integer | DataType::Float)
    }

    /// Returns true if a value inferred as `inferred` satisfies this type as-is.
    pub fn accepts(&self, inferred: DataType) -> bool {
        self.is_wildcard() || *self == inferred
    }

    /// Returns true if a value inferred as `inferred` may be coerced into this type.
    ///
    /// The only widening is numeric into string. A numeric field never
    /// accepts text.
    pub fn widens_from(&self, inferred: DataType) -> bool {
        matches!(self, DataType::String) && inferred.is_numeric()
    }

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Any => "any",
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::String => "string",
            DataType::Boolean => "boolean",
            DataType::DateTime => "datetime",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = UnknownDataType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dt = match s.trim().to_ascii_lowercase().as_str() {
            "any" | "*" => DataType::Any,
            "int" | "integer" | "int64" => DataType::Integer,
            "float" | "float64" | "double" => DataType::Float,
            "str" | "string" | "text" | "utf8" => DataType::String,
            "bool" | "boolean" => DataType::Boolean,
            "datetime" | "timestamp" | "date" => DataType::DateTime,
            _ => return Err(UnknownDataType(s.to_string())),
        };
        Ok(dt)
    }
}

impl Serialize for DataType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DataType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DataType::from_str(&raw).map_err(de::Error::custom)
    }
}

// ============================================================================
// Raw Cells
// ============================================================================

/// A raw spreadsheet cell, before normalization.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "serde_json::Value")]
pub enum Cell {
    /// Blank cell
    #[default]
    Empty,
    /// Text as typed into the sheet
    Text(String),
    /// Integer cell
    Integer(i64),
    /// Floating point cell
    Float(f64),
    /// Boolean cell
    Boolean(bool),
    /// Date cell without a time component
    Date(NaiveDate),
    /// Date and time cell
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Render this cell as a header (column name).
    ///
    /// Returns `None` for blank cells and text that is only whitespace.
    pub fn as_header(&self) -> Option<String> {
        let name = match self {
            Cell::Empty => return None,
            Cell::Text(s) => s.trim().to_string(),
            Cell::Integer(n) => n.to_string(),
            Cell::Float(f) => format_float(*f),
            Cell::Boolean(b) => b.to_string(),
            Cell::Date(d) => d.to_string(),
            Cell::DateTime(dt) => format_naive(dt),
        };
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Integer(n)
    }
}

impl From<i32> for Cell {
    fn from(n: i32) -> Self {
        Cell::Integer(i64::from(n))
    }
}

impl From<f64> for Cell {
    fn from(f: f64) -> Self {
        Cell::Float(f)
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Boolean(b)
    }
}

impl From<NaiveDate> for Cell {
    fn from(d: NaiveDate) -> Self {
        Cell::Date(d)
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(dt: NaiveDateTime) -> Self {
        Cell::DateTime(dt)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Empty)
    }
}

impl From<serde_json::Value> for Cell {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Cell::Empty,
            serde_json::Value::Bool(b) => Cell::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Integer(i),
                None => n.as_f64().map(Cell::Float).unwrap_or(Cell::Empty),
            },
            serde_json::Value::String(s) => Cell::Text(s),
            other => Cell::Text(other.to_string()),
        }
    }
}

// ============================================================================
// Normalized Values
// ============================================================================

/// A normalized, typed cell value.
///
/// Values are hashable so unique fields can track what they have seen.
/// Floats compare by bit pattern.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    /// Datetime without an offset
    DateTime(NaiveDateTime),
    /// Datetime that carried an explicit UTC offset
    DateTimeTz(DateTime<FixedOffset>),
}

impl Value {
    /// Type tag of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Integer(_) => DataType::Integer,
            Value::Float(_) => DataType::Float,
            Value::String(_) => DataType::String,
            Value::Boolean(_) => DataType::Boolean,
            Value::DateTime(_) | Value::DateTimeTz(_) => DataType::DateTime,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// String form used when a numeric value is widened into a string field.
    pub fn to_widened_string(&self) -> String {
        match self {
            Value::Float(f) => format_float(*f),
            other => other.to_string(),
        }
    }

    /// Convert back into a raw cell that normalizes to an equal value.
    pub fn to_cell(&self) -> Cell {
        match self {
            Value::Integer(n) => Cell::Integer(*n),
            Value::Float(f) => Cell::Float(*f),
            Value::String(s) => Cell::Text(s.clone()),
            Value::Boolean(b) => Cell::Boolean(*b),
            Value::DateTime(dt) => Cell::DateTime(*dt),
            Value::DateTimeTz(dt) => Cell::Text(format_offset(dt)),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::DateTimeTz(a), Value::DateTimeTz(b)) => {
                a == b && a.offset() == b.offset()
            }
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Integer(n) => n.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Boolean(b) => b.hash(state),
            Value::DateTime(dt) => dt.hash(state),
            Value::DateTimeTz(dt) => {
                dt.naive_utc().hash(state);
                dt.offset().local_minus_utc().hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => f.write_str(s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::DateTime(dt) => f.write_str(&format_naive(dt)),
            Value::DateTimeTz(dt) => f.write_str(&format_offset(dt)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Integer(n) => serializer.serialize_i64(*n),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::DateTime(dt) => serializer.serialize_str(&format_naive(dt)),
            Value::DateTimeTz(dt) => serializer.serialize_str(&format_offset(dt)),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

/// Render a float the way spreadsheet users expect to read it back.
///
/// Positional notation with at least one fractional digit (`5.0`) for
/// decimal exponents in `-4..16`, otherwise scientific notation with a
/// signed two-digit exponent (`1e+20`, `1.5e-07`).
pub(crate) fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{:e}", f);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if (-4..16).contains(&exponent) {
        let plain = format!("{}", f);
        if plain.contains('.') {
            plain
        } else {
            format!("{}.0", plain)
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_datatype_all_is_concrete() {
        let all = DataType::all();
        assert!(all.contains(&DataType::Integer));
        assert!(all.contains(&DataType::DateTime));
        assert!(!all.contains(&DataType::Any));
    }

    #[test]
    fn test_wildcard_accepts_everything() {
        for dt in DataType::all() {
            assert!(DataType::Any.accepts(dt));
        }
        assert!(DataType::Integer.accepts(DataType::Integer));
        assert!(!DataType::Integer.accepts(DataType::Float));
    }

    #[test]
    fn test_widening_is_one_directional() {
        assert!(DataType::String.widens_from(DataType::Integer));
        assert!(DataType::String.widens_from(DataType::Float));
        assert!(!DataType::String.widens_from(DataType::DateTime));
        assert!(!DataType::Integer.widens_from(DataType::String));
        assert!(!DataType::Float.widens_from(DataType::Integer));
        assert!(!DataType::Any.widens_from(DataType::Integer));
    }

    #[test]
    fn test_datatype_aliases() {
        assert_eq!("int".parse::<DataType>().unwrap(), DataType::Integer);
        assert_eq!("STR".parse::<DataType>().unwrap(), DataType::String);
        assert_eq!("timestamp".parse::<DataType>().unwrap(), DataType::DateTime);
        assert!("decimal".parse::<DataType>().is_err());
    }

    #[test]
    fn test_datatype_serde_roundtrip() {
        let json = serde_json::to_string(&DataType::Float).unwrap();
        assert_eq!(json, "\"float\"");
        let back: DataType = serde_json::from_str("\"bool\"").unwrap();
        assert_eq!(back, DataType::Boolean);
    }

    #[test]
    fn test_cell_from_json() {
        assert_eq!(Cell::from(serde_json::json!(null)), Cell::Empty);
        assert_eq!(Cell::from(serde_json::json!(7)), Cell::Integer(7));
        assert_eq!(Cell::from(serde_json::json!(1.5)), Cell::Float(1.5));
        assert_eq!(Cell::from(serde_json::json!("x")), Cell::Text("x".into()));
    }

    #[test]
    fn test_header_rendering() {
        assert_eq!(Cell::from("  id ").as_header().as_deref(), Some("id"));
        assert_eq!(Cell::from(2024).as_header().as_deref(), Some("2024"));
        assert_eq!(Cell::from("   ").as_header(), None);
        assert_eq!(Cell::Empty.as_header(), None);
    }

    #[test]
    fn test_float_values_hash_by_bits() {
        let mut seen = HashSet::new();
        assert!(seen.insert(Value::Float(1.5)));
        assert!(!seen.insert(Value::Float(1.5)));
        assert!(seen.insert(Value::Integer(1)));
        assert!(seen.insert(Value::String("1".into())));
    }

    #[test]
    fn test_widened_string_forms() {
        assert_eq!(Value::Integer(42).to_widened_string(), "42");
        assert_eq!(Value::Float(5.0).to_widened_string(), "5.0");
        assert_eq!(Value::Float(5.25).to_widened_string(), "5.25");
    }

    #[test]
    fn test_float_rendering_switches_to_exponent() {
        assert_eq!(format_float(1e20), "1e+20");
        assert_eq!(format_float(1e-7), "1e-07");
        assert_eq!(format_float(-1.5e300), "-1.5e+300");
        assert_eq!(format_float(1e16), "1e+16");
        assert_eq!(format_float(1234567890123456.0), "1234567890123456.0");
        assert_eq!(format_float(0.0001), "0.0001");
        assert_eq!(format_float(0.0), "0.0");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }

    #[test]
    fn test_value_serializes_datetime_as_iso() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let json = serde_json::to_string(&Value::DateTime(dt)).unwrap();
        assert_eq!(json, "\"2024-01-02T00:00:00\"");
    }
}
