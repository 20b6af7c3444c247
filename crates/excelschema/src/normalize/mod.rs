//! Value normalization
//!
//! Turns one raw [`Cell`] into a canonical [`Value`], or elides it.
//!
//! Text is NFKD-normalized and trimmed, then interpreted:
//!
//! | Cleaned text            | Result                        |
//! |-------------------------|-------------------------------|
//! | only decimal digits     | `Integer`                     |
//! | digits with one `.`     | `Float`                       |
//! | `""` or `"-"`           | elided (field dropped)        |
//! | parses as a date/time   | `DateTime` (dates at midnight)|
//! | anything else           | `String`                      |
//!
//! Normalization never fails; text that fits nothing stays text.

pub mod datetime;

use unicode_normalization::UnicodeNormalization;

use crate::record::{RawRecord, Record};
use crate::types::{Cell, DataType, Value};

/// Placeholder text that marks a cell as intentionally blank
const BLANK_MARKERS: &[&str] = &["", "-"];

/// Options that change how normalized values are rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Emit datetimes as ISO-8601 strings instead of datetime values
    pub as_datetime_str: bool,
}

impl NormalizeOptions {
    pub fn new(as_datetime_str: bool) -> Self {
        Self { as_datetime_str }
    }
}

/// Apply Unicode compatibility decomposition and strip surrounding whitespace.
pub fn clean_text(raw: &str) -> String {
    let normalized: String = raw.nfkd().collect();
    normalized.trim().to_string()
}

/// Interpret a cell without the final datetime rendering.
///
/// This is the value whose type is recorded in the schema. Returns `None`
/// when the cell is elided.
pub fn interpret(cell: &Cell) -> Option<Value> {
    match cell {
        Cell::Empty => None,
        Cell::Text(raw) => interpret_text(raw),
        Cell::Integer(n) => Some(Value::Integer(*n)),
        Cell::Float(f) => Some(Value::Float(*f)),
        Cell::Boolean(b) => Some(Value::Boolean(*b)),
        Cell::Date(d) => d.and_hms_opt(0, 0, 0).map(Value::DateTime),
        Cell::DateTime(dt) => Some(Value::DateTime(*dt)),
    }
}

fn interpret_text(raw: &str) -> Option<Value> {
    let text = clean_text(raw);

    if let Some(number) = ascii_number(&text) {
        if !number.contains('.') {
            // Digit runs too long for i64 stay text
            return Some(match number.parse::<i64>() {
                Ok(n) => Value::Integer(n),
                Err(_) => Value::String(text),
            });
        }
        if looks_like_decimal(&number) {
            if let Ok(f) = number.parse::<f64>() {
                return Some(Value::Float(f));
            }
        }
    }

    if BLANK_MARKERS.contains(&text.as_str()) {
        return None;
    }

    Some(datetime::parse_datetime(&text).unwrap_or(Value::String(text)))
}

/// First code point of each BMP run of Unicode decimal digits (`Nd`) that
/// NFKD leaves alone. Fullwidth and mathematical digits fold to ASCII.
const DIGIT_ZEROS: &[u32] = &[
    0x0660, 0x06F0, 0x07C0, 0x0966, 0x09E6, 0x0A66, 0x0AE6, 0x0B66, 0x0BE6, 0x0C66, 0x0CE6,
    0x0D66, 0x0DE6, 0x0E50, 0x0ED0, 0x0F20, 0x1040, 0x1090, 0x17E0, 0x1810, 0x1946, 0x19D0,
    0x1A80, 0x1A90, 0x1B50, 0x1BB0, 0x1C40, 0x1C50, 0xA620, 0xA8D0, 0xA900, 0xA9D0, 0xA9F0,
    0xAA50, 0xABF0,
];

fn decimal_digit(c: char) -> Option<u32> {
    if let Some(d) = c.to_digit(10) {
        return Some(d);
    }
    let cp = c as u32;
    DIGIT_ZEROS
        .iter()
        .find(|&&zero| (zero..zero + 10).contains(&cp))
        .map(|zero| cp - zero)
}

/// Text made only of decimal digits and dots, rewritten with ASCII digits.
fn ascii_number(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    text.chars()
        .map(|c| match c {
            '.' => Some('.'),
            _ => decimal_digit(c).and_then(|d| char::from_digit(d, 10)),
        })
        .collect()
}

/// Exactly one decimal point, every other character a digit, at least one digit.
fn looks_like_decimal(text: &str) -> bool {
    let mut dots = 0;
    let mut digits = 0;
    for b in text.bytes() {
        match b {
            b'.' => dots += 1,
            b'0'..=b'9' => digits += 1,
            _ => return false,
        }
    }
    dots == 1 && digits > 0
}

/// Type tag of a cell after normalization, or `None` if it is elided.
///
/// Computed before datetime rendering: a datetime emitted as an ISO string
/// still has type [`DataType::DateTime`].
pub fn type_of(cell: &Cell) -> Option<DataType> {
    interpret(cell).map(|v| v.data_type())
}

/// Normalize a single cell into its final value, or `None` if it is elided.
pub fn normalize(cell: &Cell, options: &NormalizeOptions) -> Option<Value> {
    interpret(cell).map(|v| datetime::round_trip(v, options.as_datetime_str))
}

/// Normalize a whole record, keeping field order and dropping elided fields.
pub fn normalize_record(record: &RawRecord, options: &NormalizeOptions) -> Record {
    record
        .iter()
        .filter_map(|(field, cell)| normalize(cell, options).map(|v| (field.clone(), v)))
        .collect()
}
