//! Flexible date/time parsing and ISO-8601 rendering
//!
//! Cell text is tried against, in order:
//!
//! 1. Offset-aware timestamps (RFC 3339 / ISO-8601 with `Z` or `+HH:MM`, RFC 2822)
//! 2. A date followed by a time, split at a space or `T`
//! 3. A bare date (promoted to midnight)
//!
//! Numeric dates are month-first before day-first, so `05/06/2024` is May 6
//! while `31/05/2024` can only be May 31. Time-only text is left alone.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::types::Value;

/// Numeric date formats to try (month-first wins ties)
pub const DATE_FORMATS: &[DateFormatSpec] = &[
    // ISO formats
    DateFormatSpec {
        pattern: "%Y-%m-%d",
        separator: '-',
        year_position: 0,
        year_digits: 4,
    },
    DateFormatSpec {
        pattern: "%Y/%m/%d",
        separator: '/',
        year_position: 0,
        year_digits: 4,
    },
    DateFormatSpec {
        pattern: "%Y.%m.%d",
        separator: '.',
        year_position: 0,
        year_digits: 4,
    },
    // US formats (MM/DD/YYYY)
    DateFormatSpec {
        pattern: "%m/%d/%Y",
        separator: '/',
        year_position: 2,
        year_digits: 4,
    },
    DateFormatSpec {
        pattern: "%m-%d-%Y",
        separator: '-',
        year_position: 2,
        year_digits: 4,
    },
    DateFormatSpec {
        pattern: "%m.%d.%Y",
        separator: '.',
        year_position: 2,
        year_digits: 4,
    },
    // European formats (DD/MM/YYYY)
    DateFormatSpec {
        pattern: "%d/%m/%Y",
        separator: '/',
        year_position: 2,
        year_digits: 4,
    },
    DateFormatSpec {
        pattern: "%d-%m-%Y",
        separator: '-',
        year_position: 2,
        year_digits: 4,
    },
    DateFormatSpec {
        pattern: "%d.%m.%Y",
        separator: '.',
        year_position: 2,
        year_digits: 4,
    },
    // Short year formats
    DateFormatSpec {
        pattern: "%m/%d/%y",
        separator: '/',
        year_position: 2,
        year_digits: 2,
    },
    DateFormatSpec {
        pattern: "%m-%d-%y",
        separator: '-',
        year_position: 2,
        year_digits: 2,
    },
    DateFormatSpec {
        pattern: "%d/%m/%y",
        separator: '/',
        year_position: 2,
        year_digits: 2,
    },
    DateFormatSpec {
        pattern: "%d-%m-%y",
        separator: '-',
        year_position: 2,
        year_digits: 2,
    },
    DateFormatSpec {
        pattern: "%d.%m.%y",
        separator: '.',
        year_position: 2,
        year_digits: 2,
    },
];

/// Date formats spelling out the month (`%B` also accepts the abbreviation)
pub const TEXTUAL_DATE_FORMATS: &[&str] = &[
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%d %B, %Y",
    "%d-%B-%Y",
    "%Y-%B-%d",
];

/// Time-of-day formats accepted after a date
pub const TIME_FORMATS: &[&str] = &[
    "%H:%M:%S%.f",
    "%H:%M",
    "%I:%M:%S %p",
    "%I:%M %p",
    "%I:%M:%S%p",
    "%I:%M%p",
];

/// Offset-aware formats not covered by RFC 3339
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
];

/// ISO-8601 with a signed year, as rendered for years outside 0000..=9999
const EXTENDED_YEAR_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const EXTENDED_YEAR_OFFSET_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%:z";

/// Numeric date format specification
#[derive(Debug, Clone)]
pub struct DateFormatSpec {
    /// strftime pattern
    pub pattern: &'static str,
    /// Separator character
    pub separator: char,
    /// Position of the year component (0 or 2)
    pub year_position: usize,
    /// Number of year digits (2 or 4)
    pub year_digits: usize,
}

impl DateFormatSpec {
    /// Parse `value` with this format.
    ///
    /// chrono's `%Y` happily reads a two-digit year, so the width of the
    /// year component is checked before parsing.
    pub fn parse(&self, value: &str) -> Option<NaiveDate> {
        let parts: Vec<&str> = value.split(self.separator).collect();
        if parts.len() != 3 {
            return None;
        }
        if !parts.iter().all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit())) {
            return None;
        }
        if parts[self.year_position].len() != self.year_digits {
            return None;
        }
        NaiveDate::parse_from_str(value, self.pattern).ok()
    }
}

/// Parse cell text into a datetime value, if it looks like one.
pub fn parse_datetime(value: &str) -> Option<Value> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(dt) = parse_offset_datetime(trimmed) {
        return Some(Value::DateTimeTz(dt));
    }

    if let Some(value) = parse_extended_year(trimmed) {
        return Some(value);
    }

    parse_naive_datetime(trimmed).map(Value::DateTime)
}

/// `+10000-01-01T00:00:00`, `-0001-01-01T00:00:00+02:00`
fn parse_extended_year(value: &str) -> Option<Value> {
    let mut chars = value.chars();
    let signed = matches!(chars.next(), Some('+' | '-'));
    if !signed || !chars.next().is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_str(value, EXTENDED_YEAR_OFFSET_FORMAT) {
        return Some(Value::DateTimeTz(dt));
    }
    NaiveDateTime::parse_from_str(value, EXTENDED_YEAR_FORMAT)
        .ok()
        .map(Value::DateTime)
}

fn parse_offset_datetime(value: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }
    for pattern in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, pattern) {
            return Some(dt);
        }
    }
    // RFC 2822 needs a day-month-year body; anything shorter is not a timestamp
    if value.contains(':') {
        if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
            return Some(dt);
        }
    }
    None
}

fn parse_naive_datetime(value: &str) -> Option<NaiveDateTime> {
    if let Some(date) = parse_date(value) {
        return date.and_hms_opt(0, 0, 0);
    }

    // Try every split point: textual dates contain spaces themselves.
    for (idx, ch) in value.char_indices() {
        if ch != ' ' && ch != 'T' {
            continue;
        }
        let (date_part, rest) = value.split_at(idx);
        let time_part = rest[ch.len_utf8()..].trim();
        let date_part = date_part.trim();
        if date_part.is_empty() || time_part.is_empty() {
            continue;
        }
        if let (Some(date), Some(time)) = (parse_date(date_part), parse_time(time_part)) {
            return Some(date.and_time(time));
        }
    }

    None
}

/// Parse a date-only string.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    for format in DATE_FORMATS {
        if let Some(date) = format.parse(value) {
            return Some(date);
        }
    }
    if value.chars().any(|c| c.is_ascii_alphabetic()) {
        for pattern in TEXTUAL_DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(value, pattern) {
                return Some(date);
            }
        }
    }
    None
}

/// Parse a time-of-day string.
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|pattern| NaiveTime::parse_from_str(value, pattern).ok())
}

/// ISO-8601 rendering of a naive datetime.
///
/// Microseconds are appended only when non-zero: `2024-01-02T00:00:00`,
/// `2024-01-02T10:30:00.250000`.
pub fn format_naive(dt: &NaiveDateTime) -> String {
    let mut out = dt.format("%Y-%m-%dT%H:%M:%S").to_string();
    let micros = dt.nanosecond() / 1_000;
    if micros != 0 {
        out.push_str(&format!(".{:06}", micros));
    }
    out
}

/// ISO-8601 rendering of an offset-aware datetime (`+HH:MM` suffix).
pub fn format_offset(dt: &DateTime<FixedOffset>) -> String {
    let mut out = format_naive(&dt.naive_local());
    out.push_str(&dt.format("%:z").to_string());
    out
}

/// Render a datetime through its ISO-8601 form.
///
/// With `as_string` the ISO text is the result. Otherwise the text is parsed
/// back, which truncates to microsecond precision and canonicalizes the
/// offset. Non-datetime values are returned untouched.
pub fn round_trip(value: Value, as_string: bool) -> Value {
    let iso = match &value {
        Value::DateTime(dt) => format_naive(dt),
        Value::DateTimeTz(dt) => format_offset(dt),
        _ => return value,
    };
    if as_string {
        return Value::String(iso);
    }
    parse_datetime(&iso).unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_iso_date_promoted_to_midnight() {
        assert_eq!(
            parse_datetime("2024-01-02"),
            Some(Value::DateTime(ymd_hms(2024, 1, 2, 0, 0, 0)))
        );
    }

    #[test]
    fn test_month_first_wins_ties() {
        assert_eq!(
            parse_datetime("05/06/2024"),
            Some(Value::DateTime(ymd_hms(2024, 5, 6, 0, 0, 0)))
        );
    }

    #[test]
    fn test_day_first_when_month_impossible() {
        assert_eq!(
            parse_datetime("31/05/2024"),
            Some(Value::DateTime(ymd_hms(2024, 5, 31, 0, 0, 0)))
        );
        assert_eq!(
            parse_datetime("31.05.2024"),
            Some(Value::DateTime(ymd_hms(2024, 5, 31, 0, 0, 0)))
        );
    }

    #[test]
    fn test_short_year_not_read_as_four_digits() {
        assert_eq!(
            parse_datetime("05/06/24"),
            Some(Value::DateTime(ymd_hms(2024, 5, 6, 0, 0, 0)))
        );
    }

    #[test]
    fn test_date_and_time() {
        assert_eq!(
            parse_datetime("2024-01-02T10:30:15"),
            Some(Value::DateTime(ymd_hms(2024, 1, 2, 10, 30, 15)))
        );
        assert_eq!(
            parse_datetime("2024-01-02 10:30"),
            Some(Value::DateTime(ymd_hms(2024, 1, 2, 10, 30, 0)))
        );
        assert_eq!(
            parse_datetime("01/02/2024 3:04 PM"),
            Some(Value::DateTime(ymd_hms(2024, 1, 2, 15, 4, 0)))
        );
    }

    #[test]
    fn test_textual_month() {
        assert_eq!(
            parse_datetime("January 2, 2024"),
            Some(Value::DateTime(ymd_hms(2024, 1, 2, 0, 0, 0)))
        );
        assert_eq!(
            parse_datetime("2 Jan 2024"),
            Some(Value::DateTime(ymd_hms(2024, 1, 2, 0, 0, 0)))
        );
    }

    #[test]
    fn test_offset_timestamp() {
        let value = parse_datetime("2024-01-02T10:00:00+05:00").unwrap();
        match value {
            Value::DateTimeTz(dt) => {
                assert_eq!(format_offset(&dt), "2024-01-02T10:00:00+05:00");
            }
            other => panic!("expected offset datetime, got {:?}", other),
        }
        let zulu = parse_datetime("2024-01-02T10:00:00Z").unwrap();
        assert_eq!(zulu.to_string(), "2024-01-02T10:00:00+00:00");
    }

    #[test]
    fn test_not_dates() {
        assert_eq!(parse_datetime("Alice"), None);
        assert_eq!(parse_datetime("10:30"), None);
        assert_eq!(parse_datetime("13/13/2024"), None);
        assert_eq!(parse_datetime("2024-02-30"), None);
        assert_eq!(parse_datetime("N/A"), None);
    }

    #[test]
    fn test_format_naive_micros() {
        let dt = ymd_hms(2024, 1, 2, 10, 30, 0)
            .with_nanosecond(250_000_000)
            .unwrap();
        assert_eq!(format_naive(&dt), "2024-01-02T10:30:00.250000");
        assert_eq!(
            format_naive(&ymd_hms(2024, 1, 2, 0, 0, 0)),
            "2024-01-02T00:00:00"
        );
    }

    #[test]
    fn test_round_trip_truncates_to_micros() {
        let dt = ymd_hms(2024, 1, 2, 10, 30, 0)
            .with_nanosecond(123_456_789)
            .unwrap();
        let expected = dt.with_nanosecond(123_456_000).unwrap();
        assert_eq!(
            round_trip(Value::DateTime(dt), false),
            Value::DateTime(expected)
        );
        assert_eq!(
            round_trip(Value::DateTime(dt), true),
            Value::String("2024-01-02T10:30:00.123456".into())
        );
    }

    #[test]
    fn test_extended_year_reads_back() {
        let far = NaiveDate::from_ymd_opt(10000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let iso = format_naive(&far);
        assert_eq!(iso, "+10000-01-01T00:00:00");
        assert_eq!(parse_datetime(&iso), Some(Value::DateTime(far)));
        assert_eq!(round_trip(Value::DateTime(far), false), Value::DateTime(far));

        let bce = NaiveDate::from_ymd_opt(-1, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(parse_datetime(&format_naive(&bce)), Some(Value::DateTime(bce)));
    }

    #[test]
    fn test_signed_numbers_are_not_dates() {
        assert_eq!(parse_datetime("-5"), None);
        assert_eq!(parse_datetime("+2024"), None);
    }

    #[test]
    fn test_rfc2822_timestamp() {
        let value = parse_datetime("Tue, 2 Jan 2024 10:00:00 +0500").unwrap();
        assert_eq!(value.data_type(), crate::types::DataType::DateTime);
        assert_eq!(value.to_string(), "2024-01-02T10:00:00+05:00");
    }

    #[test]
    fn test_round_trip_ignores_other_values() {
        assert_eq!(round_trip(Value::Integer(3), true), Value::Integer(3));
    }
}
