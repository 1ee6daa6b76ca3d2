//! Owned column values and their canonical text forms.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Text pattern used for dates in both CSV and SQL output.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Text pattern for times; the fraction is omitted when zero.
pub const TIME_FORMAT: &str = "%H:%M:%S%.f";
/// Text pattern for timestamps; the fraction is omitted when zero.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A single column value. `Null` is distinct from an empty string or an
/// empty byte sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Short(i16),
    Int(i32),
    Long(i64),
    Double(f64),
    Decimal(Decimal),
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short label for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Double(_) => "double",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Timestamp(_) => "timestamp",
            Value::Bytes(_) => "bytes",
        }
    }

    /// Canonical text for scalar values; `None` for null and bytes.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null | Value::Bytes(_) => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Short(v) => Some(v.to_string()),
            Value::Int(v) => Some(v.to_string()),
            Value::Long(v) => Some(v.to_string()),
            Value::Double(v) => Some(v.to_string()),
            Value::Decimal(v) => Some(v.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::Date(d) => Some(d.format(DATE_FORMAT).to_string()),
            Value::Time(t) => Some(t.format(TIME_FORMAT).to_string()),
            Value::Timestamp(ts) => Some(ts.format(TIMESTAMP_FORMAT).to_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Short(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Text → value parsers shared by every `Row` implementation that holds
/// text. Errors carry a message only; callers attach row/column position.
pub mod text {
    use std::str::FromStr;

    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
    use rust_decimal::Decimal;

    use super::{DATE_FORMAT, TIMESTAMP_FORMAT, TIME_FORMAT};

    pub type ParseResult<T> = std::result::Result<T, String>;

    /// Accepts `0`, `1`, `true`, `false` (case-insensitive).
    pub fn parse_bool(s: &str) -> ParseResult<bool> {
        let t = s.trim();
        if t == "1" || t.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if t == "0" || t.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            Err(format!("invalid boolean literal '{}'", s))
        }
    }

    pub fn parse_number<T: FromStr>(s: &str, what: &str) -> ParseResult<T> {
        s.trim()
            .parse::<T>()
            .map_err(|_| format!("invalid {} literal '{}'", what, s))
    }

    pub fn parse_decimal(s: &str) -> ParseResult<Decimal> {
        let t = s.trim();
        Decimal::from_str(t)
            .or_else(|_| Decimal::from_scientific(t))
            .map_err(|_| format!("invalid decimal literal '{}'", s))
    }

    /// An optionally signed run of digits read as milliseconds since the
    /// Unix epoch, in UTC.
    pub fn parse_epoch_millis(s: &str) -> Option<NaiveDateTime> {
        let t = s.trim();
        let digits = t.strip_prefix('-').unwrap_or(t);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let ms = t.parse::<i64>().ok()?;
        DateTime::<Utc>::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
    }

    pub fn parse_date(s: &str) -> ParseResult<NaiveDate> {
        if let Some(ts) = parse_epoch_millis(s) {
            return Ok(ts.date());
        }
        let t = s.trim();
        NaiveDate::parse_from_str(t, DATE_FORMAT)
            .or_else(|_| parse_iso_timestamp(t).map(|ts| ts.date()).ok_or(()))
            .map_err(|_| format!("invalid date literal '{}'", s))
    }

    pub fn parse_time(s: &str) -> ParseResult<NaiveTime> {
        if let Some(ts) = parse_epoch_millis(s) {
            return Ok(ts.time());
        }
        let t = s.trim();
        NaiveTime::parse_from_str(t, TIME_FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M:%S"))
            .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M"))
            .map_err(|_| format!("invalid time literal '{}'", s))
    }

    pub fn parse_timestamp(s: &str) -> ParseResult<NaiveDateTime> {
        if let Some(ts) = parse_epoch_millis(s) {
            return Ok(ts);
        }
        let t = s.trim();
        parse_iso_timestamp(t)
            .or_else(|| {
                NaiveDate::parse_from_str(t, DATE_FORMAT)
                    .ok()
                    .map(|d| d.and_time(NaiveTime::MIN))
            })
            .ok_or_else(|| format!("invalid timestamp literal '{}'", s))
    }

    fn parse_iso_timestamp(t: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(t, TIMESTAMP_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M:%S%.f"))
            .or_else(|_| NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S"))
            .or_else(|_| NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M:%S"))
            .ok()
    }

}
