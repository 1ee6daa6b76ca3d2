//! The row contract spoken between readers and writers.
//!
//! A `Row` is a transient view over one record. Columns are addressed by
//! 1-based ordinal. Every typed accessor returns `Ok(None)` for a null
//! column, and a column that reports null once reports null for every
//! accessor for the rest of the row.
//!
//! Large character and binary values can be consumed as chunk streams:
//! finite, lazy, not restartable. Writers use them so that a value never
//! has to be held in an output buffer as a whole.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::base64::DECODED_CHUNK_SIZE;
use crate::error::{Error, Result};
use crate::schema::ColumnType;
use crate::value::{text, Value};

/// Maximum bytes of UTF-8 per character-stream chunk.
pub const CHAR_CHUNK_SIZE: usize = 4096;
/// Maximum bytes per binary-stream chunk; a whole number of Base64 lines.
pub const BYTE_CHUNK_SIZE: usize = DECODED_CHUNK_SIZE * 64;

pub type CharChunks<'a> = Box<dyn Iterator<Item = Result<String>> + 'a>;
pub type ByteChunks<'a> = Box<dyn Iterator<Item = Result<Vec<u8>>> + 'a>;

/// Change semantics attached to a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    /// Snapshot row without change semantics.
    #[default]
    Current,
    Insert,
    Update,
    Delete,
    Unknown,
}

pub trait Row {
    fn kind(&self) -> RowKind {
        RowKind::Current
    }

    fn column_count(&self) -> usize;

    fn is_null(&self, col: usize) -> Result<bool>;

    fn get_bool(&self, col: usize) -> Result<Option<bool>>;
    fn get_short(&self, col: usize) -> Result<Option<i16>>;
    fn get_int(&self, col: usize) -> Result<Option<i32>>;
    fn get_long(&self, col: usize) -> Result<Option<i64>>;
    fn get_double(&self, col: usize) -> Result<Option<f64>>;
    fn get_decimal(&self, col: usize) -> Result<Option<Decimal>>;
    fn get_string(&self, col: usize) -> Result<Option<String>>;
    fn get_date(&self, col: usize) -> Result<Option<NaiveDate>>;
    fn get_time(&self, col: usize) -> Result<Option<NaiveTime>>;
    fn get_timestamp(&self, col: usize) -> Result<Option<NaiveDateTime>>;
    fn get_bytes(&self, col: usize) -> Result<Option<Vec<u8>>>;

    /// Character data in chunks of at most [`CHAR_CHUNK_SIZE`] bytes.
    fn character_stream(&self, col: usize) -> Result<Option<CharChunks<'_>>> {
        Ok(self
            .get_string(col)?
            .map(|s| Box::new(StrChunks::new(s, CHAR_CHUNK_SIZE)) as CharChunks<'_>))
    }

    /// Binary data in chunks of at most [`BYTE_CHUNK_SIZE`] bytes.
    fn binary_stream(&self, col: usize) -> Result<Option<ByteChunks<'_>>> {
        Ok(self
            .get_bytes(col)?
            .map(|b| Box::new(BytesChunks::new(b, BYTE_CHUNK_SIZE)) as ByteChunks<'_>))
    }

    /// Materialise a column as the `Value` variant natural for `ty`.
    fn get_value(&self, col: usize, ty: ColumnType) -> Result<Value> {
        let v: Value = match ty {
            ColumnType::Boolean => self.get_bool(col)?.into(),
            ColumnType::TinyInt | ColumnType::SmallInt => self.get_short(col)?.into(),
            ColumnType::Integer => self.get_int(col)?.into(),
            ColumnType::BigInt => self.get_long(col)?.into(),
            ColumnType::Real | ColumnType::Float | ColumnType::Double => {
                self.get_double(col)?.into()
            }
            ColumnType::Decimal | ColumnType::Numeric => self.get_decimal(col)?.into(),
            ColumnType::Char | ColumnType::VarChar | ColumnType::LongVarChar | ColumnType::Clob => {
                self.get_string(col)?.into()
            }
            ColumnType::Date => self.get_date(col)?.into(),
            ColumnType::Time => self.get_time(col)?.into(),
            ColumnType::Timestamp => self.get_timestamp(col)?.into(),
            ColumnType::Binary
            | ColumnType::VarBinary
            | ColumnType::LongVarBinary
            | ColumnType::Blob => self.get_bytes(col)?.into(),
            ColumnType::Array | ColumnType::Struct | ColumnType::Other => {
                return Err(Error::UnsupportedType {
                    column: col,
                    type_name: ty.name().into(),
                })
            }
        };
        Ok(v)
    }
}

/// Splits an owned string into chunks on character boundaries.
pub struct StrChunks {
    text: String,
    pos: usize,
    max: usize,
    emitted: bool,
}

impl StrChunks {
    pub fn new(text: String, max: usize) -> Self {
        Self {
            text,
            pos: 0,
            max: max.max(1),
            emitted: false,
        }
    }
}

impl Iterator for StrChunks {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.text.len();
        // An empty value still yields one (empty) chunk.
        if self.pos >= len {
            if len == 0 && !self.emitted {
                self.emitted = true;
                return Some(Ok(String::new()));
            }
            return None;
        }
        let mut end = (self.pos + self.max).min(len);
        while !self.text.is_char_boundary(end) {
            end -= 1;
        }
        if end == self.pos {
            end = self.pos + 1;
            while !self.text.is_char_boundary(end) {
                end += 1;
            }
        }
        let chunk = self.text[self.pos..end].to_string();
        self.pos = end;
        self.emitted = true;
        Some(Ok(chunk))
    }
}

/// Splits an owned byte buffer into chunks of at most `max` bytes.
pub struct BytesChunks {
    bytes: Vec<u8>,
    pos: usize,
    max: usize,
    emitted: bool,
}

impl BytesChunks {
    pub fn new(bytes: Vec<u8>, max: usize) -> Self {
        Self {
            bytes,
            pos: 0,
            max: max.max(1),
            emitted: false,
        }
    }
}

impl Iterator for BytesChunks {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.bytes.len();
        if self.pos >= len {
            if len == 0 && !self.emitted {
                self.emitted = true;
                return Some(Ok(Vec::new()));
            }
            return None;
        }
        let end = (self.pos + self.max).min(len);
        let chunk = self.bytes[self.pos..end].to_vec();
        self.pos = end;
        self.emitted = true;
        Some(Ok(chunk))
    }
}

/// An in-memory row over owned values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OwnedRow {
    kind: RowKind,
    values: Vec<Value>,
}

impl OwnedRow {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            kind: RowKind::Current,
            values,
        }
    }

    pub fn with_kind(mut self, kind: RowKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Snapshot any row into owned values, typed by `types`.
    pub fn capture(row: &dyn Row, types: &[ColumnType]) -> Result<Self> {
        let values = types
            .iter()
            .enumerate()
            .map(|(i, ty)| row.get_value(i + 1, *ty))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            kind: row.kind(),
            values,
        })
    }

    fn value(&self, col: usize) -> Result<&Value> {
        col.checked_sub(1)
            .and_then(|i| self.values.get(i))
            .ok_or_else(|| {
                Error::format(
                    0,
                    col,
                    format!("no such column (row has {})", self.values.len()),
                )
            })
    }

    fn mismatch(col: usize, v: &Value, wanted: &str) -> Error {
        Error::format(
            0,
            col,
            format!("cannot read {} value as {}", v.kind_name(), wanted),
        )
    }

    fn integral(&self, col: usize, wanted: &str) -> Result<Option<i64>> {
        let v = self.value(col)?;
        let out = match v {
            Value::Null => None,
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Short(x) => Some(i64::from(*x)),
            Value::Int(x) => Some(i64::from(*x)),
            Value::Long(x) => Some(*x),
            Value::Decimal(d) if d.fract().is_zero() => Some(
                d.to_i64()
                    .ok_or_else(|| Error::format(0, col, format!("{} out of range for {}", d, wanted)))?,
            ),
            Value::String(s) => {
                Some(text::parse_number::<i64>(s, wanted).map_err(|m| Error::format(0, col, m))?)
            }
            other => return Err(Self::mismatch(col, other, wanted)),
        };
        Ok(out)
    }
}

fn narrow<T: TryFrom<i64>>(col: usize, v: Option<i64>, wanted: &str) -> Result<Option<T>> {
    v.map(|x| {
        T::try_from(x).map_err(|_| Error::format(0, col, format!("{} out of range for {}", x, wanted)))
    })
    .transpose()
}

impl Row for OwnedRow {
    fn kind(&self) -> RowKind {
        self.kind
    }

    fn column_count(&self) -> usize {
        self.values.len()
    }

    fn is_null(&self, col: usize) -> Result<bool> {
        Ok(self.value(col)?.is_null())
    }

    fn get_bool(&self, col: usize) -> Result<Option<bool>> {
        let v = self.value(col)?;
        let out = match v {
            Value::Null => None,
            Value::Bool(b) => Some(*b),
            Value::Short(_) | Value::Int(_) | Value::Long(_) => {
                Some(self.integral(col, "boolean")? != Some(0))
            }
            Value::String(s) => Some(text::parse_bool(s).map_err(|m| Error::format(0, col, m))?),
            other => return Err(Self::mismatch(col, other, "boolean")),
        };
        Ok(out)
    }

    fn get_short(&self, col: usize) -> Result<Option<i16>> {
        narrow(col, self.integral(col, "short")?, "short")
    }

    fn get_int(&self, col: usize) -> Result<Option<i32>> {
        narrow(col, self.integral(col, "int")?, "int")
    }

    fn get_long(&self, col: usize) -> Result<Option<i64>> {
        self.integral(col, "long")
    }

    fn get_double(&self, col: usize) -> Result<Option<f64>> {
        let v = self.value(col)?;
        let out = match v {
            Value::Null => None,
            Value::Double(x) => Some(*x),
            Value::Short(x) => Some(f64::from(*x)),
            Value::Int(x) => Some(f64::from(*x)),
            Value::Long(x) => Some(*x as f64),
            Value::Decimal(d) => d.to_f64(),
            Value::String(s) => {
                Some(text::parse_number::<f64>(s, "double").map_err(|m| Error::format(0, col, m))?)
            }
            other => return Err(Self::mismatch(col, other, "double")),
        };
        Ok(out)
    }

    fn get_decimal(&self, col: usize) -> Result<Option<Decimal>> {
        let v = self.value(col)?;
        let out = match v {
            Value::Null => None,
            Value::Decimal(d) => Some(*d),
            Value::Short(x) => Some(Decimal::from(*x)),
            Value::Int(x) => Some(Decimal::from(*x)),
            Value::Long(x) => Some(Decimal::from(*x)),
            Value::Double(x) => Some(
                Decimal::try_from(*x)
                    .map_err(|_| Error::format(0, col, format!("{} is not representable as decimal", x)))?,
            ),
            Value::String(s) => Some(text::parse_decimal(s).map_err(|m| Error::format(0, col, m))?),
            other => return Err(Self::mismatch(col, other, "decimal")),
        };
        Ok(out)
    }

    fn get_string(&self, col: usize) -> Result<Option<String>> {
        let v = self.value(col)?;
        match v {
            Value::Bytes(_) => Err(Self::mismatch(col, v, "string")),
            other => Ok(other.to_text()),
        }
    }

    fn get_date(&self, col: usize) -> Result<Option<NaiveDate>> {
        let v = self.value(col)?;
        let out = match v {
            Value::Null => None,
            Value::Date(d) => Some(*d),
            Value::Timestamp(ts) => Some(ts.date()),
            Value::String(s) => Some(text::parse_date(s).map_err(|m| Error::format(0, col, m))?),
            other => return Err(Self::mismatch(col, other, "date")),
        };
        Ok(out)
    }

    fn get_time(&self, col: usize) -> Result<Option<NaiveTime>> {
        let v = self.value(col)?;
        let out = match v {
            Value::Null => None,
            Value::Time(t) => Some(*t),
            Value::Timestamp(ts) => Some(ts.time()),
            Value::String(s) => Some(text::parse_time(s).map_err(|m| Error::format(0, col, m))?),
            other => return Err(Self::mismatch(col, other, "time")),
        };
        Ok(out)
    }

    fn get_timestamp(&self, col: usize) -> Result<Option<NaiveDateTime>> {
        let v = self.value(col)?;
        let out = match v {
            Value::Null => None,
            Value::Timestamp(ts) => Some(*ts),
            Value::Date(d) => Some(d.and_time(NaiveTime::MIN)),
            Value::String(s) => {
                Some(text::parse_timestamp(s).map_err(|m| Error::format(0, col, m))?)
            }
            other => return Err(Self::mismatch(col, other, "timestamp")),
        };
        Ok(out)
    }

    fn get_bytes(&self, col: usize) -> Result<Option<Vec<u8>>> {
        let v = self.value(col)?;
        let out = match v {
            Value::Null => None,
            Value::Bytes(b) => Some(b.clone()),
            Value::String(s) => Some(s.as_bytes().to_vec()),
            other => return Err(Self::mismatch(col, other, "bytes")),
        };
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> OwnedRow {
        OwnedRow::new(vec![
            Value::Int(42),
            Value::Null,
            Value::from("2021-03-04"),
            Value::Long(1 << 40),
            Value::Bytes(vec![1, 2, 3]),
        ])
    }

    #[test]
    fn widening_and_text_conversions() {
        let r = row();
        assert_eq!(r.get_long(1).unwrap(), Some(42));
        assert_eq!(r.get_string(1).unwrap().as_deref(), Some("42"));
        assert_eq!(r.get_double(1).unwrap(), Some(42.0));
        assert_eq!(
            r.get_date(3).unwrap(),
            NaiveDate::from_ymd_opt(2021, 3, 4)
        );
    }

    #[test]
    fn null_is_null_for_every_accessor() {
        let r = row();
        assert!(r.is_null(2).unwrap());
        assert_eq!(r.get_int(2).unwrap(), None);
        assert_eq!(r.get_string(2).unwrap(), None);
        assert_eq!(r.get_bytes(2).unwrap(), None);
        assert!(r.character_stream(2).unwrap().is_none());
        assert!(r.is_null(2).unwrap());
    }

    #[test]
    fn narrowing_overflow_is_a_format_error() {
        let err = row().get_int(4).unwrap_err();
        assert!(err.is_format_error());
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn out_of_range_ordinal_is_reported() {
        assert!(row().get_int(0).is_err());
        assert!(row().get_int(6).is_err());
    }

    #[test]
    fn string_chunks_respect_char_boundaries() {
        let s = "héllo wörld ✓".repeat(10);
        let chunks: Vec<String> = StrChunks::new(s.clone(), 5)
            .map(|c| c.unwrap())
            .collect();
        assert!(chunks.iter().all(|c| c.len() <= 5 || c.chars().count() == 1));
        assert_eq!(chunks.concat(), s);

        let empty: Vec<String> = StrChunks::new(String::new(), 5).map(|c| c.unwrap()).collect();
        assert_eq!(empty, vec![String::new()]);
    }

    #[test]
    fn binary_stream_chunks_concatenate() {
        let data: Vec<u8> = (0..10_000u32).map(|i| i as u8).collect();
        let r = OwnedRow::new(vec![Value::Bytes(data.clone())]);
        let chunks: Vec<Vec<u8>> = r
            .binary_stream(1)
            .unwrap()
            .unwrap()
            .map(|c| c.unwrap())
            .collect();
        assert!(chunks.iter().all(|c| c.len() <= BYTE_CHUNK_SIZE));
        assert_eq!(chunks.concat(), data);
    }

    #[test]
    fn byte_chunks_are_cut_on_demand() {
        let mut chunks = BytesChunks::new(vec![1, 2, 3, 4, 5], 2);
        assert_eq!(chunks.next().unwrap().unwrap(), vec![1, 2]);
        assert_eq!(chunks.pos, 2);
        assert_eq!(chunks.next().unwrap().unwrap(), vec![3, 4]);
        assert_eq!(chunks.next().unwrap().unwrap(), vec![5]);
        assert!(chunks.next().is_none());

        let mut empty = BytesChunks::new(Vec::new(), 57);
        assert_eq!(empty.next().unwrap().unwrap(), Vec::<u8>::new());
        assert!(empty.next().is_none());
    }

    #[test]
    fn capture_preserves_kind_and_types() {
        let r = OwnedRow::new(vec![Value::from("7"), Value::from("x")]).with_kind(RowKind::Update);
        let snap = OwnedRow::capture(&r, &[ColumnType::Integer, ColumnType::VarChar]).unwrap();
        assert_eq!(snap.kind(), RowKind::Update);
        assert_eq!(snap.values(), &[Value::Int(7), Value::from("x")]);
    }

    #[test]
    fn unsupported_type_in_get_value() {
        let err = row().get_value(1, ColumnType::Struct).unwrap_err();
        assert!(matches!(err, Error::UnsupportedType { column: 1, .. }));
    }
}
