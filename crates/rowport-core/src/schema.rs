//! Logical table shape shared by readers and writers. Pure data; no I/O.
//!
//! A `MetaData` is produced by a reader (or supplied by the caller) and is
//! shared read-only by the writer for the lifetime of one export/import.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// SQL column kinds understood by the toolkit.
///
/// `Array`, `Struct` and `Other` exist so that metadata describing a real
/// table can be represented; no writer serializes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Float,
    Double,
    Decimal,
    Numeric,
    Char,
    VarChar,
    LongVarChar,
    Date,
    Time,
    Timestamp,
    Binary,
    VarBinary,
    LongVarBinary,
    Clob,
    Blob,
    Array,
    Struct,
    Other,
}

impl ColumnType {
    pub const ALL: [ColumnType; 24] = [
        ColumnType::Boolean,
        ColumnType::TinyInt,
        ColumnType::SmallInt,
        ColumnType::Integer,
        ColumnType::BigInt,
        ColumnType::Real,
        ColumnType::Float,
        ColumnType::Double,
        ColumnType::Decimal,
        ColumnType::Numeric,
        ColumnType::Char,
        ColumnType::VarChar,
        ColumnType::LongVarChar,
        ColumnType::Date,
        ColumnType::Time,
        ColumnType::Timestamp,
        ColumnType::Binary,
        ColumnType::VarBinary,
        ColumnType::LongVarBinary,
        ColumnType::Clob,
        ColumnType::Blob,
        ColumnType::Array,
        ColumnType::Struct,
        ColumnType::Other,
    ];

    /// Lowercase SQL name, as used in schema files.
    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Boolean => "boolean",
            ColumnType::TinyInt => "tinyint",
            ColumnType::SmallInt => "smallint",
            ColumnType::Integer => "integer",
            ColumnType::BigInt => "bigint",
            ColumnType::Real => "real",
            ColumnType::Float => "float",
            ColumnType::Double => "double",
            ColumnType::Decimal => "decimal",
            ColumnType::Numeric => "numeric",
            ColumnType::Char => "char",
            ColumnType::VarChar => "varchar",
            ColumnType::LongVarChar => "longvarchar",
            ColumnType::Date => "date",
            ColumnType::Time => "time",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Binary => "binary",
            ColumnType::VarBinary => "varbinary",
            ColumnType::LongVarBinary => "longvarbinary",
            ColumnType::Clob => "clob",
            ColumnType::Blob => "blob",
            ColumnType::Array => "array",
            ColumnType::Struct => "struct",
            ColumnType::Other => "other",
        }
    }

    /// JDBC-style type code (`java.sql.Types` numbering).
    pub fn code(self) -> i32 {
        match self {
            ColumnType::Boolean => 16,
            ColumnType::TinyInt => -6,
            ColumnType::SmallInt => 5,
            ColumnType::Integer => 4,
            ColumnType::BigInt => -5,
            ColumnType::Real => 7,
            ColumnType::Float => 6,
            ColumnType::Double => 8,
            ColumnType::Decimal => 3,
            ColumnType::Numeric => 2,
            ColumnType::Char => 1,
            ColumnType::VarChar => 12,
            ColumnType::LongVarChar => -1,
            ColumnType::Date => 91,
            ColumnType::Time => 92,
            ColumnType::Timestamp => 93,
            ColumnType::Binary => -2,
            ColumnType::VarBinary => -3,
            ColumnType::LongVarBinary => -4,
            ColumnType::Clob => 2005,
            ColumnType::Blob => 2004,
            ColumnType::Array => 2003,
            ColumnType::Struct => 2002,
            ColumnType::Other => 1111,
        }
    }

    /// Inverse of [`ColumnType::code`]. BIT maps to `Boolean`; any code
    /// without a dedicated variant maps to `Other`.
    pub fn from_code(code: i32) -> Self {
        match code {
            -7 => ColumnType::Boolean,
            c => Self::ALL
                .iter()
                .copied()
                .find(|t| t.code() == c)
                .unwrap_or(ColumnType::Other),
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ColumnType::TinyInt | ColumnType::SmallInt | ColumnType::Integer | ColumnType::BigInt
        )
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer()
            || matches!(
                self,
                ColumnType::Real
                    | ColumnType::Float
                    | ColumnType::Double
                    | ColumnType::Decimal
                    | ColumnType::Numeric
            )
    }

    pub fn is_character(self) -> bool {
        matches!(self, ColumnType::Char | ColumnType::VarChar) || self.is_large_character()
    }

    pub fn is_large_character(self) -> bool {
        matches!(self, ColumnType::LongVarChar | ColumnType::Clob)
    }

    pub fn is_binary(self) -> bool {
        matches!(self, ColumnType::Binary | ColumnType::VarBinary) || self.is_large_binary()
    }

    pub fn is_large_binary(self) -> bool {
        matches!(self, ColumnType::LongVarBinary | ColumnType::Blob)
    }

    pub fn is_temporal(self) -> bool {
        matches!(self, ColumnType::Date | ColumnType::Time | ColumnType::Timestamp)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColumnType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        if let Ok(code) = lower.parse::<i32>() {
            return Ok(ColumnType::from_code(code));
        }
        let ty = match lower.as_str() {
            "bool" | "bit" => ColumnType::Boolean,
            "int" | "int4" => ColumnType::Integer,
            "int2" => ColumnType::SmallInt,
            "int8" | "long" => ColumnType::BigInt,
            "float4" => ColumnType::Real,
            "float8" | "double precision" => ColumnType::Double,
            "string" | "text" => ColumnType::VarChar,
            "bytes" | "bytea" => ColumnType::VarBinary,
            "datetime" => ColumnType::Timestamp,
            other => Self::ALL
                .iter()
                .copied()
                .find(|t| t.name() == other)
                .ok_or_else(|| Error::Schema(format!("unknown column type '{}'", s)))?,
        };
        Ok(ty)
    }
}

impl Serialize for ColumnType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Code(i32),
            Name(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Code(code) => Ok(ColumnType::from_code(code)),
            Repr::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// 1-based position; assigned by `MetaData::new`.
    #[serde(skip)]
    pub ordinal: usize,
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Database-specific type name (e.g. `NVARCHAR2`); defaults to the SQL name.
    #[serde(default)]
    pub type_name: String,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            ordinal: 0,
            name: name.into(),
            column_type,
            type_name: column_type.name().to_ascii_uppercase(),
        }
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }
}

/// Ordered column list plus optional table name and key-column set.
///
/// Invariants (checked by [`MetaData::validate`]): ordinals are dense
/// `1..=N` and key names match column names exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MetaDataDef", into = "MetaDataDef")]
pub struct MetaData {
    columns: Vec<ColumnMeta>,
    table_name: Option<String>,
    key_columns: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct MetaDataDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    table: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    keys: Vec<String>,
    columns: Vec<ColumnMeta>,
}

impl TryFrom<MetaDataDef> for MetaData {
    type Error = Error;

    fn try_from(def: MetaDataDef) -> Result<Self> {
        let md = MetaData::new(def.columns).with_keys(def.keys);
        let md = match def.table {
            Some(t) => md.with_table(t),
            None => md,
        };
        md.validate()?;
        Ok(md)
    }
}

impl From<MetaData> for MetaDataDef {
    fn from(md: MetaData) -> Self {
        MetaDataDef {
            table: md.table_name,
            keys: md.key_columns,
            columns: md.columns,
        }
    }
}

impl MetaData {
    /// Build metadata from columns in order; ordinals are (re)assigned 1..N
    /// and empty type names default to the SQL name.
    pub fn new(columns: Vec<ColumnMeta>) -> Self {
        let columns = columns
            .into_iter()
            .enumerate()
            .map(|(i, mut c)| {
                c.ordinal = i + 1;
                if c.type_name.is_empty() {
                    c.type_name = c.column_type.name().to_ascii_uppercase();
                }
                c
            })
            .collect();
        Self {
            columns,
            table_name: None,
            key_columns: Vec::new(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table_name = Some(table.into());
        self
    }

    pub fn with_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_columns = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Parse and validate a JSON schema document.
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| Error::Schema(e.to_string()))
    }

    /// Ordinals must be dense and every key must name a column. Repeated
    /// column names are allowed; name lookups resolve to the first match and
    /// a repeated key name flags every column carrying it.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::with_capacity(self.columns.len());
        for (i, c) in self.columns.iter().enumerate() {
            if c.ordinal != i + 1 {
                return Err(Error::Schema(format!(
                    "column '{}' has ordinal {}, expected {}",
                    c.name,
                    c.ordinal,
                    i + 1
                )));
            }
            names.insert(c.name.as_str());
        }
        for k in &self.key_columns {
            if !names.contains(k.as_str()) {
                return Err(Error::Schema(format!(
                    "key column '{}' does not name a column",
                    k
                )));
            }
        }
        Ok(())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    /// Column by 1-based ordinal.
    pub fn column(&self, ordinal: usize) -> Option<&ColumnMeta> {
        ordinal.checked_sub(1).and_then(|i| self.columns.get(i))
    }

    /// 1-based ordinal of the column with this exact name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name).map(|i| i + 1)
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    /// One flag per column, true when the column participates in row identity.
    pub fn key_flags(&self) -> Vec<bool> {
        self.columns
            .iter()
            .map(|c| self.key_columns.iter().any(|k| *k == c.name))
            .collect()
    }
}
