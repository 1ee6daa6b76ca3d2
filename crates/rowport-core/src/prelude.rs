pub use crate::config::{CsvFormatOptions, DmlOptions};
pub use crate::error::{Error, Result};
pub use crate::row::{ByteChunks, CharChunks, OwnedRow, Row, RowKind};
pub use crate::schema::{ColumnMeta, ColumnType, MetaData};
pub use crate::value::Value;
