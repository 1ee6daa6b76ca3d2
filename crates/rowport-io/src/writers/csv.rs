//! Push-based CSV writer.
//!
//! Values are pulled from the row through the accessor matching the declared
//! column type and rendered in canonical text. Null renders as an empty
//! field. Large character and binary columns are copied chunk by chunk from
//! the row's streams so no whole value is buffered here.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rowport_core::base64::{Base64Encoder, DECODED_CHUNK_SIZE};
use rowport_core::config::CsvFormatOptions;
use rowport_core::row::Row;
use rowport_core::schema::{ColumnType, MetaData};
use rowport_core::value::{DATE_FORMAT, TIMESTAMP_FORMAT, TIME_FORMAT};
use tracing::{debug, trace};

use crate::error::Result;

pub struct CsvWriter<W: Write> {
    out: BufWriter<W>,
    metadata: MetaData,
    options: CsvFormatOptions,
    quote: String,
    escaped_quote: String,
    encoded: String,
    rows_written: u64,
}

impl CsvWriter<File> {
    pub fn to_path(
        path: impl AsRef<Path>,
        metadata: MetaData,
        options: CsvFormatOptions,
    ) -> Result<Self> {
        let file = File::create(path)?;
        Self::open(file, metadata, options)
    }
}

impl<W: Write> CsvWriter<W> {
    /// Write the header (when configured) and return a writer ready for rows.
    pub fn open(writer: W, metadata: MetaData, options: CsvFormatOptions) -> Result<Self> {
        options.validate()?;
        metadata.validate()?;
        let quote = options.quote_char.to_string();
        let mut w = Self {
            out: BufWriter::with_capacity(options.write_buffer_size, writer),
            escaped_quote: quote.repeat(2),
            quote,
            metadata,
            options,
            encoded: String::new(),
            rows_written: 0,
        };
        if w.options.header {
            w.write_header()?;
        }
        debug!(
            columns = w.metadata.column_count(),
            header = w.options.header,
            quoting = w.options.quoting,
            "opened CSV writer"
        );
        Ok(w)
    }

    pub fn metadata(&self) -> &MetaData {
        &self.metadata
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    fn write_header(&mut self) -> Result<()> {
        let mut line = String::new();
        for (i, col) in self.metadata.columns().iter().enumerate() {
            if i > 0 {
                line.push(self.options.column_delimiter);
            }
            line.push_str(&col.name);
        }
        line.push(self.options.row_delimiter);
        self.out.write_all(line.as_bytes())?;
        Ok(())
    }

    pub fn write_row(&mut self, row: &dyn Row) -> Result<()> {
        for col in 1..=self.metadata.column_count() {
            if col > 1 {
                self.put_char(self.options.column_delimiter)?;
            }
            let ty = self.metadata.columns()[col - 1].column_type;
            self.write_field(row, col, ty)?;
        }
        self.put_char(self.options.row_delimiter)?;
        self.rows_written += 1;
        trace!(row = self.rows_written, "wrote CSV row");
        Ok(())
    }

    fn write_field(&mut self, row: &dyn Row, col: usize, ty: ColumnType) -> Result<()> {
        match ty {
            ColumnType::Boolean => {
                if let Some(v) = row.get_bool(col)? {
                    write!(self.out, "{}", v)?;
                }
            }
            ColumnType::TinyInt | ColumnType::SmallInt => {
                if let Some(v) = row.get_short(col)? {
                    write!(self.out, "{}", v)?;
                }
            }
            ColumnType::Integer => {
                if let Some(v) = row.get_int(col)? {
                    write!(self.out, "{}", v)?;
                }
            }
            ColumnType::BigInt => {
                if let Some(v) = row.get_long(col)? {
                    write!(self.out, "{}", v)?;
                }
            }
            ColumnType::Real | ColumnType::Float | ColumnType::Double => {
                if let Some(v) = row.get_double(col)? {
                    write!(self.out, "{}", v)?;
                }
            }
            ColumnType::Decimal | ColumnType::Numeric => {
                if let Some(v) = row.get_decimal(col)? {
                    write!(self.out, "{}", v)?;
                }
            }
            ColumnType::Char | ColumnType::VarChar => {
                if let Some(s) = row.get_string(col)? {
                    self.put_quote()?;
                    self.put_escaped(&s)?;
                    self.put_quote()?;
                }
            }
            ColumnType::LongVarChar | ColumnType::Clob => {
                if let Some(chunks) = row.character_stream(col)? {
                    self.put_quote()?;
                    for chunk in chunks {
                        self.put_escaped(&chunk?)?;
                    }
                    self.put_quote()?;
                }
            }
            ColumnType::Date => {
                if let Some(v) = row.get_date(col)? {
                    write!(self.out, "{}", v.format(DATE_FORMAT))?;
                }
            }
            ColumnType::Time => {
                if let Some(v) = row.get_time(col)? {
                    write!(self.out, "{}", v.format(TIME_FORMAT))?;
                }
            }
            ColumnType::Timestamp => {
                if let Some(v) = row.get_timestamp(col)? {
                    write!(self.out, "{}", v.format(TIMESTAMP_FORMAT))?;
                }
            }
            ColumnType::Binary | ColumnType::VarBinary => {
                if let Some(bytes) = row.get_bytes(col)? {
                    let mut enc = self.encoder();
                    self.put_quote()?;
                    self.put_encoded(&mut enc, &bytes)?;
                    self.put_quote()?;
                }
            }
            ColumnType::LongVarBinary | ColumnType::Blob => {
                if let Some(chunks) = row.binary_stream(col)? {
                    let mut enc = self.encoder();
                    let mut carry: Vec<u8> = Vec::with_capacity(DECODED_CHUNK_SIZE * 2);
                    self.put_quote()?;
                    for chunk in chunks {
                        carry.extend_from_slice(&chunk?);
                        let whole = carry.len() / DECODED_CHUNK_SIZE * DECODED_CHUNK_SIZE;
                        if whole > 0 {
                            self.put_encoded(&mut enc, &carry[..whole])?;
                            carry.drain(..whole);
                        }
                    }
                    self.put_encoded(&mut enc, &carry)?;
                    self.put_quote()?;
                }
            }
            ColumnType::Array | ColumnType::Struct | ColumnType::Other => {
                let type_name = self.metadata.columns()[col - 1].type_name.clone();
                return Err(rowport_core::Error::UnsupportedType {
                    column: col,
                    type_name,
                }
                .into());
            }
        }
        Ok(())
    }

    // Unquoted output keeps binary text on one physical line.
    fn encoder(&self) -> Base64Encoder {
        if self.options.quoting {
            Base64Encoder::new()
        } else {
            Base64Encoder::unwrapped()
        }
    }

    fn put_encoded(&mut self, enc: &mut Base64Encoder, bytes: &[u8]) -> Result<()> {
        self.encoded.clear();
        enc.encode_chunk(bytes, &mut self.encoded);
        self.out.write_all(self.encoded.as_bytes())?;
        Ok(())
    }

    /// Emits the quote character when quoting is on; used for both ends.
    fn put_quote(&mut self) -> Result<()> {
        if self.options.quoting {
            self.out.write_all(self.quote.as_bytes())?;
        }
        Ok(())
    }

    fn put_escaped(&mut self, s: &str) -> Result<()> {
        let escape = self.options.quoting && self.options.double_quote_escape;
        if escape && s.contains(self.options.quote_char) {
            let escaped = s.replace(self.quote.as_str(), &self.escaped_quote);
            self.out.write_all(escaped.as_bytes())?;
        } else {
            self.out.write_all(s.as_bytes())?;
        }
        Ok(())
    }

    fn put_char(&mut self, c: char) -> Result<()> {
        let mut buf = [0u8; 4];
        self.out.write_all(c.encode_utf8(&mut buf).as_bytes())?;
        Ok(())
    }

    /// Flush buffered output and hand back the underlying writer.
    pub fn finish(self) -> Result<W> {
        debug!(rows = self.rows_written, "closing CSV writer");
        let inner = self.out.into_inner().map_err(|e| e.into_error())?;
        Ok(inner)
    }
}
