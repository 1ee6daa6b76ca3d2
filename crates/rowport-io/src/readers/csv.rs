//! Pull-based CSV reader producing typed row views.
//!
//! The reader owns the tokenizer and the current record; `next_row` lends a
//! `CsvRow` that borrows both until the next call. Fields are kept as text
//! and converted only when an accessor asks for them.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rowport_core::base64::{self, Base64Decoder, DECODED_CHUNK_SIZE, ENCODED_LINE_LENGTH};
use rowport_core::config::CsvFormatOptions;
use rowport_core::row::{ByteChunks, Row};
use rowport_core::schema::{ColumnMeta, ColumnType, MetaData};
use rowport_core::value::text;
use rust_decimal::Decimal;
use tracing::{debug, trace};

use super::tokenizer::{CsvCell, CsvTokenizer};
use crate::error::Result;

type CoreResult<T> = rowport_core::Result<T>;

pub struct CsvReader<R: Read> {
    tokenizer: CsvTokenizer<R>,
    options: CsvFormatOptions,
    metadata: MetaData,
    /// First data record, held back while deriving column names from it.
    pending: Option<(u64, Vec<CsvCell>)>,
    current: Vec<CsvCell>,
    rows_read: u64,
}

impl CsvReader<File> {
    pub fn from_path(path: impl AsRef<Path>, options: CsvFormatOptions) -> Result<Self> {
        let file = File::open(path)?;
        Self::open(file, options)
    }
}

impl<R: Read> CsvReader<R> {
    /// Open without a schema. Column names come from the header row, or are
    /// generated as `COLUMN_1..N` from the first record; every column is
    /// typed `varchar`.
    pub fn open(reader: R, options: CsvFormatOptions) -> Result<Self> {
        options.validate()?;
        let mut tokenizer = CsvTokenizer::new(reader, &options);
        let mut pending = None;

        let names: Vec<String> = if options.header {
            match tokenizer.next_record()? {
                Some(cells) => cells.into_iter().map(|c| c.value).collect(),
                None => {
                    return Err(rowport_core::Error::Schema(
                        "input is empty; expected a header row".into(),
                    )
                    .into())
                }
            }
        } else {
            match tokenizer.next_record()? {
                Some(cells) => {
                    let names = (1..=cells.len()).map(|i| format!("COLUMN_{}", i)).collect();
                    pending = Some((tokenizer.records(), cells));
                    names
                }
                None => Vec::new(),
            }
        };

        let metadata = MetaData::new(
            names
                .into_iter()
                .map(|n| ColumnMeta::new(n, ColumnType::VarChar))
                .collect(),
        );
        debug!(
            columns = metadata.column_count(),
            header = options.header,
            "opened CSV reader with derived metadata"
        );
        Ok(Self {
            tokenizer,
            options,
            metadata,
            pending,
            current: Vec::new(),
            rows_read: 0,
        })
    }

    /// Open against caller-supplied metadata. A configured header row must be
    /// present; it is consumed and its field count checked, but its names are
    /// not compared.
    pub fn open_with_metadata(
        reader: R,
        options: CsvFormatOptions,
        metadata: MetaData,
    ) -> Result<Self> {
        options.validate()?;
        metadata.validate()?;
        let mut tokenizer = CsvTokenizer::new(reader, &options);
        if options.header {
            let Some(cells) = tokenizer.next_record()? else {
                return Err(rowport_core::Error::Schema(
                    "input is empty; expected a header row".into(),
                )
                .into());
            };
            if cells.len() != metadata.column_count() {
                return Err(rowport_core::Error::ColumnCount {
                    row: tokenizer.records(),
                    expected: metadata.column_count(),
                    found: cells.len(),
                }
                .into());
            }
        }
        debug!(
            columns = metadata.column_count(),
            table = metadata.table_name().unwrap_or(""),
            header = options.header,
            "opened CSV reader"
        );
        Ok(Self {
            tokenizer,
            options,
            metadata,
            pending: None,
            current: Vec::new(),
            rows_read: 0,
        })
    }

    pub fn metadata(&self) -> &MetaData {
        &self.metadata
    }

    pub fn options(&self) -> &CsvFormatOptions {
        &self.options
    }

    /// Data rows returned so far.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Advance to the next data row. The returned view is valid until the
    /// next call.
    pub fn next_row(&mut self) -> Result<Option<CsvRow<'_>>> {
        let next = match self.pending.take() {
            Some(held) => Some(held),
            None => self
                .tokenizer
                .next_record()?
                .map(|cells| (self.tokenizer.records(), cells)),
        };
        let Some((ordinal, cells)) = next else {
            debug!(rows = self.rows_read, "CSV reader reached end of input");
            return Ok(None);
        };

        let expected = self.metadata.column_count();
        if cells.len() != expected {
            return Err(rowport_core::Error::ColumnCount {
                row: ordinal,
                expected,
                found: cells.len(),
            }
            .into());
        }
        trace!(row = ordinal, "read CSV record");
        self.current = cells;
        self.rows_read += 1;
        Ok(Some(CsvRow {
            cells: &self.current,
            metadata: &self.metadata,
            quoting: self.options.quoting,
            ordinal,
        }))
    }
}

/// View over the reader's current record.
#[derive(Debug, Clone, Copy)]
pub struct CsvRow<'a> {
    cells: &'a [CsvCell],
    metadata: &'a MetaData,
    quoting: bool,
    ordinal: u64,
}

impl<'a> CsvRow<'a> {
    /// Physical record ordinal of this row in the input.
    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    pub fn cells(&self) -> &'a [CsvCell] {
        self.cells
    }

    fn cell(&self, col: usize) -> CoreResult<&'a CsvCell> {
        col.checked_sub(1)
            .and_then(|i| self.cells.get(i))
            .ok_or_else(|| {
                rowport_core::Error::format(
                    self.ordinal,
                    col,
                    format!("no such column (row has {})", self.cells.len()),
                )
            })
    }

    fn column_type(&self, col: usize) -> ColumnType {
        self.metadata
            .column(col)
            .map(|c| c.column_type)
            .unwrap_or(ColumnType::VarChar)
    }

    // Empty-means-null: string-like columns rely on quoting to tell "" from
    // null; every other type treats empty text as null.
    fn text(&self, col: usize) -> CoreResult<Option<&'a str>> {
        let cell = self.cell(col)?;
        let ty = self.column_type(col);
        let null = if ty.is_character() || ty.is_binary() {
            self.quoting && cell.raw_len == 0
        } else {
            cell.value.is_empty()
        };
        Ok(if null { None } else { Some(cell.value.as_str()) })
    }

    fn parse<T>(
        &self,
        col: usize,
        f: impl FnOnce(&str) -> std::result::Result<T, String>,
    ) -> CoreResult<Option<T>> {
        self.text(col)?
            .map(|s| f(s).map_err(|m| rowport_core::Error::format(self.ordinal, col, m)))
            .transpose()
    }
}

impl Row for CsvRow<'_> {
    fn column_count(&self) -> usize {
        self.cells.len()
    }

    fn is_null(&self, col: usize) -> CoreResult<bool> {
        Ok(self.text(col)?.is_none())
    }

    fn get_bool(&self, col: usize) -> CoreResult<Option<bool>> {
        self.parse(col, text::parse_bool)
    }

    fn get_short(&self, col: usize) -> CoreResult<Option<i16>> {
        self.parse(col, |s| text::parse_number(s, "short"))
    }

    fn get_int(&self, col: usize) -> CoreResult<Option<i32>> {
        self.parse(col, |s| text::parse_number(s, "int"))
    }

    fn get_long(&self, col: usize) -> CoreResult<Option<i64>> {
        self.parse(col, |s| text::parse_number(s, "long"))
    }

    fn get_double(&self, col: usize) -> CoreResult<Option<f64>> {
        self.parse(col, |s| text::parse_number(s, "double"))
    }

    fn get_decimal(&self, col: usize) -> CoreResult<Option<Decimal>> {
        self.parse(col, text::parse_decimal)
    }

    fn get_string(&self, col: usize) -> CoreResult<Option<String>> {
        Ok(self.text(col)?.map(str::to_string))
    }

    fn get_date(&self, col: usize) -> CoreResult<Option<NaiveDate>> {
        self.parse(col, text::parse_date)
    }

    fn get_time(&self, col: usize) -> CoreResult<Option<NaiveTime>> {
        self.parse(col, text::parse_time)
    }

    fn get_timestamp(&self, col: usize) -> CoreResult<Option<NaiveDateTime>> {
        self.parse(col, text::parse_timestamp)
    }

    /// Binary columns are Base64-decoded; any other column yields its UTF-8
    /// text.
    fn get_bytes(&self, col: usize) -> CoreResult<Option<Vec<u8>>> {
        let binary = self.column_type(col).is_binary();
        Ok(self.text(col)?.map(|s| {
            if binary {
                base64::decode(s)
            } else {
                s.as_bytes().to_vec()
            }
        }))
    }

    fn binary_stream(&self, col: usize) -> CoreResult<Option<ByteChunks<'_>>> {
        if !self.column_type(col).is_binary() {
            return Ok(self.get_bytes(col)?.map(|b| {
                Box::new(std::iter::once(Ok(b))) as ByteChunks<'_>
            }));
        }
        Ok(self
            .text(col)?
            .map(|s| Box::new(DecodedChunks::new(s)) as ByteChunks<'_>))
    }
}

/// Decodes Base64 text a few lines at a time.
struct DecodedChunks<'a> {
    text: &'a [u8],
    pos: usize,
    decoder: Option<Base64Decoder>,
}

// Encoded symbols per step: 64 full lines plus their breaks.
const ENCODED_STEP: usize = (ENCODED_LINE_LENGTH + 1) * 64;

impl<'a> DecodedChunks<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text: text.as_bytes(),
            pos: 0,
            decoder: Some(Base64Decoder::new()),
        }
    }
}

impl Iterator for DecodedChunks<'_> {
    type Item = rowport_core::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let decoder = self.decoder.as_mut()?;
        let mut out = Vec::with_capacity(DECODED_CHUNK_SIZE * 64);
        if self.pos < self.text.len() {
            let end = (self.pos + ENCODED_STEP).min(self.text.len());
            decoder.decode_chunk(&self.text[self.pos..end], &mut out);
            self.pos = end;
            if self.pos < self.text.len() {
                return Some(Ok(out));
            }
        }
        if let Some(decoder) = self.decoder.take() {
            decoder.finish(&mut out);
        }
        Some(Ok(out))
    }
}
