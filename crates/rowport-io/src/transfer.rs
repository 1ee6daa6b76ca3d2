//! Row pipe from a pull-based source to a push-based sink.
//!
//! The pipe owns no rows: each source row is a borrowed view that lives
//! until the next pull, so it is handed to the sink before advancing.
//! Cancellation is cooperative; the flag is checked between rows only.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rowport_core::row::{OwnedRow, Row};
use rowport_core::schema::MetaData;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::readers::csv::{CsvReader, CsvRow};
use crate::writers::csv::CsvWriter;
use crate::writers::dml::DmlWriter;

const PROGRESS_EVERY: u64 = 10_000;

/// Something rows can be pulled from, one borrowed view at a time.
pub trait RowSource {
    type Item<'a>: Row
    where
        Self: 'a;

    fn metadata(&self) -> &MetaData;

    fn next_row(&mut self) -> Result<Option<Self::Item<'_>>>;
}

/// Something rows can be pushed into.
pub trait RowSink {
    fn write_row(&mut self, row: &dyn Row) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TransferStats {
    pub rows: u64,
    pub elapsed_ms: u64,
}

/// Move every row from `source` to `sink`. A set `cancel` flag stops the
/// pipe before the next row with [`Error::Cancelled`].
pub fn transfer<S, K>(source: &mut S, sink: &mut K, cancel: Option<&AtomicBool>) -> Result<TransferStats>
where
    S: RowSource + ?Sized,
    K: RowSink + ?Sized,
{
    let started = Instant::now();
    let mut rows = 0u64;
    debug!(columns = source.metadata().column_count(), "starting transfer");
    loop {
        if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
            info!(rows, "transfer cancelled");
            return Err(Error::Cancelled { rows });
        }
        let Some(row) = source.next_row()? else {
            break;
        };
        sink.write_row(&row)?;
        rows += 1;
        if rows % PROGRESS_EVERY == 0 {
            info!(rows, "transfer progress");
        }
    }
    let stats = TransferStats {
        rows,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    info!(rows = stats.rows, elapsed_ms = stats.elapsed_ms, "transfer complete");
    Ok(stats)
}

impl<R: Read> RowSource for CsvReader<R> {
    type Item<'a> = CsvRow<'a> where Self: 'a;

    fn metadata(&self) -> &MetaData {
        CsvReader::metadata(self)
    }

    fn next_row(&mut self) -> Result<Option<CsvRow<'_>>> {
        CsvReader::next_row(self)
    }
}

impl<W: Write> RowSink for CsvWriter<W> {
    fn write_row(&mut self, row: &dyn Row) -> Result<()> {
        CsvWriter::write_row(self, row)
    }
}

impl<W: Write> RowSink for DmlWriter<W> {
    fn write_row(&mut self, row: &dyn Row) -> Result<()> {
        DmlWriter::write_row(self, row)
    }
}

/// In-memory source over owned rows, e.g. a captured change feed.
pub struct MemorySource {
    metadata: MetaData,
    rows: std::vec::IntoIter<OwnedRow>,
}

impl MemorySource {
    pub fn new(metadata: MetaData, rows: Vec<OwnedRow>) -> Self {
        Self {
            metadata,
            rows: rows.into_iter(),
        }
    }
}

impl RowSource for MemorySource {
    type Item<'a> = OwnedRow;

    fn metadata(&self) -> &MetaData {
        &self.metadata
    }

    fn next_row(&mut self) -> Result<Option<OwnedRow>> {
        Ok(self.rows.next())
    }
}

/// Sink that captures rows as owned values, typed by the metadata.
#[derive(Debug, Default)]
pub struct MemorySink {
    types: Vec<rowport_core::schema::ColumnType>,
    rows: Vec<OwnedRow>,
}

impl MemorySink {
    pub fn new(metadata: &MetaData) -> Self {
        Self {
            types: metadata.columns().iter().map(|c| c.column_type).collect(),
            rows: Vec::new(),
        }
    }

    pub fn rows(&self) -> &[OwnedRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<OwnedRow> {
        self.rows
    }
}

impl RowSink for MemorySink {
    fn write_row(&mut self, row: &dyn Row) -> Result<()> {
        self.rows.push(OwnedRow::capture(row, &self.types)?);
        Ok(())
    }
}
