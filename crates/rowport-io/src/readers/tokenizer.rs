//! Character-level CSV tokenizer.
//!
//! One forward cursor over a buffered UTF-8 stream, two states (normal and
//! in-quotes). The quote bookkeeping is a single pending-quote counter plus
//! the `in_quotes` flag and the escaping mode taken from the options; both
//! doubled-quote and single-quote conventions run through the same loop.

use std::io::{BufRead, BufReader, Read};

use rowport_core::config::CsvFormatOptions;
use tracing::trace;

use crate::error::{Error, Result};

/// One decoded field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CsvCell {
    /// Field text after quote stripping and unescaping.
    pub value: String,
    /// Characters consumed from the input for this field, quotes included.
    /// Zero only for a field that was both empty and unquoted.
    pub raw_len: usize,
}

impl CsvCell {
    pub fn new(value: impl Into<String>, raw_len: usize) -> Self {
        Self {
            value: value.into(),
            raw_len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

pub struct CsvTokenizer<R: Read> {
    input: BufReader<R>,
    row_delimiter: char,
    column_delimiter: char,
    quote: char,
    quoting: bool,
    double_quote_escape: bool,
    filter_empty_lines: bool,
    peeked: Option<char>,
    records: u64,
}

impl<R: Read> CsvTokenizer<R> {
    pub fn new(reader: R, options: &CsvFormatOptions) -> Self {
        Self {
            input: BufReader::with_capacity(options.read_buffer_size.max(1), reader),
            row_delimiter: options.row_delimiter,
            column_delimiter: options.column_delimiter,
            quote: options.quote_char,
            quoting: options.quoting,
            double_quote_escape: options.double_quote_escape,
            filter_empty_lines: options.filter_empty_lines,
            peeked: None,
            records: 0,
        }
    }

    /// Physical records consumed so far, filtered blank lines included.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Next record that survives empty-line filtering, or `None` at end of
    /// input.
    pub fn next_record(&mut self) -> Result<Option<Vec<CsvCell>>> {
        loop {
            let Some(cells) = self.read_record()? else {
                return Ok(None);
            };
            if self.filter_empty_lines && cells.len() == 1 && cells[0].raw_len == 0 {
                trace!(record = self.records, "skipping empty line");
                continue;
            }
            return Ok(Some(cells));
        }
    }

    fn read_record(&mut self) -> Result<Option<Vec<CsvCell>>> {
        let mut cells = Vec::new();
        let mut field = String::new();
        let mut raw_len = 0usize;
        let mut in_quotes = false;
        let mut quote_count = 0usize;
        let mut started = false;

        loop {
            let Some(c) = self.next_char()? else {
                if !started {
                    return Ok(None);
                }
                if in_quotes {
                    self.flush_unterminated(&mut field, quote_count);
                }
                cells.push(CsvCell::new(field, raw_len));
                self.records += 1;
                return Ok(Some(cells));
            };
            started = true;

            if in_quotes {
                if c == self.quote {
                    quote_count += 1;
                    raw_len += 1;
                    continue;
                }
                // CRLF after a closing quote: drop the CR, let the LF close.
                if c == '\r'
                    && self.row_delimiter == '\n'
                    && self.closes(quote_count)
                    && self.peek_char()? == Some('\n')
                {
                    continue;
                }
                let is_delimiter = c == self.column_delimiter || c == self.row_delimiter;
                if is_delimiter && self.closes(quote_count) {
                    push_quotes(&mut field, self.quote, self.paired_on_close(quote_count));
                    in_quotes = false;
                    quote_count = 0;
                    // The delimiter itself is handled below in normal state.
                } else {
                    push_quotes(&mut field, self.quote, self.literal_before_text(quote_count));
                    quote_count = 0;
                    field.push(c);
                    raw_len += 1;
                    continue;
                }
            }

            if c == self.column_delimiter {
                cells.push(CsvCell::new(std::mem::take(&mut field), raw_len));
                raw_len = 0;
                continue;
            }
            if c == self.row_delimiter {
                cells.push(CsvCell::new(field, raw_len));
                self.records += 1;
                return Ok(Some(cells));
            }
            if self.quoting && raw_len == 0 && c == self.quote {
                in_quotes = true;
                quote_count = 0;
                raw_len += 1;
                continue;
            }
            if c == '\r' && self.peek_char()? == Some('\n') {
                continue;
            }
            field.push(c);
            raw_len += 1;
        }
    }

    // Exit condition for a delimiter seen while in quotes.
    fn closes(&self, quote_count: usize) -> bool {
        if self.double_quote_escape {
            quote_count % 2 == 1
        } else {
            quote_count > 0
        }
    }

    // Literal quotes left once the closing quote has been consumed.
    fn paired_on_close(&self, quote_count: usize) -> usize {
        if self.double_quote_escape {
            quote_count / 2
        } else {
            quote_count.saturating_sub(1)
        }
    }

    // Literal quotes for a pending run followed by ordinary text. An odd run
    // in doubled mode is malformed; its stray quote is kept.
    fn literal_before_text(&self, quote_count: usize) -> usize {
        if self.double_quote_escape {
            quote_count.div_ceil(2)
        } else {
            quote_count
        }
    }

    fn flush_unterminated(&self, field: &mut String, quote_count: usize) {
        let n = if self.closes(quote_count) {
            self.paired_on_close(quote_count)
        } else {
            self.literal_before_text(quote_count)
        };
        push_quotes(field, self.quote, n);
    }

    fn peek_char(&mut self) -> Result<Option<char>> {
        if self.peeked.is_none() {
            self.peeked = self.decode_char()?;
        }
        Ok(self.peeked)
    }

    fn next_char(&mut self) -> Result<Option<char>> {
        match self.peeked.take() {
            Some(c) => Ok(Some(c)),
            None => self.decode_char(),
        }
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        let buf = self.input.fill_buf()?;
        let Some(&b) = buf.first() else {
            return Ok(None);
        };
        self.input.consume(1);
        Ok(Some(b))
    }

    fn decode_char(&mut self) -> Result<Option<char>> {
        let Some(first) = self.next_byte()? else {
            return Ok(None);
        };
        if first.is_ascii() {
            return Ok(Some(first as char));
        }
        let invalid = Error::InvalidUtf8 {
            row: self.records + 1,
        };
        let width = match first {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => return Err(invalid),
        };
        let mut utf8 = [first, 0, 0, 0];
        for slot in utf8.iter_mut().take(width).skip(1) {
            match self.next_byte()? {
                Some(b) => *slot = b,
                None => return Err(invalid),
            }
        }
        std::str::from_utf8(&utf8[..width])
            .ok()
            .and_then(|s| s.chars().next())
            .map(Some)
            .ok_or(invalid)
    }
}

fn push_quotes(field: &mut String, quote: char, n: usize) {
    field.extend(std::iter::repeat(quote).take(n));
}
