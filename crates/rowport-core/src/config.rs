//! Format and generation options. Constructed once, read-only afterwards:
//! readers and writers take their own copy at open time.

use serde::{Deserialize, Serialize};

use crate::base64;
use crate::error::{Error, Result};

pub const DEFAULT_ROW_DELIMITER: char = '\n';
pub const DEFAULT_COLUMN_DELIMITER: char = ',';
pub const DEFAULT_QUOTE_CHAR: char = '"';
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// CSV dialect shared by the tokenizer and the writer.
///
/// The three special characters must differ from each other and must not be
/// Base64 symbols (`A-Z a-z 0-9 + / =`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvFormatOptions {
    pub row_delimiter: char,
    pub column_delimiter: char,
    pub quote_char: char,
    /// Wrap character and binary fields in quotes on write, and honour
    /// quotes on read.
    pub quoting: bool,
    /// `""` inside a quoted field stands for one quote. When false, interior
    /// quotes are literal and only the last quote before a delimiter closes.
    pub double_quote_escape: bool,
    /// First record carries column names.
    pub header: bool,
    /// Drop records consisting of a single zero-length unquoted field.
    pub filter_empty_lines: bool,
    pub read_buffer_size: usize,
    pub write_buffer_size: usize,
}

impl Default for CsvFormatOptions {
    fn default() -> Self {
        Self {
            row_delimiter: DEFAULT_ROW_DELIMITER,
            column_delimiter: DEFAULT_COLUMN_DELIMITER,
            quote_char: DEFAULT_QUOTE_CHAR,
            quoting: true,
            double_quote_escape: true,
            header: true,
            filter_empty_lines: true,
            read_buffer_size: DEFAULT_BUFFER_SIZE,
            write_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl CsvFormatOptions {
    pub fn with_row_delimiter(mut self, c: char) -> Self {
        self.row_delimiter = c;
        self
    }

    pub fn with_column_delimiter(mut self, c: char) -> Self {
        self.column_delimiter = c;
        self
    }

    pub fn with_quote_char(mut self, c: char) -> Self {
        self.quote_char = c;
        self
    }

    pub fn with_quoting(mut self, on: bool) -> Self {
        self.quoting = on;
        self
    }

    pub fn with_double_quote_escape(mut self, on: bool) -> Self {
        self.double_quote_escape = on;
        self
    }

    pub fn with_header(mut self, on: bool) -> Self {
        self.header = on;
        self
    }

    pub fn with_filter_empty_lines(mut self, on: bool) -> Self {
        self.filter_empty_lines = on;
        self
    }

    pub fn with_buffer_sizes(mut self, read: usize, write: usize) -> Self {
        self.read_buffer_size = read;
        self.write_buffer_size = write;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let specials = [
            ("row delimiter", self.row_delimiter),
            ("column delimiter", self.column_delimiter),
            ("quote character", self.quote_char),
        ];
        // Unquoted binary fields carry raw Base64 text.
        for (name, c) in &specials {
            if base64::is_symbol(*c) {
                return Err(Error::Config(format!(
                    "{} {:?} is a Base64 symbol",
                    name, c
                )));
            }
        }
        for (i, (a_name, a)) in specials.iter().enumerate() {
            for (b_name, b) in &specials[i + 1..] {
                if a == b {
                    return Err(Error::Config(format!(
                        "{} and {} are both {:?}",
                        a_name, b_name, a
                    )));
                }
            }
        }
        if self.read_buffer_size == 0 || self.write_buffer_size == 0 {
            return Err(Error::Config("buffer sizes must be non-zero".into()));
        }
        Ok(())
    }
}

/// Controls which statements the DML writer emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmlOptions {
    /// Emit INSERT for snapshot (`Current`) rows.
    pub import: bool,
    /// Emit INSERT/UPDATE/DELETE for change-kind rows.
    pub sync: bool,
    /// Emit a blanket `DELETE FROM table` after the opening commit.
    pub full_replace: bool,
    /// Data statements per `COMMIT`; 0 disables periodic commits.
    pub commit_batch_size: usize,
    /// Wrap table and column names in double quotes.
    pub quote_identifiers: bool,
}

impl Default for DmlOptions {
    fn default() -> Self {
        Self {
            import: true,
            sync: false,
            full_replace: false,
            commit_batch_size: 0,
            quote_identifiers: false,
        }
    }
}

impl DmlOptions {
    pub fn with_import(mut self, on: bool) -> Self {
        self.import = on;
        self
    }

    pub fn with_sync(mut self, on: bool) -> Self {
        self.sync = on;
        self
    }

    pub fn with_full_replace(mut self, on: bool) -> Self {
        self.full_replace = on;
        self
    }

    pub fn with_commit_batch_size(mut self, n: usize) -> Self {
        self.commit_batch_size = n;
        self
    }

    pub fn with_quote_identifiers(mut self, on: bool) -> Self {
        self.quote_identifiers = on;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let opts = CsvFormatOptions::default();
        assert!(opts.validate().is_ok());
        assert_eq!(opts.column_delimiter, ',');
        assert_eq!(opts.quote_char, '"');
        assert!(opts.double_quote_escape);
    }

    #[test]
    fn clashing_specials_are_rejected() {
        let opts = CsvFormatOptions::default().with_quote_char(',');
        let err = opts.validate().unwrap_err();
        assert!(err.to_string().contains("column delimiter and quote character"));
    }

    #[test]
    fn base64_symbols_are_rejected_as_specials() {
        for c in ['+', '/', '=', 'a', 'Z', '0'] {
            assert!(CsvFormatOptions::default().with_column_delimiter(c).validate().is_err());
            assert!(CsvFormatOptions::default().with_quote_char(c).validate().is_err());
            assert!(CsvFormatOptions::default().with_row_delimiter(c).validate().is_err());
        }
        let err = CsvFormatOptions::default()
            .with_column_delimiter('+')
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("Base64 symbol"), "{}", err);
        for c in [';', '|', '\t', '\'', '-', '.', ' ', 'é'] {
            assert!(CsvFormatOptions::default().with_column_delimiter(c).validate().is_ok());
        }
    }

    #[test]
    fn zero_buffers_are_rejected() {
        let opts = CsvFormatOptions::default().with_buffer_sizes(0, 16);
        assert!(opts.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let opts: CsvFormatOptions =
            serde_json::from_str(r#"{"column_delimiter":";","header":false}"#).unwrap();
        assert_eq!(opts.column_delimiter, ';');
        assert!(!opts.header);
        assert!(opts.quoting);

        let dml: DmlOptions = serde_json::from_str(r#"{"sync":true}"#).unwrap();
        assert!(dml.import && dml.sync && !dml.full_replace);
    }
}
