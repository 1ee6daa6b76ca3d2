use thiserror::Error;

/// Canonical result for core.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A field could not be converted to the requested type.
    ///
    /// `row` is the 1-based record ordinal and `column` the 1-based column
    /// ordinal; either is 0 when not known at the point of failure.
    #[error("format error at row {row}, column {column}: {message}")]
    Format {
        row: u64,
        column: usize,
        message: String,
    },

    #[error("row {row} has {found} fields, expected {expected}")]
    ColumnCount {
        row: u64,
        expected: usize,
        found: usize,
    },

    #[error("unsupported column type '{type_name}' for column {column}")]
    UnsupportedType { column: usize, type_name: String },

    #[error("row {row} has unknown row kind")]
    UnknownRowKind { row: u64 },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Error with context chain for better debugging
    #[error("Error in {context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    pub fn format(row: u64, column: usize, message: impl Into<String>) -> Self {
        Error::Format {
            row,
            column,
            message: message.into(),
        }
    }

    /// Add context to an error, creating an error chain.
    ///
    /// # Example
    /// ```rust
    /// use rowport_core::error::Error;
    /// let err = Error::Schema("unknown key column 'id'".into());
    /// let err = err.with_context("while opening DML writer");
    /// assert!(err.to_string().contains("while opening DML writer"));
    /// ```
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self) as Box<dyn std::error::Error + Send + Sync>,
        }
    }

    /// True for the "malformed data" class: bad literals, wrong field
    /// counts and unsupported column types. These are never retried.
    pub fn is_format_error(&self) -> bool {
        match self {
            Error::Format { .. }
            | Error::ColumnCount { .. }
            | Error::UnsupportedType { .. }
            | Error::UnknownRowKind { .. } => true,
            Error::Context { source, .. } => source
                .downcast_ref::<Error>()
                .map(Error::is_format_error)
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Get suggestions for common errors.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Error::ColumnCount { expected, .. } => vec![
                format!("Every data row must carry exactly {} fields", expected),
                "Check for unquoted delimiters or quote characters inside values".into(),
                "Enable empty-line filtering if the file contains blank lines".into(),
            ],
            Error::Format { message, .. } => {
                if message.contains("date") || message.contains("time") {
                    vec![
                        "Temporal values must be ISO text (YYYY-MM-DD, HH:MM:SS, YYYY-MM-DD HH:MM:SS) or epoch milliseconds".into(),
                    ]
                } else if message.contains("boolean") {
                    vec!["Boolean values must be 0, 1, true or false".into()]
                } else {
                    vec!["Verify the column types declared in the schema match the data".into()]
                }
            }
            Error::UnsupportedType { type_name, .. } => vec![
                format!("Column type '{}' cannot be serialized by this writer", type_name),
                "Exclude the column from the schema or declare it with a supported type".into(),
            ],
            Error::Schema(msg) => {
                if msg.contains("key") {
                    vec!["Key column names must match column names exactly (case-sensitive)".into()]
                } else {
                    vec!["Check that the schema file lists every column in order".into()]
                }
            }
            Error::Context { source, .. } => source
                .downcast_ref::<Error>()
                .map(Error::suggestions)
                .unwrap_or_default(),
            _ => vec![],
        }
    }
}
