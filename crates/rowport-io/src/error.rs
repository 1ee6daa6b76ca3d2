use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] rowport_core::Error),

    #[error("invalid UTF-8 in record {row}")]
    InvalidUtf8 { row: u64 },

    #[error("cancelled after {rows} rows")]
    Cancelled { rows: u64 },
}

impl Error {
    pub fn with_context(self, context: impl Into<String>) -> Self {
        match self {
            Error::Core(e) => Error::Core(e.with_context(context)),
            other => Error::Core(rowport_core::Error::Context {
                context: context.into(),
                source: Box::new(other),
            }),
        }
    }

    pub fn is_format_error(&self) -> bool {
        match self {
            Error::Core(e) => e.is_format_error(),
            Error::InvalidUtf8 { .. } => true,
            _ => false,
        }
    }

    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Error::Core(e) => e.suggestions(),
            Error::InvalidUtf8 { .. } => {
                vec!["Re-encode the input as UTF-8 before importing".into()]
            }
            Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                vec!["Check that the input path exists".into()]
            }
            _ => vec![],
        }
    }
}
