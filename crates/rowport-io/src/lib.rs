#![forbid(unsafe_code)]
//! rowport-io: streaming adapters between rows and text.
//!
//! - `readers`: the CSV tokenizer and the pull-based `CsvReader`.
//! - `writers`: push-based `CsvWriter` and `DmlWriter`.
//! - `transfer`: source → sink pipe with a cooperative cancel flag.
//! - `digest`: pass-through writer that hashes what it writes.
//!
//! Everything here is synchronous and single-threaded. Distinct readers and
//! writers share no state and may run on different threads.

pub mod digest;
pub mod readers;
pub mod transfer;
pub mod writers;

pub mod error;

pub use digest::{Digest, DigestWriter};
pub use readers::csv::{CsvReader, CsvRow};
pub use transfer::{transfer, MemorySink, MemorySource, RowSink, RowSource, TransferStats};
pub use writers::csv::CsvWriter;
pub use writers::dml::DmlWriter;
