pub mod csv;
pub mod tokenizer;

pub use tokenizer::{CsvCell, CsvTokenizer};
