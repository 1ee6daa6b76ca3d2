pub mod csv;
pub mod dml;
