#![forbid(unsafe_code)]
//! rowport-core: shared kernel for the rowport interchange toolkit.
//!
//! This crate contains only *pure* types, small helpers, and interfaces
//! (traits) that other crates implement. There is **no I/O** here.
//!
//! Crates that use this:
//! - rowport-io: implements the CSV reader/writer and the DML writer against
//!   the `Row` contract and the `MetaData` shape defined here.
//! - rowport-cli: loads schema/job files into `MetaData` and the option structs.

pub mod base64;
pub mod config;
pub mod error;
pub mod prelude;
pub mod row;
pub mod schema;
pub mod value;

pub use crate::error::{Error, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
