//! Call-interface backend for Oracle.
//!
//! The client libraries are loaded at runtime, so the crate builds without an
//! Oracle installation; connecting requires one.

mod convert;
mod driver;
mod lob;
mod statement;

pub use driver::OracleDriver;
pub use statement::OracleStatement;
