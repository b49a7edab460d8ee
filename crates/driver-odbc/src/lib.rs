//! Generic-connectivity backend for the ODBC-family vendors (Db2, SQL
//! Server, PostgreSQL, Informix), built on `odbc-api`.
//!
//! Linking against a driver manager is opt-in through the `native` feature;
//! parameter planning, data source resolution and diagnostic handling build
//! without one.

pub mod diag;
pub mod plan;
pub mod source;

#[cfg(feature = "native")]
mod driver;
#[cfg(feature = "native")]
mod statement;

#[cfg(feature = "native")]
pub use driver::OdbcDriver;
#[cfg(feature = "native")]
pub use statement::OdbcStatement;
