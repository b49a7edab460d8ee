mod cache;
mod column;
mod command;
mod config;
mod database;
pub mod datetime;
mod diagnostic;
pub mod driver;
mod error;
mod parameter;
pub mod typemap;
mod types;
mod value;
mod vendor;

pub use cache::StatementCache;
pub use column::{Column, ColumnDescription, ColumnShape, CursorId, ResultSet, Row};
pub use command::{Command, CommandKind, CompiledCommand, ExecuteOptions, Positioned};
pub use config::{ConnectionDescriptor, DEFAULT_DATE_FORMAT, DatabaseConfig};
pub use database::{ConnectionState, Database, Stats, require_updates};
pub use diagnostic::{CallResult, Completion, Diagnostic, ReturnCode};
pub use driver::{
    Driver, NativeStatement, PrepareOptions, TransactionMode, TransactionOutcome,
};
pub use error::{DbFailure, Error, ErrorKind, Result};
pub use parameter::Parameter;
pub use types::{LogicalType, NativeType, ParamDirection, StorageType};
pub use value::{CellValue, Value};
pub use vendor::{Protocol, ROWID_BIND_NAME, Vendor};
