use std::sync::Arc;

use udal_core::{
    CallResult, CellValue, ColumnDescription, ColumnShape, Completion, ConnectionDescriptor,
    DatabaseConfig, Diagnostic, Driver, NativeStatement, Parameter, PrepareOptions,
    TransactionMode, TransactionOutcome, Vendor,
};
#[cfg(feature = "odbc")]
use udal_driver_odbc::{OdbcDriver, OdbcStatement};
#[cfg(feature = "oracle")]
use udal_driver_oracle::{OracleDriver, OracleStatement};

macro_rules! dispatch {
    ($value:expr, $inner:ident => $body:expr) => {
        match $value {
            #[cfg(feature = "oracle")]
            Self::Oracle($inner) => $body,
            #[cfg(feature = "odbc")]
            Self::Odbc($inner) => $body,
        }
    };
}

/// The compiled-in backends. Chosen once by the factory; every call is a
/// plain match rather than a virtual call.
pub enum Backend {
    #[cfg(feature = "oracle")]
    Oracle(OracleDriver),
    #[cfg(feature = "odbc")]
    Odbc(OdbcDriver),
}

pub enum BackendStatement {
    #[cfg(feature = "oracle")]
    Oracle(OracleStatement),
    #[cfg(feature = "odbc")]
    Odbc(OdbcStatement),
}

impl Driver for Backend {
    type Statement = BackendStatement;

    fn vendor(&self) -> Vendor {
        dispatch!(self, driver => driver.vendor())
    }

    fn connect(
        &mut self,
        descriptor: &ConnectionDescriptor,
        config: &DatabaseConfig,
    ) -> CallResult<()> {
        dispatch!(self, driver => driver.connect(descriptor, config))
    }

    fn disconnect(&mut self) -> Vec<Diagnostic> {
        dispatch!(self, driver => driver.disconnect())
    }

    fn begin_transaction(&mut self, mode: TransactionMode) -> CallResult<()> {
        dispatch!(self, driver => driver.begin_transaction(mode))
    }

    fn end_transaction(&mut self, outcome: TransactionOutcome) -> CallResult<()> {
        dispatch!(self, driver => driver.end_transaction(outcome))
    }

    fn prepare(&mut self, sql: &str, options: &PrepareOptions<'_>) -> CallResult<Self::Statement> {
        match self {
            #[cfg(feature = "oracle")]
            Self::Oracle(driver) => driver.prepare(sql, options).map(BackendStatement::Oracle),
            #[cfg(feature = "odbc")]
            Self::Odbc(driver) => driver.prepare(sql, options).map(BackendStatement::Odbc),
        }
    }
}

impl NativeStatement for BackendStatement {
    fn bind_cursor_output(&mut self, position: usize) -> CallResult<()> {
        dispatch!(self, statement => statement.bind_cursor_output(position))
    }

    fn bind(&mut self, position: usize, parameter: &Parameter) -> CallResult<()> {
        dispatch!(self, statement => statement.bind(position, parameter))
    }

    fn bind_row_locator(&mut self, locator: &str) -> CallResult<()> {
        dispatch!(self, statement => statement.bind_row_locator(locator))
    }

    fn execute(&mut self) -> CallResult<Completion> {
        dispatch!(self, statement => statement.execute())
    }

    fn describe(&mut self) -> CallResult<Vec<ColumnDescription>> {
        dispatch!(self, statement => statement.describe())
    }

    fn fetch(&mut self, columns: &[Arc<ColumnShape>]) -> CallResult<Option<Vec<CellValue>>> {
        dispatch!(self, statement => statement.fetch(columns))
    }

    fn affected_rows(&mut self) -> CallResult<u64> {
        dispatch!(self, statement => statement.affected_rows())
    }

    fn read_output(&mut self, position: usize, parameter: &Parameter) -> CallResult<CellValue> {
        dispatch!(self, statement => statement.read_output(position, parameter))
    }

    fn cursor_name(&mut self) -> CallResult<Option<String>> {
        dispatch!(self, statement => statement.cursor_name())
    }

    fn row_locator(&self) -> Option<String> {
        dispatch!(self, statement => statement.row_locator())
    }

    fn rewind(&mut self) -> CallResult<()> {
        dispatch!(self, statement => statement.rewind())
    }

    fn release(self) -> CallResult<()> {
        dispatch!(self, statement => statement.release())
    }
}
