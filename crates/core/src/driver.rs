use std::sync::Arc;

use crate::{
    CallResult, CellValue, ColumnDescription, ColumnShape, Completion, ConnectionDescriptor,
    DatabaseConfig, Diagnostic, Parameter, Vendor,
};

/// SQLSTATE drivers report for an optional capability they do not have.
pub const NOT_IMPLEMENTED_STATE: &str = "HYC00";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionOutcome {
    Commit,
    Rollback,
}

/// Options for preparing one statement handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepareOptions<'a> {
    /// The statement produces a result set rather than an affected-row count.
    pub returns_rows: bool,
    /// The cursor may be held and repositioned after the fetch.
    pub scrollable: bool,
    /// Prepare through the driver's own statement cache when it has one.
    pub use_native_cache: bool,
    /// Row cap requested by the caller; `0` means unbounded.
    pub fetch_limit: usize,
    pub lob_chunk_size: usize,
    pub date_format: &'a str,
    pub array_type_name: Option<&'a str>,
}

/// Native capabilities of one backend: connection-level operations.
///
/// Implementations own every native handle they allocate and release them on
/// drop. Failures come back as [`Diagnostic`] records; classification into
/// public errors happens in [`crate::Database`].
pub trait Driver {
    type Statement: NativeStatement;

    fn vendor(&self) -> Vendor;

    /// One login attempt. Retries and backoff belong to the caller.
    fn connect(
        &mut self,
        descriptor: &ConnectionDescriptor,
        config: &DatabaseConfig,
    ) -> CallResult<()>;

    /// Releases session, server and connection handles. Never fails; release
    /// problems are returned for logging.
    fn disconnect(&mut self) -> Vec<Diagnostic>;

    fn begin_transaction(&mut self, mode: TransactionMode) -> CallResult<()>;

    /// Commits or rolls back. Transaction-scoped handles are released whether
    /// or not this succeeds.
    fn end_transaction(&mut self, outcome: TransactionOutcome) -> CallResult<()>;

    fn prepare(&mut self, sql: &str, options: &PrepareOptions<'_>) -> CallResult<Self::Statement>;
}

/// Native capabilities of one prepared statement handle.
///
/// Temporary resources created while binding (large-object locators,
/// collection objects, date descriptors, element buffers) belong to the
/// statement and are freed with it.
pub trait NativeStatement {
    /// Binds the output cursor a query procedure returns its rows through.
    fn bind_cursor_output(&mut self, position: usize) -> CallResult<()>;

    /// Binds `parameter` at `position` (1-based). Arrays expanded into element
    /// lists occupy consecutive positions starting there.
    fn bind(&mut self, position: usize, parameter: &Parameter) -> CallResult<()>;

    /// Binds the row locator used by a positioned update.
    fn bind_row_locator(&mut self, locator: &str) -> CallResult<()>;

    fn execute(&mut self) -> CallResult<Completion>;

    fn describe(&mut self) -> CallResult<Vec<ColumnDescription>>;

    /// Fetches the next row, performing out-of-band reads for large-object
    /// and date columns. `None` once the driver reports no more data.
    fn fetch(&mut self, columns: &[Arc<ColumnShape>]) -> CallResult<Option<Vec<CellValue>>>;

    fn affected_rows(&mut self) -> CallResult<u64>;

    /// Reads an output parameter back after execution.
    fn read_output(&mut self, position: usize, parameter: &Parameter) -> CallResult<CellValue>;

    /// Name positioned updates refer to, when the protocol has one.
    fn cursor_name(&mut self) -> CallResult<Option<String>>;

    /// Locator of the row the cursor is currently positioned on, when the
    /// protocol addresses rows that way.
    fn row_locator(&self) -> Option<String>;

    /// Moves a held cursor back before its first row.
    fn rewind(&mut self) -> CallResult<()>;

    /// Releases the handle. Whether a native statement cache may keep it was
    /// decided by [`PrepareOptions::use_native_cache`] at prepare time.
    fn release(self) -> CallResult<()>
    where
        Self: Sized;
}

/// Diagnostic a driver returns for a capability its backend lacks.
pub fn not_implemented(message: impl Into<String>) -> Diagnostic {
    Diagnostic::new(0, message).with_sql_state(NOT_IMPLEMENTED_STATE)
}
