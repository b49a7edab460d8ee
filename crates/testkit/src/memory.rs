use std::{cell::RefCell, collections::BTreeMap, rc::Rc, sync::Arc};

use tracing::{debug, trace};
use udal_core::{
    CallResult, CellValue, ColumnDescription, ColumnShape, Completion, ConnectionDescriptor,
    DatabaseConfig, Diagnostic, Driver, LogicalType, NativeStatement, NativeType, Parameter,
    PrepareOptions, Protocol, StorageType, TransactionMode, TransactionOutcome, Value, Vendor,
    driver::not_implemented,
    typemap::oci,
};

use crate::target::Target;

const CURSOR_NAME_PREFIX: &str = "SQL_CUR";
const NOT_CONNECTED_STATE: &str = "08003";
const LINK_FAILURE_STATE: &str = "08S01";
const READ_ONLY_STATE: &str = "25006";
const UNDEFINED_OBJECT_STATE: &str = "42S02";
const CONVERSION_STATE: &str = "22018";
const INVALID_CURSOR_STATE: &str = "24000";

/// A result or update column of a seeded procedure or table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub logical_type: LogicalType,
    pub dimension: usize,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, logical_type: LogicalType, dimension: usize) -> Self {
        Self {
            name: name.into(),
            logical_type,
            dimension,
        }
    }

    /// The description a real driver of `vendor` would report for this column.
    #[must_use]
    pub fn describe(&self, vendor: Vendor) -> ColumnDescription {
        let (code, size) = match vendor.protocol() {
            Protocol::CallInterface => oracle_description(self.logical_type, self.dimension),
            Protocol::Odbc => (
                vendor
                    .native_type(self.logical_type, self.dimension)
                    .map_or(0, |native| native.0),
                self.dimension,
            ),
        };
        ColumnDescription {
            name: self.name.clone(),
            native_type: NativeType(code),
            size,
            scale: 0,
        }
    }
}

fn oracle_description(logical_type: LogicalType, dimension: usize) -> (i32, usize) {
    match logical_type {
        LogicalType::Char => (oci::SQLT_STR, dimension),
        LogicalType::Number => (oci::SQLT_NUM, 22),
        LogicalType::Date => (oci::SQLT_DAT, 7),
        LogicalType::Timestamp => (oci::SQLT_TIMESTAMP, 11),
        LogicalType::ShortInt => (oci::SQLT_INT, 2),
        LogicalType::LongInt => (oci::SQLT_INT, 8),
        LogicalType::LargeChar => (oci::SQLT_CLOB, 0),
        LogicalType::Binary => (oci::SQLT_BLOB, 0),
        LogicalType::Cursor => (oci::SQLT_RSET, 0),
        LogicalType::Array => (oci::SQLT_NTY, 0),
        LogicalType::Invalid => (0, dimension),
    }
}

/// Canned outcome of one stored procedure, matched by name in the call text.
#[derive(Debug, Clone, Default)]
pub struct Procedure {
    columns: Vec<ColumnSpec>,
    rows: Vec<Vec<CellValue>>,
    affected: u64,
    outputs: BTreeMap<String, CellValue>,
    warning: Option<Diagnostic>,
}

impl Procedure {
    pub fn query(columns: Vec<ColumnSpec>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            columns,
            rows,
            ..Self::default()
        }
    }

    pub fn update(affected: u64) -> Self {
        Self {
            affected,
            ..Self::default()
        }
    }

    /// Value read back into the output parameter named `name`.
    #[must_use]
    pub fn with_output(mut self, name: &str, value: CellValue) -> Self {
        self.outputs.insert(name.to_ascii_uppercase(), value);
        self
    }

    #[must_use]
    pub fn with_warning(mut self, warning: Diagnostic) -> Self {
        self.warning = Some(warning);
        self
    }
}

#[derive(Debug, Clone, Default)]
struct Table {
    columns: Vec<ColumnSpec>,
    rows: Vec<Vec<CellValue>>,
}

/// Observable driver activity. Gauges (`open_*`) go back to zero once every
/// statement has been released or dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub login_attempts: usize,
    pub logins: usize,
    pub disconnects: usize,
    pub prepares: usize,
    pub describes: usize,
    pub executes: usize,
    pub binds: usize,
    pub released: usize,
    /// Prepares that allowed the backend's own statement cache.
    pub native_cache_prepares: usize,
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub lob_chunks_written: usize,
    pub lob_chunks_read: usize,
    pub open_statements: usize,
    pub open_temporary_lobs: usize,
}

impl Counters {
    /// Looks a counter up by its field name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<usize> {
        Some(match name {
            "login_attempts" => self.login_attempts,
            "logins" => self.logins,
            "disconnects" => self.disconnects,
            "prepares" => self.prepares,
            "describes" => self.describes,
            "executes" => self.executes,
            "binds" => self.binds,
            "released" => self.released,
            "native_cache_prepares" => self.native_cache_prepares,
            "begins" => self.begins,
            "commits" => self.commits,
            "rollbacks" => self.rollbacks,
            "lob_chunks_written" => self.lob_chunks_written,
            "lob_chunks_read" => self.lob_chunks_read,
            "open_statements" => self.open_statements,
            "open_temporary_lobs" => self.open_temporary_lobs,
            _ => return None,
        })
    }
}

#[derive(Debug)]
struct MemoryState {
    procedures: BTreeMap<String, Procedure>,
    tables: BTreeMap<String, Table>,
    snapshot: Option<BTreeMap<String, Table>>,
    transaction: Option<TransactionMode>,
    connected: bool,
    failing_logins: usize,
    login_failure: Option<Diagnostic>,
    execute_failures: Vec<(String, Diagnostic)>,
    scrollable_cursors: bool,
    next_cursor: usize,
    /// Row each open ODBC cursor is positioned on, by cursor name. `None`
    /// before the first fetch and after the last.
    cursor_rows: BTreeMap<String, Option<usize>>,
    executed: Vec<String>,
    counters: Counters,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            procedures: BTreeMap::new(),
            tables: BTreeMap::new(),
            snapshot: None,
            transaction: None,
            connected: false,
            failing_logins: 0,
            login_failure: None,
            execute_failures: Vec::new(),
            scrollable_cursors: true,
            next_cursor: 1,
            cursor_rows: BTreeMap::new(),
            executed: Vec::new(),
            counters: Counters::default(),
        }
    }
}

impl MemoryState {
    /// Session loss: the server discards uncommitted work.
    fn drop_session(&mut self) {
        self.connected = false;
        self.transaction = None;
        if let Some(snapshot) = self.snapshot.take() {
            self.tables = snapshot;
        }
    }
}

/// In-process backend with seeded procedures and tables.
///
/// Every clone shares one catalog, so a test keeps a handle for seeding,
/// failure injection and counters while the [`udal_core::Database`] owns
/// another.
#[derive(Debug, Clone)]
pub struct MemoryDriver {
    vendor: Vendor,
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryDriver {
    pub fn new(vendor: Vendor) -> Self {
        Self {
            vendor,
            state: Rc::new(RefCell::new(MemoryState::default())),
        }
    }

    pub fn procedure(&self, name: &str, procedure: Procedure) {
        self.state
            .borrow_mut()
            .procedures
            .insert(name.to_ascii_uppercase(), procedure);
    }

    pub fn table(&self, name: &str, columns: Vec<ColumnSpec>, rows: Vec<Vec<CellValue>>) {
        self.state
            .borrow_mut()
            .tables
            .insert(name.to_ascii_uppercase(), Table { columns, rows });
    }

    /// Current rows of a seeded table.
    #[must_use]
    pub fn rows(&self, table: &str) -> Option<Vec<Vec<CellValue>>> {
        self.state
            .borrow()
            .tables
            .get(&table.to_ascii_uppercase())
            .map(|table| table.rows.clone())
    }

    /// Rejects the next `count` login attempts with `diagnostic`.
    pub fn fail_logins(&self, count: usize, diagnostic: Diagnostic) {
        let mut state = self.state.borrow_mut();
        state.failing_logins = count;
        state.login_failure = Some(diagnostic);
    }

    /// Fails execution of every statement whose text contains `fragment`,
    /// ignoring case. A connection-lost diagnostic also drops the session.
    pub fn fail_execute(&self, fragment: &str, diagnostic: Diagnostic) {
        self.state
            .borrow_mut()
            .execute_failures
            .push((fragment.to_ascii_uppercase(), diagnostic));
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.borrow_mut();
        state.execute_failures.clear();
        state.failing_logins = 0;
        state.login_failure = None;
    }

    pub fn set_scrollable_cursors(&self, scrollable: bool) {
        self.state.borrow_mut().scrollable_cursors = scrollable;
    }

    /// Simulates the server closing the session underneath the client.
    pub fn sever(&self) {
        self.state.borrow_mut().drop_session();
    }

    #[must_use]
    pub fn counters(&self) -> Counters {
        self.state.borrow().counters
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    #[must_use]
    pub fn transaction(&self) -> Option<TransactionMode> {
        self.state.borrow().transaction
    }

    /// Compiled statement texts in execution order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.state.borrow().executed.clone()
    }
}

fn not_connected(vendor: Vendor) -> Diagnostic {
    match vendor.protocol() {
        Protocol::CallInterface => Diagnostic::new(3114, "not connected to ORACLE"),
        Protocol::Odbc => {
            Diagnostic::new(0, "connection not open").with_sql_state(NOT_CONNECTED_STATE)
        }
    }
}

/// The diagnostic a `vendor` reports when the server goes away mid-call.
#[must_use]
pub fn connection_lost(vendor: Vendor) -> Diagnostic {
    match vendor {
        Vendor::Oracle => Diagnostic::new(3113, "end-of-file on communication channel"),
        Vendor::Db2 => Diagnostic::new(-30081, "a communication error has been detected")
            .with_sql_state(LINK_FAILURE_STATE),
        Vendor::SqlServer => Diagnostic::new(10054, "communication link failure")
            .with_sql_state(LINK_FAILURE_STATE),
        Vendor::PostgreSql => {
            Diagnostic::new(0, "server closed the connection unexpectedly")
                .with_sql_state(LINK_FAILURE_STATE)
        }
        Vendor::Informix => {
            Diagnostic::new(-908, "attempt to connect to database server failed")
                .with_sql_state(LINK_FAILURE_STATE)
        }
    }
}

fn read_only_violation(vendor: Vendor) -> Diagnostic {
    match vendor.protocol() {
        Protocol::CallInterface => Diagnostic::new(
            1456,
            "may not perform insert/delete/update operation inside a READ ONLY transaction",
        ),
        Protocol::Odbc => Diagnostic::new(-817, "read-only transaction cannot modify data")
            .with_sql_state(READ_ONLY_STATE),
    }
}

fn undefined_object(vendor: Vendor, name: &str) -> Diagnostic {
    match vendor.protocol() {
        Protocol::CallInterface => {
            Diagnostic::new(6550, format!("PLS-00201: identifier '{name}' must be declared"))
        }
        Protocol::Odbc => Diagnostic::new(-204, format!("{name} is an undefined name"))
            .with_sql_state(UNDEFINED_OBJECT_STATE),
    }
}

fn conversion_failure(vendor: Vendor, message: String) -> Diagnostic {
    match vendor.protocol() {
        Protocol::CallInterface => Diagnostic::new(1722, message),
        Protocol::Odbc => Diagnostic::new(-420, message).with_sql_state(CONVERSION_STATE),
    }
}

fn chunk_count(length: usize, chunk_size: usize) -> usize {
    length.div_ceil(chunk_size.max(1))
}

impl Driver for MemoryDriver {
    type Statement = MemoryStatement;

    fn vendor(&self) -> Vendor {
        self.vendor
    }

    fn connect(
        &mut self,
        descriptor: &ConnectionDescriptor,
        _config: &DatabaseConfig,
    ) -> CallResult<()> {
        let mut state = self.state.borrow_mut();
        state.counters.login_attempts += 1;
        if state.failing_logins > 0 {
            state.failing_logins -= 1;
            return Err(state
                .login_failure
                .clone()
                .unwrap_or_else(|| Diagnostic::driver("login refused")));
        }

        debug!(vendor = self.vendor.name(), user = %descriptor.user, "memory login");
        state.counters.logins += 1;
        state.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Vec<Diagnostic> {
        let mut state = self.state.borrow_mut();
        if state.connected {
            state.counters.disconnects += 1;
            state.drop_session();
        }
        Vec::new()
    }

    fn begin_transaction(&mut self, mode: TransactionMode) -> CallResult<()> {
        let mut state = self.state.borrow_mut();
        if !state.connected {
            return Err(not_connected(self.vendor));
        }
        state.counters.begins += 1;
        state.snapshot = Some(state.tables.clone());
        state.transaction = Some(mode);
        Ok(())
    }

    fn end_transaction(&mut self, outcome: TransactionOutcome) -> CallResult<()> {
        let mut state = self.state.borrow_mut();
        if !state.connected {
            return Err(not_connected(self.vendor));
        }
        state.transaction = None;
        let snapshot = state.snapshot.take();
        match outcome {
            TransactionOutcome::Commit => state.counters.commits += 1,
            TransactionOutcome::Rollback => {
                state.counters.rollbacks += 1;
                if let Some(snapshot) = snapshot {
                    state.tables = snapshot;
                }
            }
        }
        Ok(())
    }

    fn prepare(&mut self, sql: &str, options: &PrepareOptions<'_>) -> CallResult<MemoryStatement> {
        let mut state = self.state.borrow_mut();
        if !state.connected {
            return Err(not_connected(self.vendor));
        }
        state.counters.prepares += 1;
        state.counters.open_statements += 1;
        if options.use_native_cache {
            state.counters.native_cache_prepares += 1;
        }
        let cursor = state.next_cursor;
        state.next_cursor += 1;
        trace!(sql, cursor, "memory prepare");

        Ok(MemoryStatement {
            sql: sql.to_string(),
            target: Target::parse(sql),
            vendor: self.vendor,
            state: Rc::clone(&self.state),
            lob_chunk_size: options.lob_chunk_size,
            scrollable: options.scrollable,
            cursor_name: format!("{CURSOR_NAME_PREFIX}{cursor}"),
            binds: BTreeMap::new(),
            row_locator: None,
            temporary_lobs: 0,
            columns: Vec::new(),
            rows: Vec::new(),
            next_row: 0,
            current_row: None,
            affected: 0,
            outputs: BTreeMap::new(),
            released: false,
        })
    }
}

/// A prepared statement against the shared catalog. Results are snapshotted
/// at execute.
#[derive(Debug)]
pub struct MemoryStatement {
    sql: String,
    target: Target,
    vendor: Vendor,
    state: Rc<RefCell<MemoryState>>,
    lob_chunk_size: usize,
    scrollable: bool,
    cursor_name: String,
    binds: BTreeMap<usize, Value>,
    row_locator: Option<String>,
    temporary_lobs: usize,
    columns: Vec<ColumnSpec>,
    rows: Vec<Vec<CellValue>>,
    next_row: usize,
    current_row: Option<usize>,
    affected: u64,
    outputs: BTreeMap<String, CellValue>,
    released: bool,
}

impl MemoryStatement {
    fn run(&mut self, state: &mut MemoryState) -> CallResult<Option<Diagnostic>> {
        if self.target.modifies_data() && state.transaction == Some(TransactionMode::ReadOnly) {
            return Err(read_only_violation(self.vendor));
        }

        match self.target.clone() {
            Target::Procedure(name) => {
                let procedure = state
                    .procedures
                    .get(&name)
                    .ok_or_else(|| undefined_object(self.vendor, &name))?;
                if state.transaction == Some(TransactionMode::ReadOnly) && procedure.affected > 0 {
                    return Err(read_only_violation(self.vendor));
                }
                self.columns = procedure.columns.clone();
                self.rows = procedure.rows.clone();
                self.affected = procedure.affected;
                self.outputs = procedure.outputs.clone();
                Ok(procedure.warning.clone())
            }
            Target::Select(name) => {
                let table = state
                    .tables
                    .get(&name)
                    .ok_or_else(|| undefined_object(self.vendor, &name))?;
                self.columns = table.columns.clone();
                self.rows = table.rows.clone();
                Ok(None)
            }
            Target::Insert(name) => {
                let vendor = self.vendor;
                let values: Vec<Value> = self.binds.values().cloned().collect();
                let table = state
                    .tables
                    .get_mut(&name)
                    .ok_or_else(|| undefined_object(vendor, &name))?;
                if values.len() != table.columns.len() {
                    return Err(Diagnostic::driver(format!(
                        "{name} has {} columns but {} values were bound",
                        table.columns.len(),
                        values.len()
                    )));
                }
                let row = table
                    .columns
                    .iter()
                    .zip(values)
                    .map(|(column, value)| stored_cell(vendor, column, value))
                    .collect::<CallResult<Vec<_>>>()?;
                table.rows.push(row);
                self.affected = 1;
                Ok(None)
            }
            Target::Update {
                table,
                positioned,
                cursor,
            } => {
                if let Some(cursor) = cursor
                    && !matches!(state.cursor_rows.get(&cursor), Some(Some(_)))
                {
                    return Err(Diagnostic::new(0, format!("cursor {cursor} is not positioned on a row"))
                        .with_sql_state(INVALID_CURSOR_STATE));
                }
                let rows = state
                    .tables
                    .get(&table)
                    .ok_or_else(|| undefined_object(self.vendor, &table))?
                    .rows
                    .len();
                self.affected = if positioned { 1 } else { rows as u64 };
                Ok(None)
            }
            Target::Delete(name) => {
                let table = state
                    .tables
                    .get_mut(&name)
                    .ok_or_else(|| undefined_object(self.vendor, &name))?;
                self.affected = table.rows.len() as u64;
                table.rows.clear();
                Ok(None)
            }
            Target::Other => Ok(None),
        }
    }

    fn move_to(&mut self, row: Option<usize>) {
        self.current_row = row;
        self.state
            .borrow_mut()
            .cursor_rows
            .insert(self.cursor_name.clone(), row);
    }

    fn free_temporaries(&mut self) {
        if self.temporary_lobs > 0 {
            self.state.borrow_mut().counters.open_temporary_lobs -= self.temporary_lobs;
            self.temporary_lobs = 0;
        }
    }
}

/// Converts a bound value into the cell a later fetch of `column` returns.
fn stored_cell(vendor: Vendor, column: &ColumnSpec, value: Value) -> CallResult<CellValue> {
    if value.is_null() {
        return Ok(CellValue::Null);
    }

    match (column.logical_type.storage_type(), value) {
        (StorageType::ShortInt, value) => {
            let number = integer(vendor, column, &value)?;
            i16::try_from(number).map(CellValue::ShortInt).map_err(|_| {
                conversion_failure(
                    vendor,
                    format!("{number} does not fit column {}", column.name),
                )
            })
        }
        (StorageType::LongInt, value) => integer(vendor, column, &value).map(CellValue::LongInt),
        (StorageType::Char, Value::Binary(Some(bytes))) => Ok(CellValue::Bytes(bytes)),
        (StorageType::Char, Value::ShortInt(Some(number))) => {
            Ok(CellValue::Text(number.to_string()))
        }
        (StorageType::Char, Value::LongInt(Some(number))) => {
            Ok(CellValue::Text(number.to_string()))
        }
        (StorageType::Char, value) => {
            let text = value.as_text().unwrap_or_default();
            Ok(match column.logical_type {
                LogicalType::Binary => CellValue::Bytes(text.as_bytes().to_vec()),
                LogicalType::Char => CellValue::Text(clip(text, column.dimension)),
                _ => CellValue::Text(text.to_string()),
            })
        }
    }
}

/// Fixed-width character columns keep at most `dimension` bytes.
fn clip(text: &str, dimension: usize) -> String {
    let mut end = text.len().min(dimension);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

fn integer(vendor: Vendor, column: &ColumnSpec, value: &Value) -> CallResult<i64> {
    match value {
        Value::ShortInt(Some(number)) => Ok(i64::from(*number)),
        Value::LongInt(Some(number)) => Ok(*number),
        other => other
            .as_text()
            .and_then(|text| text.trim().parse().ok())
            .ok_or_else(|| {
                conversion_failure(vendor, format!("invalid number for column {}", column.name))
            }),
    }
}

impl NativeStatement for MemoryStatement {
    fn bind_cursor_output(&mut self, _position: usize) -> CallResult<()> {
        if self.vendor.protocol() != Protocol::CallInterface {
            return Err(not_implemented("result cursors are not bound on ODBC"));
        }
        Ok(())
    }

    fn bind(&mut self, position: usize, parameter: &Parameter) -> CallResult<()> {
        let value = parameter.bind_value();
        let mut state = self.state.borrow_mut();
        state.counters.binds += 1;

        match &value {
            Value::LargeChar(Some(text)) => {
                state.counters.lob_chunks_written += chunk_count(text.len(), self.lob_chunk_size);
                state.counters.open_temporary_lobs += 1;
                self.temporary_lobs += 1;
            }
            Value::Binary(Some(bytes)) => {
                state.counters.lob_chunks_written += chunk_count(bytes.len(), self.lob_chunk_size);
                state.counters.open_temporary_lobs += 1;
                self.temporary_lobs += 1;
            }
            Value::Array(elements) if self.vendor.is_odbc() => {
                for (offset, element) in elements.iter().enumerate() {
                    self.binds
                        .insert(position + offset, Value::Char(Some(element.clone())));
                }
                return Ok(());
            }
            _ => {}
        }
        self.binds.insert(position, value);
        Ok(())
    }

    fn bind_row_locator(&mut self, locator: &str) -> CallResult<()> {
        self.row_locator = Some(locator.to_string());
        Ok(())
    }

    fn execute(&mut self) -> CallResult<Completion> {
        let shared = Rc::clone(&self.state);
        let mut state = shared.borrow_mut();
        if !state.connected {
            return Err(not_connected(self.vendor));
        }

        let upper = self.sql.to_ascii_uppercase();
        if let Some((_, diagnostic)) = state
            .execute_failures
            .iter()
            .find(|(fragment, _)| upper.contains(fragment.as_str()))
        {
            let diagnostic = diagnostic.clone();
            if self.vendor.is_connection_lost(&diagnostic) {
                state.drop_session();
            }
            return Err(diagnostic);
        }

        state.counters.executes += 1;
        state.executed.push(self.sql.clone());
        self.next_row = 0;
        self.current_row = None;
        state.cursor_rows.insert(self.cursor_name.clone(), None);
        Ok(match self.run(&mut state)? {
            Some(warning) => Completion::SuccessWithWarning(warning),
            None => Completion::Success,
        })
    }

    fn describe(&mut self) -> CallResult<Vec<ColumnDescription>> {
        self.state.borrow_mut().counters.describes += 1;
        Ok(self
            .columns
            .iter()
            .map(|column| column.describe(self.vendor))
            .collect())
    }

    fn fetch(&mut self, columns: &[Arc<ColumnShape>]) -> CallResult<Option<Vec<CellValue>>> {
        let Some(row) = self.rows.get(self.next_row).cloned() else {
            self.move_to(None);
            return Ok(None);
        };
        if row.len() != columns.len() {
            return Err(Diagnostic::driver(format!(
                "row has {} cells for {} bound columns",
                row.len(),
                columns.len()
            )));
        }

        let chunks: usize = columns
            .iter()
            .zip(&row)
            .filter(|(shape, _)| shape.logical_type.is_lob())
            .filter_map(|(_, cell)| cell.as_bytes())
            .map(|bytes| chunk_count(bytes.len(), self.lob_chunk_size))
            .sum();
        self.state.borrow_mut().counters.lob_chunks_read += chunks;

        self.move_to(Some(self.next_row));
        self.next_row += 1;
        Ok(Some(row))
    }

    fn affected_rows(&mut self) -> CallResult<u64> {
        Ok(self.affected)
    }

    fn read_output(&mut self, _position: usize, parameter: &Parameter) -> CallResult<CellValue> {
        Ok(self
            .outputs
            .get(&parameter.name().to_ascii_uppercase())
            .cloned()
            .unwrap_or_default())
    }

    fn cursor_name(&mut self) -> CallResult<Option<String>> {
        Ok(match self.vendor.protocol() {
            Protocol::CallInterface => None,
            Protocol::Odbc => Some(self.cursor_name.clone()),
        })
    }

    fn row_locator(&self) -> Option<String> {
        if self.vendor.protocol() != Protocol::CallInterface {
            return None;
        }
        let index = self.current_row?;
        let column = self
            .columns
            .iter()
            .position(|column| column.name.eq_ignore_ascii_case("ROWID"));
        match (column, &self.target) {
            (Some(column), _) => self
                .rows
                .get(index)?
                .get(column)
                .and_then(CellValue::as_str)
                .map(ToString::to_string),
            (None, Target::Select(table)) => Some(format!("{table}.{index}")),
            (None, _) => None,
        }
    }

    fn rewind(&mut self) -> CallResult<()> {
        if !self.scrollable || !self.state.borrow().scrollable_cursors {
            return Err(not_implemented("cursor is not scrollable"));
        }
        self.next_row = 0;
        self.move_to(None);
        Ok(())
    }

    fn release(mut self) -> CallResult<()> {
        self.free_temporaries();
        let mut state = self.state.borrow_mut();
        state.cursor_rows.remove(&self.cursor_name);
        state.counters.released += 1;
        state.counters.open_statements -= 1;
        drop(state);
        self.released = true;
        Ok(())
    }
}

impl Drop for MemoryStatement {
    fn drop(&mut self) {
        self.free_temporaries();
        if !self.released {
            let mut state = self.state.borrow_mut();
            state.cursor_rows.remove(&self.cursor_name);
            state.counters.open_statements -= 1;
        }
    }
}
