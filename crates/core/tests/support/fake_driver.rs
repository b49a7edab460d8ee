use std::{cell::RefCell, collections::HashMap, rc::Rc, sync::Arc};

use udal_core::{
    CallResult, CellValue, ColumnDescription, ColumnShape, Completion, ConnectionDescriptor,
    DatabaseConfig, Diagnostic, Driver, NativeStatement, NativeType, Parameter, PrepareOptions,
    TransactionMode, TransactionOutcome, Value, Vendor, driver::not_implemented,
};

pub const CURSOR_NAME: &str = "SQL_CUR1";

/// Canned outcome for one compiled statement text.
#[derive(Debug, Clone, Default)]
pub struct Script {
    columns: Vec<ColumnDescription>,
    rows: Vec<Vec<CellValue>>,
    affected: u64,
    outputs: HashMap<usize, CellValue>,
    warning: Option<Diagnostic>,
}

#[allow(dead_code)]
impl Script {
    pub fn rows(columns: &[(&str, i32, usize)], rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            columns: columns
                .iter()
                .map(|(name, native_type, size)| ColumnDescription {
                    name: (*name).to_string(),
                    native_type: NativeType(*native_type),
                    size: *size,
                    scale: 0,
                })
                .collect(),
            rows,
            ..Self::default()
        }
    }

    pub fn affected(rows: u64) -> Self {
        Self {
            affected: rows,
            ..Self::default()
        }
    }

    pub fn with_output(mut self, position: usize, value: CellValue) -> Self {
        self.outputs.insert(position, value);
        self
    }

    pub fn with_warning(mut self, warning: Diagnostic) -> Self {
        self.warning = Some(warning);
        self
    }
}

#[derive(Debug, Default)]
struct FakeState {
    scripts: HashMap<String, Script>,
    failing_logins: usize,
    login_failure: Option<Diagnostic>,
    execute_failures: Vec<(String, Diagnostic)>,
    scrollable_cursors: bool,
    login_attempts: usize,
    logins: usize,
    disconnects: usize,
    connected: bool,
    prepared_sql: Vec<String>,
    describes: usize,
    executes: usize,
    open_statements: usize,
    released: usize,
    native_cache_prepares: usize,
    row_prepares: Vec<String>,
    begins: Vec<TransactionMode>,
    commits: usize,
    rollbacks: usize,
    bound: Vec<(String, usize, Value)>,
    cursor_binds: Vec<(String, usize)>,
    row_locators: Vec<(String, String)>,
}

/// Scripted in-process backend. Every clone of the handle sees the same state.
#[derive(Debug, Clone)]
pub struct FakeDriver {
    vendor: Vendor,
    state: Rc<RefCell<FakeState>>,
}

#[allow(dead_code)]
impl FakeDriver {
    pub fn new(vendor: Vendor) -> Self {
        Self {
            vendor,
            state: Rc::new(RefCell::new(FakeState {
                scrollable_cursors: true,
                ..FakeState::default()
            })),
        }
    }

    pub fn script(&self, sql: impl Into<String>, script: Script) {
        self.state.borrow_mut().scripts.insert(sql.into(), script);
    }

    pub fn fail_logins(&self, count: usize, diagnostic: Diagnostic) {
        let mut state = self.state.borrow_mut();
        state.failing_logins = count;
        state.login_failure = Some(diagnostic);
    }

    /// Fails execution of any statement whose text contains `fragment`.
    pub fn fail_execute(&self, fragment: impl Into<String>, diagnostic: Diagnostic) {
        self.state
            .borrow_mut()
            .execute_failures
            .push((fragment.into(), diagnostic));
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.borrow_mut();
        state.execute_failures.clear();
        state.failing_logins = 0;
    }

    pub fn set_scrollable_cursors(&self, scrollable: bool) {
        self.state.borrow_mut().scrollable_cursors = scrollable;
    }

    pub fn login_attempts(&self) -> usize {
        self.state.borrow().login_attempts
    }

    pub fn logins(&self) -> usize {
        self.state.borrow().logins
    }

    pub fn disconnects(&self) -> usize {
        self.state.borrow().disconnects
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    pub fn prepared_sql(&self) -> Vec<String> {
        self.state.borrow().prepared_sql.clone()
    }

    pub fn describes(&self) -> usize {
        self.state.borrow().describes
    }

    pub fn executes(&self) -> usize {
        self.state.borrow().executes
    }

    pub fn open_statements(&self) -> usize {
        self.state.borrow().open_statements
    }

    pub fn released(&self) -> usize {
        self.state.borrow().released
    }

    /// Prepares that allowed the backend's own statement cache.
    pub fn native_cache_prepares(&self) -> usize {
        self.state.borrow().native_cache_prepares
    }

    /// Statements prepared to produce a result set.
    pub fn row_prepares(&self) -> Vec<String> {
        self.state.borrow().row_prepares.clone()
    }

    pub fn begins(&self) -> Vec<TransactionMode> {
        self.state.borrow().begins.clone()
    }

    pub fn commits(&self) -> usize {
        self.state.borrow().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.state.borrow().rollbacks
    }

    pub fn bound(&self) -> Vec<(String, usize, Value)> {
        self.state.borrow().bound.clone()
    }

    pub fn cursor_binds(&self) -> Vec<(String, usize)> {
        self.state.borrow().cursor_binds.clone()
    }

    pub fn row_locators(&self) -> Vec<(String, String)> {
        self.state.borrow().row_locators.clone()
    }
}

impl Driver for FakeDriver {
    type Statement = FakeStatement;

    fn vendor(&self) -> Vendor {
        self.vendor
    }

    fn connect(
        &mut self,
        _descriptor: &ConnectionDescriptor,
        _config: &DatabaseConfig,
    ) -> CallResult<()> {
        let mut state = self.state.borrow_mut();
        state.login_attempts += 1;
        if state.failing_logins > 0 {
            state.failing_logins -= 1;
            return Err(state
                .login_failure
                .clone()
                .unwrap_or_else(|| Diagnostic::driver("login refused")));
        }
        state.logins += 1;
        state.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Vec<Diagnostic> {
        let mut state = self.state.borrow_mut();
        if state.connected {
            state.disconnects += 1;
            state.connected = false;
        }
        Vec::new()
    }

    fn begin_transaction(&mut self, mode: TransactionMode) -> CallResult<()> {
        self.state.borrow_mut().begins.push(mode);
        Ok(())
    }

    fn end_transaction(&mut self, outcome: TransactionOutcome) -> CallResult<()> {
        let mut state = self.state.borrow_mut();
        match outcome {
            TransactionOutcome::Commit => state.commits += 1,
            TransactionOutcome::Rollback => state.rollbacks += 1,
        }
        Ok(())
    }

    fn prepare(&mut self, sql: &str, options: &PrepareOptions<'_>) -> CallResult<FakeStatement> {
        let mut state = self.state.borrow_mut();
        if !state.connected {
            return Err(Diagnostic::new(0, "not connected").with_sql_state("08003"));
        }
        state.prepared_sql.push(sql.to_string());
        state.open_statements += 1;
        if options.use_native_cache {
            state.native_cache_prepares += 1;
        }
        if options.returns_rows {
            state.row_prepares.push(sql.to_string());
        }
        let script = state.scripts.get(sql).cloned().unwrap_or_default();

        Ok(FakeStatement {
            sql: sql.to_string(),
            state: Rc::clone(&self.state),
            script,
            next_row: 0,
            current_row: None,
            scrollable: options.scrollable,
            released: false,
        })
    }
}

#[derive(Debug)]
pub struct FakeStatement {
    sql: String,
    state: Rc<RefCell<FakeState>>,
    script: Script,
    next_row: usize,
    current_row: Option<usize>,
    scrollable: bool,
    released: bool,
}

impl NativeStatement for FakeStatement {
    fn bind_cursor_output(&mut self, position: usize) -> CallResult<()> {
        self.state
            .borrow_mut()
            .cursor_binds
            .push((self.sql.clone(), position));
        Ok(())
    }

    fn bind(&mut self, position: usize, parameter: &Parameter) -> CallResult<()> {
        self.state
            .borrow_mut()
            .bound
            .push((self.sql.clone(), position, parameter.bind_value()));
        Ok(())
    }

    fn bind_row_locator(&mut self, locator: &str) -> CallResult<()> {
        self.state
            .borrow_mut()
            .row_locators
            .push((self.sql.clone(), locator.to_string()));
        Ok(())
    }

    fn execute(&mut self) -> CallResult<Completion> {
        let mut state = self.state.borrow_mut();
        if let Some((_, diagnostic)) = state
            .execute_failures
            .iter()
            .find(|(fragment, _)| self.sql.contains(fragment.as_str()))
        {
            return Err(diagnostic.clone());
        }
        state.executes += 1;
        Ok(match &self.script.warning {
            Some(warning) => Completion::SuccessWithWarning(warning.clone()),
            None => Completion::Success,
        })
    }

    fn describe(&mut self) -> CallResult<Vec<ColumnDescription>> {
        self.state.borrow_mut().describes += 1;
        Ok(self.script.columns.clone())
    }

    fn fetch(&mut self, columns: &[Arc<ColumnShape>]) -> CallResult<Option<Vec<CellValue>>> {
        assert_eq!(columns.len(), self.script.columns.len());
        let Some(row) = self.script.rows.get(self.next_row) else {
            self.current_row = None;
            return Ok(None);
        };
        self.current_row = Some(self.next_row);
        self.next_row += 1;
        Ok(Some(row.clone()))
    }

    fn affected_rows(&mut self) -> CallResult<u64> {
        Ok(self.script.affected)
    }

    fn read_output(&mut self, position: usize, _parameter: &Parameter) -> CallResult<CellValue> {
        Ok(self
            .script
            .outputs
            .get(&position)
            .cloned()
            .unwrap_or_default())
    }

    fn cursor_name(&mut self) -> CallResult<Option<String>> {
        Ok(Some(CURSOR_NAME.to_string()))
    }

    fn row_locator(&self) -> Option<String> {
        let index = self
            .script
            .columns
            .iter()
            .position(|column| column.name.eq_ignore_ascii_case("ROWID"))?;
        let row = self.script.rows.get(self.current_row?)?;
        row.get(index).and_then(|cell| cell.as_str()).map(ToString::to_string)
    }

    fn rewind(&mut self) -> CallResult<()> {
        if !self.scrollable || !self.state.borrow().scrollable_cursors {
            return Err(not_implemented("cursor is not scrollable"));
        }
        self.next_row = 0;
        self.current_row = None;
        Ok(())
    }

    fn release(mut self) -> CallResult<()> {
        let mut state = self.state.borrow_mut();
        state.released += 1;
        state.open_statements -= 1;
        drop(state);
        self.released = true;
        Ok(())
    }
}

impl Drop for FakeStatement {
    fn drop(&mut self) {
        if !self.released {
            self.state.borrow_mut().open_statements -= 1;
        }
    }
}
