use std::{borrow::Cow, sync::Arc, thread, time::Duration};

use tracing::{debug, debug_span, error, info, info_span, warn};

use crate::{
    CellValue, ColumnShape, Command, CommandKind, CompiledCommand, Completion,
    ConnectionDescriptor, CursorId, DatabaseConfig, DbFailure, Diagnostic, Driver, Error,
    ExecuteOptions, LogicalType, NativeStatement, Parameter, Positioned, PrepareOptions, Protocol,
    Result, ResultSet, StatementCache, TransactionMode, TransactionOutcome, Vendor,
    driver::NOT_IMPLEMENTED_STATE,
};

const CONNECTION_NOT_OPEN_STATE: &str = "08003";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    /// The session was lost; [`Database::is_connected`] re-establishes it.
    Reconnecting,
}

/// Pipeline counters for one connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub executions: u64,
    pub prepares: u64,
    pub describes: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub rows_fetched: u64,
    pub reconnects: u64,
}

struct HeldCursor<S> {
    id: CursorId,
    statement: S,
    statement_text: String,
    columns: Vec<Arc<ColumnShape>>,
    position: CursorPosition,
}

/// Where a held cursor sits after the last fetch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorPosition {
    BeforeFirst,
    OnRow,
    AfterLast,
}

struct CursorTarget {
    cursor_name: Option<String>,
    locator: Option<String>,
}

/// Failure inside a statement's lifetime. The statement is dropped before it
/// is classified, so a teardown triggered by connection loss never races a
/// live statement handle.
enum StepError {
    Native {
        operation: &'static str,
        diagnostic: Diagnostic,
    },
    Warning {
        operation: &'static str,
        diagnostic: Diagnostic,
    },
    Core(Error),
}

impl From<Error> for StepError {
    fn from(error: Error) -> Self {
        Self::Core(error)
    }
}

fn native(operation: &'static str) -> impl FnOnce(Diagnostic) -> StepError {
    move |diagnostic| StepError::Native {
        operation,
        diagnostic,
    }
}

/// One connection to one backend: statement cache, transaction, held cursor
/// and error bookkeeping on top of a [`Driver`].
///
/// Not internally synchronized. Use one instance per worker.
pub struct Database<D: Driver> {
    driver: D,
    config: DatabaseConfig,
    state: ConnectionState,
    descriptor: Option<ConnectionDescriptor>,
    cache: StatementCache,
    transaction: Option<TransactionMode>,
    held: Option<HeldCursor<D::Statement>>,
    next_cursor: u64,
    last_error_code: Option<String>,
    last_affected_rows: u64,
    stats: Stats,
}

impl<D: Driver> Database<D> {
    pub fn new(driver: D, config: DatabaseConfig) -> Self {
        Self {
            driver,
            config,
            state: ConnectionState::Disconnected,
            descriptor: None,
            cache: StatementCache::default(),
            transaction: None,
            held: None,
            next_cursor: 1,
            last_error_code: None,
            last_affected_rows: 0,
            stats: Stats::default(),
        }
    }

    #[must_use]
    pub fn vendor(&self) -> Vendor {
        self.driver.vendor()
    }

    #[must_use]
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    #[must_use]
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Vendor-formatted code of the most recent failure; cleared by the next
    /// successful execution.
    #[must_use]
    pub fn last_error_code(&self) -> Option<&str> {
        self.last_error_code.as_deref()
    }

    #[must_use]
    pub fn last_affected_rows(&self) -> u64 {
        self.last_affected_rows
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    #[must_use]
    pub fn held_cursor(&self) -> Option<CursorId> {
        self.held.as_ref().map(|held| held.id)
    }

    #[must_use]
    pub fn statement_cache(&self) -> &StatementCache {
        &self.cache
    }

    #[must_use]
    pub fn cached_statements(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_statement_cache(&mut self) {
        debug!(db = %self.config.name, entries = self.cache.len(), "clearing statement cache");
        self.cache.clear();
    }

    /// Logs in, retrying ODBC-family backends with a fixed delay between
    /// attempts. The call interface gets exactly one attempt.
    pub fn connect(&mut self, descriptor: ConnectionDescriptor) -> Result<()> {
        if self.state == ConnectionState::Connected {
            return Err(Error::invalid_state(format!(
                "`{}` is already connected",
                self.config.name
            )));
        }
        self.config.validate().map_err(Error::invalid_state)?;

        let vendor = self.vendor();
        let span = info_span!(
            "udal.connect",
            db = %self.config.name,
            vendor = %vendor,
            database = %descriptor.database,
        );
        let _entered = span.enter();

        let attempts = vendor.login_attempts(self.config.login_attempts);
        let mut attempt = 1;
        loop {
            match self.driver.connect(&descriptor, &self.config) {
                Ok(()) => {
                    info!(attempt, user = %descriptor.user, "connected");
                    self.state = ConnectionState::Connected;
                    self.descriptor = Some(descriptor);
                    self.last_error_code = None;
                    return Ok(());
                }
                Err(diagnostic) => {
                    warn!(attempt, attempts, error = %diagnostic, "login failed");
                    if attempt >= attempts {
                        let failure =
                            DbFailure::from_diagnostic(vendor, diagnostic, "connect", None);
                        self.last_error_code = Some(failure.code.clone());
                        self.state = ConnectionState::Disconnected;
                        return Err(Error::Db(failure));
                    }
                    attempt += 1;
                    pause(self.config.login_retry_delay());
                }
            }
        }
    }

    /// Releases the held cursor, rolls back an open transaction and tears the
    /// session down. Release failures are logged; shutdown always completes.
    pub fn disconnect(&mut self) {
        if let Some(held) = self.held.take() {
            debug!(cursor = held.id.0, "releasing held cursor before disconnect");
            if let Err(diagnostic) = held.statement.release() {
                warn!(error = %diagnostic, "releasing held cursor failed during disconnect");
            }
        }

        if self.transaction.take().is_some() {
            warn!(db = %self.config.name, "rolling back open transaction before disconnect");
            if let Err(diagnostic) = self.driver.end_transaction(TransactionOutcome::Rollback) {
                warn!(error = %diagnostic, "rollback failed during disconnect");
            }
        }

        if self.state == ConnectionState::Connected {
            for diagnostic in self.driver.disconnect() {
                warn!(error = %diagnostic, "releasing connection handle failed");
            }
            info!(db = %self.config.name, "disconnected");
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Connection check and the only reconnect trigger. While reconnecting,
    /// waits out the reconnect delay and makes one login attempt with the
    /// last descriptor.
    pub fn is_connected(&mut self) -> bool {
        match self.state {
            ConnectionState::Connected => true,
            ConnectionState::Disconnected => false,
            ConnectionState::Reconnecting => self.try_reconnect(),
        }
    }

    pub fn begin_transaction(&mut self, read_only: bool) -> Result<()> {
        self.ensure_connected("begin transaction")?;
        if self.transaction.is_some() {
            return Err(Error::invalid_state(
                "a transaction is already open on this connection",
            ));
        }

        let mode = if read_only {
            TransactionMode::ReadOnly
        } else {
            TransactionMode::ReadWrite
        };
        self.driver
            .begin_transaction(mode)
            .map_err(|diagnostic| self.fail(diagnostic, "begin transaction", None))?;
        debug!(db = %self.config.name, ?mode, "transaction started");
        self.transaction = Some(mode);
        Ok(())
    }

    /// Commits or rolls back. The transaction is closed either way; with
    /// `throw_on_error` unset a failure is only logged.
    pub fn end_transaction(
        &mut self,
        outcome: TransactionOutcome,
        throw_on_error: bool,
    ) -> Result<()> {
        if self.transaction.take().is_none() {
            let error = Error::invalid_state("no transaction is open on this connection");
            if throw_on_error {
                return Err(error);
            }
            debug!(%error, "ignoring end of transaction");
            return Ok(());
        }

        let operation = match outcome {
            TransactionOutcome::Commit => "commit",
            TransactionOutcome::Rollback => "rollback",
        };
        match self.driver.end_transaction(outcome) {
            Ok(()) => {
                debug!(db = %self.config.name, operation, "transaction ended");
                Ok(())
            }
            Err(diagnostic) => {
                let error = self.fail(diagnostic, operation, None);
                if throw_on_error {
                    Err(error)
                } else {
                    warn!(%error, "ending transaction failed");
                    Ok(())
                }
            }
        }
    }

    pub fn commit(&mut self) -> Result<()> {
        self.end_transaction(TransactionOutcome::Commit, true)
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.end_transaction(TransactionOutcome::Rollback, true)
    }

    pub fn execute_query(
        &mut self,
        kind: CommandKind,
        text: &str,
        parameters: &mut [Parameter],
        on_cursor: bool,
        fetch_rows: usize,
    ) -> Result<ResultSet> {
        let command = Command::new(kind, text).query();
        self.query(&command, parameters, ExecuteOptions { on_cursor, fetch_rows })
    }

    pub fn execute_query_cached(
        &mut self,
        kind: CommandKind,
        text: &str,
        parameters: &mut [Parameter],
        on_cursor: bool,
        fetch_rows: usize,
    ) -> Result<ResultSet> {
        let command = Command::new(kind, text).query().cached();
        self.query(&command, parameters, ExecuteOptions { on_cursor, fetch_rows })
    }

    pub fn execute_non_query(
        &mut self,
        kind: CommandKind,
        text: &str,
        parameters: &mut [Parameter],
        on_cursor: bool,
    ) -> Result<u64> {
        let command = Command::new(kind, text);
        self.non_query(&command, parameters, ExecuteOptions { on_cursor, fetch_rows: 0 })
    }

    pub fn execute_non_query_cached(
        &mut self,
        kind: CommandKind,
        text: &str,
        parameters: &mut [Parameter],
        on_cursor: bool,
    ) -> Result<u64> {
        let command = Command::new(kind, text).cached();
        self.non_query(&command, parameters, ExecuteOptions { on_cursor, fetch_rows: 0 })
    }

    /// Runs a query and fetches up to `options.fetch_rows` rows (all when
    /// zero). Output parameters are written back into `parameters`.
    pub fn query(
        &mut self,
        command: &Command,
        parameters: &mut [Parameter],
        options: ExecuteOptions,
    ) -> Result<ResultSet> {
        let command = if command.is_query() {
            Cow::Borrowed(command)
        } else {
            Cow::Owned(command.clone().query())
        };

        self.ensure_connected("execute query")?;
        if options.on_cursor && self.held.is_some() {
            return Err(Error::invalid_state(
                "a cursor is already held on this connection; release it first",
            ));
        }

        let span = debug_span!(
            "udal.execute",
            db = %self.config.name,
            statement = command.text(),
            query = true,
        );
        let _entered = span.enter();

        validate_parameters(self.vendor(), parameters)?;
        let mut compiled = self.resolve(&command, parameters, options.fetch_rows, None)?;

        match self.query_steps(&mut compiled, parameters, options, command.is_cacheable()) {
            Ok((mut results, statement, position)) => {
                self.stats.executions += 1;
                self.stats.rows_fetched += results.len() as u64;
                self.last_error_code = None;
                debug!(rows = results.len(), "query finished");

                if options.on_cursor {
                    let id = CursorId(self.next_cursor);
                    self.next_cursor += 1;
                    results.set_cursor(id);
                    self.held = Some(HeldCursor {
                        id,
                        statement,
                        statement_text: compiled.compiled_text().to_string(),
                        columns: compiled.columns().map(<[_]>::to_vec).unwrap_or_default(),
                        position,
                    });
                } else {
                    self.release_statement(statement);
                }
                self.remember(&command, compiled);
                Ok(results)
            }
            Err(step) => Err(self.step_failed(step, compiled.compiled_text())),
        }
    }

    /// Runs a statement that returns no rows and records its affected-row
    /// count. With `options.on_cursor` the statement is restricted to the row
    /// the held cursor is positioned on.
    pub fn non_query(
        &mut self,
        command: &Command,
        parameters: &mut [Parameter],
        options: ExecuteOptions,
    ) -> Result<u64> {
        self.ensure_connected("execute")?;
        if self.transaction == Some(TransactionMode::ReadOnly) {
            return Err(Error::invalid_state(format!(
                "`{}` cannot run inside a read-only transaction",
                command.text()
            )));
        }

        let span = debug_span!(
            "udal.execute",
            db = %self.config.name,
            statement = command.text(),
            query = false,
        );
        let _entered = span.enter();

        let vendor = self.vendor();
        validate_parameters(vendor, parameters)?;

        let target = if options.on_cursor {
            Some(self.cursor_target()?)
        } else {
            None
        };
        if target.is_some()
            && let Some(held) = &self.held
            && held.position != CursorPosition::OnRow
        {
            return Err(Error::invalid_state(
                "the held cursor is not positioned on a row; fetch with a row cap to stay on one",
            ));
        }
        if let Some(target) = &target
            && vendor.protocol() == Protocol::CallInterface
            && target.locator.is_none()
        {
            return Err(Error::invalid_state(
                "the held cursor is not positioned on a row with a locator",
            ));
        }

        let positioned = target.as_ref().map(|target| Positioned {
            cursor_name: target.cursor_name.as_deref(),
        });
        let compiled = self.resolve(command, parameters, 0, positioned)?;
        let locator = target.as_ref().and_then(|target| target.locator.as_deref());

        match self.non_query_steps(&compiled, parameters, locator, command.is_cacheable()) {
            Ok((affected, statement)) => {
                self.stats.executions += 1;
                self.last_affected_rows = affected;
                self.last_error_code = None;
                debug!(affected, "statement finished");
                self.release_statement(statement);
                self.remember(command, compiled);
                Ok(affected)
            }
            Err(step) => Err(self.step_failed(step, compiled.compiled_text())),
        }
    }

    /// Fetches up to `rows` more rows (all when zero) from the held cursor.
    pub fn fetch_cursor(&mut self, rows: usize) -> Result<ResultSet> {
        self.ensure_connected("fetch from cursor")?;
        let Some(held) = self.held.as_mut() else {
            return Err(no_held_cursor());
        };

        let mut results = ResultSet::new(held.columns.clone());
        results.set_cursor(held.id);
        let fetched = fetch_into(
            &mut held.statement,
            &held.columns,
            &mut results,
            rows,
            held.position,
        );
        match fetched {
            Ok(position) => {
                held.position = position;
                self.stats.rows_fetched += results.len() as u64;
                Ok(results)
            }
            Err(step) => {
                let text = held.statement_text.clone();
                Err(self.step_failed(step, &text))
            }
        }
    }

    /// Repositions the held cursor before its first row.
    pub fn rewind_cursor(&mut self) -> Result<()> {
        self.ensure_connected("rewind cursor")?;
        let Some(held) = self.held.as_mut() else {
            return Err(no_held_cursor());
        };

        match held.statement.rewind() {
            Ok(()) => {
                held.position = CursorPosition::BeforeFirst;
                debug!(cursor = held.id.0, "rewound held cursor");
                Ok(())
            }
            Err(diagnostic) => {
                let text = held.statement_text.clone();
                Err(self.fail(diagnostic, "rewind cursor", Some(&text)))
            }
        }
    }

    pub fn release_cursor(&mut self) -> Result<()> {
        let Some(held) = self.held.take() else {
            return Err(no_held_cursor());
        };

        debug!(cursor = held.id.0, "releasing held cursor");
        held.statement
            .release()
            .map_err(|diagnostic| self.fail(diagnostic, "release cursor", Some(&held.statement_text)))
    }

    fn query_steps(
        &mut self,
        compiled: &mut CompiledCommand,
        parameters: &mut [Parameter],
        options: ExecuteOptions,
        cacheable: bool,
    ) -> std::result::Result<(ResultSet, D::Statement, CursorPosition), StepError> {
        let vendor = self.vendor();
        let mut statement =
            self.prepare(compiled, true, options.on_cursor, options.fetch_rows, cacheable)?;
        let positions = bind_parameters(vendor, &mut statement, compiled, parameters, None)?;
        self.execute_statement(&mut statement)?;

        let columns = match compiled.columns() {
            Some(columns) => columns.to_vec(),
            None => {
                let columns = self.describe(&mut statement)?;
                compiled.set_columns(columns.clone());
                columns
            }
        };

        let mut results = ResultSet::new(columns.clone());
        let position = fetch_into(
            &mut statement,
            &columns,
            &mut results,
            options.fetch_rows,
            CursorPosition::BeforeFirst,
        )?;
        read_outputs(&mut statement, parameters, &positions)?;
        Ok((results, statement, position))
    }

    fn non_query_steps(
        &mut self,
        compiled: &CompiledCommand,
        parameters: &mut [Parameter],
        locator: Option<&str>,
        cacheable: bool,
    ) -> std::result::Result<(u64, D::Statement), StepError> {
        let vendor = self.vendor();
        let mut statement = self.prepare(compiled, false, false, 0, cacheable)?;
        let positions = bind_parameters(vendor, &mut statement, compiled, parameters, locator)?;
        self.execute_statement(&mut statement)?;
        let affected = statement.affected_rows().map_err(native("read affected rows"))?;
        read_outputs(&mut statement, parameters, &positions)?;
        Ok((affected, statement))
    }

    fn prepare(
        &mut self,
        compiled: &CompiledCommand,
        returns_rows: bool,
        scrollable: bool,
        fetch_limit: usize,
        cacheable: bool,
    ) -> std::result::Result<D::Statement, StepError> {
        let options = PrepareOptions {
            returns_rows,
            scrollable,
            use_native_cache: cacheable && self.config.native_statement_cache,
            fetch_limit,
            lob_chunk_size: self.config.lob_chunk_size,
            date_format: &self.config.date_format,
            array_type_name: self.config.array_type_name.as_deref(),
        };

        self.stats.prepares += 1;
        debug!(sql = compiled.compiled_text(), scrollable, "preparing statement");
        self.driver
            .prepare(compiled.compiled_text(), &options)
            .map_err(native("prepare"))
    }

    fn execute_statement(
        &self,
        statement: &mut D::Statement,
    ) -> std::result::Result<(), StepError> {
        match statement.execute().map_err(native("execute"))? {
            Completion::Success | Completion::NoData => Ok(()),
            Completion::SuccessWithWarning(diagnostic) => {
                if self.config.warnings_as_errors {
                    return Err(StepError::Warning {
                        operation: "execute",
                        diagnostic,
                    });
                }
                warn!(
                    code = %self.vendor().format_error_code(&diagnostic),
                    message = %diagnostic.message,
                    "statement completed with a warning",
                );
                Ok(())
            }
        }
    }

    fn describe(
        &mut self,
        statement: &mut D::Statement,
    ) -> std::result::Result<Vec<Arc<ColumnShape>>, StepError> {
        self.stats.describes += 1;
        let vendor = self.vendor();
        let descriptions = statement.describe().map_err(native("describe"))?;
        descriptions
            .iter()
            .map(|description| {
                ColumnShape::from_description(vendor, description)
                    .map(Arc::new)
                    .map_err(StepError::from)
            })
            .collect()
    }

    /// Compiled form of `command`: the cached entry when its signature
    /// matches, a recompilation keeping the cached shape when it does not.
    fn resolve(
        &mut self,
        command: &Command,
        parameters: &[Parameter],
        fetch_rows: usize,
        positioned: Option<Positioned<'_>>,
    ) -> Result<CompiledCommand> {
        let vendor = self.vendor();
        if !command.is_cacheable() {
            return CompiledCommand::compile(vendor, command, parameters, fetch_rows, positioned);
        }

        let Some(cached) = self
            .cache
            .get(command.text())
            .filter(|cached| cached.kind() == command.kind() && cached.is_query() == command.is_query())
        else {
            self.stats.cache_misses += 1;
            return CompiledCommand::compile(vendor, command, parameters, fetch_rows, positioned);
        };

        if cached.matches(parameters, fetch_rows, positioned) {
            self.stats.cache_hits += 1;
            return Ok(cached.clone());
        }

        self.stats.cache_misses += 1;
        debug!(statement = command.text(), "recompiling cached statement");
        cached.recompile(vendor, command, parameters, fetch_rows, positioned)
    }

    fn remember(&mut self, command: &Command, compiled: CompiledCommand) {
        if command.is_cacheable() {
            self.cache.insert(compiled);
        }
    }

    fn release_statement(&self, statement: D::Statement) {
        if let Err(diagnostic) = statement.release() {
            warn!(error = %diagnostic, "releasing statement failed");
        }
    }

    fn cursor_target(&mut self) -> Result<CursorTarget> {
        let Some(held) = self.held.as_mut() else {
            return Err(no_held_cursor());
        };

        let locator = held.statement.row_locator();
        match held.statement.cursor_name() {
            Ok(cursor_name) => Ok(CursorTarget {
                cursor_name,
                locator,
            }),
            Err(diagnostic) => {
                let text = held.statement_text.clone();
                Err(self.fail(diagnostic, "read cursor name", Some(&text)))
            }
        }
    }

    fn ensure_connected(&self, operation: &'static str) -> Result<()> {
        match self.state {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Disconnected => Err(Error::invalid_state(format!(
                "cannot {operation}: `{}` is not connected",
                self.config.name
            ))),
            ConnectionState::Reconnecting => Err(Error::ConnectionLost(DbFailure {
                code: self
                    .last_error_code
                    .clone()
                    .unwrap_or_else(|| CONNECTION_NOT_OPEN_STATE.to_string()),
                message: "connection is being re-established".to_string(),
                sql_state: Some(CONNECTION_NOT_OPEN_STATE.to_string()),
                native_code: 0,
                operation,
                statement: None,
            })),
        }
    }

    fn step_failed(&mut self, step: StepError, statement: &str) -> Error {
        match step {
            StepError::Core(error) => error,
            StepError::Native {
                operation,
                diagnostic,
            } => self.fail(diagnostic, operation, Some(statement)),
            StepError::Warning {
                operation,
                diagnostic,
            } => {
                let failure =
                    DbFailure::from_diagnostic(self.vendor(), diagnostic, operation, Some(statement));
                self.last_error_code = Some(failure.code.clone());
                Error::Warning(failure)
            }
        }
    }

    /// Classifies a native failure. Connection loss arms the reconnect path.
    fn fail(
        &mut self,
        diagnostic: Diagnostic,
        operation: &'static str,
        statement: Option<&str>,
    ) -> Error {
        if diagnostic.sql_state.as_deref() == Some(NOT_IMPLEMENTED_STATE) {
            return Error::not_implemented(format!("{operation}: {}", diagnostic.message));
        }

        let vendor = self.vendor();
        let lost = vendor.is_connection_lost(&diagnostic);
        let failure = DbFailure::from_diagnostic(vendor, diagnostic, operation, statement);
        self.last_error_code = Some(failure.code.clone());

        if lost {
            error!(
                db = %self.config.name,
                code = %failure.code,
                operation,
                message = %failure.message,
                "connection lost",
            );
            self.arm_reconnect();
            Error::ConnectionLost(failure)
        } else {
            debug!(code = %failure.code, operation, "statement failed");
            Error::Db(failure)
        }
    }

    fn arm_reconnect(&mut self) {
        if let Some(held) = self.held.take()
            && let Err(diagnostic) = held.statement.release()
        {
            debug!(error = %diagnostic, "releasing held cursor after connection loss failed");
        }
        self.transaction = None;
        for diagnostic in self.driver.disconnect() {
            debug!(error = %diagnostic, "releasing handle after connection loss failed");
        }
        self.state = ConnectionState::Reconnecting;
    }

    fn try_reconnect(&mut self) -> bool {
        let Some(descriptor) = self.descriptor.clone() else {
            self.state = ConnectionState::Disconnected;
            return false;
        };

        let span = info_span!("udal.connect", db = %self.config.name, reconnect = true);
        let _entered = span.enter();

        pause(self.config.reconnect_delay());
        match self.driver.connect(&descriptor, &self.config) {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                self.stats.reconnects += 1;
                self.last_error_code = None;
                info!("reconnected");
                true
            }
            Err(diagnostic) => {
                self.last_error_code = Some(self.vendor().format_error_code(&diagnostic));
                warn!(error = %diagnostic, "reconnect attempt failed");
                false
            }
        }
    }
}

impl<D: Driver> Drop for Database<D> {
    fn drop(&mut self) {
        if self.state != ConnectionState::Disconnected {
            self.disconnect();
        }
    }
}

/// Turns a zero affected-row count into [`Error::NoUpdates`] for callers that
/// treat it as a failure.
pub fn require_updates(affected: u64, statement: &str) -> Result<u64> {
    if affected == 0 {
        return Err(Error::NoUpdates {
            statement: statement.to_string(),
        });
    }
    Ok(affected)
}

fn validate_parameters(vendor: Vendor, parameters: &[Parameter]) -> Result<()> {
    for parameter in parameters {
        let logical_type = parameter.logical_type();
        match logical_type {
            LogicalType::Cursor => {
                return Err(Error::invalid_state(format!(
                    "parameter `{}`: result cursors are bound by the procedure call",
                    parameter.name()
                )));
            }
            LogicalType::Date | LogicalType::Timestamp | LogicalType::Array
                if parameter.direction().is_output() =>
            {
                return Err(Error::not_implemented(format!(
                    "parameter `{}`: {logical_type} values cannot be bound for output",
                    parameter.name()
                )));
            }
            _ => {}
        }
        vendor.native_type(logical_type, parameter.dimension())?;
    }
    Ok(())
}

fn bind_parameters<S: NativeStatement>(
    vendor: Vendor,
    statement: &mut S,
    compiled: &CompiledCommand,
    parameters: &[Parameter],
    locator: Option<&str>,
) -> std::result::Result<Vec<usize>, StepError> {
    let mut position = 1;
    if compiled.is_query()
        && compiled.kind() == CommandKind::StoredProcedure
        && vendor.binds_procedure_cursor()
    {
        statement
            .bind_cursor_output(position)
            .map_err(native("bind cursor"))?;
        position += 1;
    }

    let mut positions = Vec::with_capacity(parameters.len());
    for parameter in parameters {
        statement
            .bind(position, parameter)
            .map_err(native("bind"))?;
        positions.push(position);
        position += vendor.placeholder_count(parameter);
    }

    if let Some(locator) = locator {
        statement
            .bind_row_locator(locator)
            .map_err(native("bind row locator"))?;
    }
    Ok(positions)
}

/// Fetches until `limit` rows are in `results` (all when zero) and reports
/// where the native cursor was left. Running off the end leaves it past the
/// last row, where positioned updates have nothing to address.
fn fetch_into<S: NativeStatement>(
    statement: &mut S,
    columns: &[Arc<ColumnShape>],
    results: &mut ResultSet,
    limit: usize,
    mut position: CursorPosition,
) -> std::result::Result<CursorPosition, StepError> {
    while limit == 0 || results.len() < limit {
        match statement.fetch(columns).map_err(native("fetch"))? {
            Some(cells) => {
                results.push_cells(cells)?;
                position = CursorPosition::OnRow;
            }
            None => return Ok(CursorPosition::AfterLast),
        }
    }
    Ok(position)
}

fn read_outputs<S: NativeStatement>(
    statement: &mut S,
    parameters: &mut [Parameter],
    positions: &[usize],
) -> std::result::Result<(), StepError> {
    for (parameter, &position) in parameters.iter_mut().zip(positions) {
        if !parameter.direction().is_output() {
            continue;
        }
        let cell: CellValue = statement
            .read_output(position, parameter)
            .map_err(native("read output"))?;
        let logical_type = parameter.logical_type();
        parameter.set_value(cell.into_value(logical_type))?;
    }
    Ok(())
}

fn no_held_cursor() -> Error {
    Error::invalid_state("no cursor is held on this connection")
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}
