use std::sync::{Arc, OnceLock};

use odbc_api::{Connection, ConnectionOptions, Environment};
use tracing::debug;
use udal_core::{
    CallResult, ConnectionDescriptor, DatabaseConfig, Diagnostic, Driver, PrepareOptions,
    TransactionMode, TransactionOutcome, Vendor,
};

use crate::{
    diag, plan,
    source::DataSource,
    statement::{OdbcStatement, StatementSettings},
};

static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

/// The process-wide environment. A failed allocation is not remembered, so
/// the next login tries again.
fn environment() -> CallResult<&'static Environment> {
    if let Some(environment) = ENVIRONMENT.get() {
        return Ok(environment);
    }
    let environment = Environment::new().map_err(|error| diag::from_error(&error))?;
    Ok(ENVIRONMENT.get_or_init(|| environment))
}

/// Generic-connectivity backend for the ODBC-family vendors. The descriptor's
/// `database` is a data source name or a full connection string.
pub struct OdbcDriver {
    vendor: Vendor,
    connection: Option<Arc<Connection<'static>>>,
    in_transaction: bool,
}

impl OdbcDriver {
    pub fn new(vendor: Vendor) -> CallResult<Self> {
        if !vendor.is_odbc() {
            return Err(Diagnostic::driver(format!(
                "{} is not reached through ODBC",
                vendor.name()
            )));
        }
        Ok(Self {
            vendor,
            connection: None,
            in_transaction: false,
        })
    }

    fn connection(&self) -> CallResult<&Arc<Connection<'static>>> {
        self.connection
            .as_ref()
            .ok_or_else(|| Diagnostic::driver("not connected").with_sql_state("08003"))
    }
}

impl Driver for OdbcDriver {
    type Statement = OdbcStatement;

    fn vendor(&self) -> Vendor {
        self.vendor
    }

    fn connect(
        &mut self,
        descriptor: &ConnectionDescriptor,
        _config: &DatabaseConfig,
    ) -> CallResult<()> {
        let environment = environment()?;
        let connection = match DataSource::resolve(descriptor) {
            DataSource::Name(name) => environment.connect(
                name,
                &descriptor.user,
                &descriptor.password,
                ConnectionOptions::default(),
            ),
            DataSource::ConnectionString(connection_string) => environment
                .connect_with_connection_string(&connection_string, ConnectionOptions::default()),
        }
        .map_err(|error| diag::from_error(&error))?;

        debug!(vendor = self.vendor.name(), "connected");
        self.connection = Some(Arc::new(connection));
        self.in_transaction = false;
        Ok(())
    }

    fn disconnect(&mut self) -> Vec<Diagnostic> {
        let Some(connection) = self.connection.take() else {
            return Vec::new();
        };
        let mut diagnostics = Vec::new();
        if std::mem::take(&mut self.in_transaction) {
            if let Err(error) = connection.rollback() {
                diagnostics.push(diag::from_error(&error));
            }
        }
        // Statements still alive keep their own reference; the connection
        // closes when the last one goes.
        drop(connection);
        diagnostics
    }

    fn begin_transaction(&mut self, mode: TransactionMode) -> CallResult<()> {
        let connection = self.connection()?;
        connection
            .set_autocommit(false)
            .map_err(|error| diag::from_error(&error))?;
        if mode == TransactionMode::ReadOnly {
            if let Some(sql) = plan::read_only_statement(self.vendor) {
                connection
                    .execute(sql, (), None)
                    .map_err(|error| diag::from_error(&error))?;
            }
        }
        self.in_transaction = true;
        Ok(())
    }

    fn end_transaction(&mut self, outcome: TransactionOutcome) -> CallResult<()> {
        let connection = self.connection()?;
        let ended = match outcome {
            TransactionOutcome::Commit => connection.commit(),
            TransactionOutcome::Rollback => connection.rollback(),
        };
        let restored = connection.set_autocommit(true);
        self.in_transaction = false;
        ended
            .and(restored)
            .map_err(|error| diag::from_error(&error))
    }

    fn prepare(&mut self, sql: &str, options: &PrepareOptions<'_>) -> CallResult<Self::Statement> {
        let connection = Arc::clone(self.connection()?);
        Ok(OdbcStatement::new(
            connection,
            sql,
            self.vendor,
            StatementSettings::from_options(options),
        ))
    }
}
