use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use oracle::{Connection, Connector};
use tracing::debug;
use udal_core::{
    CallResult, ConnectionDescriptor, DatabaseConfig, Diagnostic, Driver, PrepareOptions,
    TransactionMode, TransactionOutcome, Vendor,
};

use crate::{
    convert::{diagnostic, not_connected},
    statement::{OracleStatement, StatementSettings},
};

const SET_READ_ONLY: &str = "SET TRANSACTION READ ONLY";
/// ODPI-C's own default for rows fetched per round trip.
const DEFAULT_FETCH_ARRAY_SIZE: u32 = 100;

/// Call-interface backend over the Oracle client libraries.
///
/// The session runs without autocommit semantics of its own: statements
/// executed outside a transaction are committed by the statement after a
/// successful execute.
#[derive(Default)]
pub struct OracleDriver {
    connection: Option<Arc<Connection>>,
    in_transaction: Arc<AtomicBool>,
}

impl OracleDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn connection(&self) -> CallResult<&Arc<Connection>> {
        self.connection.as_ref().ok_or_else(not_connected)
    }
}

impl Driver for OracleDriver {
    type Statement = OracleStatement;

    fn vendor(&self) -> Vendor {
        Vendor::Oracle
    }

    fn connect(
        &mut self,
        descriptor: &ConnectionDescriptor,
        config: &DatabaseConfig,
    ) -> CallResult<()> {
        let cache_size = if config.native_statement_cache {
            config.native_statement_cache_size
        } else {
            0
        };

        let mut connector = Connector::new(
            descriptor.user.as_str(),
            descriptor.password.as_str(),
            descriptor.database.as_str(),
        );
        connector.stmt_cache_size(cache_size);
        let connection = connector.connect().map_err(|error| diagnostic(&error))?;

        debug!(database = %descriptor.database, cache_size, "session established");
        self.connection = Some(Arc::new(connection));
        self.in_transaction.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&mut self) -> Vec<Diagnostic> {
        let mut problems = Vec::new();
        if let Some(connection) = self.connection.take()
            && let Err(error) = connection.close()
        {
            problems.push(diagnostic(&error));
        }
        self.in_transaction.store(false, Ordering::SeqCst);
        problems
    }

    fn begin_transaction(&mut self, mode: TransactionMode) -> CallResult<()> {
        let connection = self.connection()?;
        if mode == TransactionMode::ReadOnly {
            // SET TRANSACTION must be the first statement of the transaction.
            connection.rollback().map_err(|error| diagnostic(&error))?;
            connection
                .execute(SET_READ_ONLY, &[])
                .map_err(|error| diagnostic(&error))?;
        }
        self.in_transaction.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn end_transaction(&mut self, outcome: TransactionOutcome) -> CallResult<()> {
        let result = self.connection().and_then(|connection| {
            match outcome {
                TransactionOutcome::Commit => connection.commit(),
                TransactionOutcome::Rollback => connection.rollback(),
            }
            .map_err(|error| diagnostic(&error))
        });
        self.in_transaction.store(false, Ordering::SeqCst);
        result
    }

    fn prepare(&mut self, sql: &str, options: &PrepareOptions<'_>) -> CallResult<Self::Statement> {
        let connection = Arc::clone(self.connection()?);
        let mut builder = connection.statement(sql);
        builder.lob_locator();
        if !options.use_native_cache {
            builder.exclude_from_cache();
        }
        builder.fetch_array_size(fetch_array_size(options.fetch_limit));
        let statement = builder.build().map_err(|error| diagnostic(&error))?;

        Ok(OracleStatement::new(
            statement,
            Arc::clone(&connection),
            Arc::clone(&self.in_transaction),
            StatementSettings::from_options(options),
        ))
    }
}

/// Rows requested per round trip; a capped query never asks for more than
/// its cap.
fn fetch_array_size(fetch_limit: usize) -> u32 {
    match u32::try_from(fetch_limit) {
        Ok(limit) if limit > 0 => limit.min(DEFAULT_FETCH_ARRAY_SIZE),
        _ => DEFAULT_FETCH_ARRAY_SIZE,
    }
}
