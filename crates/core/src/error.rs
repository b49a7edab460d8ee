use std::fmt;

use crate::{Diagnostic, LogicalType, Vendor};

/// Context attached to every database-originated failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbFailure {
    /// Vendor-formatted error code, e.g. `ORA-03113` or `SQL0803N`.
    pub code: String,
    pub message: String,
    pub sql_state: Option<String>,
    pub native_code: i32,
    pub operation: &'static str,
    pub statement: Option<String>,
}

impl DbFailure {
    pub(crate) fn from_diagnostic(
        vendor: Vendor,
        diagnostic: Diagnostic,
        operation: &'static str,
        statement: Option<&str>,
    ) -> Self {
        Self {
            code: vendor.format_error_code(&diagnostic),
            message: diagnostic.message,
            sql_state: diagnostic.sql_state,
            native_code: diagnostic.native_code,
            operation,
            statement: statement.map(ToString::to_string),
        }
    }
}

impl fmt::Display for DbFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed with {}: {}", self.operation, self.code, self.message)?;
        match &self.statement {
            Some(statement) => write!(f, " (statement=`{statement}`)"),
            None => f.write_str(" (statement=none)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("database warning: {0}")]
    Warning(DbFailure),
    #[error("database error: {0}")]
    Db(DbFailure),
    #[error("connection lost: {0}")]
    ConnectionLost(DbFailure),
    #[error("no rows were updated by `{statement}`")]
    NoUpdates { statement: String },
    #[error("logical type `{logical_type}` is not supported by {vendor}: {context}")]
    UnsupportedType {
        logical_type: LogicalType,
        vendor: Vendor,
        context: String,
    },
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Warning,
    Db,
    ConnectionLost,
    NoUpdates,
    UnsupportedType,
    InvalidState,
    NotImplemented,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Db => "database",
            Self::ConnectionLost => "connection-lost",
            Self::NoUpdates => "no-updates",
            Self::UnsupportedType => "unsupported-type",
            Self::InvalidState => "invalid-state",
            Self::NotImplemented => "not-implemented",
        }
    }
}

impl Error {
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::NotImplemented(message.into())
    }

    pub fn unsupported_type(
        logical_type: LogicalType,
        vendor: Vendor,
        context: impl Into<String>,
    ) -> Self {
        Self::UnsupportedType {
            logical_type,
            vendor,
            context: context.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Warning(_) => ErrorKind::Warning,
            Self::Db(_) => ErrorKind::Db,
            Self::ConnectionLost(_) => ErrorKind::ConnectionLost,
            Self::NoUpdates { .. } => ErrorKind::NoUpdates,
            Self::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::NotImplemented(_) => ErrorKind::NotImplemented,
        }
    }

    /// Only a severed connection is worth retrying; everything else either
    /// reflects the statement itself or a programming error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionLost(_))
    }

    #[must_use]
    pub fn failure(&self) -> Option<&DbFailure> {
        match self {
            Self::Warning(failure) | Self::Db(failure) | Self::ConnectionLost(failure) => {
                Some(failure)
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn vendor_code(&self) -> Option<&str> {
        self.failure().map(|failure| failure.code.as_str())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
