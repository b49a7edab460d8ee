use std::fmt;

/// Outcome class of a single native call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    Success,
    SuccessWithWarning,
    NoData,
    Error,
}

/// Diagnostic record read back from a native driver after a call.
///
/// Drivers return these instead of public errors; the database classifies
/// them with the vendor's rules once the operation and statement are known.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Diagnostic {
    pub sql_state: Option<String>,
    pub native_code: i32,
    pub message: String,
    /// Set when the driver itself observed the session as severed, e.g. a
    /// server-status attribute reporting not-connected.
    pub connection_broken: bool,
}

impl Diagnostic {
    pub fn new(native_code: i32, message: impl Into<String>) -> Self {
        Self {
            sql_state: None,
            native_code,
            message: message.into(),
            connection_broken: false,
        }
    }

    #[must_use]
    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }

    #[must_use]
    pub fn broken_connection(mut self) -> Self {
        self.connection_broken = true;
        self
    }

    /// Diagnostic for failures raised by the driver glue itself rather than
    /// the native library (bad buffers, unexpected handle state).
    pub fn driver(message: impl Into<String>) -> Self {
        Self::new(0, message).with_sql_state("HY000")
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sql_state {
            Some(state) => write!(f, "[{state}] ({}) {}", self.native_code, self.message),
            None => write!(f, "({}) {}", self.native_code, self.message),
        }
    }
}

pub type CallResult<T> = std::result::Result<T, Diagnostic>;

/// Non-failing outcome of an execute or fetch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Success,
    SuccessWithWarning(Diagnostic),
    NoData,
}

impl Completion {
    #[must_use]
    pub fn return_code(&self) -> ReturnCode {
        match self {
            Self::Success => ReturnCode::Success,
            Self::SuccessWithWarning(_) => ReturnCode::SuccessWithWarning,
            Self::NoData => ReturnCode::NoData,
        }
    }
}
