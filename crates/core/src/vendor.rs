use std::{fmt, str::FromStr};

use crate::{Diagnostic, Error, LogicalType, Parameter, Result};

/// Bind name used for the row locator of a positioned update on the call
/// interface.
pub const ROWID_BIND_NAME: &str = "udal_rowid";

const ORACLE_CONNECTION_LOST_CODES: &[u32] = &[
    28, 1012, 1033, 1034, 1089, 2396, 3113, 3114, 3135, 12514, 12537, 12541, 12547, 12560, 12571,
];
const DB2_CONNECTION_LOST_CODES: &[i32] = &[-30081, -30108, -1224, -1776];
const SQLSERVER_CONNECTION_LOST_CODES: &[i32] = &[233, 10053, 10054, 10060];
const INFORMIX_CONNECTION_LOST_CODES: &[i32] = &[-908, -25582, -27001];
const POSTGRES_CONNECTION_LOST_STATES: &[&str] = &["57P01", "57P02", "57P03"];
const CONNECTION_EXCEPTION_CLASS: &str = "08";
const GENERIC_SQL_STATE: &str = "HY000";

/// The native client protocol a vendor is reached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Vendor-proprietary call-level interface with handle-based LOBs and
    /// collections.
    CallInterface,
    /// The generic connectivity standard shared by the remaining vendors.
    Odbc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Vendor {
    Oracle,
    Db2,
    SqlServer,
    PostgreSql,
    Informix,
}

impl Vendor {
    pub const ALL: [Vendor; 5] = [
        Vendor::Oracle,
        Vendor::Db2,
        Vendor::SqlServer,
        Vendor::PostgreSql,
        Vendor::Informix,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Oracle => "oracle",
            Self::Db2 => "db2",
            Self::SqlServer => "sqlserver",
            Self::PostgreSql => "postgresql",
            Self::Informix => "informix",
        }
    }

    #[must_use]
    pub fn protocol(self) -> Protocol {
        match self {
            Self::Oracle => Protocol::CallInterface,
            Self::Db2 | Self::SqlServer | Self::PostgreSql | Self::Informix => Protocol::Odbc,
        }
    }

    #[must_use]
    pub fn is_odbc(self) -> bool {
        self.protocol() == Protocol::Odbc
    }

    /// Login attempts made by `connect`. The call interface never retries.
    #[must_use]
    pub fn login_attempts(self, configured: u32) -> u32 {
        match self.protocol() {
            Protocol::CallInterface => 1,
            Protocol::Odbc => configured.max(1),
        }
    }

    #[must_use]
    pub fn supports_arrays(self) -> bool {
        matches!(self, Self::Oracle | Self::Db2)
    }

    /// Whether a query procedure hands its rows back through a bound output
    /// cursor rather than as a plain result set.
    #[must_use]
    pub fn binds_procedure_cursor(self) -> bool {
        self.protocol() == Protocol::CallInterface
    }

    /// ODBC drivers disagree on identifier case, so column names are folded
    /// to upper case for that family.
    #[must_use]
    pub fn normalize_column_name(self, name: &str) -> String {
        match self.protocol() {
            Protocol::CallInterface => name.to_string(),
            Protocol::Odbc => name.to_ascii_uppercase(),
        }
    }

    #[must_use]
    pub fn placeholder(self, position: usize) -> String {
        match self.protocol() {
            Protocol::CallInterface => format!(":{position}"),
            Protocol::Odbc => "?".to_string(),
        }
    }

    /// Placeholders a parameter occupies: ODBC arrays expand to one per element.
    #[must_use]
    pub fn placeholder_count(self, parameter: &Parameter) -> usize {
        if parameter.logical_type() == LogicalType::Array && self.is_odbc() {
            parameter.elements().len()
        } else {
            1
        }
    }

    /// Synthesizes the call text for a stored procedure.
    pub fn procedure_call(self, name: &str, parameters: &[Parameter], query: bool) -> Result<String> {
        let name = name.trim();
        let mut placeholders = Vec::with_capacity(parameters.len() + 1);
        let mut position = 1;

        if query && self.binds_procedure_cursor() {
            placeholders.push(self.placeholder(position));
            position += 1;
        }

        for parameter in parameters {
            if parameter.logical_type() == LogicalType::Array {
                placeholders.push(self.array_placeholder(parameter, &mut position)?);
                continue;
            }
            placeholders.push(self.placeholder(position));
            position += 1;
        }

        let arguments = placeholders.join(", ");
        Ok(match self {
            Self::Oracle => format!("BEGIN {name}({arguments}); END;"),
            Self::Db2 => format!("CALL {name}({arguments})"),
            Self::SqlServer | Self::PostgreSql | Self::Informix => {
                format!("{{call {name}({arguments})}}")
            }
        })
    }

    fn array_placeholder(self, parameter: &Parameter, position: &mut usize) -> Result<String> {
        if !self.supports_arrays() {
            return Err(Error::unsupported_type(
                LogicalType::Array,
                self,
                format!("parameter `{}` cannot be bound as an array", parameter.name()),
            ));
        }

        match self.protocol() {
            Protocol::CallInterface => {
                let placeholder = self.placeholder(*position);
                *position += 1;
                Ok(placeholder)
            }
            Protocol::Odbc => {
                let elements = parameter
                    .elements()
                    .iter()
                    .map(|_| {
                        *position += 1;
                        "?"
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                Ok(format!("ARRAY[{elements}]"))
            }
        }
    }

    /// Suffix limiting a query to `rows` rows, when the vendor has one.
    #[must_use]
    pub fn row_limit_clause(self, rows: usize) -> Option<String> {
        match self {
            Self::Oracle | Self::Db2 => Some(format!(" FETCH FIRST {rows} ROWS ONLY")),
            Self::PostgreSql => Some(format!(" LIMIT {rows}")),
            Self::SqlServer | Self::Informix => None,
        }
    }

    /// Suffix restricting a statement to the row a held cursor is positioned on.
    pub fn positioned_update_clause(self, cursor_name: Option<&str>) -> Result<String> {
        match self.protocol() {
            Protocol::CallInterface => Ok(format!(" WHERE ROWID = :{ROWID_BIND_NAME}")),
            Protocol::Odbc => cursor_name
                .filter(|name| !name.trim().is_empty())
                .map(|name| format!(" WHERE CURRENT OF {name}"))
                .ok_or_else(|| {
                    Error::invalid_state(format!(
                        "{self} did not report a cursor name for the held cursor"
                    ))
                }),
        }
    }

    /// Formats the vendor error code carried by database errors.
    #[must_use]
    pub fn format_error_code(self, diagnostic: &Diagnostic) -> String {
        let code = diagnostic.native_code;
        match self {
            Self::Oracle => format!("ORA-{:05}", code.unsigned_abs()),
            Self::Db2 => {
                let suffix = if code > 0 { 'W' } else { 'N' };
                format!("SQL{:04}{suffix}", code.unsigned_abs())
            }
            Self::SqlServer | Self::PostgreSql | Self::Informix => {
                let state = diagnostic.sql_state.as_deref().unwrap_or(GENERIC_SQL_STATE);
                format!("{state}:{code}")
            }
        }
    }

    /// Whether a diagnostic means the session is gone and must be re-established.
    #[must_use]
    pub fn is_connection_lost(self, diagnostic: &Diagnostic) -> bool {
        if diagnostic.connection_broken {
            return true;
        }

        let code = diagnostic.native_code;
        let state = diagnostic.sql_state.as_deref().unwrap_or_default();
        match self {
            Self::Oracle => ORACLE_CONNECTION_LOST_CODES.contains(&code.unsigned_abs()),
            Self::Db2 => {
                state.starts_with(CONNECTION_EXCEPTION_CLASS)
                    || DB2_CONNECTION_LOST_CODES.contains(&code)
            }
            Self::SqlServer => {
                state.starts_with(CONNECTION_EXCEPTION_CLASS)
                    || SQLSERVER_CONNECTION_LOST_CODES.contains(&code)
            }
            Self::PostgreSql => {
                state.starts_with(CONNECTION_EXCEPTION_CLASS)
                    || POSTGRES_CONNECTION_LOST_STATES.contains(&state)
            }
            Self::Informix => {
                state.starts_with(CONNECTION_EXCEPTION_CLASS)
                    || INFORMIX_CONNECTION_LOST_CODES.contains(&code)
            }
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Vendor {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "oracle" | "oci" => Ok(Self::Oracle),
            "db2" => Ok(Self::Db2),
            "sqlserver" | "mssql" => Ok(Self::SqlServer),
            "postgresql" | "postgres" | "pg" => Ok(Self::PostgreSql),
            "informix" | "ids" => Ok(Self::Informix),
            other => Err(Error::invalid_state(format!("unknown database vendor `{other}`"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Vendor;
    use crate::Diagnostic;

    #[test]
    fn error_codes_use_vendor_formats() {
        let diagnostic = Diagnostic::new(3113, "end-of-file on communication channel");
        assert_eq!(Vendor::Oracle.format_error_code(&diagnostic), "ORA-03113");

        let diagnostic = Diagnostic::new(-803, "duplicate key").with_sql_state("23505");
        assert_eq!(Vendor::Db2.format_error_code(&diagnostic), "SQL0803N");
        assert_eq!(Vendor::PostgreSql.format_error_code(&diagnostic), "23505:-803");
    }

    #[test]
    fn connection_exception_class_is_lost_for_odbc_only() {
        let diagnostic = Diagnostic::new(0, "link failure").with_sql_state("08S01");
        assert!(Vendor::SqlServer.is_connection_lost(&diagnostic));
        assert!(Vendor::Informix.is_connection_lost(&diagnostic));
        assert!(!Vendor::Oracle.is_connection_lost(&diagnostic));
    }

    #[test]
    fn oracle_codes_match_either_sign() {
        assert!(Vendor::Oracle.is_connection_lost(&Diagnostic::new(-3113, "end-of-file")));
        assert!(Vendor::Oracle.is_connection_lost(&Diagnostic::new(3113, "end-of-file")));
        assert!(!Vendor::Oracle.is_connection_lost(&Diagnostic::new(i32::MIN, "overflowed code")));
    }

    #[test]
    fn vendor_aliases_parse() {
        assert_eq!("mssql".parse::<Vendor>().ok(), Some(Vendor::SqlServer));
        assert_eq!("Postgres".parse::<Vendor>().ok(), Some(Vendor::PostgreSql));
        assert!("sybase".parse::<Vendor>().is_err());
    }
}
