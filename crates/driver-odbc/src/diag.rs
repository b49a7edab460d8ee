use udal_core::Diagnostic;

/// Builds a diagnostic from the raw fields of one driver diagnostic record.
#[must_use]
pub fn record(state: &[u8], native_code: i32, message: &[u8]) -> Diagnostic {
    Diagnostic::new(native_code, text(message)).with_sql_state(text(state))
}

/// Text of a NUL-terminated driver buffer.
#[must_use]
pub fn text(buffer: &[u8]) -> String {
    let end = buffer.iter().position(|byte| *byte == 0).unwrap_or(buffer.len());
    String::from_utf8_lossy(&buffer[..end]).trim_end().to_string()
}

/// Diagnostic for an `odbc-api` failure. Errors that carry a driver record
/// keep its SQLSTATE and native code.
#[cfg(feature = "native")]
pub(crate) fn from_error(error: &odbc_api::Error) -> Diagnostic {
    match error {
        odbc_api::Error::Diagnostics { record: found, .. } => record(
            found.state.as_str().as_bytes(),
            found.native_error,
            &found.message,
        ),
        other => Diagnostic::driver(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::{record, text};

    #[test]
    fn records_are_read_up_to_the_terminator() {
        let diagnostic = record(b"08S01\0", -30081, b"communication error\0garbage");

        assert_eq!(diagnostic.sql_state.as_deref(), Some("08S01"));
        assert_eq!(diagnostic.native_code, -30081);
        assert_eq!(diagnostic.message, "communication error");
        assert_eq!(text(b"SQL_CUR1  \0"), "SQL_CUR1");
    }

    #[test]
    fn records_without_terminator_use_the_whole_buffer() {
        let diagnostic = record(b"42S02", -204, b"table not found");

        assert_eq!(diagnostic.sql_state.as_deref(), Some("42S02"));
        assert_eq!(diagnostic.message, "table not found");
    }
}
