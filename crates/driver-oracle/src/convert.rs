use oracle::sql_type::OracleType;
use udal_core::{ColumnDescription, Diagnostic, NativeType, typemap::oci};

const DPI_NOT_CONNECTED: &str = "DPI-1010";
const DPI_CONNECTION_CLOSED: &str = "DPI-1080";
const ROWID_SIZE: usize = 18;
const DATE_SIZE: usize = 7;
const TIMESTAMP_SIZE: usize = 11;
const NUMBER_SIZE: usize = 22;
const SHORT_INT_SIZE: usize = 2;
const LONG_INT_SIZE: usize = 8;
const MAX_SHORT_INT_PRECISION: u8 = 4;
const MAX_LONG_INT_PRECISION: u8 = 18;

/// Converts a client library failure into a diagnostic record. ODPI-C
/// reports a dead session with its own codes instead of an ORA code.
pub(crate) fn diagnostic(error: &oracle::Error) -> Diagnostic {
    let diagnostic = match error.db_error() {
        Some(db_error) => Diagnostic::new(db_error.code(), db_error.message()),
        None => Diagnostic::driver(error.to_string()),
    };

    if diagnostic.message.starts_with(DPI_NOT_CONNECTED)
        || diagnostic.message.starts_with(DPI_CONNECTION_CLOSED)
    {
        diagnostic.broken_connection()
    } else {
        diagnostic
    }
}

pub(crate) fn io_diagnostic(error: &std::io::Error) -> Diagnostic {
    Diagnostic::driver(format!("large object transfer failed: {error}"))
}

pub(crate) fn not_connected() -> Diagnostic {
    Diagnostic::new(0, format!("{DPI_NOT_CONNECTED}: not connected")).broken_connection()
}

/// Maps a described column onto the call interface's type codes.
pub(crate) fn describe_column(name: &str, oracle_type: &OracleType) -> ColumnDescription {
    let (code, size, scale) = match oracle_type {
        OracleType::Varchar2(size)
        | OracleType::NVarchar2(size)
        | OracleType::Char(size)
        | OracleType::NChar(size) => (oci::SQLT_CHR, *size as usize, 0),
        OracleType::Rowid => (oci::SQLT_RDD, ROWID_SIZE, 0),
        OracleType::Raw(size) => (oci::SQLT_BIN, *size as usize, 0),
        OracleType::Number(precision, 0) if (1..=MAX_SHORT_INT_PRECISION).contains(precision) => {
            (oci::SQLT_INT, SHORT_INT_SIZE, 0)
        }
        OracleType::Number(precision, 0) if (1..=MAX_LONG_INT_PRECISION).contains(precision) => {
            (oci::SQLT_INT, LONG_INT_SIZE, 0)
        }
        OracleType::Number(precision, scale) => {
            let size = if *precision == 0 {
                NUMBER_SIZE
            } else {
                usize::from(*precision)
            };
            (oci::SQLT_NUM, size, i16::from(*scale))
        }
        OracleType::Float(precision) => (oci::SQLT_FLT, usize::from(*precision), 0),
        OracleType::BinaryFloat => (oci::SQLT_BFLOAT, 4, 0),
        OracleType::BinaryDouble => (oci::SQLT_BDOUBLE, 8, 0),
        OracleType::Int64 | OracleType::UInt64 => (oci::SQLT_INT, LONG_INT_SIZE, 0),
        OracleType::Date => (oci::SQLT_DAT, DATE_SIZE, 0),
        OracleType::Timestamp(_) => (oci::SQLT_TIMESTAMP, TIMESTAMP_SIZE, 0),
        OracleType::TimestampTZ(_) => (oci::SQLT_TIMESTAMP_TZ, TIMESTAMP_SIZE, 0),
        OracleType::TimestampLTZ(_) => (oci::SQLT_TIMESTAMP_LTZ, TIMESTAMP_SIZE, 0),
        OracleType::CLOB | OracleType::NCLOB => (oci::SQLT_CLOB, 0, 0),
        OracleType::Long => (oci::SQLT_LNG, 0, 0),
        OracleType::BLOB => (oci::SQLT_BLOB, 0, 0),
        OracleType::LongRaw => (oci::SQLT_LBI, 0, 0),
        OracleType::RefCursor => (oci::SQLT_RSET, 0, 0),
        OracleType::Object(_) => (oci::SQLT_NTY, 0, 0),
        _ => (0, 0, 0),
    };

    ColumnDescription {
        name: name.to_string(),
        native_type: NativeType(code),
        size,
        scale,
    }
}

/// How a fetched column is pulled out of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Extraction {
    Text,
    Integer,
    DateTime,
    CharacterLob,
    BinaryLob,
    Bytes,
}

pub(crate) fn extraction(oracle_type: &OracleType) -> Extraction {
    match oracle_type {
        OracleType::Number(precision, 0) if (1..=MAX_LONG_INT_PRECISION).contains(precision) => {
            Extraction::Integer
        }
        OracleType::Int64 | OracleType::UInt64 => Extraction::Integer,
        OracleType::Date
        | OracleType::Timestamp(_)
        | OracleType::TimestampTZ(_)
        | OracleType::TimestampLTZ(_) => Extraction::DateTime,
        OracleType::CLOB | OracleType::NCLOB => Extraction::CharacterLob,
        OracleType::BLOB => Extraction::BinaryLob,
        OracleType::Raw(_) | OracleType::LongRaw => Extraction::Bytes,
        _ => Extraction::Text,
    }
}
