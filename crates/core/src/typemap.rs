//! Translation between logical types and vendor native type codes.

use crate::{Error, LogicalType, NativeType, Protocol, Result, Vendor};

/// Character columns wider than this are treated as large objects.
pub const LARGE_CHAR_THRESHOLD: usize = 32_767;

/// Call-interface (`SQLT_*`) type codes.
pub mod oci {
    pub const SQLT_CHR: i32 = 1;
    pub const SQLT_NUM: i32 = 2;
    pub const SQLT_INT: i32 = 3;
    pub const SQLT_FLT: i32 = 4;
    pub const SQLT_STR: i32 = 5;
    pub const SQLT_LNG: i32 = 8;
    pub const SQLT_VCS: i32 = 9;
    pub const SQLT_DAT: i32 = 12;
    pub const SQLT_BFLOAT: i32 = 21;
    pub const SQLT_BDOUBLE: i32 = 22;
    pub const SQLT_BIN: i32 = 23;
    pub const SQLT_LBI: i32 = 24;
    pub const SQLT_UIN: i32 = 68;
    pub const SQLT_AFC: i32 = 96;
    pub const SQLT_AVC: i32 = 97;
    pub const SQLT_IBFLOAT: i32 = 100;
    pub const SQLT_IBDOUBLE: i32 = 101;
    pub const SQLT_RDD: i32 = 104;
    pub const SQLT_NTY: i32 = 108;
    pub const SQLT_CLOB: i32 = 112;
    pub const SQLT_BLOB: i32 = 113;
    pub const SQLT_RSET: i32 = 116;
    pub const SQLT_ODT: i32 = 156;
    pub const SQLT_DATE: i32 = 184;
    pub const SQLT_TIMESTAMP: i32 = 187;
    pub const SQLT_TIMESTAMP_TZ: i32 = 188;
    pub const SQLT_TIMESTAMP_LTZ: i32 = 232;
}

/// Generic-connectivity (`SQL_*`) type codes, including the vendor
/// extensions the supported drivers report.
pub mod odbc {
    pub const SQL_CHAR: i32 = 1;
    pub const SQL_NUMERIC: i32 = 2;
    pub const SQL_DECIMAL: i32 = 3;
    pub const SQL_INTEGER: i32 = 4;
    pub const SQL_SMALLINT: i32 = 5;
    pub const SQL_FLOAT: i32 = 6;
    pub const SQL_REAL: i32 = 7;
    pub const SQL_DOUBLE: i32 = 8;
    pub const SQL_VARCHAR: i32 = 12;
    pub const SQL_TYPE_DATE: i32 = 91;
    pub const SQL_TYPE_TIME: i32 = 92;
    pub const SQL_TYPE_TIMESTAMP: i32 = 93;
    pub const SQL_LONGVARCHAR: i32 = -1;
    pub const SQL_BINARY: i32 = -2;
    pub const SQL_VARBINARY: i32 = -3;
    pub const SQL_LONGVARBINARY: i32 = -4;
    pub const SQL_BIGINT: i32 = -5;
    pub const SQL_TINYINT: i32 = -6;
    pub const SQL_BIT: i32 = -7;
    pub const SQL_WCHAR: i32 = -8;
    pub const SQL_WVARCHAR: i32 = -9;
    pub const SQL_WLONGVARCHAR: i32 = -10;
    pub const SQL_GUID: i32 = -11;
    pub const SQL_DB2_BLOB: i32 = -98;
    pub const SQL_DB2_CLOB: i32 = -99;
    pub const SQL_DB2_DBCLOB: i32 = -350;
    pub const SQL_DB2_XML: i32 = -370;
    pub const SQL_SS_XML: i32 = -152;
    pub const SQL_INFX_UDT_BLOB: i32 = -102;
    pub const SQL_INFX_UDT_CLOB: i32 = -103;
    pub const SQL_INFX_BIGINT: i32 = -114;
}

impl Vendor {
    /// Native code a parameter of `logical` type is bound as.
    pub fn native_type(self, logical: LogicalType, dimension: usize) -> Result<NativeType> {
        let code = match self.protocol() {
            Protocol::CallInterface => oci_native_type(logical),
            Protocol::Odbc => self.odbc_native_type(logical, dimension),
        };
        code.map(NativeType).ok_or_else(|| {
            Error::unsupported_type(logical, self, "no native representation for parameters")
        })
    }

    /// Logical type of a described result column.
    #[must_use]
    pub fn logical_type(self, native: NativeType, dimension: usize) -> LogicalType {
        match self.protocol() {
            Protocol::CallInterface => oci_logical_type(native.0, dimension),
            Protocol::Odbc => odbc_logical_type(native.0, dimension),
        }
    }

    fn odbc_native_type(self, logical: LogicalType, dimension: usize) -> Option<i32> {
        use odbc::*;

        match logical {
            LogicalType::Char if dimension > LARGE_CHAR_THRESHOLD => Some(SQL_LONGVARCHAR),
            LogicalType::Char => Some(SQL_VARCHAR),
            LogicalType::Date => Some(SQL_TYPE_DATE),
            LogicalType::Timestamp => Some(SQL_TYPE_TIMESTAMP),
            LogicalType::ShortInt => Some(SQL_SMALLINT),
            LogicalType::LongInt if dimension <= 4 => Some(SQL_INTEGER),
            LogicalType::LongInt => Some(SQL_BIGINT),
            LogicalType::Number => Some(SQL_NUMERIC),
            LogicalType::LargeChar => Some(match self {
                Vendor::Db2 => SQL_DB2_CLOB,
                _ => SQL_LONGVARCHAR,
            }),
            LogicalType::Binary => Some(match self {
                Vendor::Db2 => SQL_DB2_BLOB,
                _ => SQL_LONGVARBINARY,
            }),
            LogicalType::Array if self.supports_arrays() => Some(SQL_VARCHAR),
            LogicalType::Array | LogicalType::Cursor | LogicalType::Invalid => None,
        }
    }
}

fn oci_native_type(logical: LogicalType) -> Option<i32> {
    use oci::*;

    match logical {
        LogicalType::Char | LogicalType::Number => Some(SQLT_STR),
        LogicalType::Date => Some(SQLT_ODT),
        LogicalType::Timestamp => Some(SQLT_TIMESTAMP),
        LogicalType::ShortInt | LogicalType::LongInt => Some(SQLT_INT),
        LogicalType::LargeChar => Some(SQLT_CLOB),
        LogicalType::Binary => Some(SQLT_BLOB),
        LogicalType::Cursor => Some(SQLT_RSET),
        LogicalType::Array => Some(SQLT_NTY),
        LogicalType::Invalid => None,
    }
}

fn oci_logical_type(code: i32, dimension: usize) -> LogicalType {
    use oci::*;

    match code {
        SQLT_CHR | SQLT_STR | SQLT_VCS | SQLT_AFC | SQLT_AVC | SQLT_RDD => LogicalType::Char,
        SQLT_INT | SQLT_UIN if dimension <= 2 => LogicalType::ShortInt,
        SQLT_INT | SQLT_UIN => LogicalType::LongInt,
        SQLT_NUM | SQLT_FLT | SQLT_BFLOAT | SQLT_BDOUBLE | SQLT_IBFLOAT | SQLT_IBDOUBLE => {
            LogicalType::Number
        }
        SQLT_DAT | SQLT_ODT | SQLT_DATE => LogicalType::Date,
        SQLT_TIMESTAMP | SQLT_TIMESTAMP_TZ | SQLT_TIMESTAMP_LTZ => LogicalType::Timestamp,
        SQLT_CLOB | SQLT_LNG => LogicalType::LargeChar,
        SQLT_BLOB | SQLT_BIN | SQLT_LBI => LogicalType::Binary,
        SQLT_RSET => LogicalType::Cursor,
        SQLT_NTY => LogicalType::Array,
        _ => LogicalType::Invalid,
    }
}

fn odbc_logical_type(code: i32, dimension: usize) -> LogicalType {
    use odbc::*;

    match code {
        SQL_CHAR | SQL_VARCHAR | SQL_WCHAR | SQL_WVARCHAR
            if dimension == 0 || dimension > LARGE_CHAR_THRESHOLD =>
        {
            LogicalType::LargeChar
        }
        SQL_CHAR | SQL_VARCHAR | SQL_WCHAR | SQL_WVARCHAR | SQL_GUID | SQL_TYPE_TIME => {
            LogicalType::Char
        }
        SQL_SMALLINT | SQL_TINYINT | SQL_BIT => LogicalType::ShortInt,
        SQL_INTEGER | SQL_BIGINT | SQL_INFX_BIGINT => LogicalType::LongInt,
        SQL_NUMERIC | SQL_DECIMAL | SQL_FLOAT | SQL_REAL | SQL_DOUBLE => LogicalType::Number,
        SQL_TYPE_DATE => LogicalType::Date,
        SQL_TYPE_TIMESTAMP => LogicalType::Timestamp,
        SQL_LONGVARCHAR | SQL_WLONGVARCHAR | SQL_DB2_CLOB | SQL_DB2_DBCLOB | SQL_DB2_XML
        | SQL_SS_XML | SQL_INFX_UDT_CLOB => LogicalType::LargeChar,
        SQL_BINARY | SQL_VARBINARY | SQL_LONGVARBINARY | SQL_DB2_BLOB | SQL_INFX_UDT_BLOB => {
            LogicalType::Binary
        }
        // Drivers can render any remaining type as text.
        _ => LogicalType::Char,
    }
}
