use std::{fmt, str::FromStr};

use crate::{Error, Result};

/// Logical data kinds shared by every backend.
///
/// Parameters, columns and the vendor type maps are all defined over this
/// closed set; a backend only has to translate to and from its native codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogicalType {
    Invalid,
    Char,
    Date,
    Timestamp,
    ShortInt,
    LongInt,
    Number,
    LargeChar,
    Binary,
    Cursor,
    Array,
}

impl LogicalType {
    pub const ALL: [LogicalType; 11] = [
        LogicalType::Invalid,
        LogicalType::Char,
        LogicalType::Date,
        LogicalType::Timestamp,
        LogicalType::ShortInt,
        LogicalType::LongInt,
        LogicalType::Number,
        LogicalType::LargeChar,
        LogicalType::Binary,
        LogicalType::Cursor,
        LogicalType::Array,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Char => "char",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
            Self::ShortInt => "short_int",
            Self::LongInt => "long_int",
            Self::Number => "number",
            Self::LargeChar => "large_char",
            Self::Binary => "binary",
            Self::Cursor => "cursor",
            Self::Array => "array",
        }
    }

    /// How a column of this type is physically fetched.
    #[must_use]
    pub fn storage_type(self) -> StorageType {
        match self {
            Self::ShortInt => StorageType::ShortInt,
            Self::LongInt => StorageType::LongInt,
            _ => StorageType::Char,
        }
    }

    /// Large objects are never bound as fetch buffers; they are read out of band.
    #[must_use]
    pub fn is_lob(self) -> bool {
        matches!(self, Self::LargeChar | Self::Binary)
    }

    #[must_use]
    pub fn is_temporal(self) -> bool {
        matches!(self, Self::Date | Self::Timestamp)
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalType {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == normalized)
            .ok_or_else(|| Error::invalid_state(format!("unknown logical type `{raw}`")))
    }
}

/// Physical representation of a fetched column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageType {
    Char,
    ShortInt,
    LongInt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParamDirection {
    #[default]
    In,
    Out,
    InOut,
}

impl ParamDirection {
    #[must_use]
    pub fn is_input(self) -> bool {
        matches!(self, Self::In | Self::InOut)
    }

    #[must_use]
    pub fn is_output(self) -> bool {
        matches!(self, Self::Out | Self::InOut)
    }
}

/// A vendor's native type code (`SQLT_*` for the call interface, `SQL_*` for ODBC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeType(pub i32);

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "native({})", self.0)
    }
}
