use std::fmt;

use crate::LogicalType;

/// A bind value tagged with its logical type. `None` is the null indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Char(Option<String>),
    Date(Option<String>),
    Timestamp(Option<String>),
    ShortInt(Option<i16>),
    LongInt(Option<i64>),
    Number(Option<String>),
    LargeChar(Option<String>),
    Binary(Option<Vec<u8>>),
    /// Placeholder for a result cursor produced by a stored procedure.
    Cursor,
    Array(Vec<String>),
}

impl Value {
    /// An unset value of the given logical type.
    #[must_use]
    pub fn null(logical_type: LogicalType) -> Self {
        match logical_type {
            LogicalType::Char | LogicalType::Invalid => Self::Char(None),
            LogicalType::Date => Self::Date(None),
            LogicalType::Timestamp => Self::Timestamp(None),
            LogicalType::ShortInt => Self::ShortInt(None),
            LogicalType::LongInt => Self::LongInt(None),
            LogicalType::Number => Self::Number(None),
            LogicalType::LargeChar => Self::LargeChar(None),
            LogicalType::Binary => Self::Binary(None),
            LogicalType::Cursor => Self::Cursor,
            LogicalType::Array => Self::Array(Vec::new()),
        }
    }

    #[must_use]
    pub fn logical_type(&self) -> LogicalType {
        match self {
            Self::Char(_) => LogicalType::Char,
            Self::Date(_) => LogicalType::Date,
            Self::Timestamp(_) => LogicalType::Timestamp,
            Self::ShortInt(_) => LogicalType::ShortInt,
            Self::LongInt(_) => LogicalType::LongInt,
            Self::Number(_) => LogicalType::Number,
            Self::LargeChar(_) => LogicalType::LargeChar,
            Self::Binary(_) => LogicalType::Binary,
            Self::Cursor => LogicalType::Cursor,
            Self::Array(_) => LogicalType::Array,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        match self {
            Self::Char(value)
            | Self::Date(value)
            | Self::Timestamp(value)
            | Self::Number(value)
            | Self::LargeChar(value) => value.is_none(),
            Self::ShortInt(value) => value.is_none(),
            Self::LongInt(value) => value.is_none(),
            Self::Binary(value) => value.is_none(),
            Self::Cursor => true,
            Self::Array(_) => false,
        }
    }

    /// Text form of textual variants, used by drivers binding through
    /// character buffers.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Char(value)
            | Self::Date(value)
            | Self::Timestamp(value)
            | Self::Number(value)
            | Self::LargeChar(value) => value.as_deref(),
            _ => None,
        }
    }

    /// Clips character data to `dimension` bytes without splitting a UTF-8
    /// sequence. Large objects, integers and arrays are returned unchanged.
    #[must_use]
    pub fn truncated(&self, dimension: usize) -> Self {
        match self {
            Self::Char(Some(text)) => Self::Char(Some(truncate_to_boundary(text, dimension))),
            Self::Number(Some(text)) => Self::Number(Some(truncate_to_boundary(text, dimension))),
            other => other.clone(),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Char(Some(value.to_string()))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Char(Some(value))
    }
}

impl From<i16> for Value {
    fn from(value: i16) -> Self {
        Self::ShortInt(Some(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::LongInt(Some(value))
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(Some(value))
    }
}

pub(crate) fn truncate_to_boundary(text: &str, dimension: usize) -> String {
    if text.len() <= dimension {
        return text.to_string();
    }
    let mut end = dimension;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// A fetched cell. The variant always agrees with the column's storage type:
/// `Text`/`Bytes` for char storage, `ShortInt`/`LongInt` for integer storage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CellValue {
    #[default]
    Null,
    Text(String),
    Bytes(Vec<u8>),
    ShortInt(i16),
    LongInt(i64),
}

impl CellValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Text(text) => Some(text.as_bytes()),
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::ShortInt(value) => Some(i64::from(*value)),
            Self::LongInt(value) => Some(*value),
            Self::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Converts a cell read back from an output parameter into a bind value of
    /// the parameter's logical type.
    #[must_use]
    pub fn into_value(self, logical_type: LogicalType) -> Value {
        match (logical_type, self) {
            (logical_type, Self::Null) => Value::null(logical_type),
            (LogicalType::ShortInt, cell) => {
                Value::ShortInt(cell.as_i64().and_then(|value| i16::try_from(value).ok()))
            }
            (LogicalType::LongInt, cell) => Value::LongInt(cell.as_i64()),
            (LogicalType::Binary, Self::Bytes(bytes)) => Value::Binary(Some(bytes)),
            (LogicalType::Binary, Self::Text(text)) => Value::Binary(Some(text.into_bytes())),
            (logical_type, cell) => {
                let text = cell.to_string();
                match logical_type {
                    LogicalType::Date => Value::Date(Some(text)),
                    LogicalType::Timestamp => Value::Timestamp(Some(text)),
                    LogicalType::Number => Value::Number(Some(text)),
                    LogicalType::LargeChar => Value::LargeChar(Some(text)),
                    _ => Value::Char(Some(text)),
                }
            }
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Text(text) => f.write_str(text),
            Self::Bytes(bytes) => {
                for byte in bytes {
                    write!(f, "{byte:02X}")?;
                }
                Ok(())
            }
            Self::ShortInt(value) => write!(f, "{value}"),
            Self::LongInt(value) => write!(f, "{value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CellValue, Value};
    use crate::LogicalType;

    #[test]
    fn truncation_respects_utf8_boundaries() {
        let value = Value::from("héllo");
        assert_eq!(value.truncated(2), Value::from("h"));
        assert_eq!(value.truncated(3), Value::from("hé"));
        assert_eq!(value.truncated(64), Value::from("héllo"));
    }

    #[test]
    fn large_objects_are_never_truncated() {
        let value = Value::LargeChar(Some("x".repeat(100)));
        assert_eq!(value.truncated(10), value);
    }

    #[test]
    fn output_cells_convert_to_parameter_types() {
        assert_eq!(
            CellValue::Text("42".to_string()).into_value(LogicalType::LongInt),
            Value::LongInt(Some(42))
        );
        assert_eq!(
            CellValue::Null.into_value(LogicalType::Char),
            Value::Char(None)
        );
        assert_eq!(
            CellValue::Bytes(vec![1, 2]).into_value(LogicalType::Binary),
            Value::Binary(Some(vec![1, 2]))
        );
    }
}
