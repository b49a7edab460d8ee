//! Values planned for binding and the shapes columns are read back as.
//!
//! Everything here is independent of the driver manager; the native
//! statement turns each [`BindValue`] into an owned `odbc-api` parameter.

use chrono::NaiveDateTime;
use udal_core::{CallResult, Diagnostic, LogicalType, Parameter, Value, Vendor, datetime, driver};

/// One placeholder's value, owned until the statement executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindValue {
    Text(Option<String>),
    Bytes(Option<Vec<u8>>),
    Short(Option<i16>),
    BigInt(Option<i64>),
    Timestamp(Option<NaiveDateTime>),
}

/// Which representation a fetched column is read as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadAs {
    Text,
    Binary,
    Short,
    BigInt,
    Timestamp,
}

/// Plans the values for one parameter. Arrays expand into one text value per
/// element, bound at consecutive positions.
pub fn plan_parameter(
    vendor: Vendor,
    parameter: &Parameter,
    date_format: &str,
) -> CallResult<Vec<BindValue>> {
    vendor
        .native_type(parameter.logical_type(), parameter.dimension())
        .map_err(|error| Diagnostic::driver(error.to_string()))?;
    if parameter.direction().is_output() {
        return Err(driver::not_implemented(format!(
            "output parameter `{}`: {} procedures hand values back as result sets",
            parameter.name(),
            vendor.name()
        )));
    }

    let value = match parameter.bind_value() {
        Value::Char(text) | Value::Number(text) | Value::LargeChar(text) => {
            BindValue::Text(text.clone())
        }
        Value::Binary(bytes) => BindValue::Bytes(bytes.clone()),
        Value::ShortInt(value) => BindValue::Short(value),
        Value::LongInt(value) => BindValue::BigInt(value),
        Value::Date(text) | Value::Timestamp(text) => BindValue::Timestamp(
            text.as_deref()
                .map(|text| datetime::parse(text, date_format))
                .transpose()?,
        ),
        Value::Array(elements) => {
            return Ok(elements
                .iter()
                .map(|element| BindValue::Text(Some(element.clone())))
                .collect());
        }
        Value::Cursor => {
            return Err(Diagnostic::driver(format!(
                "cursor parameter `{}` cannot be bound by value",
                parameter.name()
            )));
        }
    };
    Ok(vec![value])
}

#[must_use]
pub fn read_as(logical_type: LogicalType) -> ReadAs {
    match logical_type {
        LogicalType::ShortInt => ReadAs::Short,
        LogicalType::LongInt => ReadAs::BigInt,
        LogicalType::Date | LogicalType::Timestamp => ReadAs::Timestamp,
        LogicalType::Binary => ReadAs::Binary,
        _ => ReadAs::Text,
    }
}

/// Statement that makes the transaction just opened read-only, for vendors
/// that have one. The others rely on the layer above to refuse writes.
#[must_use]
pub fn read_only_statement(vendor: Vendor) -> Option<&'static str> {
    match vendor {
        Vendor::PostgreSql | Vendor::Informix => Some("SET TRANSACTION READ ONLY"),
        _ => None,
    }
}
