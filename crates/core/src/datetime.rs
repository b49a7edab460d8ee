//! Text conversions for date and timestamp values.
//!
//! Date parameters travel as text and are converted to native descriptors by
//! the drivers; date columns come back as text rendered with the same format.

use std::fmt::Write as _;

use chrono::{
    NaiveDate, NaiveDateTime,
    format::{Item, StrftimeItems},
};

use crate::{CallResult, Diagnostic};

const INVALID_DATETIME_STATE: &str = "22007";
const FALLBACK_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];
const FALLBACK_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y"];

/// Parses `text` with the configured format, then with a few unambiguous
/// fallbacks. Date-only input resolves to midnight.
pub fn parse(text: &str, format: &str) -> CallResult<NaiveDateTime> {
    let text = text.trim();

    if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
        return Ok(parsed);
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, format) {
        return Ok(date.and_time(chrono::NaiveTime::MIN));
    }
    for fallback in FALLBACK_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, fallback) {
            return Ok(parsed);
        }
    }
    for fallback in FALLBACK_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, fallback) {
            return Ok(date.and_time(chrono::NaiveTime::MIN));
        }
    }

    Err(Diagnostic::new(
        0,
        format!("`{text}` does not match date format `{format}`"),
    )
    .with_sql_state(INVALID_DATETIME_STATE))
}

/// Rejects patterns `chrono` cannot interpret.
pub fn validate_format(format: &str) -> Result<(), String> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(format!("`{format}` is not a valid date format"));
    }
    Ok(())
}

/// Formats `value`; a pattern that needs fields a naive timestamp lacks
/// (an offset, say) fails with 22007 instead of panicking.
pub fn render(value: &NaiveDateTime, format: &str) -> CallResult<String> {
    let mut rendered = String::new();
    write!(rendered, "{}", value.format(format)).map_err(|_| {
        Diagnostic::new(0, format!("cannot render `{value}` with date format `{format}`"))
            .with_sql_state(INVALID_DATETIME_STATE)
    })?;
    Ok(rendered)
}
