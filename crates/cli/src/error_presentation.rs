use std::{io, path::PathBuf};

use miette::Report;
use udal::Vendor;

const DATABASE_CONTEXT: &str = "while talking to the database";
const CONFIG_READ_CONTEXT: &str = "while reading config file";
const CONFIG_PARSE_CONTEXT: &str = "while parsing config file";

pub(crate) type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug)]
pub(crate) enum CliError {
    MissingConnectionField(&'static str),
    ReadConfig {
        path: PathBuf,
        source: io::Error,
    },
    ParseConfig {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    BackendUnavailable(Vendor),
    Core(udal::Error),
}

impl From<udal::Error> for CliError {
    fn from(value: udal::Error) -> Self {
        Self::Core(value)
    }
}

pub(crate) fn render_runtime_error(error: CliError) -> String {
    match error {
        CliError::MissingConnectionField(field) => {
            format!("[usage] {}", missing_connection_field_message(field))
        }
        CliError::ReadConfig { path, source } => {
            let context = format!("{CONFIG_READ_CONTEXT} `{}`", path.display());
            let report = report_with_context(source, context);
            format!("[io] {report}")
        }
        CliError::ParseConfig { path, source } => {
            let context = format!("{CONFIG_PARSE_CONTEXT} `{}`", path.display());
            let report = report_with_context(source, context);
            format!("[config] {report}")
        }
        CliError::BackendUnavailable(vendor) => {
            format!("[config] {}", backend_unavailable_message(vendor))
        }
        CliError::Core(source) => {
            let category = core_category(&source);
            let report = report_with_context(source, DATABASE_CONTEXT);
            format!("[{category}] {report}")
        }
    }
}

fn report_with_context<E, C>(source: E, context: C) -> Report
where
    E: std::error::Error + Send + Sync + 'static,
    C: Into<String>,
{
    let context = context.into();
    let anyhow_error = anyhow::Error::new(source).context(context);
    miette::miette!("{anyhow_error:#}")
}

fn core_category(error: &udal::Error) -> &'static str {
    error.kind().as_str()
}

fn missing_connection_field_message(field: &str) -> String {
    format!(
        "missing connection {field}: pass --{field} <VALUE> or set UDAL_{}",
        field.to_ascii_uppercase()
    )
}

fn backend_unavailable_message(vendor: Vendor) -> String {
    let feature = if vendor.is_odbc() { "odbc" } else { "oracle" };
    format!(
        "the {} backend is not compiled into this build; rebuild with the `{feature}` feature",
        vendor.name()
    )
}
