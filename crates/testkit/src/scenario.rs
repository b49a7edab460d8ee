use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::debug;
use udal_core::{
    CellValue, Command, CommandKind, ConnectionDescriptor, ConnectionState, Database,
    DatabaseConfig, Diagnostic, Error, ExecuteOptions, LogicalType, ParamDirection, Parameter,
    Result, ResultSet, StorageType, Value, Vendor,
};

use crate::memory::{ColumnSpec, MemoryDriver, Procedure, connection_lost};

const SCENARIO_SOURCE_LABEL: &str = "yaml scenario";

/// One named scenario: a seeded catalog, a list of steps run against a fresh
/// connection, and the counters expected afterwards.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scenario {
    /// Vendors the scenario applies to; empty means every vendor.
    pub vendors: Vec<String>,
    pub config: Option<DatabaseConfig>,
    pub procedures: BTreeMap<String, ProcedureSeed>,
    pub tables: BTreeMap<String, TableSeed>,
    pub steps: Vec<Step>,
    /// Driver counters and pipeline stats by name.
    pub expect: BTreeMap<String, usize>,
    pub state: Option<String>,
    pub in_transaction: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnSeed {
    pub name: String,
    #[serde(rename = "type")]
    pub logical_type: String,
    pub dimension: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcedureSeed {
    pub columns: Vec<ColumnSeed>,
    pub rows: Vec<Vec<serde_yaml::Value>>,
    pub affected: u64,
    pub outputs: BTreeMap<String, serde_yaml::Value>,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableSeed {
    pub columns: Vec<ColumnSeed>,
    pub rows: Vec<Vec<serde_yaml::Value>>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParameterSeed {
    pub name: String,
    #[serde(rename = "type")]
    pub logical_type: String,
    pub value: Option<serde_yaml::Value>,
    /// `in` (default), `out` or `in_out`.
    pub direction: Option<String>,
    pub dimension: Option<usize>,
}

/// Failure raised by the backend on matching executions.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct FailureSeed {
    pub fragment: String,
    pub native_code: i32,
    pub sql_state: Option<String>,
    pub message: Option<String>,
    pub connection_lost: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Connect {
        #[serde(default)]
        error: Option<String>,
    },
    Disconnect,
    Begin {
        #[serde(default)]
        read_only: bool,
        #[serde(default)]
        error: Option<String>,
    },
    Commit {
        #[serde(default)]
        error: Option<String>,
    },
    Rollback {
        #[serde(default)]
        error: Option<String>,
    },
    Query {
        text: String,
        #[serde(default)]
        procedure: bool,
        #[serde(default)]
        cached: bool,
        #[serde(default)]
        on_cursor: bool,
        #[serde(default)]
        fetch_rows: usize,
        #[serde(default)]
        params: Vec<ParameterSeed>,
        #[serde(default)]
        rows: Option<usize>,
        #[serde(default)]
        columns: Option<Vec<String>>,
        #[serde(default)]
        first_row: Option<BTreeMap<String, String>>,
        #[serde(default)]
        outputs: Option<BTreeMap<String, String>>,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        code: Option<String>,
    },
    NonQuery {
        text: String,
        #[serde(default)]
        procedure: bool,
        #[serde(default)]
        cached: bool,
        #[serde(default)]
        on_cursor: bool,
        #[serde(default)]
        params: Vec<ParameterSeed>,
        #[serde(default)]
        affected: Option<u64>,
        #[serde(default)]
        outputs: Option<BTreeMap<String, String>>,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        code: Option<String>,
    },
    Fetch {
        #[serde(default)]
        rows: usize,
        #[serde(default)]
        expect_rows: Option<usize>,
    },
    Rewind {
        #[serde(default)]
        error: Option<String>,
    },
    ReleaseCursor,
    FailExecute(FailureSeed),
    FailLogins {
        count: usize,
    },
    ClearFailures,
    Sever,
    IsConnected {
        expect: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestResult {
    Passed,
    Skipped(String),
    Failed(String),
}

pub fn load_scenarios_from_str(yaml: &str) -> Result<BTreeMap<String, Scenario>> {
    serde_yaml::from_str(yaml).map_err(|source| parse_yaml_error(yaml, &source))
}

/// Whether the scenario lists `vendor`; an empty list matches all vendors.
pub fn applies_to(scenario: &Scenario, vendor: Vendor) -> bool {
    scenario.vendors.is_empty()
        || scenario
            .vendors
            .iter()
            .any(|name| name.parse::<Vendor>().is_ok_and(|listed| listed == vendor))
}

/// Runs `scenario` against a fresh [`MemoryDriver`] for `vendor`. Delays are
/// always zeroed.
pub fn run_scenario(scenario: &Scenario, vendor: Vendor) -> TestResult {
    if !applies_to(scenario, vendor) {
        return TestResult::Skipped(format!(
            "scenario is limited to [{}], running on {vendor}",
            scenario.vendors.join(", ")
        ));
    }

    match run_scenario_flow(scenario, vendor) {
        Ok(()) => TestResult::Passed,
        Err(message) => TestResult::Failed(message),
    }
}

fn run_scenario_flow(scenario: &Scenario, vendor: Vendor) -> std::result::Result<(), String> {
    let driver = MemoryDriver::new(vendor);
    seed(&driver, scenario).map_err(|error| format!("seed: {error}"))?;

    let config = scenario.config.clone().unwrap_or_default().without_delays();
    let mut database = Database::new(driver.clone(), config);

    for (index, step) in scenario.steps.iter().enumerate() {
        debug!(index, ?step, "running scenario step");
        run_step(&mut database, &driver, step)
            .map_err(|message| format!("step {} ({}): {message}", index + 1, step_name(step)))?;
    }

    check_expectations(scenario, &database, &driver)
}

fn seed(driver: &MemoryDriver, scenario: &Scenario) -> Result<()> {
    for (name, seed) in &scenario.procedures {
        let columns = column_specs(&seed.columns)?;
        let rows = seed_rows(&columns, &seed.rows)?;
        let mut procedure = if columns.is_empty() {
            Procedure::update(seed.affected)
        } else {
            Procedure::query(columns, rows)
        };
        for (output, value) in &seed.outputs {
            let cell = yaml_text(value).map_or(CellValue::Null, CellValue::Text);
            procedure = procedure.with_output(output, cell);
        }
        if let Some(message) = &seed.warning {
            let warning = Diagnostic::new(1, message.clone()).with_sql_state("01000");
            procedure = procedure.with_warning(warning);
        }
        driver.procedure(name, procedure);
    }

    for (name, seed) in &scenario.tables {
        let columns = column_specs(&seed.columns)?;
        let rows = seed_rows(&columns, &seed.rows)?;
        driver.table(name, columns, rows);
    }
    Ok(())
}

fn column_specs(seeds: &[ColumnSeed]) -> Result<Vec<ColumnSpec>> {
    seeds
        .iter()
        .map(|seed| {
            let logical_type: LogicalType = seed.logical_type.parse()?;
            let dimension = seed.dimension.unwrap_or(match logical_type {
                LogicalType::ShortInt => 2,
                LogicalType::LongInt => 8,
                _ => 255,
            });
            Ok(ColumnSpec::new(seed.name.clone(), logical_type, dimension))
        })
        .collect()
}

fn seed_rows(columns: &[ColumnSpec], rows: &[Vec<serde_yaml::Value>]) -> Result<Vec<Vec<CellValue>>> {
    rows.iter()
        .map(|row| {
            if row.len() != columns.len() {
                return Err(Error::invalid_state(format!(
                    "seed row has {} values for {} columns",
                    row.len(),
                    columns.len()
                )));
            }
            columns.iter().zip(row).map(|(column, value)| seed_cell(column, value)).collect()
        })
        .collect()
}

fn seed_cell(column: &ColumnSpec, value: &serde_yaml::Value) -> Result<CellValue> {
    let Some(text) = yaml_text(value) else {
        return Ok(CellValue::Null);
    };
    let invalid = || Error::invalid_state(format!("`{text}` is not an integer for {}", column.name));

    Ok(match column.logical_type.storage_type() {
        StorageType::ShortInt => CellValue::ShortInt(text.trim().parse().map_err(|_| invalid())?),
        StorageType::LongInt => CellValue::LongInt(text.trim().parse().map_err(|_| invalid())?),
        StorageType::Char if column.logical_type == LogicalType::Binary => {
            CellValue::Bytes(text.into_bytes())
        }
        StorageType::Char => CellValue::Text(text),
    })
}

fn yaml_text(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Null => None,
        serde_yaml::Value::Bool(flag) => Some(flag.to_string()),
        serde_yaml::Value::Number(number) => Some(number.to_string()),
        serde_yaml::Value::String(text) => Some(text.clone()),
        other => Some(serde_yaml::to_string(other).unwrap_or_default().trim().to_string()),
    }
}

fn parameters(seeds: &[ParameterSeed]) -> Result<Vec<Parameter>> {
    seeds.iter().map(parameter).collect()
}

fn parameter(seed: &ParameterSeed) -> Result<Parameter> {
    let logical_type: LogicalType = seed.logical_type.parse()?;
    let text = seed.value.as_ref().and_then(yaml_text);
    let direction = match seed.direction.as_deref().map(str::trim) {
        None | Some("in") => ParamDirection::In,
        Some("out") => ParamDirection::Out,
        Some("in_out" | "inout") => ParamDirection::InOut,
        Some(other) => {
            return Err(Error::invalid_state(format!(
                "parameter `{}` has unknown direction `{other}`",
                seed.name
            )));
        }
    };

    if direction == ParamDirection::Out {
        let dimension = seed.dimension.unwrap_or(255);
        return Ok(Parameter::output(seed.name.clone(), logical_type, dimension));
    }

    let parse_error = |text: &str| {
        Error::invalid_state(format!("parameter `{}`: `{text}` is not an integer", seed.name))
    };
    let value = match (logical_type, text) {
        (LogicalType::Array, _) => {
            let elements = match &seed.value {
                Some(serde_yaml::Value::Sequence(items)) => {
                    items.iter().filter_map(yaml_text).collect()
                }
                _ => Vec::new(),
            };
            Value::Array(elements)
        }
        (logical_type, None) => Value::null(logical_type),
        (LogicalType::ShortInt, Some(text)) => {
            Value::ShortInt(Some(text.trim().parse().map_err(|_| parse_error(&text))?))
        }
        (LogicalType::LongInt, Some(text)) => {
            Value::LongInt(Some(text.trim().parse().map_err(|_| parse_error(&text))?))
        }
        (LogicalType::Binary, Some(text)) => Value::Binary(Some(text.into_bytes())),
        (LogicalType::Date, Some(text)) => Value::Date(Some(text)),
        (LogicalType::Timestamp, Some(text)) => Value::Timestamp(Some(text)),
        (LogicalType::Number, Some(text)) => Value::Number(Some(text)),
        (LogicalType::LargeChar, Some(text)) => Value::LargeChar(Some(text)),
        (_, Some(text)) => Value::Char(Some(text)),
    };

    let mut parameter = Parameter::input(seed.name.clone(), value).with_direction(direction);
    if let Some(dimension) = seed.dimension {
        parameter = parameter.with_dimension(dimension);
    }
    Ok(parameter)
}

fn command(text: &str, procedure: bool, cached: bool) -> Command {
    let kind = if procedure {
        CommandKind::StoredProcedure
    } else {
        CommandKind::Inline
    };
    Command::new(kind, text).with_cacheable(cached)
}

fn run_step(
    database: &mut Database<MemoryDriver>,
    driver: &MemoryDriver,
    step: &Step,
) -> std::result::Result<(), String> {
    match step {
        Step::Connect { error } => expect_outcome(
            database.connect(ConnectionDescriptor::new("MEMORY", "udal", "udal")),
            error.as_deref(),
            None,
        )
        .map(|_| ()),
        Step::Disconnect => {
            database.disconnect();
            Ok(())
        }
        Step::Begin { read_only, error } => {
            expect_outcome(database.begin_transaction(*read_only), error.as_deref(), None)
                .map(|_| ())
        }
        Step::Commit { error } => {
            expect_outcome(database.commit(), error.as_deref(), None).map(|_| ())
        }
        Step::Rollback { error } => {
            expect_outcome(database.rollback(), error.as_deref(), None).map(|_| ())
        }
        Step::Query {
            text,
            procedure,
            cached,
            on_cursor,
            fetch_rows,
            params,
            rows,
            columns,
            first_row,
            outputs,
            error,
            code,
        } => {
            let mut parameters = parameters(params).map_err(|error| error.to_string())?;
            let command = command(text, *procedure, *cached).query();
            let options = ExecuteOptions {
                on_cursor: *on_cursor,
                fetch_rows: *fetch_rows,
            };
            let result = database.query(&command, &mut parameters, options);
            let Some(results) = expect_outcome(result, error.as_deref(), code.as_deref())? else {
                return Ok(());
            };
            check_results(&results, *rows, columns.as_deref(), first_row.as_ref())?;
            check_outputs(&parameters, outputs.as_ref())
        }
        Step::NonQuery {
            text,
            procedure,
            cached,
            on_cursor,
            params,
            affected,
            outputs,
            error,
            code,
        } => {
            let mut parameters = parameters(params).map_err(|error| error.to_string())?;
            let command = command(text, *procedure, *cached);
            let options = ExecuteOptions {
                on_cursor: *on_cursor,
                fetch_rows: 0,
            };
            let result = database.non_query(&command, &mut parameters, options);
            let Some(actual) = expect_outcome(result, error.as_deref(), code.as_deref())? else {
                return Ok(());
            };
            if let Some(expected) = affected
                && *expected != actual
            {
                return Err(format!("expected {expected} affected rows, got {actual}"));
            }
            check_outputs(&parameters, outputs.as_ref())
        }
        Step::Fetch { rows, expect_rows } => {
            let results = database.fetch_cursor(*rows).map_err(|error| error.to_string())?;
            check_results(&results, *expect_rows, None, None)
        }
        Step::Rewind { error } => {
            expect_outcome(database.rewind_cursor(), error.as_deref(), None).map(|_| ())
        }
        Step::ReleaseCursor => database.release_cursor().map_err(|error| error.to_string()),
        Step::FailExecute(failure) => {
            let vendor = database.vendor();
            let diagnostic = if failure.connection_lost {
                connection_lost(vendor)
            } else {
                let message = failure
                    .message
                    .clone()
                    .unwrap_or_else(|| "injected failure".to_string());
                let diagnostic = Diagnostic::new(failure.native_code, message);
                match &failure.sql_state {
                    Some(state) => diagnostic.with_sql_state(state.clone()),
                    None => diagnostic,
                }
            };
            driver.fail_execute(&failure.fragment, diagnostic);
            Ok(())
        }
        Step::FailLogins { count } => {
            driver.fail_logins(*count, connection_lost(database.vendor()));
            Ok(())
        }
        Step::ClearFailures => {
            driver.clear_failures();
            Ok(())
        }
        Step::Sever => {
            driver.sever();
            Ok(())
        }
        Step::IsConnected { expect } => {
            let actual = database.is_connected();
            if actual == *expect {
                Ok(())
            } else {
                Err(format!("is_connected returned {actual}, expected {expect}"))
            }
        }
    }
}

/// Matches an outcome against an expected error kind and vendor code.
/// Returns the value when success was expected.
fn expect_outcome<T>(
    result: Result<T>,
    expected_kind: Option<&str>,
    expected_code: Option<&str>,
) -> std::result::Result<Option<T>, String> {
    match (result, expected_kind) {
        (Ok(value), None) => Ok(Some(value)),
        (Ok(_), Some(kind)) => Err(format!("expected error: {kind}, but got no error")),
        (Err(error), None) => Err(error.to_string()),
        (Err(error), Some(kind)) => {
            if error.kind().as_str() != kind {
                return Err(format!(
                    "expected error: {kind}, but got: {} ({error})",
                    error.kind().as_str()
                ));
            }
            if let Some(code) = expected_code
                && error.vendor_code() != Some(code)
            {
                return Err(format!(
                    "expected code {code}, but got {}",
                    error.vendor_code().unwrap_or("none")
                ));
            }
            Ok(None)
        }
    }
}

fn check_results(
    results: &ResultSet,
    rows: Option<usize>,
    columns: Option<&[String]>,
    first_row: Option<&BTreeMap<String, String>>,
) -> std::result::Result<(), String> {
    if let Some(expected) = rows
        && results.len() != expected
    {
        return Err(format!("expected {expected} rows, got {}", results.len()));
    }

    if let Some(expected) = columns {
        for row in results.iter() {
            let names = row.column_names();
            if names != expected.iter().map(String::as_str).collect::<Vec<_>>() {
                return Err(format!("expected columns {expected:?}, got {names:?}"));
            }
        }
    }

    if let Some(expected) = first_row {
        let row = results.rows().first().ok_or("expected a first row, got none")?;
        for (name, value) in expected {
            let actual = row
                .value(name)
                .map(ToString::to_string)
                .ok_or_else(|| format!("first row has no column {name}"))?;
            if &actual != value {
                return Err(format!("column {name}: expected `{value}`, got `{actual}`"));
            }
        }
    }
    Ok(())
}

fn check_outputs(
    parameters: &[Parameter],
    expected: Option<&BTreeMap<String, String>>,
) -> std::result::Result<(), String> {
    let Some(expected) = expected else {
        return Ok(());
    };
    for (name, value) in expected {
        let parameter = parameters
            .iter()
            .find(|parameter| parameter.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| format!("no parameter named {name}"))?;
        let actual = rendered_value(parameter.value());
        if &actual != value {
            return Err(format!("output {name}: expected `{value}`, got `{actual}`"));
        }
    }
    Ok(())
}

fn rendered_value(value: &Value) -> String {
    match value {
        Value::ShortInt(Some(number)) => number.to_string(),
        Value::LongInt(Some(number)) => number.to_string(),
        Value::Binary(Some(bytes)) => String::from_utf8_lossy(bytes).into_owned(),
        other => other.as_text().unwrap_or_default().to_string(),
    }
}

fn check_expectations(
    scenario: &Scenario,
    database: &Database<MemoryDriver>,
    driver: &MemoryDriver,
) -> std::result::Result<(), String> {
    let counters = driver.counters();
    let stats = database.stats();
    for (name, expected) in &scenario.expect {
        let actual = match name.as_str() {
            "reconnects" => Some(stats.reconnects as usize),
            "cache_hits" => Some(stats.cache_hits as usize),
            "cache_misses" => Some(stats.cache_misses as usize),
            "rows_fetched" => Some(stats.rows_fetched as usize),
            "executions" => Some(stats.executions as usize),
            "cached_statements" => Some(database.cached_statements()),
            other => counters.get(other),
        }
        .ok_or_else(|| format!("unknown counter `{name}`"))?;
        if actual != *expected {
            return Err(format!("expected {name} = {expected}, got {actual}"));
        }
    }

    if let Some(expected) = &scenario.state {
        let actual = match database.state() {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        };
        if actual != expected {
            return Err(format!("expected state {expected}, got {actual}"));
        }
    }

    if let Some(expected) = scenario.in_transaction
        && database.in_transaction() != expected
    {
        return Err(format!(
            "expected in_transaction = {expected}, got {}",
            database.in_transaction()
        ));
    }
    Ok(())
}

fn step_name(step: &Step) -> &'static str {
    match step {
        Step::Connect { .. } => "connect",
        Step::Disconnect => "disconnect",
        Step::Begin { .. } => "begin",
        Step::Commit { .. } => "commit",
        Step::Rollback { .. } => "rollback",
        Step::Query { .. } => "query",
        Step::NonQuery { .. } => "non_query",
        Step::Fetch { .. } => "fetch",
        Step::Rewind { .. } => "rewind",
        Step::ReleaseCursor => "release_cursor",
        Step::FailExecute(_) => "fail_execute",
        Step::FailLogins { .. } => "fail_logins",
        Step::ClearFailures => "clear_failures",
        Step::Sever => "sever",
        Step::IsConnected { .. } => "is_connected",
    }
}

fn parse_yaml_error(yaml: &str, source: &serde_yaml::Error) -> Error {
    let location = source
        .location()
        .map(|location| format!(" at line {}, column {}", location.line(), location.column()))
        .unwrap_or_default();
    Error::invalid_state(format!("{}{location}: {source}", source_excerpt(yaml)))
}

fn source_excerpt(yaml: &str) -> String {
    const MAX_CHARS: usize = 64;

    let trimmed = yaml.trim();
    if trimmed.is_empty() {
        return SCENARIO_SOURCE_LABEL.to_string();
    }
    let first_line = trimmed.lines().next().unwrap_or_default();
    if first_line.chars().count() <= MAX_CHARS {
        return format!("{SCENARIO_SOURCE_LABEL} `{first_line}`");
    }
    let excerpt: String = first_line.chars().take(MAX_CHARS).collect();
    format!("{SCENARIO_SOURCE_LABEL} `{excerpt}...`")
}
