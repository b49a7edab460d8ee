mod error_presentation;

use std::{fs, path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use tracing::{debug, warn};
use udal::{
    Backend, Command, CommandKind, ConnectionDescriptor, Database, DatabaseConfig,
    ExecuteOptions, Factory, LogicalType, ParamDirection, Parameter, ResultSet, Value, Vendor,
    require_updates,
};

use crate::error_presentation::{CliError, CliResult, render_runtime_error};

const DEFAULT_OUTPUT_DIMENSION: usize = 255;

#[derive(Debug, Parser)]
#[command(name = "udal", version, about = "Run statements through the udal access layer")]
struct Cli {
    /// Database vendor: oracle, db2, sqlserver, postgresql or informix.
    #[arg(long, global = true, default_value = "oracle", value_parser = parse_vendor)]
    vendor: Vendor,
    /// YAML file with connection settings (retry delays, caching, LOB chunk size).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(flatten)]
    connection: ConnectionArgs,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Args)]
struct ConnectionArgs {
    /// Service name, TNS alias or ODBC data source.
    #[arg(long, global = true, env = "UDAL_DATABASE")]
    database: Option<String>,
    #[arg(long, global = true, env = "UDAL_USER")]
    user: Option<String>,
    #[arg(long, global = true, env = "UDAL_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

impl ConnectionArgs {
    fn descriptor(self) -> CliResult<ConnectionDescriptor> {
        let database = self.database.ok_or(CliError::MissingConnectionField("database"))?;
        let user = self.user.ok_or(CliError::MissingConnectionField("user"))?;
        let password = self.password.ok_or(CliError::MissingConnectionField("password"))?;
        Ok(ConnectionDescriptor::new(database, user, password))
    }
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Connect, report the connection state and disconnect.
    Ping,
    /// Run a query or result-returning procedure and print its rows.
    Query {
        #[command(flatten)]
        statement: StatementArgs,
        /// Fetch at most this many rows.
        #[arg(long, default_value_t = 0)]
        limit: usize,
    },
    /// Run a statement that returns no rows and print the affected-row count.
    Exec {
        #[command(flatten)]
        statement: StatementArgs,
        /// Fail when the statement updates no rows.
        #[arg(long)]
        require_updates: bool,
        /// Run inside a transaction that commits on success.
        #[arg(long)]
        transaction: bool,
    },
}

#[derive(Debug, Args)]
struct StatementArgs {
    /// SQL text, or a procedure name with --procedure.
    statement: String,
    #[arg(long)]
    procedure: bool,
    /// Parameter, bound in the order given: NAME=VALUE or NAME:TYPE=VALUE for
    /// inputs, NAME:TYPE:out[:DIMENSION] for outputs and
    /// NAME:TYPE:inout[:DIMENSION]=VALUE for in-out parameters.
    #[arg(long = "param", value_parser = parse_parameter)]
    params: Vec<Parameter>,
    /// Keep the prepared statement in the connection's statement cache.
    #[arg(long)]
    cached: bool,
}

impl StatementArgs {
    fn command(&self) -> Command {
        let kind = if self.procedure {
            CommandKind::StoredProcedure
        } else {
            CommandKind::Inline
        };
        Command::new(kind, self.statement.as_str()).with_cacheable(self.cached)
    }

    fn parameters(&self) -> Vec<Parameter> {
        self.params.clone()
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_tracing();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{}", render_runtime_error(error));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let config = load_config(cli.config.as_ref())?;
    let factory = Factory::new(cli.vendor);
    if !factory.is_available() {
        return Err(CliError::BackendUnavailable(cli.vendor));
    }
    let descriptor = cli.connection.descriptor()?;

    let mut database = factory.create_database(config)?;
    database.connect(descriptor)?;

    let outcome = match cli.command {
        CliCommand::Ping => ping(&mut database),
        CliCommand::Query { statement, limit } => query(&mut database, &statement, limit),
        CliCommand::Exec {
            statement,
            require_updates,
            transaction,
        } => exec(&mut database, &statement, require_updates, transaction),
    };
    database.disconnect();
    outcome
}

fn ping(database: &mut Database<Backend>) -> CliResult<()> {
    let connected = database.is_connected();
    println!(
        "{} `{}`: {}",
        database.vendor(),
        database.config().name,
        if connected { "connected" } else { "not connected" }
    );
    Ok(())
}

fn query(database: &mut Database<Backend>, statement: &StatementArgs, limit: usize) -> CliResult<()> {
    let mut parameters = statement.parameters();
    let results = database.query(
        &statement.command().query(),
        &mut parameters,
        ExecuteOptions::default().fetch_rows(limit),
    )?;
    print_rows(&results);
    print_outputs(&parameters);
    debug!(stats = ?database.stats(), "query done");
    Ok(())
}

fn exec(
    database: &mut Database<Backend>,
    statement: &StatementArgs,
    must_update: bool,
    transaction: bool,
) -> CliResult<()> {
    let mut parameters = statement.parameters();
    if transaction {
        database.begin_transaction(false)?;
    }

    let affected = database
        .non_query(&statement.command(), &mut parameters, ExecuteOptions::default())
        .and_then(|affected| {
            if must_update {
                require_updates(affected, &statement.statement)
            } else {
                Ok(affected)
            }
        });

    let affected = match affected {
        Ok(affected) => {
            if transaction {
                database.commit()?;
            }
            affected
        }
        Err(error) => {
            if transaction && let Err(rollback) = database.rollback() {
                warn!(error = %rollback, "rollback after failed statement failed");
            }
            return Err(error.into());
        }
    };

    println!("{affected} row(s) affected");
    print_outputs(&parameters);
    Ok(())
}

fn print_rows(results: &ResultSet) {
    let columns = results.columns();
    let header: Vec<&str> = columns.iter().map(|column| column.name.as_str()).collect();
    println!("{}", header.join("\t"));
    for row in results.iter() {
        let cells: Vec<String> = row.iter().map(|column| column.value().to_string()).collect();
        println!("{}", cells.join("\t"));
    }
    println!("({} row(s))", results.len());
}

fn print_outputs(parameters: &[Parameter]) {
    for parameter in parameters.iter().filter(|parameter| parameter.direction().is_output()) {
        println!("{} = {}", parameter.name(), render_value(parameter.value()));
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::ShortInt(Some(number)) => number.to_string(),
        Value::LongInt(Some(number)) => number.to_string(),
        Value::Binary(Some(bytes)) => bytes.iter().map(|byte| format!("{byte:02X}")).collect(),
        Value::Array(elements) => format!("[{}]", elements.join(", ")),
        other => other.as_text().unwrap_or("NULL").to_string(),
    }
}

fn load_config(path: Option<&PathBuf>) -> CliResult<DatabaseConfig> {
    let Some(path) = path else {
        return Ok(DatabaseConfig::default());
    };
    let raw = fs::read_to_string(path).map_err(|source| CliError::ReadConfig {
        path: path.clone(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(|source| CliError::ParseConfig {
        path: path.clone(),
        source,
    })
}

fn parse_vendor(raw: &str) -> Result<Vendor, String> {
    raw.parse::<Vendor>().map_err(|error| error.to_string())
}

fn parse_parameter(raw: &str) -> Result<Parameter, String> {
    let (head, text) = match raw.split_once('=') {
        Some((head, text)) => (head, Some(text)),
        None => (raw, None),
    };

    let mut parts = head.splitn(4, ':');
    let name = parts.next().unwrap_or_default();
    let logical_type = match parts.next() {
        Some(ty) => ty.parse::<LogicalType>().map_err(|error| error.to_string())?,
        None => LogicalType::Char,
    };
    let direction = match parts.next() {
        None => ParamDirection::In,
        Some("out") => ParamDirection::Out,
        Some("inout") => ParamDirection::InOut,
        Some(other) => return Err(format!("unknown direction `{other}`: use out or inout")),
    };
    let dimension = match parts.next() {
        Some(dimension) => dimension
            .parse::<usize>()
            .map_err(|error| format!("invalid dimension `{dimension}`: {error}"))?,
        None => DEFAULT_OUTPUT_DIMENSION,
    };
    if name.is_empty() {
        return Err(format!("missing parameter name in `{raw}`"));
    }

    match (direction, text) {
        (ParamDirection::In, Some(text)) => Ok(Parameter::input(name, typed_value(logical_type, text)?)),
        (ParamDirection::Out, None) => Ok(Parameter::output(name, logical_type, dimension)),
        (ParamDirection::InOut, Some(text)) => Ok(Parameter::in_out(
            name,
            typed_value(logical_type, text)?,
            dimension,
        )),
        (ParamDirection::Out, Some(_)) => Err(format!("output parameter `{name}` takes no value")),
        (_, None) => Err(format!(
            "expected NAME=VALUE, NAME:TYPE=VALUE or NAME:TYPE:out, got `{raw}`"
        )),
    }
}

fn typed_value(logical_type: LogicalType, text: &str) -> Result<Value, String> {
    let text = text.to_string();
    match logical_type {
        LogicalType::Char => Ok(Value::Char(Some(text))),
        LogicalType::Number => Ok(Value::Number(Some(text))),
        LogicalType::Date => Ok(Value::Date(Some(text))),
        LogicalType::Timestamp => Ok(Value::Timestamp(Some(text))),
        LogicalType::LargeChar => Ok(Value::LargeChar(Some(text))),
        LogicalType::ShortInt => text
            .parse::<i16>()
            .map(|number| Value::ShortInt(Some(number)))
            .map_err(|error| format!("invalid short_int `{text}`: {error}")),
        LogicalType::LongInt => text
            .parse::<i64>()
            .map(|number| Value::LongInt(Some(number)))
            .map_err(|error| format!("invalid long_int `{text}`: {error}")),
        LogicalType::Array => Ok(Value::Array(
            text.split(',').map(|element| element.trim().to_string()).collect(),
        )),
        other => Err(format!("`{other}` values cannot be given on the command line")),
    }
}

fn setup_tracing() {
    use tracing_subscriber::{
        EnvFilter, fmt::layer, layer::SubscriberExt, util::SubscriberInitExt,
    };

    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into());
    let fmt_layer = layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use udal::{LogicalType, ParamDirection, Value};

    use super::{StatementArgs, parse_parameter};

    #[test]
    fn inputs_default_to_char() {
        let parameter = parse_parameter("SESSION=abc").expect("char input");
        assert_eq!(parameter.name(), "SESSION");
        assert_eq!(parameter.direction(), ParamDirection::In);
        assert_eq!(parameter.value(), &Value::Char(Some("abc".to_string())));
    }

    #[test]
    fn typed_inputs_are_parsed() {
        let parameter = parse_parameter("ID:long_int=42").expect("long input");
        assert_eq!(parameter.value(), &Value::LongInt(Some(42)));

        let error = parse_parameter("ID:short_int=x").expect_err("not a number");
        assert!(error.contains("invalid short_int"), "{error}");
        assert!(parse_parameter("missing-separator").is_err());
        assert!(parse_parameter("=value").is_err());
    }

    #[test]
    fn outputs_carry_type_and_dimension() {
        let parameter = parse_parameter("STATE:char:out:40").expect("char output");
        assert_eq!(parameter.direction(), ParamDirection::Out);
        assert_eq!(parameter.logical_type(), LogicalType::Char);
        assert_eq!(parameter.dimension(), 40);

        let count = parse_parameter("COUNT:long_int:out").expect("default dimension");
        assert_eq!(count.dimension(), 255);
        assert!(parse_parameter("COUNT:long_int:out=3").is_err());
        assert!(parse_parameter("COUNT:long_int:sideways").is_err());
    }

    #[test]
    fn in_out_parameters_take_a_value() {
        let parameter = parse_parameter("ATTEMPTS:long_int:inout=2").expect("in-out");
        assert_eq!(parameter.direction(), ParamDirection::InOut);
        assert_eq!(parameter.value(), &Value::LongInt(Some(2)));
        assert!(parse_parameter("ATTEMPTS:long_int:inout").is_err());
    }

    #[test]
    fn mixed_parameters_bind_in_command_line_order() {
        let args = StatementArgs {
            statement: "UpdateSession".to_string(),
            procedure: true,
            params: ["SERVICE:long_int=7", "SESSION:char:out:40", "STATE=up"]
                .into_iter()
                .map(|raw| parse_parameter(raw).expect("valid parameter"))
                .collect(),
            cached: false,
        };

        let names: Vec<_> = args
            .parameters()
            .iter()
            .map(|parameter| parameter.name().to_string())
            .collect();
        assert_eq!(names, ["SERVICE", "SESSION", "STATE"]);
    }
}
