use std::sync::Arc;

use crate::{ColumnShape, Error, LogicalType, Parameter, Result, Vendor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    StoredProcedure,
    Inline,
}

/// A statement as supplied by a caller: opaque text plus how to run it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    text: String,
    kind: CommandKind,
    query: bool,
    cacheable: bool,
}

impl Command {
    pub fn new(kind: CommandKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind,
            query: false,
            cacheable: false,
        }
    }

    pub fn procedure(name: impl Into<String>) -> Self {
        Self::new(CommandKind::StoredProcedure, name)
    }

    pub fn inline(sql: impl Into<String>) -> Self {
        Self::new(CommandKind::Inline, sql)
    }

    #[must_use]
    pub fn query(mut self) -> Self {
        self.query = true;
        self
    }

    #[must_use]
    pub fn cached(mut self) -> Self {
        self.cacheable = true;
        self
    }

    #[must_use]
    pub fn with_cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    #[must_use]
    pub fn is_query(&self) -> bool {
        self.query
    }

    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }
}

/// Per-call execution options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecuteOptions {
    /// Queries: keep the cursor open after fetching. Non-queries: act on the
    /// row the held cursor is positioned on.
    pub on_cursor: bool,
    /// Maximum rows to fetch; `0` fetches everything.
    pub fetch_rows: usize,
}

impl ExecuteOptions {
    #[must_use]
    pub fn on_cursor() -> Self {
        Self {
            on_cursor: true,
            fetch_rows: 0,
        }
    }

    #[must_use]
    pub fn fetch_rows(mut self, rows: usize) -> Self {
        self.fetch_rows = rows;
        self
    }
}

/// Everything compiled text depends on besides the raw statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileSignature {
    layout: Vec<(LogicalType, usize)>,
    fetch_rows: usize,
    positioned_on: Option<String>,
}

impl CompileSignature {
    fn new(parameters: &[Parameter], fetch_rows: usize, positioned_on: Option<&str>) -> Self {
        Self {
            layout: parameters
                .iter()
                .map(|parameter| (parameter.logical_type(), parameter.elements().len()))
                .collect(),
            fetch_rows,
            positioned_on: positioned_on.map(ToString::to_string),
        }
    }
}

/// Target of a positioned update: the held cursor's name (ODBC) or the
/// presence of a row locator (call interface).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Positioned<'a> {
    pub cursor_name: Option<&'a str>,
}

/// A command resolved against one vendor, optionally carrying the result
/// shape discovered on first execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledCommand {
    raw_text: String,
    kind: CommandKind,
    query: bool,
    compiled_text: String,
    signature: CompileSignature,
    columns: Option<Vec<Arc<ColumnShape>>>,
}

impl CompiledCommand {
    pub fn compile(
        vendor: Vendor,
        command: &Command,
        parameters: &[Parameter],
        fetch_rows: usize,
        positioned: Option<Positioned<'_>>,
    ) -> Result<Self> {
        let compiled_text = match command.kind() {
            CommandKind::StoredProcedure => {
                if positioned.is_some() {
                    return Err(Error::invalid_state(format!(
                        "stored procedure `{}` cannot run against a held cursor",
                        command.text()
                    )));
                }
                vendor.procedure_call(command.text(), parameters, command.is_query())?
            }
            CommandKind::Inline => {
                ensure_inline_parameters(vendor, parameters)?;
                compile_inline(vendor, command, fetch_rows, positioned)?
            }
        };

        Ok(Self {
            raw_text: command.text().to_string(),
            kind: command.kind(),
            query: command.is_query(),
            compiled_text,
            signature: CompileSignature::new(
                parameters,
                fetch_rows,
                positioned.and_then(|target| target.cursor_name),
            ),
            columns: None,
        })
    }

    /// Whether this entry was compiled for the same parameter layout and options.
    #[must_use]
    pub fn matches(
        &self,
        parameters: &[Parameter],
        fetch_rows: usize,
        positioned: Option<Positioned<'_>>,
    ) -> bool {
        self.signature
            == CompileSignature::new(
                parameters,
                fetch_rows,
                positioned.and_then(|target| target.cursor_name),
            )
    }

    /// Re-synthesizes the text for a different layout, keeping the cached shape.
    pub fn recompile(
        &self,
        vendor: Vendor,
        command: &Command,
        parameters: &[Parameter],
        fetch_rows: usize,
        positioned: Option<Positioned<'_>>,
    ) -> Result<Self> {
        let mut compiled = Self::compile(vendor, command, parameters, fetch_rows, positioned)?;
        compiled.columns = self.columns.clone();
        Ok(compiled)
    }

    #[must_use]
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    #[must_use]
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    #[must_use]
    pub fn is_query(&self) -> bool {
        self.query
    }

    #[must_use]
    pub fn compiled_text(&self) -> &str {
        &self.compiled_text
    }

    #[must_use]
    pub fn columns(&self) -> Option<&[Arc<ColumnShape>]> {
        self.columns.as_deref()
    }

    pub fn set_columns(&mut self, columns: Vec<Arc<ColumnShape>>) {
        self.columns = Some(columns);
    }
}

fn compile_inline(
    vendor: Vendor,
    command: &Command,
    fetch_rows: usize,
    positioned: Option<Positioned<'_>>,
) -> Result<String> {
    let text = command.text();
    let clause = match positioned {
        Some(target) => Some(vendor.positioned_update_clause(target.cursor_name)?),
        None if command.is_query() && fetch_rows > 0 => vendor.row_limit_clause(fetch_rows),
        None => None,
    };

    Ok(match clause {
        Some(clause) => format!("{}{clause}", strip_terminator(text)),
        None => text.to_string(),
    })
}

fn ensure_inline_parameters(vendor: Vendor, parameters: &[Parameter]) -> Result<()> {
    if vendor.is_odbc() {
        if let Some(array) = parameters
            .iter()
            .find(|parameter| parameter.logical_type() == LogicalType::Array)
        {
            return Err(Error::unsupported_type(
                LogicalType::Array,
                vendor,
                format!(
                    "array parameter `{}` is only supported in procedure calls",
                    array.name()
                ),
            ));
        }
    }
    Ok(())
}

fn strip_terminator(text: &str) -> &str {
    text.trim_end().trim_end_matches(';').trim_end()
}
