use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use chrono::NaiveDateTime;
use oracle::{
    Connection, ResultSet, Row, Statement,
    sql_type::{Blob, Clob, Collection, OracleType, RefCursor, ToSql},
};
use udal_core::{
    CallResult, CellValue, ColumnDescription, ColumnShape, Completion, Diagnostic, LogicalType,
    NativeStatement, ParamDirection, Parameter, PrepareOptions, ROWID_BIND_NAME, StorageType,
    Value, datetime, driver,
};

use crate::{
    convert::{Extraction, describe_column, diagnostic, extraction, io_diagnostic},
    lob,
};

const ROWID_COLUMN: &str = "ROWID";

#[derive(Debug, Clone)]
pub(crate) struct StatementSettings {
    lob_chunk_size: usize,
    date_format: String,
    array_type_name: Option<String>,
}

impl StatementSettings {
    pub(crate) fn from_options(options: &PrepareOptions<'_>) -> Self {
        Self {
            lob_chunk_size: options.lob_chunk_size,
            date_format: options.date_format.to_string(),
            array_type_name: options.array_type_name.map(str::to_string),
        }
    }
}

/// Temporary LOBs and collections bound as inputs. They must outlive the
/// execute, so the statement owns them until it is released.
#[derive(Default)]
struct Temporaries {
    clobs: Vec<Clob>,
    blobs: Vec<Blob>,
    collections: Vec<Collection>,
}

impl Temporaries {
    fn clear(&mut self) {
        self.clobs.clear();
        self.blobs.clear();
        self.collections.clear();
    }
}

/// Where the rows of the last execute come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowSource {
    None,
    Query,
    ProcedureCursor,
}

/// One prepared statement. Rows stream from the open result set one `fetch`
/// at a time; the client prefetches `fetch_array_size` rows per round trip.
pub struct OracleStatement {
    /// Taken when an inline query turns into its result set.
    statement: Option<Statement>,
    connection: Arc<Connection>,
    in_transaction: Arc<AtomicBool>,
    settings: StatementSettings,
    temporaries: Temporaries,
    cursor_position: Option<usize>,
    source: RowSource,
    columns: Vec<(String, OracleType)>,
    results: Option<ResultSet<'static, Row>>,
    current_rowid: Option<String>,
}

impl OracleStatement {
    pub(crate) fn new(
        statement: Statement,
        connection: Arc<Connection>,
        in_transaction: Arc<AtomicBool>,
        settings: StatementSettings,
    ) -> Self {
        Self {
            statement: Some(statement),
            connection,
            in_transaction,
            settings,
            temporaries: Temporaries::default(),
            cursor_position: None,
            source: RowSource::None,
            columns: Vec::new(),
            results: None,
            current_rowid: None,
        }
    }

    fn statement(&mut self) -> CallResult<&mut Statement> {
        self.statement
            .as_mut()
            .ok_or_else(|| Diagnostic::driver("statement was consumed by its result set"))
    }

    fn bind_scalar<T: ToSql>(
        &mut self,
        position: usize,
        direction: ParamDirection,
        value: &T,
        output_type: &OracleType,
    ) -> CallResult<()> {
        let statement = self.statement()?;
        let result = match direction {
            ParamDirection::In => statement.bind(position, value),
            ParamDirection::Out => statement.bind(position, output_type),
            ParamDirection::InOut => statement.bind(position, &(value, output_type)),
        };
        result.map_err(|error| diagnostic(&error))
    }

    fn bind_large_char(&mut self, position: usize, parameter: &Parameter, text: Option<&str>) -> CallResult<()> {
        let Some(text) = text.filter(|_| parameter.direction().is_input()) else {
            return self.bind_scalar(position, parameter.direction(), &None::<String>, &OracleType::CLOB);
        };

        let mut clob = Clob::new(&self.connection).map_err(|error| diagnostic(&error))?;
        lob::write_chunked(&mut clob, text.as_bytes(), self.settings.lob_chunk_size)
            .map_err(|error| io_diagnostic(&error))?;
        self.bind_scalar(position, parameter.direction(), &clob, &OracleType::CLOB)?;
        self.temporaries.clobs.push(clob);
        Ok(())
    }

    fn bind_binary(&mut self, position: usize, parameter: &Parameter, bytes: Option<&[u8]>) -> CallResult<()> {
        let Some(bytes) = bytes.filter(|_| parameter.direction().is_input()) else {
            return self.bind_scalar(position, parameter.direction(), &None::<Vec<u8>>, &OracleType::BLOB);
        };

        let mut blob = Blob::new(&self.connection).map_err(|error| diagnostic(&error))?;
        lob::write_chunked(&mut blob, bytes, self.settings.lob_chunk_size)
            .map_err(|error| io_diagnostic(&error))?;
        self.bind_scalar(position, parameter.direction(), &blob, &OracleType::BLOB)?;
        self.temporaries.blobs.push(blob);
        Ok(())
    }

    fn bind_array(&mut self, position: usize, parameter: &Parameter) -> CallResult<()> {
        let type_name = parameter
            .type_name()
            .or(self.settings.array_type_name.as_deref())
            .ok_or_else(|| {
                Diagnostic::driver(format!(
                    "array parameter `{}` needs a collection type name",
                    parameter.name()
                ))
            })?;

        let object_type = self
            .connection
            .object_type(type_name)
            .map_err(|error| diagnostic(&error))?;
        let mut collection = object_type
            .new_collection()
            .map_err(|error| diagnostic(&error))?;
        for element in parameter.elements() {
            collection
                .push(element)
                .map_err(|error| diagnostic(&error))?;
        }

        self.statement()?
            .bind(position, &collection)
            .map_err(|error| diagnostic(&error))?;
        self.temporaries.collections.push(collection);
        Ok(())
    }

    /// Runs the query with the values bound so far and keeps its open
    /// result set.
    fn open_query(&mut self) -> CallResult<()> {
        let statement = self
            .statement
            .take()
            .ok_or_else(|| Diagnostic::driver("query statement was already executed"))?;
        let results = statement
            .into_result_set(&[])
            .map_err(|error| diagnostic(&error))?;
        self.open_results(results);
        Ok(())
    }

    fn open_cursor(&mut self, position: usize) -> CallResult<()> {
        let cursor: RefCursor = self
            .statement()?
            .bind_value(position)
            .map_err(|error| diagnostic(&error))?;
        let results = cursor
            .into_result_set()
            .map_err(|error| diagnostic(&error))?;
        self.open_results(results);
        Ok(())
    }

    fn open_results(&mut self, results: ResultSet<'static, Row>) {
        self.columns = results
            .column_info()
            .iter()
            .map(|info| (info.name().to_string(), info.oracle_type().clone()))
            .collect();
        self.results = Some(results);
    }

    fn read_cell(&self, row: &Row, index: usize, shape: &ColumnShape) -> CallResult<CellValue> {
        let oracle_type = &self.columns[index].1;
        let cell = match extraction(oracle_type) {
            Extraction::Text => row
                .get::<usize, Option<String>>(index)
                .map_err(|error| diagnostic(&error))?
                .map(CellValue::Text),
            Extraction::Integer => row
                .get::<usize, Option<i64>>(index)
                .map_err(|error| diagnostic(&error))?
                .map(|value| integer_cell(value, shape))
                .transpose()?,
            Extraction::DateTime => row
                .get::<usize, Option<NaiveDateTime>>(index)
                .map_err(|error| diagnostic(&error))?
                .map(|value| datetime::render(&value, &self.settings.date_format).map(CellValue::Text))
                .transpose()?,
            Extraction::CharacterLob => match row
                .get::<usize, Option<Clob>>(index)
                .map_err(|error| diagnostic(&error))?
            {
                Some(mut clob) => Some(CellValue::Text(
                    lob::read_chunked(&mut clob, self.settings.lob_chunk_size)
                        .and_then(lob::into_text)
                        .map_err(|error| io_diagnostic(&error))?,
                )),
                None => None,
            },
            Extraction::BinaryLob => match row
                .get::<usize, Option<Blob>>(index)
                .map_err(|error| diagnostic(&error))?
            {
                Some(mut blob) => Some(CellValue::Bytes(
                    lob::read_chunked(&mut blob, self.settings.lob_chunk_size)
                        .map_err(|error| io_diagnostic(&error))?,
                )),
                None => None,
            },
            Extraction::Bytes => row
                .get::<usize, Option<Vec<u8>>>(index)
                .map_err(|error| diagnostic(&error))?
                .map(CellValue::Bytes),
        };
        Ok(cell.unwrap_or(CellValue::Null))
    }

    fn rowid_index(&self) -> Option<usize> {
        self.columns.iter().position(|(name, oracle_type)| {
            matches!(oracle_type, OracleType::Rowid) || name.eq_ignore_ascii_case(ROWID_COLUMN)
        })
    }
}

fn integer_cell(value: i64, shape: &ColumnShape) -> CallResult<CellValue> {
    match shape.storage_type {
        StorageType::ShortInt => i16::try_from(value).map(CellValue::ShortInt).map_err(|_| {
            Diagnostic::driver(format!("value {value} of column `{}` overflows a short integer", shape.name))
        }),
        _ => Ok(CellValue::LongInt(value)),
    }
}

/// ODPI-C result sets only move forward. Re-running the query would read the
/// table again rather than reposition the held cursor.
fn rewind_refusal(source: RowSource) -> Diagnostic {
    match source {
        RowSource::Query => driver::not_implemented("query cursors only move forward"),
        RowSource::ProcedureCursor => {
            driver::not_implemented("cursors returned by procedures cannot be rewound")
        }
        RowSource::None => Diagnostic::driver("statement has produced no rows to rewind"),
    }
}

fn output_type(parameter: &Parameter) -> OracleType {
    let dimension = u32::try_from(parameter.dimension()).unwrap_or(u32::MAX);
    match parameter.logical_type() {
        LogicalType::ShortInt | LogicalType::LongInt => OracleType::Int64,
        LogicalType::Date | LogicalType::Timestamp => OracleType::Timestamp(0),
        _ => OracleType::Varchar2(dimension),
    }
}

impl NativeStatement for OracleStatement {
    fn bind_cursor_output(&mut self, position: usize) -> CallResult<()> {
        self.statement()?
            .bind(position, &OracleType::RefCursor)
            .map_err(|error| diagnostic(&error))?;
        self.cursor_position = Some(position);
        Ok(())
    }

    fn bind(&mut self, position: usize, parameter: &Parameter) -> CallResult<()> {
        let direction = parameter.direction();
        let output = output_type(parameter);
        match parameter.bind_value() {
            Value::Char(text) | Value::Number(text) => {
                self.bind_scalar(position, direction, &text, &output)
            }
            Value::ShortInt(value) => {
                self.bind_scalar(position, direction, &value.map(i64::from), &output)
            }
            Value::LongInt(value) => self.bind_scalar(position, direction, &value, &output),
            Value::Date(text) | Value::Timestamp(text) => {
                let value = text
                    .as_deref()
                    .map(|text| datetime::parse(text, &self.settings.date_format))
                    .transpose()?;
                self.bind_scalar(position, direction, &value, &output)
            }
            Value::LargeChar(text) => self.bind_large_char(position, parameter, text.as_deref()),
            Value::Binary(bytes) => self.bind_binary(position, parameter, bytes.as_deref()),
            Value::Array(_) => self.bind_array(position, parameter),
            Value::Cursor => Err(Diagnostic::driver(format!(
                "cursor parameter `{}` cannot be bound by value",
                parameter.name()
            ))),
        }
    }

    fn bind_row_locator(&mut self, locator: &str) -> CallResult<()> {
        self.statement()?
            .bind(ROWID_BIND_NAME, &locator.to_string())
            .map_err(|error| diagnostic(&error))
    }

    fn execute(&mut self) -> CallResult<Completion> {
        self.results = None;
        self.current_rowid = None;

        if self.statement()?.is_query() {
            self.open_query()?;
            self.source = RowSource::Query;
            return Ok(Completion::Success);
        }

        self.statement()?
            .execute(&[])
            .map_err(|error| diagnostic(&error))?;
        if let Some(position) = self.cursor_position {
            self.open_cursor(position)?;
            self.source = RowSource::ProcedureCursor;
        } else {
            self.source = RowSource::None;
        }

        if !self.in_transaction.load(Ordering::SeqCst) {
            self.connection.commit().map_err(|error| diagnostic(&error))?;
        }
        Ok(Completion::Success)
    }

    fn describe(&mut self) -> CallResult<Vec<ColumnDescription>> {
        Ok(self
            .columns
            .iter()
            .map(|(name, oracle_type)| describe_column(name, oracle_type))
            .collect())
    }

    fn fetch(&mut self, columns: &[Arc<ColumnShape>]) -> CallResult<Option<Vec<CellValue>>> {
        let Some(results) = self.results.as_mut() else {
            return Ok(None);
        };
        let Some(row) = results.next() else {
            self.current_rowid = None;
            return Ok(None);
        };
        let row = row.map_err(|error| diagnostic(&error))?;

        let cells = columns
            .iter()
            .enumerate()
            .take(self.columns.len())
            .map(|(index, shape)| self.read_cell(&row, index, shape))
            .collect::<CallResult<Vec<_>>>()?;

        self.current_rowid = self
            .rowid_index()
            .and_then(|index| cells.get(index))
            .and_then(|cell| cell.as_str().map(str::to_string));
        Ok(Some(cells))
    }

    fn affected_rows(&mut self) -> CallResult<u64> {
        self.statement()?.row_count().map_err(|error| diagnostic(&error))
    }

    fn read_output(&mut self, position: usize, parameter: &Parameter) -> CallResult<CellValue> {
        let chunk_size = self.settings.lob_chunk_size;
        let statement = self.statement()?;
        let cell = match parameter.logical_type() {
            LogicalType::ShortInt | LogicalType::LongInt => statement
                .bind_value::<usize, Option<i64>>(position)
                .map_err(|error| diagnostic(&error))?
                .map(|value| match parameter.logical_type() {
                    LogicalType::ShortInt => i16::try_from(value)
                        .map(CellValue::ShortInt)
                        .unwrap_or(CellValue::LongInt(value)),
                    _ => CellValue::LongInt(value),
                }),
            LogicalType::LargeChar => match statement
                .bind_value::<usize, Option<Clob>>(position)
                .map_err(|error| diagnostic(&error))?
            {
                Some(mut clob) => Some(CellValue::Text(
                    lob::read_chunked(&mut clob, chunk_size)
                        .and_then(lob::into_text)
                        .map_err(|error| io_diagnostic(&error))?,
                )),
                None => None,
            },
            LogicalType::Binary => match statement
                .bind_value::<usize, Option<Blob>>(position)
                .map_err(|error| diagnostic(&error))?
            {
                Some(mut blob) => Some(CellValue::Bytes(
                    lob::read_chunked(&mut blob, chunk_size)
                        .map_err(|error| io_diagnostic(&error))?,
                )),
                None => None,
            },
            _ => statement
                .bind_value::<usize, Option<String>>(position)
                .map_err(|error| diagnostic(&error))?
                .map(CellValue::Text),
        };
        Ok(cell.unwrap_or(CellValue::Null))
    }

    fn cursor_name(&mut self) -> CallResult<Option<String>> {
        Ok(None)
    }

    fn row_locator(&self) -> Option<String> {
        self.current_rowid.clone()
    }

    fn rewind(&mut self) -> CallResult<()> {
        Err(rewind_refusal(self.source))
    }

    fn release(mut self) -> CallResult<()> {
        // Closing hands the handle back to the session cache unless it was
        // excluded when prepared. A consumed query closes with its result set.
        self.results = None;
        self.temporaries.clear();
        match self.statement.take() {
            Some(mut statement) => statement.close().map_err(|error| diagnostic(&error)),
            None => Ok(()),
        }
    }
}
