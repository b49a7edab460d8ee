use std::{num::NonZeroUsize, sync::Arc};

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use odbc_api::{
    Connection, Cursor, CursorImpl, CursorRow, FailedStateTransition, IntoParameter, Nullable,
    ResultSetMetadata, StatementConnection,
    handles::{AsStatementRef, Statement as _},
    parameter::{InputParameter, VarBinaryBox},
    sys::{self, Timestamp},
};
use udal_core::{
    CallResult, CellValue, ColumnDescription, ColumnShape, Completion, Diagnostic,
    NativeStatement, NativeType, Parameter, PrepareOptions, Vendor, datetime, driver,
};

use crate::{
    diag,
    plan::{self, BindValue, ReadAs},
};

const CURSOR_NAME_LENGTH: usize = 128;

type SharedConnection = Arc<Connection<'static>>;
type OpenCursor = CursorImpl<StatementConnection<SharedConnection>>;

#[derive(Debug, Clone)]
pub(crate) struct StatementSettings {
    returns_rows: bool,
    lob_chunk_size: usize,
    date_format: String,
}

impl StatementSettings {
    pub(crate) fn from_options(options: &PrepareOptions<'_>) -> Self {
        Self {
            returns_rows: options.returns_rows,
            lob_chunk_size: options.lob_chunk_size.max(1),
            date_format: options.date_format.to_string(),
        }
    }
}

/// One statement on a shared connection. Parameters are collected by bind
/// and handed to the driver on execute; a query leaves its cursor open until
/// the statement is released.
pub struct OdbcStatement {
    connection: SharedConnection,
    sql: String,
    vendor: Vendor,
    settings: StatementSettings,
    parameters: Vec<Box<dyn InputParameter>>,
    cursor: Option<OpenCursor>,
    affected: u64,
}

impl OdbcStatement {
    pub(crate) fn new(
        connection: SharedConnection,
        sql: &str,
        vendor: Vendor,
        settings: StatementSettings,
    ) -> Self {
        Self {
            connection,
            sql: sql.to_string(),
            vendor,
            settings,
            parameters: Vec::new(),
            cursor: None,
            affected: 0,
        }
    }

    fn open_cursor(&mut self) -> CallResult<Completion> {
        self.cursor = Arc::clone(&self.connection)
            .into_cursor(&self.sql, self.parameters.as_slice(), None)
            .map_err(transition_failed)?;
        Ok(if self.cursor.is_some() {
            Completion::Success
        } else {
            Completion::NoData
        })
    }

    fn run(&mut self) -> CallResult<Completion> {
        let mut statement = Arc::clone(&self.connection)
            .into_preallocated()
            .map_err(transition_failed)?;
        drop(
            statement
                .execute(&self.sql, self.parameters.as_slice())
                .map_err(|error| diag::from_error(&error))?,
        );
        self.affected = statement
            .row_count()
            .map_err(|error| diag::from_error(&error))?
            .map_or(0, |count| u64::try_from(count).unwrap_or(u64::MAX));
        Ok(Completion::Success)
    }
}

fn transition_failed<T>(failure: FailedStateTransition<T>) -> Diagnostic {
    diag::from_error(&failure.error)
}

fn input(value: BindValue) -> Box<dyn InputParameter> {
    match value {
        BindValue::Text(text) => Box::new(text.into_parameter()),
        BindValue::Bytes(bytes) => {
            Box::new(bytes.map_or_else(VarBinaryBox::null, VarBinaryBox::from_vec))
        }
        BindValue::Short(value) => Box::new(value.map_or_else(Nullable::null, Nullable::new)),
        BindValue::BigInt(value) => Box::new(value.map_or_else(Nullable::null, Nullable::new)),
        BindValue::Timestamp(value) => Box::new(
            value
                .as_ref()
                .map(timestamp)
                .map_or_else(Nullable::null, Nullable::new),
        ),
    }
}

fn timestamp(value: &NaiveDateTime) -> Timestamp {
    Timestamp {
        year: i16::try_from(value.year()).unwrap_or(i16::MAX),
        month: u16::try_from(value.month()).unwrap_or_default(),
        day: u16::try_from(value.day()).unwrap_or_default(),
        hour: u16::try_from(value.hour()).unwrap_or_default(),
        minute: u16::try_from(value.minute()).unwrap_or_default(),
        second: u16::try_from(value.second()).unwrap_or_default(),
        fraction: value.nanosecond(),
    }
}

fn to_datetime(value: &Timestamp) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(
        i32::from(value.year),
        u32::from(value.month),
        u32::from(value.day),
    )?
    .and_hms_nano_opt(
        u32::from(value.hour),
        u32::from(value.minute),
        u32::from(value.second),
        value.fraction,
    )
}

fn column_number(index: usize) -> CallResult<u16> {
    u16::try_from(index + 1)
        .map_err(|_| Diagnostic::driver(format!("column {} is out of range", index + 1)))
}

fn read_cell(
    row: &mut CursorRow<'_>,
    number: u16,
    shape: &ColumnShape,
    settings: &StatementSettings,
) -> CallResult<CellValue> {
    let failed = |error: odbc_api::Error| diag::from_error(&error);
    let cell = match plan::read_as(shape.logical_type) {
        ReadAs::Short => {
            let mut value = Nullable::<i16>::null();
            row.get_data(number, &mut value).map_err(failed)?;
            value.into_opt().map(CellValue::ShortInt)
        }
        ReadAs::BigInt => {
            let mut value = Nullable::<i64>::null();
            row.get_data(number, &mut value).map_err(failed)?;
            value.into_opt().map(CellValue::LongInt)
        }
        ReadAs::Timestamp => {
            let mut value = Nullable::<Timestamp>::null();
            row.get_data(number, &mut value).map_err(failed)?;
            value
                .into_opt()
                .as_ref()
                .and_then(to_datetime)
                .map(|value| datetime::render(&value, &settings.date_format))
                .transpose()?
                .map(CellValue::Text)
        }
        ReadAs::Binary => {
            let mut buffer = Vec::with_capacity(settings.lob_chunk_size);
            row.get_binary(number, &mut buffer)
                .map_err(failed)?
                .then(|| CellValue::Bytes(buffer))
        }
        ReadAs::Text => {
            let mut buffer = Vec::with_capacity(settings.lob_chunk_size);
            row.get_text(number, &mut buffer)
                .map_err(failed)?
                .then(|| CellValue::Text(String::from_utf8_lossy(&buffer).into_owned()))
        }
    };
    Ok(cell.unwrap_or(CellValue::Null))
}

impl NativeStatement for OdbcStatement {
    fn bind_cursor_output(&mut self, _position: usize) -> CallResult<()> {
        Err(driver::not_implemented(format!(
            "{} procedures return result sets directly",
            self.vendor.name()
        )))
    }

    fn bind(&mut self, position: usize, parameter: &Parameter) -> CallResult<()> {
        if position != self.parameters.len() + 1 {
            return Err(Diagnostic::driver(format!(
                "parameter `{}` bound at position {position}, expected {}",
                parameter.name(),
                self.parameters.len() + 1
            )));
        }
        let values = plan::plan_parameter(self.vendor, parameter, &self.settings.date_format)?;
        self.parameters.extend(values.into_iter().map(input));
        Ok(())
    }

    fn bind_row_locator(&mut self, _locator: &str) -> CallResult<()> {
        Err(driver::not_implemented(
            "positioned updates go through the cursor name on ODBC",
        ))
    }

    fn execute(&mut self) -> CallResult<Completion> {
        self.cursor = None;
        self.affected = 0;
        if self.settings.returns_rows {
            self.open_cursor()
        } else {
            self.run()
        }
    }

    fn describe(&mut self) -> CallResult<Vec<ColumnDescription>> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(Vec::new());
        };
        let failed = |error: odbc_api::Error| diag::from_error(&error);
        let count = cursor.num_result_cols().map_err(failed)?;

        (0..usize::try_from(count).unwrap_or_default())
            .map(|index| {
                let number = column_number(index)?;
                let name = cursor.col_name(number).map_err(failed)?;
                let data_type = cursor.col_data_type(number).map_err(failed)?;
                Ok(ColumnDescription {
                    name,
                    native_type: NativeType(i32::from(data_type.data_type().0)),
                    size: data_type.column_size().map_or(0, NonZeroUsize::get),
                    scale: data_type.decimal_digits(),
                })
            })
            .collect()
    }

    fn fetch(&mut self, columns: &[Arc<ColumnShape>]) -> CallResult<Option<Vec<CellValue>>> {
        let settings = &self.settings;
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };
        let Some(mut row) = cursor
            .next_row()
            .map_err(|error| diag::from_error(&error))?
        else {
            return Ok(None);
        };

        columns
            .iter()
            .enumerate()
            .map(|(index, shape)| read_cell(&mut row, column_number(index)?, shape, settings))
            .collect::<CallResult<Vec<_>>>()
            .map(Some)
    }

    fn affected_rows(&mut self) -> CallResult<u64> {
        Ok(self.affected)
    }

    fn read_output(&mut self, position: usize, parameter: &Parameter) -> CallResult<CellValue> {
        Err(driver::not_implemented(format!(
            "output parameter `{}` at position {position} is not read back on {}",
            parameter.name(),
            self.vendor.name()
        )))
    }

    fn cursor_name(&mut self) -> CallResult<Option<String>> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };
        let statement = cursor.as_stmt_ref();
        let mut name = [0_u8; CURSOR_NAME_LENGTH];
        let mut name_length: i16 = 0;
        // SAFETY: the handle belongs to the open cursor borrowed above and the
        // buffer outlives the call.
        let status = unsafe {
            sys::SQLGetCursorName(
                statement.as_sys(),
                name.as_mut_ptr(),
                i16::try_from(CURSOR_NAME_LENGTH).unwrap_or(i16::MAX),
                &mut name_length,
            )
        };
        if status != sys::SqlReturn::SUCCESS && status != sys::SqlReturn::SUCCESS_WITH_INFO {
            return Err(Diagnostic::driver("the driver did not report a cursor name"));
        }
        Ok(Some(diag::text(&name)))
    }

    fn row_locator(&self) -> Option<String> {
        None
    }

    fn rewind(&mut self) -> CallResult<()> {
        Err(driver::not_implemented(format!(
            "{} cursors are forward-only",
            self.vendor.name()
        )))
    }

    fn release(self) -> CallResult<()> {
        drop(self);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{column_number, timestamp, to_datetime};

    #[test]
    fn timestamps_convert_both_ways() {
        let value = NaiveDate::from_ymd_opt(2023, 12, 31)
            .and_then(|date| date.and_hms_nano_opt(23, 59, 58, 120_000_000))
            .expect("valid");
        assert_eq!(to_datetime(&timestamp(&value)), Some(value));
    }

    #[test]
    fn columns_are_numbered_from_one() {
        assert_eq!(column_number(0).expect("first"), 1);
        assert!(column_number(usize::from(u16::MAX)).is_err());
    }
}
