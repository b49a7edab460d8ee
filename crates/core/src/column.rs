use std::sync::Arc;

use crate::{CellValue, Error, LogicalType, NativeType, Result, StorageType, Vendor};

/// Raw column description reported by a driver during describe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescription {
    pub name: String,
    pub native_type: NativeType,
    pub size: usize,
    pub scale: i16,
}

/// Mapped shape of one result column; cached alongside the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnShape {
    pub name: String,
    pub logical_type: LogicalType,
    pub storage_type: StorageType,
    pub dimension: usize,
    pub scale: i16,
}

impl ColumnShape {
    pub fn new(name: impl Into<String>, logical_type: LogicalType, dimension: usize, scale: i16) -> Self {
        Self {
            name: name.into(),
            logical_type,
            storage_type: logical_type.storage_type(),
            dimension,
            scale,
        }
    }

    /// Maps a driver description through the vendor's type table.
    pub fn from_description(vendor: Vendor, description: &ColumnDescription) -> Result<Self> {
        let logical_type = vendor.logical_type(description.native_type, description.size);
        if matches!(logical_type, LogicalType::Invalid | LogicalType::Array) {
            return Err(Error::unsupported_type(
                logical_type,
                vendor,
                format!(
                    "column `{}` has {} which cannot be fetched",
                    description.name, description.native_type
                ),
            ));
        }

        Ok(Self::new(
            vendor.normalize_column_name(&description.name),
            logical_type,
            description.size,
            description.scale,
        ))
    }

    /// Columns read out of band after each fetch instead of through a bound buffer.
    #[must_use]
    pub fn needs_out_of_band_read(&self) -> bool {
        self.logical_type.is_lob() || self.logical_type.is_temporal()
    }
}

/// One typed output cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    shape: Arc<ColumnShape>,
    value: CellValue,
}

impl Column {
    pub fn new(shape: Arc<ColumnShape>, value: CellValue) -> Self {
        Self { shape, value }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.shape.name
    }

    #[must_use]
    pub fn logical_type(&self) -> LogicalType {
        self.shape.logical_type
    }

    #[must_use]
    pub fn storage_type(&self) -> StorageType {
        self.shape.storage_type
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.shape.dimension
    }

    #[must_use]
    pub fn scale(&self) -> i16 {
        self.shape.scale
    }

    #[must_use]
    pub fn value(&self) -> &CellValue {
        &self.value
    }

    #[must_use]
    pub fn into_value(self) -> CellValue {
        self.value
    }
}

/// One fetched record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    columns: Vec<Column>,
}

impl Row {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Looks a column up by name, ignoring ASCII case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|column| column.name().eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn value(&self, name: &str) -> Option<&CellValue> {
        self.get(name).map(Column::value)
    }

    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(CellValue::as_str)
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Identifies the cursor a result set was fetched through while it is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CursorId(pub u64);

/// Rows in fetch order. Owned by the caller once returned.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultSet {
    columns: Vec<Arc<ColumnShape>>,
    rows: Vec<Row>,
    cursor: Option<CursorId>,
}

impl ResultSet {
    pub fn new(columns: Vec<Arc<ColumnShape>>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            cursor: None,
        }
    }

    /// Builds a row from the shared shape, copying the fetched cells.
    pub fn push_cells(&mut self, cells: Vec<CellValue>) -> Result<()> {
        if cells.len() != self.columns.len() {
            return Err(Error::invalid_state(format!(
                "fetched {} cells for {} described columns",
                cells.len(),
                self.columns.len()
            )));
        }

        let columns = self
            .columns
            .iter()
            .zip(cells)
            .map(|(shape, value)| Column::new(Arc::clone(shape), value))
            .collect();
        self.rows.push(Row::new(columns));
        Ok(())
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    #[must_use]
    pub fn columns(&self) -> Vec<&ColumnShape> {
        self.columns.iter().map(AsRef::as_ref).collect()
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut Vec<Row> {
        &mut self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    #[must_use]
    pub fn cursor(&self) -> Option<CursorId> {
        self.cursor
    }

    pub(crate) fn set_cursor(&mut self, cursor: CursorId) {
        self.cursor = Some(cursor);
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{ColumnDescription, ColumnShape, ResultSet};
    use crate::{CellValue, LogicalType, NativeType, StorageType, Vendor, typemap::odbc};

    #[test]
    fn odbc_column_names_are_upper_cased() {
        let description = ColumnDescription {
            name: "service_id".to_string(),
            native_type: NativeType(odbc::SQL_INTEGER),
            size: 10,
            scale: 0,
        };
        let shape = ColumnShape::from_description(Vendor::PostgreSql, &description)
            .expect("integer columns are fetchable");
        assert_eq!(shape.name, "SERVICE_ID");
        assert_eq!(shape.storage_type, StorageType::LongInt);
    }

    #[test]
    fn date_and_number_columns_use_char_storage() {
        let date = ColumnShape::new("CREATED", LogicalType::Date, 7, 0);
        let amount = ColumnShape::new("AMOUNT", LogicalType::Number, 22, 2);
        assert_eq!(date.storage_type, StorageType::Char);
        assert_eq!(amount.storage_type, StorageType::Char);
        assert!(date.needs_out_of_band_read());
        assert!(!amount.needs_out_of_band_read());
    }

    #[test]
    fn rows_share_column_names_and_reject_short_records() {
        let mut results = ResultSet::new(vec![
            Arc::new(ColumnShape::new("ID", LogicalType::LongInt, 8, 0)),
            Arc::new(ColumnShape::new("NAME", LogicalType::Char, 16, 0)),
        ]);
        results
            .push_cells(vec![CellValue::LongInt(1), CellValue::Text("a".to_string())])
            .expect("matching cell count");
        assert!(results.push_cells(vec![CellValue::Null]).is_err());

        let row = &results.rows()[0];
        assert_eq!(row.column_names(), vec!["ID", "NAME"]);
        assert_eq!(row.text("name"), Some("a"));
    }
}
