use tracing::debug;
use udal_core::{
    ColumnDescription, ColumnShape, Database, DatabaseConfig, Error, LogicalType, NativeType,
    ParamDirection, Parameter, Result, Value, Vendor,
};

use crate::Backend;

/// Builds databases, parameters and column shapes for one vendor.
///
/// Type mapping works for every vendor; creating a [`Database`] needs the
/// vendor's backend feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Factory {
    vendor: Vendor,
}

impl Factory {
    #[must_use]
    pub fn new(vendor: Vendor) -> Self {
        Self { vendor }
    }

    #[must_use]
    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    /// Whether this build can open connections to the vendor.
    #[must_use]
    pub fn is_available(&self) -> bool {
        match self.vendor {
            Vendor::Oracle => cfg!(feature = "oracle"),
            _ => cfg!(feature = "odbc"),
        }
    }

    /// A disconnected database for the vendor.
    pub fn create_database(&self, config: DatabaseConfig) -> Result<Database<Backend>> {
        debug!(vendor = self.vendor.name(), db = %config.name, "creating database");
        Ok(Database::new(self.backend()?, config))
    }

    /// A parameter of the given type with a null value, checked against the
    /// vendor's type map.
    pub fn create_parameter(
        &self,
        name: impl Into<String>,
        logical_type: LogicalType,
        direction: ParamDirection,
        dimension: usize,
    ) -> Result<Parameter> {
        self.native_type(logical_type, dimension)?;
        Ok(Parameter::output(name, logical_type, dimension).with_direction(direction))
    }

    /// An input parameter holding `value`, checked against the vendor's
    /// type map.
    pub fn input(&self, name: impl Into<String>, value: impl Into<Value>) -> Result<Parameter> {
        let parameter = Parameter::input(name, value);
        self.native_type(parameter.logical_type(), parameter.dimension())?;
        Ok(parameter)
    }

    /// Maps a described native column onto its shape.
    pub fn create_column(
        &self,
        name: impl Into<String>,
        native_type: NativeType,
        size: usize,
        scale: i16,
    ) -> Result<ColumnShape> {
        ColumnShape::from_description(
            self.vendor,
            &ColumnDescription {
                name: name.into(),
                native_type,
                size,
                scale,
            },
        )
    }

    pub fn native_type(&self, logical_type: LogicalType, dimension: usize) -> Result<NativeType> {
        self.vendor.native_type(logical_type, dimension)
    }

    #[must_use]
    pub fn logical_type(&self, native_type: NativeType, dimension: usize) -> LogicalType {
        self.vendor.logical_type(native_type, dimension)
    }

    fn backend(&self) -> Result<Backend> {
        match self.vendor {
            #[cfg(feature = "oracle")]
            Vendor::Oracle => Ok(Backend::Oracle(udal_driver_oracle::OracleDriver::new())),
            #[cfg(feature = "odbc")]
            vendor @ (Vendor::Db2 | Vendor::SqlServer | Vendor::PostgreSql | Vendor::Informix) => {
                udal_driver_odbc::OdbcDriver::new(vendor)
                    .map(Backend::Odbc)
                    .map_err(|diagnostic| Error::invalid_state(diagnostic.message))
            }
            #[allow(unreachable_patterns)]
            vendor => Err(Error::not_implemented(format!(
                "the {} backend is not compiled into this build",
                vendor.name()
            ))),
        }
    }
}
