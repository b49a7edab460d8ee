use udal::{
    ConnectionState, DatabaseConfig, ErrorKind, Factory, LogicalType, NativeType, ParamDirection,
    StorageType, Vendor,
    typemap::{oci, odbc},
};

#[cfg(feature = "oracle")]
#[test]
fn oracle_database_starts_disconnected() {
    let factory = Factory::new(Vendor::Oracle);
    assert!(factory.is_available());

    let database = factory
        .create_database(DatabaseConfig::named("router"))
        .unwrap_or_else(|error| panic!("oracle backend must be available: {error}"));

    assert_eq!(database.vendor(), Vendor::Oracle);
    assert_eq!(database.state(), ConnectionState::Disconnected);
    assert!(!database.in_transaction());
}

#[cfg(not(feature = "odbc"))]
#[test]
fn odbc_vendors_need_the_odbc_feature() {
    let factory = Factory::new(Vendor::Db2);
    assert!(!factory.is_available());

    let error = match factory.create_database(DatabaseConfig::default()) {
        Ok(_) => panic!("db2 backend is not compiled in"),
        Err(error) => error,
    };
    assert_eq!(error.kind(), ErrorKind::NotImplemented);
}

#[test]
fn type_mapping_works_without_the_backend() {
    let factory = Factory::new(Vendor::PostgreSql);

    assert_eq!(
        factory.native_type(LogicalType::LongInt, 8).expect("bigint"),
        NativeType(odbc::SQL_BIGINT)
    );
    assert_eq!(
        factory.logical_type(NativeType(odbc::SQL_TYPE_TIMESTAMP), 26),
        LogicalType::Timestamp
    );
}

#[test]
fn parameters_are_checked_against_the_vendor() {
    let error = Factory::new(Vendor::SqlServer)
        .create_parameter("IDS", LogicalType::Array, ParamDirection::In, 3)
        .expect_err("no arrays on sql server");
    assert_eq!(error.kind(), ErrorKind::UnsupportedType);

    let parameter = Factory::new(Vendor::Oracle)
        .create_parameter("STATE", LogicalType::Char, ParamDirection::Out, 40)
        .expect("char output");
    assert_eq!(parameter.direction(), ParamDirection::Out);
    assert_eq!(parameter.dimension(), 40);
    assert!(parameter.is_null());

    let input = Factory::new(Vendor::Db2)
        .input("SESSION", "abc")
        .expect("char input");
    assert_eq!(input.logical_type(), LogicalType::Char);
}

#[test]
fn columns_degrade_to_char_storage() {
    let factory = Factory::new(Vendor::Oracle);

    let amount = factory
        .create_column("AMOUNT", NativeType(oci::SQLT_NUM), 22, 2)
        .expect("number column");
    assert_eq!(amount.logical_type, LogicalType::Number);
    assert_eq!(amount.storage_type, StorageType::Char);

    let id = factory
        .create_column("ID", NativeType(oci::SQLT_INT), 8, 0)
        .expect("integer column");
    assert_eq!(id.storage_type, StorageType::LongInt);

    let error = factory
        .create_column("OBJ", NativeType(oci::SQLT_NTY), 0, 0)
        .expect_err("collections are not fetchable");
    assert_eq!(error.kind(), ErrorKind::UnsupportedType);
}
