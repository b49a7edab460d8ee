use udal_core::{
    CellValue, CommandKind, ConnectionDescriptor, Database, DatabaseConfig, Diagnostic, ErrorKind,
    LogicalType, Parameter, TransactionOutcome, Value, Vendor, typemap::odbc,
};

#[path = "support/fake_driver.rs"]
mod fake_driver;

use fake_driver::{FakeDriver, Script};

const GET_SERVICE_STATE: &str = "CALL GetServiceState()";

fn connected(vendor: Vendor) -> (Database<FakeDriver>, FakeDriver) {
    let driver = FakeDriver::new(vendor);
    let handle = driver.clone();
    let mut database = Database::new(driver, DatabaseConfig::named("router").without_delays());
    database
        .connect(ConnectionDescriptor::new("FINDB", "router", "secret"))
        .expect("connect");
    (database, handle)
}

fn service_rows() -> Script {
    Script::rows(
        &[
            ("service_id", odbc::SQL_INTEGER, 4),
            ("state", odbc::SQL_VARCHAR, 16),
        ],
        vec![
            vec![CellValue::LongInt(1), CellValue::Text("RUNNING".into())],
            vec![CellValue::LongInt(2), CellValue::Text("STOPPED".into())],
            vec![CellValue::LongInt(3), CellValue::Null],
        ],
    )
}

#[test]
fn cached_query_reuses_column_shape() {
    let (mut database, driver) = connected(Vendor::Db2);
    driver.script(GET_SERVICE_STATE, service_rows());

    let first = database
        .execute_query_cached(CommandKind::StoredProcedure, "GetServiceState", &mut [], false, 0)
        .expect("first query");
    assert_eq!(first.len(), 3);
    for row in &first {
        assert_eq!(row.column_names(), vec!["SERVICE_ID", "STATE"]);
    }
    assert_eq!(first.rows()[0].text("state"), Some("RUNNING"));
    assert!(first.rows()[2].value("STATE").is_some_and(CellValue::is_null));
    assert_eq!(driver.describes(), 1);

    let second = database
        .execute_query_cached(CommandKind::StoredProcedure, "GetServiceState", &mut [], false, 0)
        .expect("second query");
    assert_eq!(second.len(), 3);
    assert_eq!(driver.describes(), 1);

    let stats = database.stats();
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.describes, 1);
    assert_eq!(stats.rows_fetched, 6);
    assert_eq!(database.cached_statements(), 1);
    assert_eq!(driver.open_statements(), 0);
    assert_eq!(driver.native_cache_prepares(), 2);
}

#[test]
fn uncached_query_describes_every_time() {
    let (mut database, driver) = connected(Vendor::Db2);
    driver.script(GET_SERVICE_STATE, service_rows());

    for _ in 0..2 {
        database
            .execute_query(CommandKind::StoredProcedure, "GetServiceState", &mut [], false, 0)
            .expect("query");
    }

    assert_eq!(driver.describes(), 2);
    assert_eq!(database.cached_statements(), 0);
    assert_eq!(driver.native_cache_prepares(), 0);
}

#[test]
fn fetch_cap_limits_rows_and_adds_row_limit_clause() {
    let (mut database, driver) = connected(Vendor::PostgreSql);
    driver.script("SELECT id FROM queue LIMIT 2", service_rows());

    let rows = database
        .execute_query(CommandKind::Inline, "SELECT id FROM queue", &mut [], false, 2)
        .expect("capped query");

    assert_eq!(rows.len(), 2);
    assert_eq!(driver.prepared_sql(), vec!["SELECT id FROM queue LIMIT 2"]);
}

#[test]
fn oracle_query_procedure_binds_cursor_first() {
    let (mut database, driver) = connected(Vendor::Oracle);
    let mut parameters = [Parameter::input("serviceId", 7_i64)];

    database
        .execute_query(CommandKind::StoredProcedure, "GetServiceState", &mut parameters, false, 0)
        .expect("query");

    let sql = "BEGIN GetServiceState(:1, :2); END;";
    assert_eq!(driver.cursor_binds(), vec![(sql.to_string(), 1)]);
    assert_eq!(
        driver.bound(),
        vec![(sql.to_string(), 2, Value::LongInt(Some(7)))]
    );
}

#[test]
fn update_service_state_commits_and_records_affected_rows() {
    let (mut database, driver) = connected(Vendor::SqlServer);
    driver.script("{call UPDATESERVICESTATE(?, ?, ?)}", Script::affected(1));
    let mut parameters = [
        Parameter::input("serviceId", 7_i64),
        Parameter::input("newState", 2_i64),
        Parameter::input("sessionId", "abc"),
    ];

    database.begin_transaction(false).expect("begin");
    let affected = database
        .execute_non_query_cached(
            CommandKind::StoredProcedure,
            "UPDATESERVICESTATE",
            &mut parameters,
            false,
        )
        .expect("update");
    database
        .end_transaction(TransactionOutcome::Commit, true)
        .expect("commit");

    assert_eq!(affected, 1);
    assert_eq!(database.last_affected_rows(), 1);
    assert_eq!(driver.commits(), 1);
    assert_eq!(driver.bound().len(), 3);
    assert!(!database.in_transaction());
}

#[test]
fn failed_update_surfaces_vendor_code_and_allows_rollback() {
    let (mut database, driver) = connected(Vendor::Db2);
    driver.fail_execute(
        "UPDATESERVICESTATE",
        Diagnostic::new(-438, "application raised error").with_sql_state("70001"),
    );
    let mut parameters = [Parameter::input("serviceId", 7_i64)];

    database.begin_transaction(false).expect("begin");
    let error = database
        .execute_non_query(
            CommandKind::StoredProcedure,
            "UPDATESERVICESTATE",
            &mut parameters,
            false,
        )
        .expect_err("execute fails");
    database
        .end_transaction(TransactionOutcome::Rollback, true)
        .expect("rollback");

    assert_eq!(error.kind(), ErrorKind::Db);
    assert_eq!(error.vendor_code(), Some("SQL0438N"));
    let failure = error.failure().expect("failure context");
    assert_eq!(failure.operation, "execute");
    assert_eq!(failure.statement.as_deref(), Some("CALL UPDATESERVICESTATE(?)"));
    assert_eq!(database.last_error_code(), Some("SQL0438N"));
    assert_eq!(driver.rollbacks(), 1);
    assert_eq!(driver.open_statements(), 0);
    assert!(!database.in_transaction());
}

#[test]
fn success_clears_last_error_code() {
    let (mut database, driver) = connected(Vendor::Db2);
    driver.fail_execute("DELETE", Diagnostic::new(-204, "undefined name"));

    database
        .execute_non_query(CommandKind::Inline, "DELETE FROM missing", &mut [], false)
        .expect_err("missing table");
    assert_eq!(database.last_error_code(), Some("SQL0204N"));

    database
        .execute_non_query(CommandKind::Inline, "UPDATE queue SET state = 1", &mut [], false)
        .expect("update");
    assert_eq!(database.last_error_code(), None);
}

#[test]
fn only_queries_are_prepared_for_rows() {
    let (mut database, driver) = connected(Vendor::Db2);
    driver.script("SELECT id FROM queue", service_rows());

    database
        .execute_query(CommandKind::Inline, "SELECT id FROM queue", &mut [], false, 0)
        .expect("query");
    database
        .execute_non_query(CommandKind::Inline, "UPDATE queue SET state = 1", &mut [], false)
        .expect("update");

    assert_eq!(driver.row_prepares(), vec!["SELECT id FROM queue".to_string()]);
}

#[test]
fn output_parameters_are_written_back() {
    let (mut database, driver) = connected(Vendor::SqlServer);
    driver.script(
        "{call NEXTTICKET(?, ?)}",
        Script::affected(0)
            .with_output(2, CellValue::Text("T-0042".into())),
    );
    let mut parameters = [
        Parameter::input("queue", "billing"),
        Parameter::output("ticket", LogicalType::Char, 16),
    ];

    database
        .execute_non_query(CommandKind::StoredProcedure, "NEXTTICKET", &mut parameters, false)
        .expect("call");

    assert_eq!(parameters[1].value(), &Value::Char(Some("T-0042".to_string())));
}

#[test]
fn date_output_parameters_are_not_implemented() {
    let (mut database, driver) = connected(Vendor::Oracle);
    let mut parameters = [Parameter::output("changedAt", LogicalType::Date, 19)];

    let error = database
        .execute_non_query(CommandKind::StoredProcedure, "LASTCHANGE", &mut parameters, false)
        .expect_err("date output");

    assert_eq!(error.kind(), ErrorKind::NotImplemented);
    assert!(driver.prepared_sql().is_empty());
}

#[test]
fn arrays_fail_fast_on_vendors_without_array_binding() {
    let (mut database, driver) = connected(Vendor::PostgreSql);
    let mut parameters = [Parameter::array("ids", vec!["1".into(), "2".into()])];

    let error = database
        .execute_non_query(CommandKind::StoredProcedure, "LOADIDS", &mut parameters, false)
        .expect_err("arrays unsupported");

    assert_eq!(error.kind(), ErrorKind::UnsupportedType);
    assert!(driver.prepared_sql().is_empty());
}

#[test]
fn db2_arrays_bind_one_placeholder_per_element() {
    let (mut database, driver) = connected(Vendor::Db2);
    let mut parameters = [
        Parameter::array("ids", vec!["a".into(), "b".into()]),
        Parameter::input("batch", 9_i64),
    ];

    database
        .execute_non_query(CommandKind::StoredProcedure, "LOADIDS", &mut parameters, false)
        .expect("array call");

    let positions: Vec<usize> = driver.bound().iter().map(|(_, position, _)| *position).collect();
    assert_eq!(positions, vec![1, 3]);
    assert_eq!(driver.prepared_sql(), vec!["CALL LOADIDS(ARRAY[?, ?], ?)"]);
}

#[test]
fn character_input_is_truncated_to_dimension() {
    let (mut database, driver) = connected(Vendor::Informix);
    let mut parameters = [Parameter::input("code", "ABCDEFGH").with_dimension(3)];

    database
        .execute_non_query(CommandKind::Inline, "DELETE FROM codes WHERE code = ?", &mut parameters, false)
        .expect("delete");

    assert_eq!(driver.bound()[0].2, Value::Char(Some("ABC".to_string())));
}

#[test]
fn read_only_transaction_rejects_non_queries() {
    let (mut database, driver) = connected(Vendor::PostgreSql);

    database.begin_transaction(true).expect("read-only begin");
    let error = database
        .execute_non_query(CommandKind::Inline, "DELETE FROM queue", &mut [], false)
        .expect_err("writes rejected");

    assert_eq!(error.kind(), ErrorKind::InvalidState);
    assert!(driver.prepared_sql().is_empty());
    database
        .execute_query(CommandKind::Inline, "SELECT 1", &mut [], false, 0)
        .expect("reads allowed");
}

#[test]
fn second_begin_is_rejected() {
    let (mut database, _driver) = connected(Vendor::Db2);

    database.begin_transaction(false).expect("begin");
    let error = database.begin_transaction(false).expect_err("nested begin");

    assert_eq!(error.kind(), ErrorKind::InvalidState);
}

#[test]
fn ending_without_transaction_honours_throw_flag() {
    let (mut database, _driver) = connected(Vendor::Db2);

    assert!(
        database
            .end_transaction(TransactionOutcome::Commit, false)
            .is_ok()
    );
    let error = database
        .end_transaction(TransactionOutcome::Commit, true)
        .expect_err("nothing to commit");
    assert_eq!(error.kind(), ErrorKind::InvalidState);
}

#[test]
fn warnings_are_logged_unless_configured_as_errors() {
    let warning = Diagnostic::new(0, "string data, right truncated").with_sql_state("01004");

    let (mut database, driver) = connected(Vendor::SqlServer);
    driver.script("UPDATE t SET a = 1", Script::affected(1).with_warning(warning.clone()));
    assert_eq!(
        database
            .execute_non_query(CommandKind::Inline, "UPDATE t SET a = 1", &mut [], false)
            .expect("warning is not fatal"),
        1
    );

    let driver = FakeDriver::new(Vendor::SqlServer);
    driver.script("UPDATE t SET a = 1", Script::affected(1).with_warning(warning));
    let config = DatabaseConfig {
        warnings_as_errors: true,
        ..DatabaseConfig::named("strict").without_delays()
    };
    let mut strict = Database::new(driver, config);
    strict
        .connect(ConnectionDescriptor::new("MSSQL", "router", "secret"))
        .expect("connect");
    let error = strict
        .execute_non_query(CommandKind::Inline, "UPDATE t SET a = 1", &mut [], false)
        .expect_err("warning escalated");
    assert_eq!(error.kind(), ErrorKind::Warning);
    assert_eq!(error.vendor_code(), Some("01004:0"));
}

#[test]
fn recompiling_a_cached_statement_keeps_its_shape() {
    let (mut database, driver) = connected(Vendor::Db2);
    driver.script("CALL FINDSERVICES(?)", service_rows());
    driver.script("CALL FINDSERVICES(?, ?)", service_rows());

    let mut one = [Parameter::input("zone", "eu")];
    database
        .execute_query_cached(CommandKind::StoredProcedure, "FINDSERVICES", &mut one, false, 0)
        .expect("one parameter");
    let mut two = [Parameter::input("zone", "eu"), Parameter::input("limit", 5_i64)];
    database
        .execute_query_cached(CommandKind::StoredProcedure, "FINDSERVICES", &mut two, false, 0)
        .expect("two parameters");

    assert_eq!(driver.describes(), 1);
    assert_eq!(
        driver.prepared_sql(),
        vec!["CALL FINDSERVICES(?)", "CALL FINDSERVICES(?, ?)"]
    );

    database.clear_statement_cache();
    assert_eq!(database.cached_statements(), 0);
}
