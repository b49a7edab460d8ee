use udal_core::{
    CommandKind, ConnectionDescriptor, ConnectionState, Database, DatabaseConfig, Diagnostic,
    ErrorKind, Vendor,
};

#[path = "support/fake_driver.rs"]
mod fake_driver;

use fake_driver::FakeDriver;

fn descriptor() -> ConnectionDescriptor {
    ConnectionDescriptor::new("FINDB", "router", "secret")
}

fn database(driver: &FakeDriver) -> Database<FakeDriver> {
    Database::new(driver.clone(), DatabaseConfig::named("router").without_delays())
}

#[test]
fn odbc_login_retries_until_attempts_are_exhausted() {
    let driver = FakeDriver::new(Vendor::Db2);
    driver.fail_logins(2, Diagnostic::new(-30081, "communication error").with_sql_state("08001"));
    let mut database = database(&driver);

    database.connect(descriptor()).expect("third attempt succeeds");

    assert_eq!(driver.login_attempts(), 3);
    assert_eq!(database.state(), ConnectionState::Connected);
}

#[test]
fn odbc_login_fails_after_three_attempts() {
    let driver = FakeDriver::new(Vendor::PostgreSql);
    driver.fail_logins(5, Diagnostic::new(0, "password authentication failed").with_sql_state("28P01"));
    let mut database = database(&driver);

    let error = database.connect(descriptor()).expect_err("login exhausted");

    assert_eq!(error.kind(), ErrorKind::Db);
    assert!(error.to_string().contains("password authentication failed"));
    assert_eq!(driver.login_attempts(), 3);
    assert_eq!(database.state(), ConnectionState::Disconnected);
}

#[test]
fn call_interface_login_is_not_retried() {
    let driver = FakeDriver::new(Vendor::Oracle);
    driver.fail_logins(1, Diagnostic::new(1017, "invalid username/password"));
    let mut database = database(&driver);

    let error = database.connect(descriptor()).expect_err("single attempt");

    assert_eq!(error.vendor_code(), Some("ORA-01017"));
    assert_eq!(driver.login_attempts(), 1);
}

#[test]
fn connecting_twice_is_rejected() {
    let driver = FakeDriver::new(Vendor::Db2);
    let mut database = database(&driver);
    database.connect(descriptor()).expect("connect");

    let error = database.connect(descriptor()).expect_err("already connected");
    assert_eq!(error.kind(), ErrorKind::InvalidState);
}

#[test]
fn invalid_date_format_is_rejected_before_login() {
    let driver = FakeDriver::new(Vendor::Oracle);
    let config = DatabaseConfig {
        date_format: "%Y-%m-%d %Q".to_string(),
        ..DatabaseConfig::named("router").without_delays()
    };
    let mut database = Database::new(driver.clone(), config);

    let error = database.connect(descriptor()).expect_err("bad date format");

    assert_eq!(error.kind(), ErrorKind::InvalidState);
    assert!(error.to_string().contains("%Y-%m-%d %Q"), "{error}");
    assert_eq!(driver.login_attempts(), 0);
    assert_eq!(database.state(), ConnectionState::Disconnected);
}

#[test]
fn connection_loss_arms_reconnect_until_is_connected_polls() {
    let driver = FakeDriver::new(Vendor::Oracle);
    let mut database = database(&driver);
    database.connect(descriptor()).expect("connect");
    database.begin_transaction(false).expect("begin");
    driver.fail_execute("PING", Diagnostic::new(3113, "end-of-file on communication channel"));

    let error = database
        .execute_non_query(CommandKind::StoredProcedure, "PING", &mut [], false)
        .expect_err("connection lost");

    assert_eq!(error.kind(), ErrorKind::ConnectionLost);
    assert!(error.is_retryable());
    assert_eq!(database.state(), ConnectionState::Reconnecting);
    assert!(!database.in_transaction());
    assert!(!driver.is_connected());

    let blocked = database
        .execute_non_query(CommandKind::Inline, "UPDATE t SET a = 1", &mut [], false)
        .expect_err("no statement runs while reconnecting");
    assert_eq!(blocked.kind(), ErrorKind::ConnectionLost);
    assert_eq!(driver.logins(), 1);

    driver.clear_failures();
    assert!(database.is_connected());
    assert_eq!(database.state(), ConnectionState::Connected);
    assert_eq!(driver.logins(), 2);
    assert_eq!(database.stats().reconnects, 1);
    database
        .execute_non_query(CommandKind::StoredProcedure, "PING", &mut [], false)
        .expect("works after reconnect");
}

#[test]
fn failed_reconnect_stays_in_reconnecting() {
    let driver = FakeDriver::new(Vendor::SqlServer);
    let mut database = database(&driver);
    database.connect(descriptor()).expect("connect");
    driver.fail_execute("SELECT", Diagnostic::new(10054, "connection reset").with_sql_state("08S01"));
    database
        .execute_query(CommandKind::Inline, "SELECT 1", &mut [], false, 0)
        .expect_err("lost");

    driver.fail_logins(1, Diagnostic::new(0, "server unavailable").with_sql_state("08001"));
    assert!(!database.is_connected());
    assert_eq!(database.state(), ConnectionState::Reconnecting);

    assert!(database.is_connected());
}

#[test]
fn statement_errors_leave_the_connection_alone() {
    let driver = FakeDriver::new(Vendor::Oracle);
    let mut database = database(&driver);
    database.connect(descriptor()).expect("connect");
    driver.fail_execute("INSERT", Diagnostic::new(1, "unique constraint violated"));

    let error = database
        .execute_non_query(CommandKind::Inline, "INSERT INTO t VALUES (1)", &mut [], false)
        .expect_err("duplicate");

    assert_eq!(error.kind(), ErrorKind::Db);
    assert_eq!(database.state(), ConnectionState::Connected);
    assert!(database.is_connected());
}

#[test]
fn operations_before_connect_are_invalid() {
    let driver = FakeDriver::new(Vendor::Db2);
    let mut database = database(&driver);

    let error = database
        .execute_query(CommandKind::Inline, "SELECT 1", &mut [], false, 0)
        .expect_err("not connected");
    assert_eq!(error.kind(), ErrorKind::InvalidState);
    assert!(!database.is_connected());
}

#[test]
fn disconnect_rolls_back_releases_and_is_idempotent() {
    let driver = FakeDriver::new(Vendor::Db2);
    let mut database = database(&driver);
    database.connect(descriptor()).expect("connect");
    database.begin_transaction(false).expect("begin");
    database
        .execute_query(CommandKind::Inline, "SELECT 1 FROM queue", &mut [], true, 1)
        .expect("hold cursor");
    assert_eq!(driver.open_statements(), 1);

    database.disconnect();
    database.disconnect();

    assert_eq!(driver.open_statements(), 0);
    assert_eq!(driver.rollbacks(), 1);
    assert_eq!(driver.disconnects(), 1);
    assert_eq!(database.state(), ConnectionState::Disconnected);
    assert!(database.held_cursor().is_none());
}

#[test]
fn dropping_a_connected_database_disconnects() {
    let driver = FakeDriver::new(Vendor::Informix);
    {
        let mut database = database(&driver);
        database.connect(descriptor()).expect("connect");
    }

    assert_eq!(driver.disconnects(), 1);
    assert!(!driver.is_connected());
}
