use udal_core::ErrorKind;
use udal_testkit::{Step, load_scenarios_from_str};

#[test]
fn omitted_sections_default_to_empty() {
    let yaml = r#"
bare:
  steps:
    - step: connect
"#;

    let scenarios = load_scenarios_from_str(yaml).expect("yaml must parse");
    let scenario = scenarios.get("bare").expect("named scenario must be present");

    assert!(scenario.vendors.is_empty());
    assert!(scenario.config.is_none());
    assert!(scenario.procedures.is_empty());
    assert!(scenario.expect.is_empty());
    assert_eq!(scenario.steps, vec![Step::Connect { error: None }]);
}

#[test]
fn steps_keep_their_options() {
    let yaml = r#"
steps:
  steps:
    - step: begin
      read_only: true
    - step: query
      text: SELECT ID FROM SERVICES
      on_cursor: true
      fetch_rows: 10
    - step: fail_execute
      fragment: SERVICES
      connection_lost: true
    - step: release_cursor
    - step: is_connected
      expect: false
"#;

    let scenarios = load_scenarios_from_str(yaml).expect("yaml must parse");
    let steps = &scenarios["steps"].steps;

    assert_eq!(
        steps[0],
        Step::Begin {
            read_only: true,
            error: None
        }
    );
    let Step::Query {
        text,
        on_cursor,
        fetch_rows,
        procedure,
        cached,
        ..
    } = &steps[1]
    else {
        panic!("second step must be a query, got {:?}", steps[1]);
    };
    assert_eq!(text, "SELECT ID FROM SERVICES");
    assert!(*on_cursor);
    assert_eq!(*fetch_rows, 10);
    assert!(!*procedure);
    assert!(!*cached);

    let Step::FailExecute(failure) = &steps[2] else {
        panic!("third step must inject a failure, got {:?}", steps[2]);
    };
    assert_eq!(failure.fragment, "SERVICES");
    assert!(failure.connection_lost);
    assert_eq!(steps[3], Step::ReleaseCursor);
    assert_eq!(steps[4], Step::IsConnected { expect: false });
}

#[test]
fn config_sections_reuse_database_defaults() {
    let yaml = r#"
chunked:
  config:
    lob_chunk_size: 16
"#;

    let scenarios = load_scenarios_from_str(yaml).expect("yaml must parse");
    let config = scenarios["chunked"]
        .config
        .clone()
        .expect("config must be present");
    assert_eq!(config.lob_chunk_size, 16);
    assert_eq!(config.login_attempts, 3);
}

#[test]
fn unknown_fields_are_rejected_with_location() {
    let yaml = r#"
typo:
  step:
    - step: connect
"#;

    let error = load_scenarios_from_str(yaml).expect_err("unknown field must be rejected");
    assert_eq!(error.kind(), ErrorKind::InvalidState);
    let message = error.to_string();
    assert!(message.contains("line"), "{message}");
    assert!(message.contains("yaml scenario"), "{message}");
}
