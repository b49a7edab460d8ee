use udal_core::Vendor;
use udal_testkit::{TestResult, applies_to, load_scenarios_from_str, run_scenario};

const SCENARIOS: &str = include_str!("scenarios/service_state.yml");

#[test]
fn every_scenario_passes_on_every_listed_vendor() {
    let scenarios = load_scenarios_from_str(SCENARIOS)
        .unwrap_or_else(|error| panic!("failed to load scenarios: {error}"));
    assert!(!scenarios.is_empty());

    for (name, scenario) in &scenarios {
        for vendor in Vendor::ALL {
            match run_scenario(scenario, vendor) {
                TestResult::Passed => {}
                TestResult::Skipped(reason) => assert!(
                    !applies_to(scenario, vendor),
                    "scenario '{name}' was skipped on {vendor}: {reason}"
                ),
                TestResult::Failed(message) => {
                    panic!("scenario '{name}' failed on {vendor}: {message}")
                }
            }
        }
    }
}

#[test]
fn vendor_limited_scenarios_are_skipped_elsewhere() {
    let scenarios = load_scenarios_from_str(SCENARIOS)
        .unwrap_or_else(|error| panic!("failed to load scenarios: {error}"));
    let scenario = scenarios
        .get("oracle_failures_carry_the_ora_code")
        .expect("oracle scenario must exist");

    assert_eq!(run_scenario(scenario, Vendor::Oracle), TestResult::Passed);
    assert!(matches!(
        run_scenario(scenario, Vendor::SqlServer),
        TestResult::Skipped(_)
    ));
}

#[test]
fn mismatched_expectations_fail_the_scenario() {
    let yaml = r#"
wrong_row_count:
  procedures:
    GetServiceState:
      columns:
        - { name: STATE, type: char, dimension: 20 }
      rows:
        - [RUNNING]
  steps:
    - step: connect
    - step: query
      text: GetServiceState
      procedure: true
      rows: 2
missing_error:
  procedures:
    GetServiceState:
      columns:
        - { name: STATE, type: char, dimension: 20 }
  steps:
    - step: connect
    - step: query
      text: GetServiceState
      procedure: true
      error: database
wrong_counter:
  steps:
    - step: connect
  expect:
    logins: 2
"#;

    let scenarios = load_scenarios_from_str(yaml).expect("yaml must parse");
    for (name, scenario) in &scenarios {
        let result = run_scenario(scenario, Vendor::Oracle);
        assert!(
            matches!(result, TestResult::Failed(_)),
            "scenario '{name}' must fail, got {result:?}"
        );
    }

    let TestResult::Failed(message) = run_scenario(&scenarios["wrong_row_count"], Vendor::Oracle)
    else {
        panic!("wrong_row_count must fail");
    };
    assert!(message.starts_with("step 2 (query)"), "{message}");
}
