//! Test support for the access layer: an in-memory [`MemoryDriver`] that
//! implements the driver capability traits, and a YAML scenario runner that
//! drives a [`udal_core::Database`] on top of it.

mod memory;
mod scenario;
mod target;

pub use memory::{ColumnSpec, Counters, MemoryDriver, MemoryStatement, Procedure, connection_lost};
pub use scenario::{
    ColumnSeed, FailureSeed, ParameterSeed, ProcedureSeed, Scenario, Step, TableSeed, TestResult,
    applies_to, load_scenarios_from_str, run_scenario,
};
