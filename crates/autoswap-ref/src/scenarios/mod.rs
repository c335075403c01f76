//! End-to-end reference scenarios.
//!
//! Each scenario builds its own [`World`](crate::World), drives the clock by
//! hand, prints what the engine did at every step, and returns a
//! [`ScenarioReport`] of the properties it checked.

pub mod offchain_fallback;
pub mod stop_loss;
pub mod time_weighted;

use serde::Serialize;

/// One property a scenario checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Check {
    pub label: String,
    pub passed: bool,
}

/// What a scenario run observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub checks: Vec<Check>,
    /// Entries in the execution history when the scenario finished.
    pub recorded: usize,
    pub history_verified: bool,
}

impl ScenarioReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Record a check and print it.
    pub fn check(&mut self, label: impl Into<String>, passed: bool) {
        let label = label.into();
        println!("  [{}] {}", if passed { "PASS" } else { "FAIL" }, label);
        self.checks.push(Check { label, passed });
    }

    pub fn all_passed(&self) -> bool {
        self.history_verified && self.checks.iter().all(|check| check.passed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|check| !check.passed)
    }
}

/// Print the history footer shared by every scenario.
fn print_history(report: &mut ScenarioReport, world: &crate::World) {
    report.recorded = world.recorder.len();
    report.history_verified = world.recorder.verify_integrity();
    println!();
    println!(
        "  Execution history:      {} ({} record(s) in chain)",
        if report.history_verified { "VERIFIED" } else { "FAILED" },
        report.recorded
    );
    println!();
}
