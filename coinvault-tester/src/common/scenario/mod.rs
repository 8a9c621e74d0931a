use anyhow::Result;

use crate::logic::game_tester::{GameTester, SimulationPlan};

pub mod catalog;
pub mod checks;

pub use catalog::{expand_scenarios, get_scenario, list_scenarios};

/// Direct assertion against the engine for one seed.
pub type CheckFn = fn(&GameTester, u64) -> Result<()>;

/// What a scenario exercises.
#[derive(Debug, Clone)]
pub enum ScenarioKind {
    /// Play a learner session and evaluate the plan's expectations.
    Simulation(SimulationPlan),
    /// Probe engine components without playing a run.
    Check(CheckFn),
}

#[derive(Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub kind: ScenarioKind,
}

impl TestScenario {
    #[must_use]
    pub fn simulation(name: impl Into<String>, plan: SimulationPlan) -> Self {
        Self {
            name: name.into(),
            kind: ScenarioKind::Simulation(plan),
        }
    }

    #[must_use]
    pub fn check(name: impl Into<String>, check: CheckFn) -> Self {
        Self {
            name: name.into(),
            kind: ScenarioKind::Check(check),
        }
    }

    /// Learner label for simulations, `check` otherwise.
    #[must_use]
    pub fn mode_label(&self) -> &'static str {
        match &self.kind {
            ScenarioKind::Simulation(plan) => plan.strategy.label(),
            ScenarioKind::Check(_) => "check",
        }
    }
}
