use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::common::scenario::{CheckFn, ScenarioKind, TestScenario};
use crate::common::{artifacts_dir, write_failure_artifacts};
use crate::logic::game_tester::{GameTester, SimulationPlan, SimulationSummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    /// Present only when the code replays exactly this seed.
    pub run_code: Option<String>,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
}

pub struct LogicTester {
    tester: GameTester,
    artifacts: Option<PathBuf>,
}

impl LogicTester {
    #[must_use]
    pub const fn new(tester: GameTester) -> Self {
        Self {
            tester,
            artifacts: None,
        }
    }

    /// Write failure artifacts under `dir`.
    #[must_use]
    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts = Some(dir.into());
        self
    }

    const fn verbose(&self) -> bool {
        self.tester.verbose()
    }

    pub fn run_scenario(
        &self,
        scenario: &TestScenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        let mut results = Vec::new();

        for &seed in seeds {
            if self.verbose() {
                println!(
                    "🧪 Testing scenario: {} (mode: {} seed: {})",
                    scenario.name.bright_white(),
                    scenario.mode_label(),
                    seed
                );
            }

            results.push(self.run_single_scenario(scenario, seed, iterations));
        }

        results
    }

    fn run_single_scenario(
        &self,
        scenario: &TestScenario,
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut performance_data = Vec::new();

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));

            let outcome = match &scenario.kind {
                ScenarioKind::Simulation(plan) => self.run_simulation(plan, iteration_seed),
                ScenarioKind::Check(check) => run_check(*check, &self.tester, iteration_seed),
            };

            match outcome {
                Ok(()) => {
                    successes += 1;
                    let duration = start_time.elapsed();
                    performance_data.push(duration);
                    if self.verbose() {
                        println!(
                            "  ✅ Iteration {}/{} passed ({duration:?})",
                            i + 1,
                            iterations
                        );
                    }
                }
                Err(failure) => {
                    let replay = coinvault_game::replay_code(iteration_seed)
                        .map(|code| format!(", code {code}"))
                        .unwrap_or_default();
                    let message = format!(
                        "Iteration {} (seed {iteration_seed}{replay}): {}",
                        i + 1,
                        failure.message
                    );
                    if self.verbose() {
                        println!(
                            "  ❌ Iteration {}/{} failed: {}",
                            i + 1,
                            iterations,
                            failure.message.clone().red()
                        );
                    }
                    self.save_artifacts(scenario, iteration_seed, &failure);
                    failures.push(message);
                }
            }
        }

        let average_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>()
                / u32::try_from(performance_data.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_name: scenario.name.clone(),
            seed,
            run_code: coinvault_game::replay_code(seed),
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            average_duration,
            performance_data,
        }
    }

    fn run_simulation(&self, plan: &SimulationPlan, seed: u64) -> Result<(), IterationFailure> {
        let summary = self
            .tester
            .run_plan(plan, seed)
            .map_err(|err| IterationFailure::bare(format!("{err:#}")))?;

        if let Some(err) = evaluate_expectations(plan, &summary) {
            return Err(IterationFailure {
                message: format!(
                    "{err} | learner {} {} in {} after {} answers | {}",
                    summary.strategy,
                    if summary.ended() { "ended" } else { "halted" },
                    summary.final_phase,
                    summary.turns.len(),
                    summarize_recent_turns(&summary)
                ),
                summary: Some(Box::new(summary)),
            });
        }
        Ok(())
    }

    fn save_artifacts(&self, scenario: &TestScenario, seed: u64, failure: &IterationFailure) {
        let Some(base) = &self.artifacts else {
            return;
        };
        let dir = artifacts_dir(base, &scenario.name, seed);
        let turns = failure.summary.as_ref().map(|summary| &summary.turns);
        if let Err(err) = write_failure_artifacts(&dir, turns, &failure.message) {
            log::warn!("could not write artifacts to {}: {err:#}", dir.display());
        }
    }
}

struct IterationFailure {
    message: String,
    summary: Option<Box<SimulationSummary>>,
}

impl IterationFailure {
    const fn bare(message: String) -> Self {
        Self {
            message,
            summary: None,
        }
    }
}

fn run_check(check: CheckFn, tester: &GameTester, seed: u64) -> Result<(), IterationFailure> {
    check(tester, seed).map_err(|err| IterationFailure::bare(format!("{err:#}")))
}

fn evaluate_expectations(plan: &SimulationPlan, summary: &SimulationSummary) -> Option<String> {
    for expectation in &plan.expectations {
        if let Err(err) = expectation.evaluate(summary) {
            return Some(err.to_string());
        }
    }
    None
}

fn summarize_recent_turns(summary: &SimulationSummary) -> String {
    if summary.turns.is_empty() {
        return "no answers recorded".to_string();
    }

    summary
        .turns
        .iter()
        .rev()
        .take(3)
        .map(|turn| {
            let verdict = match turn.correct {
                Some(true) => "correct",
                Some(false) => "wrong",
                None => "unreadable",
            };
            format!(
                "L{} Q{} {} {}: {:?} {verdict}",
                turn.level,
                turn.slot + 1,
                turn.kind,
                turn.unknown,
                turn.answer
            )
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis: Vec<u128> = durations.iter().map(Duration::as_millis).collect();
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis_vec = Vec::<u128>::deserialize(deserializer)?;
        Ok(millis_vec
            .into_iter()
            .map(|m| Duration::from_millis(u64::try_from(m).unwrap_or(0)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::scenario::get_scenario;
    use crate::logic::policy::LearnerStrategy;
    use anyhow::bail;
    use coinvault_game::EngineConfig;

    fn logic_tester() -> LogicTester {
        LogicTester::new(GameTester::new(EngineConfig::default().instant(), false))
    }

    #[test]
    fn smoke_scenario_passes_each_iteration() {
        let scenario = get_scenario("smoke").unwrap();
        let results = logic_tester().run_scenario(&scenario, &[1, 2], 2);
        assert_eq!(results.len(), 2);
        for result in results {
            assert!(result.passed, "{:?}", result.failures);
            assert_eq!(result.successful_iterations, 2);
            assert_eq!(result.performance_data.len(), 2);
        }
    }

    #[test]
    fn failed_expectations_are_reported_with_context() {
        let plan = SimulationPlan::new(LearnerStrategy::Diligent)
            .with_max_turns(2)
            .with_expectation(|_: &SimulationSummary| -> anyhow::Result<()> { bail!("always fails") });
        let scenario = TestScenario::simulation("Broken", plan);
        let result = logic_tester().run_scenario(&scenario, &[5], 1).remove(0);
        assert!(!result.passed);
        assert_eq!(result.successful_iterations, 0);
        assert!(result.failures[0].contains("always fails"));
        assert!(result.failures[0].contains("seed 5"));
        assert_eq!(result.average_duration, Duration::ZERO);
    }

    #[test]
    fn failure_messages_only_name_replayable_codes() {
        let scenario = TestScenario::check("Always Broken", |_, _| bail!("nope"));
        let coded = coinvault_game::decode_run_code("CV-LEDGER42").unwrap();
        let results = logic_tester().run_scenario(&scenario, &[coded, 1337], 2);

        assert_eq!(results[0].run_code.as_deref(), Some("CV-LEDGER42"));
        assert!(results[0].failures[0].contains(&format!("seed {coded}, code CV-LEDGER42")));
        assert!(!results[0].failures[1].contains("code"));

        assert_eq!(results[1].run_code, None);
        assert!(results[1].failures.iter().all(|f| !f.contains("code")));
    }

    #[test]
    fn failures_write_artifacts() {
        let dir = std::env::temp_dir().join(format!("coinvault-tester-art-{}", std::process::id()));
        let scenario = TestScenario::check("Always Broken", |_, _| bail!("nope"));
        let tester = logic_tester().with_artifacts_dir(&dir);
        let result = tester.run_scenario(&scenario, &[9], 1).remove(0);
        assert!(!result.passed);
        assert!(dir.join("always-broken").join("seed-9").exists());
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn results_serialize_durations_as_millis() {
        let result = ScenarioResult {
            scenario_name: "x".to_string(),
            seed: 1,
            run_code: Some("CV-LEDGER01".to_string()),
            passed: true,
            iterations_run: 1,
            successful_iterations: 1,
            failures: Vec::new(),
            average_duration: Duration::from_millis(12),
            performance_data: vec![Duration::from_millis(12)],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["average_duration"], 12);
        let back: ScenarioResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.performance_data, vec![Duration::from_millis(12)]);
    }
}
