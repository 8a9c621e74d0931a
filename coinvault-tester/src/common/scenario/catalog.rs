use anyhow::{Result, ensure};

use super::{TestScenario, checks};
use crate::logic::game_tester::{SimulationPlan, SimulationSummary};
use crate::logic::policy::LearnerStrategy;

const SMOKE_TURNS: u32 = 10;
const RESUME_INTERVAL: u32 = 4;
const RECOVERY_TURN_LIMIT: u32 = 600;
const DEFEAT_START_LEVEL: u8 = 4;

struct CatalogEntry {
    key: &'static str,
    aliases: &'static [&'static str],
    build: fn() -> TestScenario,
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        key: "smoke",
        aliases: &[],
        build: smoke_scenario,
    },
    CatalogEntry {
        key: "victory",
        aliases: &["full-run", "diligent"],
        build: victory_scenario,
    },
    CatalogEntry {
        key: "rounding",
        aliases: &["rounder", "whole-units"],
        build: rounding_scenario,
    },
    CatalogEntry {
        key: "recovery",
        aliases: &["careless"],
        build: recovery_scenario,
    },
    CatalogEntry {
        key: "defeat",
        aliases: &["guesser"],
        build: defeat_scenario,
    },
    CatalogEntry {
        key: "snapshot-resume",
        aliases: &["resume"],
        build: resume_scenario,
    },
    CatalogEntry {
        key: "timed-transitions",
        aliases: &["transitions"],
        build: timed_transitions_scenario,
    },
    CatalogEntry {
        key: "generator-sweep",
        aliases: &["generator"],
        build: generator_sweep_scenario,
    },
    CatalogEntry {
        key: "calculator",
        aliases: &["calc"],
        build: calculator_scenario,
    },
    CatalogEntry {
        key: "run-codes",
        aliases: &["codes"],
        build: run_code_scenario,
    },
    CatalogEntry {
        key: "determinism",
        aliases: &["deterministic"],
        build: determinism_scenario,
    },
];

/// Look up a scenario by key or alias, case-insensitively.
pub fn get_scenario(name: &str) -> Option<TestScenario> {
    let wanted = name.trim().to_lowercase();
    CATALOG
        .iter()
        .find(|entry| entry.key == wanted || entry.aliases.iter().any(|alias| *alias == wanted))
        .map(|entry| (entry.build)())
}

pub fn list_scenarios() -> Vec<(&'static str, String)> {
    CATALOG
        .iter()
        .map(|entry| (entry.key, (entry.build)().name))
        .collect()
}

/// Replace the `all` keyword with every catalog key, keeping order.
pub fn expand_scenarios(requested: &[String]) -> Vec<String> {
    let mut scenarios = Vec::new();
    for name in requested {
        if name.eq_ignore_ascii_case("all") {
            scenarios.extend(CATALOG.iter().map(|entry| entry.key.to_string()));
        } else {
            scenarios.push(name.clone());
        }
    }
    scenarios.dedup();
    scenarios
}

fn smoke_scenario() -> TestScenario {
    TestScenario::simulation(
        "Smoke Test",
        SimulationPlan::new(LearnerStrategy::Diligent)
            .with_max_turns(SMOKE_TURNS)
            .with_expectation(no_input_errors)
            .with_expectation(|summary: &SimulationSummary| {
                ensure!(
                    summary.metrics.correct == SMOKE_TURNS,
                    "expected {SMOKE_TURNS} correct answers, got {}",
                    summary.metrics.correct
                );
                ensure!(
                    summary.saved.is_some(),
                    "an unfinished run should leave a snapshot"
                );
                Ok(())
            }),
    )
}

fn victory_scenario() -> TestScenario {
    TestScenario::simulation(
        "Full Run - Diligent Learner",
        SimulationPlan::new(LearnerStrategy::Diligent)
            .with_expectation(no_input_errors)
            .with_expectation(victory_expectation)
            .with_expectation(flawless_expectation),
    )
}

fn rounding_scenario() -> TestScenario {
    TestScenario::simulation(
        "Whole-Unit Answers",
        SimulationPlan::new(LearnerStrategy::Rounder)
            .with_expectation(victory_expectation)
            .with_expectation(flawless_expectation),
    )
}

fn recovery_scenario() -> TestScenario {
    TestScenario::simulation(
        "Careless Learner Recovery",
        SimulationPlan::new(LearnerStrategy::Careless)
            .retrying()
            .with_max_turns(RECOVERY_TURN_LIMIT)
            .with_expectation(no_input_errors)
            .with_expectation(victory_expectation)
            .with_expectation(|summary: &SimulationSummary| {
                ensure!(
                    summary.metrics.retries == summary.metrics.defeats,
                    "every defeat should be retried ({} defeats, {} retries)",
                    summary.metrics.defeats,
                    summary.metrics.retries
                );
                ensure!(
                    summary.metrics.health_healed <= summary.metrics.fever_pulses,
                    "a pulse heals at most one point"
                );
                Ok(())
            }),
    )
}

fn defeat_scenario() -> TestScenario {
    TestScenario::simulation(
        "Guesser Defeat",
        SimulationPlan::new(LearnerStrategy::Guesser)
            .with_start_level(DEFEAT_START_LEVEL)
            .with_expectation(|summary: &SimulationSummary| {
                ensure!(
                    summary.metrics.defeats == 1,
                    "guesser should be defeated once, got {} ({})",
                    summary.metrics.defeats,
                    summary.final_phase
                );
                ensure!(
                    summary.final_level == Some(DEFEAT_START_LEVEL),
                    "defeat should keep the level, got {:?}",
                    summary.final_level
                );
                let saved = summary
                    .saved
                    .ok_or_else(|| anyhow::anyhow!("defeat should leave a snapshot"))?;
                ensure!(
                    saved.level == DEFEAT_START_LEVEL && saved.slot_index == 0 && saved.streak == 0,
                    "defeat snapshot should restart the level, got {saved:?}"
                );
                Ok(())
            }),
    )
}

fn resume_scenario() -> TestScenario {
    TestScenario::simulation(
        "Snapshot Resume",
        SimulationPlan::new(LearnerStrategy::Diligent)
            .resuming_every(RESUME_INTERVAL)
            .with_expectation(victory_expectation)
            .with_expectation(flawless_expectation)
            .with_expectation(|summary: &SimulationSummary| {
                ensure!(
                    summary.metrics.resumes > 0,
                    "session was never reopened from disk"
                );
                Ok(())
            }),
    )
}

fn timed_transitions_scenario() -> TestScenario {
    TestScenario::simulation(
        "Timed Transitions",
        SimulationPlan::new(LearnerStrategy::Diligent)
            .with_config(coinvault_game::EngineConfig::default())
            .with_expectation(victory_expectation)
            .with_expectation(|summary: &SimulationSummary| {
                let expected = summary.metrics.answered().saturating_sub(1);
                ensure!(
                    summary.metrics.transitions == expected,
                    "expected {expected} transitions, walked {}",
                    summary.metrics.transitions
                );
                Ok(())
            }),
    )
}

fn generator_sweep_scenario() -> TestScenario {
    TestScenario::check("Generator Sweep", checks::generator_sweep)
}

fn calculator_scenario() -> TestScenario {
    TestScenario::check("Calculator Grammar", checks::calculator_grammar)
}

fn run_code_scenario() -> TestScenario {
    TestScenario::check("Run Code Consistency", checks::run_code_consistency)
}

fn determinism_scenario() -> TestScenario {
    TestScenario::check("Deterministic Sessions", checks::deterministic_sessions)
}

fn no_input_errors(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.metrics.input_errors == 0,
        "{} answers were rejected as unreadable",
        summary.metrics.input_errors
    );
    Ok(())
}

fn victory_expectation(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.victorious(),
        "run should end in victory, ended in {} after {} answers",
        summary.final_phase,
        summary.turns.len()
    );
    let expected: Vec<u8> = (summary.start_level..summary.max_level).collect();
    ensure!(
        summary.metrics.levels_cleared == expected,
        "levels cleared out of order: {:?}",
        summary.metrics.levels_cleared
    );
    ensure!(
        summary.saved.is_none(),
        "victory should clear the saved snapshot"
    );
    Ok(())
}

fn flawless_expectation(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.metrics.incorrect == 0,
        "{} answers judged wrong; first: {:?}",
        summary.metrics.incorrect,
        summary.turns.iter().find(|t| t.correct == Some(false))
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_key_and_alias_resolves() {
        for entry in CATALOG {
            assert!(get_scenario(entry.key).is_some(), "{}", entry.key);
            for alias in entry.aliases {
                assert!(get_scenario(alias).is_some(), "{alias}");
            }
        }
        assert!(get_scenario("SMOKE").is_some());
        assert!(get_scenario("weather").is_none());
    }

    #[test]
    fn all_keyword_expands_in_catalog_order() {
        let expanded = expand_scenarios(&["calculator".to_string(), "all".to_string()]);
        assert_eq!(expanded.first().map(String::as_str), Some("calculator"));
        assert_eq!(expanded.len(), CATALOG.len() + 1);
        assert_eq!(expanded[1], "smoke");
    }

    #[test]
    fn listing_uses_display_names() {
        let listed = list_scenarios();
        assert_eq!(listed.len(), CATALOG.len());
        assert!(listed.contains(&("smoke", "Smoke Test".to_string())));
    }
}
