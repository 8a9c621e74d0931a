//! Run state machine: health, streak and fever, level advancement, retries
//! and snapshot persistence.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::{ConfigError, EngineConfig};
use crate::constants::{FEVER_HEAL, LOG_TARGET};
use crate::generator::ProblemGenerator;
use crate::problem::{ExpectedAnswer, Problem};
use crate::state::{GamePhase, RunState, Snapshot, TransitionCause};
use crate::storage::SnapshotStorage;
use crate::verifier::{AnswerInputError, Submission, verify};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProgressionError {
    #[error("level {level} is outside 1..={max}")]
    LevelOutOfRange { level: u8, max: u8 },
    #[error("no saved run to continue")]
    NoSavedRun,
    #[error("cannot {action} while {phase}")]
    InvalidPhase {
        action: &'static str,
        phase: &'static str,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("answers are not accepted while {phase}")]
    NotAcceptingAnswers { phase: &'static str },
    #[error(transparent)]
    Input(#[from] AnswerInputError),
}

/// Streak event caused by a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeverEvent {
    None,
    Ignited,
    /// Fever was consumed and `healed` health restored.
    Pulse { healed: u8 },
    Broken,
}

/// Where a judged submission took the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    NextQuestion { slot: u8 },
    LevelComplete { cleared: u8, next_level: u8 },
    Victory,
    Retry { health: u8 },
    Defeated { level: u8 },
}

/// Verdict returned to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub correct: bool,
    pub submitted: Submission,
    pub expected: ExpectedAnswer,
    pub explanation: String,
    pub transition: Transition,
    pub fever: FeverEvent,
}

/// Owns the run state and drives every transition.
#[derive(Debug)]
pub struct ProgressionEngine<S: SnapshotStorage> {
    config: EngineConfig,
    generator: ProblemGenerator,
    storage: S,
    persistence_enabled: bool,
    state: Option<RunState>,
    nonce: u64,
}

impl<S: SnapshotStorage> ProgressionEngine<S> {
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` fails validation.
    pub fn new(config: EngineConfig, seed: u64, storage: S) -> Result<Self, ConfigError> {
        config.validate()?;
        let generator = ProblemGenerator::new(seed, config.questions_per_level);
        Ok(Self {
            config,
            generator,
            storage,
            persistence_enabled: true,
            state: None,
            nonce: 0,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn generator(&self) -> &ProblemGenerator {
        &self.generator
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    pub const fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    #[must_use]
    pub const fn persistence_enabled(&self) -> bool {
        self.persistence_enabled
    }

    #[must_use]
    pub const fn state(&self) -> Option<&RunState> {
        self.state.as_ref()
    }

    #[must_use]
    pub fn phase(&self) -> GamePhase {
        self.state.as_ref().map_or(GamePhase::LevelSelect, |s| s.phase)
    }

    #[must_use]
    pub fn current_problem(&self) -> Option<&Problem> {
        self.state.as_ref().and_then(|s| s.current_problem.as_ref())
    }

    /// The problem dealt for `(level, slot)`. While a run sits on that slot
    /// this is the problem `submit` judges; other slots get a preview.
    #[must_use]
    pub fn request_problem(&self, level: u8, slot: u8) -> Problem {
        self.state
            .as_ref()
            .filter(|s| s.level == level && s.slot_index == slot)
            .and_then(|s| s.current_problem.clone())
            .unwrap_or_else(|| self.generator.request_problem(level, slot, 0))
    }

    /// Progress of the run in progress, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.state
            .as_ref()
            .filter(|s| !s.phase.is_terminal())
            .map(RunState::snapshot)
    }

    /// Snapshot offered for "continue"; unreadable records count as absent.
    #[must_use]
    pub fn saved_snapshot(&self) -> Option<Snapshot> {
        match self.storage.load() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::warn!(target: LOG_TARGET, "discarding unreadable snapshot: {err}");
                None
            }
        }
    }

    /// Begin `level` at full health.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressionError::LevelOutOfRange`] for levels outside the run.
    pub fn start_run(&mut self, level: u8) -> Result<&Problem, ProgressionError> {
        if level == 0 || level > self.config.max_level {
            return Err(ProgressionError::LevelOutOfRange {
                level,
                max: self.config.max_level,
            });
        }
        log::info!(target: LOG_TARGET, "starting run at level {level}");
        self.state = Some(RunState::fresh(level, &self.config));
        self.persist();
        Ok(self.deal_problem())
    }

    /// Resume from the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressionError::NoSavedRun`] when nothing is stored.
    pub fn continue_run(&mut self) -> Result<&Problem, ProgressionError> {
        let snapshot = self.saved_snapshot().ok_or(ProgressionError::NoSavedRun)?;
        self.load_snapshot(snapshot);
        self.current_problem().ok_or(ProgressionError::NoSavedRun)
    }

    /// Replace the run with one rebuilt from `snapshot`. Out-of-range fields
    /// start a fresh run at level 1 instead.
    pub fn load_snapshot(&mut self, snapshot: Snapshot) -> &RunState {
        let state = if snapshot.is_valid_for(&self.config) {
            log::info!(
                target: LOG_TARGET,
                "restoring level {} slot {} with {} health",
                snapshot.level,
                snapshot.slot_index,
                snapshot.health
            );
            RunState::from_snapshot(snapshot, &self.config)
        } else {
            log::warn!(target: LOG_TARGET, "snapshot out of range, starting fresh: {snapshot:?}");
            RunState::fresh(1, &self.config)
        };
        self.state = Some(state);
        self.persist();
        self.deal_problem();
        self.active_state_mut()
    }

    /// Judge `text` against the current problem and apply the result.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::NotAcceptingAnswers`] outside `Playing` and
    /// [`SubmitError::Input`] for unparseable text. Neither changes the run.
    pub fn submit(&mut self, text: &str) -> Result<Verdict, SubmitError> {
        let phase = self.phase();
        if !phase.accepts_answers() {
            return Err(SubmitError::NotAcceptingAnswers {
                phase: phase.as_str(),
            });
        }
        let problem = self
            .current_problem()
            .ok_or(SubmitError::NotAcceptingAnswers {
                phase: phase.as_str(),
            })?;
        let judgement = verify(problem, text)?;
        log::debug!(
            target: LOG_TARGET,
            "level {} slot {}: submitted {text:?}, expected {}, correct={}",
            problem.level,
            problem.slot,
            judgement.expected,
            judgement.correct
        );

        let (transition, fever) = if judgement.correct {
            self.on_correct()
        } else {
            self.on_incorrect()
        };
        Ok(Verdict {
            correct: judgement.correct,
            submitted: judgement.submitted,
            expected: judgement.expected,
            explanation: judgement.explanation,
            transition,
            fever,
        })
    }

    /// Advance a transition by `elapsed`. Returns the new problem once the
    /// transition completes.
    pub fn advance(&mut self, elapsed: Duration) -> Option<&Problem> {
        let state = self.state.as_mut()?;
        let GamePhase::Transitioning { remaining, cause } = state.phase else {
            return None;
        };
        let left = remaining.saturating_sub(elapsed);
        if left.is_zero() {
            return Some(self.finish_transition());
        }
        state.phase = GamePhase::Transitioning {
            remaining: left,
            cause,
        };
        None
    }

    /// Complete any pending transition immediately.
    pub fn skip_transition(&mut self) -> Option<&Problem> {
        match self.phase() {
            GamePhase::Transitioning { .. } => Some(self.finish_transition()),
            _ => None,
        }
    }

    /// Restart the current level after a defeat.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressionError::InvalidPhase`] unless the run is defeated.
    pub fn retry_level(&mut self) -> Result<&Problem, ProgressionError> {
        let phase = self.phase();
        let Some(state) = self.state.as_mut().filter(|_| phase == GamePhase::Defeated) else {
            return Err(ProgressionError::InvalidPhase {
                action: "retry",
                phase: phase.as_str(),
            });
        };
        *state = RunState::fresh(state.level, &self.config);
        log::info!(target: LOG_TARGET, "retrying level {}", state.level);
        self.persist();
        Ok(self.deal_problem())
    }

    /// Leave the run for level select, saving progress first.
    pub fn return_to_menu(&mut self) {
        if self.state.is_some() {
            self.persist();
        }
        self.state = None;
        log::debug!(target: LOG_TARGET, "returned to level select");
    }

    fn on_correct(&mut self) -> (Transition, FeverEvent) {
        let max_health = self.config.max_health;
        let threshold = self.config.fever_threshold;
        let questions = self.config.questions_per_level;
        let max_level = self.config.max_level;
        let state = self.active_state_mut();

        let fever = if state.fever_active {
            let before = state.health;
            state.health = state.health.saturating_add(FEVER_HEAL).min(max_health);
            state.break_streak();
            FeverEvent::Pulse {
                healed: state.health - before,
            }
        } else {
            state.streak = state.streak.saturating_add(1);
            if state.streak >= threshold {
                state.fever_active = true;
                FeverEvent::Ignited
            } else {
                FeverEvent::None
            }
        };

        state.slot_index = state.slot_index.saturating_add(1);
        if state.slot_index < questions {
            let slot = state.slot_index;
            self.begin_transition(TransitionCause::NextQuestion);
            return (Transition::NextQuestion { slot }, fever);
        }

        let cleared = state.level;
        if cleared >= max_level {
            state.phase = GamePhase::Victory;
            state.current_problem = None;
            log::info!(target: LOG_TARGET, "victory after clearing level {cleared}");
            if self.persistence_enabled
                && let Err(err) = self.storage.clear()
            {
                log::warn!(target: LOG_TARGET, "failed to clear snapshot: {err}");
            }
            return (Transition::Victory, fever);
        }

        state.level = cleared + 1;
        state.health = max_health;
        state.slot_index = 0;
        let next_level = state.level;
        log::info!(target: LOG_TARGET, "level {cleared} complete, advancing to {next_level}");
        self.begin_transition(TransitionCause::LevelComplete { cleared });
        (
            Transition::LevelComplete {
                cleared,
                next_level,
            },
            fever,
        )
    }

    fn on_incorrect(&mut self) -> (Transition, FeverEvent) {
        let max_health = self.config.max_health;
        let state = self.active_state_mut();
        let fever = if state.streak > 0 || state.fever_active {
            FeverEvent::Broken
        } else {
            FeverEvent::None
        };
        state.health = state.health.saturating_sub(1);
        state.break_streak();

        if state.health == 0 {
            let level = state.level;
            state.health = max_health;
            state.slot_index = 0;
            state.phase = GamePhase::Defeated;
            state.current_problem = None;
            log::info!(target: LOG_TARGET, "defeated on level {level}");
            self.persist();
            return (Transition::Defeated { level }, fever);
        }

        let health = state.health;
        self.persist();
        self.deal_problem();
        (Transition::Retry { health }, fever)
    }

    fn begin_transition(&mut self, cause: TransitionCause) {
        let duration = self.config.transition_duration();
        self.persist();
        if duration.is_zero() {
            self.deal_problem();
            return;
        }
        let state = self.active_state_mut();
        state.current_problem = None;
        state.phase = GamePhase::Transitioning {
            remaining: duration,
            cause,
        };
        log::debug!(target: LOG_TARGET, "transitioning for {duration:?} ({cause:?})");
    }

    fn finish_transition(&mut self) -> &Problem {
        self.deal_problem()
    }

    /// Generate a fresh problem for the current slot and resume play.
    fn deal_problem(&mut self) -> &Problem {
        self.nonce = self.nonce.wrapping_add(1);
        let nonce = self.nonce;
        let generator = &self.generator;
        let state = self
            .state
            .get_or_insert_with(|| RunState::fresh(1, &self.config));
        let problem = generator.request_problem(state.level, state.slot_index, nonce);
        state.phase = GamePhase::Playing;
        state.current_problem.insert(problem)
    }

    fn persist(&mut self) {
        if !self.persistence_enabled {
            return;
        }
        let Some(snapshot) = self.snapshot() else {
            return;
        };
        if let Err(err) = self.storage.save(&snapshot) {
            log::warn!(
                target: LOG_TARGET,
                "snapshot write failed, disabling persistence for this session: {err}"
            );
            self.persistence_enabled = false;
        }
    }

    fn active_state_mut(&mut self) -> &mut RunState {
        let config = &self.config;
        self.state
            .get_or_insert_with(|| RunState::fresh(1, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySnapshotStorage;

    fn engine(config: EngineConfig) -> ProgressionEngine<MemorySnapshotStorage> {
        ProgressionEngine::new(config, 42, MemorySnapshotStorage::new()).unwrap()
    }

    fn right(engine: &ProgressionEngine<MemorySnapshotStorage>) -> String {
        engine.current_problem().unwrap().expected.to_string()
    }

    fn wrong(engine: &ProgressionEngine<MemorySnapshotStorage>) -> String {
        match engine.current_problem().unwrap().expected {
            ExpectedAnswer::Number(value) => format!("{}", value * 3.0 + 1_000.0),
            ExpectedAnswer::Label(label) => match label {
                crate::problem::PlanLabel::A => "B".to_string(),
                crate::problem::PlanLabel::B => "A".to_string(),
            },
        }
    }

    #[test]
    fn five_correct_answers_complete_the_level() {
        let mut engine = engine(EngineConfig::default().instant());
        engine.start_run(1).unwrap();
        let mut completions = 0;
        for _ in 0..5 {
            let answer = right(&engine);
            let verdict = engine.submit(&answer).unwrap();
            assert!(verdict.correct);
            if matches!(verdict.transition, Transition::LevelComplete { .. }) {
                completions += 1;
            }
        }
        assert_eq!(completions, 1);
        let state = engine.state().unwrap();
        assert_eq!(state.level, 2);
        assert_eq!(state.slot_index, 0);
        assert_eq!(state.health, 5);
    }

    #[test]
    fn running_out_of_health_defeats_but_keeps_level() {
        let mut engine = engine(EngineConfig::default().instant());
        engine.start_run(3).unwrap();
        let answer = right(&engine);
        engine.submit(&answer).unwrap();
        for i in 0..5 {
            let answer = wrong(&engine);
            let verdict = engine.submit(&answer).unwrap();
            assert!(!verdict.correct);
            if i < 4 {
                assert_eq!(verdict.transition, Transition::Retry { health: 4 - i });
            } else {
                assert_eq!(verdict.transition, Transition::Defeated { level: 3 });
            }
        }
        assert_eq!(engine.phase(), GamePhase::Defeated);
        let state = engine.state().unwrap();
        assert_eq!((state.level, state.slot_index, state.health), (3, 0, 5));
        assert!(matches!(
            engine.submit("1"),
            Err(SubmitError::NotAcceptingAnswers { phase: "defeated" })
        ));
        engine.retry_level().unwrap();
        assert_eq!(engine.phase(), GamePhase::Playing);
    }

    #[test]
    fn fever_ignites_and_pulse_heals() {
        let mut engine = engine(EngineConfig::default().instant());
        engine.start_run(1).unwrap();
        let answer = wrong(&engine);
        engine.submit(&answer).unwrap();
        assert_eq!(engine.state().unwrap().health, 4);

        let mut events = Vec::new();
        for _ in 0..4 {
            let answer = right(&engine);
            events.push(engine.submit(&answer).unwrap().fever);
        }
        assert_eq!(
            events,
            vec![
                FeverEvent::None,
                FeverEvent::None,
                FeverEvent::Ignited,
                FeverEvent::Pulse { healed: 1 }
            ]
        );
        let state = engine.state().unwrap();
        assert_eq!(state.health, 5);
        assert_eq!(state.streak, 0);
        assert!(!state.fever_active);
    }

    #[test]
    fn wrong_answer_breaks_streak_and_keeps_slot() {
        let mut engine = engine(EngineConfig::default().instant());
        engine.start_run(1).unwrap();
        let answer = right(&engine);
        engine.submit(&answer).unwrap();
        let answer = wrong(&engine);
        let verdict = engine.submit(&answer).unwrap();
        assert_eq!(verdict.fever, FeverEvent::Broken);
        let state = engine.state().unwrap();
        assert_eq!(state.streak, 0);
        assert_eq!(state.slot_index, 1);
    }

    #[test]
    fn transitions_block_answers_until_advanced() {
        let mut engine = engine(EngineConfig::default());
        engine.start_run(1).unwrap();
        let answer = right(&engine);
        engine.submit(&answer).unwrap();
        assert!(matches!(engine.phase(), GamePhase::Transitioning { .. }));
        assert!(matches!(
            engine.submit("0"),
            Err(SubmitError::NotAcceptingAnswers {
                phase: "transitioning"
            })
        ));
        assert!(engine.advance(Duration::from_millis(500)).is_none());
        assert!(engine.advance(Duration::from_millis(700)).is_some());
        assert_eq!(engine.phase(), GamePhase::Playing);

        let answer = right(&engine);
        engine.submit(&answer).unwrap();
        assert!(engine.skip_transition().is_some());
        assert_eq!(engine.state().unwrap().slot_index, 2);
    }

    #[test]
    fn input_errors_cost_nothing() {
        let mut engine = engine(EngineConfig::default().instant());
        engine.start_run(1).unwrap();
        let before = engine.state().unwrap().clone();
        assert!(matches!(engine.submit("  "), Err(SubmitError::Input(_))));
        assert_eq!(engine.state().unwrap(), &before);
    }

    #[test]
    fn victory_clears_snapshot() {
        let config = EngineConfig {
            max_level: 1,
            questions_per_level: 2,
            ..EngineConfig::default()
        }
        .instant();
        let mut engine = engine(config);
        engine.start_run(1).unwrap();
        assert!(engine.storage().raw().is_some());
        for _ in 0..2 {
            let answer = right(&engine);
            engine.submit(&answer).unwrap();
        }
        assert_eq!(engine.phase(), GamePhase::Victory);
        assert!(engine.storage().raw().is_none());
        assert!(engine.snapshot().is_none());
    }

    #[test]
    fn snapshots_follow_every_transition_and_menu_round_trip() {
        let mut engine = engine(EngineConfig::default().instant());
        engine.start_run(2).unwrap();
        let answer = right(&engine);
        engine.submit(&answer).unwrap();
        let saved = engine.storage().load().unwrap().unwrap();
        assert_eq!(saved.slot_index, 1);
        assert_eq!(saved.streak, 1);

        engine.return_to_menu();
        assert_eq!(engine.phase(), GamePhase::LevelSelect);
        assert!(engine.current_problem().is_none());

        engine.continue_run().unwrap();
        let state = engine.state().unwrap();
        assert_eq!((state.level, state.slot_index, state.streak), (2, 1, 1));
    }

    #[test]
    fn out_of_range_snapshot_starts_fresh() {
        let mut engine = engine(EngineConfig::default().instant());
        let state = engine.load_snapshot(Snapshot {
            level: 9,
            health: 2,
            slot_index: 0,
            streak: 0,
        });
        assert_eq!((state.level, state.health), (1, 5));
        assert!(state.current_problem.is_some());
    }

    #[test]
    fn failed_writes_disable_persistence() {
        let mut engine = ProgressionEngine::new(
            EngineConfig::default().instant(),
            7,
            MemorySnapshotStorage::read_only(),
        )
        .unwrap();
        engine.start_run(1).unwrap();
        assert!(!engine.persistence_enabled());
        let answer = right(&engine);
        assert!(engine.submit(&answer).unwrap().correct);
    }

    #[test]
    fn start_run_rejects_unknown_levels() {
        let mut engine = engine(EngineConfig::default());
        assert_eq!(
            engine.start_run(0).err(),
            Some(ProgressionError::LevelOutOfRange { level: 0, max: 5 })
        );
        assert_eq!(engine.continue_run().err(), Some(ProgressionError::NoSavedRun));
        assert!(matches!(
            engine.retry_level(),
            Err(ProgressionError::InvalidPhase { action: "retry", .. })
        ));
    }
}
