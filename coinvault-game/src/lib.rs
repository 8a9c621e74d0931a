//! Coinvault Quiz Engine
//!
//! Platform-agnostic core for the Coinvault compound-interest quiz.
//! This crate generates finance problems, judges answers, drives run
//! progression and hosts the in-game calculator without any rendering
//! dependencies.

pub mod calculator;
pub mod config;
pub mod constants;
pub mod finance;
pub mod generator;
pub mod numbers;
pub mod problem;
pub mod progression;
pub mod seed;
pub mod state;
pub mod storage;
pub mod verifier;

use anyhow::Context;
use std::path::Path;
use std::time::Duration;

// Re-export commonly used types
pub use calculator::{CalcToken, CalculatorSession, EvalError, TokenBuffer, tokenize};
pub use config::{ConfigError, EngineConfig};
pub use generator::{ProblemGenerator, SlotDeck, SlotShape, tier_for_level};
pub use problem::{
    ExpectedAnswer, Knowns, PlanComparison, PlanLabel, PlanTerms, Problem, ProblemKind, Tolerance,
    Unknown,
};
pub use progression::{
    FeverEvent, ProgressionEngine, ProgressionError, SubmitError, Transition, Verdict,
};
pub use seed::{decode_run_code, encode_run_code, generate_run_code, parse_seed, replay_code};
pub use state::{GamePhase, RunState, Snapshot, TransitionCause};
pub use storage::{MemorySnapshotStorage, SnapshotStorage, StorageError};
pub use verifier::{AnswerInputError, Judgement, Submission, parse_answer, verify};

/// Load and validate an engine config from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the config is invalid.
pub fn load_config(path: &Path) -> anyhow::Result<EngineConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    EngineConfig::from_json(&raw).with_context(|| format!("parsing config {}", path.display()))
}

/// Boundary used by the presentation layer: one run plus its calculator.
#[derive(Debug)]
pub struct QuizEngine<S: SnapshotStorage> {
    progression: ProgressionEngine<S>,
    calculator: CalculatorSession,
}

impl<S: SnapshotStorage> QuizEngine<S> {
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` fails validation.
    pub fn new(config: EngineConfig, seed: u64, storage: S) -> Result<Self, ConfigError> {
        Ok(Self {
            progression: ProgressionEngine::new(config, seed, storage)?,
            calculator: CalculatorSession::new(),
        })
    }

    /// Build an engine from a run code or decimal seed.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is not recognised or the config is invalid.
    pub fn from_run_code(code: &str, config: EngineConfig, storage: S) -> anyhow::Result<Self> {
        let seed =
            parse_seed(code).with_context(|| format!("'{code}' is not a run code or seed"))?;
        Self::new(config, seed, storage).context("invalid engine config")
    }

    #[must_use]
    pub const fn progression(&self) -> &ProgressionEngine<S> {
        &self.progression
    }

    pub const fn progression_mut(&mut self) -> &mut ProgressionEngine<S> {
        &mut self.progression
    }

    #[must_use]
    pub const fn calculator(&self) -> &CalculatorSession {
        &self.calculator
    }

    pub const fn calculator_mut(&mut self) -> &mut CalculatorSession {
        &mut self.calculator
    }

    /// The active problem when the run is on `(level, slot)`, otherwise a
    /// preview of that slot. Never touches the run.
    #[must_use]
    pub fn request_problem(&self, level: u8, slot: u8) -> Problem {
        self.progression.request_problem(level, slot)
    }

    /// # Errors
    ///
    /// Returns [`ProgressionError::LevelOutOfRange`] for unknown levels.
    pub fn start_run(&mut self, level: u8) -> Result<&Problem, ProgressionError> {
        self.calculator.reset();
        self.progression.start_run(level)
    }

    /// Continue the saved run, or start at level 1 when there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if neither path yields a problem.
    pub fn resume_or_start(&mut self) -> anyhow::Result<&Problem> {
        self.calculator.reset();
        if self.progression.saved_snapshot().is_some() {
            return self.progression.continue_run().context("continuing saved run");
        }
        self.progression.start_run(1).context("starting new run")
    }

    /// # Errors
    ///
    /// See [`ProgressionEngine::submit`].
    pub fn submit_answer(&mut self, text: &str) -> Result<Verdict, SubmitError> {
        self.progression.submit(text)
    }

    pub fn advance(&mut self, elapsed: Duration) -> Option<&Problem> {
        self.progression.advance(elapsed)
    }

    pub fn skip_transition(&mut self) -> Option<&Problem> {
        self.progression.skip_transition()
    }

    /// Load `tokens` into the calculator and evaluate them.
    ///
    /// # Errors
    ///
    /// Returns the [`EvalError`] for malformed expressions; the run is never
    /// affected.
    pub fn evaluate_expression(&mut self, tokens: &[CalcToken]) -> Result<f64, EvalError> {
        self.calculator.replace_buffer(tokens);
        self.calculator.evaluate()
    }

    #[must_use]
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.progression.snapshot()
    }

    pub fn load_snapshot(&mut self, snapshot: Snapshot) -> &RunState {
        self.calculator.reset();
        self.progression.load_snapshot(snapshot)
    }

    pub fn return_to_menu(&mut self) {
        self.progression.return_to_menu();
    }
}
