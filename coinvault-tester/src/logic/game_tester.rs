use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result, bail};
use coinvault_game::{
    EngineConfig, FeverEvent, GamePhase, MemorySnapshotStorage, Problem, ProblemKind, QuizEngine,
    Snapshot, SnapshotStorage, SubmitError, Transition, Unknown, replay_code,
};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::logic::policy::LearnerStrategy;
use crate::logic::storage::JsonFileStorage;

const DEFAULT_MAX_TURNS: u32 = 400;

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

type BoxedStorage = Box<dyn SnapshotStorage>;

/// Declarative plan for one simulated learner session.
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub strategy: LearnerStrategy,
    pub start_level: u8,
    pub max_turns: Option<u32>,
    /// Overrides the tester's engine config for this plan.
    pub config: Option<EngineConfig>,
    pub retry_on_defeat: bool,
    /// Leave for the menu and reopen the saved session every `n` answers.
    pub resume_every: Option<u32>,
    pub expectations: Vec<SimulationExpectation>,
}

impl SimulationPlan {
    #[must_use]
    pub const fn new(strategy: LearnerStrategy) -> Self {
        Self {
            strategy,
            start_level: 1,
            max_turns: None,
            config: None,
            retry_on_defeat: false,
            resume_every: None,
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_start_level(mut self, level: u8) -> Self {
        self.start_level = level;
        self
    }

    #[must_use]
    pub const fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub const fn retrying(mut self) -> Self {
        self.retry_on_defeat = true;
        self
    }

    #[must_use]
    pub const fn resuming_every(mut self, answers: u32) -> Self {
        self.resume_every = Some(answers);
        self
    }

    #[must_use]
    pub fn with_expectation(mut self, expectation: impl Into<SimulationExpectation>) -> Self {
        self.expectations.push(expectation.into());
        self
    }
}

/// Assertion hook run after a simulation completes.
type SimulationExpectationFn =
    Arc<dyn Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static>;

#[derive(Clone)]
pub struct SimulationExpectation(SimulationExpectationFn);

impl std::fmt::Debug for SimulationExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationExpectation").finish()
    }
}

impl SimulationExpectation {
    #[must_use]
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// # Errors
    ///
    /// Returns the expectation's failure message.
    pub fn evaluate(&self, summary: &SimulationSummary) -> Result<()> {
        (self.0)(summary)
    }
}

impl<F> From<F> for SimulationExpectation
where
    F: Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self(Arc::new(f))
    }
}

/// One answer typed by the learner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnRecord {
    pub level: u8,
    pub slot: u8,
    pub kind: ProblemKind,
    pub unknown: Unknown,
    pub answer: String,
    /// `None` when the engine rejected the text before judging it.
    pub correct: Option<bool>,
    pub transition: Option<Transition>,
    pub fever: Option<FeverEvent>,
}

/// Counters gathered while a session plays out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunMetrics {
    pub correct: u32,
    pub incorrect: u32,
    pub input_errors: u32,
    pub levels_cleared: Vec<u8>,
    pub defeats: u32,
    pub retries: u32,
    pub fever_ignitions: u32,
    pub fever_pulses: u32,
    pub health_healed: u32,
    pub transitions: u32,
    pub resumes: u32,
    pub max_streak: u8,
}

impl RunMetrics {
    fn record(&mut self, correct: bool, transition: Transition, fever: FeverEvent) {
        if correct {
            self.correct += 1;
        } else {
            self.incorrect += 1;
        }
        match fever {
            FeverEvent::Ignited => self.fever_ignitions += 1,
            FeverEvent::Pulse { healed } => {
                self.fever_pulses += 1;
                self.health_healed += u32::from(healed);
            }
            FeverEvent::None | FeverEvent::Broken => {}
        }
        match transition {
            Transition::LevelComplete { cleared, .. } => self.levels_cleared.push(cleared),
            Transition::Defeated { .. } => self.defeats += 1,
            Transition::NextQuestion { .. } | Transition::Victory | Transition::Retry { .. } => {}
        }
    }

    #[must_use]
    pub const fn answered(&self) -> u32 {
        self.correct + self.incorrect
    }
}

/// Complete record of a simulation run.
#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub seed: u64,
    pub run_code: Option<String>,
    pub strategy: LearnerStrategy,
    pub start_level: u8,
    pub max_level: u8,
    pub turns: Vec<TurnRecord>,
    pub metrics: RunMetrics,
    pub final_phase: GamePhase,
    pub final_level: Option<u8>,
    pub final_health: Option<u8>,
    /// Snapshot left in storage when the session ended.
    pub saved: Option<Snapshot>,
    /// SHA-256 over every dealt problem and verdict, hex encoded.
    pub fingerprint: String,
}

impl SimulationSummary {
    #[must_use]
    pub fn victorious(&self) -> bool {
        self.final_phase == GamePhase::Victory
    }

    /// Whether the run finished in victory or defeat rather than hitting the
    /// turn limit.
    #[must_use]
    pub fn ended(&self) -> bool {
        matches!(self.final_phase, GamePhase::Victory | GamePhase::Defeated)
    }
}

/// Headless deterministic runner for the quiz engine.
#[derive(Debug, Clone)]
pub struct GameTester {
    verbose: bool,
    config: EngineConfig,
    scratch_dir: PathBuf,
}

impl GameTester {
    #[must_use]
    pub fn new(config: EngineConfig, verbose: bool) -> Self {
        Self {
            verbose,
            config,
            scratch_dir: std::env::temp_dir(),
        }
    }

    #[must_use]
    pub const fn verbose(&self) -> bool {
        self.verbose
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn session_path(&self, plan: &SimulationPlan, seed: u64) -> PathBuf {
        let run = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.scratch_dir.join(format!(
            "coinvault-session-{}-{run}-{}-{seed}.json",
            std::process::id(),
            plan.strategy.label().to_ascii_lowercase()
        ))
    }

    fn open_storage(path: Option<&PathBuf>) -> BoxedStorage {
        match path {
            Some(path) => Box::new(JsonFileStorage::new(path)),
            None => Box::new(MemorySnapshotStorage::new()),
        }
    }

    /// Play `plan` against a fresh engine seeded with `seed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine refuses the plan's config or start
    /// level, or reaches a state a learner cannot act on.
    pub fn run_plan(&self, plan: &SimulationPlan, seed: u64) -> Result<SimulationSummary> {
        let config = plan.config.clone().unwrap_or_else(|| self.config.clone());
        let max_turns = plan.max_turns.unwrap_or(DEFAULT_MAX_TURNS) as usize;
        let session_path = plan.resume_every.map(|_| self.session_path(plan, seed));
        if let Some(path) = &session_path {
            JsonFileStorage::new(path).clear()?;
        }

        let mut engine =
            QuizEngine::new(config.clone(), seed, Self::open_storage(session_path.as_ref()))
                .context("building engine")?;
        engine
            .start_run(plan.start_level)
            .with_context(|| format!("starting at level {}", plan.start_level))?;

        let mut policy = plan.strategy.create_policy(seed);
        if self.verbose {
            println!(
                "🎮 Starting simulation | seed:{seed} code:{} learner:{} level:{}",
                replay_code(seed).as_deref().unwrap_or("-"),
                policy.name(),
                plan.start_level
            );
        }
        let mut metrics = RunMetrics::default();
        let mut turns: Vec<TurnRecord> = Vec::new();
        let mut hasher = Sha256::new();

        while turns.len() < max_turns {
            match engine.progression().phase() {
                GamePhase::Playing => {}
                GamePhase::Transitioning { .. } => {
                    metrics.transitions += 1;
                    if engine.advance(config.transition_duration()).is_none() {
                        bail!("transition did not finish after its full duration");
                    }
                    continue;
                }
                GamePhase::Defeated if plan.retry_on_defeat => {
                    engine.progression_mut().retry_level()?;
                    metrics.retries += 1;
                    continue;
                }
                GamePhase::Defeated | GamePhase::Victory => break,
                GamePhase::LevelSelect => bail!("run dropped back to level select"),
            }

            let problem = engine
                .progression()
                .current_problem()
                .cloned()
                .context("playing without a problem")?;
            hash_problem(&mut hasher, &problem);
            let answer = policy.answer(&problem);

            let mut record = TurnRecord {
                level: problem.level,
                slot: problem.slot,
                kind: problem.kind,
                unknown: problem.unknown,
                answer,
                correct: None,
                transition: None,
                fever: None,
            };
            match engine.submit_answer(&record.answer) {
                Ok(verdict) => {
                    metrics.record(verdict.correct, verdict.transition, verdict.fever);
                    hasher.update(format!("{:?}|{:?}", verdict.transition, verdict.fever));
                    record.correct = Some(verdict.correct);
                    record.transition = Some(verdict.transition);
                    record.fever = Some(verdict.fever);
                }
                Err(SubmitError::Input(err)) => {
                    metrics.input_errors += 1;
                    log::debug!("learner input rejected: {err}");
                }
                Err(err) => return Err(err.into()),
            }
            if let Some(state) = engine.progression().state() {
                metrics.max_streak = metrics.max_streak.max(state.streak);
            }
            if self.verbose {
                log_turn(&record);
            }
            turns.push(record);

            let due = plan
                .resume_every
                .is_some_and(|every| every > 0 && turns.len() % every as usize == 0);
            let resumable = matches!(
                engine.progression().phase(),
                GamePhase::Playing | GamePhase::Transitioning { .. }
            );
            if due && resumable {
                engine.return_to_menu();
                engine = QuizEngine::new(
                    config.clone(),
                    seed,
                    Self::open_storage(session_path.as_ref()),
                )?;
                engine.resume_or_start().context("reopening saved session")?;
                metrics.resumes += 1;
            }
        }

        let final_state = engine.progression().state();
        let summary = SimulationSummary {
            seed,
            run_code: replay_code(seed),
            strategy: plan.strategy,
            start_level: plan.start_level,
            max_level: config.max_level,
            final_phase: engine.progression().phase(),
            final_level: final_state.map(|s| s.level),
            final_health: final_state.map(|s| s.health),
            saved: engine.progression().saved_snapshot(),
            fingerprint: hex_digest(hasher),
            turns,
            metrics,
        };

        if let Some(path) = &session_path {
            JsonFileStorage::new(path).clear()?;
        }
        if self.verbose {
            println!(
                "🏁 Simulation ended: {} after {} answers",
                summary.final_phase,
                summary.turns.len()
            );
        }
        Ok(summary)
    }
}

fn hash_problem(hasher: &mut Sha256, problem: &Problem) {
    hasher.update([problem.level, problem.slot]);
    hasher.update(problem.narrative.as_bytes());
    hasher.update(problem.expected.to_string().as_bytes());
}

fn hex_digest(hasher: Sha256) -> String {
    let mut out = String::with_capacity(64);
    for byte in hasher.finalize() {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn log_turn(record: &TurnRecord) {
    let verdict = match record.correct {
        Some(true) => "✅",
        Some(false) => "❌",
        None => "⚠️",
    };
    println!(
        "🎯 L{} Q{} {} ({}): {:?} {verdict} {:?}",
        record.level,
        record.slot + 1,
        record.kind,
        record.unknown,
        record.answer,
        record.transition
    );
}
