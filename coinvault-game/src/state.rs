use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::problem::Problem;

/// Why the engine is between questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    NextQuestion,
    LevelComplete { cleared: u8 },
}

/// Top-level phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    #[default]
    LevelSelect,
    Playing,
    Transitioning {
        remaining: Duration,
        cause: TransitionCause,
    },
    Defeated,
    Victory,
}

impl GamePhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LevelSelect => "level_select",
            Self::Playing => "playing",
            Self::Transitioning { .. } => "transitioning",
            Self::Defeated => "defeated",
            Self::Victory => "victory",
        }
    }

    #[must_use]
    pub const fn accepts_answers(self) -> bool {
        matches!(self, Self::Playing)
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Victory)
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted progress: a flat record of four small integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub level: u8,
    pub health: u8,
    pub slot_index: u8,
    pub streak: u8,
}

impl Snapshot {
    /// Whether every field lies inside the ranges `config` allows.
    #[must_use]
    pub fn is_valid_for(&self, config: &EngineConfig) -> bool {
        (1..=config.max_level).contains(&self.level)
            && (1..=config.max_health).contains(&self.health)
            && self.slot_index < config.questions_per_level
            && self.streak <= config.fever_threshold
    }
}

/// Mutable state of the run in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub level: u8,
    pub health: u8,
    pub streak: u8,
    pub fever_active: bool,
    pub slot_index: u8,
    #[serde(default)]
    pub current_problem: Option<Problem>,
    #[serde(default)]
    pub phase: GamePhase,
}

impl RunState {
    /// Full health at the first slot of `level`.
    #[must_use]
    pub const fn fresh(level: u8, config: &EngineConfig) -> Self {
        Self {
            level,
            health: config.max_health,
            streak: 0,
            fever_active: false,
            slot_index: 0,
            current_problem: None,
            phase: GamePhase::Playing,
        }
    }

    /// Rebuild from a snapshot; fever is derived from the streak.
    #[must_use]
    pub const fn from_snapshot(snapshot: Snapshot, config: &EngineConfig) -> Self {
        Self {
            level: snapshot.level,
            health: snapshot.health,
            streak: snapshot.streak,
            fever_active: snapshot.streak >= config.fever_threshold,
            slot_index: snapshot.slot_index,
            current_problem: None,
            phase: GamePhase::Playing,
        }
    }

    #[must_use]
    pub const fn snapshot(&self) -> Snapshot {
        Snapshot {
            level: self.level,
            health: self.health,
            slot_index: self.slot_index,
            streak: self.streak,
        }
    }

    pub const fn break_streak(&mut self) {
        self.streak = 0;
        self.fever_active = false;
    }
}
