//! Centralized balance and tuning constants for Coinvault quiz logic.
//!
//! These values define the deterministic math for problem generation and
//! progression. Keeping them together ensures that difficulty can only be
//! adjusted via code changes reviewed in version control.

// Progression defaults -----------------------------------------------------
pub(crate) const DEFAULT_MAX_HEALTH: u8 = 5;
pub(crate) const DEFAULT_MAX_LEVEL: u8 = 5;
pub(crate) const DEFAULT_QUESTIONS_PER_LEVEL: u8 = 5;
pub(crate) const DEFAULT_FEVER_THRESHOLD: u8 = 3;
pub(crate) const DEFAULT_TRANSITION_MS: u64 = 1_200;
pub(crate) const FEVER_HEAL: u8 = 1;

// Config bounds ------------------------------------------------------------
pub(crate) const CONFIG_MAX_HEALTH_CAP: u8 = 20;
pub(crate) const CONFIG_MAX_LEVEL_CAP: u8 = 50;
pub(crate) const CONFIG_QUESTIONS_CAP: u8 = 20;
pub(crate) const CONFIG_TRANSITION_CAP_MS: u64 = 10_000;

// Answer tolerance ---------------------------------------------------------
pub(crate) const CURRENCY_ABSOLUTE_TOLERANCE: f64 = 1.0;
pub(crate) const CURRENCY_RELATIVE_TOLERANCE: f64 = 0.01;
pub(crate) const RATE_ABSOLUTE_TOLERANCE: f64 = 0.5;
pub(crate) const TIME_ABSOLUTE_TOLERANCE: f64 = 0.25;

// Sampling ranges ----------------------------------------------------------
/// Principal is drawn as `step * k` with `k` in the tier's multiplier range.
pub(crate) const PRINCIPAL_STEP: u32 = 1_000;
pub(crate) const HIGHEST_TIER: u8 = 5;

// Stream domain tags -------------------------------------------------------
pub(crate) const STREAM_DECK: &[u8] = b"deck";
pub(crate) const STREAM_PROBLEM: &[u8] = b"problem";

// Logging keys -------------------------------------------------------------
pub(crate) const LOG_TARGET: &str = "coinvault::progression";
