//! Problem data model shared by the generator, verifier and progression.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{
    CURRENCY_ABSOLUTE_TOLERANCE, CURRENCY_RELATIVE_TOLERANCE, RATE_ABSOLUTE_TOLERANCE,
    TIME_ABSOLUTE_TOLERANCE,
};
use crate::finance::{compound_amount, simple_interest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemKind {
    SimpleInterest,
    CompoundAnnual,
    CompoundPeriodic,
    ReverseSolve,
    Comparison,
}

impl ProblemKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SimpleInterest => "simple_interest",
            Self::CompoundAnnual => "compound_annual",
            Self::CompoundPeriodic => "compound_periodic",
            Self::ReverseSolve => "reverse_solve",
            Self::Comparison => "comparison",
        }
    }
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The quantity a learner must supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unknown {
    Interest,
    Amount,
    Principal,
    Rate,
    Time,
    Plan,
}

impl Unknown {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Interest => "interest",
            Self::Amount => "amount",
            Self::Principal => "principal",
            Self::Rate => "rate",
            Self::Time => "time",
            Self::Plan => "plan",
        }
    }

    #[must_use]
    pub const fn is_currency(self) -> bool {
        matches!(self, Self::Interest | Self::Amount | Self::Principal)
    }
}

impl fmt::Display for Unknown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label of one plan in a comparison problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanLabel {
    A,
    B,
}

impl PlanLabel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

impl fmt::Display for PlanLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanLabel {
    type Err = ();

    /// Accepts `a`, `plan a`, `Plan-A` and the like, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match cleaned.strip_prefix("plan").unwrap_or(cleaned.as_str()) {
            "a" => Ok(Self::A),
            "b" => Ok(Self::B),
            _ => Err(()),
        }
    }
}

/// Values disclosed to the learner. Absent fields are either the unknown or
/// irrelevant to the problem's kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Knowns {
    pub principal: Option<f64>,
    pub rate_pct: Option<f64>,
    pub years: Option<u32>,
    pub periods_per_year: u32,
    pub amount: Option<f64>,
}

/// The correct answer for a problem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedAnswer {
    Number(f64),
    Label(PlanLabel),
}

impl ExpectedAnswer {
    #[must_use]
    pub const fn as_number(self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(value),
            Self::Label(_) => None,
        }
    }

    #[must_use]
    pub const fn as_label(self) -> Option<PlanLabel> {
        match self {
            Self::Label(label) => Some(label),
            Self::Number(_) => None,
        }
    }
}

impl fmt::Display for ExpectedAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{}", crate::numbers::format_trimmed(*value, 2)),
            Self::Label(label) => write!(f, "Plan {label}"),
        }
    }
}

/// Acceptance band around an expected numeric answer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub absolute: f64,
    pub relative: f64,
}

impl Tolerance {
    #[must_use]
    pub const fn exact() -> Self {
        Self {
            absolute: 0.0,
            relative: 0.0,
        }
    }

    /// Band used for a given unknown quantity.
    #[must_use]
    pub const fn for_unknown(unknown: Unknown) -> Self {
        match unknown {
            Unknown::Interest | Unknown::Amount | Unknown::Principal => Self {
                absolute: CURRENCY_ABSOLUTE_TOLERANCE,
                relative: CURRENCY_RELATIVE_TOLERANCE,
            },
            Unknown::Rate => Self {
                absolute: RATE_ABSOLUTE_TOLERANCE,
                relative: 0.0,
            },
            Unknown::Time => Self {
                absolute: TIME_ABSOLUTE_TOLERANCE,
                relative: 0.0,
            },
            Unknown::Plan => Self::exact(),
        }
    }

    /// Largest accepted distance from `expected`.
    #[must_use]
    pub fn margin_for(&self, expected: f64) -> f64 {
        self.absolute.max(self.relative * expected.abs())
    }

    #[must_use]
    pub fn accepts(&self, expected: f64, submitted: f64) -> bool {
        (submitted - expected).abs() <= self.margin_for(expected)
    }
}

/// Terms of one savings plan in a comparison problem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanTerms {
    pub label: PlanLabel,
    pub rate_pct: f64,
    /// `None` for simple interest, otherwise the compounding frequency.
    pub periods_per_year: Option<u32>,
    /// Amount at maturity, rounded to cents.
    pub amount: f64,
}

impl PlanTerms {
    #[must_use]
    pub const fn is_simple(&self) -> bool {
        self.periods_per_year.is_none()
    }

    /// Unrounded maturity amount for the shared principal and term.
    #[must_use]
    pub fn raw_amount(&self, principal: f64, years: u32) -> f64 {
        match self.periods_per_year {
            None => principal + simple_interest(principal, self.rate_pct, years),
            Some(n) => compound_amount(principal, self.rate_pct, years, n),
        }
    }
}

/// Both plans of a comparison problem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanComparison {
    pub plan_a: PlanTerms,
    pub plan_b: PlanTerms,
}

impl PlanComparison {
    #[must_use]
    pub fn winner(&self) -> PlanLabel {
        if self.plan_a.amount >= self.plan_b.amount {
            PlanLabel::A
        } else {
            PlanLabel::B
        }
    }

    #[must_use]
    pub const fn plan(&self, label: PlanLabel) -> &PlanTerms {
        match label {
            PlanLabel::A => &self.plan_a,
            PlanLabel::B => &self.plan_b,
        }
    }
}

/// One fully specified question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub kind: ProblemKind,
    pub level: u8,
    pub slot: u8,
    pub narrative: String,
    pub knowns: Knowns,
    pub unknown: Unknown,
    pub expected: ExpectedAnswer,
    pub tolerance: Tolerance,
    pub explanation: String,
    #[serde(default)]
    pub comparison: Option<PlanComparison>,
}

impl Problem {
    #[must_use]
    pub fn expected_number(&self) -> Option<f64> {
        self.expected.as_number()
    }

    /// Whether the problem discloses the outcome and hides an input.
    #[must_use]
    pub const fn is_reverse(&self) -> bool {
        matches!(self.kind, ProblemKind::ReverseSolve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_labels_parse_loosely() {
        assert_eq!("a".parse::<PlanLabel>(), Ok(PlanLabel::A));
        assert_eq!("Plan B".parse::<PlanLabel>(), Ok(PlanLabel::B));
        assert_eq!(" plan-a ".parse::<PlanLabel>(), Ok(PlanLabel::A));
        assert!("c".parse::<PlanLabel>().is_err());
        assert!("".parse::<PlanLabel>().is_err());
    }

    #[test]
    fn currency_band_uses_larger_of_floor_and_relative() {
        let tol = Tolerance::for_unknown(Unknown::Amount);
        assert!((tol.margin_for(50.0) - 1.0).abs() < f64::EPSILON);
        assert!((tol.margin_for(11_576.25) - 115.7625).abs() < 1e-9);
    }

    #[test]
    fn rate_and_time_bands_are_absolute() {
        let rate = Tolerance::for_unknown(Unknown::Rate);
        assert!(rate.accepts(6.0, 6.2));
        assert!(!rate.accepts(6.0, 8.0));
        let time = Tolerance::for_unknown(Unknown::Time);
        assert!(time.accepts(4.0, 4.2));
        assert!(!time.accepts(4.0, 4.5));
    }

    #[test]
    fn comparison_winner_prefers_larger_amount() {
        let comparison = PlanComparison {
            plan_a: PlanTerms {
                label: PlanLabel::A,
                rate_pct: 6.0,
                periods_per_year: None,
                amount: 13_000.0,
            },
            plan_b: PlanTerms {
                label: PlanLabel::B,
                rate_pct: 5.0,
                periods_per_year: Some(12),
                amount: 12_833.59,
            },
        };
        assert_eq!(comparison.winner(), PlanLabel::A);
        assert!(comparison.plan(PlanLabel::A).is_simple());
        assert!(!comparison.plan(PlanLabel::B).is_simple());
    }
}
