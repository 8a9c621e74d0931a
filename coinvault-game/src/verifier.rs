//! Parsing and judging of submitted answers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::problem::{ExpectedAnswer, PlanLabel, Problem, Unknown};

/// Submissions rejected before comparison. These never cost health.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnswerInputError {
    #[error("answer is empty")]
    Empty,
    #[error("'{0}' is not a number")]
    NotANumber(String),
    #[error("'{0}' is not a finite number")]
    NotFinite(String),
    #[error("'{0}' is not a plan label; answer A or B")]
    UnknownLabel(String),
}

/// A parsed submission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Submission {
    Number(f64),
    Label(PlanLabel),
}

/// Outcome of comparing one submission to a problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgement {
    pub correct: bool,
    pub submitted: Submission,
    pub expected: ExpectedAnswer,
    pub explanation: String,
}

/// Parse a numeric answer. Thousands separators, whitespace, a leading `$`
/// and a trailing `%` are ignored.
///
/// # Errors
///
/// Returns [`AnswerInputError`] for empty, non-numeric, or non-finite text.
pub fn parse_number(text: &str) -> Result<f64, AnswerInputError> {
    let mut cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && *c != '_')
        .collect();
    if let Some(rest) = cleaned.strip_suffix('%') {
        cleaned = rest.to_string();
    }
    let (negative, unsigned) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    let unsigned = unsigned.strip_prefix('$').unwrap_or(unsigned);
    if unsigned.is_empty() {
        return Err(AnswerInputError::Empty);
    }
    if unsigned.starts_with(['-', '+']) {
        return Err(AnswerInputError::NotANumber(text.trim().to_string()));
    }
    if !unsigned
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.' || c.eq_ignore_ascii_case(&'e') || c == '-' || c == '+')
    {
        return if unsigned.eq_ignore_ascii_case("inf") || unsigned.eq_ignore_ascii_case("nan") {
            Err(AnswerInputError::NotFinite(text.trim().to_string()))
        } else {
            Err(AnswerInputError::NotANumber(text.trim().to_string()))
        };
    }
    let magnitude: f64 = unsigned
        .parse()
        .map_err(|_| AnswerInputError::NotANumber(text.trim().to_string()))?;
    if !magnitude.is_finite() {
        return Err(AnswerInputError::NotFinite(text.trim().to_string()));
    }
    Ok(if negative { -magnitude } else { magnitude })
}

/// Parse a submission for the given unknown quantity.
///
/// # Errors
///
/// Returns [`AnswerInputError`] when the text cannot be read as the expected
/// kind of answer.
pub fn parse_answer(text: &str, unknown: Unknown) -> Result<Submission, AnswerInputError> {
    if text.trim().is_empty() {
        return Err(AnswerInputError::Empty);
    }
    if unknown == Unknown::Plan {
        return text
            .parse::<PlanLabel>()
            .map(Submission::Label)
            .map_err(|()| AnswerInputError::UnknownLabel(text.trim().to_string()));
    }
    parse_number(text).map(Submission::Number)
}

/// Judge a submission against a problem.
///
/// # Errors
///
/// Returns [`AnswerInputError`] if the submission cannot be parsed; nothing is
/// judged in that case.
pub fn verify(problem: &Problem, text: &str) -> Result<Judgement, AnswerInputError> {
    let submitted = parse_answer(text, problem.unknown)?;
    let correct = match (problem.expected, submitted) {
        (ExpectedAnswer::Number(expected), Submission::Number(value)) => {
            problem.tolerance.accepts(expected, value)
        }
        (ExpectedAnswer::Label(expected), Submission::Label(label)) => expected == label,
        _ => false,
    };
    Ok(Judgement {
        correct,
        submitted,
        expected: problem.expected,
        explanation: problem.explanation.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{Knowns, ProblemKind, Tolerance};

    fn numeric_problem(kind: ProblemKind, unknown: Unknown, expected: f64) -> Problem {
        Problem {
            kind,
            level: 1,
            slot: 0,
            narrative: String::new(),
            knowns: Knowns::default(),
            unknown,
            expected: ExpectedAnswer::Number(expected),
            tolerance: Tolerance::for_unknown(unknown),
            explanation: "worked solution".to_string(),
            comparison: None,
        }
    }

    #[test]
    fn annual_amount_tolerance() {
        let problem = numeric_problem(ProblemKind::CompoundAnnual, Unknown::Amount, 11_576.25);
        assert!(verify(&problem, "11576").unwrap().correct);
        assert!(verify(&problem, "$11,576.25").unwrap().correct);
        let miss = verify(&problem, "11000").unwrap();
        assert!(!miss.correct);
        assert_eq!(miss.explanation, "worked solution");
        assert_eq!(miss.expected, ExpectedAnswer::Number(11_576.25));
    }

    #[test]
    fn reverse_rate_tolerance() {
        let problem = numeric_problem(ProblemKind::ReverseSolve, Unknown::Rate, 6.0);
        assert!(verify(&problem, "6.2").unwrap().correct);
        assert!(verify(&problem, "6.2%").unwrap().correct);
        assert!(!verify(&problem, "8").unwrap().correct);
    }

    #[test]
    fn time_tolerance_is_tight() {
        let problem = numeric_problem(ProblemKind::ReverseSolve, Unknown::Time, 7.0);
        assert!(verify(&problem, "7").unwrap().correct);
        assert!(!verify(&problem, "7.5").unwrap().correct);
    }

    #[test]
    fn plan_labels() {
        let mut problem = numeric_problem(ProblemKind::Comparison, Unknown::Plan, 0.0);
        problem.expected = ExpectedAnswer::Label(PlanLabel::B);
        problem.tolerance = Tolerance::exact();
        assert!(verify(&problem, "b").unwrap().correct);
        assert!(verify(&problem, "Plan B").unwrap().correct);
        assert!(!verify(&problem, "plan a").unwrap().correct);
        assert_eq!(
            verify(&problem, "c"),
            Err(AnswerInputError::UnknownLabel("c".to_string()))
        );
    }

    #[test]
    fn unparseable_input_is_rejected_before_judging() {
        let problem = numeric_problem(ProblemKind::SimpleInterest, Unknown::Interest, 100.0);
        assert_eq!(verify(&problem, "   "), Err(AnswerInputError::Empty));
        assert_eq!(verify(&problem, "$"), Err(AnswerInputError::Empty));
        assert!(matches!(
            verify(&problem, "ten"),
            Err(AnswerInputError::NotANumber(_))
        ));
        assert!(matches!(
            verify(&problem, "inf"),
            Err(AnswerInputError::NotFinite(_))
        ));
        assert!(matches!(
            verify(&problem, "1e999"),
            Err(AnswerInputError::NotFinite(_))
        ));
    }

    #[test]
    fn number_parsing_normalizes_decorations() {
        assert!((parse_number(" 1,234.50 ").unwrap() - 1_234.5).abs() < 1e-12);
        assert!((parse_number("-$12").unwrap() + 12.0).abs() < 1e-12);
        assert!((parse_number("5.5%").unwrap() - 5.5).abs() < 1e-12);
        assert!((parse_number("+7").unwrap() - 7.0).abs() < 1e-12);
        assert!((parse_number("1e-2").unwrap() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn stacked_signs_are_not_numbers() {
        for text in ["+-5", "--5", "-+5", "-$-5", "++5"] {
            assert!(
                matches!(parse_number(text), Err(AnswerInputError::NotANumber(_))),
                "{text}"
            );
        }
        let problem = numeric_problem(ProblemKind::SimpleInterest, Unknown::Interest, 5.0);
        assert!(verify(&problem, "--5").is_err());
    }

    #[test]
    fn verifier_is_reflexive() {
        for (unknown, expected) in [
            (Unknown::Interest, 1_500.0),
            (Unknown::Amount, 11_576.25),
            (Unknown::Principal, 5_000.0),
            (Unknown::Rate, 6.0),
            (Unknown::Time, 4.0),
        ] {
            let problem = numeric_problem(ProblemKind::ReverseSolve, unknown, expected);
            let text = problem.expected.to_string();
            assert!(verify(&problem, &text).unwrap().correct, "{unknown}: {text}");
        }
    }

    #[test]
    fn tolerance_is_monotonic() {
        for (unknown, expected) in [
            (Unknown::Amount, 11_576.25),
            (Unknown::Principal, 40.0),
            (Unknown::Rate, 6.0),
            (Unknown::Time, 4.0),
        ] {
            let tolerance = Tolerance::for_unknown(unknown);
            let margin = tolerance.margin_for(expected);
            for sign in [1.0, -1.0] {
                let mut rejected = false;
                for step in 0..400_u32 {
                    let offset = sign * margin * f64::from(step) / 100.0;
                    let accepted = tolerance.accepts(expected, expected + offset);
                    if rejected {
                        assert!(!accepted, "{unknown} accepted again at offset {offset}");
                    }
                    rejected |= !accepted;
                }
                assert!(rejected, "{unknown} never rejected");
                assert!(tolerance.accepts(expected, expected + sign * margin * 0.99));
            }
        }
    }
}
