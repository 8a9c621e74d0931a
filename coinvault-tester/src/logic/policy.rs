use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use coinvault_game::{
    CalculatorSession, PlanLabel, PlanTerms, Problem, ProblemKind, Submission, Unknown,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Policy interface for simulated learners.
pub trait LearnerPolicy {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    /// Text typed into the answer box for `problem`.
    fn answer(&mut self, problem: &Problem) -> String;
}

/// Built-in learner behaviours.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LearnerStrategy {
    /// Works every answer on the calculator.
    Diligent,
    /// Like `Diligent`, but types whole units only.
    Rounder,
    /// Slips on a seeded fraction of questions.
    Careless,
    /// Types random numbers and labels.
    Guesser,
}

impl LearnerStrategy {
    pub const ALL: [Self; 4] = [Self::Diligent, Self::Rounder, Self::Careless, Self::Guesser];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Diligent => "Diligent",
            Self::Rounder => "Rounder",
            Self::Careless => "Careless",
            Self::Guesser => "Guesser",
        }
    }

    #[must_use]
    pub fn create_policy(self, seed: u64) -> Box<dyn LearnerPolicy + Send> {
        match self {
            Self::Diligent => Box::new(DiligentPolicy::default()),
            Self::Rounder => Box::new(RounderPolicy::default()),
            Self::Careless => Box::new(CarelessPolicy::new(seed, CARELESS_SLIP_RATE)),
            Self::Guesser => Box::new(GuesserPolicy::new(seed)),
        }
    }
}

impl fmt::Display for LearnerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LearnerStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "diligent" => Ok(Self::Diligent),
            "rounder" => Ok(Self::Rounder),
            "careless" => Ok(Self::Careless),
            "guesser" => Ok(Self::Guesser),
            other => bail!("unknown learner strategy: {other}"),
        }
    }
}

const CARELESS_SLIP_RATE: f64 = 0.2;
const TIME_SEARCH_LIMIT: u32 = 60;

fn growth(rate: f64, years: u32, n: u32) -> String {
    if n <= 1 {
        format!("(1+{rate}/100)^{years}")
    } else {
        format!("(1+{rate}/100/{n})^({n}*{years})")
    }
}

fn eval(calc: &mut CalculatorSession, expr: &str) -> Result<f64> {
    calc.clear();
    calc.push_str(expr)?;
    Ok(calc.evaluate()?)
}

fn required<T>(value: Option<T>, what: &str, problem: &Problem) -> Result<T> {
    match value {
        Some(v) => Ok(v),
        None => bail!(
            "{what} missing from {} problem at level {} slot {}",
            problem.kind,
            problem.level,
            problem.slot
        ),
    }
}

fn plan_total(
    calc: &mut CalculatorSession,
    plan: &PlanTerms,
    principal: f64,
    years: u32,
) -> Result<f64> {
    match plan.periods_per_year {
        None => eval(calc, &format!("{principal}*(1+{}/100*{years})", plan.rate_pct)),
        Some(n) => eval(calc, &format!("{principal}*{}", growth(plan.rate_pct, years, n))),
    }
}

/// Work a problem out on the calculator using only what it discloses.
///
/// # Errors
///
/// Returns an error if a needed value is missing or the calculator rejects an
/// expression.
pub fn solve_with_calculator(calc: &mut CalculatorSession, problem: &Problem) -> Result<Submission> {
    let k = problem.knowns;
    let n = k.periods_per_year;

    if problem.kind == ProblemKind::Comparison {
        let comparison = required(problem.comparison, "comparison", problem)?;
        let principal = required(k.principal, "principal", problem)?;
        let years = required(k.years, "years", problem)?;
        let a = plan_total(calc, &comparison.plan_a, principal, years)?;
        let b = plan_total(calc, &comparison.plan_b, principal, years)?;
        return Ok(Submission::Label(if a > b { PlanLabel::A } else { PlanLabel::B }));
    }

    let value = match problem.unknown {
        Unknown::Principal => {
            let a = required(k.amount, "amount", problem)?;
            let r = required(k.rate_pct, "rate", problem)?;
            let t = required(k.years, "years", problem)?;
            eval(calc, &format!("{a}/{}", growth(r, t, n)))?
        }
        Unknown::Rate => {
            let p = required(k.principal, "principal", problem)?;
            let a = required(k.amount, "amount", problem)?;
            let t = required(k.years, "years", problem)?;
            if n <= 1 {
                eval(calc, &format!("({t}√({a}/{p})-1)*100"))?
            } else {
                eval(calc, &format!("{n}*({}√({a}/{p})-1)*100", n.saturating_mul(t)))?
            }
        }
        Unknown::Time => {
            // Guess and check: the term is a whole number of years.
            let p = required(k.principal, "principal", problem)?;
            let r = required(k.rate_pct, "rate", problem)?;
            let a = required(k.amount, "amount", problem)?;
            let mut best = (0_u32, f64::INFINITY);
            for t in 1..=TIME_SEARCH_LIMIT {
                let gap = (eval(calc, &format!("{p}*{}", growth(r, t, n)))? - a).abs();
                if gap < best.1 {
                    best = (t, gap);
                }
            }
            f64::from(best.0)
        }
        Unknown::Interest | Unknown::Amount => {
            let p = required(k.principal, "principal", problem)?;
            let r = required(k.rate_pct, "rate", problem)?;
            let t = required(k.years, "years", problem)?;
            let amount = if problem.kind == ProblemKind::SimpleInterest {
                eval(calc, &format!("{p}*(1+{r}/100*{t})"))?
            } else {
                eval(calc, &format!("{p}*{}", growth(r, t, n)))?
            };
            if problem.unknown == Unknown::Interest {
                eval(calc, &format!("{amount}-{p}"))?
            } else {
                amount
            }
        }
        Unknown::Plan => bail!("plan answer requested for a {} problem", problem.kind),
    };
    Ok(Submission::Number(value))
}

fn render(submission: Submission, places: usize) -> String {
    match submission {
        Submission::Number(value) => format!("{value:.places$}"),
        Submission::Label(label) => label.as_str().to_string(),
    }
}

fn solve_or_blank(calc: &mut CalculatorSession, problem: &Problem) -> Option<Submission> {
    match solve_with_calculator(calc, problem) {
        Ok(submission) => Some(submission),
        Err(err) => {
            log::warn!("learner could not solve level {} slot {}: {err:#}", problem.level, problem.slot);
            None
        }
    }
}

#[derive(Debug, Default)]
struct DiligentPolicy {
    calc: CalculatorSession,
}

impl LearnerPolicy for DiligentPolicy {
    fn name(&self) -> &'static str {
        "Diligent"
    }

    fn answer(&mut self, problem: &Problem) -> String {
        solve_or_blank(&mut self.calc, problem).map_or_else(String::new, |s| render(s, 2))
    }
}

#[derive(Debug, Default)]
struct RounderPolicy {
    calc: CalculatorSession,
}

impl LearnerPolicy for RounderPolicy {
    fn name(&self) -> &'static str {
        "Rounder"
    }

    fn answer(&mut self, problem: &Problem) -> String {
        solve_or_blank(&mut self.calc, problem).map_or_else(String::new, |s| render(s, 0))
    }
}

/// A wrong but well-formed answer for `problem`.
fn slip(problem: &Problem, submission: Submission) -> String {
    match submission {
        Submission::Number(value) => {
            let skewed = if problem.unknown.is_currency() {
                value * 1.5 + 100.0
            } else {
                value + 5.0
            };
            format!("{skewed:.2}")
        }
        Submission::Label(PlanLabel::A) => PlanLabel::B.as_str().to_string(),
        Submission::Label(PlanLabel::B) => PlanLabel::A.as_str().to_string(),
    }
}

struct CarelessPolicy {
    calc: CalculatorSession,
    rng: ChaCha20Rng,
    slip_rate: f64,
}

impl CarelessPolicy {
    fn new(seed: u64, slip_rate: f64) -> Self {
        Self {
            calc: CalculatorSession::new(),
            rng: ChaCha20Rng::seed_from_u64(seed),
            slip_rate,
        }
    }
}

impl LearnerPolicy for CarelessPolicy {
    fn name(&self) -> &'static str {
        "Careless"
    }

    fn answer(&mut self, problem: &Problem) -> String {
        let Some(submission) = solve_or_blank(&mut self.calc, problem) else {
            return String::new();
        };
        if self.rng.gen_bool(self.slip_rate) {
            slip(problem, submission)
        } else {
            render(submission, 2)
        }
    }
}

struct GuesserPolicy {
    rng: ChaCha20Rng,
}

impl GuesserPolicy {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl LearnerPolicy for GuesserPolicy {
    fn name(&self) -> &'static str {
        "Guesser"
    }

    fn answer(&mut self, problem: &Problem) -> String {
        match problem.unknown {
            Unknown::Plan => {
                if self.rng.gen_bool(0.5) { "A" } else { "B" }.to_string()
            }
            Unknown::Rate => self.rng.gen_range(0_u32..=100).to_string(),
            Unknown::Time => self.rng.gen_range(0_u32..=80).to_string(),
            Unknown::Interest | Unknown::Amount | Unknown::Principal => {
                self.rng.gen_range(0_u32..=1_000_000).to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinvault_game::{ProblemGenerator, verify};

    fn sample_problems() -> Vec<Problem> {
        let generator = ProblemGenerator::new(1_337, 5);
        (1..=5)
            .flat_map(|level| (0..5).map(move |slot| (level, slot)))
            .map(|(level, slot)| generator.request_problem(level, slot, 0))
            .collect()
    }

    #[test]
    fn diligent_and_rounder_answer_correctly() {
        for strategy in [LearnerStrategy::Diligent, LearnerStrategy::Rounder] {
            let mut policy = strategy.create_policy(1);
            for problem in sample_problems() {
                let answer = policy.answer(&problem);
                assert!(
                    verify(&problem, &answer).unwrap().correct,
                    "{strategy} answered {answer} for {problem:?}"
                );
            }
        }
    }

    #[test]
    fn slips_are_always_wrong() {
        let mut calc = CalculatorSession::new();
        for problem in sample_problems() {
            let solved = solve_with_calculator(&mut calc, &problem).unwrap();
            let wrong = slip(&problem, solved);
            assert!(!verify(&problem, &wrong).unwrap().correct, "{wrong} for {problem:?}");
        }
    }

    #[test]
    fn guesser_is_seeded() {
        let problems = sample_problems();
        let mut a = LearnerStrategy::Guesser.create_policy(9);
        let mut b = LearnerStrategy::Guesser.create_policy(9);
        for problem in &problems {
            assert_eq!(a.answer(problem), b.answer(problem));
        }
    }

    #[test]
    fn strategies_parse_from_labels() {
        for strategy in LearnerStrategy::ALL {
            assert_eq!(strategy.label().parse::<LearnerStrategy>().unwrap(), strategy);
        }
        assert!("lazy".parse::<LearnerStrategy>().is_err());
    }
}
