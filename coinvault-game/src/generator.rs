//! Problem generation.
//!
//! Every problem is built forward: inputs are drawn from the level's tier
//! ranges, the outcome is computed with the identities in [`crate::finance`],
//! and reverse problems then hide one of the drawn inputs while disclosing the
//! rounded outcome. The expected answer is therefore always a value that was
//! drawn or computed directly, never one recovered by inverting a formula.

use hmac::{Hmac, Mac};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use smallvec::SmallVec;

use crate::constants::{HIGHEST_TIER, PRINCIPAL_STEP, STREAM_DECK, STREAM_PROBLEM};
use crate::finance::{compound_amount, frequency_label, growth_factor, simple_interest};
use crate::numbers::{format_currency, format_trimmed, round_to_cents, round_to_units};
use crate::problem::{
    ExpectedAnswer, Knowns, PlanComparison, PlanLabel, PlanTerms, Problem, ProblemKind, Tolerance,
    Unknown,
};

/// Shape of a single question slot within a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotShape {
    SimpleInterest,
    SimpleAmount,
    CompoundAmount,
    CompoundInterest,
    PeriodicAmount,
    FindPrincipal,
    FindRate,
    FindTime,
    Comparison,
}

impl SlotShape {
    #[must_use]
    pub const fn kind(self) -> ProblemKind {
        match self {
            Self::SimpleInterest | Self::SimpleAmount => ProblemKind::SimpleInterest,
            Self::CompoundAmount | Self::CompoundInterest => ProblemKind::CompoundAnnual,
            Self::PeriodicAmount => ProblemKind::CompoundPeriodic,
            Self::FindPrincipal | Self::FindRate | Self::FindTime => ProblemKind::ReverseSolve,
            Self::Comparison => ProblemKind::Comparison,
        }
    }
}

/// Ordered slot shapes for one level.
pub type SlotDeck = SmallVec<[SlotShape; 8]>;

/// Inclusive sampling bounds for one difficulty tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TierRanges {
    principal_steps: (u32, u32),
    rate_pct: (u32, u32),
    years: (u32, u32),
    frequencies: &'static [u32],
}

// Lower bounds are all positive: a zero rate, term or principal would make the
// reverse problems degenerate.
const TIERS: [TierRanges; HIGHEST_TIER as usize] = [
    TierRanges {
        principal_steps: (1, 10),
        rate_pct: (2, 8),
        years: (1, 5),
        frequencies: &[1],
    },
    TierRanges {
        principal_steps: (1, 20),
        rate_pct: (3, 10),
        years: (2, 6),
        frequencies: &[1],
    },
    TierRanges {
        principal_steps: (1, 20),
        rate_pct: (3, 12),
        years: (2, 8),
        frequencies: &[2, 4, 12],
    },
    TierRanges {
        principal_steps: (1, 20),
        rate_pct: (3, 12),
        years: (2, 6),
        frequencies: &[1],
    },
    TierRanges {
        principal_steps: (2, 50),
        rate_pct: (2, 15),
        years: (2, 10),
        frequencies: &[2, 4, 12, 365],
    },
];

const TIER_ONE_DECK: [SlotShape; 5] = [
    SlotShape::SimpleInterest,
    SlotShape::SimpleInterest,
    SlotShape::SimpleInterest,
    SlotShape::SimpleAmount,
    SlotShape::SimpleAmount,
];
const TIER_TWO_DECK: [SlotShape; 5] = [
    SlotShape::CompoundAmount,
    SlotShape::CompoundAmount,
    SlotShape::CompoundAmount,
    SlotShape::CompoundAmount,
    SlotShape::CompoundInterest,
];
const TIER_THREE_DECK: [SlotShape; 5] = [SlotShape::PeriodicAmount; 5];
const TIER_FOUR_DECK: [SlotShape; 5] = [
    SlotShape::FindPrincipal,
    SlotShape::FindRate,
    SlotShape::FindTime,
    SlotShape::FindPrincipal,
    SlotShape::FindRate,
];
const TIER_FIVE_DECK: [SlotShape; 4] = [
    SlotShape::FindPrincipal,
    SlotShape::FindRate,
    SlotShape::FindTime,
    SlotShape::FindTime,
];

/// Difficulty tier for a level; levels past the last tier reuse its ranges.
#[must_use]
pub fn tier_for_level(level: u8) -> u8 {
    level.clamp(1, HIGHEST_TIER)
}

fn tier_ranges(tier: u8) -> &'static TierRanges {
    let idx = usize::from(tier.clamp(1, HIGHEST_TIER) - 1);
    &TIERS[idx]
}

fn base_deck(tier: u8) -> &'static [SlotShape] {
    match tier {
        1 => &TIER_ONE_DECK,
        2 => &TIER_TWO_DECK,
        3 => &TIER_THREE_DECK,
        4 => &TIER_FOUR_DECK,
        _ => &TIER_FIVE_DECK,
    }
}

/// Derive an independent stream seed from the run seed and a domain tag.
pub(crate) fn derive_stream_seed(user_seed: u64, domain_tag: &[u8], salt: &[u64]) -> u64 {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()).expect("64-bit seed is valid key");
    mac.update(domain_tag);
    for value in salt {
        mac.update(&value.to_le_bytes());
    }
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}

/// One set of drawn inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Draw {
    principal: f64,
    rate_pct: f64,
    years: u32,
    periods_per_year: u32,
}

impl Draw {
    fn sample<R: Rng + ?Sized>(ranges: &TierRanges, rng: &mut R) -> Self {
        let (p_lo, p_hi) = ranges.principal_steps;
        let (r_lo, r_hi) = ranges.rate_pct;
        let (t_lo, t_hi) = ranges.years;
        let steps = rng.gen_range(p_lo..=p_hi);
        let rate = rng.gen_range(r_lo..=r_hi);
        let years = rng.gen_range(t_lo..=t_hi);
        let periods_per_year = ranges.frequencies.choose(rng).copied().unwrap_or(1);
        Self {
            principal: f64::from(steps * PRINCIPAL_STEP),
            rate_pct: f64::from(rate),
            years,
            periods_per_year,
        }
    }
}

/// Maps `(level, slot)` to problems for one run seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemGenerator {
    seed: u64,
    questions_per_level: u8,
}

impl ProblemGenerator {
    #[must_use]
    pub fn new(seed: u64, questions_per_level: u8) -> Self {
        Self {
            seed,
            questions_per_level: questions_per_level.max(1),
        }
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub const fn questions_per_level(&self) -> u8 {
        self.questions_per_level
    }

    /// Slot shapes for a level, shuffled deterministically from the run seed.
    ///
    /// The top tier always ends with a comparison boss slot.
    #[must_use]
    pub fn deck(&self, level: u8) -> SlotDeck {
        let tier = tier_for_level(level);
        let base = base_deck(tier);
        let len = usize::from(self.questions_per_level);
        let boss = tier == HIGHEST_TIER;
        let body_len = if boss { len - 1 } else { len };

        let mut deck: SlotDeck = base.iter().copied().cycle().take(body_len).collect();
        let mut rng = ChaCha20Rng::seed_from_u64(derive_stream_seed(
            self.seed,
            STREAM_DECK,
            &[u64::from(level)],
        ));
        deck.shuffle(&mut rng);
        if boss {
            deck.push(SlotShape::Comparison);
        }
        deck
    }

    #[must_use]
    pub fn shape_for(&self, level: u8, slot: u8) -> SlotShape {
        let deck = self.deck(level);
        let idx = usize::from(slot) % deck.len().max(1);
        deck.get(idx).copied().unwrap_or(SlotShape::SimpleInterest)
    }

    /// Deterministic generator stream for the `nonce`-th problem at a slot.
    #[must_use]
    pub fn problem_rng(&self, level: u8, slot: u8, nonce: u64) -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(derive_stream_seed(
            self.seed,
            STREAM_PROBLEM,
            &[u64::from(level), u64::from(slot), nonce],
        ))
    }

    /// Produce the `nonce`-th problem for a slot; equal inputs give equal problems.
    #[must_use]
    pub fn request_problem(&self, level: u8, slot: u8, nonce: u64) -> Problem {
        let mut rng = self.problem_rng(level, slot, nonce);
        self.generate(level, slot, &mut rng)
    }

    /// Produce a problem for a slot using the supplied randomness.
    pub fn generate<R: Rng + ?Sized>(&self, level: u8, slot: u8, rng: &mut R) -> Problem {
        let tier = tier_for_level(level);
        let shape = self.shape_for(level, slot);
        let draw = Draw::sample(tier_ranges(tier), rng);
        let ctx = SlotCtx { level, slot };

        let problem = match shape {
            SlotShape::SimpleInterest => simple_problem(ctx, &draw, false),
            SlotShape::SimpleAmount => simple_problem(ctx, &draw, true),
            SlotShape::CompoundAmount => compound_problem(ctx, &draw, false, false),
            SlotShape::CompoundInterest => compound_problem(ctx, &draw, false, true),
            SlotShape::PeriodicAmount => compound_problem(ctx, &draw, true, false),
            SlotShape::FindPrincipal => reverse_problem(ctx, &draw, Unknown::Principal, tier),
            SlotShape::FindRate => reverse_problem(ctx, &draw, Unknown::Rate, tier),
            SlotShape::FindTime => reverse_problem(ctx, &draw, Unknown::Time, tier),
            SlotShape::Comparison => comparison_problem(ctx, &draw, rng),
        };
        log::trace!(
            "generated {} problem for level {level} slot {slot}: expected {}",
            problem.kind,
            problem.expected
        );
        problem
    }
}

#[derive(Debug, Clone, Copy)]
struct SlotCtx {
    level: u8,
    slot: u8,
}

fn pct(rate_pct: f64) -> String {
    format!("{}%", format_trimmed(rate_pct, 2))
}

fn decimal_rate(rate_pct: f64) -> String {
    format_trimmed(rate_pct / 100.0, 4)
}

fn years_text(years: u32) -> String {
    if years == 1 {
        "1 year".to_string()
    } else {
        format!("{years} years")
    }
}

fn growth_expression(rate_pct: f64, years: u32, n: u32) -> String {
    if n <= 1 {
        format!("(1 + {})^{years}", decimal_rate(rate_pct))
    } else {
        format!("(1 + {}/{n})^({n}×{years})", decimal_rate(rate_pct))
    }
}

fn unknown_term_growth(rate_pct: f64, n: u32) -> String {
    if n <= 1 {
        format!("(1 + {})^t", decimal_rate(rate_pct))
    } else {
        format!("(1 + {}/{n})^({n}×t)", decimal_rate(rate_pct))
    }
}

fn simple_problem(ctx: SlotCtx, draw: &Draw, find_amount: bool) -> Problem {
    let Draw {
        principal,
        rate_pct,
        years,
        ..
    } = *draw;
    let interest = round_to_cents(simple_interest(principal, rate_pct, years));
    let amount = round_to_cents(principal + interest);

    let question = if find_amount {
        "What is the total amount repaid?"
    } else {
        "How much interest is owed?"
    };
    let narrative = format!(
        "A goblin moneylender lends you {} at {} simple interest per year for {}. {question}",
        format_currency(principal),
        pct(rate_pct),
        years_text(years),
    );
    let mut explanation = format!(
        "I = P × r × t = {} × {} × {years} = {}",
        format_currency(principal),
        decimal_rate(rate_pct),
        format_currency(interest),
    );
    if find_amount {
        explanation.push_str(&format!(
            "; A = P + I = {} + {} = {}",
            format_currency(principal),
            format_currency(interest),
            format_currency(amount)
        ));
    }

    let (unknown, expected) = if find_amount {
        (Unknown::Amount, amount)
    } else {
        (Unknown::Interest, interest)
    };
    Problem {
        kind: ProblemKind::SimpleInterest,
        level: ctx.level,
        slot: ctx.slot,
        narrative,
        knowns: Knowns {
            principal: Some(principal),
            rate_pct: Some(rate_pct),
            years: Some(years),
            periods_per_year: 1,
            amount: None,
        },
        unknown,
        expected: ExpectedAnswer::Number(expected),
        tolerance: Tolerance::for_unknown(unknown),
        explanation,
        comparison: None,
    }
}

fn compound_problem(ctx: SlotCtx, draw: &Draw, periodic: bool, find_interest: bool) -> Problem {
    let Draw {
        principal,
        rate_pct,
        years,
        ..
    } = *draw;
    let n = if periodic { draw.periods_per_year } else { 1 };
    let amount = round_to_cents(compound_amount(principal, rate_pct, years, n));
    let interest = round_to_cents(amount - principal);

    let question = if find_interest {
        "How much interest does it earn?"
    } else {
        "What is the balance at the end?"
    };
    let narrative = format!(
        "You stash {} in the dwarven vault at {} per year, compounded {}, for {}. {question}",
        format_currency(principal),
        pct(rate_pct),
        frequency_label(n),
        years_text(years),
    );
    let formula = if n <= 1 {
        "A = P(1 + r)^t"
    } else {
        "A = P(1 + r/n)^(n·t)"
    };
    let mut explanation = format!(
        "{formula} = {} × {} = {}",
        format_currency(principal),
        growth_expression(rate_pct, years, n),
        format_currency(amount),
    );
    if find_interest {
        explanation.push_str(&format!(
            "; I = A − P = {} − {} = {}",
            format_currency(amount),
            format_currency(principal),
            format_currency(interest)
        ));
    }

    let (unknown, expected) = if find_interest {
        (Unknown::Interest, interest)
    } else {
        (Unknown::Amount, amount)
    };
    Problem {
        kind: if periodic {
            ProblemKind::CompoundPeriodic
        } else {
            ProblemKind::CompoundAnnual
        },
        level: ctx.level,
        slot: ctx.slot,
        narrative,
        knowns: Knowns {
            principal: Some(principal),
            rate_pct: Some(rate_pct),
            years: Some(years),
            periods_per_year: n,
            amount: None,
        },
        unknown,
        expected: ExpectedAnswer::Number(expected),
        tolerance: Tolerance::for_unknown(unknown),
        explanation,
        comparison: None,
    }
}

fn reverse_problem(ctx: SlotCtx, draw: &Draw, target: Unknown, tier: u8) -> Problem {
    let Draw {
        principal,
        rate_pct,
        years,
        ..
    } = *draw;
    let n = if tier >= HIGHEST_TIER {
        draw.periods_per_year
    } else {
        1
    };
    let raw_amount = compound_amount(principal, rate_pct, years, n);
    let amount = if target == Unknown::Principal {
        round_to_units(raw_amount)
    } else {
        round_to_cents(raw_amount)
    };
    let growth = growth_factor(rate_pct, years, n);
    let compounding = frequency_label(n);

    let (narrative, explanation, expected, knowns) = match target {
        Unknown::Principal => (
            format!(
                "The vault promises {} after {} at {} per year, compounded {compounding}. \
                 How much must you deposit today?",
                format_currency(amount),
                years_text(years),
                pct(rate_pct),
            ),
            format!(
                "P = A ÷ {} = {} ÷ {} ≈ {}",
                growth_expression(rate_pct, years, n),
                format_currency(amount),
                format_trimmed(growth, 4),
                format_currency(principal),
            ),
            principal,
            Knowns {
                principal: None,
                rate_pct: Some(rate_pct),
                years: Some(years),
                periods_per_year: n,
                amount: Some(amount),
            },
        ),
        Unknown::Rate => {
            let periods = n.saturating_mul(years);
            let root = if n <= 1 {
                format!("r = (A ÷ P)^(1/{years}) − 1")
            } else {
                format!("r = {n} × ((A ÷ P)^(1/{periods}) − 1)")
            };
            (
                format!(
                    "A deposit of {} grows to {} after {}, compounded {compounding}. \
                     What annual interest rate (%) does it earn?",
                    format_currency(principal),
                    format_currency(amount),
                    years_text(years),
                ),
                format!(
                    "{root}; A ÷ P = {} ÷ {} = {} ⇒ r ≈ {}",
                    format_currency(amount),
                    format_currency(principal),
                    format_trimmed(amount / principal, 4),
                    pct(rate_pct),
                ),
                rate_pct,
                Knowns {
                    principal: Some(principal),
                    rate_pct: None,
                    years: Some(years),
                    periods_per_year: n,
                    amount: Some(amount),
                },
            )
        }
        _ => (
            format!(
                "A deposit of {} at {} per year, compounded {compounding}, grows to {}. \
                 How many whole years did it take?",
                format_currency(principal),
                pct(rate_pct),
                format_currency(amount),
            ),
            format!(
                "{} = A ÷ P = {} ⇒ t = {}",
                unknown_term_growth(rate_pct, n),
                format_trimmed(amount / principal, 4),
                years_text(years),
            ),
            f64::from(years),
            Knowns {
                principal: Some(principal),
                rate_pct: Some(rate_pct),
                years: None,
                periods_per_year: n,
                amount: Some(amount),
            },
        ),
    };

    let unknown = match target {
        Unknown::Principal | Unknown::Rate => target,
        _ => Unknown::Time,
    };
    Problem {
        kind: ProblemKind::ReverseSolve,
        level: ctx.level,
        slot: ctx.slot,
        narrative,
        knowns,
        unknown,
        expected: ExpectedAnswer::Number(expected),
        tolerance: Tolerance::for_unknown(unknown),
        explanation,
        comparison: None,
    }
}

fn plan_description(plan: &PlanTerms) -> String {
    match plan.periods_per_year {
        None => format!("{} simple interest", pct(plan.rate_pct)),
        Some(n) => format!("{} compounded {}", pct(plan.rate_pct), frequency_label(n)),
    }
}

fn comparison_problem<R: Rng + ?Sized>(ctx: SlotCtx, draw: &Draw, rng: &mut R) -> Problem {
    let Draw {
        principal, years, ..
    } = *draw;
    let n = draw.periods_per_year.max(1);
    let mut compound_rate = draw.rate_pct;
    let simple_rate = compound_rate + f64::from(rng.gen_range(1_u32..=3));

    let simple_total = round_to_cents(principal + simple_interest(principal, simple_rate, years));
    let mut compound_total = round_to_cents(compound_amount(principal, compound_rate, years, n));
    // Compound growth is strictly increasing in the rate, so one bump breaks a tie.
    if (simple_total - compound_total).abs() < 0.005 {
        compound_rate += 1.0;
        compound_total = round_to_cents(compound_amount(principal, compound_rate, years, n));
    }

    let simple_first = rng.gen_bool(0.5);
    let simple_plan = |label| PlanTerms {
        label,
        rate_pct: simple_rate,
        periods_per_year: None,
        amount: simple_total,
    };
    let compound_plan = |label| PlanTerms {
        label,
        rate_pct: compound_rate,
        periods_per_year: Some(n),
        amount: compound_total,
    };
    let comparison = if simple_first {
        PlanComparison {
            plan_a: simple_plan(PlanLabel::A),
            plan_b: compound_plan(PlanLabel::B),
        }
    } else {
        PlanComparison {
            plan_a: compound_plan(PlanLabel::A),
            plan_b: simple_plan(PlanLabel::B),
        }
    };
    let winner = comparison.winner();

    let narrative = format!(
        "Two vault keepers bid for your {} over {}. Plan A offers {}; Plan B offers {}. \
         Which plan pays more? (answer A or B)",
        format_currency(principal),
        years_text(years),
        plan_description(&comparison.plan_a),
        plan_description(&comparison.plan_b),
    );
    let explain_plan = |plan: &PlanTerms| match plan.periods_per_year {
        None => format!(
            "Plan {}: A = P(1 + r·t) = {} × (1 + {} × {years}) = {}",
            plan.label,
            format_currency(principal),
            decimal_rate(plan.rate_pct),
            format_currency(plan.amount)
        ),
        Some(periods) => format!(
            "Plan {}: A = {} × {} = {}",
            plan.label,
            format_currency(principal),
            growth_expression(plan.rate_pct, years, periods),
            format_currency(plan.amount)
        ),
    };
    let explanation = format!(
        "{}; {}; Plan {winner} pays more.",
        explain_plan(&comparison.plan_a),
        explain_plan(&comparison.plan_b),
    );

    Problem {
        kind: ProblemKind::Comparison,
        level: ctx.level,
        slot: ctx.slot,
        narrative,
        knowns: Knowns {
            principal: Some(principal),
            rate_pct: None,
            years: Some(years),
            periods_per_year: n,
            amount: None,
        },
        unknown: Unknown::Plan,
        expected: ExpectedAnswer::Label(winner),
        tolerance: Tolerance::exact(),
        explanation,
        comparison: Some(comparison),
    }
}
