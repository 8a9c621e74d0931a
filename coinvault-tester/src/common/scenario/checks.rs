use anyhow::{Context, Result, bail, ensure};
use coinvault_game::calculator::evaluate;
use coinvault_game::{
    CalculatorSession, EvalError, ProblemGenerator, Submission, decode_run_code, encode_run_code,
    generate_run_code, parse_seed, tokenize, verify,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use regex::Regex;

use crate::logic::game_tester::{GameTester, SimulationPlan};
use crate::logic::policy::{LearnerStrategy, solve_with_calculator};

const SWEEP_NONCES: u64 = 3;
const ANS_CHAIN_STEPS: usize = 8;
const DEEP_NESTING: usize = 10_000;
const DETERMINISM_TURNS: u32 = 12;
const RUN_CODE_PATTERN: &str = r"^CV-[A-Z]+\d{2}$";

const VALUE_CASES: &[(&str, f64)] = &[
    ("2^3+1", 9.0),
    ("-2^2", -4.0),
    ("2^3^2", 512.0),
    ("3√8", 2.0),
    ("3√-27", -3.0),
    ("√16", 4.0),
    ("10-4-3", 3.0),
    ("8/4/2", 1.0),
    ("2*(3+4)", 14.0),
    ("1000*(1+5/100)^2", 1_102.5),
];

const ERROR_CASES: &[&str] = &["", "3√", "1/0", "(2+3", "2+*3", "0√5", "4)"];

fn eval_text(text: &str, ans: f64) -> Result<f64, EvalError> {
    evaluate(&tokenize(text)?, ans)
}

/// Every slot of every level deals a problem that its own expected answer
/// and a calculator-worked answer both satisfy.
pub fn generator_sweep(tester: &GameTester, seed: u64) -> Result<()> {
    let config = tester.config();
    let generator = ProblemGenerator::new(seed, config.questions_per_level);
    let mut calc = CalculatorSession::new();

    for level in 1..=config.max_level {
        for slot in 0..config.questions_per_level {
            for nonce in 0..SWEEP_NONCES {
                let problem = generator.request_problem(level, slot, nonce);
                let at = format!("level {level} slot {slot} nonce {nonce}");
                ensure!(
                    problem.level == level && problem.slot == slot,
                    "{at}: problem reports level {} slot {}",
                    problem.level,
                    problem.slot
                );
                ensure!(
                    problem.kind == generator.shape_for(level, slot).kind(),
                    "{at}: {} problem dealt for a {:?} slot",
                    problem.kind,
                    generator.shape_for(level, slot)
                );
                ensure!(
                    !problem.narrative.is_empty() && !problem.explanation.is_empty(),
                    "{at}: missing narrative or explanation"
                );

                let own = problem.expected.to_string();
                ensure!(
                    verify(&problem, &own)?.correct,
                    "{at}: expected answer {own} rejected"
                );

                let typed = match solve_with_calculator(&mut calc, &problem)
                    .with_context(|| format!("{at}: solving {}", problem.narrative))?
                {
                    Submission::Number(value) => format!("{value:.2}"),
                    Submission::Label(label) => label.as_str().to_string(),
                };
                ensure!(
                    verify(&problem, &typed)?.correct,
                    "{at}: worked answer {typed} rejected, expected {}",
                    problem.expected
                );
            }
        }
    }
    Ok(())
}

/// Fixed grammar cases plus a seeded `Ans` chain.
pub fn calculator_grammar(_tester: &GameTester, seed: u64) -> Result<()> {
    for &(text, expected) in VALUE_CASES {
        let value = eval_text(text, 0.0).with_context(|| format!("evaluating {text:?}"))?;
        ensure!(
            (value - expected).abs() < 1e-9,
            "{text:?} gave {value}, expected {expected}"
        );
    }
    for &text in ERROR_CASES {
        if let Ok(value) = eval_text(text, 0.0) {
            bail!("{text:?} should be rejected, gave {value}");
        }
    }

    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut calc = CalculatorSession::new();
    let mut running = 0.0_f64;
    for _ in 0..ANS_CHAIN_STEPS {
        let step: u32 = rng.gen_range(1..=999);
        calc.clear();
        calc.push_str(&format!("Ans+{step}"))?;
        running += f64::from(step);
        let value = calc.evaluate()?;
        ensure!(
            (value - running).abs() < 1e-9,
            "Ans chain drifted: {value} vs {running}"
        );
    }

    let nested = format!("{}1", "(".repeat(DEEP_NESTING));
    ensure!(
        matches!(eval_text(&nested, 0.0), Err(EvalError::TooDeep { .. })),
        "deep nesting was not rejected"
    );

    calc.clear();
    calc.push_str("Ans/0")?;
    ensure!(calc.evaluate().is_err(), "division by zero accepted");
    ensure!(
        (calc.last_result() - running).abs() < 1e-9,
        "a failed evaluation overwrote Ans"
    );
    Ok(())
}

/// Codes match the published shape and decode to stable seeds.
pub fn run_code_consistency(_tester: &GameTester, seed: u64) -> Result<()> {
    let pattern = Regex::new(RUN_CODE_PATTERN)?;

    for code in [encode_run_code(seed), generate_run_code(seed)] {
        ensure!(pattern.is_match(&code), "{code} does not look like a run code");
        let decoded =
            decode_run_code(&code).with_context(|| format!("{code} failed to decode"))?;
        ensure!(
            encode_run_code(decoded) == code,
            "{code} decoded to {decoded}, which encodes as {}",
            encode_run_code(decoded)
        );
        ensure!(
            parse_seed(&code.to_lowercase()) == Some(decoded),
            "lowercase {code} parsed differently"
        );
    }

    ensure!(
        parse_seed(&seed.to_string()) == Some(seed),
        "decimal seed {seed} did not parse"
    );
    ensure!(
        decode_run_code("CV-NOTAWORD00").is_none(),
        "unknown word accepted"
    );
    Ok(())
}

/// The same seed replays the same session; the next seed does not.
pub fn deterministic_sessions(tester: &GameTester, seed: u64) -> Result<()> {
    let plan = SimulationPlan::new(LearnerStrategy::Careless).with_max_turns(DETERMINISM_TURNS);
    let first = tester.run_plan(&plan, seed)?;
    let second = tester.run_plan(&plan, seed)?;
    ensure!(
        first.fingerprint == second.fingerprint,
        "seed {seed} replayed differently"
    );
    ensure!(first.turns == second.turns, "turn logs differ for seed {seed}");

    let other = tester.run_plan(&plan, seed.wrapping_add(1))?;
    ensure!(
        other.fingerprint != first.fingerprint,
        "seeds {seed} and {} dealt identical sessions",
        seed.wrapping_add(1)
    );
    Ok(())
}
