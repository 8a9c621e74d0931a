mod common;
mod logic;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use coinvault_game::{EngineConfig, load_config};
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;

use common::scenario::{expand_scenarios, get_scenario, list_scenarios};
use common::split_csv;
use logic::{GameTester, LogicTester, ScenarioResult, SeedInfo, resolve_seed_inputs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Console,
    Json,
    Markdown,
}

#[derive(Debug, Parser)]
#[command(name = "coinvault-tester", version)]
#[command(about = "Headless QA runner for the Coinvault quiz engine - simulated learners and engine checks")]
struct Args {
    /// Scenarios to run (comma-separated, `all` for every scenario)
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds or run codes to run (comma-separated, `all` for every run code)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 1)]
    iterations: usize,

    /// Output report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Engine config JSON; defaults to the built-in limits
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip the timed walk between questions
    #[arg(long)]
    instant: bool,

    /// Directory for failure artifacts (turn logs and error chains)
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let config = resolve_config(&args)?;
    let scenarios = expand_scenarios(&split_csv(&args.scenarios));
    let seed_infos = resolve_seed_inputs(&split_csv(&args.seeds))?;
    let game_tester = GameTester::new(config, args.verbose);

    let results = run_logic_scenarios(&args, &scenarios, &seed_infos, game_tester);
    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:20} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    eprintln!("{}", "🪙 Coinvault Automated Tester".bright_cyan().bold());
    eprintln!("{}", "==============================".cyan());
}

fn resolve_config(args: &Args) -> Result<EngineConfig> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    Ok(if args.instant { config.instant() } else { config })
}

fn run_logic_scenarios(
    args: &Args,
    scenarios: &[String],
    seed_infos: &[SeedInfo],
    game_tester: GameTester,
) -> Vec<ScenarioResult> {
    let mut results = Vec::new();
    let seeds: Vec<u64> = seed_infos.iter().map(|s| s.seed).collect();

    if args.verbose {
        let codes: Vec<String> = seed_infos.iter().map(SeedInfo::display_code).collect();
        eprintln!("🌱 Seeds: {}", codes.join(", "));
    }

    let mut logic_tester = LogicTester::new(game_tester);
    if let Some(dir) = &args.artifacts_dir {
        logic_tester = logic_tester.with_artifacts_dir(dir);
    }

    for scenario_name in scenarios {
        if let Some(scenario) = get_scenario(scenario_name) {
            results.extend(logic_tester.run_scenario(&scenario, &seeds, args.iterations));
        } else {
            eprintln!("⚠️  Unknown scenario: {}", scenario_name.yellow());
        }
    }

    results
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report {
        ReportFormat::Json => {
            logic::reports::generate_json_report(&mut output_target, results)?;
        }
        ReportFormat::Markdown => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Coinvault Logic Test Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        ReportFormat::Console => {
            if results.is_empty() {
                writeln!(&mut output_target, "No logic scenarios executed.")?;
            } else {
                logic::reports::generate_console_report(
                    &mut output_target,
                    results,
                    start_time.elapsed(),
                )?;
            }
            writeln!(&mut output_target)?;
            writeln!(&mut output_target, "🏁 Total time: {:?}", start_time.elapsed())?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn base_args() -> Args {
        Args {
            scenarios: "smoke".to_string(),
            list_scenarios: false,
            seeds: "1337".to_string(),
            iterations: 1,
            report: ReportFormat::Json,
            verbose: false,
            output: None,
            config: None,
            instant: true,
            artifacts_dir: None,
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("coinvault-main-{}-{name}", std::process::id()))
    }

    fn sample_result(passed: bool) -> ScenarioResult {
        ScenarioResult {
            scenario_name: "Smoke Test".to_string(),
            seed: 1337,
            run_code: coinvault_game::replay_code(1337),
            passed,
            iterations_run: 1,
            successful_iterations: usize::from(passed),
            failures: Vec::new(),
            average_duration: Duration::from_millis(1),
            performance_data: vec![Duration::from_millis(1)],
        }
    }

    #[test]
    fn runs_requested_scenarios_for_each_seed() {
        let mut args = base_args();
        args.seeds = "1,2".to_string();
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.transition_ms, 0);
        let seeds = resolve_seed_inputs(&split_csv(&args.seeds)).unwrap();
        let scenarios = expand_scenarios(&split_csv("smoke,calculator,unknown"));
        let results = run_logic_scenarios(&args, &scenarios, &seeds, GameTester::new(config, false));
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.passed));
    }

    #[test]
    fn write_reports_emits_json_output() {
        let mut args = base_args();
        let path = temp_path("report.json");
        args.output = Some(path.clone());
        write_reports(&args, &[sample_result(true)], Instant::now()).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value[0]["scenario_name"], "Smoke Test");
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn write_reports_markdown_empty_results() {
        let mut args = base_args();
        let path = temp_path("empty.md");
        args.output = Some(path.clone());
        args.report = ReportFormat::Markdown;
        write_reports(&args, &[], Instant::now()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("_No scenarios executed._"));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn maybe_list_scenarios_writes_output() {
        let mut args = base_args();
        let path = temp_path("list.txt");
        args.output = Some(path.clone());
        args.list_scenarios = true;
        assert!(maybe_list_scenarios(&args).unwrap());
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Available scenarios:"));
        assert!(text.contains("snapshot-resume"));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn maybe_list_scenarios_returns_false_when_disabled() {
        assert!(!maybe_list_scenarios(&base_args()).unwrap());
    }

    #[test]
    fn missing_config_file_is_reported() {
        let mut args = base_args();
        args.config = Some(temp_path("missing-config.json"));
        let err = resolve_config(&args).unwrap_err();
        assert!(format!("{err:#}").contains("missing-config.json"));
    }

    #[test]
    fn output_target_file_writes() {
        let path = temp_path("target.txt");
        let mut target = OutputTarget::new(Some(path.clone())).unwrap();
        writeln!(target, "hello").unwrap();
        target.flush_inner().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
        std::fs::remove_file(path).unwrap();
    }
}
