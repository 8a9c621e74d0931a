use std::process::Command;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "coinvault-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

#[test]
fn cli_list_scenarios_writes_output() {
    let exe = env!("CARGO_BIN_EXE_coinvault-tester");
    let output_path = temp_path("list");
    let status = Command::new(exe)
        .args(["--list-scenarios", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("Available scenarios"));
    assert!(content.contains("generator-sweep"));
}

#[test]
fn cli_runs_scenarios_for_run_codes_with_json_report() {
    let exe = env!("CARGO_BIN_EXE_coinvault-tester");
    let output_path = temp_path("run");
    let output = Command::new(exe)
        .args([
            "--instant",
            "--report",
            "json",
            "--scenarios",
            "smoke,calculator,run-codes",
            "--iterations",
            "1",
            "--seeds",
            "CV-LEDGER42,7",
            "--output",
        ])
        .arg(&output_path)
        .output()
        .expect("run cli");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output_path).expect("read report"))
            .expect("json report");
    let runs = report.as_array().expect("array report");
    assert_eq!(runs.len(), 6);
    assert!(runs.iter().all(|run| run["passed"] == true));
    assert!(runs.iter().any(|run| run["run_code"] == "CV-LEDGER42"));
}

#[test]
fn cli_rejects_unrecognized_seed() {
    let exe = env!("CARGO_BIN_EXE_coinvault-tester");
    let output = Command::new(exe)
        .args(["--seeds", "not-a-seed"])
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unrecognized seed token"));
}

#[test]
fn cli_reports_config_errors() {
    let exe = env!("CARGO_BIN_EXE_coinvault-tester");
    let config_path = temp_path("config.json");
    std::fs::write(&config_path, r#"{"max_health": 0}"#).expect("write config");
    let output = Command::new(exe)
        .arg("--config")
        .arg(&config_path)
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("max_health"));
}
