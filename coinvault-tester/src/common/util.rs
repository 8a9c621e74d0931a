use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::{fs, path::Path, path::PathBuf};

/// Timestamped folder for one failed iteration.
pub fn artifacts_dir(base: &Path, scenario: &str, seed: u64) -> PathBuf {
    let ts = Utc::now().format("%Y%m%dT%H%M%S");
    let slug: String = scenario
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    base.join(slug).join(format!("seed-{seed}")).join(ts.to_string())
}

/// Write the error chain and, when available, the turn log of a failure.
pub fn write_failure_artifacts<T: Serialize>(
    dir: &Path,
    turns: Option<&T>,
    error_chain: &str,
) -> Result<()> {
    fs::create_dir_all(dir).context("creating artifacts dir")?;

    if let Some(turns) = turns {
        let payload = serde_json::to_vec_pretty(turns).context("serializing turn log")?;
        fs::write(dir.join("turns.json"), payload).context("writing turn log")?;
    }

    fs::write(dir.join("error.txt"), error_chain).context("writing error chain")?;
    Ok(())
}

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn split_csv_trims_and_filters() {
        let parts = split_csv(" smoke, ,victory,  calculator ");
        assert_eq!(parts, vec!["smoke", "victory", "calculator"]);
    }

    #[test]
    fn artifacts_dir_includes_key_segments() {
        let dir = artifacts_dir(Path::new("target/out"), "Snapshot Resume", 42);
        let text = dir.to_string_lossy();
        assert!(text.contains("target/out/snapshot-resume/seed-42/"), "{text}");
    }

    #[test]
    fn failure_artifacts_are_written() {
        let base = std::env::temp_dir().join(format!(
            "coinvault-artifacts-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        let turns = json!([{ "level": 1, "answer": "42" }]);
        write_failure_artifacts(&base, Some(&turns), "boom").expect("write artifacts");

        assert!(base.join("turns.json").exists());
        assert_eq!(fs::read_to_string(base.join("error.txt")).unwrap(), "boom");
        fs::remove_dir_all(base).unwrap();
    }
}
