use anyhow::{Context, Result, bail};
use coinvault_game::seed::WORD_LIST;
use coinvault_game::{decode_run_code, replay_code};
use std::collections::HashMap;

const DEFAULT_SEED: u64 = 1337;

/// Seed plus the run code it was requested as, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedInfo {
    pub seed: u64,
    pub code: Option<String>,
}

impl SeedInfo {
    #[must_use]
    pub const fn from_numeric(seed: u64) -> Self {
        Self { seed, code: None }
    }

    #[must_use]
    pub const fn from_run_code(seed: u64, code: String) -> Self {
        Self {
            seed,
            code: Some(code),
        }
    }

    /// Code to print next to results; seeds without a replayable code print
    /// as numbers.
    #[must_use]
    pub fn display_code(&self) -> String {
        self.code
            .clone()
            .or_else(|| replay_code(self.seed))
            .unwrap_or_else(|| self.seed.to_string())
    }
}

/// Resolve a list of CLI seed arguments into canonical seed metadata.
///
/// Supports literal integers, run codes, and the special keywords
/// `all` / `available` which expand to every run-code seed.
///
/// # Errors
///
/// Returns an error for tokens that are neither numbers nor run codes.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<SeedInfo>> {
    let mut pending: Vec<SeedInfo> = Vec::new();
    let mut request_all = false;

    for token in tokens {
        if token.is_empty() {
            continue;
        }

        if token.eq_ignore_ascii_case("all") || token.eq_ignore_ascii_case("available") {
            request_all = true;
            continue;
        }

        if let Ok(value) = token.parse::<i64>() {
            pending.push(SeedInfo::from_numeric(value.unsigned_abs()));
            continue;
        }

        if let Ok(value) = token.parse::<u64>() {
            pending.push(SeedInfo::from_numeric(value));
            continue;
        }

        if let Some(seed) = decode_run_code(token) {
            pending.push(SeedInfo::from_run_code(seed, token.trim().to_uppercase()));
            continue;
        }

        bail!("Unrecognized seed token: {token}");
    }

    if request_all {
        pending.extend(generate_all_run_code_seeds()?);
    }

    let mut deduped: Vec<SeedInfo> = Vec::new();
    let mut index: HashMap<u64, usize> = HashMap::new();

    for info in pending {
        if let Some(&existing) = index.get(&info.seed) {
            if let Some(entry) = deduped.get_mut(existing)
                && entry.code.is_none()
                && info.code.is_some()
            {
                *entry = info;
            }
        } else {
            index.insert(info.seed, deduped.len());
            deduped.push(info);
        }
    }

    if deduped.is_empty() {
        deduped.push(SeedInfo::from_numeric(DEFAULT_SEED));
    }

    Ok(deduped)
}

fn generate_all_run_code_seeds() -> Result<Vec<SeedInfo>> {
    let mut seeds = Vec::with_capacity(WORD_LIST.len() * 100);

    for word in WORD_LIST {
        for suffix in 0..100 {
            let code = format!("CV-{word}{suffix:02}");
            let seed = decode_run_code(&code)
                .with_context(|| format!("failed to parse run code: {code}"))?;
            seeds.push(SeedInfo::from_run_code(seed, code));
        }
    }

    Ok(seeds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_numeric_and_run_code() {
        let raw = vec![
            "42".to_string(),
            "-7".to_string(),
            "cv-ledger42".to_string(),
        ];
        let seeds = resolve_seed_inputs(&raw).unwrap();
        assert!(seeds.iter().any(|s| s.seed == 42 && s.code.is_none()));
        assert!(seeds.iter().any(|s| s.seed == 7 && s.code.is_none()));
        assert!(seeds.iter().any(|s| {
            s.code.as_deref() == Some("CV-LEDGER42")
                && Some(s.seed) == decode_run_code("CV-LEDGER42")
        }));
    }

    #[test]
    fn duplicates_prefer_the_coded_form() {
        let seed = decode_run_code("CV-VAULT07").unwrap();
        let raw = vec![seed.to_string(), "CV-VAULT07".to_string()];
        let seeds = resolve_seed_inputs(&raw).unwrap();
        assert_eq!(seeds, vec![SeedInfo::from_run_code(seed, "CV-VAULT07".to_string())]);
    }

    #[test]
    fn display_code_never_invents_a_code() {
        assert_eq!(SeedInfo::from_numeric(1337).display_code(), "1337");
        let seed = decode_run_code("CV-TROVE11").unwrap();
        assert_eq!(SeedInfo::from_numeric(seed).display_code(), "CV-TROVE11");
    }

    #[test]
    fn expands_all_run_codes() {
        let seeds = resolve_seed_inputs(&["all".to_string()]).unwrap();
        assert_eq!(seeds.len(), WORD_LIST.len() * 100);
        assert!(seeds.iter().all(|s| s.code.is_some()));
    }

    #[test]
    fn empty_input_falls_back_to_default_and_junk_fails() {
        let seeds = resolve_seed_inputs(&[]).unwrap();
        assert_eq!(seeds, vec![SeedInfo::from_numeric(DEFAULT_SEED)]);
        assert!(resolve_seed_inputs(&["CV-NOTAWORD01".to_string()]).is_err());
    }
}
