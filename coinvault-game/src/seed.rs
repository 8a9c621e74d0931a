//! Reversible run codes that map to generator seeds.
//! Code format: CV-<WORD><NN>, e.g. CV-LEDGER42, CV-ABACUS07

use std::hash::Hasher;
use twox_hash::XxHash64;

pub const CODE_PREFIX: &str = "CV";

// Word list for run codes
pub const WORD_LIST: [&str; 64] = [
    "ABACUS", "ACCRUE", "ANNUITY", "ASSET", "AUDIT", "BALANCE", "BANKER", "BOND", "BOUNTY",
    "BUDGET", "CAPITAL", "CENT", "COFFER", "COIN", "CREDIT", "DEBIT", "DEPOSIT", "DIVIDEND",
    "DOUBLOON", "DUCAT", "EQUITY", "ESCROW", "FLORIN", "FUND", "GOBLIN", "GROWTH", "GUILDER",
    "HOARD", "INGOT", "INTEREST", "KEEPER", "LEDGER", "LENDER", "LOAN", "MINT", "NUGGET",
    "PENNY", "PLEDGE", "PRINCIPAL", "PROFIT", "PURSE", "QUARTER", "RATE", "RESERVE", "RETURN",
    "SAVINGS", "SHILLING", "SILVER", "SOVEREIGN", "STASH", "STERLING", "TALLY", "TELLER",
    "TERM", "THRIFT", "TITHE", "TOKEN", "TREASURY", "TROVE", "VAULT", "WAGER", "WEALTH",
    "YIELD", "ZENITH",
];

fn sanitize_word(word: &str) -> String {
    word.chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

#[inline]
fn pack(word_index: u16, nn: u8) -> u16 {
    (word_index & 0x003F) | ((u16::from(nn) & 0x7F) << 6)
}

#[inline]
fn unpack(packed: u16) -> (u16, u8) {
    let nn = u8::try_from((packed >> 6) & 0x7F).unwrap_or(0);
    (packed & 0x003F, nn)
}

fn compose_seed(word_index: u16, nn: u8) -> u64 {
    let packed = pack(word_index, nn);
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(b"COINVAULT-");
    hasher.write(&packed.to_le_bytes());
    (hasher.finish() & 0xFFFF_FFFF_FFFF_0000) | u64::from(packed)
}

/// Render the run code whose seed shares `seed`'s low bits.
#[must_use]
pub fn encode_run_code(seed: u64) -> String {
    let packed = u16::try_from(seed & 0xFFFF).unwrap_or(0);
    let (wi, nn) = unpack(packed);
    let word = WORD_LIST.get(usize::from(wi)).copied().unwrap_or(WORD_LIST[0]);
    format!("{CODE_PREFIX}-{word}{:02}", nn % 100)
}

/// Run code that decodes back to exactly `seed`. Arbitrary seeds only share
/// their low bits with a code, so most have none.
#[must_use]
pub fn replay_code(seed: u64) -> Option<String> {
    let code = encode_run_code(seed);
    (decode_run_code(&code) == Some(seed)).then_some(code)
}

/// Seed for a run code; case and stray punctuation in the word are ignored.
#[must_use]
pub fn decode_run_code(code: &str) -> Option<u64> {
    let (prefix, rest) = code.trim().split_once('-')?;
    if !prefix.eq_ignore_ascii_case(CODE_PREFIX) || rest.len() < 3 {
        return None;
    }
    let split = rest.len().checked_sub(2)?;
    let (word_part, nn_part) = (rest.get(..split)?, rest.get(split..)?);
    let nn: u8 = nn_part.parse().ok()?;
    let word = sanitize_word(word_part);
    let idx = WORD_LIST.iter().position(|w| *w == word)?;
    let wi = u16::try_from(idx).ok()?;
    Some(compose_seed(wi, nn))
}

/// Fresh run code from caller-supplied entropy.
#[must_use]
pub fn generate_run_code(entropy: u64) -> String {
    let wi = u16::try_from(entropy % WORD_LIST.len() as u64).unwrap_or(0);
    let nn = u8::try_from((entropy >> 17) % 100).unwrap_or(0);
    encode_run_code(compose_seed(wi, nn))
}

/// Accept either a run code or a plain decimal seed.
#[must_use]
pub fn parse_seed(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    trimmed.parse::<u64>().ok().or_else(|| decode_run_code(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_then_encode_is_stable() {
        let seed = decode_run_code("CV-LEDGER42").unwrap();
        assert_eq!(encode_run_code(seed), "CV-LEDGER42");
        assert_eq!(decode_run_code("cv-ledger42"), Some(seed));
    }

    #[test]
    fn distinct_codes_give_distinct_seeds() {
        let a = decode_run_code("CV-ABACUS01").unwrap();
        let b = decode_run_code("CV-ABACUS02").unwrap();
        let c = decode_run_code("CV-VAULT01").unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn generated_codes_roundtrip() {
        for entropy in [0_u64, 1, 99, 0xDEAD_BEEF, u64::MAX] {
            let code = generate_run_code(entropy);
            let seed = decode_run_code(&code).unwrap();
            assert_eq!(encode_run_code(seed), code);
        }
    }

    #[test]
    fn replay_code_only_for_code_seeds() {
        let seed = decode_run_code("CV-LEDGER42").unwrap();
        assert_eq!(replay_code(seed).as_deref(), Some("CV-LEDGER42"));
        assert_eq!(replay_code(seed.wrapping_add(1)), None);
        let plain = 1337;
        assert!(replay_code(plain).is_none());
        assert_ne!(decode_run_code(&encode_run_code(plain)), Some(plain));
    }

    #[test]
    fn rejects_malformed_codes() {
        assert_eq!(decode_run_code("XX-LEDGER42"), None);
        assert_eq!(decode_run_code("CV-NOTAWORD42"), None);
        assert_eq!(decode_run_code("CV-LEDGER"), None);
        assert_eq!(decode_run_code("LEDGER42"), None);
    }

    #[test]
    fn parse_seed_accepts_numbers_and_codes() {
        assert_eq!(parse_seed(" 1234 "), Some(1234));
        assert_eq!(parse_seed("CV-TROVE11"), decode_run_code("CV-TROVE11"));
        assert_eq!(parse_seed("nope"), None);
    }
}
