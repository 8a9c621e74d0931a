use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use super::EvalError;
use crate::numbers::{CALCULATOR_PLACES, format_trimmed};

/// One keypad press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalcToken {
    Digit(u8),
    Point,
    Plus,
    Minus,
    Times,
    Divide,
    Power,
    Root,
    LParen,
    RParen,
    Ans,
}

/// Keypad buffer; typical entries fit inline.
pub type TokenBuffer = SmallVec<[CalcToken; 32]>;

impl CalcToken {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Digit(d) => match d {
                0 => "0",
                1 => "1",
                2 => "2",
                3 => "3",
                4 => "4",
                5 => "5",
                6 => "6",
                7 => "7",
                8 => "8",
                _ => "9",
            },
            Self::Point => ".",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Times => "×",
            Self::Divide => "÷",
            Self::Power => "^",
            Self::Root => "√",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::Ans => "Ans",
        }
    }

    /// Map a single typed character to its token.
    #[must_use]
    pub fn from_char(c: char) -> Option<Self> {
        let token = match c {
            '0'..='9' => Self::Digit(u8::try_from(c.to_digit(10)?).ok()?),
            '.' => Self::Point,
            '+' => Self::Plus,
            '-' | '−' => Self::Minus,
            '*' | '×' | 'x' => Self::Times,
            '/' | '÷' => Self::Divide,
            '^' => Self::Power,
            '√' => Self::Root,
            '(' => Self::LParen,
            ')' => Self::RParen,
            _ => return None,
        };
        Some(token)
    }

    #[must_use]
    pub const fn is_digit(self) -> bool {
        matches!(self, Self::Digit(_))
    }
}

impl fmt::Display for CalcToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Turn typed text into keypad tokens. Whitespace is ignored and `Ans` is
/// matched case-insensitively.
///
/// # Errors
///
/// Returns [`EvalError::UnknownInput`] for characters with no key.
pub fn tokenize(text: &str) -> Result<TokenBuffer, EvalError> {
    let mut out = TokenBuffer::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.eq_ignore_ascii_case(&'a')
            && chars.get(i + 1).is_some_and(|n| n.eq_ignore_ascii_case(&'n'))
            && chars.get(i + 2).is_some_and(|s| s.eq_ignore_ascii_case(&'s'))
        {
            out.push(CalcToken::Ans);
            i += 3;
            continue;
        }
        out.push(CalcToken::from_char(c).ok_or(EvalError::UnknownInput(c))?);
        i += 1;
    }
    Ok(out)
}

/// Display text for a buffer, exactly as typed.
#[must_use]
pub fn render(tokens: &[CalcToken]) -> String {
    tokens.iter().map(|t| t.symbol()).collect()
}

/// Tokens spelling `value` rounded to the calculator's display precision.
/// Negative values are parenthesized so a following operator applies to the
/// whole number.
#[must_use]
pub fn tokens_for_number(value: f64) -> TokenBuffer {
    let text = format_trimmed(value, CALCULATOR_PLACES);
    let digits = text.chars().filter_map(CalcToken::from_char);
    if text.starts_with('-') {
        std::iter::once(CalcToken::LParen)
            .chain(digits)
            .chain(std::iter::once(CalcToken::RParen))
            .collect()
    } else {
        digits.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_handles_ans_and_symbols() {
        let tokens = tokenize("ans × 2 ÷ (1 + 3√8)").unwrap();
        assert_eq!(tokens[0], CalcToken::Ans);
        assert_eq!(tokens[1], CalcToken::Times);
        assert_eq!(tokens[2], CalcToken::Digit(2));
        assert_eq!(tokens[3], CalcToken::Divide);
        assert!(tokens.contains(&CalcToken::Root));
        assert_eq!(render(&tokens), "Ans×2÷(1+3√8)");
    }

    #[test]
    fn tokenize_rejects_unknown_characters() {
        assert_eq!(tokenize("2 % 3"), Err(EvalError::UnknownInput('%')));
        assert_eq!(tokenize("an"), Err(EvalError::UnknownInput('a')));
    }

    #[test]
    fn number_tokens_round_to_four_places() {
        assert_eq!(render(&tokens_for_number(1.157_625)), "1.1576");
        assert_eq!(render(&tokens_for_number(-2.5)), "(-2.5)");
        assert_eq!(render(&tokens_for_number(-0.00001)), "0");
        assert_eq!(render(&tokens_for_number(9.0)), "9");
    }
}
