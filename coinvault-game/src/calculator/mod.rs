//! In-game calculator: keypad tokens, a restricted expression grammar and the
//! session that holds the buffer and the last result.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := '-' unary | power
//! power   := primary (('^' | '√') unary)?
//! primary := number | Ans | '(' expr ')' | '√' unary
//! ```
//!
//! `n √ x` is the `n`-th root of `x`; a bare `√ x` is the square root.

use thiserror::Error;

pub mod parser;
pub mod session;
pub mod token;

pub use parser::evaluate;
pub use session::{CalculatorSession, ERROR_MARKER};
pub use token::{CalcToken, TokenBuffer, render, tokenize, tokens_for_number};

/// Reasons an expression cannot be evaluated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("nothing to evaluate")]
    Empty,
    #[error("unrecognized calculator input '{0}'")]
    UnknownInput(char),
    #[error("malformed number at position {position}")]
    MalformedNumber { position: usize },
    #[error("unexpected '{symbol}' at position {position}")]
    UnexpectedToken {
        position: usize,
        symbol: &'static str,
    },
    #[error("expression ends with an operator")]
    UnexpectedEnd,
    #[error("unmatched parenthesis at position {position}")]
    UnmatchedParen { position: usize },
    #[error("root marker has no base")]
    DanglingRoot,
    #[error("root index must be non-zero")]
    ZeroRootIndex,
    #[error("division by zero")]
    DivisionByZero,
    #[error("result is not a real number")]
    NonFinite,
    #[error("expression nests deeper than {limit} levels")]
    TooDeep { limit: usize },
}
