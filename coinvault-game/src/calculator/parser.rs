//! Recursive-descent evaluation over keypad tokens.

use super::EvalError;
use super::token::CalcToken;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Lexeme {
    Number(f64),
    Ans,
    Plus,
    Minus,
    Times,
    Divide,
    Power,
    Root,
    LParen,
    RParen,
}

impl Lexeme {
    const fn symbol(self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Ans => "Ans",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Times => "×",
            Self::Divide => "÷",
            Self::Power => "^",
            Self::Root => "√",
            Self::LParen => "(",
            Self::RParen => ")",
        }
    }
}

/// Nesting bound for unary, paren, power and root chains.
pub const MAX_DEPTH: usize = 256;

/// Lexeme paired with the buffer index it started at.
type Positioned = (usize, Lexeme);

fn lex(tokens: &[CalcToken]) -> Result<Vec<Positioned>, EvalError> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        if token.is_digit() || token == CalcToken::Point {
            let start = i;
            let mut literal = String::new();
            let mut seen_point = false;
            while let Some(&t) = tokens.get(i) {
                match t {
                    CalcToken::Digit(d) => literal.push(char::from(b'0' + d.min(9))),
                    CalcToken::Point if !seen_point => {
                        seen_point = true;
                        literal.push('.');
                    }
                    CalcToken::Point => return Err(EvalError::MalformedNumber { position: i }),
                    _ => break,
                }
                i += 1;
            }
            let value = literal
                .parse::<f64>()
                .map_err(|_| EvalError::MalformedNumber { position: start })?;
            out.push((start, Lexeme::Number(value)));
            continue;
        }

        let lexeme = match token {
            CalcToken::Plus => Lexeme::Plus,
            CalcToken::Minus => Lexeme::Minus,
            CalcToken::Times => Lexeme::Times,
            CalcToken::Divide => Lexeme::Divide,
            CalcToken::Power => Lexeme::Power,
            CalcToken::Root => Lexeme::Root,
            CalcToken::LParen => Lexeme::LParen,
            CalcToken::RParen => Lexeme::RParen,
            CalcToken::Ans => Lexeme::Ans,
            CalcToken::Digit(_) | CalcToken::Point => unreachable!("handled above"),
        };
        out.push((i, lexeme));
        i += 1;
    }
    Ok(out)
}

struct Parser<'a> {
    lexemes: &'a [Positioned],
    pos: usize,
    ans: f64,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Lexeme> {
        self.lexemes.get(self.pos).map(|(_, lexeme)| *lexeme)
    }

    fn position(&self) -> usize {
        self.lexemes
            .get(self.pos)
            .map_or_else(|| self.lexemes.len(), |(position, _)| *position)
    }

    fn bump(&mut self) -> Option<Lexeme> {
        let next = self.peek();
        if next.is_some() {
            self.pos += 1;
        }
        next
    }

    fn expr(&mut self) -> Result<f64, EvalError> {
        let mut value = self.term()?;
        while let Some(op @ (Lexeme::Plus | Lexeme::Minus)) = self.peek() {
            self.bump();
            let rhs = self.term()?;
            value = if op == Lexeme::Plus {
                value + rhs
            } else {
                value - rhs
            };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, EvalError> {
        let mut value = self.unary()?;
        while let Some(op @ (Lexeme::Times | Lexeme::Divide)) = self.peek() {
            self.bump();
            let rhs = self.unary()?;
            value = if op == Lexeme::Times {
                value * rhs
            } else {
                if rhs == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                value / rhs
            };
        }
        Ok(value)
    }

    // Every recursive path re-enters here, so the depth check lives here.
    fn unary(&mut self) -> Result<f64, EvalError> {
        if self.depth >= MAX_DEPTH {
            return Err(EvalError::TooDeep { limit: MAX_DEPTH });
        }
        self.depth += 1;
        let value = if self.peek() == Some(Lexeme::Minus) {
            self.bump();
            self.unary().map(|v| -v)
        } else {
            self.power()
        };
        self.depth -= 1;
        value
    }

    fn power(&mut self) -> Result<f64, EvalError> {
        let base = self.primary()?;
        match self.peek() {
            Some(Lexeme::Power) => {
                self.bump();
                let exponent = self.unary()?;
                Ok(base.powf(exponent))
            }
            Some(Lexeme::Root) => {
                self.bump();
                let radicand = self.radicand()?;
                nth_root(radicand, base)
            }
            _ => Ok(base),
        }
    }

    fn radicand(&mut self) -> Result<f64, EvalError> {
        if self.peek().is_none() {
            return Err(EvalError::DanglingRoot);
        }
        self.unary()
    }

    fn primary(&mut self) -> Result<f64, EvalError> {
        let position = self.position();
        match self.bump() {
            Some(Lexeme::Number(value)) => Ok(value),
            Some(Lexeme::Ans) => Ok(self.ans),
            Some(Lexeme::LParen) => {
                let value = self.expr()?;
                match self.bump() {
                    Some(Lexeme::RParen) => Ok(value),
                    Some(other) => Err(EvalError::UnexpectedToken {
                        position: self.lexemes[self.pos - 1].0,
                        symbol: other.symbol(),
                    }),
                    None => Err(EvalError::UnmatchedParen { position }),
                }
            }
            Some(Lexeme::Root) => {
                let radicand = self.radicand()?;
                nth_root(radicand, 2.0)
            }
            Some(other) => Err(EvalError::UnexpectedToken {
                position,
                symbol: other.symbol(),
            }),
            None => Err(EvalError::UnexpectedEnd),
        }
    }
}

/// Real `index`-th root of `radicand`; odd integer roots accept negative input.
fn nth_root(radicand: f64, index: f64) -> Result<f64, EvalError> {
    if index == 0.0 {
        return Err(EvalError::ZeroRootIndex);
    }
    let is_odd_integer = index.fract() == 0.0 && index.abs() % 2.0 == 1.0;
    if radicand < 0.0 && is_odd_integer {
        return Ok(-(-radicand).powf(1.0 / index));
    }
    Ok(radicand.powf(1.0 / index))
}

/// Evaluate a token buffer, substituting `ans` for every `Ans` token.
///
/// # Errors
///
/// Returns an [`EvalError`] for empty or malformed buffers, division by zero,
/// and results that are not finite real numbers.
pub fn evaluate(tokens: &[CalcToken], ans: f64) -> Result<f64, EvalError> {
    if tokens.is_empty() {
        return Err(EvalError::Empty);
    }
    let lexemes = lex(tokens)?;
    let mut parser = Parser {
        lexemes: &lexemes,
        pos: 0,
        ans,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(&(position, lexeme)) = lexemes.get(parser.pos) {
        return Err(if lexeme == Lexeme::RParen {
            EvalError::UnmatchedParen { position }
        } else {
            EvalError::UnexpectedToken {
                position,
                symbol: lexeme.symbol(),
            }
        });
    }
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvalError::NonFinite)
    }
}
