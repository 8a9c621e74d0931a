use super::token::{CalcToken, TokenBuffer, render, tokenize, tokens_for_number};
use super::{EvalError, evaluate};

/// Shown in place of the buffer after a failed evaluation.
pub const ERROR_MARKER: &str = "Error";

/// Calculator state owned by the quiz session.
///
/// `last_result` keeps full precision so `Ans` chains do not accumulate the
/// display rounding; only the buffer shows the 4-place value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalculatorSession {
    buffer: TokenBuffer,
    last_result: f64,
    error: Option<EvalError>,
}

impl CalculatorSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a key press. Any pending error marker is cleared first.
    pub fn push(&mut self, token: CalcToken) {
        self.clear_error();
        self.buffer.push(token);
    }

    /// Append every key in `text`.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::UnknownInput`] if `text` contains a character with
    /// no key; the buffer is left untouched in that case.
    pub fn push_str(&mut self, text: &str) -> Result<(), EvalError> {
        let tokens = tokenize(text)?;
        self.clear_error();
        self.buffer.extend(tokens);
        Ok(())
    }

    /// Replace the whole buffer with `tokens`.
    pub fn replace_buffer(&mut self, tokens: &[CalcToken]) {
        self.error = None;
        self.buffer = TokenBuffer::from_slice(tokens);
    }

    pub fn backspace(&mut self) {
        if self.error.take().is_some() {
            return;
        }
        self.buffer.pop();
    }

    /// Empty the buffer; `Ans` survives.
    pub fn clear(&mut self) {
        self.error = None;
        self.buffer.clear();
    }

    /// Empty the buffer and forget the last result.
    pub fn reset(&mut self) {
        self.clear();
        self.last_result = 0.0;
    }

    /// Evaluate the buffer. On success the buffer is replaced with the
    /// rounded result so further keys chain from it.
    ///
    /// # Errors
    ///
    /// Propagates the [`EvalError`]; the buffer then shows [`ERROR_MARKER`]
    /// and `Ans` keeps its previous value.
    pub fn evaluate(&mut self) -> Result<f64, EvalError> {
        match evaluate(&self.buffer, self.last_result) {
            Ok(value) => {
                self.last_result = value;
                self.buffer = tokens_for_number(value);
                self.error = None;
                Ok(value)
            }
            Err(err) => {
                self.buffer.clear();
                self.error = Some(err.clone());
                Err(err)
            }
        }
    }

    #[must_use]
    pub fn display(&self) -> String {
        if self.error.is_some() {
            ERROR_MARKER.to_string()
        } else {
            render(&self.buffer)
        }
    }

    #[must_use]
    pub const fn last_result(&self) -> f64 {
        self.last_result
    }

    #[must_use]
    pub fn buffer(&self) -> &[CalcToken] {
        &self.buffer
    }

    #[must_use]
    pub const fn error(&self) -> Option<&EvalError> {
        self.error.as_ref()
    }

    fn clear_error(&mut self) {
        if self.error.take().is_some() {
            self.buffer.clear();
        }
    }
}
