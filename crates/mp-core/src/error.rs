use crate::types::SourceSpan;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{code}: {message}")]
pub struct ProblemError {
    pub code: String,
    pub message: String,
    pub span: Option<SourceSpan>,
}

impl ProblemError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            span: None,
        }
    }

    pub fn with_span(
        code: impl Into<String>,
        message: impl Into<String>,
        span: SourceSpan,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            span: Some(span),
        }
    }

    /// Shorthand for the invalid-argument failure raised by malformed responses.
    pub fn invalid_answer(message: impl Into<String>) -> Self {
        Self::new("ANSWER_INVALID", message)
    }
}
