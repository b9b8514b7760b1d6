use std::fmt;

/// A syntax error from the `.loom` front end.
///
/// Raised by the lexer and parser, by [`Expression::parse`](crate::Expression::parse)
/// and by the builder API. The first error aborts the parse; there is no recovery.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub message: String,
    /// 1-based source line number where the error occurred.
    pub line: usize,
    /// 1-based source column number where the error occurred.
    pub col: usize,
    /// The offending text when the error came from a standalone snippet
    /// (builder API) rather than a whole source file.
    pub snippet: Option<String>,
}

impl SyntaxError {
    pub(crate) fn new(msg: impl Into<String>, line: usize, col: usize) -> Self {
        Self { message: msg.into(), line, col, snippet: None }
    }

    pub(crate) fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loom syntax error at {}:{}: {}", self.line, self.col, self.message)?;
        if let Some(snippet) = &self.snippet {
            write!(f, " in {:?}", snippet)?;
        }
        Ok(())
    }
}

impl std::error::Error for SyntaxError {}
