use std::fmt;

use colored::*;
use thiserror::Error;

use crate::scanner::{Token, TokenType};

/// Category of every report the pipeline can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lexical,
    Syntax,
    UndefinedVariable,
    TypeMismatch,
    DivisionByZero,
    Output,
}

impl ErrorKind {
    pub fn is_runtime(self) -> bool {
        !matches!(self, ErrorKind::Lexical | ErrorKind::Syntax)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("Unexpected character.")]
    UnexpectedCharacter(char),
    #[error("Unterminated string.")]
    UnterminatedString,
    #[error("Invalid number literal.")]
    InvalidNumber,
}

/// Raised inside the parser once the failure has already been reported;
/// caught at the statement boundary, where the parser resynchronizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeErrorKind {
    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),
    #[error("{0}")]
    TypeMismatch(&'static str),
    #[error("Division by zero is not possible.")]
    DivisionByZero,
    #[error("Failed to write output: {0}")]
    Output(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}")]
pub struct RuntimeError {
    pub token: Token,
    pub kind: RuntimeErrorKind,
}

impl RuntimeError {
    pub fn new(token: &Token, kind: RuntimeErrorKind) -> Self {
        RuntimeError {
            token: token.clone(),
            kind,
        }
    }

    pub fn type_mismatch(token: &Token, message: &'static str) -> Self {
        Self::new(token, RuntimeErrorKind::TypeMismatch(message))
    }

    pub fn error_kind(&self) -> ErrorKind {
        match self.kind {
            RuntimeErrorKind::UndefinedVariable(_) => ErrorKind::UndefinedVariable,
            RuntimeErrorKind::TypeMismatch(_) => ErrorKind::TypeMismatch,
            RuntimeErrorKind::DivisionByZero => ErrorKind::DivisionByZero,
            RuntimeErrorKind::Output(_) => ErrorKind::Output,
        }
    }
}

/// Where in the input a report points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Lexical errors carry no lexeme.
    Source,
    End,
    Lexeme(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub location: Location,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn lexical(line: usize, column: usize, error: &LexError) -> Self {
        Diagnostic {
            kind: ErrorKind::Lexical,
            location: Location::Source,
            line,
            column,
            message: error.to_string(),
        }
    }

    pub fn syntax(token: &Token, message: &str) -> Self {
        let location = if token.tt == TokenType::Eof {
            Location::End
        } else {
            Location::Lexeme(token.lexeme.clone())
        };
        Diagnostic {
            kind: ErrorKind::Syntax,
            location,
            line: token.line,
            column: token.column,
            message: message.to_string(),
        }
    }

    pub fn runtime(error: &RuntimeError) -> Self {
        Diagnostic {
            kind: error.error_kind(),
            location: Location::Lexeme(error.token.lexeme.clone()),
            line: error.token.line,
            column: error.token.column,
            message: error.kind.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind.is_runtime() {
            return write!(f, "{}\n[line {}:{}]", self.message, self.line, self.column);
        }
        let place = match &self.location {
            Location::Source => String::new(),
            Location::End => " at end".to_string(),
            Location::Lexeme(lexeme) => format!(" at '{lexeme}'"),
        };
        write!(f, "Error{place} ({}:{}): {}", self.line, self.column, self.message)
    }
}

/// Accumulates every report of one top-level call, in the order they happened.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    reports: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(kind = ?diagnostic.kind, line = diagnostic.line, "reported: {}", diagnostic.message);
        self.reports.push(diagnostic);
    }

    pub fn had_error(&self) -> bool {
        !self.reports.is_empty()
    }

    pub fn had_runtime_error(&self) -> bool {
        self.reports.iter().any(|d| d.kind.is_runtime())
    }

    pub fn clear(&mut self) {
        self.reports.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.reports.iter()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.reports.iter().map(|d| d.kind).collect()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.reports.iter()
    }
}

/// Writes a report to stderr with a colored kind tag.
pub fn emit(diagnostic: &Diagnostic) {
    let text = diagnostic.to_string();
    if diagnostic.kind.is_runtime() {
        eprintln!("{} {}", format!("[{:?}]", diagnostic.kind).red(), text.red());
    } else {
        eprintln!("{}", text.yellow().bold());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(tt: TokenType, lexeme: &str) -> Token {
        Token::new(tt, lexeme, None, 3, 7)
    }

    #[test]
    fn lexical_report_has_no_place() {
        let d = Diagnostic::lexical(1, 4, &LexError::UnexpectedCharacter('#'));
        assert_eq!(d.to_string(), "Error (1:4): Unexpected character.");
    }

    #[test]
    fn syntax_report_at_end() {
        let d = Diagnostic::syntax(&token(TokenType::Eof, ""), "Expect expression.");
        assert_eq!(d.to_string(), "Error at end (3:7): Expect expression.");
    }

    #[test]
    fn syntax_report_at_lexeme() {
        let d = Diagnostic::syntax(&token(TokenType::Equal, "="), "Invalid assignment target.");
        assert_eq!(d.to_string(), "Error at '=' (3:7): Invalid assignment target.");
    }

    #[test]
    fn runtime_report_on_separate_line() {
        let err = RuntimeError::new(&token(TokenType::Slash, "/"), RuntimeErrorKind::DivisionByZero);
        let d = Diagnostic::runtime(&err);
        assert_eq!(d.kind, ErrorKind::DivisionByZero);
        assert_eq!(d.to_string(), "Division by zero is not possible.\n[line 3:7]");
    }

    #[test]
    fn runtime_flag_ignores_syntax_reports() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.report(Diagnostic::syntax(&token(TokenType::Eof, ""), "Expect ';' after value."));
        assert!(diagnostics.had_error());
        assert!(!diagnostics.had_runtime_error());
        diagnostics.clear();
        assert!(diagnostics.is_empty());
    }
}
