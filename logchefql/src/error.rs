//! Error taxonomy shared by the tokenizer and parser.
//!
//! Neither stage ever fails outright: both return their output together with a list of
//! errors. Every error carries a machine-readable code, a human-readable message and the
//! position where it was detected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A 1-based location in the query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Line number, starting at 1.
    pub line: usize,
    /// Column number, starting at 1. Reset on every newline.
    pub column: usize,
}

impl Position {
    /// Creates a new position.
    #[must_use]
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Codes for lexical errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LexErrorCode {
    /// A quoted string or quoted key segment was never closed.
    UnterminatedString,
    /// A character that cannot start any token.
    UnexpectedCharacter,
}

impl LexErrorCode {
    /// Returns the wire name of the code (e.g. `UNTERMINATED_STRING`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnterminatedString => "UNTERMINATED_STRING",
            Self::UnexpectedCharacter => "UNEXPECTED_CHARACTER",
        }
    }

    /// Returns a short hint for the user.
    #[must_use]
    pub fn suggestion(self) -> &'static str {
        match self {
            Self::UnterminatedString => "Add the missing closing quote",
            Self::UnexpectedCharacter => "Remove the character or quote the value",
        }
    }
}

impl std::fmt::Display for LexErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error produced while tokenizing.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message} at {position}")]
pub struct LexError {
    /// The error code.
    pub code: LexErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Where the offending token started.
    pub position: Position,
}

impl LexError {
    /// Creates a new lexical error.
    #[must_use]
    pub fn new(code: LexErrorCode, message: impl Into<String>, position: Position) -> Self {
        Self {
            code,
            message: message.into(),
            position,
        }
    }
}

/// Codes for parse errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParseErrorCode {
    /// Input ended where more tokens were required.
    UnexpectedEnd,
    /// A token appeared where it is not allowed.
    UnexpectedToken,
    /// A field name was not followed by a comparison operator.
    ExpectedOperator,
    /// A comparison operator was not followed by a value.
    ExpectedValue,
    /// A group was opened but never closed.
    ExpectedClosingParen,
    /// Operator text outside `=`, `!=`, `~`, `!~`, `>`, `<`, `>=`, `<=`.
    UnknownOperator,
    /// Boolean operator text other than `and` / `or`.
    UnknownBooleanOperator,
    /// A token of the wrong kind was used as a field name.
    InvalidTokenType,
    /// Recoverable structural problem (missing boolean operator).
    ParseError,
}

impl ParseErrorCode {
    /// Returns the wire name of the code (e.g. `EXPECTED_VALUE`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnexpectedEnd => "UNEXPECTED_END",
            Self::UnexpectedToken => "UNEXPECTED_TOKEN",
            Self::ExpectedOperator => "EXPECTED_OPERATOR",
            Self::ExpectedValue => "EXPECTED_VALUE",
            Self::ExpectedClosingParen => "EXPECTED_CLOSING_PAREN",
            Self::UnknownOperator => "UNKNOWN_OPERATOR",
            Self::UnknownBooleanOperator => "UNKNOWN_BOOLEAN_OPERATOR",
            Self::InvalidTokenType => "INVALID_TOKEN_TYPE",
            Self::ParseError => "PARSE_ERROR",
        }
    }

    /// Returns a short hint for the user.
    #[must_use]
    pub fn suggestion(self) -> &'static str {
        match self {
            Self::UnexpectedEnd => "Complete the expression",
            Self::UnexpectedToken => "Check the query syntax near this token",
            Self::ExpectedOperator => "Use one of =, !=, ~, !~, >, <, >=, <=",
            Self::ExpectedValue => "Add a value after the operator, e.g. level = \"error\"",
            Self::ExpectedClosingParen => "Add the missing ')'",
            Self::UnknownOperator => "Use one of =, !=, ~, !~, >, <, >=, <=",
            Self::UnknownBooleanOperator => "Combine conditions with 'and' or 'or'",
            Self::InvalidTokenType => "Field names must not be quoted on their own",
            Self::ParseError => "Insert 'and' or 'or' between conditions",
        }
    }
}

impl std::fmt::Display for ParseErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error produced while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message} at {position}")]
pub struct ParseError {
    /// The error code.
    pub code: ParseErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Position of the token where the error was detected.
    pub position: Position,
}

impl ParseError {
    /// Creates a new parse error.
    #[must_use]
    pub fn new(code: ParseErrorCode, message: impl Into<String>, position: Position) -> Self {
        Self {
            code,
            message: message.into(),
            position,
        }
    }

    /// Returns true if the parser produced a best-effort AST despite this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.code == ParseErrorCode::ParseError
    }
}

/// Severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The query cannot be compiled.
    Error,
    /// The query compiled from a best-effort AST.
    Warning,
}

/// A lexical or parse error flattened for editor tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Wire name of the error code.
    pub code: String,
    /// Human-readable description.
    pub message: String,
    /// Where the problem was detected.
    pub position: Position,
    /// Whether the problem blocks compilation.
    pub severity: Severity,
    /// A short hint for fixing the problem.
    pub suggestion: String,
}

impl Diagnostic {
    /// Returns true if this diagnostic blocks compilation.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl From<&LexError> for Diagnostic {
    fn from(e: &LexError) -> Self {
        Self {
            code: e.code.as_str().to_string(),
            message: e.message.clone(),
            position: e.position,
            severity: Severity::Error,
            suggestion: e.code.suggestion().to_string(),
        }
    }
}

impl From<&ParseError> for Diagnostic {
    fn from(e: &ParseError) -> Self {
        Self {
            code: e.code.as_str().to_string(),
            message: e.message.clone(),
            position: e.position,
            severity: if e.is_recoverable() {
                Severity::Warning
            } else {
                Severity::Error
            },
            suggestion: e.code.suggestion().to_string(),
        }
    }
}
