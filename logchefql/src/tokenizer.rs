//! Tokenizer for LogChefQL.
//!
//! Turns a raw query string into a flat token stream. The tokenizer never fails:
//! lexical problems are collected alongside the tokens so that editor tooling can
//! highlight whatever was recognized.
//!
//! # Example
//!
//! ```
//! use logchefql::tokenizer::{tokenize, TokenKind};
//!
//! let (tokens, errors) = tokenize(r#"level = "error" and service = api"#);
//! assert!(errors.is_empty());
//! let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
//! assert_eq!(
//!     kinds,
//!     vec![
//!         TokenKind::Key,
//!         TokenKind::Operator,
//!         TokenKind::Value,
//!         TokenKind::Bool,
//!         TokenKind::Key,
//!         TokenKind::Operator,
//!         TokenKind::Value,
//!     ]
//! );
//! ```

use crate::error::{LexError, LexErrorCode, Position};
use serde::{Deserialize, Serialize};

/// The kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// A field name, possibly dotted and with quoted segments.
    Key,
    /// A comparison operator.
    Operator,
    /// A literal value.
    Value,
    /// `(` or `)`.
    Paren,
    /// `|`, separating the filter from the field selection.
    Pipe,
    /// `and` / `or`.
    Bool,
    /// `,`, separating selected fields.
    Comma,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key => write!(f, "key"),
            Self::Operator => write!(f, "operator"),
            Self::Value => write!(f, "value"),
            Self::Paren => write!(f, "paren"),
            Self::Pipe => write!(f, "pipe"),
            Self::Bool => write!(f, "bool"),
            Self::Comma => write!(f, "comma"),
        }
    }
}

/// A single token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The token kind.
    pub kind: TokenKind,
    /// The token text. Standalone quoted values carry their unescaped contents;
    /// keys keep quoted segments verbatim, delimiters included.
    pub text: String,
    /// Where the token starts.
    pub position: Position,
    /// True only if the token came from an explicitly quoted source segment.
    #[serde(default)]
    pub quoted: bool,
}

impl Token {
    /// Creates an unquoted token.
    #[must_use]
    pub fn new(kind: TokenKind, text: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            text: text.into(),
            position,
            quoted: false,
        }
    }

    /// Marks the token as coming from a quoted segment.
    #[must_use]
    pub fn quoted(mut self) -> Self {
        self.quoted = true;
        self
    }
}

/// Tokenizes a query string.
///
/// Returns every token that could be recognized together with any lexical errors.
/// Empty input yields no tokens and no errors.
#[must_use]
pub fn tokenize(input: &str) -> (Vec<Token>, Vec<LexError>) {
    Lexer::new(input).run()
}

/// Characters allowed inside an unquoted key.
fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.')
}

fn is_quote(c: char) -> bool {
    c == '"' || c == '\''
}

fn is_operator_char(c: char) -> bool {
    matches!(c, '=' | '!' | '~' | '>' | '<')
}

/// Cursor over the input with line/column tracking.
struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn run(mut self) -> (Vec<Token>, Vec<LexError>) {
        while let Some(c) = self.current() {
            if c.is_whitespace() {
                self.advance();
                continue;
            }

            let start = self.position();

            if self.in_value_position() && !is_operator_char(c) && !matches!(c, '(' | ')' | '|')
            {
                if is_quote(c) {
                    self.scan_quoted_value(start);
                } else {
                    self.scan_bare_value(start);
                }
                continue;
            }

            match c {
                '(' | ')' => {
                    self.advance();
                    self.push(Token::new(TokenKind::Paren, c, start));
                }
                '|' => {
                    self.advance();
                    self.push(Token::new(TokenKind::Pipe, "|", start));
                }
                ',' => {
                    self.advance();
                    self.push(Token::new(TokenKind::Comma, ",", start));
                }
                c if is_operator_char(c) => self.scan_operator(start),
                c if is_quote(c) || is_key_char(c) => {
                    if !self.try_scan_bool(start) {
                        self.scan_key(start);
                    }
                }
                other => {
                    self.advance();
                    self.errors.push(LexError::new(
                        LexErrorCode::UnexpectedCharacter,
                        format!("Unexpected character '{other}'"),
                        start,
                    ));
                }
            }
        }

        (self.tokens, self.errors)
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(c) = self.current() {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn push(&mut self, token: Token) {
        self.tokens.push(token);
    }

    /// A value follows directly after a comparison operator.
    fn in_value_position(&self) -> bool {
        self.tokens
            .last()
            .is_some_and(|t| t.kind == TokenKind::Operator)
    }

    fn scan_operator(&mut self, start: Position) {
        let Some(first) = self.current() else {
            return;
        };
        self.advance();

        let text = match (first, self.current()) {
            ('>' | '<' | '!', Some('=')) => {
                self.advance();
                format!("{first}=")
            }
            ('=', Some('=')) => {
                self.advance();
                "=".to_string()
            }
            ('!', Some('~')) => {
                self.advance();
                "!~".to_string()
            }
            _ => first.to_string(),
        };

        self.push(Token::new(TokenKind::Operator, text, start));
    }

    /// Emits a `Bool` token if the next word is exactly `and` / `or` followed by a word boundary.
    fn try_scan_bool(&mut self, start: Position) -> bool {
        let mut len = 0;
        while self.peek(len).is_some_and(char::is_alphabetic) {
            len += 1;
        }
        if len == 0 || self.peek(len).is_some_and(is_key_char) {
            return false;
        }

        let word: String = self.chars[self.pos..self.pos + len].iter().collect();
        if !word.eq_ignore_ascii_case("and") && !word.eq_ignore_ascii_case("or") {
            return false;
        }

        for _ in 0..len {
            self.advance();
        }
        self.push(Token::new(TokenKind::Bool, word, start));
        true
    }

    /// Scans a key made of identifier characters and quoted segments.
    ///
    /// A quoted segment may open the key or follow a `.`. A key that is nothing but a
    /// single quoted segment is a standalone literal and is emitted as a `Value`.
    fn scan_key(&mut self, start: Position) {
        let mut text = String::new();
        let mut quoted_segments = 0;
        let mut leading_segment_end = None;

        while let Some(c) = self.current() {
            if is_key_char(c) {
                text.push(c);
                self.advance();
            } else if is_quote(c) && (text.is_empty() || text.ends_with('.')) {
                let at_start = text.is_empty();
                if !self.scan_raw_segment(&mut text, start) {
                    return;
                }
                if at_start {
                    leading_segment_end = Some(text.len());
                }
                quoted_segments += 1;
            } else {
                break;
            }
        }

        if quoted_segments == 1 && leading_segment_end == Some(text.len()) {
            let value = unescape(&text[1..text.len() - 1]);
            self.push(Token::new(TokenKind::Value, value, start).quoted());
            return;
        }

        let mut token = Token::new(TokenKind::Key, text, start);
        if quoted_segments > 0 {
            token = token.quoted();
        }
        self.push(token);
    }

    /// Copies a quoted key segment verbatim (delimiters and escapes included).
    ///
    /// Returns false if the segment is unterminated.
    fn scan_raw_segment(&mut self, text: &mut String, start: Position) -> bool {
        let Some(quote) = self.current() else {
            return false;
        };
        text.push(quote);
        self.advance();

        while let Some(c) = self.current() {
            match c {
                '\\' => {
                    text.push(c);
                    self.advance();
                    if let Some(escaped) = self.current() {
                        text.push(escaped);
                        self.advance();
                    }
                }
                c if c == quote => {
                    text.push(c);
                    self.advance();
                    return true;
                }
                _ => {
                    text.push(c);
                    self.advance();
                }
            }
        }

        self.unterminated(start);
        false
    }

    /// Scans a standalone quoted literal in value position.
    fn scan_quoted_value(&mut self, start: Position) {
        let Some(quote) = self.current() else {
            return;
        };
        self.advance();

        let mut value = String::new();
        while let Some(c) = self.current() {
            match c {
                '\\' => {
                    self.advance();
                    if let Some(escaped) = self.current() {
                        value.push(escaped);
                        self.advance();
                    }
                }
                c if c == quote => {
                    self.advance();
                    self.push(Token::new(TokenKind::Value, value, start).quoted());
                    return;
                }
                _ => {
                    value.push(c);
                    self.advance();
                }
            }
        }

        self.unterminated(start);
    }

    /// Scans an unquoted value up to whitespace, a paren or a pipe.
    fn scan_bare_value(&mut self, start: Position) {
        let mut value = String::new();
        while let Some(c) = self.current() {
            if c.is_whitespace() || matches!(c, '(' | ')' | '|') {
                break;
            }
            value.push(c);
            self.advance();
        }
        self.push(Token::new(TokenKind::Value, value, start));
    }

    fn unterminated(&mut self, start: Position) {
        self.errors.push(LexError::new(
            LexErrorCode::UnterminatedString,
            "Unterminated string",
            start,
        ));
    }
}

/// Resolves backslash escapes: a backslash keeps the following character literally.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
