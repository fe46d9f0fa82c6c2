//! Recursive-descent parser for LogChefQL.
//!
//! Parses token streams such as:
//! - `level = "error"`
//! - `level = "error" and service = "api"`
//! - `(level = "error" or level = "warn") and log_attributes.user.id = 42`
//! - `level = "error" | msg, service`
//!
//! AND and OR share a single precedence level and are applied left to right.
//! Mixed operators therefore need explicit parentheses to express anything other
//! than left-to-right grouping.

use crate::ast::{ComparisonOp, Expression, FieldRef, Literal, LogicalOp, Node, Query};
use crate::error::{Diagnostic, ParseError, ParseErrorCode, Position};
use crate::tokenizer::{tokenize, Token, TokenKind};
use nom::{
    character::complete::{char, digit1},
    combinator::{all_consuming, opt, recognize},
    IResult, Parser,
};

/// Largest integer a 64-bit float represents exactly (2^53 - 1).
const MAX_SAFE_INTEGER: u64 = 9_007_199_254_740_991;

/// Maximum nesting of parentheses and `and`/`or` switches.
const MAX_DEPTH: usize = 64;

/// The result of parsing a token stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    /// The parsed query. `None` if any non-recoverable error occurred.
    pub ast: Option<Query>,
    /// Every error found, in input order.
    pub errors: Vec<ParseError>,
}

impl ParseOutcome {
    /// Returns true if parsing produced no errors at all.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns true if any error prevented building an AST.
    #[must_use]
    pub fn has_fatal_errors(&self) -> bool {
        self.errors.iter().any(|e| !e.is_recoverable())
    }
}

/// Parses a token stream into a [`Query`].
///
/// Never panics on malformed input. Errors are collected, and parsing continues past
/// the first failure where possible so that several problems can be reported at once.
/// A field name directly following a complete comparison is reported as a missing
/// boolean operator, and `AND` is assumed so that a best-effort AST is still produced.
///
/// # Examples
///
/// ```
/// use logchefql::parser::parse;
/// use logchefql::tokenizer::tokenize;
///
/// let (tokens, _) = tokenize(r#"level = "error" | msg"#);
/// let outcome = parse(&tokens);
/// assert!(outcome.is_clean());
/// assert_eq!(outcome.ast.unwrap().select.len(), 1);
/// ```
#[must_use]
pub fn parse(tokens: &[Token]) -> ParseOutcome {
    let mut cursor = Cursor::new(tokens);
    let query = cursor.query();
    let fatal = cursor.errors.iter().any(|e| !e.is_recoverable());

    ParseOutcome {
        ast: if fatal { None } else { query },
        errors: cursor.errors,
    }
}

/// Tokenizes and parses a query string.
///
/// # Errors
///
/// Returns every lexical and parse diagnostic if the query cannot be compiled. A query
/// that only triggers recoverable diagnostics is returned as `Ok`.
///
/// # Examples
///
/// ```
/// use logchefql::parser::parse_query;
///
/// let query = parse_query(r#"service = "api""#).unwrap();
/// assert!(query.where_clause.is_some());
/// assert!(parse_query(r#"service = "api"#).is_err());
/// ```
pub fn parse_query(input: &str) -> Result<Query, Vec<Diagnostic>> {
    let (tokens, lex_errors) = tokenize(input);
    let outcome = parse(&tokens);

    if !lex_errors.is_empty() || outcome.has_fatal_errors() {
        let mut diagnostics: Vec<Diagnostic> = lex_errors.iter().map(Diagnostic::from).collect();
        diagnostics.extend(outcome.errors.iter().map(Diagnostic::from));
        return Err(diagnostics);
    }

    Ok(outcome.ast.unwrap_or_default())
}

// ============================================================================
// Cursor state
// ============================================================================

/// Cursor over the token slice.
struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    errors: Vec<ParseError>,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            errors: Vec::new(),
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&mut self, code: ParseErrorCode, message: impl Into<String>, position: Position) {
        self.errors.push(ParseError::new(code, message, position));
    }

    /// Position reported for errors at end of input.
    fn end_position(&self) -> Position {
        self.tokens
            .last()
            .map_or_else(Position::default, |t| t.position)
    }

    // ========================================================================
    // query := whereClause ('|' selectList)?
    // ========================================================================

    fn query(&mut self) -> Option<Query> {
        let mut query = Query::new();

        if !matches!(self.peek_kind(), None | Some(TokenKind::Pipe)) {
            match self.expression() {
                Some(node) => query.where_clause = Some(node),
                None => {
                    self.recover();
                    return None;
                }
            }
        }

        match self.next() {
            None => {}
            Some(token) if token.kind == TokenKind::Pipe => {
                query.select = self.select_list(token);
            }
            Some(token) if token.kind == TokenKind::Paren && token.text == ")" => {
                self.error(
                    ParseErrorCode::UnexpectedToken,
                    "Unmatched ')'",
                    token.position,
                );
            }
            Some(token) => {
                self.error(
                    ParseErrorCode::UnexpectedToken,
                    format!("Unexpected {} '{}'", token.kind, token.text),
                    token.position,
                );
            }
        }

        Some(query)
    }

    /// Skips past a failed expression, parsing later terms only to report their errors.
    fn recover(&mut self) {
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Pipe => return,
                TokenKind::Bool => {
                    self.pos += 1;
                    let _ = self.expression();
                }
                _ => self.pos += 1,
            }
        }
    }

    // ========================================================================
    // expression := primary (boolOp primary)*
    // ========================================================================

    fn expression(&mut self) -> Option<Node> {
        let base = self.depth;
        let node = self.logical_chain();
        self.depth = base;
        node
    }

    /// Each switch between `and` and `or` nests the tree one level deeper, so it
    /// counts against the same depth limit as parentheses.
    fn logical_chain(&mut self) -> Option<Node> {
        let mut node = self.primary()?;

        loop {
            let (operator, position) = match self.peek() {
                Some(token) if token.kind == TokenKind::Bool => {
                    self.pos += 1;
                    let Some(operator) = LogicalOp::from_keyword(&token.text) else {
                        self.error(
                            ParseErrorCode::UnknownBooleanOperator,
                            format!("Unknown boolean operator '{}'", token.text),
                            token.position,
                        );
                        return None;
                    };
                    (operator, token.position)
                }
                Some(token) if token.kind == TokenKind::Key => {
                    self.error(
                        ParseErrorCode::ParseError,
                        format!("missing boolean operator before '{}'", token.text),
                        token.position,
                    );
                    (LogicalOp::And, token.position)
                }
                _ => break,
            };

            let extends_run =
                matches!(&node, Node::Logical { operator: existing, .. } if *existing == operator);
            if !extends_run {
                if self.depth >= MAX_DEPTH {
                    self.error(
                        ParseErrorCode::UnexpectedToken,
                        "Boolean operators nested too deeply",
                        position,
                    );
                    return None;
                }
                self.depth += 1;
            }

            let rhs = self.primary()?;
            node = combine(node, operator, rhs);
        }

        Some(node)
    }

    // ========================================================================
    // primary := '(' expression+ ')' | key operator value
    // ========================================================================

    fn primary(&mut self) -> Option<Node> {
        let Some(token) = self.peek() else {
            self.error(
                ParseErrorCode::UnexpectedEnd,
                "Unexpected end of query, expected a condition",
                self.end_position(),
            );
            return None;
        };

        match token.kind {
            TokenKind::Paren if token.text == "(" => {
                self.pos += 1;
                self.group(token)
            }
            TokenKind::Key => {
                self.pos += 1;
                let field = split_key(&token.text);
                self.comparison(field, token)
            }
            TokenKind::Value => {
                self.pos += 1;
                if self.peek_kind() == Some(TokenKind::Operator) {
                    return self.comparison(FieldRef::simple(token.text.clone()), token);
                }
                self.error(
                    ParseErrorCode::InvalidTokenType,
                    format!("Expected a field name, found value '{}'", token.text),
                    token.position,
                );
                None
            }
            _ => {
                self.error(
                    ParseErrorCode::UnexpectedToken,
                    format!("Unexpected {} '{}', expected a condition", token.kind, token.text),
                    token.position,
                );
                None
            }
        }
    }

    fn group(&mut self, open: &'a Token) -> Option<Node> {
        if self.depth >= MAX_DEPTH {
            self.error(
                ParseErrorCode::UnexpectedToken,
                "Parentheses nested too deeply",
                open.position,
            );
            return None;
        }

        self.depth += 1;
        let node = self.group_children(open);
        self.depth -= 1;
        node
    }

    fn group_children(&mut self, open: &'a Token) -> Option<Node> {
        let mut children = Vec::new();

        loop {
            match self.peek() {
                None => {
                    self.error(
                        ParseErrorCode::ExpectedClosingParen,
                        "Missing closing parenthesis",
                        open.position,
                    );
                    return None;
                }
                Some(token) if token.kind == TokenKind::Paren && token.text == ")" => {
                    self.pos += 1;
                    if children.is_empty() {
                        self.error(
                            ParseErrorCode::UnexpectedToken,
                            "Empty parentheses",
                            token.position,
                        );
                        return None;
                    }
                    break;
                }
                Some(token) if token.kind == TokenKind::Pipe => {
                    self.error(
                        ParseErrorCode::ExpectedClosingParen,
                        "Missing closing parenthesis before '|'",
                        token.position,
                    );
                    return None;
                }
                Some(_) => children.push(self.expression()?),
            }
        }

        if children.len() == 1 {
            children.pop()
        } else {
            Some(Node::Group { children })
        }
    }

    fn comparison(&mut self, field: FieldRef, key: &'a Token) -> Option<Node> {
        let (operator, operator_token) = match self.peek() {
            Some(token) if token.kind == TokenKind::Operator => {
                self.pos += 1;
                let Some(operator) = ComparisonOp::from_symbol(&token.text) else {
                    self.error(
                        ParseErrorCode::UnknownOperator,
                        format!("Unknown operator '{}'", token.text),
                        token.position,
                    );
                    return None;
                };
                (operator, token)
            }
            Some(token) => {
                self.error(
                    ParseErrorCode::ExpectedOperator,
                    format!(
                        "Expected operator after '{}', found '{}'",
                        key.text, token.text
                    ),
                    token.position,
                );
                return None;
            }
            None => {
                self.error(
                    ParseErrorCode::ExpectedOperator,
                    format!("Expected operator after '{}'", key.text),
                    key.position,
                );
                return None;
            }
        };

        let value_token = match self.peek() {
            Some(token) if matches!(token.kind, TokenKind::Value | TokenKind::Key) => {
                self.pos += 1;
                token
            }
            Some(token) => {
                self.error(
                    ParseErrorCode::ExpectedValue,
                    format!(
                        "Expected value after '{}', found '{}'",
                        operator_token.text, token.text
                    ),
                    token.position,
                );
                return None;
            }
            None => {
                self.error(
                    ParseErrorCode::ExpectedValue,
                    format!("Expected value after '{}'", operator_token.text),
                    operator_token.position,
                );
                return None;
            }
        };

        Some(Node::Expression(Expression {
            field,
            operator,
            value: coerce_value(&value_token.text, value_token.quoted),
            quoted: value_token.quoted,
        }))
    }

    // ========================================================================
    // selectList := fieldRef (',' fieldRef)*
    // ========================================================================

    fn select_list(&mut self, pipe: &'a Token) -> Vec<FieldRef> {
        let mut fields = Vec::new();
        let mut separator = pipe;

        loop {
            match self.next() {
                Some(token) if token.kind == TokenKind::Key => {
                    fields.push(split_key(&token.text));
                }
                Some(token) if token.kind == TokenKind::Value && token.quoted => {
                    fields.push(FieldRef::simple(token.text.clone()));
                }
                Some(token) => {
                    self.error(
                        ParseErrorCode::UnexpectedToken,
                        format!("Expected a field name, found '{}'", token.text),
                        token.position,
                    );
                    return fields;
                }
                None => {
                    self.error(
                        ParseErrorCode::UnexpectedEnd,
                        format!("Expected a field name after '{}'", separator.text),
                        separator.position,
                    );
                    return fields;
                }
            }

            match self.next() {
                None => return fields,
                Some(token) if token.kind == TokenKind::Comma => separator = token,
                Some(token) => {
                    self.error(
                        ParseErrorCode::UnexpectedToken,
                        format!("Expected ',' between fields, found '{}'", token.text),
                        token.position,
                    );
                    return fields;
                }
            }
        }
    }
}

/// Appends `rhs` to `lhs`, flattening runs of the same operator into one node.
fn combine(lhs: Node, operator: LogicalOp, rhs: Node) -> Node {
    match lhs {
        Node::Logical {
            operator: existing,
            mut children,
        } if existing == operator => {
            children.push(rhs);
            Node::Logical { operator, children }
        }
        lhs => Node::Logical {
            operator,
            children: vec![lhs, rhs],
        },
    }
}

// ============================================================================
// Key decomposition
// ============================================================================

/// Splits a key on unquoted dots into a base column and path segments.
///
/// Quoted segments lose their surrounding quotes; backslash escapes inside them are
/// kept verbatim so that SQL escaping sees the original characters.
fn split_key(text: &str) -> FieldRef {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quote = None;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match quote {
            Some(_) if c == '\\' => {
                current.push(c);
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if (c == '"' || c == '\'') && current.is_empty() => quote = Some(c),
            None if c == '.' => segments.push(std::mem::take(&mut current)),
            None => current.push(c),
        }
    }
    segments.push(current);
    segments.retain(|s| !s.is_empty());

    let mut segments = segments.into_iter();
    match segments.next() {
        Some(base) => FieldRef::nested(base, segments.collect()),
        None => FieldRef::simple(text),
    }
}

// ============================================================================
// Value coercion
// ============================================================================

fn float_literal(input: &str) -> IResult<&str, &str> {
    recognize((opt(char('-')), digit1, char('.'), digit1)).parse(input)
}

fn integer_literal(input: &str) -> IResult<&str, &str> {
    recognize((opt(char('-')), digit1)).parse(input)
}

/// Converts value text into a literal.
///
/// Quoted values are always strings. Unquoted integers that a 64-bit float cannot
/// represent exactly stay strings.
fn coerce_value(text: &str, quoted: bool) -> Literal {
    if quoted {
        return Literal::String(text.to_string());
    }

    if text.eq_ignore_ascii_case("null") {
        return Literal::Null;
    }
    if text.eq_ignore_ascii_case("true") {
        return Literal::Boolean(true);
    }
    if text.eq_ignore_ascii_case("false") {
        return Literal::Boolean(false);
    }

    if all_consuming(float_literal).parse(text).is_ok() {
        if let Ok(value) = text.parse::<f64>() {
            return Literal::Float(value);
        }
    }

    if all_consuming(integer_literal).parse(text).is_ok() && is_safe_integer(text) {
        if let Ok(value) = text.parse::<i64>() {
            return Literal::Integer(value);
        }
    }

    Literal::String(strip_stray_quotes(text).to_string())
}

fn is_safe_integer(text: &str) -> bool {
    let magnitude = text.strip_prefix('-').unwrap_or(text);
    magnitude
        .parse::<u128>()
        .is_ok_and(|n| n <= u128::from(MAX_SAFE_INTEGER))
}

fn strip_stray_quotes(text: &str) -> &str {
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(input: &str) -> ParseOutcome {
        let (tokens, errors) = tokenize(input);
        assert!(errors.is_empty(), "unexpected lex errors: {errors:?}");
        parse(&tokens)
    }

    fn where_of(input: &str) -> Node {
        let outcome = parse_str(input);
        assert!(outcome.is_clean(), "unexpected errors: {:?}", outcome.errors);
        outcome.ast.unwrap().where_clause.unwrap()
    }

    fn expression_of(input: &str) -> Expression {
        match where_of(input) {
            Node::Expression(e) => e,
            other => panic!("Expected single expression, got {other:?}"),
        }
    }

    fn first_error(input: &str) -> ParseError {
        let outcome = parse_str(input);
        outcome.errors.into_iter().next().expect("expected an error")
    }

    #[test]
    fn test_parse_empty() {
        let outcome = parse(&[]);
        assert!(outcome.is_clean());
        assert_eq!(outcome.ast, Some(Query::new()));
    }

    #[test]
    fn test_parse_simple_expression() {
        let e = expression_of(r#"level = "error""#);
        assert_eq!(e.field, FieldRef::simple("level"));
        assert_eq!(e.operator, ComparisonOp::Eq);
        assert_eq!(e.value, Literal::String("error".to_string()));
        assert!(e.quoted);
    }

    #[test]
    fn test_parse_comparison_operators() {
        let operators = vec![
            ("=", ComparisonOp::Eq),
            ("==", ComparisonOp::Eq),
            ("!=", ComparisonOp::NotEq),
            ("~", ComparisonOp::Contains),
            ("!~", ComparisonOp::NotContains),
            ("<", ComparisonOp::Lt),
            ("<=", ComparisonOp::LtEq),
            (">", ComparisonOp::Gt),
            (">=", ComparisonOp::GtEq),
        ];

        for (op_str, expected_op) in operators {
            let e = expression_of(&format!("count {op_str} 10"));
            assert_eq!(e.operator, expected_op, "Failed for operator {op_str}");
        }
    }

    #[test]
    fn test_quoted_number_stays_string() {
        let e = expression_of(r#"status = "123""#);
        assert_eq!(e.value, Literal::String("123".to_string()));
        assert!(e.quoted);
    }

    #[test]
    fn test_unquoted_number_coerced() {
        let e = expression_of("status = 123");
        assert_eq!(e.value, Literal::Integer(123));
        assert!(!e.quoted);

        assert_eq!(expression_of("delta = -42").value, Literal::Integer(-42));
        assert_eq!(expression_of("ratio = 3.5").value, Literal::Float(3.5));
        assert_eq!(expression_of("ratio = -0.25").value, Literal::Float(-0.25));
    }

    #[test]
    fn test_unsafe_integer_stays_string() {
        assert_eq!(
            expression_of("id = 9007199254740991").value,
            Literal::Integer(9_007_199_254_740_991)
        );
        assert_eq!(
            expression_of("id = 9007199254740992").value,
            Literal::String("9007199254740992".to_string())
        );
        assert_eq!(
            expression_of("id = -123456789012345678901234567890").value,
            Literal::String("-123456789012345678901234567890".to_string())
        );
    }

    #[test]
    fn test_unquoted_keywords_coerced() {
        assert_eq!(expression_of("ok = true").value, Literal::Boolean(true));
        assert_eq!(expression_of("ok = FALSE").value, Literal::Boolean(false));
        assert_eq!(expression_of("user = null").value, Literal::Null);
        assert_eq!(expression_of("user = NULL").value, Literal::Null);
        assert_eq!(
            expression_of(r#"ok = "true""#).value,
            Literal::String("true".to_string())
        );
    }

    #[test]
    fn test_bare_words_stay_strings() {
        assert_eq!(
            expression_of("service = api-gateway").value,
            Literal::String("api-gateway".to_string())
        );
        assert_eq!(
            expression_of("version = 1.2.3").value,
            Literal::String("1.2.3".to_string())
        );
    }

    #[test]
    fn test_stray_quotes_stripped() {
        assert_eq!(coerce_value("\"abc\"", false), Literal::String("abc".into()));
        assert_eq!(coerce_value("'abc'", false), Literal::String("abc".into()));
        assert_eq!(coerce_value("\"", false), Literal::String("\"".into()));
    }

    #[test]
    fn test_nested_path() {
        let e = expression_of(r#"log_attributes.user.id = "123""#);
        assert_eq!(
            e.field,
            FieldRef::nested("log_attributes", vec!["user".into(), "id".into()])
        );
    }

    #[test]
    fn test_nested_path_with_quoted_segment() {
        let e = expression_of(r#"log_attributes."user's key".nested = "x""#);
        assert_eq!(
            e.field,
            FieldRef::nested(
                "log_attributes",
                vec!["user's key".into(), "nested".into()]
            )
        );
    }

    #[test]
    fn test_quoted_segment_keeps_escapes_and_dots() {
        let e = expression_of(r#"attrs."a.b\"c" = 1"#);
        assert_eq!(e.field, FieldRef::nested("attrs", vec![r#"a.b\"c"#.into()]));
    }

    #[test]
    fn test_quoted_field_name() {
        let e = expression_of(r#""user id" = 5"#);
        assert_eq!(e.field, FieldRef::simple("user id"));
        assert_eq!(e.value, Literal::Integer(5));
    }

    #[test]
    fn test_and_flattens() {
        let node = where_of("a = 1 and b = 2 and c = 3");
        match node {
            Node::Logical { operator, children } => {
                assert_eq!(operator, LogicalOp::And);
                assert_eq!(children.len(), 3);
            }
            other => panic!("Expected logical node, got {other:?}"),
        }
    }

    #[test]
    fn test_flat_precedence_left_to_right() {
        // No AND-over-OR precedence: parsed as (a OR b) AND c.
        let node = where_of("a = 1 or b = 2 and c = 3");
        match node {
            Node::Logical { operator, children } => {
                assert_eq!(operator, LogicalOp::And);
                assert_eq!(children.len(), 2);
                assert!(matches!(
                    &children[0],
                    Node::Logical {
                        operator: LogicalOp::Or,
                        ..
                    }
                ));
            }
            other => panic!("Expected logical node, got {other:?}"),
        }
    }

    #[test]
    fn test_bool_operators_case_insensitive() {
        let node = where_of("a = 1 OR b = 2 Or c = 3");
        assert!(matches!(
            node,
            Node::Logical { operator: LogicalOp::Or, ref children } if children.len() == 3
        ));
    }

    #[test]
    fn test_group_collapses_singleton() {
        let e = where_of("(level = \"error\")");
        assert!(matches!(e, Node::Expression(_)));
    }

    #[test]
    fn test_grouped_or_inside_and() {
        let node = where_of(r#"(level = "error" or level = "warn") and service = "api""#);
        match node {
            Node::Logical { operator, children } => {
                assert_eq!(operator, LogicalOp::And);
                assert!(matches!(
                    &children[0],
                    Node::Logical {
                        operator: LogicalOp::Or,
                        ..
                    }
                ));
                assert!(matches!(&children[1], Node::Expression(_)));
            }
            other => panic!("Expected logical node, got {other:?}"),
        }
    }

    #[test]
    fn test_group_with_several_expressions() {
        let node = where_of("((a = 1) (b = 2))");
        match node {
            Node::Group { children } => assert_eq!(children.len(), 2),
            other => panic!("Expected group, got {other:?}"),
        }
    }

    #[test]
    fn test_select_list() {
        let outcome = parse_str(r#"level = "error" | msg, log_attributes.user"#);
        assert!(outcome.is_clean());
        let query = outcome.ast.unwrap();
        assert_eq!(
            query.select,
            vec![
                FieldRef::simple("msg"),
                FieldRef::nested("log_attributes", vec!["user".into()]),
            ]
        );
    }

    #[test]
    fn test_select_without_filter() {
        let outcome = parse_str("| msg, level");
        assert!(outcome.is_clean());
        let query = outcome.ast.unwrap();
        assert!(query.where_clause.is_none());
        assert_eq!(query.select.len(), 2);
    }

    #[test]
    fn test_missing_boolean_operator_recovers() {
        let outcome = parse_str("a = 1 b = 2");
        assert_eq!(outcome.errors.len(), 1);
        let error = &outcome.errors[0];
        assert_eq!(error.code, ParseErrorCode::ParseError);
        assert_eq!(error.message, "missing boolean operator before 'b'");
        assert_eq!(error.position, Position::new(1, 7));
        assert!(!outcome.has_fatal_errors());

        let node = outcome.ast.unwrap().where_clause.unwrap();
        assert!(matches!(
            node,
            Node::Logical { operator: LogicalOp::And, ref children } if children.len() == 2
        ));
    }

    #[test]
    fn test_unexpected_end_after_bool() {
        let outcome = parse_str("a = 1 and");
        assert!(outcome.ast.is_none());
        assert_eq!(outcome.errors[0].code, ParseErrorCode::UnexpectedEnd);
    }

    #[test]
    fn test_expected_operator() {
        assert_eq!(first_error("level").code, ParseErrorCode::ExpectedOperator);
        assert_eq!(
            first_error("level (").code,
            ParseErrorCode::ExpectedOperator
        );
    }

    #[test]
    fn test_expected_value() {
        let err = first_error("level =");
        assert_eq!(err.code, ParseErrorCode::ExpectedValue);
        assert_eq!(err.position, Position::new(1, 7));
        assert_eq!(first_error("level = )").code, ParseErrorCode::ExpectedValue);
    }

    #[test]
    fn test_unknown_operator() {
        let err = first_error("level ! error");
        assert_eq!(err.code, ParseErrorCode::UnknownOperator);
        assert_eq!(err.message, "Unknown operator '!'");
    }

    #[test]
    fn test_unknown_boolean_operator() {
        let tokens = vec![
            Token::new(TokenKind::Key, "a", Position::new(1, 1)),
            Token::new(TokenKind::Operator, "=", Position::new(1, 3)),
            Token::new(TokenKind::Value, "1", Position::new(1, 5)),
            Token::new(TokenKind::Bool, "xor", Position::new(1, 7)),
            Token::new(TokenKind::Key, "b", Position::new(1, 11)),
        ];
        let outcome = parse(&tokens);
        assert!(outcome.ast.is_none());
        assert_eq!(
            outcome.errors[0].code,
            ParseErrorCode::UnknownBooleanOperator
        );
    }

    #[test]
    fn test_missing_closing_paren() {
        let err = first_error("(a = 1 or b = 2");
        assert_eq!(err.code, ParseErrorCode::ExpectedClosingParen);
        assert_eq!(err.position, Position::new(1, 1));
    }

    #[test]
    fn test_unmatched_closing_paren() {
        let err = first_error("a = 1)");
        assert_eq!(err.code, ParseErrorCode::UnexpectedToken);
        assert_eq!(err.message, "Unmatched ')'");
    }

    #[test]
    fn test_value_as_field_name() {
        let err = first_error(r#""error""#);
        assert_eq!(err.code, ParseErrorCode::InvalidTokenType);
    }

    #[test]
    fn test_empty_select_list() {
        let outcome = parse_str("a = 1 |");
        assert!(outcome.ast.is_none());
        assert_eq!(outcome.errors[0].code, ParseErrorCode::UnexpectedEnd);

        let outcome = parse_str("a = 1 | msg,");
        assert_eq!(outcome.errors[0].code, ParseErrorCode::UnexpectedEnd);
    }

    #[test]
    fn test_collects_errors_after_failure() {
        let outcome = parse_str("a = and b ! 2");
        // "and" is read as the value of `a`, then `b ! 2` fails.
        assert_eq!(outcome.errors[0].code, ParseErrorCode::ParseError);
        assert_eq!(outcome.errors[1].code, ParseErrorCode::UnknownOperator);

        let outcome = parse_str("a = 1 and (b = 2 or c) and d ! 4");
        let codes: Vec<ParseErrorCode> = outcome.errors.iter().map(|e| e.code).collect();
        assert_eq!(
            codes,
            vec![ParseErrorCode::ExpectedOperator, ParseErrorCode::UnknownOperator]
        );
    }

    #[test]
    fn test_never_panics_on_garbage() {
        for input in [
            ")", "(", "|", ",", "=", "and", "or or", "a = = b", "((((", "a = 1 | |",
            "| , ,", "\"x\" \"y\"", "a.b. = 1", "a ~",
        ] {
            let (tokens, _) = tokenize(input);
            let _ = parse(&tokens);
        }
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let input = format!("{}a = 1{}", "(".repeat(200), ")".repeat(200));
        let err = first_error(&input);
        assert_eq!(err.code, ParseErrorCode::UnexpectedToken);
        assert_eq!(err.message, "Parentheses nested too deeply");
    }

    #[test]
    fn test_alternating_operators_are_depth_limited() {
        let mut input = String::from("a = 1");
        for i in 0..5000 {
            input.push_str(if i % 2 == 0 { " or a = 1" } else { " and a = 1" });
        }
        let (tokens, _) = tokenize(&input);
        let outcome = parse(&tokens);
        assert!(outcome.ast.is_none());
        assert_eq!(outcome.errors[0].code, ParseErrorCode::UnexpectedToken);
        assert_eq!(outcome.errors[0].message, "Boolean operators nested too deeply");
    }

    #[test]
    fn test_long_same_operator_run_is_flat() {
        let input = vec!["a = 1"; 5000].join(" or ");
        match where_of(&input) {
            Node::Logical { operator, children } => {
                assert_eq!(operator, LogicalOp::Or);
                assert_eq!(children.len(), 5000);
            }
            other => panic!("Expected flat OR node, got {other:?}"),
        }
    }

    #[test]
    fn test_split_key_edge_cases() {
        assert_eq!(split_key("a..b"), FieldRef::nested("a", vec!["b".into()]));
        assert_eq!(split_key("a."), FieldRef::simple("a"));
        assert_eq!(split_key("."), FieldRef::simple("."));
    }
}
