//! Abstract Syntax Tree definitions for LogChefQL.
//!
//! A parsed query has an optional filter tree and an optional list of selected
//! fields. `Display` renders every node back into LogChefQL text.

use serde::{Deserialize, Serialize};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    /// Equal (=, ==)
    Eq,
    /// Not equal (!=)
    NotEq,
    /// Case-insensitive substring match (~)
    Contains,
    /// Negated case-insensitive substring match (!~)
    NotContains,
    /// Greater than (>)
    Gt,
    /// Less than (<)
    Lt,
    /// Greater than or equal (>=)
    GtEq,
    /// Less than or equal (<=)
    LtEq,
}

impl ComparisonOp {
    /// Maps operator text to an operator. `==` is accepted as an alias for `=`.
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" | "==" => Some(Self::Eq),
            "!=" => Some(Self::NotEq),
            "~" => Some(Self::Contains),
            "!~" => Some(Self::NotContains),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            ">=" => Some(Self::GtEq),
            "<=" => Some(Self::LtEq),
            _ => None,
        }
    }

    /// Returns the canonical symbol.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Contains => "~",
            Self::NotContains => "!~",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::GtEq => ">=",
            Self::LtEq => "<=",
        }
    }
}

impl std::fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Logical operators for combining conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalOp {
    /// Logical AND
    And,
    /// Logical OR
    Or,
}

impl LogicalOp {
    /// Maps `and` / `or` in any letter case.
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        if keyword.eq_ignore_ascii_case("and") {
            Some(Self::And)
        } else if keyword.eq_ignore_ascii_case("or") {
            Some(Self::Or)
        } else {
            None
        }
    }
}

impl std::fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// A literal value on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    /// String value. Quoted input always ends up here.
    String(String),
    /// Integer value within the 53-bit safe range.
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// Boolean value
    Boolean(bool),
    /// `null`
    Null,
}

impl Literal {
    /// Returns a short name of the literal type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Integer(_) | Self::Float(_) => "number",
            Self::Boolean(_) => "boolean",
            Self::Null => "null",
        }
    }

    /// Returns the literal as plain text, without quotes.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Float(fl) => fl.to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::Null => "null".to_string(),
        }
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    if c == '"' || c == '\\' {
                        write!(f, "\\")?;
                    }
                    write!(f, "{c}")?;
                }
                write!(f, "\"")
            }
            other => f.write_str(&other.as_text()),
        }
    }
}

/// A reference to a field, either a plain column or a path into a nested column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldRef {
    /// A plain column name.
    Simple {
        /// Column name.
        name: String,
    },
    /// A dotted path such as `log_attributes.user.id`.
    Nested {
        /// The column holding the nested data.
        base: String,
        /// Path segments below the base column, never empty.
        path: Vec<String>,
    },
}

impl FieldRef {
    /// Creates a plain column reference.
    #[must_use]
    pub fn simple(name: impl Into<String>) -> Self {
        Self::Simple { name: name.into() }
    }

    /// Creates a nested reference. An empty path yields a plain column reference.
    #[must_use]
    pub fn nested(base: impl Into<String>, path: Vec<String>) -> Self {
        if path.is_empty() {
            Self::simple(base)
        } else {
            Self::Nested {
                base: base.into(),
                path,
            }
        }
    }

    /// Returns the column the reference resolves against.
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::Simple { name } => name,
            Self::Nested { base, .. } => base,
        }
    }

    /// Returns the dotted form of the reference (`base.seg1.seg2`).
    #[must_use]
    pub fn dotted(&self) -> String {
        match self {
            Self::Simple { name } => name.clone(),
            Self::Nested { base, path } => format!("{base}.{}", path.join(".")),
        }
    }
}

fn write_segment(f: &mut std::fmt::Formatter<'_>, segment: &str) -> std::fmt::Result {
    let plain = !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | ':' | '-'));
    if plain {
        f.write_str(segment)
    } else {
        write!(f, "\"{segment}\"")
    }
}

impl std::fmt::Display for FieldRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simple { name } => write_segment(f, name),
            Self::Nested { base, path } => {
                write_segment(f, base)?;
                for segment in path {
                    write!(f, ".")?;
                    write_segment(f, segment)?;
                }
                Ok(())
            }
        }
    }
}

/// A single comparison (e.g. `level = "error"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    /// The field being compared.
    pub field: FieldRef,
    /// The comparison operator.
    pub operator: ComparisonOp,
    /// The value to compare against.
    pub value: Literal,
    /// True if the value was written in quotes.
    #[serde(default)]
    pub quoted: bool,
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.value)
    }
}

/// A node of the filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// A single comparison.
    Expression(Expression),
    /// An n-ary AND/OR. Consecutive terms joined by the same operator share one node.
    Logical {
        /// The logical operator joining the children.
        operator: LogicalOp,
        /// At least two children.
        children: Vec<Node>,
    },
    /// A parenthesized group holding several expressions. Single-child groups are
    /// collapsed into their child by the parser.
    Group {
        /// The grouped children, implicitly joined with AND.
        children: Vec<Node>,
    },
}

impl Node {
    /// Returns the logical operator joining this node's children, if any.
    #[must_use]
    pub fn logical_operator(&self) -> Option<LogicalOp> {
        match self {
            Self::Logical { operator, .. } => Some(*operator),
            Self::Group { .. } => Some(LogicalOp::And),
            Self::Expression(_) => None,
        }
    }

    /// Returns the number of comparisons in the tree.
    #[must_use]
    pub fn expression_count(&self) -> usize {
        match self {
            Self::Expression(_) => 1,
            Self::Logical { children, .. } | Self::Group { children } => {
                children.iter().map(Self::expression_count).sum()
            }
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expression(e) => write!(f, "{e}"),
            Self::Logical { operator, children } => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", operator.to_string().to_lowercase())?;
                    }
                    match child.logical_operator() {
                        Some(op) if op != *operator && !matches!(child, Self::Group { .. }) => {
                            write!(f, "({child})")?;
                        }
                        _ => write!(f, "{child}")?,
                    }
                }
                Ok(())
            }
            Self::Group { children } => {
                write!(f, "(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " and ")?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A parsed LogChefQL query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// The filter, absent when the query only selects fields.
    pub where_clause: Option<Node>,
    /// Fields listed after `|`, in input order.
    #[serde(default)]
    pub select: Vec<FieldRef>,
}

impl Query {
    /// Creates an empty query (no filter, no selection).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter.
    #[must_use]
    pub fn with_where(mut self, node: Node) -> Self {
        self.where_clause = Some(node);
        self
    }

    /// Adds a selected field.
    #[must_use]
    pub fn with_select(mut self, field: FieldRef) -> Self {
        self.select.push(field);
        self
    }

    /// Returns true if the query neither filters nor selects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.where_clause.is_none() && self.select.is_empty()
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref node) = self.where_clause {
            write!(f, "{node}")?;
        }

        if !self.select.is_empty() {
            if self.where_clause.is_some() {
                write!(f, " ")?;
            }
            write!(f, "| ")?;
            for (i, field) in self.select.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{field}")?;
            }
        }

        Ok(())
    }
}
