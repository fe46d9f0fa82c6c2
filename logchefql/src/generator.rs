//! ClickHouse SQL generation from a parsed query.
//!
//! Produces WHERE-clause conditions and SELECT lists. Field access depends on the
//! declared type of the base column:
//!
//! | Column type               | Nested path | Generated access                           |
//! |---------------------------|-------------|--------------------------------------------|
//! | `Map(...)`                | yes         | `` `col`['seg1.seg2'] ``                   |
//! | JSON / other / no schema  | yes         | `JSONExtractString(`col`, 'seg1', 'seg2')` |
//! | any                       | no          | `` `col` ``                                |
//!
//! Every string spliced into SQL is escaped by doubling backslashes first and single
//! quotes second.

use crate::ast::{ComparisonOp, Expression, FieldRef, Literal, LogicalOp, Node, Query};
use crate::schema::{ColumnKind, SchemaInfo};
use serde::{Deserialize, Serialize};

/// Options controlling SQL generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorOptions {
    /// Emit comparison values as `?` placeholders and return them in `params`.
    pub parameterized: bool,
}

/// A generated SQL fragment and its bound parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedSql {
    /// The SQL condition. Empty when the query has no filter.
    pub sql: String,
    /// Values for the `?` placeholders, in order. Empty unless parameterized.
    pub params: Vec<Literal>,
}

/// Generates a WHERE condition for `query` using default options.
///
/// Without a schema, dotted keys still read through `JSONExtractString`.
///
/// # Examples
///
/// ```
/// use logchefql::generator::generate;
/// use logchefql::parser::parse_query;
/// use logchefql::schema::SchemaInfo;
///
/// let schema = SchemaInfo::new([("log_attributes", "Map(String, String)")]);
/// let query = parse_query(r#"log_attributes.user.id = "42""#).unwrap();
/// let generated = generate(&query, Some(&schema));
/// assert_eq!(generated.sql, "`log_attributes`['user.id'] = '42'");
/// ```
#[must_use]
pub fn generate(query: &Query, schema: Option<&SchemaInfo>) -> GeneratedSql {
    SqlGenerator::new(schema).generate(query)
}

/// Generates a SELECT list: `default_order_field` first, then `fields` in order.
///
/// # Examples
///
/// ```
/// use logchefql::ast::FieldRef;
/// use logchefql::generator::generate_select_clause;
///
/// let fields = vec![FieldRef::simple("body"), FieldRef::simple("severity_text")];
/// assert_eq!(
///     generate_select_clause(&fields, "timestamp", None),
///     "`timestamp`, `body`, `severity_text`"
/// );
/// ```
#[must_use]
pub fn generate_select_clause(
    fields: &[FieldRef],
    default_order_field: &str,
    schema: Option<&SchemaInfo>,
) -> String {
    SqlGenerator::new(schema).select_clause(fields, default_order_field)
}

/// Schema-aware SQL generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlGenerator<'a> {
    schema: Option<&'a SchemaInfo>,
    options: GeneratorOptions,
}

impl<'a> SqlGenerator<'a> {
    /// Creates a generator. Without a schema, dotted keys read through `JSONExtractString`.
    #[must_use]
    pub fn new(schema: Option<&'a SchemaInfo>) -> Self {
        Self {
            schema,
            options: GeneratorOptions::default(),
        }
    }

    /// Sets the generation options.
    #[must_use]
    pub fn with_options(mut self, options: GeneratorOptions) -> Self {
        self.options = options;
        self
    }

    /// Generates the WHERE condition of a query.
    #[must_use]
    pub fn generate(&self, query: &Query) -> GeneratedSql {
        let mut params = Vec::new();
        let sql = query
            .where_clause
            .as_ref()
            .map(|node| self.node(node, &mut params))
            .unwrap_or_default();

        tracing::trace!(%sql, params = params.len(), "Generated SQL condition");
        GeneratedSql { sql, params }
    }

    /// Generates a SELECT list: `default_order_field` first, then `fields` in order.
    /// Nested accesses are aliased with their dotted path.
    #[must_use]
    pub fn select_clause(&self, fields: &[FieldRef], default_order_field: &str) -> String {
        let mut columns = vec![quote_identifier(default_order_field)];
        columns.extend(fields.iter().map(|field| match field {
            FieldRef::Simple { .. } => self.field_access(field),
            FieldRef::Nested { .. } => format!(
                "{} AS {}",
                self.field_access(field),
                quote_identifier(&field.dotted())
            ),
        }));
        columns.join(", ")
    }

    /// Returns the SQL expression reading `field`.
    #[must_use]
    pub fn field_access(&self, field: &FieldRef) -> String {
        match field {
            FieldRef::Simple { name } => quote_identifier(name),
            FieldRef::Nested { base, path } => {
                let kind = self
                    .schema
                    .map_or(ColumnKind::Unknown, |schema| schema.column_kind(base));
                match kind {
                    ColumnKind::Map => format!(
                        "{}[{}]",
                        quote_identifier(base),
                        quote_string(&path.join("."))
                    ),
                    ColumnKind::Json | ColumnKind::Other | ColumnKind::Unknown => {
                        let segments: Vec<String> =
                            path.iter().map(|segment| quote_string(segment)).collect();
                        format!(
                            "JSONExtractString({}, {})",
                            quote_identifier(base),
                            segments.join(", ")
                        )
                    }
                }
            }
        }
    }

    fn node(&self, node: &Node, params: &mut Vec<Literal>) -> String {
        match node {
            Node::Expression(expression) => self.expression(expression, params),
            Node::Logical { operator, children } => self.join(*operator, children, params),
            Node::Group { children } => {
                format!("({})", self.join(LogicalOp::And, children, params))
            }
        }
    }

    /// Joins children with `operator`, parenthesizing children that join with a
    /// different operator.
    fn join(&self, operator: LogicalOp, children: &[Node], params: &mut Vec<Literal>) -> String {
        let parts: Vec<String> = children
            .iter()
            .map(|child| {
                let sql = self.node(child, params);
                match child {
                    Node::Logical {
                        operator: inner, ..
                    } if *inner != operator => format!("({sql})"),
                    _ => sql,
                }
            })
            .collect();
        parts.join(&format!(" {operator} "))
    }

    fn expression(&self, expression: &Expression, params: &mut Vec<Literal>) -> String {
        let access = self.field_access(&expression.field);

        match (expression.operator, &expression.value) {
            (ComparisonOp::Eq, Literal::Null) => format!("{access} IS NULL"),
            (ComparisonOp::NotEq, Literal::Null) => format!("{access} IS NOT NULL"),
            (ComparisonOp::Contains, value) => {
                let needle = self.bind(Literal::String(value.as_text()), params);
                format!("positionCaseInsensitive({access}, {needle}) > 0")
            }
            (ComparisonOp::NotContains, value) => {
                let needle = self.bind(Literal::String(value.as_text()), params);
                format!("positionCaseInsensitive({access}, {needle}) = 0")
            }
            (operator, value) => {
                let rendered = self.bind(value.clone(), params);
                format!("{access} {operator} {rendered}")
            }
        }
    }

    /// Renders a literal inline, or as a placeholder in parameterized mode.
    fn bind(&self, value: Literal, params: &mut Vec<Literal>) -> String {
        if value == Literal::Null {
            return "NULL".to_string();
        }
        if self.options.parameterized {
            params.push(value);
            return "?".to_string();
        }
        render_literal(&value)
    }
}

/// Renders a literal as an inline SQL value.
#[must_use]
pub fn render_literal(value: &Literal) -> String {
    match value {
        Literal::String(s) => quote_string(s),
        Literal::Integer(i) => i.to_string(),
        Literal::Float(f) => f.to_string(),
        Literal::Boolean(b) => b.to_string(),
        Literal::Null => "NULL".to_string(),
    }
}

/// Escapes a string for use inside a single-quoted SQL literal.
///
/// Backslashes are doubled before single quotes so that neither can terminate the
/// literal early.
#[must_use]
pub fn escape_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "''")
}

/// Escapes and single-quotes a string.
#[must_use]
pub fn quote_string(value: &str) -> String {
    format!("'{}'", escape_string(value))
}

/// Backtick-quotes an identifier, escaping backslashes and backticks.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_query;

    fn sql(input: &str, schema: Option<&SchemaInfo>) -> String {
        let query = parse_query(input).unwrap();
        generate(&query, schema).sql
    }

    fn map_schema() -> SchemaInfo {
        SchemaInfo::new([("log_attributes", "Map(String, String)")])
    }

    fn json_schema() -> SchemaInfo {
        SchemaInfo::new([("log_attributes", "JSON")])
    }

    #[test]
    fn test_escape_order() {
        assert_eq!(escape_string("user's"), "user''s");
        assert_eq!(escape_string(r"a\b"), r"a\\b");
        // Backslash before quote: both must be neutralized.
        assert_eq!(escape_string(r"\'"), r"\\''");
    }

    #[test]
    fn test_simple_equality() {
        assert_eq!(sql(r#"level = "error""#, None), "`level` = 'error'");
    }

    #[test]
    fn test_value_with_quote_is_escaped() {
        assert_eq!(sql(r#"user = "user's""#, None), "`user` = 'user''s'");
    }

    #[test]
    fn test_value_with_backslash_is_escaped() {
        assert_eq!(sql(r#"path = 'C:\\temp'"#, None), r"`path` = 'C:\\temp'");
    }

    #[test]
    fn test_quoted_vs_unquoted_numbers() {
        assert_eq!(sql(r#"status = "200""#, None), "`status` = '200'");
        assert_eq!(sql("status = 200", None), "`status` = 200");
        assert_eq!(sql("ratio >= 0.5", None), "`ratio` >= 0.5");
        assert_eq!(sql("ok = true", None), "`ok` = true");
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(sql("a != 1", None), "`a` != 1");
        assert_eq!(sql("a > 1", None), "`a` > 1");
        assert_eq!(sql("a < 1", None), "`a` < 1");
        assert_eq!(sql("a >= 1", None), "`a` >= 1");
        assert_eq!(sql("a <= 1", None), "`a` <= 1");
    }

    #[test]
    fn test_contains_operators() {
        assert_eq!(
            sql(r#"body ~ "timeout""#, None),
            "positionCaseInsensitive(`body`, 'timeout') > 0"
        );
        assert_eq!(
            sql(r#"body !~ "timeout""#, None),
            "positionCaseInsensitive(`body`, 'timeout') = 0"
        );
        assert_eq!(
            sql("body ~ 42", None),
            "positionCaseInsensitive(`body`, '42') > 0"
        );
    }

    #[test]
    fn test_null_comparisons() {
        assert_eq!(sql("trace_id = null", None), "`trace_id` IS NULL");
        assert_eq!(sql("trace_id != NULL", None), "`trace_id` IS NOT NULL");
        assert_eq!(sql(r#"trace_id = "null""#, None), "`trace_id` = 'null'");
    }

    #[test]
    fn test_map_access() {
        assert_eq!(
            sql(r#"log_attributes.a.b = "x""#, Some(&map_schema())),
            "`log_attributes`['a.b'] = 'x'"
        );
    }

    #[test]
    fn test_json_access() {
        assert_eq!(
            sql(r#"log_attributes.a.b = "x""#, Some(&json_schema())),
            "JSONExtractString(`log_attributes`, 'a', 'b') = 'x'"
        );
    }

    #[test]
    fn test_nested_access_without_type_information() {
        assert_eq!(
            sql(r#"attrs.user = "x""#, None),
            "JSONExtractString(`attrs`, 'user') = 'x'"
        );
        assert_eq!(
            sql(r#"attrs.user = "x""#, Some(&map_schema())),
            "JSONExtractString(`attrs`, 'user') = 'x'"
        );
    }

    #[test]
    fn test_plain_column_ignores_schema_type() {
        assert_eq!(
            sql(r#"log_attributes = "x""#, Some(&map_schema())),
            "`log_attributes` = 'x'"
        );
    }

    #[test]
    fn test_quoted_segments_are_escaped() {
        assert_eq!(
            sql(r#"log_attributes."user's key" = "x""#, Some(&map_schema())),
            "`log_attributes`['user''s key'] = 'x'"
        );
        assert_eq!(
            sql(r#"log_attributes."user's key".id = 1"#, Some(&json_schema())),
            "JSONExtractString(`log_attributes`, 'user''s key', 'id') = 1"
        );
        // Escapes inside quoted segments are kept verbatim, then escaped for SQL.
        assert_eq!(
            sql(r#"log_attributes."a\"b" = 1"#, Some(&map_schema())),
            r#"`log_attributes`['a\\"b'] = 1"#
        );
    }

    #[test]
    fn test_identifier_escaping() {
        assert_eq!(quote_identifier("we`ird"), "`we\\`ird`");
    }

    #[test]
    fn test_logical_join() {
        assert_eq!(
            sql(r#"a = "1" and b = "2" and c = "3""#, None),
            "`a` = '1' AND `b` = '2' AND `c` = '3'"
        );
        assert_eq!(sql("a = 1 or b = 2", None), "`a` = 1 OR `b` = 2");
    }

    #[test]
    fn test_mixed_operators_are_parenthesized() {
        assert_eq!(
            sql("a = 1 or b = 2 and c = 3", None),
            "(`a` = 1 OR `b` = 2) AND `c` = 3"
        );
        assert_eq!(
            sql("a = 1 and (b = 2 or c = 3)", None),
            "`a` = 1 AND (`b` = 2 OR `c` = 3)"
        );
        assert_eq!(
            sql("(a = 1 and b = 2) and c = 3", None),
            "`a` = 1 AND `b` = 2 AND `c` = 3"
        );
    }

    #[test]
    fn test_group_node() {
        assert_eq!(
            sql("((a = 1) (b = 2 or c = 3))", None),
            "(`a` = 1 AND (`b` = 2 OR `c` = 3))"
        );
    }

    #[test]
    fn test_empty_query_generates_nothing() {
        let generated = generate(&Query::new(), None);
        assert!(generated.sql.is_empty());
        assert!(generated.params.is_empty());
    }

    #[test]
    fn test_parameterized_mode() {
        let query = parse_query(r#"level = "error" and status >= 500 and body ~ "fail""#).unwrap();
        let generated = SqlGenerator::new(None)
            .with_options(GeneratorOptions {
                parameterized: true,
            })
            .generate(&query);
        assert_eq!(
            generated.sql,
            "`level` = ? AND `status` >= ? AND positionCaseInsensitive(`body`, ?) > 0"
        );
        assert_eq!(
            generated.params,
            vec![
                Literal::String("error".into()),
                Literal::Integer(500),
                Literal::String("fail".into()),
            ]
        );
    }

    #[test]
    fn test_parameterized_null_is_not_bound() {
        let query = parse_query("trace_id != null and span_id > null").unwrap();
        let generated = SqlGenerator::new(None)
            .with_options(GeneratorOptions {
                parameterized: true,
            })
            .generate(&query);
        assert_eq!(generated.sql, "`trace_id` IS NOT NULL AND `span_id` > NULL");
        assert!(generated.params.is_empty());
    }

    #[test]
    fn test_select_clause() {
        let fields = vec![
            FieldRef::simple("body"),
            FieldRef::nested("log_attributes", vec!["user".into(), "id".into()]),
        ];
        assert_eq!(
            generate_select_clause(&fields, "timestamp", Some(&map_schema())),
            "`timestamp`, `body`, `log_attributes`['user.id'] AS `log_attributes.user.id`"
        );
        assert_eq!(
            generate_select_clause(&fields, "timestamp", Some(&json_schema())),
            "`timestamp`, `body`, JSONExtractString(`log_attributes`, 'user', 'id') AS `log_attributes.user.id`"
        );
    }

    #[test]
    fn test_select_clause_default_only() {
        assert_eq!(generate_select_clause(&[], "timestamp", None), "`timestamp`");
    }

    #[test]
    fn test_generation_is_idempotent() {
        let schema = map_schema();
        let query = parse_query(r#"log_attributes.k ~ "v" or level = "warn""#).unwrap();
        let first = generate(&query, Some(&schema));
        for _ in 0..3 {
            assert_eq!(generate(&query, Some(&schema)), first);
        }
    }
}
