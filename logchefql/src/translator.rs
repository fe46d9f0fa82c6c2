//! Query translation pipeline.
//!
//! Wraps tokenizing, parsing and SQL generation behind the query cache:
//!
//! ```text
//! cache.get ─ miss ─▶ tokenize ─▶ parse ─▶ generate ─▶ cache.set
//! ```
//!
//! Invalid input never fails the call. It yields an empty condition ("no filter")
//! together with diagnostics for the editor.

use crate::ast::{Literal, Query};
use crate::cache::{CachedQuery, QueryCache};
use crate::config::CacheConfig;
use crate::error::Diagnostic;
use crate::generator::{GeneratorOptions, SqlGenerator};
use crate::parser::parse;
use crate::schema::SchemaInfo;
use crate::tokenizer::tokenize;
use serde::{Deserialize, Serialize};

/// Column listed first in generated SELECT lists unless overridden.
pub const DEFAULT_ORDER_FIELD: &str = "timestamp";

/// Per-call translation options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslateOptions {
    /// Version tag of the schema. Cached results are only reused for the same tag.
    pub schema_version: Option<String>,
    /// Emit `?` placeholders instead of inline values.
    #[serde(default)]
    pub parameterized: bool,
    /// Column placed first in the SELECT list (default: `timestamp`).
    pub order_field: Option<String>,
}

impl TranslateOptions {
    /// Sets the schema version tag.
    #[must_use]
    pub fn with_schema_version(mut self, version: impl Into<String>) -> Self {
        self.schema_version = Some(version.into());
        self
    }

    /// Enables parameterized output.
    #[must_use]
    pub fn parameterized(mut self) -> Self {
        self.parameterized = true;
        self
    }

    /// Sets the column placed first in the SELECT list.
    #[must_use]
    pub fn with_order_field(mut self, field: impl Into<String>) -> Self {
        self.order_field = Some(field.into());
        self
    }
}

/// The result of translating one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    /// The parsed query, absent if the query has blocking errors.
    pub ast: Option<Query>,
    /// The WHERE condition. Empty means "no filter".
    pub sql: String,
    /// Bound parameters for `sql` in parameterized mode.
    pub params: Vec<Literal>,
    /// SELECT list for the fields after `|`, if any were given.
    pub select_clause: Option<String>,
    /// Lexical and parse diagnostics, errors and warnings alike.
    pub diagnostics: Vec<Diagnostic>,
    /// True if the result came from the cache.
    pub cached: bool,
}

impl Translation {
    /// Returns true if no diagnostic blocks the query.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Returns the first diagnostic, the one usually shown inline.
    #[must_use]
    pub fn first_diagnostic(&self) -> Option<&Diagnostic> {
        self.diagnostics.first()
    }
}

/// Cached LogChefQL to SQL translator.
///
/// # Example
///
/// ```
/// use logchefql::schema::SchemaInfo;
/// use logchefql::translator::{TranslateOptions, Translator};
///
/// let translator = Translator::default();
/// let schema = SchemaInfo::new([("log_attributes", "JSON")]);
/// let options = TranslateOptions::default().with_schema_version("v1");
///
/// let result = translator.translate(r#"log_attributes.user = "bob""#, Some(&schema), &options);
/// assert_eq!(result.sql, "JSONExtractString(`log_attributes`, 'user') = 'bob'");
/// assert!(!result.cached);
///
/// let again = translator.translate(r#"log_attributes.user = "bob""#, Some(&schema), &options);
/// assert!(again.cached);
/// ```
#[derive(Debug, Default)]
pub struct Translator {
    cache: QueryCache,
}

impl Translator {
    /// Creates a translator around an existing cache.
    #[must_use]
    pub fn new(cache: QueryCache) -> Self {
        Self { cache }
    }

    /// Creates a translator with a cache built from `config`.
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(QueryCache::from_config(config))
    }

    /// Returns the underlying cache.
    #[must_use]
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Translates a query into a SQL condition.
    ///
    /// Queries with blocking errors produce an empty condition and no AST. Queries with
    /// only recoverable diagnostics are translated from the best-effort AST. Only
    /// diagnostic-free results are cached.
    #[must_use]
    pub fn translate(
        &self,
        query: &str,
        schema: Option<&SchemaInfo>,
        options: &TranslateOptions,
    ) -> Translation {
        let cache_query = cache_input(query, options.parameterized);
        let version = options.schema_version.as_deref();

        if let Some(hit) = self.cache.get(&cache_query, version) {
            tracing::debug!(query, "Query cache hit");
            let select_clause = select_clause(&hit.ast, schema, options);
            return Translation {
                ast: Some(hit.ast),
                sql: hit.sql,
                params: hit.params,
                select_clause,
                diagnostics: Vec::new(),
                cached: true,
            };
        }

        let (tokens, lex_errors) = tokenize(query);
        let outcome = parse(&tokens);

        let mut diagnostics: Vec<Diagnostic> = lex_errors.iter().map(Diagnostic::from).collect();
        diagnostics.extend(outcome.errors.iter().map(Diagnostic::from));

        let ast = match outcome.ast {
            Some(ast) if lex_errors.is_empty() => ast,
            _ => {
                tracing::debug!(
                    query,
                    errors = diagnostics.len(),
                    "Query has errors, falling back to no filter"
                );
                return Translation {
                    ast: None,
                    sql: String::new(),
                    params: Vec::new(),
                    select_clause: None,
                    diagnostics,
                    cached: false,
                };
            }
        };

        let generated = SqlGenerator::new(schema)
            .with_options(GeneratorOptions {
                parameterized: options.parameterized,
            })
            .generate(&ast);

        if diagnostics.is_empty() {
            self.cache.set(
                &cache_query,
                CachedQuery {
                    ast: ast.clone(),
                    sql: generated.sql.clone(),
                    params: generated.params.clone(),
                },
                version,
            );
        } else {
            tracing::debug!(
                query,
                warnings = diagnostics.len(),
                "Translated best-effort query"
            );
        }

        Translation {
            select_clause: select_clause(&ast, schema, options),
            ast: Some(ast),
            sql: generated.sql,
            params: generated.params,
            diagnostics,
            cached: false,
        }
    }
}

/// Returns the diagnostics for a query without generating SQL.
///
/// # Examples
///
/// ```
/// use logchefql::translator::validate;
///
/// assert!(validate(r#"level = "error""#).is_empty());
/// assert_eq!(validate("level =")[0].code, "EXPECTED_VALUE");
/// ```
#[must_use]
pub fn validate(query: &str) -> Vec<Diagnostic> {
    let (tokens, lex_errors) = tokenize(query);
    let outcome = parse(&tokens);

    lex_errors
        .iter()
        .map(Diagnostic::from)
        .chain(outcome.errors.iter().map(Diagnostic::from))
        .collect()
}

/// Cache key input: parameterized output differs from inline output for the same text.
fn cache_input(query: &str, parameterized: bool) -> String {
    if parameterized {
        format!("{query}\u{0}parameterized")
    } else {
        query.to_string()
    }
}

fn select_clause(
    ast: &Query,
    schema: Option<&SchemaInfo>,
    options: &TranslateOptions,
) -> Option<String> {
    if ast.select.is_empty() {
        return None;
    }
    let order_field = options.order_field.as_deref().unwrap_or(DEFAULT_ORDER_FIELD);
    Some(SqlGenerator::new(schema).select_clause(&ast.select, order_field))
}
