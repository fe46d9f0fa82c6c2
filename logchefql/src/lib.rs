//! LogChefQL
//!
//! A compact filter/select language for log exploration, compiled to ClickHouse SQL
//! fragments. Users type expressions such as `level = "error" and service = "api"` or
//! `log_attributes.user.id = "123"`, optionally followed by `| field1, field2` to pick
//! the columns to display.
//!
//! # Modules
//!
//! - [`tokenizer`] - String to token stream, with lexical errors
//! - [`ast`] - Query, node and literal types
//! - [`parser`] - Token stream to AST, with structured parse errors
//! - [`generator`] - AST to SQL condition and SELECT list
//! - [`schema`] - Column descriptors driving Map/JSON access
//! - [`cache`] - LRU + TTL memoization of compiled queries
//! - [`translator`] - The cached end-to-end pipeline
//!
//! # Example
//!
//! ```
//! use logchefql::schema::SchemaInfo;
//! use logchefql::translator::{TranslateOptions, Translator};
//!
//! let schema = SchemaInfo::new([
//!     ("severity_text", "LowCardinality(String)"),
//!     ("service_name", "LowCardinality(String)"),
//! ]);
//! let translator = Translator::default();
//! let result = translator.translate(
//!     r#"severity_text = "error" and service_name = "api""#,
//!     Some(&schema),
//!     &TranslateOptions::default(),
//! );
//!
//! assert_eq!(result.sql, "`severity_text` = 'error' AND `service_name` = 'api'");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ast;
pub mod cache;
pub mod config;
pub mod error;
pub mod generator;
pub mod parser;
pub mod schema;
pub mod tokenizer;
pub mod translator;

pub use ast::{ComparisonOp, Expression, FieldRef, Literal, LogicalOp, Node, Query};
pub use cache::{CacheStats, CachedQuery, QueryCache};
pub use error::{Diagnostic, LexError, ParseError, Position, Severity};
pub use generator::{generate, generate_select_clause, GeneratedSql, SqlGenerator};
pub use parser::{parse, parse_query, ParseOutcome};
pub use schema::{ColumnInfo, SchemaInfo};
pub use tokenizer::{tokenize, Token, TokenKind};
pub use translator::{validate, TranslateOptions, Translation, Translator};

/// Re-export common dependencies for convenience.
pub use serde_json;
