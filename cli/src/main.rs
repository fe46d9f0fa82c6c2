//! LogChefQL CLI
//!
//! Command-line interface for tokenizing, checking and translating LogChefQL queries.
//!
//! # Usage
//!
//! ```bash
//! lcql --help
//! lcql tokenize 'level = "error"'
//! lcql check 'level = "error" and'
//! lcql translate --schema columns.json 'log_attributes.user.id = "123" | body'
//! ```

#![deny(unsafe_code)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use logchefql::config::CacheConfig;
use logchefql::schema::SchemaInfo;
use logchefql::translator::{validate, TranslateOptions, Translator};
use logchefql::{tokenize, Diagnostic};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// LogChefQL CLI - compile log queries to ClickHouse SQL
#[derive(Parser)]
#[command(name = "lcql")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Pretty-print JSON output
    #[arg(short, long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the token stream of a query
    Tokenize {
        /// The query text
        query: String,
    },
    /// Report diagnostics for a query; exits non-zero on errors
    Check {
        /// The query text
        query: String,
    },
    /// Translate a query to a SQL condition and SELECT list
    Translate {
        /// The query text
        query: String,

        /// JSON file with the table columns: `{"columns": [{"name": ..., "type": ...}]}`
        #[arg(short, long, env = "LOGCHEFQL_SCHEMA")]
        schema: Option<PathBuf>,

        /// Schema version tag used to scope cached results
        #[arg(long)]
        schema_version: Option<String>,

        /// Emit `?` placeholders and a separate parameter list
        #[arg(long)]
        parameterized: bool,

        /// Column placed first in the SELECT list
        #[arg(long, default_value = logchefql::translator::DEFAULT_ORDER_FIELD)]
        order_field: String,
    },
}

#[derive(Serialize)]
struct CheckReport<'a> {
    valid: bool,
    diagnostics: &'a [Diagnostic],
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Tokenize { query }) => {
            let (tokens, errors) = tokenize(&query);
            let diagnostics: Vec<Diagnostic> = errors.iter().map(Diagnostic::from).collect();
            print_json(
                &serde_json::json!({ "tokens": tokens, "diagnostics": diagnostics }),
                cli.pretty,
            )?;
        }
        Some(Commands::Check { query }) => {
            let diagnostics = validate(&query);
            let valid = !diagnostics.iter().any(Diagnostic::is_error);
            print_json(
                &CheckReport {
                    valid,
                    diagnostics: &diagnostics,
                },
                cli.pretty,
            )?;
            if !valid {
                anyhow::bail!("query has {} error(s)", diagnostics.len());
            }
        }
        Some(Commands::Translate {
            query,
            schema,
            schema_version,
            parameterized,
            order_field,
        }) => {
            let config = CacheConfig::from_env().context("Failed to load cache configuration")?;
            let schema = schema.as_deref().map(load_schema).transpose()?;

            let mut options = TranslateOptions::default().with_order_field(order_field);
            if let Some(version) = schema_version {
                options = options.with_schema_version(version);
            }
            if parameterized {
                options = options.parameterized();
            }

            let translator = Translator::from_config(&config);
            let translation = translator.translate(&query, schema.as_ref(), &options);
            tracing::debug!(
                valid = translation.is_valid(),
                diagnostics = translation.diagnostics.len(),
                "Translated query"
            );
            print_json(&translation, cli.pretty)?;
        }
        None => {
            println!("LogChefQL CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

fn load_schema(path: &std::path::Path) -> anyhow::Result<SchemaInfo> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file {}", path.display()))?;
    SchemaInfo::from_json(&json)
        .with_context(|| format!("Invalid schema file {}", path.display()))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}
