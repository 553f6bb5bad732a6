//! CosmoSQL CLI
//!
//! Command-line interface for CosmoSQL:
//! - Run a query against the configured store
//! - Parse a query and show its canonical form
//! - Write a default config file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cosmosql::config::{generate_default_config, Config, LoggingConfig};
use cosmosql::query::Query;
use cosmosql::store::Backend;
use cosmosql::value::Value;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "cosmosql")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "One query language for a JSON document store and SQLite")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: platform config dir, then ./cosmosql.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Storage backend (json, sqlite)
    #[arg(short, long, global = true)]
    pub backend: Option<Backend>,

    /// Document file or SQLite database path
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Pretty-print the document file with this many spaces
    #[arg(long, global = true)]
    pub indent: Option<usize>,

    /// Write document file keys in sorted order
    #[arg(long, global = true)]
    pub sort_keys: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a query
    Run {
        /// Query text, e.g. 'get artists{where(songs > ?)}'
        query: String,
        /// Value for the next `?` placeholder (repeatable)
        #[arg(long = "bind")]
        bind: Vec<String>,
    },

    /// Parse a query and print its canonical form
    Parse {
        /// Query text
        query: String,
    },

    /// Write a default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(backend) = cli.backend {
        config.connection.backend = backend;
    }
    if let Some(database) = &cli.database {
        config.connection.database = database.clone();
    }
    if cli.indent.is_some() {
        config.connection.indent = cli.indent;
    }
    if cli.sort_keys {
        config.connection.sort_keys = true;
    }

    init_logging(&config.logging);

    match cli.command {
        Commands::Run { query, bind } => {
            let query = Query::parse(&query)?;
            let bindings: Vec<Value> = bind.iter().map(|raw| parse_binding(raw)).collect();

            tracing::info!(
                backend = %config.connection.backend,
                database = %config.connection.database,
                "Running {} on {}",
                query.kind,
                query.selector.document
            );
            let outcome = config
                .connection
                .backend
                .execute(config.connection.connection(), &query, &bindings)
                .with_context(|| format!("query failed: {}", query))?;

            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }

        Commands::Parse { query } => {
            let query = Query::parse(&query)?;
            println!("{}", query);
            println!();
            println!("{:#?}", query);
        }

        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("failed to write {:?}", path))?;
                    tracing::info!("Wrote default config to {:?}", path);
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}

/// A DSL literal, or plain text when it is not one
fn parse_binding(raw: &str) -> Value {
    raw.parse()
        .unwrap_or_else(|_| Value::Text(raw.to_string()))
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cosmosql={}", logging.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
