//! # CosmoSQL
//!
//! A small create/read/update/delete query language with one textual syntax
//! for two very different stores: a schemaless JSON document file evaluated in
//! memory, and a SQLite database reached through parameterized statements.
//!
//! ## Modules
//!
//! - [`query`]: lexer, grammar and normalizer producing a canonical [`Query`]
//! - [`store`]: the build/run contract, the execution harness and both backends
//! - [`value`]: literal values and their tagged JSON form
//! - [`record`]: insertion-ordered maps used for stored documents
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cosmosql::store::{execute_str, Connection, DocumentStore, Outcome};
//! use cosmosql::Value;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut store = DocumentStore::new(Connection::new("artists.json").with_indent(2));
//!
//!     execute_str(&mut store, r#"create artists{set(name = "john", songs = 24)}"#, &[])?;
//!     let outcome = execute_str(
//!         &mut store,
//!         "select artists(name){where(songs > ?), sort(-songs)}",
//!         &[Value::Integer(10)],
//!     )?;
//!
//!     if let Outcome::Records(records) = outcome {
//!         println!("Found {} artists", records.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod query;
pub mod record;
pub mod store;
pub mod value;

// Re-export top-level types for convenience
pub use query::{CrudKind, Query, QueryError, QueryResult};
pub use record::{OrderedMap, Record};
pub use store::{
    execute, execute_str, Backend, Connection, DocumentStore, Outcome, SqliteStore, Store,
    StoreError, StoreResult,
};
pub use value::Value;

pub use config::{Config, ConfigError, ConnectionConfig, LoggingConfig};
