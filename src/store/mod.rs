//! Query Execution Backends
//!
//! Every backend implements the [`Store`] build/run contract and is driven by
//! [`execute`]:
//!
//! - **Document**: JSON file of schemaless tables, evaluated in memory
//! - **Relational**: parameterized SQLite statements
//!
//! # Example
//!
//! ```rust,ignore
//! use cosmosql::store::{execute_str, Connection, DocumentStore};
//!
//! let mut store = DocumentStore::new(Connection::new("artists.json"));
//! execute_str(&mut store, r#"insert artists{set(name = "john")}"#, &[])?;
//! let outcome = execute_str(&mut store, "get artists{where(name == ?)}", &["john".into()])?;
//! ```

mod connection;
mod document;
mod error;
mod harness;
mod relational;

pub use connection::{Connection, ConnectionOptions};
pub use document::{DocumentStore, FilterPlan, LikePattern, StoreFile, Table};
pub use error::{StoreError, StoreResult};
pub use harness::{bind, execute, execute_str, flatten, Build, OrderingGroup, Outcome, Store};
pub use relational::{SqliteStore, Statement};

use crate::query::Query;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Available storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// JSON document file
    #[default]
    Json,
    /// SQLite database
    Sqlite,
}

impl Backend {
    /// Run one query against a freshly constructed store of this kind
    pub fn execute(
        &self,
        connection: Connection,
        query: &Query,
        bindings: &[Value],
    ) -> StoreResult<Outcome> {
        match self {
            Self::Json => execute(&mut DocumentStore::new(connection), query, bindings),
            Self::Sqlite => execute(&mut SqliteStore::new(connection), query, bindings),
        }
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" | "document" => Ok(Self::Json),
            "sqlite" | "sql" => Ok(Self::Sqlite),
            other => Err(format!("unknown backend '{}' (expected json or sqlite)", other)),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}
