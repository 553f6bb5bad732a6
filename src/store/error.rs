//! Store error types
//!
//! Defines all errors that can occur while building or running a query
//! against a backend.

use crate::query::QueryError;
use crate::value::Value;
use thiserror::Error;

/// Errors that can occur in a store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Query text did not parse
    #[error(transparent)]
    Query(#[from] QueryError),

    /// A predicate or projection names a field an entry does not have
    #[error("Lookup error: document '{document}' has no property '{property}'")]
    Lookup { document: String, property: String },

    /// `~=` used with something other than a text pattern
    #[error("Pattern error: '{property}' ~= {value} requires a text pattern, got {kind}")]
    Pattern {
        property: String,
        value: String,
        kind: &'static str,
    },

    /// Ordering comparison between values of unrelated types
    #[error("Incomparable values for '{property}': {left} and {right}")]
    Incomparable {
        property: String,
        left: String,
        right: String,
    },

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Relational backend failure
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Placeholder count and supplied bindings disagree
    #[error("Binding error: query has {expected} placeholder(s), {supplied} value(s) supplied")]
    Binding { expected: usize, supplied: usize },

    /// A `?` reached execution without a bound value
    #[error("Unbound placeholder")]
    UnboundPlaceholder,

    /// Run called outside an acquire/release cycle
    #[error("Store resource not acquired")]
    NotAcquired,

    /// Query is well-formed but cannot run as written
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl StoreError {
    /// `~=` against `value`, which is not text
    pub fn pattern(property: &str, value: &Value) -> Self {
        StoreError::Pattern {
            property: property.to_string(),
            value: value.to_string(),
            kind: value.type_name(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            StoreError::Io(err.into())
        } else {
            StoreError::Serialization(err.to_string())
        }
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
