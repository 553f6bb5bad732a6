//! Query error types
//!
//! Parsing is all-or-nothing: a query that does not match the grammar in full
//! produces no `Query` at all, only a `QueryError`.

use thiserror::Error;

/// Errors that can occur while turning query text into a `Query`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Input does not match the grammar
    #[error("Syntax error at position {position}: {message} in `{input}`")]
    Syntax {
        /// Full source text of the query
        input: String,
        /// Byte offset of the failure within `input`
        position: usize,
        /// What the parser expected or rejected
        message: String,
    },

    /// Parse tree could not be normalized into a query
    #[error("Invalid query: {0}")]
    Invalid(String),
}

impl QueryError {
    /// Build a syntax error located at `remaining`, a suffix of `input`
    pub(crate) fn syntax(input: &str, remaining: &str, message: impl Into<String>) -> Self {
        let remaining = remaining.trim_start();
        Self::Syntax {
            input: input.to_string(),
            position: input.len().saturating_sub(remaining.len()),
            message: message.into(),
        }
    }

    /// Byte offset of a syntax error
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::Syntax { position, .. } => Some(*position),
            Self::Invalid(_) => None,
        }
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
