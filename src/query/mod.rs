//! CosmoSQL Query Language
//!
//! One textual syntax for create/read/update/delete against any backend:
//!
//! - **Lexer**: literal recognizers (strings, numbers, dates, datetimes)
//! - **Parser**: grammar producing a raw parse tree
//! - **Normalize**: raw tree to canonical [`Query`]
//! - **AST**: the canonical query consumed by the stores
//!
//! # Query Language
//!
//! ```text
//! <create|insert|select|read|get|update|save|delete|remove|drop> document[(prop, ...)]
//! [{sort(-p, +q), limit(count[, offset]), where(p == v, ...), set(p = v, ...)}]
//! [[count(*), count(p), AVG(p), MAX(p), MIN(p)]]
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use cosmosql::query::{CrudKind, Query};
//!
//! let query = Query::parse(r#"select artists(name){where(songs > 3)}"#)?;
//! assert_eq!(query.kind, CrudKind::Read);
//! ```

mod ast;
mod error;
mod lexer;
mod normalize;
mod parser;

pub use ast::{
    Aggregate, Assignment, Combinator, Comparator, Criteria, CrudKind, Limit, Predicate,
    PredicateGroup, Query, Selector, SortOrder,
};
pub use error::{QueryError, QueryResult};
pub use normalize::normalize;
pub use parser::{
    parse_query, parse_value, RawAggregate, RawBooleanGroup, RawCriterion, RawPredicate, RawQuery,
};
