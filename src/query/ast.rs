//! Query Abstract Syntax Tree
//!
//! Canonical form of a CosmoSQL query. Every backend consumes this tree; none
//! of them sees query text or the raw parse tree.
//!
//! # Example
//!
//! ```text
//! GET artists(name){sort(-songs), limit(10, 20), where(name ~= "j%")}[count(*)]
//! ```
//!
//! normalizes to a `Read` query on `artists` projecting `name`, sorted by
//! `songs` descending, limited to 10 rows from offset 20, filtered by a single
//! LIKE predicate and aggregated with `COUNT(*)`.

use crate::query::error::{QueryError, QueryResult};
use crate::query::{normalize, parser};
use crate::record::OrderedMap;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A parsed, normalized query
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub kind: CrudKind,
    pub selector: Selector,
    pub criteria: Criteria,
    /// At most one entry per aggregate function, in declaration order
    pub aggregates: Vec<Aggregate>,
}

impl Query {
    /// Parse and normalize query text
    pub fn parse(input: &str) -> QueryResult<Self> {
        let raw = parser::parse_query(input)?;
        normalize::normalize(raw)
    }

    /// Number of `?` placeholders in `set` and `where`
    pub fn placeholder_count(&self) -> usize {
        let set = self
            .criteria
            .set
            .iter()
            .flatten()
            .filter(|a| a.value.is_placeholder())
            .count();
        let filter = self
            .criteria
            .filter
            .iter()
            .flat_map(|g| g.predicates.iter())
            .filter(|p| p.value.is_placeholder())
            .count();
        set + filter
    }
}

impl FromStr for Query {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Renders the canonical query text
impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.selector)?;
        if !self.criteria.is_empty() {
            write!(f, "{{{}}}", self.criteria)?;
        }
        if !self.aggregates.is_empty() {
            let aggregates: Vec<String> = self.aggregates.iter().map(|a| a.to_string()).collect();
            write!(f, "[{}]", aggregates.join(", "))?;
        }
        Ok(())
    }
}

/// Operation kind after synonym normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrudKind {
    Create,
    Read,
    Update,
    Delete,
}

impl CrudKind {
    /// Resolve a CRUD keyword or synonym, case-insensitively
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "create" | "insert" => Some(Self::Create),
            "select" | "read" | "get" => Some(Self::Read),
            "update" | "save" => Some(Self::Update),
            "delete" | "remove" | "drop" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for CrudKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = match self {
            Self::Create => "create",
            Self::Read => "select",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{}", keyword)
    }
}

/// Target document and projection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub document: String,
    /// Empty means every field
    pub properties: Vec<String>,
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.document)?;
        if !self.properties.is_empty() {
            write!(f, "({})", self.properties.join(", "))?;
        }
        Ok(())
    }
}

/// Optional query clauses, each present at most once
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    /// Sort keys in declaration order
    pub sort: Option<OrderedMap<SortOrder>>,
    pub limit: Option<Limit>,
    pub filter: Option<PredicateGroup>,
    /// Assignments in declaration order
    pub set: Option<Vec<Assignment>>,
}

impl Criteria {
    pub fn is_empty(&self) -> bool {
        self.sort.is_none() && self.limit.is_none() && self.filter.is_none() && self.set.is_none()
    }
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(sort) = &self.sort {
            let keys: Vec<String> = sort
                .iter()
                .map(|(property, order)| format!("{}{}", order.sign(), property))
                .collect();
            parts.push(format!("sort({})", keys.join(", ")));
        }
        if let Some(limit) = &self.limit {
            parts.push(limit.to_string());
        }
        if let Some(filter) = &self.filter {
            parts.push(format!("where{}", filter));
        }
        if let Some(set) = &self.set {
            let assignments: Vec<String> = set
                .iter()
                .map(|a| format!("{} = {}", a.property, a.value))
                .collect();
            parts.push(format!("set({})", assignments.join(", ")));
        }
        write!(f, "{}", parts.join(", "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    fn sign(&self) -> char {
        match self {
            Self::Ascending => '+',
            Self::Descending => '-',
        }
    }
}

/// `limit(count)` or `limit(count, offset)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub count: i64,
    pub offset: Option<i64>,
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "limit({}, {})", self.count, offset),
            None => write!(f, "limit({})", self.count),
        }
    }
}

/// One `property = value` entry of a `set` clause
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub property: String,
    pub value: Value,
}

/// How the predicates of a group are joined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    /// Exactly one predicate
    None,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
    Is,
    Like,
}

impl Comparator {
    /// Resolve a comparator symbol as written in a query
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            "<=" => Some(Self::Le),
            ">=" => Some(Self::Ge),
            "<" => Some(Self::Lt),
            ">" => Some(Self::Gt),
            "is" => Some(Self::Is),
            "~=" => Some(Self::Like),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Is => "is",
            Self::Like => "~=",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// `property comparator value`
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub property: String,
    pub comparator: Comparator,
    pub value: Value,
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.property, self.comparator, self.value)
    }
}

/// Predicates joined by one combinator
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateGroup {
    pub combinator: Combinator,
    pub predicates: Vec<Predicate>,
}

impl fmt::Display for PredicateGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = match self.combinator {
            Combinator::Or => " | ",
            Combinator::None | Combinator::And => ", ",
        };
        let predicates: Vec<String> = self.predicates.iter().map(|p| p.to_string()).collect();
        write!(f, "({})", predicates.join(separator))
    }
}

/// Aggregate function applied over the selected entries
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Aggregate {
    CountAll,
    Count(String),
    Avg(String),
    Max(String),
    Min(String),
}

impl Aggregate {
    /// Function name; `count(*)` and `count(p)` share one
    pub fn function(&self) -> &'static str {
        match self {
            Self::CountAll | Self::Count(_) => "count",
            Self::Avg(_) => "avg",
            Self::Max(_) => "max",
            Self::Min(_) => "min",
        }
    }

    /// Property argument, `None` for `count(*)`
    pub fn property(&self) -> Option<&str> {
        match self {
            Self::CountAll => None,
            Self::Count(p) | Self::Avg(p) | Self::Max(p) | Self::Min(p) => Some(p),
        }
    }
}

/// `COUNT(*)`, `AVG(songs)`: also the result key in the document store
impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let function = self.function().to_ascii_uppercase();
        write!(f, "{}({})", function, self.property().unwrap_or("*"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crud_synonyms() {
        assert_eq!(CrudKind::from_keyword("INSERT"), Some(CrudKind::Create));
        assert_eq!(CrudKind::from_keyword("Get"), Some(CrudKind::Read));
        assert_eq!(CrudKind::from_keyword("save"), Some(CrudKind::Update));
        assert_eq!(CrudKind::from_keyword("DROP"), Some(CrudKind::Delete));
        assert_eq!(CrudKind::from_keyword("fetch"), None);
    }

    #[test]
    fn test_comparator_symbols() {
        for symbol in ["==", "!=", "<=", ">=", "<", ">", "is", "~="] {
            let comparator = Comparator::from_symbol(symbol).unwrap();
            assert_eq!(comparator.to_string(), symbol);
        }
        assert_eq!(Comparator::from_symbol("="), None);
    }

    #[test]
    fn test_aggregate_display() {
        assert_eq!(Aggregate::CountAll.to_string(), "COUNT(*)");
        assert_eq!(Aggregate::Avg("songs".into()).to_string(), "AVG(songs)");
        assert_eq!(Aggregate::Count("x".into()).function(), "count");
    }

    #[test]
    fn test_query_parse_and_display() {
        let query: Query =
            r#"GET artists(name){where(name ~= "j%" | songs > 5), sort(-songs), limit(10,20)}[count(*)]"#
                .parse()
                .unwrap();
        assert_eq!(query.kind, CrudKind::Read);
        assert_eq!(
            query.to_string(),
            r#"select artists(name){sort(-songs), limit(10, 20), where(name ~= "j%" | songs > 5)}[COUNT(*)]"#
        );
        assert_eq!(query.to_string().parse::<Query>().unwrap(), query);
    }

    #[test]
    fn test_placeholder_count() {
        let query =
            Query::parse(r#"update doc{set(name = ?, age = 3), where(id == ? , x < ?)}"#).unwrap();
        assert_eq!(query.placeholder_count(), 3);
    }
}
