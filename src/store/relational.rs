//! Relational store backend
//!
//! Compiles queries into parameterized SQLite statements. Only identifiers
//! (table and column names) and `limit` integers are written into the SQL
//! text; every value travels as a `?` parameter.
//!
//! ```text
//! insert artists{set(name = "john", songs = 3)}
//!     INSERT INTO artists (name, songs) VALUES (?, ?)
//! select artists(name){sort(-songs), limit(5), where(songs > 2 | name ~= "j%")}
//!     SELECT artists.name FROM artists WHERE artists.songs > ? OR artists.name LIKE ?
//!         ORDER BY artists.songs DESC LIMIT 5
//! update artists{set(songs = 4), where(name == "john")}
//!     UPDATE artists SET songs = ? WHERE artists.name = ?
//! ```

use crate::query::{Aggregate, Combinator, Comparator, Query, SortOrder};
use crate::store::connection::Connection;
use crate::store::error::{StoreError, StoreResult};
use crate::store::harness::{Build, OrderingGroup, Outcome, Store};
use crate::value::Value;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::params_from_iter;
use tracing::debug;

/// Date-time text layout stored in SQLite
pub const SQL_DATETIME: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// A compiled SQL statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    /// Number of `?` parameters in `sql`
    pub placeholders: usize,
    /// Parameter positions bound to a `LIKE`, with their column
    pub patterns: Vec<(usize, String)>,
}

impl Statement {
    fn new(sql: String) -> Self {
        let placeholders = sql.matches('?').count();
        Self {
            sql,
            placeholders,
            patterns: Vec::new(),
        }
    }

    /// Record the `LIKE` terms of the query's `where`, whose parameters
    /// start at `offset`
    fn with_patterns(mut self, query: &Query, offset: usize) -> Self {
        if let Some(filter) = &query.criteria.filter {
            self.patterns = filter
                .predicates
                .iter()
                .enumerate()
                .filter(|(_, p)| p.comparator == Comparator::Like)
                .map(|(i, p)| (offset + i, p.property.clone()))
                .collect();
        }
        self
    }
}

/// SQLite-backed store
#[derive(Debug)]
pub struct SqliteStore {
    connection: Connection,
    conn: Option<rusqlite::Connection>,
}

impl SqliteStore {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            conn: None,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    fn conn(&self) -> StoreResult<&rusqlite::Connection> {
        self.conn.as_ref().ok_or(StoreError::NotAcquired)
    }

    fn execute(&self, statement: &Statement, params: &[Value]) -> StoreResult<usize> {
        check_params(statement, params)?;
        debug!(sql = %statement.sql, params = params.len(), "Executing statement");
        let changed = self
            .conn()?
            .execute(&statement.sql, params_from_iter(params.iter()))?;
        Ok(changed)
    }
}

fn check_params(statement: &Statement, params: &[Value]) -> StoreResult<()> {
    if statement.placeholders != params.len() {
        return Err(StoreError::Binding {
            expected: statement.placeholders,
            supplied: params.len(),
        });
    }
    for (position, property) in &statement.patterns {
        match params.get(*position) {
            Some(value) if value.as_text().is_none() => {
                return Err(StoreError::pattern(property, value));
            }
            _ => {}
        }
    }
    Ok(())
}

fn operator(comparator: Comparator) -> &'static str {
    match comparator {
        Comparator::Eq => "=",
        Comparator::Ne => "!=",
        Comparator::Le => "<=",
        Comparator::Ge => ">=",
        Comparator::Lt => "<",
        Comparator::Gt => ">",
        Comparator::Is => "IS",
        Comparator::Like => "LIKE",
    }
}

/// ` WHERE doc.p = ? AND ...`, or nothing without a filter
fn where_clause(query: &Query) -> String {
    let Some(filter) = &query.criteria.filter else {
        return String::new();
    };
    let document = &query.selector.document;
    let joiner = match filter.combinator {
        Combinator::Or => " OR ",
        Combinator::And | Combinator::None => " AND ",
    };
    let conditions: Vec<String> = filter
        .predicates
        .iter()
        .map(|p| format!("{}.{} {} ?", document, p.property, operator(p.comparator)))
        .collect();
    format!(" WHERE {}", conditions.join(joiner))
}

fn set_columns(query: &Query) -> StoreResult<Vec<&str>> {
    let set = query.criteria.set.as_ref().ok_or_else(|| {
        StoreError::InvalidQuery(format!("{} requires a set clause", query.kind))
    })?;
    Ok(set.iter().map(|a| a.property.as_str()).collect())
}

fn projection(query: &Query) -> String {
    let document = &query.selector.document;
    if !query.aggregates.is_empty() {
        return query
            .aggregates
            .iter()
            .map(|a| match a {
                Aggregate::CountAll => "COUNT(*)".to_string(),
                other => format!(
                    "{}({}.{})",
                    other.function().to_ascii_uppercase(),
                    document,
                    other.property().unwrap_or_default()
                ),
            })
            .collect::<Vec<_>>()
            .join(", ");
    }
    if query.selector.properties.is_empty() {
        return "*".to_string();
    }
    query
        .selector
        .properties
        .iter()
        .map(|p| format!("{}.{}", document, p))
        .collect::<Vec<_>>()
        .join(", ")
}

fn order_by(query: &Query) -> String {
    match &query.criteria.sort {
        Some(keys) if query.aggregates.is_empty() && !keys.is_empty() => {
            let keys: Vec<String> = keys
                .iter()
                .map(|(property, order)| {
                    let direction = match order {
                        SortOrder::Ascending => "ASC",
                        SortOrder::Descending => "DESC",
                    };
                    format!("{}.{} {}", query.selector.document, property, direction)
                })
                .collect();
            format!(" ORDER BY {}", keys.join(", "))
        }
        _ => String::new(),
    }
}

fn limit_clause(query: &Query) -> String {
    match &query.criteria.limit {
        Some(limit) => match limit.offset {
            Some(offset) => format!(" LIMIT {} OFFSET {}", limit.count, offset),
            None => format!(" LIMIT {}", limit.count),
        },
        None => String::new(),
    }
}

fn value_from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Dates bind as ISO text; placeholders cannot be bound
impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let output = match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Float(f) => ToSqlOutput::from(*f),
            Value::Date(d) => ToSqlOutput::from(d.format(crate::value::ISO_DATE).to_string()),
            Value::DateTime(dt) => ToSqlOutput::from(dt.format(SQL_DATETIME).to_string()),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Placeholder => {
                return Err(rusqlite::Error::ToSqlConversionFailure(Box::new(
                    StoreError::UnboundPlaceholder,
                )))
            }
        };
        Ok(output)
    }
}

impl Store for SqliteStore {
    type InsertPlan = Statement;
    type SelectPlan = Statement;
    type UpdatePlan = Statement;
    type DeletePlan = Statement;

    fn acquire(&mut self) -> StoreResult<()> {
        let conn = rusqlite::Connection::open(&self.connection.database)?;
        debug!(database = %self.connection.database, "Opened SQLite connection");
        self.conn = Some(conn);
        Ok(())
    }

    fn release(&mut self) -> StoreResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;
        }
        Ok(())
    }

    fn build_insert(&self, query: &Query) -> StoreResult<Build<Statement>> {
        let columns = set_columns(query)?;
        let markers = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            query.selector.document,
            columns.join(", "),
            markers
        );
        Ok(Build::new(Statement::new(sql), vec![OrderingGroup::Set]))
    }

    fn build_select(&self, query: &Query) -> StoreResult<Build<Statement>> {
        let sql = format!(
            "SELECT {} FROM {}{}{}{}",
            projection(query),
            query.selector.document,
            where_clause(query),
            order_by(query),
            limit_clause(query)
        );
        Ok(Build::new(
            Statement::new(sql).with_patterns(query, 0),
            vec![OrderingGroup::Where],
        ))
    }

    fn build_update(&self, query: &Query) -> StoreResult<Build<Statement>> {
        let columns = set_columns(query)?;
        let assignments: Vec<String> = columns
            .iter()
            .map(|column| format!("{} = ?", column))
            .collect();
        let sql = format!(
            "UPDATE {} SET {}{}",
            query.selector.document,
            assignments.join(", "),
            where_clause(query)
        );
        Ok(Build::new(
            Statement::new(sql).with_patterns(query, columns.len()),
            vec![OrderingGroup::Set, OrderingGroup::Where],
        ))
    }

    fn build_delete(&self, query: &Query) -> StoreResult<Build<Statement>> {
        let sql = format!(
            "DELETE FROM {}{}",
            query.selector.document,
            where_clause(query)
        );
        Ok(Build::new(
            Statement::new(sql).with_patterns(query, 0),
            vec![OrderingGroup::Where],
        ))
    }

    fn run_insert(&mut self, plan: Statement, params: Vec<Value>) -> StoreResult<Outcome> {
        self.execute(&plan, &params)?;
        Ok(Outcome::Inserted)
    }

    fn run_select(&mut self, plan: Statement, params: Vec<Value>) -> StoreResult<Outcome> {
        check_params(&plan, &params)?;
        debug!(sql = %plan.sql, params = params.len(), "Executing query");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&plan.sql)?;
        let width = stmt.column_count();
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(value_from_sql))
                    .collect::<rusqlite::Result<Vec<Value>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Outcome::Rows(rows))
    }

    fn run_update(&mut self, plan: Statement, params: Vec<Value>) -> StoreResult<Outcome> {
        Ok(Outcome::Affected(self.execute(&plan, &params)?))
    }

    fn run_delete(&mut self, plan: Statement, params: Vec<Value>) -> StoreResult<Outcome> {
        Ok(Outcome::Affected(self.execute(&plan, &params)?))
    }
}
