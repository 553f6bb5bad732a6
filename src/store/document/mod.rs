//! Document store backend
//!
//! Schemaless tables of JSON records held in a single file. Queries are
//! evaluated in memory against the loaded file; every mutation rewrites it.
//!
//! - **file**: on-disk layout and atomic persistence
//! - **filter**: `where` evaluation
//! - **order**: `sort` and `limit`
//! - **aggregate**: `count`, `AVG`, `MAX`, `MIN`

mod aggregate;
mod file;
mod filter;
mod order;

pub use file::{StoreFile, Table};
pub use filter::{FilterPlan, LikePattern};

use crate::query::{Aggregate, Limit, Query, SortOrder};
use crate::record::{OrderedMap, Record};
use crate::store::connection::Connection;
use crate::store::error::{StoreError, StoreResult};
use crate::store::harness::{Build, OrderingGroup, Outcome, Store};
use crate::value::Value;
use tracing::debug;

/// Insert one record built from the `set` assignments
#[derive(Debug, Clone, PartialEq)]
pub struct InsertPlan {
    pub document: String,
    /// Assigned fields, in `set` order
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectPlan {
    pub document: String,
    pub filter: Option<FilterPlan>,
    pub sort: Option<OrderedMap<SortOrder>>,
    pub limit: Option<Limit>,
    /// Projection; empty keeps every field
    pub properties: Vec<String>,
    pub aggregates: Vec<Aggregate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    pub document: String,
    pub filter: Option<FilterPlan>,
    /// Assigned fields, in `set` order
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeletePlan {
    pub document: String,
    pub filter: Option<FilterPlan>,
}

/// JSON-file backed store
#[derive(Debug)]
pub struct DocumentStore {
    connection: Connection,
    data: Option<StoreFile>,
}

impl DocumentStore {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            data: None,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    fn data(&self) -> StoreResult<&StoreFile> {
        self.data.as_ref().ok_or(StoreError::NotAcquired)
    }

    fn save(&self) -> StoreResult<()> {
        self.data()?
            .save(&self.connection.database, &self.connection.options)
    }
}

fn assigned_columns(query: &Query) -> StoreResult<Vec<String>> {
    let set = query.criteria.set.as_ref().ok_or_else(|| {
        StoreError::InvalidQuery(format!("{} requires a set clause", query.kind))
    })?;
    Ok(set.iter().map(|a| a.property.clone()).collect())
}

fn filter_plan(query: &Query) -> Option<FilterPlan> {
    query.criteria.filter.as_ref().map(FilterPlan::from_group)
}

/// Entries of `document`, or none when the table does not exist
fn entries<'a>(data: &'a StoreFile, document: &str) -> &'a [Record] {
    data.table(document)
        .map(|t| t.entries.as_slice())
        .unwrap_or(&[])
}

fn project(records: Vec<Record>, properties: &[String], document: &str) -> StoreResult<Vec<Record>> {
    if properties.is_empty() {
        return Ok(records);
    }
    records
        .iter()
        .map(|record| {
            properties
                .iter()
                .map(|p| {
                    let value = record.get(p).ok_or_else(|| StoreError::Lookup {
                        document: document.to_string(),
                        property: p.clone(),
                    })?;
                    Ok((p.as_str(), value.clone()))
                })
                .collect::<StoreResult<Record>>()
        })
        .collect()
}

impl Store for DocumentStore {
    type InsertPlan = InsertPlan;
    type SelectPlan = SelectPlan;
    type UpdatePlan = UpdatePlan;
    type DeletePlan = DeletePlan;

    fn acquire(&mut self) -> StoreResult<()> {
        self.data = Some(StoreFile::load(&self.connection.database)?);
        Ok(())
    }

    fn release(&mut self) -> StoreResult<()> {
        self.data = None;
        Ok(())
    }

    fn build_insert(&self, query: &Query) -> StoreResult<Build<InsertPlan>> {
        let plan = InsertPlan {
            document: query.selector.document.clone(),
            columns: assigned_columns(query)?,
        };
        Ok(Build::new(plan, vec![OrderingGroup::Set]))
    }

    fn build_select(&self, query: &Query) -> StoreResult<Build<SelectPlan>> {
        let plan = SelectPlan {
            document: query.selector.document.clone(),
            filter: filter_plan(query),
            sort: query.criteria.sort.clone(),
            limit: query.criteria.limit,
            properties: query.selector.properties.clone(),
            aggregates: query.aggregates.clone(),
        };
        Ok(Build::new(plan, vec![OrderingGroup::Where]))
    }

    fn build_update(&self, query: &Query) -> StoreResult<Build<UpdatePlan>> {
        let plan = UpdatePlan {
            document: query.selector.document.clone(),
            filter: filter_plan(query),
            columns: assigned_columns(query)?,
        };
        Ok(Build::new(plan, vec![OrderingGroup::Set, OrderingGroup::Where]))
    }

    fn build_delete(&self, query: &Query) -> StoreResult<Build<DeletePlan>> {
        let plan = DeletePlan {
            document: query.selector.document.clone(),
            filter: filter_plan(query),
        };
        Ok(Build::new(plan, vec![OrderingGroup::Where]))
    }

    fn run_insert(&mut self, plan: InsertPlan, params: Vec<Value>) -> StoreResult<Outcome> {
        let data = self.data.as_mut().ok_or(StoreError::NotAcquired)?;
        let record: Record = plan.columns.iter().cloned().zip(params).collect();

        match data.table_mut(&plan.document) {
            Some(table) => table.entries.push(record),
            None => {
                data.tables.insert(
                    plan.document.clone(),
                    Table {
                        columns: plan.columns.clone(),
                        entries: vec![record],
                    },
                );
            }
        }
        debug!(document = %plan.document, "Inserted entry");

        self.save()?;
        Ok(Outcome::Inserted)
    }

    fn run_select(&mut self, plan: SelectPlan, params: Vec<Value>) -> StoreResult<Outcome> {
        let data = self.data()?;
        let mut records = filter::matching(
            entries(data, &plan.document),
            plan.filter.as_ref(),
            &params,
            &plan.document,
        )?;
        debug!(document = %plan.document, matched = records.len(), "Selected entries");

        if !plan.aggregates.is_empty() {
            let row = aggregate::aggregate(&records, &plan.aggregates, &plan.document)?;
            return Ok(Outcome::Records(order::paginate(
                vec![row],
                plan.limit.as_ref(),
            )));
        }

        if let Some(keys) = &plan.sort {
            order::sort_records(&mut records, keys, &plan.document)?;
        }
        let records = order::paginate(records, plan.limit.as_ref());
        Ok(Outcome::Records(project(
            records,
            &plan.properties,
            &plan.document,
        )?))
    }

    fn run_update(&mut self, plan: UpdatePlan, mut params: Vec<Value>) -> StoreResult<Outcome> {
        if params.len() < plan.columns.len() {
            return Err(StoreError::Binding {
                expected: plan.columns.len(),
                supplied: params.len(),
            });
        }
        let where_params = params.split_off(plan.columns.len());

        let data = self.data.as_mut().ok_or(StoreError::NotAcquired)?;
        let mut affected = 0;
        if let Some(table) = data.table_mut(&plan.document) {
            let matched = filter::matching(
                &table.entries,
                plan.filter.as_ref(),
                &where_params,
                &plan.document,
            )?;
            for entry in table.entries.iter_mut() {
                if matched.contains(entry) {
                    for (column, value) in plan.columns.iter().zip(&params) {
                        entry.insert(column.clone(), value.clone());
                    }
                    affected += 1;
                }
            }
        }
        debug!(document = %plan.document, affected, "Updated entries");

        self.save()?;
        Ok(Outcome::Affected(affected))
    }

    fn run_delete(&mut self, plan: DeletePlan, params: Vec<Value>) -> StoreResult<Outcome> {
        let data = self.data.as_mut().ok_or(StoreError::NotAcquired)?;
        let mut affected = 0;
        if let Some(table) = data.table_mut(&plan.document) {
            let matched = filter::matching(
                &table.entries,
                plan.filter.as_ref(),
                &params,
                &plan.document,
            )?;
            let before = table.entries.len();
            table.entries.retain(|entry| !matched.contains(entry));
            affected = before - table.entries.len();
        }
        debug!(document = %plan.document, affected, "Deleted entries");

        self.save()?;
        Ok(Outcome::Affected(affected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::harness::execute_str;
    use chrono::NaiveDate;
    use tempfile::{tempdir, TempDir};

    fn store() -> (TempDir, DocumentStore) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = DocumentStore::new(Connection::new(path.to_string_lossy()));
        (dir, store)
    }

    fn run(store: &mut DocumentStore, input: &str) -> Outcome {
        execute_str(store, input, &[]).unwrap()
    }

    fn records(outcome: Outcome) -> Vec<Record> {
        match outcome {
            Outcome::Records(records) => records,
            other => panic!("expected records, got {:?}", other),
        }
    }

    fn seed(store: &mut DocumentStore) {
        for query in [
            r#"create artists{set(name = "john", songs = 24, joined = 24-12-2020)}"#,
            r#"create artists{set(name = "jane", songs = 12, joined = 2021-01-05)}"#,
            r#"create artists{set(name = "bob", songs = 24, joined = 01-02-2019)}"#,
        ] {
            assert_eq!(run(store, query), Outcome::Inserted);
        }
    }

    #[test]
    fn test_insert_creates_table_and_persists() {
        let (dir, mut store) = store();
        seed(&mut store);

        let file = StoreFile::load(dir.path().join("store.json")).unwrap();
        let table = file.table("artists").unwrap();
        assert_eq!(table.columns, vec!["name", "songs", "joined"]);
        assert_eq!(table.entries.len(), 3);
        assert_eq!(
            table.entries[0].get("joined"),
            Some(&Value::Date(NaiveDate::from_ymd_opt(2020, 12, 24).unwrap()))
        );
    }

    #[test]
    fn test_repeated_insert_grows_entries() {
        let (dir, mut store) = store();
        let path = dir.path().join("store.json");

        run(&mut store, r#"insert t{set(a = 1, b = "x")}"#);
        assert_eq!(StoreFile::load(&path).unwrap().table("t").unwrap().entries.len(), 1);

        run(&mut store, r#"insert t{set(a = 1, b = "x")}"#);
        let file = StoreFile::load(&path).unwrap();
        let entries = &file.table("t").unwrap().entries;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], entries[1]);
    }

    #[test]
    fn test_columns_recorded_on_first_insert_only() {
        let (dir, mut store) = store();
        run(&mut store, r#"insert t{set(a = 1)}"#);
        run(&mut store, r#"insert t{set(b = 2, a = 3)}"#);
        let file = StoreFile::load(dir.path().join("store.json")).unwrap();
        assert_eq!(file.table("t").unwrap().columns, vec!["a"]);
    }

    #[test]
    fn test_select_all_and_projection() {
        let (_dir, mut store) = store();
        seed(&mut store);

        assert_eq!(records(run(&mut store, "get artists")).len(), 3);

        let projected = records(run(&mut store, r#"get artists(name){where(songs == 24)}"#));
        let expected: Vec<Record> = vec![
            [("name", Value::from("john"))].into_iter().collect(),
            [("name", Value::from("bob"))].into_iter().collect(),
        ];
        assert_eq!(projected, expected);
    }

    #[test]
    fn test_select_missing_table_is_empty() {
        let (_dir, mut store) = store();
        assert!(records(run(&mut store, "get nobody")).is_empty());
    }

    #[test]
    fn test_select_with_placeholders() {
        let (_dir, mut store) = store();
        seed(&mut store);
        let outcome = execute_str(
            &mut store,
            "get artists(name){where(songs == ? , name ~= ?)}",
            &[Value::Integer(24), Value::from("%o%")],
        )
        .unwrap();
        assert_eq!(records(outcome).len(), 2);

        let err = execute_str(
            &mut store,
            "get artists{where(name ~= ?)}",
            &[Value::Integer(1)],
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Pattern { .. }));
    }

    #[test]
    fn test_select_date_comparison() {
        let (_dir, mut store) = store();
        seed(&mut store);
        let found = records(run(&mut store, "get artists(name){where(joined >= 2020-01-01)}"));
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_sort_and_limit() {
        let (_dir, mut store) = store();
        seed(&mut store);
        let found = records(run(
            &mut store,
            "get artists(name){sort(-songs, +name), limit(2, 1)}",
        ));
        let names: Vec<_> = found
            .iter()
            .map(|r| r.get("name").cloned().unwrap())
            .collect();
        assert_eq!(names, vec![Value::from("john"), Value::from("jane")]);
    }

    #[test]
    fn test_aggregates() {
        let (_dir, mut store) = store();
        seed(&mut store);
        let found = records(run(
            &mut store,
            "get artists{where(songs > 0)}[count(*), AVG(songs), MIN(joined)]",
        ));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("COUNT(*)"), Some(&Value::Integer(3)));
        assert_eq!(found[0].get("AVG(songs)"), Some(&Value::Float(20.0)));
        assert_eq!(
            found[0].get("MIN(joined)"),
            Some(&Value::Date(NaiveDate::from_ymd_opt(2019, 2, 1).unwrap()))
        );
    }

    #[test]
    fn test_update_replaces_and_adds_fields() {
        let (_dir, mut store) = store();
        seed(&mut store);
        let outcome = run(
            &mut store,
            r#"update artists{set(songs = 25, label = "indie"), where(songs == 24)}"#,
        );
        assert_eq!(outcome, Outcome::Affected(2));

        let found = records(run(&mut store, "get artists"));
        let labelled: Vec<_> = found.iter().filter(|r| r.contains_key("label")).collect();
        assert_eq!(labelled.len(), 2);
        assert!(labelled
            .iter()
            .all(|r| r.get("songs") == Some(&Value::Integer(25))));
        // replaced fields keep their position
        assert_eq!(
            labelled[0].keys().collect::<Vec<_>>(),
            vec!["name", "songs", "joined", "label"]
        );
    }

    #[test]
    fn test_update_without_match_still_persists() {
        let (dir, mut store) = store();
        let outcome = run(&mut store, r#"update ghosts{set(a = 1), where(a == 2)}"#);
        assert_eq!(outcome, Outcome::Affected(0));
        assert!(dir.path().join("store.json").exists());
    }

    #[test]
    fn test_update_requires_set() {
        let (_dir, mut store) = store();
        let err = execute_str(&mut store, "update artists{where(a == 1)}", &[]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuery(_)));
    }

    #[test]
    fn test_delete_structural_duplicates() {
        let (_dir, mut store) = store();
        run(&mut store, r#"insert t{set(a = 1)}"#);
        run(&mut store, r#"insert t{set(a = 1)}"#);
        run(&mut store, r#"insert t{set(a = 2)}"#);

        assert_eq!(run(&mut store, "delete t{where(a == 1)}"), Outcome::Affected(2));
        assert_eq!(records(run(&mut store, "get t")).len(), 1);
        assert_eq!(run(&mut store, "delete t"), Outcome::Affected(1));
    }

    #[test]
    fn test_lookup_error_on_missing_field() {
        let (_dir, mut store) = store();
        seed(&mut store);
        let err = execute_str(&mut store, "get artists{where(age > 3)}", &[]).unwrap_err();
        assert!(matches!(err, StoreError::Lookup { .. }));
    }

    #[test]
    fn test_io_failure_surfaces() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("store.json");
        let mut store = DocumentStore::new(Connection::new(path.to_string_lossy()));
        let err = execute_str(&mut store, r#"insert t{set(a = 1)}"#, &[]).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[test]
    fn test_run_without_acquire() {
        let (_dir, mut store) = store();
        let plan = DeletePlan {
            document: "t".to_string(),
            filter: None,
        };
        assert!(matches!(
            store.run_delete(plan, vec![]),
            Err(StoreError::NotAcquired)
        ));
    }

    #[test]
    fn test_indented_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let connection = Connection::new(path.to_string_lossy()).with_indent(4);
        let mut store = DocumentStore::new(connection);
        run(&mut store, r#"insert t{set(a = 1)}"#);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("{\n    \"tables\""));
    }
}
