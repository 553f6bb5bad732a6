//! Build/run contract shared by every backend
//!
//! A backend compiles a [`Query`] into a plan and declares which criteria
//! sections supply its positional parameters, in order. The harness flattens
//! those sections into one parameter list, binds external values to `?`
//! placeholders, runs the plan, and always releases the backend resource.
//!
//! ```text
//! acquire → build_<kind> → flatten(ordering) → bind → run_<kind> → release
//! ```

use crate::query::{CrudKind, Query};
use crate::record::Record;
use crate::store::error::{StoreError, StoreResult};
use crate::value::Value;
use serde::Serialize;
use tracing::{debug, warn};

/// Criteria section contributing positional parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingGroup {
    /// Each `set` assignment value, in declaration order
    Set,
    /// Each `where` predicate value, in declaration order
    Where,
}

impl OrderingGroup {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Where => "where",
        }
    }
}

/// A compiled plan plus the order its parameters are supplied in
#[derive(Debug, Clone, PartialEq)]
pub struct Build<P> {
    pub plan: P,
    pub ordering: Vec<OrderingGroup>,
}

impl<P> Build<P> {
    pub fn new(plan: P, ordering: Vec<OrderingGroup>) -> Self {
        Self { plan, ordering }
    }
}

/// Result of running one query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// A record or row was inserted
    Inserted,
    /// Selected document-store records
    Records(Vec<Record>),
    /// Selected relational rows
    Rows(Vec<Vec<Value>>),
    /// Entries or rows changed by an update or delete
    Affected(usize),
}

/// A storage backend driven by [`execute`]
pub trait Store {
    type InsertPlan;
    type SelectPlan;
    type UpdatePlan;
    type DeletePlan;

    /// Open the backing resource for one build/run cycle
    fn acquire(&mut self) -> StoreResult<()>;

    /// Close the backing resource
    fn release(&mut self) -> StoreResult<()>;

    fn build_insert(&self, query: &Query) -> StoreResult<Build<Self::InsertPlan>>;
    fn build_select(&self, query: &Query) -> StoreResult<Build<Self::SelectPlan>>;
    fn build_update(&self, query: &Query) -> StoreResult<Build<Self::UpdatePlan>>;
    fn build_delete(&self, query: &Query) -> StoreResult<Build<Self::DeletePlan>>;

    fn run_insert(&mut self, plan: Self::InsertPlan, params: Vec<Value>) -> StoreResult<Outcome>;
    fn run_select(&mut self, plan: Self::SelectPlan, params: Vec<Value>) -> StoreResult<Outcome>;
    fn run_update(&mut self, plan: Self::UpdatePlan, params: Vec<Value>) -> StoreResult<Outcome>;
    fn run_delete(&mut self, plan: Self::DeletePlan, params: Vec<Value>) -> StoreResult<Outcome>;
}

/// Collect parameter values from the query sections named by `ordering`
pub fn flatten(query: &Query, ordering: &[OrderingGroup]) -> Vec<Value> {
    let mut params = Vec::new();
    for group in ordering {
        match group {
            OrderingGroup::Set => {
                if let Some(set) = &query.criteria.set {
                    params.extend(set.iter().map(|a| a.value.clone()));
                }
            }
            OrderingGroup::Where => {
                if let Some(filter) = &query.criteria.filter {
                    params.extend(filter.predicates.iter().map(|p| p.value.clone()));
                }
            }
        }
    }
    params
}

/// Replace each placeholder, in order, with the next external value
pub fn bind(params: Vec<Value>, bindings: &[Value]) -> StoreResult<Vec<Value>> {
    let expected = params.iter().filter(|v| v.is_placeholder()).count();
    if expected != bindings.len() {
        return Err(StoreError::Binding {
            expected,
            supplied: bindings.len(),
        });
    }

    let mut supplied = bindings.iter();
    params
        .into_iter()
        .map(|param| match param {
            Value::Placeholder => match supplied.next() {
                Some(Value::Placeholder) | None => Err(StoreError::UnboundPlaceholder),
                Some(value) => Ok(value.clone()),
            },
            other => Ok(other),
        })
        .collect()
}

fn parameters(
    query: &Query,
    ordering: &[OrderingGroup],
    bindings: &[Value],
) -> StoreResult<Vec<Value>> {
    let params = bind(flatten(query, ordering), bindings)?;
    debug!(
        ordering = ?ordering.iter().map(|g| g.name()).collect::<Vec<_>>(),
        params = params.len(),
        "Parameters bound"
    );
    Ok(params)
}

fn dispatch<S: Store>(store: &mut S, query: &Query, bindings: &[Value]) -> StoreResult<Outcome> {
    match query.kind {
        CrudKind::Create => {
            let build = store.build_insert(query)?;
            let params = parameters(query, &build.ordering, bindings)?;
            store.run_insert(build.plan, params)
        }
        CrudKind::Read => {
            let build = store.build_select(query)?;
            let params = parameters(query, &build.ordering, bindings)?;
            store.run_select(build.plan, params)
        }
        CrudKind::Update => {
            let build = store.build_update(query)?;
            let params = parameters(query, &build.ordering, bindings)?;
            store.run_update(build.plan, params)
        }
        CrudKind::Delete => {
            let build = store.build_delete(query)?;
            let params = parameters(query, &build.ordering, bindings)?;
            store.run_delete(build.plan, params)
        }
    }
}

/// Run one query against a store.
///
/// `release` runs whether or not the query succeeded. When both the query and
/// the release fail, the query error is returned.
pub fn execute<S: Store>(store: &mut S, query: &Query, bindings: &[Value]) -> StoreResult<Outcome> {
    debug!(kind = ?query.kind, document = %query.selector.document, "Executing query");
    let expected = query.placeholder_count();
    if expected != bindings.len() {
        return Err(StoreError::Binding {
            expected,
            supplied: bindings.len(),
        });
    }
    store.acquire()?;

    let result = dispatch(store, query, bindings);
    let released = store.release();

    match (result, released) {
        (Err(e), Err(release_err)) => {
            warn!(error = %release_err, "Release failed after query error");
            Err(e)
        }
        (Ok(_), Err(release_err)) => Err(release_err),
        (result, Ok(())) => result,
    }
}

/// Parse query text and run it
pub fn execute_str<S: Store>(store: &mut S, input: &str, bindings: &[Value]) -> StoreResult<Outcome> {
    let query = Query::parse(input)?;
    execute(store, &query, bindings)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every call; plans are the flattened parameter lists
    #[derive(Default)]
    struct RecordingStore {
        calls: Vec<String>,
        fail_run: bool,
        fail_release: bool,
    }

    impl RecordingStore {
        fn run(&mut self, name: &str, params: Vec<Value>) -> StoreResult<Outcome> {
            self.calls.push(format!("run_{}", name));
            if self.fail_run {
                return Err(StoreError::InvalidQuery("run failed".to_string()));
            }
            Ok(Outcome::Rows(vec![params]))
        }
    }

    impl Store for RecordingStore {
        type InsertPlan = ();
        type SelectPlan = ();
        type UpdatePlan = ();
        type DeletePlan = ();

        fn acquire(&mut self) -> StoreResult<()> {
            self.calls.push("acquire".to_string());
            Ok(())
        }

        fn release(&mut self) -> StoreResult<()> {
            self.calls.push("release".to_string());
            if self.fail_release {
                return Err(StoreError::NotAcquired);
            }
            Ok(())
        }

        fn build_insert(&self, _query: &Query) -> StoreResult<Build<()>> {
            Ok(Build::new((), vec![OrderingGroup::Set]))
        }

        fn build_select(&self, _query: &Query) -> StoreResult<Build<()>> {
            Ok(Build::new((), vec![OrderingGroup::Where]))
        }

        fn build_update(&self, _query: &Query) -> StoreResult<Build<()>> {
            Ok(Build::new((), vec![OrderingGroup::Set, OrderingGroup::Where]))
        }

        fn build_delete(&self, _query: &Query) -> StoreResult<Build<()>> {
            Ok(Build::new((), vec![OrderingGroup::Where]))
        }

        fn run_insert(&mut self, _plan: (), params: Vec<Value>) -> StoreResult<Outcome> {
            self.run("insert", params)
        }

        fn run_select(&mut self, _plan: (), params: Vec<Value>) -> StoreResult<Outcome> {
            self.run("select", params)
        }

        fn run_update(&mut self, _plan: (), params: Vec<Value>) -> StoreResult<Outcome> {
            self.run("update", params)
        }

        fn run_delete(&mut self, _plan: (), params: Vec<Value>) -> StoreResult<Outcome> {
            self.run("delete", params)
        }
    }

    #[test]
    fn test_update_flattens_set_then_where() {
        let query = Query::parse(r#"update doc{where(id == 1), set(name = "a", age = 3)}"#).unwrap();
        let params = flatten(&query, &[OrderingGroup::Set, OrderingGroup::Where]);
        assert_eq!(
            params,
            vec![Value::from("a"), Value::Integer(3), Value::Integer(1)]
        );
    }

    #[test]
    fn test_bind_in_order() {
        let mut store = RecordingStore::default();
        let outcome = execute_str(
            &mut store,
            "update doc{set(name = ?, age = 3), where(id == ?)}",
            &[Value::from("a"), Value::Integer(7)],
        )
        .unwrap();
        assert_eq!(
            outcome,
            Outcome::Rows(vec![vec![
                Value::from("a"),
                Value::Integer(3),
                Value::Integer(7)
            ]])
        );
        assert_eq!(store.calls, vec!["acquire", "run_update", "release"]);
    }

    #[test]
    fn test_binding_count_mismatch() {
        let mut store = RecordingStore::default();
        let err = execute_str(&mut store, "get doc{where(id == ?)}", &[]).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Binding {
                expected: 1,
                supplied: 0
            }
        ));
        // rejected before the store is touched
        assert!(store.calls.is_empty());

        let err = bind(vec![Value::Integer(1)], &[Value::Integer(2)]).unwrap_err();
        assert!(matches!(err, StoreError::Binding { expected: 0, .. }));
    }

    #[test]
    fn test_placeholder_binding_rejected() {
        let err = bind(vec![Value::Placeholder], &[Value::Placeholder]).unwrap_err();
        assert!(matches!(err, StoreError::UnboundPlaceholder));

        // released even though binding failed
        let mut store = RecordingStore::default();
        let err = execute_str(&mut store, "get doc{where(id == ?)}", &[Value::Placeholder])
            .unwrap_err();
        assert!(matches!(err, StoreError::UnboundPlaceholder));
        assert_eq!(store.calls, vec!["acquire", "release"]);
    }

    #[test]
    fn test_run_error_wins_over_release_error() {
        let mut store = RecordingStore {
            fail_run: true,
            fail_release: true,
            ..Default::default()
        };
        let err = execute_str(&mut store, "delete doc", &[]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuery(_)));
        assert_eq!(store.calls, vec!["acquire", "run_delete", "release"]);
    }

    #[test]
    fn test_release_error_surfaces_after_success() {
        let mut store = RecordingStore {
            fail_release: true,
            ..Default::default()
        };
        let err = execute_str(&mut store, "get doc", &[]).unwrap_err();
        assert!(matches!(err, StoreError::NotAcquired));
    }

    #[test]
    fn test_dispatch_by_kind() {
        for (input, call) in [
            ("insert doc{set(a = 1)}", "run_insert"),
            ("read doc", "run_select"),
            ("save doc{set(a = 1)}", "run_update"),
            ("drop doc", "run_delete"),
        ] {
            let mut store = RecordingStore::default();
            execute_str(&mut store, input, &[]).unwrap();
            assert_eq!(store.calls[1], call);
        }
    }

    #[test]
    fn test_parse_error_skips_acquire() {
        let mut store = RecordingStore::default();
        let err = execute_str(&mut store, "fetch doc", &[]).unwrap_err();
        assert!(matches!(err, StoreError::Query(_)));
        assert!(store.calls.is_empty());
    }
}
