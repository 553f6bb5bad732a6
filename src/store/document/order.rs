//! Sorting and pagination of selected records

use crate::query::{Limit, SortOrder};
use crate::record::{OrderedMap, Record};
use crate::store::error::{StoreError, StoreResult};
use std::cmp::Ordering;

/// Stable multi-key sort. `NULL` sorts first in ascending order.
pub fn sort_records(
    records: &mut [Record],
    keys: &OrderedMap<SortOrder>,
    document: &str,
) -> StoreResult<()> {
    // Every sort key must exist on every record
    for record in records.iter() {
        if let Some(missing) = keys.keys().find(|k| !record.contains_key(k)) {
            return Err(StoreError::Lookup {
                document: document.to_string(),
                property: missing.to_string(),
            });
        }
    }

    let mut failure = None;
    records.sort_by(|a, b| {
        for (property, order) in keys.iter() {
            let (Some(left), Some(right)) = (a.get(property), b.get(property)) else {
                continue;
            };
            let ordering = match left.sort_cmp(right) {
                Some(ordering) => ordering,
                None => {
                    if failure.is_none() {
                        failure = Some(StoreError::Incomparable {
                            property: property.to_string(),
                            left: left.to_string(),
                            right: right.to_string(),
                        });
                    }
                    Ordering::Equal
                }
            };
            let ordering = match order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });

    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Skip `offset` items, then keep at most `count`. Negative values are ignored.
pub fn paginate<T>(items: Vec<T>, limit: Option<&Limit>) -> Vec<T> {
    let Some(limit) = limit else {
        return items;
    };

    let offset = limit
        .offset
        .and_then(|o| usize::try_from(o).ok())
        .unwrap_or(0);
    let count = usize::try_from(limit.count).unwrap_or(usize::MAX);

    items.into_iter().skip(offset).take(count).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn record(name: &str, age: Value) -> Record {
        [("name", Value::from(name)), ("age", age)].into_iter().collect()
    }

    fn names(records: &[Record]) -> Vec<String> {
        records
            .iter()
            .map(|r| r.get("name").and_then(|v| v.as_text()).unwrap_or("").to_string())
            .collect()
    }

    #[test]
    fn test_multi_key_sort_is_stable() {
        let mut records = vec![
            record("c", Value::Integer(2)),
            record("a", Value::Integer(1)),
            record("b", Value::Integer(2)),
            record("d", Value::Null),
        ];
        let keys: OrderedMap<SortOrder> = [("age", SortOrder::Ascending)].into_iter().collect();
        sort_records(&mut records, &keys, "people").unwrap();
        assert_eq!(names(&records), vec!["d", "a", "c", "b"]);

        let keys: OrderedMap<SortOrder> = [
            ("age", SortOrder::Descending),
            ("name", SortOrder::Ascending),
        ]
        .into_iter()
        .collect();
        sort_records(&mut records, &keys, "people").unwrap();
        assert_eq!(names(&records), vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn test_sort_incomparable_values() {
        let mut records = vec![
            record("a", Value::Integer(1)),
            record("b", Value::from("x")),
        ];
        let keys: OrderedMap<SortOrder> = [("age", SortOrder::Ascending)].into_iter().collect();
        let err = sort_records(&mut records, &keys, "people").unwrap_err();
        assert!(matches!(err, StoreError::Incomparable { .. }));
    }

    #[test]
    fn test_sort_missing_key() {
        let mut records = vec![record("a", Value::Integer(1))];
        let keys: OrderedMap<SortOrder> = [("email", SortOrder::Ascending)].into_iter().collect();
        let err = sort_records(&mut records, &keys, "people").unwrap_err();
        assert!(matches!(err, StoreError::Lookup { .. }));
    }

    #[test]
    fn test_paginate() {
        let items: Vec<i32> = (0..10).collect();
        let limit = |count, offset| Limit { count, offset };

        assert_eq!(paginate(items.clone(), None).len(), 10);
        assert_eq!(paginate(items.clone(), Some(&limit(3, None))), vec![0, 1, 2]);
        assert_eq!(paginate(items.clone(), Some(&limit(3, Some(8)))), vec![8, 9]);
        assert_eq!(paginate(items.clone(), Some(&limit(-1, Some(7)))), vec![7, 8, 9]);
        assert_eq!(paginate(items.clone(), Some(&limit(2, Some(-4)))), vec![0, 1]);
        assert!(paginate(items, Some(&limit(0, None))).is_empty());
    }
}
