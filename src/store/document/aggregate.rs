//! Aggregate functions over selected records

use crate::query::Aggregate;
use crate::record::Record;
use crate::store::error::{StoreError, StoreResult};
use crate::value::Value;
use std::cmp::Ordering;

/// Compute every aggregate into one record keyed by its display form
/// (`COUNT(*)`, `AVG(songs)`, ...)
pub fn aggregate(records: &[Record], aggregates: &[Aggregate], document: &str) -> StoreResult<Record> {
    let mut result = Record::new();
    for aggregate in aggregates {
        let value = match aggregate {
            Aggregate::CountAll => Value::Integer(records.len() as i64),
            Aggregate::Count(property) => {
                let values = column(records, property, document)?;
                Value::Integer(values.iter().filter(|v| !v.is_null()).count() as i64)
            }
            Aggregate::Avg(property) => average(&column(records, property, document)?, property)?,
            Aggregate::Max(property) => {
                extreme(&column(records, property, document)?, property, Ordering::Greater)?
            }
            Aggregate::Min(property) => {
                extreme(&column(records, property, document)?, property, Ordering::Less)?
            }
        };
        result.insert(aggregate.to_string(), value);
    }
    Ok(result)
}

fn column<'a>(records: &'a [Record], property: &str, document: &str) -> StoreResult<Vec<&'a Value>> {
    records
        .iter()
        .map(|record| {
            record.get(property).ok_or_else(|| StoreError::Lookup {
                document: document.to_string(),
                property: property.to_string(),
            })
        })
        .collect()
}

fn average(values: &[&Value], property: &str) -> StoreResult<Value> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in values.iter().filter(|v| !v.is_null()) {
        let number = value.as_f64().ok_or_else(|| StoreError::Incomparable {
            property: property.to_string(),
            left: value.to_string(),
            right: "a number".to_string(),
        })?;
        sum += number;
        count += 1;
    }

    if count == 0 {
        Ok(Value::Null)
    } else {
        Ok(Value::Float(sum / count as f64))
    }
}

/// Largest (`Greater`) or smallest (`Less`) non-null value
fn extreme(values: &[&Value], property: &str, keep: Ordering) -> StoreResult<Value> {
    let mut best: Option<&Value> = None;
    for value in values.iter().copied().filter(|v| !v.is_null()) {
        best = match best {
            None => Some(value),
            Some(current) => {
                let ordering = value.compare(current).ok_or_else(|| StoreError::Incomparable {
                    property: property.to_string(),
                    left: value.to_string(),
                    right: current.to_string(),
                })?;
                if ordering == keep {
                    Some(value)
                } else {
                    Some(current)
                }
            }
        };
    }
    Ok(best.cloned().unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<Record> {
        vec![
            [("name", Value::from("a")), ("songs", Value::Integer(3))]
                .into_iter()
                .collect(),
            [("name", Value::from("b")), ("songs", Value::Float(4.5))]
                .into_iter()
                .collect(),
            [("name", Value::from("c")), ("songs", Value::Null)]
                .into_iter()
                .collect(),
        ]
    }

    #[test]
    fn test_all_functions() {
        let result = aggregate(
            &records(),
            &[
                Aggregate::CountAll,
                Aggregate::Avg("songs".into()),
                Aggregate::Max("songs".into()),
                Aggregate::Min("name".into()),
            ],
            "artists",
        )
        .unwrap();

        assert_eq!(
            result.keys().collect::<Vec<_>>(),
            vec!["COUNT(*)", "AVG(songs)", "MAX(songs)", "MIN(name)"]
        );
        assert_eq!(result.get("COUNT(*)"), Some(&Value::Integer(3)));
        assert_eq!(result.get("AVG(songs)"), Some(&Value::Float(3.75)));
        assert_eq!(result.get("MAX(songs)"), Some(&Value::Float(4.5)));
        assert_eq!(result.get("MIN(name)"), Some(&Value::from("a")));
    }

    #[test]
    fn test_count_property_skips_nulls() {
        let result = aggregate(&records(), &[Aggregate::Count("songs".into())], "artists").unwrap();
        assert_eq!(result.get("COUNT(songs)"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_empty_input() {
        let result = aggregate(
            &[],
            &[Aggregate::CountAll, Aggregate::Avg("x".into()), Aggregate::Max("x".into())],
            "artists",
        )
        .unwrap();
        assert_eq!(result.get("COUNT(*)"), Some(&Value::Integer(0)));
        assert_eq!(result.get("AVG(x)"), Some(&Value::Null));
        assert_eq!(result.get("MAX(x)"), Some(&Value::Null));
    }

    #[test]
    fn test_average_of_text_fails() {
        let err = aggregate(&records(), &[Aggregate::Avg("name".into())], "artists").unwrap_err();
        assert!(matches!(err, StoreError::Incomparable { .. }));
    }

    #[test]
    fn test_missing_property() {
        let err = aggregate(&records(), &[Aggregate::Max("age".into())], "artists").unwrap_err();
        assert!(matches!(err, StoreError::Lookup { .. }));
    }
}
