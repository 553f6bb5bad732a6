//! Raw parse tree → canonical `Query`

use crate::query::ast::{
    Aggregate, Assignment, Combinator, Comparator, Criteria, CrudKind, Limit, Predicate,
    PredicateGroup, Query, Selector, SortOrder,
};
use crate::query::error::{QueryError, QueryResult};
use crate::query::parser::{RawAggregate, RawBooleanGroup, RawCriterion, RawQuery};
use crate::record::OrderedMap;

/// Convert a raw parse tree into a canonical query
pub fn normalize(raw: RawQuery<'_>) -> QueryResult<Query> {
    let kind = CrudKind::from_keyword(raw.crud)
        .ok_or_else(|| QueryError::Invalid(format!("unknown operation '{}'", raw.crud)))?;

    // Mutations always act on whole entries
    let properties = match kind {
        CrudKind::Update | CrudKind::Delete => Vec::new(),
        CrudKind::Create | CrudKind::Read => {
            raw.properties.iter().map(|p| p.to_string()).collect()
        }
    };

    let mut criteria = Criteria::default();
    for criterion in raw.criteria {
        match criterion {
            RawCriterion::Sort(keys) => criteria.sort = Some(sort_keys(keys)),
            RawCriterion::Limit(args) => criteria.limit = Some(limit(args)?),
            RawCriterion::Where(group) => criteria.filter = Some(predicate_group(group)?),
            RawCriterion::Set(pairs) => {
                criteria.set = Some(
                    pairs
                        .into_iter()
                        .map(|(property, value)| Assignment {
                            property: property.to_string(),
                            value,
                        })
                        .collect(),
                )
            }
        }
    }

    let mut aggregates: Vec<Aggregate> = Vec::new();
    for raw_aggregate in raw.aggregates {
        let aggregate = aggregate(raw_aggregate)?;
        match aggregates
            .iter_mut()
            .find(|a| a.function() == aggregate.function())
        {
            Some(slot) => *slot = aggregate,
            None => aggregates.push(aggregate),
        }
    }

    Ok(Query {
        kind,
        selector: Selector {
            document: raw.document.to_string(),
            properties,
        },
        criteria,
        aggregates,
    })
}

fn sort_keys(keys: Vec<(char, &str)>) -> OrderedMap<SortOrder> {
    keys.into_iter()
        .map(|(sign, property)| {
            let order = if sign == '-' {
                SortOrder::Descending
            } else {
                SortOrder::Ascending
            };
            (property, order)
        })
        .collect()
}

/// Arguments are consumed from the front: count first, then offset
fn limit(mut args: Vec<i64>) -> QueryResult<Limit> {
    args.reverse();
    let count = args
        .pop()
        .ok_or_else(|| QueryError::Invalid("limit requires a count".to_string()))?;
    let offset = args.pop();
    Ok(Limit { count, offset })
}

fn predicate_group(group: RawBooleanGroup<'_>) -> QueryResult<PredicateGroup> {
    let combinator = match group.combinator {
        None => Combinator::None,
        Some("and") => Combinator::And,
        Some("or") => Combinator::Or,
        Some(other) => {
            return Err(QueryError::Invalid(format!("unknown combinator '{}'", other)))
        }
    };

    let predicates = group
        .predicates
        .into_iter()
        .map(|p| {
            let comparator = Comparator::from_symbol(p.comparator).ok_or_else(|| {
                QueryError::Invalid(format!("unknown comparator '{}'", p.comparator))
            })?;
            Ok(Predicate {
                property: p.property.to_string(),
                comparator,
                value: p.value,
            })
        })
        .collect::<QueryResult<Vec<_>>>()?;

    Ok(PredicateGroup {
        combinator,
        predicates,
    })
}

fn aggregate(raw: RawAggregate<'_>) -> QueryResult<Aggregate> {
    let property = raw.argument.to_string();
    match raw.function.to_ascii_lowercase().as_str() {
        "count" if raw.argument == "*" => Ok(Aggregate::CountAll),
        "count" => Ok(Aggregate::Count(property)),
        "avg" => Ok(Aggregate::Avg(property)),
        "max" => Ok(Aggregate::Max(property)),
        "min" => Ok(Aggregate::Min(property)),
        other => Err(QueryError::Invalid(format!(
            "unknown aggregate function '{}'",
            other
        ))),
    }
}
