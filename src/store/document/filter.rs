//! Predicate evaluation over stored records
//!
//! A filter plan keeps the shape of a `where` clause (combinator, property and
//! comparator per predicate); the right-hand values arrive separately as bound
//! parameters, one per predicate.

use crate::query::{Combinator, Comparator, PredicateGroup};
use crate::record::Record;
use crate::store::error::{StoreError, StoreResult};
use crate::value::Value;
use std::cmp::Ordering;

/// Compiled `where` clause
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPlan {
    pub combinator: Combinator,
    /// `(property, comparator)` per predicate, in declaration order
    pub terms: Vec<(String, Comparator)>,
}

impl FilterPlan {
    pub fn from_group(group: &PredicateGroup) -> Self {
        Self {
            combinator: group.combinator,
            terms: group
                .predicates
                .iter()
                .map(|p| (p.property.clone(), p.comparator))
                .collect(),
        }
    }

    /// Select the entries this filter accepts, given one value per term.
    ///
    /// `and` narrows the full entry list term by term. `or` filters the full
    /// list once per term and merges the results, dropping structural
    /// duplicates while keeping first-seen order.
    pub fn apply(&self, entries: &[Record], values: &[Value], document: &str) -> StoreResult<Vec<Record>> {
        if values.len() != self.terms.len() {
            return Err(StoreError::Binding {
                expected: self.terms.len(),
                supplied: values.len(),
            });
        }

        let mut terms = self.terms.iter().zip(values);
        match self.combinator {
            Combinator::Or => {
                let mut merged: Vec<Record> = Vec::new();
                for ((property, comparator), value) in terms {
                    for entry in select(entries, document, property, *comparator, value)? {
                        if !merged.contains(&entry) {
                            merged.push(entry);
                        }
                    }
                }
                Ok(merged)
            }
            Combinator::And | Combinator::None => {
                let mut current = match terms.next() {
                    Some(((property, comparator), value)) => {
                        select(entries, document, property, *comparator, value)?
                    }
                    None => entries.to_vec(),
                };
                for ((property, comparator), value) in terms {
                    current = select(&current, document, property, *comparator, value)?;
                }
                Ok(current)
            }
        }
    }
}

/// Entries accepted by `filter`; every entry when there is no filter
pub fn matching(
    entries: &[Record],
    filter: Option<&FilterPlan>,
    values: &[Value],
    document: &str,
) -> StoreResult<Vec<Record>> {
    match filter {
        Some(plan) => plan.apply(entries, values, document),
        None => Ok(entries.to_vec()),
    }
}

fn select(
    entries: &[Record],
    document: &str,
    property: &str,
    comparator: Comparator,
    value: &Value,
) -> StoreResult<Vec<Record>> {
    let mut selected = Vec::new();
    for entry in entries {
        if evaluate(entry, document, property, comparator, value)? {
            selected.push(entry.clone());
        }
    }
    Ok(selected)
}

/// Test one entry against `property comparator value`
pub fn evaluate(
    entry: &Record,
    document: &str,
    property: &str,
    comparator: Comparator,
    value: &Value,
) -> StoreResult<bool> {
    let field = entry.get(property).ok_or_else(|| StoreError::Lookup {
        document: document.to_string(),
        property: property.to_string(),
    })?;

    let ordering = |field: &Value| {
        field.compare(value).ok_or_else(|| StoreError::Incomparable {
            property: property.to_string(),
            left: field.to_string(),
            right: value.to_string(),
        })
    };

    Ok(match comparator {
        Comparator::Eq | Comparator::Is => field.loosely_equals(value),
        Comparator::Ne => !field.loosely_equals(value),
        Comparator::Lt => ordering(field)? == Ordering::Less,
        Comparator::Le => ordering(field)? != Ordering::Greater,
        Comparator::Gt => ordering(field)? == Ordering::Greater,
        Comparator::Ge => ordering(field)? != Ordering::Less,
        Comparator::Like => {
            let pattern = value
                .as_text()
                .ok_or_else(|| StoreError::pattern(property, value))?;
            match field.as_text() {
                Some(text) => LikePattern::parse(pattern).matches(text),
                None => false,
            }
        }
    })
}

/// A `~=` pattern with `%` wildcards at the ends or once in the middle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LikePattern<'a> {
    /// `%x%`
    Contains(&'a str),
    /// `%x`
    EndsWith(&'a str),
    /// `x%`
    StartsWith(&'a str),
    /// `a%b`, split at the first `%`
    Surrounds(&'a str, &'a str),
    /// no `%`
    Exact(&'a str),
}

impl<'a> LikePattern<'a> {
    pub fn parse(pattern: &'a str) -> Self {
        if pattern.len() >= 2 && pattern.starts_with('%') && pattern.ends_with('%') {
            Self::Contains(&pattern[1..pattern.len() - 1])
        } else if let Some(suffix) = pattern.strip_prefix('%') {
            Self::EndsWith(suffix)
        } else if let Some(prefix) = pattern.strip_suffix('%') {
            Self::StartsWith(prefix)
        } else if let Some((prefix, suffix)) = pattern.split_once('%') {
            Self::Surrounds(prefix, suffix)
        } else {
            Self::Exact(pattern)
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        match self {
            Self::Contains(inner) => text.contains(inner),
            Self::EndsWith(suffix) => text.ends_with(suffix),
            Self::StartsWith(prefix) => text.starts_with(prefix),
            // prefix and suffix may overlap: `jo%oj` accepts `joj`
            Self::Surrounds(prefix, suffix) => {
                text.starts_with(prefix) && text.ends_with(suffix)
            }
            Self::Exact(exact) => text == *exact,
        }
    }
}
