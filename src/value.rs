//! Scalar values
//!
//! `Value` is the single literal type shared by the DSL, the document store and
//! the relational store. Dates and datetimes carry no timezone.
//!
//! # Persistence
//!
//! JSON has no date type, so temporal values are written as tagged objects and
//! restored by tag detection:
//!
//! ```text
//! Date      → {"$DATE": "2020-12-24"}
//! DateTime  → {"$DATETIME": "2020-12-24T10:30:00.250"}
//! ```

use chrono::{NaiveDate, NaiveDateTime};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::{self, SerializeMap};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Tag key for serialized dates
pub const DATE_TAG: &str = "$DATE";

/// Tag key for serialized datetimes
pub const DATETIME_TAG: &str = "$DATETIME";

/// ISO layout used when persisting dates
pub const ISO_DATE: &str = "%Y-%m-%d";

/// ISO layout used when persisting datetimes (millisecond precision)
pub const ISO_DATETIME: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// A literal value in a query or a stored record
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `NULL`
    Null,
    /// Signed integer
    Integer(i64),
    /// Floating point number
    Float(f64),
    /// Calendar date
    Date(NaiveDate),
    /// Date and time of day, millisecond precision in the DSL
    DateTime(NaiveDateTime),
    /// Text
    Text(String),
    /// The `?` literal, bound to an external value at execution time
    Placeholder,
}

impl Value {
    /// Short type label used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Date(_) => "date",
            Self::DateTime(_) => "datetime",
            Self::Text(_) => "text",
            Self::Placeholder => "placeholder",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder)
    }

    /// Borrow the text content, if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of integers and floats
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Compare two values of compatible types.
    ///
    /// Integers and floats compare numerically with each other. Values of
    /// unrelated types (and placeholders) are incomparable and yield `None`.
    /// `NULL` only compares equal to `NULL`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Integer(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            (Self::DateTime(a), Self::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Equality as seen by the `==` comparator (numeric across int/float)
    pub fn loosely_equals(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    /// Ordering used for sorting: `NULL` sorts before everything else
    pub fn sort_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            (Self::Null, _) => Some(Ordering::Less),
            (_, Self::Null) => Some(Ordering::Greater),
            _ => self.compare(other),
        }
    }
}

/// Renders the value as a DSL literal
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(i) => write!(f, "{}", i),
            // fixed-point, always with a fraction so it reads back as a float
            Self::Float(x) => {
                let text = x.to_string();
                if text.contains('.') || !x.is_finite() {
                    write!(f, "{}", text)
                } else {
                    write!(f, "{}.0", text)
                }
            }
            Self::Date(d) => write!(f, "{}", d.format(ISO_DATE)),
            Self::DateTime(dt) => write!(f, "{}", dt.format(ISO_DATETIME)),
            Self::Text(s) if !s.contains('"') => write!(f, "\"{}\"", s),
            Self::Text(s) if !s.contains('\'') => write!(f, "'{}'", s),
            Self::Text(s) => write!(f, "`{}`", s),
            Self::Placeholder => write!(f, "?"),
        }
    }
}

/// Parses a single DSL literal, e.g. `"john"`, `24-12-2020` or `3.5f`
impl FromStr for Value {
    type Err = crate::query::QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::query::parse_value(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(x) => serializer.serialize_f64(*x),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Date(d) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(DATE_TAG, &d.format(ISO_DATE).to_string())?;
                map.end()
            }
            Self::DateTime(dt) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(DATETIME_TAG, &dt.format(ISO_DATETIME).to_string())?;
                map.end()
            }
            Self::Placeholder => Err(ser::Error::custom(
                "cannot serialize an unbound `?` placeholder",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "null, a number, a string or a {{\"$DATE\"|\"$DATETIME\": ...}} object")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        i64::try_from(v)
            .map(Value::Integer)
            .map_err(|_| E::custom(format!("integer {} out of range", v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::Text(v))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let Some(tag) = map.next_key::<String>()? else {
            return Err(de::Error::custom("empty object is not a value"));
        };
        let raw: String = map.next_value()?;
        let value = match tag.as_str() {
            DATE_TAG => NaiveDate::parse_from_str(&raw, ISO_DATE)
                .map(Value::Date)
                .map_err(|e| de::Error::custom(format!("invalid {} '{}': {}", DATE_TAG, raw, e)))?,
            DATETIME_TAG => NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
                .map(Value::DateTime)
                .map_err(|e| {
                    de::Error::custom(format!("invalid {} '{}': {}", DATETIME_TAG, raw, e))
                })?,
            other => return Err(de::Error::custom(format!("unknown value tag '{}'", other))),
        };
        if map.next_key::<String>()?.is_some() {
            return Err(de::Error::custom("tagged value must have exactly one key"));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_compare_numeric_across_types() {
        assert_eq!(
            Value::Integer(3).compare(&Value::Float(3.0)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            Value::Float(2.5).compare(&Value::Integer(3)),
            Some(Ordering::Less)
        );
        assert!(Value::Integer(3).loosely_equals(&Value::Float(3.0)));
    }

    #[test]
    fn test_compare_incompatible_types() {
        assert_eq!(Value::Text("3".into()).compare(&Value::Integer(3)), None);
        assert_eq!(Value::Null.compare(&Value::Integer(0)), None);
        assert_eq!(
            Value::Date(date(2020, 1, 1)).compare(&Value::Text("2020-01-01".into())),
            None
        );
    }

    #[test]
    fn test_sort_cmp_puts_null_first() {
        assert_eq!(Value::Null.sort_cmp(&Value::Integer(1)), Some(Ordering::Less));
        assert_eq!(Value::Integer(1).sort_cmp(&Value::Null), Some(Ordering::Greater));
    }

    #[test]
    fn test_date_roundtrip() {
        let value = Value::Date(date(2020, 12, 24));
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"$DATE":"2020-12-24"}"#);
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_datetime_roundtrip() {
        let dt = date(2020, 12, 24).and_hms_milli_opt(10, 30, 0, 250).unwrap();
        let value = Value::DateTime(dt);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"$DATETIME":"2020-12-24T10:30:00.250"}"#);
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_datetime_without_fraction_deserializes() {
        let back: Value = serde_json::from_str(r#"{"$DATETIME":"2020-12-24T10:30:00"}"#).unwrap();
        assert_eq!(
            back,
            Value::DateTime(date(2020, 12, 24).and_hms_opt(10, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_scalar_deserialize() {
        let values: Vec<Value> = serde_json::from_str(r#"[null, 3, 2.5, "x"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Integer(3),
                Value::Float(2.5),
                Value::Text("x".into())
            ]
        );
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert!(serde_json::from_str::<Value>(r#"{"$TIME":"10:00"}"#).is_err());
        assert!(serde_json::from_str::<Value>(r#"{"$DATE":"2020-12-24","x":1}"#).is_err());
    }

    #[test]
    fn test_placeholder_not_serializable() {
        assert!(serde_json::to_string(&Value::Placeholder).is_err());
    }

    #[test]
    fn test_display_as_literal() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::Text("john".into()).to_string(), "\"john\"");
        assert_eq!(Value::Text("say \"hi\"".into()).to_string(), "'say \"hi\"'");
        assert_eq!(Value::Placeholder.to_string(), "?");
    }

    #[test]
    fn test_float_display_reads_back() {
        for x in [1e20, -2.5e-7, 0.1, 42.0] {
            let text = Value::Float(x).to_string();
            assert!(!text.contains('e'), "{} printed as {}", x, text);
            assert_eq!(text.parse::<Value>().unwrap(), Value::Float(x));
        }
        assert_eq!(Value::Float(1e20).to_string(), "100000000000000000000.0");
    }
}
