//! Typed record values and the deep union used to merge decoded rows
//!
//! A record is a string-keyed map whose values are scalars or nested maps.
//! Merging two records is a recursive union: nested maps are unioned key by
//! key, and for any other collision the value merged last wins.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A record: field name to value, ordered for deterministic output
pub type Record = BTreeMap<String, Value>;

/// A single field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Integer scalar (timestamps, counters)
    Int(i64),
    /// Floating point scalar (measurements)
    Float(f64),
    /// Text scalar (identifiers)
    Text(String),
    /// Nested mapping
    Map(Record),
}

impl Value {
    /// Returns the nested map, if this value is one
    pub fn as_map(&self) -> Option<&Record> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the integer, if this value is one
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Whether this value is a scalar
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Map(_))
    }

    /// Render a scalar as a CSV cell. Nested maps have no cell form.
    pub fn to_cell(&self) -> Option<String> {
        match self {
            Value::Int(i) => Some(i.to_string()),
            // Debug keeps the fractional part so the cell reads back as a float
            Value::Float(f) => Some(format!("{:?}", f)),
            Value::Text(s) => Some(s.clone()),
            Value::Map(_) => None,
        }
    }

    /// Parse a CSV cell into the narrowest scalar that holds it
    pub fn from_cell(cell: &str) -> Value {
        if let Ok(i) = cell.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = cell.parse::<f64>() {
            if f.is_finite() {
                return Value::Float(f);
            }
        }
        Value::Text(cell.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Map(v)
    }
}

/// Merge `src` into `dst`.
///
/// When both sides hold a map under the same key the maps are merged
/// recursively. Otherwise the value from `src` replaces the one in `dst`.
pub fn deep_merge(dst: &mut Record, src: Record) {
    for (key, incoming) in src {
        let Value::Map(nested) = incoming else {
            dst.insert(key, incoming);
            continue;
        };
        if let Some(Value::Map(existing)) = dst.get_mut(&key) {
            deep_merge(existing, nested);
            continue;
        }
        dst.insert(key, Value::Map(nested));
    }
}
