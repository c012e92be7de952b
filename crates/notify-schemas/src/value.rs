use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The closed value lattice the rule engine and action renderer operate over.
/// Deliberately small: no arrays, no nested objects, no callables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Date(_) => true,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, ""),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

/// A normalized row: ordered so iteration and serialization are deterministic.
pub type Row = BTreeMap<String, Value>;

/// Dict-like accessor over a row, plus optional rule results, supporting both
/// `row.email` and `row["email"]` forms in templates and rule expressions.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub row: Row,
    pub rule_results: BTreeMap<String, bool>,
}

impl Context {
    pub fn new(row: Row, rule_results: BTreeMap<String, bool>) -> Self {
        Self { row, rule_results }
    }

    /// Resolves a dotted path such as `row.email` or `rule_results.debe_notificar`.
    pub fn get_path(&self, path: &str) -> Option<Value> {
        let mut parts = path.splitn(2, '.');
        let root = parts.next()?;
        let rest = parts.next();
        match (root, rest) {
            ("row", Some(field)) => self.row.get(field).cloned(),
            ("rule_results", Some(field)) => {
                self.rule_results.get(field).map(|b| Value::Bool(*b))
            }
            ("row", None) => None,
            ("rule_results", None) => None,
            _ => None,
        }
    }
}
