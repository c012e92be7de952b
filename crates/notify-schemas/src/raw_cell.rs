use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;

/// A cell as read straight off the sheet, before any mapping or coercion.
/// The reader preserves the original type; it never interprets content.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Str(String),
    Number(f64),
    DateTime(NaiveDateTime),
    Bool(bool),
}

impl RawCell {
    pub fn is_empty(&self) -> bool {
        matches!(self, RawCell::Empty)
    }

    /// Best-effort stringification used by default/fallback logic.
    pub fn as_raw_string(&self) -> String {
        match self {
            RawCell::Empty => String::new(),
            RawCell::Str(s) => s.clone(),
            RawCell::Number(n) => {
                if n.fract() == 0.0 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            RawCell::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            RawCell::Bool(b) => b.to_string(),
        }
    }
}

impl fmt::Display for RawCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_raw_string())
    }
}

/// A row as yielded by the tabular reader, keyed by the sheet's own header names.
pub type RawRow = BTreeMap<String, RawCell>;
