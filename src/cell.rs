use serde::{Deserialize, Serialize};
use std::fmt;

/// A single scalar value read from a spreadsheet cell
///
/// `Empty` is the null of the table: blank cells, missing trailing cells and
/// whitespace-only text all end up here.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl CellValue {
    /// Builds a text cell, collapsing blank text to `Empty`
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value)
        }
    }

    /// Parses a raw csv field into the narrowest matching cell type
    ///
    /// A numeric type is only picked when it prints back to exactly `raw`, so
    /// ids such as `007` or `1.50` stay text.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        let numeric = match trimmed.parse::<i64>() {
            Ok(i) => Some(CellValue::Int(i)),
            Err(_) => trimmed
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(CellValue::Float),
        };
        match numeric {
            Some(value) if value.to_string() == raw => value,
            _ => CellValue::Text(raw.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// String form used for node identity and matching; `None` for nulls
    pub fn as_string(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Int(i) => write!(f, "{}", i),
            // Whole floats come out of xlsx for integer-looking ids
            CellValue::Float(x) if x.fract() == 0.0 && x.abs() < 1e15 => {
                write!(f, "{}", *x as i64)
            }
            CellValue::Float(x) => write!(f, "{}", x),
            CellValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Int(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}
