//! Dynamically-shaped cell values and the normalized row table
//!
//! Analytics responses and uploaded tabular data both land in `RowTable`:
//! named columns over rows of loosely-typed cells. Numeric parsing is lenient
//! (strip everything but digits, dot and minus) because backends return
//! formatted strings like "1,234" or "12.5%".

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static NON_NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d.\-]").unwrap());

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
}

impl Value {
    pub fn from_str_lossy(s: &str) -> Self {
        if s.is_empty() {
            Self::Null
        } else {
            Self::Str(s.to_string())
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Display text for labels; numbers keep their shortest form.
    pub fn display(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Num(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            },
            Self::Str(s) => s.clone(),
        }
    }

    /// Lenient numeric coercion: strips thousand separators, currency marks
    /// and units before parsing. Returns None for non-numeric text.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Num(n) => {
                if n.is_finite() {
                    Some(*n)
                } else {
                    None
                }
            },
            Self::Str(s) => parse_lenient_number(s),
        }
    }

    pub fn is_blank_like(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Str(s) => {
                let v = s.trim().to_lowercase();
                matches!(
                    v.as_str(),
                    "" | "(not set)" | "not set" | "(none)" | "none" | "null" | "nan" | "unknown"
                )
            },
            _ => false,
        }
    }

    /// Sanitize NaN/Inf to Null so they never cross the wire.
    pub fn sanitized(self) -> Self {
        match self {
            Self::Num(n) if !n.is_finite() => Self::Null,
            other => other,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Num(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Str(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Num).unwrap_or(Self::Null),
            serde_json::Value::String(s) => Self::Str(s),
            other => Self::Str(other.to_string()),
        }
    }
}

/// Parse a formatted number string leniently ("1,234원" -> 1234.0)
pub fn parse_lenient_number(text: &str) -> Option<f64> {
    let cleaned = NON_NUMERIC_RE.replace_all(text.trim(), "");
    if matches!(cleaned.as_ref(), "" | "-" | "." | "-.") {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

// ============================================================================
// Row table
// ============================================================================

/// Normalized tabular result: named columns over rows of cells
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RowTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RowTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn col_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn push_row(&mut self, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub fn column_values(&self, col: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().filter_map(move |r| r.get(col))
    }

    /// Share of cells in a column that coerce to a number (empty column -> 0)
    pub fn numeric_ratio(&self, col: usize) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        let numeric = self
            .column_values(col)
            .filter(|v| v.to_number().is_some())
            .count();
        numeric as f64 / self.rows.len() as f64
    }

    /// A column is treated as numeric when most sampled cells coerce
    pub fn is_numeric_column(&self, col: usize) -> bool {
        let sample: Vec<&Value> = self.rows.iter().take(30).filter_map(|r| r.get(col)).collect();
        if sample.is_empty() {
            return false;
        }
        let numeric = sample.iter().filter(|v| v.to_number().is_some()).count();
        numeric >= sample.len().min(3).max(1)
    }

    /// First column whose sampled first row is non-numeric (label column)
    pub fn first_label_column(&self) -> Option<usize> {
        let first = self.rows.first()?;
        first.iter().position(|v| v.to_number().is_none() && !matches!(v, Value::Null))
    }

    /// Count of distinct non-null display values in a column
    pub fn nunique(&self, col: usize) -> usize {
        let mut seen = std::collections::HashSet::new();
        for v in self.column_values(col) {
            if matches!(v, Value::Null) {
                continue;
            }
            let s = v.display();
            if s.is_empty() {
                continue;
            }
            seen.insert(s);
        }
        seen.len()
    }

    /// Keep only rows where `keep` returns true
    pub fn filtered<F>(&self, keep: F) -> Self
    where
        F: Fn(&[Value]) -> bool,
    {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Serialize rows as JSON records preserving column order
    pub fn to_json_records(&self, limit: usize) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| {
                let mut obj = serde_json::Map::new();
                for (c, v) in self.columns.iter().zip(row.iter()) {
                    obj.insert(c.clone(), v.clone().sanitized().to_json());
                }
                serde_json::Value::Object(obj)
            })
            .collect()
    }

    /// Build from JSON records (first record fixes the column order)
    pub fn from_json_records(records: &[serde_json::Value]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for rec in records {
            if let serde_json::Value::Object(obj) = rec {
                for k in obj.keys() {
                    if !columns.iter().any(|c| c == k) {
                        columns.push(k.clone());
                    }
                }
            }
        }
        let mut table = Self::new(columns);
        for rec in records {
            if let serde_json::Value::Object(obj) = rec {
                let row = table
                    .columns
                    .iter()
                    .map(|c| obj.get(c).cloned().map(Value::from).unwrap_or(Value::Null))
                    .collect();
                table.rows.push(row);
            }
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lenient_number() {
        assert_eq!(parse_lenient_number("1,234"), Some(1234.0));
        assert_eq!(parse_lenient_number("12.5%"), Some(12.5));
        assert_eq!(parse_lenient_number("1,234원"), Some(1234.0));
        assert_eq!(parse_lenient_number("abc"), None);
        assert_eq!(parse_lenient_number("-"), None);
    }

    #[test]
    fn test_value_sanitize() {
        assert_eq!(Value::Num(f64::NAN).sanitized(), Value::Null);
        assert_eq!(Value::Num(f64::INFINITY).sanitized(), Value::Null);
        assert_eq!(Value::Num(3.0).sanitized(), Value::Num(3.0));
    }

    #[test]
    fn test_blank_like() {
        assert!(Value::Str("(not set)".to_string()).is_blank_like());
        assert!(Value::Str("  ".to_string()).is_blank_like());
        assert!(Value::Null.is_blank_like());
        assert!(!Value::Str("direct".to_string()).is_blank_like());
    }

    #[test]
    fn test_row_table_roundtrip() {
        let mut t = RowTable::new(vec!["channel".into(), "sessions".into()]);
        t.push_row(vec![Value::Str("organic".into()), Value::Num(120.0)]);
        t.push_row(vec![Value::Str("direct".into()), Value::Num(80.0)]);

        assert_eq!(t.col_index("sessions"), Some(1));
        assert!(t.is_numeric_column(1));
        assert!(!t.is_numeric_column(0));
        assert_eq!(t.first_label_column(), Some(0));
        assert_eq!(t.nunique(0), 2);

        let records = t.to_json_records(10);
        assert_eq!(records.len(), 2);
        let back = RowTable::from_json_records(&records);
        assert_eq!(back.columns, t.columns);
        assert_eq!(back.len(), 2);
    }
}
