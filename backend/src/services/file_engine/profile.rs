//! Column profiling for uploaded tables
//!
//! Every column gets one of five kinds. The kind decides what the engine may
//! do with it: numeric columns are computed over, categorical columns are
//! grouped by, identifiers are counted but never summed.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::models::{RowTable, Value};

const SAMPLE_LIMIT: usize = 2000;
const BOOL_RATIO: f64 = 0.95;
const DATE_RATIO: f64 = 0.90;
const NUMERIC_RATIO: f64 = 0.95;

const BOOL_TOKENS: &[&str] = &["y", "n", "yes", "no", "true", "false", "0", "1", "t", "f"];
const ID_NAME_TOKENS: &[&str] = &["id", "_id", "idx", "코드", "번호", "no", "seq", "key"];
const CODE_NAME_TOKENS: &[&str] = &[
    "route", "type", "category", "status", "grade", "level", "group", "구분", "유형", "등급",
    "상태", "경로",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Date,
    Boolean,
    Identifier,
}

pub fn profile_columns(table: &RowTable) -> Vec<ColumnKind> {
    (0..table.columns.len())
        .map(|col| infer_column_kind(table, col))
        .collect()
}

pub fn columns_of_kind<'a>(
    table: &'a RowTable,
    profile: &[ColumnKind],
    kind: ColumnKind,
) -> Vec<&'a str> {
    profile
        .iter()
        .enumerate()
        .filter(|(_, k)| **k == kind)
        .map(|(i, _)| table.columns[i].as_str())
        .collect()
}

fn infer_column_kind(table: &RowTable, col: usize) -> ColumnKind {
    let name_lower = table.columns[col].to_lowercase();

    let sample: Vec<&Value> = table
        .column_values(col)
        .filter(|v| !matches!(v, Value::Null))
        .take(SAMPLE_LIMIT)
        .collect();
    if sample.is_empty() {
        return ColumnKind::Categorical;
    }

    if sample.iter().all(|v| matches!(v, Value::Bool(_))) {
        return ColumnKind::Boolean;
    }

    let texts: Vec<String> = sample
        .iter()
        .map(|v| v.display().trim().to_lowercase())
        .collect();

    if sample.len() >= 5 {
        let bool_hits = texts
            .iter()
            .filter(|t| BOOL_TOKENS.contains(&t.as_str()))
            .count();
        if bool_hits as f64 / texts.len() as f64 >= BOOL_RATIO {
            return ColumnKind::Boolean;
        }
    }

    let date_hits = texts.iter().filter(|t| parse_any_date(t).is_some()).count();
    if date_hits as f64 / texts.len() as f64 >= DATE_RATIO {
        return ColumnKind::Date;
    }

    let numbers: Vec<f64> = texts
        .iter()
        .filter_map(|t| crate::models::parse_lenient_number(t))
        .collect();
    if numbers.len() as f64 / texts.len() as f64 >= NUMERIC_RATIO {
        let unique_count = {
            let mut seen = std::collections::HashSet::new();
            texts.iter().for_each(|t| {
                seen.insert(t.clone());
            });
            seen.len()
        };
        let unique_ratio = unique_count as f64 / texts.len() as f64;
        let integer_like = !numbers.is_empty()
            && numbers.iter().filter(|n| n.fract() == 0.0).count() as f64 / numbers.len() as f64
                >= 0.98;

        let id_name = ID_NAME_TOKENS.iter().any(|t| name_lower.contains(t));
        let code_name = CODE_NAME_TOKENS.iter().any(|t| name_lower.contains(t));
        let low_card_code = integer_like && unique_count <= 20 && unique_ratio <= 0.4;
        let seq_like = integer_like && is_sequence_like(&numbers);

        // Code-like numbers are labels, not measures
        if code_name || low_card_code {
            return ColumnKind::Categorical;
        }
        if id_name || seq_like {
            return ColumnKind::Identifier;
        }
        return ColumnKind::Numeric;
    }

    ColumnKind::Categorical
}

fn is_sequence_like(numbers: &[f64]) -> bool {
    if numbers.len() < 3 {
        return false;
    }
    let mut sorted = numbers.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let ones = sorted
        .windows(2)
        .filter(|pair| (pair[1] - pair[0] - 1.0).abs() < f64::EPSILON)
        .count();
    ones as f64 / (sorted.len() - 1) as f64 >= 0.95
}

/// Parse a date from the common layouts uploaded files use
pub fn parse_any_date(text: &str) -> Option<NaiveDate> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(t, format) {
            return Some(d);
        }
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, format) {
            return Some(dt.date());
        }
    }
    if t.len() == 8 && t.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(d) = NaiveDate::parse_from_str(t, "%Y%m%d") {
            return Some(d);
        }
    }
    None
}
