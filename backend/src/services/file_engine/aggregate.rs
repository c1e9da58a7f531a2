//! Deterministic aggregation over uploaded tables
//!
//! Column guessing is keyword-driven: the question's Korean vocabulary is
//! mapped to likely column names, with a cardinality bonus for plausible
//! group axes. Output rows are always sorted by value descending.

use std::collections::{HashMap, HashSet};

use super::profile::{parse_any_date, profile_columns, ColumnKind};
use crate::models::{RowTable, Value};

const MAX_GROUP_ROWS: usize = 200;
const MAX_TREND_ROWS: usize = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggOp {
    Sum,
    Mean,
    Max,
    Min,
    Count,
}

impl AggOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Max => "max",
            Self::Min => "min",
            Self::Count => "count",
        }
    }
}

pub fn guess_op(question: &str) -> AggOp {
    let q = question.to_lowercase();
    if ["평균", "avg", "average", "mean"].iter().any(|k| q.contains(k)) {
        return AggOp::Mean;
    }
    if ["최대", "max", "가장 큰", "highest"].iter().any(|k| q.contains(k)) {
        return AggOp::Max;
    }
    if ["최소", "min", "가장 작은", "lowest"].iter().any(|k| q.contains(k)) {
        return AggOp::Min;
    }
    if ["개수", "count", "몇", "얼마나"].iter().any(|k| q.contains(k)) {
        return AggOp::Count;
    }
    AggOp::Sum
}

/// Best group axis: name keyword hits plus a cardinality bonus
pub fn guess_group_column(table: &RowTable, question: &str) -> Option<String> {
    let q = question.to_lowercase();
    let profile = profile_columns(table);

    let mut best: Option<(i32, String)> = None;
    for (idx, column) in table.columns.iter().enumerate() {
        if profile[idx] == ColumnKind::Numeric {
            continue;
        }
        let cl = column.to_lowercase();
        let mut score = 0;
        if q.contains(&cl) {
            score += 3;
        }
        if q.contains("유형") && ["type", "유형", "category", "카테고리"].iter().any(|k| cl.contains(k)) {
            score += 3;
        }
        if q.contains("채널") && (cl.contains("channel") || cl.contains("채널")) {
            score += 3;
        }
        if q.contains("국가") && (cl.contains("country") || cl.contains("국가")) {
            score += 3;
        }
        if q.contains("후원") && (cl.contains("donation") || cl.contains("후원")) {
            score += 2;
        }
        let nunique = table.nunique(idx);
        if nunique >= 2 && nunique <= 200.min(table.len()) {
            score += 1;
        }
        if score > 0 {
            let better = match &best {
                None => true,
                Some((best_score, best_name)) => {
                    score > *best_score || (score == *best_score && column < best_name)
                },
            };
            if better {
                best = Some((score, column.clone()));
            }
        }
    }

    if let Some((_, column)) = best {
        return Some(column);
    }
    // First non-numeric column as a last resort
    table
        .columns
        .iter()
        .enumerate()
        .find(|(idx, _)| profile[*idx] != ColumnKind::Numeric)
        .map(|(_, c)| c.clone())
}

/// Best measure: numeric column favored by the question's vocabulary
pub fn guess_metric_column(table: &RowTable, question: &str) -> Option<String> {
    let q = question.to_lowercase();
    let profile = profile_columns(table);
    let numeric: Vec<(usize, &String)> = table
        .columns
        .iter()
        .enumerate()
        .filter(|(idx, _)| profile[*idx] == ColumnKind::Numeric)
        .collect();
    if numeric.is_empty() {
        return None;
    }

    let mut scored: Vec<(i32, &String)> = numeric
        .iter()
        .map(|(_, column)| {
            let cl = column.to_lowercase();
            let mut score = 0;
            if q.contains(&cl) {
                score += 4;
            }
            if ["매출", "수익", "금액", "revenue", "sales"].iter().any(|k| q.contains(k))
                && ["revenue", "amount", "sales", "매출", "수익", "금액", "price"]
                    .iter()
                    .any(|k| cl.contains(k))
            {
                score += 4;
            }
            if ["사용자", "유저", "후원자"].iter().any(|k| q.contains(k))
                && ["user", "사용자", "유저", "member", "buyer", "purchaser"]
                    .iter()
                    .any(|k| cl.contains(k))
            {
                score += 3;
            }
            if ["클릭", "이벤트", "횟수", "count"].iter().any(|k| q.contains(k))
                && ["count", "event", "click", "횟수"].iter().any(|k| cl.contains(k))
            {
                score += 3;
            }
            (score, *column)
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored.first().map(|(_, c)| (*c).clone())
}

pub fn guess_date_column(table: &RowTable) -> Option<String> {
    let profile = profile_columns(table);
    if let Some((idx, _)) = table
        .columns
        .iter()
        .enumerate()
        .find(|(idx, _)| profile[*idx] == ColumnKind::Date)
    {
        return Some(table.columns[idx].clone());
    }
    table
        .columns
        .iter()
        .find(|c| {
            let cl = c.to_lowercase();
            ["date", "day", "일자", "날짜", "yearmonth", "month"].iter().any(|k| cl.contains(k))
        })
        .cloned()
}

fn blank_group_label(value: &Value) -> bool {
    value.is_blank_like()
}

/// Group rows and aggregate the metric; one output row per group, sorted by
/// value descending, capped at 200
pub fn group_aggregate(
    table: &RowTable,
    group_col: &str,
    metric_col: Option<&str>,
    op: AggOp,
    drop_missing: bool,
) -> RowTable {
    let Some(group_idx) = table.col_index(group_col) else {
        return RowTable::default();
    };
    let metric_idx = metric_col.and_then(|c| table.col_index(c));

    let mut order: Vec<String> = Vec::new();
    let mut sums: HashMap<String, f64> = HashMap::new();
    let mut counts: HashMap<String, f64> = HashMap::new();
    let mut sizes: HashMap<String, f64> = HashMap::new();
    let mut extremes: HashMap<String, f64> = HashMap::new();

    for row in &table.rows {
        let Some(group_value) = row.get(group_idx) else { continue };
        if drop_missing && blank_group_label(group_value) {
            continue;
        }
        let label = group_value.display();
        if !sums.contains_key(&label) {
            order.push(label.clone());
        }

        let value = metric_idx
            .and_then(|idx| row.get(idx))
            .and_then(|v| v.to_number());
        let sum = sums.entry(label.clone()).or_insert(0.0);
        *sizes.entry(label.clone()).or_insert(0.0) += 1.0;
        if let Some(v) = value {
            *sum += v;
            *counts.entry(label.clone()).or_insert(0.0) += 1.0;
            let extreme = extremes.entry(label.clone()).or_insert(v);
            match op {
                AggOp::Max => *extreme = extreme.max(v),
                AggOp::Min => *extreme = extreme.min(v),
                _ => {},
            }
        }
    }

    let value_name = match (op, metric_col) {
        (AggOp::Count, _) | (_, None) => "count".to_string(),
        (op, Some(metric)) => format!("{}_{}", metric, op.as_str()),
    };

    let mut out = RowTable::new(vec![group_col.to_string(), value_name]);
    for label in order {
        let value = match (op, metric_idx) {
            (AggOp::Count, _) | (_, None) => sizes.get(&label).copied().unwrap_or(0.0),
            (AggOp::Mean, Some(_)) => {
                let count = counts.get(&label).copied().unwrap_or(0.0);
                if count > 0.0 {
                    sums.get(&label).copied().unwrap_or(0.0) / count
                } else {
                    0.0
                }
            },
            (AggOp::Max, Some(_)) | (AggOp::Min, Some(_)) => {
                extremes.get(&label).copied().unwrap_or(0.0)
            },
            (AggOp::Sum, Some(_)) => sums.get(&label).copied().unwrap_or(0.0),
        };
        out.push_row(vec![Value::Str(label), Value::Num(value)]);
    }

    out.rows.sort_by(|a, b| {
        let av = a[1].to_number().unwrap_or(0.0);
        let bv = b[1].to_number().unwrap_or(0.0);
        bv.partial_cmp(&av).unwrap_or(std::cmp::Ordering::Equal)
    });
    out.rows.truncate(MAX_GROUP_ROWS);
    out
}

/// Single aggregate over the whole table
pub fn aggregate_single(table: &RowTable, metric_col: Option<&str>, op: AggOp) -> RowTable {
    let Some(metric) = metric_col else {
        let mut out = RowTable::new(vec!["row_count".to_string()]);
        out.push_row(vec![Value::Num(table.len() as f64)]);
        return out;
    };
    let Some(idx) = table.col_index(metric) else {
        let mut out = RowTable::new(vec!["row_count".to_string()]);
        out.push_row(vec![Value::Num(table.len() as f64)]);
        return out;
    };

    let numbers: Vec<f64> = table.column_values(idx).filter_map(|v| v.to_number()).collect();
    let value = match op {
        AggOp::Count => numbers.len() as f64,
        AggOp::Mean => {
            if numbers.is_empty() {
                0.0
            } else {
                numbers.iter().sum::<f64>() / numbers.len() as f64
            }
        },
        AggOp::Max => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max).max(0.0),
        AggOp::Min => {
            if numbers.is_empty() {
                0.0
            } else {
                numbers.iter().copied().fold(f64::INFINITY, f64::min)
            }
        },
        AggOp::Sum => numbers.iter().sum(),
    };

    let mut out = RowTable::new(vec![format!("{}_{}", metric, op.as_str())]);
    out.push_row(vec![Value::Num(value)]);
    out
}

/// Daily aggregation; ascending by date key
pub fn trend_aggregate(
    table: &RowTable,
    date_col: &str,
    metric_col: Option<&str>,
    op: AggOp,
) -> RowTable {
    let Some(date_idx) = table.col_index(date_col) else {
        return RowTable::default();
    };
    let metric_idx = metric_col.and_then(|c| table.col_index(c));

    let mut sums: HashMap<String, f64> = HashMap::new();
    let mut counts: HashMap<String, f64> = HashMap::new();
    for row in &table.rows {
        let Some(date) = row.get(date_idx).map(|v| v.display()).and_then(|t| parse_any_date(&t))
        else {
            continue;
        };
        let key = date.to_string();
        let value = metric_idx
            .and_then(|idx| row.get(idx))
            .and_then(|v| v.to_number());
        let sum = sums.entry(key.clone()).or_insert(0.0);
        let count = counts.entry(key).or_insert(0.0);
        if let Some(v) = value {
            *sum += v;
        }
        *count += 1.0;
    }

    let value_name = match (op, metric_col) {
        (AggOp::Count, _) | (_, None) => "count".to_string(),
        (op, Some(metric)) => format!("{}_{}", metric, op.as_str()),
    };

    let mut keys: Vec<String> = sums.keys().cloned().collect();
    keys.sort();

    let mut out = RowTable::new(vec!["date_key".to_string(), value_name]);
    for key in keys.into_iter().take(MAX_TREND_ROWS) {
        let value = match (op, metric_idx) {
            (AggOp::Count, _) | (_, None) => counts.get(&key).copied().unwrap_or(0.0),
            (AggOp::Mean, Some(_)) => {
                let count = counts.get(&key).copied().unwrap_or(0.0);
                if count > 0.0 { sums.get(&key).copied().unwrap_or(0.0) / count } else { 0.0 }
            },
            _ => sums.get(&key).copied().unwrap_or(0.0),
        };
        out.push_row(vec![Value::Str(key), Value::Num(value)]);
    }
    out
}

// ============================================================================
// Count helpers
// ============================================================================

pub fn find_user_id_column(table: &RowTable) -> Option<String> {
    table
        .columns
        .iter()
        .find(|c| {
            let cl = c.to_lowercase();
            ["user_id", "userid", "member_id", "moc_idx", "uid", "id"]
                .iter()
                .any(|k| cl.contains(k))
        })
        .cloned()
}

pub fn find_admin_columns(table: &RowTable) -> Vec<String> {
    table
        .columns
        .iter()
        .filter(|c| {
            let cl = c.to_lowercase();
            cl.contains("admin") || c.contains("관리자")
        })
        .cloned()
        .collect()
}

pub fn count_unique(table: &RowTable, column: &str) -> usize {
    table.col_index(column).map(|idx| table.nunique(idx)).unwrap_or(0)
}

pub fn count_truthy(table: &RowTable, column: &str) -> usize {
    let Some(idx) = table.col_index(column) else {
        return 0;
    };
    table
        .column_values(idx)
        .filter(|v| match v {
            Value::Bool(b) => *b,
            Value::Num(n) => *n > 0.0,
            Value::Str(s) => {
                matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "y" | "yes" | "t")
            },
            Value::Null => false,
        })
        .count()
}

pub fn question_wants_drop_missing(question: &str) -> bool {
    let q = question.to_lowercase();
    ["결측 제외", "결측치 제외", "null 제외", "not set 제외", "(not set) 제외", "빈값 제외", "누락 제외"]
        .iter()
        .any(|k| q.contains(k))
}

/// Dataset date span from the best date column
pub fn infer_dataset_period(table: &RowTable) -> Option<String> {
    let date_col = guess_date_column(table)?;
    let idx = table.col_index(&date_col)?;
    let mut dates: Vec<String> = table
        .column_values(idx)
        .filter_map(|v| parse_any_date(&v.display()))
        .map(|d| d.to_string())
        .collect();
    if dates.is_empty() {
        return None;
    }
    dates.sort();
    Some(format!("{} ~ {}", dates[0], dates[dates.len() - 1]))
}

/// Unique non-blank values of a column, ordered by first appearance
pub fn unique_column_values(table: &RowTable, column: &str) -> Vec<String> {
    let Some(idx) = table.col_index(column) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    let mut values = Vec::new();
    for v in table.column_values(idx) {
        if matches!(v, Value::Null) {
            continue;
        }
        let text = v.display();
        if text.is_empty() {
            continue;
        }
        if seen.insert(text.clone()) {
            values.push(text);
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    fn donations_table() -> RowTable {
        let mut t = RowTable::new(vec![
            "후원유형".to_string(),
            "결제금액".to_string(),
            "member_id".to_string(),
            "결제일".to_string(),
        ]);
        let rows = [
            ("정기", 1000.0, "m1", "2026-01-01"),
            ("정기", 3000.0, "m2", "2026-01-01"),
            ("일시", 500.0, "m1", "2026-01-02"),
            ("일시", 1500.0, "m3", "2026-01-03"),
            ("정기", 2000.0, "m2", "2026-01-03"),
        ];
        for (kind, amount, member, date) in rows {
            t.push_row(vec![
                Value::Str(kind.to_string()),
                Value::Num(amount),
                Value::Str(member.to_string()),
                Value::Str(date.to_string()),
            ]);
        }
        t
    }

    #[test]
    fn test_guess_group_column() {
        let col = guess_group_column(&donations_table(), "후원유형별 결제금액 합계").unwrap();
        assert_eq!(col, "후원유형");
    }

    #[test]
    fn test_guess_metric_column() {
        let col = guess_metric_column(&donations_table(), "유형별 금액 합계").unwrap();
        assert_eq!(col, "결제금액");
    }

    #[test]
    fn test_group_aggregate_sum_sorted() {
        let t = donations_table();
        let out = group_aggregate(&t, "후원유형", Some("결제금액"), AggOp::Sum, false);
        assert_eq!(out.len(), 2);
        assert_eq!(out.cell(0, 0), Some(&Value::Str("정기".into())));
        assert_eq!(out.cell(0, 1), Some(&Value::Num(6000.0)));
        assert_eq!(out.cell(1, 1), Some(&Value::Num(2000.0)));
    }

    #[test]
    fn test_group_aggregate_mean() {
        let t = donations_table();
        let out = group_aggregate(&t, "후원유형", Some("결제금액"), AggOp::Mean, false);
        assert_eq!(out.cell(0, 1), Some(&Value::Num(2000.0)));
    }

    #[test]
    fn test_trend_aggregate_ascending() {
        let t = donations_table();
        let out = trend_aggregate(&t, "결제일", Some("결제금액"), AggOp::Sum);
        assert_eq!(out.len(), 3);
        assert_eq!(out.cell(0, 0), Some(&Value::Str("2026-01-01".into())));
        assert_eq!(out.cell(0, 1), Some(&Value::Num(4000.0)));
        assert_eq!(out.cell(2, 1), Some(&Value::Num(3500.0)));
    }

    #[test]
    fn test_user_count_by_id_column() {
        let t = donations_table();
        let id_col = find_user_id_column(&t).unwrap();
        assert_eq!(id_col, "member_id");
        assert_eq!(count_unique(&t, &id_col), 3);
    }

    #[test]
    fn test_guess_op() {
        assert_eq!(guess_op("평균 결제금액"), AggOp::Mean);
        assert_eq!(guess_op("최대 금액"), AggOp::Max);
        assert_eq!(guess_op("합계 보여줘"), AggOp::Sum);
        assert_eq!(guess_op("몇 건이야"), AggOp::Count);
    }

    #[test]
    fn test_infer_dataset_period() {
        let period = infer_dataset_period(&donations_table()).unwrap();
        assert_eq!(period, "2026-01-01 ~ 2026-01-03");
    }

    #[test]
    fn test_count_truthy() {
        let mut t = RowTable::new(vec!["is_admin".to_string()]);
        for v in ["y", "n", "1", "0", "true"] {
            t.push_row(vec![Value::Str(v.to_string())]);
        }
        assert_eq!(count_truthy(&t, "is_admin"), 3);
    }
}
