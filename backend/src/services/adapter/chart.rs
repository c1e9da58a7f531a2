//! Chart selection
//!
//! One chart per response: the first trend block wins a line chart with
//! ascending date labels; otherwise the first breakdown with a label column
//! and at least one numeric column becomes a bar chart; a lone total block
//! falls back to a bar over metric keys.

use once_cell::sync::Lazy;
use regex::Regex;

use super::format::format_year_month;
use crate::models::{
    BlockData, BlockResult, BlockResultKind, ChartKind, ChartSeries, ChartSpec, RowTable,
};
use crate::services::metadata;

const MAX_CHART_ROWS: usize = 30;
const MAX_CHART_SERIES: usize = 2;

static ISO_DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

pub fn select_chart(blocks: &[BlockResult]) -> ChartSpec {
    // 1. Row blocks -> category/time chart
    for block in blocks {
        let BlockData::Rows(table) = &block.data else {
            continue;
        };
        if table.is_empty() {
            continue;
        }
        if let Some(chart) = chart_from_rows(block.kind, table) {
            return chart;
        }
    }

    // 2. Total block -> single bar over metric keys
    for block in blocks {
        let BlockData::Totals(totals) = &block.data else {
            continue;
        };
        if totals.is_empty() {
            continue;
        }
        return ChartSpec {
            chart_type: Some(ChartKind::Bar),
            labels: totals.iter().map(|(k, _)| metadata::ui_name(k)).collect(),
            series: vec![ChartSeries {
                name: "value".to_string(),
                data: totals.iter().map(|(_, v)| *v).collect(),
            }],
        };
    }

    ChartSpec::empty()
}

fn chart_from_rows(kind: BlockResultKind, table: &RowTable) -> Option<ChartSpec> {
    let label_col = table.first_label_column().unwrap_or(0);

    let metric_cols: Vec<usize> = (0..table.columns.len())
        .filter(|&c| c != label_col && table.is_numeric_column(c))
        .take(MAX_CHART_SERIES)
        .collect();
    if metric_cols.is_empty() {
        return None;
    }

    let label_key = &table.columns[label_col];
    let is_year_month = label_key == "yearMonth";

    let row_count = table.len().min(MAX_CHART_ROWS);
    let mut labels: Vec<String> = Vec::with_capacity(row_count);
    let mut data: Vec<Vec<f64>> = vec![Vec::with_capacity(row_count); metric_cols.len()];
    for row in table.rows.iter().take(MAX_CHART_ROWS) {
        let raw_label = row.get(label_col).map(|v| v.display()).unwrap_or_default();
        labels.push(if is_year_month { format_year_month(&raw_label) } else { raw_label });
        for (series_idx, &col) in metric_cols.iter().enumerate() {
            data[series_idx].push(row.get(col).and_then(|v| v.to_number()).unwrap_or(0.0));
        }
    }

    let chart_type = if kind == BlockResultKind::Trend { ChartKind::Line } else { ChartKind::Bar };

    // Trend labels sort ascending by date; non-date labels sink to the end
    if chart_type == ChartKind::Line {
        let mut order: Vec<usize> = (0..labels.len()).collect();
        order.sort_by_key(|&i| {
            let label = &labels[i];
            if ISO_DATE_RE.is_match(label) {
                label.clone()
            } else {
                format!("9999-{}", label)
            }
        });
        labels = order.iter().map(|&i| labels[i].clone()).collect();
        for series in data.iter_mut() {
            *series = order.iter().map(|&i| series[i]).collect();
        }
    }

    let series = metric_cols
        .iter()
        .zip(data)
        .map(|(&col, values)| ChartSeries {
            name: metadata::ui_name(&table.columns[col]),
            data: values,
        })
        .collect();

    Some(ChartSpec { chart_type: Some(chart_type), labels, series })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;

    fn block(kind: BlockResultKind, table: RowTable) -> BlockResult {
        BlockResult {
            block_id: "b0".to_string(),
            title: "t".to_string(),
            kind,
            data: BlockData::Rows(table),
        }
    }

    #[test]
    fn test_trend_chart_sorted_ascending() {
        let mut t = RowTable::new(vec!["date".to_string(), "activeUsers".to_string()]);
        t.push_row(vec![Value::Str("2026-02-11".into()), Value::Num(30.0)]);
        t.push_row(vec![Value::Str("2026-02-09".into()), Value::Num(10.0)]);
        t.push_row(vec![Value::Str("2026-02-10".into()), Value::Num(20.0)]);

        let chart = select_chart(&[block(BlockResultKind::Trend, t)]);
        assert_eq!(chart.chart_type, Some(ChartKind::Line));
        assert_eq!(chart.labels, vec!["2026-02-09", "2026-02-10", "2026-02-11"]);
        assert_eq!(chart.series[0].data, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_breakdown_chart_is_bar() {
        let mut t = RowTable::new(vec!["defaultChannelGroup".to_string(), "sessions".to_string()]);
        t.push_row(vec![Value::Str("Organic Search".into()), Value::Num(120.0)]);
        t.push_row(vec![Value::Str("Direct".into()), Value::Num(80.0)]);

        let chart = select_chart(&[block(BlockResultKind::Breakdown, t)]);
        assert_eq!(chart.chart_type, Some(ChartKind::Bar));
        assert_eq!(chart.labels.len(), 2);
        for series in &chart.series {
            assert_eq!(series.data.len(), chart.labels.len());
        }
    }

    #[test]
    fn test_year_month_labels() {
        let mut t = RowTable::new(vec!["yearMonth".to_string(), "sessions".to_string()]);
        t.push_row(vec![Value::Str("202601".into()), Value::Num(40.0)]);
        t.push_row(vec![Value::Str("202602".into()), Value::Num(60.0)]);

        let chart = select_chart(&[block(BlockResultKind::Breakdown, t)]);
        assert_eq!(chart.labels, vec!["2026-01", "2026-02"]);
    }

    #[test]
    fn test_total_fallback_bar() {
        let totals = BlockResult {
            block_id: "t0".to_string(),
            title: "전체 지표 요약".to_string(),
            kind: BlockResultKind::Total,
            data: BlockData::Totals(vec![("purchaseRevenue".to_string(), 1500.0)]),
        };
        let chart = select_chart(&[totals]);
        assert_eq!(chart.chart_type, Some(ChartKind::Bar));
        assert_eq!(chart.labels, vec!["구매 수익"]);
        assert_eq!(chart.series[0].data, vec![1500.0]);
    }

    #[test]
    fn test_no_chartable_data() {
        let chart = select_chart(&[]);
        assert!(chart.is_empty());
    }

    #[test]
    fn test_row_cap() {
        let mut t = RowTable::new(vec!["itemName".to_string(), "itemRevenue".to_string()]);
        for i in 0..50 {
            t.push_row(vec![Value::Str(format!("상품{}", i)), Value::Num(i as f64)]);
        }
        let chart = select_chart(&[block(BlockResultKind::Breakdown, t)]);
        assert_eq!(chart.labels.len(), 30);
        assert_eq!(chart.series[0].data.len(), 30);
    }
}
