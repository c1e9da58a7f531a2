//! Response adapter
//!
//! Turns block results into the user-facing envelope: Korean prose, cleaned
//! rows, one chart spec and follow-up prompts. Message synthesis is
//! deterministic; every number in the prose is taken from the rows.

pub mod chart;
pub mod followups;
pub mod format;
pub mod synthesizers;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{
    BlockData, BlockResult, BlockResultKind, ChatResponse, ResponseStatus, RowTable, Value,
};
use crate::services::extractor::entities::extract_entity_terms;
use crate::services::metadata;
use crate::utils::{object_particle, topic_particle};

use format::{format_metric_value, format_with_unit, format_year_month, infer_display_unit};

const DEFAULT_TOP_ROWS: usize = 10;
const COMPACT_TOP_ROWS: usize = 5;
const FULL_LIST_TOP_ROWS: usize = 1000;
const MAX_RAW_RECORDS: usize = 1000;

static ISO_DATE_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").unwrap());

pub const NO_DATA_MESSAGE: &str = "질문 의도는 이해했지만 현재 조건에서 조회된 데이터가 없습니다. 기간이나 지표를 바꿔 다시 질문해 주세요.";
pub const ALL_BLOCKS_FAILED_MESSAGE: &str =
    "분석 중 오류가 발생했습니다. 잠시 후 다시 시도해 주세요.";

pub struct AdaptInput {
    pub question: String,
    pub property_id: String,
    pub period: Option<String>,
    pub blocks: Vec<BlockResult>,
    pub exclude_notset: bool,
    pub failed_blocks: usize,
    pub matching_debug: serde_json::Value,
}

pub struct ResponseAdapter;

impl ResponseAdapter {
    pub fn adapt(input: AdaptInput) -> ChatResponse {
        let question = input.question.as_str();

        if input.blocks.is_empty() {
            return Self::empty_response(&input);
        }

        let entity_terms = extract_entity_terms(question);
        let blocks = apply_entity_filter(input.blocks, &entity_terms);

        let concise = is_brief_request(question);
        let top_rows_limit = top_rows_limit(question);

        let mut message_parts: Vec<String> = Vec::new();
        let mut quality_warnings: Vec<String> = Vec::new();
        let mut structured = serde_json::Map::new();
        let mut display_tables: Vec<RowTable> = Vec::new();

        // Total blocks: direct answers first
        for block in &blocks {
            let Some(totals) = block.totals() else { continue };
            for (metric_key, value) in totals {
                let ui = metadata::ui_name(metric_key);
                let pretty = format_metric_value(metric_key, &Value::Num(*value));
                structured.insert(ui.clone(), serde_json::Value::String(pretty.clone()));
                message_parts.push(format!("{}{} **{}**입니다.", ui, topic_particle(&ui), pretty));
            }
        }

        // Breakdown / trend blocks
        for block in &blocks {
            let Some(table) = block.rows() else { continue };
            if table.is_empty() {
                continue;
            }

            if let Some(warning) = synthesizers::data_quality_warning(question, table) {
                quality_warnings.push(warning);
            }

            let preferred = synthesizers::question_focus_dimension(question, table);
            let cleaned = synthesizers::clean_display_rows(table, preferred, input.exclude_notset);
            if cleaned.is_empty() {
                continue;
            }

            match block.kind {
                BlockResultKind::Trend => {
                    message_parts.push(trend_summary(&block.title, &cleaned));
                },
                _ => {
                    let count = cleaned.len();
                    let summary = summarize_top_row(&cleaned);
                    message_parts.push(format!(
                        "{} 기준 상위 결과는 **{}** 입니다. (총 {}개)",
                        block.title, summary, count
                    ));
                    let top_lines = format_top_rows(&cleaned, top_rows_limit.min(count));
                    if !top_lines.is_empty() {
                        message_parts.push(format!("상위 목록:\n{}", top_lines.join("\n")));
                    }
                },
            }

            display_tables.push(cleaned);
        }

        // Domain synthesizers prepend onto the message, most specific first
        let merged = merge_tables(&display_tables);
        for synthesized in [
            synthesizers::named_ratio_message(question, &merged),
            synthesizers::dual_entity_message(question, &merged, &entity_terms),
            synthesizers::domestic_overseas_message(question, &merged),
            synthesizers::conversion_message(question, &merged),
            synthesizers::item_profile_message(question, &merged, &entity_terms),
        ]
        .into_iter()
        .flatten()
        {
            message_parts.insert(0, synthesized);
        }

        let has_breakdown = !display_tables.is_empty();
        let mut raw_data = Vec::new();
        for table in &display_tables {
            if raw_data.len() >= MAX_RAW_RECORDS {
                break;
            }
            raw_data.extend(table.to_json_records(MAX_RAW_RECORDS - raw_data.len()));
        }

        let message = compose_message(message_parts, quality_warnings, concise);
        let status = if input.failed_blocks > 0 {
            ResponseStatus::PartialError
        } else {
            ResponseStatus::Ok
        };

        ChatResponse {
            status,
            message,
            account: Some(input.property_id.clone()),
            period: input.period.clone(),
            plot_data: chart::select_chart(&blocks),
            followup_suggestions: followups::build_followups(question, has_breakdown),
            blocks,
            raw_data,
            structured,
            matching_debug: input.matching_debug,
        }
    }

    fn empty_response(input: &AdaptInput) -> ChatResponse {
        let (status, message) = if input.failed_blocks > 0 {
            (ResponseStatus::Error, ALL_BLOCKS_FAILED_MESSAGE.to_string())
        } else {
            (ResponseStatus::Ok, NO_DATA_MESSAGE.to_string())
        };
        let mut response = ChatResponse::message_only(status, message);
        response.account = Some(input.property_id.clone());
        response.period = input.period.clone();
        response.matching_debug = input.matching_debug.clone();
        response.followup_suggestions = vec![
            "기간을 넓혀서 다시 조회할까요?".to_string(),
            "지표를 바꿔서 확인해볼까요?".to_string(),
            "차원별(예: 채널별)로 나눠 볼까요?".to_string(),
        ];
        response
    }
}

fn is_brief_request(question: &str) -> bool {
    let q = question.to_lowercase();
    ["한줄", "요약", "간단", "짧게", "brief"].iter().any(|k| q.contains(k))
}

fn top_rows_limit(question: &str) -> usize {
    let q = question.to_lowercase();
    if ["전체", "전부", "모든", "전체 항목", "전체 목록"].iter().any(|k| q.contains(k)) {
        return FULL_LIST_TOP_ROWS;
    }
    let compact_ask = ["가장", "많이", "어떤"].iter().any(|k| q.contains(k));
    let explicit_topn = ["top", "상위", "10", "20"].iter().any(|k| q.contains(k));
    if compact_ask && !explicit_topn {
        return COMPACT_TOP_ROWS;
    }
    DEFAULT_TOP_ROWS
}

fn compose_message(parts: Vec<String>, warnings: Vec<String>, concise: bool) -> String {
    if parts.is_empty() {
        return warnings
            .into_iter()
            .next()
            .unwrap_or_else(|| "분석이 완료되었습니다.".to_string());
    }
    let separator = if concise { " " } else { "\n" };
    let mut message = parts.join(separator);
    if let Some(warning) = warnings.into_iter().next() {
        message.push_str(separator);
        message.push_str(&warning);
    }
    message
}

/// "<top_label> (<top_value>)" from the first row
fn summarize_top_row(table: &RowTable) -> String {
    let Some(row) = table.rows.first() else {
        return "상위 항목".to_string();
    };

    let mut label: Option<String> = None;
    let mut metric: Option<(String, &Value)> = None;
    for (col, value) in table.columns.iter().zip(row.iter()) {
        if label.is_none() && value.to_number().is_none() && !value.is_blank_like() {
            let text = value.display();
            label = Some(if col == "yearMonth" { format_year_month(&text) } else { text });
        }
        if metric.is_none() && value.to_number().is_some() {
            metric = Some((col.clone(), value));
        }
    }

    match (label, metric) {
        (Some(label), Some((metric_key, value))) => {
            let unit = if metric_key.to_lowercase().contains("revenue") { "원" } else { "" };
            format!("{} ({})", label, format_with_unit(value, unit))
        },
        (Some(label), None) => label,
        _ => "상위 항목".to_string(),
    }
}

/// Numbered "label: value | label: value" list of the top rows
fn format_top_rows(table: &RowTable, max_rows: usize) -> Vec<String> {
    if table.is_empty() {
        return Vec::new();
    }

    let has_custom = table.columns.iter().any(|c| c.starts_with("customEvent:"));
    let part_limit = if has_custom { 4 } else { 2 };

    // Custom parameters move up next to the leading column
    let mut column_order: Vec<usize> = Vec::with_capacity(table.columns.len());
    if has_custom {
        let custom: Vec<usize> = (0..table.columns.len())
            .filter(|&i| table.columns[i].starts_with("customEvent:"))
            .collect();
        let plain: Vec<usize> = (0..table.columns.len())
            .filter(|&i| !table.columns[i].starts_with("customEvent:"))
            .collect();
        if let Some(&first) = plain.first() {
            column_order.push(first);
        }
        column_order.extend(custom);
        column_order.extend(plain.into_iter().skip(1));
    } else {
        column_order.extend(0..table.columns.len());
    }

    let mut lines = Vec::new();
    for (rank, row) in table.rows.iter().take(max_rows).enumerate() {
        let mut parts = Vec::new();
        for &col in &column_order {
            let Some(value) = row.get(col) else { continue };
            let key = &table.columns[col];
            let pretty = match value.to_number() {
                Some(_) => format_with_unit(value, infer_display_unit(key)),
                None => {
                    let text = value.display();
                    if key == "yearMonth" { format_year_month(&text) } else { text }
                },
            };
            parts.push(format!("{}: {}", metadata::ui_name(key), pretty));
            if parts.len() >= part_limit {
                break;
            }
        }
        if !parts.is_empty() {
            lines.push(format!("{}. {}", rank + 1, parts.join(" | ")));
        }
    }
    lines
}

fn trend_summary(title: &str, table: &RowTable) -> String {
    let count = table.len();

    let date_col = table.rows.first().and_then(|row| {
        row.iter()
            .position(|v| matches!(v, Value::Str(s) if ISO_DATE_PREFIX_RE.is_match(s)))
    });

    if let Some(col) = date_col {
        let mut dates: Vec<String> = table
            .column_values(col)
            .filter_map(|v| v.as_str())
            .filter(|s| ISO_DATE_PREFIX_RE.is_match(s))
            .map(|s| s.to_string())
            .collect();
        dates.sort();
        if let (Some(first), Some(last)) = (dates.first(), dates.last()) {
            return format!(
                "{}{} **{}개 시점**으로 확인했습니다. ({} ~ {})",
                title,
                object_particle(title),
                count,
                first,
                last
            );
        }
    }
    format!("{}{} **{}개 시점**으로 확인했습니다.", title, object_particle(title), count)
}

fn apply_entity_filter(blocks: Vec<BlockResult>, terms: &[String]) -> Vec<BlockResult> {
    if terms.is_empty() {
        return blocks;
    }
    blocks
        .into_iter()
        .map(|mut block| {
            if let BlockData::Rows(table) = &block.data {
                let filtered = synthesizers::filter_rows_by_entity_terms(table, terms);
                block.data = BlockData::Rows(filtered);
            }
            block
        })
        .collect()
}

/// Union of all display tables; shorter rows are padded with nulls
fn merge_tables(tables: &[RowTable]) -> RowTable {
    let mut columns: Vec<String> = Vec::new();
    for table in tables {
        for col in &table.columns {
            if !columns.iter().any(|c| c == col) {
                columns.push(col.clone());
            }
        }
    }
    let mut merged = RowTable::new(columns);
    for table in tables {
        let mapping: Vec<Option<usize>> = merged
            .columns
            .iter()
            .map(|c| table.col_index(c))
            .collect();
        for row in &table.rows {
            let cells = mapping
                .iter()
                .map(|idx| idx.and_then(|i| row.get(i)).cloned().unwrap_or(Value::Null))
                .collect();
            merged.rows.push(cells);
        }
    }
    merged
}
