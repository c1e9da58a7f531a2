//! File analysis engine
//!
//! Independent NLQ pipeline over an in-memory table: profile the columns,
//! detect one of the 3-level intents, aggregate deterministically, and only
//! fall back to the LLM for open-ended insight. Every deterministic path
//! cites numbers computed here, never by the LLM.

pub mod aggregate;
pub mod intent;
pub mod profile;
pub mod state;

use std::sync::Arc;

use crate::models::{ChartKind, ChartSeries, ChartSpec, RowTable, Value};
use crate::services::llm::LlmPort;

use intent::{FileIntent, FileIntentKind};
use profile::{columns_of_kind, profile_columns, ColumnKind};
use state::{AnalysisMeta, FileEngineState};

pub use intent::DEFAULT_PAGE_LIMIT;
pub use state::FileEngineState as EngineState;

const PREVIEW_ROWS: usize = 10;
const PREVIEW_CELL_WIDTH: usize = 40;

pub struct FileAnalysis {
    pub message: String,
    pub plot_data: ChartSpec,
    pub raw_data: Vec<serde_json::Value>,
    pub followup_suggestions: Vec<String>,
    pub intent: FileIntent,
    pub meta: AnalysisMeta,
    pub period: Option<String>,
}

pub struct FileEngine {
    llm: Arc<dyn LlmPort>,
}

impl FileEngine {
    pub fn new(llm: Arc<dyn LlmPort>) -> Self {
        Self { llm }
    }

    pub async fn analyze(
        &self,
        question: &str,
        table: &RowTable,
        state: &FileEngineState,
        beginner_mode: bool,
    ) -> FileAnalysis {
        let detected = intent::detect_intent(question, table, state);
        tracing::info!("File intent: {:?}", detected.kind);

        if detected.kind.is_deterministic() {
            let (result, mut meta) = self.execute(question, table, &detected, state);
            let mut message = self.build_message(question, table, &detected, &result, &meta);
            if beginner_mode {
                message = beginner_tail(&message, detected.kind, &meta);
            }
            if meta.period.is_none() {
                meta.period = aggregate::infer_dataset_period(table);
            }

            let raw_limit = raw_limit_by_intent(detected.kind);
            return FileAnalysis {
                message,
                plot_data: build_plot(&result, detected.kind),
                raw_data: result.to_json_records(raw_limit),
                followup_suggestions: build_followups(detected.kind, &meta),
                period: meta.period.clone(),
                intent: detected,
                meta,
            };
        }

        // Level 3: insight. Deterministic summaries win over the LLM so the
        // numbers stay grounded.
        let message = match deterministic_summary(table, question) {
            Some(summary) => summary,
            None => self.llm_insight(question, table).await,
        };

        FileAnalysis {
            message,
            plot_data: ChartSpec::empty(),
            raw_data: table.to_json_records(PREVIEW_ROWS),
            followup_suggestions: build_followups(FileIntentKind::Insight, &AnalysisMeta::default()),
            period: aggregate::infer_dataset_period(table),
            intent: detected,
            meta: AnalysisMeta::default(),
        }
    }

    async fn llm_insight(&self, question: &str, table: &RowTable) -> String {
        let prompt = format!(
            "파일 데이터를 분석해줘.\n질문: {}\n컬럼: {:?}\n행 수: {}\n데이터를 근거로 한국어로 간결한 인사이트를 제시해줘.",
            question,
            table.columns,
            table.len()
        );
        match self.llm.generate_insight(&prompt).await {
            Ok(insight) if !insight.trim().is_empty() => insight,
            Ok(_) | Err(_) => "파일 분석 결과를 확인해주세요.".to_string(),
        }
    }

    fn execute(
        &self,
        question: &str,
        table: &RowTable,
        detected: &FileIntent,
        state: &FileEngineState,
    ) -> (RowTable, AnalysisMeta) {
        let mut meta = AnalysisMeta::default();
        match detected.kind {
            FileIntentKind::Schema | FileIntentKind::ColumnsSummary | FileIntentKind::Overview => {
                let profile = profile_columns(table);
                fill_profile_meta(&mut meta, table, &profile);

                let mut out = RowTable::new(vec![
                    "column".to_string(),
                    "kind".to_string(),
                    "null_count".to_string(),
                ]);
                for (idx, column) in table.columns.iter().enumerate() {
                    let nulls = table
                        .column_values(idx)
                        .filter(|v| matches!(v, Value::Null))
                        .count();
                    out.push_row(vec![
                        Value::Str(column.clone()),
                        Value::Str(format!("{:?}", profile[idx]).to_lowercase()),
                        Value::Num(nulls as f64),
                    ]);
                }
                (out, meta)
            },
            FileIntentKind::Preview => (head(table, PREVIEW_ROWS), meta),
            FileIntentKind::Guidance => {
                let mut out = RowTable::new(vec!["recommended_question".to_string()]);
                for q in [
                    "파일 구조 알려줘",
                    "핵심 지표 3개 요약해줘",
                    "채널별 매출 비교해줘",
                    "일별 매출 추이 보여줘",
                    "이상치 찾아줘",
                ] {
                    out.push_row(vec![Value::Str(q.to_string())]);
                }
                (out, meta)
            },
            FileIntentKind::CountUsers => {
                let id_column = aggregate::find_user_id_column(table);
                let user_count = match &id_column {
                    Some(column) => aggregate::count_unique(table, column),
                    None => table.len(),
                };
                meta.user_count = user_count;
                meta.id_column = id_column;
                let mut out = RowTable::new(vec!["user_count".to_string()]);
                out.push_row(vec![Value::Num(user_count as f64)]);
                (out, meta)
            },
            FileIntentKind::CountAdmin => {
                let admin_columns = aggregate::find_admin_columns(table);
                let admin_count = admin_columns
                    .iter()
                    .map(|c| aggregate::count_truthy(table, c))
                    .max()
                    .unwrap_or(0);
                meta.admin_count = admin_count;
                meta.total_count = table.len();
                meta.admin_columns = admin_columns;
                let mut out =
                    RowTable::new(vec!["admin_count".to_string(), "total_count".to_string()]);
                out.push_row(vec![
                    Value::Num(admin_count as f64),
                    Value::Num(table.len() as f64),
                ]);
                (out, meta)
            },
            FileIntentKind::ColumnCount => {
                let target = detected.target_column.clone().unwrap_or_default();
                let unique_count = aggregate::count_unique(table, &target);
                meta.target_column = Some(target.clone());
                meta.unique_count = unique_count;
                let mut out =
                    RowTable::new(vec!["column".to_string(), "unique_count".to_string()]);
                out.push_row(vec![Value::Str(target), Value::Num(unique_count as f64)]);
                (out, meta)
            },
            FileIntentKind::Explain => (RowTable::default(), explain_meta(state)),
            FileIntentKind::ColumnProbe => self.column_probe(table, detected),
            FileIntentKind::PreviewMore => {
                let count = detected.preview_count.clamp(1, 50);
                meta.target_column = detected.target_column.clone();
                let out = match detected
                    .target_column
                    .as_ref()
                    .and_then(|c| table.col_index(c))
                {
                    Some(col) => single_column_head(table, col, count),
                    None => head(table, count),
                };
                (out, meta)
            },
            FileIntentKind::Groupby | FileIntentKind::Distribution | FileIntentKind::Compare => {
                let group_col = aggregate::guess_group_column(table, question);
                let metric_col = aggregate::guess_metric_column(table, question);
                let op = aggregate::guess_op(question);
                let drop_missing = aggregate::question_wants_drop_missing(question);

                let Some(group_col) = group_col else {
                    return (head(table, PREVIEW_ROWS), meta);
                };
                let out = aggregate::group_aggregate(
                    table,
                    &group_col,
                    metric_col.as_deref(),
                    op,
                    drop_missing,
                );
                meta.group_col = Some(group_col);
                meta.metric_col = Some(metric_col.unwrap_or_else(|| "row_count".to_string()));
                meta.op = Some(op.as_str().to_string());
                (out, meta)
            },
            FileIntentKind::Aggregate => {
                let metric_col = aggregate::guess_metric_column(table, question);
                let op = aggregate::guess_op(question);
                let out = aggregate::aggregate_single(table, metric_col.as_deref(), op);
                meta.metric_col = Some(metric_col.unwrap_or_else(|| "row_count".to_string()));
                meta.op = Some(op.as_str().to_string());
                (out, meta)
            },
            FileIntentKind::Trend => {
                let date_col = aggregate::guess_date_column(table);
                let metric_col = aggregate::guess_metric_column(table, question);
                let op = aggregate::guess_op(question);
                let Some(date_col) = date_col else {
                    return (head(table, PREVIEW_ROWS), meta);
                };
                let out =
                    aggregate::trend_aggregate(table, &date_col, metric_col.as_deref(), op);
                if !out.is_empty() {
                    let first = out.cell(0, 0).map(|v| v.display()).unwrap_or_default();
                    let last = out
                        .cell(out.len() - 1, 0)
                        .map(|v| v.display())
                        .unwrap_or_default();
                    meta.period = Some(format!("{} ~ {}", first, last));
                }
                meta.date_col = Some(date_col);
                meta.metric_col = Some(metric_col.unwrap_or_else(|| "row_count".to_string()));
                meta.op = Some(op.as_str().to_string());
                (out, meta)
            },
            FileIntentKind::Insight => (head(table, PREVIEW_ROWS), meta),
        }
    }

    fn column_probe(&self, table: &RowTable, detected: &FileIntent) -> (RowTable, AnalysisMeta) {
        let mut meta = AnalysisMeta::default();
        let Some(target) = detected
            .target_column
            .as_ref()
            .filter(|c| table.col_index(c).is_some())
        else {
            return (head(table, 5), meta);
        };

        meta.target_column = Some(target.clone());
        if detected.show_unique {
            let values = aggregate::unique_column_values(table, target);
            let total_unique = values.len();
            let offset = detected.offset.min(total_unique);
            let limit = detected.preview_count.clamp(1, DEFAULT_PAGE_LIMIT);
            let page: Vec<&String> = values.iter().skip(offset).take(limit).collect();

            let mut out = RowTable::new(vec!["rank".to_string(), "value".to_string()]);
            for (i, value) in page.iter().enumerate() {
                out.push_row(vec![
                    Value::Num((offset + i + 1) as f64),
                    Value::Str((*value).clone()),
                ]);
            }

            meta.show_unique = true;
            meta.total_unique = total_unique;
            meta.shown_unique = out.len();
            meta.page_offset = offset;
            meta.page_limit = limit;
            meta.has_next = offset + out.len() < total_unique;
            meta.has_prev = offset > 0;
            (out, meta)
        } else {
            let col = table.col_index(target).unwrap_or(0);
            let out = single_column_head(table, col, detected.preview_count.clamp(1, 50));
            meta.show_unique = false;
            (out, meta)
        }
    }

    fn build_message(
        &self,
        _question: &str,
        table: &RowTable,
        detected: &FileIntent,
        result: &RowTable,
        meta: &AnalysisMeta,
    ) -> String {
        match detected.kind {
            FileIntentKind::Schema => format!(
                "파일 구조를 간단히 정리하면 **{}행 / {}컬럼**입니다. 수치형 {}개(계산용), 범주형 {}개(분류용), 날짜형 {}개, 불리언 {}개, 식별자 {}개입니다.{}",
                crate::services::adapter::format::group_thousands(meta.row_count as i64),
                meta.col_count,
                meta.numeric_count,
                meta.categorical_count,
                meta.date_count,
                meta.boolean_count,
                meta.identifier_count,
                preview_tail(table),
            ),
            FileIntentKind::ColumnsSummary => format!(
                "이 파일에는 총 **{}개 컬럼**이 있습니다. 수치형 **{}개**(합계/평균 계산용), 범주형 **{}개**(~별 비교용), 날짜형 **{}개**, 불리언 **{}개**, 식별자 **{}개**입니다.{}",
                meta.col_count,
                meta.numeric_count,
                meta.categorical_count,
                meta.date_count,
                meta.boolean_count,
                meta.identifier_count,
                preview_tail(table),
            ),
            FileIntentKind::Overview => format!(
                "파일 전체 개요: 총 {}행, {}개 컬럼{}",
                table.len(),
                table.columns.len(),
                preview_tail(table)
            ),
            FileIntentKind::Preview => {
                format!("파일의 상위 {}행 미리보기입니다.", result.len())
            },
            FileIntentKind::Guidance => "처음이라면 이렇게 물어보면 됩니다:\n1. 파일 구조 알려줘\n2. 핵심 지표 3개 요약해줘\n3. 채널별/유형별 매출 비교해줘\n4. 일별 추이와 전주 대비 보여줘\n5. 이상치나 급변 구간 찾아줘".to_string(),
            FileIntentKind::CountUsers => match &meta.id_column {
                Some(id_col) => format!(
                    "이 파일 기준 사용자 수는 **{}명**입니다. (`{}` 기준)",
                    meta.user_count, id_col
                ),
                None => format!("이 파일 기준 사용자 수는 **{}명**입니다.", meta.user_count),
            },
            FileIntentKind::CountAdmin => {
                let ratio = if meta.total_count > 0 {
                    meta.admin_count as f64 / meta.total_count as f64 * 100.0
                } else {
                    0.0
                };
                let col_text = if meta.admin_columns.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", meta.admin_columns.join(", "))
                };
                format!(
                    "관리자(어드민) 수는 **{}명**입니다{}. 전체 대비 **{:.1}%**입니다.",
                    meta.admin_count, col_text, ratio
                )
            },
            FileIntentKind::ColumnCount => format!(
                "`{}` 기준 고유 개수는 **{}개**입니다.",
                meta.target_column.as_deref().unwrap_or(""),
                crate::services::adapter::format::group_thousands(meta.unique_count as i64)
            ),
            FileIntentKind::Explain => explain_text(meta),
            FileIntentKind::ColumnProbe => {
                let target = meta.target_column.as_deref().unwrap_or("");
                if meta.show_unique {
                    let start = meta.page_offset + 1;
                    let end = (meta.page_offset + meta.shown_unique).min(meta.total_unique);
                    format!(
                        "`{}` 컬럼의 고유값 목록입니다. (총 {}개, 현재 {}~{})",
                        target, meta.total_unique, start, end
                    )
                } else {
                    format!("`{}` 컬럼의 상위 {}행 값 미리보기입니다.", target, result.len())
                }
            },
            FileIntentKind::PreviewMore => match meta.target_column.as_deref() {
                Some(target) if table.col_index(target).is_some() => {
                    format!("`{}` 컬럼의 추가 미리보기(상위 10행)입니다.", target)
                },
                _ => format!("파일의 추가 미리보기(상위 {}행)입니다.", result.len()),
            },
            FileIntentKind::Trend => format!(
                "일자 추이 결과입니다. ({} 기준, 지표: {})",
                meta.date_col.as_deref().unwrap_or("날짜"),
                meta.metric_col.as_deref().unwrap_or("row_count")
            ),
            FileIntentKind::Compare => format!(
                "비교 결과입니다. ({} 기준, 지표: {})",
                meta.group_col.as_deref().unwrap_or(""),
                meta.metric_col.as_deref().unwrap_or("row_count")
            ),
            FileIntentKind::Groupby | FileIntentKind::Distribution => match &meta.group_col {
                Some(group_col) => format!(
                    "요청하신 `{}` 기준 집계 결과입니다. ({}: {})",
                    group_col,
                    meta.op.as_deref().unwrap_or("sum"),
                    meta.metric_col.as_deref().unwrap_or("row_count")
                ),
                None => "요청하신 기준 집계 결과입니다.".to_string(),
            },
            FileIntentKind::Aggregate => {
                if result.len() == 1 && result.columns.len() == 1 {
                    let value = result.cell(0, 0).map(|v| v.display()).unwrap_or_default();
                    format!("계산 결과: {}", value)
                } else {
                    "요청하신 집계 결과입니다.".to_string()
                }
            },
            FileIntentKind::Insight => "분석 결과입니다.".to_string(),
        }
    }
}

fn fill_profile_meta(meta: &mut AnalysisMeta, table: &RowTable, profile: &[ColumnKind]) {
    meta.row_count = table.len();
    meta.col_count = table.columns.len();
    meta.numeric_count = columns_of_kind(table, profile, ColumnKind::Numeric).len();
    meta.categorical_count = columns_of_kind(table, profile, ColumnKind::Categorical).len();
    meta.date_count = columns_of_kind(table, profile, ColumnKind::Date).len();
    meta.boolean_count = columns_of_kind(table, profile, ColumnKind::Boolean).len();
    meta.identifier_count = columns_of_kind(table, profile, ColumnKind::Identifier).len();
}

fn explain_meta(state: &FileEngineState) -> AnalysisMeta {
    // Keep the previous numbers so the explanation cites the same figures
    state.last_meta.clone()
}

fn explain_text(meta: &AnalysisMeta) -> String {
    if meta.admin_count > 0 || !meta.admin_columns.is_empty() {
        let ratio = if meta.total_count > 0 {
            meta.admin_count as f64 / meta.total_count as f64 * 100.0
        } else {
            0.0
        };
        return format!(
            "즉, 전체 {}명 중 관리자 권한 사용자는 {}명({:.1}%)이라는 의미입니다.",
            meta.total_count, meta.admin_count, ratio
        );
    }
    if meta.user_count > 0 {
        return format!(
            "즉, 파일에서 집계 가능한 사용자 수가 {}명이라는 의미입니다.",
            meta.user_count
        );
    }
    if meta.numeric_count > 0 || meta.categorical_count > 0 {
        return format!(
            "즉, 수치형({}개)은 합계/평균/추이에 쓰고, 범주형({}개)은 채널별/유형별처럼 그룹 비교에 쓰면 됩니다.",
            meta.numeric_count, meta.categorical_count
        );
    }
    "즉, 직전 응답은 파일의 현재 데이터 분포와 집계 결과를 요약한 것입니다.".to_string()
}

fn head(table: &RowTable, n: usize) -> RowTable {
    RowTable {
        columns: table.columns.clone(),
        rows: table.rows.iter().take(n).cloned().collect(),
    }
}

fn single_column_head(table: &RowTable, col: usize, n: usize) -> RowTable {
    let mut out = RowTable::new(vec!["row_no".to_string(), table.columns[col].clone()]);
    for (i, row) in table.rows.iter().take(n).enumerate() {
        out.push_row(vec![
            Value::Num((i + 1) as f64),
            row.get(col).cloned().unwrap_or(Value::Null),
        ]);
    }
    out
}

/// "샘플 1~5행 미리보기" appended to structural answers
fn preview_tail(table: &RowTable) -> String {
    if table.is_empty() {
        return String::new();
    }
    let mut lines = vec!["\n샘플 1~5행 미리보기:".to_string()];
    for (i, row) in table.rows.iter().take(5).enumerate() {
        let pairs: Vec<String> = table
            .columns
            .iter()
            .zip(row.iter())
            .take(4)
            .map(|(column, value)| {
                let mut text = value.display();
                if text.chars().count() > PREVIEW_CELL_WIDTH {
                    text = format!(
                        "{}…",
                        text.chars().take(PREVIEW_CELL_WIDTH).collect::<String>()
                    );
                }
                format!("{}={}", column, text)
            })
            .collect();
        lines.push(format!("{}) {}", i + 1, pairs.join(", ")));
    }
    format!("\n{}", lines.join("\n"))
}

fn build_plot(result: &RowTable, kind: FileIntentKind) -> ChartSpec {
    if matches!(
        kind,
        FileIntentKind::Schema
            | FileIntentKind::Preview
            | FileIntentKind::ColumnsSummary
            | FileIntentKind::Overview
            | FileIntentKind::Guidance
            | FileIntentKind::ColumnProbe
            | FileIntentKind::PreviewMore
            | FileIntentKind::Explain
    ) {
        return ChartSpec::empty();
    }
    if result.is_empty() || result.columns.len() < 2 {
        return ChartSpec::empty();
    }

    let series_col = (1..result.columns.len()).find(|&c| result.is_numeric_column(c));
    let Some(series_col) = series_col else {
        return ChartSpec::empty();
    };

    let chart_type =
        if kind == FileIntentKind::Trend { ChartKind::Line } else { ChartKind::Bar };
    let labels: Vec<String> = result
        .rows
        .iter()
        .map(|row| row.first().map(|v| v.display()).unwrap_or_default())
        .collect();
    let data: Vec<f64> = result
        .rows
        .iter()
        .map(|row| row.get(series_col).and_then(|v| v.to_number()).unwrap_or(0.0))
        .collect();

    ChartSpec {
        chart_type: Some(chart_type),
        labels,
        series: vec![ChartSeries { name: result.columns[series_col].clone(), data }],
    }
}

fn raw_limit_by_intent(kind: FileIntentKind) -> usize {
    match kind {
        FileIntentKind::Schema | FileIntentKind::ColumnsSummary => 200,
        FileIntentKind::PreviewMore | FileIntentKind::ColumnProbe => 500,
        FileIntentKind::ColumnCount => 10,
        FileIntentKind::Groupby
        | FileIntentKind::Distribution
        | FileIntentKind::Compare
        | FileIntentKind::Trend => 300,
        _ => 100,
    }
}

fn build_followups(kind: FileIntentKind, meta: &AnalysisMeta) -> Vec<String> {
    match kind {
        FileIntentKind::Schema => vec![
            "핵심 지표 3개를 먼저 요약해볼까요?".to_string(),
            "컬럼별 결측치/이상치를 점검해볼까요?".to_string(),
            "샘플 10행 더 보기".to_string(),
        ],
        FileIntentKind::ColumnProbe => {
            if meta.show_unique {
                let mut followups = vec!["고유값 전체 목록 보기".to_string()];
                if meta.has_next {
                    followups.push("다음 500개 보기".to_string());
                }
                if meta.has_prev {
                    followups.push("이전 500개 보기".to_string());
                }
                followups.push("샘플 10행 더 보기".to_string());
                followups.push("다른 컬럼과 교차 집계해볼까요?".to_string());
                followups.truncate(5);
                followups
            } else {
                vec![
                    "샘플 10행 더 보기".to_string(),
                    "고유값 전체 목록 보기".to_string(),
                    "해당 컬럼의 고유값 개수도 볼까요?".to_string(),
                    "빈값/이상값 비율도 점검해볼까요?".to_string(),
                    "다른 컬럼과 교차 집계해볼까요?".to_string(),
                ]
            }
        },
        FileIntentKind::ColumnCount => vec![
            "고유값 목록도 보여줄까요?".to_string(),
            "결측치를 제외하고 다시 볼까요?".to_string(),
            "다른 컬럼과 교차 집계해볼까요?".to_string(),
        ],
        FileIntentKind::Groupby | FileIntentKind::Distribution | FileIntentKind::Compare => vec![
            "상위 10개 항목만 추려서 볼까요?".to_string(),
            "이전 기간과 비교할 수 있게 추이로 바꿔볼까요?".to_string(),
            "비중(%) 기준으로 다시 정리해볼까요?".to_string(),
        ],
        FileIntentKind::Trend => vec![
            "전주/전월과 비교해 증감률을 볼까요?".to_string(),
            "추이에서 급증/급감 구간만 뽑아볼까요?".to_string(),
            "채널/유형으로 분해해서 추이를 볼까요?".to_string(),
        ],
        _ => vec![
            "요약부터 볼까요?".to_string(),
            "집계(합계/평균/개수)로 볼까요?".to_string(),
            "카테고리별 비교로 볼까요?".to_string(),
        ],
    }
}

fn beginner_tail(message: &str, kind: FileIntentKind, meta: &AnalysisMeta) -> String {
    match kind {
        FileIntentKind::Groupby | FileIntentKind::Distribution => format!(
            "{}\n\n쉽게 말하면: `{}`별로 `{}`를 묶어서 비교한 결과입니다.",
            message,
            meta.group_col.as_deref().unwrap_or(""),
            meta.metric_col.as_deref().unwrap_or("")
        ),
        FileIntentKind::Compare => format!(
            "{}\n\n쉽게 말하면: `{}` 그룹끼리 `{}` 값 차이를 비교한 결과입니다.",
            message,
            meta.group_col.as_deref().unwrap_or(""),
            meta.metric_col.as_deref().unwrap_or("")
        ),
        FileIntentKind::Aggregate => format!(
            "{}\n\n쉽게 말하면: `{}`에 `{}` 계산을 적용한 단일 요약값입니다.",
            message,
            meta.metric_col.as_deref().unwrap_or(""),
            meta.op.as_deref().unwrap_or("sum")
        ),
        FileIntentKind::Trend => format!(
            "{}\n\n쉽게 말하면: 시간 흐름에 따라 값이 어떻게 바뀌는지 본 것입니다. ({})",
            message,
            meta.period.as_deref().unwrap_or("기간 미상")
        ),
        FileIntentKind::Schema | FileIntentKind::ColumnsSummary | FileIntentKind::Overview => {
            format!("{}\n\n팁: 수치형은 계산(합계/평균), 범주형은 비교(~별)에 사용하면 됩니다.", message)
        },
        _ => message.to_string(),
    }
}

/// Deterministic answers for questions the LLM must never number-guess
fn deterministic_summary(table: &RowTable, question: &str) -> Option<String> {
    let q = question.to_lowercase();

    let user_words = ["사용자", "유저", "회원", "인원", "사람"];
    let count_words = ["얼마나", "몇", "수", "명", "몇명", "몇 명"];
    if user_words.iter().any(|k| q.contains(k)) && count_words.iter().any(|k| q.contains(k)) {
        let user_count = match aggregate::find_user_id_column(table) {
            Some(column) => aggregate::count_unique(table, &column),
            None => table.len(),
        };
        return Some(format!("이 파일 기준 사용자 수는 **{}명**입니다.", user_count));
    }

    if ["어드민", "관리자", "admin"].iter().any(|k| q.contains(k))
        && ["얼마나", "몇", "수"].iter().any(|k| q.contains(k))
    {
        let admin_columns = aggregate::find_admin_columns(table);
        let admin_count = admin_columns
            .iter()
            .map(|c| aggregate::count_truthy(table, c))
            .max()
            .unwrap_or(0);
        let total = table.len();
        let ratio = if total > 0 { admin_count as f64 / total as f64 * 100.0 } else { 0.0 };
        return Some(format!(
            "관리자(어드민) 수는 **{}명**이며, 전체 대비 **{:.1}%**입니다.",
            admin_count, ratio
        ));
    }

    if ["어떤 데이터", "무슨 데이터", "또 어떤"].iter().any(|k| q.contains(k)) {
        let profile = profile_columns(table);
        let numeric = columns_of_kind(table, &profile, ColumnKind::Numeric).len();
        let sample: Vec<&str> = table.columns.iter().take(8).map(|c| c.as_str()).collect();
        return Some(format!(
            "이 파일은 총 **{}행, {}개 컬럼**입니다. 수치형 {}개, 범주형 {}개이며, 대표 컬럼은 `{}` 입니다.",
            table.len(),
            table.columns.len(),
            numeric,
            table.columns.len() - numeric,
            sample.join(", ")
        ));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm::FixtureLlm;

    fn engine() -> FileEngine {
        FileEngine::new(Arc::new(FixtureLlm::failing()))
    }

    fn donations_table() -> RowTable {
        let mut t = RowTable::new(vec![
            "후원유형".to_string(),
            "결제금액".to_string(),
            "member_id".to_string(),
            "결제일".to_string(),
            "is_admin".to_string(),
        ]);
        let rows = [
            ("정기", 1000.0, "m1", "2026-01-01", "y"),
            ("정기", 3000.0, "m2", "2026-01-01", "n"),
            ("일시", 500.0, "m1", "2026-01-02", "n"),
            ("일시", 1500.0, "m3", "2026-01-03", "n"),
            ("정기", 2000.0, "m2", "2026-01-03", "y"),
        ];
        for (kind, amount, member, date, admin) in rows {
            t.push_row(vec![
                Value::Str(kind.to_string()),
                Value::Num(amount),
                Value::Str(member.to_string()),
                Value::Str(date.to_string()),
                Value::Str(admin.to_string()),
            ]);
        }
        t
    }

    #[tokio::test]
    async fn test_groupby_analysis() {
        let analysis = engine()
            .analyze(
                "후원유형별 결제금액 합계",
                &donations_table(),
                &FileEngineState::default(),
                false,
            )
            .await;
        assert_eq!(analysis.intent.kind, FileIntentKind::Groupby);
        assert!(analysis.message.contains("후원유형"));
        assert_eq!(analysis.plot_data.chart_type, Some(ChartKind::Bar));
        assert_eq!(analysis.raw_data.len(), 2);
        let top = &analysis.raw_data[0];
        assert_eq!(top["후원유형"], serde_json::json!("정기"));
        assert_eq!(top["결제금액_sum"], serde_json::json!(6000.0));
    }

    #[tokio::test]
    async fn test_user_count_cites_computation() {
        let analysis = engine()
            .analyze(
                "이 파일에 사용자가 몇 명이야?",
                &donations_table(),
                &FileEngineState::default(),
                false,
            )
            .await;
        assert!(analysis.message.contains("**3명**"));
        assert!(analysis.message.contains("member_id"));
    }

    #[tokio::test]
    async fn test_admin_count() {
        let analysis = engine()
            .analyze(
                "관리자 수는 얼마나 돼?",
                &donations_table(),
                &FileEngineState::default(),
                false,
            )
            .await;
        assert!(analysis.message.contains("**2명**"));
    }

    #[tokio::test]
    async fn test_trend_analysis_has_period() {
        let analysis = engine()
            .analyze("일별 결제금액 추이", &donations_table(), &FileEngineState::default(), false)
            .await;
        assert_eq!(analysis.intent.kind, FileIntentKind::Trend);
        assert_eq!(analysis.plot_data.chart_type, Some(ChartKind::Line));
        assert_eq!(analysis.period.as_deref(), Some("2026-01-01 ~ 2026-01-03"));
    }

    #[tokio::test]
    async fn test_insight_falls_back_when_llm_fails() {
        let analysis = engine()
            .analyze(
                "이 데이터에서 주목할 패턴 찾아줘",
                &donations_table(),
                &FileEngineState::default(),
                false,
            )
            .await;
        assert_eq!(analysis.message, "파일 분석 결과를 확인해주세요.");
    }

    #[tokio::test]
    async fn test_insight_uses_llm_when_available() {
        let llm = Arc::new(FixtureLlm::returning_relation("refine").with_insight("주말 매출 집중"));
        let engine = FileEngine::new(llm);
        let analysis = engine
            .analyze(
                "이 데이터에서 주목할 패턴 찾아줘",
                &donations_table(),
                &FileEngineState::default(),
                false,
            )
            .await;
        assert_eq!(analysis.message, "주말 매출 집중");
    }

    #[tokio::test]
    async fn test_schema_message() {
        let analysis = engine()
            .analyze("파일 구조 알려줘", &donations_table(), &FileEngineState::default(), false)
            .await;
        assert!(analysis.message.contains("5행 / 5컬럼"));
        assert!(analysis.message.contains("샘플 1~5행 미리보기"));
    }

    #[tokio::test]
    async fn test_column_probe_pagination_meta() {
        let analysis = engine()
            .analyze(
                "후원유형 고유값 전체 보여줘",
                &donations_table(),
                &FileEngineState::default(),
                false,
            )
            .await;
        assert!(analysis.meta.show_unique);
        assert_eq!(analysis.meta.total_unique, 2);
        assert!(!analysis.meta.has_next);
    }

    #[tokio::test]
    async fn test_beginner_mode_appends_explanation() {
        let analysis = engine()
            .analyze(
                "후원유형별 결제금액 합계",
                &donations_table(),
                &FileEngineState::default(),
                true,
            )
            .await;
        assert!(analysis.message.contains("쉽게 말하면"));
    }
}
