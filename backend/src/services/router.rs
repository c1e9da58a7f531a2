//! Question routing and the top-level chat service
//!
//! Routes each turn to the analytics pipeline, the file engine, the combined
//! view, or the system answer. The active source is remembered per
//! conversation so an ambiguous follow-up stays on the same track.

use dashmap::DashMap;
use std::sync::Arc;

use crate::models::{ChatResponse, ResponseStatus, RowTable};
use crate::services::extractor::DateContext;
use crate::services::file_engine::{EngineState, FileEngine};
use crate::services::llm::LlmPort;
use crate::services::pipeline::AnalyticsPipeline;
use crate::services::store::{ConversationContext, ConversationStore, SOURCE_ANALYTICS, SOURCE_FILE};

const GA4_KEYWORDS: &[&str] = &[
    "사용자", "세션", "페이지뷰", "이벤트", "전환", "실적", "성과", "어제", "지난주", "지난달",
    "오늘", "analytics", "트래픽",
];
const FILE_KEYWORDS: &[&str] =
    &["파일", "문서", "업로드", "내용", "컬럼", "열", "행", "csv", "엑셀", "xlsx"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    System,
    Analytics,
    File,
    Mixed,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Analytics => "ga4",
            Self::File => "file",
            Self::Mixed => "mixed",
        }
    }
}

/// In-memory registry of uploaded tables, keyed by registered name
#[derive(Default)]
pub struct TableRegistry {
    tables: DashMap<String, Arc<RowTable>>,
}

impl TableRegistry {
    pub fn register(&self, name: &str, table: RowTable) {
        self.tables.insert(name.to_string(), Arc::new(table));
    }

    pub fn get(&self, name: &str) -> Option<Arc<RowTable>> {
        self.tables.get(name).map(|t| Arc::clone(t.value()))
    }
}

pub struct ChatTurn {
    pub question: String,
    pub conversation_id: String,
    pub property_id: Option<String>,
    pub file_name: Option<String>,
    pub beginner_mode: bool,
}

pub struct ChatService {
    pipeline: AnalyticsPipeline,
    file_engine: FileEngine,
    llm: Arc<dyn LlmPort>,
    store: Arc<dyn ConversationStore>,
    pub tables: TableRegistry,
}

impl ChatService {
    pub fn new(
        pipeline: AnalyticsPipeline,
        file_engine: FileEngine,
        llm: Arc<dyn LlmPort>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self { pipeline, file_engine, llm, store, tables: TableRegistry::default() }
    }

    pub async fn handle(&self, turn: ChatTurn, date_ctx: &DateContext) -> ChatResponse {
        let context = self
            .store
            .load_context(&turn.conversation_id)
            .await
            .ok()
            .flatten()
            .unwrap_or_default();

        let route = determine_route(&turn.question, &context);
        tracing::info!("Route: {}", route.as_str());

        let property_id = turn
            .property_id
            .clone()
            .or_else(|| context.property_id.clone());
        let file_name = turn.file_name.clone().or_else(|| context.file_path.clone());

        if route != Route::System {
            let new_context = ConversationContext {
                active_source: Some(route.as_str().to_string()),
                property_id: property_id.clone(),
                file_path: file_name.clone(),
            };
            if let Err(e) = self.store.save_context(&turn.conversation_id, &new_context).await {
                tracing::warn!("Context save failed: {}", e);
            }
        }

        match route {
            Route::System => {
                let property = property_id.as_deref().unwrap_or("없음");
                ChatResponse::message_only(
                    ResponseStatus::Ok,
                    format!("현재 분석 속성 [{}]에 연결되어 있습니다.", property),
                )
            },
            Route::File => self.handle_file(&turn, file_name.as_deref()).await,
            Route::Mixed => {
                let analytics = self
                    .handle_analytics(&turn, property_id.as_deref(), date_ctx)
                    .await;
                let file = self.handle_file(&turn, file_name.as_deref()).await;
                self.combine(&turn.question, analytics, file).await
            },
            Route::Analytics => {
                self.handle_analytics(&turn, property_id.as_deref(), date_ctx)
                    .await
            },
        }
    }

    async fn handle_analytics(
        &self,
        turn: &ChatTurn,
        property_id: Option<&str>,
        date_ctx: &DateContext,
    ) -> ChatResponse {
        let Some(property_id) = property_id else {
            return ChatResponse::clarify(
                "연결된 분석 속성이 없습니다. 속성을 먼저 연결해 주세요.",
            );
        };

        // Pure follow-ups reuse the previous result instead of re-querying
        if is_followup_question(&turn.question) {
            if let Ok(Some(raw)) = self
                .store
                .load_last_result(&turn.conversation_id, SOURCE_ANALYTICS)
                .await
            {
                if let Ok(last) = serde_json::from_value::<ChatResponse>(raw) {
                    return post_process_followup(&turn.question, last);
                }
            }
            tracing::info!("Follow-up without stored result, running a fresh analysis");
        }

        self.pipeline
            .run(&turn.question, property_id, Some(&turn.conversation_id), date_ctx)
            .await
    }

    async fn handle_file(&self, turn: &ChatTurn, file_name: Option<&str>) -> ChatResponse {
        let Some(table) = file_name.and_then(|name| self.tables.get(name)) else {
            return ChatResponse::clarify(
                "분석할 파일이 등록되어 있지 않습니다. 파일을 먼저 등록해 주세요.",
            );
        };

        let state: EngineState = self
            .store
            .load_state(&turn.conversation_id, SOURCE_FILE)
            .await
            .ok()
            .flatten()
            .and_then(|raw| serde_json::from_value(raw).ok())
            .unwrap_or_default();

        let analysis = self
            .file_engine
            .analyze(&turn.question, &table, &state, turn.beginner_mode)
            .await;

        let new_state =
            EngineState { last_intent: Some(analysis.intent.kind), last_meta: analysis.meta.clone() };
        if let Ok(raw) = serde_json::to_value(&new_state) {
            if let Err(e) = self.store.save_state(&turn.conversation_id, SOURCE_FILE, &raw).await {
                tracing::warn!("File state save failed: {}", e);
            }
        }

        let mut response = ChatResponse::message_only(ResponseStatus::Ok, analysis.message);
        response.period = analysis.period;
        response.plot_data = analysis.plot_data;
        response.raw_data = analysis.raw_data;
        response.followup_suggestions = analysis.followup_suggestions;
        response.matching_debug = serde_json::json!({
            "file_intent": analysis.intent.kind,
        });
        response
    }

    /// Combined view over both sources; the LLM may unify, the deterministic
    /// concatenation is the guaranteed floor.
    async fn combine(
        &self,
        question: &str,
        analytics: ChatResponse,
        file: ChatResponse,
    ) -> ChatResponse {
        let fallback = format!(
            "두 데이터 소스를 모두 분석했습니다.\n\n[분석 속성]\n{}\n\n[파일 분석]\n{}",
            analytics.message, file.message
        );

        let message = if self.llm.is_available() {
            let prompt = format!(
                "질문: {}\n[소스 A: 분석 속성]\n{}\n[소스 B: 업로드 파일]\n{}\n두 소스의 공통점과 차이를 한국어로 요약해줘.",
                question, analytics.message, file.message
            );
            match self.llm.generate_insight(&prompt).await {
                Ok(unified) if !unified.trim().is_empty() => unified,
                _ => fallback,
            }
        } else {
            fallback
        };

        let mut combined = analytics;
        combined.message = message;
        if combined.plot_data.is_empty() {
            combined.plot_data = file.plot_data;
        }
        combined
    }
}

pub fn determine_route(question: &str, context: &ConversationContext) -> Route {
    let q = question.to_lowercase();
    if ["연결", "속성", "계정"].iter().any(|k| q.contains(k)) {
        return Route::System;
    }

    let has_analytics = GA4_KEYWORDS.iter().any(|k| q.contains(k));
    let has_file = FILE_KEYWORDS.iter().any(|k| q.contains(k));

    if has_analytics && has_file {
        return Route::Mixed;
    }
    if has_file {
        return Route::File;
    }
    if !has_analytics {
        if let Some(active) = context.active_source.as_deref() {
            return match active {
                "file" => Route::File,
                "mixed" => Route::Mixed,
                _ => Route::Analytics,
            };
        }
    }
    Route::Analytics
}

/// Follow-ups rely on the previous result; metric/period keywords mean a
/// fresh analysis instead.
pub fn is_followup_question(question: &str) -> bool {
    let q = question.trim().to_lowercase();

    let strong_followup = [
        "아까", "방금", "이전", "전 내용", "전꺼", "그거", "이거", "다시", "재설명", "정리",
        "더 자세히", "왜", "원인",
    ];
    if strong_followup.iter().any(|k| q.contains(k)) {
        return true;
    }

    let metric_keywords = [
        "매출", "구매", "구입", "결제", "수익", "revenue", "사용자", "유저", "방문자", "세션",
        "전환", "클릭", "이벤트", "상품", "아이템", "item", "제품", "브랜드", "유입", "채널",
        "source", "medium", "campaign",
    ];
    let ranking_keywords = ["top", "10등", "10개", "5개", "1등", "순위"];
    if ranking_keywords.iter().any(|k| q.contains(k)) {
        return !metric_keywords.iter().any(|k| q.contains(k));
    }

    if metric_keywords.iter().any(|k| q.contains(k)) {
        return false;
    }

    let new_analysis_keywords = [
        "지난주", "이번주", "지난달", "이번달", "어제", "오늘", "기간", "부터", "까지",
        "전주 대비", "비교", "증감", "추이", "일별", "월별",
    ];
    if new_analysis_keywords.iter().any(|k| q.contains(k)) {
        return false;
    }

    false
}

/// Rule-based answer for "왜/원인" follow-ups: concentration of the previous
/// top rows, no new query.
fn post_process_followup(question: &str, last: ChatResponse) -> ChatResponse {
    let q = question.to_lowercase();

    if last.raw_data.is_empty() {
        return ChatResponse::message_only(
            ResponseStatus::Ok,
            "이전 분석 결과가 존재하지 않습니다.",
        );
    }

    if ["원인", "왜", "이유", "해석"].iter().any(|k| q.contains(k)) {
        if let Some(message) = concentration_summary(&last.raw_data) {
            let mut response = last.clone();
            response.message = message;
            return response;
        }
    }

    // Other follow-up triggers re-serve the stored result
    last
}

fn concentration_summary(raw_data: &[serde_json::Value]) -> Option<String> {
    let first = raw_data.first()?.as_object()?;

    let mut metric_key = None;
    let mut label_key = None;
    for (key, value) in first {
        if metric_key.is_none() && json_number(value).is_some() {
            metric_key = Some(key.clone());
        }
        if label_key.is_none() && json_number(value).is_none() {
            label_key = Some(key.clone());
        }
    }
    let metric_key = metric_key?;

    let mut values = Vec::new();
    let mut labels = Vec::new();
    for record in raw_data {
        let Some(obj) = record.as_object() else { continue };
        let Some(n) = obj.get(&metric_key).and_then(json_number) else { continue };
        values.push(n);
        labels.push(
            label_key
                .as_ref()
                .and_then(|k| obj.get(k))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
        );
    }
    if values.is_empty() {
        return None;
    }

    let total: f64 = values.iter().sum();
    let top1 = values[0];
    let top3: f64 = values.iter().take(3).sum();
    let top1_share = if total > 0.0 { top1 / total * 100.0 } else { 0.0 };
    let top3_share = if total > 0.0 { top3 / total * 100.0 } else { 0.0 };
    let top_label = labels.first().cloned().filter(|l| !l.is_empty()).unwrap_or_else(|| "상위 항목".to_string());
    let shape = if top1_share >= 40.0 { "집중" } else { "분산" };

    Some(format!(
        "원인 분석 관점에서 보면 상위 성과는 **{} 구조**입니다.\n- 1위 항목: **{}**\n- 1위 비중: **{:.1}%**\n- 상위 3개 비중: **{:.1}%**\n\n다음으로는 1위 항목을 채널/디바이스/랜딩페이지로 분해해 원인을 확정하는 것이 좋습니다.",
        shape, top_label, top1_share, top3_share
    ))
}

fn json_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => crate::models::parse_lenient_number(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_system() {
        let route = determine_route("지금 어떤 속성에 연결돼있어?", &ConversationContext::default());
        assert_eq!(route, Route::System);
    }

    #[test]
    fn test_route_file_by_keyword() {
        let route = determine_route("업로드한 파일 구조 알려줘", &ConversationContext::default());
        assert_eq!(route, Route::File);
    }

    #[test]
    fn test_route_sticky_source() {
        let context = ConversationContext {
            active_source: Some("file".to_string()),
            ..Default::default()
        };
        assert_eq!(determine_route("그럼 유형별로는?", &context), Route::File);
    }

    #[test]
    fn test_route_default_analytics() {
        let route = determine_route("총 매출 알려줘", &ConversationContext::default());
        assert_eq!(route, Route::Analytics);
    }

    #[test]
    fn test_followup_detection() {
        assert!(is_followup_question("왜 이렇게 나온거야?"));
        assert!(is_followup_question("아까 결과 다시 보여줘"));
        assert!(!is_followup_question("지난주 매출 알려줘"));
        assert!(!is_followup_question("채널별 세션 보여줘"));
    }

    #[test]
    fn test_concentration_summary() {
        let raw = vec![
            serde_json::json!({"채널": "Organic", "세션": 500.0}),
            serde_json::json!({"채널": "Direct", "세션": 300.0}),
            serde_json::json!({"채널": "Referral", "세션": 200.0}),
        ];
        let message = concentration_summary(&raw).unwrap();
        assert!(message.contains("50.0%"));
        assert!(message.contains("집중"));
        assert!(message.contains("Organic"));
    }
}
