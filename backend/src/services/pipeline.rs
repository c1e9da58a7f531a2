//! Analytics pipeline orchestrator
//!
//! One turn: load state → extract candidates → classify relation → apply the
//! inheritance policy → plan → execute → adapt → persist the anchor state.
//! Everything between the ports is pure and deterministic.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::models::{BlockData, ChatResponse, ResponseStatus};
use crate::services::adapter::{AdaptInput, ResponseAdapter};
use crate::services::analytics::AnalyticsPort;
use crate::services::executor::PlanExecutor;
use crate::services::extractor::{CandidateExtractor, DateContext, Extraction};
use crate::services::llm::LlmPort;
use crate::services::metadata;
use crate::services::planner::{BlockType, ExecutionPlan, PlanOutcome, Planner};
use crate::services::relation::RelationClassifier;
use crate::services::semantic::SemanticIndex;
use crate::services::state_policy::{apply_relation_policy, ConversationState};
use crate::services::store::{ConversationStore, SOURCE_ANALYTICS};

static CACHE_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^가-힣a-zA-Z0-9\s]").unwrap());

const EVENT_MATCH_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClarifyKind {
    Metric,
    Dimension,
}

/// Mid-confidence candidate waiting for a 예/아니오 answer
#[derive(Debug, Clone)]
struct PendingClarify {
    kind: ClarifyKind,
    key: String,
}

pub struct AnalyticsPipeline {
    extractor: CandidateExtractor,
    relation_classifier: RelationClassifier,
    executor: PlanExecutor,
    llm: Arc<dyn LlmPort>,
    store: Arc<dyn ConversationStore>,
    response_cache: DashMap<String, ChatResponse>,
    pending_clarify: DashMap<String, PendingClarify>,
}

impl AnalyticsPipeline {
    pub fn new(
        semantic: Arc<SemanticIndex>,
        llm: Arc<dyn LlmPort>,
        analytics: Arc<dyn AnalyticsPort>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            extractor: CandidateExtractor::new(Some(semantic)),
            relation_classifier: RelationClassifier::new(llm.clone()),
            executor: PlanExecutor::new(analytics),
            llm,
            store,
            response_cache: DashMap::new(),
            pending_clarify: DashMap::new(),
        }
    }

    pub async fn run(
        &self,
        question: &str,
        property_id: &str,
        conversation_id: Option<&str>,
        date_ctx: &DateContext,
    ) -> ChatResponse {
        tracing::info!("Pipeline start: question={:?} property={}", question, property_id);

        // A pending clarify consumes this turn as its 예/아니오 answer
        let mut question = question.to_string();
        if let Some(conversation_id) = conversation_id {
            match self.consume_pending_clarify(conversation_id, &question) {
                ClarifyOutcome::Confirmed(rewritten) => {
                    tracing::info!("Clarify confirmed, rewritten question: {:?}", rewritten);
                    question = rewritten;
                },
                ClarifyOutcome::Rejected => {
                    return ChatResponse::message_only(
                        ResponseStatus::Ok,
                        "어떤 항목을 의미하셨는지 조금 더 구체적으로 말씀해 주세요.",
                    );
                },
                ClarifyOutcome::None => {},
            }
        }
        let question = question.as_str();

        let cache_key = cache_key(conversation_id, property_id, question);
        if let Some(cached) = self.response_cache.get(&cache_key) {
            tracing::info!("Response cache hit");
            return cached.value().clone();
        }

        // STEP 1: context
        let last_state = self.load_last_state(conversation_id).await;

        // STEP 2: candidate extraction
        let mut extraction = self.extractor.extract(question, last_state.as_ref(), date_ctx);
        tracing::info!(
            "Extracted: intent={:?}, {} metric cands, {} dim cands",
            extraction.intent,
            extraction.metric_candidates.len(),
            extraction.dimension_candidates.len()
        );

        // Mid-confidence match: ask before planning anything
        if let Some((clarify, pending)) = clarify_prompt(&extraction) {
            if let Some(conversation_id) = conversation_id {
                self.pending_clarify
                    .insert(conversation_id.to_string(), pending);
            }
            return clarify;
        }

        // Explanatory question with no data signal: answer directly
        if looks_explanatory(question) && !has_data_signal(question) {
            let mut response =
                ChatResponse::message_only(ResponseStatus::Ok, self.general_answer(question).await);
            response.account = Some(property_id.to_string());
            response.matching_debug = extraction.matching_debug.clone();
            return response;
        }

        // Period-only question: report the active window without a query
        if let Some(response) =
            period_only_response(question, &extraction, last_state.as_ref(), property_id)
        {
            return response;
        }

        // Optional LLM intent fallback
        if CandidateExtractor::needs_llm_fallback(&extraction) && self.llm.is_available() {
            match self.llm.extract_intent(question).await {
                Ok(llm_intent) => {
                    CandidateExtractor::apply_llm_fallback(&mut extraction, &llm_intent);
                },
                Err(e) => tracing::warn!("LLM intent fallback skipped: {}", e),
            }
        }

        // STEP 3: relation + inheritance policy
        let relation = self
            .relation_classifier
            .classify(question, last_state.as_ref(), &extraction)
            .await;
        tracing::info!("Relation: {}", relation.as_str());
        let inherited = apply_relation_policy(last_state, relation);

        // Event tokens resolve against the live event registry
        if let Some(token) = extraction.modifiers.event_token.clone() {
            if let Some(resolved) = self.resolve_event(property_id, &token).await {
                extraction.modifiers.event_token = Some(resolved);
            }
        }

        // STEP 4: plan
        let plan = match Planner::build_plan(
            property_id,
            question,
            &extraction,
            inherited.as_ref(),
            date_ctx,
        ) {
            PlanOutcome::Plan(plan) => plan,
            PlanOutcome::Clarify(message) => {
                let mut response = ChatResponse::clarify(message);
                response.matching_debug = extraction.matching_debug.clone();
                return response;
            },
        };
        tracing::info!("Plan: {} blocks, {} ~ {}", plan.blocks.len(), plan.start_date, plan.end_date);

        // STEP 5: execute
        let report = self.executor.execute(&plan).await;

        // STEP 6: adapt
        let period = format!("{} ~ {}", plan.start_date, plan.end_date);
        let response = ResponseAdapter::adapt(AdaptInput {
            question: question.to_string(),
            property_id: property_id.to_string(),
            period: Some(period),
            blocks: report.results,
            exclude_notset: plan.exclude_notset,
            failed_blocks: report.failed_blocks,
            matching_debug: extraction.matching_debug.clone(),
        });

        // STEP 7: persist state, last result, discovered events
        if matches!(response.status, ResponseStatus::Ok | ResponseStatus::PartialError) {
            self.persist_turn(conversation_id, property_id, &plan, &extraction, &response)
                .await;
            self.response_cache.insert(cache_key, response.clone());
        }

        response
    }

    /// Interpret the answer to an outstanding "혹시 'X'을 의미하셨나요?"
    fn consume_pending_clarify(&self, conversation_id: &str, question: &str) -> ClarifyOutcome {
        let Some(pending) = self
            .pending_clarify
            .get(conversation_id)
            .map(|p| p.value().clone())
        else {
            return ClarifyOutcome::None;
        };

        let normalized = question.trim().to_lowercase();
        let is_yes = ["예", "네", "응", "맞"].iter().any(|t| normalized.contains(t));
        let is_no = ["아니", "아니오", "틀렸"].iter().any(|t| normalized.contains(t));

        if is_no {
            self.pending_clarify.remove(conversation_id);
            return ClarifyOutcome::Rejected;
        }
        if is_yes {
            self.pending_clarify.remove(conversation_id);
            let ui = metadata::ui_name(&pending.key);
            let rewritten = match pending.kind {
                ClarifyKind::Metric => ui,
                ClarifyKind::Dimension => format!("{}별", ui),
            };
            return ClarifyOutcome::Confirmed(rewritten);
        }
        // Any other question abandons the clarify
        self.pending_clarify.remove(conversation_id);
        ClarifyOutcome::None
    }

    async fn load_last_state(&self, conversation_id: Option<&str>) -> Option<ConversationState> {
        let conversation_id = conversation_id?;
        match self.store.load_state(conversation_id, SOURCE_ANALYTICS).await {
            Ok(Some(raw)) => serde_json::from_value(raw).ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("State load failed, continuing stateless: {}", e);
                None
            },
        }
    }

    async fn general_answer(&self, question: &str) -> String {
        if self.llm.is_available() {
            let prompt = format!(
                "질문: {}\n현재 데이터 조회로는 정의를 확정할 수 없는 상황이다. 일반 설명과 확인 방법(메타데이터/정의 문서 확인)을 3문장 이내로 답해라.",
                question
            );
            if let Ok(answer) = self.llm.generate_insight(&prompt).await {
                if !answer.trim().is_empty() {
                    return answer;
                }
            }
        }
        "질문하신 항목은 현재 연결된 데이터만으로 업무 정의를 확정할 수 없습니다. 일반적으로는 분석용 라벨(예: 상품/후원/이벤트 분류값)로 사용됩니다. 정확한 정의는 측정기준 문서에서 확인해 주세요.".to_string()
    }

    /// Fuzzy-resolve an event token against the property's event registry
    async fn resolve_event(&self, property_id: &str, token: &str) -> Option<String> {
        let events = match self.store.get_events(property_id).await {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!("Event registry lookup failed: {}", e);
                return None;
            },
        };
        let best = events
            .iter()
            .map(|event| (bigram_similarity(token, event), event))
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))?;
        if best.0 >= EVENT_MATCH_THRESHOLD && best.1 != token {
            tracing::info!("Event token {:?} resolved to {:?} ({:.2})", token, best.1, best.0);
            return Some(best.1.clone());
        }
        None
    }

    async fn persist_turn(
        &self,
        conversation_id: Option<&str>,
        property_id: &str,
        plan: &ExecutionPlan,
        extraction: &Extraction,
        response: &ChatResponse,
    ) {
        // Newly observed event names feed the registry
        let mut events = Vec::new();
        for block in &response.blocks {
            if let BlockData::Rows(table) = &block.data {
                if let Some(col) = table.col_index("eventName") {
                    for value in table.column_values(col) {
                        let name = value.display();
                        if !name.is_empty() && !events.contains(&name) {
                            events.push(name);
                        }
                    }
                }
            }
        }
        if !events.is_empty() {
            if let Err(e) = self.store.save_events(property_id, &events).await {
                tracing::warn!("Event registry update failed: {}", e);
            }
        }

        let Some(conversation_id) = conversation_id else {
            return;
        };

        let state = anchor_state(plan, extraction);
        match serde_json::to_value(&state) {
            Ok(raw) => {
                if let Err(e) = self.store.save_state(conversation_id, SOURCE_ANALYTICS, &raw).await
                {
                    // A stale state on the next turn beats a failed turn now
                    tracing::warn!("State save failed: {}", e);
                }
            },
            Err(e) => tracing::warn!("State serialization failed: {}", e),
        }

        match serde_json::to_value(response) {
            Ok(raw) => {
                if let Err(e) = self
                    .store
                    .save_last_result(conversation_id, SOURCE_ANALYTICS, &raw)
                    .await
                {
                    tracing::warn!("Last-result save failed: {}", e);
                }
            },
            Err(e) => tracing::warn!("Result serialization failed: {}", e),
        }
    }
}

/// Anchor block: first breakdown/trend with dimensions, else the first block
fn anchor_state(plan: &ExecutionPlan, extraction: &Extraction) -> ConversationState {
    let anchor = plan
        .blocks
        .iter()
        .find(|b| {
            !b.dimensions.is_empty()
                && matches!(
                    b.block_type,
                    BlockType::Breakdown | BlockType::BreakdownTopn | BlockType::Trend
                )
        })
        .or_else(|| plan.blocks.first());

    let (metrics, dimensions, event_filter, scope_type) = match anchor {
        Some(block) => (
            block.metrics.clone(),
            block.dimensions.clone(),
            block.filters.event_filter.clone(),
            Some(block.scope.as_str().to_string()),
        ),
        None => (Vec::new(), Vec::new(), None, None),
    };

    let scope_type = {
        let mut scopes: Vec<_> = plan
            .blocks
            .iter()
            .flat_map(|b| b.metrics.iter().map(|m| metadata::metric_scope(m)))
            .collect();
        scopes.dedup();
        if scopes.len() > 1 { Some("mixed".to_string()) } else { scope_type }
    };

    ConversationState {
        metrics,
        dimensions,
        start_date: Some(plan.start_date),
        end_date: Some(plan.end_date),
        intent: Some(plan.intent),
        scope_type,
        last_entity: extraction.modifiers.entity_terms.first().cloned(),
        event_filter,
        periods: Vec::new(),
    }
}

fn cache_key(conversation_id: Option<&str>, property_id: &str, question: &str) -> String {
    let normalized = CACHE_KEY_RE.replace_all(question, "").to_lowercase();
    format!("{}:{}:{}", conversation_id.unwrap_or("-"), property_id, normalized.trim())
}

enum ClarifyOutcome {
    Confirmed(String),
    Rejected,
    None,
}

fn clarify_prompt(extraction: &Extraction) -> Option<(ChatResponse, PendingClarify)> {
    let metric = extraction.metric_candidates.iter().find(|c| c.needs_clarify);
    let dimension = extraction.dimension_candidates.iter().find(|c| c.needs_clarify);
    let (candidate, kind) = metric
        .map(|c| (c, ClarifyKind::Metric))
        .or_else(|| dimension.map(|c| (c, ClarifyKind::Dimension)))?;

    let ui = metadata::ui_name(&candidate.name);
    let mut response =
        ChatResponse::clarify(format!("혹시 '{}'을 의미하셨나요? (예/아니오)", ui));
    response.matching_debug = extraction.matching_debug.clone();
    Some((response, PendingClarify { kind, key: candidate.name.clone() }))
}

fn looks_explanatory(question: &str) -> bool {
    let q = question.to_lowercase();
    ["뭐야", "무엇", "무슨 뜻", "뜻", "의미", "정의", "설명해", "뭔지"]
        .iter()
        .any(|k| q.contains(k))
}

fn has_data_signal(question: &str) -> bool {
    let q = question.to_lowercase();
    [
        "매출", "수익", "사용자", "세션", "이벤트", "클릭", "구매", "비율", "율", "추이", "비교",
        "상위", "top", "채널", "소스", "매체", "국가", "기간", "전주", "지난주", "후원", "상품",
        "이름", "후원명", "donation_name", "경로", "트랜잭션", "처음", "신규",
    ]
    .iter()
    .any(|k| q.contains(k))
}

fn period_only_response(
    question: &str,
    extraction: &Extraction,
    last_state: Option<&ConversationState>,
    property_id: &str,
) -> Option<ChatResponse> {
    let q = question.to_lowercase();
    let period_terms = ["언제부터", "언제까지", "기간", "몇일부터", "기준이야", "기준인가", "기준은"];
    let relative_terms = ["지난주", "이번주", "지난달", "이번달", "어제", "오늘"];
    let is_period_inquiry = period_terms.iter().any(|k| q.contains(k))
        || relative_terms.iter().any(|k| q.contains(k));

    let analytics_tokens = [
        "매출", "수익", "사용자", "세션", "전환", "클릭", "구매", "후원", "후원자", "신규", "처음",
        "top", "상위", "비율", "추이", "원인", "분석", "상품", "경로", "채널", "소스", "매체",
    ];
    if !is_period_inquiry || analytics_tokens.iter().any(|k| q.contains(k)) {
        return None;
    }

    let window = extraction.date_range.map(|r| (r.start_date, r.end_date)).or_else(|| {
        last_state.and_then(|s| match (s.start_date, s.end_date) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        })
    })?;

    let mut response = ChatResponse::message_only(
        ResponseStatus::Ok,
        format!("현재 분석 기준 기간은 **{} ~ {}** 입니다.", window.0, window.1),
    );
    response.account = Some(property_id.to_string());
    response.period = Some(format!("{} ~ {}", window.0, window.1));
    response.matching_debug = extraction.matching_debug.clone();
    Some(response)
}

/// Dice coefficient over character bigrams; 1.0 for identical strings
fn bigram_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let bigrams = |s: &str| -> Vec<(char, char)> {
        let chars: Vec<char> = s.chars().collect();
        chars.windows(2).map(|w| (w[0], w[1])).collect()
    };
    let a_bigrams = bigrams(a);
    let b_bigrams = bigrams(b);
    if a_bigrams.is_empty() || b_bigrams.is_empty() {
        return 0.0;
    }
    let mut b_pool = b_bigrams.clone();
    let mut overlap = 0usize;
    for bigram in &a_bigrams {
        if let Some(pos) = b_pool.iter().position(|x| x == bigram) {
            b_pool.swap_remove(pos);
            overlap += 1;
        }
    }
    2.0 * overlap as f64 / (a_bigrams.len() + b_bigrams.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bigram_similarity() {
        assert_eq!(bigram_similarity("donation_click", "donation_click"), 1.0);
        assert!(bigram_similarity("donation_clik", "donation_click") >= 0.8);
        assert!(bigram_similarity("scroll", "donation_click") < 0.3);
    }

    #[test]
    fn test_cache_key_normalization() {
        let a = cache_key(Some("c1"), "p1", "총 매출 알려줘!");
        let b = cache_key(Some("c1"), "p1", "총 매출 알려줘");
        assert_eq!(a, b);
    }

    #[test]
    fn test_explanatory_detection() {
        assert!(looks_explanatory("donation_name이 뭐야?"));
        assert!(has_data_signal("donation_name이 뭐야?"));
        assert!(looks_explanatory("MAU가 무슨 뜻이야?"));
        assert!(!has_data_signal("mau가 무슨 뜻이야?"));
    }

    #[tokio::test]
    async fn test_pending_clarify_confirmation() {
        use crate::services::analytics::FixtureAnalytics;
        use crate::services::llm::FixtureLlm;
        use crate::services::semantic::SemanticIndex;
        use crate::services::store::SqliteConversationStore;

        let pipeline = AnalyticsPipeline::new(
            Arc::new(SemanticIndex::from_registry()),
            Arc::new(FixtureLlm::failing()),
            Arc::new(FixtureAnalytics::with_default_metadata()),
            Arc::new(SqliteConversationStore::new(crate::db::create_test_pool().await)),
        );

        pipeline.pending_clarify.insert(
            "conv1".to_string(),
            PendingClarify { kind: ClarifyKind::Metric, key: "bounceRate".to_string() },
        );
        match pipeline.consume_pending_clarify("conv1", "예 맞아요") {
            ClarifyOutcome::Confirmed(rewritten) => assert_eq!(rewritten, "이탈률"),
            _ => panic!("expected confirmation"),
        }
        assert!(pipeline.pending_clarify.get("conv1").is_none());

        pipeline.pending_clarify.insert(
            "conv1".to_string(),
            PendingClarify { kind: ClarifyKind::Dimension, key: "deviceCategory".to_string() },
        );
        match pipeline.consume_pending_clarify("conv1", "아니오") {
            ClarifyOutcome::Rejected => {},
            _ => panic!("expected rejection"),
        }
    }
}
