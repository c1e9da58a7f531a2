//! Candidate extraction layer
//!
//! Extracts *possibilities* from the question, never decisions: every metric
//! and dimension that could be meant, each with a confidence score. The
//! planner picks. Candidates are ordered by score, then match kind, then
//! registry priority, then position in the question.

pub mod dates;
pub mod entities;
pub mod intent;

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::services::metadata::{self, FieldDef, FieldScope, DIMENSIONS, METRICS};
use crate::services::semantic::SemanticIndex;
use crate::services::state_policy::ConversationState;
use crate::utils::unique_ordered_by;

pub use dates::{DateContext, DateParser, DateRange};
pub use intent::{IntentClassifier, QuestionIntent};

pub const SEMANTIC_HIGH_THRESHOLD: f64 = 0.40;
pub const SEMANTIC_MID_THRESHOLD: f64 = 0.25;
const MAX_CANDIDATES: usize = 5;
const FOLLOWUP_MAX_CHARS: usize = 20;
const INHERITED_SCORE: f64 = 0.98;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedBy {
    Explicit,
    Alias,
    SemanticHigh,
    SemanticMid,
    Llm,
    Inherited,
    PlannerDefault,
}

impl MatchedBy {
    /// Tie-break rank when scores are equal (lower wins)
    fn rank(&self) -> u8 {
        match self {
            Self::Explicit => 0,
            Self::Alias => 1,
            Self::Inherited => 2,
            Self::SemanticHigh => 3,
            Self::Llm => 4,
            Self::SemanticMid => 5,
            Self::PlannerDefault => 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub score: f64,
    pub matched_by: MatchedBy,
    pub scope: FieldScope,
    #[serde(default)]
    pub needs_clarify: bool,
}

impl Candidate {
    pub fn new(name: impl Into<String>, score: f64, matched_by: MatchedBy, scope: FieldScope) -> Self {
        Self { name: name.into(), score, matched_by, scope, needs_clarify: false }
    }
}

/// Operator requests detected alongside the main question
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Modifiers {
    pub needs_total: bool,
    pub needs_breakdown: bool,
    pub exclude_notset: bool,
    pub scope_hint: Option<FieldScope>,
    pub entity_terms: Vec<String>,
    pub event_token: Option<String>,
    pub event_pair: Option<(String, String)>,
    pub limit: Option<u32>,
    pub order_desc: bool,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub intent: QuestionIntent,
    pub metric_candidates: Vec<Candidate>,
    pub dimension_candidates: Vec<Candidate>,
    pub date_range: Option<DateRange>,
    pub modifiers: Modifiers,
    pub matching_debug: serde_json::Value,
}

/// Output contract of the optional LLM intent fallback
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmIntentResult {
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

pub struct CandidateExtractor {
    semantic: Option<Arc<SemanticIndex>>,
}

impl CandidateExtractor {
    pub fn new(semantic: Option<Arc<SemanticIndex>>) -> Self {
        Self { semantic }
    }

    pub fn extract(
        &self,
        question: &str,
        last_state: Option<&ConversationState>,
        ctx: &DateContext,
    ) -> Extraction {
        let (mut intent, limit) = IntentClassifier::classify(question);
        let norm_q = metadata::normalize(question);

        // 1. Explicit metric matching over the whole registry, question order
        let mut metric_candidates = explicit_matches(&norm_q, METRICS, false);

        // 2. Semantic fallback only when nothing matched explicitly
        if metric_candidates.is_empty() {
            if let Some(semantic) = &self.semantic {
                if let Some(top) = semantic.match_metrics(question).first() {
                    if let Some(cand) = semantic_candidate(top.name.as_str(), top.confidence, true) {
                        metric_candidates.push(cand);
                    }
                }
            }
        }
        metric_candidates = finalize(metric_candidates);

        // 3. Dimensions: explicit scan (date is owned by the date parser)
        let mut dimension_candidates = explicit_matches(&norm_q, DIMENSIONS, true);
        if dimension_candidates.is_empty() && intent == QuestionIntent::Breakdown {
            if let Some(semantic) = &self.semantic {
                if let Some(top) = semantic.match_dimensions(question).first() {
                    if let Some(cand) = semantic_candidate(top.name.as_str(), top.confidence, false)
                    {
                        dimension_candidates.push(cand);
                    }
                }
            }
        }
        dimension_candidates = finalize(dimension_candidates);

        // 4. Dates
        let last_dates = last_state.and_then(|s| match (s.start_date, s.end_date) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        });
        let date_range = DateParser::parse(question, last_dates, ctx);

        // 5. Modifiers
        let mut modifiers = detect_modifiers(question, limit, &metric_candidates);

        // 6. Multi-metric override (only when no stronger rule already fired)
        let distinct_metrics = metric_candidates
            .iter()
            .filter(|c| c.matched_by == MatchedBy::Explicit || c.matched_by == MatchedBy::Alias)
            .count();
        if intent == QuestionIntent::MetricSingle && distinct_metrics > 1 {
            intent = QuestionIntent::MetricMulti;
        }

        // 7. Short follow-up inheritance: "매출은 어때?" keeps the previous
        // breakdown axis
        if let Some(state) = last_state {
            if should_inherit_followup(question, intent, state) {
                modifiers.needs_breakdown = true;
                modifiers.needs_total = true;
                for dim in &state.dimensions {
                    if dimension_candidates.iter().any(|c| &c.name == dim) {
                        continue;
                    }
                    dimension_candidates.push(Candidate::new(
                        dim.clone(),
                        INHERITED_SCORE,
                        MatchedBy::Inherited,
                        metadata::dimension_scope(dim),
                    ));
                }
            }
        }

        let matching_debug = json!({
            "intent": intent.as_str(),
            "metric_candidates": &metric_candidates,
            "dimension_candidates": &dimension_candidates,
            "entity_terms": &modifiers.entity_terms,
            "event_token": &modifiers.event_token,
            "date_range": date_range.map(|r| r.label()),
        });

        Extraction {
            intent,
            metric_candidates,
            dimension_candidates,
            date_range,
            modifiers,
            matching_debug,
        }
    }

    /// Merge the optional LLM fallback result. Names that do not resolve
    /// through the registry are rejected.
    pub fn apply_llm_fallback(extraction: &mut Extraction, llm: &LlmIntentResult) {
        for name in &llm.metrics {
            if let Some(key) = metadata::resolve_metric(name) {
                if !extraction.metric_candidates.iter().any(|c| c.name == key) {
                    extraction.metric_candidates.push(Candidate::new(
                        key,
                        0.70,
                        MatchedBy::Llm,
                        metadata::metric_scope(key),
                    ));
                }
            }
        }
        for name in &llm.dimensions {
            if let Some(key) = metadata::resolve_dimension(name) {
                if !extraction.dimension_candidates.iter().any(|c| c.name == key) {
                    extraction.dimension_candidates.push(Candidate::new(
                        key,
                        0.70,
                        MatchedBy::Llm,
                        metadata::dimension_scope(key),
                    ));
                }
            }
        }
        if extraction.metric_candidates.iter().any(|c| c.matched_by == MatchedBy::Llm) {
            if let Some(intent) = llm.intent.as_deref() {
                if let Some(parsed) = parse_intent(intent) {
                    extraction.intent = parsed;
                }
            }
            if extraction.modifiers.limit.is_none() {
                extraction.modifiers.limit = llm.limit;
            }
        }
    }

    /// True when no metric matched at high confidence, i.e. the LLM fallback
    /// is worth a call.
    pub fn needs_llm_fallback(extraction: &Extraction) -> bool {
        !extraction
            .metric_candidates
            .iter()
            .any(|c| c.score >= SEMANTIC_HIGH_THRESHOLD)
    }
}

fn parse_intent(s: &str) -> Option<QuestionIntent> {
    match s {
        "metric_single" => Some(QuestionIntent::MetricSingle),
        "metric_multi" => Some(QuestionIntent::MetricMulti),
        "breakdown" => Some(QuestionIntent::Breakdown),
        "topn" => Some(QuestionIntent::TopN),
        "comparison" => Some(QuestionIntent::Comparison),
        "trend" => Some(QuestionIntent::Trend),
        "category_list" => Some(QuestionIntent::CategoryList),
        _ => None,
    }
}

/// Substring-match every registry entry against the normalized question.
/// Matches are reported in question order.
fn explicit_matches(norm_q: &str, defs: &'static [FieldDef], skip_date: bool) -> Vec<Candidate> {
    let mut found: Vec<(usize, Candidate)> = Vec::new();

    for def in defs {
        if skip_date && def.key == "date" {
            continue;
        }

        let mut best: Option<(usize, MatchedBy)> = None;
        for (term, matched_by) in
            std::iter::once((def.key, MatchedBy::Explicit))
                .chain(std::iter::once((def.ui_name, MatchedBy::Explicit)))
                .chain(def.aliases.iter().map(|a| (*a, MatchedBy::Alias)))
        {
            let norm_term = metadata::normalize(term);
            if norm_term.chars().count() <= 1 {
                continue;
            }
            if let Some(pos) = norm_q.find(&norm_term) {
                let better = match best {
                    None => true,
                    Some((best_pos, best_by)) => {
                        pos < best_pos || (pos == best_pos && matched_by.rank() < best_by.rank())
                    },
                };
                if better {
                    best = Some((pos, matched_by));
                }
            }
        }

        if let Some((pos, matched_by)) = best {
            found.push((pos, Candidate::new(def.key, 1.0, matched_by, def.effective_scope())));
        }
    }

    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, c)| c).collect()
}

fn semantic_candidate(name: &str, confidence: f64, is_metric: bool) -> Option<Candidate> {
    let scope = if is_metric {
        metadata::metric_scope(name)
    } else {
        metadata::dimension_scope(name)
    };
    if confidence >= SEMANTIC_HIGH_THRESHOLD {
        Some(Candidate::new(name, confidence, MatchedBy::SemanticHigh, scope))
    } else if confidence >= SEMANTIC_MID_THRESHOLD {
        let mut cand = Candidate::new(name, confidence, MatchedBy::SemanticMid, scope);
        cand.needs_clarify = true;
        Some(cand)
    } else {
        None
    }
}

/// Dedup by key, order by score / match kind / priority, cap at 5
fn finalize(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut unique = unique_ordered_by(candidates, |c| c.name.clone());
    unique.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.matched_by.rank().cmp(&b.matched_by.rank()))
            .then_with(|| priority_of(&b.name).cmp(&priority_of(&a.name)))
    });
    unique.truncate(MAX_CANDIDATES);
    unique
}

fn priority_of(key: &str) -> u8 {
    metadata::metric(key)
        .or_else(|| metadata::dimension(key))
        .map(|d| d.priority)
        .unwrap_or(0)
}

fn detect_modifiers(question: &str, limit: Option<u32>, metrics: &[Candidate]) -> Modifiers {
    let q = question.to_lowercase();

    let needs_total =
        ["총", "전체", "합계", "총합", "total"].iter().any(|k| q.contains(k));
    let needs_breakdown = ["별", "기준", "따라", "by "].iter().any(|k| q.contains(k));
    let exclude_notset = q.contains("제외")
        && ["not set", "(not set)", "빈값", "결측", "미수집", "null"]
            .iter()
            .any(|k| q.contains(k));

    let has_item_word = ["상품", "아이템", "제품", "item"].iter().any(|k| q.contains(k));
    let scope_hint = if !metrics.is_empty()
        && metrics.iter().all(|c| c.scope == FieldScope::Item)
    {
        Some(FieldScope::Item)
    } else if metrics.is_empty() && has_item_word {
        Some(FieldScope::Item)
    } else {
        None
    };

    let order_desc = limit.is_some() || q.contains("상위") || q.contains("top");

    Modifiers {
        needs_total,
        needs_breakdown,
        exclude_notset,
        scope_hint,
        entity_terms: entities::extract_entity_terms(question),
        event_token: entities::extract_event_token(question),
        event_pair: entities::extract_event_pair(question),
        limit,
        order_desc,
    }
}

fn should_inherit_followup(
    question: &str,
    intent: QuestionIntent,
    state: &ConversationState,
) -> bool {
    if intent != QuestionIntent::MetricSingle {
        return false;
    }
    let q = question.trim().to_lowercase();
    if q.chars().count() > FOLLOWUP_MAX_CHARS {
        return false;
    }
    let has_metric_word =
        ["매출", "수익", "구매", "사용자", "세션", "전환"].iter().any(|k| q.contains(k));
    let has_dim_word = [
        "채널", "소스", "매체", "국가", "유형", "카테고리", "후원명", "상품", "이름", "경로",
        "페이지",
    ]
    .iter()
    .any(|k| q.contains(k));

    has_metric_word && !has_dim_word && !state.dimensions.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ctx() -> DateContext {
        DateContext::new(NaiveDate::from_ymd_opt(2026, 2, 18).unwrap())
    }

    fn extractor() -> CandidateExtractor {
        CandidateExtractor::new(Some(Arc::new(SemanticIndex::from_registry())))
    }

    #[test]
    fn test_total_revenue_question() {
        let ex = extractor().extract("총 매출 알려줘", None, &ctx());
        assert_eq!(ex.intent, QuestionIntent::MetricSingle);
        assert!(ex.modifiers.needs_total);
        assert_eq!(ex.metric_candidates[0].name, "purchaseRevenue");
        assert!(ex.dimension_candidates.is_empty());
    }

    #[test]
    fn test_trend_question() {
        let ex = extractor().extract("지난주 사용자 추이 알려줘", None, &ctx());
        assert_eq!(ex.intent, QuestionIntent::Trend);
        assert_eq!(ex.metric_candidates[0].name, "activeUsers");
        let range = ex.date_range.unwrap();
        assert_eq!(range.start_date, NaiveDate::from_ymd_opt(2026, 2, 9).unwrap());
    }

    #[test]
    fn test_event_param_question() {
        let ex = extractor().extract("donation_click의 donation_name 보여줘", None, &ctx());
        assert_eq!(ex.modifiers.event_token.as_deref(), Some("donation_click"));
        assert!(ex
            .dimension_candidates
            .iter()
            .any(|c| c.name == "customEvent:donation_name"));
    }

    #[test]
    fn test_multi_metric_and_scope_split_inputs() {
        let ex = extractor().extract("총 매출과 상품별 매출 알려줘", None, &ctx());
        let names: Vec<&str> = ex.metric_candidates.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"purchaseRevenue"));
        assert!(names.contains(&"itemRevenue"));
        assert!(ex.modifiers.needs_total);
    }

    #[test]
    fn test_no_match_yields_empty() {
        let ex = extractor().extract("xyz zzz", None, &ctx());
        assert!(ex.metric_candidates.is_empty());
        assert!(ex.dimension_candidates.is_empty());
        assert!(CandidateExtractor::needs_llm_fallback(&ex));
    }

    #[test]
    fn test_followup_inheritance() {
        let state = ConversationState {
            metrics: vec!["purchaseRevenue".to_string()],
            dimensions: vec!["defaultChannelGroup".to_string()],
            ..Default::default()
        };
        let ex = extractor().extract("매출은 어때?", Some(&state), &ctx());
        assert!(ex.modifiers.needs_breakdown);
        let inherited = ex
            .dimension_candidates
            .iter()
            .find(|c| c.name == "defaultChannelGroup")
            .unwrap();
        assert_eq!(inherited.matched_by, MatchedBy::Inherited);
        assert!((inherited.score - 0.98).abs() < 1e-9);
    }

    #[test]
    fn test_llm_fallback_merge_rejects_unknown() {
        let mut ex = extractor().extract("xyz zzz", None, &ctx());
        let llm = LlmIntentResult {
            intent: Some("breakdown".to_string()),
            metrics: vec!["activeUsers".to_string(), "nonexistentMetric".to_string()],
            dimensions: vec!["채널".to_string()],
            limit: Some(10),
        };
        CandidateExtractor::apply_llm_fallback(&mut ex, &llm);
        assert_eq!(ex.metric_candidates.len(), 1);
        assert_eq!(ex.metric_candidates[0].name, "activeUsers");
        assert_eq!(ex.dimension_candidates[0].name, "defaultChannelGroup");
        assert_eq!(ex.intent, QuestionIntent::Breakdown);
        assert_eq!(ex.modifiers.limit, Some(10));
    }
}
