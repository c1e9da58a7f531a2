//! Execution planner
//!
//! Converts candidates + inherited state into a deterministic, schema-valid
//! `ExecutionPlan`. The executor runs the plan exactly as written; no
//! inference happens downstream of this module. A block that would violate
//! scope rules is never emitted.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::services::analytics::ReportOrderBy;
use crate::services::extractor::{
    Candidate, DateContext, DateRange, Extraction, MatchedBy, Modifiers, QuestionIntent,
};
use crate::services::metadata::{self, FieldScope, DEFAULT_TIME_DIMENSION};
use crate::services::state_policy::ConversationState;
use crate::utils::unique_ordered;

const DIMENSION_SIGNAL_THRESHOLD: f64 = 0.60;
const TREND_DEFAULT_METRIC_SCORE: f64 = 0.86;
const DEFAULT_TOPN_LIMIT: u32 = 10;

static MONTH_MENTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2})월").unwrap());

/// Metric substitutions used when an event-scoped dimension pivot forces the
/// item metrics out
const ITEM_TO_EVENT_METRIC: &[(&str, &str)] = &[
    ("itemRevenue", "purchaseRevenue"),
    ("grossItemRevenue", "grossPurchaseRevenue"),
    ("itemsPurchased", "ecommercePurchases"),
    ("itemRefundAmount", "refundAmount"),
    ("itemsViewed", "screenPageViews"),
];

pub const CLARIFY_NO_METRIC_MESSAGE: &str = "질문에서 매칭 가능한 지표를 찾지 못했습니다. 사용 가능한 지표명(예: 활성 사용자, 세션, 구매 수익, 상품 수익)으로 다시 질문해 주세요.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Total,
    Breakdown,
    BreakdownTopn,
    Trend,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Total => "total",
            Self::Breakdown => "breakdown",
            Self::BreakdownTopn => "breakdown_topn",
            Self::Trend => "trend",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_filter: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub event_filters: Vec<String>,
}

impl BlockFilters {
    pub fn is_empty(&self) -> bool {
        self.event_filter.is_none() && self.event_filters.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanBlock {
    pub block_id: String,
    pub block_type: BlockType,
    pub scope: FieldScope,
    pub metrics: Vec<String>,
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub filters: BlockFilters,
    #[serde(default)]
    pub order_bys: Vec<ReportOrderBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    pub title: String,
}

/// Owned by the planner, read-only downstream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub property_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub intent: QuestionIntent,
    /// Adapter-time row cleanup request
    pub exclude_notset: bool,
    pub blocks: Vec<PlanBlock>,
}

#[derive(Debug, Clone)]
pub enum PlanOutcome {
    Plan(ExecutionPlan),
    Clarify(String),
}

pub struct Planner;

impl Planner {
    /// Build the plan. Same inputs always produce a byte-identical plan.
    pub fn build_plan(
        property_id: &str,
        question: &str,
        extraction: &Extraction,
        inherited_state: Option<&ConversationState>,
        ctx: &DateContext,
    ) -> PlanOutcome {
        let intent = extraction.intent;
        let modifiers = &extraction.modifiers;

        // ---- Step 1: date window -------------------------------------------
        let window = Self::resolve_dates(extraction.date_range, inherited_state, ctx);

        // ---- Step 2: metrics -----------------------------------------------
        let mut metrics =
            Self::resolve_metrics(question, intent, &extraction.metric_candidates, modifiers, inherited_state);

        // ---- Step 3: dimensions --------------------------------------------
        let mut dimensions = Self::initial_dimensions(&extraction.dimension_candidates, intent);

        // Inherited axis carries over unless the question names its own
        // breakdown (an explicit breakdown never keeps the old axis)
        if dimensions.is_empty() && intent != QuestionIntent::Breakdown {
            if let Some(state) = inherited_state {
                dimensions = state.dimensions.clone();
            }
        }

        if intent == QuestionIntent::CategoryList {
            dimensions = vec!["eventName".to_string()];
            if !metrics.iter().any(|m| m == "eventCount" || m == "totalUsers") {
                metrics = vec!["eventCount".to_string()];
            }
        }

        // Dimension pivot takes precedence: remap item metrics to their
        // event-scoped counterparts instead of dropping the axis.
        Self::remap_metrics_for_dimension_pivot(&mut metrics, &dimensions);

        if metrics.is_empty() {
            let dim_signal = strongest_dimension_signal(&extraction.dimension_candidates);
            if dim_signal < DIMENSION_SIGNAL_THRESHOLD && dimensions.is_empty() {
                return PlanOutcome::Clarify(CLARIFY_NO_METRIC_MESSAGE.to_string());
            }
            metrics = vec![Self::default_metric_for_dimensions(&dimensions, modifiers)];
        }

        let metric_scopes: Vec<FieldScope> = unique_ordered(
            metrics.iter().map(|m| metadata::metric_scope(m)).collect(),
        );

        // Scope-compatibility filter; time dimensions ride along for trends
        dimensions.retain(|d| {
            metadata::is_time_dimension(d) || metric_scopes.contains(&metadata::dimension_scope(d))
        });

        if intent == QuestionIntent::Trend {
            Self::force_leading_time_dimension(&mut dimensions);
        }
        if intent == QuestionIntent::Comparison && Self::mentions_two_months(question) {
            dimensions.retain(|d| !metadata::is_time_dimension(d));
            dimensions.insert(0, "yearMonth".to_string());
        }

        // Explicit two-event comparison pivots on eventName
        if modifiers.event_pair.is_some() && !dimensions.iter().any(|d| d == "eventName") {
            dimensions.insert(0, "eventName".to_string());
        }

        // ---- Steps 4-7: blocks ---------------------------------------------
        let blocks = Self::build_blocks(intent, &metrics, &dimensions, modifiers);

        if blocks.is_empty() {
            return PlanOutcome::Clarify(CLARIFY_NO_METRIC_MESSAGE.to_string());
        }

        PlanOutcome::Plan(ExecutionPlan {
            property_id: property_id.to_string(),
            start_date: window.start_date,
            end_date: window.end_date,
            intent,
            exclude_notset: modifiers.exclude_notset,
            blocks,
        })
    }

    fn resolve_dates(
        date_range: Option<DateRange>,
        inherited_state: Option<&ConversationState>,
        ctx: &DateContext,
    ) -> DateRange {
        if let Some(range) = date_range {
            return range;
        }
        if let Some(state) = inherited_state {
            if let (Some(start), Some(end)) = (state.start_date, state.end_date) {
                return DateRange::new(start, end);
            }
        }
        ctx.default_window()
    }

    fn resolve_metrics(
        question: &str,
        intent: QuestionIntent,
        candidates: &[Candidate],
        modifiers: &Modifiers,
        inherited_state: Option<&ConversationState>,
    ) -> Vec<String> {
        let mut usable: Vec<&Candidate> = candidates.iter().filter(|c| !c.needs_clarify).collect();

        if let Some(hint) = modifiers.scope_hint {
            let hinted: Vec<&Candidate> =
                usable.iter().copied().filter(|c| c.scope == hint).collect();
            if !hinted.is_empty() {
                usable = hinted;
            }
        }

        let mut metrics: Vec<String> =
            unique_ordered(usable.iter().map(|c| c.name.clone()).collect());

        if metrics.is_empty() && modifiers.needs_breakdown {
            if let Some(state) = inherited_state {
                metrics = state.metrics.clone();
            }
        }

        if metrics.is_empty() && intent == QuestionIntent::Trend {
            let q = question.to_lowercase();
            if ["사용자", "유저", "세션", "추이", "일별", "흐름"].iter().any(|k| q.contains(k)) {
                tracing::debug!(
                    "Trend question without metric, defaulting to activeUsers (score {})",
                    TREND_DEFAULT_METRIC_SCORE
                );
                metrics.push("activeUsers".to_string());
            }
        }

        metrics
    }

    fn initial_dimensions(candidates: &[Candidate], intent: QuestionIntent) -> Vec<String> {
        let usable = candidates
            .iter()
            .filter(|c| !c.needs_clarify)
            .filter(|c| {
                // Mid-confidence semantic dims only drive explicit breakdowns
                c.matched_by != MatchedBy::SemanticMid || intent == QuestionIntent::Breakdown
            })
            .map(|c| c.name.clone())
            .collect();
        unique_ordered(usable)
    }

    /// When every requested dimension is incompatible with the chosen metric
    /// scopes, the dimensions win: item metrics are substituted with their
    /// event equivalents ("채널별로" after an item-revenue turn).
    fn remap_metrics_for_dimension_pivot(metrics: &mut Vec<String>, dimensions: &[String]) {
        if metrics.is_empty() || dimensions.is_empty() {
            return;
        }
        let metric_scopes: Vec<FieldScope> =
            metrics.iter().map(|m| metadata::metric_scope(m)).collect();
        let all_incompatible = dimensions
            .iter()
            .filter(|d| !metadata::is_time_dimension(d))
            .all(|d| !metric_scopes.contains(&metadata::dimension_scope(d)));
        let has_real_dimension =
            dimensions.iter().any(|d| !metadata::is_time_dimension(d));

        if !all_incompatible || !has_real_dimension {
            return;
        }

        let remapped: Vec<String> = metrics
            .iter()
            .filter_map(|m| {
                if metadata::metric_scope(m) != FieldScope::Item {
                    return Some(m.clone());
                }
                ITEM_TO_EVENT_METRIC
                    .iter()
                    .find(|(item, _)| *item == m.as_str())
                    .map(|(_, event)| event.to_string())
            })
            .collect();

        if !remapped.is_empty() {
            tracing::debug!("Dimension pivot remapped metrics {:?} -> {:?}", metrics, remapped);
            *metrics = unique_ordered(remapped);
        }
    }

    fn default_metric_for_dimensions(dimensions: &[String], modifiers: &Modifiers) -> String {
        let event_param_pivot = modifiers.event_token.is_some()
            || dimensions
                .iter()
                .any(|d| d == "eventName" || d.starts_with("customEvent:"));
        if event_param_pivot {
            "eventCount".to_string()
        } else {
            metadata::DEFAULT_METRIC.to_string()
        }
    }

    fn force_leading_time_dimension(dimensions: &mut Vec<String>) {
        // An explicitly asked coarser grain (week/month) wins over daily
        let time_dim = dimensions
            .iter()
            .find(|d| metadata::is_time_dimension(d))
            .cloned()
            .unwrap_or_else(|| DEFAULT_TIME_DIMENSION.to_string());
        dimensions.retain(|d| !metadata::is_time_dimension(d));
        dimensions.insert(0, time_dim);
    }

    fn mentions_two_months(question: &str) -> bool {
        MONTH_MENTION_RE.captures_iter(question).count() >= 2
    }

    fn build_blocks(
        intent: QuestionIntent,
        metrics: &[String],
        dimensions: &[String],
        modifiers: &Modifiers,
    ) -> Vec<PlanBlock> {
        let mut blocks = Vec::new();

        // Scope split: one block per metric scope, event scope first
        let mut scopes: Vec<FieldScope> =
            unique_ordered(metrics.iter().map(|m| metadata::metric_scope(m)).collect());
        scopes.sort_by_key(|s| match s {
            FieldScope::Event => 0,
            FieldScope::Item => 1,
            FieldScope::User => 2,
        });

        // A requested total always reports over event-scoped metrics only
        if modifiers.needs_total {
            let event_metrics: Vec<String> = metrics
                .iter()
                .filter(|m| metadata::metric_scope(m) == FieldScope::Event)
                .cloned()
                .collect();
            if !event_metrics.is_empty() {
                blocks.push(Self::total_block(event_metrics, blocks.len()));
            }
        }

        for scope in scopes {
            let scoped_metrics: Vec<String> = metrics
                .iter()
                .filter(|m| metadata::metric_scope(m) == scope)
                .cloned()
                .collect();
            let mut scoped_dims: Vec<String> = dimensions
                .iter()
                .filter(|d| {
                    metadata::is_time_dimension(d) || metadata::dimension_scope(d) == scope
                })
                .cloned()
                .collect();

            // Item-scope breakdowns default to the item axis
            if scope == FieldScope::Item
                && !scoped_dims.iter().any(|d| !metadata::is_time_dimension(d))
                && intent != QuestionIntent::Trend
            {
                scoped_dims.push("itemName".to_string());
            }

            if scoped_dims.is_empty() {
                // Without an axis the only valid answer is a total; skip when
                // one was already emitted for these metrics.
                if !modifiers.needs_total || scope != FieldScope::Event {
                    blocks.push(Self::total_block(scoped_metrics, blocks.len()));
                }
                continue;
            }

            let block_type = match intent {
                QuestionIntent::Trend => BlockType::Trend,
                QuestionIntent::TopN => BlockType::BreakdownTopn,
                _ => BlockType::Breakdown,
            };

            let primary_metric = scoped_metrics[0].clone();
            let (order_bys, limit) = match block_type {
                BlockType::Trend => (
                    vec![ReportOrderBy::Dimension { name: scoped_dims[0].clone(), desc: false }],
                    None,
                ),
                BlockType::BreakdownTopn => (
                    vec![ReportOrderBy::Metric { name: primary_metric.clone(), desc: true }],
                    Some(modifiers.limit.unwrap_or(DEFAULT_TOPN_LIMIT)),
                ),
                _ => (
                    vec![ReportOrderBy::Metric { name: primary_metric.clone(), desc: true }],
                    modifiers.limit,
                ),
            };

            let filters = Self::block_filters(scope, &scoped_metrics, &scoped_dims, modifiers);

            let index = blocks.len();
            let block = PlanBlock {
                block_id: format!("{}_{}_{}", block_type.as_str(), scope.as_str(), index),
                block_type,
                scope,
                title: Self::block_title(block_type, &primary_metric, &scoped_dims),
                metrics: scoped_metrics,
                dimensions: scoped_dims,
                filters,
                order_bys,
                limit,
            };

            if Self::is_valid(&block) {
                blocks.push(block);
            } else {
                tracing::warn!("Dropping invalid block candidate: {}", block.block_id);
            }
        }

        blocks
    }

    fn total_block(metrics: Vec<String>, index: usize) -> PlanBlock {
        let scope = metrics
            .first()
            .map(|m| metadata::metric_scope(m))
            .unwrap_or(FieldScope::Event);
        PlanBlock {
            block_id: format!("total_{}_{}", scope.as_str(), index),
            block_type: BlockType::Total,
            scope,
            metrics,
            dimensions: Vec::new(),
            filters: BlockFilters::default(),
            order_bys: Vec::new(),
            limit: None,
            title: "전체 지표 요약".to_string(),
        }
    }

    fn block_filters(
        scope: FieldScope,
        metrics: &[String],
        dimensions: &[String],
        modifiers: &Modifiers,
    ) -> BlockFilters {
        let mut filters = BlockFilters::default();
        if scope != FieldScope::Event {
            return filters;
        }
        let all_event_scoped =
            metrics.iter().all(|m| metadata::metric_scope(m) == FieldScope::Event);
        if !all_event_scoped {
            return filters;
        }

        // Two explicitly named events: keep both, pivot on eventName
        if let Some((a, b)) = &modifiers.event_pair {
            filters.event_filters = vec![a.clone(), b.clone()];
            return filters;
        }

        let has_custom_param_dim = dimensions.iter().any(|d| d.starts_with("customEvent:"));
        if has_custom_param_dim {
            if let Some(event) = &modifiers.event_token {
                filters.event_filter = Some(event.clone());
            }
        }
        filters
    }

    fn block_title(block_type: BlockType, primary_metric: &str, dimensions: &[String]) -> String {
        let metric_ui = metadata::ui_name(primary_metric);
        match block_type {
            BlockType::Total => "전체 지표 요약".to_string(),
            BlockType::Trend => format!("{} 추이", metric_ui),
            _ => {
                let axis = dimensions
                    .iter()
                    .find(|d| !metadata::is_time_dimension(d))
                    .or_else(|| dimensions.first());
                match axis {
                    Some(dim) => format!("{}별 {}", metadata::ui_name(dim), metric_ui),
                    None => metric_ui,
                }
            },
        }
    }

    /// Schema validity: the invariants every emitted block must satisfy
    fn is_valid(block: &PlanBlock) -> bool {
        if block.metrics.is_empty() {
            return false;
        }
        match block.block_type {
            BlockType::Total => block.dimensions.is_empty(),
            BlockType::Trend => {
                block
                    .dimensions
                    .first()
                    .map(|d| metadata::is_time_dimension(d))
                    .unwrap_or(false)
                    && block.dimensions.iter().filter(|d| metadata::is_time_dimension(d)).count()
                        == 1
            },
            _ => {
                let scope_ok = block.dimensions.iter().all(|d| {
                    metadata::is_time_dimension(d)
                        || metadata::dimension_scope(d) == block.scope
                });
                let filter_ok = block.filters.is_empty()
                    || block
                        .metrics
                        .iter()
                        .all(|m| metadata::metric_scope(m) == FieldScope::Event);
                scope_ok && filter_ok && !block.dimensions.is_empty()
            },
        }
    }
}

fn strongest_dimension_signal(candidates: &[Candidate]) -> f64 {
    candidates
        .iter()
        .filter(|c| !c.needs_clarify)
        .map(|c| c.score)
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::extractor::CandidateExtractor;
    use crate::services::semantic::SemanticIndex;
    use std::sync::Arc;

    fn ctx() -> DateContext {
        DateContext::new(NaiveDate::from_ymd_opt(2026, 2, 18).unwrap())
    }

    fn plan_for(question: &str, state: Option<&ConversationState>) -> PlanOutcome {
        let extractor = CandidateExtractor::new(Some(Arc::new(SemanticIndex::from_registry())));
        let extraction = extractor.extract(question, state, &ctx());
        Planner::build_plan("360000", question, &extraction, state, &ctx())
    }

    fn expect_plan(outcome: PlanOutcome) -> ExecutionPlan {
        match outcome {
            PlanOutcome::Plan(plan) => plan,
            PlanOutcome::Clarify(msg) => panic!("expected plan, got clarify: {}", msg),
        }
    }

    #[test]
    fn test_total_revenue_plan() {
        let plan = expect_plan(plan_for("총 매출 알려줘", None));
        assert_eq!(plan.blocks.len(), 1);
        let block = &plan.blocks[0];
        assert_eq!(block.block_type, BlockType::Total);
        assert_eq!(block.metrics, vec!["purchaseRevenue".to_string()]);
        assert!(block.dimensions.is_empty());
    }

    #[test]
    fn test_trend_plan() {
        let plan = expect_plan(plan_for("지난주 사용자 추이 알려줘", None));
        assert_eq!(plan.intent, QuestionIntent::Trend);
        let block = &plan.blocks[0];
        assert_eq!(block.block_type, BlockType::Trend);
        assert_eq!(block.dimensions[0], "date");
        assert_eq!(block.metrics, vec!["activeUsers".to_string()]);
        assert_eq!(plan.start_date, NaiveDate::from_ymd_opt(2026, 2, 9).unwrap());
        assert_eq!(plan.end_date, NaiveDate::from_ymd_opt(2026, 2, 15).unwrap());
        assert!(matches!(
            block.order_bys[0],
            ReportOrderBy::Dimension { ref name, desc: false } if name == "date"
        ));
    }

    #[test]
    fn test_event_param_filter_plan() {
        let plan = expect_plan(plan_for("donation_click의 donation_name 보여줘", None));
        let block = &plan.blocks[0];
        assert_eq!(block.dimensions, vec!["customEvent:donation_name".to_string()]);
        assert_eq!(block.metrics, vec!["eventCount".to_string()]);
        assert_eq!(block.filters.event_filter.as_deref(), Some("donation_click"));
    }

    #[test]
    fn test_relative_shift_plan() {
        let state = ConversationState {
            metrics: vec!["activeUsers".to_string()],
            start_date: NaiveDate::from_ymd_opt(2026, 2, 9),
            end_date: NaiveDate::from_ymd_opt(2026, 2, 15),
            ..Default::default()
        };
        let plan = expect_plan(plan_for("그 전주 사용자는?", Some(&state)));
        assert_eq!(plan.intent, QuestionIntent::Comparison);
        assert_eq!(plan.start_date, NaiveDate::from_ymd_opt(2026, 2, 2).unwrap());
        assert_eq!(plan.end_date, NaiveDate::from_ymd_opt(2026, 2, 8).unwrap());
    }

    #[test]
    fn test_multi_scope_split_plan() {
        let plan = expect_plan(plan_for("총 매출과 상품별 매출 알려줘", None));
        assert_eq!(plan.blocks.len(), 2);
        assert_eq!(plan.blocks[0].block_type, BlockType::Total);
        assert_eq!(plan.blocks[0].metrics, vec!["purchaseRevenue".to_string()]);
        let item_block = &plan.blocks[1];
        assert_eq!(item_block.scope, FieldScope::Item);
        assert_eq!(item_block.metrics, vec!["itemRevenue".to_string()]);
        assert_eq!(item_block.dimensions, vec!["itemName".to_string()]);
    }

    #[test]
    fn test_clarify_on_no_match() {
        match plan_for("xyz zzz", None) {
            PlanOutcome::Clarify(msg) => assert!(msg.contains("지표")),
            PlanOutcome::Plan(_) => panic!("expected clarify"),
        }
    }

    #[test]
    fn test_topn_block() {
        let plan = expect_plan(plan_for("상품별 매출 10위까지 보여줘", None));
        let topn = plan
            .blocks
            .iter()
            .find(|b| b.block_type == BlockType::BreakdownTopn)
            .expect("topn block");
        assert_eq!(topn.limit, Some(10));
        assert!(matches!(
            topn.order_bys[0],
            ReportOrderBy::Metric { desc: true, .. }
        ));
    }

    #[test]
    fn test_dimension_pivot_remaps_item_metrics() {
        let state = ConversationState {
            metrics: vec!["itemRevenue".to_string()],
            dimensions: vec!["itemName".to_string()],
            ..Default::default()
        };
        let plan = expect_plan(plan_for("채널별로 보여줘", Some(&state)));
        let block = plan
            .blocks
            .iter()
            .find(|b| b.dimensions.contains(&"defaultChannelGroup".to_string()))
            .expect("channel block");
        assert!(block.metrics.iter().all(|m| metadata::metric_scope(m) == FieldScope::Event));
    }

    #[test]
    fn test_determinism() {
        let a = expect_plan(plan_for("채널별 세션 보여줘", None));
        let b = expect_plan(plan_for("채널별 세션 보여줘", None));
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }

    #[test]
    fn test_all_blocks_satisfy_invariants() {
        for question in [
            "총 매출 알려줘",
            "지난주 사용자 추이 알려줘",
            "채널별 세션 보여줘",
            "상품별 매출 10위까지 보여줘",
            "총 매출과 상품별 매출 알려줘",
            "무슨 이벤트 종류가 있어?",
        ] {
            if let PlanOutcome::Plan(plan) = plan_for(question, None) {
                for block in &plan.blocks {
                    assert!(Planner::is_valid(block), "invalid block for {:?}: {:?}", question, block);
                }
            }
        }
    }
}
