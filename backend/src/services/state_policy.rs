//! Conversation state and the relation-based inheritance policy
//!
//! The state is the anchor block of the previous successful turn. The policy
//! table decides which slots survive into planning:
//!
//! | relation         | metrics | dimensions | dates |
//! |------------------|---------|------------|-------|
//! | refine           | keep    | keep       | keep  |
//! | metric_switch    | drop    | keep       | keep  |
//! | dimension_switch | keep    | drop       | keep  |
//! | new_topic        | drop    | drop       | keep  |
//!
//! Dates always survive; date intent belongs to the extractor.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::extractor::{DateRange, QuestionIntent};
use super::relation::Relation;

/// Last successful state per (conversation, source); overwritten whole on
/// each successful turn, never partially.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub dimensions: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub intent: Option<QuestionIntent>,
    pub scope_type: Option<String>,
    pub last_entity: Option<String>,
    pub event_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub periods: Vec<DateRange>,
}

/// Apply the inheritance table before the planner reads the state
pub fn apply_relation_policy(
    last_state: Option<ConversationState>,
    relation: Relation,
) -> Option<ConversationState> {
    let mut state = last_state?;

    let (inherit_metrics, inherit_dimensions) = match relation {
        Relation::Refine => (true, true),
        Relation::MetricSwitch => (false, true),
        Relation::DimensionSwitch => (true, false),
        Relation::NewTopic => (false, false),
    };

    if !inherit_metrics {
        state.metrics.clear();
    }
    if !inherit_dimensions {
        state.dimensions.clear();
        state.event_filter = None;
    }

    Some(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ConversationState {
        ConversationState {
            metrics: vec!["purchaseRevenue".to_string()],
            dimensions: vec!["defaultChannelGroup".to_string()],
            start_date: NaiveDate::from_ymd_opt(2026, 2, 9),
            end_date: NaiveDate::from_ymd_opt(2026, 2, 15),
            event_filter: Some("donation_click".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_refine_keeps_all() {
        let out = apply_relation_policy(Some(state()), Relation::Refine).unwrap();
        assert!(!out.metrics.is_empty());
        assert!(!out.dimensions.is_empty());
        assert!(out.start_date.is_some());
    }

    #[test]
    fn test_metric_switch_drops_metrics() {
        let out = apply_relation_policy(Some(state()), Relation::MetricSwitch).unwrap();
        assert!(out.metrics.is_empty());
        assert!(!out.dimensions.is_empty());
    }

    #[test]
    fn test_dimension_switch_drops_dimensions() {
        let out = apply_relation_policy(Some(state()), Relation::DimensionSwitch).unwrap();
        assert!(!out.metrics.is_empty());
        assert!(out.dimensions.is_empty());
        assert!(out.event_filter.is_none());
    }

    #[test]
    fn test_new_topic_keeps_dates_only() {
        let out = apply_relation_policy(Some(state()), Relation::NewTopic).unwrap();
        assert!(out.metrics.is_empty());
        assert!(out.dimensions.is_empty());
        assert!(out.start_date.is_some());
        assert!(out.end_date.is_some());
    }

    #[test]
    fn test_none_stays_none() {
        assert!(apply_relation_policy(None, Relation::Refine).is_none());
    }
}
