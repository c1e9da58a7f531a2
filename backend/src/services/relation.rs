//! Conversational relation classification
//!
//! Decides how the current question relates to the previous state. The LLM
//! port makes the call; anything unexpected falls back to `NewTopic`, the
//! safe default that inherits nothing but dates.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::extractor::Extraction;
use super::llm::{LlmPort, RelationContext};
use super::state_policy::ConversationState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Refine,
    NewTopic,
    MetricSwitch,
    DimensionSwitch,
}

impl Relation {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "refine" => Some(Self::Refine),
            "new_topic" => Some(Self::NewTopic),
            "metric_switch" => Some(Self::MetricSwitch),
            "dimension_switch" => Some(Self::DimensionSwitch),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Refine => "refine",
            Self::NewTopic => "new_topic",
            Self::MetricSwitch => "metric_switch",
            Self::DimensionSwitch => "dimension_switch",
        }
    }
}

pub struct RelationClassifier {
    llm: Arc<dyn LlmPort>,
}

impl RelationClassifier {
    pub fn new(llm: Arc<dyn LlmPort>) -> Self {
        Self { llm }
    }

    pub async fn classify(
        &self,
        question: &str,
        last_state: Option<&ConversationState>,
        delta: &Extraction,
    ) -> Relation {
        // No prior state: nothing to inherit either way
        let Some(last) = last_state else {
            return Relation::NewTopic;
        };
        if !self.llm.is_available() {
            return Relation::NewTopic;
        }

        let ctx = RelationContext {
            question: question.to_string(),
            last_metrics: last.metrics.clone(),
            last_dimensions: last.dimensions.clone(),
            delta_metrics: delta.metric_candidates.iter().map(|c| c.name.clone()).collect(),
            delta_dimensions: delta.dimension_candidates.iter().map(|c| c.name.clone()).collect(),
        };

        match self.llm.classify_relation(&ctx).await {
            Ok(reply) => match Relation::parse(&reply.relation) {
                Some(relation) => relation,
                None => {
                    tracing::warn!("Relation classifier returned unknown value: {}", reply.relation);
                    Relation::NewTopic
                },
            },
            Err(e) => {
                tracing::warn!("Relation classifier fallback: {}", e);
                Relation::NewTopic
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::extractor::{CandidateExtractor, DateContext};
    use crate::services::llm::FixtureLlm;
    use chrono::NaiveDate;

    fn delta(question: &str) -> Extraction {
        let extractor = CandidateExtractor::new(None);
        let ctx = DateContext::new(NaiveDate::from_ymd_opt(2026, 2, 18).unwrap());
        extractor.extract(question, None, &ctx)
    }

    fn state() -> ConversationState {
        ConversationState {
            metrics: vec!["purchaseRevenue".to_string()],
            dimensions: vec!["defaultChannelGroup".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_valid_relation_passes_through() {
        let classifier = RelationClassifier::new(Arc::new(FixtureLlm::returning_relation("refine")));
        let relation = classifier.classify("채널별 매출", Some(&state()), &delta("채널별 매출")).await;
        assert_eq!(relation, Relation::Refine);
    }

    #[tokio::test]
    async fn test_unknown_value_falls_back() {
        let classifier =
            RelationClassifier::new(Arc::new(FixtureLlm::returning_relation("sideways")));
        let relation = classifier.classify("매출", Some(&state()), &delta("매출")).await;
        assert_eq!(relation, Relation::NewTopic);
    }

    #[tokio::test]
    async fn test_llm_error_falls_back() {
        let classifier = RelationClassifier::new(Arc::new(FixtureLlm::failing()));
        let relation = classifier.classify("매출", Some(&state()), &delta("매출")).await;
        assert_eq!(relation, Relation::NewTopic);
    }

    #[tokio::test]
    async fn test_no_last_state_is_new_topic() {
        let classifier = RelationClassifier::new(Arc::new(FixtureLlm::returning_relation("refine")));
        let relation = classifier.classify("매출", None, &delta("매출")).await;
        assert_eq!(relation, Relation::NewTopic);
    }
}
