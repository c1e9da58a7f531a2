//! Fixture LLM used by the test suite and by deployments without an endpoint
//!
//! Returns canned replies so the whole pipeline stays deterministic.

use async_trait::async_trait;
use std::sync::Mutex;

use super::models::{LlmError, RelationContext, RelationReply};
use super::LlmPort;
use crate::services::extractor::LlmIntentResult;

/// Fixture port: preset relation plus optional canned intent/insight
pub struct FixtureLlm {
    relation: Mutex<String>,
    intent: Mutex<Option<LlmIntentResult>>,
    insight: Option<String>,
    fail: bool,
}

impl FixtureLlm {
    pub fn returning_relation(relation: &str) -> Self {
        Self {
            relation: Mutex::new(relation.to_string()),
            intent: Mutex::new(None),
            insight: None,
            fail: false,
        }
    }

    /// Every call errors; exercises the new_topic / skip fallbacks
    pub fn failing() -> Self {
        Self {
            relation: Mutex::new("refine".to_string()),
            intent: Mutex::new(None),
            insight: None,
            fail: true,
        }
    }

    pub fn with_intent(self, intent: LlmIntentResult) -> Self {
        *self.intent.lock().expect("fixture lock poisoned") = Some(intent);
        self
    }

    pub fn with_insight(mut self, insight: &str) -> Self {
        self.insight = Some(insight.to_string());
        self
    }

    pub fn set_relation(&self, relation: &str) {
        *self.relation.lock().expect("fixture lock poisoned") = relation.to_string();
    }
}

#[async_trait]
impl LlmPort for FixtureLlm {
    fn is_available(&self) -> bool {
        !self.fail
    }

    async fn classify_relation(&self, _ctx: &RelationContext) -> Result<RelationReply, LlmError> {
        if self.fail {
            return Err(LlmError::ApiError("fixture failure".to_string()));
        }
        let relation = self.relation.lock().expect("fixture lock poisoned").clone();
        Ok(RelationReply { relation })
    }

    async fn extract_intent(&self, _question: &str) -> Result<LlmIntentResult, LlmError> {
        if self.fail {
            return Err(LlmError::ApiError("fixture failure".to_string()));
        }
        self.intent
            .lock()
            .expect("fixture lock poisoned")
            .clone()
            .ok_or_else(|| LlmError::ApiError("no fixture intent".to_string()))
    }

    async fn generate_insight(&self, _prompt: &str) -> Result<String, LlmError> {
        if self.fail {
            return Err(LlmError::ApiError("fixture failure".to_string()));
        }
        self.insight
            .clone()
            .ok_or_else(|| LlmError::ApiError("no fixture insight".to_string()))
    }
}
