//! LLM port
//!
//! The pipeline treats the LLM as a narrow pluggable port with three calls:
//! relation classification, intent-extraction fallback and free-text insight
//! polish. Each caller owns its fallback; no caller may fail the turn because
//! the port did.

pub mod client;
pub mod fake;
pub mod models;

use async_trait::async_trait;

use crate::services::extractor::LlmIntentResult;
use crate::services::metadata::{DIMENSIONS, METRICS};

pub use client::{LlmClient, LlmClientConfig};
pub use fake::FixtureLlm;
pub use models::{LlmError, RelationContext, RelationReply};

/// The two structured calls plus free-text polish
#[async_trait]
pub trait LlmPort: Send + Sync {
    /// Whether the port is configured and worth calling
    fn is_available(&self) -> bool;

    /// Classify how the question relates to the previous state.
    /// Must return one of refine|new_topic|metric_switch|dimension_switch.
    async fn classify_relation(&self, ctx: &RelationContext) -> Result<RelationReply, LlmError>;

    /// Fallback intent extraction when the deterministic extractor found no
    /// usable metric. Names are resolved through the registry by the caller.
    async fn extract_intent(&self, question: &str) -> Result<LlmIntentResult, LlmError>;

    /// Free-text Korean insight for the file engine
    async fn generate_insight(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Real implementation over one OpenAI-compatible endpoint
pub struct LlmService {
    client: LlmClient,
    enabled: bool,
}

impl LlmService {
    pub fn new(config: LlmClientConfig, enabled: bool) -> Self {
        Self { client: LlmClient::new(config), enabled }
    }
}

#[async_trait]
impl LlmPort for LlmService {
    fn is_available(&self) -> bool {
        self.enabled
    }

    async fn classify_relation(&self, ctx: &RelationContext) -> Result<RelationReply, LlmError> {
        if !self.enabled {
            return Err(LlmError::Disabled);
        }

        let system = "문맥 관계 분류기. JSON으로만 {\"relation\":\"refine|new_topic|metric_switch|dimension_switch\"} 형태로 출력.";
        let user = format!(
            "last_state metrics={:?} dims={:?}\ndelta metrics={:?} dims={:?}\nquestion={}",
            ctx.last_metrics, ctx.last_dimensions, ctx.delta_metrics, ctx.delta_dimensions,
            ctx.question
        );
        self.client.chat_json(system, &user).await
    }

    async fn extract_intent(&self, question: &str) -> Result<LlmIntentResult, LlmError> {
        if !self.enabled {
            return Err(LlmError::Disabled);
        }

        let metric_keys: Vec<&str> = METRICS.iter().map(|d| d.key).collect();
        let dimension_keys: Vec<&str> = DIMENSIONS.iter().map(|d| d.key).collect();

        let system = "너는 분석 질의 파서다. 반드시 JSON으로만 응답해라.";
        let user = format!(
            "형식:\n{{\"intent\": \"metric_single|metric_multi|breakdown|topn|comparison|trend\", \
             \"metrics\": [\"...\"], \"dimensions\": [\"...\"], \"limit\": null}}\n\n\
             사용 가능한 metrics:\n{:?}\n\n사용 가능한 dimensions:\n{:?}\n\n질문:\n{}",
            metric_keys, dimension_keys, question
        );
        self.client.chat_json(system, &user).await
    }

    async fn generate_insight(&self, prompt: &str) -> Result<String, LlmError> {
        if !self.enabled {
            return Err(LlmError::Disabled);
        }
        self.client
            .chat_text("너는 데이터 분석 도우미다. 한국어로 간결하게 답한다.", prompt, false)
            .await
    }
}
