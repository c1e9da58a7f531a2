//! LLM port data models

use serde::{Deserialize, Serialize};

/// Context handed to the relation classifier prompt
#[derive(Debug, Clone, Serialize)]
pub struct RelationContext {
    pub question: String,
    pub last_metrics: Vec<String>,
    pub last_dimensions: Vec<String>,
    pub delta_metrics: Vec<String>,
    pub delta_dimensions: Vec<String>,
}

/// Strict JSON contract of the relation call
#[derive(Debug, Clone, Deserialize)]
pub struct RelationReply {
    pub relation: String,
}

/// LLM port errors
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM service disabled")]
    Disabled,

    #[error("LLM API error: {0}")]
    ApiError(String),

    #[error("LLM response parsing error: {0}")]
    ParseError(String),

    #[error("LLM timeout after {0}s")]
    Timeout(u64),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::ApiError(_))
    }
}
