//! Nuri Library
//!
//! Korean natural-language analytics assistant: a question-to-query pipeline
//! over a hosted analytics property plus a deterministic NLQ engine over
//! uploaded tables.

use std::sync::Arc;

pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

#[cfg(test)]
mod tests;

pub use config::Config;
pub use services::{
    AnalyticsPipeline, CandidateExtractor, ChatService, FileEngine, LlmService, PlanExecutor,
    Planner, ResponseAdapter, SemanticIndex, SqliteConversationStore,
};

/// Application shared state
///
/// The type system is the DI container: every service is built once in main
/// and shared behind an Arc.
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ChatService>,
}
