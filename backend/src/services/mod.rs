pub mod adapter;
pub mod analytics;
pub mod executor;
pub mod extractor;
pub mod file_engine;
pub mod llm;
pub mod metadata;
pub mod pipeline;
pub mod planner;
pub mod relation;
pub mod router;
pub mod semantic;
pub mod state_policy;
pub mod store;

pub use adapter::ResponseAdapter;
pub use analytics::{AnalyticsClient, AnalyticsPort};
pub use executor::PlanExecutor;
pub use extractor::CandidateExtractor;
pub use file_engine::FileEngine;
pub use llm::{LlmPort, LlmService};
pub use pipeline::AnalyticsPipeline;
pub use planner::Planner;
pub use relation::RelationClassifier;
pub use router::ChatService;
pub use semantic::SemanticIndex;
pub use store::{ConversationStore, SqliteConversationStore};
