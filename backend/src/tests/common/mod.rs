// Common test utilities and helpers

use chrono::NaiveDate;
use std::sync::Arc;

use crate::db::create_test_pool;
use crate::services::analytics::FixtureAnalytics;
use crate::services::extractor::DateContext;
use crate::services::llm::FixtureLlm;
use crate::services::pipeline::AnalyticsPipeline;
use crate::services::semantic::SemanticIndex;
use crate::services::store::SqliteConversationStore;

pub const TEST_PROPERTY: &str = "360000";

/// Reference date for every scenario: 2026-02-18 (a Wednesday)
pub fn test_date_context() -> DateContext {
    DateContext::new(NaiveDate::from_ymd_opt(2026, 2, 18).unwrap())
}

pub struct TestHarness {
    pub pipeline: AnalyticsPipeline,
    pub analytics: Arc<FixtureAnalytics>,
    pub llm: Arc<FixtureLlm>,
    pub store: Arc<SqliteConversationStore>,
}

/// Pipeline wired to fixtures; the whole flow is deterministic
pub async fn create_test_pipeline(llm: FixtureLlm) -> TestHarness {
    let analytics = Arc::new(FixtureAnalytics::with_default_metadata());
    let llm = Arc::new(llm);
    let store = Arc::new(SqliteConversationStore::new(create_test_pool().await));
    let semantic = Arc::new(SemanticIndex::from_registry());

    let pipeline =
        AnalyticsPipeline::new(semantic, llm.clone(), analytics.clone(), store.clone());

    TestHarness { pipeline, analytics, llm, store }
}
