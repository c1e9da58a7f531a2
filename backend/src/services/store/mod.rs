//! Conversation store
//!
//! Key/value persistence on `(conversation_id, source)` pairs. Each state
//! write replaces the whole row atomically, so a later turn can never
//! observe a half-written state. Writes for the same conversation are
//! serialized through a per-key async lock; `ga4` and `file` sources are
//! independent keys.

use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tokio::sync::Mutex;

use serde::{Deserialize, Serialize};

pub const SOURCE_ANALYTICS: &str = "ga4";
pub const SOURCE_FILE: &str = "file";

/// Active routing context of one conversation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationContext {
    pub active_source: Option<String>,
    pub property_id: Option<String>,
    pub file_path: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn load_state(
        &self,
        conversation_id: &str,
        source: &str,
    ) -> Result<Option<serde_json::Value>, StoreError>;

    async fn save_state(
        &self,
        conversation_id: &str,
        source: &str,
        state: &serde_json::Value,
    ) -> Result<(), StoreError>;

    async fn load_last_result(
        &self,
        conversation_id: &str,
        source: &str,
    ) -> Result<Option<serde_json::Value>, StoreError>;

    async fn save_last_result(
        &self,
        conversation_id: &str,
        source: &str,
        result: &serde_json::Value,
    ) -> Result<(), StoreError>;

    async fn load_context(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationContext>, StoreError>;

    async fn save_context(
        &self,
        conversation_id: &str,
        context: &ConversationContext,
    ) -> Result<(), StoreError>;

    async fn get_events(&self, property_id: &str) -> Result<Vec<String>, StoreError>;

    async fn save_events(&self, property_id: &str, events: &[String]) -> Result<(), StoreError>;
}

/// SQLite-backed store
pub struct SqliteConversationStore {
    pool: SqlitePool,
    write_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SqliteConversationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool, write_locks: DashMap::new() }
    }

    fn lock_for(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        let entry = self
            .write_locks
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())));
        Arc::clone(entry.value())
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn load_state(
        &self,
        conversation_id: &str,
        source: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        let row = sqlx::query(
            "SELECT state_json FROM states WHERE conversation_id = ? AND source = ?",
        )
        .bind(conversation_id)
        .bind(source)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let json: String = row.get("state_json");
                Ok(Some(serde_json::from_str(&json)?))
            },
            None => Ok(None),
        }
    }

    async fn save_state(
        &self,
        conversation_id: &str,
        source: &str,
        state: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let lock = self.lock_for(conversation_id);
        let _guard = lock.lock().await;

        sqlx::query(
            r#"INSERT OR REPLACE INTO states (conversation_id, source, state_json, updated_at)
               VALUES (?, ?, ?, CURRENT_TIMESTAMP)"#,
        )
        .bind(conversation_id)
        .bind(source)
        .bind(serde_json::to_string(state)?)
        .execute(&self.pool)
        .await?;

        tracing::debug!("State saved: conv={}, source={}", conversation_id, source);
        Ok(())
    }

    async fn load_last_result(
        &self,
        conversation_id: &str,
        source: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        let row = sqlx::query(
            "SELECT result_json FROM last_results WHERE conversation_id = ? AND source = ?",
        )
        .bind(conversation_id)
        .bind(source)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let json: String = row.get("result_json");
                Ok(Some(serde_json::from_str(&json)?))
            },
            None => Ok(None),
        }
    }

    async fn save_last_result(
        &self,
        conversation_id: &str,
        source: &str,
        result: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let lock = self.lock_for(conversation_id);
        let _guard = lock.lock().await;

        sqlx::query(
            r#"INSERT OR REPLACE INTO last_results
               (conversation_id, source, result_json, updated_at)
               VALUES (?, ?, ?, CURRENT_TIMESTAMP)"#,
        )
        .bind(conversation_id)
        .bind(source)
        .bind(serde_json::to_string(result)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_context(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationContext>, StoreError> {
        let row = sqlx::query(
            r#"SELECT active_source, property_id, file_path
               FROM conversation_context WHERE conversation_id = ?"#,
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| ConversationContext {
            active_source: row.get("active_source"),
            property_id: row.get("property_id"),
            file_path: row.get("file_path"),
        }))
    }

    async fn save_context(
        &self,
        conversation_id: &str,
        context: &ConversationContext,
    ) -> Result<(), StoreError> {
        let lock = self.lock_for(conversation_id);
        let _guard = lock.lock().await;

        sqlx::query(
            r#"INSERT OR REPLACE INTO conversation_context
               (conversation_id, active_source, property_id, file_path, updated_at)
               VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)"#,
        )
        .bind(conversation_id)
        .bind(&context.active_source)
        .bind(&context.property_id)
        .bind(&context.file_path)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_events(&self, property_id: &str) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            "SELECT event_name FROM event_registry WHERE property_id = ? ORDER BY event_name",
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("event_name")).collect())
    }

    async fn save_events(&self, property_id: &str, events: &[String]) -> Result<(), StoreError> {
        for event in events {
            sqlx::query(
                r#"INSERT OR REPLACE INTO event_registry
                   (property_id, event_name, updated_at)
                   VALUES (?, ?, CURRENT_TIMESTAMP)"#,
            )
            .bind(property_id)
            .bind(event)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::services::state_policy::ConversationState;

    #[tokio::test]
    async fn test_state_roundtrip() {
        let store = SqliteConversationStore::new(create_test_pool().await);
        let state = ConversationState {
            metrics: vec!["purchaseRevenue".to_string()],
            dimensions: vec!["defaultChannelGroup".to_string()],
            ..Default::default()
        };

        store
            .save_state("conv1", SOURCE_ANALYTICS, &serde_json::to_value(&state).unwrap())
            .await
            .unwrap();

        let loaded = store.load_state("conv1", SOURCE_ANALYTICS).await.unwrap().unwrap();
        let loaded: ConversationState = serde_json::from_value(loaded).unwrap();
        assert_eq!(loaded.metrics, state.metrics);
    }

    #[tokio::test]
    async fn test_state_full_replace() {
        let store = SqliteConversationStore::new(create_test_pool().await);
        let first = ConversationState {
            metrics: vec!["sessions".to_string()],
            dimensions: vec!["defaultChannelGroup".to_string()],
            ..Default::default()
        };
        let second =
            ConversationState { metrics: vec!["activeUsers".to_string()], ..Default::default() };

        store
            .save_state("conv1", SOURCE_ANALYTICS, &serde_json::to_value(&first).unwrap())
            .await
            .unwrap();
        store
            .save_state("conv1", SOURCE_ANALYTICS, &serde_json::to_value(&second).unwrap())
            .await
            .unwrap();

        let loaded = store.load_state("conv1", SOURCE_ANALYTICS).await.unwrap().unwrap();
        let loaded: ConversationState = serde_json::from_value(loaded).unwrap();
        assert_eq!(loaded.metrics, vec!["activeUsers".to_string()]);
        assert!(loaded.dimensions.is_empty());
    }

    #[tokio::test]
    async fn test_sources_are_independent_keys() {
        let store = SqliteConversationStore::new(create_test_pool().await);
        store
            .save_state("conv1", SOURCE_ANALYTICS, &serde_json::json!({"metrics": ["sessions"]}))
            .await
            .unwrap();

        assert!(store.load_state("conv1", SOURCE_FILE).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_context_roundtrip() {
        let store = SqliteConversationStore::new(create_test_pool().await);
        let context = ConversationContext {
            active_source: Some("ga4".to_string()),
            property_id: Some("360000".to_string()),
            file_path: None,
        };
        store.save_context("conv1", &context).await.unwrap();

        let loaded = store.load_context("conv1").await.unwrap().unwrap();
        assert_eq!(loaded.active_source.as_deref(), Some("ga4"));
        assert_eq!(loaded.property_id.as_deref(), Some("360000"));
    }

    #[tokio::test]
    async fn test_event_registry() {
        let store = SqliteConversationStore::new(create_test_pool().await);
        store
            .save_events("360000", &["donation_click".to_string(), "scroll".to_string()])
            .await
            .unwrap();
        store.save_events("360000", &["donation_click".to_string()]).await.unwrap();

        let events = store.get_events("360000").await.unwrap();
        assert_eq!(events, vec!["donation_click".to_string(), "scroll".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_writes_serialize() {
        let store = Arc::new(SqliteConversationStore::new(create_test_pool().await));
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .save_state(
                        "conv1",
                        SOURCE_ANALYTICS,
                        &serde_json::json!({"metrics": [format!("m{}", i)]}),
                    )
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Whatever write landed last, the state is a complete row
        let loaded = store.load_state("conv1", SOURCE_ANALYTICS).await.unwrap().unwrap();
        assert!(loaded["metrics"].is_array());
    }
}
