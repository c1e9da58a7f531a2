//! File-engine conversation state
//!
//! Persisted per (conversation, file source) so follow-ups ("다음 500개",
//! "그게 무슨 뜻이야?") can continue the previous analysis.

use serde::{Deserialize, Serialize};

use super::intent::FileIntentKind;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisMeta {
    #[serde(default)]
    pub target_column: Option<String>,
    #[serde(default)]
    pub show_unique: bool,
    #[serde(default)]
    pub page_offset: usize,
    #[serde(default)]
    pub page_limit: usize,
    #[serde(default)]
    pub has_next: bool,
    #[serde(default)]
    pub has_prev: bool,
    #[serde(default)]
    pub total_unique: usize,
    #[serde(default)]
    pub shown_unique: usize,

    #[serde(default)]
    pub group_col: Option<String>,
    #[serde(default)]
    pub metric_col: Option<String>,
    #[serde(default)]
    pub date_col: Option<String>,
    #[serde(default)]
    pub op: Option<String>,
    #[serde(default)]
    pub period: Option<String>,

    #[serde(default)]
    pub row_count: usize,
    #[serde(default)]
    pub col_count: usize,
    #[serde(default)]
    pub numeric_count: usize,
    #[serde(default)]
    pub categorical_count: usize,
    #[serde(default)]
    pub date_count: usize,
    #[serde(default)]
    pub boolean_count: usize,
    #[serde(default)]
    pub identifier_count: usize,

    #[serde(default)]
    pub user_count: usize,
    #[serde(default)]
    pub id_column: Option<String>,
    #[serde(default)]
    pub admin_count: usize,
    #[serde(default)]
    pub total_count: usize,
    #[serde(default)]
    pub admin_columns: Vec<String>,
    #[serde(default)]
    pub unique_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileEngineState {
    #[serde(default)]
    pub last_intent: Option<FileIntentKind>,
    #[serde(default)]
    pub last_meta: AnalysisMeta,
}
