//! Response envelope returned to the chat caller
//!
//! One shape for every route (analytics, file, system): Korean prose plus the
//! machine-usable blocks, chart spec and cleaned rows.

use serde::{Deserialize, Serialize};

use super::value::RowTable;

/// Turn outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok,
    Clarify,
    Error,
    PartialError,
}

/// Chart kind consumed by the frontend chart component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Line,
    Bar,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSeries {
    pub name: String,
    pub data: Vec<f64>,
}

/// Chart spec; `chart_type: None` with empty labels means "no chart"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(rename = "type")]
    pub chart_type: Option<ChartKind>,
    pub labels: Vec<String>,
    pub series: Vec<ChartSeries>,
}

impl ChartSpec {
    pub fn empty() -> Self {
        Self { chart_type: None, labels: Vec::new(), series: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.chart_type.is_none() || self.labels.is_empty()
    }
}

// ============================================================================
// Block results
// ============================================================================

/// Block result payload: a totals map for `total` blocks, ordered rows
/// otherwise
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockData {
    Totals(Vec<(String, f64)>),
    Rows(RowTable),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockResultKind {
    Total,
    Breakdown,
    Trend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockResult {
    pub block_id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: BlockResultKind,
    pub data: BlockData,
}

impl BlockResult {
    pub fn rows(&self) -> Option<&RowTable> {
        match &self.data {
            BlockData::Rows(t) => Some(t),
            BlockData::Totals(_) => None,
        }
    }

    pub fn totals(&self) -> Option<&[(String, f64)]> {
        match &self.data {
            BlockData::Totals(t) => Some(t),
            BlockData::Rows(_) => None,
        }
    }
}

// ============================================================================
// Chat response
// ============================================================================

/// Full response envelope for one turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub status: ResponseStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    pub blocks: Vec<BlockResult>,
    pub plot_data: ChartSpec,
    pub raw_data: Vec<serde_json::Value>,
    pub structured: serde_json::Map<String, serde_json::Value>,
    pub followup_suggestions: Vec<String>,
    #[serde(skip_serializing_if = "serde_json::Value::is_null", default)]
    pub matching_debug: serde_json::Value,
}

impl ChatResponse {
    pub fn message_only(status: ResponseStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            account: None,
            period: None,
            blocks: Vec::new(),
            plot_data: ChartSpec::empty(),
            raw_data: Vec::new(),
            structured: serde_json::Map::new(),
            followup_suggestions: Vec::new(),
            matching_debug: serde_json::Value::Null,
        }
    }

    pub fn clarify(message: impl Into<String>) -> Self {
        Self::message_only(ResponseStatus::Clarify, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::message_only(ResponseStatus::Error, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let v = serde_json::to_value(ResponseStatus::PartialError).unwrap();
        assert_eq!(v, serde_json::json!("partial_error"));
    }

    #[test]
    fn test_empty_chart() {
        let c = ChartSpec::empty();
        assert!(c.is_empty());
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["type"], serde_json::Value::Null);
    }
}
