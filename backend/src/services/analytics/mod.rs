//! Analytics backend port
//!
//! Only the logical request/response shape is modeled; the real wire format
//! and auth of the hosted analytics property live behind the HTTP client.

pub mod client;
pub mod fake;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use client::{AnalyticsClient, AnalyticsClientConfig};
pub use fake::FixtureAnalytics;

/// Filter applied to one dimension of the report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DimensionFilter {
    StringEquals { field: String, value: String },
    InList { field: String, values: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ReportOrderBy {
    Metric { name: String, desc: bool },
    Dimension { name: String, desc: bool },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRequest {
    pub property_id: String,
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
    pub date_ranges: Vec<ReportDateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension_filter: Option<DimensionFilter>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub order_bys: Vec<ReportOrderBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRow {
    pub dimension_values: Vec<String>,
    pub metric_values: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportResponse {
    pub dimension_headers: Vec<String>,
    pub metric_headers: Vec<String>,
    pub rows: Vec<ReportRow>,
}

/// Live field names exposed by a property, including custom-prefixed ones
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyMetadata {
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
}

impl PropertyMetadata {
    pub fn has_dimension(&self, name: &str) -> bool {
        self.dimensions.iter().any(|d| d == name)
    }

    pub fn has_metric(&self, name: &str) -> bool {
        self.metrics.iter().any(|m| m == name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("Analytics API error: {0}")]
    ApiError(String),

    #[error("Analytics timeout after {0}s")]
    Timeout(u64),

    #[error("Analytics response parsing error: {0}")]
    ParseError(String),
}

#[async_trait]
pub trait AnalyticsPort: Send + Sync {
    async fn run_report(&self, request: &ReportRequest) -> Result<ReportResponse, AnalyticsError>;

    async fn get_metadata(&self, property_id: &str) -> Result<PropertyMetadata, AnalyticsError>;
}
