//! Fixture analytics backend for the test suite
//!
//! Responses are queued in plan-block order; an exhausted queue errors,
//! which doubles as the block-failure fixture.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{
    AnalyticsError, AnalyticsPort, PropertyMetadata, ReportRequest, ReportResponse, ReportRow,
};

pub struct FixtureAnalytics {
    metadata: PropertyMetadata,
    responses: Mutex<VecDeque<ReportResponse>>,
    requests: Mutex<Vec<ReportRequest>>,
}

impl FixtureAnalytics {
    pub fn new(metadata: PropertyMetadata) -> Self {
        Self {
            metadata,
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Metadata covering the static registry plus the known custom params
    pub fn with_default_metadata() -> Self {
        let mut metadata = PropertyMetadata::default();
        metadata.metrics = crate::services::metadata::METRICS
            .iter()
            .map(|d| d.key.to_string())
            .collect();
        metadata.dimensions = crate::services::metadata::DIMENSIONS
            .iter()
            .map(|d| d.key.to_string())
            .collect();
        Self::new(metadata)
    }

    pub fn enqueue(&self, response: ReportResponse) {
        self.responses
            .lock()
            .expect("fixture lock poisoned")
            .push_back(response);
    }

    /// Convenience: build a response from (dims, metrics, rows-of-strings)
    pub fn enqueue_rows(
        &self,
        dimension_headers: &[&str],
        metric_headers: &[&str],
        rows: &[(&[&str], &[&str])],
    ) {
        let response = ReportResponse {
            dimension_headers: dimension_headers.iter().map(|s| s.to_string()).collect(),
            metric_headers: metric_headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|(dims, metrics)| ReportRow {
                    dimension_values: dims.iter().map(|s| s.to_string()).collect(),
                    metric_values: metrics.iter().map(|s| s.to_string()).collect(),
                })
                .collect(),
        };
        self.enqueue(response);
    }

    /// Requests observed so far, in call order
    pub fn seen_requests(&self) -> Vec<ReportRequest> {
        self.requests.lock().expect("fixture lock poisoned").clone()
    }
}

#[async_trait]
impl AnalyticsPort for FixtureAnalytics {
    async fn run_report(&self, request: &ReportRequest) -> Result<ReportResponse, AnalyticsError> {
        self.requests
            .lock()
            .expect("fixture lock poisoned")
            .push(request.clone());
        self.responses
            .lock()
            .expect("fixture lock poisoned")
            .pop_front()
            .ok_or_else(|| AnalyticsError::ApiError("fixture queue exhausted".to_string()))
    }

    async fn get_metadata(&self, _property_id: &str) -> Result<PropertyMetadata, AnalyticsError> {
        Ok(self.metadata.clone())
    }
}
