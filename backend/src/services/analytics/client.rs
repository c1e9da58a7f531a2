//! HTTP client for the hosted analytics data API

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::{
    AnalyticsError, AnalyticsPort, PropertyMetadata, ReportRequest, ReportResponse,
};

#[derive(Debug, Clone)]
pub struct AnalyticsClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for AnalyticsClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8600".to_string(),
            api_key: None,
            timeout_seconds: 20,
        }
    }
}

pub struct AnalyticsClient {
    http_client: Client,
    config: AnalyticsClientConfig,
}

impl AnalyticsClient {
    pub fn new(config: AnalyticsClientConfig) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()
            .unwrap_or_else(|e| {
                tracing::error!(
                    "Failed to build analytics HTTP client: {}. Using default client.",
                    e
                );
                Client::default()
            });

        Self { http_client, config }
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {}", key)),
            None => builder,
        }
    }
}

#[async_trait]
impl AnalyticsPort for AnalyticsClient {
    async fn run_report(&self, request: &ReportRequest) -> Result<ReportResponse, AnalyticsError> {
        let url = format!(
            "{}/v1/properties/{}/reports:run",
            self.base_url(),
            request.property_id
        );
        tracing::debug!(
            "Running report: {} dims, {} metrics against {}",
            request.dimensions.len(),
            request.metrics.len(),
            request.property_id
        );

        let response = self
            .authorized(self.http_client.post(&url))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnalyticsError::Timeout(self.config.timeout_seconds)
                } else {
                    AnalyticsError::ApiError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AnalyticsError::ApiError(format!(
                "Report failed with status {}: {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AnalyticsError::ParseError(e.to_string()))
    }

    async fn get_metadata(&self, property_id: &str) -> Result<PropertyMetadata, AnalyticsError> {
        let url = format!("{}/v1/properties/{}/metadata", self.base_url(), property_id);

        let response = self
            .authorized(self.http_client.get(&url))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnalyticsError::Timeout(self.config.timeout_seconds)
                } else {
                    AnalyticsError::ApiError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalyticsError::ApiError(format!(
                "Metadata fetch failed with status {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AnalyticsError::ParseError(e.to_string()))
    }
}
