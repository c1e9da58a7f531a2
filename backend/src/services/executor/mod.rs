//! Plan executor
//!
//! Runs each block of an `ExecutionPlan` against the analytics port and
//! normalizes responses into row tables. Blocks are isolated: one failing
//! block is dropped and the rest of the plan continues. Retries belong to
//! the transport, never to this layer.

use dashmap::DashMap;
use std::sync::Arc;

use crate::models::{BlockData, BlockResult, BlockResultKind, RowTable, Value};
use crate::services::analytics::{
    AnalyticsError, AnalyticsPort, DimensionFilter, PropertyMetadata, ReportDateRange,
    ReportRequest, ReportResponse,
};
use crate::services::planner::{BlockType, ExecutionPlan, PlanBlock};

/// Custom-field prefixes tried, in order, when a name is unknown to the
/// live property metadata
const CUSTOM_PREFIXES: &[&str] = &["customEvent:", "customUser:", "customItem:"];

#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub results: Vec<BlockResult>,
    pub failed_blocks: usize,
}

pub struct PlanExecutor {
    analytics: Arc<dyn AnalyticsPort>,
    metadata_cache: DashMap<String, Arc<PropertyMetadata>>,
}

impl PlanExecutor {
    pub fn new(analytics: Arc<dyn AnalyticsPort>) -> Self {
        Self { analytics, metadata_cache: DashMap::new() }
    }

    /// Execute every block in plan order. Result order follows the plan,
    /// not completion order.
    pub async fn execute(&self, plan: &ExecutionPlan) -> ExecutionReport {
        tracing::info!("Executing plan with {} blocks", plan.blocks.len());
        let metadata = self.property_metadata(&plan.property_id).await;

        let mut report = ExecutionReport::default();
        for block in &plan.blocks {
            match self.execute_block(block, plan, metadata.as_deref()).await {
                Ok(Some(result)) => report.results.push(result),
                Ok(None) => {
                    tracing::warn!("Block {} returned no rows", block.block_id);
                },
                Err(e) => {
                    tracing::error!("Block {} failed: {}", block.block_id, e);
                    report.failed_blocks += 1;
                },
            }
        }

        tracing::info!(
            "Execution complete: {} blocks succeeded, {} failed",
            report.results.len(),
            report.failed_blocks
        );
        report
    }

    async fn property_metadata(&self, property_id: &str) -> Option<Arc<PropertyMetadata>> {
        if let Some(cached) = self.metadata_cache.get(property_id) {
            return Some(Arc::clone(cached.value()));
        }
        match self.analytics.get_metadata(property_id).await {
            Ok(metadata) => {
                let metadata = Arc::new(metadata);
                self.metadata_cache
                    .insert(property_id.to_string(), metadata.clone());
                Some(metadata)
            },
            Err(e) => {
                // Field names pass through unresolved; the report call itself
                // will surface real failures.
                tracing::warn!("Metadata fetch failed for {}: {}", property_id, e);
                None
            },
        }
    }

    async fn execute_block(
        &self,
        block: &PlanBlock,
        plan: &ExecutionPlan,
        metadata: Option<&PropertyMetadata>,
    ) -> Result<Option<BlockResult>, AnalyticsError> {
        let request = self.to_request(block, plan, metadata);
        let response = self.analytics.run_report(&request).await?;

        if response.rows.is_empty() {
            return Ok(None);
        }
        let table = normalize_response(&response);

        let result = match block.block_type {
            BlockType::Total => BlockResult {
                block_id: block.block_id.clone(),
                title: block.title.clone(),
                kind: BlockResultKind::Total,
                data: BlockData::Totals(sum_metric_columns(&table, &request.metrics)),
            },
            BlockType::Breakdown | BlockType::BreakdownTopn => BlockResult {
                block_id: block.block_id.clone(),
                title: block.title.clone(),
                kind: BlockResultKind::Breakdown,
                data: BlockData::Rows(table),
            },
            BlockType::Trend => BlockResult {
                block_id: block.block_id.clone(),
                title: block.title.clone(),
                kind: BlockResultKind::Trend,
                data: BlockData::Rows(table),
            },
        };
        Ok(Some(result))
    }

    fn to_request(
        &self,
        block: &PlanBlock,
        plan: &ExecutionPlan,
        metadata: Option<&PropertyMetadata>,
    ) -> ReportRequest {
        let dimensions = block
            .dimensions
            .iter()
            .map(|d| resolve_dimension_name(d, metadata))
            .collect();
        let metrics = block
            .metrics
            .iter()
            .map(|m| resolve_metric_name(m, metadata))
            .collect();

        let dimension_filter = if !block.filters.event_filters.is_empty() {
            Some(DimensionFilter::InList {
                field: "eventName".to_string(),
                values: block.filters.event_filters.clone(),
            })
        } else {
            block.filters.event_filter.as_ref().map(|event| DimensionFilter::StringEquals {
                field: "eventName".to_string(),
                value: event.clone(),
            })
        };

        ReportRequest {
            property_id: plan.property_id.clone(),
            dimensions,
            metrics,
            date_ranges: vec![ReportDateRange {
                start_date: plan.start_date,
                end_date: plan.end_date,
            }],
            dimension_filter,
            order_bys: block.order_bys.clone(),
            limit: block.limit,
        }
    }
}

/// Try the name directly, then each custom prefix against live metadata
fn resolve_dimension_name(name: &str, metadata: Option<&PropertyMetadata>) -> String {
    let Some(metadata) = metadata else {
        return name.to_string();
    };
    if metadata.has_dimension(name) {
        return name.to_string();
    }
    for prefix in CUSTOM_PREFIXES {
        let candidate = format!("{}{}", prefix, name);
        if metadata.has_dimension(&candidate) {
            return candidate;
        }
    }
    name.to_string()
}

fn resolve_metric_name(name: &str, metadata: Option<&PropertyMetadata>) -> String {
    let Some(metadata) = metadata else {
        return name.to_string();
    };
    if metadata.has_metric(name) {
        return name.to_string();
    }
    for prefix in CUSTOM_PREFIXES {
        let candidate = format!("{}{}", prefix, name);
        if metadata.has_metric(&candidate) {
            return candidate;
        }
    }
    name.to_string()
}

/// Dimension cells stay text; metric cells are coerced leniently
fn normalize_response(response: &ReportResponse) -> RowTable {
    let mut columns = Vec::with_capacity(
        response.dimension_headers.len() + response.metric_headers.len(),
    );
    columns.extend(response.dimension_headers.iter().cloned());
    columns.extend(response.metric_headers.iter().cloned());

    let mut table = RowTable::new(columns);
    for row in &response.rows {
        let mut cells = Vec::with_capacity(table.columns.len());
        for dim in &row.dimension_values {
            cells.push(Value::from_str_lossy(dim));
        }
        for metric in &row.metric_values {
            cells.push(match crate::models::parse_lenient_number(metric) {
                Some(n) => Value::Num(n),
                None => Value::Null,
            });
        }
        // Header/value arity can disagree on malformed responses
        cells.resize(table.columns.len(), Value::Null);
        table.push_row(cells);
    }
    table
}

fn sum_metric_columns(table: &RowTable, metrics: &[String]) -> Vec<(String, f64)> {
    let mut totals = Vec::new();
    for metric in metrics {
        if let Some(col) = table.col_index(metric) {
            let sum: f64 = table
                .column_values(col)
                .filter_map(|v| v.to_number())
                .sum();
            totals.push((metric.clone(), sum));
        }
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::analytics::FixtureAnalytics;
    use crate::services::extractor::QuestionIntent;
    use crate::services::metadata::FieldScope;
    use crate::services::planner::BlockFilters;
    use chrono::NaiveDate;

    fn plan_with(blocks: Vec<PlanBlock>) -> ExecutionPlan {
        ExecutionPlan {
            property_id: "360000".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 2, 9).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 2, 15).unwrap(),
            intent: QuestionIntent::MetricSingle,
            exclude_notset: false,
            blocks,
        }
    }

    fn total_block() -> PlanBlock {
        PlanBlock {
            block_id: "total_event_0".to_string(),
            block_type: BlockType::Total,
            scope: FieldScope::Event,
            metrics: vec!["purchaseRevenue".to_string()],
            dimensions: Vec::new(),
            filters: BlockFilters::default(),
            order_bys: Vec::new(),
            limit: None,
            title: "전체 지표 요약".to_string(),
        }
    }

    fn breakdown_block() -> PlanBlock {
        PlanBlock {
            block_id: "breakdown_event_1".to_string(),
            block_type: BlockType::Breakdown,
            scope: FieldScope::Event,
            metrics: vec!["sessions".to_string()],
            dimensions: vec!["defaultChannelGroup".to_string()],
            filters: BlockFilters::default(),
            order_bys: Vec::new(),
            limit: None,
            title: "기본 채널 그룹별 세션".to_string(),
        }
    }

    #[tokio::test]
    async fn test_total_block_sums_metric() {
        let fixture = Arc::new(FixtureAnalytics::with_default_metadata());
        fixture.enqueue_rows(&[], &["purchaseRevenue"], &[(&[], &["1200"]), (&[], &["300"])]);

        let executor = PlanExecutor::new(fixture);
        let report = executor.execute(&plan_with(vec![total_block()])).await;
        assert_eq!(report.failed_blocks, 0);
        let totals = report.results[0].totals().unwrap();
        assert_eq!(totals[0], ("purchaseRevenue".to_string(), 1500.0));
    }

    #[tokio::test]
    async fn test_failed_block_is_isolated() {
        let fixture = Arc::new(FixtureAnalytics::with_default_metadata());
        // Only one response queued for two blocks: the second one fails
        fixture.enqueue_rows(
            &["defaultChannelGroup"],
            &["sessions"],
            &[(&["Organic Search"], &["120"])],
        );

        let executor = PlanExecutor::new(fixture);
        let report = executor
            .execute(&plan_with(vec![breakdown_block(), total_block()]))
            .await;
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.failed_blocks, 1);
        assert_eq!(report.results[0].block_id, "breakdown_event_1");
    }

    #[tokio::test]
    async fn test_numeric_coercion_is_lenient() {
        let fixture = Arc::new(FixtureAnalytics::with_default_metadata());
        fixture.enqueue_rows(
            &["defaultChannelGroup"],
            &["sessions"],
            &[(&["Direct"], &["1,204"]), (&["Referral"], &["n/a"])],
        );

        let executor = PlanExecutor::new(fixture);
        let report = executor.execute(&plan_with(vec![breakdown_block()])).await;
        let table = report.results[0].rows().unwrap();
        assert_eq!(table.cell(0, 1), Some(&Value::Num(1204.0)));
        assert_eq!(table.cell(1, 1), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_custom_prefix_resolution() {
        let fixture = Arc::new(FixtureAnalytics::with_default_metadata());
        fixture.enqueue_rows(
            &["customEvent:donation_name"],
            &["eventCount"],
            &[(&["생일후원"], &["10"])],
        );

        let mut block = breakdown_block();
        block.dimensions = vec!["donation_name".to_string()];
        block.metrics = vec!["eventCount".to_string()];

        let executor = PlanExecutor::new(fixture.clone());
        executor.execute(&plan_with(vec![block])).await;

        let seen = fixture.seen_requests();
        assert_eq!(seen[0].dimensions, vec!["customEvent:donation_name".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_response_drops_block_without_failure() {
        let fixture = Arc::new(FixtureAnalytics::with_default_metadata());
        fixture.enqueue_rows(&["defaultChannelGroup"], &["sessions"], &[]);

        let executor = PlanExecutor::new(fixture);
        let report = executor.execute(&plan_with(vec![breakdown_block()])).await;
        assert!(report.results.is_empty());
        assert_eq!(report.failed_blocks, 0);
    }
}
