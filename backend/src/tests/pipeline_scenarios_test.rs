//! End-to-end pipeline scenarios over fixture ports
//!
//! Each test drives the full extract → relate → plan → execute → adapt flow
//! with the fixture analytics backend and a fixture LLM, and checks the
//! observable output: plan shape, Korean message, chart, persisted state.

use chrono::NaiveDate;

use crate::models::{ChartKind, ResponseStatus};
use crate::services::analytics::DimensionFilter;
use crate::services::extractor::QuestionIntent;
use crate::services::llm::FixtureLlm;
use crate::services::state_policy::ConversationState;
use crate::services::store::{ConversationStore, SOURCE_ANALYTICS};
use crate::tests::common::{create_test_pipeline, test_date_context, TEST_PROPERTY};

#[tokio::test]
async fn test_scenario_total_revenue() {
    let harness = create_test_pipeline(FixtureLlm::failing()).await;
    harness
        .analytics
        .enqueue_rows(&[], &["purchaseRevenue"], &[(&[], &["1530000"])]);

    let response = harness
        .pipeline
        .run("총 매출 알려줘", TEST_PROPERTY, Some("conv-total"), &test_date_context())
        .await;

    assert_eq!(response.status, ResponseStatus::Ok);
    assert!(response.message.contains("구매 수익은 **1,530,000원**입니다."));
    assert_eq!(response.blocks.len(), 1);

    // The emitted request carried no dimensions
    let requests = harness.analytics.seen_requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].dimensions.is_empty());
    assert_eq!(requests[0].metrics, vec!["purchaseRevenue".to_string()]);
}

#[tokio::test]
async fn test_scenario_active_users_trend() {
    let harness = create_test_pipeline(FixtureLlm::failing()).await;
    // Deliberately unsorted; the chart must sort ascending
    harness.analytics.enqueue_rows(
        &["date"],
        &["activeUsers"],
        &[
            (&["2026-02-11"], &["30"]),
            (&["2026-02-09"], &["10"]),
            (&["2026-02-10"], &["20"]),
        ],
    );

    let response = harness
        .pipeline
        .run("지난주 사용자 추이 알려줘", TEST_PROPERTY, Some("conv-trend"), &test_date_context())
        .await;

    assert_eq!(response.status, ResponseStatus::Ok);
    assert_eq!(response.period.as_deref(), Some("2026-02-09 ~ 2026-02-15"));
    assert_eq!(response.plot_data.chart_type, Some(ChartKind::Line));
    assert_eq!(
        response.plot_data.labels,
        vec!["2026-02-09", "2026-02-10", "2026-02-11"]
    );

    let requests = harness.analytics.seen_requests();
    assert_eq!(requests[0].dimensions, vec!["date".to_string()]);
    assert_eq!(requests[0].metrics, vec!["activeUsers".to_string()]);

    // Anchor state persisted for the next turn
    let raw = harness
        .store
        .load_state("conv-trend", SOURCE_ANALYTICS)
        .await
        .unwrap()
        .expect("state saved");
    let state: ConversationState = serde_json::from_value(raw).unwrap();
    assert_eq!(state.dimensions, vec!["date".to_string()]);
    assert_eq!(state.intent, Some(QuestionIntent::Trend));
    assert_eq!(state.start_date, NaiveDate::from_ymd_opt(2026, 2, 9));
}

#[tokio::test]
async fn test_scenario_event_filtered_breakdown() {
    let harness = create_test_pipeline(FixtureLlm::failing()).await;
    harness.analytics.enqueue_rows(
        &["customEvent:donation_name"],
        &["eventCount"],
        &[(&["생일후원"], &["120"]), (&["기념일후원"], &["80"])],
    );

    let response = harness
        .pipeline
        .run(
            "donation_click의 donation_name 보여줘",
            TEST_PROPERTY,
            Some("conv-donation"),
            &test_date_context(),
        )
        .await;

    assert_eq!(response.status, ResponseStatus::Ok);

    let requests = harness.analytics.seen_requests();
    assert_eq!(
        requests[0].dimensions,
        vec!["customEvent:donation_name".to_string()]
    );
    assert_eq!(requests[0].metrics, vec!["eventCount".to_string()]);
    match &requests[0].dimension_filter {
        Some(DimensionFilter::StringEquals { field, value }) => {
            assert_eq!(field, "eventName");
            assert_eq!(value, "donation_click");
        },
        other => panic!("expected event filter, got {:?}", other),
    }
}

#[tokio::test]
async fn test_scenario_relative_week_shift() {
    let harness = create_test_pipeline(FixtureLlm::returning_relation("refine")).await;

    let previous = ConversationState {
        metrics: vec!["activeUsers".to_string()],
        dimensions: Vec::new(),
        start_date: NaiveDate::from_ymd_opt(2026, 2, 9),
        end_date: NaiveDate::from_ymd_opt(2026, 2, 15),
        intent: Some(QuestionIntent::MetricSingle),
        ..Default::default()
    };
    harness
        .store
        .save_state("conv-shift", SOURCE_ANALYTICS, &serde_json::to_value(&previous).unwrap())
        .await
        .unwrap();

    harness
        .analytics
        .enqueue_rows(&[], &["activeUsers"], &[(&[], &["4200"])]);

    let response = harness
        .pipeline
        .run("그 전주 사용자는?", TEST_PROPERTY, Some("conv-shift"), &test_date_context())
        .await;

    assert_eq!(response.period.as_deref(), Some("2026-02-02 ~ 2026-02-08"));

    let requests = harness.analytics.seen_requests();
    let range = &requests[0].date_ranges[0];
    assert_eq!(range.start_date, NaiveDate::from_ymd_opt(2026, 2, 2).unwrap());
    assert_eq!(range.end_date, NaiveDate::from_ymd_opt(2026, 2, 8).unwrap());
}

#[tokio::test]
async fn test_scenario_multi_scope_split() {
    let harness = create_test_pipeline(FixtureLlm::failing()).await;
    harness
        .analytics
        .enqueue_rows(&[], &["purchaseRevenue"], &[(&[], &["2000000"])]);
    harness.analytics.enqueue_rows(
        &["itemName"],
        &["itemRevenue"],
        &[(&["정기후원 상품"], &["1200000"]), (&["일시후원 상품"], &["800000"])],
    );

    let response = harness
        .pipeline
        .run(
            "총 매출과 상품별 매출 알려줘",
            TEST_PROPERTY,
            Some("conv-multi"),
            &test_date_context(),
        )
        .await;

    assert_eq!(response.status, ResponseStatus::Ok);
    assert_eq!(response.blocks.len(), 2);
    assert!(response.message.contains("구매 수익은 **2,000,000원**입니다."));
    assert!(response.message.contains("상위 목록:"));
    assert!(response.message.contains("정기후원 상품"));

    let requests = harness.analytics.seen_requests();
    assert!(requests[0].dimensions.is_empty());
    assert_eq!(requests[1].dimensions, vec!["itemName".to_string()]);
    assert_eq!(requests[1].metrics, vec!["itemRevenue".to_string()]);
}

#[tokio::test]
async fn test_scenario_clarify_on_no_match() {
    let harness = create_test_pipeline(FixtureLlm::failing()).await;

    let response = harness
        .pipeline
        .run("xyz zzz", TEST_PROPERTY, Some("conv-clarify"), &test_date_context())
        .await;

    assert_eq!(response.status, ResponseStatus::Clarify);
    assert!(response.blocks.is_empty());
    assert!(response.message.contains("지표"));
    assert!(harness.analytics.seen_requests().is_empty());
}

#[tokio::test]
async fn test_failed_block_surfaces_partial_error() {
    let harness = create_test_pipeline(FixtureLlm::failing()).await;
    // One response for two planned blocks: the item block fails
    harness
        .analytics
        .enqueue_rows(&[], &["purchaseRevenue"], &[(&[], &["2000000"])]);

    let response = harness
        .pipeline
        .run(
            "총 매출과 상품별 매출 알려줘",
            TEST_PROPERTY,
            Some("conv-partial"),
            &test_date_context(),
        )
        .await;

    assert_eq!(response.status, ResponseStatus::PartialError);
    assert_eq!(response.blocks.len(), 1);
}

#[tokio::test]
async fn test_metric_switch_drops_previous_metrics() {
    let harness = create_test_pipeline(FixtureLlm::returning_relation("metric_switch")).await;

    let previous = ConversationState {
        metrics: vec!["purchaseRevenue".to_string()],
        dimensions: vec!["defaultChannelGroup".to_string()],
        start_date: NaiveDate::from_ymd_opt(2026, 2, 9),
        end_date: NaiveDate::from_ymd_opt(2026, 2, 15),
        intent: Some(QuestionIntent::Breakdown),
        ..Default::default()
    };
    harness
        .store
        .save_state("conv-switch", SOURCE_ANALYTICS, &serde_json::to_value(&previous).unwrap())
        .await
        .unwrap();

    // Short follow-up plans a total plus the inherited channel breakdown
    harness
        .analytics
        .enqueue_rows(&[], &["sessions"], &[(&[], &["520"])]);
    harness.analytics.enqueue_rows(
        &["defaultChannelGroup"],
        &["sessions"],
        &[(&["Organic Search"], &["340"])],
    );

    let response = harness
        .pipeline
        .run("세션은?", TEST_PROPERTY, Some("conv-switch"), &test_date_context())
        .await;

    assert_eq!(response.status, ResponseStatus::Ok);
    let requests = harness.analytics.seen_requests();
    // Previous metrics never leak into the new plan
    for request in &requests {
        assert!(!request.metrics.contains(&"purchaseRevenue".to_string()));
        assert!(request.metrics.contains(&"sessions".to_string()));
    }
}

#[tokio::test]
async fn test_cached_repeat_question_skips_backend() {
    let harness = create_test_pipeline(FixtureLlm::failing()).await;
    harness
        .analytics
        .enqueue_rows(&[], &["purchaseRevenue"], &[(&[], &["100"])]);

    let first = harness
        .pipeline
        .run("총 매출 알려줘", TEST_PROPERTY, Some("conv-cache"), &test_date_context())
        .await;
    let second = harness
        .pipeline
        .run("총 매출 알려줘!", TEST_PROPERTY, Some("conv-cache"), &test_date_context())
        .await;

    assert_eq!(first.message, second.message);
    assert_eq!(harness.analytics.seen_requests().len(), 1);
}
