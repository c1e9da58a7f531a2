//! Question intent classification
//!
//! Keyword rules, first match wins. `MetricMulti` is decided later by the
//! extractor once it knows how many distinct metrics matched.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static TOP_N_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*(위|까지|개까지)").unwrap());
static TOP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:상위|top)\s*(\d+)?").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionIntent {
    MetricSingle,
    MetricMulti,
    Breakdown,
    TopN,
    Comparison,
    Trend,
    CategoryList,
}

impl QuestionIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MetricSingle => "metric_single",
            Self::MetricMulti => "metric_multi",
            Self::Breakdown => "breakdown",
            Self::TopN => "topn",
            Self::Comparison => "comparison",
            Self::Trend => "trend",
            Self::CategoryList => "category_list",
        }
    }
}

pub struct IntentClassifier;

impl IntentClassifier {
    /// Classify the question; also returns the top-N limit when one is named.
    pub fn classify(question: &str) -> (QuestionIntent, Option<u32>) {
        let q = question.to_lowercase();

        // 1. Category list
        if q.contains("종류") || q.contains("무슨 이벤트") || q.contains("어떤 이벤트") {
            return (QuestionIntent::CategoryList, None);
        }

        // 2. Trend
        if ["추이", "흐름", "일별", "변화", "trend", "daily"].iter().any(|k| q.contains(k)) {
            return (QuestionIntent::Trend, None);
        }

        // 3. Comparison
        if ["전주 대비", "그 전주", "비교", "차이", "증감", "compare", "vs"]
            .iter()
            .any(|k| q.contains(k))
        {
            return (QuestionIntent::Comparison, None);
        }

        // 4. Top-N
        if let Some(limit) = Self::top_n_limit(&q) {
            return (QuestionIntent::TopN, Some(limit));
        }
        if q.contains("상위") || q.contains("top") {
            return (QuestionIntent::TopN, None);
        }

        // 5. Breakdown markers
        if ["별", "기준", "따라", "by "].iter().any(|k| q.contains(k)) {
            return (QuestionIntent::Breakdown, None);
        }

        (QuestionIntent::MetricSingle, None)
    }

    fn top_n_limit(q: &str) -> Option<u32> {
        if let Some(cap) = TOP_N_RE.captures(q) {
            return cap[1].parse().ok();
        }
        if let Some(cap) = TOP_RE.captures(q) {
            if let Some(n) = cap.get(1) {
                return n.as_str().parse().ok();
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_list_first() {
        let (intent, _) = IntentClassifier::classify("무슨 이벤트 종류가 있어?");
        assert_eq!(intent, QuestionIntent::CategoryList);
    }

    #[test]
    fn test_trend_over_breakdown() {
        let (intent, _) = IntentClassifier::classify("채널별 일별 추이 알려줘");
        assert_eq!(intent, QuestionIntent::Trend);
    }

    #[test]
    fn test_comparison() {
        let (intent, _) = IntentClassifier::classify("전주 대비 매출 알려줘");
        assert_eq!(intent, QuestionIntent::Comparison);
    }

    #[test]
    fn test_relative_shift_is_comparison() {
        let (intent, _) = IntentClassifier::classify("그 전주 사용자는?");
        assert_eq!(intent, QuestionIntent::Comparison);
    }

    #[test]
    fn test_topn_with_limit() {
        let (intent, limit) = IntentClassifier::classify("상품별 매출 10위까지 보여줘");
        assert_eq!(intent, QuestionIntent::TopN);
        assert_eq!(limit, Some(10));
    }

    #[test]
    fn test_topn_top_keyword() {
        let (intent, limit) = IntentClassifier::classify("매출 top 5 상품");
        assert_eq!(intent, QuestionIntent::TopN);
        assert_eq!(limit, Some(5));
    }

    #[test]
    fn test_breakdown() {
        let (intent, _) = IntentClassifier::classify("채널별 세션 보여줘");
        assert_eq!(intent, QuestionIntent::Breakdown);
    }

    #[test]
    fn test_default_metric_single() {
        let (intent, _) = IntentClassifier::classify("총 매출 알려줘");
        assert_eq!(intent, QuestionIntent::MetricSingle);
    }
}
