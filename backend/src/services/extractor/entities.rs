//! Entity-term and event-token extraction
//!
//! Entity terms are the free-form nouns a question pivots on ("생일후원",
//! "display"); event tokens are snake_case event names ("donation_click").
//! Both are later matched into result rows or the event registry, so cleanup
//! errs on the side of dropping noisy fragments.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Custom-parameter names that look like event tokens but are not events
pub static KNOWN_CUSTOM_PARAM_TOKENS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "banner_name",
        "button_name",
        "click_button",
        "click_location",
        "click_section",
        "click_text",
        "content_category",
        "content_name",
        "content_type",
        "country_name",
        "detail_category",
        "donation_name",
        "event_category",
        "event_label",
        "is_regular_donation",
        "letter_translation",
        "main_category",
        "menu_name",
        "payment_type",
        "percent_scrolled",
        "referrer_host",
        "referrer_pathname",
        "step",
        "sub_category",
        "domestic_children_count",
        "overseas_children_count",
    ])
});

static QUOTED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["']([^"']{2,40})["']"#).unwrap());
static JOSA_CONTEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([가-힣A-Za-z0-9_\-/\[\] ]{2,40})\s*(?:에\s*대해서?|관련|기준|만|비중|추이|원인|정보)")
        .unwrap()
});
static PAIR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([가-힣A-Za-z0-9_\-/\[\]]{2,30})\s*[와과]\s*([가-힣A-Za-z0-9_\-/\[\]]{2,30})").unwrap()
});
static DONATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([가-힣A-Za-z0-9_]+후원)").unwrap());
static POSSESSIVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([가-힣A-Za-z0-9_\-/\[\]]{2,40})\s*의\s").unwrap());

static SNAKE_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z][a-z0-9]*(?:_[a-z0-9]+)+").unwrap());
static CLICK_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([a-z0-9]+)\s*클릭").unwrap());
static EVENT_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"이벤트\s*([a-z][a-z0-9_\-]{2,40})").unwrap());

static BREAKDOWN_TAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9_가-힣]+\s*별.*$").unwrap());
static RANK_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(가장|최고|최저|상위|하위)\s*").unwrap());
static RANK_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(top\s*\d+|상위\s*\d+|\d+\s*위|\d+\s*[-~]\s*\d+)\s*").unwrap()
});
static SUFFIX_NOISE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*(관련|기준|정보|상세|매출|전환|추이|원인|분석|채널|캠페인)$").unwrap()
});
static TRAILING_JOSA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(은|는|이|가|을|를|에|의|중|중에|쪽|쪽에)$").unwrap());
static QUESTION_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(어떤|무슨|무엇)\s*").unwrap());
static MULTI_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static ENTITY_STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "무엇", "어떤", "더", "알", "수", "있어", "있는", "기준", "관련", "정보", "비중", "추이",
        "원인", "분석", "상세", "매개변수", "파라미터", "항목", "상품", "아이템", "후원 이름",
        "후원명", "donation_name", "이탈", "이탈율", "이탈률", "활성", "신규", "매출", "수익",
        "세션", "전환", "클릭", "구매", "구매로", "판매", "프로그램", "국가", "상품별", "아이템별",
        "제품별", "지난주", "이번주", "지난달", "이번달", "어제", "오늘", "첫후원", "첫구매",
        "처음후원", "처음구매", "구매한", "사용자수", "사용자 수", "후원자", "구매자", "유형",
        "타입", "전체",
    ])
});

const CHANNEL_TOKENS: &[&str] =
    &["display", "paid", "organic", "direct", "referral", "unassigned", "cross-network"];

/// Extract up to 4 entity terms from the question
pub fn extract_entity_terms(question: &str) -> Vec<String> {
    let q = question.trim();
    if q.is_empty() {
        return Vec::new();
    }

    let mut raw: Vec<String> = Vec::new();
    for cap in QUOTED_RE.captures_iter(q) {
        raw.push(cap[1].to_string());
    }
    for cap in JOSA_CONTEXT_RE.captures_iter(q) {
        raw.push(cap[1].to_string());
    }
    for cap in PAIR_RE.captures_iter(q) {
        raw.push(cap[1].to_string());
        raw.push(cap[2].to_string());
    }
    for cap in POSSESSIVE_RE.captures_iter(q) {
        raw.push(cap[1].to_string());
    }
    for cap in DONATION_RE.captures_iter(q) {
        raw.push(cap[1].to_string());
    }
    let q_lower = q.to_lowercase();
    for token in CHANNEL_TOKENS {
        if q_lower.contains(token) {
            raw.push(token.to_string());
        }
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut terms: Vec<String> = Vec::new();
    for candidate in raw {
        let cleaned = clean_term(&candidate);
        if cleaned.chars().count() < 2 {
            continue;
        }
        if ENTITY_STOPWORDS.contains(cleaned.as_str()) {
            continue;
        }
        let lowered = cleaned.to_lowercase();
        if matches!(lowered.as_str(), "top" | "ga4" | "data" | "report") {
            continue;
        }
        // Condition/axis wording is not an entity
        if ["event", "이벤트", "기준", "purchase", "click", "donation_name"]
            .iter()
            .any(|noise| lowered.contains(noise))
        {
            continue;
        }
        if seen.insert(lowered) {
            terms.push(cleaned);
        }
        if terms.len() >= 4 {
            break;
        }
    }
    terms
}

fn clean_term(term: &str) -> String {
    let mut t = MULTI_SPACE_RE.replace_all(term.trim(), " ").into_owned();
    // "X별 ..." names a breakdown axis, not an entity
    t = BREAKDOWN_TAIL_RE.replace(&t, "").trim().to_string();
    t = RANK_PREFIX_RE.replace(&t, "").trim().to_string();
    t = RANK_TOKEN_RE.replace_all(&t, "").trim().to_string();
    loop {
        let prev = t.clone();
        t = SUFFIX_NOISE_RE.replace(&t, "").trim().to_string();
        t = TRAILING_JOSA_RE.replace(&t, "").trim().to_string();
        if t == prev {
            break;
        }
    }
    QUESTION_PREFIX_RE.replace(&t, "").trim().to_string()
}

/// Extract a snake_case event-name token ("donation_click"). Known
/// custom-parameter names are rejected so "donation_name별" is not an event.
pub fn extract_event_token(question: &str) -> Option<String> {
    let q_lower = question.trim().to_lowercase();
    if q_lower.is_empty() {
        return None;
    }

    if let Some(m) = SNAKE_TOKEN_RE.find(&q_lower) {
        let token = m.as_str();
        if KNOWN_CUSTOM_PARAM_TOKENS.contains(token) {
            return None;
        }
        return Some(token.to_string());
    }

    // "gnb클릭" / "menu 클릭" -> gnb_click / menu_click
    if let Some(cap) = CLICK_SUFFIX_RE.captures(&q_lower) {
        return Some(format!("{}_click", &cap[1]));
    }

    // "이벤트 scroll"
    if let Some(cap) = EVENT_PREFIX_RE.captures(&q_lower) {
        let token = cap[1].replace('-', "_");
        if KNOWN_CUSTOM_PARAM_TOKENS.contains(token.as_str()) {
            return None;
        }
        return Some(token);
    }

    None
}

/// Extract both events of an explicit two-event comparison
pub fn extract_event_pair(question: &str) -> Option<(String, String)> {
    let q_lower = question.trim().to_lowercase();
    let tokens: Vec<&str> = SNAKE_TOKEN_RE
        .find_iter(&q_lower)
        .map(|m| m.as_str())
        .filter(|t| !KNOWN_CUSTOM_PARAM_TOKENS.contains(t))
        .collect();
    if tokens.len() >= 2 && tokens[0] != tokens[1] {
        return Some((tokens[0].to_string(), tokens[1].to_string()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_entity() {
        let terms = extract_entity_terms("\"생일후원\" 매출 알려줘");
        assert_eq!(terms, vec!["생일후원".to_string()]);
    }

    #[test]
    fn test_donation_suffix_entity() {
        let terms = extract_entity_terms("생일후원과 기념일후원 중 어떤게 더 많아?");
        assert!(terms.contains(&"생일후원".to_string()));
        assert!(terms.contains(&"기념일후원".to_string()));
    }

    #[test]
    fn test_channel_token() {
        let terms = extract_entity_terms("display의 소스 매체 알려줘");
        assert!(terms.contains(&"display".to_string()));
    }

    #[test]
    fn test_josa_stripping() {
        assert_eq!(clean_term("생일후원은"), "생일후원");
        assert_eq!(clean_term("display 채널"), "display");
    }

    #[test]
    fn test_stopword_rejected() {
        let terms = extract_entity_terms("상위 항목 정보 알려줘");
        assert!(terms.is_empty());
    }

    #[test]
    fn test_event_token_snake_case() {
        assert_eq!(extract_event_token("donation_click의 donation_name 보여줘"), Some("donation_click".to_string()));
    }

    #[test]
    fn test_event_token_rejects_custom_param() {
        assert_eq!(extract_event_token("donation_name별 이벤트 수"), None);
    }

    #[test]
    fn test_event_token_click_suffix() {
        assert_eq!(extract_event_token("gnb 클릭 횟수 알려줘"), Some("gnb_click".to_string()));
    }

    #[test]
    fn test_event_pair() {
        let pair = extract_event_pair("donation_click과 scroll_event 비교해줘");
        assert_eq!(pair, Some(("donation_click".to_string(), "scroll_event".to_string())));
    }
}
