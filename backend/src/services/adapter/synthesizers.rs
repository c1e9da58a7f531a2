//! Domain message synthesizers
//!
//! Pure functions over the merged breakdown rows. Each one checks its own
//! preconditions against the question and returns a ready Korean message when
//! they hold. Every number in the output comes from the rows.

use once_cell::sync::Lazy;
use regex::Regex;

use super::format::{format_number, format_with_unit};
use crate::models::{RowTable, Value};

static DONATION_KEYWORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([가-힣A-Za-z0-9_]+후원)").unwrap());

/// Preferred label columns when picking the dimension rows are filtered on
const PREFERRED_FILTER_DIMENSIONS: &[&str] = &[
    "customEvent:menu_name",
    "customEvent:donation_name",
    "customEvent:click_text",
    "itemName",
    "eventName",
    "defaultChannelGroup",
    "sourceMedium",
    "source",
    "medium",
    "landingPage",
    "pagePath",
    "pageTitle",
    "itemBrand",
    "itemCategory",
];

pub fn select_filter_dimension(table: &RowTable) -> Option<usize> {
    if table.is_empty() {
        return None;
    }
    for preferred in PREFERRED_FILTER_DIMENSIONS {
        if let Some(col) = table.col_index(preferred) {
            if table.cell(0, col).map(|v| v.to_number().is_none()).unwrap_or(false) {
                return Some(col);
            }
        }
    }
    table.first_label_column()
}

/// Column the question is focused on, when it names a known custom parameter
pub fn question_focus_dimension(question: &str, table: &RowTable) -> Option<usize> {
    if table.is_empty() {
        return None;
    }
    let q = question.to_lowercase();
    let focus = if ["메뉴", "menu", "gnb", "lnb"].iter().any(|k| q.contains(k)) {
        "customEvent:menu_name"
    } else if ["후원명", "donation_name", "후원 유형", "후원유형"].iter().any(|k| q.contains(k)) {
        "customEvent:donation_name"
    } else if ["스크롤", "scroll"].iter().any(|k| q.contains(k)) {
        "customEvent:percent_scrolled"
    } else if ["버튼", "button"].iter().any(|k| q.contains(k)) {
        "customEvent:button_name"
    } else {
        return None;
    };
    table.col_index(focus)
}

/// Drop blank-like rows on the anchor dimension. With `force` (the
/// exclude-notset modifier) blanks never survive; otherwise rows come back
/// unchanged when cleaning would empty the result.
pub fn clean_display_rows(table: &RowTable, preferred: Option<usize>, force: bool) -> RowTable {
    let Some(dim_col) = preferred.or_else(|| select_filter_dimension(table)) else {
        return table.clone();
    };

    let cleaned = table.filtered(|row| {
        row.get(dim_col).map(|v| !v.is_blank_like()).unwrap_or(false)
    });

    if force {
        return cleaned;
    }
    if cleaned.is_empty() {
        // Nothing real collected; let the data-quality warning explain it
        return if table.column_values(dim_col).all(|v| v.is_blank_like()) {
            cleaned
        } else {
            table.clone()
        };
    }
    cleaned
}

/// Warn when the question's focus parameter is mostly uncollected
pub fn data_quality_warning(question: &str, table: &RowTable) -> Option<String> {
    let focus_col = question_focus_dimension(question, table)?;
    let total = table.len();
    if total == 0 {
        return None;
    }
    let valid = table
        .column_values(focus_col)
        .filter(|v| !v.is_blank_like())
        .count();
    let label = table.columns[focus_col]
        .trim_start_matches("customEvent:")
        .to_string();
    if valid == 0 {
        return Some(format!(
            "현재 기간에는 `{}` 값이 수집되지 않았습니다. 커스텀 정의/이벤트 전송을 점검해 주세요.",
            label
        ));
    }
    let ratio = valid as f64 / total as f64;
    if ratio < 0.3 {
        return Some(format!(
            "`{}` 값의 유효 수집 비율이 낮습니다({}/{}). 해석 시 주의가 필요합니다.",
            label, valid, total
        ));
    }
    None
}

/// Keep only rows whose anchor dimension mentions one of the entity terms;
/// an empty result falls back to the original rows.
pub fn filter_rows_by_entity_terms(table: &RowTable, terms: &[String]) -> RowTable {
    if table.is_empty() || terms.is_empty() {
        return table.clone();
    }
    let Some(dim_col) = select_filter_dimension(table) else {
        return table.clone();
    };
    let filtered = table.filtered(|row| {
        let label = row.get(dim_col).map(|v| v.display()).unwrap_or_default();
        terms.iter().any(|t| label.contains(t.as_str()))
    });
    if filtered.is_empty() {
        table.clone()
    } else {
        filtered
    }
}

fn first_numeric_col(table: &RowTable) -> Option<usize> {
    let first = table.rows.first()?;
    first.iter().position(|v| v.to_number().is_some())
}

fn revenue_unit(metric_key: &str) -> &'static str {
    if metric_key.to_lowercase().contains("revenue") || metric_key.contains("매출") {
        "원"
    } else {
        ""
    }
}

/// 비중/구성비 questions naming ≥2 "~후원" keywords: share of each keyword
/// over the primary metric, plus 기타.
pub fn named_ratio_message(question: &str, table: &RowTable) -> Option<String> {
    let q = question.to_lowercase();
    if !["비중", "구성비", "비율", "점유율"].iter().any(|k| q.contains(k)) {
        return None;
    }
    let keywords = donation_keywords(question);
    if keywords.len() < 2 || table.is_empty() {
        return None;
    }

    let label_col = table.first_label_column()?;
    let metric_col = first_numeric_col(table)?;
    let metric_key = &table.columns[metric_col];

    let mut buckets: Vec<(String, f64)> = keywords.iter().map(|k| (k.clone(), 0.0)).collect();
    let mut total = 0.0;
    for row in &table.rows {
        let label = row.get(label_col).map(|v| v.display()).unwrap_or_default();
        let value = row.get(metric_col).and_then(|v| v.to_number()).unwrap_or(0.0);
        if value < 0.0 {
            continue;
        }
        total += value;
        for (keyword, sum) in buckets.iter_mut() {
            if label.contains(keyword.as_str()) {
                *sum += value;
                break;
            }
        }
    }

    let focus_total: f64 = buckets.iter().map(|(_, v)| v).sum();
    if focus_total <= 0.0 {
        return None;
    }

    let unit = revenue_unit(metric_key);
    let mut lines = vec!["요청하신 후원 유형 비중입니다.".to_string()];
    for (keyword, value) in &buckets {
        let share = value / focus_total * 100.0;
        lines.push(format!(
            "- {}: **{}** ({:.1}%)",
            keyword,
            format_with_unit(&Value::Num(*value), unit),
            share
        ));
    }
    let other = (total - focus_total).max(0.0);
    if other > 0.0 {
        lines.push(format!("- 기타: **{}**", format_with_unit(&Value::Num(other), unit)));
    }
    Some(lines.join("\n"))
}

fn donation_keywords(question: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut keywords = Vec::new();
    for cap in DONATION_KEYWORD_RE.captures_iter(question) {
        let token = cap[1].trim().to_string();
        if !token.is_empty() && seen.insert(token.clone()) {
            keywords.push(token);
        }
        if keywords.len() >= 3 {
            break;
        }
    }
    keywords
}

/// "A와 B 중 어떤게 더 많아?" with exactly two entity terms
pub fn dual_entity_message(question: &str, table: &RowTable, terms: &[String]) -> Option<String> {
    let q = question.to_lowercase();
    if !["중", "어떤게", "어느", "많아", "더"].iter().any(|k| q.contains(k)) {
        return None;
    }
    if terms.len() < 2 || table.is_empty() {
        return None;
    }

    let label_col = select_filter_dimension(table)?;
    let metric_col = first_numeric_col(table)?;
    let metric_key = &table.columns[metric_col];

    let (first, second) = (&terms[0], &terms[1]);
    let mut totals = [0.0f64, 0.0f64];
    for row in &table.rows {
        let label = row.get(label_col).map(|v| v.display()).unwrap_or_default();
        let value = row.get(metric_col).and_then(|v| v.to_number()).unwrap_or(0.0);
        if label.contains(first.as_str()) {
            totals[0] += value;
        } else if label.contains(second.as_str()) {
            totals[1] += value;
        }
    }
    if totals[0] == 0.0 && totals[1] == 0.0 {
        return None;
    }

    let winner = if totals[0] >= totals[1] { first } else { second };
    let unit = revenue_unit(metric_key);
    Some(format!(
        "{} vs {} 비교 결과, **{}**이(가) 더 큽니다.\n- {}: **{}**\n- {}: **{}**",
        first,
        second,
        winner,
        first,
        format_with_unit(&Value::Num(totals[0]), unit),
        second,
        format_with_unit(&Value::Num(totals[1]), unit),
    ))
}

/// 해외/국내 partition over a country column
pub fn domestic_overseas_message(question: &str, table: &RowTable) -> Option<String> {
    let q = question.to_lowercase();
    if !(q.contains("해외") && q.contains("국내")) {
        return None;
    }
    if table.is_empty() {
        return None;
    }

    let country_col = table.columns.iter().position(|c| {
        c.to_lowercase().contains("country")
    })?;
    let metric_col = first_numeric_col(table)?;
    let metric_key = &table.columns[metric_col];

    let mut domestic = 0.0;
    let mut overseas = 0.0;
    for row in &table.rows {
        let country = row
            .get(country_col)
            .map(|v| v.display().to_lowercase())
            .unwrap_or_default();
        let value = row.get(metric_col).and_then(|v| v.to_number()).unwrap_or(0.0);
        if ["south korea", "korea", "대한민국", "한국"].contains(&country.as_str()) {
            domestic += value;
        } else {
            overseas += value;
        }
    }
    if domestic == 0.0 && overseas == 0.0 {
        return None;
    }

    let total = domestic + overseas;
    let unit = revenue_unit(metric_key);
    Some(format!(
        "국내(대한민국) vs 해외(기타 국가) 비교입니다.\n- 국내: **{}** ({:.1}%)\n- 해외: **{}** ({:.1}%)",
        format_with_unit(&Value::Num(domestic), unit),
        if total > 0.0 { domestic / total * 100.0 } else { 0.0 },
        format_with_unit(&Value::Num(overseas), unit),
        if total > 0.0 { overseas / total * 100.0 } else { 0.0 },
    ))
}

/// Click→purchase conversion per donation-type bucket
pub fn conversion_message(question: &str, table: &RowTable) -> Option<String> {
    let q = question.to_lowercase();
    let asks_rate = ["전환", "비율", "율"].iter().any(|k| q.contains(k));
    let asks_funnel = ["클릭", "구매"].iter().any(|k| q.contains(k));
    if !asks_rate || !asks_funnel || table.is_empty() {
        return None;
    }

    let donation_col = table
        .columns
        .iter()
        .position(|c| c.to_lowercase().contains("is_regular_donation"))?;
    let event_col = table
        .columns
        .iter()
        .position(|c| c.to_lowercase().contains("eventname"))?;
    let metric_col = first_numeric_col(table)?;

    let mut buckets: Vec<(String, f64, f64)> = Vec::new();
    for row in &table.rows {
        let bucket = row.get(donation_col).map(|v| v.display()).unwrap_or_default();
        let event = row
            .get(event_col)
            .map(|v| v.display().to_lowercase())
            .unwrap_or_default();
        let value = row.get(metric_col).and_then(|v| v.to_number()).unwrap_or(0.0);

        let entry = match buckets.iter_mut().find(|(b, _, _)| *b == bucket) {
            Some(entry) => entry,
            None => {
                buckets.push((bucket, 0.0, 0.0));
                buckets.last_mut().expect("just pushed")
            },
        };
        if event.contains("purchase") || event.contains("구매") {
            entry.2 += value;
        } else if event.contains("click") || event.contains("클릭") || event.contains("select") {
            entry.1 += value;
        }
    }

    let mut lines = vec!["후원 유형별 전환율(구매/클릭)입니다.".to_string()];
    let mut any_valid = false;
    for (bucket, clicks, purchases) in &buckets {
        if *clicks > 0.0 {
            let rate = purchases / clicks * 100.0;
            lines.push(format!(
                "- {}: 클릭 {}회, 구매 {}회, 전환율 **{:.1}%**",
                bucket,
                format_number(*clicks),
                format_number(*purchases),
                rate
            ));
            any_valid = true;
        }
    }
    any_valid.then(|| lines.join("\n"))
}

/// Parameter/상세 questions over item or custom-parameter rows: unique
/// values per relevant dimension for the extracted entity.
pub fn item_profile_message(question: &str, table: &RowTable, terms: &[String]) -> Option<String> {
    let q = question.to_lowercase();
    let triggers = [
        "매개변수", "파라미터", "parameter", "상세", "정보", "더 알 수", "is_regular_donation",
        "donation_name", "country_name", "menu_name", "메뉴명",
    ];
    if !triggers.iter().any(|k| q.contains(k)) || table.is_empty() {
        return None;
    }

    let has_custom = table.columns.iter().any(|c| c.starts_with("customEvent:"));
    let item_col = table.col_index("itemName");
    if item_col.is_none() && !has_custom {
        return None;
    }

    let target = terms.first().cloned().unwrap_or_else(|| "요청 항목".to_string());
    let filtered = match item_col {
        Some(col) => {
            let narrowed = table.filtered(|row| {
                row.get(col).map(|v| v.display().contains(target.as_str())).unwrap_or(false)
            });
            if narrowed.is_empty() { table.clone() } else { narrowed }
        },
        None => table.clone(),
    };

    let mut lines = vec![
        format!("**{}** 관련 항목을 기준으로 확인한 추가 정보입니다.", target),
        format!("- 관련 항목 수: **{}개**", filtered.len()),
    ];

    for key in ["itemCategory", "itemBrand", "itemVariant"] {
        if let Some(col) = filtered.col_index(key) {
            let values = unique_values(&filtered, col, 5);
            if !values.is_empty() {
                lines.push(format!("- {}: {}", key, values.join(", ")));
            }
        }
    }

    let custom_cols: Vec<usize> = filtered
        .columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.starts_with("customEvent:"))
        .map(|(i, _)| i)
        .take(8)
        .collect();
    for col in custom_cols {
        let values = unique_values(&filtered, col, 6);
        if !values.is_empty() {
            let pretty = filtered.columns[col].trim_start_matches("customEvent:");
            lines.push(format!("- {}: {}", pretty, values.join(", ")));
        }
    }

    if let Some(metric_col) = first_numeric_col(&filtered) {
        let metric_key = filtered.columns[metric_col].clone();
        let total: f64 = filtered
            .column_values(metric_col)
            .filter_map(|v| v.to_number())
            .sum();
        lines.push(format!(
            "- {} 합계: **{}**",
            metric_key,
            format_with_unit(&Value::Num(total), revenue_unit(&metric_key))
        ));
    }

    Some(lines.join("\n"))
}

fn unique_values(table: &RowTable, col: usize, cap: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut values = Vec::new();
    for v in table.column_values(col) {
        let text = v.display().trim().to_string();
        if text.is_empty() || v.to_number().is_some() {
            continue;
        }
        if seen.insert(text.clone()) {
            values.push(text);
        }
        if values.len() >= cap {
            break;
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    fn donation_rows() -> RowTable {
        let mut t = RowTable::new(vec![
            "customEvent:donation_name".to_string(),
            "purchaseRevenue".to_string(),
        ]);
        t.push_row(vec![Value::Str("생일후원 A".into()), Value::Num(700.0)]);
        t.push_row(vec![Value::Str("기념일후원 B".into()), Value::Num(300.0)]);
        t.push_row(vec![Value::Str("일반 모금".into()), Value::Num(500.0)]);
        t
    }

    #[test]
    fn test_named_ratio() {
        let msg =
            named_ratio_message("생일후원과 기념일후원 비중 알려줘", &donation_rows()).unwrap();
        assert!(msg.contains("생일후원"));
        assert!(msg.contains("70.0%"));
        assert!(msg.contains("30.0%"));
        assert!(msg.contains("기타"));
    }

    #[test]
    fn test_named_ratio_requires_two_keywords() {
        assert!(named_ratio_message("생일후원 비중", &donation_rows()).is_none());
    }

    #[test]
    fn test_dual_entity_compare() {
        let terms = vec!["생일후원".to_string(), "기념일후원".to_string()];
        let msg = dual_entity_message(
            "생일후원과 기념일후원 중 어떤게 더 많아?",
            &donation_rows(),
            &terms,
        )
        .unwrap();
        assert!(msg.contains("**생일후원**"));
    }

    #[test]
    fn test_domestic_overseas() {
        let mut t = RowTable::new(vec!["country".to_string(), "purchaseRevenue".to_string()]);
        t.push_row(vec![Value::Str("South Korea".into()), Value::Num(600.0)]);
        t.push_row(vec![Value::Str("Japan".into()), Value::Num(400.0)]);
        let msg = domestic_overseas_message("국내와 해외 매출 비교", &t).unwrap();
        assert!(msg.contains("60.0%"));
        assert!(msg.contains("40.0%"));
    }

    #[test]
    fn test_conversion_rate() {
        let mut t = RowTable::new(vec![
            "customEvent:is_regular_donation".to_string(),
            "eventName".to_string(),
            "eventCount".to_string(),
        ]);
        t.push_row(vec![
            Value::Str("정기".into()),
            Value::Str("donation_click".into()),
            Value::Num(200.0),
        ]);
        t.push_row(vec![
            Value::Str("정기".into()),
            Value::Str("purchase".into()),
            Value::Num(50.0),
        ]);
        let msg = conversion_message("후원 유형별 클릭 대비 구매 전환율", &t).unwrap();
        assert!(msg.contains("25.0%"));
    }

    #[test]
    fn test_clean_display_rows_force() {
        let mut t = RowTable::new(vec!["defaultChannelGroup".to_string(), "sessions".to_string()]);
        t.push_row(vec![Value::Str("(not set)".into()), Value::Num(5.0)]);
        t.push_row(vec![Value::Str("Direct".into()), Value::Num(9.0)]);
        let cleaned = clean_display_rows(&t, None, true);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned.cell(0, 0), Some(&Value::Str("Direct".into())));
    }

    #[test]
    fn test_clean_display_rows_all_blank_returns_empty() {
        let mut t = RowTable::new(vec!["customEvent:menu_name".to_string(), "eventCount".to_string()]);
        t.push_row(vec![Value::Str("(not set)".into()), Value::Num(5.0)]);
        let cleaned = clean_display_rows(&t, None, false);
        assert!(cleaned.is_empty());
    }

    #[test]
    fn test_data_quality_warning() {
        let mut t = RowTable::new(vec!["customEvent:menu_name".to_string(), "eventCount".to_string()]);
        for _ in 0..9 {
            t.push_row(vec![Value::Str("(not set)".into()), Value::Num(1.0)]);
        }
        t.push_row(vec![Value::Str("기부하기".into()), Value::Num(1.0)]);
        let warning = data_quality_warning("메뉴명별로 보여줘", &t).unwrap();
        assert!(warning.contains("menu_name"));
        assert!(warning.contains("1/10"));
    }

    #[test]
    fn test_entity_filter_falls_back_when_no_match() {
        let table = donation_rows();
        let filtered =
            filter_rows_by_entity_terms(&table, &["존재하지않는항목".to_string()]);
        assert_eq!(filtered.len(), table.len());
    }
}
