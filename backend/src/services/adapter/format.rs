//! Value formatting rules
//!
//! Units are inferred from the metric key. Formatting is idempotent: running
//! a formatted string back through produces the same string, because parsing
//! strips the unit and the re-applied rules reproduce it.

use crate::models::Value;

/// Infer the display unit from a metric key
pub fn metric_unit(metric_key: &str) -> &'static str {
    let mk = metric_key.to_lowercase();
    if mk.contains("rate") || mk.contains("ratio") {
        return "%";
    }
    if ["revenue", "amount", "adspend", "tax", "shipping", "refund"]
        .iter()
        .any(|k| mk.contains(k))
    {
        return "원";
    }
    if ["user", "visitor", "purchaser", "buyer"].iter().any(|k| mk.contains(k)) {
        return "명";
    }
    if ["session", "event", "transaction", "purchase"].iter().any(|k| mk.contains(k)) {
        return "회";
    }
    ""
}

/// Format a raw cell with a unit. Rate values in [0, 1] are scaled to
/// percent; currency is rounded to whole won.
pub fn format_with_unit(value: &Value, unit: &str) -> String {
    let Some(mut num) = value.to_number() else {
        return value.display();
    };
    if unit == "%" && (0.0..=1.0).contains(&num) {
        num *= 100.0;
    }
    let text = if unit == "원" {
        group_thousands(num.round() as i64)
    } else {
        format_number(num)
    };
    format!("{}{}", text, unit)
}

/// Format a metric value by key
pub fn format_metric_value(metric_key: &str, value: &Value) -> String {
    format_with_unit(value, metric_unit(metric_key))
}

/// Plain number: thousands separators, two decimals only when fractional
pub fn format_number(num: f64) -> String {
    if !num.is_finite() {
        return String::new();
    }
    if num.fract() == 0.0 {
        group_thousands(num as i64)
    } else {
        let rounded = (num * 100.0).round() / 100.0;
        if rounded.fract() == 0.0 {
            group_thousands(rounded as i64)
        } else {
            let int_part = rounded.trunc() as i64;
            let frac = (rounded.fract().abs() * 100.0).round() as i64;
            format!("{}.{:02}", group_thousands(int_part), frac)
        }
    }
}

pub fn group_thousands(n: i64) -> String {
    let negative = n < 0;
    let digits = n.abs().to_string();
    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if negative {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// `yearMonth` values render as YYYY-MM, never with separators
pub fn format_year_month(label: &str) -> String {
    let digits: String = label.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 6 {
        format!("{}-{}", &digits[..4], &digits[4..])
    } else {
        label.to_string()
    }
}

/// Unit inference for arbitrary display keys (file columns, custom params)
pub fn infer_display_unit(key: &str) -> &'static str {
    let lk = key.to_lowercase();
    if lk.contains("rate") || lk.contains("ratio") || key.contains("비율") || key.contains('율') {
        return "%";
    }
    if lk.contains("revenue") || key.contains("매출") {
        return "원";
    }
    if ["user", "purchaser", "buyer", "visitor"].iter().any(|k| lk.contains(k)) {
        return "명";
    }
    if ["event", "session", "transaction", "purchase"].iter().any(|k| lk.contains(k)) {
        return "회";
    }
    ""
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_unit_inference() {
        assert_eq!(metric_unit("purchaseRevenue"), "원");
        assert_eq!(metric_unit("activeUsers"), "명");
        assert_eq!(metric_unit("sessions"), "회");
        assert_eq!(metric_unit("engagementRate"), "%");
        assert_eq!(metric_unit("screenPageViews"), "");
    }

    #[test]
    fn test_currency_format() {
        assert_eq!(format_with_unit(&Value::Num(1234567.4), "원"), "1,234,567원");
    }

    #[test]
    fn test_rate_scaling() {
        assert_eq!(format_with_unit(&Value::Num(0.4523), "%"), "45.23%");
        assert_eq!(format_with_unit(&Value::Num(45.0), "%"), "45%");
    }

    #[test]
    fn test_formatting_idempotent() {
        for (value, unit) in [
            (Value::Num(1234567.0), "원"),
            (Value::Num(0.45), "%"),
            (Value::Num(320.0), "명"),
            (Value::Num(1234.5), ""),
        ] {
            let once = format_with_unit(&value, unit);
            let twice = format_with_unit(&Value::Str(once.clone()), unit);
            assert_eq!(once, twice, "unit {:?}", unit);
        }
    }

    #[test]
    fn test_year_month_format() {
        assert_eq!(format_year_month("202602"), "2026-02");
        assert_eq!(format_year_month("2026-02"), "2026-02");
        assert_eq!(format_year_month("abc"), "abc");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(-12345), "-12,345");
    }
}
