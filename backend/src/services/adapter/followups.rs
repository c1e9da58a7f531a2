//! Follow-up prompt suggestions (0–3 per response)

pub fn build_followups(question: &str, has_breakdown: bool) -> Vec<String> {
    let q = question.to_lowercase();
    let mut followups = Vec::new();

    let compare_tokens = ["비교", "대비", "증감", "차이", "vs"];
    let relative_period =
        ["지난주", "이번주", "이번달", "지난달"].iter().any(|k| q.contains(k));
    if relative_period && !compare_tokens.iter().any(|t| q.contains(t)) {
        followups.push("이전 기간과 비교해 증감도 보여드릴까요?".to_string());
    }

    if !has_breakdown {
        followups.push("채널별/디바이스별로 나눠서 볼까요?".to_string());
    }

    let topn_friendly =
        ["매출", "이벤트", "구매", "상품", "전환"].iter().any(|k| q.contains(k));
    if topn_friendly && !q.contains("top") && !q.contains("상위") {
        followups.push("상위 항목 TOP 10으로 확장할까요?".to_string());
    }

    if has_breakdown {
        followups.push("상위 항목의 원인 분석까지 이어서 볼까요?".to_string());
    }

    followups.truncate(3);
    followups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_period_suggests_compare() {
        let followups = build_followups("지난주 매출 알려줘", false);
        assert!(followups[0].contains("증감"));
    }

    #[test]
    fn test_compare_question_skips_compare_suggestion() {
        let followups = build_followups("지난주 대비 매출 비교", true);
        assert!(!followups.iter().any(|f| f.contains("증감도 보여드릴까요")));
    }

    #[test]
    fn test_capped_at_three() {
        let followups = build_followups("지난주 매출 알려줘", false);
        assert!(followups.len() <= 3);
    }
}
