//! 3-level intent detection for file questions
//!
//! Level 1 (exploration) and Level 2 (aggregation) run deterministically
//! with no LLM. Level 3 (insight) is the fallback. Pagination requests step
//! through the previous column-probe state.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::state::FileEngineState;
use crate::models::RowTable;

pub const DEFAULT_PAGE_LIMIT: usize = 500;

static RANGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*[-~]\s*(\d+)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileIntentKind {
    Guidance,
    Trend,
    Compare,
    Schema,
    ColumnsSummary,
    Preview,
    Overview,
    ColumnProbe,
    ColumnCount,
    PreviewMore,
    Explain,
    CountUsers,
    CountAdmin,
    Groupby,
    Aggregate,
    Distribution,
    Insight,
}

impl FileIntentKind {
    /// Levels 1 and 2 are answered without the LLM
    pub fn is_deterministic(&self) -> bool {
        !matches!(self, Self::Insight)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileIntent {
    pub kind: FileIntentKind,
    pub target_column: Option<String>,
    pub preview_count: usize,
    pub show_unique: bool,
    pub offset: usize,
}

impl FileIntent {
    fn of(kind: FileIntentKind) -> Self {
        Self { kind, target_column: None, preview_count: 5, show_unique: false, offset: 0 }
    }
}

pub fn detect_intent(question: &str, table: &RowTable, state: &FileEngineState) -> FileIntent {
    let q = question.to_lowercase();
    let mut intent = base_intent(&q, state);

    // Column unique-count beats the generic aggregate intents
    if let Some(column) = detect_column_count(table, question) {
        intent = FileIntent::of(FileIntentKind::ColumnCount);
        intent.target_column = Some(column);
    }

    // Pagination steps through the previous unique-value listing
    if let Some(paged) = detect_pagination(&q, state) {
        intent = paged;
    } else if state.last_meta.show_unique {
        if let Some(target) = &state.last_meta.target_column {
            if ["전체", "목록", "모두", "전체 보여", "다 보여"].iter().any(|k| q.contains(k)) {
                intent = FileIntent::of(FileIntentKind::ColumnProbe);
                intent.target_column = Some(target.clone());
                intent.preview_count = DEFAULT_PAGE_LIMIT;
                intent.show_unique = true;
            }
        }
    }

    if is_preview_more_request(&q) {
        let continuable = matches!(
            state.last_intent,
            Some(
                FileIntentKind::ColumnProbe
                    | FileIntentKind::Schema
                    | FileIntentKind::ColumnsSummary
                    | FileIntentKind::Overview
                    | FileIntentKind::Preview
            )
        );
        if continuable {
            intent = FileIntent::of(FileIntentKind::PreviewMore);
            intent.target_column = state.last_meta.target_column.clone();
            intent.preview_count = 10;
        }
    }

    // An explicitly named column wins the probe
    if let Some(probe) = detect_column_probe(table, question) {
        intent = probe;
    }

    intent
}

fn base_intent(q: &str, state: &FileEngineState) -> FileIntent {
    // Level 1: exploration
    if ["뭘 물어", "어떻게 질문", "뭐부터", "초보", "어렵", "잘 모르"].iter().any(|k| q.contains(k)) {
        return FileIntent::of(FileIntentKind::Guidance);
    }
    if ["추이", "트렌드", "일별", "월별", "변화"].iter().any(|k| q.contains(k)) {
        return FileIntent::of(FileIntentKind::Trend);
    }
    if ["비교", "대비", "vs", "차이"].iter().any(|k| q.contains(k)) {
        return FileIntent::of(FileIntentKind::Compare);
    }
    if ["구조", "컬럼", "열", "schema", "structure"].iter().any(|k| q.contains(k)) {
        return FileIntent::of(FileIntentKind::Schema);
    }
    if ["어떤 데이터", "무슨 데이터", "또 어떤", "컬럼 뭐", "항목 뭐", "뭐가 들어", "무엇이 들어", "어떤게 있어"]
        .iter()
        .any(|k| q.contains(k))
    {
        return FileIntent::of(FileIntentKind::ColumnsSummary);
    }
    if ["행", "샘플", "예시", "preview", "sample", "보여줘", "raw data"].iter().any(|k| q.contains(k)) {
        return FileIntent::of(FileIntentKind::Preview);
    }
    if ["개요", "요약", "overview", "summary", "전체"].iter().any(|k| q.contains(k)) {
        return FileIntent::of(FileIntentKind::Overview);
    }

    // Level 2: aggregation
    if ["별", "타입별", "종류별", "카테고리별", "by ", "그룹"].iter().any(|k| q.contains(k)) {
        return FileIntent::of(FileIntentKind::Groupby);
    }
    if ["평균", "average", "avg", "mean"].iter().any(|k| q.contains(k)) {
        return FileIntent::of(FileIntentKind::Aggregate);
    }
    if ["합계", "총", "sum", "total"].iter().any(|k| q.contains(k)) {
        return FileIntent::of(FileIntentKind::Aggregate);
    }
    if ["개수", "count", "몇 개", "몇개"].iter().any(|k| q.contains(k)) {
        return FileIntent::of(FileIntentKind::Aggregate);
    }

    // In-file user/admin counting
    let count_words = ["얼마나", "몇", "수", "명", "몇명", "몇 명"];
    if ["사용자", "유저", "회원", "인원", "사람"].iter().any(|k| q.contains(k))
        && count_words.iter().any(|k| q.contains(k))
    {
        return FileIntent::of(FileIntentKind::CountUsers);
    }
    if ["어드민", "관리자", "admin"].iter().any(|k| q.contains(k))
        && ["얼마나", "몇", "수"].iter().any(|k| q.contains(k))
    {
        return FileIntent::of(FileIntentKind::CountAdmin);
    }
    if ["무슨 뜻", "뜻이", "의미", "그게 무슨"].iter().any(|k| q.contains(k)) {
        return FileIntent::of(FileIntentKind::Explain);
    }

    // Bare agreement repeats the previous analysis
    if ["응", "그래", "설명해줘"].iter().any(|k| q.contains(k)) {
        if let Some(last) = state.last_intent {
            let mut intent = FileIntent::of(last);
            intent.target_column = state.last_meta.target_column.clone();
            return intent;
        }
    }

    FileIntent::of(FileIntentKind::Insight)
}

fn detect_pagination(q: &str, state: &FileEngineState) -> Option<FileIntent> {
    if !state.last_meta.show_unique {
        return None;
    }
    let target = state.last_meta.target_column.clone()?;

    let next = ["다음", "계속", "이어", "more", "next"].iter().any(|k| q.contains(k));
    let prev = ["이전", "앞", "prev", "previous"].iter().any(|k| q.contains(k));
    if !next && !prev {
        return None;
    }

    let limit = if state.last_meta.page_limit > 0 {
        state.last_meta.page_limit
    } else {
        DEFAULT_PAGE_LIMIT
    };
    let last_offset = state.last_meta.page_offset;
    let offset = if next {
        last_offset + limit
    } else {
        last_offset.saturating_sub(limit)
    };

    let mut intent = FileIntent::of(FileIntentKind::ColumnProbe);
    intent.target_column = Some(target);
    intent.preview_count = limit;
    intent.show_unique = true;
    intent.offset = offset;
    Some(intent)
}

fn is_preview_more_request(q: &str) -> bool {
    ["더 보기", "더보여", "추가로 보여", "샘플 10", "10행"].iter().any(|k| q.contains(k))
}

fn detect_column_probe(table: &RowTable, question: &str) -> Option<FileIntent> {
    let q = question.to_lowercase();
    let ask_value = [
        "어떤 데이터", "어떤 값", "값이 뭐", "내용이 뭐", "샘플", "미리보기", "1-5", "1~5", "5행",
        "목록", "종류", "전체", "모두", "고유값",
    ]
    .iter()
    .any(|k| q.contains(k));
    if !ask_value {
        return None;
    }

    let target = find_mentioned_column(table, question)?;

    let mut preview_count = 5;
    if let Some(cap) = RANGE_RE.captures(&q) {
        if let (Ok(start), Ok(end)) = (cap[1].parse::<usize>(), cap[2].parse::<usize>()) {
            if end >= start {
                preview_count = (end - start + 1).clamp(1, 20);
            }
        }
    }
    let show_unique = ["전체", "모두", "목록", "종류", "고유값"].iter().any(|k| q.contains(k));
    if show_unique {
        preview_count = DEFAULT_PAGE_LIMIT;
    }

    let mut intent = FileIntent::of(FileIntentKind::ColumnProbe);
    intent.target_column = Some(target);
    intent.preview_count = preview_count;
    intent.show_unique = show_unique;
    Some(intent)
}

fn detect_column_count(table: &RowTable, question: &str) -> Option<String> {
    let q = question.to_lowercase();
    if !["몇개", "몇 개", "개수", "고유값", "unique"].iter().any(|k| q.contains(k)) {
        return None;
    }
    if let Some(column) = find_mentioned_column(table, question) {
        return Some(column);
    }

    // Well-known id aliases still resolve without a literal column mention
    let id_aliases =
        ["회원번호", "member_no", "memberid", "member_id", "moc_idx", "user_id", "uid"];
    if id_aliases.iter().any(|a| q.contains(a)) {
        for column in &table.columns {
            let cl = column.to_lowercase();
            if id_aliases.iter().any(|a| cl.contains(a)) {
                return Some(column.clone());
            }
        }
    }
    None
}

fn find_mentioned_column(table: &RowTable, question: &str) -> Option<String> {
    let q = question.to_lowercase();
    table
        .columns
        .iter()
        .find(|c| {
            let cl = c.to_lowercase();
            !cl.is_empty() && (q.contains(&cl) || question.contains(c.as_str()))
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;

    fn table() -> RowTable {
        let mut t = RowTable::new(vec!["후원유형".to_string(), "결제금액".to_string()]);
        t.push_row(vec![Value::Str("정기".into()), Value::Num(1000.0)]);
        t
    }

    #[test]
    fn test_schema_intent() {
        let intent = detect_intent("파일 구조 알려줘", &table(), &FileEngineState::default());
        assert_eq!(intent.kind, FileIntentKind::Schema);
    }

    #[test]
    fn test_groupby_intent() {
        let intent =
            detect_intent("후원유형별 결제금액 합계", &table(), &FileEngineState::default());
        assert_eq!(intent.kind, FileIntentKind::Groupby);
    }

    #[test]
    fn test_count_users_intent() {
        let intent =
            detect_intent("이 파일에 사용자가 몇 명이야?", &table(), &FileEngineState::default());
        assert_eq!(intent.kind, FileIntentKind::CountUsers);
    }

    #[test]
    fn test_column_probe_with_unique() {
        let intent =
            detect_intent("후원유형 고유값 전체 보여줘", &table(), &FileEngineState::default());
        assert_eq!(intent.kind, FileIntentKind::ColumnProbe);
        assert_eq!(intent.target_column.as_deref(), Some("후원유형"));
        assert!(intent.show_unique);
    }

    #[test]
    fn test_column_count() {
        let intent = detect_intent("후원유형 고유값 몇개야?", &table(), &FileEngineState::default());
        // Probing wins when 고유값 listing keywords are present with a column
        assert!(matches!(
            intent.kind,
            FileIntentKind::ColumnProbe | FileIntentKind::ColumnCount
        ));
        assert_eq!(intent.target_column.as_deref(), Some("후원유형"));
    }

    #[test]
    fn test_pagination_next() {
        let mut state = FileEngineState::default();
        state.last_meta.show_unique = true;
        state.last_meta.target_column = Some("후원유형".to_string());
        state.last_meta.page_offset = 0;
        state.last_meta.page_limit = 500;

        let intent = detect_intent("다음 500개 보여줘", &table(), &state);
        assert_eq!(intent.kind, FileIntentKind::ColumnProbe);
        assert_eq!(intent.offset, 500);
    }

    #[test]
    fn test_pagination_prev_clamps_at_zero() {
        let mut state = FileEngineState::default();
        state.last_meta.show_unique = true;
        state.last_meta.target_column = Some("후원유형".to_string());
        state.last_meta.page_offset = 0;
        state.last_meta.page_limit = 500;

        let intent = detect_intent("이전 500개", &table(), &state);
        assert_eq!(intent.offset, 0);
    }

    #[test]
    fn test_insight_fallback() {
        let intent = detect_intent(
            "이 데이터에서 주목할 인사이트 뽑아줘",
            &table(),
            &FileEngineState::default(),
        );
        assert_eq!(intent.kind, FileIntentKind::Insight);
    }
}
