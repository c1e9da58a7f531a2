//! Korean date-range parsing
//!
//! Relative shift ("그 전주") takes priority over period phrases, which take
//! priority over explicit dates. All week math is ISO (Monday start).

use chrono::{Datelike, Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static EXPLICIT_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})[-./](\d{1,2})[-./](\d{1,2})").unwrap());
static MONTH_DAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2})월\s*(\d{1,2})일").unwrap());
static MONTH_ONLY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2})월").unwrap());

/// Resolved date window; both ends inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub is_relative_shift: bool,
}

impl DateRange {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self { start_date, end_date, is_relative_shift: false }
    }

    pub fn label(&self) -> String {
        format!("{} ~ {}", self.start_date, self.end_date)
    }
}

/// Reference-date context handed to the parsing layer; injectable for tests
#[derive(Debug, Clone, Copy)]
pub struct DateContext {
    pub today: NaiveDate,
}

impl DateContext {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn current() -> Self {
        Self { today: chrono::Local::now().date_naive() }
    }

    pub fn last_week(&self) -> DateRange {
        let monday = self.today - Duration::days(self.today.weekday().num_days_from_monday() as i64 + 7);
        DateRange::new(monday, monday + Duration::days(6))
    }

    pub fn this_week(&self) -> DateRange {
        let monday = self.today - Duration::days(self.today.weekday().num_days_from_monday() as i64);
        DateRange::new(monday, self.today)
    }

    pub fn last_month(&self) -> DateRange {
        let first_this_month = self.today.with_day(1).unwrap_or(self.today);
        let end = first_this_month - Duration::days(1);
        let start = end.with_day(1).unwrap_or(end);
        DateRange::new(start, end)
    }

    pub fn this_month(&self) -> DateRange {
        DateRange::new(self.today.with_day(1).unwrap_or(self.today), self.today)
    }

    /// Default analysis window when nothing else resolves
    pub fn default_window(&self) -> DateRange {
        DateRange::new(self.today - Duration::days(7), self.today)
    }
}

pub struct DateParser;

impl DateParser {
    /// Extract a date window from the question.
    ///
    /// `last_dates` is the previous turn's window, needed only for the
    /// relative-shift rule.
    pub fn parse(
        question: &str,
        last_dates: Option<(NaiveDate, NaiveDate)>,
        ctx: &DateContext,
    ) -> Option<DateRange> {
        let q = question.to_lowercase();

        // 1. Relative shift: "그 전주" (or bare "전주" outside 지난주/이번주)
        let wants_shift =
            q.contains("그 전주") || (q.contains("전주") && !q.contains("지난주") && !q.contains("이번주"));
        if wants_shift {
            if let Some((start, end)) = last_dates {
                let shifted = DateRange {
                    start_date: start - Duration::days(7),
                    end_date: end - Duration::days(7),
                    is_relative_shift: true,
                };
                tracing::info!("Relative shift detected: {}", shifted.label());
                return Some(shifted);
            }
        }

        // 2. Standard period phrases, first match wins
        if q.contains("지난주") {
            return Some(ctx.last_week());
        }
        if q.contains("이번주") {
            return Some(ctx.this_week());
        }
        if q.contains("지난달") {
            return Some(ctx.last_month());
        }
        if q.contains("이번달") {
            return Some(ctx.this_month());
        }
        if q.contains("어제") {
            let y = ctx.today - Duration::days(1);
            return Some(DateRange::new(y, y));
        }
        if q.contains("오늘") {
            return Some(DateRange::new(ctx.today, ctx.today));
        }

        // 3. Explicit dates
        Self::parse_explicit(&q, ctx)
    }

    fn parse_explicit(q: &str, ctx: &DateContext) -> Option<DateRange> {
        let mut found: Vec<NaiveDate> = Vec::new();
        for cap in EXPLICIT_DATE_RE.captures_iter(q) {
            let year: i32 = cap[1].parse().ok()?;
            let month: u32 = cap[2].parse().ok()?;
            let day: u32 = cap[3].parse().ok()?;
            if let Some(d) = NaiveDate::from_ymd_opt(year, month, day) {
                found.push(d);
            }
        }

        if found.is_empty() {
            // "3월 5일" style, current year assumed
            for cap in MONTH_DAY_RE.captures_iter(q) {
                let month: u32 = cap[1].parse().ok()?;
                let day: u32 = cap[2].parse().ok()?;
                if let Some(d) = NaiveDate::from_ymd_opt(ctx.today.year(), month, day) {
                    found.push(d);
                }
            }
        }

        if found.len() >= 2 {
            let start = found[0].min(found[1]);
            let end = found[0].max(found[1]);
            return Some(DateRange::new(start, end));
        }
        if found.len() == 1 {
            return Some(DateRange::new(found[0], found[0]));
        }

        // "3월" alone: that month of the current year
        if MONTH_DAY_RE.captures(q).is_none() {
            if let Some(cap) = MONTH_ONLY_RE.captures(q) {
                let month: u32 = cap[1].parse().ok()?;
                let start = NaiveDate::from_ymd_opt(ctx.today.year(), month, 1)?;
                let end = if month == ctx.today.month() && start <= ctx.today {
                    ctx.today
                } else {
                    let next = if month == 12 {
                        NaiveDate::from_ymd_opt(ctx.today.year() + 1, 1, 1)?
                    } else {
                        NaiveDate::from_ymd_opt(ctx.today.year(), month + 1, 1)?
                    };
                    next - Duration::days(1)
                };
                return Some(DateRange::new(start, end));
            }
        }

        None
    }
}
