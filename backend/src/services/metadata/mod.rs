//! Metric/dimension metadata registry
//!
//! Static catalog of every metric and dimension the assistant can answer
//! about: stable key, Korean UI name, expression aliases, meaning-level
//! Korean hints, category, analytic scope and a matching priority.
//!
//! The registry only *defines*; similarity scoring and matching live in the
//! semantic index and the candidate extractor.

mod dimensions;
mod metrics;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use dimensions::DIMENSIONS;
pub use metrics::METRICS;

pub const DEFAULT_METRIC: &str = "activeUsers";
pub const DEFAULT_TIME_DIMENSION: &str = "date";

/// Time-grain dimensions; exactly one of these leads every trend block
pub const TIME_DIMENSIONS: &[&str] =
    &["date", "dateHour", "week", "month", "year", "yearMonth", "dayOfWeekName"];

/// Analytic grain of a field. Queries may only mix scope-compatible fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldScope {
    Event,
    Item,
    User,
}

impl FieldScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Item => "item",
            Self::User => "user",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldCategory {
    Time,
    Event,
    Page,
    Device,
    Geo,
    Traffic,
    User,
    Ads,
    Engagement,
    Ecommerce,
}

impl FieldCategory {
    /// Scope implied by the category when an entry has no explicit scope
    pub fn implied_scope(&self) -> FieldScope {
        match self {
            Self::Ecommerce => FieldScope::Item,
            _ => FieldScope::Event,
        }
    }
}

/// Immutable registry entry (metric or dimension)
#[derive(Debug, Clone, Serialize)]
pub struct FieldDef {
    pub key: &'static str,
    pub ui_name: &'static str,
    pub aliases: &'static [&'static str],
    pub kr_semantics: &'static [&'static str],
    pub category: FieldCategory,
    pub scope: Option<FieldScope>,
    pub priority: u8,
}

impl FieldDef {
    pub fn effective_scope(&self) -> FieldScope {
        self.scope.unwrap_or_else(|| self.category.implied_scope())
    }
}

pub(crate) const fn field(
    key: &'static str,
    ui_name: &'static str,
    aliases: &'static [&'static str],
    kr_semantics: &'static [&'static str],
    category: FieldCategory,
    scope: Option<FieldScope>,
    priority: u8,
) -> FieldDef {
    FieldDef { key, ui_name, aliases, kr_semantics, category, scope, priority }
}

static NORMALIZE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\-_/]+").unwrap());

/// Comparison form used for all registry matching: lowercase and without
/// whitespace/punctuation variation. Idempotent.
pub fn normalize(text: &str) -> String {
    NORMALIZE_RE.replace_all(&text.to_lowercase(), "").into_owned()
}

fn build_index(defs: &'static [FieldDef]) -> HashMap<String, &'static FieldDef> {
    let mut index = HashMap::new();
    for def in defs {
        index.entry(normalize(def.key)).or_insert(def);
        if !def.ui_name.is_empty() {
            index.entry(normalize(def.ui_name)).or_insert(def);
        }
        for alias in def.aliases {
            index.entry(normalize(alias)).or_insert(def);
        }
    }
    index
}

static METRIC_INDEX: Lazy<HashMap<String, &'static FieldDef>> = Lazy::new(|| build_index(METRICS));
static DIMENSION_INDEX: Lazy<HashMap<String, &'static FieldDef>> =
    Lazy::new(|| build_index(DIMENSIONS));

/// Look up a metric definition by exact key
pub fn metric(key: &str) -> Option<&'static FieldDef> {
    METRICS.iter().find(|d| d.key == key)
}

/// Look up a dimension definition by exact key
pub fn dimension(key: &str) -> Option<&'static FieldDef> {
    DIMENSIONS.iter().find(|d| d.key == key)
}

/// Resolve a free-form token to a metric key.
///
/// Single-character tokens are rejected; they false-positive far too often.
pub fn resolve_metric(token: &str) -> Option<&'static str> {
    let norm = normalize(token);
    if norm.chars().count() <= 1 {
        return None;
    }
    METRIC_INDEX.get(&norm).map(|d| d.key)
}

/// Resolve a free-form token to a dimension key
pub fn resolve_dimension(token: &str) -> Option<&'static str> {
    let norm = normalize(token);
    if norm.chars().count() <= 1 {
        return None;
    }
    DIMENSION_INDEX.get(&norm).map(|d| d.key)
}

/// Scope of a metric key; custom-prefixed and unknown keys default to event
pub fn metric_scope(key: &str) -> FieldScope {
    if let Some(def) = metric(key) {
        return def.effective_scope();
    }
    scope_from_custom_prefix(key).unwrap_or(FieldScope::Event)
}

/// Scope of a dimension key; falls back to the category mapping
pub fn dimension_scope(key: &str) -> FieldScope {
    if let Some(def) = dimension(key) {
        return def.effective_scope();
    }
    scope_from_custom_prefix(key).unwrap_or(FieldScope::Event)
}

fn scope_from_custom_prefix(key: &str) -> Option<FieldScope> {
    if key.starts_with("customEvent:") {
        Some(FieldScope::Event)
    } else if key.starts_with("customItem:") {
        Some(FieldScope::Item)
    } else if key.starts_with("customUser:") {
        Some(FieldScope::User)
    } else {
        None
    }
}

/// Display name for any field key. Custom-parameter keys fall back to the
/// bare parameter name.
pub fn ui_name(key: &str) -> String {
    if let Some(def) = metric(key).or_else(|| dimension(key)) {
        return def.ui_name.to_string();
    }
    key.trim_start_matches("customEvent:")
        .trim_start_matches("customItem:")
        .trim_start_matches("customUser:")
        .to_string()
}

pub fn is_time_dimension(key: &str) -> bool {
    TIME_DIMENSIONS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_keys_globally_unique() {
        let mut seen = HashSet::new();
        for def in METRICS.iter().chain(DIMENSIONS.iter()) {
            assert!(seen.insert(def.key), "duplicate registry key: {}", def.key);
        }
    }

    #[test]
    fn test_normalize_idempotent() {
        for raw in ["Default Channel Group", "item-revenue", "구매 수익", "source / medium"] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_resolve_metric_by_alias() {
        assert_eq!(resolve_metric("매출"), Some("purchaseRevenue"));
        assert_eq!(resolve_metric("활성 사용자"), Some("activeUsers"));
        assert_eq!(resolve_metric("purchase revenue"), Some("purchaseRevenue"));
        assert_eq!(resolve_metric("purchaseRevenue"), Some("purchaseRevenue"));
        assert_eq!(resolve_metric("없는지표"), None);
    }

    #[test]
    fn test_resolve_rejects_single_char() {
        assert_eq!(resolve_metric("뷰"), None);
        assert_eq!(resolve_dimension("주"), None);
    }

    #[test]
    fn test_dimension_scope_fallback() {
        assert_eq!(dimension_scope("itemName"), FieldScope::Item);
        assert_eq!(dimension_scope("defaultChannelGroup"), FieldScope::Event);
        assert_eq!(dimension_scope("customEvent:donation_name"), FieldScope::Event);
        assert_eq!(dimension_scope("customItem:stock_code"), FieldScope::Item);
    }

    #[test]
    fn test_time_dimensions() {
        assert!(is_time_dimension("date"));
        assert!(is_time_dimension("yearMonth"));
        assert!(!is_time_dimension("eventName"));
    }
}
