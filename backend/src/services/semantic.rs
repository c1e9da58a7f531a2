//! Semantic fallback index
//!
//! Bag-of-words vectors over the registry entries (key + ui_name + aliases +
//! kr_semantics form one document per entry) compared against the question by
//! cosine similarity. Used only when explicit substring matching fails.
//!
//! Tokenization is hangul-aware: latin/digit words plus hangul character
//! bigrams, so "후원명별로 보여줘" still overlaps the "후원명" document.

use std::collections::HashMap;

use super::metadata::{FieldDef, DIMENSIONS, METRICS};

const TOP_K: usize = 5;
const MIN_SIMILARITY: f64 = 0.20;

#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub name: String,
    pub confidence: f64,
}

struct IndexedDoc {
    key: String,
    counts: HashMap<String, f64>,
    norm: f64,
}

/// Read-only similarity index, built once at startup
pub struct SemanticIndex {
    metric_docs: Vec<IndexedDoc>,
    dimension_docs: Vec<IndexedDoc>,
}

impl SemanticIndex {
    pub fn from_registry() -> Self {
        Self {
            metric_docs: METRICS.iter().map(index_entry).collect(),
            dimension_docs: DIMENSIONS.iter().map(index_entry).collect(),
        }
    }

    pub fn match_metrics(&self, question: &str) -> Vec<SemanticHit> {
        rank(&self.metric_docs, question)
    }

    pub fn match_dimensions(&self, question: &str) -> Vec<SemanticHit> {
        rank(&self.dimension_docs, question)
    }
}

fn index_entry(def: &FieldDef) -> IndexedDoc {
    let mut doc = String::new();
    doc.push_str(def.key);
    doc.push(' ');
    doc.push_str(def.ui_name);
    for alias in def.aliases {
        doc.push(' ');
        doc.push_str(alias);
    }
    for hint in def.kr_semantics {
        doc.push(' ');
        doc.push_str(hint);
    }

    let counts = term_counts(&doc);
    let norm = vector_norm(&counts);
    IndexedDoc { key: def.key.to_string(), counts, norm }
}

fn rank(docs: &[IndexedDoc], question: &str) -> Vec<SemanticHit> {
    let q_counts = term_counts(question);
    let q_norm = vector_norm(&q_counts);
    if q_norm == 0.0 {
        return Vec::new();
    }

    let mut hits: Vec<SemanticHit> = docs
        .iter()
        .filter_map(|doc| {
            let sim = cosine(&q_counts, q_norm, doc);
            if sim >= MIN_SIMILARITY {
                Some(SemanticHit { name: doc.key.clone(), confidence: sim })
            } else {
                None
            }
        })
        .collect();

    hits.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(TOP_K);
    hits
}

fn cosine(q_counts: &HashMap<String, f64>, q_norm: f64, doc: &IndexedDoc) -> f64 {
    if doc.norm == 0.0 {
        return 0.0;
    }
    let mut dot = 0.0;
    for (term, qc) in q_counts {
        if let Some(dc) = doc.counts.get(term) {
            dot += qc * dc;
        }
    }
    dot / (q_norm * doc.norm)
}

fn vector_norm(counts: &HashMap<String, f64>) -> f64 {
    counts.values().map(|c| c * c).sum::<f64>().sqrt()
}

/// Split into latin/digit words and hangul runs; hangul runs contribute the
/// run itself plus its character bigrams.
fn term_counts(text: &str) -> HashMap<String, f64> {
    let mut counts: HashMap<String, f64> = HashMap::new();
    let lowered = text.to_lowercase();

    let mut ascii_buf = String::new();
    let mut hangul_buf = String::new();

    fn flush_ascii(buf: &mut String, counts: &mut HashMap<String, f64>) {
        if buf.chars().count() >= 2 {
            *counts.entry(buf.clone()).or_insert(0.0) += 1.0;
        }
        buf.clear();
    }
    fn flush_hangul(buf: &mut String, counts: &mut HashMap<String, f64>) {
        let chars: Vec<char> = buf.chars().collect();
        if !chars.is_empty() {
            *counts.entry(buf.clone()).or_insert(0.0) += 1.0;
            for pair in chars.windows(2) {
                let bigram: String = pair.iter().collect();
                *counts.entry(bigram).or_insert(0.0) += 1.0;
            }
        }
        buf.clear();
    }

    for ch in lowered.chars() {
        if ch.is_ascii_alphanumeric() {
            flush_hangul(&mut hangul_buf, &mut counts);
            ascii_buf.push(ch);
        } else if is_hangul(ch) {
            flush_ascii(&mut ascii_buf, &mut counts);
            hangul_buf.push(ch);
        } else {
            flush_ascii(&mut ascii_buf, &mut counts);
            flush_hangul(&mut hangul_buf, &mut counts);
        }
    }
    flush_ascii(&mut ascii_buf, &mut counts);
    flush_hangul(&mut hangul_buf, &mut counts);

    counts
}

fn is_hangul(ch: char) -> bool {
    let code = ch as u32;
    (0xAC00..=0xD7A3).contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_alias_scores_high() {
        let index = SemanticIndex::from_registry();
        let hits = index.match_metrics("이탈률 알려줘");
        assert!(!hits.is_empty());
        assert_eq!(hits[0].name, "bounceRate");
        assert!(hits[0].confidence >= 0.20);
    }

    #[test]
    fn test_no_overlap_returns_empty() {
        let index = SemanticIndex::from_registry();
        let hits = index.match_metrics("xyzq");
        assert!(hits.is_empty());
    }

    #[test]
    fn test_hits_sorted_and_capped() {
        let index = SemanticIndex::from_registry();
        let hits = index.match_dimensions("채널별 소스 매체 국가");
        assert!(hits.len() <= 5);
        for pair in hits.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }
}
