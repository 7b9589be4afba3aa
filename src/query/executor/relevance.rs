use serde_json::Value;
use std::cmp::Ordering;

use super::MatchingStrategy;
use crate::index::document::get_path;
use crate::index::settings::{IndexSettings, RankingRule};
use crate::query::fuzzy::match_word;
use crate::query::parser::ParsedQuery;
use crate::tokenizer::tokenize;
use crate::types::Document;

/// Word-position gap inserted between array elements of one attribute.
const ARRAY_ELEMENT_GAP: usize = 8;
/// Distance reported for query words that never appear near each other.
const MAX_PROXIMITY: usize = 8;
/// Occurrences tracked per query term per document.
const MAX_OCCURRENCES: usize = 64;

#[derive(Debug, Clone, Copy)]
struct Occurrence {
    attribute: usize,
    position: usize,
    typos: u8,
    exact: bool,
}

/// Per-document values for the built-in textual ranking rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RankingScore {
    /// Query words matched (higher is better).
    pub words: usize,
    /// Typos summed over matched words (lower is better).
    pub typos: usize,
    /// Summed distance between consecutive matched words (lower is better).
    pub proximity: usize,
    /// Best (attribute rank, word position) of a match (lower is better).
    pub attribute: (usize, usize),
    /// (an attribute equals the whole query, words matched exactly) (higher is better).
    pub exactness: (bool, usize),
}

impl RankingScore {
    pub(crate) fn compare(&self, other: &Self, rule: &RankingRule) -> Ordering {
        match rule {
            RankingRule::Words => other.words.cmp(&self.words),
            RankingRule::Typo => self.typos.cmp(&other.typos),
            RankingRule::Proximity => self.proximity.cmp(&other.proximity),
            RankingRule::Attribute => self.attribute.cmp(&other.attribute),
            RankingRule::Exactness => other.exactness.cmp(&self.exactness),
            RankingRule::Sort | RankingRule::Asc(_) | RankingRule::Desc(_) => Ordering::Equal,
        }
    }
}

/// Searchable (attribute name, value) pairs of a document in rank order.
pub(crate) fn searchable_values<'d>(doc: &'d Document, settings: &IndexSettings) -> Vec<(String, &'d Value)> {
    if settings.searches_all_attributes() {
        doc.iter().map(|(k, v)| (k.clone(), v)).collect()
    } else {
        settings
            .searchable_attributes
            .iter()
            .filter_map(|attr| get_path(doc, attr).map(|v| (attr.clone(), v)))
            .collect()
    }
}

/// Normalised words of an attribute value with their positions.
pub(crate) fn attribute_words(value: &Value) -> Vec<(String, usize)> {
    let mut words = Vec::new();
    let mut next_position = 0;
    collect_words(value, &mut words, &mut next_position);
    words
}

fn collect_words(value: &Value, out: &mut Vec<(String, usize)>, next_position: &mut usize) {
    match value {
        Value::String(s) => push_text(s, out, next_position),
        Value::Number(n) => push_text(&n.to_string(), out, next_position),
        Value::Array(items) => {
            for item in items {
                collect_words(item, out, next_position);
                *next_position += ARRAY_ELEMENT_GAP;
            }
        }
        Value::Object(map) => {
            for v in map.values() {
                collect_words(v, out, next_position);
                *next_position += ARRAY_ELEMENT_GAP;
            }
        }
        Value::Bool(_) | Value::Null => {}
    }
}

fn push_text(text: &str, out: &mut Vec<(String, usize)>, next_position: &mut usize) {
    let tokens = tokenize(text);
    let count = tokens.len();
    for token in tokens {
        out.push((token.normalized, *next_position + token.position));
    }
    *next_position += count;
}

/// Score a document against the query; `None` when it does not match.
pub(crate) fn score_document(
    doc: &Document,
    settings: &IndexSettings,
    parsed: &ParsedQuery,
    strategy: MatchingStrategy,
) -> Option<RankingScore> {
    if parsed.is_placeholder() {
        return Some(RankingScore::default());
    }

    let term_count = parsed.terms.len();
    let query_words = parsed.words();
    let mut occurrences: Vec<Vec<Occurrence>> = vec![Vec::new(); term_count];
    let mut full_attribute_match = false;

    for (rank, (name, value)) in searchable_values(doc, settings).into_iter().enumerate() {
        let typos_allowed = !settings.typo_tolerance.disable_on_attributes.contains(&name);
        let words = attribute_words(value);

        if !full_attribute_match
            && words.len() == term_count
            && words.iter().map(|(w, _)| w.as_str()).eq(query_words.iter().copied())
        {
            full_attribute_match = true;
        }

        for (word, position) in &words {
            for (idx, term) in parsed.terms.iter().enumerate() {
                if occurrences[idx].len() >= MAX_OCCURRENCES {
                    continue;
                }
                if let Some(m) = match_word(term, word, typos_allowed) {
                    occurrences[idx].push(Occurrence {
                        attribute: rank,
                        position: *position,
                        typos: m.typos,
                        exact: m.exact,
                    });
                }
            }
        }
    }

    let counted = match strategy {
        MatchingStrategy::All => {
            if occurrences.iter().any(|o| o.is_empty()) {
                return None;
            }
            term_count
        }
        MatchingStrategy::Last => {
            let leading = occurrences.iter().take_while(|o| !o.is_empty()).count();
            if leading == 0 {
                return None;
            }
            leading
        }
    };
    let matched = &occurrences[..counted];

    let typos = matched
        .iter()
        .map(|occ| occ.iter().map(|o| o.typos as usize).min().unwrap_or(0))
        .sum();

    let proximity = matched
        .windows(2)
        .map(|pair| pair_distance(&pair[0], &pair[1]))
        .sum();

    let attribute = matched
        .iter()
        .filter_map(|occ| occ.iter().map(|o| (o.attribute, o.position)).min())
        .min()
        .unwrap_or((0, 0));

    let exact_words = matched
        .iter()
        .filter(|occ| occ.iter().any(|o| o.exact))
        .count();

    Some(RankingScore {
        words: counted,
        typos,
        proximity,
        attribute,
        exactness: (full_attribute_match, exact_words),
    })
}

fn pair_distance(first: &[Occurrence], second: &[Occurrence]) -> usize {
    let mut best = MAX_PROXIMITY;
    for a in first {
        for b in second {
            if a.attribute != b.attribute {
                continue;
            }
            // reversed order costs one extra step
            let distance = if b.position > a.position {
                b.position - a.position
            } else {
                a.position - b.position + 1
            };
            best = best.min(distance);
        }
    }
    best
}
