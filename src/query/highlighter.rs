use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::fuzzy::match_word;
use crate::query::parser::QueryTerm;
use crate::tokenizer::tokenize;

pub const DEFAULT_CROP_LENGTH: usize = 10;
pub const DEFAULT_CROP_MARKER: &str = "\u{2026}";

/// Byte span of a match inside an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPosition {
    pub start: usize,
    pub length: usize,
}

/// What to do with one attribute when building `_formatted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    pub highlight: bool,
    pub crop: Option<usize>,
    pub typos_allowed: bool,
}

pub struct Highlighter {
    pre_tag: String,
    post_tag: String,
    crop_marker: String,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self {
            pre_tag: "<em>".to_string(),
            post_tag: "</em>".to_string(),
            crop_marker: DEFAULT_CROP_MARKER.to_string(),
        }
    }
}

impl Highlighter {
    pub fn new(pre_tag: String, post_tag: String, crop_marker: String) -> Self {
        Self {
            pre_tag,
            post_tag,
            crop_marker,
        }
    }

    /// Format a JSON value recursively; only strings are rewritten.
    pub fn format_value(&self, value: &Value, terms: &[QueryTerm], options: FormatOptions) -> Value {
        match value {
            Value::String(s) => Value::String(self.format_text(s, terms, options)),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.format_value(item, terms, options))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.format_value(v, terms, options)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    pub fn format_text(&self, text: &str, terms: &[QueryTerm], options: FormatOptions) -> String {
        match options.crop {
            Some(crop_length) => self.crop_text(text, terms, crop_length, options),
            None if options.highlight => self.highlight_text(text, terms, options.typos_allowed),
            None => text.to_string(),
        }
    }

    pub fn highlight_text(&self, text: &str, terms: &[QueryTerm], typos_allowed: bool) -> String {
        let positions = Self::merge_positions(match_spans(text, terms, typos_allowed));
        self.apply_highlights(text, &positions)
    }

    fn crop_text(&self, text: &str, terms: &[QueryTerm], crop_length: usize, options: FormatOptions) -> String {
        let tokens = tokenize(text);
        let render = |slice: &str| {
            if options.highlight {
                self.highlight_text(slice, terms, options.typos_allowed)
            } else {
                slice.to_string()
            }
        };

        if tokens.len() <= crop_length {
            return render(text);
        }
        if crop_length == 0 {
            return self.crop_marker.clone();
        }

        let first_match = tokens.iter().position(|token| {
            terms
                .iter()
                .any(|term| match_word(term, &token.normalized, options.typos_allowed).is_some())
        });

        let start = match first_match {
            Some(idx) => {
                let half = crop_length / 2;
                idx.saturating_sub(half).min(tokens.len() - crop_length)
            }
            None => 0,
        };
        let end = start + crop_length;

        let byte_start = if start == 0 { 0 } else { tokens[start].byte_start };
        let byte_end = if end >= tokens.len() {
            text.len()
        } else {
            tokens[end - 1].byte_end
        };

        let mut value = String::new();
        if start > 0 {
            value.push_str(&self.crop_marker);
        }
        value.push_str(&render(&text[byte_start..byte_end]));
        if end < tokens.len() {
            value.push_str(&self.crop_marker);
        }
        value
    }

    /// Merge overlapping or adjacent positions into single spans.
    fn merge_positions(mut positions: Vec<(usize, usize)>) -> Vec<(usize, usize)> {
        if positions.is_empty() {
            return positions;
        }
        positions.sort_unstable();
        let mut merged: Vec<(usize, usize)> = Vec::new();
        let mut current = positions[0];
        for &(start, end) in &positions[1..] {
            if start <= current.1 {
                current.1 = current.1.max(end);
            } else {
                merged.push(current);
                current = (start, end);
            }
        }
        merged.push(current);
        merged
    }

    fn apply_highlights(&self, text: &str, positions: &[(usize, usize)]) -> String {
        if positions.is_empty() {
            return text.to_string();
        }

        let mut result = String::new();
        let mut last_end = 0;

        for &(start, end) in positions {
            if start < last_end {
                continue;
            }

            result.push_str(&text[last_end..start]);
            result.push_str(&self.pre_tag);
            result.push_str(&text[start..end]);
            result.push_str(&self.post_tag);
            last_end = end;
        }

        result.push_str(&text[last_end..]);
        result
    }
}

/// Byte spans of every word matching a query term. Prefix matches cover only the matched part.
fn match_spans(text: &str, terms: &[QueryTerm], typos_allowed: bool) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    for token in tokenize(text) {
        let best = terms
            .iter()
            .filter_map(|term| match_word(term, &token.normalized, typos_allowed).map(|m| (term, m)))
            .min_by_key(|(_, m)| (m.typos, m.prefix));
        let Some((term, m)) = best else { continue };

        let end = if m.prefix {
            let keep = term.word.chars().count();
            token
                .text
                .char_indices()
                .nth(keep)
                .map(|(offset, _)| token.byte_start + offset)
                .unwrap_or(token.byte_end)
        } else {
            token.byte_end
        };
        spans.push((token.byte_start, end));
    }
    spans
}

/// Match spans of `text` as reported in `_matchesPosition`.
pub fn matches_position(text: &str, terms: &[QueryTerm], typos_allowed: bool) -> Vec<MatchPosition> {
    match_spans(text, terms, typos_allowed)
        .into_iter()
        .map(|(start, end)| MatchPosition {
            start,
            length: end - start,
        })
        .collect()
}

/// Parse an `attribute:N` crop spec. Returns (attribute_name, crop length if given).
pub fn parse_crop_spec(spec: &str) -> (&str, Option<usize>) {
    if let Some(colon) = spec.rfind(':') {
        if let Ok(count) = spec[colon + 1..].parse::<usize>() {
            return (&spec[..colon], Some(count));
        }
    }
    (spec, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(word: &str, prefix: bool, max_typos: u8) -> QueryTerm {
        QueryTerm {
            word: word.to_string(),
            synonyms: vec![],
            prefix,
            max_typos,
        }
    }

    fn highlight_only() -> FormatOptions {
        FormatOptions {
            highlight: true,
            crop: None,
            typos_allowed: true,
        }
    }

    #[test]
    fn test_highlight_exact_and_prefix() {
        let h = Highlighter::default();
        let terms = vec![term("wireless", false, 1), term("head", true, 0)];
        assert_eq!(
            h.highlight_text("Wireless Headphones", &terms, true),
            "<em>Wireless</em> <em>Head</em>phones"
        );
    }

    #[test]
    fn test_custom_tags_and_no_match() {
        let h = Highlighter::new("<b>".into(), "</b>".into(), "...".into());
        let terms = vec![term("desk", false, 0)];
        assert_eq!(h.highlight_text("Standing desk", &terms, true), "Standing <b>desk</b>");
        assert_eq!(h.highlight_text("Office chair", &terms, true), "Office chair");
    }

    #[test]
    fn test_crop_centers_on_first_match() {
        let h = Highlighter::default();
        let text = "one two three four five six seven eight nine ten eleven twelve";
        let terms = vec![term("eight", false, 0)];
        let out = h.format_text(
            text,
            &terms,
            FormatOptions {
                highlight: true,
                crop: Some(4),
                typos_allowed: true,
            },
        );
        assert_eq!(out, "\u{2026}six seven <em>eight</em> nine\u{2026}");
    }

    #[test]
    fn test_crop_without_match_keeps_head() {
        let h = Highlighter::default();
        let out = h.format_text(
            "alpha beta gamma delta",
            &[term("zeta", false, 0)],
            FormatOptions {
                highlight: false,
                crop: Some(2),
                typos_allowed: true,
            },
        );
        assert_eq!(out, "alpha beta\u{2026}");
    }

    #[test]
    fn test_format_value_recurses() {
        let h = Highlighter::default();
        let value = serde_json::json!({"tags": ["rust", "search"], "n": 3});
        let out = h.format_value(&value, &[term("search", false, 0)], highlight_only());
        assert_eq!(out, serde_json::json!({"tags": ["rust", "<em>search</em>"], "n": 3}));
    }

    #[test]
    fn test_matches_position_offsets() {
        let positions = matches_position("The Dune saga", &[term("dune", false, 0)], true);
        assert_eq!(positions, vec![MatchPosition { start: 4, length: 4 }]);
    }

    #[test]
    fn test_parse_crop_spec() {
        assert_eq!(parse_crop_spec("overview:5"), ("overview", Some(5)));
        assert_eq!(parse_crop_spec("overview"), ("overview", None));
    }
}
