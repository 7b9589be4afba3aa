use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{GriddleError, Result};
use crate::index::document::project;
use crate::index::settings::RankingRule;
use crate::index::IndexState;
use crate::query::filter::{Filter, FilterInput};
use crate::query::highlighter::{
    matches_position, parse_crop_spec, FormatOptions, Highlighter, DEFAULT_CROP_LENGTH, DEFAULT_CROP_MARKER,
};
use crate::query::parser::{ParsedQuery, QueryParser};
use crate::types::Document;

mod facets;
mod relevance;
mod sorting;

pub use facets::{FacetDistribution, FacetHit, FacetSearchQuery, FacetSearchResult, FacetStats};
pub use sorting::{parse_sort, SortCriterion, SortEntry, SortOrder};

use relevance::{score_document, RankingScore};
use sorting::{compare_by_criteria, compare_field, validate_sort};

pub const DEFAULT_LIMIT: usize = 20;
pub const DEFAULT_HIGHLIGHT_PRE_TAG: &str = "<em>";
pub const DEFAULT_HIGHLIGHT_POST_TAG: &str = "</em>";

/// Documents scanned between two cancellation checks.
const CANCELLATION_CHECK_INTERVAL: usize = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchingStrategy {
    /// Documents must match the first query word; more leading words rank higher.
    #[default]
    Last,
    All,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    #[serde(alias = "attributes")]
    pub attributes_to_retrieve: Option<Vec<String>>,
    pub filter: Option<FilterInput>,
    pub sort: Option<Vec<SortEntry>>,
    pub facets: Option<Vec<String>>,
    pub attributes_to_highlight: Option<Vec<String>>,
    pub highlight_pre_tag: Option<String>,
    pub highlight_post_tag: Option<String>,
    pub attributes_to_crop: Option<Vec<String>>,
    pub crop_length: Option<usize>,
    pub crop_marker: Option<String>,
    pub show_matches_position: bool,
    pub matching_strategy: Option<MatchingStrategy>,
}

impl SearchQuery {
    pub fn new(q: impl Into<String>) -> Self {
        SearchQuery {
            q: Some(q.into()),
            ..Default::default()
        }
    }

    pub fn placeholder() -> Self {
        SearchQuery::default()
    }

    pub fn with_filter(mut self, filter: impl Into<FilterInput>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_sort<S: Into<SortEntry>>(mut self, sort: impl IntoIterator<Item = S>) -> Self {
        self.sort = Some(sort.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_facets<S: Into<String>>(mut self, facets: impl IntoIterator<Item = S>) -> Self {
        self.facets = Some(facets.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_attributes_to_retrieve<S: Into<String>>(mut self, attrs: impl IntoIterator<Item = S>) -> Self {
        self.attributes_to_retrieve = Some(attrs.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_highlight<S: Into<String>>(mut self, attrs: impl IntoIterator<Item = S>) -> Self {
        self.attributes_to_highlight = Some(attrs.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_highlight_tags(mut self, pre: impl Into<String>, post: impl Into<String>) -> Self {
        self.highlight_pre_tag = Some(pre.into());
        self.highlight_post_tag = Some(post.into());
        self
    }

    pub fn with_crop<S: Into<String>>(mut self, attrs: impl IntoIterator<Item = S>, crop_length: usize) -> Self {
        self.attributes_to_crop = Some(attrs.into_iter().map(Into::into).collect());
        self.crop_length = Some(crop_length);
        self
    }

    pub fn with_matching_strategy(mut self, strategy: MatchingStrategy) -> Self {
        self.matching_strategy = Some(strategy);
        self
    }

    pub fn with_matches_position(mut self) -> Self {
        self.show_matches_position = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub hits: Vec<Document>,
    pub query: String,
    pub processing_time_ms: u64,
    pub limit: usize,
    pub offset: usize,
    pub estimated_total_hits: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facet_distribution: Option<FacetDistribution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facet_stats: Option<BTreeMap<String, FacetStats>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_uid: Option<String>,
}

impl SearchResult {
    /// Primary-key values of the hits, in ranking order.
    pub fn hit_ids(&self, primary_key: &str) -> Vec<Value> {
        self.hits
            .iter()
            .filter_map(|hit| hit.get(primary_key).cloned())
            .collect()
    }
}

/// Shared flag that aborts a search before or during evaluation.
#[derive(Debug, Clone, Default)]
pub struct SearchCancellation {
    cancelled: Arc<AtomicBool>,
}

impl SearchCancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(AtomicOrdering::SeqCst)
    }
}

/// A document that passed the filter and the text match, with its ranking values.
pub(crate) struct Candidate<'a> {
    pub doc: &'a Document,
    pub score: RankingScore,
}

/// Evaluates queries against one committed index snapshot.
pub struct QueryExecutor<'a> {
    pub(crate) state: &'a IndexState,
    pub(crate) cancellation: Option<&'a SearchCancellation>,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(state: &'a IndexState) -> Self {
        QueryExecutor {
            state,
            cancellation: None,
        }
    }

    pub fn with_cancellation(mut self, cancellation: &'a SearchCancellation) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    pub(crate) fn check_cancelled(&self) -> Result<()> {
        match self.cancellation {
            Some(c) if c.is_cancelled() => Err(GriddleError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Parse a caller filter and check it against the current filterable attributes.
    pub(crate) fn resolve_filter(&self, input: Option<&FilterInput>) -> Result<Option<Filter>> {
        let Some(input) = input else {
            return Ok(None);
        };
        let filter = input.parse()?;
        if let Some(f) = &filter {
            f.validate(&self.state.settings)?;
        }
        Ok(filter)
    }

    /// Documents matching the filter and the text query, in insertion order.
    pub(crate) fn collect_candidates(
        &self,
        parsed: &ParsedQuery,
        filter: Option<&Filter>,
        strategy: MatchingStrategy,
    ) -> Result<Vec<Candidate<'a>>> {
        let settings = &self.state.settings;
        let mut candidates = Vec::new();
        for (idx, doc) in self.state.documents.values().enumerate() {
            if idx % CANCELLATION_CHECK_INTERVAL == 0 {
                self.check_cancelled()?;
            }
            let doc: &'a Document = doc.as_ref();
            if let Some(f) = filter {
                if !f.matches(doc)? {
                    continue;
                }
            }
            if let Some(score) = score_document(doc, settings, parsed, strategy) {
                candidates.push(Candidate { doc, score });
            }
        }
        Ok(candidates)
    }

    pub fn search(&self, query: &SearchQuery) -> Result<SearchResult> {
        let start = Instant::now();
        self.check_cancelled()?;
        let settings = &self.state.settings;

        let filter = self.resolve_filter(query.filter.as_ref())?;
        let sort = match &query.sort {
            Some(entries) => {
                let criteria = parse_sort(entries)?;
                validate_sort(&criteria, settings)?;
                criteria
            }
            None => Vec::new(),
        };
        let facet_names = match &query.facets {
            Some(requested) => Some(self.expand_facet_names(requested)?),
            None => None,
        };

        let q = query.q.clone().unwrap_or_default();
        let parsed = QueryParser::new(settings).parse(&q);
        let strategy = query.matching_strategy.unwrap_or_default();
        let mut candidates = self.collect_candidates(&parsed, filter.as_ref(), strategy)?;

        let (facet_distribution, facet_stats) = match &facet_names {
            Some(names) => {
                let (distribution, stats) = self.compute_facets(&candidates, names);
                (Some(distribution), Some(stats))
            }
            None => (None, None),
        };

        self.check_cancelled()?;
        let rules = effective_rules(settings.parsed_ranking_rules(), !sort.is_empty());
        candidates.sort_by(|a, b| compare_candidates(a, b, &rules, &sort));

        let total = candidates.len().min(settings.pagination.max_total_hits);
        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
        let page_start = offset.min(total);
        let page_end = offset.saturating_add(limit).min(total);

        let hits = candidates[page_start..page_end]
            .iter()
            .map(|c| self.build_hit(c.doc, &parsed, query))
            .collect();

        let elapsed = start.elapsed().as_millis() as u64;
        tracing::debug!(
            "[SEARCH {}] q={:?} matched={} returned={} in {}ms",
            self.state.uid,
            q,
            candidates.len(),
            page_end - page_start,
            elapsed
        );

        Ok(SearchResult {
            hits,
            query: q,
            processing_time_ms: elapsed,
            limit,
            offset,
            estimated_total_hits: total,
            facet_distribution,
            facet_stats,
            index_uid: None,
        })
    }

    fn build_hit(&self, doc: &Document, parsed: &ParsedQuery, query: &SearchQuery) -> Document {
        let settings = &self.state.settings;
        let mut hit = project(doc, query.attributes_to_retrieve.as_deref(), settings);

        let highlight = query.attributes_to_highlight.as_deref().unwrap_or_default();
        let crop = query.attributes_to_crop.as_deref().unwrap_or_default();

        let mut formatted = None;
        if !highlight.is_empty() || !crop.is_empty() {
            let highlighter = Highlighter::new(
                query
                    .highlight_pre_tag
                    .clone()
                    .unwrap_or_else(|| DEFAULT_HIGHLIGHT_PRE_TAG.to_string()),
                query
                    .highlight_post_tag
                    .clone()
                    .unwrap_or_else(|| DEFAULT_HIGHLIGHT_POST_TAG.to_string()),
                query
                    .crop_marker
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CROP_MARKER.to_string()),
            );
            let default_crop = query.crop_length.unwrap_or(DEFAULT_CROP_LENGTH);

            let mut out = Document::new();
            for (name, value) in &hit {
                let options = FormatOptions {
                    highlight: highlight.iter().any(|a| a == "*" || a == name),
                    crop: crop_length_for(crop, name, default_crop),
                    typos_allowed: !settings.typo_tolerance.disable_on_attributes.contains(name),
                };
                let rendered = if options.highlight || options.crop.is_some() {
                    highlighter.format_value(value, &parsed.terms, options)
                } else {
                    value.clone()
                };
                out.insert(name.clone(), rendered);
            }
            formatted = Some(out);
        }

        let mut positions = None;
        if query.show_matches_position && !parsed.is_placeholder() {
            let mut found = serde_json::Map::new();
            for (name, value) in &hit {
                if let Value::String(text) = value {
                    let typos_allowed = !settings.typo_tolerance.disable_on_attributes.contains(name);
                    let spans = matches_position(text, &parsed.terms, typos_allowed);
                    if !spans.is_empty() {
                        found.insert(name.clone(), serde_json::to_value(spans).unwrap_or(Value::Null));
                    }
                }
            }
            positions = Some(found);
        }

        if let Some(formatted) = formatted {
            hit.insert("_formatted".to_string(), Value::Object(formatted));
        }
        if let Some(positions) = positions {
            hit.insert("_matchesPosition".to_string(), Value::Object(positions));
        }
        hit
    }
}

fn crop_length_for(specs: &[String], attribute: &str, default: usize) -> Option<usize> {
    specs.iter().find_map(|spec| {
        let (name, length) = parse_crop_spec(spec);
        (name == "*" || name == attribute).then(|| length.unwrap_or(default))
    })
}

/// Ranking rules in force; an explicit sort runs first when `sort` is not configured.
fn effective_rules(mut rules: Vec<RankingRule>, has_sort: bool) -> Vec<RankingRule> {
    if has_sort && !rules.contains(&RankingRule::Sort) {
        rules.insert(0, RankingRule::Sort);
    }
    rules
}

fn compare_candidates(a: &Candidate<'_>, b: &Candidate<'_>, rules: &[RankingRule], sort: &[SortCriterion]) -> Ordering {
    for rule in rules {
        let ord = match rule {
            RankingRule::Sort => compare_by_criteria(a.doc, b.doc, sort),
            RankingRule::Asc(field) => compare_field(a.doc, b.doc, field, SortOrder::Asc),
            RankingRule::Desc(field) => compare_field(a.doc, b.doc, field, SortOrder::Desc),
            textual => a.score.compare(&b.score, textual),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(docs: Value) -> IndexState {
        let mut state = IndexState::new("products", Some("id".to_string()));
        let docs = docs
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d.as_object().unwrap().clone())
            .collect();
        state.upsert_documents(docs, "id", false).unwrap();
        state
    }

    fn ids(result: &SearchResult) -> Vec<Value> {
        result.hit_ids("id")
    }

    #[test]
    fn test_placeholder_keeps_insertion_order() {
        let s = state(json!([{"id": 3}, {"id": 1}, {"id": 2}]));
        let result = QueryExecutor::new(&s).search(&SearchQuery::placeholder()).unwrap();
        assert_eq!(ids(&result), vec![json!(3), json!(1), json!(2)]);
        assert_eq!(result.estimated_total_hits, 3);
        assert!(result.facet_distribution.is_none());
    }

    #[test]
    fn test_pagination_and_total_cap() {
        let mut s = state(json!([{"id": 1}, {"id": 2}, {"id": 3}, {"id": 4}]));
        let page = QueryExecutor::new(&s)
            .search(&SearchQuery::placeholder().with_offset(1).with_limit(2))
            .unwrap();
        assert_eq!(ids(&page), vec![json!(2), json!(3)]);
        assert_eq!(page.estimated_total_hits, 4);

        s.settings.pagination.max_total_hits = 2;
        let capped = QueryExecutor::new(&s)
            .search(&SearchQuery::placeholder().with_offset(1).with_limit(5))
            .unwrap();
        assert_eq!(capped.estimated_total_hits, 2);
        assert_eq!(ids(&capped), vec![json!(2)]);
    }

    #[test]
    fn test_sort_requires_sortable_and_orders() {
        let mut s = state(json!([{"id": 1, "price": 30}, {"id": 2, "price": 10}, {"id": 3}]));
        let query = SearchQuery::placeholder().with_sort(["price:asc"]);
        assert!(matches!(
            QueryExecutor::new(&s).search(&query),
            Err(GriddleError::AttributeNotSortable { .. })
        ));
        s.settings.sortable_attributes = vec!["price".into()];
        let result = QueryExecutor::new(&s).search(&query).unwrap();
        assert_eq!(ids(&result), vec![json!(2), json!(1), json!(3)]);
    }

    #[test]
    fn test_sort_inserted_first_when_rule_absent() {
        let rules = effective_rules(vec![RankingRule::Words, RankingRule::Typo], true);
        assert_eq!(rules[0], RankingRule::Sort);
        let untouched = effective_rules(RankingRule::DEFAULTS.to_vec(), true);
        assert_eq!(untouched, RankingRule::DEFAULTS.to_vec());
    }

    #[test]
    fn test_custom_ranking_rule_breaks_ties() {
        let mut s = state(json!([
            {"id": 1, "title": "desk lamp", "rank": 1},
            {"id": 2, "title": "desk lamp", "rank": 9}
        ]));
        s.settings.ranking_rules.push("rank:desc".into());
        let result = QueryExecutor::new(&s).search(&SearchQuery::new("desk lamp")).unwrap();
        assert_eq!(ids(&result), vec![json!(2), json!(1)]);
    }

    #[test]
    fn test_cancelled_search_returns_error() {
        let s = state(json!([{"id": 1}]));
        let cancellation = SearchCancellation::new();
        cancellation.cancel();
        let err = QueryExecutor::new(&s)
            .with_cancellation(&cancellation)
            .search(&SearchQuery::placeholder())
            .unwrap_err();
        assert_eq!(err, GriddleError::Cancelled);
    }

    #[test]
    fn test_formatted_and_matches_position() {
        let s = state(json!([{"id": 1, "title": "Wireless Headphones", "brand": "Sonic"}]));
        let result = QueryExecutor::new(&s)
            .search(&SearchQuery::new("wireless").with_highlight(["title"]).with_matches_position())
            .unwrap();
        let hit = &result.hits[0];
        assert_eq!(hit["title"], json!("Wireless Headphones"));
        assert_eq!(hit["_formatted"]["title"], json!("<em>Wireless</em> Headphones"));
        assert_eq!(hit["_formatted"]["brand"], json!("Sonic"));
        assert_eq!(hit["_matchesPosition"]["title"], json!([{"start": 0, "length": 8}]));
    }

    #[test]
    fn test_crop_spec_lookup() {
        let specs = vec!["overview:3".to_string(), "title".to_string()];
        assert_eq!(crop_length_for(&specs, "overview", 10), Some(3));
        assert_eq!(crop_length_for(&specs, "title", 10), Some(10));
        assert_eq!(crop_length_for(&specs, "brand", 10), None);
    }

    #[test]
    fn test_search_query_deserializes_camel_case() {
        let query: SearchQuery = serde_json::from_value(json!({
            "q": "desk",
            "attributesToHighlight": ["*"],
            "matchingStrategy": "all",
            "unknownOption": true
        }))
        .unwrap();
        assert_eq!(query.q.as_deref(), Some("desk"));
        assert_eq!(query.matching_strategy, Some(MatchingStrategy::All));
        assert_eq!(query.attributes_to_highlight, Some(vec!["*".to_string()]));
    }
}
