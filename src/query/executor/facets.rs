use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;

use super::{Candidate, MatchingStrategy, QueryExecutor};
use crate::error::{GriddleError, Result};
use crate::index::document::get_path;
use crate::index::settings::FacetValuesOrder;
use crate::query::filter::FilterInput;
use crate::query::parser::QueryParser;
use crate::tokenizer::{normalize, words};
use crate::types::Document;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FacetStats {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FacetSearchQuery {
    pub facet_name: String,
    pub facet_query: Option<String>,
    pub q: Option<String>,
    pub filter: Option<FilterInput>,
    pub matching_strategy: Option<MatchingStrategy>,
}

impl FacetSearchQuery {
    pub fn new(facet_name: impl Into<String>) -> Self {
        FacetSearchQuery {
            facet_name: facet_name.into(),
            ..Default::default()
        }
    }

    pub fn with_facet_query(mut self, facet_query: impl Into<String>) -> Self {
        self.facet_query = Some(facet_query.into());
        self
    }

    pub fn with_query(mut self, q: impl Into<String>) -> Self {
        self.q = Some(q.into());
        self
    }

    pub fn with_filter(mut self, filter: impl Into<FilterInput>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetHit {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetSearchResult {
    pub facet_hits: Vec<FacetHit>,
    pub facet_query: Option<String>,
    pub processing_time_ms: u64,
}

pub type FacetDistribution = BTreeMap<String, IndexMap<String, usize>>;

/// Distinct facet values of one document, with their numeric form when they have one.
pub(crate) fn facet_values(doc: &Document, facet: &str) -> Vec<(String, Option<f64>)> {
    let mut values = Vec::new();
    if let Some(value) = get_path(doc, facet) {
        match value {
            Value::Array(items) => items.iter().for_each(|item| push_scalar(item, &mut values)),
            other => push_scalar(other, &mut values),
        }
    }
    values
}

fn push_scalar(value: &Value, out: &mut Vec<(String, Option<f64>)>) {
    let entry = match value {
        Value::String(s) => (s.clone(), None),
        Value::Number(n) => (n.to_string(), n.as_f64()),
        Value::Bool(b) => (b.to_string(), None),
        _ => return,
    };
    if !out.iter().any(|(v, _)| *v == entry.0) {
        out.push(entry);
    }
}

fn order_counts(counts: IndexMap<String, usize>, order: FacetValuesOrder, max: usize) -> IndexMap<String, usize> {
    let mut entries: Vec<(String, usize)> = counts.into_iter().collect();
    match order {
        FacetValuesOrder::Alpha => entries.sort_by(|a, b| a.0.cmp(&b.0)),
        FacetValuesOrder::Count => entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0))),
    }
    entries.truncate(max);
    entries.into_iter().collect()
}

fn facet_query_matches(value: &str, query_words: &[String], raw_query: &str) -> bool {
    if query_words.is_empty() {
        return true;
    }
    if normalize(value).starts_with(raw_query) {
        return true;
    }
    let value_words = words(value);
    query_words
        .iter()
        .all(|qw| value_words.iter().any(|vw| vw.starts_with(qw.as_str())))
}

impl<'a> QueryExecutor<'a> {
    /// Resolve requested facet names (`*` = every filterable attribute) and check they are filterable.
    pub(crate) fn expand_facet_names(&self, requested: &[String]) -> Result<Vec<String>> {
        let settings = &self.state.settings;
        let mut names: Vec<String> = Vec::new();
        for facet in requested {
            if facet == "*" {
                for attr in &settings.filterable_attributes {
                    if attr != "*" && !names.contains(attr) {
                        names.push(attr.clone());
                    }
                }
                continue;
            }
            if !settings.is_filterable(facet) {
                return Err(GriddleError::AttributeNotFilterable {
                    attribute: facet.clone(),
                    available: settings.filterable_list(),
                });
            }
            if !names.contains(facet) {
                names.push(facet.clone());
            }
        }
        Ok(names)
    }

    /// Value counts and numeric stats over the full (un-paginated) candidate set.
    pub(crate) fn compute_facets(
        &self,
        candidates: &[Candidate<'_>],
        facets: &[String],
    ) -> (FacetDistribution, BTreeMap<String, FacetStats>) {
        let faceting = &self.state.settings.faceting;
        let mut distribution = BTreeMap::new();
        let mut stats = BTreeMap::new();

        for facet in facets {
            let mut counts: IndexMap<String, usize> = IndexMap::new();
            let mut facet_stats: Option<FacetStats> = None;

            for candidate in candidates {
                for (value, numeric) in facet_values(candidate.doc, facet) {
                    *counts.entry(value).or_insert(0) += 1;
                    if let Some(n) = numeric {
                        facet_stats = Some(match facet_stats {
                            Some(s) => FacetStats {
                                min: s.min.min(n),
                                max: s.max.max(n),
                            },
                            None => FacetStats { min: n, max: n },
                        });
                    }
                }
            }

            let ordered = order_counts(counts, faceting.order_for(facet), faceting.max_values_per_facet);
            distribution.insert(facet.clone(), ordered);
            if let Some(s) = facet_stats {
                stats.insert(facet.clone(), s);
            }
        }

        (distribution, stats)
    }

    pub fn facet_search(&self, query: &FacetSearchQuery) -> Result<FacetSearchResult> {
        let start = Instant::now();
        self.check_cancelled()?;

        let settings = &self.state.settings;
        if !settings.is_filterable(&query.facet_name) {
            return Err(GriddleError::AttributeNotFilterable {
                attribute: query.facet_name.clone(),
                available: settings.filterable_list(),
            });
        }

        let filter = self.resolve_filter(query.filter.as_ref())?;
        let parsed = QueryParser::new(settings).parse(query.q.as_deref().unwrap_or_default());
        let strategy = query.matching_strategy.unwrap_or_default();
        let candidates = self.collect_candidates(&parsed, filter.as_ref(), strategy)?;

        let raw_query = normalize(query.facet_query.as_deref().unwrap_or_default().trim());
        let query_words = words(&raw_query);

        let mut counts: IndexMap<String, usize> = IndexMap::new();
        for candidate in &candidates {
            for (value, _) in facet_values(candidate.doc, &query.facet_name) {
                if facet_query_matches(&value, &query_words, &raw_query) {
                    *counts.entry(value).or_insert(0) += 1;
                }
            }
        }

        let facet_hits = order_counts(counts, FacetValuesOrder::Count, settings.faceting.max_values_per_facet)
            .into_iter()
            .map(|(value, count)| FacetHit { value, count })
            .collect();

        tracing::debug!(
            "[SEARCH {}] facet search on `{}` took {}ms",
            self.state.uid,
            query.facet_name,
            start.elapsed().as_millis()
        );

        Ok(FacetSearchResult {
            facet_hits,
            facet_query: query.facet_query.clone(),
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}
