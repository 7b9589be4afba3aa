use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::error::{GriddleError, Result};
use crate::index::document::get_path;
use crate::index::settings::IndexSettings;
use crate::types::Document;

/// A sort entry as accepted from callers: `"price:asc"` or `{"price": "asc"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortEntry {
    Expression(String),
    Object(serde_json::Map<String, Value>),
}

impl From<&str> for SortEntry {
    fn from(expr: &str) -> Self {
        SortEntry::Expression(expr.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn parse(raw: &str, entry: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(GriddleError::InvalidSearch(format!(
                "invalid sort direction `{}` in `{}`; expected `asc` or `desc`",
                other, entry
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortCriterion {
    pub field: String,
    pub order: SortOrder,
}

pub fn parse_sort(entries: &[SortEntry]) -> Result<Vec<SortCriterion>> {
    let mut criteria = Vec::new();
    for entry in entries {
        match entry {
            SortEntry::Expression(expr) => {
                let (field, order) = expr.rsplit_once(':').ok_or_else(|| {
                    GriddleError::InvalidSearch(format!(
                        "invalid sort `{}`; expected `attribute:asc` or `attribute:desc`",
                        expr
                    ))
                })?;
                criteria.push(SortCriterion {
                    field: field.trim().to_string(),
                    order: SortOrder::parse(order, expr)?,
                });
            }
            SortEntry::Object(map) => {
                for (field, order) in map {
                    let order = order.as_str().ok_or_else(|| {
                        GriddleError::InvalidSearch(format!(
                            "sort direction for `{}` must be a string",
                            field
                        ))
                    })?;
                    criteria.push(SortCriterion {
                        field: field.clone(),
                        order: SortOrder::parse(order, field)?,
                    });
                }
            }
        }
    }
    Ok(criteria)
}

pub fn validate_sort(criteria: &[SortCriterion], settings: &IndexSettings) -> Result<()> {
    for criterion in criteria {
        if !settings.is_sortable(&criterion.field) {
            return Err(GriddleError::AttributeNotSortable {
                attribute: criterion.field.clone(),
                available: settings.sortable_list(),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SortValue {
    Number(f64),
    Text(String),
}

impl SortValue {
    fn cmp_value(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortValue::Number(a), SortValue::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            (SortValue::Number(_), SortValue::Text(_)) => Ordering::Less,
            (SortValue::Text(_), SortValue::Number(_)) => Ordering::Greater,
        }
    }
}

fn scalar_sort_value(value: &Value) -> Option<SortValue> {
    match value {
        Value::Number(n) => n.as_f64().map(SortValue::Number),
        Value::String(s) => Some(SortValue::Text(s.to_lowercase())),
        Value::Bool(b) => Some(SortValue::Number(if *b { 1.0 } else { 0.0 })),
        _ => None,
    }
}

/// Sort key of a document; arrays contribute their smallest (asc) or largest (desc) element.
pub(crate) fn extract_sort_value(doc: &Document, field: &str, order: SortOrder) -> Option<SortValue> {
    match get_path(doc, field)? {
        Value::Array(items) => {
            let values = items.iter().filter_map(scalar_sort_value);
            match order {
                SortOrder::Asc => values.min_by(|a, b| a.cmp_value(b)),
                SortOrder::Desc => values.max_by(|a, b| a.cmp_value(b)),
            }
        }
        other => scalar_sort_value(other),
    }
}

/// Compare on one attribute. Documents without a value sort last in both directions.
pub(crate) fn compare_field(a: &Document, b: &Document, field: &str, order: SortOrder) -> Ordering {
    match (extract_sort_value(a, field, order), extract_sort_value(b, field, order)) {
        (Some(x), Some(y)) => match order {
            SortOrder::Asc => x.cmp_value(&y),
            SortOrder::Desc => y.cmp_value(&x),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub(crate) fn compare_by_criteria(a: &Document, b: &Document, criteria: &[SortCriterion]) -> Ordering {
    for criterion in criteria {
        let ord = compare_field(a, b, &criterion.field, criterion.order);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
