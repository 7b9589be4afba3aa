//! Filter expression tree and its evaluation against stored documents.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GriddleError, Result};
use crate::index::document::get_path;
use crate::index::settings::IndexSettings;
use crate::query::filter_parser;
use crate::tokenizer::normalize;
use crate::types::Document;

pub(crate) const MAX_FILTER_DEPTH: usize = 32;
const MAX_BOOLEAN_CLAUSES: usize = 1000;

/// A literal as written in a filter; interpreted against each document value.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub raw: String,
}

impl Literal {
    pub fn new(raw: impl Into<String>) -> Self {
        Literal { raw: raw.into() }
    }

    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Literal::new(s.clone())),
            Value::Number(n) => Some(Literal::new(n.to_string())),
            Value::Bool(b) => Some(Literal::new(b.to_string())),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        self.raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Equals { field: String, value: Literal },
    NotEquals { field: String, value: Literal },
    GreaterThan { field: String, value: Literal },
    GreaterThanOrEqual { field: String, value: Literal },
    LessThan { field: String, value: Literal },
    LessThanOrEqual { field: String, value: Literal },
    Range { field: String, min: Literal, max: Literal },
    In { field: String, values: Vec<Literal> },
    Contains { field: String, value: Literal },
    Exists { field: String },
    Not(Box<Filter>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    /// Every attribute referenced by the expression.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Filter::Not(inner) => inner.collect_fields(out),
            Filter::And(items) | Filter::Or(items) => {
                for item in items {
                    item.collect_fields(out);
                }
            }
            leaf => {
                if let Some(field) = leaf.field() {
                    if !out.contains(&field) {
                        out.push(field);
                    }
                }
            }
        }
    }

    fn field(&self) -> Option<&str> {
        match self {
            Filter::Equals { field, .. }
            | Filter::NotEquals { field, .. }
            | Filter::GreaterThan { field, .. }
            | Filter::GreaterThanOrEqual { field, .. }
            | Filter::LessThan { field, .. }
            | Filter::LessThanOrEqual { field, .. }
            | Filter::Range { field, .. }
            | Filter::In { field, .. }
            | Filter::Contains { field, .. }
            | Filter::Exists { field } => Some(field),
            _ => None,
        }
    }

    /// Check attributes against `filterableAttributes` and literal types against operators.
    pub fn validate(&self, settings: &IndexSettings) -> Result<()> {
        self.check(settings, 0)
    }

    fn check(&self, settings: &IndexSettings, depth: usize) -> Result<()> {
        if depth > MAX_FILTER_DEPTH {
            return Err(GriddleError::InvalidFilter(format!(
                "filter is nested more than {} levels deep",
                MAX_FILTER_DEPTH
            )));
        }
        match self {
            Filter::Not(inner) => inner.check(settings, depth + 1),
            Filter::And(items) | Filter::Or(items) => {
                if items.len() > MAX_BOOLEAN_CLAUSES {
                    return Err(GriddleError::InvalidFilter(format!(
                        "filter has {} clauses, max {}",
                        items.len(),
                        MAX_BOOLEAN_CLAUSES
                    )));
                }
                items.iter().try_for_each(|f| f.check(settings, depth + 1))
            }
            leaf => {
                let field = leaf.field().unwrap_or_default();
                if !settings.is_filterable(field) {
                    return Err(GriddleError::AttributeNotFilterable {
                        attribute: field.to_string(),
                        available: settings.filterable_list(),
                    });
                }
                match leaf {
                    Filter::GreaterThan { value, .. }
                    | Filter::GreaterThanOrEqual { value, .. }
                    | Filter::LessThan { value, .. }
                    | Filter::LessThanOrEqual { value, .. } => require_number(field, value),
                    Filter::Range { min, max, .. } => {
                        require_number(field, min)?;
                        require_number(field, max)
                    }
                    _ => Ok(()),
                }
            }
        }
    }

    pub fn matches(&self, doc: &Document) -> Result<bool> {
        match self {
            Filter::Equals { field, value } => Ok(get_path(doc, field).is_some_and(|v| value_equals(v, value))),
            Filter::NotEquals { field, value } => {
                Ok(!get_path(doc, field).is_some_and(|v| value_equals(v, value)))
            }
            Filter::GreaterThan { field, value } => {
                let bound = number_literal(field, value)?;
                numeric_condition(field, get_path(doc, field), &|n| n > bound)
            }
            Filter::GreaterThanOrEqual { field, value } => {
                let bound = number_literal(field, value)?;
                numeric_condition(field, get_path(doc, field), &|n| n >= bound)
            }
            Filter::LessThan { field, value } => {
                let bound = number_literal(field, value)?;
                numeric_condition(field, get_path(doc, field), &|n| n < bound)
            }
            Filter::LessThanOrEqual { field, value } => {
                let bound = number_literal(field, value)?;
                numeric_condition(field, get_path(doc, field), &|n| n <= bound)
            }
            Filter::Range { field, min, max } => {
                let (lo, hi) = (number_literal(field, min)?, number_literal(field, max)?);
                numeric_condition(field, get_path(doc, field), &|n| n >= lo && n <= hi)
            }
            Filter::In { field, values } => Ok(get_path(doc, field)
                .is_some_and(|v| values.iter().any(|lit| value_equals(v, lit)))),
            Filter::Contains { field, value } => {
                Ok(get_path(doc, field).is_some_and(|v| value_contains(v, value)))
            }
            Filter::Exists { field } => Ok(get_path(doc, field).is_some()),
            Filter::Not(inner) => Ok(!inner.matches(doc)?),
            Filter::And(items) => {
                for item in items {
                    if !item.matches(doc)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Filter::Or(items) => {
                for item in items {
                    if item.matches(doc)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

fn require_number(field: &str, literal: &Literal) -> Result<()> {
    number_literal(field, literal).map(|_| ())
}

fn number_literal(field: &str, literal: &Literal) -> Result<f64> {
    literal.as_number().ok_or_else(|| GriddleError::TypeMismatch {
        attribute: field.to_string(),
        expected: "a number".to_string(),
        actual: format!("`{}`", literal.raw),
    })
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("string `{}`", s),
        Value::Bool(b) => format!("boolean `{}`", b),
        other => other.to_string(),
    }
}

fn numeric_condition(field: &str, value: Option<&Value>, pred: &dyn Fn(f64) -> bool) -> Result<bool> {
    match value {
        None | Some(Value::Null) | Some(Value::Object(_)) => Ok(false),
        Some(Value::Number(n)) => Ok(n.as_f64().is_some_and(pred)),
        Some(Value::Array(items)) => {
            for item in items {
                if numeric_condition(field, Some(item), pred)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Some(other) => Err(GriddleError::TypeMismatch {
            attribute: field.to_string(),
            expected: "a number".to_string(),
            actual: describe(other),
        }),
    }
}

fn value_equals(value: &Value, literal: &Literal) -> bool {
    match value {
        Value::String(s) => normalize(s) == normalize(&literal.raw),
        Value::Number(n) => match (n.as_f64(), literal.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        Value::Bool(b) => literal.raw.eq_ignore_ascii_case(if *b { "true" } else { "false" }),
        Value::Array(items) => items.iter().any(|item| value_equals(item, literal)),
        Value::Null | Value::Object(_) => false,
    }
}

fn value_contains(value: &Value, literal: &Literal) -> bool {
    match value {
        Value::String(s) => normalize(s).contains(&normalize(&literal.raw)),
        Value::Array(items) => items.iter().any(|item| value_equals(item, literal)),
        other => value_equals(other, literal),
    }
}

/// Filter as accepted from callers: a string expression, an array of
/// expressions (outer AND, inner OR) or an object-shaped filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterInput {
    Expression(String),
    Array(Vec<FilterArrayItem>),
    Object(serde_json::Map<String, Value>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterArrayItem {
    Expression(String),
    AnyOf(Vec<String>),
}

impl FilterInput {
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|_| {
            GriddleError::InvalidFilter(
                "filter must be a string, an array of strings or an object".to_string(),
            )
        })
    }

    /// `None` means the filter selects every document.
    pub fn parse(&self) -> Result<Option<Filter>> {
        match self {
            FilterInput::Expression(expr) => filter_parser::parse_filter(expr),
            FilterInput::Object(map) => filter_parser::parse_object_filter(map),
            FilterInput::Array(items) => {
                let mut clauses = Vec::new();
                for item in items {
                    match item {
                        FilterArrayItem::Expression(expr) => {
                            if let Some(f) = filter_parser::parse_filter(expr)? {
                                clauses.push(f);
                            }
                        }
                        FilterArrayItem::AnyOf(exprs) => {
                            let mut any = Vec::new();
                            for expr in exprs {
                                if let Some(f) = filter_parser::parse_filter(expr)? {
                                    any.push(f);
                                }
                            }
                            match any.len() {
                                0 => {}
                                1 => clauses.extend(any),
                                _ => clauses.push(Filter::Or(any)),
                            }
                        }
                    }
                }
                Ok(match clauses.len() {
                    0 => None,
                    1 => clauses.pop(),
                    _ => Some(Filter::And(clauses)),
                })
            }
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<&str> for FilterInput {
    fn from(expr: &str) -> Self {
        FilterInput::Expression(expr.to_string())
    }
}

impl From<String> for FilterInput {
    fn from(expr: String) -> Self {
        FilterInput::Expression(expr)
    }
}
