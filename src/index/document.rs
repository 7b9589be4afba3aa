use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{GriddleError, Result};
use crate::index::settings::IndexSettings;
use crate::types::{Document, DocumentId};

static INDEX_UID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,400}$").expect("static regex"));
static DOCUMENT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,511}$").expect("static regex"));

pub fn validate_index_uid(uid: &str) -> Result<()> {
    if INDEX_UID.is_match(uid) {
        Ok(())
    } else {
        Err(GriddleError::InvalidIndexUid(uid.to_string()))
    }
}

/// Normalise a primary-key value to its string form.
pub fn normalize_document_id(value: &Value) -> Result<DocumentId> {
    match value {
        Value::String(s) if DOCUMENT_ID.is_match(s) => Ok(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        other => Err(GriddleError::InvalidDocumentId(match other {
            Value::String(s) => s.clone(),
            v => v.to_string(),
        })),
    }
}

pub fn extract_document_id(doc: &Document, primary_key: &str, position: usize) -> Result<DocumentId> {
    match doc.get(primary_key) {
        Some(value) => normalize_document_id(value),
        None => Err(GriddleError::MissingPrimaryKey {
            primary_key: primary_key.to_string(),
            position,
        }),
    }
}

/// Pick the single attribute of `doc` whose name ends in `id`.
pub fn infer_primary_key(doc: &Document) -> Result<String> {
    let candidates: Vec<&String> = doc
        .keys()
        .filter(|k| k.to_lowercase().ends_with("id"))
        .collect();
    match candidates.as_slice() {
        [single] => Ok((*single).clone()),
        [] => Err(GriddleError::PrimaryKeyInference(
            "no attribute ending in `id` was found; specify the primary key manually".to_string(),
        )),
        many => Err(GriddleError::PrimaryKeyInference(format!(
            "several candidates were found ({}); specify the primary key manually",
            many.iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

/// Check that every value is an object carrying a valid primary key.
pub fn validate_batch(documents: Vec<Value>, primary_key: &str) -> Result<Vec<Document>> {
    documents
        .into_iter()
        .enumerate()
        .map(|(position, value)| match value {
            Value::Object(doc) => {
                extract_document_id(&doc, primary_key, position)?;
                Ok(doc)
            }
            other => Err(GriddleError::InvalidDocument(format!(
                "document at position {} is not a JSON object: {}",
                position,
                truncate(&other.to_string(), 60)
            ))),
        })
        .collect()
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Look up an attribute, following dots into nested objects when no literal key matches.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    if let Some(v) = doc.get(path) {
        return Some(v);
    }
    let (head, rest) = path.split_once('.')?;
    match doc.get(head)? {
        Value::Object(inner) => get_path(inner, rest),
        _ => None,
    }
}

/// Restrict a document to displayed attributes, optionally intersected with `fields`.
pub fn project(doc: &Document, fields: Option<&[String]>, settings: &IndexSettings) -> Document {
    let wants_all = fields.map_or(true, |f| f.iter().any(|a| a == "*"));
    doc.iter()
        .filter(|(key, _)| settings.is_displayed(key))
        .filter(|(key, _)| wants_all || fields.is_some_and(|f| f.iter().any(|a| a == *key)))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Shallow merge used by partial document updates.
pub fn merge_into(existing: &mut Document, update: Document) {
    for (key, value) in update {
        existing.insert(key, value);
    }
}

/// Count of documents carrying each top-level attribute.
pub fn field_distribution<'a>(docs: impl Iterator<Item = &'a Document>) -> BTreeMap<String, usize> {
    let mut distribution = BTreeMap::new();
    for doc in docs {
        for key in doc.keys() {
            *distribution.entry(key.clone()).or_insert(0) += 1;
        }
    }
    distribution
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Document {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_index_uid_validation() {
        assert!(validate_index_uid("movies").is_ok());
        assert!(validate_index_uid("movies_2024-v2").is_ok());
        assert!(validate_index_uid("").is_err());
        assert!(validate_index_uid("my index").is_err());
        assert!(validate_index_uid(&"a".repeat(401)).is_err());
    }

    #[test]
    fn test_document_id_normalization() {
        assert_eq!(normalize_document_id(&json!(42)).unwrap(), "42");
        assert_eq!(normalize_document_id(&json!("sku-1_a")).unwrap(), "sku-1_a");
        assert!(normalize_document_id(&json!("has space")).is_err());
        assert!(normalize_document_id(&json!(1.5)).is_err());
        assert!(normalize_document_id(&json!(null)).is_err());
    }

    #[test]
    fn test_infer_primary_key() {
        assert_eq!(
            infer_primary_key(&obj(json!({"title": "x", "productId": 3}))).unwrap(),
            "productId"
        );
        assert!(infer_primary_key(&obj(json!({"title": "x"}))).is_err());
        assert!(infer_primary_key(&obj(json!({"id": 1, "sku_id": 2}))).is_err());
    }

    #[test]
    fn test_validate_batch_reports_position() {
        let err = validate_batch(vec![json!({"id": 1}), json!({"title": "no id"})], "id").unwrap_err();
        assert_eq!(
            err,
            GriddleError::MissingPrimaryKey {
                primary_key: "id".into(),
                position: 1
            }
        );
        assert!(matches!(
            validate_batch(vec![json!("nope")], "id"),
            Err(GriddleError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_get_path_nested() {
        let doc = obj(json!({"author": {"name": "Le Guin"}, "a.b": 1}));
        assert_eq!(get_path(&doc, "author.name"), Some(&json!("Le Guin")));
        assert_eq!(get_path(&doc, "a.b"), Some(&json!(1)));
        assert_eq!(get_path(&doc, "author.born"), None);
    }

    #[test]
    fn test_project_respects_displayed_and_fields() {
        let settings = IndexSettings {
            displayed_attributes: vec!["id".into(), "title".into()],
            ..Default::default()
        };
        let doc = obj(json!({"id": 1, "title": "Dune", "secret": true}));
        let all = project(&doc, None, &settings);
        assert_eq!(Value::Object(all), json!({"id": 1, "title": "Dune"}));
        let some = project(&doc, Some(&["title".to_string(), "secret".to_string()]), &settings);
        assert_eq!(Value::Object(some), json!({"title": "Dune"}));
    }
}
