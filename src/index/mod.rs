pub mod document;
pub mod manager;
pub mod settings;
pub mod storage;
pub mod task_queue;
pub mod write_queue;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{GriddleError, Result};
use crate::query::filter::Filter;
use crate::types::{Document, DocumentId, IndexInfo, IndexStats, IndexUid};
use document::{extract_document_id, field_distribution, merge_into};
use settings::{IndexSettings, SettingsUpdate};

/// Committed contents of one index.
///
/// The manager publishes an `Arc<IndexState>` after every successful task;
/// readers keep whichever snapshot they loaded for the whole query. Writers
/// clone the snapshot, mutate the copy and swap it in, so a failed task
/// leaves the previous state untouched.
///
/// # Examples
///
/// ```rust
/// use griddle::index::IndexState;
/// use serde_json::json;
///
/// let mut state = IndexState::new("books", Some("id".to_string()));
/// let doc = json!({"id": 1, "title": "Dune"}).as_object().unwrap().clone();
/// state.upsert_documents(vec![doc], "id", false).unwrap();
/// assert_eq!(state.stats(false).number_of_documents, 1);
/// ```
#[derive(Debug, Clone)]
pub struct IndexState {
    pub uid: IndexUid,
    pub primary_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub settings: IndexSettings,
    /// Documents keyed by normalised id, in first-insertion order.
    pub documents: IndexMap<DocumentId, Arc<Document>>,
}

impl IndexState {
    pub fn new(uid: impl Into<IndexUid>, primary_key: Option<String>) -> Self {
        let now = Utc::now();
        IndexState {
            uid: uid.into(),
            primary_key,
            created_at: now,
            updated_at: now,
            settings: IndexSettings::default(),
            documents: IndexMap::new(),
        }
    }

    pub fn info(&self) -> IndexInfo {
        IndexInfo {
            uid: self.uid.clone(),
            primary_key: self.primary_key.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn stats(&self, is_indexing: bool) -> IndexStats {
        IndexStats {
            number_of_documents: self.documents.len(),
            is_indexing,
            field_distribution: field_distribution(self.documents.values().map(|d| &**d)),
        }
    }

    pub fn get_document(&self, id: &str) -> Option<&Arc<Document>> {
        self.documents.get(id)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Assign the primary key. Changing it is refused once documents exist.
    pub fn set_primary_key(&mut self, primary_key: &str) -> Result<()> {
        match &self.primary_key {
            Some(existing) if existing == primary_key => Ok(()),
            Some(existing) if !self.documents.is_empty() => Err(GriddleError::PrimaryKeyAlreadyPresent {
                index: self.uid.clone(),
                existing: existing.clone(),
            }),
            _ => {
                self.primary_key = Some(primary_key.to_string());
                self.touch();
                Ok(())
            }
        }
    }

    /// Insert or replace documents by primary key. With `merge`, top-level
    /// fields are merged into an existing document instead of replacing it.
    /// Returns the number of documents written.
    pub fn upsert_documents(&mut self, documents: Vec<Document>, primary_key: &str, merge: bool) -> Result<usize> {
        self.set_primary_key(primary_key)?;

        // resolve every id before touching the map so the batch applies whole
        let mut keyed = Vec::with_capacity(documents.len());
        for (position, doc) in documents.into_iter().enumerate() {
            keyed.push((extract_document_id(&doc, primary_key, position)?, doc));
        }

        let count = keyed.len();
        for (id, doc) in keyed {
            match self.documents.get_mut(&id) {
                Some(existing) if merge => merge_into(Arc::make_mut(existing), doc),
                _ => {
                    self.documents.insert(id, Arc::new(doc));
                }
            }
        }
        self.touch();
        Ok(count)
    }

    pub fn delete_documents(&mut self, ids: &[DocumentId]) -> usize {
        let before = self.documents.len();
        let ids: HashSet<&DocumentId> = ids.iter().collect();
        self.documents.retain(|id, _| !ids.contains(id));
        let deleted = before - self.documents.len();
        if deleted > 0 {
            self.touch();
        }
        deleted
    }

    /// Delete every document matching `filter`, checked against the current filterable attributes.
    pub fn delete_by_filter(&mut self, filter: &Filter) -> Result<usize> {
        filter.validate(&self.settings)?;

        let mut doomed = Vec::new();
        for (id, doc) in &self.documents {
            if filter.matches(doc)? {
                doomed.push(id.clone());
            }
        }
        for id in &doomed {
            self.documents.shift_remove(id);
        }
        if !doomed.is_empty() {
            self.touch();
        }
        Ok(doomed.len())
    }

    pub fn clear(&mut self) -> usize {
        let deleted = self.documents.len();
        self.documents.clear();
        self.touch();
        deleted
    }

    pub fn apply_settings(&mut self, update: &SettingsUpdate) -> Result<()> {
        self.settings = self.settings.apply(update)?;
        self.touch();
        Ok(())
    }
}
