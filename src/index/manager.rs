use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc::error::TrySendError};
use tokio::task::JoinHandle;

use super::document::{
    infer_primary_key, normalize_document_id, project, validate_batch, validate_index_uid,
};
use super::settings::{IndexSettings, Setting, SettingField, SettingsUpdate};
use super::storage::Storage;
use super::task_queue::TaskStore;
use super::write_queue::{create_write_queue, IndexOperation, WorkerContext, WriteOp, WriteQueue};
use super::IndexState;
use crate::config::EngineConfig;
use crate::error::{GriddleError, Result};
use crate::query::executor::{
    FacetSearchQuery, FacetSearchResult, QueryExecutor, SearchCancellation, SearchQuery, SearchResult,
    DEFAULT_LIMIT,
};
use crate::query::filter::FilterInput;
use crate::types::{
    Document, HealthStatus, IndexInfo, IndexStats, IndexUid, Paginated, TaskDetails, TaskInfo, TaskQuery,
    TaskType, TaskUid, VersionInfo,
};

/// Registry entry for one index uid.
pub(crate) struct IndexSlot {
    pub generation: u64,
    /// Last committed state; `None` until the creation task has run.
    pub state: Option<Arc<IndexState>>,
    /// Primary key fixed by accepted (possibly still queued) tasks.
    pub declared_primary_key: Option<String>,
    pub queue: WriteQueue,
}

/// Options for [`IndexManager::get_documents`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentsQuery {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub fields: Option<Vec<String>>,
    pub filter: Option<FilterInput>,
}

/// Body of a delete-documents request: exactly one of `ids` or `filter`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteDocumentsRequest {
    pub ids: Option<Vec<Value>>,
    pub filter: Option<FilterInput>,
}

/// One entry of a multi-search batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiSearchQuery {
    pub index_uid: IndexUid,
    #[serde(flatten)]
    pub query: SearchQuery,
}

impl MultiSearchQuery {
    pub fn new(index_uid: impl Into<IndexUid>, query: SearchQuery) -> Self {
        MultiSearchQuery {
            index_uid: index_uid.into(),
            query,
        }
    }
}

/// A search running in the background that can be cancelled until it starts evaluating.
pub struct PendingSearch {
    cancellation: SearchCancellation,
    handle: JoinHandle<Result<SearchResult>>,
}

impl PendingSearch {
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn cancellation(&self) -> SearchCancellation {
        self.cancellation.clone()
    }

    pub async fn result(self) -> Result<SearchResult> {
        self.handle.await.map_err(GriddleError::from)?
    }
}

/// Owns every index, its write queue and the task registry.
///
/// Mutations return a [`TaskInfo`] as soon as they are accepted; the work
/// runs on the index's write queue. Reads (search, documents, settings) see
/// the last committed state and never wait for queued tasks.
///
/// # Examples
///
/// ```rust
/// use griddle::{IndexManager, SearchQuery};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> griddle::Result<()> {
/// let manager = IndexManager::in_memory();
/// let task = manager.create_index("books", Some("id"))?;
/// manager.wait_for_task(task.uid).await?;
///
/// let task = manager.add_documents("books", vec![json!({"id": 1, "title": "Dune"})], None)?;
/// manager.wait_for_task(task.uid).await?;
///
/// let result = manager.search("books", &SearchQuery::new("dune"))?;
/// assert_eq!(result.hits.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct IndexManager {
    config: EngineConfig,
    indexes: Arc<DashMap<IndexUid, IndexSlot>>,
    tasks: Arc<TaskStore>,
    storage: Option<Storage>,
    next_generation: AtomicU64,
}

impl IndexManager {
    /// Create a manager and load any indexes persisted under `config.data_dir`.
    ///
    /// Must be called inside a tokio runtime: every index gets a worker task.
    pub fn new(config: EngineConfig) -> Result<Arc<Self>> {
        let storage = config.data_dir.as_ref().map(Storage::open).transpose()?;
        let manager = Self::build(config, storage);

        if let Some(storage) = &manager.storage {
            for state in storage.load_all()? {
                let uid = state.uid.clone();
                let declared = state.primary_key.clone();
                let slot = manager.new_slot(&uid, Some(Arc::new(state)), declared);
                manager.indexes.insert(uid, slot);
            }
            tracing::info!(
                "[STORE] opened {} with {} indexes",
                storage.root().display(),
                manager.indexes.len()
            );
        }
        Ok(manager)
    }

    /// A manager without persistence using default limits.
    pub fn in_memory() -> Arc<Self> {
        Self::build(EngineConfig::in_memory(), None)
    }

    fn build(config: EngineConfig, storage: Option<Storage>) -> Arc<Self> {
        Arc::new(IndexManager {
            tasks: Arc::new(TaskStore::new(config.max_tasks_per_index)),
            indexes: Arc::new(DashMap::new()),
            storage,
            next_generation: AtomicU64::new(0),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn new_slot(&self, uid: &str, state: Option<Arc<IndexState>>, declared_primary_key: Option<String>) -> IndexSlot {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let queue = create_write_queue(
            WorkerContext {
                uid: uid.to_string(),
                generation,
                indexes: Arc::clone(&self.indexes),
                tasks: Arc::clone(&self.tasks),
                storage: self.storage.clone(),
            },
            self.config.queue_capacity,
        );
        IndexSlot {
            generation,
            state,
            declared_primary_key,
            queue,
        }
    }

    /// Register a task and push its operation onto the index queue.
    ///
    /// The slot stays locked from `prepare` until the send, so task uids of
    /// one index enter its queue in increasing order.
    fn enqueue(
        &self,
        uid: &str,
        task_type: TaskType,
        details: TaskDetails,
        operation: IndexOperation,
        prepare: impl FnOnce(&mut IndexSlot) -> Result<()>,
    ) -> Result<TaskInfo> {
        let mut slot = self
            .indexes
            .get_mut(uid)
            .ok_or_else(|| GriddleError::IndexNotFound(uid.to_string()))?;
        let declared = slot.declared_primary_key.clone();
        prepare(slot.value_mut())?;

        let task = self.tasks.register(uid, task_type, details);
        let err = match slot.queue.try_send(WriteOp {
            task_uid: task.uid,
            operation,
        }) {
            Ok(()) => return Ok(task),
            Err(TrySendError::Full(_)) => {
                tracing::warn!("[TASK {}] rejecting task {}: queue full", uid, task.uid);
                GriddleError::QueueFull(uid.to_string())
            }
            Err(TrySendError::Closed(_)) => {
                let err = GriddleError::Internal(format!("write queue for `{}` is closed", uid));
                tracing::error!("[TASK {}] {}", uid, err);
                err
            }
        };
        // a rejected batch must not pin its primary key
        slot.declared_primary_key = declared;
        drop(slot);
        self.tasks.reject(task.uid, &err);
        Err(err)
    }

    fn committed(&self, uid: &str) -> Result<Arc<IndexState>> {
        self.indexes
            .get(uid)
            .and_then(|slot| slot.state.clone())
            .ok_or_else(|| GriddleError::IndexNotFound(uid.to_string()))
    }

    pub fn create_index(&self, uid: &str, primary_key: Option<&str>) -> Result<TaskInfo> {
        validate_index_uid(uid)?;
        let primary_key = primary_key.map(str::to_string);

        match self.indexes.entry(uid.to_string()) {
            Entry::Occupied(_) => Err(GriddleError::IndexAlreadyExists(uid.to_string())),
            Entry::Vacant(vacant) => {
                let slot = self.new_slot(uid, None, primary_key.clone());
                let task = self.tasks.register(
                    uid,
                    TaskType::IndexCreation,
                    TaskDetails {
                        primary_key: primary_key.clone(),
                        ..Default::default()
                    },
                );
                // a fresh queue always has room
                if slot
                    .queue
                    .try_send(WriteOp {
                        task_uid: task.uid,
                        operation: IndexOperation::CreateIndex { primary_key },
                    })
                    .is_err()
                {
                    let err = GriddleError::Internal(format!("write queue for `{}` rejected creation", uid));
                    self.tasks.reject(task.uid, &err);
                    return Err(err);
                }
                vacant.insert(slot);
                tracing::info!("[TASK {}] index creation enqueued as task {}", uid, task.uid);
                Ok(task)
            }
        }
    }

    /// Set the primary key of an index that has no documents under another key.
    pub fn update_index(&self, uid: &str, primary_key: &str) -> Result<TaskInfo> {
        let primary_key = primary_key.to_string();
        let pk = primary_key.clone();
        self.enqueue(
            uid,
            TaskType::IndexUpdate,
            TaskDetails {
                primary_key: Some(primary_key.clone()),
                ..Default::default()
            },
            IndexOperation::UpdateIndex { primary_key },
            move |slot| {
                if let Some(state) = &slot.state {
                    if let Some(existing) = &state.primary_key {
                        if *existing != pk && !state.documents.is_empty() {
                            return Err(GriddleError::PrimaryKeyAlreadyPresent {
                                index: state.uid.clone(),
                                existing: existing.clone(),
                            });
                        }
                    }
                }
                slot.declared_primary_key = Some(pk);
                Ok(())
            },
        )
    }

    /// Remove an index with its documents, settings and tasks.
    ///
    /// Returns an `indexDeletion` task that has already succeeded; deleting an
    /// unknown uid succeeds without effect.
    pub fn delete_index(&self, uid: &str) -> Result<TaskInfo> {
        validate_index_uid(uid)?;

        // the entry lock keeps a worker from saving or a new index from
        // being created until the files are gone
        let (removed, stored) = match self.indexes.entry(uid.to_string()) {
            Entry::Occupied(occupied) => {
                let stored = self.remove_files(uid);
                (Some(occupied.remove()), stored)
            }
            Entry::Vacant(_) => (None, self.remove_files(uid)),
        };
        let purged = self.tasks.remove_index(uid);
        let deleted_documents = removed
            .as_ref()
            .and_then(|slot| slot.state.as_ref())
            .map_or(0, |state| state.documents.len());

        let task = self.tasks.register(
            uid,
            TaskType::IndexDeletion,
            TaskDetails {
                deleted_documents: Some(deleted_documents),
                ..Default::default()
            },
        );
        self.tasks.start(task.uid);

        if let Err(e) = stored {
            tracing::error!("[STORE {}] failed to remove index files: {}", uid, e);
            return self.tasks.fail(task.uid, &e).ok_or(GriddleError::TaskNotFound(task.uid));
        }

        if removed.is_some() {
            tracing::info!(
                "[TASK {}] index deleted ({} documents, {} tasks purged)",
                uid,
                deleted_documents,
                purged
            );
        }
        self.tasks
            .succeed(task.uid, TaskDetails::default())
            .ok_or(GriddleError::TaskNotFound(task.uid))
    }

    fn remove_files(&self, uid: &str) -> Result<()> {
        match &self.storage {
            Some(storage) => storage.remove(uid),
            None => Ok(()),
        }
    }

    pub fn get_index(&self, uid: &str) -> Result<IndexInfo> {
        Ok(self.committed(uid)?.info())
    }

    /// Committed indexes ordered by uid.
    pub fn list_indexes(&self, offset: usize, limit: usize) -> Paginated<IndexInfo> {
        let mut infos: Vec<IndexInfo> = self
            .indexes
            .iter()
            .filter_map(|slot| slot.state.as_ref().map(|s| s.info()))
            .collect();
        infos.sort_by(|a, b| a.uid.cmp(&b.uid));
        Paginated::from_slice(&infos, offset, limit)
    }

    pub fn index_stats(&self, uid: &str) -> Result<IndexStats> {
        let state = self.committed(uid)?;
        Ok(state.stats(self.tasks.is_indexing(uid)))
    }

    pub fn add_documents(&self, uid: &str, documents: Vec<Value>, primary_key: Option<&str>) -> Result<TaskInfo> {
        self.write_documents(uid, documents, primary_key, false)
    }

    /// Like [`add_documents`](Self::add_documents) but merges fields into existing documents.
    pub fn update_documents(&self, uid: &str, documents: Vec<Value>, primary_key: Option<&str>) -> Result<TaskInfo> {
        self.write_documents(uid, documents, primary_key, true)
    }

    fn write_documents(
        &self,
        uid: &str,
        documents: Vec<Value>,
        primary_key: Option<&str>,
        merge: bool,
    ) -> Result<TaskInfo> {
        if documents.len() > self.config.max_batch_documents {
            return Err(GriddleError::BatchTooLarge {
                size: documents.len(),
                max: self.config.max_batch_documents,
            });
        }

        let declared = self
            .indexes
            .get(uid)
            .map(|slot| slot.declared_primary_key.clone())
            .ok_or_else(|| GriddleError::IndexNotFound(uid.to_string()))?;

        let primary_key = match (primary_key, declared) {
            (Some(provided), Some(existing)) if provided != existing => {
                return Err(GriddleError::PrimaryKeyAlreadyPresent {
                    index: uid.to_string(),
                    existing,
                });
            }
            (Some(provided), _) => provided.to_string(),
            (None, Some(existing)) => existing,
            (None, None) => {
                let first = documents.first().and_then(Value::as_object).ok_or_else(|| {
                    GriddleError::InvalidDocument(
                        "cannot infer a primary key: the first document is missing or not an object".to_string(),
                    )
                })?;
                infer_primary_key(first)?
            }
        };

        let received = documents.len();
        let documents = validate_batch(documents, &primary_key)?;

        let pk = primary_key.clone();
        self.enqueue(
            uid,
            TaskType::DocumentAdditionOrUpdate,
            TaskDetails {
                received_documents: Some(received),
                primary_key: Some(primary_key.clone()),
                ..Default::default()
            },
            IndexOperation::AddDocuments {
                documents,
                primary_key,
                merge,
            },
            move |slot| match &slot.declared_primary_key {
                Some(existing) if *existing != pk => Err(GriddleError::PrimaryKeyAlreadyPresent {
                    index: uid.to_string(),
                    existing: existing.clone(),
                }),
                _ => {
                    slot.declared_primary_key = Some(pk);
                    Ok(())
                }
            },
        )
    }

    /// Committed documents in insertion order, optionally filtered and projected.
    pub fn get_documents(&self, uid: &str, query: &DocumentsQuery) -> Result<Paginated<Document>> {
        let state = self.committed(uid)?;
        let filter = QueryExecutor::new(&state).resolve_filter(query.filter.as_ref())?;

        let mut matching = Vec::new();
        for doc in state.documents.values() {
            if let Some(f) = &filter {
                if !f.matches(doc)? {
                    continue;
                }
            }
            matching.push(doc);
        }

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
        let results = matching
            .iter()
            .skip(offset)
            .take(limit)
            .map(|doc| project(doc, query.fields.as_deref(), &state.settings))
            .collect();

        Ok(Paginated {
            results,
            offset,
            limit,
            total: matching.len(),
        })
    }

    pub fn get_document(&self, uid: &str, id: &str, fields: Option<&[String]>) -> Result<Document> {
        let state = self.committed(uid)?;
        let doc = state
            .get_document(id)
            .ok_or_else(|| GriddleError::DocumentNotFound(id.to_string()))?;
        Ok(project(doc, fields, &state.settings))
    }

    pub fn delete_document(&self, uid: &str, id: &str) -> Result<TaskInfo> {
        self.delete_documents_by_ids(uid, vec![Value::String(id.to_string())])
    }

    pub fn delete_documents_by_ids(&self, uid: &str, ids: Vec<Value>) -> Result<TaskInfo> {
        let ids = ids
            .iter()
            .map(normalize_document_id)
            .collect::<Result<Vec<_>>>()?;
        self.enqueue(
            uid,
            TaskType::DocumentDeletion,
            TaskDetails {
                provided_ids: Some(ids.len()),
                ..Default::default()
            },
            IndexOperation::DeleteDocuments { ids },
            |_| Ok(()),
        )
    }

    /// Delete every document matching `filter`.
    ///
    /// Syntax and filterability errors are returned without enqueueing,
    /// checked against the committed settings. The task checks again when it
    /// runs, since a queued settings update may have changed them.
    pub fn delete_documents_by_filter(&self, uid: &str, filter: impl Into<FilterInput>) -> Result<TaskInfo> {
        let input = filter.into();
        let filter = input
            .parse()?
            .ok_or_else(|| GriddleError::InvalidDeleteRequest("the filter must not be empty".to_string()))?;
        let original_filter = input.to_value();
        self.enqueue(
            uid,
            TaskType::DocumentDeletion,
            TaskDetails {
                original_filter: Some(original_filter),
                ..Default::default()
            },
            IndexOperation::DeleteByFilter {
                filter: filter.clone(),
            },
            move |slot| match &slot.state {
                Some(state) => filter.validate(&state.settings),
                None => filter.validate(&IndexSettings::default()),
            },
        )
    }

    pub fn delete_documents(&self, uid: &str, request: DeleteDocumentsRequest) -> Result<TaskInfo> {
        match request {
            DeleteDocumentsRequest {
                ids: Some(ids),
                filter: None,
            } => self.delete_documents_by_ids(uid, ids),
            DeleteDocumentsRequest {
                ids: None,
                filter: Some(filter),
            } => self.delete_documents_by_filter(uid, filter),
            DeleteDocumentsRequest { ids: Some(_), .. } => Err(GriddleError::InvalidDeleteRequest(
                "provide either `ids` or `filter`, not both".to_string(),
            )),
            DeleteDocumentsRequest { .. } => Err(GriddleError::InvalidDeleteRequest(
                "one of `ids` or `filter` is required".to_string(),
            )),
        }
    }

    pub fn clear_documents(&self, uid: &str) -> Result<TaskInfo> {
        self.enqueue(
            uid,
            TaskType::DocumentDeletion,
            TaskDetails::default(),
            IndexOperation::ClearDocuments,
            |_| Ok(()),
        )
    }

    pub fn get_settings(&self, uid: &str) -> Result<IndexSettings> {
        Ok(self.committed(uid)?.settings.clone())
    }

    pub fn get_setting(&self, uid: &str, field: SettingField) -> Result<Value> {
        field.get(&self.committed(uid)?.settings)
    }

    /// Apply a partial update: only fields present in `update` change.
    pub fn update_settings(&self, uid: &str, update: SettingsUpdate) -> Result<TaskInfo> {
        update.validate()?;
        let details = TaskDetails {
            settings: Some(serde_json::to_value(&update)?),
            ..Default::default()
        };
        self.enqueue(
            uid,
            TaskType::SettingsUpdate,
            details,
            IndexOperation::UpdateSettings(Box::new(update)),
            |_| Ok(()),
        )
    }

    pub fn reset_settings(&self, uid: &str) -> Result<TaskInfo> {
        self.update_settings(uid, SettingsUpdate::reset_all())
    }

    pub fn update_setting(&self, uid: &str, field: SettingField, value: Value) -> Result<TaskInfo> {
        self.update_settings(uid, field.update(value)?)
    }

    pub fn reset_setting(&self, uid: &str, field: SettingField) -> Result<TaskInfo> {
        self.update_settings(uid, field.reset())
    }

    pub fn update_searchable_attributes<S: Into<String>>(
        &self,
        uid: &str,
        attributes: impl IntoIterator<Item = S>,
    ) -> Result<TaskInfo> {
        self.update_settings(
            uid,
            SettingsUpdate {
                searchable_attributes: Setting::Set(strings(attributes)),
                ..Default::default()
            },
        )
    }

    pub fn update_filterable_attributes<S: Into<String>>(
        &self,
        uid: &str,
        attributes: impl IntoIterator<Item = S>,
    ) -> Result<TaskInfo> {
        self.update_settings(
            uid,
            SettingsUpdate {
                filterable_attributes: Setting::Set(strings(attributes)),
                ..Default::default()
            },
        )
    }

    pub fn update_sortable_attributes<S: Into<String>>(
        &self,
        uid: &str,
        attributes: impl IntoIterator<Item = S>,
    ) -> Result<TaskInfo> {
        self.update_settings(
            uid,
            SettingsUpdate {
                sortable_attributes: Setting::Set(strings(attributes)),
                ..Default::default()
            },
        )
    }

    pub fn update_displayed_attributes<S: Into<String>>(
        &self,
        uid: &str,
        attributes: impl IntoIterator<Item = S>,
    ) -> Result<TaskInfo> {
        self.update_settings(
            uid,
            SettingsUpdate {
                displayed_attributes: Setting::Set(strings(attributes)),
                ..Default::default()
            },
        )
    }

    pub fn update_ranking_rules<S: Into<String>>(&self, uid: &str, rules: impl IntoIterator<Item = S>) -> Result<TaskInfo> {
        self.update_settings(
            uid,
            SettingsUpdate {
                ranking_rules: Setting::Set(strings(rules)),
                ..Default::default()
            },
        )
    }

    pub fn update_stop_words<S: Into<String>>(&self, uid: &str, words: impl IntoIterator<Item = S>) -> Result<TaskInfo> {
        self.update_settings(
            uid,
            SettingsUpdate {
                stop_words: Setting::Set(words.into_iter().map(Into::into).collect()),
                ..Default::default()
            },
        )
    }

    pub fn update_synonyms(
        &self,
        uid: &str,
        synonyms: std::collections::BTreeMap<String, Vec<String>>,
    ) -> Result<TaskInfo> {
        self.update_settings(
            uid,
            SettingsUpdate {
                synonyms: Setting::Set(synonyms),
                ..Default::default()
            },
        )
    }

    pub fn search(&self, uid: &str, query: &SearchQuery) -> Result<SearchResult> {
        let state = self.committed(uid)?;
        QueryExecutor::new(&state).search(query)
    }

    pub fn search_with_cancellation(
        &self,
        uid: &str,
        query: &SearchQuery,
        cancellation: &SearchCancellation,
    ) -> Result<SearchResult> {
        let state = self.committed(uid)?;
        QueryExecutor::new(&state)
            .with_cancellation(cancellation)
            .search(query)
    }

    /// Run a search in the background. Cancelling before evaluation starts
    /// resolves the handle with [`GriddleError::Cancelled`].
    pub fn submit_search(self: &Arc<Self>, uid: &str, query: SearchQuery) -> PendingSearch {
        let cancellation = SearchCancellation::new();
        let token = cancellation.clone();
        let manager = Arc::clone(self);
        let uid = uid.to_string();

        let handle = tokio::spawn(async move {
            if token.is_cancelled() {
                tracing::debug!("[SEARCH {}] cancelled before evaluation", uid);
                return Err(GriddleError::Cancelled);
            }
            tokio::task::spawn_blocking(move || manager.search_with_cancellation(&uid, &query, &token)).await?
        });

        PendingSearch { cancellation, handle }
    }

    pub fn facet_search(&self, uid: &str, query: &FacetSearchQuery) -> Result<FacetSearchResult> {
        let state = self.committed(uid)?;
        QueryExecutor::new(&state).facet_search(query)
    }

    /// Run each query independently; one failing slot does not affect the others.
    pub fn multi_search(&self, queries: &[MultiSearchQuery]) -> Vec<Result<SearchResult>> {
        queries
            .iter()
            .map(|entry| {
                let mut result = self.search(&entry.index_uid, &entry.query)?;
                result.index_uid = Some(entry.index_uid.clone());
                Ok(result)
            })
            .collect()
    }

    pub fn get_task(&self, uid: TaskUid) -> Result<TaskInfo> {
        self.tasks.get(uid)
    }

    pub fn list_tasks(&self, query: &TaskQuery) -> Vec<TaskInfo> {
        self.tasks.list(query)
    }

    /// Wait for a task using the configured timeout and poll interval.
    pub async fn wait_for_task(&self, uid: TaskUid) -> Result<TaskInfo> {
        self.wait_for_task_with_timeout(uid, self.config.task_timeout).await
    }

    pub async fn wait_for_task_with_timeout(&self, uid: TaskUid, timeout: Duration) -> Result<TaskInfo> {
        self.tasks
            .wait_for(uid, timeout, self.config.task_poll_interval)
            .await
    }

    pub fn subscribe_tasks(&self) -> broadcast::Receiver<TaskInfo> {
        self.tasks.subscribe()
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "available".to_string(),
        }
    }

    pub fn version(&self) -> VersionInfo {
        VersionInfo {
            pkg_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

fn strings<S: Into<String>>(items: impl IntoIterator<Item = S>) -> Vec<String> {
    items.into_iter().map(Into::into).collect()
}
