//! Per-index FIFO write queue.
//!
//! Every mutation of an index goes through one bounded channel drained by a
//! single worker task, which makes the channel the serialisation point for
//! that index. The worker applies each operation to a private copy of the
//! committed state and publishes the copy only when the operation succeeds.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::manager::IndexSlot;
use super::settings::SettingsUpdate;
use super::storage::Storage;
use super::task_queue::TaskStore;
use super::IndexState;
use crate::error::{GriddleError, Result};
use crate::query::filter::Filter;
use crate::types::{Document, DocumentId, IndexUid, TaskDetails, TaskUid};

#[derive(Debug)]
pub enum IndexOperation {
    CreateIndex {
        primary_key: Option<String>,
    },
    UpdateIndex {
        primary_key: String,
    },
    AddDocuments {
        documents: Vec<Document>,
        primary_key: String,
        merge: bool,
    },
    DeleteDocuments {
        ids: Vec<DocumentId>,
    },
    DeleteByFilter {
        filter: Filter,
    },
    ClearDocuments,
    UpdateSettings(Box<SettingsUpdate>),
}

impl IndexOperation {
    fn name(&self) -> &'static str {
        match self {
            IndexOperation::CreateIndex { .. } => "create index",
            IndexOperation::UpdateIndex { .. } => "update index",
            IndexOperation::AddDocuments { merge: false, .. } => "add documents",
            IndexOperation::AddDocuments { merge: true, .. } => "update documents",
            IndexOperation::DeleteDocuments { .. } => "delete documents",
            IndexOperation::DeleteByFilter { .. } => "delete documents by filter",
            IndexOperation::ClearDocuments => "clear documents",
            IndexOperation::UpdateSettings(_) => "update settings",
        }
    }
}

#[derive(Debug)]
pub struct WriteOp {
    pub task_uid: TaskUid,
    pub operation: IndexOperation,
}

pub type WriteQueue = mpsc::Sender<WriteOp>;

/// What a worker needs to find, update and persist its index.
pub(crate) struct WorkerContext {
    pub uid: IndexUid,
    /// Incarnation of the index slot this worker serves; a recreated index gets a new one.
    pub generation: u64,
    pub indexes: Arc<DashMap<IndexUid, IndexSlot>>,
    pub tasks: Arc<TaskStore>,
    pub storage: Option<Storage>,
}

pub(crate) fn create_write_queue(ctx: WorkerContext, capacity: usize) -> WriteQueue {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(process_writes(ctx, rx));
    tx
}

async fn process_writes(ctx: WorkerContext, mut rx: mpsc::Receiver<WriteOp>) {
    tracing::info!("[TASK {}] write queue started", ctx.uid);

    while let Some(op) = rx.recv().await {
        let current = match ctx.indexes.get(&ctx.uid) {
            Some(slot) if slot.generation == ctx.generation => slot.state.clone(),
            _ => {
                tracing::debug!(
                    "[TASK {}] index deleted, dropping task {}",
                    ctx.uid,
                    op.task_uid
                );
                break;
            }
        };

        if ctx.tasks.start(op.task_uid).is_none() {
            continue;
        }
        let name = op.operation.name();
        tracing::debug!("[TASK {}] processing task {} ({})", ctx.uid, op.task_uid, name);

        let uid = ctx.uid.clone();
        let indexes = Arc::clone(&ctx.indexes);
        let generation = ctx.generation;
        let storage = ctx.storage.clone();
        let outcome = tokio::task::spawn_blocking(move || -> Result<(bool, TaskDetails)> {
            let (state, effect) = apply_operation(&uid, current, op.operation)?;
            let committed = commit(&indexes, &uid, generation, state, storage.as_ref())?;
            Ok((committed, effect))
        })
        .await
        .unwrap_or_else(|e| Err(e.into()));

        match outcome {
            Ok((true, effect)) => {
                ctx.tasks.succeed(op.task_uid, effect);
                tracing::info!("[TASK {}] task {} succeeded ({})", ctx.uid, op.task_uid, name);
            }
            Ok((false, _)) => {
                tracing::debug!("[TASK {}] index deleted while task {} ran", ctx.uid, op.task_uid);
                ctx.tasks
                    .fail(op.task_uid, &GriddleError::IndexNotFound(ctx.uid.clone()));
            }
            Err(e) => {
                tracing::warn!("[TASK {}] task {} failed ({}): {}", ctx.uid, op.task_uid, name, e);
                ctx.tasks.fail(op.task_uid, &e);
            }
        }
    }

    tracing::info!("[TASK {}] write queue stopped", ctx.uid);
}

/// Persist the new snapshot and swap it in if the slot still belongs to this
/// worker. Returns `false` when the index was deleted or recreated meanwhile.
///
/// The slot stays locked through the save, so `delete_index` either waits
/// for it and removes the files afterwards, or runs first and nothing is written.
fn commit(
    indexes: &DashMap<IndexUid, IndexSlot>,
    uid: &str,
    generation: u64,
    state: IndexState,
    storage: Option<&Storage>,
) -> Result<bool> {
    let mut slot = match indexes.get_mut(uid) {
        Some(slot) if slot.generation == generation => slot,
        _ => return Ok(false),
    };
    if let Some(storage) = storage {
        storage.save(&state)?;
    }
    slot.state = Some(Arc::new(state));
    Ok(true)
}

fn apply_operation(
    uid: &str,
    current: Option<Arc<IndexState>>,
    operation: IndexOperation,
) -> Result<(IndexState, TaskDetails)> {
    match (current, operation) {
        (None, IndexOperation::CreateIndex { primary_key }) => {
            let state = IndexState::new(uid, primary_key.clone());
            Ok((
                state,
                TaskDetails {
                    primary_key,
                    ..Default::default()
                },
            ))
        }
        (Some(_), IndexOperation::CreateIndex { .. }) => {
            Err(GriddleError::IndexAlreadyExists(uid.to_string()))
        }
        (None, _) => Err(GriddleError::IndexNotFound(uid.to_string())),
        (Some(current), operation) => {
            let mut state = IndexState::clone(&current);
            let effect = apply_to_state(&mut state, operation)?;
            Ok((state, effect))
        }
    }
}

fn apply_to_state(state: &mut IndexState, operation: IndexOperation) -> Result<TaskDetails> {
    let mut effect = TaskDetails::default();
    match operation {
        IndexOperation::CreateIndex { .. } => {
            return Err(GriddleError::IndexAlreadyExists(state.uid.clone()));
        }
        IndexOperation::UpdateIndex { primary_key } => {
            state.set_primary_key(&primary_key)?;
            effect.primary_key = Some(primary_key);
        }
        IndexOperation::AddDocuments {
            documents,
            primary_key,
            merge,
        } => {
            effect.indexed_documents = Some(state.upsert_documents(documents, &primary_key, merge)?);
            effect.primary_key = Some(primary_key);
        }
        IndexOperation::DeleteDocuments { ids } => {
            effect.deleted_documents = Some(state.delete_documents(&ids));
        }
        IndexOperation::DeleteByFilter { filter } => {
            effect.deleted_documents = Some(state.delete_by_filter(&filter)?);
        }
        IndexOperation::ClearDocuments => {
            effect.deleted_documents = Some(state.clear());
        }
        IndexOperation::UpdateSettings(update) => {
            state.apply_settings(&update)?;
        }
    }
    Ok(effect)
}
