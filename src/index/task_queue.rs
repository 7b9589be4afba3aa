use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::error::{GriddleError, Result};
use crate::types::{TaskDetails, TaskInfo, TaskQuery, TaskStatus, TaskType, TaskUid};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Registry of every task the engine has accepted.
///
/// Task uids are allocated from one counter shared by all indexes, so a
/// larger uid always means a later submission. Each status change is
/// broadcast to subscribers.
pub struct TaskStore {
    tasks: DashMap<TaskUid, TaskInfo>,
    next_uid: AtomicU64,
    max_tasks_per_index: usize,
    events: broadcast::Sender<TaskInfo>,
}

impl TaskStore {
    pub fn new(max_tasks_per_index: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        TaskStore {
            tasks: DashMap::new(),
            next_uid: AtomicU64::new(0),
            max_tasks_per_index: max_tasks_per_index.max(1),
            events,
        }
    }

    fn publish(&self, task: &TaskInfo) {
        // no subscribers is fine
        let _ = self.events.send(task.clone());
    }

    pub fn register(&self, index_uid: &str, task_type: TaskType, details: TaskDetails) -> TaskInfo {
        let uid = self.next_uid.fetch_add(1, Ordering::SeqCst);
        let task = TaskInfo::new(uid, index_uid.to_string(), task_type, details);
        self.tasks.insert(uid, task.clone());
        self.publish(&task);
        task
    }

    pub fn get(&self, uid: TaskUid) -> Result<TaskInfo> {
        self.tasks
            .get(&uid)
            .map(|t| t.clone())
            .ok_or(GriddleError::TaskNotFound(uid))
    }

    /// Tasks matching `query`, newest first.
    pub fn list(&self, query: &TaskQuery) -> Vec<TaskInfo> {
        let mut matching: Vec<TaskInfo> = self
            .tasks
            .iter()
            .filter(|t| query.index_uids.is_empty() || query.index_uids.contains(&t.index_uid))
            .filter(|t| query.statuses.is_empty() || query.statuses.contains(&t.status))
            .filter(|t| query.types.is_empty() || query.types.contains(&t.task_type))
            .filter(|t| query.from.map_or(true, |from| t.uid <= from))
            .map(|t| t.clone())
            .collect();
        matching.sort_by(|a, b| b.uid.cmp(&a.uid));
        if let Some(limit) = query.limit {
            matching.truncate(limit);
        }
        matching
    }

    fn transition(&self, uid: TaskUid, next: TaskStatus, apply: impl FnOnce(&mut TaskInfo)) -> Option<TaskInfo> {
        let updated = {
            let mut entry = self.tasks.get_mut(&uid)?;
            if !entry.status.can_transition_to(next) {
                tracing::warn!(
                    "[TASK {}] refusing transition of task {} from {:?} to {:?}",
                    entry.index_uid,
                    uid,
                    entry.status,
                    next
                );
                return None;
            }
            entry.status = next;
            apply(entry.value_mut());
            entry.clone()
        };
        self.publish(&updated);
        if next.is_terminal() {
            self.evict_finished(&updated.index_uid);
        }
        Some(updated)
    }

    /// Move an enqueued task to processing. `None` if it is gone or not enqueued.
    pub fn start(&self, uid: TaskUid) -> Option<TaskInfo> {
        self.transition(uid, TaskStatus::Processing, |task| {
            task.started_at = Some(Utc::now());
        })
    }

    /// Mark a processing task succeeded, merging the effect into its details.
    pub fn succeed(&self, uid: TaskUid, effect: TaskDetails) -> Option<TaskInfo> {
        self.transition(uid, TaskStatus::Succeeded, |task| {
            merge_details(&mut task.details, effect);
            finish(task);
        })
    }

    pub fn fail(&self, uid: TaskUid, error: &GriddleError) -> Option<TaskInfo> {
        self.transition(uid, TaskStatus::Failed, |task| {
            task.error = Some(error.to_response());
            finish(task);
        })
    }

    /// Fail an enqueued task without processing it.
    pub fn reject(&self, uid: TaskUid, error: &GriddleError) -> Option<TaskInfo> {
        self.start(uid)?;
        self.fail(uid, error)
    }

    /// Forget every task of `index_uid`. Returns how many were dropped.
    pub fn remove_index(&self, index_uid: &str) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, task| task.index_uid != index_uid);
        before.saturating_sub(self.tasks.len())
    }

    /// Keep at most `max_tasks_per_index` finished tasks for `index_uid`, dropping the oldest.
    pub fn evict_finished(&self, index_uid: &str) {
        let mut finished: Vec<TaskUid> = self
            .tasks
            .iter()
            .filter(|t| t.index_uid == index_uid && t.status.is_terminal())
            .map(|t| t.uid)
            .collect();
        if finished.len() <= self.max_tasks_per_index {
            return;
        }
        finished.sort_unstable();
        let excess = finished.len() - self.max_tasks_per_index;
        for uid in &finished[..excess] {
            self.tasks.remove(uid);
        }
        tracing::debug!("[TASK {}] evicted {} finished tasks", index_uid, excess);
    }

    /// Whether `index_uid` has work enqueued or processing.
    pub fn is_indexing(&self, index_uid: &str) -> bool {
        self.tasks
            .iter()
            .any(|t| t.index_uid == index_uid && !t.status.is_terminal())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskInfo> {
        self.events.subscribe()
    }

    /// Poll until the task is terminal. A failed task is reported as `TaskFailed`.
    pub async fn wait_for(&self, uid: TaskUid, timeout: Duration, poll_interval: Duration) -> Result<TaskInfo> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let task = self.get(uid)?;
            match task.status {
                TaskStatus::Succeeded => return Ok(task),
                TaskStatus::Failed => {
                    let message = task
                        .error
                        .map(|e| e.message)
                        .unwrap_or_else(|| "unknown error".to_string());
                    return Err(GriddleError::TaskFailed { uid, message });
                }
                TaskStatus::Enqueued | TaskStatus::Processing => {}
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(GriddleError::Timeout {
                    uid,
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

fn finish(task: &mut TaskInfo) {
    let now = Utc::now();
    task.finished_at = Some(now);
    task.duration_ms = task
        .started_at
        .map(|started| (now - started).num_milliseconds().max(0) as u64);
}

fn merge_details(details: &mut TaskDetails, effect: TaskDetails) {
    if effect.primary_key.is_some() {
        details.primary_key = effect.primary_key;
    }
    if effect.indexed_documents.is_some() {
        details.indexed_documents = effect.indexed_documents;
    }
    if effect.deleted_documents.is_some() {
        details.deleted_documents = effect.deleted_documents;
    }
}
