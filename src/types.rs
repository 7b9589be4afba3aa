use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ErrorResponse;

/// Index identifier, a plain string like `"products"`.
pub type IndexUid = String;
/// Document identifier in its normalised string form.
pub type DocumentId = String;
/// Process-wide, monotonically increasing task identifier.
pub type TaskUid = u64;
/// A stored document: a JSON object in its original field order.
pub type Document = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TaskType {
    IndexCreation,
    IndexUpdate,
    IndexDeletion,
    DocumentAdditionOrUpdate,
    DocumentDeletion,
    SettingsUpdate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Enqueued,
    Processing,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }

    /// `enqueued -> processing -> {succeeded | failed}`; nothing leaves a terminal state.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Enqueued, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::Succeeded)
                | (TaskStatus::Processing, TaskStatus::Failed)
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_documents: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexed_documents: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provided_ids: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_filter: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_documents: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub uid: TaskUid,
    pub index_uid: IndexUid,
    pub status: TaskStatus,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub details: TaskDetails,
    pub error: Option<ErrorResponse>,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Processing time in milliseconds, set once the task is terminal.
    pub duration_ms: Option<u64>,
}

impl TaskInfo {
    pub fn new(uid: TaskUid, index_uid: IndexUid, task_type: TaskType, details: TaskDetails) -> Self {
        TaskInfo {
            uid,
            index_uid,
            status: TaskStatus::Enqueued,
            task_type,
            details,
            error: None,
            enqueued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            duration_ms: None,
        }
    }

    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            task_uid: self.uid,
            index_uid: self.index_uid.clone(),
            status: self.status,
            task_type: self.task_type,
            enqueued_at: self.enqueued_at,
        }
    }
}

/// Acknowledgement returned for every accepted mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub task_uid: TaskUid,
    pub index_uid: IndexUid,
    pub status: TaskStatus,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub enqueued_at: DateTime<Utc>,
}

/// Filters for listing tasks. Empty vectors match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskQuery {
    pub index_uids: Vec<IndexUid>,
    pub statuses: Vec<TaskStatus>,
    pub types: Vec<TaskType>,
    /// Only tasks with `uid <= from`.
    pub from: Option<TaskUid>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexInfo {
    pub uid: IndexUid,
    pub primary_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub number_of_documents: usize,
    pub is_indexing: bool,
    pub field_distribution: BTreeMap<String, usize>,
}

/// One page of a larger ordered collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub results: Vec<T>,
    pub offset: usize,
    pub limit: usize,
    pub total: usize,
}

impl<T: Clone> Paginated<T> {
    pub fn from_slice(items: &[T], offset: usize, limit: usize) -> Self {
        let start = offset.min(items.len());
        let end = offset.saturating_add(limit).min(items.len());
        Paginated {
            results: items[start..end].to_vec(),
            offset,
            limit,
            total: items.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub pkg_version: String,
}
