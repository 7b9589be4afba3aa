use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::TaskUid;

const ERROR_DOCS_BASE: &str = "https://docs.rs/griddle/latest/griddle/enum.GriddleError.html";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GriddleError {
    #[error("Index `{0}` not found.")]
    IndexNotFound(String),

    #[error("Index `{0}` already exists.")]
    IndexAlreadyExists(String),

    #[error("Document `{0}` not found.")]
    DocumentNotFound(String),

    #[error("Task `{0}` not found.")]
    TaskNotFound(TaskUid),

    #[error("`{0}` is not a valid index uid. Index uid can be an integer or a string containing only alphanumeric characters, hyphens (-) and underscores (_), and can not be more than 400 bytes.")]
    InvalidIndexUid(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Document at position {position} does not have a `{primary_key}` attribute.")]
    MissingPrimaryKey { primary_key: String, position: usize },

    #[error("Document identifier `{0}` is invalid. A document identifier can be of type integer or string, only composed of alphanumeric characters (a-z A-Z 0-9), hyphens (-) and underscores (_), and can not be more than 511 bytes.")]
    InvalidDocumentId(String),

    #[error("The primary key inference failed: {0}")]
    PrimaryKeyInference(String),

    #[error("Index `{index}` already has a primary key: `{existing}`.")]
    PrimaryKeyAlreadyPresent { index: String, existing: String },

    #[error("Invalid delete request: {0}")]
    InvalidDeleteRequest(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Invalid search request: {0}")]
    InvalidSearch(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Batch size {size} exceeds max {max} documents")]
    BatchTooLarge { size: usize, max: usize },

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Attribute `{attribute}` is not filterable. Available filterable attributes are: `{available}`.")]
    AttributeNotFilterable { attribute: String, available: String },

    #[error("Attribute `{attribute}` is not sortable. Available sortable attributes are: `{available}`.")]
    AttributeNotSortable { attribute: String, available: String },

    #[error("Type mismatch for attribute `{attribute}`: expected {expected}, got {actual}")]
    TypeMismatch {
        attribute: String,
        expected: String,
        actual: String,
    },

    #[error("Task {uid} failed: {message}")]
    TaskFailed { uid: TaskUid, message: String },

    #[error("Timed out after {timeout_ms}ms waiting for task {uid}")]
    Timeout { uid: TaskUid, timeout_ms: u64 },

    #[error("Task queue for index `{0}` is full")]
    QueueFull(String),

    #[error("Search request was cancelled")]
    Cancelled,

    #[error("Route `{method} {path}` not found")]
    RouteNotFound { method: String, path: String },

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GriddleError>;

impl From<std::io::Error> for GriddleError {
    fn from(e: std::io::Error) -> Self {
        GriddleError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for GriddleError {
    fn from(e: serde_json::Error) -> Self {
        GriddleError::Json(e.to_string())
    }
}

impl From<tokio::task::JoinError> for GriddleError {
    fn from(e: tokio::task::JoinError) -> Self {
        GriddleError::Internal(format!("background task failed: {}", e))
    }
}

/// Error families exposed to callers in the `type` field of error payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    InvalidRequest,
    NotFound,
    Conflict,
    Filter,
    TaskFailed,
    Internal,
}

impl GriddleError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GriddleError::IndexNotFound(_) => StatusCode::NOT_FOUND,
            GriddleError::DocumentNotFound(_) => StatusCode::NOT_FOUND,
            GriddleError::TaskNotFound(_) => StatusCode::NOT_FOUND,
            GriddleError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            GriddleError::IndexAlreadyExists(_) => StatusCode::CONFLICT,
            GriddleError::PrimaryKeyAlreadyPresent { .. } => StatusCode::CONFLICT,
            GriddleError::InvalidIndexUid(_) => StatusCode::BAD_REQUEST,
            GriddleError::InvalidDocument(_) => StatusCode::BAD_REQUEST,
            GriddleError::MissingPrimaryKey { .. } => StatusCode::BAD_REQUEST,
            GriddleError::InvalidDocumentId(_) => StatusCode::BAD_REQUEST,
            GriddleError::PrimaryKeyInference(_) => StatusCode::BAD_REQUEST,
            GriddleError::InvalidDeleteRequest(_) => StatusCode::BAD_REQUEST,
            GriddleError::InvalidSettings(_) => StatusCode::BAD_REQUEST,
            GriddleError::InvalidSearch(_) => StatusCode::BAD_REQUEST,
            GriddleError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GriddleError::BatchTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GriddleError::InvalidFilter(_) => StatusCode::BAD_REQUEST,
            GriddleError::AttributeNotFilterable { .. } => StatusCode::BAD_REQUEST,
            GriddleError::AttributeNotSortable { .. } => StatusCode::BAD_REQUEST,
            GriddleError::TypeMismatch { .. } => StatusCode::BAD_REQUEST,
            GriddleError::TaskFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            GriddleError::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
            GriddleError::QueueFull(_) => StatusCode::TOO_MANY_REQUESTS,
            GriddleError::Cancelled => StatusCode::BAD_REQUEST,
            GriddleError::Json(_) => StatusCode::BAD_REQUEST,
            GriddleError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GriddleError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GriddleError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            GriddleError::IndexNotFound(_) => "index_not_found",
            GriddleError::IndexAlreadyExists(_) => "index_already_exists",
            GriddleError::DocumentNotFound(_) => "document_not_found",
            GriddleError::TaskNotFound(_) => "task_not_found",
            GriddleError::InvalidIndexUid(_) => "invalid_index_uid",
            GriddleError::InvalidDocument(_) => "invalid_document",
            GriddleError::MissingPrimaryKey { .. } => "missing_document_id",
            GriddleError::InvalidDocumentId(_) => "invalid_document_id",
            GriddleError::PrimaryKeyInference(_) => "index_primary_key_no_candidate_found",
            GriddleError::PrimaryKeyAlreadyPresent { .. } => "index_primary_key_already_exists",
            GriddleError::InvalidDeleteRequest(_) => "invalid_document_delete_request",
            GriddleError::InvalidSettings(_) => "invalid_settings",
            GriddleError::InvalidSearch(_) => "invalid_search",
            GriddleError::InvalidRequest(_) => "bad_request",
            GriddleError::BatchTooLarge { .. } => "payload_too_large",
            GriddleError::InvalidFilter(_) => "invalid_filter",
            GriddleError::AttributeNotFilterable { .. } => "attribute_not_filterable",
            GriddleError::AttributeNotSortable { .. } => "attribute_not_sortable",
            GriddleError::TypeMismatch { .. } => "filter_type_mismatch",
            GriddleError::TaskFailed { .. } => "task_failed",
            GriddleError::Timeout { .. } => "task_timeout",
            GriddleError::QueueFull(_) => "queue_full",
            GriddleError::Cancelled => "search_cancelled",
            GriddleError::RouteNotFound { .. } => "route_not_found",
            GriddleError::Io(_) => "io_error",
            GriddleError::Json(_) => "malformed_payload",
            GriddleError::Config(_) => "config_error",
            GriddleError::Internal(_) => "internal",
        }
    }

    pub fn kind(&self) -> ErrorType {
        match self {
            GriddleError::IndexNotFound(_)
            | GriddleError::DocumentNotFound(_)
            | GriddleError::TaskNotFound(_)
            | GriddleError::RouteNotFound { .. } => ErrorType::NotFound,
            GriddleError::IndexAlreadyExists(_) | GriddleError::PrimaryKeyAlreadyPresent { .. } => {
                ErrorType::Conflict
            }
            GriddleError::InvalidFilter(_)
            | GriddleError::AttributeNotFilterable { .. }
            | GriddleError::AttributeNotSortable { .. }
            | GriddleError::TypeMismatch { .. } => ErrorType::Filter,
            GriddleError::TaskFailed { .. } => ErrorType::TaskFailed,
            GriddleError::Io(_)
            | GriddleError::Config(_)
            | GriddleError::Internal(_)
            | GriddleError::Timeout { .. } => ErrorType::Internal,
            _ => ErrorType::InvalidRequest,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse::from(self)
    }
}

/// JSON error payload returned by the dispatcher and stored on failed tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    pub code: String,
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub link: String,
}

impl From<&GriddleError> for ErrorResponse {
    fn from(e: &GriddleError) -> Self {
        let code = e.code();
        ErrorResponse {
            message: e.to_string(),
            code: code.to_string(),
            error_type: e.kind(),
            link: format!("{}#{}", ERROR_DOCS_BASE, code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_mapping() {
        assert_eq!(
            GriddleError::IndexNotFound("movies".into()).kind(),
            ErrorType::NotFound
        );
        assert_eq!(
            GriddleError::IndexAlreadyExists("movies".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            GriddleError::InvalidFilter("oops".into()).kind(),
            ErrorType::Filter
        );
        assert_eq!(
            GriddleError::MissingPrimaryKey {
                primary_key: "id".into(),
                position: 0
            }
            .kind(),
            ErrorType::InvalidRequest
        );
    }

    #[test]
    fn test_error_response_shape() {
        let err = GriddleError::AttributeNotFilterable {
            attribute: "genre".into(),
            available: "".into(),
        };
        let json = serde_json::to_value(err.to_response()).unwrap();
        assert_eq!(json["code"], "attribute_not_filterable");
        assert_eq!(json["type"], "filter");
        assert!(json["message"].as_str().unwrap().contains("genre"));
        assert!(json["link"]
            .as_str()
            .unwrap()
            .ends_with("#attribute_not_filterable"));
    }
}
