//! Transport-agnostic request dispatcher.
//!
//! [`ApiRouter::handle`] maps a method, a path, pre-parsed query parameters
//! and an optional JSON body onto [`IndexManager`] calls and renders the
//! outcome as a status code plus JSON body. Servers wire their own transport
//! in front of it.

use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{GriddleError, Result};
use crate::index::manager::{DeleteDocumentsRequest, DocumentsQuery, IndexManager, MultiSearchQuery};
use crate::index::settings::{SettingField, SettingsUpdate};
use crate::query::executor::{FacetSearchQuery, MatchingStrategy, SearchQuery, SortEntry};
use crate::query::filter::FilterInput;
use crate::types::{TaskInfo, TaskQuery, TaskStatus, TaskType};

const DEFAULT_INDEX_PAGE: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        ApiRequest {
            method,
            path: path.into(),
            query: HashMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PATCH, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    fn param<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.query.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| GriddleError::InvalidRequest(format!("invalid value `{}` for `{}`", raw, key))),
        }
    }

    fn list_param(&self, key: &str) -> Option<Vec<String>> {
        self.query.get(key).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    }

    fn string_param(&self, key: &str) -> Option<String> {
        self.query.get(key).cloned()
    }

    /// Decode the JSON body; a missing body reads as `{}`.
    fn body<T: DeserializeOwned>(&self) -> Result<T> {
        let body = self.body.clone().unwrap_or_else(|| json!({}));
        serde_json::from_value(body).map_err(|e| GriddleError::InvalidRequest(format!("invalid request body: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    fn ok<T: Serialize>(value: &T) -> Result<Self> {
        Ok(ApiResponse {
            status: StatusCode::OK,
            body: serde_json::to_value(value)?,
        })
    }

    fn accepted(task: &TaskInfo) -> Result<Self> {
        Ok(ApiResponse {
            status: StatusCode::ACCEPTED,
            body: serde_json::to_value(task.summary())?,
        })
    }

    pub fn error(err: &GriddleError) -> Self {
        ApiResponse {
            status: err.status_code(),
            body: serde_json::to_value(err.to_response()).unwrap_or(Value::Null),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateIndexBody {
    uid: String,
    primary_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateIndexBody {
    primary_key: String,
}

#[derive(Debug, Deserialize)]
struct MultiSearchBody {
    queries: Vec<MultiSearchQuery>,
}

pub struct ApiRouter {
    manager: Arc<IndexManager>,
}

impl ApiRouter {
    pub fn new(manager: Arc<IndexManager>) -> Self {
        ApiRouter { manager }
    }

    pub fn manager(&self) -> &Arc<IndexManager> {
        &self.manager
    }

    pub async fn handle(&self, request: ApiRequest) -> ApiResponse {
        match self.dispatch(&request).await {
            Ok(response) => response,
            Err(e) => {
                if e.status_code().is_server_error() {
                    tracing::error!("[API] {} {} failed: {}", request.method, request.path, e);
                } else {
                    tracing::debug!("[API] {} {} rejected: {}", request.method, request.path, e);
                }
                ApiResponse::error(&e)
            }
        }
    }

    async fn dispatch(&self, req: &ApiRequest) -> Result<ApiResponse> {
        let segments: Vec<&str> = req.path.split('/').filter(|s| !s.is_empty()).collect();
        let m = &self.manager;

        match (req.method.as_str(), segments.as_slice()) {
            ("GET", ["health"]) => ApiResponse::ok(&m.health()),
            ("GET", ["version"]) => ApiResponse::ok(&m.version()),

            ("GET", ["indexes"]) => {
                let offset = req.param("offset")?.unwrap_or(0);
                let limit = req.param("limit")?.unwrap_or(DEFAULT_INDEX_PAGE);
                ApiResponse::ok(&m.list_indexes(offset, limit))
            }
            ("POST", ["indexes"]) => {
                let body: CreateIndexBody = req.body()?;
                ApiResponse::accepted(&m.create_index(&body.uid, body.primary_key.as_deref())?)
            }
            ("GET", ["indexes", uid]) => ApiResponse::ok(&m.get_index(uid)?),
            ("PATCH", ["indexes", uid]) => {
                let body: UpdateIndexBody = req.body()?;
                ApiResponse::accepted(&m.update_index(uid, &body.primary_key)?)
            }
            ("DELETE", ["indexes", uid]) => ApiResponse::accepted(&m.delete_index(uid)?),
            ("GET", ["indexes", uid, "stats"]) => ApiResponse::ok(&m.index_stats(uid)?),

            ("GET", ["indexes", uid, "documents"]) => {
                let query = DocumentsQuery {
                    offset: req.param("offset")?,
                    limit: req.param("limit")?,
                    fields: req.list_param("fields"),
                    filter: req.string_param("filter").map(FilterInput::from),
                };
                ApiResponse::ok(&m.get_documents(uid, &query)?)
            }
            ("POST", ["indexes", uid, "documents", "fetch"]) => {
                let query: DocumentsQuery = req.body()?;
                ApiResponse::ok(&m.get_documents(uid, &query)?)
            }
            ("POST", ["indexes", uid, "documents"]) => {
                let documents = document_batch(req)?;
                let pk = req.string_param("primaryKey");
                ApiResponse::accepted(&m.add_documents(uid, documents, pk.as_deref())?)
            }
            ("PUT", ["indexes", uid, "documents"]) => {
                let documents = document_batch(req)?;
                let pk = req.string_param("primaryKey");
                ApiResponse::accepted(&m.update_documents(uid, documents, pk.as_deref())?)
            }
            ("DELETE", ["indexes", uid, "documents"]) => ApiResponse::accepted(&m.clear_documents(uid)?),
            ("POST", ["indexes", uid, "documents", "delete-batch"]) => {
                let ids: Vec<Value> = req.body()?;
                ApiResponse::accepted(&m.delete_documents_by_ids(uid, ids)?)
            }
            ("POST", ["indexes", uid, "documents", "delete"]) => {
                let request: DeleteDocumentsRequest = req.body()?;
                ApiResponse::accepted(&m.delete_documents(uid, request)?)
            }
            ("GET", ["indexes", uid, "documents", id]) => {
                let fields = req.list_param("fields");
                ApiResponse::ok(&m.get_document(uid, id, fields.as_deref())?)
            }
            ("DELETE", ["indexes", uid, "documents", id]) => ApiResponse::accepted(&m.delete_document(uid, id)?),

            ("GET", ["indexes", uid, "search"]) => {
                let query = search_query_from_params(req)?;
                ApiResponse::ok(&m.submit_search(uid, query).result().await?)
            }
            ("POST", ["indexes", uid, "search"]) => {
                let query: SearchQuery = req.body()?;
                ApiResponse::ok(&m.submit_search(uid, query).result().await?)
            }
            ("POST", ["indexes", uid, "facet-search"]) => {
                let query: FacetSearchQuery = req.body()?;
                ApiResponse::ok(&m.facet_search(uid, &query)?)
            }
            ("POST", ["multi-search"]) => {
                let body: MultiSearchBody = req.body()?;
                let results: Vec<Value> = m
                    .multi_search(&body.queries)
                    .into_iter()
                    .zip(&body.queries)
                    .map(|(result, entry)| match result {
                        Ok(result) => serde_json::to_value(result).map_err(GriddleError::from),
                        Err(e) => Ok(json!({"indexUid": entry.index_uid, "error": e.to_response()})),
                    })
                    .collect::<Result<_>>()?;
                ApiResponse::ok(&json!({ "results": results }))
            }

            ("GET", ["indexes", uid, "settings"]) => ApiResponse::ok(&m.get_settings(uid)?),
            ("PATCH", ["indexes", uid, "settings"]) => {
                let update: SettingsUpdate = req.body()?;
                ApiResponse::accepted(&m.update_settings(uid, update)?)
            }
            ("DELETE", ["indexes", uid, "settings"]) => ApiResponse::accepted(&m.reset_settings(uid)?),
            (method @ ("GET" | "PUT" | "DELETE"), ["indexes", uid, "settings", name]) => {
                let field = SettingField::from_route_name(name).ok_or_else(|| route_not_found(req))?;
                match method {
                    "GET" => ApiResponse::ok(&m.get_setting(uid, field)?),
                    "PUT" => {
                        let value = req.body.clone().unwrap_or(Value::Null);
                        ApiResponse::accepted(&m.update_setting(uid, field, value)?)
                    }
                    _ => ApiResponse::accepted(&m.reset_setting(uid, field)?),
                }
            }

            ("GET", ["tasks"]) => {
                let query = TaskQuery {
                    index_uids: req.list_param("indexUids").unwrap_or_default(),
                    statuses: parse_enum_list::<TaskStatus>(req, "statuses")?,
                    types: parse_enum_list::<TaskType>(req, "types")?,
                    from: req.param("from")?,
                    limit: req.param("limit")?,
                };
                let results = m.list_tasks(&query);
                ApiResponse::ok(&json!({ "results": results, "total": results.len() }))
            }
            ("GET", ["tasks", task_uid]) => {
                let task_uid = task_uid
                    .parse()
                    .map_err(|_| GriddleError::InvalidRequest(format!("`{}` is not a valid task uid", task_uid)))?;
                ApiResponse::ok(&m.get_task(task_uid)?)
            }

            _ => Err(route_not_found(req)),
        }
    }
}

fn route_not_found(req: &ApiRequest) -> GriddleError {
    GriddleError::RouteNotFound {
        method: req.method.to_string(),
        path: req.path.clone(),
    }
}

/// Document payload: an array of objects, or a single object.
fn document_batch(req: &ApiRequest) -> Result<Vec<Value>> {
    match req.body.clone() {
        Some(Value::Array(documents)) => Ok(documents),
        Some(Value::Object(doc)) => Ok(vec![Value::Object(doc)]),
        Some(_) => Err(GriddleError::InvalidRequest(
            "the document payload must be an array of objects".to_string(),
        )),
        None => Err(GriddleError::InvalidRequest("a document payload is required".to_string())),
    }
}

/// Comma-separated enum values spelled as in JSON (e.g. `statuses=failed,enqueued`).
fn parse_enum_list<T: DeserializeOwned>(req: &ApiRequest, key: &str) -> Result<Vec<T>> {
    req.list_param(key)
        .unwrap_or_default()
        .into_iter()
        .map(|raw| {
            serde_json::from_value(Value::String(raw.clone()))
                .map_err(|_| GriddleError::InvalidRequest(format!("invalid value `{}` for `{}`", raw, key)))
        })
        .collect()
}

fn search_query_from_params(req: &ApiRequest) -> Result<SearchQuery> {
    let matching_strategy = match req.query.get("matchingStrategy") {
        Some(raw) => Some(
            serde_json::from_value::<MatchingStrategy>(Value::String(raw.clone())).map_err(|_| {
                GriddleError::InvalidRequest(format!("invalid value `{}` for `matchingStrategy`", raw))
            })?,
        ),
        None => None,
    };

    Ok(SearchQuery {
        q: req.string_param("q"),
        offset: req.param("offset")?,
        limit: req.param("limit")?,
        attributes_to_retrieve: req.list_param("attributesToRetrieve"),
        filter: req.string_param("filter").map(FilterInput::from),
        sort: req
            .list_param("sort")
            .map(|entries| entries.into_iter().map(SortEntry::Expression).collect()),
        facets: req.list_param("facets"),
        attributes_to_highlight: req.list_param("attributesToHighlight"),
        highlight_pre_tag: req.string_param("highlightPreTag"),
        highlight_post_tag: req.string_param("highlightPostTag"),
        attributes_to_crop: req.list_param("attributesToCrop"),
        crop_length: req.param("cropLength")?,
        crop_marker: req.string_param("cropMarker"),
        show_matches_position: req.param("showMatchesPosition")?.unwrap_or(false),
        matching_strategy,
    })
}
