//! # Griddle
//!
//! An embeddable document search engine: named indexes of JSON documents
//! with typo-tolerant full-text search, filters, facets, sorting,
//! highlighting and a per-index asynchronous task queue.
//!
//! Every write returns a [`TaskInfo`] immediately and is applied later, in
//! order, by the index's worker. Reads always see the last committed state.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use griddle::{IndexManager, SearchQuery};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> griddle::Result<()> {
//! let manager = IndexManager::in_memory();
//!
//! let task = manager.create_index("products", Some("id"))?;
//! manager.wait_for_task(task.uid).await?;
//!
//! let task = manager.add_documents(
//!     "products",
//!     vec![
//!         json!({"id": 1, "title": "Wireless Headphones", "price": 20}),
//!         json!({"id": 2, "title": "Bluetooth Speaker", "price": 50}),
//!     ],
//!     None,
//! )?;
//! manager.wait_for_task(task.uid).await?;
//!
//! let task = manager.update_filterable_attributes("products", ["price"])?;
//! manager.wait_for_task(task.uid).await?;
//!
//! let results = manager.search(
//!     "products",
//!     &SearchQuery::new("headphnes").with_filter("price < 30"),
//! )?;
//! assert_eq!(results.hits.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Request routing
//!
//! [`ApiRouter`] maps method + path requests onto the manager and renders
//! status codes and JSON bodies, so a server only needs to plug in a
//! transport.
//!
//! ## Configuration
//!
//! [`EngineConfig::from_env`] reads `GRIDDLE_DATA_DIR`,
//! `GRIDDLE_QUEUE_CAPACITY`, `GRIDDLE_MAX_TASKS_PER_INDEX`,
//! `GRIDDLE_MAX_BATCH_DOCUMENTS`, `GRIDDLE_TASK_POLL_INTERVAL_MS` and
//! `GRIDDLE_TASK_TIMEOUT_MS`. Without a data directory everything lives in
//! memory.

pub mod api;
pub mod config;
pub mod error;
pub mod index;
pub mod query;
pub mod tokenizer;
pub mod types;

pub use api::{ApiRequest, ApiResponse, ApiRouter};
pub use config::EngineConfig;
pub use error::{ErrorResponse, ErrorType, GriddleError, Result};
pub use index::manager::{DeleteDocumentsRequest, DocumentsQuery, IndexManager, MultiSearchQuery, PendingSearch};
pub use index::settings::{IndexSettings, Setting, SettingField, SettingsUpdate};
pub use index::IndexState;
pub use query::{
    FacetSearchQuery, FacetSearchResult, MatchingStrategy, QueryExecutor, SearchCancellation, SearchQuery,
    SearchResult,
};
pub use types::*;

/// Install a `tracing` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
