#![allow(dead_code)]

use griddle::{IndexManager, TaskInfo};
use serde_json::{json, Value};
use std::sync::Arc;

/// Wait for an accepted task and return its final record.
pub async fn wait(manager: &IndexManager, task: griddle::Result<TaskInfo>) -> TaskInfo {
    let task = task.expect("task rejected at submission");
    manager
        .wait_for_task(task.uid)
        .await
        .expect("task did not succeed")
}

/// Create `uid` with `id` as primary key and wait for it.
pub async fn create_index(manager: &IndexManager, uid: &str) {
    wait(manager, manager.create_index(uid, Some("id"))).await;
}

pub async fn add_documents(manager: &IndexManager, uid: &str, documents: Value) {
    let documents = documents.as_array().expect("array of documents").clone();
    wait(manager, manager.add_documents(uid, documents, None)).await;
}

pub async fn filterable(manager: &IndexManager, uid: &str, attributes: &[&str]) {
    wait(manager, manager.update_filterable_attributes(uid, attributes.iter().copied())).await;
}

pub async fn sortable(manager: &IndexManager, uid: &str, attributes: &[&str]) {
    wait(manager, manager.update_sortable_attributes(uid, attributes.iter().copied())).await;
}

pub fn products() -> Value {
    json!([
        {"id": 1, "title": "Wireless Headphones", "category": "Audio", "brand": "Sonic", "price": 10, "tags": ["wireless", "bluetooth"]},
        {"id": 2, "title": "Bluetooth Speaker", "category": "Audio", "brand": "Boom", "price": 50, "tags": ["bluetooth"]},
        {"id": 3, "title": "Ergonomic Office Chair", "category": "Office", "brand": "Sitwell", "price": 199.5},
        {"id": 4, "title": "Standing Desk", "category": "Office", "brand": "Sitwell", "price": 349},
        {"id": 5, "title": "Wired Earbuds", "category": "Audio", "brand": "Sonic", "price": 15, "tags": ["wired"]}
    ])
}

/// Manager with a `products` index holding [`products`].
pub async fn products_index() -> Arc<IndexManager> {
    let manager = IndexManager::in_memory();
    create_index(&manager, "products").await;
    add_documents(&manager, "products", products()).await;
    manager
}

pub fn ids(hits: &[griddle::Document]) -> Vec<Value> {
    hits.iter().filter_map(|hit| hit.get("id").cloned()).collect()
}
