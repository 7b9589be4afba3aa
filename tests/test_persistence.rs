mod common;

use common::{add_documents, create_index, filterable, ids, wait};
use griddle::{DocumentsQuery, EngineConfig, IndexManager, SearchQuery, TaskStatus};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

fn open(dir: &TempDir) -> std::sync::Arc<IndexManager> {
    IndexManager::new(EngineConfig::in_memory().with_data_dir(dir.path())).unwrap()
}

#[tokio::test]
async fn committed_state_survives_a_restart() {
    let dir = TempDir::new().unwrap();
    {
        let manager = open(&dir);
        create_index(&manager, "products").await;
        add_documents(&manager, "products", common::products()).await;
        filterable(&manager, "products", &["category"]).await;
        wait(&manager, manager.delete_document("products", "2")).await;
    }

    let manager = open(&dir);
    let info = manager.get_index("products").unwrap();
    assert_eq!(info.primary_key.as_deref(), Some("id"));

    let page = manager.get_documents("products", &DocumentsQuery::default()).unwrap();
    assert_eq!(ids(&page.results), vec![json!(1), json!(3), json!(4), json!(5)]);

    let settings = manager.get_settings("products").unwrap();
    assert_eq!(settings.filterable_attributes, vec!["category"]);

    let query = SearchQuery::new("chair").with_filter("category = Office");
    assert_eq!(ids(&manager.search("products", &query).unwrap().hits), vec![json!(3)]);
}

#[tokio::test]
async fn reopened_indexes_accept_writes() {
    let dir = TempDir::new().unwrap();
    {
        let manager = open(&dir);
        create_index(&manager, "books").await;
    }

    let manager = open(&dir);
    add_documents(&manager, "books", json!([{"id": "dune", "title": "Dune"}])).await;
    assert_eq!(manager.index_stats("books").unwrap().number_of_documents, 1);

    let manager = open(&dir);
    assert!(manager.get_document("books", "dune", None).is_ok());
}

#[tokio::test]
async fn deleting_an_index_removes_its_files() {
    let dir = TempDir::new().unwrap();
    let manager = open(&dir);
    create_index(&manager, "products").await;
    add_documents(&manager, "products", json!([{"id": 1}])).await;
    assert!(dir.path().join("products").exists());

    manager.delete_index("products").unwrap();
    assert!(!dir.path().join("products").exists());

    let reopened = open(&dir);
    assert!(reopened.get_index("products").is_err());
    assert!(reopened.list_indexes(0, 20).results.is_empty());
}

#[tokio::test]
async fn deleting_an_index_mid_task_keeps_it_deleted() {
    let dir = TempDir::new().unwrap();
    {
        let manager = open(&dir);
        create_index(&manager, "ghost").await;

        let mut events = manager.subscribe_tasks();
        let documents = (0..20_000)
            .map(|i| json!({"id": i, "title": format!("Document {}", i)}))
            .collect();
        let task = manager.add_documents("ghost", documents, None).unwrap();
        loop {
            let event = events.recv().await.unwrap();
            if event.uid == task.uid && event.status == TaskStatus::Processing {
                break;
            }
        }
        manager.delete_index("ghost").unwrap();

        // a new index under the same uid must not be overwritten by the old task
        create_index(&manager, "ghost").await;
        add_documents(&manager, "ghost", json!([{"id": "fresh"}])).await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(manager.index_stats("ghost").unwrap().number_of_documents, 1);
    }

    let manager = open(&dir);
    assert_eq!(manager.index_stats("ghost").unwrap().number_of_documents, 1);
    assert!(manager.get_document("ghost", "fresh", None).is_ok());
}

#[tokio::test]
async fn failed_tasks_leave_the_snapshot_untouched() {
    let dir = TempDir::new().unwrap();
    {
        let manager = open(&dir);
        create_index(&manager, "products").await;
        add_documents(&manager, "products", json!([{"id": 1, "category": "Audio"}])).await;
        filterable(&manager, "products", &["category"]).await;
        manager
            .update_filterable_attributes("products", Vec::<String>::new())
            .unwrap();
        let task = manager
            .delete_documents_by_filter("products", "category = Audio")
            .unwrap();
        assert!(manager.wait_for_task(task.uid).await.is_err());
    }

    let manager = open(&dir);
    assert_eq!(manager.index_stats("products").unwrap().number_of_documents, 1);
}
