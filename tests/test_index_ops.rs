mod common;

use common::{add_documents, create_index, wait};
use griddle::{GriddleError, IndexManager, TaskStatus, TaskType};
use serde_json::json;

#[tokio::test]
async fn create_get_and_list() {
    let manager = IndexManager::in_memory();
    let task = wait(&manager, manager.create_index("movies", Some("movieId"))).await;
    assert_eq!(task.task_type, TaskType::IndexCreation);
    assert_eq!(task.status, TaskStatus::Succeeded);

    create_index(&manager, "books").await;
    create_index(&manager, "albums").await;

    let info = manager.get_index("movies").unwrap();
    assert_eq!(info.uid, "movies");
    assert_eq!(info.primary_key.as_deref(), Some("movieId"));

    let page = manager.list_indexes(0, 20);
    let uids: Vec<&str> = page.results.iter().map(|i| i.uid.as_str()).collect();
    assert_eq!(uids, vec!["albums", "books", "movies"]);
    assert_eq!(page.total, 3);

    let second = manager.list_indexes(1, 1);
    assert_eq!(second.results.len(), 1);
    assert_eq!(second.results[0].uid, "books");
}

#[tokio::test]
async fn duplicate_creation_conflicts_even_while_pending() {
    let manager = IndexManager::in_memory();
    let task = manager.create_index("movies", None).unwrap();
    // the first creation may still be enqueued
    let err = manager.create_index("movies", None).unwrap_err();
    assert_eq!(err, GriddleError::IndexAlreadyExists("movies".into()));
    manager.wait_for_task(task.uid).await.unwrap();
    assert!(manager.create_index("movies", None).is_err());
}

#[tokio::test]
async fn malformed_uid_is_rejected() {
    let manager = IndexManager::in_memory();
    for uid in ["", "with space", "slash/name", "dot.name"] {
        assert!(
            matches!(manager.create_index(uid, None), Err(GriddleError::InvalidIndexUid(_))),
            "uid {:?} should be rejected",
            uid
        );
    }
    assert!(manager.list_tasks(&Default::default()).is_empty());
}

#[tokio::test]
async fn delete_then_get_is_not_found() {
    let manager = IndexManager::in_memory();
    create_index(&manager, "movies").await;
    add_documents(&manager, "movies", json!([{"id": 1, "title": "Alien"}])).await;

    let task = manager.delete_index("movies").unwrap();
    assert_eq!(task.task_type, TaskType::IndexDeletion);
    assert_eq!(task.status, TaskStatus::Succeeded);
    assert_eq!(task.details.deleted_documents, Some(1));

    assert_eq!(
        manager.get_index("movies").unwrap_err(),
        GriddleError::IndexNotFound("movies".into())
    );
    assert!(matches!(
        manager.add_documents("movies", vec![json!({"id": 2})], None),
        Err(GriddleError::IndexNotFound(_))
    ));

    // the uid can be reused afterwards, with an empty index
    create_index(&manager, "movies").await;
    assert_eq!(manager.index_stats("movies").unwrap().number_of_documents, 0);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let manager = IndexManager::in_memory();
    create_index(&manager, "movies").await;
    assert_eq!(manager.delete_index("movies").unwrap().status, TaskStatus::Succeeded);
    assert_eq!(manager.delete_index("movies").unwrap().status, TaskStatus::Succeeded);
}

#[tokio::test]
async fn update_primary_key_before_documents() {
    let manager = IndexManager::in_memory();
    wait(&manager, manager.create_index("movies", None)).await;
    let task = wait(&manager, manager.update_index("movies", "sku")).await;
    assert_eq!(task.task_type, TaskType::IndexUpdate);
    assert_eq!(manager.get_index("movies").unwrap().primary_key.as_deref(), Some("sku"));

    add_documents(&manager, "movies", json!([{"sku": "a-1", "title": "Alien"}])).await;
    assert!(matches!(
        manager.update_index("movies", "id"),
        Err(GriddleError::PrimaryKeyAlreadyPresent { .. })
    ));
}

#[tokio::test]
async fn stats_report_documents_and_fields() {
    let manager = IndexManager::in_memory();
    create_index(&manager, "movies").await;
    add_documents(
        &manager,
        "movies",
        json!([
            {"id": 1, "title": "Alien", "year": 1979},
            {"id": 2, "title": "Heat"}
        ]),
    )
    .await;

    let stats = manager.index_stats("movies").unwrap();
    assert_eq!(stats.number_of_documents, 2);
    assert!(!stats.is_indexing);
    assert_eq!(stats.field_distribution.get("title"), Some(&2));
    assert_eq!(stats.field_distribution.get("year"), Some(&1));
}

#[tokio::test]
async fn indexes_are_independent() {
    let manager = IndexManager::in_memory();
    create_index(&manager, "a").await;
    create_index(&manager, "b").await;
    add_documents(&manager, "a", json!([{"id": 1}, {"id": 2}])).await;
    add_documents(&manager, "b", json!([{"id": 1}])).await;
    manager.delete_index("a").unwrap();

    assert_eq!(manager.index_stats("b").unwrap().number_of_documents, 1);
}
