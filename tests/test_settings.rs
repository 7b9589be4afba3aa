mod common;

use common::{create_index, wait};
use griddle::{GriddleError, IndexManager, IndexSettings, Setting, SettingField, SettingsUpdate, TaskType};
use serde_json::json;

#[tokio::test]
async fn new_index_has_defaults() {
    let manager = IndexManager::in_memory();
    create_index(&manager, "movies").await;
    let settings = manager.get_settings("movies").unwrap();
    assert_eq!(settings, IndexSettings::default());
    assert_eq!(
        serde_json::to_value(&settings).unwrap()["rankingRules"],
        json!(["words", "typo", "proximity", "attribute", "sort", "exactness"])
    );
}

#[tokio::test]
async fn partial_update_touches_only_provided_fields() {
    let manager = IndexManager::in_memory();
    create_index(&manager, "movies").await;
    wait(&manager, manager.update_stop_words("movies", ["the"])).await;

    let update: SettingsUpdate = serde_json::from_value(json!({
        "filterableAttributes": ["genre", "year"],
        "typoTolerance": {"minWordSizeForTypos": {"oneTypo": 4}}
    }))
    .unwrap();
    let task = wait(&manager, manager.update_settings("movies", update)).await;
    assert_eq!(task.task_type, TaskType::SettingsUpdate);
    assert!(task.details.settings.is_some());

    let settings = manager.get_settings("movies").unwrap();
    assert_eq!(settings.filterable_attributes, vec!["genre", "year"]);
    assert_eq!(settings.typo_tolerance.min_word_size_for_typos.one_typo, 4);
    assert_eq!(settings.typo_tolerance.min_word_size_for_typos.two_typos, 9);
    assert!(settings.stop_words.contains("the"));
    assert_eq!(settings.searchable_attributes, vec!["*"]);
    assert_eq!(settings.ranking_rules, IndexSettings::default().ranking_rules);
}

#[tokio::test]
async fn null_resets_a_single_field() {
    let manager = IndexManager::in_memory();
    create_index(&manager, "movies").await;
    wait(&manager, manager.update_sortable_attributes("movies", ["year"])).await;
    wait(&manager, manager.update_filterable_attributes("movies", ["genre"])).await;

    let update: SettingsUpdate = serde_json::from_value(json!({"sortableAttributes": null})).unwrap();
    assert_eq!(update.sortable_attributes, Setting::Reset);
    wait(&manager, manager.update_settings("movies", update)).await;

    let settings = manager.get_settings("movies").unwrap();
    assert!(settings.sortable_attributes.is_empty());
    assert_eq!(settings.filterable_attributes, vec!["genre"]);
}

#[tokio::test]
async fn reset_is_idempotent() {
    let manager = IndexManager::in_memory();
    create_index(&manager, "movies").await;
    wait(&manager, manager.update_ranking_rules("movies", ["words", "year:desc"])).await;

    wait(&manager, manager.reset_settings("movies")).await;
    let once = manager.get_settings("movies").unwrap();
    wait(&manager, manager.reset_settings("movies")).await;
    let twice = manager.get_settings("movies").unwrap();
    assert_eq!(once, IndexSettings::default());
    assert_eq!(once, twice);
}

#[tokio::test]
async fn per_field_get_update_reset() {
    let manager = IndexManager::in_memory();
    create_index(&manager, "movies").await;

    let field = SettingField::from_route_name("displayed-attributes").unwrap();
    wait(&manager, manager.update_setting("movies", field, json!(["title", "year"]))).await;
    assert_eq!(manager.get_setting("movies", field).unwrap(), json!(["title", "year"]));

    wait(&manager, manager.reset_setting("movies", field)).await;
    assert_eq!(manager.get_setting("movies", field).unwrap(), json!(["*"]));

    let synonyms = SettingField::Synonyms;
    wait(
        &manager,
        manager.update_setting("movies", synonyms, json!({"scifi": ["science-fiction"]})),
    )
    .await;
    assert_eq!(
        manager.get_setting("movies", synonyms).unwrap(),
        json!({"scifi": ["science-fiction"]})
    );
}

#[tokio::test]
async fn invalid_settings_are_rejected_synchronously() {
    let manager = IndexManager::in_memory();
    create_index(&manager, "movies").await;

    assert!(matches!(
        manager.update_ranking_rules("movies", ["words", "popularity"]),
        Err(GriddleError::InvalidSettings(_))
    ));
    let zero_hits: SettingsUpdate = serde_json::from_value(json!({"pagination": {"maxTotalHits": 0}})).unwrap();
    assert!(matches!(
        manager.update_settings("movies", zero_hits),
        Err(GriddleError::InvalidSettings(_))
    ));
    assert!(matches!(
        manager.update_setting("movies", SettingField::StopWords, json!("the")),
        Err(GriddleError::InvalidSettings(_))
    ));
}

#[tokio::test]
async fn merged_typo_thresholds_are_checked_when_applied() {
    let manager = IndexManager::in_memory();
    create_index(&manager, "movies").await;
    let update: SettingsUpdate = serde_json::from_value(json!({
        "typoTolerance": {"minWordSizeForTypos": {"oneTypo": 12}}
    }))
    .unwrap();
    let task = manager.update_settings("movies", update).unwrap();
    assert!(matches!(
        manager.wait_for_task(task.uid).await,
        Err(GriddleError::TaskFailed { .. })
    ));
    assert_eq!(manager.get_settings("movies").unwrap(), IndexSettings::default());
}

#[tokio::test]
async fn removing_filterable_attribute_breaks_later_queries() {
    let manager = IndexManager::in_memory();
    create_index(&manager, "movies").await;
    common::add_documents(&manager, "movies", json!([{"id": 1, "genre": "drama"}])).await;
    wait(&manager, manager.update_filterable_attributes("movies", ["genre"])).await;

    let query = griddle::SearchQuery::placeholder().with_filter("genre = drama");
    assert_eq!(manager.search("movies", &query).unwrap().hits.len(), 1);

    wait(&manager, manager.update_filterable_attributes("movies", Vec::<String>::new())).await;
    assert!(matches!(
        manager.search("movies", &query),
        Err(GriddleError::AttributeNotFilterable { .. })
    ));
}
