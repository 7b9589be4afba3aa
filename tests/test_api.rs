mod common;

use griddle::{ApiRequest, ApiResponse, ApiRouter, IndexManager, TaskUid};
use http::StatusCode;
use serde_json::{json, Value};

fn router() -> ApiRouter {
    ApiRouter::new(IndexManager::in_memory())
}

/// Send a request that must be accepted, then wait for its task to finish.
async fn accepted(router: &ApiRouter, request: ApiRequest) -> Value {
    let response = router.handle(request).await;
    assert_eq!(response.status, StatusCode::ACCEPTED, "body: {}", response.body);
    let uid: TaskUid = serde_json::from_value(response.body["taskUid"].clone()).unwrap();
    router.manager().wait_for_task(uid).await.unwrap();
    response.body
}

async fn seeded() -> ApiRouter {
    let router = router();
    accepted(&router, ApiRequest::post("/indexes", json!({"uid": "products", "primaryKey": "id"}))).await;
    accepted(&router, ApiRequest::post("/indexes/products/documents", common::products())).await;
    accepted(
        &router,
        ApiRequest::put(
            "/indexes/products/settings/filterable-attributes",
            json!(["category", "price"]),
        ),
    )
    .await;
    router
}

fn hit_ids(response: &ApiResponse) -> Vec<Value> {
    response.body["hits"]
        .as_array()
        .unwrap()
        .iter()
        .map(|hit| hit["id"].clone())
        .collect()
}

#[tokio::test]
async fn health_and_version() {
    let router = router();
    let health = router.handle(ApiRequest::get("/health")).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["status"], json!("available"));

    let version = router.handle(ApiRequest::get("/version")).await;
    assert_eq!(version.status, StatusCode::OK);
    assert!(version.body["pkgVersion"].is_string());
}

#[tokio::test]
async fn mutations_answer_with_a_task_summary() {
    let router = router();
    let body = accepted(&router, ApiRequest::post("/indexes", json!({"uid": "movies"}))).await;
    assert_eq!(body["indexUid"], json!("movies"));
    assert_eq!(body["status"], json!("enqueued"));
    assert_eq!(body["type"], json!("indexCreation"));
    assert!(body["enqueuedAt"].is_string());

    let task = router
        .handle(ApiRequest::get(format!("/tasks/{}", body["taskUid"])))
        .await;
    assert_eq!(task.status, StatusCode::OK);
    assert_eq!(task.body["status"], json!("succeeded"));
}

#[tokio::test]
async fn index_lifecycle_status_codes() {
    let router = router();
    accepted(&router, ApiRequest::post("/indexes", json!({"uid": "movies"}))).await;

    let duplicate = router
        .handle(ApiRequest::post("/indexes", json!({"uid": "movies"})))
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(duplicate.body["code"], json!("index_already_exists"));
    assert_eq!(duplicate.body["type"], json!("conflict"));
    assert!(duplicate.body["link"].as_str().unwrap().ends_with("#index_already_exists"));

    let invalid = router
        .handle(ApiRequest::post("/indexes", json!({"uid": "bad uid"})))
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert_eq!(invalid.body["code"], json!("invalid_index_uid"));

    let listed = router.handle(ApiRequest::get("/indexes")).await;
    assert_eq!(listed.body["total"], json!(1));
    assert_eq!(listed.body["results"][0]["uid"], json!("movies"));

    accepted(&router, ApiRequest::delete("/indexes/movies")).await;
    let missing = router.handle(ApiRequest::get("/indexes/movies")).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["code"], json!("index_not_found"));
}

#[tokio::test]
async fn malformed_requests_are_bad_requests() {
    let router = seeded().await;

    let body = router
        .handle(ApiRequest::post("/indexes", json!({"primaryKey": "id"})))
        .await;
    assert_eq!(body.status, StatusCode::BAD_REQUEST);
    assert_eq!(body.body["code"], json!("bad_request"));

    let param = router
        .handle(ApiRequest::get("/indexes/products/documents").with_query("limit", "many"))
        .await;
    assert_eq!(param.status, StatusCode::BAD_REQUEST);

    let task_uid = router.handle(ApiRequest::get("/tasks/latest")).await;
    assert_eq!(task_uid.status, StatusCode::BAD_REQUEST);

    let unknown_setting = router
        .handle(ApiRequest::get("/indexes/products/settings/colour-scheme"))
        .await;
    assert_eq!(unknown_setting.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown_setting.body["code"], json!("route_not_found"));
}

#[tokio::test]
async fn documents_routes() {
    let router = seeded().await;

    let page = router
        .handle(
            ApiRequest::get("/indexes/products/documents")
                .with_query("limit", "2")
                .with_query("fields", "id,title"),
        )
        .await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.body["total"], json!(5));
    assert_eq!(
        page.body["results"],
        json!([
            {"id": 1, "title": "Wireless Headphones"},
            {"id": 2, "title": "Bluetooth Speaker"}
        ])
    );

    let one = router.handle(ApiRequest::get("/indexes/products/documents/4")).await;
    assert_eq!(one.body["title"], json!("Standing Desk"));

    let fetched = router
        .handle(ApiRequest::post(
            "/indexes/products/documents/fetch",
            json!({"filter": "category = Office", "fields": ["id"]}),
        ))
        .await;
    assert_eq!(fetched.body["results"], json!([{"id": 3}, {"id": 4}]));

    accepted(&router, ApiRequest::post("/indexes/products/documents/delete-batch", json!([1, 2]))).await;
    accepted(
        &router,
        ApiRequest::post("/indexes/products/documents/delete", json!({"filter": "price > 300"})),
    )
    .await;
    accepted(&router, ApiRequest::delete("/indexes/products/documents/5")).await;

    let stats = router.handle(ApiRequest::get("/indexes/products/stats")).await;
    assert_eq!(stats.body["numberOfDocuments"], json!(1));

    let gone = router.handle(ApiRequest::get("/indexes/products/documents/1")).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    assert_eq!(gone.body["code"], json!("document_not_found"));
}

#[tokio::test]
async fn search_via_get_and_post() {
    let router = seeded().await;

    let get = router
        .handle(
            ApiRequest::get("/indexes/products/search")
                .with_query("q", "headphnes")
                .with_query("filter", "price < 30"),
        )
        .await;
    assert_eq!(get.status, StatusCode::OK);
    assert_eq!(hit_ids(&get), vec![json!(1)]);

    let post = router
        .handle(ApiRequest::post(
            "/indexes/products/search",
            json!({"filter": {"category": "Office"}, "facets": ["category"]}),
        ))
        .await;
    assert_eq!(hit_ids(&post), vec![json!(3), json!(4)]);
    assert_eq!(post.body["estimatedTotalHits"], json!(2));
    assert_eq!(post.body["facetDistribution"]["category"], json!({"Office": 2}));

    let rejected = router
        .handle(ApiRequest::post(
            "/indexes/products/search",
            json!({"filter": "brand = Boom"}),
        ))
        .await;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    assert_eq!(rejected.body["code"], json!("attribute_not_filterable"));
    assert_eq!(rejected.body["type"], json!("filter"));
}

#[tokio::test]
async fn facet_search_route() {
    let router = seeded().await;
    let response = router
        .handle(ApiRequest::post(
            "/indexes/products/facet-search",
            json!({"facetName": "category", "facetQuery": "off"}),
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["facetHits"], json!([{"value": "Office", "count": 2}]));
}

#[tokio::test]
async fn multi_search_reports_errors_per_slot() {
    let router = seeded().await;
    let response = router
        .handle(ApiRequest::post(
            "/multi-search",
            json!({"queries": [
                {"indexUid": "products", "q": "desk"},
                {"indexUid": "missing", "q": "desk"}
            ]}),
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let results = response.body["results"].as_array().unwrap();
    assert_eq!(results[0]["indexUid"], json!("products"));
    assert_eq!(results[0]["hits"][0]["id"], json!(4));
    assert_eq!(results[1]["indexUid"], json!("missing"));
    assert_eq!(results[1]["error"]["code"], json!("index_not_found"));
}

#[tokio::test]
async fn settings_routes() {
    let router = seeded().await;

    accepted(
        &router,
        ApiRequest::patch(
            "/indexes/products/settings",
            json!({"sortableAttributes": ["price"], "stopWords": ["the"]}),
        ),
    )
    .await;
    let settings = router.handle(ApiRequest::get("/indexes/products/settings")).await;
    assert_eq!(settings.body["sortableAttributes"], json!(["price"]));
    assert_eq!(settings.body["filterableAttributes"], json!(["category", "price"]));

    let field = router
        .handle(ApiRequest::get("/indexes/products/settings/stop-words"))
        .await;
    assert_eq!(field.body, json!(["the"]));

    accepted(&router, ApiRequest::delete("/indexes/products/settings/stop-words")).await;
    let field = router
        .handle(ApiRequest::get("/indexes/products/settings/stop-words"))
        .await;
    assert_eq!(field.body, json!([]));

    let invalid = router
        .handle(ApiRequest::patch(
            "/indexes/products/settings",
            json!({"rankingRules": ["words", "bogus"]}),
        ))
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert_eq!(invalid.body["code"], json!("invalid_settings"));

    accepted(&router, ApiRequest::delete("/indexes/products/settings")).await;
    let settings = router.handle(ApiRequest::get("/indexes/products/settings")).await;
    assert_eq!(settings.body["filterableAttributes"], json!([]));
}

#[tokio::test]
async fn tasks_route_filters() {
    let router = seeded().await;
    let all = router.handle(ApiRequest::get("/tasks")).await;
    assert_eq!(all.body["total"], json!(3));

    let creations = router
        .handle(ApiRequest::get("/tasks").with_query("types", "indexCreation"))
        .await;
    assert_eq!(creations.body["total"], json!(1));
    assert_eq!(creations.body["results"][0]["type"], json!("indexCreation"));

    let failed = router
        .handle(
            ApiRequest::get("/tasks")
                .with_query("statuses", "failed")
                .with_query("indexUids", "products"),
        )
        .await;
    assert_eq!(failed.body["total"], json!(0));

    let bad = router
        .handle(ApiRequest::get("/tasks").with_query("statuses", "paused"))
        .await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
}
