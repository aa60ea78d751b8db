//! Integration tests for the read-only catalog endpoints.

mod common;

use axum::http::StatusCode;
use common::{catalog_fixture, spawn_app};

#[tokio::test]
async fn test_status_and_health() {
    let app = spawn_app().await;

    let (status, body) = app.get("/api").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["database"], "connected");

    let (status, body) = app.get("/api/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");

    let (status, body) = app.get("/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");
}

#[tokio::test]
async fn test_list_novels_sorting_and_pagination() {
    let app = spawn_app().await;
    app.import(catalog_fixture()).await;

    let (status, body) = app.get("/api/novels").await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["total_count"], 3);
    assert_eq!(data["total_pages"], 1);
    assert_eq!(data["page"], 1);
    assert_eq!(data["page_size"], 12);
    // Default order is oldest first release year.
    assert_eq!(data["novels"][0]["id"], "iron-garden");
    assert_eq!(data["novels"][2]["id"], "silent-moon");

    let (_, body) = app.get("/api/novels?sort=newest").await;
    assert_eq!(body["data"]["novels"][0]["id"], "silent-moon");

    let (_, body) = app.get("/api/novels?sort=large").await;
    assert_eq!(body["data"]["novels"][0]["id"], "dragon-path");
    assert_eq!(body["data"]["novels"][0]["chapters_count"], 2);

    let (_, body) = app.get("/api/novels?sort=alphabet").await;
    assert_eq!(body["data"]["novels"][0]["id"], "silent-moon");

    let (status, body) = app.get("/api/novels?sort=bogus").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["novels"][0]["id"], "iron-garden");

    let (status, body) = app.get("/api/novels?page=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["novels"].as_array().unwrap().len(), 0);
    assert_eq!(body["data"]["total_count"], 3);

    let (status, _) = app.get("/api/novels?page=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_novel_and_chapter_detail() {
    let app = spawn_app().await;
    app.import(catalog_fixture()).await;

    let (status, body) = app.get("/api/novels/dragon-path").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title_en"], "The Dragon Path");
    assert_eq!(body["data"]["year_end"], 2019);

    let (status, body) = app.get("/api/novels/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Novel not found");

    let (status, body) = app.get("/api/novels/dragon-path/chapters").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 2);
    assert_eq!(body["data"]["chapters"][0]["chapter_num"], 1);
    assert_eq!(body["data"]["chapters"][1]["title"], "Дорога");

    let (status, body) = app.get("/api/novels/iron-garden/chapters").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 0);

    let (status, _) = app.get("/api/novels/missing/chapters").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get("/api/chapters/dragon-path-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["novel_id"], "dragon-path");
    assert_eq!(body["data"]["source"]["name"], "Ranobe Hub");

    let (_, body) = app.get("/api/chapters/dragon-path-2").await;
    assert!(body["data"]["source"].is_null());

    let (status, _) = app.get("/api/chapters/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_search() {
    let app = spawn_app().await;
    app.import(catalog_fixture()).await;

    let (status, body) = app.get("/api/novels/search?q=dragon").await;
    assert_eq!(status, StatusCode::OK);
    let results = body["data"].as_array().unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0]["id"], "dragon-path");

    let (_, body) = app.get("/api/novels/search?q=%D0%BB%D1%83%D0%BD%D0%B0").await;
    assert_eq!(body["data"][0]["id"], "silent-moon");

    let (status, body) = app.get("/api/novels/search?q=qwxzvy").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    let (status, _) = app.get("/api/novels/search?q=%20%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let long = "a".repeat(51);
    let (status, _) = app.get(&format!("/api/novels/search?q={long}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sitemap_data() {
    let app = spawn_app().await;
    app.import(catalog_fixture()).await;

    let (status, body) = app.get("/api/novels/sitemap-data").await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|item| item["created_at"].is_string()));
}

#[tokio::test]
async fn test_get_responses_are_cacheable() {
    let app = spawn_app().await;
    app.import(catalog_fixture()).await;

    let response = tower::ServiceExt::oneshot(
        app.router.clone(),
        axum::http::Request::builder()
            .uri("/api/novels")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=300"
    );
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert!(response.headers().contains_key("x-request-id"));
}
