use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

use crate::integration::common::{TestApp, serve_site, setup_test_app, setup_test_app_no_auth};

/// Poll a run until it reports `status`, failing after a few seconds.
async fn wait_for_status(app: &TestApp, run_id: &str, status: &str) -> serde_json::Value {
    for _ in 0..200 {
        let (code, json) = app.send("GET", &format!("/v1/runs/{run_id}"), None).await;
        assert_eq!(code, StatusCode::OK);
        if json["status"] == status {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("run {run_id} never reached status {status}");
}

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["active_runs"], 0);
}

#[tokio::test]
async fn openapi_document_is_public() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(
            Request::get("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["paths"]["/v1/crawl"].is_object());
    assert!(json["paths"]["/v1/runs/{id}"].is_object());
}

#[tokio::test]
async fn unauthenticated_request_returns_401() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(
            Request::post("/v1/crawl")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"url":"http://127.0.0.1/"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "unauthorized");
}

#[tokio::test]
async fn wrong_api_key_returns_401() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(
            Request::get(format!("/v1/runs/{}", uuid::Uuid::new_v4()))
                .header("authorization", "Bearer wrong-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn no_api_key_configured_allows_access() {
    let app = setup_test_app_no_auth().await;

    let response = app
        .router
        .oneshot(
            Request::get(format!("/v1/runs/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_url_returns_400() {
    let app = setup_test_app().await;

    let (status, json) = app
        .send("POST", "/v1/crawl", Some(json!({ "url": "example.com" })))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn out_of_range_depth_returns_400() {
    let app = setup_test_app().await;

    let (status, json) = app
        .send(
            "POST",
            "/v1/runs",
            Some(json!({ "url": "http://127.0.0.1/", "depth": 9 })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().unwrap().contains("depth"));
}

#[tokio::test]
async fn crawl_respects_depth_robots_and_domain() {
    let site = serve_site().await;
    let app = setup_test_app().await;

    let (status, json) = app
        .send(
            "POST",
            "/v1/crawl",
            Some(json!({ "url": format!("http://{site}/"), "delay": 0, "extract_links": true })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["pages_crawled"], 3);
    assert_eq!(json["stats"]["pages_disallowed"], 1);
    assert!(json["stats"]["finished_at"].is_string());

    let mut urls: Vec<String> = json["pages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["url"].as_str().unwrap().to_string())
        .collect();
    urls.sort();
    assert_eq!(
        urls,
        vec![
            format!("http://{site}/"),
            format!("http://{site}/a"),
            format!("http://{site}/b"),
        ]
    );

    let home = json["pages"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["depth"] == 0)
        .unwrap();
    assert_eq!(home["title"], "Home");
    assert_eq!(home["description"], "Fixture home");
    assert_eq!(home["links"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn scrape_returns_single_page() {
    let site = serve_site().await;
    let app = setup_test_app().await;

    let (status, json) = app
        .send(
            "POST",
            "/v1/scrape",
            Some(json!({ "url": format!("http://{site}/b") })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["title"], "B");
    assert_eq!(json["content"], "Page B");
    assert!(json["links"].is_null());
}

#[tokio::test]
async fn scrape_missing_page_returns_404() {
    let site = serve_site().await;
    let app = setup_test_app().await;

    let (status, json) = app
        .send(
            "POST",
            "/v1/scrape",
            Some(json!({ "url": format!("http://{site}/nowhere") })),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn links_lists_every_link_on_the_page() {
    let site = serve_site().await;
    let app = setup_test_app().await;

    let (status, json) = app
        .send(
            "POST",
            "/v1/links",
            Some(json!({ "url": format!("http://{site}/") })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["links_found"], 4);
    let links = json["links"].as_array().unwrap();
    assert!(links.contains(&json!(format!("http://{site}/private/x"))));
    assert!(links.contains(&json!("https://elsewhere.test/")));
}

#[tokio::test]
async fn run_lifecycle() {
    let site = serve_site().await;
    let app = setup_test_app().await;

    let (status, json) = app
        .send(
            "POST",
            "/v1/runs",
            Some(json!({ "url": format!("http://{site}/"), "delay": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["status"], "running");
    let run_id = json["run_id"].as_str().unwrap().to_string();

    let run = wait_for_status(&app, &run_id, "completed").await;
    assert_eq!(run["stats"]["pages_crawled"], 3);
    assert_eq!(run["queued"], 0);

    let (status, pages) = app
        .send("GET", &format!("/v1/runs/{run_id}/pages"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pages["total"], 3);

    let (status, json) = app
        .send("DELETE", &format!("/v1/runs/{run_id}"), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "conflict");
}

#[tokio::test]
async fn cancel_running_run() {
    let site = serve_site().await;
    let app = setup_test_app().await;

    let (status, json) = app
        .send(
            "POST",
            "/v1/runs",
            Some(json!({ "url": format!("http://{site}/"), "delay": 10 })),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let run_id = json["run_id"].as_str().unwrap().to_string();

    let (status, _) = app
        .send("DELETE", &format!("/v1/runs/{run_id}"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let run = wait_for_status(&app, &run_id, "cancelled").await;
    assert!(run["stats"]["pages_crawled"].as_u64().unwrap() <= 1);
    assert_eq!(app.state.runs.active_count().await, 0);
}

#[tokio::test]
async fn unknown_run_returns_404() {
    let app = setup_test_app().await;
    let id = uuid::Uuid::new_v4();

    let (status, json) = app.send("GET", &format!("/v1/runs/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");

    let (status, _) = app.send("DELETE", &format!("/v1/runs/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
