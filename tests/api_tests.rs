use std::sync::Arc;
use std::time::Duration;

use axum_test::TestServer;
use serde_json::json;

use academy_rec_api::api::{create_router, AppState};
use academy_rec_api::cache::RecommendationCache;
use academy_rec_api::config::Config;
use academy_rec_api::model::{ModelArtifact, RecommenderModel};
use academy_rec_api::services::Recommender;

fn test_config() -> Config {
    // envy is bypassed on purpose: tests pin the configuration instead of
    // reading the environment
    serde_json::from_value(json!({
        "host": "127.0.0.1",
        "port": 0,
        "model_path": "unused-in-tests",
        "cache_ttl": 3600,
        "max_cache_size": 100,
        "default_rec_count": 10,
        "max_rec_count": 50
    }))
    .unwrap()
}

/// Two users, four courses, restricted subset {CR1, CR2}; user 101 has
/// already rated CR2.
fn test_model() -> RecommenderModel {
    let artifact: ModelArtifact = serde_json::from_value(json!({
        "user_mapping": { "101": 0, "102": 1 },
        "item_mapping": { "CR1": 0, "CR2": 1, "201": 2, "202": 3 },
        "user_factors": [[1.0, 0.0], [0.0, 1.0]],
        "item_factors": [[2.0, 0.0], [1.0, 0.0], [3.0, 0.0], [0.5, 0.0]],
        "mine_course_indices": [0, 1],
        "sampled_reviews": [
            { "user_id": "101", "course_id": "CR2", "rating": 4.0 }
        ],
        "courses": [
            { "course_id": "CR1", "title": "Intro to Data", "category": "Data", "price": 19.99 },
            { "course_id": "CR2", "course_title": "Advanced Data" },
            { "course_id": "201", "title": "SQL Basics", "source": "udemy" }
        ],
        "metadata": { "algorithm": "warp" }
    }))
    .unwrap();
    RecommenderModel::from_artifact(artifact).unwrap()
}

fn create_test_server() -> TestServer {
    let recommender = Recommender::new(Arc::new(test_model()));
    let cache = RecommendationCache::new(Duration::from_secs(3600), 100);
    let state = AppState::new(Some(recommender), cache, test_config());
    TestServer::new(create_router(state)).unwrap()
}

fn create_degraded_server() -> TestServer {
    let cache = RecommendationCache::new(Duration::from_secs(3600), 100);
    let state = AppState::new(None, cache, test_config());
    TestServer::new(create_router(state)).unwrap()
}

#[tokio::test]
async fn test_root_identity_and_response_time_stamp() {
    let server = create_test_server();
    let response = server.get("/").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["name"], "MultiSkill Academy Recommendation API");
    assert_eq!(body["status"], "running");
    // the middleware stamps every JSON object response
    assert!(body["response_time_s"].is_number());
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_status_reports_model_and_cache() {
    let server = create_test_server();
    let response = server.get("/api/status").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["users_count"], 2);
    assert_eq!(body["courses_count"], 4);
    assert_eq!(body["mine_courses_count"], 2);
    assert_eq!(body["cache"]["size"], 0);
    assert_eq!(body["model_info"]["algorithm"], "warp");
}

#[tokio::test]
async fn test_recommendations_requires_user_id() {
    let server = create_test_server();
    let response = server.get("/api/recommendations").await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("user_id"));
}

#[tokio::test]
async fn test_unknown_user_gets_a_structured_payload_not_an_error_status() {
    let server = create_test_server();
    let response = server
        .get("/api/recommendations")
        .add_query_param("user_id", "9999")
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["user_id"], "9999");
    assert_eq!(body["count"], 0);
    assert!(!body["error"].as_str().unwrap().is_empty());
    assert_eq!(body["recommendations"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_recommendations_for_known_user() {
    let server = create_test_server();
    let response = server
        .get("/api/recommendations")
        .add_query_param("user_id", "101")
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["user_id"], "101");
    assert_eq!(body["mine_only"], true);
    // CR2 is already rated, only CR1 remains in the restricted subset
    assert_eq!(body["count"], 1);
    let rec = &body["recommendations"][0];
    assert_eq!(rec["course_id"], "CR1");
    assert_eq!(rec["title"], "Intro to Data");
    assert_eq!(rec["price"], 19.99);
    assert!(rec["score"].is_number());
    assert!(rec["original_score"].is_number());
}

#[tokio::test]
async fn test_full_catalog_policy_via_mine_only_flag() {
    let server = create_test_server();
    let response = server
        .get("/api/recommendations")
        .add_query_param("user_id", "101")
        .add_query_param("mine_only", "false")
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    let ids: Vec<&str> = body["recommendations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|rec| rec["course_id"].as_str().unwrap())
        .collect();
    // ranked by raw score, the rated CR2 excluded
    assert_eq!(ids, vec!["201", "CR1", "202"]);
}

#[tokio::test]
async fn test_count_parameter_truncates() {
    let server = create_test_server();
    let response = server
        .get("/api/recommendations")
        .add_query_param("user_id", "101")
        .add_query_param("mine_only", "false")
        .add_query_param("count", "2")
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["count"], 2);
    assert_eq!(body["recommendations"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_repeated_request_is_served_from_the_cache() {
    let server = create_test_server();

    let first = server
        .get("/api/recommendations")
        .add_query_param("user_id", "101")
        .await;
    first.assert_status_ok();
    let second = server
        .get("/api/recommendations")
        .add_query_param("user_id", "101")
        .await;
    second.assert_status_ok();

    let first: serde_json::Value = first.json();
    let second: serde_json::Value = second.json();
    assert_eq!(first["recommendations"], second["recommendations"]);

    let status: serde_json::Value = server.get("/api/status").await.json();
    assert_eq!(status["cache"]["size"], 1);
    assert_eq!(status["cache"]["misses"], 1);
    assert_eq!(status["cache"]["hits"], 1);
}

#[tokio::test]
async fn test_degraded_server_returns_503_for_model_endpoints() {
    let server = create_degraded_server();

    for path in ["/api/recommendations?user_id=101", "/api/users", "/api/courses"] {
        let response = server.get(path).await;
        response.assert_status(axum::http::StatusCode::SERVICE_UNAVAILABLE);
        let body: serde_json::Value = response.json();
        assert!(!body["error"].as_str().unwrap().is_empty());
    }

    let status: serde_json::Value = server.get("/api/status").await.json();
    assert_eq!(status["model_loaded"], false);
    assert_eq!(status["users_count"], 0);
}

#[tokio::test]
async fn test_users_listing_is_sorted_and_paginated() {
    let server = create_test_server();
    let response = server.get("/api/users").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["total"], 2);
    // numeric-keyed model: ids come back as sorted numbers
    assert_eq!(body["users"], json!([101, 102]));

    let response = server
        .get("/api/users")
        .add_query_param("limit", "1")
        .add_query_param("offset", "1")
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["total"], 2);
    assert_eq!(body["users"], json!([102]));
}

#[tokio::test]
async fn test_courses_listing_with_source_filter() {
    let server = create_test_server();

    let body: serde_json::Value = server.get("/api/courses").await.json();
    assert_eq!(body["total"], 3);

    let body: serde_json::Value = server
        .get("/api/courses")
        .add_query_param("source", "mine")
        .await
        .json();
    assert_eq!(body["total"], 2);
    let titles: Vec<&str> = body["courses"]
        .as_array()
        .unwrap()
        .iter()
        .map(|course| course["title"].as_str().unwrap())
        .collect();
    // the alternate title column is folded in
    assert_eq!(titles, vec!["Intro to Data", "Advanced Data"]);

    let body: serde_json::Value = server
        .get("/api/courses")
        .add_query_param("source", "udemy")
        .await
        .json();
    assert_eq!(body["total"], 1);
    assert_eq!(body["courses"][0]["course_id"], "201");
}
