//! HTTP Server & Routing Integration Tests
//!
//! Exercise the router with `oneshot` requests; upstream services are fakes.

mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use tower::ServiceExt;

use helpers::*;
use spcode_server::{build_router, AppState};

fn app(t: &TestPipeline) -> axum::Router {
    build_router(AppState::new(t.pipeline.clone()))
}

fn post_playlist(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/playlist")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_playlist_request_returns_name_and_tracks() {
    let t = TestPipeline::new(playlist_payload("Road Trip", 5));

    let response = app(&t)
        .oneshot(post_playlist(json!({
            "playlistUri": "spotify:playlist:pl1",
            "start": 0,
            "end": 2
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(
        body,
        json!({
            "status": "ok",
            "data": {
                "name": "Road Trip",
                "tracks": [
                    { "name": "Title0 - A1,A2", "uri": "t0" },
                    { "name": "Title1 - A1,A2", "uri": "t1" }
                ]
            }
        })
    );
}

#[tokio::test]
async fn test_playlist_range_defaults_to_first_three() {
    let t = TestPipeline::new(playlist_payload("Mix", 5));

    let response = app(&t)
        .oneshot(post_playlist(json!({ "playlistUri": "pl1" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["tracks"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_oversized_range_is_bad_request() {
    let t = TestPipeline::new(playlist_payload("Mix", 10));

    let response = app(&t)
        .oneshot(post_playlist(json!({ "playlistUri": "pl1", "start": 0, "end": 5 })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].is_string());
    assert_eq!(t.playlist_calls(), 0);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let t = TestPipeline::new(playlist_payload("Mix", 1));

    let request = Request::builder()
        .method("POST")
        .uri("/playlist")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let response = app(&t).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app(&t)
        .oneshot(post_playlist(json!({ "start": 0 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_expired_credential_is_unauthorized() {
    let t = TestPipeline::new(playlist_payload("Mix", 1));
    t.playlists.reject_token.store(true, Ordering::SeqCst);

    let response = app(&t)
        .oneshot(post_playlist(json!({ "playlistUri": "pl1" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_conversion_failure_is_client_error() {
    let t = TestPipeline::new(playlist_payload("Mix", 1));
    t.converter.fail.store(true, Ordering::SeqCst);

    let response = app(&t)
        .oneshot(post_playlist(json!({ "playlistUri": "pl1" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"], "model generation failed");
}

#[tokio::test]
async fn test_generated_model_is_downloadable() {
    let t = TestPipeline::new(playlist_payload("Mix", 1));
    let router = app(&t);

    let response = router
        .clone()
        .oneshot(post_playlist(json!({ "playlistUri": "pl1", "end": 1 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router.oneshot(get("/stl/t0.stl")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "model/stl");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"t0.stl\""
    );
    assert_eq!(
        headers[header::CACHE_CONTROL],
        "public, max-age=31536000, immutable"
    );
    assert_eq!(
        headers[header::CONTENT_LENGTH],
        MODEL_BYTES.len().to_string().as_str()
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], MODEL_BYTES);
}

#[tokio::test]
async fn test_missing_model_is_not_found() {
    let t = TestPipeline::new(playlist_payload("Mix", 1));

    let response = app(&t).oneshot(get("/stl/abc123.stl")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_malformed_model_names_are_rejected() {
    let t = TestPipeline::new(playlist_payload("Mix", 1));

    for uri in ["/stl/abc.txt", "/stl/.stl", "/stl/abc", "/stl/a-b.stl"] {
        let response = app(&t).oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri {}", uri);
    }
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let t = TestPipeline::new(playlist_payload("Mix", 1));

    let response = app(&t).oneshot(get("/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app(&t).oneshot(get("/playlist")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_reports_queues() {
    let t = TestPipeline::new(playlist_payload("Mix", 1));

    let response = app(&t).oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "spcode-server");
    assert_eq!(body["queues"]["playlist"], 0);
    assert_eq!(body["queues"]["code_image"], 0);
    assert_eq!(body["queues"]["model"], 0);
    assert_eq!(body["cached_playlists"], 0);
}
