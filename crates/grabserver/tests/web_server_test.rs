//! HTTP surface tests: routing, validation, file/fallback/error bodies and SSE.
//!
//! Run: cargo test -p grabserver --test web_server_test

#![cfg(unix)]

mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{body_bytes, body_json, TestServer, ENCODED_URL, FAILING_BODY, FALLBACK_BODY, SUCCESS_BODY};
use pretty_assertions::assert_eq;
use tower::ServiceExt;

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/download")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// ==== Routing Tests ====

#[tokio::test]
async fn test_health() {
    let server = TestServer::with_stub(SUCCESS_BODY);

    let response = server.app.clone().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["strategies"], serde_json::json!(["primary", "android", "ios"]));
}

#[tokio::test]
async fn test_cors_headers_present() {
    let server = TestServer::with_stub(SUCCESS_BODY);
    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://app.example.com")
        .body(Body::empty())
        .unwrap();

    let response = server.app.clone().oneshot(request).await.unwrap();

    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
}

// ==== Validation Tests ====

#[tokio::test]
async fn test_rejects_non_http_url() {
    let server = TestServer::with_stub(SUCCESS_BODY);

    let response = server
        .app
        .clone()
        .oneshot(get("/api/download?url=ftp%3A%2F%2Fexample.com%2Fa"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("ftp"));
    assert!(!json["suggestion"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_rejects_unknown_quality() {
    let server = TestServer::with_stub(SUCCESS_BODY);

    let response = server
        .app
        .clone()
        .oneshot(get(&format!("/api/download?url={ENCODED_URL}&quality=999")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rejects_missing_url() {
    let server = TestServer::with_stub(SUCCESS_BODY);

    let response = server.app.clone().oneshot(post_json(r#"{"quality":720}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(server.leftover_artifacts().is_empty());
}

// ==== Buffered Mode Tests ====

#[tokio::test]
async fn test_buffered_file_response() {
    let server = TestServer::with_stub(SUCCESS_BODY);

    let response = server
        .app
        .clone()
        .oneshot(get(&format!("/api/download?url={ENCODED_URL}&quality=480")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "video/mp4");
    assert_eq!(headers.get(header::CONTENT_LENGTH).unwrap(), "2048");
    assert_eq!(
        headers.get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"video_480p.mp4\""
    );
    assert_eq!(body_bytes(response).await.len(), 2048);
    assert!(server.leftover_artifacts().is_empty());
}

#[tokio::test]
async fn test_buffered_audio_via_post() {
    let server = TestServer::with_stub(SUCCESS_BODY);

    let response = server
        .app
        .clone()
        .oneshot(post_json(
            r#"{"url":"https://www.youtube.com/watch?v=abc","quality":720,"audioOnly":true}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "audio/mpeg");
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"audio.mp3\""
    );
}

#[tokio::test]
async fn test_fallback_urls_as_json() {
    let server = TestServer::with_stub(FALLBACK_BODY);

    let response = server
        .app
        .clone()
        .oneshot(get(&format!("/api/download?url={ENCODED_URL}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["urls"], serde_json::json!(["https://cdn.example.com/video.mp4"]));
    assert_eq!(json["directDownload"], false);
    assert!(json["instruction"].is_string());
}

#[tokio::test]
async fn test_structured_error_response() {
    let server = TestServer::with_stub(FAILING_BODY);

    let response = server
        .app
        .clone()
        .oneshot(get(&format!("/api/download?url={ENCODED_URL}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("Video unavailable"));
    assert!(json["details"].is_string());
    assert!(json["suggestion"].is_string());
}

// ==== Progressive Mode Tests ====

#[tokio::test]
async fn test_progress_stream_over_sse() {
    let server = TestServer::with_stub(SUCCESS_BODY);

    let response = server
        .app
        .clone()
        .oneshot(get(&format!("/api/download?url={ENCODED_URL}&quality=720&progress=true")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );

    let body = tokio::time::timeout(Duration::from_secs(30), body_bytes(response))
        .await
        .expect("event stream did not finish");
    let text = String::from_utf8(body).unwrap();

    let start = text.find(r#"data: {"type":"start""#).expect("start event");
    let complete = text.find(r#"data: {"type":"complete""#).expect("complete event");
    assert!(start < complete);
    assert!(text.contains(r#""type":"progress""#));
    assert!(text.contains(r#""fileName":"video_720p.mp4""#));
    assert!(!text.contains(r#""type":"error""#));
}

#[tokio::test]
async fn test_progress_stream_reports_terminal_error() {
    let server = TestServer::with_stub(FAILING_BODY);

    let response = server
        .app
        .clone()
        .oneshot(post_json(
            r#"{"url":"https://www.youtube.com/watch?v=abc","progress":true}"#,
        ))
        .await
        .unwrap();

    let body = tokio::time::timeout(Duration::from_secs(30), body_bytes(response))
        .await
        .expect("event stream did not finish");
    let text = String::from_utf8(body).unwrap();

    assert_eq!(text.matches(r#""type":"info""#).count(), 2);
    assert!(text.trim_end().ends_with('}'));
    let last = text.trim_end().lines().last().unwrap();
    assert!(last.starts_with(r#"data: {"type":"error""#), "{last}");
}

#[tokio::test]
async fn test_numeric_flags_in_query() {
    let server = TestServer::with_stub(SUCCESS_BODY);

    let response = server
        .app
        .clone()
        .oneshot(get(&format!("/api/download?url={ENCODED_URL}&audioOnly=1&progress=1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );
    let body = tokio::time::timeout(Duration::from_secs(30), body_bytes(response))
        .await
        .expect("event stream did not finish");
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains(r#""fileName":"audio.mp3""#), "{text}");
}
