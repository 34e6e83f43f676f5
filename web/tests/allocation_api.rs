//! End-to-end tests of the HTTP surface over the in-memory counter store.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use seqalloc_runtime::{RetryPolicy, SequenceAllocator};
use seqalloc_testing::{CommitFault, InMemoryCounterStore};
use seqalloc_web::{build_router, AppState, REQUEST_ID_HEADER};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn app(store: &InMemoryCounterStore) -> Router {
    let allocator = SequenceAllocator::new(Arc::new(store.clone())).with_policy(
        RetryPolicy::builder()
            .max_attempts(3)
            .initial_delay(Duration::from_millis(1))
            .build(),
    );
    build_router(AppState::new(allocator))
}

async fn post(app: &Router, path: &str, body: &str) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn get(app: &Router, path: &str) -> Response {
    let request = Request::builder().uri(path).body(Body::empty()).unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).expect("response body is JSON")
}

#[tokio::test]
async fn first_booking_id_for_operator() {
    let store = InMemoryCounterStore::new();
    let app = app(&store);

    let response = post(&app, "/api/ids/booking", r#"{"scopeCode":"OP002"}"#).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({
            "success": true,
            "id": "OP002/00000001",
            "scopeCode": "OP002",
            "sequenceNumber": 1
        })
    );
    assert_eq!(store.counter("bookingId_OP002"), Some(1));
}

#[tokio::test]
async fn driver_id_continues_existing_counter() {
    let store = InMemoryCounterStore::new().with_counter("driverId_OP001", 10);
    let app = app(&store);

    let response = post(&app, "/api/ids/driver", r#"{"scopeCode":"OP001"}"#).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["id"], "OP001/DR0011");
    assert_eq!(body["sequenceNumber"], 11);
}

#[tokio::test]
async fn global_ids_accept_empty_bodies() {
    let store = InMemoryCounterStore::new();
    let app = app(&store);

    let first = json_body(post(&app, "/api/ids/admin", "").await).await;
    let second = json_body(post(&app, "/api/ids/admin", "{}").await).await;
    let passenger = json_body(post(&app, "/api/ids/passenger", "").await).await;

    assert_eq!(first, json!({ "success": true, "id": "AD001", "sequenceNumber": 1 }));
    assert_eq!(second["id"], "AD002");
    assert_eq!(passenger["id"], "CU001");
}

#[tokio::test]
async fn missing_scope_code_is_rejected_without_side_effects() {
    let store = InMemoryCounterStore::new();
    let app = app(&store);

    let response = post(&app, "/api/ids/booking", "{}").await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.headers().get(header::RETRY_AFTER).is_none());
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["retryable"], false);
    assert!(store.is_empty());
    assert_eq!(store.committed_transactions(), 0);

    // The next valid request still starts the sequence at one.
    let response = post(&app, "/api/ids/booking", r#"{"scopeCode":"OP002"}"#).await;
    assert_eq!(json_body(response).await["sequenceNumber"], 1);
}

#[tokio::test]
async fn malformed_requests_are_validation_errors() {
    let store = InMemoryCounterStore::new();
    let app = app(&store);

    for (path, body) in [
        ("/api/ids/driver", "{not json"),
        ("/api/ids/driver", r#"{"scopeCode":"OP001","extra":1}"#),
        ("/api/ids/driver", r#"{"scopeCode":"OP/001"}"#),
        ("/api/ids/driver", r#"{"scopeCode":"   "}"#),
        ("/api/ids/admin", r#"{"scopeCode":"OP001"}"#),
    ] {
        let response = post(&app, path, body).await;
        assert_eq!(
            response.status(),
            StatusCode::UNPROCESSABLE_ENTITY,
            "{path} {body}"
        );
    }

    assert!(store.is_empty());
}

#[tokio::test]
async fn exhausted_conflicts_are_retryable_503() {
    let store = InMemoryCounterStore::new();
    let app = app(&store);
    store.fail_next_commits(3, CommitFault::Conflict);

    let response = post(&app, "/api/ids/passenger", "").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "1");
    let body = json_body(response).await;
    assert_eq!(body["code"], "CONFLICT_EXHAUSTED");
    assert_eq!(body["retryable"], true);
    assert_eq!(store.counter("passengerId"), None);

    let response = post(&app, "/api/ids/passenger", "").await;
    assert_eq!(json_body(response).await["id"], "CU001");
}

#[tokio::test]
async fn unavailable_store_is_retryable_503() {
    let store = InMemoryCounterStore::new();
    let app = app(&store);
    store.set_unavailable(true);

    let response = post(&app, "/api/ids/admin", "").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["code"], "STORE_UNAVAILABLE");

    let response = get(&app, "/ready").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn responses_carry_request_ids() {
    let store = InMemoryCounterStore::new();
    let app = app(&store);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/ids/admin")
        .header(REQUEST_ID_HEADER, "req-123")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers().get(REQUEST_ID_HEADER).unwrap(), "req-123");

    let response = post(&app, "/api/ids/booking", "{}").await;
    assert!(response.headers().get(REQUEST_ID_HEADER).is_some());
}

#[tokio::test]
async fn metrics_route_is_404_when_disabled() {
    let store = InMemoryCounterStore::new();
    let app = app(&store);

    let response = get(&app, "/metrics").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(&app, "/api/ids/unknown").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
