// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Functional tests for the webhook HTTP surface.
//!
//! These tests drive the axum routers in-process through `tower::ServiceExt`,
//! WITHOUT TLS or a Kubernetes cluster.
//!
//! ```bash
//! cargo test --test functional
//! ```

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use common::fixtures::{PodBuilder, ReviewBuilder};
use image_mutator::health::{HealthState, create_router};
use image_mutator::webhooks::{AdmissionDispatcher, MUTATE_PATH, RegistryRewrite, create_webhook_router};
use image_mutator::{RegistryConfig, WebhookState};

fn webhook_app() -> (Router, Arc<HealthState>) {
    let health = Arc::new(HealthState::new());
    let dispatcher = AdmissionDispatcher::new(RegistryRewrite::new(
        RegistryConfig::new("myreg.example.com").with_bypass_namespaces(["kube-system"]),
    ));
    let state = Arc::new(WebhookState::new(dispatcher, health.clone()));
    (create_webhook_router(state), health)
}

fn post(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(MUTATE_PATH)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .expect("request")
}

async fn read_body(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body")
        .to_vec()
}

async fn read_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&read_body(response).await).expect("json")
}

fn decode_patch(response: &Value) -> Value {
    use k8s_openapi::ByteString;
    let bytes: ByteString = serde_json::from_value(response["patch"].clone()).expect("base64");
    serde_json::from_slice(&bytes.0).expect("patch json")
}

#[tokio::test]
async fn test_mutates_pod_images() {
    let (app, _) = webhook_app();
    let body = ReviewBuilder::new("705ab4f5-6393-11e8-b7cc-42010a800002")
        .object(
            PodBuilder::new("web")
                .container("app", "nginx")
                .container("proxy", "myreg.example.com/envoy:1.29")
                .build(),
        )
        .body();

    let response = app.oneshot(post(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let review = read_json(response).await;
    assert_eq!(review["apiVersion"], "admission.k8s.io/v1");
    assert_eq!(review["kind"], "AdmissionReview");
    let inner = &review["response"];
    assert_eq!(inner["uid"], "705ab4f5-6393-11e8-b7cc-42010a800002");
    assert_eq!(inner["allowed"], true);
    assert_eq!(inner["patchType"], "JSONPatch");
    assert_eq!(
        decode_patch(inner),
        json!([{"op": "replace", "path": "/spec/containers/0/image", "value": "myreg.example.com/nginx"}])
    );
}

#[tokio::test]
async fn test_v1beta1_review_answered_in_kind() {
    let (app, _) = webhook_app();
    let body = ReviewBuilder::new("beta-uid")
        .api_version("admission.k8s.io/v1beta1")
        .object(PodBuilder::new("web").images(["nginx"]).build())
        .body();

    let review = read_json(app.oneshot(post(body)).await.unwrap()).await;
    assert_eq!(review["apiVersion"], "admission.k8s.io/v1beta1");
    assert_eq!(review["response"]["uid"], "beta-uid");
}

#[tokio::test]
async fn test_conforming_pod_allowed_without_patch() {
    let (app, _) = webhook_app();
    let body = ReviewBuilder::new("uid-ok")
        .object(PodBuilder::new("web").images(["myreg.example.com/nginx"]).build())
        .body();

    let review = read_json(app.oneshot(post(body)).await.unwrap()).await;
    let inner = review["response"].as_object().unwrap();
    assert_eq!(inner["allowed"], true);
    assert!(!inner.contains_key("patch"));
    assert!(!inner.contains_key("patchType"));
}

#[tokio::test]
async fn test_bypassed_namespace_allowed_without_patch() {
    let (app, _) = webhook_app();
    let body = ReviewBuilder::new("uid-bypass")
        .namespace("kube-system")
        .object(PodBuilder::generated("coredns-").images(["coredns/coredns:1.11"]).build())
        .body();

    let review = read_json(app.oneshot(post(body)).await.unwrap()).await;
    assert_eq!(review["response"]["allowed"], true);
    assert!(review["response"].get("patch").is_none());
}

#[tokio::test]
async fn test_malformed_object_denied() {
    let (app, _) = webhook_app();
    let body = ReviewBuilder::new("uid-bad")
        .object(json!({"spec": {"containers": [{"name": "c", "image": ["nginx"]}]}}))
        .body();

    let response = app.oneshot(post(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let review = read_json(response).await;
    let inner = &review["response"];
    assert_eq!(inner["uid"], "uid-bad");
    assert_eq!(inner["allowed"], false);
    assert!(!inner["status"]["message"].as_str().unwrap().is_empty());
    assert!(inner.get("patch").is_none());
}

#[tokio::test]
async fn test_unsupported_resource_allowed() {
    let (app, _) = webhook_app();
    let body = ReviewBuilder::new("uid-cm")
        .resource("", "v1", "configmaps")
        .object(json!({"kind": "ConfigMap", "metadata": {"name": "cfg"}}))
        .body();

    let review = read_json(app.oneshot(post(body)).await.unwrap()).await;
    assert_eq!(review["response"]["allowed"], true);
    assert_eq!(review["response"]["uid"], "uid-cm");
}

#[tokio::test]
async fn test_undecodable_bodies_are_bad_requests() {
    for body in [Vec::new(), b"{not json".to_vec(), b"{\"kind\":\"AdmissionReview\"}".to_vec()] {
        let (app, _) = webhook_app();
        let response = app.oneshot(post(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_wrong_content_type_rejected() {
    let (app, _) = webhook_app();
    let request = Request::builder()
        .method("POST")
        .uri(MUTATE_PATH)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(ReviewBuilder::new("uid").body()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_not_allowed() {
    let (app, _) = webhook_app();
    let request = Request::builder()
        .method("GET")
        .uri(MUTATE_PATH)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_metrics_record_admissions() {
    let (app, health) = webhook_app();
    let body = ReviewBuilder::new("uid-m")
        .object(PodBuilder::new("web").images(["nginx", "redis"]).build())
        .body();
    let response = app.clone().oneshot(post(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.oneshot(post(Vec::new())).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let metrics_app = create_router(health);
    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let response = metrics_app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let text = String::from_utf8(read_body(response).await).unwrap();
    assert!(text.contains(
        "image_mutator_admissions_total{policy=\"registry-rewrite\",outcome=\"mutated\"} 1"
    ));
    assert!(text.contains("image_mutator_patch_operations_total{policy=\"registry-rewrite\"} 2"));
    assert!(text.contains("image_mutator_invalid_reviews_total 1"));
}

#[tokio::test]
async fn test_readiness_follows_state() {
    let health = Arc::new(HealthState::new());
    let app = create_router(health.clone());

    let ready = |app: Router| async move {
        let request = Request::builder().uri("/readyz").body(Body::empty()).unwrap();
        app.oneshot(request).await.unwrap().status()
    };

    assert_eq!(ready(app.clone()).await, StatusCode::SERVICE_UNAVAILABLE);
    health.set_ready(true).await;
    assert_eq!(ready(app).await, StatusCode::OK);
}
