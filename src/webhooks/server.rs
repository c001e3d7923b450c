//! Admission webhook server.
//!
//! Serves `POST /mutate` over TLS. The API server sends an `AdmissionReview`
//! and receives one back carrying the verdict and, when mutating, a JSON
//! Patch.
//!
//! To enable the webhook:
//! 1. Provision a serving certificate for the webhook Service
//! 2. Mount it at /run/secrets/tls/ (tls.crt, tls.key)
//! 3. Create a MutatingWebhookConfiguration for pod CREATE pointing at /mutate

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use tracing::{debug, error, info, warn};

use crate::health::HealthState;
use crate::webhooks::dispatcher::AdmissionDispatcher;
use crate::webhooks::error::WebhookError;
use crate::webhooks::review::{AdmissionReview, decode_review, encode_review};

/// Path the MutatingWebhookConfiguration points at
pub const MUTATE_PATH: &str = "/mutate";

const JSON_CONTENT_TYPE: &str = "application/json";

/// Shared state for webhook handlers
pub struct WebhookState {
    pub dispatcher: AdmissionDispatcher,
    pub health: Arc<HealthState>,
}

impl WebhookState {
    pub fn new(dispatcher: AdmissionDispatcher, health: Arc<HealthState>) -> Self {
        Self { dispatcher, health }
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(MUTATE_PATH, post(mutate))
        .with_state(state)
}

fn is_json(headers: &HeaderMap) -> bool {
    match headers.get(header::CONTENT_TYPE) {
        None => true,
        Some(value) => value
            .to_str()
            .map(|v| {
                v.split(';')
                    .next()
                    .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(JSON_CONTENT_TYPE))
            })
            .unwrap_or(false),
    }
}

fn bad_request(state: &WebhookState, message: String) -> Response {
    state.health.metrics.record_invalid_review();
    (StatusCode::BAD_REQUEST, message).into_response()
}

/// Mutating admission handler
async fn mutate(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();

    if !is_json(&headers) {
        warn!(content_type = ?headers.get(header::CONTENT_TYPE), "Unsupported content type");
        return bad_request(
            &state,
            format!("unsupported content type, expected {}", JSON_CONTENT_TYPE),
        );
    }

    let review = match decode_review(&body) {
        Ok(review) => review,
        Err(e) => {
            error!(error = %e, "Failed to decode AdmissionReview");
            return bad_request(&state, e.to_string());
        }
    };

    let Some(request) = review.request.as_ref() else {
        return bad_request(&state, "AdmissionReview has no request".to_string());
    };

    debug!(
        uid = %request.uid,
        operation = ?request.operation,
        namespace = ?request.namespace,
        resource = %request.resource,
        "Processing admission request"
    );

    let admission = state.dispatcher.admit(request);
    let policy = state.dispatcher.policy().name();
    state.health.metrics.record_admission(
        policy,
        admission.outcome.as_str(),
        admission.patch_operations,
        started.elapsed().as_secs_f64(),
    );

    info!(
        uid = %admission.response.uid,
        allowed = admission.response.allowed,
        outcome = admission.outcome.as_str(),
        "Admission request handled"
    );

    let response = AdmissionReview::respond(&review.api_version, admission.response);
    match encode_review(&response) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode AdmissionReview");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0:`port` and serves the /mutate endpoint.
///
/// # Arguments
/// * `state` - Dispatcher and shared health state
/// * `cert_path` - Path to TLS certificate file (PEM format)
/// * `key_path` - Path to TLS private key file (PEM format)
/// * `port` - Listening port
pub async fn run_webhook_server(
    state: Arc<WebhookState>,
    cert_path: &Path,
    key_path: &Path,
    port: u16,
) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::net::SocketAddr;

    let health = state.health.clone();
    let app = create_webhook_router(state);

    let config = RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(WebhookError::TlsConfig)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "Webhook server listening with TLS");
    health.set_ready(true).await;

    axum_server::bind_rustls(addr, config)
        .serve(app.into_make_service())
        .await
        .map_err(WebhookError::Server)?;

    Ok(())
}
