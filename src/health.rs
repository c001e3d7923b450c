//! Health server for Kubernetes probes and Prometheus metrics.
//!
//! Provides:
//! - `/healthz` - Liveness probe (always returns 200 if server is running)
//! - `/readyz` - Readiness probe (returns 200 when ready to serve traffic)
//! - `/metrics` - Prometheus metrics endpoint

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tokio::sync::RwLock;
use tracing::info;

/// Labels for admission outcome metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct AdmissionLabels {
    pub policy: String,
    pub outcome: String,
}

impl EncodeLabelSet for AdmissionLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("policy", self.policy.as_str()).encode(encoder.encode_label())?;
        ("outcome", self.outcome.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for per-policy metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct PolicyLabels {
    pub policy: String,
}

impl EncodeLabelSet for PolicyLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("policy", self.policy.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics for the webhook
pub struct Metrics {
    /// Admission requests by outcome
    pub admissions_total: Family<AdmissionLabels, Counter>,
    /// Request bodies rejected before a UID was known
    pub invalid_reviews_total: Counter,
    /// Patch operations emitted
    pub patch_operations_total: Family<PolicyLabels, Counter>,
    /// Admission handling duration histogram
    pub admission_duration_seconds: Family<PolicyLabels, Histogram>,
    /// Prometheus registry
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with registered metrics
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let admissions_total = Family::<AdmissionLabels, Counter>::default();
        registry.register(
            "image_mutator_admissions",
            "Total number of admission requests by outcome",
            admissions_total.clone(),
        );

        let invalid_reviews_total = Counter::default();
        registry.register(
            "image_mutator_invalid_reviews",
            "Total number of undecodable AdmissionReview bodies",
            invalid_reviews_total.clone(),
        );

        let patch_operations_total = Family::<PolicyLabels, Counter>::default();
        registry.register(
            "image_mutator_patch_operations",
            "Total number of JSON Patch operations emitted",
            patch_operations_total.clone(),
        );

        let admission_duration_seconds =
            Family::<PolicyLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.0001, 2.0, 15))
            });
        registry.register(
            "image_mutator_admission_duration_seconds",
            "Duration of admission handling in seconds",
            admission_duration_seconds.clone(),
        );

        Self {
            admissions_total,
            invalid_reviews_total,
            patch_operations_total,
            admission_duration_seconds,
            registry,
        }
    }

    /// Record a handled admission request
    pub fn record_admission(
        &self,
        policy: &str,
        outcome: &str,
        patch_operations: usize,
        duration_secs: f64,
    ) {
        self.admissions_total
            .get_or_create(&AdmissionLabels {
                policy: policy.to_string(),
                outcome: outcome.to_string(),
            })
            .inc();

        let labels = PolicyLabels {
            policy: policy.to_string(),
        };
        if patch_operations > 0 {
            self.patch_operations_total
                .get_or_create(&labels)
                .inc_by(patch_operations as u64);
        }
        self.admission_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }

    /// Record a request body that could not be decoded
    pub fn record_invalid_review(&self) {
        self.invalid_reviews_total.inc();
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}

/// Shared state for the health server
pub struct HealthState {
    /// Whether the webhook is ready to serve admissions
    ready: RwLock<bool>,
    /// Metrics registry
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (starts as not ready)
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Metrics::new(),
        }
    }

    /// Mark the webhook as ready or not ready
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Check if the webhook is ready
    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }
}

/// Liveness probe handler
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe handler
///
/// Returns 503 Service Unavailable until the webhook listener is configured.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

/// Metrics handler
async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health server router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Run the health server on `port` (plain HTTP)
pub async fn run_health_server(state: Arc<HealthState>, port: u16) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "Starting health server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
