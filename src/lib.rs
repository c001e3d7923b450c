//! image-mutator library crate
//!
//! A Kubernetes mutating admission webhook that rewrites pod container
//! images. This module exports the configuration, the admission pipeline and
//! the health/metrics server.

pub mod config;
pub mod health;
pub mod webhooks;

pub use config::{PolicyKind, RegistryConfig, WebhookConfig};
pub use health::HealthState;
pub use webhooks::{
    AdmissionDispatcher, MutationPolicy, WebhookError, WebhookState, run_webhook_server,
};

/// Build the dispatcher for a parsed configuration
pub fn dispatcher_from_config(config: &WebhookConfig) -> AdmissionDispatcher {
    AdmissionDispatcher::new(MutationPolicy::from_config(
        config.policy,
        &config.registry,
    ))
}
