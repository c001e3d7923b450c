//! image-mutator - A Kubernetes mutating admission webhook for pod images.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Reads configuration from the environment
//! - Starts the health server and the TLS webhook server

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info};

use image_mutator::health::{HealthState, run_health_server};
use image_mutator::{WebhookConfig, WebhookState, dispatcher_from_config, run_webhook_server};

/// Grace period for in-flight admissions to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 2;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("image_mutator=info".parse()?),
        )
        .json()
        .init();

    // Both ring and aws-lc may be compiled in; pick one explicitly
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    info!("Starting image-mutator");

    let config = WebhookConfig::from_env()?;
    info!(
        policy = %config.policy,
        registry = %config.registry.registry,
        webhook_port = config.webhook_port,
        health_port = config.health_port,
        "Configuration loaded"
    );

    let health_state = Arc::new(HealthState::new());
    let webhook_state = Arc::new(WebhookState::new(
        dispatcher_from_config(&config),
        health_state.clone(),
    ));

    let health_handle = {
        let health_state = health_state.clone();
        let port = config.health_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, port).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let webhook_handle = {
        let tls = config.tls.clone();
        let port = config.webhook_port;
        tokio::spawn(
            async move { run_webhook_server(webhook_state, &tls.cert, &tls.key, port).await },
        )
    };

    tokio::select! {
        result = webhook_handle => {
            // A webhook that cannot serve is fatal; exit non-zero
            match result {
                Ok(Ok(())) => error!("Webhook server stopped unexpectedly"),
                Ok(Err(e)) => {
                    error!("Webhook server error: {}", e);
                    return Err(e.into());
                }
                Err(e) => {
                    error!("Webhook server task panicked: {}", e);
                    return Err(e.into());
                }
            }
            return Err("webhook server stopped".into());
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            health_state.set_ready(false).await;
            info!("Marked webhook as not ready");

            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;
            info!("Grace period complete, shutting down");
        }
    }

    info!("image-mutator stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the webhook cannot shut down
/// gracefully without them. Using expect() here is intentional.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
