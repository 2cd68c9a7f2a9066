use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::SigningKey;
use crate::config::{AppConfig, Environment};
use crate::graph::GraphStore;
use crate::handlers::AppState;
use crate::routes::app;
use crate::store;

/// Build the process-wide signing key from configuration
pub fn signing_key(config: &AppConfig) -> anyhow::Result<Arc<SigningKey>> {
    let key = SigningKey::from_secret(config.security.jwt_secret.as_bytes()).context("JWT_SECRET must be set")?;
    Ok(Arc::new(key))
}

/// Run the HTTP server until ctrl-c
pub async fn serve(config: &AppConfig, port: Option<u16>) -> anyhow::Result<()> {
    config.validate()?;
    let key = signing_key(config)?;
    let store = store::connect(&config.store).await.context("failed to open document store")?;
    let state = AppState::new(store, key, config);
    if config.environment == Environment::Development {
        tracing::warn!("Running with development defaults");
    }

    // Settle anything a previous process left half-written
    let grace = config.store.sweep_grace();
    match state.graph.sweep_pending(grace, Utc::now()).await {
        Ok(report) => tracing::info!("Startup sweep: {}", report),
        Err(e) => tracing::warn!("Startup sweep failed: {}", e),
    }

    if config.store.sweep_interval_secs > 0 {
        spawn_sweeper(
            state.graph.clone(),
            grace,
            Duration::from_secs(config.store.sweep_interval_secs),
        );
    }

    let router = app(state, &config.server);
    let bind_addr = format!("0.0.0.0:{}", port.unwrap_or(config.server.port));
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Traceability API listening on http://{}", bind_addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

fn spawn_sweeper(graph: GraphStore, grace: chrono::Duration, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately and the startup sweep already ran
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = graph.sweep_pending(grace, Utc::now()).await {
                tracing::warn!("Background sweep failed: {}", e);
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
