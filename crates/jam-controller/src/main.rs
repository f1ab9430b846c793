//! Jam Controller
//!
//! Stateful WebSocket presence server for live jam sessions.
//!
//! # Servers
//!
//! The Jam Controller runs two listeners:
//! - HTTP server for the session API, WebSocket gateway, and health
//!   endpoints (default: 0.0.0.0:8080)
//! - HTTP server for Prometheus metrics (default: 0.0.0.0:9090)
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize Prometheus metrics recorder
//! 3. Connect to Postgres and run migrations
//! 4. Initialize actor system (`RegistryHandle`)
//! 5. Start metrics and application HTTP servers
//! 6. Wait for shutdown signal

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use jam_controller::actors::RegistryHandle;
use jam_controller::config::Config;
use jam_controller::observability::{health_router, HealthState};
use jam_controller::routes::{build_routes, AppState};
use jam_controller::store::{PgSessionStore, SessionStore};
use metrics_exporter_prometheus::PrometheusBuilder;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jam_controller=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Jam Controller");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        jc_id = %config.jc_id,
        http_bind_address = %config.http_bind_address,
        metrics_bind_address = %config.metrics_bind_address,
        store_timeout_seconds = config.store_timeout_seconds,
        "Configuration loaded successfully"
    );

    // Initialize Prometheus metrics recorder before any metrics are recorded
    let prometheus_handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        format!("Failed to install Prometheus metrics recorder: {e}")
    })?;

    // Initialize health state
    let health_state = Arc::new(HealthState::new());

    // Connect to Postgres and run migrations
    info!("Connecting to Postgres...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(config.database_url.expose_secret())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to connect to Postgres");
            e
        })?;
    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        error!(error = %e, "Failed to run migrations");
        e
    })?;
    info!("Postgres connection established");

    let store: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(pool));

    // Initialize actor system
    let registry = RegistryHandle::new(Arc::clone(&store), config.store_timeout());
    info!("Actor system initialized");

    // Metrics server on its own listener
    let metrics_addr: SocketAddr = config.metrics_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.metrics_bind_address, "Invalid metrics bind address");
        format!("Invalid metrics bind address: {e}")
    })?;
    let metrics_app = Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = prometheus_handle.clone();
            async move { handle.render() }
        }),
    );
    let metrics_listener = tokio::net::TcpListener::bind(metrics_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %metrics_addr, "Failed to bind metrics server");
            format!("Failed to bind metrics server to {metrics_addr}: {e}")
        })?;
    tokio::spawn(async move {
        info!(addr = %metrics_addr, "Metrics server starting");
        if let Err(e) = axum::serve(metrics_listener, metrics_app).await {
            error!(error = %e, "Metrics server failed");
        }
    });

    // Application server: session API + WebSocket gateway + health probes
    let state = AppState {
        registry: registry.clone(),
        store,
        config: Arc::new(config.clone()),
    };
    let app = build_routes(state).merge(health_router(Arc::clone(&health_state)));

    let http_addr: SocketAddr = config.http_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.http_bind_address, "Invalid HTTP bind address");
        format!("Invalid HTTP bind address: {e}")
    })?;

    // Bind before marking ready to fail fast on bind errors
    let listener = tokio::net::TcpListener::bind(http_addr).await.map_err(|e| {
        error!(error = %e, addr = %http_addr, "Failed to bind HTTP server");
        format!("Failed to bind HTTP server to {http_addr}: {e}")
    })?;
    info!(addr = %http_addr, "HTTP server bound successfully");
    health_state.set_ready();

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

    info!("Jam Controller running - press Ctrl+C to shutdown");
    server.await.map_err(|e| {
        error!(error = %e, "HTTP server failed");
        e
    })?;

    // Mark as not ready immediately so the orchestrator stops sending
    // traffic, then let the actor tree drain.
    info!("Shutdown signal received, initiating graceful shutdown...");
    health_state.set_not_ready();
    registry.cancel();
    tokio::time::sleep(Duration::from_secs(2)).await;

    info!("Jam Controller shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. This is acceptable because
/// without signal handlers, we cannot gracefully shut down the service.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
