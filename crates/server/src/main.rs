//! Showcase server entry point.

use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, middleware, routing::get};
use showcase_api::{AppState, auth_middleware, router as api_router};
use showcase_common::Config;
use showcase_core::{ListingCache, SessionService, SubmissionService, VotingService};
use showcase_forum::{HttpForumClient, SharedGateway};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "showcase=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting showcase server...");

    // Load configuration
    let config = Config::load()?;

    // One gateway for the whole process; callers' tokens travel per request.
    let gateway: SharedGateway = Arc::new(HttpForumClient::new(&config.forum)?);
    info!(base_url = %config.forum.base_url, "Forum gateway ready");

    let listing_cache = ListingCache::new(Duration::from_secs(
        config.showcase.listing_cache_ttl_secs,
    ));

    let state = AppState {
        submission_service: SubmissionService::new(
            Arc::clone(&gateway),
            &config,
            listing_cache.clone(),
        ),
        voting_service: VotingService::new(
            Arc::clone(&gateway),
            config.showcase.max_pages,
            listing_cache,
        ),
        session_service: SessionService::new(gateway, config.showcase.admin_role.clone()),
        session_config: config.session.clone(),
    };

    // Build router
    let app = Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    info!(addr = %listener.local_addr()?, public_url = %config.server.public_url, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
