use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::AppState;

use super::handlers;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/board", get(handlers::get_board))
        .route("/api/status", get(handlers::get_status))
        .route("/api/healthz", get(handlers::healthz))
        .route("/api/config", get(handlers::get_config))
        .route("/api/debug/feed/{kind}", get(handlers::debug_feed))
        // Board front-ends are served from elsewhere
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the axum web server on the configured bind address.
pub async fn run(state: Arc<AppState>) {
    let bind = state.config.web.bind.clone();
    let app = router(Arc::clone(&state));

    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(l) => {
            info!("[WEB] Server listening on http://{}", bind);
            l
        }
        Err(e) => {
            tracing::error!("[WEB] Failed to bind {}: {}", bind, e);
            return;
        }
    };

    let shutdown = state.shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .ok();

    info!("[WEB] Server stopped");
}
