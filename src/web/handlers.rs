use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tracing::info;

use crate::transit::client::{FeedKind, FeedSource};
use crate::transit::clock::{self, to_epoch_secs};
use crate::transit::proto::FeedMessage;
use crate::updater::LoopHealth;
use crate::AppState;

/// GET /api/board: current board snapshot.
pub async fn get_board(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.board.snapshot();
    Json(json!({
        "success": true,
        "board": &*snapshot,
    }))
}

/// GET /api/status: loop health plus what the board is watching.
pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.updater.health();
    let config = &state.config;
    let status = if health.degraded { "degraded" } else { "running" };

    Json(json!({
        "success": true,
        "status": {
            "service": status,
            "stops": {
                "west": config.stops.west,
                "east": config.stops.east,
            },
            "routes": config.routes,
            "poll_interval": config.refresh.poll_interval,
            "health": health,
            "config_file": state.config_path.as_ref().map(|p| p.display().to_string()),
        }
    }))
}

/// GET /api/healthz: liveness based on the last successful cycle.
pub async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.updater.health();
    let report = health_report(&health, clock::local_now(), state.config.refresh.poll_interval);
    let code = if report["ok"].as_bool().unwrap_or(false) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report))
}

/// GET /api/config: effective configuration.
pub async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "config": &*state.config,
    }))
}

/// GET /api/debug/feed/{kind}: fetch one feed now and summarize it.
pub async fn debug_feed(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> impl IntoResponse {
    let kind: FeedKind = match kind.parse() {
        Ok(k) => k,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": e })),
            );
        }
    };

    info!("[WEB] Debug fetch of {}", kind.as_str());
    match state.updater.source().fetch_feed(kind).await {
        Some(feed) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "feed": kind.as_str(),
                "summary": summarize_feed(&feed),
            })),
        ),
        None => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "success": false,
                "feed": kind.as_str(),
                "error": "feed unavailable (see logs)",
            })),
        ),
    }
}

// -- Helper functions --

fn health_report(health: &LoopHealth, now: i64, poll_interval: u64) -> serde_json::Value {
    let age = health.last_success.map(|t| now - t);
    let stale_threshold = i64::try_from(poll_interval.saturating_mul(3)).unwrap_or(i64::MAX);
    let stale = age.map_or(true, |a| a > stale_threshold);

    let reason = if health.degraded {
        Some(format!("{} consecutive failed cycles", health.consecutive_failures))
    } else if stale {
        Some(match age {
            Some(a) => format!("last success {}s ago", a),
            None => "no successful cycle yet".to_string(),
        })
    } else {
        None
    };

    json!({
        "ok": !health.degraded && !stale,
        "age_seconds": age,
        "degraded": health.degraded,
        "consecutive_failures": health.consecutive_failures,
        "reason": reason,
    })
}

fn summarize_feed(feed: &FeedMessage) -> serde_json::Value {
    json!({
        "gtfs_realtime_version": feed.header.gtfs_realtime_version,
        "header_timestamp": to_epoch_secs(feed.header.timestamp),
        "entities": feed.entity.len(),
        "trip_updates": feed.entity.iter().filter(|e| e.trip_update.is_some()).count(),
        "vehicles": feed.entity.iter().filter(|e| e.vehicle.is_some()).count(),
        "alerts": feed.entity.iter().filter(|e| e.alert.is_some()).count(),
    })
}
