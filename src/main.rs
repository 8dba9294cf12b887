mod config;
mod display;
mod models;
mod transit;
mod updater;
mod web;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use config::Config;
use display::board::{BoardRenderer, SnapshotRenderer};
use transit::client::FeedClient;
use updater::UpdateLoop;

/// Shared application state.
pub struct AppState {
    pub config: Arc<Config>,
    pub config_path: Option<PathBuf>,
    pub board: Arc<SnapshotRenderer>,
    pub updater: Arc<UpdateLoop<FeedClient>>,
    pub shutdown: CancellationToken,
}

#[tokio::main]
async fn main() {
    // Initialize tracing (structured logging)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ctrain_board=info")),
        )
        .init();

    info!("CTrain departure board starting");

    let config_path = find_config_path();
    let config = match config_path {
        Some(ref path) => match Config::load(path) {
            Ok(cfg) => {
                info!("Config file: {}", path.display());
                cfg
            }
            Err(e) => {
                error!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => {
            info!("No config.json found, using built-in City Hall settings");
            Config::builtin()
        }
    };
    info!(
        "Watching west stops [{}], east stops [{}], {} route rules, every {}s",
        config.stops.west.join(","),
        config.stops.east.join(","),
        config.routes.len(),
        config.refresh.poll_interval
    );

    let client = match FeedClient::new(config.feeds.clone()) {
        Ok(c) => c,
        Err(e) => {
            error!("[FEED] {}", e);
            std::process::exit(1);
        }
    };

    let board = Arc::new(SnapshotRenderer::new());
    let renderer: Arc<dyn BoardRenderer> = board.clone();
    let updater = Arc::new(UpdateLoop::new(&config, client, Some(renderer)));

    let state = Arc::new(AppState {
        config: Arc::new(config),
        config_path,
        board,
        updater: Arc::clone(&updater),
        shutdown: CancellationToken::new(),
    });

    // Spawn update loop
    let loop_handle = tokio::spawn(updater.run(state.shutdown.clone()));

    // Spawn web server task
    let web_state = Arc::clone(&state);
    let web_handle = tokio::spawn(web::server::run(web_state));

    info!("All tasks started");

    // Wait for shutdown signal
    shutdown_signal().await;
    info!("Shutdown signal received");

    state.shutdown.cancel();

    let _ = loop_handle.await;
    let _ = web_handle.await;

    info!("Shutdown complete");
}

/// Find the config.json file (check CWD, then parent directory).
fn find_config_path() -> Option<PathBuf> {
    let candidates = [
        PathBuf::from("config.json"),
        PathBuf::from("../config.json"),
    ];
    candidates.into_iter().find(|path| path.exists())
}

/// Wait for SIGTERM or SIGINT (Ctrl-C).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
