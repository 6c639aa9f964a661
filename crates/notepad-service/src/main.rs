//! Notepad Service
//!
//! Entry point for the shared notepad session coordinator.

use notepad_service::config::Config;
use notepad_service::observability::metrics::init_metrics_recorder;
use notepad_service::repositories::{self, RedisRoomMetadataStore, RedisSessionCounter};
use notepad_service::routes::{self, AppState};
use notepad_service::services::{HostRegistry, RemotePadClient, SessionCoordinator};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting Notepad Service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        pad_hosts = config.pad_hosts.len(),
        pad_api_version = %config.pad_api_version,
        "Configuration loaded successfully"
    );

    if config.pad_hosts.is_empty() {
        warn!("No pad hosts configured; session creation will fail until NOTEPAD_HOSTS is set");
    }

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    info!("Connecting to Redis...");
    let connection = repositories::connect(&config.redis_url, config.store_timeout)
        .await
        .map_err(|e| {
            error!("Failed to connect to Redis: {}", e);
            e
        })?;
    info!("Redis connection established");

    let counter = Arc::new(RedisSessionCounter::new(
        connection.clone(),
        config.active_session_key_prefix.clone(),
        config.store_timeout,
    ));
    let metadata = Arc::new(RedisRoomMetadataStore::new(
        connection,
        config.room_metadata_key_prefix.clone(),
        config.store_timeout,
    ));
    let pad_client = Arc::new(RemotePadClient::new(
        config.pad_api_version.clone(),
        config.request_timeout,
    )?);

    let coordinator = SessionCoordinator::new(
        HostRegistry::new(config.pad_hosts.clone()),
        pad_client,
        counter.clone(),
        metadata,
    );

    let state = Arc::new(AppState {
        coordinator: Arc::new(coordinator),
        store_health: counter,
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Notepad Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.drain_seconds))
        .await?;

    info!("Notepad Service shutdown complete");

    Ok(())
}

/// JSON output when `LOG_FORMAT=json`, human-readable otherwise.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "notepad_service=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and the drain period is over.
async fn shutdown_signal(drain_secs: u64) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (NOTEPAD_DRAIN_SECONDS=0)");
    }
}
