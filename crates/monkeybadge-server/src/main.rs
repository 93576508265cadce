use std::path::Path;

use tracing_subscriber::EnvFilter;

use monkeybadge_server::config::ServerConfig;
use monkeybadge_server::store::BadgeStore;
use monkeybadge_server::{build_app_with_store, save_snapshot, spawn_snapshot_writer};

#[tokio::main]
async fn main() {
    if std::env::var_os("MONKEYBADGE_LOG_JSON").is_some() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    }

    let config = ServerConfig::load();
    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    let store = match config.store.snapshot_path.as_deref() {
        Some(path) => match BadgeStore::load_from(Path::new(path)) {
            Ok(store) => {
                tracing::info!(path, badges = store.len(), "Restored badge store");
                store
            },
            Err(e) => {
                tracing::error!(path, error = %e, "Failed to load badge store snapshot");
                std::process::exit(1);
            },
        },
        None => BadgeStore::new(),
    };

    let listen_addr = config.listen_addr.clone();
    let (app, state) = build_app_with_store(config, store);
    spawn_snapshot_writer(state.clone());

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %listen_addr, "Failed to bind: {e}");
            std::process::exit(1);
        },
    };
    tracing::info!("MonkeyBadge server listening on {listen_addr}");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        tracing::error!("Server error: {e}");
    }

    if let Err(e) = save_snapshot(&state).await {
        tracing::error!(error = %e, "Failed to write final store snapshot");
    }
}
