pub mod admin;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod game;
pub mod handle;
pub mod health;
pub mod scoreboard;
pub mod state;
pub mod store;

use std::path::PathBuf;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use monkeybadge_core::wire::endpoints;

use config::ServerConfig;
use state::AppState;
use store::{BadgeStore, StoreError};

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    build_app_with_store(config, BadgeStore::new())
}

/// Same as `build_app`, around an already loaded store.
pub fn build_app_with_store(config: ServerConfig, store: BadgeStore) -> (Router<()>, AppState) {
    let max_body = config.limits.max_body_bytes;
    let state = AppState::with_store(config, store);

    // Badge routes authenticate per request with the X-API-Key token
    let badge_routes = Router::new()
        .route(endpoints::REGISTER, post(api::register))
        .route(endpoints::CHECKIN, post(api::checkin))
        .route(endpoints::CHANGE_HANDLE, post(api::change_handle))
        .route(endpoints::INTRO_COMPLETE, post(api::intro_complete))
        .route(endpoints::DELETE_BADGE, post(api::delete_badge))
        .route(endpoints::FRIEND_REQUEST, post(api::friend_request))
        .route(endpoints::HIDDEN_OBJECT, post(api::hidden_object))
        .route(endpoints::MONKEY_SEE, post(api::monkey_see))
        .route(
            endpoints::GENERATE_HANDLE,
            get(api::generate_handle_endpoint),
        );

    let admin_routes = Router::new()
        .route(endpoints::START_THE_INTRO, post(admin::start_the_intro))
        .route(endpoints::MONKEY_MODE, post(admin::monkey_mode))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::admin_auth_middleware,
        ));

    // Read-only views, open to the scoreboard page from any origin
    let public_routes = Router::new()
        .route(endpoints::SCOREBOARD, get(scoreboard::scoreboard))
        .route(endpoints::HEALTH, get(health::health_check))
        .layer(CorsLayer::permissive());

    let app = Router::new()
        .merge(badge_routes)
        .merge(admin_routes)
        .merge(public_routes)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    (app, state)
}

/// Write the store to the configured snapshot path, if any.
pub async fn save_snapshot(state: &AppState) -> Result<(), StoreError> {
    let Some(path) = state.config.store.snapshot_path.as_deref() else {
        return Ok(());
    };
    let path = PathBuf::from(path);
    let bytes = {
        let store = state.store.read().await;
        store.to_snapshot()?
    };
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| StoreError::Io(e.to_string()))?;
    tokio::fs::rename(&tmp, &path)
        .await
        .map_err(|e| StoreError::Io(e.to_string()))
}

/// Background task that snapshots the store every `snapshot_interval_secs`.
/// Does nothing when no snapshot path is configured.
pub fn spawn_snapshot_writer(state: AppState) {
    if state.config.store.snapshot_path.is_none() {
        return;
    }
    let period = Duration::from_secs(state.config.store.snapshot_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // First tick fires immediately; nothing has changed yet
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match save_snapshot(&state).await {
                Ok(()) => tracing::debug!("Store snapshot written"),
                Err(e) => tracing::warn!(error = %e, "Failed to write store snapshot"),
            }
        }
    });
}
