//! Admin endpoints, mounted behind `auth::admin_auth_middleware`.

use axum::extract::State;
use axum::response::Json;

use monkeybadge_core::badge::BadgeDocument;
use monkeybadge_core::wire::{IntroSwitchResponse, MonkeyModeRequest};

use crate::error::AppError;
use crate::game;
use crate::state::AppState;

/// POST /start_the_intro — flip the global intro switch.
pub async fn start_the_intro(State(state): State<AppState>) -> Json<IntroSwitchResponse> {
    let mut store = state.store.write().await;
    Json(IntroSwitchResponse {
        intro_started: game::toggle_intro(&mut store),
    })
}

/// POST /monkeymode — toggle whether a badge acts as a monkey beacon.
pub async fn monkey_mode(
    State(state): State<AppState>,
    Json(body): Json<MonkeyModeRequest>,
) -> Result<Json<BadgeDocument>, AppError> {
    let mut store = state.store.write().await;
    let doc = game::toggle_monkey(&mut store, &state.config.game, &body.my_uuid, body.monkey_id)?;
    Ok(Json(doc))
}
