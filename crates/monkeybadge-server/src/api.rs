use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;

use monkeybadge_core::badge::BadgeDocument;
use monkeybadge_core::wire::{
    BadgeRequest, ChangeHandleRequest, FriendRequest, ObjectClaimRequest, RegisterRequest,
};

use crate::auth::badge_token;
use crate::error::AppError;
use crate::game;
use crate::handle::generate_handle;
use crate::state::AppState;

type DocumentResult = Result<Json<BadgeDocument>, AppError>;

/// POST /register — create a badge document and issue its token and IR_ID.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> DocumentResult {
    let mut store = state.store.write().await;
    let doc = {
        let mut rng = rand::rng();
        game::register(
            &mut store,
            &state.config.game,
            &state.auth.registration_key,
            body,
            &mut rng,
        )?
    };
    Ok(Json(doc))
}

/// POST /checkin
pub async fn checkin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<BadgeRequest>,
) -> DocumentResult {
    let token = badge_token(&headers)?;
    let mut store = state.store.write().await;
    Ok(Json(game::checkin(&mut store, &body.my_uuid, &token)?))
}

/// POST /introcomplete
pub async fn intro_complete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<BadgeRequest>,
) -> DocumentResult {
    let token = badge_token(&headers)?;
    let mut store = state.store.write().await;
    let doc = game::intro_complete(&mut store, &state.config.game, &body.my_uuid, &token)?;
    Ok(Json(doc))
}

/// POST /changehandle
pub async fn change_handle(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ChangeHandleRequest>,
) -> DocumentResult {
    let token = badge_token(&headers)?;
    let mut store = state.store.write().await;
    Ok(Json(game::change_handle(
        &mut store,
        &body.my_uuid,
        &token,
        body.handle,
    )?))
}

/// POST /deletebadge — returns the final document of the removed badge.
pub async fn delete_badge(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<BadgeRequest>,
) -> DocumentResult {
    let token = badge_token(&headers)?;
    let mut store = state.store.write().await;
    Ok(Json(game::delete_badge(&mut store, &body.my_uuid, &token)?))
}

/// POST /friendrequest
pub async fn friend_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<FriendRequest>,
) -> DocumentResult {
    let token = badge_token(&headers)?;
    let mut store = state.store.write().await;
    let doc = game::friend_request(
        &mut store,
        &state.config.game,
        &body.my_uuid,
        &token,
        body.remote_ir_id,
    )?;
    Ok(Json(doc))
}

/// POST /hiddenobject
pub async fn hidden_object(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ObjectClaimRequest>,
) -> DocumentResult {
    let token = badge_token(&headers)?;
    let mut store = state.store.write().await;
    let doc = game::claim_hidden_object(
        &mut store,
        &state.config.game,
        &body.my_uuid,
        &token,
        body.object_id,
    )?;
    Ok(Json(doc))
}

/// POST /monkeysee
pub async fn monkey_see(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ObjectClaimRequest>,
) -> DocumentResult {
    let token = badge_token(&headers)?;
    let mut store = state.store.write().await;
    let doc = game::claim_beacon(
        &mut store,
        &state.config.game,
        &body.my_uuid,
        &token,
        body.object_id,
    )?;
    Ok(Json(doc))
}

/// GET /generate_handle
pub async fn generate_handle_endpoint() -> Json<String> {
    Json(generate_handle(&mut rand::rng()))
}
