use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use monkeybadge_core::wire::{ADMIN_KEY_HEADER, API_KEY_HEADER};

use crate::error::AppError;
use crate::state::AppState;

/// Shared secrets, copied out of the config at startup.
#[derive(Clone)]
pub struct AuthConfig {
    pub registration_key: String,
    /// None = admin endpoints reject every request.
    pub admin_secret: Option<String>,
}

/// Pull the badge token from `X-API-Key`. Whether it matches is decided by
/// the game layer, which answers a mismatch with 404.
pub fn badge_token(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Unauthorized(format!("missing {API_KEY_HEADER} header")))
}

/// Compare two secrets without an early exit on the first differing byte.
pub fn secrets_match(provided: &str, expected: &str) -> bool {
    let (a, b) = (provided.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Axum middleware guarding the admin routes with `X-Admin-Key`.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.auth.admin_secret.as_deref() else {
        tracing::warn!(path = %request.uri().path(), "admin request with admin disabled");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let provided = request
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if secrets_match(key, expected) => {},
        _ => {
            tracing::warn!(path = %request.uri().path(), "rejected admin request");
            return Err(StatusCode::UNAUTHORIZED);
        },
    }

    Ok(next.run(request).await)
}
