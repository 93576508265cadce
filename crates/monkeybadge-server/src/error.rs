use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use monkeybadge_core::wire::{AlreadyDoneBody, ErrorBody};

use crate::game::GameError;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Unauthorized(String),
    /// The mutation was already applied; reported as 208 so badges treat it
    /// as success.
    AlreadyDone(String),
    Internal(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(m)
            | Self::NotFound(m)
            | Self::Unauthorized(m)
            | Self::AlreadyDone(m)
            | Self::Internal(m) => write!(f, "{m}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::AlreadyDone(detail) => {
                return (StatusCode::ALREADY_REPORTED, Json(AlreadyDoneBody { detail }))
                    .into_response();
            },
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            Self::NotFound(m) => (StatusCode::NOT_FOUND, m),
            Self::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m),
            Self::Internal(m) => {
                tracing::error!(error = %m, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, m)
            },
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<GameError> for AppError {
    fn from(e: GameError) -> Self {
        let message = e.to_string();
        match e {
            GameError::NotFound | GameError::UnknownObject(_) => Self::NotFound(message),
            GameError::AlreadyDone(_) => Self::AlreadyDone(message),
            GameError::Store(_) => Self::Internal(message),
            GameError::InvalidRegistrationKey
            | GameError::InvalidHandle(_)
            | GameError::BadgeExists
            | GameError::DuplicateToken
            | GameError::SelfPairing
            | GameError::IntroNotStarted
            | GameError::ChallengeNotStarted
            | GameError::InvalidMonkeyId => Self::BadRequest(message),
        }
    }
}
