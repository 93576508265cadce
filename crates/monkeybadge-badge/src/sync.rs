use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use uuid::Uuid;

use monkeybadge_core::badge::{BadgeDocument, IrId};
use monkeybadge_core::wire::{
    API_KEY_HEADER, BadgeRequest, ChangeHandleRequest, ErrorBody, FriendRequest,
    ObjectClaimRequest, RegisterRequest, endpoints,
};

/// Handle used when neither the badge nor the server can supply one.
pub const FALLBACK_HANDLE: &str = "unnamed_monkey";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// What the server said about one call.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// 200 with the full, updated document.
    Updated(Box<BadgeDocument>),
    /// 208: nothing to do, already the case.
    AlreadyDone,
    /// 404: unknown badge or token mismatch (indistinguishable), or the peer
    /// is not registered yet.
    NotFound,
    /// Any other 4xx. Retrying will not help.
    Rejected { status: u16, reason: String },
}

/// Soft failures: the call may succeed if retried later.
#[derive(Debug)]
pub enum SyncError {
    Transport(String),
    Server(u16),
    Decode(String),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Server(status) => write!(f, "server error: HTTP {status}"),
            Self::Decode(e) => write!(f, "bad response body: {e}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// A server mutation waiting to be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredOp {
    IntroComplete,
    ChangeHandle(String),
    FriendRequest(IrId),
    HiddenObject(IrId),
    MonkeySee(IrId),
}

/// HTTP client for the game server's badge API.
#[derive(Debug, Clone)]
pub struct SyncClient {
    client: reqwest::Client,
    base_url: String,
    registration_key: String,
}

impl SyncClient {
    pub fn new(base_url: &str, registration_key: &str) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("MonkeyBadge/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            registration_key: registration_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post<B: Serialize>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<SyncOutcome, SyncError> {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(token) = token {
            request = request.header(API_KEY_HEADER, token);
        }
        let resp = request.send().await?;
        let status = resp.status();

        match status {
            StatusCode::OK => {
                let doc: BadgeDocument = resp
                    .json()
                    .await
                    .map_err(|e| SyncError::Decode(e.to_string()))?;
                Ok(SyncOutcome::Updated(Box::new(doc)))
            },
            StatusCode::ALREADY_REPORTED => Ok(SyncOutcome::AlreadyDone),
            StatusCode::NOT_FOUND => Ok(SyncOutcome::NotFound),
            s if s.is_client_error() => {
                let reason = resp
                    .json::<ErrorBody>()
                    .await
                    .map(|b| b.error)
                    .unwrap_or_else(|_| s.to_string());
                Ok(SyncOutcome::Rejected {
                    status: s.as_u16(),
                    reason,
                })
            },
            s => Err(SyncError::Server(s.as_u16())),
        }
    }

    /// GET /generate_handle.
    pub async fn generate_handle(&self) -> Result<String, SyncError> {
        let resp = self
            .client
            .get(self.url(endpoints::GENERATE_HANDLE))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(SyncError::Server(resp.status().as_u16()));
        }
        let handle: String = resp
            .json()
            .await
            .map_err(|e| SyncError::Decode(e.to_string()))?;
        Ok(handle.trim_matches('"').to_string())
    }

    /// POST /register. Without a preferred handle the server picks one, and
    /// if even that fails the badge goes by [`FALLBACK_HANDLE`]. `token` is
    /// only passed when re-registering after the server lost the document.
    pub async fn register(
        &self,
        uuid: Uuid,
        handle: Option<&str>,
        token: Option<&str>,
    ) -> Result<SyncOutcome, SyncError> {
        let handle = match handle {
            Some(h) => h.to_string(),
            None => match self.generate_handle().await {
                Ok(h) if !h.is_empty() => h,
                Ok(_) => FALLBACK_HANDLE.to_string(),
                Err(e) => {
                    tracing::warn!(error = %e, "Handle generation failed, using fallback");
                    FALLBACK_HANDLE.to_string()
                },
            },
        };
        let body = RegisterRequest {
            my_uuid: uuid,
            key: self.registration_key.clone(),
            handle,
            token: token.map(str::to_string),
        };
        self.post(endpoints::REGISTER, None, &body).await
    }

    /// POST /checkin. If the server no longer knows the badge, register again
    /// with the same token and handle.
    pub async fn checkin(
        &self,
        uuid: Uuid,
        token: &str,
        handle: Option<&str>,
    ) -> Result<SyncOutcome, SyncError> {
        let outcome = self
            .post(endpoints::CHECKIN, Some(token), &BadgeRequest { my_uuid: uuid })
            .await?;
        if outcome == SyncOutcome::NotFound {
            tracing::info!(%uuid, "Server lost this badge, re-registering");
            return self.register(uuid, handle, Some(token)).await;
        }
        Ok(outcome)
    }

    pub async fn intro_complete(&self, uuid: Uuid, token: &str) -> Result<SyncOutcome, SyncError> {
        self.post(endpoints::INTRO_COMPLETE, Some(token), &BadgeRequest { my_uuid: uuid })
            .await
    }

    pub async fn change_handle(
        &self,
        uuid: Uuid,
        token: &str,
        handle: &str,
    ) -> Result<SyncOutcome, SyncError> {
        let body = ChangeHandleRequest {
            my_uuid: uuid,
            handle: handle.to_string(),
        };
        self.post(endpoints::CHANGE_HANDLE, Some(token), &body).await
    }

    pub async fn friend_request(
        &self,
        uuid: Uuid,
        token: &str,
        remote_ir_id: IrId,
    ) -> Result<SyncOutcome, SyncError> {
        let body = FriendRequest {
            my_uuid: uuid,
            remote_ir_id,
        };
        self.post(endpoints::FRIEND_REQUEST, Some(token), &body).await
    }

    pub async fn hidden_object(
        &self,
        uuid: Uuid,
        token: &str,
        object_id: IrId,
    ) -> Result<SyncOutcome, SyncError> {
        let body = ObjectClaimRequest {
            my_uuid: uuid,
            object_id,
        };
        self.post(endpoints::HIDDEN_OBJECT, Some(token), &body).await
    }

    pub async fn monkey_see(
        &self,
        uuid: Uuid,
        token: &str,
        beacon_id: IrId,
    ) -> Result<SyncOutcome, SyncError> {
        let body = ObjectClaimRequest {
            my_uuid: uuid,
            object_id: beacon_id,
        };
        self.post(endpoints::MONKEY_SEE, Some(token), &body).await
    }

    pub async fn delete_badge(&self, uuid: Uuid, token: &str) -> Result<SyncOutcome, SyncError> {
        self.post(endpoints::DELETE_BADGE, Some(token), &BadgeRequest { my_uuid: uuid })
            .await
    }

    /// Deliver one queued mutation.
    pub async fn perform(
        &self,
        op: &DeferredOp,
        uuid: Uuid,
        token: &str,
    ) -> Result<SyncOutcome, SyncError> {
        match op {
            DeferredOp::IntroComplete => self.intro_complete(uuid, token).await,
            DeferredOp::ChangeHandle(handle) => self.change_handle(uuid, token, handle).await,
            DeferredOp::FriendRequest(ir_id) => self.friend_request(uuid, token, *ir_id).await,
            DeferredOp::HiddenObject(id) => self.hidden_object(uuid, token, *id).await,
            DeferredOp::MonkeySee(id) => self.monkey_see(uuid, token, *id).await,
        }
    }
}
