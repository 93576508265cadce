use std::net::SocketAddr;
use std::time::Duration;

use serde_json::{Value, json};
use uuid::Uuid;

use monkeybadge_core::badge::BadgeDocument;
use monkeybadge_core::wire::{ADMIN_KEY_HEADER, API_KEY_HEADER, endpoints};

use monkeybadge_server::build_app;
use monkeybadge_server::config::{AuthFileConfig, DEV_REGISTRATION_KEY, ServerConfig};

pub const ADMIN_SECRET: &str = "test-admin-secret";

pub struct TestServer {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with the dev registration key and an admin secret.
    pub async fn new() -> Self {
        let config = ServerConfig {
            auth: AuthFileConfig {
                registration_key: DEV_REGISTRATION_KEY.to_string(),
                admin_secret: Some(ADMIN_SECRET.to_string()),
            },
            ..ServerConfig::default()
        };
        Self::from_config(config).await
    }

    /// Start a test server with admin endpoints disabled.
    pub async fn without_admin() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(config);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            client: reqwest::Client::new(),
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url())
    }

    /// POST a JSON body with a badge token, returning status and parsed body.
    pub async fn post_badge(&self, path: &str, token: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .header(API_KEY_HEADER, token)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    /// POST a JSON body with the admin secret.
    pub async fn post_admin(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .header(ADMIN_KEY_HEADER, ADMIN_SECRET)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    pub async fn register(&self, handle: &str) -> BadgeDocument {
        let resp = self
            .client
            .post(self.url(endpoints::REGISTER))
            .json(&json!({
                "myUUID": Uuid::new_v4(),
                "key": DEV_REGISTRATION_KEY,
                "handle": handle,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200, "register {handle}");
        resp.json().await.unwrap()
    }

    pub async fn start_intro(&self) {
        let (status, body) = self.post_admin(endpoints::START_THE_INTRO, json!({})).await;
        assert_eq!(status, 200);
        assert_eq!(body["intro_started"], true);
    }

    /// Register a badge and finish its intro. Requires the intro switch on.
    pub async fn register_past_intro(&self, handle: &str) -> BadgeDocument {
        let doc = self.register(handle).await;
        let (status, body) = self
            .post_badge(
                endpoints::INTRO_COMPLETE,
                &doc.token,
                json!({ "myUUID": doc.uuid }),
            )
            .await;
        assert_eq!(status, 200);
        serde_json::from_value(body).unwrap()
    }

    pub async fn friend(&self, doc: &BadgeDocument, remote: u16) -> (u16, Value) {
        self.post_badge(
            endpoints::FRIEND_REQUEST,
            &doc.token,
            json!({ "myUUID": doc.uuid, "remoteIRID": remote }),
        )
        .await
    }

    pub async fn checkin(&self, doc: &BadgeDocument) -> (u16, Value) {
        self.post_badge(endpoints::CHECKIN, &doc.token, json!({ "myUUID": doc.uuid }))
            .await
    }
}
