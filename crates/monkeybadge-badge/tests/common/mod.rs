use std::net::SocketAddr;
use std::time::{Duration, Instant};

use monkeybadge_core::badge::BadgeDocument;

use monkeybadge_badge::agent::Agent;
use monkeybadge_badge::cache::MemoryCache;
use monkeybadge_badge::config::TimingConfig;
use monkeybadge_badge::display::BufferDisplay;
use monkeybadge_badge::sync::SyncClient;

use monkeybadge_server::build_app;
use monkeybadge_server::config::{DEV_REGISTRATION_KEY, ServerConfig};
use monkeybadge_server::state::AppState;

pub type TestAgent = Agent<BufferDisplay, MemoryCache>;

/// An in-process game server on an ephemeral port.
pub struct GameServer {
    pub addr: SocketAddr,
    pub state: AppState,
    _task: tokio::task::JoinHandle<()>,
}

impl GameServer {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, state) = build_app(ServerConfig::default());
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            state,
            _task: task,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self) -> SyncClient {
        SyncClient::new(&self.base_url(), DEV_REGISTRATION_KEY).unwrap()
    }

    pub async fn start_intro(&self) {
        self.state.store.write().await.set_intro_started(true);
    }

    /// The server's copy of a badge document.
    pub async fn document(&self, uuid: &uuid::Uuid) -> Option<BadgeDocument> {
        self.state.store.read().await.get(uuid).cloned()
    }

    /// Overwrite a document as an operator would.
    pub async fn edit(&self, uuid: &uuid::Uuid, f: impl FnOnce(&mut BadgeDocument)) {
        let mut store = self.state.store.write().await;
        let mut doc = store.get(uuid).cloned().unwrap();
        f(&mut doc);
        store.commit([doc]);
    }

    /// Simulate the server losing a badge.
    pub async fn forget(&self, uuid: &uuid::Uuid) {
        self.state.store.write().await.remove(uuid);
    }
}

pub fn agent(handle: Option<&str>) -> TestAgent {
    Agent::new(
        TimingConfig::default(),
        handle.map(str::to_string),
        BufferDisplay::new(),
        MemoryCache::new(),
    )
}

/// Register an agent with the server through its first sync.
pub async fn registered_agent(client: &SyncClient, handle: &str) -> TestAgent {
    let mut a = agent(Some(handle));
    a.sync(client, Instant::now()).await;
    assert!(a.document().is_some(), "registration failed for {handle}");
    a
}

/// Move every frame queued on `from` across the IR medium to `to`, the way
/// the transceiver would: each byte tagged with the sender's address.
pub fn beam(from: &mut TestAgent, to: &mut TestAgent, at: Instant) {
    let sender = from.own_address().unwrap();
    for frame in from.take_outbox() {
        for byte in frame {
            to.on_ir_byte(sender, byte, at);
        }
    }
}
