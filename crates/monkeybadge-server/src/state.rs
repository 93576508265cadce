use std::sync::Arc;
use tokio::sync::RwLock;

use crate::auth::AuthConfig;
use crate::config::ServerConfig;
use crate::store::BadgeStore;

pub type SharedBadgeStore = Arc<RwLock<BadgeStore>>;

#[derive(Clone)]
pub struct AppState {
    pub store: SharedBadgeStore,
    pub auth: AuthConfig,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_store(config, BadgeStore::new())
    }

    /// State around an existing store, e.g. one restored from a snapshot.
    pub fn with_store(config: ServerConfig, store: BadgeStore) -> Self {
        let auth = AuthConfig {
            registration_key: config.auth.registration_key.clone(),
            admin_secret: config.auth.admin_secret.clone(),
        };
        Self {
            store: Arc::new(RwLock::new(store)),
            auth,
            config: Arc::new(config),
        }
    }
}
