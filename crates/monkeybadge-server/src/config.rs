use serde::Deserialize;

use monkeybadge_core::badge::{Beacon, FRIENDS_REQUIRED, HIDDEN_OBJECT_COUNT, IrId};

/// Registration key accepted when none is configured. Only meant for local
/// development; `validate` warns when it is in use.
pub const DEV_REGISTRATION_KEY: &str = "monkeybadge-dev-key";

/// Top-level server configuration, loaded from `monkeybadge.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub auth: AuthFileConfig,
    pub game: GameConfig,
    pub store: StoreConfig,
    pub limits: LimitsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            auth: AuthFileConfig::default(),
            game: GameConfig::default(),
            store: StoreConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

/// Auth section of the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthFileConfig {
    /// Shared key every badge presents at registration.
    pub registration_key: String,
    /// Secret for the admin endpoints. None = admin endpoints disabled.
    pub admin_secret: Option<String>,
}

impl Default for AuthFileConfig {
    fn default() -> Self {
        Self {
            registration_key: DEV_REGISTRATION_KEY.to_string(),
            admin_secret: None,
        }
    }
}

/// Challenge rules: friend threshold and the object ids the physical
/// hidden objects and monkey beacons transmit.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub friends_required: usize,
    /// One id per challenge 2 status slot, in slot order.
    pub hidden_objects: [IrId; HIDDEN_OBJECT_COUNT],
    pub beacons: BeaconIds,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            friends_required: FRIENDS_REQUIRED,
            hidden_objects: [12341, 42342, 52321, 65001, 38913],
            beacons: BeaconIds::default(),
        }
    }
}

impl GameConfig {
    /// Status slot of a hidden object id.
    pub fn hidden_object_slot(&self, object_id: IrId) -> Option<usize> {
        self.hidden_objects.iter().position(|id| *id == object_id)
    }

    /// Ids that must never be handed out as badge IR_IDs.
    pub fn reserved_ir_ids(&self) -> Vec<IrId> {
        let mut ids = self.hidden_objects.to_vec();
        ids.extend(Beacon::ALL.iter().map(|b| self.beacons.id(*b)));
        ids
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BeaconIds {
    pub cans: IrId,
    pub mic: IrId,
    pub shades: IrId,
}

impl Default for BeaconIds {
    fn default() -> Self {
        Self {
            cans: 23101,
            mic: 23102,
            shades: 23103,
        }
    }
}

impl BeaconIds {
    pub fn id(&self, beacon: Beacon) -> IrId {
        match beacon {
            Beacon::Cans => self.cans,
            Beacon::Mic => self.mic,
            Beacon::Shades => self.shades,
        }
    }

    pub fn lookup(&self, object_id: IrId) -> Option<Beacon> {
        Beacon::ALL.into_iter().find(|b| self.id(*b) == object_id)
    }
}

/// Snapshot persistence of the badge store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// MessagePack snapshot file. None = in-memory only.
    pub snapshot_path: Option<String>,
    pub snapshot_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            snapshot_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 16 * 1024,
        }
    }
}

impl ServerConfig {
    /// Check the configuration. Fatal problems are returned as a message;
    /// questionable settings are only logged.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "listen_addr {:?} is not a valid socket address",
                self.listen_addr
            ));
        }
        if self.auth.registration_key.is_empty() {
            return Err("auth.registration_key must not be empty".to_string());
        }
        if self.game.friends_required == 0 {
            return Err("game.friends_required must be > 0".to_string());
        }
        if self.store.snapshot_interval_secs == 0 {
            return Err("store.snapshot_interval_secs must be > 0".to_string());
        }
        if self.limits.max_body_bytes == 0 {
            return Err("limits.max_body_bytes must be > 0".to_string());
        }

        let reserved = self.game.reserved_ir_ids();
        for (i, id) in reserved.iter().enumerate() {
            if *id == 0 {
                return Err("object ids must be non-zero".to_string());
            }
            if reserved[..i].contains(id) {
                return Err(format!("object id {id} is configured twice"));
            }
        }

        if self.auth.registration_key == DEV_REGISTRATION_KEY {
            tracing::warn!(
                "Using the development registration key; set MONKEYBADGE_REGISTRATION_KEY in production"
            );
        }
        if self.auth.admin_secret.is_none() {
            tracing::warn!("No admin secret configured; admin endpoints are disabled");
        }
        if self.store.snapshot_path.is_none() {
            tracing::warn!("No snapshot_path configured; badge state is lost on restart");
        }
        Ok(())
    }

    /// Load config from `monkeybadge.toml` (or `MONKEYBADGE_CONFIG`) if it
    /// exists, then apply env var overrides.
    pub fn load() -> Self {
        let path =
            std::env::var("MONKEYBADGE_CONFIG").unwrap_or_else(|_| "monkeybadge.toml".to_string());
        let mut config = match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!(%path, "Loaded configuration");
                    cfg
                },
                Err(e) => {
                    tracing::warn!(%path, "Failed to parse config: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!(%path, "No config file found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("MONKEYBADGE_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(key) = std::env::var("MONKEYBADGE_REGISTRATION_KEY")
            && !key.is_empty()
        {
            config.auth.registration_key = key;
        }
        if let Ok(secret) = std::env::var("MONKEYBADGE_ADMIN_SECRET")
            && !secret.is_empty()
        {
            config.auth.admin_secret = Some(secret);
        }
        if let Ok(path) = std::env::var("MONKEYBADGE_SNAPSHOT_PATH")
            && !path.is_empty()
        {
            config.store.snapshot_path = Some(path);
        }
        if let Ok(val) = std::env::var("MONKEYBADGE_SNAPSHOT_INTERVAL")
            && let Ok(n) = val.parse::<u64>()
        {
            config.store.snapshot_interval_secs = n;
        }

        config
    }
}
