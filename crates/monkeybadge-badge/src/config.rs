use std::time::Duration;

use serde::Deserialize;

/// Badge configuration, loaded from `badge.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BadgeConfig {
    pub server_url: String,
    pub registration_key: String,
    /// Preferred handle at registration. None = ask the server for one.
    pub handle: Option<String>,
    /// JSON file holding token, uuid and the last good state document.
    pub cache_path: String,
    pub ir: IrConfig,
    pub timing: TimingConfig,
}

impl Default for BadgeConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".to_string(),
            registration_key: "monkeybadge-dev-key".to_string(),
            handle: None,
            cache_path: "badge-cache.json".to_string(),
            ir: IrConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

/// Simulated IR medium: every transmitted byte goes out as a UDP datagram to
/// each peer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IrConfig {
    pub bind_addr: String,
    pub peers: Vec<String>,
}

impl Default for IrConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:47000".to_string(),
            peers: vec!["127.0.0.1:47001".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Control loop tick.
    pub tick_ms: u64,
    pub checkin_period_secs: u64,
    pub pairing_window_secs: u64,
    pub beacon_period_secs: u64,
    /// Seen peers older than this are forgotten.
    pub clean_badge_after_secs: u64,
    pub debounce_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            checkin_period_secs: 60,
            pairing_window_secs: 10,
            beacon_period_secs: 5,
            clean_badge_after_secs: 120,
            debounce_ms: 250,
        }
    }
}

impl TimingConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn checkin_period(&self) -> Duration {
        Duration::from_secs(self.checkin_period_secs)
    }

    pub fn pairing_window(&self) -> Duration {
        Duration::from_secs(self.pairing_window_secs)
    }

    pub fn beacon_period(&self) -> Duration {
        Duration::from_secs(self.beacon_period_secs)
    }

    pub fn clean_badge_after(&self) -> Duration {
        Duration::from_secs(self.clean_badge_after_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl BadgeConfig {
    /// Check the configuration, returning the first fatal problem.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(format!("server_url {:?} is not an http(s) URL", self.server_url));
        }
        if self.ir.bind_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!("ir.bind_addr {:?} is not a socket address", self.ir.bind_addr));
        }
        if let Some(peer) = self
            .ir
            .peers
            .iter()
            .find(|p| p.parse::<std::net::SocketAddr>().is_err())
        {
            return Err(format!("ir peer {peer:?} is not a socket address"));
        }
        if let Some(handle) = &self.handle
            && let Err(e) = monkeybadge_core::badge::validate_handle(handle)
        {
            return Err(format!("handle: {e}"));
        }
        if self.timing.tick_ms == 0 {
            return Err("timing.tick_ms must be > 0".to_string());
        }
        if self.timing.checkin_period_secs == 0 || self.timing.beacon_period_secs == 0 {
            return Err("timing periods must be > 0".to_string());
        }
        if self.ir.peers.is_empty() {
            tracing::warn!("No IR peers configured; transmissions go nowhere");
        }
        Ok(())
    }

    /// Load config from `path` if it exists, then apply env var overrides.
    pub fn load(path: &str) -> Self {
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<BadgeConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!(path, "Loaded badge configuration");
                    cfg
                },
                Err(e) => {
                    tracing::warn!(path, "Failed to parse badge config: {e}, using defaults");
                    BadgeConfig::default()
                },
            },
            Err(_) => {
                tracing::info!(path, "No badge config found, using defaults");
                BadgeConfig::default()
            },
        };

        if let Ok(url) = std::env::var("MONKEYBADGE_SERVER_URL")
            && !url.is_empty()
        {
            config.server_url = url;
        }
        if let Ok(key) = std::env::var("MONKEYBADGE_REGISTRATION_KEY")
            && !key.is_empty()
        {
            config.registration_key = key;
        }
        if let Ok(path) = std::env::var("MONKEYBADGE_BADGE_CACHE")
            && !path.is_empty()
        {
            config.cache_path = path;
        }
        if let Ok(addr) = std::env::var("MONKEYBADGE_IR_BIND")
            && !addr.is_empty()
        {
            config.ir.bind_addr = addr;
        }
        if let Ok(peers) = std::env::var("MONKEYBADGE_IR_PEERS")
            && !peers.is_empty()
        {
            config.ir.peers = peers.split(',').map(|p| p.trim().to_string()).collect();
        }

        config
    }
}
