use std::net::SocketAddr;

use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use monkeybadge_badge::agent::Agent;
use monkeybadge_badge::cache::FileCache;
use monkeybadge_badge::config::BadgeConfig;
use monkeybadge_badge::display::LogDisplay;
use monkeybadge_badge::runtime::{BadgeRuntime, Input};
use monkeybadge_badge::sync::SyncClient;
use monkeybadge_badge::transceiver::UdpTransceiver;

fn parse_addr(addr: &str) -> SocketAddr {
    match addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(addr, "Invalid socket address: {e}");
            std::process::exit(1);
        },
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config_path =
        std::env::var("MONKEYBADGE_BADGE_CONFIG").unwrap_or_else(|_| "badge.toml".to_string());
    let config = BadgeConfig::load(&config_path);
    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    let bind = parse_addr(&config.ir.bind_addr);
    let peers = config.ir.peers.iter().map(|p| parse_addr(p)).collect();
    let transceiver = match UdpTransceiver::bind(bind, peers).await {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(addr = %bind, "Failed to bind IR socket: {e}");
            std::process::exit(1);
        },
    };
    let client = match SyncClient::new(&config.server_url, &config.registration_key) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Failed to create HTTP client: {e}");
            std::process::exit(1);
        },
    };

    let (ir_tx, ir_rx) = mpsc::channel(256);
    let _receiver = transceiver.spawn_receiver(ir_tx);

    // Console stands in for the buttons and on-badge menus.
    let (input_tx, input_rx) = mpsc::channel(32);
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match Input::parse(&line) {
                Some(input) => {
                    if input_tx.send(input).await.is_err() {
                        break;
                    }
                },
                None => tracing::warn!(line = %line, "Unknown command"),
            }
        }
    });

    let agent = Agent::new(
        config.timing.clone(),
        config.handle.clone(),
        LogDisplay,
        FileCache::open(&config.cache_path),
    );
    tracing::info!(uuid = %agent.uuid(), server = %config.server_url, "MonkeyBadge starting");

    let runtime = BadgeRuntime::new(agent, transceiver, client, config.timing.tick());
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
    };
    runtime.run(ir_rx, input_rx, shutdown).await;
}
