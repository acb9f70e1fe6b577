//! Headless Lobbyforge server.
//!
//! Runs the lobby service against the simulated scene host so clients can
//! be developed without a game engine.
//!
//! ```text
//! sim-server [config.json]
//! ```
//!
//! `LOBBYFORGE_BIND` sets the listen address (default `127.0.0.1:8080`),
//! `RUST_LOG` the log filter (default `info`).

use std::path::Path;

use lobbyforge::prelude::*;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_BIND: &str = "127.0.0.1:8080";

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DemoConfig {
    lobby: LobbyConfig,
    sim: SimConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        let game_scene = TemplateId::new("Scenes/Game");
        Self {
            lobby: LobbyConfig {
                min_lobby_clients: 2,
                max_lobby_clients: 4,
                ..LobbyConfig::new(TemplateId::new("Scenes/Lobby"), game_scene.clone())
            },
            sim: SimConfig {
                game_templates: vec![game_scene],
                ..SimConfig::default()
            },
        }
    }
}

fn load_config(path: &Path) -> Result<DemoConfig, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::args_os().nth(1) {
        Some(path) => {
            let path = Path::new(&path);
            tracing::info!(path = %path.display(), "loading config");
            load_config(path)?
        }
        None => DemoConfig::default(),
    };
    let bind = std::env::var("LOBBYFORGE_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());

    let (host, host_events) = SimHost::new(config.sim);
    let server = LobbyforgeServer::builder()
        .bind(&bind)
        .lobby_config(config.lobby)
        .build(host, host_events)
        .await?;
    let addr = server.local_addr()?;
    tracing::info!(%addr, "listening");

    server.run().await?;
    Ok(())
}
