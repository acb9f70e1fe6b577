//! # Lobbyforge
//!
//! Server-authoritative lobbies for games whose worlds live in
//! engine-loaded scenes.
//!
//! Clients connect over WebSocket, ask for a lobby, and are placed in a
//! pre-loaded lobby scene. When the owner starts, the whole lobby moves to
//! a pre-loaded game scene and the server reports when every member has
//! arrived. The engine itself sits behind the
//! [`SceneHost`](lobbyforge_pool::SceneHost) trait;
//! [`SimHost`](lobbyforge_pool::SimHost) stands in for it when running
//! headless.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lobbyforge::prelude::*;
//!
//! # async fn run() -> Result<(), LobbyforgeError> {
//! let config = LobbyConfig::new(TemplateId::new("Scenes/Lobby"), TemplateId::new("Scenes/Game"));
//! let (host, host_events) = SimHost::new(SimConfig {
//!     game_templates: vec![config.game_scene.clone()],
//!     ..SimConfig::default()
//! });
//!
//! let server = LobbyforgeServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .lobby_config(config)
//!     .build(host, host_events)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::LobbyforgeError;
pub use server::{LobbyforgeServer, LobbyforgeServerBuilder};

/// Everything needed to embed a server.
pub mod prelude {
    pub use crate::{LobbyforgeError, LobbyforgeServer, LobbyforgeServerBuilder};
    pub use lobbyforge_lobby::{LobbyConfig, LobbyError, LobbyEvent, LobbyHandle, PoolStatus};
    pub use lobbyforge_pool::{
        ClientPresence, HostEvent, LoadEnd, LoadedScene, MarkerKind, SceneHost, SimConfig,
        SimHost,
    };
    pub use lobbyforge_protocol::{
        ClientId, ClientMessage, GameState, LobbyId, LobbySummary, PROTOCOL_VERSION, ResourceId,
        ServerMessage, TemplateId,
    };
}
