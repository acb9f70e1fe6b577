//! `LobbyforgeServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → lobby manager.

use std::sync::Arc;
use std::time::Duration;

use lobbyforge_lobby::{LobbyConfig, LobbyHandle, spawn_lobby_manager};
use lobbyforge_pool::{HostEvent, SceneHost};
use lobbyforge_protocol::{Codec, JsonCodec};
use lobbyforge_transport::{Transport, WebSocketTransport};
use tokio::sync::mpsc;

use crate::LobbyforgeError;
use crate::handler::handle_connection;

/// State shared by every connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) lobbies: LobbyHandle,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Duration,
}

/// Builder for configuring and starting a Lobbyforge server.
pub struct LobbyforgeServerBuilder {
    bind_addr: String,
    lobby_config: LobbyConfig,
    idle_timeout: Duration,
}

impl LobbyforgeServerBuilder {
    /// Creates a builder with default settings. The lobby config has no
    /// scene templates yet; [`lobby_config`](Self::lobby_config) must
    /// supply them.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            lobby_config: LobbyConfig::default(),
            idle_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the lobby configuration.
    pub fn lobby_config(mut self, config: LobbyConfig) -> Self {
        self.lobby_config = config;
        self
    }

    /// Closes connections that send nothing (not even a heartbeat) for
    /// this long.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Spawns the lobby manager on `host` and binds the listener.
    ///
    /// The configuration is validated before anything is bound, so a
    /// missing scene template fails fast. Uses `JsonCodec` and
    /// `WebSocketTransport`.
    pub async fn build<H: SceneHost>(
        self,
        host: H,
        host_events: mpsc::UnboundedReceiver<HostEvent>,
    ) -> Result<LobbyforgeServer<JsonCodec>, LobbyforgeError> {
        let lobbies = spawn_lobby_manager(self.lobby_config, host, host_events)?;
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            lobbies,
            codec: JsonCodec,
            idle_timeout: self.idle_timeout,
        });

        Ok(LobbyforgeServer { transport, state })
    }
}

impl Default for LobbyforgeServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Lobbyforge server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct LobbyforgeServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl LobbyforgeServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> LobbyforgeServerBuilder {
        LobbyforgeServerBuilder::new()
    }
}

impl<C: Codec> LobbyforgeServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle to the lobby manager, for introspection or shutdown.
    pub fn lobbies(&self) -> LobbyHandle {
        self.state.lobbies.clone()
    }

    /// Runs the accept loop, spawning a handler task per connection.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), LobbyforgeError> {
        tracing::info!("Lobbyforge server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
