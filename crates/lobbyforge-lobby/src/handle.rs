//! The lobby manager actor and its handle.
//!
//! The manager runs in its own Tokio task. Commands arrive over an mpsc
//! channel, host completions over another, and a poll interval drives
//! the watchers while any are pending. All three are serviced by one
//! `select!` loop, so manager state never needs a lock.

use lobbyforge_pool::{HostEvent, SceneHost};
use lobbyforge_protocol::{ClientId, GameState, LobbyId, LobbySummary};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};

use crate::{LobbyConfig, LobbyError, LobbyEvent, LobbyManager, PoolStatus};

/// Command channel size. Senders wait when it is full.
const COMMAND_CHANNEL_SIZE: usize = 256;

/// Commands sent to the manager task.
pub(crate) enum LobbyCommand {
    Connected {
        client: ClientId,
    },
    Disconnected {
        client: ClientId,
    },
    RequestLobby {
        client: ClientId,
        reply: oneshot::Sender<Result<LobbySummary, LobbyError>>,
    },
    StartLobby {
        client: ClientId,
        reply: oneshot::Sender<bool>,
    },
    SetLocked {
        client: ClientId,
        locked: bool,
        reply: oneshot::Sender<bool>,
    },
    LobbyOf {
        client: ClientId,
        reply: oneshot::Sender<Option<LobbySummary>>,
    },
    ListLobbies {
        reply: oneshot::Sender<Vec<LobbySummary>>,
    },
    PoolStatus {
        reply: oneshot::Sender<PoolStatus>,
    },
    GameState {
        lobby_id: LobbyId,
        reply: oneshot::Sender<Option<watch::Receiver<GameState>>>,
    },
    Shutdown,
}

/// Handle to the running lobby manager. Cheap to clone.
#[derive(Clone)]
pub struct LobbyHandle {
    sender: mpsc::Sender<LobbyCommand>,
    events: broadcast::Sender<LobbyEvent>,
}

impl LobbyHandle {
    /// Reports a new connection.
    pub async fn connected(&self, client: ClientId) -> Result<(), LobbyError> {
        self.send(LobbyCommand::Connected { client }).await
    }

    /// Reports a closed connection. The client leaves its lobby.
    pub async fn disconnected(&self, client: ClientId) -> Result<(), LobbyError> {
        self.send(LobbyCommand::Disconnected { client }).await
    }

    /// Places the client in a lobby (or returns the one it is in).
    pub async fn request_lobby(&self, client: ClientId) -> Result<LobbySummary, LobbyError> {
        self.call(|reply| LobbyCommand::RequestLobby { client, reply })
            .await?
    }

    /// Owner-only start. `Ok(false)` means the request was ignored.
    pub async fn start_lobby(&self, client: ClientId) -> Result<bool, LobbyError> {
        self.call(|reply| LobbyCommand::StartLobby { client, reply })
            .await
    }

    /// Owner-only lock toggle. `Ok(false)` means the request was ignored.
    pub async fn set_locked(&self, client: ClientId, locked: bool) -> Result<bool, LobbyError> {
        self.call(|reply| LobbyCommand::SetLocked {
            client,
            locked,
            reply,
        })
        .await
    }

    pub async fn lobby_of(&self, client: ClientId) -> Result<Option<LobbySummary>, LobbyError> {
        self.call(|reply| LobbyCommand::LobbyOf { client, reply })
            .await
    }

    /// Every lobby, oldest first.
    pub async fn list_lobbies(&self) -> Result<Vec<LobbySummary>, LobbyError> {
        self.call(|reply| LobbyCommand::ListLobbies { reply }).await
    }

    pub async fn pool_status(&self) -> Result<PoolStatus, LobbyError> {
        self.call(|reply| LobbyCommand::PoolStatus { reply }).await
    }

    /// A watch on the lobby's game state, or `None` if the lobby is not
    /// bound to a game scene.
    pub async fn game_state(
        &self,
        lobby_id: LobbyId,
    ) -> Result<Option<watch::Receiver<GameState>>, LobbyError> {
        self.call(|reply| LobbyCommand::GameState { lobby_id, reply })
            .await
    }

    /// Subscribes to lobby events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LobbyEvent> {
        self.events.subscribe()
    }

    /// Stops the manager task. Outstanding handles get
    /// [`LobbyError::Unavailable`] afterwards.
    pub async fn shutdown(&self) -> Result<(), LobbyError> {
        self.send(LobbyCommand::Shutdown).await
    }

    async fn send(&self, command: LobbyCommand) -> Result<(), LobbyError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| LobbyError::Unavailable)
    }

    async fn call<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> LobbyCommand,
    ) -> Result<T, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(command(reply_tx)).await?;
        reply_rx.await.map_err(|_| LobbyError::Unavailable)
    }
}

/// The manager task's state.
struct LobbyActor<H: SceneHost> {
    manager: LobbyManager<H>,
    commands: mpsc::Receiver<LobbyCommand>,
    host_events: mpsc::UnboundedReceiver<HostEvent>,
}

impl<H: SceneHost> LobbyActor<H> {
    async fn run(mut self) {
        self.manager.start();

        let mut poll = tokio::time::interval(self.manager.config().poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(LobbyCommand::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                Some(event) = self.host_events.recv() => {
                    self.manager.handle_host_event(event);
                }
                _ = poll.tick(), if self.manager.has_watchers() => {
                    self.manager.poll_watchers(Instant::now());
                }
            }
        }

        tracing::info!(lobbies = self.manager.lobbies().len(), "lobby manager stopped");
    }

    fn handle(&mut self, command: LobbyCommand) {
        match command {
            LobbyCommand::Connected { client } => self.manager.client_connected(client),
            LobbyCommand::Disconnected { client } => self.manager.client_disconnected(client),
            LobbyCommand::RequestLobby { client, reply } => {
                let _ = reply.send(self.manager.request_lobby(client));
            }
            LobbyCommand::StartLobby { client, reply } => {
                let _ = reply.send(self.manager.start_lobby(client));
            }
            LobbyCommand::SetLocked {
                client,
                locked,
                reply,
            } => {
                let _ = reply.send(self.manager.request_lock(client, locked));
            }
            LobbyCommand::LobbyOf { client, reply } => {
                let _ = reply.send(self.manager.lobby_of(client).map(|lobby| lobby.summary()));
            }
            LobbyCommand::ListLobbies { reply } => {
                let _ = reply.send(self.manager.summaries());
            }
            LobbyCommand::PoolStatus { reply } => {
                let _ = reply.send(self.manager.pool_status());
            }
            LobbyCommand::GameState { lobby_id, reply } => {
                let _ = reply.send(self.manager.game_state_of(&lobby_id));
            }
            // Handled by the run loop.
            LobbyCommand::Shutdown => {}
        }
    }
}

/// Validates `config`, spawns the manager task, and starts filling the
/// pools. `host_events` must be the receiver paired with `host`.
///
/// Fails without spawning anything if the configuration is unusable.
/// Must be called from inside a Tokio runtime.
pub fn spawn_lobby_manager<H: SceneHost>(
    config: LobbyConfig,
    host: H,
    host_events: mpsc::UnboundedReceiver<HostEvent>,
) -> Result<LobbyHandle, LobbyError> {
    let manager = LobbyManager::new(config, host)?;
    let (sender, commands) = mpsc::channel(COMMAND_CHANNEL_SIZE);
    let events = manager.event_sender();

    let actor = LobbyActor {
        manager,
        commands,
        host_events,
    };
    tokio::spawn(actor.run());

    Ok(LobbyHandle { sender, events })
}
