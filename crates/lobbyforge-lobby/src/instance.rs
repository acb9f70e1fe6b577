//! Bindings between a pooled scene and the lobby using it.

use lobbyforge_protocol::{GameState, LobbyId, ResourceId};
use tokio::sync::{broadcast, watch};

use crate::{Authority, Lobby, LobbyEvent, Synced};

/// The lobby binding a lobby scene exposes once it backs a lobby.
#[derive(Debug, Default)]
pub struct LobbyInstance {
    lobby: Option<LobbyId>,
}

impl LobbyInstance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the lobby this scene now backs.
    pub fn use_for(&mut self, _authority: Authority, lobby: &LobbyId) {
        self.lobby = Some(lobby.clone());
    }

    pub fn lobby(&self) -> Option<&LobbyId> {
        self.lobby.as_ref()
    }

    /// Leave listener. Returns `true` when `lobby` is the one bound here
    /// and it has no members left, meaning it should be reclaimed.
    pub fn client_left(&self, lobby: &Lobby) -> bool {
        self.lobby.as_ref() == Some(lobby.id()) && lobby.is_empty()
    }
}

/// The game binding a game scene exposes: a lobby binding plus the
/// replicated readiness state of the game.
///
/// ```text
///   NotUsed ──use_for──→ Used ──ready──→ Ready
/// ```
#[derive(Debug)]
pub struct GameInstance {
    base: LobbyInstance,
    resource: ResourceId,
    state: Synced<GameState>,
    events: broadcast::Sender<LobbyEvent>,
}

impl GameInstance {
    pub(crate) fn new(resource: ResourceId, events: broadcast::Sender<LobbyEvent>) -> Self {
        Self {
            base: LobbyInstance::new(),
            resource,
            state: Synced::new(GameState::NotUsed),
            events,
        }
    }

    /// Binds the scene to `lobby` and moves the game to [`GameState::Used`].
    pub fn use_for(&mut self, authority: Authority, lobby: &LobbyId) {
        self.base.use_for(authority, lobby);
        self.transition(authority, GameState::Used);
    }

    /// Moves the game to [`GameState::Ready`] and fires
    /// [`LobbyEvent::GameReady`]. Only valid from `Used`; returns `false`
    /// otherwise.
    pub fn ready(&mut self, authority: Authority) -> bool {
        if self.state.get() != GameState::Used {
            return false;
        }
        self.transition(authority, GameState::Ready);
        if let Some(lobby_id) = self.base.lobby() {
            let _ = self.events.send(LobbyEvent::GameReady {
                lobby_id: lobby_id.clone(),
            });
        }
        true
    }

    pub fn lobby(&self) -> Option<&LobbyId> {
        self.base.lobby()
    }

    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    pub fn state(&self) -> GameState {
        self.state.get()
    }

    /// Read-only view of the game state.
    pub fn subscribe(&self) -> watch::Receiver<GameState> {
        self.state.subscribe()
    }

    pub fn client_left(&self, lobby: &Lobby) -> bool {
        self.base.client_left(lobby)
    }

    fn transition(&self, authority: Authority, next: GameState) {
        // Monotonic: never step back.
        if next <= self.state.get() || !self.state.set(authority, next) {
            return;
        }
        tracing::debug!(resource = %self.resource, state = ?next, "game state changed");
        if let Some(lobby_id) = self.base.lobby() {
            let _ = self.events.send(LobbyEvent::GameStateChanged {
                lobby_id: lobby_id.clone(),
                resource: self.resource,
                state: next,
            });
        }
    }
}
