//! Lobby manager configuration.

use std::time::Duration;

use lobbyforge_protocol::TemplateId;
use serde::{Deserialize, Serialize};

use crate::LobbyError;

/// Configuration for the lobby manager.
///
/// Deserializes with every field optional; missing fields take the
/// defaults below. The two scene templates have no usable default and
/// must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    /// Pre-loaded scenes kept ready per pool (lobby pool and game pool).
    pub max_pooled_scenes: usize,

    /// Members for a lobby to report `can_start`. Advisory: the owner may
    /// start with fewer.
    pub min_lobby_clients: usize,

    /// Members allowed in one lobby.
    pub max_lobby_clients: usize,

    /// Template lobby scenes are loaded from.
    pub lobby_scene: TemplateId,

    /// Template game scenes are loaded from.
    pub game_scene: TemplateId,

    /// How often pending scene retirements and readiness barriers are
    /// re-checked when no host event wakes them earlier.
    pub poll_interval: Duration,

    /// Give up waiting for every member to appear in a new game scene.
    /// `None` waits forever.
    pub readiness_timeout: Option<Duration>,

    /// Unload a retired scene even if client objects remain in it.
    /// `None` waits forever.
    pub unload_timeout: Option<Duration>,

    /// Buffered lobby events per subscriber. A subscriber that falls
    /// further behind observes `Lagged` and must resync.
    pub event_capacity: usize,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            max_pooled_scenes: 1,
            min_lobby_clients: 1,
            max_lobby_clients: 1,
            lobby_scene: TemplateId::default(),
            game_scene: TemplateId::default(),
            poll_interval: Duration::from_millis(100),
            readiness_timeout: Some(Duration::from_secs(60)),
            unload_timeout: Some(Duration::from_secs(120)),
            event_capacity: 256,
        }
    }
}

impl LobbyConfig {
    /// Smallest accepted poll interval.
    pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

    /// Default config with the two scene templates set.
    pub fn new(lobby_scene: TemplateId, game_scene: TemplateId) -> Self {
        Self {
            lobby_scene,
            game_scene,
            ..Self::default()
        }
    }

    /// Checks required fields and clamps numeric ones into range.
    ///
    /// - Missing lobby or game template → [`LobbyError::MissingTemplate`].
    /// - `max_pooled_scenes`, `min_lobby_clients`, `max_lobby_clients`,
    ///   `event_capacity` raised to at least 1.
    /// - `min_lobby_clients` lowered to `max_lobby_clients` if above it.
    /// - `poll_interval` raised to [`Self::MIN_POLL_INTERVAL`].
    pub fn validated(mut self) -> Result<Self, LobbyError> {
        if self.lobby_scene.is_empty() {
            return Err(LobbyError::MissingTemplate("Lobby Scene"));
        }
        if self.game_scene.is_empty() {
            return Err(LobbyError::MissingTemplate("Game Scene"));
        }

        for (name, value) in [
            ("max_pooled_scenes", &mut self.max_pooled_scenes),
            ("min_lobby_clients", &mut self.min_lobby_clients),
            ("max_lobby_clients", &mut self.max_lobby_clients),
            ("event_capacity", &mut self.event_capacity),
        ] {
            if *value == 0 {
                tracing::warn!(option = name, "must be at least 1, clamping");
                *value = 1;
            }
        }
        if self.min_lobby_clients > self.max_lobby_clients {
            tracing::warn!(
                min = self.min_lobby_clients,
                max = self.max_lobby_clients,
                "min_lobby_clients exceeds max_lobby_clients, clamping"
            );
            self.min_lobby_clients = self.max_lobby_clients;
        }
        if self.poll_interval < Self::MIN_POLL_INTERVAL {
            self.poll_interval = Self::MIN_POLL_INTERVAL;
        }
        Ok(self)
    }
}
