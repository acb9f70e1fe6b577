//! Identity types and wire messages.
//!
//! Every identifier is a newtype so a scene id can never be passed where
//! a client id is expected. All of them serialize as their bare inner
//! value (`#[serde(transparent)]`).

use std::fmt;

use lobbyforge_transport::ConnectionId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A connected client. One client per transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u64);

impl From<ConnectionId> for ClientId {
    fn from(id: ConnectionId) -> Self {
        Self(id.into_inner())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

/// Opaque lobby identifier, unique per lobby for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LobbyId(String);

impl LobbyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LobbyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L-{}", self.0)
    }
}

/// A loaded scene instance, as handed out by the scene host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene-{}", self.0)
    }
}

/// The template (scene path) a scene instance is stamped from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(String);

impl TemplateId {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty template id means "not configured".
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Replicated state
// ---------------------------------------------------------------------------

/// Lifecycle of a game scene bound to a started lobby.
///
/// ```text
/// NotUsed → Used → Ready
/// ```
///
/// Ordered so "no regression" is a plain comparison.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum GameState {
    /// Pooled, not bound to any lobby.
    #[default]
    NotUsed,
    /// Bound to a lobby; members are being moved in.
    Used,
    /// Every member has materialized in the scene.
    Ready,
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotUsed => write!(f, "NotUsed"),
            Self::Used => write!(f, "Used"),
            Self::Ready => write!(f, "Ready"),
        }
    }
}

/// A point-in-time view of a lobby, safe to send to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbySummary {
    pub lobby_id: LobbyId,
    /// `None` only while the lobby is empty.
    pub owner: Option<ClientId>,
    /// Members in join order.
    pub members: Vec<ClientId>,
    /// The scene the members are (or are being) moved into.
    pub resource: ResourceId,
    pub started: bool,
    pub locked: bool,
    /// Enough members to start.
    pub can_start: bool,
    /// Admissions are open: not started, not locked, not full.
    pub can_join: bool,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Client → server. The remote invocation surface.
///
/// Internally tagged: `{ "type": "SetLocked", "locked": true }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Put me in any joinable lobby, creating one if needed.
    RequestSession,

    /// Start my lobby. Ignored unless the sender owns the lobby.
    StartSession,

    /// Open or close my lobby to new members. Ignored unless the sender
    /// owns the lobby.
    SetLocked { locked: bool },

    /// Keep-alive; echoed back in [`ServerMessage::HeartbeatAck`].
    Heartbeat { client_time: u64 },

    /// I'm leaving.
    Disconnect { reason: String },
}

/// Server → client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// First message on every connection.
    Welcome { client_id: ClientId, version: u32 },

    /// Reply to `RequestSession`: the lobby the client now belongs to.
    SessionJoined { lobby: LobbySummary },

    /// Someone joined the client's lobby.
    MemberJoined { lobby_id: LobbyId, client: ClientId },

    /// Someone left the client's lobby. `owner` is the owner afterwards.
    MemberLeft {
        lobby_id: LobbyId,
        client: ClientId,
        owner: Option<ClientId>,
    },

    /// The owner started the lobby; a game scene is being assigned.
    SessionStarted { lobby_id: LobbyId },

    /// The game scene bound to the client's lobby changed state.
    GameState {
        lobby_id: LobbyId,
        resource: ResourceId,
        state: GameState,
    },

    /// Every member has materialized in the game scene.
    GameReady { lobby_id: LobbyId },

    /// Reply to `Heartbeat`.
    HeartbeatAck { client_time: u64, server_time: u64 },

    /// A request could not be served. HTTP-style codes.
    Error { code: u16, message: String },
}
