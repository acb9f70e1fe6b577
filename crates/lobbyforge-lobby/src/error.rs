//! Error types for the lobby layer.

use lobbyforge_protocol::LobbyId;

/// Errors surfaced by the lobby manager.
///
/// Authority violations (a non-owner starting a lobby, a foreign scene
/// completion) are not errors: they are ignored and logged at debug.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// A required scene template is not configured. The manager refuses
    /// to start.
    #[error("{0} doesn't have a value")]
    MissingTemplate(&'static str),

    /// No pooled lobby scene was available to back a new lobby. The pool
    /// is refilling; a later request may succeed.
    #[error("no pooled lobby scene available")]
    PoolExhausted,

    /// The lobby does not exist (never did, or was cleaned up).
    #[error("lobby {0} not found")]
    NotFound(LobbyId),

    /// The manager task is gone.
    #[error("lobby manager is unavailable")]
    Unavailable,
}
