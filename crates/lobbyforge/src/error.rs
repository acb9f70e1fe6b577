//! Unified error type for Lobbyforge.

use lobbyforge_lobby::LobbyError;
use lobbyforge_protocol::ProtocolError;
use lobbyforge_transport::TransportError;

/// Top-level error wrapping every layer's error.
///
/// `#[from]` on each variant lets `?` convert layer errors directly.
#[derive(Debug, thiserror::Error)]
pub enum LobbyforgeError {
    /// Binding, accepting, sending, or receiving failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A message could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The lobby layer refused a request or is gone.
    #[error(transparent)]
    Lobby(#[from] LobbyError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::SendFailed(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "gone",
        ));
        let err: LobbyforgeError = err.into();
        assert!(matches!(err, LobbyforgeError::Transport(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: LobbyforgeError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, LobbyforgeError::Protocol(_)));
    }

    #[test]
    fn test_from_lobby_error() {
        let err: LobbyforgeError = LobbyError::PoolExhausted.into();
        assert!(matches!(err, LobbyforgeError::Lobby(_)));
        assert_eq!(err.to_string(), "no pooled lobby scene available");
    }
}
