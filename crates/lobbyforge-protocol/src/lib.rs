//! Wire protocol for Lobbyforge.
//!
//! - **Identity types** ([`ClientId`], [`LobbyId`], [`ResourceId`],
//!   [`TemplateId`]) shared by every layer above the transport.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`]): the remote
//!   invocation surface and the notifications replicated to clients.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes in, messages out.
//!
//! ```text
//! Transport (bytes) → Protocol (messages) → Lobby (membership, scenes)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientId, ClientMessage, GameState, LobbyId, LobbySummary, ResourceId, ServerMessage,
    TemplateId,
};

/// The current protocol version, announced in [`ServerMessage::Welcome`].
pub const PROTOCOL_VERSION: u32 = 1;
