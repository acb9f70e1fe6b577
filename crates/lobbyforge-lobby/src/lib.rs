//! Lobby management for Lobbyforge.
//!
//! A single [`LobbyManager`] owns every lobby and both scene pools. It
//! runs inside one Tokio task (see [`spawn_lobby_manager`]) so lobby and
//! pool state are only ever touched from one logical thread; everything
//! else talks to it through a cloneable [`LobbyHandle`].
//!
//! # Key types
//!
//! - [`Lobby`]: membership, ownership, lock and start flags
//! - [`LobbyInstance`] / [`GameInstance`]: the bindings a pooled scene
//!   exposes once it is attached to a lobby
//! - [`LobbyManager`]: admission, promotion to a game scene, cleanup
//! - [`LobbyHandle`]: message-passing front door to the manager task
//! - [`Synced`]: an authoritative value observers can watch
//! - [`LobbyConfig`]: pool size, lobby capacity, scene templates

mod config;
mod error;
mod handle;
mod instance;
mod lobby;
mod manager;
mod pending;
mod sync;

pub use config::LobbyConfig;
pub use error::LobbyError;
pub use handle::{LobbyHandle, spawn_lobby_manager};
pub use instance::{GameInstance, LobbyInstance};
pub use lobby::{Lobby, LobbyEvent};
pub use manager::{LobbyManager, PoolStatus};
pub use sync::{Authority, Synced};
