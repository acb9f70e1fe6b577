//! Scene pooling for Lobbyforge.
//!
//! Loading a scene takes several frames, so lobbies and games are never
//! built from scratch on demand. A [`ResourcePool`] keeps a target number
//! of pre-loaded, unassigned instances of one template and tops itself
//! back up whenever one is taken.
//!
//! # Key types
//!
//! - [`SceneHost`]: the engine seam: load/unload scenes, move clients,
//!   answer presence queries
//! - [`HostEvent`]: asynchronous completions and world changes reported
//!   back by the host
//! - [`ResourcePool`]: watermark-refilled FIFO of ready scenes
//! - [`SimHost`]: an in-process host with simulated latencies

mod host;
mod pool;
mod sim;

pub use host::{ClientPresence, HostEvent, LoadEnd, LoadedScene, MarkerKind, SceneHost};
pub use pool::ResourcePool;
pub use sim::{SimConfig, SimHost};
