//! Deferred work the manager re-checks on host events and poll ticks.

use std::time::Duration;

use lobbyforge_protocol::{LobbyId, ResourceId};
use tokio::time::Instant;

/// A scene waiting for its last client object to leave before unload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Retirement {
    pub resource: ResourceId,
    pub since: Instant,
}

/// A started lobby waiting for every member to appear in its game scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReadinessWatch {
    pub lobby_id: LobbyId,
    pub resource: ResourceId,
    pub since: Instant,
}

/// `true` once `since + timeout` has passed. No timeout never expires.
pub(crate) fn expired(since: Instant, now: Instant, timeout: Option<Duration>) -> bool {
    timeout.is_some_and(|limit| now.saturating_duration_since(since) >= limit)
}
