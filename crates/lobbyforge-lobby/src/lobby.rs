//! A lobby: a group of clients sharing one scene.

use lobbyforge_protocol::{ClientId, GameState, LobbyId, LobbySummary, ResourceId};
use tokio::sync::broadcast;

use crate::Authority;

/// Notifications fired by lobbies and game instances.
///
/// Fire-and-forget: delivered to whoever is subscribed at the time, in no
/// guaranteed order relative to other subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyEvent {
    /// A lobby was created on a pooled lobby scene.
    Created { lobby_id: LobbyId, resource: ResourceId },
    /// A client joined.
    Joined { lobby_id: LobbyId, client: ClientId },
    /// A client left. `owner` is the owner after the leave.
    Left {
        lobby_id: LobbyId,
        client: ClientId,
        owner: Option<ClientId>,
    },
    /// The lobby was started.
    Started { lobby_id: LobbyId },
    /// The game scene bound to the lobby changed state.
    GameStateChanged {
        lobby_id: LobbyId,
        resource: ResourceId,
        state: GameState,
    },
    /// Every member materialized in the game scene.
    GameReady { lobby_id: LobbyId },
    /// The readiness barrier gave up.
    ReadinessTimedOut { lobby_id: LobbyId },
    /// The lobby emptied and was removed.
    Closed { lobby_id: LobbyId },
}

impl LobbyEvent {
    /// The lobby this event concerns.
    pub fn lobby_id(&self) -> &LobbyId {
        match self {
            Self::Created { lobby_id, .. }
            | Self::Joined { lobby_id, .. }
            | Self::Left { lobby_id, .. }
            | Self::Started { lobby_id }
            | Self::GameStateChanged { lobby_id, .. }
            | Self::GameReady { lobby_id }
            | Self::ReadinessTimedOut { lobby_id }
            | Self::Closed { lobby_id } => lobby_id,
        }
    }
}

/// A group of clients sharing one pooled scene.
///
/// ```text
///   Empty ──join──→ Active ──start──→ Started ──leave…──→ Draining ──→ Empty
/// ```
///
/// Members are kept in join order. The first joiner owns the lobby; when
/// the owner leaves, ownership passes to the earliest remaining member.
/// A lobby only admits new members while it is not started, not locked
/// and below capacity.
#[derive(Debug)]
pub struct Lobby {
    id: LobbyId,
    members: Vec<ClientId>,
    owner: Option<ClientId>,
    resource: ResourceId,
    started: bool,
    locked: bool,
    min_clients: usize,
    max_clients: usize,
    events: broadcast::Sender<LobbyEvent>,
}

impl Lobby {
    pub(crate) fn new(
        id: LobbyId,
        resource: ResourceId,
        min_clients: usize,
        max_clients: usize,
        events: broadcast::Sender<LobbyEvent>,
    ) -> Self {
        Self {
            id,
            members: Vec::with_capacity(max_clients),
            owner: None,
            resource,
            started: false,
            locked: false,
            min_clients,
            max_clients,
            events,
        }
    }

    /// Adds a client. Returns `false` (and changes nothing) if the client
    /// is already a member or the lobby is not admitting.
    pub fn join(&mut self, _authority: Authority, client: ClientId) -> bool {
        if self.has_client(client) || !self.can_join() {
            return false;
        }
        self.members.push(client);
        if self.owner.is_none() {
            self.owner = Some(client);
        }
        self.fire(LobbyEvent::Joined {
            lobby_id: self.id.clone(),
            client,
        });
        true
    }

    /// Removes a client. Returns `false` if it was not a member.
    pub fn leave(&mut self, _authority: Authority, client: ClientId) -> bool {
        let Some(index) = self.members.iter().position(|c| *c == client) else {
            return false;
        };
        self.members.remove(index);
        if self.owner == Some(client) {
            self.owner = self.members.first().copied();
        }
        self.fire(LobbyEvent::Left {
            lobby_id: self.id.clone(),
            client,
            owner: self.owner,
        });
        true
    }

    /// Marks the lobby started. One-way; returns `false` if it already was.
    pub fn start(&mut self, _authority: Authority) -> bool {
        if self.started {
            return false;
        }
        self.started = true;
        self.fire(LobbyEvent::Started {
            lobby_id: self.id.clone(),
        });
        true
    }

    pub fn set_locked(&mut self, _authority: Authority, locked: bool) {
        self.locked = locked;
    }

    pub(crate) fn set_resource(&mut self, _authority: Authority, resource: ResourceId) {
        self.resource = resource;
    }

    pub fn id(&self) -> &LobbyId {
        &self.id
    }

    /// Members in join order.
    pub fn members(&self) -> &[ClientId] {
        &self.members
    }

    pub fn owner(&self) -> Option<ClientId> {
        self.owner
    }

    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn has_client(&self, client: ClientId) -> bool {
        self.members.contains(&client)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Enough members to start.
    pub fn can_start(&self) -> bool {
        self.members.len() >= self.min_clients
    }

    /// Not started, not locked, and below capacity.
    pub fn can_join(&self) -> bool {
        !self.started && !self.locked && self.members.len() < self.max_clients
    }

    pub fn summary(&self) -> LobbySummary {
        LobbySummary {
            lobby_id: self.id.clone(),
            owner: self.owner,
            members: self.members.clone(),
            resource: self.resource,
            started: self.started,
            locked: self.locked,
            can_start: self.can_start(),
            can_join: self.can_join(),
        }
    }

    fn fire(&self, event: LobbyEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUTH: Authority = Authority::server();

    fn cid(id: u64) -> ClientId {
        ClientId(id)
    }

    fn lobby(min: usize, max: usize) -> (Lobby, broadcast::Receiver<LobbyEvent>) {
        let (tx, rx) = broadcast::channel(64);
        (Lobby::new(LobbyId::new("t1"), ResourceId(1), min, max, tx), rx)
    }

    fn drain(rx: &mut broadcast::Receiver<LobbyEvent>) -> Vec<LobbyEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    // =====================================================================
    // join()
    // =====================================================================

    #[test]
    fn test_join_first_client_becomes_owner() {
        let (mut lobby, _rx) = lobby(1, 4);
        assert!(lobby.join(AUTH, cid(1)));
        assert_eq!(lobby.owner(), Some(cid(1)));
        assert_eq!(lobby.members(), &[cid(1)]);
    }

    #[test]
    fn test_join_keeps_first_owner() {
        let (mut lobby, _rx) = lobby(1, 4);
        lobby.join(AUTH, cid(1));
        lobby.join(AUTH, cid(2));
        assert_eq!(lobby.owner(), Some(cid(1)));
        assert_eq!(lobby.members(), &[cid(1), cid(2)]);
    }

    #[test]
    fn test_join_duplicate_is_noop() {
        let (mut lobby, mut rx) = lobby(1, 4);
        lobby.join(AUTH, cid(1));
        assert!(!lobby.join(AUTH, cid(1)));
        assert_eq!(lobby.len(), 1);
        assert_eq!(drain(&mut rx).len(), 1, "one Joined event only");
    }

    #[test]
    fn test_join_when_full_is_rejected() {
        let (mut lobby, _rx) = lobby(1, 2);
        lobby.join(AUTH, cid(1));
        lobby.join(AUTH, cid(2));
        assert!(!lobby.can_join());
        assert!(!lobby.join(AUTH, cid(3)));
        assert_eq!(lobby.len(), 2);
    }

    #[test]
    fn test_join_when_locked_is_rejected() {
        let (mut lobby, _rx) = lobby(1, 4);
        lobby.set_locked(AUTH, true);
        assert!(!lobby.join(AUTH, cid(1)));
        lobby.set_locked(AUTH, false);
        assert!(lobby.join(AUTH, cid(1)));
    }

    #[test]
    fn test_join_after_start_is_rejected_even_with_room() {
        let (mut lobby, _rx) = lobby(1, 8);
        lobby.join(AUTH, cid(1));
        lobby.start(AUTH);
        assert!(!lobby.join(AUTH, cid(2)));
        assert_eq!(lobby.members(), &[cid(1)]);
    }

    #[test]
    fn test_join_fires_joined_event() {
        let (mut lobby, mut rx) = lobby(1, 4);
        lobby.join(AUTH, cid(9));
        assert_eq!(
            drain(&mut rx),
            vec![LobbyEvent::Joined {
                lobby_id: LobbyId::new("t1"),
                client: cid(9)
            }]
        );
    }

    // =====================================================================
    // leave()
    // =====================================================================

    #[test]
    fn test_leave_owner_passes_ownership_to_next_member() {
        let (mut lobby, _rx) = lobby(1, 4);
        lobby.join(AUTH, cid(1));
        lobby.join(AUTH, cid(2));

        assert!(lobby.leave(AUTH, cid(1)));
        assert_eq!(lobby.owner(), Some(cid(2)));
        assert_eq!(lobby.members(), &[cid(2)]);
    }

    #[test]
    fn test_leave_non_owner_keeps_owner() {
        let (mut lobby, _rx) = lobby(1, 4);
        lobby.join(AUTH, cid(1));
        lobby.join(AUTH, cid(2));
        lobby.leave(AUTH, cid(2));
        assert_eq!(lobby.owner(), Some(cid(1)));
    }

    #[test]
    fn test_leave_last_member_clears_owner() {
        let (mut lobby, _rx) = lobby(1, 4);
        lobby.join(AUTH, cid(1));
        lobby.leave(AUTH, cid(1));
        assert_eq!(lobby.owner(), None);
        assert!(lobby.is_empty());
    }

    #[test]
    fn test_leave_unknown_client_is_noop() {
        let (mut lobby, mut rx) = lobby(1, 4);
        lobby.join(AUTH, cid(1));
        drain(&mut rx);
        assert!(!lobby.leave(AUTH, cid(5)));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_leave_event_reports_new_owner() {
        let (mut lobby, mut rx) = lobby(1, 4);
        lobby.join(AUTH, cid(1));
        lobby.join(AUTH, cid(2));
        drain(&mut rx);
        lobby.leave(AUTH, cid(1));
        assert_eq!(
            drain(&mut rx),
            vec![LobbyEvent::Left {
                lobby_id: LobbyId::new("t1"),
                client: cid(1),
                owner: Some(cid(2)),
            }]
        );
    }

    #[test]
    fn test_owner_is_always_earliest_remaining_member() {
        // Joins 1..=5, then removes in a scrambled order, checking the
        // owner after every step.
        let (mut lobby, _rx) = lobby(1, 8);
        for id in 1..=5 {
            lobby.join(AUTH, cid(id));
        }
        for leaving in [3, 1, 2, 5, 4] {
            lobby.leave(AUTH, cid(leaving));
            let expected = lobby.members().first().copied();
            assert_eq!(lobby.owner(), expected);
            if let Some(owner) = lobby.owner() {
                assert!(lobby.has_client(owner));
            }
        }
        assert_eq!(lobby.owner(), None);
    }

    #[test]
    fn test_rejoin_after_leave_goes_to_back() {
        let (mut lobby, _rx) = lobby(1, 4);
        lobby.join(AUTH, cid(1));
        lobby.join(AUTH, cid(2));
        lobby.leave(AUTH, cid(1));
        lobby.join(AUTH, cid(1));
        assert_eq!(lobby.members(), &[cid(2), cid(1)]);
        assert_eq!(lobby.owner(), Some(cid(2)));
    }

    // =====================================================================
    // start() / flags
    // =====================================================================

    #[test]
    fn test_start_twice_fires_once() {
        let (mut lobby, mut rx) = lobby(1, 4);
        assert!(lobby.start(AUTH));
        assert!(!lobby.start(AUTH));
        assert!(lobby.is_started());
        let started: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, LobbyEvent::Started { .. }))
            .collect();
        assert_eq!(started.len(), 1);
    }

    #[test]
    fn test_can_start_tracks_minimum() {
        let (mut lobby, _rx) = lobby(2, 2);
        lobby.join(AUTH, cid(1));
        assert!(!lobby.can_start());
        lobby.join(AUTH, cid(2));
        assert!(lobby.can_start());
    }

    #[test]
    fn test_summary_reflects_state() {
        let (mut lobby, _rx) = lobby(2, 3);
        lobby.join(AUTH, cid(1));
        lobby.set_locked(AUTH, true);
        let summary = lobby.summary();
        assert_eq!(summary.lobby_id, LobbyId::new("t1"));
        assert_eq!(summary.owner, Some(cid(1)));
        assert_eq!(summary.members, vec![cid(1)]);
        assert_eq!(summary.resource, ResourceId(1));
        assert!(summary.locked);
        assert!(!summary.can_join);
        assert!(!summary.can_start);
        assert!(!summary.started);
    }

    #[test]
    fn test_event_lobby_id_accessor() {
        let event = LobbyEvent::GameReady {
            lobby_id: LobbyId::new("x"),
        };
        assert_eq!(event.lobby_id(), &LobbyId::new("x"));
    }
}
