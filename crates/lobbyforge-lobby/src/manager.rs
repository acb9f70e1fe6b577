//! Lobby manager: admission, promotion, and reclamation of lobbies.

use std::collections::HashMap;

use lobbyforge_pool::{HostEvent, MarkerKind, ResourcePool, SceneHost};
use lobbyforge_protocol::{ClientId, GameState, LobbyId, LobbySummary, ResourceId};
use rand::Rng;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

use crate::pending::{ReadinessWatch, Retirement, expired};
use crate::{Authority, GameInstance, Lobby, LobbyConfig, LobbyError, LobbyEvent, LobbyInstance};

/// The manager is the authoritative side: it mints the token its
/// mutators need.
const AUTHORITY: Authority = Authority::server();

/// Snapshot of both scene pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub target: usize,
    pub lobby_available: usize,
    pub lobby_pending: usize,
    pub game_available: usize,
    pub game_pending: usize,
}

/// Owns every lobby, both scene pools, and the scene bindings.
///
/// Not thread-safe on purpose: exactly one task drives it (see
/// [`spawn_lobby_manager`](crate::spawn_lobby_manager)). Host completions
/// must be fed back through [`handle_host_event`](Self::handle_host_event)
/// on that same task.
///
/// Key invariants:
/// - a client is in at most one lobby (`client_lobbies` mirrors lobby
///   membership)
/// - a scene is bound to at most one lobby
/// - lobbies are kept in creation order, so "first joinable" is the oldest
pub struct LobbyManager<H: SceneHost> {
    config: LobbyConfig,
    host: H,
    lobbies: Vec<Lobby>,
    client_lobbies: HashMap<ClientId, LobbyId>,
    lobby_pool: ResourcePool,
    game_pool: ResourcePool,
    lobby_bindings: HashMap<ResourceId, LobbyInstance>,
    game_bindings: HashMap<ResourceId, GameInstance>,
    retirements: Vec<Retirement>,
    readiness: Vec<ReadinessWatch>,
    events: broadcast::Sender<LobbyEvent>,
}

impl<H: SceneHost> LobbyManager<H> {
    /// Validates `config` and builds an idle manager. Nothing is loaded
    /// until [`start`](Self::start).
    pub fn new(config: LobbyConfig, host: H) -> Result<Self, LobbyError> {
        let config = config.validated().inspect_err(|err| {
            tracing::error!(%err, "lobby manager disabled");
        })?;
        let (events, _) = broadcast::channel(config.event_capacity);

        Ok(Self {
            lobby_pool: ResourcePool::new(
                config.lobby_scene.clone(),
                MarkerKind::Lobby,
                config.max_pooled_scenes,
            ),
            game_pool: ResourcePool::new(
                config.game_scene.clone(),
                MarkerKind::Game,
                config.max_pooled_scenes,
            ),
            config,
            host,
            lobbies: Vec::new(),
            client_lobbies: HashMap::new(),
            lobby_bindings: HashMap::new(),
            game_bindings: HashMap::new(),
            retirements: Vec::new(),
            readiness: Vec::new(),
            events,
        })
    }

    /// Begins filling both pools.
    pub fn start(&mut self) {
        self.lobby_pool.ensure_filled(&self.host);
        self.game_pool.ensure_filled(&self.host);
        tracing::info!(
            lobby_scene = %self.config.lobby_scene,
            game_scene = %self.config.game_scene,
            pool_target = self.config.max_pooled_scenes,
            "lobby manager started"
        );
    }

    /// Feeds a host completion back in. Load completions go to the pools;
    /// every event re-checks pending watchers.
    pub fn handle_host_event(&mut self, event: HostEvent) {
        match &event {
            HostEvent::LoadEnd(end) => {
                if self.lobby_pool.on_load_end(end, &self.host).is_none() {
                    self.game_pool.on_load_end(end, &self.host);
                }
            }
            HostEvent::UnloadEnd { resource } => {
                tracing::debug!(%resource, "scene unloaded");
            }
            HostEvent::ClientMaterialized { .. } | HostEvent::ObjectsChanged { .. } => {}
        }
        self.poll_watchers(Instant::now());
    }

    // -----------------------------------------------------------------
    // Admission
    // -----------------------------------------------------------------

    /// Places `client` in a lobby and moves it into the lobby's scene.
    ///
    /// A client already in a lobby gets that lobby back unchanged.
    /// Otherwise it joins the oldest joinable lobby, or a new one if none
    /// is joinable. Fails with [`LobbyError::PoolExhausted`] when a new
    /// lobby is needed and no pooled scene is ready.
    pub fn request_lobby(&mut self, client: ClientId) -> Result<LobbySummary, LobbyError> {
        if let Some(lobby) = self.lobby_of(client) {
            return Ok(lobby.summary());
        }

        let lobby_id = match self.lobbies.iter().find(|lobby| lobby.can_join()) {
            Some(lobby) => lobby.id().clone(),
            None => self.create_lobby().ok_or_else(|| {
                tracing::warn!(%client, "no pooled lobby scene available");
                LobbyError::PoolExhausted
            })?,
        };

        let lobby = self
            .lobbies
            .iter_mut()
            .find(|lobby| lobby.id() == &lobby_id)
            .ok_or_else(|| LobbyError::NotFound(lobby_id.clone()))?;
        lobby.join(AUTHORITY, client);
        let resource = lobby.resource();
        let summary = lobby.summary();

        self.client_lobbies.insert(client, lobby_id.clone());
        self.host.move_clients(&[client], resource);
        tracing::info!(
            %lobby_id,
            %client,
            %resource,
            members = summary.members.len(),
            "client joined lobby"
        );
        Ok(summary)
    }

    /// Backs a new, empty lobby with the oldest pooled lobby scene.
    ///
    /// Returns `None` without touching the registry if the pool is empty.
    /// Either way the pool is asked to refill.
    pub fn create_lobby(&mut self) -> Option<LobbyId> {
        let taken = self.lobby_pool.take();
        self.lobby_pool.ensure_filled(&self.host);
        let resource = taken?;

        let lobby_id = self.generate_lobby_id();
        let mut binding = LobbyInstance::new();
        binding.use_for(AUTHORITY, &lobby_id);
        self.lobby_bindings.insert(resource, binding);
        self.lobbies.push(Lobby::new(
            lobby_id.clone(),
            resource,
            self.config.min_lobby_clients,
            self.config.max_lobby_clients,
            self.events.clone(),
        ));

        let _ = self.events.send(LobbyEvent::Created {
            lobby_id: lobby_id.clone(),
            resource,
        });
        tracing::info!(%lobby_id, %resource, "lobby created");
        Some(lobby_id)
    }

    // -----------------------------------------------------------------
    // Promotion
    // -----------------------------------------------------------------

    /// Owner-only start. Ignored (returns `false`) when `sender` is in no
    /// lobby, is not the owner, or the lobby is already started.
    /// [`Lobby::can_start`] is advisory and not checked here.
    pub fn start_lobby(&mut self, sender: ClientId) -> bool {
        let Some(lobby) = self.lobby_of(sender) else {
            tracing::debug!(%sender, "start from client in no lobby, ignoring");
            return false;
        };
        if lobby.owner() != Some(sender) {
            tracing::debug!(lobby_id = %lobby.id(), %sender, "start from non-owner, ignoring");
            return false;
        }
        if lobby.is_started() {
            tracing::debug!(lobby_id = %lobby.id(), "lobby already started, ignoring");
            return false;
        }
        let lobby_id = lobby.id().clone();
        self.switch_to_game(&lobby_id).is_ok()
    }

    /// Starts `lobby_id` and moves its members into a pooled game scene.
    ///
    /// The old lobby scene is retired and a readiness watcher is armed on
    /// the new one. If no game scene is pooled the lobby stays started in
    /// its lobby scene and `Ok(None)` is returned. Nothing is rolled back.
    pub fn switch_to_game(&mut self, lobby_id: &LobbyId) -> Result<Option<ResourceId>, LobbyError> {
        let lobby = self
            .lobbies
            .iter_mut()
            .find(|lobby| lobby.id() == lobby_id)
            .ok_or_else(|| LobbyError::NotFound(lobby_id.clone()))?;

        lobby.start(AUTHORITY);
        let previous = lobby.resource();
        let game_resource = self.game_pool.take();
        if let Some(resource) = game_resource {
            lobby.set_resource(AUTHORITY, resource);
            let mut game = GameInstance::new(resource, self.events.clone());
            game.use_for(AUTHORITY, lobby_id);
            self.game_bindings.insert(resource, game);
            self.host.move_clients(lobby.members(), resource);
        }
        self.game_pool.ensure_filled(&self.host);

        let Some(resource) = game_resource else {
            tracing::warn!(%lobby_id, "no pooled game scene, lobby stays in its lobby scene");
            return Ok(None);
        };

        let now = Instant::now();
        self.lobby_bindings.remove(&previous);
        self.retire(previous, now);
        self.readiness.push(ReadinessWatch {
            lobby_id: lobby_id.clone(),
            resource,
            since: now,
        });
        tracing::info!(%lobby_id, from = %previous, to = %resource, "lobby promoted to game");
        Ok(Some(resource))
    }

    // -----------------------------------------------------------------
    // Membership and reclamation
    // -----------------------------------------------------------------

    /// A client connected.
    pub fn client_connected(&mut self, client: ClientId) {
        self.host.client_connected(client);
        tracing::debug!(%client, "client connected");
    }

    /// A client disconnected: it leaves its lobby, then the host is told.
    pub fn client_disconnected(&mut self, client: ClientId) {
        self.leave(client);
        self.host.client_disconnected(client);
        tracing::debug!(%client, "client disconnected");
    }

    /// Removes `client` from its lobby. Returns `false` if it was in none.
    ///
    /// The binding of the lobby's current scene decides whether the lobby
    /// is now empty and must be reclaimed.
    pub fn leave(&mut self, client: ClientId) -> bool {
        let Some(lobby_id) = self.client_lobbies.remove(&client) else {
            return false;
        };
        let Some(lobby) = self.lobbies.iter_mut().find(|lobby| lobby.id() == &lobby_id) else {
            return false;
        };
        if !lobby.leave(AUTHORITY, client) {
            return false;
        }
        tracing::info!(
            %lobby_id,
            %client,
            owner = ?lobby.owner(),
            members = lobby.len(),
            "client left lobby"
        );

        let resource = lobby.resource();
        let reclaim = match self.game_bindings.get(&resource) {
            Some(game) => game.client_left(lobby),
            None => self
                .lobby_bindings
                .get(&resource)
                .is_some_and(|binding| binding.client_left(lobby)),
        };
        if reclaim {
            self.cleanup_lobby(&lobby_id);
        }
        true
    }

    /// Removes a lobby and schedules its scene for unload once no client
    /// object remains in it. Returns `false` if the lobby is unknown.
    pub fn cleanup_lobby(&mut self, lobby_id: &LobbyId) -> bool {
        let Some(index) = self.lobbies.iter().position(|lobby| lobby.id() == lobby_id) else {
            return false;
        };
        let lobby = self.lobbies.remove(index);
        self.client_lobbies.retain(|_, id| id != lobby_id);

        let resource = lobby.resource();
        self.lobby_bindings.remove(&resource);
        self.game_bindings.remove(&resource);
        self.readiness.retain(|watch| &watch.lobby_id != lobby_id);
        self.retire(resource, Instant::now());

        let _ = self.events.send(LobbyEvent::Closed {
            lobby_id: lobby_id.clone(),
        });
        tracing::info!(%lobby_id, %resource, "lobby closed");
        true
    }

    /// Locks or unlocks a lobby against new members.
    pub fn set_lobby_locked(&mut self, lobby_id: &LobbyId, locked: bool) -> Result<(), LobbyError> {
        let lobby = self
            .lobbies
            .iter_mut()
            .find(|lobby| lobby.id() == lobby_id)
            .ok_or_else(|| LobbyError::NotFound(lobby_id.clone()))?;
        lobby.set_locked(AUTHORITY, locked);
        tracing::info!(%lobby_id, locked, "lobby lock changed");
        Ok(())
    }

    /// Owner-only lock toggle. Ignored (returns `false`) for anyone else.
    pub fn request_lock(&mut self, sender: ClientId, locked: bool) -> bool {
        let Some(lobby) = self.lobby_of(sender) else {
            return false;
        };
        if lobby.owner() != Some(sender) {
            tracing::debug!(lobby_id = %lobby.id(), %sender, "lock from non-owner, ignoring");
            return false;
        }
        let lobby_id = lobby.id().clone();
        self.set_lobby_locked(&lobby_id, locked).is_ok()
    }

    // -----------------------------------------------------------------
    // Watchers
    // -----------------------------------------------------------------

    /// Re-checks pending scene retirements and readiness barriers.
    pub fn poll_watchers(&mut self, now: Instant) {
        let host = &self.host;
        let unload_timeout = self.config.unload_timeout;
        self.retirements.retain(|retirement| {
            let resource = retirement.resource;
            if !host.has_client_objects(resource) {
                tracing::info!(%resource, "retired scene vacated, unloading");
            } else if expired(retirement.since, now, unload_timeout) {
                tracing::warn!(%resource, "client objects still in retired scene, forcing unload");
            } else {
                return true;
            }
            host.unload(resource);
            false
        });

        let watches = std::mem::take(&mut self.readiness);
        for watch in watches {
            if self.check_readiness(&watch, now) {
                self.readiness.push(watch);
            }
        }
    }

    /// Returns `true` while the watch must stay armed.
    fn check_readiness(&mut self, watch: &ReadinessWatch, now: Instant) -> bool {
        let Some(lobby) = self.lobbies.iter().find(|lobby| lobby.id() == &watch.lobby_id) else {
            return false;
        };
        if lobby.resource() != watch.resource {
            return false;
        }
        let Some(game) = self.game_bindings.get_mut(&watch.resource) else {
            return false;
        };
        if game.state() != GameState::Used {
            return false;
        }

        let host = &self.host;
        let all_present = lobby.members().iter().all(|client| {
            host.presence(*client)
                .is_some_and(|presence| presence.materialized_in(watch.resource))
        });
        if all_present {
            game.ready(AUTHORITY);
            tracing::info!(lobby_id = %watch.lobby_id, resource = %watch.resource, "game ready");
            return false;
        }
        if expired(watch.since, now, self.config.readiness_timeout) {
            tracing::warn!(
                lobby_id = %watch.lobby_id,
                resource = %watch.resource,
                "members did not all arrive in the game scene, giving up"
            );
            let _ = self.events.send(LobbyEvent::ReadinessTimedOut {
                lobby_id: watch.lobby_id.clone(),
            });
            return false;
        }
        true
    }

    /// `true` while any retirement or readiness barrier is pending.
    pub fn has_watchers(&self) -> bool {
        !self.retirements.is_empty() || !self.readiness.is_empty()
    }

    pub fn pending_retirements(&self) -> usize {
        self.retirements.len()
    }

    pub fn pending_readiness(&self) -> usize {
        self.readiness.len()
    }

    fn retire(&mut self, resource: ResourceId, now: Instant) {
        if self.retirements.iter().any(|r| r.resource == resource) {
            return;
        }
        tracing::debug!(%resource, "scene retirement scheduled");
        self.retirements.push(Retirement { resource, since: now });
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    pub fn lobby(&self, lobby_id: &LobbyId) -> Option<&Lobby> {
        self.lobbies.iter().find(|lobby| lobby.id() == lobby_id)
    }

    /// The lobby `client` is in, if any.
    pub fn lobby_of(&self, client: ClientId) -> Option<&Lobby> {
        let lobby_id = self.client_lobbies.get(&client)?;
        self.lobby(lobby_id)
    }

    /// Lobbies in creation order.
    pub fn lobbies(&self) -> &[Lobby] {
        &self.lobbies
    }

    pub fn summaries(&self) -> Vec<LobbySummary> {
        self.lobbies.iter().map(Lobby::summary).collect()
    }

    pub fn pool_status(&self) -> PoolStatus {
        PoolStatus {
            target: self.config.max_pooled_scenes,
            lobby_available: self.lobby_pool.len(),
            lobby_pending: self.lobby_pool.pending(),
            game_available: self.game_pool.len(),
            game_pending: self.game_pool.pending(),
        }
    }

    /// The game binding of a lobby's current scene, if it is a game scene.
    pub fn game_instance(&self, lobby_id: &LobbyId) -> Option<&GameInstance> {
        let lobby = self.lobby(lobby_id)?;
        self.game_bindings.get(&lobby.resource())
    }

    /// A read-only view of a lobby's game state.
    pub fn game_state_of(&self, lobby_id: &LobbyId) -> Option<watch::Receiver<GameState>> {
        self.game_instance(lobby_id).map(GameInstance::subscribe)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LobbyEvent> {
        self.events.subscribe()
    }

    pub fn event_sender(&self) -> broadcast::Sender<LobbyEvent> {
        self.events.clone()
    }

    pub fn config(&self) -> &LobbyConfig {
        &self.config
    }

    fn generate_lobby_id(&self) -> LobbyId {
        let mut rng = rand::rng();
        loop {
            let raw: u64 = rng.random();
            let id = LobbyId::new(format!("{raw:016x}"));
            if self.lobby(&id).is_none() {
                return id;
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `LobbyManager` internals. Scenario coverage lives in
    //! `tests/lobby_manager.rs`.

    use std::collections::HashSet;

    use lobbyforge_pool::ClientPresence;
    use lobbyforge_protocol::TemplateId;

    use super::*;

    /// A host where every request vanishes and every query says "empty".
    struct NullHost;

    impl SceneHost for NullHost {
        fn load(&self, _template: &TemplateId) {}
        fn unload(&self, _resource: ResourceId) {}
        fn move_clients(&self, _clients: &[ClientId], _resource: ResourceId) {}
        fn marker(&self, _resource: ResourceId) -> Option<MarkerKind> {
            None
        }
        fn has_client_objects(&self, _resource: ResourceId) -> bool {
            false
        }
        fn presence(&self, _client: ClientId) -> Option<ClientPresence> {
            None
        }
    }

    fn config() -> LobbyConfig {
        LobbyConfig::new(TemplateId::new("Scenes/Lobby"), TemplateId::new("Scenes/Game"))
    }

    #[test]
    fn test_new_without_templates_fails() {
        let result = LobbyManager::new(LobbyConfig::default(), NullHost);
        assert!(matches!(result, Err(LobbyError::MissingTemplate(_))));
    }

    #[test]
    fn test_start_requests_both_pools() {
        let mut manager = LobbyManager::new(
            LobbyConfig {
                max_pooled_scenes: 3,
                ..config()
            },
            NullHost,
        )
        .unwrap();
        manager.start();
        let status = manager.pool_status();
        assert_eq!(status.lobby_pending, 3);
        assert_eq!(status.game_pending, 3);
        assert_eq!(status.lobby_available, 0);
    }

    #[test]
    fn test_create_lobby_on_empty_pool_returns_none() {
        let mut manager = LobbyManager::new(config(), NullHost).unwrap();
        assert_eq!(manager.create_lobby(), None);
        assert!(manager.lobbies().is_empty());
        assert_eq!(manager.pool_status().lobby_pending, 1, "refill still requested");
    }

    #[test]
    fn test_request_lobby_on_empty_pool_is_exhausted() {
        let mut manager = LobbyManager::new(config(), NullHost).unwrap();
        let result = manager.request_lobby(ClientId(1));
        assert!(matches!(result, Err(LobbyError::PoolExhausted)));
        assert!(manager.lobby_of(ClientId(1)).is_none());
    }

    #[test]
    fn test_generate_lobby_id_is_unique_hex() {
        let manager = LobbyManager::new(config(), NullHost).unwrap();
        let ids: HashSet<_> = (0..100).map(|_| manager.generate_lobby_id()).collect();
        assert_eq!(ids.len(), 100);
        for id in &ids {
            assert_eq!(id.as_str().len(), 16);
            assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_unknown_lobby_operations_report_not_found() {
        let mut manager = LobbyManager::new(config(), NullHost).unwrap();
        let ghost = LobbyId::new("ghost");
        assert!(matches!(
            manager.switch_to_game(&ghost),
            Err(LobbyError::NotFound(_))
        ));
        assert!(matches!(
            manager.set_lobby_locked(&ghost, true),
            Err(LobbyError::NotFound(_))
        ));
        assert!(!manager.cleanup_lobby(&ghost));
        assert!(!manager.leave(ClientId(1)));
        assert!(!manager.start_lobby(ClientId(1)));
        assert!(!manager.request_lock(ClientId(1), true));
    }

    #[test]
    fn test_retire_same_scene_twice_is_scheduled_once() {
        let mut manager = LobbyManager::new(config(), NullHost).unwrap();
        let now = Instant::now();
        manager.retire(ResourceId(4), now);
        manager.retire(ResourceId(4), now);
        assert_eq!(manager.pending_retirements(), 1);
        assert!(manager.has_watchers());

        manager.poll_watchers(now);
        assert!(!manager.has_watchers(), "empty scene unloads on the first check");
    }
}
