//! The `SceneHost` trait: everything the lobby layer needs from the engine.
//!
//! Requests (`load`, `unload`, `move_clients`) return immediately; their
//! outcome is reported later as a [`HostEvent`] on the channel the host
//! was created with. Queries (`marker`, `has_client_objects`, `presence`)
//! answer synchronously from the host's current view of the world.

use lobbyforge_protocol::{ClientId, ResourceId, TemplateId};

/// The binding object a scene exposes so it can be attached to a lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    /// A plain lobby binding.
    Lobby,
    /// A game binding: a lobby binding that can also report readiness.
    Game,
}

impl MarkerKind {
    /// Returns `true` if a scene carrying `self` can serve where
    /// `required` is expected. A game marker specializes the lobby one.
    pub fn satisfies(self, required: MarkerKind) -> bool {
        match required {
            MarkerKind::Lobby => true,
            MarkerKind::Game => self == MarkerKind::Game,
        }
    }
}

/// One scene produced by a load request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedScene {
    pub resource: ResourceId,
    pub template: TemplateId,
}

/// Completion of a load request. Other subsystems share the same signal,
/// so a pool must expect events that are not its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadEnd {
    pub loaded: Vec<LoadedScene>,
}

/// Where a client's primary object currently is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientPresence {
    /// The object exists and is enabled.
    pub active: bool,
    /// Scenes the client currently has loaded.
    pub scenes: Vec<ResourceId>,
    /// The scene whose root objects include the client's object.
    pub root_of: Option<ResourceId>,
}

impl ClientPresence {
    /// The object is enabled, the client has `resource` loaded, and the
    /// object sits at the root of `resource`.
    pub fn materialized_in(&self, resource: ResourceId) -> bool {
        self.active && self.scenes.contains(&resource) && self.root_of == Some(resource)
    }
}

/// Events the host reports back to the lobby layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// A load request finished.
    LoadEnd(LoadEnd),
    /// A scene was unloaded.
    UnloadEnd { resource: ResourceId },
    /// A client's primary object arrived in a scene.
    ClientMaterialized { client: ClientId, resource: ResourceId },
    /// Client objects entered or left a scene.
    ObjectsChanged { resource: ResourceId },
}

/// The engine, as seen from the lobby layer.
///
/// Methods take `&self`: the host owns its own synchronization. All
/// calls come from the single task that owns the lobby manager.
pub trait SceneHost: Send + Sync + 'static {
    /// Starts loading a fresh, stackable instance of `template`.
    /// Completion arrives as [`HostEvent::LoadEnd`].
    fn load(&self, template: &TemplateId);

    /// Starts unloading `resource`.
    fn unload(&self, resource: ResourceId);

    /// Moves each client's primary object into `resource`, replacing every
    /// scene the client had loaded and making `resource` its active scene.
    /// Clients are moved in slice order.
    fn move_clients(&self, clients: &[ClientId], resource: ResourceId);

    /// The binding object carried by `resource`, if any.
    fn marker(&self, resource: ResourceId) -> Option<MarkerKind>;

    /// Returns `true` while any client-controlled object is inside `resource`.
    fn has_client_objects(&self, resource: ResourceId) -> bool;

    /// Where the client's primary object is, or `None` if it has none.
    fn presence(&self, client: ClientId) -> Option<ClientPresence>;

    /// A client connected. Hosts that spawn a primary object per
    /// connection do it here.
    fn client_connected(&self, _client: ClientId) {}

    /// A client disconnected.
    fn client_disconnected(&self, _client: ClientId) {}
}
