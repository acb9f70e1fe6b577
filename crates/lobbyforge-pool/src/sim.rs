//! An in-process [`SceneHost`] with simulated latencies.
//!
//! `SimHost` keeps a tiny model of the world (which scenes exist, where
//! each client's primary object is) and reports changes as
//! [`HostEvent`]s after configurable delays. It lets the server run
//! headless and gives tests a host whose completions really do arrive
//! later, out of order, on another task.
//!
//! Requests spawn Tokio tasks, so they must be issued from inside a
//! runtime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lobbyforge_protocol::{ClientId, ResourceId, TemplateId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{ClientPresence, HostEvent, LoadEnd, LoadedScene, MarkerKind, SceneHost};

/// Latencies and scene contents for [`SimHost`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Base time to load a scene.
    pub load_delay: Duration,
    /// Random extra load time in `0..=load_jitter`, so completions can
    /// arrive out of request order.
    pub load_jitter: Duration,
    /// Time for a moved object to appear in its new scene.
    pub move_delay: Duration,
    /// Time to unload a scene.
    pub unload_delay: Duration,
    /// Templates whose scenes carry a game marker. Every other template
    /// carries a lobby marker.
    pub game_templates: Vec<TemplateId>,
    /// Templates whose scenes carry no marker at all.
    pub unmarked_templates: Vec<TemplateId>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            load_delay: Duration::from_millis(50),
            load_jitter: Duration::from_millis(20),
            move_delay: Duration::from_millis(30),
            unload_delay: Duration::from_millis(20),
            game_templates: Vec::new(),
            unmarked_templates: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct SimScene {
    template: TemplateId,
    marker: Option<MarkerKind>,
}

#[derive(Debug, Default)]
struct SimWorld {
    next_resource: u64,
    scenes: HashMap<ResourceId, SimScene>,
    clients: HashMap<ClientId, ClientPresence>,
}

/// Simulated engine. Cheap to clone; clones share the same world.
#[derive(Debug, Clone)]
pub struct SimHost {
    config: Arc<SimConfig>,
    world: Arc<Mutex<SimWorld>>,
    events: mpsc::UnboundedSender<HostEvent>,
}

impl SimHost {
    /// Creates a host and the receiver its events are delivered on.
    pub fn new(config: SimConfig) -> (Self, mpsc::UnboundedReceiver<HostEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let host = Self {
            config: Arc::new(config),
            world: Arc::new(Mutex::new(SimWorld::default())),
            events,
        };
        (host, rx)
    }

    /// Number of scenes currently loaded.
    pub fn scene_count(&self) -> usize {
        self.world().scenes.len()
    }

    pub fn is_loaded(&self, resource: ResourceId) -> bool {
        self.world().scenes.contains_key(&resource)
    }

    /// Template of a loaded scene.
    pub fn template_of(&self, resource: ResourceId) -> Option<TemplateId> {
        self.world()
            .scenes
            .get(&resource)
            .map(|scene| scene.template.clone())
    }

    /// Disables or re-enables a client's object, e.g. to simulate a client
    /// that stalls while loading.
    pub fn set_active(&self, client: ClientId, active: bool) {
        if let Some(presence) = self.world().clients.get_mut(&client) {
            presence.active = active;
        }
    }

    fn world(&self) -> MutexGuard<'_, SimWorld> {
        self.world.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn marker_for(&self, template: &TemplateId) -> Option<MarkerKind> {
        if self.config.unmarked_templates.contains(template) {
            None
        } else if self.config.game_templates.contains(template) {
            Some(MarkerKind::Game)
        } else {
            Some(MarkerKind::Lobby)
        }
    }

    fn load_time(&self) -> Duration {
        let jitter_ms = self.config.load_jitter.as_millis() as u64;
        let extra = if jitter_ms > 0 {
            rand::rng().random_range(0..=jitter_ms)
        } else {
            0
        };
        self.config.load_delay + Duration::from_millis(extra)
    }
}

impl SceneHost for SimHost {
    fn load(&self, template: &TemplateId) {
        let resource = {
            let mut world = self.world();
            world.next_resource += 1;
            ResourceId(world.next_resource)
        };
        let template = template.clone();
        let marker = self.marker_for(&template);
        let delay = self.load_time();
        let world = Arc::clone(&self.world);
        let events = self.events.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            world
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .scenes
                .insert(
                    resource,
                    SimScene {
                        template: template.clone(),
                        marker,
                    },
                );
            tracing::trace!(%resource, %template, "sim scene loaded");
            let _ = events.send(HostEvent::LoadEnd(LoadEnd {
                loaded: vec![LoadedScene { resource, template }],
            }));
        });
    }

    fn unload(&self, resource: ResourceId) {
        let delay = self.config.unload_delay;
        let world = Arc::clone(&self.world);
        let events = self.events.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut world = world.lock().unwrap_or_else(PoisonError::into_inner);
                if world.scenes.remove(&resource).is_none() {
                    return;
                }
                for presence in world.clients.values_mut() {
                    presence.scenes.retain(|s| *s != resource);
                    if presence.root_of == Some(resource) {
                        presence.root_of = None;
                    }
                }
            }
            tracing::trace!(%resource, "sim scene unloaded");
            let _ = events.send(HostEvent::UnloadEnd { resource });
        });
    }

    fn move_clients(&self, clients: &[ClientId], resource: ResourceId) {
        let clients = clients.to_vec();
        let delay = self.config.move_delay;
        let world = Arc::clone(&self.world);
        let events = self.events.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut emitted = Vec::new();
            {
                let mut world = world.lock().unwrap_or_else(PoisonError::into_inner);
                if !world.scenes.contains_key(&resource) {
                    return;
                }
                for client in clients {
                    let Some(presence) = world.clients.get_mut(&client) else {
                        continue;
                    };
                    if let Some(previous) = presence.root_of.replace(resource) {
                        if previous != resource {
                            emitted.push(HostEvent::ObjectsChanged { resource: previous });
                        }
                    }
                    presence.scenes = vec![resource];
                    emitted.push(HostEvent::ClientMaterialized { client, resource });
                }
            }
            for event in emitted {
                let _ = events.send(event);
            }
        });
    }

    fn marker(&self, resource: ResourceId) -> Option<MarkerKind> {
        self.world().scenes.get(&resource).and_then(|scene| scene.marker)
    }

    fn has_client_objects(&self, resource: ResourceId) -> bool {
        self.world()
            .clients
            .values()
            .any(|presence| presence.root_of == Some(resource))
    }

    fn presence(&self, client: ClientId) -> Option<ClientPresence> {
        self.world().clients.get(&client).cloned()
    }

    fn client_connected(&self, client: ClientId) {
        self.world().clients.insert(
            client,
            ClientPresence {
                active: true,
                scenes: Vec::new(),
                root_of: None,
            },
        );
    }

    fn client_disconnected(&self, client: ClientId) {
        let left = self.world().clients.remove(&client).and_then(|p| p.root_of);
        if let Some(resource) = left {
            let _ = self.events.send(HostEvent::ObjectsChanged { resource });
        }
    }
}
