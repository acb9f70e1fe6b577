//! Integration tests for `ResourcePool` against a recording host and the
//! simulated host.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use lobbyforge_pool::{
    ClientPresence, HostEvent, LoadEnd, LoadedScene, MarkerKind, ResourcePool, SceneHost,
    SimConfig, SimHost,
};
use lobbyforge_protocol::{ClientId, ResourceId, TemplateId};

// =========================================================================
// Recording host: loads are only recorded; the test plays the engine.
// =========================================================================

#[derive(Default)]
struct RecordingHost {
    loads: Mutex<Vec<TemplateId>>,
    markers: Mutex<HashMap<ResourceId, MarkerKind>>,
}

impl RecordingHost {
    fn load_count(&self) -> usize {
        self.loads.lock().unwrap().len()
    }

    fn mark(&self, resource: ResourceId, kind: MarkerKind) {
        self.markers.lock().unwrap().insert(resource, kind);
    }
}

impl SceneHost for RecordingHost {
    fn load(&self, template: &TemplateId) {
        self.loads.lock().unwrap().push(template.clone());
    }
    fn unload(&self, _resource: ResourceId) {}
    fn move_clients(&self, _clients: &[ClientId], _resource: ResourceId) {}
    fn marker(&self, resource: ResourceId) -> Option<MarkerKind> {
        self.markers.lock().unwrap().get(&resource).copied()
    }
    fn has_client_objects(&self, _resource: ResourceId) -> bool {
        false
    }
    fn presence(&self, _client: ClientId) -> Option<ClientPresence> {
        None
    }
}

fn lobby_template() -> TemplateId {
    TemplateId::new("Scenes/Lobby")
}

fn load_end(resource: u64, template: &TemplateId) -> LoadEnd {
    LoadEnd {
        loaded: vec![LoadedScene {
            resource: ResourceId(resource),
            template: template.clone(),
        }],
    }
}

/// Marks `resource` as a lobby scene and delivers its completion.
fn complete(pool: &mut ResourcePool, host: &RecordingHost, resource: u64) -> Option<ResourceId> {
    host.mark(ResourceId(resource), MarkerKind::Lobby);
    pool.on_load_end(&load_end(resource, &lobby_template()), host)
}

// =========================================================================
// Refill policy
// =========================================================================

#[test]
fn test_ensure_filled_requests_up_to_target() {
    let host = RecordingHost::default();
    let mut pool = ResourcePool::new(lobby_template(), MarkerKind::Lobby, 3);

    assert_eq!(pool.ensure_filled(&host), 3);
    assert_eq!(host.load_count(), 3);
    assert_eq!(pool.pending(), 3);
}

#[test]
fn test_ensure_filled_counts_in_flight_requests() {
    let host = RecordingHost::default();
    let mut pool = ResourcePool::new(lobby_template(), MarkerKind::Lobby, 2);

    pool.ensure_filled(&host);
    assert_eq!(pool.ensure_filled(&host), 0, "nothing more while loads are pending");
    assert_eq!(host.load_count(), 2);
}

#[test]
fn test_zero_target_is_raised_to_one() {
    let pool = ResourcePool::new(lobby_template(), MarkerKind::Lobby, 0);
    assert_eq!(pool.target(), 1);
}

#[test]
fn test_pool_scenario_drain_and_refill_restores_target() {
    // target = 2, template "L": two completions → 2 pooled; take → 1;
    // next refill cycle → back to 2.
    let host = RecordingHost::default();
    let mut pool = ResourcePool::new(lobby_template(), MarkerKind::Lobby, 2);
    pool.ensure_filled(&host);

    assert_eq!(complete(&mut pool, &host, 1), Some(ResourceId(1)));
    assert_eq!(complete(&mut pool, &host, 2), Some(ResourceId(2)));
    assert_eq!(pool.len(), 2);
    assert!(!pool.is_listening());

    assert_eq!(pool.take(), Some(ResourceId(1)), "oldest scene first");
    assert_eq!(pool.len(), 1);

    assert_eq!(pool.ensure_filled(&host), 1);
    assert_eq!(complete(&mut pool, &host, 3), Some(ResourceId(3)));
    assert_eq!(pool.len(), 2);
    assert_eq!(host.load_count(), 3);
}

#[test]
fn test_take_is_fifo() {
    let host = RecordingHost::default();
    let mut pool = ResourcePool::new(lobby_template(), MarkerKind::Lobby, 3);
    pool.ensure_filled(&host);
    for id in [7, 3, 5] {
        complete(&mut pool, &host, id);
    }

    assert_eq!(pool.take(), Some(ResourceId(7)));
    assert_eq!(pool.take(), Some(ResourceId(3)));
    assert_eq!(pool.take(), Some(ResourceId(5)));
    assert_eq!(pool.take(), None);
}

// =========================================================================
// Completion filtering
// =========================================================================

#[test]
fn test_on_load_end_ignored_when_full() {
    let host = RecordingHost::default();
    let mut pool = ResourcePool::new(lobby_template(), MarkerKind::Lobby, 1);
    pool.ensure_filled(&host);
    complete(&mut pool, &host, 1);

    assert_eq!(complete(&mut pool, &host, 2), None);
    assert_eq!(pool.len(), 1, "pool never exceeds its target");
}

#[test]
fn test_on_load_end_ignores_multi_scene_events() {
    let host = RecordingHost::default();
    let mut pool = ResourcePool::new(lobby_template(), MarkerKind::Lobby, 2);
    pool.ensure_filled(&host);
    host.mark(ResourceId(1), MarkerKind::Lobby);
    host.mark(ResourceId(2), MarkerKind::Lobby);

    let mut event = load_end(1, &lobby_template());
    event.loaded.push(LoadedScene {
        resource: ResourceId(2),
        template: lobby_template(),
    });

    assert_eq!(pool.on_load_end(&event, &host), None);
    assert_eq!(pool.on_load_end(&LoadEnd { loaded: vec![] }, &host), None);
    assert!(pool.is_empty());
    assert_eq!(pool.pending(), 2, "foreign events settle nothing");
}

#[test]
fn test_on_load_end_ignores_other_templates() {
    let host = RecordingHost::default();
    let mut pool = ResourcePool::new(lobby_template(), MarkerKind::Lobby, 1);
    pool.ensure_filled(&host);
    host.mark(ResourceId(1), MarkerKind::Lobby);

    let event = load_end(1, &TemplateId::new("Scenes/Menu"));
    assert_eq!(pool.on_load_end(&event, &host), None);
    assert_eq!(pool.pending(), 1);
}

#[test]
fn test_on_load_end_rejects_already_pooled_scene() {
    let host = RecordingHost::default();
    let mut pool = ResourcePool::new(lobby_template(), MarkerKind::Lobby, 2);
    pool.ensure_filled(&host);

    complete(&mut pool, &host, 1);
    assert_eq!(complete(&mut pool, &host, 1), None);
    assert_eq!(pool.len(), 1);
}

#[test]
fn test_on_load_end_rejects_scene_without_marker() {
    let host = RecordingHost::default();
    let mut pool = ResourcePool::new(lobby_template(), MarkerKind::Lobby, 1);
    pool.ensure_filled(&host);

    let accepted = pool.on_load_end(&load_end(1, &lobby_template()), &host);
    assert_eq!(accepted, None);
    assert!(pool.is_empty());
    assert_eq!(pool.pending(), 0, "the request is settled, not retried");
    assert_eq!(pool.ensure_filled(&host), 1, "the next refill cycle tries again");
}

#[test]
fn test_game_pool_requires_game_marker() {
    let host = RecordingHost::default();
    let game = TemplateId::new("Scenes/Game");
    let mut pool = ResourcePool::new(game.clone(), MarkerKind::Game, 2);
    pool.ensure_filled(&host);

    host.mark(ResourceId(1), MarkerKind::Lobby);
    host.mark(ResourceId(2), MarkerKind::Game);

    assert_eq!(pool.on_load_end(&load_end(1, &game), &host), None);
    assert_eq!(pool.on_load_end(&load_end(2, &game), &host), Some(ResourceId(2)));
}

// =========================================================================
// Against the simulated host
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_sim_host_fills_pool_asynchronously() {
    let template = lobby_template();
    let (host, mut events) = SimHost::new(SimConfig::default());
    let mut pool = ResourcePool::new(template.clone(), MarkerKind::Lobby, 2);

    pool.ensure_filled(&host);
    assert!(pool.is_empty(), "nothing is ready before the loads finish");

    while pool.len() < 2 {
        match tokio::time::timeout(Duration::from_secs(5), events.recv()).await {
            Ok(Some(HostEvent::LoadEnd(end))) => {
                pool.on_load_end(&end, &host);
            }
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => panic!("sim host stopped delivering loads"),
        }
    }

    assert_eq!(host.scene_count(), 2);
    assert_eq!(pool.pending(), 0);
    let first = pool.take().unwrap();
    assert_eq!(host.template_of(first), Some(template));
}

#[tokio::test(start_paused = true)]
async fn test_sim_host_unmarked_template_is_never_pooled() {
    let template = lobby_template();
    let (host, mut events) = SimHost::new(SimConfig {
        unmarked_templates: vec![template.clone()],
        ..SimConfig::default()
    });
    let mut pool = ResourcePool::new(template, MarkerKind::Lobby, 1);
    pool.ensure_filled(&host);

    let Some(HostEvent::LoadEnd(end)) = events.recv().await else {
        panic!("expected a load completion");
    };
    assert_eq!(pool.on_load_end(&end, &host), None);
    assert!(pool.is_empty());
}
