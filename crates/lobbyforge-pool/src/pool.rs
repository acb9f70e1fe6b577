//! Watermark-refilled pool of pre-loaded scenes.

use std::collections::VecDeque;

use lobbyforge_protocol::{ResourceId, TemplateId};

use crate::{LoadEnd, MarkerKind, SceneHost};

/// A FIFO of loaded, unassigned scenes of one template.
///
/// The pool aims for `target` available scenes. Taking one drops it below
/// the watermark; the next [`ensure_filled`](Self::ensure_filled) issues
/// enough load requests to climb back. Requests still in flight count
/// toward the target, so repeated refills never over-request and the pool
/// never holds more than `target` scenes.
///
/// ```text
///   ensure_filled ──load──→ host ──LoadEnd──→ on_load_end ──→ [available]
///        ↑                                                       │
///        └──────────────────────── take() ←──────────────────────┘
/// ```
#[derive(Debug)]
pub struct ResourcePool {
    template: TemplateId,
    required: MarkerKind,
    target: usize,
    available: VecDeque<ResourceId>,
    /// Load requests issued but not yet completed.
    pending: usize,
}

impl ResourcePool {
    /// Creates an empty pool. `target` is raised to 1 if zero.
    pub fn new(template: TemplateId, required: MarkerKind, target: usize) -> Self {
        Self {
            template,
            required,
            target: target.max(1),
            available: VecDeque::with_capacity(target.max(1)),
            pending: 0,
        }
    }

    /// Issues load requests until available + in-flight scenes reach the
    /// target. Returns how many requests were issued.
    pub fn ensure_filled(&mut self, host: &impl SceneHost) -> usize {
        let mut issued = 0;
        while self.available.len() + self.pending < self.target {
            host.load(&self.template);
            self.pending += 1;
            issued += 1;
        }
        if issued > 0 {
            tracing::debug!(
                template = %self.template,
                issued,
                available = self.available.len(),
                target = self.target,
                "pool refill requested"
            );
        }
        issued
    }

    /// Offers a load completion to the pool.
    ///
    /// Returns the pooled scene if the event was accepted. Events are
    /// discarded when the pool is already full, when they carry anything
    /// but exactly one scene, when the template differs, when the scene is
    /// already pooled, or when the scene lacks the required marker.
    pub fn on_load_end(&mut self, event: &LoadEnd, host: &impl SceneHost) -> Option<ResourceId> {
        if !self.is_listening() {
            return None;
        }
        let [scene] = event.loaded.as_slice() else {
            return None;
        };
        if scene.template != self.template {
            return None;
        }
        // A completion for our template settles one outstanding request,
        // whether or not the scene turns out to be usable.
        self.pending = self.pending.saturating_sub(1);

        if self.available.contains(&scene.resource) {
            tracing::debug!(resource = %scene.resource, "scene already pooled, ignoring");
            return None;
        }
        match host.marker(scene.resource) {
            Some(kind) if kind.satisfies(self.required) => {}
            other => {
                tracing::debug!(
                    resource = %scene.resource,
                    template = %self.template,
                    marker = ?other,
                    required = ?self.required,
                    "loaded scene lacks the required marker, not pooling"
                );
                return None;
            }
        }

        self.available.push_back(scene.resource);
        tracing::debug!(
            resource = %scene.resource,
            template = %self.template,
            available = self.available.len(),
            "scene pooled"
        );
        Some(scene.resource)
    }

    /// Removes and returns the oldest pooled scene.
    pub fn take(&mut self) -> Option<ResourceId> {
        self.available.pop_front()
    }

    /// Returns `true` while the pool still wants completions.
    pub fn is_listening(&self) -> bool {
        self.available.len() < self.target
    }

    pub fn len(&self) -> usize {
        self.available.len()
    }

    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn target(&self) -> usize {
        self.target
    }
}
