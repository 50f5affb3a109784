//! # Wire Encoder
//!
//! Per-client replication state and the per-tick frame build.
//!
//! Each connected client owns a [`ClientView`]: the rectangle it can see
//! and the set of entities it currently knows about (slot index +
//! generation). The encoder diffs that set against what the view contains
//! this tick:
//!
//! ```text
//! known, visible      -> dirty fields only (or nothing)
//! unknown, visible    -> full snapshot
//! known, not visible  -> deletion notice, forget
//! known, destroyed    -> deletion notice, forget
//! ```
//!
//! Dirty bits are *read* here and cleared by the scheduler afterwards, so
//! any number of clients can encode against the same tick.

use crate::frame::{dirty_delta, full_snapshot, EntityUpdate, UpdateFrame};
use bulwark_core::{EntityId, EntityRegistry};
use bulwark_shared::math::Rect;
use bulwark_shared::{ClientId, Vec2};
use std::collections::{HashMap, HashSet};

/// Replication state for one connected client.
#[derive(Debug)]
pub struct ClientView {
    /// Who this view belongs to.
    client: ClientId,
    /// What the client can currently see, world coordinates.
    pub view: Rect,
    /// Entities the client holds a copy of: slot index -> generation.
    known: HashMap<u32, u32>,
}

impl ClientView {
    /// Creates a view centered at the origin.
    #[must_use]
    pub fn new(client: ClientId, half_extent: f32) -> Self {
        Self {
            client,
            view: Rect::square(Vec2::ZERO, half_extent),
            known: HashMap::new(),
        }
    }

    /// The owning client.
    #[must_use]
    pub const fn client(&self) -> ClientId {
        self.client
    }

    /// Re-centers the view, typically on the client's own tank.
    pub fn set_center(&mut self, center: Vec2) {
        self.view.center = center;
    }

    /// True if the client currently holds a copy of this entity.
    #[must_use]
    pub fn knows(&self, id: EntityId) -> bool {
        self.known.get(&id.index) == Some(&id.generation)
    }

    /// Number of entities the client currently knows.
    #[must_use]
    pub fn known_count(&self) -> usize {
        self.known.len()
    }
}

/// Running totals, exposed for the server's tick log line.
#[derive(Clone, Copy, Debug, Default)]
pub struct EncoderStats {
    /// Frames produced.
    pub frames: u64,
    /// Full snapshots sent (first visibility).
    pub snapshots: u64,
    /// Dirty-only entity updates sent.
    pub deltas: u64,
    /// Deletion notices sent.
    pub deletions: u64,
}

/// Turns dirty field groups into per-client delta frames.
pub struct WireEncoder {
    stats: EncoderStats,
}

impl WireEncoder {
    /// Creates an encoder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stats: EncoderStats {
                frames: 0,
                snapshots: 0,
                deltas: 0,
                deletions: 0,
            },
        }
    }

    /// Encoder totals so far.
    #[must_use]
    pub const fn stats(&self) -> &EncoderStats {
        &self.stats
    }

    /// Builds this tick's frame for one client.
    ///
    /// `visible` is the broad-phase result for the client's view
    /// rectangle, ascending by entity ID; entities in deletion animation
    /// are expected to still be part of it, destroyed-and-purged ones not.
    pub fn encode(
        &mut self,
        view: &mut ClientView,
        registry: &EntityRegistry,
        visible: &[EntityId],
        tick: u64,
    ) -> UpdateFrame {
        let mut frame = UpdateFrame {
            tick,
            deletions: Vec::new(),
            updates: Vec::new(),
        };

        // Pass 1: deletions. Anything known that is no longer live under
        // the same generation, or fell out of the view, gets exactly one
        // notice and is forgotten.
        let visible_indices: HashSet<u32> = visible.iter().map(|id| id.index).collect();
        view.known.retain(|&index, &mut generation| {
            let id = EntityId::new(index, generation);
            if registry.is_alive(id) && visible_indices.contains(&index) {
                true
            } else {
                frame.deletions.push(id);
                false
            }
        });
        frame.deletions.sort_unstable();

        // Pass 2: updates, ascending. First sight gets the full snapshot
        // regardless of dirty state; known entities get dirty fields only.
        for &id in visible {
            let Some(entity) = registry.get(id) else {
                // Destroyed earlier this tick but still in the caller's
                // visibility list; the deletion pass already covered it.
                continue;
            };

            if view.knows(id) {
                let groups = dirty_delta(entity);
                if !groups.is_empty() {
                    self.stats.deltas += 1;
                    frame.updates.push(EntityUpdate { id, groups });
                }
            } else {
                view.known.insert(id.index, id.generation);
                self.stats.snapshots += 1;
                frame.updates.push(EntityUpdate {
                    id,
                    groups: full_snapshot(entity),
                });
            }
        }

        self.stats.frames += 1;
        self.stats.deletions += frame.deletions.len() as u64;
        tracing::trace!(
            "frame for {}: tick {}, {} updates, {} deletions",
            view.client,
            tick,
            frame.updates.len(),
            frame.deletions.len()
        );
        frame
    }
}

impl Default for WireEncoder {
    fn default() -> Self {
        Self::new()
    }
}
