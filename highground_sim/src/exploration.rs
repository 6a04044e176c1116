// Per-actor exploration: the union of what an actor's entities see.
//
// Each actor (faction) keeps one aggregated `VisionData`. On every vision
// tick the aggregate is recomputed from the actor's casters:
//
// 1. Every Visible entry is downgraded to FogOfWar.
// 2. Each caster's data is folded in with `merge_vision_data`: Visible
//    always wins, FogOfWar only fills an absent entry.
//
// So an object stays Visible exactly as long as at least one owned entity
// reports it Visible, and drops to FogOfWar on the same tick the last one
// stops. Nothing returns to Unknown: entries are never removed.
//
// Query helpers return sorted id lists so renderers and tests see a stable
// order regardless of hash-map layout.
//
// See also: `vision.rs` for per-caster data, `sim.rs` which runs the
// recompute after all casts for the tick are done.

use crate::types::{EntityId, NodeId, WallId};
use crate::vision::{VisionData, VisionKey, VisionType};

/// Fold one caster's data into an aggregate.
pub fn merge_vision_data(existing: &mut VisionData, incoming: &VisionData) {
    let entries = existing.entries_mut();
    for (key, vision) in incoming.iter() {
        match vision {
            VisionType::Visible => {
                entries.insert(key, VisionType::Visible);
            }
            VisionType::FogOfWar => {
                entries.entry(key).or_insert(VisionType::FogOfWar);
            }
            VisionType::Unknown => {}
        }
    }
}

/// Aggregated fog-of-war of one actor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActorVision {
    aggregate: VisionData,
}

impl ActorVision {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the aggregate from the current data of every owned caster.
    pub fn recompute<'a>(&mut self, casters: impl IntoIterator<Item = &'a VisionData>) {
        for vision in self.aggregate.entries_mut().values_mut() {
            if *vision == VisionType::Visible {
                *vision = VisionType::FogOfWar;
            }
        }
        for caster in casters {
            merge_vision_data(&mut self.aggregate, caster);
        }
    }

    pub fn data(&self) -> &VisionData {
        &self.aggregate
    }

    pub fn get(&self, key: VisionKey) -> VisionType {
        self.aggregate.get(key)
    }

    pub fn visible_nodes(&self) -> Vec<NodeId> {
        self.nodes_at_least(VisionType::Visible)
    }

    pub fn visible_entities(&self) -> Vec<EntityId> {
        self.aggregate
            .keys_at_least(VisionType::Visible)
            .into_iter()
            .filter_map(|k| match k {
                VisionKey::Entity(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn visible_walls(&self) -> Vec<WallId> {
        self.walls_at_least(VisionType::Visible)
    }

    /// Nodes that are Visible or FogOfWar.
    pub fn explored_nodes(&self) -> Vec<NodeId> {
        self.nodes_at_least(VisionType::FogOfWar)
    }

    /// Walls that are Visible or FogOfWar.
    pub fn explored_walls(&self) -> Vec<WallId> {
        self.walls_at_least(VisionType::FogOfWar)
    }

    fn nodes_at_least(&self, min: VisionType) -> Vec<NodeId> {
        self.aggregate
            .keys_at_least(min)
            .into_iter()
            .filter_map(|k| match k {
                VisionKey::Node(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn walls_at_least(&self, min: VisionType) -> Vec<WallId> {
        self.aggregate
            .keys_at_least(min)
            .into_iter()
            .filter_map(|k| match k {
                VisionKey::Wall(id) => Some(id),
                _ => None,
            })
            .collect()
    }
}
