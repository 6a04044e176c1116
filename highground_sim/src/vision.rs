// Vision casting: what one entity can see from where it stands.
//
// `compute_visibility` sweeps every node whose column centre lies within the
// caster's vision range (Euclidean, in columns) and traces a sightline from
// the caster's eye (surface + `eye_height`) to a point just above the target
// surface (surface + `target_height`). The sightline is walked cell by cell
// with a 2D Amanatides & Woo DDA over the column grid:
//
// - In each intermediate column, the sightline covers a height range between
//   its entry and exit points. An occluding node overlapping that range
//   blocks the line.
// - At each crossed edge, a vision-blocking wall whose span contains the
//   sightline height at the crossing blocks the line.
// - The caster's own column and the target column never occlude.
//
// Entities standing on a visible node are visible. A wall is visible if the
// sightline to the midpoint of its face (at half its height) is clear, the
// wall itself being ignored. Swept cells that fail the test are recorded as
// FogOfWar only when `reveal_occluded_in_range` is set.
//
// A caster's data is sticky (`refresh_caster`): anything it saw before and
// no longer sees becomes FogOfWar, never Unknown.
//
// Casting reads only immutable topology, so independent casters can run in
// parallel; `sim.rs` fans them out with rayon.
//
// See also: `exploration.rs` for per-actor aggregation, `grid.rs` for
// `column_occludes` and wall lookup, `sim.rs` for dirty tracking.

use crate::config::VisionParams;
use crate::grid::TerrainGrid;
use crate::types::{Direction, EntityId, GridCoord, NodeId, NodeKind, WallId};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Slack when deciding a DDA step has passed the end of the sightline.
const T_EPSILON: f32 = 1e-4;

/// Knowledge an actor has of one object. Ordered: `Unknown < FogOfWar <
/// Visible`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum VisionType {
    #[default]
    Unknown,
    FogOfWar,
    Visible,
}

/// Something that can be seen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VisionKey {
    Node(NodeId),
    Entity(EntityId),
    Wall(WallId),
}

/// Vision state of one caster or one actor. Absent keys are Unknown.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VisionData {
    entries: FxHashMap<VisionKey, VisionType>,
}

impl VisionData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: VisionKey) -> VisionType {
        self.entries.get(&key).copied().unwrap_or_default()
    }

    /// Record a state. Setting `Unknown` is ignored; nothing reverts to it.
    pub fn set(&mut self, key: VisionKey, vision: VisionType) {
        if vision != VisionType::Unknown {
            self.entries.insert(key, vision);
        }
    }

    pub fn contains(&self, key: VisionKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (VisionKey, VisionType)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys whose state is at least `min`, sorted.
    pub fn keys_at_least(&self, min: VisionType) -> Vec<VisionKey> {
        let mut keys: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, v)| **v >= min)
            .map(|(k, _)| *k)
            .collect();
        keys.sort_unstable();
        keys
    }

    pub(crate) fn entries_mut(&mut self) -> &mut FxHashMap<VisionKey, VisionType> {
        &mut self.entries
    }
}

/// A vision caster: where it stands and how far it sees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisionSource {
    pub node: NodeId,
    pub range: f32,
}

/// Read-only state a cast needs.
#[derive(Clone, Copy, Debug)]
pub struct VisionWorld<'a> {
    pub grid: &'a TerrainGrid,
    pub params: &'a VisionParams,
    /// Entities keyed by the node they stand on.
    pub occupants: &'a BTreeMap<NodeId, Vec<EntityId>>,
}

/// Everything visible to one caster right now.
pub fn compute_visibility(world: &VisionWorld<'_>, source: VisionSource) -> VisionData {
    let mut data = VisionData::new();
    let grid = world.grid;
    if source.range.is_nan() || source.range <= 0.0 {
        return data;
    }
    let Some(origin) = grid.nodes().get(source.node.index()) else {
        return data;
    };
    let [ex, ey] = origin.coord.center();
    let eye = [ex, ey, origin.top() as f32 + world.params.eye_height];
    let missed = if world.params.reveal_occluded_in_range {
        VisionType::FogOfWar
    } else {
        VisionType::Unknown
    };

    for id in grid.nodes_within_radius(origin.coord, source.range) {
        let node = grid.node(id);
        if node.kind == NodeKind::Void {
            continue;
        }
        let [tx, ty] = node.coord.center();
        let target = [tx, ty, node.top() as f32 + world.params.target_height];
        if line_of_sight(grid, eye, target, None) {
            data.set(VisionKey::Node(id), VisionType::Visible);
            for entity in world.occupants.get(&id).into_iter().flatten() {
                data.set(VisionKey::Entity(*entity), VisionType::Visible);
            }
        } else {
            data.set(VisionKey::Node(id), missed);
        }
    }

    let range_sq = source.range * source.range;
    for wall in grid.walls() {
        let [mx, my] = wall.face_midpoint();
        let (dx, dy) = (mx - ex, my - ey);
        if dx * dx + dy * dy > range_sq {
            continue;
        }
        let target = [mx, my, wall.base as f32 + wall.height as f32 * 0.5];
        let vision = if line_of_sight(grid, eye, target, Some(wall.id)) {
            VisionType::Visible
        } else {
            missed
        };
        data.set(VisionKey::Wall(wall.id), vision);
    }

    data
}

/// Combine a caster's previous data with a fresh cast: everything previously
/// held but not in `fresh` becomes FogOfWar.
pub fn refresh_caster(previous: &VisionData, mut fresh: VisionData) -> VisionData {
    for (key, _) in previous.iter() {
        fresh
            .entries
            .entry(key)
            .or_insert(VisionType::FogOfWar);
    }
    fresh
}

/// Re-derive entity visibility from the caster's currently visible nodes and
/// where entities stand now. Entities no longer seen drop to FogOfWar. Lets a
/// caster that has not moved keep tracking entities that do.
pub fn refresh_entities(data: &mut VisionData, occupants: &BTreeMap<NodeId, Vec<EntityId>>) {
    let mut visible_nodes = Vec::new();
    for (key, vision) in data.entries.iter_mut() {
        match key {
            VisionKey::Entity(_) if *vision == VisionType::Visible => *vision = VisionType::FogOfWar,
            VisionKey::Node(id) if *vision == VisionType::Visible => visible_nodes.push(*id),
            _ => {}
        }
    }
    for id in visible_nodes {
        for entity in occupants.get(&id).into_iter().flatten() {
            data.entries
                .insert(VisionKey::Entity(*entity), VisionType::Visible);
        }
    }
}

/// Whether the straight line `from -> to` is unobstructed. Points are
/// `[x, y, height]` in column units. The columns containing `from` and `to`
/// never occlude; `ignore_wall` is skipped.
pub fn line_of_sight(
    grid: &TerrainGrid,
    from: [f32; 3],
    to: [f32; 3],
    ignore_wall: Option<WallId>,
) -> bool {
    let dir = [to[0] - from[0], to[1] - from[1]];
    let height_at = |t: f32| from[2] + t * (to[2] - from[2]);

    let start = [from[0].floor() as i32, from[1].floor() as i32];
    let end = [to[0].floor() as i32, to[1].floor() as i32];
    let mut cell = start;

    let mut step = [0i32; 2];
    let mut t_max = [f32::INFINITY; 2];
    let mut t_delta = [f32::INFINITY; 2];
    for axis in 0..2 {
        if dir[axis] > 0.0 {
            step[axis] = 1;
            t_delta[axis] = 1.0 / dir[axis];
            t_max[axis] = ((cell[axis] as f32 + 1.0) - from[axis]) / dir[axis];
        } else if dir[axis] < 0.0 {
            step[axis] = -1;
            t_delta[axis] = 1.0 / -dir[axis];
            t_max[axis] = (from[axis] - cell[axis] as f32) / -dir[axis];
        }
    }

    let side_of = |axis: usize| match (axis, step[axis] > 0) {
        (0, true) => Direction::East,
        (0, false) => Direction::West,
        (_, true) => Direction::North,
        (_, false) => Direction::South,
    };
    let walled = |coord: GridCoord, side: Direction, z: f32| {
        grid.walls_on_edge(coord, side)
            .any(|w| w.blocks_vision && Some(w.id) != ignore_wall && w.spans(z, z))
    };

    let mut t_enter = 0.0f32;
    loop {
        if cell == end {
            return true;
        }
        // Through a grid corner both axes step together and the two grazed
        // cells are never entered.
        let corner = (t_max[0] - t_max[1]).abs() <= T_EPSILON;
        let axis = if t_max[0] <= t_max[1] { 0 } else { 1 };
        if t_max[axis] > 1.0 + T_EPSILON {
            return true;
        }
        let t_exit = t_max[axis].min(1.0);
        let coord = GridCoord::new(cell[0], cell[1]);

        if cell != start {
            let (a, b) = (height_at(t_enter), height_at(t_exit));
            if grid.column_occludes(coord, a.min(b), a.max(b)) {
                return false;
            }
        }

        let z = height_at(t_exit);
        if corner {
            // Blocked only when walls seal both ways around the corner.
            let (sx, sy) = (side_of(0), side_of(1));
            let x_first = walled(coord, sx, z)
                || walled(GridCoord::new(cell[0] + step[0], cell[1]), sy, z);
            let y_first = walled(coord, sy, z)
                || walled(GridCoord::new(cell[0], cell[1] + step[1]), sx, z);
            if x_first && y_first {
                return false;
            }
            for a in 0..2 {
                cell[a] += step[a];
                t_max[a] += t_delta[a];
            }
        } else {
            if walled(coord, side_of(axis), z) {
                return false;
            }
            cell[axis] += step[axis];
            t_max[axis] += t_delta[axis];
        }
        t_enter = t_exit;
    }
}
