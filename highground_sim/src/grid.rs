// Terrain grid: the spatial index of height-bearing surface nodes.
//
// The map is a dense `width x depth` array of columns. Each column holds a
// short list of `Node`s sorted by height; a column can stack several nodes
// (ground below, bridge above). Column storage is a flat `Vec` indexed by
// `x + y * width`, giving O(1) lookup. Nodes themselves live in a `Vec`
// indexed by `NodeId` and are never removed: an edit that deletes terrain
// turns the node into `NodeKind::Void` instead, so ids stay stable.
//
// Columns are additionally bucketed into `CHUNK_SIZE x CHUNK_SIZE` chunks.
// Every node records its owning chunk, and radius queries (the vision sweep)
// only visit chunks that intersect the query disc.
//
// Walls sit on the *edge* between a column and one of its cardinal
// neighbours and span a height range `[base, base + height)`. They are
// indexed by canonical edge (north/east form) so both sides see the same
// walls. Walls can be removed, so the wall table uses tombstones.
//
// See also: `transition.rs` which derives the movement graph from this grid,
// `vision.rs` which traces sightlines through it, `sim.rs` which owns it.
//
// **Critical constraint: determinism.** Node and wall ids are sequential.
// Radius queries return nodes sorted by id.

use crate::error::{GridError, Result};
use crate::types::{Direction, GridCoord, NodeId, NodeKind, SurfaceId, WallId};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Side length of a chunk, in columns.
pub const CHUNK_SIZE: i32 = 16;

/// Position of a chunk in chunk units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub fn containing(coord: GridCoord) -> Self {
        Self {
            x: coord.x.div_euclid(CHUNK_SIZE),
            y: coord.y.div_euclid(CHUNK_SIZE),
        }
    }
}

/// A surface cell. Occupies `[min_height, max_height)` in its column; things
/// stand on `max_height`.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub coord: GridCoord,
    pub min_height: i32,
    pub max_height: i32,
    pub kind: NodeKind,
    pub surface: SurfaceId,
    pub passable: bool,
    pub chunk: ChunkCoord,
}

impl Node {
    /// Height of the walkable surface.
    pub fn top(&self) -> i32 {
        self.max_height
    }

    pub fn overlaps(&self, lo: i32, hi: i32) -> bool {
        self.min_height < hi && self.max_height > lo
    }
}

/// A wall segment on the edge between `coord` and `coord.offset(side)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Wall {
    pub id: WallId,
    pub coord: GridCoord,
    pub side: Direction,
    pub base: i32,
    pub height: i32,
    pub blocks_vision: bool,
    pub blocks_movement: bool,
}

impl Wall {
    pub fn top(&self) -> i32 {
        self.base + self.height
    }

    /// Horizontal midpoint of the wall face.
    pub fn face_midpoint(&self) -> [f32; 2] {
        let [cx, cy] = self.coord.center();
        let (dx, dy) = self.side.delta();
        [cx + 0.5 * dx as f32, cy + 0.5 * dy as f32]
    }

    /// Whether the wall's span intersects the open height range `(lo, hi)`.
    pub fn spans(&self, lo: f32, hi: f32) -> bool {
        (self.base as f32) < hi && (self.top() as f32) > lo
    }
}

/// Canonical key for the edge between two columns: always the north or east
/// edge of some column.
fn edge_key(coord: GridCoord, side: Direction) -> (GridCoord, Direction) {
    match side {
        Direction::North | Direction::East => (coord, side),
        Direction::South | Direction::West => (coord.offset(side), side.opposite()),
    }
}

/// Dense column grid with chunk buckets and edge walls.
#[derive(Clone, Debug, Default)]
pub struct TerrainGrid {
    pub width: u32,
    pub depth: u32,
    nodes: Vec<Node>,
    /// Flat storage: index = x + y * width. Each column sorted by `min_height`.
    columns: Vec<SmallVec<[NodeId; 2]>>,
    chunks: BTreeMap<ChunkCoord, Vec<NodeId>>,
    walls: Vec<Option<Wall>>,
    edge_walls: BTreeMap<(GridCoord, Direction), SmallVec<[WallId; 1]>>,
}

impl TerrainGrid {
    /// Create an empty grid of the given extent.
    pub fn new(width: u32, depth: u32) -> Self {
        let total = width as usize * depth as usize;
        Self {
            width,
            depth,
            nodes: Vec::new(),
            columns: vec![SmallVec::new(); total],
            chunks: BTreeMap::new(),
            walls: Vec::new(),
            edge_walls: BTreeMap::new(),
        }
    }

    /// Check whether a column is within bounds.
    pub fn in_bounds(&self, coord: GridCoord) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && (coord.x as u32) < self.width
            && (coord.y as u32) < self.depth
    }

    fn column_index(&self, coord: GridCoord) -> Option<usize> {
        if self.in_bounds(coord) {
            Some(coord.x as usize + coord.y as usize * self.width as usize)
        } else {
            None
        }
    }

    fn check_bounds(&self, coord: GridCoord) -> Result<usize> {
        self.column_index(coord).ok_or(GridError::OutOfBounds(coord))
    }

    fn validate_heights(min: i32, max: i32) -> Result<()> {
        if min < 0 || max <= min {
            return Err(GridError::InvalidHeights { min, max });
        }
        Ok(())
    }

    fn check_overlap(&self, coord: GridCoord, min: i32, max: i32, skip: Option<NodeId>) -> Result<()> {
        if let Some(existing) = self
            .column(coord)
            .iter()
            .copied()
            .filter(|&id| Some(id) != skip)
            .find(|&id| self.node(id).overlaps(min, max))
        {
            return Err(GridError::OverlappingNode {
                coord,
                min,
                max,
                existing,
            });
        }
        Ok(())
    }

    fn sort_column(&mut self, column: usize) {
        let nodes = &self.nodes;
        self.columns[column].sort_by_key(|id| nodes[id.index()].min_height);
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    /// Add a node to a column. Fails on bad heights, out-of-bounds columns, or
    /// overlap with an existing node of the same column.
    pub fn add_node(
        &mut self,
        coord: GridCoord,
        min_height: i32,
        max_height: i32,
        kind: NodeKind,
        surface: SurfaceId,
    ) -> Result<NodeId> {
        Self::validate_heights(min_height, max_height)?;
        let column = self.check_bounds(coord)?;
        self.check_overlap(coord, min_height, max_height, None)?;

        let id = NodeId(self.nodes.len() as u32);
        let chunk = ChunkCoord::containing(coord);
        self.nodes.push(Node {
            id,
            coord,
            min_height,
            max_height,
            kind,
            surface,
            passable: kind != NodeKind::Void,
            chunk,
        });
        self.columns[column].push(id);
        self.sort_column(column);
        self.chunks.entry(chunk).or_default().push(id);
        Ok(id)
    }

    /// Get a node by id. Node ids handed out by this grid are always valid.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Checked lookup for ids that come from outside the sim.
    pub fn try_node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.index()).ok_or(GridError::NodeNotFound(id))
    }

    fn try_node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.index())
            .ok_or(GridError::NodeNotFound(id))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node ids stacked in a column, lowest first. Empty for out-of-bounds.
    pub fn column(&self, coord: GridCoord) -> &[NodeId] {
        match self.column_index(coord) {
            Some(i) => &self.columns[i],
            None => &[],
        }
    }

    /// Change a node's height interval.
    pub fn set_node_heights(&mut self, id: NodeId, min_height: i32, max_height: i32) -> Result<()> {
        Self::validate_heights(min_height, max_height)?;
        let coord = self.try_node(id)?.coord;
        self.check_overlap(coord, min_height, max_height, Some(id))?;
        let node = self.try_node_mut(id)?;
        node.min_height = min_height;
        node.max_height = max_height;
        let column = self.check_bounds(coord)?;
        self.sort_column(column);
        Ok(())
    }

    /// Reclassify a node. Turning a node into `Void` also makes it impassable.
    pub fn set_node_kind(&mut self, id: NodeId, kind: NodeKind) -> Result<()> {
        let node = self.try_node_mut(id)?;
        node.kind = kind;
        if kind == NodeKind::Void {
            node.passable = false;
        }
        Ok(())
    }

    pub fn set_node_surface(&mut self, id: NodeId, surface: SurfaceId) -> Result<()> {
        self.try_node_mut(id)?.surface = surface;
        Ok(())
    }

    pub fn set_passable(&mut self, id: NodeId, passable: bool) -> Result<()> {
        let node = self.try_node_mut(id)?;
        node.passable = passable && node.kind != NodeKind::Void;
        Ok(())
    }

    /// A node can be stood on if it is passable and nothing in its column
    /// intrudes into the `clearance` levels above its surface.
    pub fn is_walkable(&self, id: NodeId, clearance: i32) -> bool {
        let node = self.node(id);
        if !node.passable || node.kind == NodeKind::Void {
            return false;
        }
        let top = node.top();
        !self.column_intrudes(node.coord, top, top + clearance, &[id])
    }

    /// Whether any non-void node of the column (other than `except`) occupies
    /// part of the open range `(lo, hi)`.
    pub fn column_intrudes(&self, coord: GridCoord, lo: i32, hi: i32, except: &[NodeId]) -> bool {
        self.column(coord).iter().any(|id| {
            let n = self.node(*id);
            !except.contains(id) && n.kind != NodeKind::Void && n.overlaps(lo, hi)
        })
    }

    /// Whether an occluding node of the column overlaps the sightline height
    /// range `(lo, hi)` (floats, so grazing a surface exactly does not block).
    pub fn column_occludes(&self, coord: GridCoord, lo: f32, hi: f32) -> bool {
        self.column(coord).iter().any(|id| {
            let n = self.node(*id);
            n.kind.occludes() && (n.min_height as f32) < hi && (n.max_height as f32) > lo
        })
    }

    /// The walkable node of a column whose surface is closest to `height`.
    /// Ties go to the lower node.
    pub fn find_surface(&self, coord: GridCoord, height: i32, clearance: i32) -> Option<NodeId> {
        self.column(coord)
            .iter()
            .copied()
            .filter(|&id| self.is_walkable(id, clearance))
            .min_by_key(|&id| (self.node(id).top() - height).abs())
    }

    /// The highest node of a column, walkable or not.
    pub fn top_node(&self, coord: GridCoord) -> Option<NodeId> {
        self.column(coord).last().copied()
    }

    /// All node ids whose column centre lies within `radius` of `center`,
    /// sorted by id. Only chunks touching the query square are visited.
    pub fn nodes_within_radius(&self, center: GridCoord, radius: f32) -> Vec<NodeId> {
        if radius < 0.0 {
            return Vec::new();
        }
        let r = radius.floor() as i32;
        let r_sq = f64::from(radius) * f64::from(radius);
        let lo = ChunkCoord::containing(GridCoord::new(center.x - r, center.y - r));
        let hi = ChunkCoord::containing(GridCoord::new(center.x + r, center.y + r));

        let mut found = Vec::new();
        for cy in lo.y..=hi.y {
            for cx in lo.x..=hi.x {
                let Some(ids) = self.chunks.get(&ChunkCoord { x: cx, y: cy }) else {
                    continue;
                };
                found.extend(
                    ids.iter()
                        .copied()
                        .filter(|id| self.node(*id).coord.distance_sq(center) as f64 <= r_sq),
                );
            }
        }
        found.sort_unstable();
        found
    }

    /// Node ids bucketed into a chunk.
    pub fn chunk_nodes(&self, chunk: ChunkCoord) -> &[NodeId] {
        self.chunks.get(&chunk).map(Vec::as_slice).unwrap_or(&[])
    }

    // -----------------------------------------------------------------------
    // Walls
    // -----------------------------------------------------------------------

    /// Place a wall on the `side` edge of `coord`.
    pub fn add_wall(
        &mut self,
        coord: GridCoord,
        side: Direction,
        base: i32,
        height: i32,
        blocks_vision: bool,
        blocks_movement: bool,
    ) -> Result<WallId> {
        self.check_bounds(coord)?;
        if base < 0 || height <= 0 {
            return Err(GridError::InvalidWall { base, height });
        }
        let id = WallId(self.walls.len() as u32);
        self.walls.push(Some(Wall {
            id,
            coord,
            side,
            base,
            height,
            blocks_vision,
            blocks_movement,
        }));
        self.edge_walls
            .entry(edge_key(coord, side))
            .or_default()
            .push(id);
        Ok(id)
    }

    /// Remove a wall, returning it.
    pub fn remove_wall(&mut self, id: WallId) -> Result<Wall> {
        let wall = self
            .walls
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or(GridError::WallNotFound(id))?;
        let key = edge_key(wall.coord, wall.side);
        if let Some(ids) = self.edge_walls.get_mut(&key) {
            ids.retain(|w| *w != id);
            if ids.is_empty() {
                self.edge_walls.remove(&key);
            }
        }
        Ok(wall)
    }

    pub fn wall(&self, id: WallId) -> Option<&Wall> {
        self.walls.get(id.index()).and_then(Option::as_ref)
    }

    /// All live walls in id order.
    pub fn walls(&self) -> impl Iterator<Item = &Wall> {
        self.walls.iter().flatten()
    }

    /// Walls on the edge between `coord` and `coord.offset(side)`.
    pub fn walls_on_edge(&self, coord: GridCoord, side: Direction) -> impl Iterator<Item = &Wall> {
        self.edge_walls
            .get(&edge_key(coord, side))
            .into_iter()
            .flatten()
            .filter_map(move |id| self.wall(*id))
    }

    /// Whether a movement-blocking wall on the edge spans any part of the
    /// height range swept when crossing it between surfaces `lo` and `hi`
    /// with `clearance` of body height.
    pub fn edge_blocks_movement(
        &self,
        coord: GridCoord,
        side: Direction,
        lo: i32,
        hi: i32,
        clearance: i32,
    ) -> bool {
        self.walls_on_edge(coord, side)
            .any(|w| w.blocks_movement && w.base < hi + clearance && w.top() > lo)
    }
}
