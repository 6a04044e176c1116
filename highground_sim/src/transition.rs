// Transition graph: directed, capability-gated edges between adjacent nodes.
//
// A `Transition` joins a node to a walkable node in one of the four
// cardinal neighbour columns. The builder classifies each candidate pair by
// the height delta between their surfaces:
//
// - **Climb**: a placed climbable links the two nodes. Uses the climbable's
//   fixed costs and skill requirement; takes precedence over the other cases.
// - **Walk**: delta == 0. Built from both ends, so walks come in pairs.
// - **Hop**: 0 < |delta| <= the global hop limit (`max_hop_up` /
//   `max_hop_down`). Admissible only for movers whose own hop range covers
//   it. Tall hop-ups also require `ClimbSkill::Basic`.
// - **Blocked**: anything else, or a movement-blocking wall on the edge, or
//   another node intruding into the vertical space swept by the move.
//
// Entering water requires swimming regardless of class. Each transition
// carries its predicate (`TransitionRequirement`) separately from its
// `CostModel`, so the cost engine can reject a mover before pricing.
//
// Storage mirrors a Vec-indexed nav graph: transitions live in a `Vec`
// indexed by `TransitionId`, and each node keeps a `SmallVec` of outgoing
// ids. Rebuilds are local (`rebuild_columns`): only transitions leaving the
// edited columns, and transitions entering them from the four neighbour
// columns, are recomputed. Freed slots are tombstoned and reused.
//
// See also: `grid.rs` for the nodes and walls being connected,
// `climbable.rs` for the climb contract, `cost.rs` for admissibility and
// pricing, `reachability.rs` for search over this graph.
//
// **Critical constraint: determinism.** A node's outgoing list is ordered by
// direction (`Direction::ALL`), then by the target's position in its column.
// Incremental rebuilds restore exactly the order a full build produces.

use crate::climbable::ClimbableSet;
use crate::config::GraphParams;
use crate::grid::TerrainGrid;
use crate::types::{ClimbSkill, ClimbableId, Direction, GridCoord, NodeId, NodeKind, TransitionId};
use smallvec::SmallVec;
use std::collections::BTreeSet;

/// How a transition moves between surfaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    Walk,
    HopUp,
    HopDown,
    ClimbUp,
    ClimbDown,
}

impl TransitionKind {
    pub fn is_climb(self) -> bool {
        matches!(self, TransitionKind::ClimbUp | TransitionKind::ClimbDown)
    }
}

/// Height a climb covers on a specific climbable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClimbRequirement {
    pub climbable: ClimbableId,
    pub height: u32,
}

/// The capability predicate of a transition.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TransitionRequirement {
    pub min_climb_skill: ClimbSkill,
    pub requires_swim: bool,
    /// Hop-up distance the mover must cover (0 if not a hop-up).
    pub hop_up: u32,
    /// Drop distance the mover must cover (0 if not a hop-down).
    pub hop_down: u32,
    pub climb: Option<ClimbRequirement>,
}

/// Parameters of the mover-dependent cost function.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CostModel {
    /// `base / aptitude(destination surface)`.
    Distance { base: f32 },
    /// `base / aptitude + levels * per_level / hop_aptitude`.
    Hop {
        base: f32,
        levels: u32,
        ascending: bool,
    },
    /// The climbable's fixed cost in the given direction.
    Climbable { id: ClimbableId, ascending: bool },
}

/// A directed edge of the graph.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub from: NodeId,
    pub to: NodeId,
    pub direction: Direction,
    pub kind: TransitionKind,
    /// `top(to) - top(from)`.
    pub height_delta: i32,
    pub requirement: TransitionRequirement,
    pub cost: CostModel,
}

/// The transition graph container.
#[derive(Clone, Debug, Default)]
pub struct TransitionGraph {
    transitions: Vec<Option<Transition>>,
    free: Vec<TransitionId>,
    outgoing: Vec<SmallVec<[TransitionId; 8]>>,
    live: usize,
}

impl TransitionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transition, reusing a freed slot when one exists.
    fn insert(&mut self, transition: Transition) -> TransitionId {
        let from = transition.from.index();
        if self.outgoing.len() <= from {
            self.outgoing.resize(from + 1, SmallVec::new());
        }
        let id = match self.free.pop() {
            Some(id) => {
                self.transitions[id.index()] = Some(transition);
                id
            }
            None => {
                let id = TransitionId(self.transitions.len() as u32);
                self.transitions.push(Some(transition));
                id
            }
        };
        self.outgoing[from].push(id);
        self.live += 1;
        id
    }

    /// Drop outgoing transitions of `node` matching `pred`. Returns how many.
    fn clear_outgoing(&mut self, node: NodeId, pred: impl Fn(&Transition) -> bool) -> usize {
        let Some(ids) = self.outgoing.get_mut(node.index()) else {
            return 0;
        };
        let transitions = &mut self.transitions;
        let free = &mut self.free;
        let before = ids.len();
        ids.retain(|id| {
            let slot = &mut transitions[id.index()];
            if slot.as_ref().is_some_and(&pred) {
                *slot = None;
                free.push(*id);
                false
            } else {
                true
            }
        });
        let removed = before - ids.len();
        self.live -= removed;
        removed
    }

    /// Restore canonical order: stable by direction, so within a direction the
    /// builder's column order is kept.
    fn sort_outgoing(&mut self, node: NodeId) {
        let transitions = &self.transitions;
        if let Some(ids) = self.outgoing.get_mut(node.index()) {
            ids.sort_by_key(|id| transitions[id.index()].as_ref().map(|t| t.direction));
        }
    }

    pub fn get(&self, id: TransitionId) -> Option<&Transition> {
        self.transitions.get(id.index()).and_then(Option::as_ref)
    }

    /// Outgoing transition ids of a node, in canonical order.
    pub fn outgoing_ids(&self, node: NodeId) -> &[TransitionId] {
        self.outgoing
            .get(node.index())
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    /// Outgoing transitions of a node, in canonical order.
    pub fn outgoing(&self, node: NodeId) -> impl Iterator<Item = (TransitionId, &Transition)> {
        self.outgoing_ids(node)
            .iter()
            .filter_map(move |&id| self.get(id).map(|t| (id, t)))
    }

    /// Transitions from `from` to `to`, in canonical order.
    pub fn between(&self, from: NodeId, to: NodeId) -> impl Iterator<Item = (TransitionId, &Transition)> {
        self.outgoing(from).filter(move |(_, t)| t.to == to)
    }

    /// All live transitions in id order.
    pub fn iter(&self) -> impl Iterator<Item = (TransitionId, &Transition)> {
        self.transitions
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.as_ref().map(|t| (TransitionId(i as u32), t)))
    }

    /// Number of live transitions.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Recompute every transition incident to the given columns. Transitions
    /// elsewhere keep their ids.
    pub fn rebuild_columns(
        &mut self,
        grid: &TerrainGrid,
        climbables: &ClimbableSet,
        params: &GraphParams,
        edited: &[GridCoord],
    ) {
        if self.outgoing.len() < grid.node_count() {
            self.outgoing.resize(grid.node_count(), SmallVec::new());
        }
        let edited: BTreeSet<GridCoord> = edited
            .iter()
            .copied()
            .filter(|c| grid.in_bounds(*c))
            .collect();

        let mut removed = 0;
        let mut added = 0;
        let mut touched = Vec::new();

        for &coord in &edited {
            for &node in grid.column(coord) {
                removed += self.clear_outgoing(node, |_| true);
                for t in build_transitions(grid, climbables, params, node) {
                    self.insert(t);
                    added += 1;
                }
            }
        }

        for &coord in &edited {
            for dir in Direction::ALL {
                let neighbour = coord.offset(dir);
                if edited.contains(&neighbour) {
                    continue;
                }
                let toward = dir.opposite();
                for &node in grid.column(neighbour) {
                    removed += self.clear_outgoing(node, |t| t.direction == toward);
                    for t in build_transitions_toward(grid, climbables, params, node, toward) {
                        self.insert(t);
                        added += 1;
                    }
                    touched.push(node);
                }
            }
        }

        for node in touched {
            self.sort_outgoing(node);
        }

        log::debug!(
            "rebuilt transitions around {} column(s): -{removed} +{added} (live {})",
            edited.len(),
            self.live
        );
    }
}

/// Build the full transition graph for a grid.
pub fn build_graph(grid: &TerrainGrid, climbables: &ClimbableSet, params: &GraphParams) -> TransitionGraph {
    let mut graph = TransitionGraph::new();
    graph.outgoing.resize(grid.node_count(), SmallVec::new());
    for node in grid.nodes() {
        for t in build_transitions(grid, climbables, params, node.id) {
            graph.insert(t);
        }
    }
    log::info!(
        "built transition graph: {} nodes, {} transitions",
        grid.node_count(),
        graph.len()
    );
    graph
}

/// All transitions leaving `node`, in canonical order.
pub fn build_transitions(
    grid: &TerrainGrid,
    climbables: &ClimbableSet,
    params: &GraphParams,
    node: NodeId,
) -> Vec<Transition> {
    Direction::ALL
        .into_iter()
        .flat_map(|dir| build_transitions_toward(grid, climbables, params, node, dir))
        .collect()
}

/// Transitions leaving `node` into the neighbour column in `dir`.
pub fn build_transitions_toward(
    grid: &TerrainGrid,
    climbables: &ClimbableSet,
    params: &GraphParams,
    node: NodeId,
    dir: Direction,
) -> Vec<Transition> {
    let clearance = params.standing_clearance;
    let mut out = Vec::new();
    if !grid.is_walkable(node, clearance) {
        return out;
    }
    let a = grid.node(node);
    let neighbour = a.coord.offset(dir);

    for &b_id in grid.column(neighbour) {
        if !grid.is_walkable(b_id, clearance) {
            continue;
        }
        let b = grid.node(b_id);
        let delta = b.top() - a.top();
        let lo = a.top().min(b.top());
        let hi = a.top().max(b.top());

        let except = [node, b_id];
        if grid.column_intrudes(a.coord, lo, hi + clearance, &except)
            || grid.column_intrudes(neighbour, lo, hi + clearance, &except)
            || grid.edge_blocks_movement(a.coord, dir, lo, hi, clearance)
        {
            continue;
        }

        let requires_swim = b.kind == NodeKind::Water;
        let base = params.base_distance;
        let levels = delta.unsigned_abs();

        let mut climbed = false;
        for placed in climbables.between(node, b_id) {
            climbed = true;
            let ascending = placed.bottom == node;
            let obj = &placed.object;
            if !obj.admits_any(levels) {
                continue;
            }
            out.push(Transition {
                from: node,
                to: b_id,
                direction: dir,
                kind: if ascending { TransitionKind::ClimbUp } else { TransitionKind::ClimbDown },
                height_delta: delta,
                requirement: TransitionRequirement {
                    min_climb_skill: obj.required_skill(),
                    requires_swim,
                    climb: Some(ClimbRequirement {
                        climbable: placed.id,
                        height: levels,
                    }),
                    ..TransitionRequirement::default()
                },
                cost: CostModel::Climbable {
                    id: placed.id,
                    ascending,
                },
            });
        }
        if climbed {
            continue;
        }

        let (kind, requirement, cost) = if delta == 0 {
            (
                TransitionKind::Walk,
                TransitionRequirement {
                    requires_swim,
                    ..TransitionRequirement::default()
                },
                CostModel::Distance { base },
            )
        } else if delta > 0 && levels <= params.max_hop_up {
            let min_climb_skill = if levels > params.hop_up_skill_threshold {
                ClimbSkill::Basic
            } else {
                ClimbSkill::None
            };
            (
                TransitionKind::HopUp,
                TransitionRequirement {
                    min_climb_skill,
                    requires_swim,
                    hop_up: levels,
                    ..TransitionRequirement::default()
                },
                CostModel::Hop {
                    base,
                    levels,
                    ascending: true,
                },
            )
        } else if delta < 0 && levels <= params.max_hop_down {
            (
                TransitionKind::HopDown,
                TransitionRequirement {
                    requires_swim,
                    hop_down: levels,
                    ..TransitionRequirement::default()
                },
                CostModel::Hop {
                    base,
                    levels,
                    ascending: false,
                },
            )
        } else {
            continue;
        };

        out.push(Transition {
            from: node,
            to: b_id,
            direction: dir,
            kind,
            height_delta: delta,
            requirement,
            cost,
        });
    }
    out
}
