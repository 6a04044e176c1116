// Budgeted uniform-cost search over the transition graph.
//
// All reachability questions ("can this mover get there with this much
// movement?", "which cells are in range?", "what path does it take?") run the
// same Dijkstra expansion from an origin, priced per mover by `cost.rs`.
// Inadmissible transitions are skipped. Any partial path whose cost would
// exceed the budget is pruned, so the search never leaves the budget disc.
//
// The open set is a `BinaryHeap` turned into a min-heap by reversing `Ord`,
// with `total_cmp` on the cost. Equal costs are broken by a monotonic
// sequence number assigned at push time, so the first-discovered entry wins.
// Per-node state (best cost, came-from, closed flag) lives in `Vec`s indexed
// by `NodeId`. The closed set makes every node settle at most once, which is
// what terminates the search on zero-cost cycles.
//
// Long scans take a visitor `FnMut(NodeId, f32) -> ControlFlow<()>` called
// once per settled node in settle order; returning `Break` stops the search.
//
// See also: `cost.rs` for per-transition pricing, `transition.rs` for the
// graph, `movement.rs` which follows `find_path` results.
//
// **Critical constraint: determinism.** Results depend only on graph state,
// mover, origin, and budget. Outgoing transitions are expanded in canonical
// order and ties go to the lower sequence number.

use crate::cost::{CostContext, MoveCost, movement_cost};
use crate::mover::MoverProfile;
use crate::types::{NodeId, TransitionId};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::ops::ControlFlow;

/// Answer to an in-range query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RangeResult {
    pub reachable: bool,
    /// Cheapest cost to the target, or infinity if unreachable.
    pub total_cost: f32,
}

/// A path found by the search.
#[derive(Clone, Debug, PartialEq)]
pub struct PathResult {
    /// Nodes from origin to target (inclusive).
    pub nodes: Vec<NodeId>,
    /// Transitions taken (len = nodes.len() - 1).
    pub transitions: Vec<TransitionId>,
    pub total_cost: f32,
}

/// Entry in the open set (min-heap via reversed ordering).
struct OpenEntry {
    node: NodeId,
    cost: f32,
    seq: u64,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: lowest cost, then lowest sequence, is "greatest".
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Search state after an expansion.
#[derive(Clone, Debug, Default)]
pub struct SearchTree {
    cost: Vec<f32>,
    came_from: Vec<Option<(NodeId, TransitionId)>>,
    /// Settled nodes in settle order.
    settled: Vec<NodeId>,
    closed: Vec<bool>,
}

impl SearchTree {
    /// Settled cost of a node, if the search settled it.
    pub fn cost_to(&self, node: NodeId) -> Option<f32> {
        let i = node.index();
        if self.closed.get(i).copied().unwrap_or(false) {
            Some(self.cost[i])
        } else {
            None
        }
    }

    /// Nodes in the order they were settled.
    pub fn settled(&self) -> &[NodeId] {
        &self.settled
    }

    /// Walk came-from links back from `target`.
    pub fn path_to(&self, target: NodeId) -> Option<PathResult> {
        let total_cost = self.cost_to(target)?;
        let mut nodes = vec![target];
        let mut transitions = Vec::new();
        let mut current = target;
        while let Some((prev, via)) = self.came_from[current.index()] {
            transitions.push(via);
            nodes.push(prev);
            current = prev;
        }
        nodes.reverse();
        transitions.reverse();
        Some(PathResult {
            nodes,
            transitions,
            total_cost,
        })
    }
}

/// Expand from `origin` over admissible transitions without exceeding
/// `budget`, calling `visit` on every settled node.
pub fn search<F>(
    ctx: &CostContext<'_>,
    mover: &MoverProfile,
    origin: NodeId,
    budget: f32,
    mut visit: F,
) -> SearchTree
where
    F: FnMut(NodeId, f32) -> ControlFlow<()>,
{
    let n = ctx.grid.node_count();
    let mut tree = SearchTree {
        cost: vec![f32::INFINITY; n],
        came_from: vec![None; n],
        settled: Vec::new(),
        closed: vec![false; n],
    };
    if origin.index() >= n || budget.is_nan() || budget < 0.0 {
        return tree;
    }

    let mut seq: u64 = 0;
    let mut open = BinaryHeap::new();
    tree.cost[origin.index()] = 0.0;
    open.push(OpenEntry {
        node: origin,
        cost: 0.0,
        seq,
    });

    while let Some(OpenEntry { node, cost, .. }) = open.pop() {
        let ci = node.index();
        if tree.closed[ci] {
            continue;
        }
        tree.closed[ci] = true;
        tree.settled.push(node);
        if visit(node, cost).is_break() {
            break;
        }

        for (tid, t) in ctx.graph.outgoing(node) {
            let ni = t.to.index();
            if ni >= n || tree.closed[ni] {
                continue;
            }
            let MoveCost::Admissible(step) = movement_cost(ctx, mover, t) else {
                continue;
            };
            let tentative = cost + step;
            if tentative > budget || tentative >= tree.cost[ni] {
                continue;
            }
            tree.cost[ni] = tentative;
            tree.came_from[ni] = Some((node, tid));
            seq += 1;
            open.push(OpenEntry {
                node: t.to,
                cost: tentative,
                seq,
            });
        }
    }
    tree
}

/// Whether `mover` can reach `target` from `origin` within `budget`.
pub fn is_in_range(
    ctx: &CostContext<'_>,
    mover: &MoverProfile,
    origin: NodeId,
    target: NodeId,
    budget: f32,
) -> RangeResult {
    let tree = search(ctx, mover, origin, budget, |node, _| {
        if node == target {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    match tree.cost_to(target) {
        Some(total_cost) => RangeResult {
            reachable: true,
            total_cost,
        },
        None => RangeResult {
            reachable: false,
            total_cost: f32::INFINITY,
        },
    }
}

/// Every node reachable within `budget`, with its cost, in settle order
/// (non-decreasing cost).
pub fn reachable_nodes(
    ctx: &CostContext<'_>,
    mover: &MoverProfile,
    origin: NodeId,
    budget: f32,
) -> Vec<(NodeId, f32)> {
    let mut found = Vec::new();
    search(ctx, mover, origin, budget, |node, cost| {
        found.push((node, cost));
        ControlFlow::Continue(())
    });
    found
}

/// Cheapest path from `origin` to `target` within `budget` (which may be
/// infinite). `None` if unreachable.
pub fn find_path(
    ctx: &CostContext<'_>,
    mover: &MoverProfile,
    origin: NodeId,
    target: NodeId,
    budget: f32,
) -> Option<PathResult> {
    let tree = search(ctx, mover, origin, budget, |node, _| {
        if node == target {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    tree.path_to(target)
}
