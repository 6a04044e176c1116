// Error type for structural validation and lookups.
//
// Every fallible operation in the crate returns `Result<T>` with
// `GridError`. Two families of failure live here:
// - construction errors (bad heights, overlapping nodes, unknown surfaces,
//   invalid config), which mean the caller handed us malformed data;
// - lookup errors (missing node / wall / entity, out-of-bounds column),
//   which mean an edit or query referenced something that does not exist.
//
// Normal negative outcomes are *not* errors: an inadmissible transition is
// `MoveCost::Inadmissible` (see `cost.rs`) and an unreachable target is
// `RangeResult { reachable: false, .. }` (see `reachability.rs`).

use crate::types::{ActorId, ClimbableId, EntityId, GridCoord, NodeId, WallId};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum GridError {
    #[error("invalid height interval [{min}, {max}): must satisfy 0 <= min < max")]
    InvalidHeights { min: i32, max: i32 },

    #[error("node interval [{min}, {max}) overlaps {existing} in column {coord}")]
    OverlappingNode {
        coord: GridCoord,
        min: i32,
        max: i32,
        existing: NodeId,
    },

    #[error("column {0} is outside the grid")]
    OutOfBounds(GridCoord),

    #[error("no node with id {0}")]
    NodeNotFound(NodeId),

    #[error("node {0} cannot be stood on")]
    NotWalkable(NodeId),

    #[error("no walkable node in column {0} at height {1}")]
    NoNodeAt(GridCoord, i32),

    #[error("no wall with id {0}")]
    WallNotFound(WallId),

    #[error("no climbable with id {0}")]
    ClimbableNotFound(ClimbableId),

    #[error("no entity with id {0}")]
    EntityNotFound(EntityId),

    #[error("no actor with id {0}")]
    ActorNotFound(ActorId),

    #[error("unknown mover preset '{0}'")]
    UnknownMover(String),

    #[error("no path from {from} to {to}")]
    NoPath { from: NodeId, to: NodeId },

    #[error("unknown surface '{0}'")]
    UnknownSurface(String),

    #[error("invalid wall span: height must be positive and base non-negative (base {base}, height {height})")]
    InvalidWall { base: i32, height: i32 },

    #[error("ladder from {bottom} to {top} does not span adjacent columns upward")]
    InvalidClimbable { bottom: NodeId, top: NodeId },

    #[error("invalid config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, GridError>;
