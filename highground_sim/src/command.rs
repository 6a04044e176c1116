// Commands that mutate simulation state.
//
// All external mutations go through `SimCommand`: terrain edits, wall and
// ladder placement, entity lifecycle, and movement orders. The sim is a
// function `(state, commands) -> (new_state, events)`; commands are the only
// input.
//
// A `SimCommand` carries the `tick` it applies at and a `SimAction`. Actions:
// - Terrain: `SetNodeHeights`, `SetNodeKind`, `SetPassable`.
// - Walls: `PlaceWall`, `RemoveWall`.
// - Climbables: `PlaceLadder` (ladder params from config), `RemoveClimbable`.
// - Entities: `SpawnEntity` (mover preset by name, snapped to the walkable
//   surface nearest `height` in `coord`), `RemoveEntity`, `TeleportEntity`,
//   `SetVisionRange`.
// - Movement: `OrderMove` (path found with an unlimited budget), `StopMove`.
//
// Every terrain, wall, or ladder edit triggers a local transition rebuild
// around the touched columns and invalidates cached vision.
//
// See also: `sim.rs` for `apply_command()` which dispatches these.
//
// **Critical constraint: determinism.** Commands are the sole external input
// to the sim and are applied in slice order.

use crate::types::{ActorId, ClimbableId, Direction, EntityId, GridCoord, NodeId, NodeKind, WallId};
use serde::{Deserialize, Serialize};

/// A command targeting a specific simulation tick.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimCommand {
    pub tick: u64,
    pub action: SimAction,
}

impl SimCommand {
    pub fn new(tick: u64, action: SimAction) -> Self {
        Self { tick, action }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SimAction {
    SetNodeHeights {
        node: NodeId,
        min_height: i32,
        max_height: i32,
    },
    SetNodeKind { node: NodeId, kind: NodeKind },
    SetPassable { node: NodeId, passable: bool },
    PlaceWall {
        coord: GridCoord,
        side: Direction,
        base: i32,
        height: i32,
        blocks_vision: bool,
        blocks_movement: bool,
    },
    RemoveWall { wall: WallId },
    /// Ladder from `bottom` up to `top`, which must be in an adjacent column.
    PlaceLadder { bottom: NodeId, top: NodeId },
    RemoveClimbable { climbable: ClimbableId },
    SpawnEntity {
        actor: ActorId,
        coord: GridCoord,
        height: i32,
        /// Name of a mover preset in `GameConfig::movers`.
        mover: String,
    },
    RemoveEntity { entity: EntityId },
    TeleportEntity { entity: EntityId, node: NodeId },
    SetVisionRange { entity: EntityId, range: f32 },
    OrderMove { entity: EntityId, target: NodeId },
    StopMove { entity: EntityId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_serialization_roundtrip() {
        let cmd = SimCommand::new(
            7,
            SimAction::PlaceWall {
                coord: GridCoord::new(3, 4),
                side: Direction::East,
                base: 1,
                height: 2,
                blocks_vision: true,
                blocks_movement: false,
            },
        );
        let json = serde_json::to_string(&cmd).unwrap();
        let restored: SimCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.tick, 7);
        // SimAction doesn't derive PartialEq, so compare via re-serialization.
        assert_eq!(json, serde_json::to_string(&restored).unwrap());
    }
}
