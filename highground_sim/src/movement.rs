// Move execution: walks an entity along a found path, tick by tick.
//
// `MoveStateMachine` has four states:
//
//   Idle --start--> Moving --last transition paid--> Arrived
//                     |
//                     +--next transition gone or inadmissible--> Blocked
//                     +--stop / reset--> Idle
//
// Each tick a moving entity has `tick_seconds` of time. It spends it paying
// the cost of the current transition at `speed` cost units per second, scaled
// by the transition's speed multiplier (climbables move slower). Leftover time
// carries into the next transition within the same tick, so a fast mover can
// cross several cells per tick. Partial progress is kept between ticks.
//
// Before paying for a transition the machine re-checks it against the live
// graph: if it was removed or the mover can no longer take it (a wall went
// up, a ladder was removed), the machine stops in `Blocked`.
//
// Observers either consume the `MoveEvent`s every call returns (the sim
// tags them with the entity and queues them, see `event.rs`) or register
// callbacks with `subscribe`.
//
// See also: `reachability.rs` for `find_path`, `cost.rs` for pricing and
// climb speeds, `sim.rs` which owns one machine per entity.

use crate::cost::{CostContext, MoveCost, movement_cost, transition_speed};
use crate::mover::MoverProfile;
use crate::reachability::PathResult;
use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveState {
    #[default]
    Idle,
    Moving,
    Arrived,
    Blocked,
}

/// Why movement stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    Arrived,
    Blocked,
    Cancelled,
}

/// Notifications emitted by the machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MoveEvent {
    /// A path was accepted and movement begins.
    NewPath { target: NodeId, total_cost: f32 },
    /// The final node of the path was reached.
    TargetReached { node: NodeId },
    /// Movement ended, for any reason.
    StopMoving { node: NodeId, reason: StopReason },
}

type Callback = Box<dyn FnMut(&MoveEvent) + Send>;

pub struct MoveStateMachine {
    state: MoveState,
    position: NodeId,
    path: Option<PathResult>,
    /// Index into `path.transitions` of the transition being crossed.
    next: usize,
    /// Cost already paid toward the current transition.
    progress: f32,
    callbacks: Vec<Callback>,
}

impl fmt::Debug for MoveStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MoveStateMachine")
            .field("state", &self.state)
            .field("position", &self.position)
            .field("path", &self.path)
            .field("next", &self.next)
            .field("progress", &self.progress)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl MoveStateMachine {
    pub fn new(position: NodeId) -> Self {
        Self {
            state: MoveState::Idle,
            position,
            path: None,
            next: 0,
            progress: 0.0,
            callbacks: Vec::new(),
        }
    }

    /// Register a callback invoked for every event, in emission order.
    pub fn subscribe(&mut self, callback: impl FnMut(&MoveEvent) + Send + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    pub fn state(&self) -> MoveState {
        self.state
    }

    /// The node the entity currently stands on (the origin of the transition
    /// being crossed, while moving).
    pub fn position(&self) -> NodeId {
        self.position
    }

    pub fn path(&self) -> Option<&PathResult> {
        self.path.as_ref()
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn is_moving(&self) -> bool {
        self.state == MoveState::Moving
    }

    /// Final node of the current path, if any.
    pub fn target(&self) -> Option<NodeId> {
        self.path.as_ref().and_then(|p| p.nodes.last().copied())
    }

    fn emit(&mut self, events: &mut Vec<MoveEvent>, event: MoveEvent) {
        for callback in &mut self.callbacks {
            callback(&event);
        }
        events.push(event);
    }

    fn arrive(&mut self, events: &mut Vec<MoveEvent>) {
        self.state = MoveState::Arrived;
        self.progress = 0.0;
        let node = self.position;
        self.emit(events, MoveEvent::TargetReached { node });
        self.emit(
            events,
            MoveEvent::StopMoving {
                node,
                reason: StopReason::Arrived,
            },
        );
    }

    /// Begin following `path`, which must start at the current position.
    /// Replaces any path in progress.
    pub fn start(&mut self, path: PathResult) -> Vec<MoveEvent> {
        let mut events = Vec::new();
        let target = path.nodes.last().copied().unwrap_or(self.position);
        let total_cost = path.total_cost;
        let empty = path.transitions.is_empty();
        self.path = Some(path);
        self.next = 0;
        self.progress = 0.0;
        self.state = MoveState::Moving;
        self.emit(&mut events, MoveEvent::NewPath { target, total_cost });
        if empty {
            self.arrive(&mut events);
        }
        events
    }

    /// Cancel movement. Emits `StopMoving` only if the entity was moving.
    pub fn stop(&mut self) -> Vec<MoveEvent> {
        let mut events = Vec::new();
        if self.state == MoveState::Moving {
            let node = self.position;
            self.emit(
                &mut events,
                MoveEvent::StopMoving {
                    node,
                    reason: StopReason::Cancelled,
                },
            );
        }
        self.state = MoveState::Idle;
        self.path = None;
        self.next = 0;
        self.progress = 0.0;
        events
    }

    /// Move the entity to `node` outright (teleport), cancelling movement.
    pub fn reset(&mut self, node: NodeId) -> Vec<MoveEvent> {
        let events = self.stop();
        self.position = node;
        events
    }

    /// Spend one tick of movement.
    pub fn advance(
        &mut self,
        ctx: &CostContext<'_>,
        mover: &MoverProfile,
        tick_seconds: f32,
    ) -> Vec<MoveEvent> {
        let mut events = Vec::new();
        let mut time = tick_seconds;

        while self.state == MoveState::Moving {
            let Some((tid, expected)) = self.path.as_ref().and_then(|p| {
                let tid = p.transitions.get(self.next).copied()?;
                Some((tid, p.nodes.get(self.next + 1).copied()))
            }) else {
                self.arrive(&mut events);
                break;
            };

            // Transition ids are reused after rebuilds, so check both ends.
            let live = ctx
                .graph
                .get(tid)
                .filter(|t| t.from == self.position && Some(t.to) == expected);
            let Some((transition, MoveCost::Admissible(cost))) =
                live.map(|t| (t, movement_cost(ctx, mover, t)))
            else {
                self.state = MoveState::Blocked;
                self.progress = 0.0;
                let node = self.position;
                self.emit(
                    &mut events,
                    MoveEvent::StopMoving {
                        node,
                        reason: StopReason::Blocked,
                    },
                );
                break;
            };

            let rate = mover.speed * transition_speed(ctx, transition);
            let remaining = (cost - self.progress).max(0.0);
            if remaining > 0.0 && (rate <= 0.0 || time <= 0.0) {
                break;
            }
            let needed = if remaining > 0.0 { remaining / rate } else { 0.0 };
            if needed > time {
                self.progress += time * rate;
                break;
            }

            time -= needed;
            self.progress = 0.0;
            self.position = transition.to;
            self.next += 1;
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::climbable::{ClimbableSet, Ladder};
    use crate::config::{ClimbingParams, GameConfig, GraphParams, SurfaceRegistry};
    use crate::grid::TerrainGrid;
    use crate::reachability::find_path;
    use crate::transition::{TransitionGraph, build_graph};
    use crate::types::{ClimbSkill, Direction, GridCoord, NodeKind, SurfaceId};
    use std::sync::{Arc, Mutex};

    struct World {
        grid: TerrainGrid,
        graph: TransitionGraph,
        climbables: ClimbableSet,
        surfaces: SurfaceRegistry,
        params: GraphParams,
    }

    impl World {
        fn row(heights: &[i32]) -> Self {
            let mut grid = TerrainGrid::new(heights.len() as u32, 1);
            for (x, h) in heights.iter().enumerate() {
                grid.add_node(GridCoord::new(x as i32, 0), 0, *h, NodeKind::Ground, SurfaceId(0))
                    .unwrap();
            }
            let climbables = ClimbableSet::new();
            let params = GraphParams::default();
            let graph = build_graph(&grid, &climbables, &params);
            Self {
                grid,
                graph,
                climbables,
                surfaces: SurfaceRegistry::from_config(&GameConfig::default()),
                params,
            }
        }

        fn at(&self, x: i32) -> NodeId {
            self.grid.column(GridCoord::new(x, 0))[0]
        }

        fn ctx(&self) -> CostContext<'_> {
            CostContext {
                grid: &self.grid,
                graph: &self.graph,
                climbables: &self.climbables,
                surfaces: &self.surfaces,
                params: &self.params,
            }
        }

        fn path(&self, mover: &MoverProfile, from: i32, to: i32) -> PathResult {
            find_path(&self.ctx(), mover, self.at(from), self.at(to), f32::INFINITY).unwrap()
        }
    }

    #[test]
    fn walks_to_target_and_arrives() {
        let w = World::row(&[1, 1, 1, 1]);
        let mover = MoverProfile::default();
        let mut m = MoveStateMachine::new(w.at(0));
        let events = m.start(w.path(&mover, 0, 3));
        assert_eq!(
            events,
            vec![MoveEvent::NewPath {
                target: w.at(3),
                total_cost: 3.0
            }]
        );
        assert!(m.is_moving());

        // Speed 1, half a second per tick: two ticks per cell.
        let mut all = Vec::new();
        for _ in 0..5 {
            all.extend(m.advance(&w.ctx(), &mover, 0.5));
        }
        assert!(all.is_empty());
        assert_eq!(m.position(), w.at(2));
        assert_eq!(m.progress(), 0.5);

        let events = m.advance(&w.ctx(), &mover, 0.5);
        assert_eq!(
            events,
            vec![
                MoveEvent::TargetReached { node: w.at(3) },
                MoveEvent::StopMoving {
                    node: w.at(3),
                    reason: StopReason::Arrived
                },
            ]
        );
        assert_eq!(m.state(), MoveState::Arrived);
        assert!(m.advance(&w.ctx(), &mover, 0.5).is_empty());
    }

    #[test]
    fn fast_mover_crosses_several_cells_per_tick() {
        let w = World::row(&[1, 1, 1, 1, 1]);
        let mover = MoverProfile {
            speed: 2.0,
            ..MoverProfile::default()
        };
        let mut m = MoveStateMachine::new(w.at(0));
        m.start(w.path(&mover, 0, 4));
        m.advance(&w.ctx(), &mover, 1.0);
        assert_eq!(m.position(), w.at(2));
        m.advance(&w.ctx(), &mover, 1.0);
        assert_eq!(m.state(), MoveState::Arrived);
        assert_eq!(m.position(), w.at(4));
    }

    #[test]
    fn empty_path_arrives_immediately() {
        let w = World::row(&[1, 1]);
        let mover = MoverProfile::default();
        let mut m = MoveStateMachine::new(w.at(0));
        let events = m.start(w.path(&mover, 0, 0));
        assert_eq!(events.len(), 3);
        assert_eq!(m.state(), MoveState::Arrived);
    }

    #[test]
    fn stop_cancels_movement() {
        let w = World::row(&[1, 1, 1]);
        let mover = MoverProfile::default();
        let mut m = MoveStateMachine::new(w.at(0));
        m.start(w.path(&mover, 0, 2));
        let events = m.stop();
        assert_eq!(
            events,
            vec![MoveEvent::StopMoving {
                node: w.at(0),
                reason: StopReason::Cancelled
            }]
        );
        assert_eq!(m.state(), MoveState::Idle);
        assert!(m.stop().is_empty());
    }

    #[test]
    fn removed_transition_blocks() {
        let mut w = World::row(&[1, 1, 1]);
        let mover = MoverProfile::default();
        let mut m = MoveStateMachine::new(w.at(0));
        m.start(w.path(&mover, 0, 2));

        w.grid
            .add_wall(GridCoord::new(1, 0), Direction::East, 0, 5, true, true)
            .unwrap();
        w.graph = build_graph(&w.grid, &w.climbables, &w.params);

        let events = m.advance(&w.ctx(), &mover, 10.0);
        assert_eq!(
            events,
            vec![MoveEvent::StopMoving {
                node: w.at(1),
                reason: StopReason::Blocked
            }]
        );
        assert_eq!(m.state(), MoveState::Blocked);
    }

    #[test]
    fn ladder_climb_is_slower() {
        let mut w = World::row(&[1, 5]);
        let ladder = Ladder::from_params(Direction::East, &ClimbingParams::default());
        w.climbables
            .place(&w.grid, w.at(0), w.at(1), Box::new(ladder))
            .unwrap();
        w.graph = build_graph(&w.grid, &w.climbables, &w.params);
        let mover = MoverProfile::default().with_skill(ClimbSkill::Basic);

        let mut m = MoveStateMachine::new(w.at(0));
        m.start(w.path(&mover, 0, 1));
        // Cost 1.6 at speed 1 * 0.5: 3.2 seconds.
        m.advance(&w.ctx(), &mover, 3.0);
        assert!(m.is_moving());
        m.advance(&w.ctx(), &mover, 0.25);
        assert_eq!(m.state(), MoveState::Arrived);
    }

    #[test]
    fn callbacks_see_every_event() {
        let w = World::row(&[1, 1]);
        let mover = MoverProfile::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let mut m = MoveStateMachine::new(w.at(0));
        m.subscribe(move |e| sink.lock().unwrap().push(e.clone()));
        m.start(w.path(&mover, 0, 1));
        m.advance(&w.ctx(), &mover, 5.0);
        let seen = log.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(matches!(seen[0], MoveEvent::NewPath { .. }));
        assert!(matches!(seen[2], MoveEvent::StopMoving { reason: StopReason::Arrived, .. }));
    }
}
