// highground_sim — pure Rust simulation library.
//
// This crate contains the simulation core of a tactical map built on a
// height grid: the terrain, the graph of moves between surfaces and what
// they cost each kind of mover, budgeted reachability, per-actor vision
// with fog of war, and the command interface that edits all of it. It has
// no rendering or engine dependencies and can be tested, benchmarked, and
// run headless.
//
// Module overview:
// - `sim.rs`:          Top-level SimState, tick loop, command/event processing.
// - `grid.rs`:         TerrainGrid: columns of stacked height nodes, chunk buckets, edge walls.
// - `transition.rs`:   Directed transitions between adjacent nodes + local rebuilds.
// - `climbable.rs`:    Climbable trait, Ladder, and placed climbables.
// - `cost.rs`:         Per-mover admissibility and cost of a transition.
// - `reachability.rs`: Budgeted Dijkstra: in-range checks, reachable sets, paths.
// - `movement.rs`:     Per-entity movement state machine that walks a path over ticks.
// - `vision.rs`:       Per-caster sightline casting and sticky VisionData.
// - `exploration.rs`:  Per-actor aggregate of caster vision (visible vs. explored).
// - `command.rs`:      SimCommand / SimAction — all sim mutations.
// - `event.rs`:        EventQueue (priority queue) + SimEvents for observers.
// - `config.rs`:       GameConfig — tunable graph, climbing, vision, surface, mover parameters.
// - `mover.rs`:        MoverProfile — a mover's speed, skills, and surface aptitudes.
// - `error.rs`:        GridError and the crate Result alias.
// - `types.rs`:        GridCoord, Direction, compact IDs, NodeKind, ClimbSkill.
//
// **Critical constraint: determinism.** The simulation is a pure function:
// `(state, commands) -> (new_state, events)`. No system time, no OS
// entropy. Use `BTreeMap` wherever iteration order is observable; the
// `FxHashMap`s inside are only ever read by key or sorted before use.

pub mod climbable;
pub mod command;
pub mod config;
pub mod cost;
pub mod error;
pub mod event;
pub mod exploration;
pub mod grid;
pub mod movement;
pub mod mover;
pub mod reachability;
pub mod sim;
pub mod transition;
pub mod types;
pub mod vision;

pub use error::{GridError, Result};
pub use sim::SimState;
