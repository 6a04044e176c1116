// Core simulation state and tick loop.
//
// `SimState` is the single source of truth: it owns the config, the surface
// registry, the terrain grid, the transition graph, placed climbables, all
// entities, every actor's fog-of-war, and the outgoing event queue. The sim
// is a function `(state, commands) -> (new_state, events)`.
//
// ## Tick
//
// `step(commands, target_tick)` advances one tick at a time. Each tick:
//
//   1. Apply every command whose tick has come, in slice order. A failing
//      command is logged, reported in `StepResult::rejected`, and skipped;
//      the rest still apply.
//   2. Advance every moving entity by `tick_seconds` (`movement.rs`),
//      queueing the `NewPath` / `TargetReached` / `StopMoving` events.
//   3. Update vision (`update_vision`): recast dirty casters, refresh entity
//      sightings for the rest, then recompute every actor's aggregate.
//
// ## Vision dirty tracking
//
// Each entity remembers the key of its last cast: node, surface height,
// vision range, and the topology epoch. Any terrain, wall, or ladder edit
// bumps the epoch. Only entities whose key changed are recast; when enough
// of them are dirty (`vision.parallel_cast_threshold`) the casts fan out on
// the rayon pool. Results are merged serially in entity id order.
//
// ## Edits
//
// Edits take `&mut self` and queries take `&self`, so a query can never see
// a half-applied edit. Every edit to terrain, walls, or climbables rebuilds
// the transition graph locally around the touched columns
// (`TransitionGraph::rebuild_columns`).
//
// See also: `command.rs` for `SimCommand`, `event.rs` for `SimEvent`,
// `config.rs` for `GameConfig`, `transition.rs`, `reachability.rs`,
// `vision.rs`, `exploration.rs`.
//
// **Critical constraint: determinism.** Entities and actors live in
// `BTreeMap`s and are processed in id order. Parallel casting writes nothing
// shared; its results are collected in job order.

use crate::climbable::{ClimbableSet, Ladder};
use crate::command::{SimAction, SimCommand};
use crate::config::{GameConfig, SurfaceRegistry};
use crate::cost::{self, CostContext, MoveCost};
use crate::error::{GridError, Result};
use crate::event::{EventQueue, SimEvent, SimEventKind};
use crate::exploration::ActorVision;
use crate::grid::TerrainGrid;
use crate::movement::MoveStateMachine;
use crate::mover::MoverProfile;
use crate::reachability::{self, PathResult, RangeResult};
use crate::transition::{self, TransitionGraph};
use crate::types::{
    ActorId, ClimbableId, Direction, EntityId, GridCoord, NodeId, NodeKind, WallId,
};
use crate::vision::{self, VisionData, VisionSource, VisionWorld};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// What a caster's last cast was computed from.
#[derive(Clone, Copy, Debug, PartialEq)]
struct CastKey {
    node: NodeId,
    top: i32,
    range: f32,
    epoch: u64,
}

/// A unit on the map.
#[derive(Debug)]
pub struct Entity {
    pub id: EntityId,
    pub actor: ActorId,
    /// Name of the mover preset it was spawned from.
    pub mover: String,
    pub profile: MoverProfile,
    pub movement: MoveStateMachine,
    /// Sticky vision of this caster.
    pub vision: VisionData,
    cast_key: Option<CastKey>,
}

impl Entity {
    pub fn position(&self) -> NodeId {
        self.movement.position()
    }
}

/// A command that failed to apply.
#[derive(Clone, Debug, PartialEq)]
pub struct RejectedCommand {
    /// Index into the command slice passed to `step`.
    pub index: usize,
    pub tick: u64,
    pub error: GridError,
}

/// The result of processing commands and advancing the simulation.
#[derive(Clone, Debug, Default)]
pub struct StepResult {
    pub rejected: Vec<RejectedCommand>,
    /// Vision casts performed during the step.
    pub casts: usize,
}

/// Top-level simulation state.
#[derive(Debug)]
pub struct SimState {
    /// Current simulation tick.
    pub tick: u64,
    config: GameConfig,
    surfaces: SurfaceRegistry,
    grid: TerrainGrid,
    graph: TransitionGraph,
    climbables: ClimbableSet,
    entities: BTreeMap<EntityId, Entity>,
    actors: BTreeMap<ActorId, ActorVision>,
    events: EventQueue,
    next_entity_id: u32,
    /// Bumped on every topology edit; invalidates every cached cast.
    topology_epoch: u64,
}

impl SimState {
    /// Create a sim with an empty grid of `config.grid_size`.
    pub fn new(config: GameConfig) -> Result<Self> {
        let (width, depth) = config.grid_size;
        Self::with_grid(config, TerrainGrid::new(width, depth))
    }

    /// Create a sim over prebuilt terrain. The transition graph is built
    /// here.
    pub fn with_grid(config: GameConfig, grid: TerrainGrid) -> Result<Self> {
        config.validate()?;
        let surfaces = SurfaceRegistry::from_config(&config);
        if let Some(node) = grid
            .nodes()
            .iter()
            .find(|n| n.surface.index() >= surfaces.len())
        {
            return Err(GridError::Config(format!(
                "{} uses {} but only {} surfaces are defined",
                node.id,
                node.surface,
                surfaces.len()
            )));
        }
        let climbables = ClimbableSet::new();
        let graph = transition::build_graph(&grid, &climbables, &config.graph);
        log::info!(
            "sim created: {}x{} grid, {} nodes, {} surfaces",
            grid.width,
            grid.depth,
            grid.node_count(),
            surfaces.len()
        );
        Ok(Self {
            tick: 0,
            config,
            surfaces,
            grid,
            graph,
            climbables,
            entities: BTreeMap::new(),
            actors: BTreeMap::new(),
            events: EventQueue::new(),
            next_entity_id: 0,
            topology_epoch: 0,
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn surfaces(&self) -> &SurfaceRegistry {
        &self.surfaces
    }

    pub fn grid(&self) -> &TerrainGrid {
        &self.grid
    }

    pub fn graph(&self) -> &TransitionGraph {
        &self.graph
    }

    pub fn climbables(&self) -> &ClimbableSet {
        &self.climbables
    }

    /// Borrow everything a cost or reachability query needs.
    pub fn cost_context(&self) -> CostContext<'_> {
        CostContext {
            grid: &self.grid,
            graph: &self.graph,
            climbables: &self.climbables,
            surfaces: &self.surfaces,
            params: &self.config.graph,
        }
    }

    /// Resolve a mover preset from the config.
    pub fn mover_profile(&self, name: &str) -> Result<MoverProfile> {
        let def = self
            .config
            .movers
            .get(name)
            .ok_or_else(|| GridError::UnknownMover(name.to_string()))?;
        MoverProfile::from_def(def, &self.surfaces)
    }

    // -----------------------------------------------------------------------
    // Tick loop
    // -----------------------------------------------------------------------

    /// Apply a batch of commands and advance the sim to `target_tick`.
    ///
    /// Commands must be sorted by tick. Commands with tick > `target_tick`
    /// are not applied (caller error).
    pub fn step(&mut self, commands: &[SimCommand], target_tick: u64) -> StepResult {
        let mut result = StepResult::default();
        let mut cmd_idx = 0;

        while self.tick < target_tick {
            self.tick += 1;

            while let Some(cmd) = commands.get(cmd_idx).filter(|c| c.tick <= self.tick) {
                if let Err(error) = self.apply_command(&cmd.action) {
                    log::warn!("tick {}: rejected command #{cmd_idx}: {error}", self.tick);
                    result.rejected.push(RejectedCommand {
                        index: cmd_idx,
                        tick: self.tick,
                        error,
                    });
                }
                cmd_idx += 1;
            }

            self.advance_movement();
            result.casts += self.update_vision();
        }
        result
    }

    /// Apply a single command.
    fn apply_command(&mut self, action: &SimAction) -> Result<()> {
        match action {
            SimAction::SetNodeHeights {
                node,
                min_height,
                max_height,
            } => self.set_node_heights(*node, *min_height, *max_height),
            SimAction::SetNodeKind { node, kind } => self.set_node_kind(*node, *kind),
            SimAction::SetPassable { node, passable } => self.set_passable(*node, *passable),
            SimAction::PlaceWall {
                coord,
                side,
                base,
                height,
                blocks_vision,
                blocks_movement,
            } => self
                .place_wall(*coord, *side, *base, *height, *blocks_vision, *blocks_movement)
                .map(|_| ()),
            SimAction::RemoveWall { wall } => self.remove_wall(*wall),
            SimAction::PlaceLadder { bottom, top } => self.place_ladder(*bottom, *top).map(|_| ()),
            SimAction::RemoveClimbable { climbable } => self.remove_climbable(*climbable),
            SimAction::SpawnEntity {
                actor,
                coord,
                height,
                mover,
            } => self.spawn_entity(*actor, *coord, *height, mover).map(|_| ()),
            SimAction::RemoveEntity { entity } => self.remove_entity(*entity),
            SimAction::TeleportEntity { entity, node } => self.teleport_entity(*entity, *node),
            SimAction::SetVisionRange { entity, range } => self.set_vision_range(*entity, *range),
            SimAction::OrderMove { entity, target } => self.order_move(*entity, *target),
            SimAction::StopMove { entity } => self.stop_move(*entity),
        }
    }

    fn advance_movement(&mut self) {
        let ctx = CostContext {
            grid: &self.grid,
            graph: &self.graph,
            climbables: &self.climbables,
            surfaces: &self.surfaces,
            params: &self.config.graph,
        };
        let tick_seconds = self.config.movement.tick_seconds;
        for entity in self.entities.values_mut() {
            if !entity.movement.is_moving() {
                continue;
            }
            for event in entity.movement.advance(&ctx, &entity.profile, tick_seconds) {
                self.events
                    .push(self.tick, SimEventKind::from_move(entity.id, event));
            }
        }
    }

    /// Entities grouped by the node they stand on.
    fn occupants(&self) -> BTreeMap<NodeId, Vec<EntityId>> {
        let mut occupants: BTreeMap<NodeId, Vec<EntityId>> = BTreeMap::new();
        for entity in self.entities.values() {
            occupants.entry(entity.position()).or_default().push(entity.id);
        }
        occupants
    }

    /// Recast dirty casters and recompute every actor's aggregate. Returns
    /// the number of casts. Runs once per tick inside `step`; call it
    /// directly to refresh after edits made outside `step`.
    pub fn update_vision(&mut self) -> usize {
        let occupants = self.occupants();
        let epoch = self.topology_epoch;

        let mut jobs = Vec::new();
        for entity in self.entities.values() {
            let node = entity.position();
            let Ok(standing) = self.grid.try_node(node) else {
                continue;
            };
            let key = CastKey {
                node,
                top: standing.top(),
                range: entity.profile.vision_range,
                epoch,
            };
            if entity.cast_key != Some(key) {
                jobs.push((entity.id, key));
            }
        }

        let world = VisionWorld {
            grid: &self.grid,
            params: &self.config.vision,
            occupants: &occupants,
        };
        let cast = |(id, key): &(EntityId, CastKey)| {
            let source = VisionSource {
                node: key.node,
                range: key.range,
            };
            (*id, *key, vision::compute_visibility(&world, source))
        };
        let results: Vec<_> = if jobs.len() >= self.config.vision.parallel_cast_threshold {
            jobs.par_iter().map(cast).collect()
        } else {
            jobs.iter().map(cast).collect()
        };

        let casts = results.len();
        for (id, key, fresh) in results {
            if let Some(entity) = self.entities.get_mut(&id) {
                entity.vision = vision::refresh_caster(&entity.vision, fresh);
                entity.cast_key = Some(key);
            }
        }
        for entity in self.entities.values_mut() {
            vision::refresh_entities(&mut entity.vision, &occupants);
        }
        for (actor_id, actor) in &mut self.actors {
            actor.recompute(
                self.entities
                    .values()
                    .filter(|e| e.actor == *actor_id)
                    .map(|e| &e.vision),
            );
        }

        if casts > 0 {
            log::debug!(
                "tick {}: {casts} vision cast(s), {} actor(s) aggregated",
                self.tick,
                self.actors.len()
            );
        }
        casts
    }

    /// Remove and return every event emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        self.events.drain()
    }

    // -----------------------------------------------------------------------
    // Terrain, walls, climbables
    // -----------------------------------------------------------------------

    fn topology_changed(&mut self, columns: &[GridCoord]) {
        self.graph
            .rebuild_columns(&self.grid, &self.climbables, &self.config.graph, columns);
        self.topology_epoch += 1;
    }

    /// Add a node with a named surface.
    pub fn add_node(
        &mut self,
        coord: GridCoord,
        min_height: i32,
        max_height: i32,
        kind: NodeKind,
        surface: &str,
    ) -> Result<NodeId> {
        let surface = self.surfaces.resolve(surface)?;
        let id = self
            .grid
            .add_node(coord, min_height, max_height, kind, surface)?;
        self.topology_changed(&[coord]);
        Ok(id)
    }

    /// Add a ground node with the config's default surface.
    pub fn add_ground(&mut self, coord: GridCoord, min_height: i32, max_height: i32) -> Result<NodeId> {
        let surface = self.config.default_surface.clone();
        self.add_node(coord, min_height, max_height, NodeKind::Ground, &surface)
    }

    pub fn set_node_heights(&mut self, node: NodeId, min_height: i32, max_height: i32) -> Result<()> {
        let coord = self.grid.try_node(node)?.coord;
        self.grid.set_node_heights(node, min_height, max_height)?;
        self.topology_changed(&[coord]);
        Ok(())
    }

    pub fn set_node_kind(&mut self, node: NodeId, kind: NodeKind) -> Result<()> {
        let coord = self.grid.try_node(node)?.coord;
        self.grid.set_node_kind(node, kind)?;
        self.topology_changed(&[coord]);
        Ok(())
    }

    pub fn set_node_surface(&mut self, node: NodeId, surface: &str) -> Result<()> {
        let surface = self.surfaces.resolve(surface)?;
        self.grid.set_node_surface(node, surface)?;
        Ok(())
    }

    pub fn set_passable(&mut self, node: NodeId, passable: bool) -> Result<()> {
        let coord = self.grid.try_node(node)?.coord;
        self.grid.set_passable(node, passable)?;
        self.topology_changed(&[coord]);
        Ok(())
    }

    pub fn place_wall(
        &mut self,
        coord: GridCoord,
        side: Direction,
        base: i32,
        height: i32,
        blocks_vision: bool,
        blocks_movement: bool,
    ) -> Result<WallId> {
        let id = self
            .grid
            .add_wall(coord, side, base, height, blocks_vision, blocks_movement)?;
        self.topology_changed(&[coord, coord.offset(side)]);
        Ok(id)
    }

    pub fn remove_wall(&mut self, wall: WallId) -> Result<()> {
        let removed = self.grid.remove_wall(wall)?;
        self.topology_changed(&[removed.coord, removed.coord.offset(removed.side)]);
        Ok(())
    }

    /// Place a ladder with the configured ladder parameters.
    pub fn place_ladder(&mut self, bottom: NodeId, top: NodeId) -> Result<ClimbableId> {
        let from = self.grid.try_node(bottom)?.coord;
        let to = self.grid.try_node(top)?.coord;
        let side = Direction::between(from, to).ok_or(GridError::InvalidClimbable { bottom, top })?;
        let ladder = Ladder::from_params(side, &self.config.climbing);
        let id = self
            .climbables
            .place(&self.grid, bottom, top, Box::new(ladder))?;
        self.topology_changed(&[from, to]);
        Ok(id)
    }

    pub fn remove_climbable(&mut self, climbable: ClimbableId) -> Result<()> {
        let placed = self.climbables.remove(climbable)?;
        let from = self.grid.node(placed.bottom).coord;
        let to = self.grid.node(placed.top).coord;
        self.topology_changed(&[from, to]);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// All entities in id order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    fn entity_mut(&mut self, id: EntityId) -> Result<&mut Entity> {
        self.entities.get_mut(&id).ok_or(GridError::EntityNotFound(id))
    }

    /// Spawn an entity of a mover preset on the walkable surface of `coord`
    /// closest to `height`.
    pub fn spawn_entity(
        &mut self,
        actor: ActorId,
        coord: GridCoord,
        height: i32,
        mover: &str,
    ) -> Result<EntityId> {
        let profile = self.mover_profile(mover)?;
        if !self.grid.in_bounds(coord) {
            return Err(GridError::OutOfBounds(coord));
        }
        let node = self
            .grid
            .find_surface(coord, height, self.config.graph.standing_clearance)
            .ok_or(GridError::NoNodeAt(coord, height))?;

        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;
        self.entities.insert(
            id,
            Entity {
                id,
                actor,
                mover: mover.to_string(),
                profile,
                movement: MoveStateMachine::new(node),
                vision: VisionData::new(),
                cast_key: None,
            },
        );
        self.actors.entry(actor).or_default();
        self.events
            .push(self.tick, SimEventKind::EntitySpawned { entity: id, actor, node });
        log::debug!("spawned {id} ({mover}) for {actor} at {coord}");
        Ok(id)
    }

    pub fn remove_entity(&mut self, entity: EntityId) -> Result<()> {
        self.entities
            .remove(&entity)
            .ok_or(GridError::EntityNotFound(entity))?;
        self.events
            .push(self.tick, SimEventKind::EntityRemoved { entity });
        Ok(())
    }

    /// Move an entity straight onto `node`, cancelling any move in progress.
    /// The node must be one an entity could spawn on.
    pub fn teleport_entity(&mut self, entity: EntityId, node: NodeId) -> Result<()> {
        self.grid.try_node(node)?;
        if !self.grid.is_walkable(node, self.config.graph.standing_clearance) {
            return Err(GridError::NotWalkable(node));
        }
        let tick = self.tick;
        let moved = self.entity_mut(entity)?.movement.reset(node);
        for event in moved {
            self.events.push(tick, SimEventKind::from_move(entity, event));
        }
        Ok(())
    }

    pub fn set_vision_range(&mut self, entity: EntityId, range: f32) -> Result<()> {
        self.entity_mut(entity)?.profile.vision_range = range;
        Ok(())
    }

    /// Path the entity to `target` with an unlimited budget and start moving.
    pub fn order_move(&mut self, entity: EntityId, target: NodeId) -> Result<()> {
        self.grid.try_node(target)?;
        let ctx = CostContext {
            grid: &self.grid,
            graph: &self.graph,
            climbables: &self.climbables,
            surfaces: &self.surfaces,
            params: &self.config.graph,
        };
        let e = self
            .entities
            .get_mut(&entity)
            .ok_or(GridError::EntityNotFound(entity))?;
        let from = e.position();
        let path = reachability::find_path(&ctx, &e.profile, from, target, f32::INFINITY)
            .ok_or(GridError::NoPath { from, to: target })?;
        for event in e.movement.start(path) {
            self.events
                .push(self.tick, SimEventKind::from_move(entity, event));
        }
        Ok(())
    }

    pub fn stop_move(&mut self, entity: EntityId) -> Result<()> {
        let tick = self.tick;
        let stopped = self.entity_mut(entity)?.movement.stop();
        for event in stopped {
            self.events.push(tick, SimEventKind::from_move(entity, event));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Movement queries
    // -----------------------------------------------------------------------

    pub fn movement_cost_between(&self, mover: &MoverProfile, from: NodeId, to: NodeId) -> MoveCost {
        cost::movement_cost_between(&self.cost_context(), mover, from, to)
    }

    pub fn is_in_range(
        &self,
        mover: &MoverProfile,
        origin: NodeId,
        target: NodeId,
        budget: f32,
    ) -> RangeResult {
        reachability::is_in_range(&self.cost_context(), mover, origin, target, budget)
    }

    pub fn reachable_nodes(&self, mover: &MoverProfile, origin: NodeId, budget: f32) -> Vec<(NodeId, f32)> {
        reachability::reachable_nodes(&self.cost_context(), mover, origin, budget)
    }

    pub fn find_path(
        &self,
        mover: &MoverProfile,
        origin: NodeId,
        target: NodeId,
        budget: f32,
    ) -> Option<PathResult> {
        reachability::find_path(&self.cost_context(), mover, origin, target, budget)
    }

    // -----------------------------------------------------------------------
    // Vision queries
    // -----------------------------------------------------------------------

    pub fn actor_vision(&self, actor: ActorId) -> Option<&ActorVision> {
        self.actors.get(&actor)
    }

    /// Actors in id order.
    pub fn actors(&self) -> impl Iterator<Item = ActorId> + '_ {
        self.actors.keys().copied()
    }

    fn actor_query<T>(&self, actor: ActorId, query: impl Fn(&ActorVision) -> Vec<T>) -> Vec<T> {
        self.actors.get(&actor).map(query).unwrap_or_default()
    }

    pub fn visible_nodes(&self, actor: ActorId) -> Vec<NodeId> {
        self.actor_query(actor, ActorVision::visible_nodes)
    }

    pub fn visible_entities(&self, actor: ActorId) -> Vec<EntityId> {
        self.actor_query(actor, ActorVision::visible_entities)
    }

    pub fn visible_walls(&self, actor: ActorId) -> Vec<WallId> {
        self.actor_query(actor, ActorVision::visible_walls)
    }

    pub fn explored_nodes(&self, actor: ActorId) -> Vec<NodeId> {
        self.actor_query(actor, ActorVision::explored_nodes)
    }

    pub fn explored_walls(&self, actor: ActorId) -> Vec<WallId> {
        self.actor_query(actor, ActorVision::explored_walls)
    }
}
