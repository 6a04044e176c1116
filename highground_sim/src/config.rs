// Data-driven game configuration.
//
// All tunable simulation parameters live here in `GameConfig`, loaded from
// JSON at startup. The sim never uses magic numbers; it reads from the
// config. Parameters are grouped into nested structs:
// - `GraphParams`: base step distance, hop limits and per-level hop costs,
//   standing clearance. Read by the transition builder and the cost engine.
// - `ClimbingParams`: default maximum climbable height per `ClimbSkill`, and
//   the default `LadderParams` used when a ladder is placed without overrides.
// - `VisionParams`: eye/target heights for sightlines and the exploration
//   policy for occluded cells.
// - `MovementParams`: seconds per tick for the move state machine.
//
// Surfaces are an explicit string-keyed table (`surfaces`). At startup the
// table is frozen into a `SurfaceRegistry` that hands out compact
// `SurfaceId`s; there is no global registry. Mover presets (`movers`) are
// the data-driven capability profiles entities are spawned with, resolved
// into `MoverProfile`s through the registry (see `mover.rs`).
//
// See also: `sim.rs` which owns the `GameConfig` and the registry,
// `transition.rs` and `cost.rs` which consume `GraphParams`, `vision.rs`
// which consumes `VisionParams`.
//
// **Critical constraint: determinism.** Config values feed directly into
// simulation logic. `BTreeMap` keeps serialized output and registry id
// assignment stable.

use crate::error::{GridError, Result};
use crate::types::{ClimbSkill, SurfaceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Transition-graph tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphParams {
    /// Cost of one cardinal step on a surface with aptitude 1.0.
    pub base_distance: f32,
    /// Largest upward hop any capability class can make. Hops beyond this
    /// are never built into the graph.
    pub max_hop_up: u32,
    /// Largest downward drop any capability class can make.
    pub max_hop_down: u32,
    /// Extra cost per level of upward hop (divided by the mover's hop aptitude).
    pub hop_up_cost_per_level: f32,
    /// Extra cost per level of downward hop.
    pub hop_down_cost_per_level: f32,
    /// Upward hops taller than this require at least `ClimbSkill::Basic`.
    pub hop_up_skill_threshold: u32,
    /// Free vertical space a mover needs above a surface to stand on it.
    pub standing_clearance: i32,
}

impl Default for GraphParams {
    fn default() -> Self {
        Self {
            base_distance: 1.0,
            max_hop_up: 2,
            max_hop_down: 3,
            hop_up_cost_per_level: 0.5,
            hop_down_cost_per_level: 0.25,
            hop_up_skill_threshold: 1,
            standing_clearance: 2,
        }
    }
}

/// Defaults for a placed ladder.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LadderParams {
    pub min_skill: ClimbSkill,
    pub cost_up: f32,
    pub cost_down: f32,
    /// Speed multiplier while climbing up (applied to the mover's speed).
    pub speed_up: f32,
    /// Speed multiplier while climbing down.
    pub speed_down: f32,
    /// If set, replaces the per-skill height limit for every skill that meets
    /// `min_skill`.
    pub max_height_override: Option<u32>,
}

impl Default for LadderParams {
    fn default() -> Self {
        Self {
            min_skill: ClimbSkill::Basic,
            cost_up: 1.6,
            cost_down: 1.3,
            speed_up: 0.5,
            speed_down: 0.7,
            max_height_override: None,
        }
    }
}

/// Climbing tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimbingParams {
    /// Tallest climb each skill can manage on a climbable without an override.
    /// Skills missing from the table cannot climb at all.
    pub max_height_by_skill: BTreeMap<ClimbSkill, u32>,
    pub ladder: LadderParams,
}

impl ClimbingParams {
    pub fn max_height_for(&self, skill: ClimbSkill) -> Option<u32> {
        self.max_height_by_skill.get(&skill).copied()
    }
}

impl Default for ClimbingParams {
    fn default() -> Self {
        let mut max_height_by_skill = BTreeMap::new();
        max_height_by_skill.insert(ClimbSkill::Basic, 4);
        max_height_by_skill.insert(ClimbSkill::Advanced, 8);
        max_height_by_skill.insert(ClimbSkill::Expert, 16);
        Self {
            max_height_by_skill,
            ladder: LadderParams::default(),
        }
    }
}

/// Sightline tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionParams {
    /// Height of the eye above the caster's surface.
    pub eye_height: f32,
    /// Height above a target surface that the sightline aims at.
    pub target_height: f32,
    /// If true, cells inside the vision radius that fail the occlusion test
    /// are still recorded as explored (FogOfWar) by the caster.
    pub reveal_occluded_in_range: bool,
    /// Minimum number of dirty casters before casting fans out across the
    /// rayon pool.
    pub parallel_cast_threshold: usize,
}

impl Default for VisionParams {
    fn default() -> Self {
        Self {
            eye_height: 1.5,
            target_height: 0.5,
            reveal_occluded_in_range: false,
            parallel_cast_threshold: 4,
        }
    }
}

/// Move-execution tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementParams {
    /// Simulated seconds per tick. A mover with speed `s` pays `s * tick_seconds`
    /// units of path cost per tick.
    pub tick_seconds: f32,
}

impl Default for MovementParams {
    fn default() -> Self {
        Self { tick_seconds: 0.1 }
    }
}

/// A surface definition: how fast things move across it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SurfaceDef {
    /// Multiplier applied to the mover's own aptitude. Must be positive.
    pub speed_multiplier: f32,
}

/// A data-driven mover preset, the config-side form of `MoverProfile`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MoverDef {
    pub speed: f32,
    pub vision_range: f32,
    pub climb_skill: ClimbSkill,
    pub can_swim: bool,
    pub max_hop_up: u32,
    pub max_hop_down: u32,
    #[serde(default = "default_aptitude")]
    pub hop_aptitude: f32,
    /// Aptitude per surface name. Missing surfaces default to 1.0.
    #[serde(default)]
    pub surface_aptitude: BTreeMap<String, f32>,
}

fn default_aptitude() -> f32 {
    1.0
}

/// Top-level configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Grid extent in columns `(width, depth)`.
    pub grid_size: (u32, u32),
    pub graph: GraphParams,
    pub climbing: ClimbingParams,
    pub vision: VisionParams,
    pub movement: MovementParams,
    /// Surface table, keyed by identifier.
    pub surfaces: BTreeMap<String, SurfaceDef>,
    /// Surface used when terrain is created without naming one.
    pub default_surface: String,
    /// Mover presets, keyed by name.
    pub movers: BTreeMap<String, MoverDef>,
}

impl Default for GameConfig {
    fn default() -> Self {
        let mut surfaces = BTreeMap::new();
        surfaces.insert("dirt".to_string(), SurfaceDef { speed_multiplier: 1.0 });
        surfaces.insert("road".to_string(), SurfaceDef { speed_multiplier: 1.25 });
        surfaces.insert("mud".to_string(), SurfaceDef { speed_multiplier: 0.5 });
        surfaces.insert("water".to_string(), SurfaceDef { speed_multiplier: 0.4 });
        surfaces.insert("metal".to_string(), SurfaceDef { speed_multiplier: 1.0 });

        let mut movers = BTreeMap::new();
        movers.insert(
            "infantry".to_string(),
            MoverDef {
                speed: 4.0,
                vision_range: 8.0,
                climb_skill: ClimbSkill::Basic,
                can_swim: false,
                max_hop_up: 1,
                max_hop_down: 2,
                hop_aptitude: 1.0,
                surface_aptitude: BTreeMap::new(),
            },
        );
        movers.insert(
            "scout".to_string(),
            MoverDef {
                speed: 5.0,
                vision_range: 11.0,
                climb_skill: ClimbSkill::Advanced,
                can_swim: true,
                max_hop_up: 2,
                max_hop_down: 3,
                hop_aptitude: 1.5,
                surface_aptitude: BTreeMap::from([("mud".to_string(), 1.4)]),
            },
        );
        movers.insert(
            "heavy".to_string(),
            MoverDef {
                speed: 2.5,
                vision_range: 6.0,
                climb_skill: ClimbSkill::None,
                can_swim: false,
                max_hop_up: 1,
                max_hop_down: 1,
                hop_aptitude: 0.5,
                surface_aptitude: BTreeMap::from([("road".to_string(), 1.2)]),
            },
        );

        Self {
            grid_size: (64, 64),
            graph: GraphParams::default(),
            climbing: ClimbingParams::default(),
            vision: VisionParams::default(),
            movement: MovementParams::default(),
            surfaces,
            default_surface: "dirt".to_string(),
            movers,
        }
    }
}

impl GameConfig {
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Range-check every parameter the sim divides by or indexes with.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(GridError::Config(msg));
        if self.grid_size.0 == 0 || self.grid_size.1 == 0 {
            return bad(format!("grid_size must be non-zero, got {:?}", self.grid_size));
        }
        if self.graph.base_distance <= 0.0 {
            return bad("graph.base_distance must be positive".into());
        }
        if self.graph.hop_up_cost_per_level < 0.0 || self.graph.hop_down_cost_per_level < 0.0 {
            return bad("hop costs must be non-negative".into());
        }
        if self.graph.standing_clearance < 1 {
            return bad("graph.standing_clearance must be at least 1".into());
        }
        if self.movement.tick_seconds <= 0.0 {
            return bad("movement.tick_seconds must be positive".into());
        }
        let ladder = &self.climbing.ladder;
        if ladder.cost_up < 0.0 || ladder.cost_down < 0.0 {
            return bad("ladder costs must be non-negative".into());
        }
        if ladder.speed_up <= 0.0 || ladder.speed_down <= 0.0 {
            return bad("ladder speeds must be positive".into());
        }
        for (name, def) in &self.surfaces {
            if def.speed_multiplier <= 0.0 {
                return bad(format!("surface '{name}' has non-positive speed_multiplier"));
            }
        }
        if !self.surfaces.contains_key(&self.default_surface) {
            return Err(GridError::UnknownSurface(self.default_surface.clone()));
        }
        for (name, mover) in &self.movers {
            if mover.speed <= 0.0 || mover.hop_aptitude <= 0.0 {
                return bad(format!("mover '{name}' needs positive speed and hop_aptitude"));
            }
            for (surface, aptitude) in &mover.surface_aptitude {
                if !self.surfaces.contains_key(surface) {
                    return Err(GridError::UnknownSurface(surface.clone()));
                }
                if *aptitude <= 0.0 {
                    return bad(format!("mover '{name}' has non-positive aptitude on '{surface}'"));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Surface registry
// ---------------------------------------------------------------------------

/// The frozen surface table. Ids are assigned in name order, so two sims built
/// from the same config agree on every `SurfaceId`.
#[derive(Clone, Debug, Default)]
pub struct SurfaceRegistry {
    defs: Vec<(String, SurfaceDef)>,
    by_name: BTreeMap<String, SurfaceId>,
}

impl SurfaceRegistry {
    pub fn from_config(config: &GameConfig) -> Self {
        let mut registry = Self::default();
        for (name, def) in &config.surfaces {
            let id = SurfaceId(registry.defs.len() as u32);
            registry.defs.push((name.clone(), def.clone()));
            registry.by_name.insert(name.clone(), id);
        }
        registry
    }

    pub fn resolve(&self, name: &str) -> Result<SurfaceId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| GridError::UnknownSurface(name.to_string()))
    }

    /// Look up a surface definition. Ids only come from `resolve`, so an
    /// unknown id falls back to a neutral multiplier rather than panicking.
    pub fn speed_multiplier(&self, id: SurfaceId) -> f32 {
        self.defs
            .get(id.index())
            .map(|(_, def)| def.speed_multiplier)
            .unwrap_or(1.0)
    }

    pub fn name(&self, id: SurfaceId) -> Option<&str> {
        self.defs.get(id.index()).map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        GameConfig::default().validate().unwrap();
    }

    #[test]
    fn default_config_serializes() {
        let config = GameConfig::default();
        let json = config.to_json().unwrap();
        let restored = GameConfig::from_json(&json).unwrap();
        assert_eq!(config.grid_size, restored.grid_size);
        assert_eq!(config.graph.max_hop_down, restored.graph.max_hop_down);
        assert_eq!(config.surfaces, restored.surfaces);
        assert_eq!(
            restored.climbing.max_height_for(ClimbSkill::Advanced),
            Some(8)
        );
        assert_eq!(restored.movers["scout"].climb_skill, ClimbSkill::Advanced);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let json = r#"{
            "grid_size": [16, 8],
            "graph": { "max_hop_up": 4 },
            "vision": { "reveal_occluded_in_range": true }
        }"#;
        let config = GameConfig::from_json(json).unwrap();
        assert_eq!(config.grid_size, (16, 8));
        assert_eq!(config.graph.max_hop_up, 4);
        assert_eq!(config.graph.base_distance, 1.0);
        assert!(config.vision.reveal_occluded_in_range);
        assert_eq!(config.vision.eye_height, 1.5);
        assert!(config.surfaces.contains_key("dirt"));
    }

    #[test]
    fn validate_rejects_unknown_default_surface() {
        let config = GameConfig {
            default_surface: "lava".into(),
            ..GameConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(GridError::UnknownSurface("lava".into()))
        );
    }

    #[test]
    fn validate_rejects_zero_speed_surface() {
        let mut config = GameConfig::default();
        config
            .surfaces
            .insert("ice".into(), SurfaceDef { speed_multiplier: 0.0 });
        assert!(matches!(config.validate(), Err(GridError::Config(_))));
    }

    #[test]
    fn registry_ids_follow_name_order() {
        let config = GameConfig::default();
        let registry = SurfaceRegistry::from_config(&config);
        assert_eq!(registry.len(), config.surfaces.len());
        // BTreeMap order: dirt, metal, mud, road, water.
        assert_eq!(registry.resolve("dirt").unwrap(), SurfaceId(0));
        assert_eq!(registry.resolve("water").unwrap(), SurfaceId(4));
        assert_eq!(registry.name(SurfaceId(3)), Some("road"));
        assert_eq!(registry.speed_multiplier(SurfaceId(2)), 0.5);
        assert!(registry.resolve("lava").is_err());
    }
}
