// Mover capability profile.
//
// A `MoverProfile` is the read-only view of an entity's movement and sensing
// abilities that the core consumes: speed, vision range, climbing skill,
// swimming, hop limits, and per-surface aptitude. The cost engine and the
// vision engine read it; nothing in the core mutates it.
//
// Profiles come from the entity layer. Inside the sim they are usually
// resolved from a named `MoverDef` preset in the config (surface names are
// turned into `SurfaceId`s through the `SurfaceRegistry`), the same way a
// species table drives creature behavior.
//
// See also: `config.rs` for `MoverDef`, `cost.rs` for how the profile gates
// and prices transitions.

use crate::config::{MoverDef, SurfaceRegistry};
use crate::error::Result;
use crate::types::{ClimbSkill, SurfaceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoverProfile {
    /// Path-cost units covered per simulated second.
    pub speed: f32,
    /// Radius of the vision disc, in columns.
    pub vision_range: f32,
    pub climb_skill: ClimbSkill,
    pub can_swim: bool,
    pub max_hop_up: u32,
    pub max_hop_down: u32,
    /// Divides the per-level hop cost. Higher is better.
    pub hop_aptitude: f32,
    /// Per-surface aptitude. Missing surfaces count as 1.0.
    pub surface_aptitude: BTreeMap<SurfaceId, f32>,
}

impl Default for MoverProfile {
    fn default() -> Self {
        Self {
            speed: 1.0,
            vision_range: 0.0,
            climb_skill: ClimbSkill::None,
            can_swim: false,
            max_hop_up: 0,
            max_hop_down: 0,
            hop_aptitude: 1.0,
            surface_aptitude: BTreeMap::new(),
        }
    }
}

impl MoverProfile {
    /// Resolve a config preset against the surface registry.
    pub fn from_def(def: &MoverDef, surfaces: &SurfaceRegistry) -> Result<Self> {
        let mut surface_aptitude = BTreeMap::new();
        for (name, &aptitude) in &def.surface_aptitude {
            surface_aptitude.insert(surfaces.resolve(name)?, aptitude);
        }
        Ok(Self {
            speed: def.speed,
            vision_range: def.vision_range,
            climb_skill: def.climb_skill,
            can_swim: def.can_swim,
            max_hop_up: def.max_hop_up,
            max_hop_down: def.max_hop_down,
            hop_aptitude: def.hop_aptitude,
            surface_aptitude,
        })
    }

    pub fn aptitude_on(&self, surface: SurfaceId) -> f32 {
        self.surface_aptitude.get(&surface).copied().unwrap_or(1.0)
    }

    pub fn with_skill(mut self, skill: ClimbSkill) -> Self {
        self.climb_skill = skill;
        self
    }

    pub fn with_hops(mut self, up: u32, down: u32) -> Self {
        self.max_hop_up = up;
        self.max_hop_down = down;
        self
    }

    pub fn with_swim(mut self, can_swim: bool) -> Self {
        self.can_swim = can_swim;
        self
    }

    pub fn with_vision(mut self, range: f32) -> Self {
        self.vision_range = range;
        self
    }

    pub fn with_aptitude(mut self, surface: SurfaceId, aptitude: f32) -> Self {
        self.surface_aptitude.insert(surface, aptitude);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;

    #[test]
    fn preset_resolves_surface_names() {
        let config = GameConfig::default();
        let registry = SurfaceRegistry::from_config(&config);
        let scout = MoverProfile::from_def(&config.movers["scout"], &registry).unwrap();
        let mud = registry.resolve("mud").unwrap();
        let dirt = registry.resolve("dirt").unwrap();
        assert_eq!(scout.aptitude_on(mud), 1.4);
        assert_eq!(scout.aptitude_on(dirt), 1.0);
        assert!(scout.can_swim);
    }

    #[test]
    fn preset_with_unknown_surface_fails() {
        let config = GameConfig::default();
        let registry = SurfaceRegistry::from_config(&config);
        let mut def = config.movers["heavy"].clone();
        def.surface_aptitude.insert("lava".into(), 2.0);
        assert!(MoverProfile::from_def(&def, &registry).is_err());
    }

    #[test]
    fn builders_set_fields() {
        let p = MoverProfile::default()
            .with_skill(ClimbSkill::Advanced)
            .with_hops(2, 3)
            .with_swim(true)
            .with_vision(5.0);
        assert_eq!(p.climb_skill, ClimbSkill::Advanced);
        assert_eq!((p.max_hop_up, p.max_hop_down), (2, 3));
        assert!(p.can_swim);
        assert_eq!(p.vision_range, 5.0);
    }
}
