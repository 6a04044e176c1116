// Climbables: placed objects that provide a vertical transition which
// bypasses the normal hop limits.
//
// The `Climbable` trait is the whole contract the transition builder and the
// cost engine see: skill requirement, maximum climbable height for a skill,
// asymmetric cost and speed up and down, and the side of the bottom node the
// object occupies. Neither consumer knows about concrete types, so a new
// climbable kind (vines, rope, elevator) is a new `impl Climbable` and
// nothing else. `Ladder` is the one shipped variant.
//
// A placed climbable connects a `bottom` node to a `top` node in the adjacent
// column on `side`. The builder turns each placement into two transitions:
// up (registered on the bottom node) and down (registered on the top node).
//
// See also: `transition.rs` for how placements become transitions, `cost.rs`
// for how the contract gates and prices them.

use crate::config::{ClimbingParams, LadderParams};
use crate::error::{GridError, Result};
use crate::grid::TerrainGrid;
use crate::types::{ClimbSkill, ClimbableId, Direction, NodeId};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Capability contract for anything that can be climbed.
pub trait Climbable: Debug + Send + Sync {
    /// Minimum skill needed to use it at all.
    fn required_skill(&self) -> ClimbSkill;

    /// Tallest climb this object allows for `skill`, or `None` if the skill
    /// is insufficient.
    fn max_climb_height(&self, skill: ClimbSkill) -> Option<u32>;

    /// Fixed cost of one ascent.
    fn cost_up(&self) -> f32;

    /// Fixed cost of one descent.
    fn cost_down(&self) -> f32;

    /// Speed multiplier while ascending.
    fn speed_up(&self) -> f32;

    /// Speed multiplier while descending.
    fn speed_down(&self) -> f32;

    /// Side of the bottom node the object is attached to.
    fn side(&self) -> Direction;

    fn cost(&self, ascending: bool) -> f32 {
        if ascending { self.cost_up() } else { self.cost_down() }
    }

    fn speed(&self, ascending: bool) -> f32 {
        if ascending { self.speed_up() } else { self.speed_down() }
    }

    /// Whether `skill` can make a climb of `height` levels on this object.
    fn admits(&self, skill: ClimbSkill, height: u32) -> bool {
        skill >= self.required_skill()
            && self.max_climb_height(skill).is_some_and(|max| height <= max)
    }

    /// Whether any skill at all can make a climb of `height`. Per-skill
    /// limits need not grow with skill, so every level is asked.
    fn admits_any(&self, height: u32) -> bool {
        ClimbSkill::ALL.iter().any(|&skill| self.admits(skill, height))
    }
}

/// A ladder.
#[derive(Clone, Debug, PartialEq)]
pub struct Ladder {
    pub side: Direction,
    pub min_skill: ClimbSkill,
    pub cost_up: f32,
    pub cost_down: f32,
    pub speed_up: f32,
    pub speed_down: f32,
    /// Replaces the per-skill limit when set.
    pub max_height_override: Option<u32>,
    /// Per-skill limits, copied from `ClimbingParams` at placement.
    pub max_height_by_skill: BTreeMap<ClimbSkill, u32>,
}

impl Ladder {
    /// Build a ladder from the config defaults.
    pub fn from_params(side: Direction, climbing: &ClimbingParams) -> Self {
        Self::with_params(side, &climbing.ladder, climbing)
    }

    /// Build a ladder with explicit ladder parameters.
    pub fn with_params(side: Direction, ladder: &LadderParams, climbing: &ClimbingParams) -> Self {
        Self {
            side,
            min_skill: ladder.min_skill,
            cost_up: ladder.cost_up,
            cost_down: ladder.cost_down,
            speed_up: ladder.speed_up,
            speed_down: ladder.speed_down,
            max_height_override: ladder.max_height_override,
            max_height_by_skill: climbing.max_height_by_skill.clone(),
        }
    }
}

impl Climbable for Ladder {
    fn required_skill(&self) -> ClimbSkill {
        self.min_skill
    }

    fn max_climb_height(&self, skill: ClimbSkill) -> Option<u32> {
        if skill < self.min_skill {
            return None;
        }
        self.max_height_override
            .or_else(|| self.max_height_by_skill.get(&skill).copied())
    }

    fn cost_up(&self) -> f32 {
        self.cost_up
    }

    fn cost_down(&self) -> f32 {
        self.cost_down
    }

    fn speed_up(&self) -> f32 {
        self.speed_up
    }

    fn speed_down(&self) -> f32 {
        self.speed_down
    }

    fn side(&self) -> Direction {
        self.side
    }
}

/// A climbable placed between two nodes.
#[derive(Debug)]
pub struct PlacedClimbable {
    pub id: ClimbableId,
    pub bottom: NodeId,
    pub top: NodeId,
    pub object: Box<dyn Climbable>,
}

impl PlacedClimbable {
    /// Whether this placement links `a` and `b` (either order).
    pub fn links(&self, a: NodeId, b: NodeId) -> bool {
        (self.bottom == a && self.top == b) || (self.bottom == b && self.top == a)
    }
}

/// Registry of placed climbables. Removal leaves a tombstone so ids stay
/// stable.
#[derive(Debug, Default)]
pub struct ClimbableSet {
    placed: Vec<Option<PlacedClimbable>>,
}

impl ClimbableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a climbable from `bottom` to `top`. The top node must sit in the
    /// column on the object's side of the bottom node and be strictly higher.
    pub fn place(
        &mut self,
        grid: &TerrainGrid,
        bottom: NodeId,
        top: NodeId,
        object: Box<dyn Climbable>,
    ) -> Result<ClimbableId> {
        let b = grid.try_node(bottom)?;
        let t = grid.try_node(top)?;
        if b.coord.offset(object.side()) != t.coord || t.top() <= b.top() {
            return Err(GridError::InvalidClimbable { bottom, top });
        }
        let id = ClimbableId(self.placed.len() as u32);
        self.placed.push(Some(PlacedClimbable {
            id,
            bottom,
            top,
            object,
        }));
        Ok(id)
    }

    pub fn remove(&mut self, id: ClimbableId) -> Result<PlacedClimbable> {
        self.placed
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or(GridError::ClimbableNotFound(id))
    }

    pub fn get(&self, id: ClimbableId) -> Option<&PlacedClimbable> {
        self.placed.get(id.index()).and_then(Option::as_ref)
    }

    /// Live placements in id order.
    pub fn iter(&self) -> impl Iterator<Item = &PlacedClimbable> {
        self.placed.iter().flatten()
    }

    /// Placements linking `a` and `b`, in id order.
    pub fn between(&self, a: NodeId, b: NodeId) -> impl Iterator<Item = &PlacedClimbable> {
        self.iter().filter(move |p| p.links(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GridCoord, NodeKind, SurfaceId};

    fn ladder() -> Ladder {
        Ladder::from_params(Direction::East, &ClimbingParams::default())
    }

    #[test]
    fn ladder_height_depends_on_skill() {
        let l = ladder();
        assert_eq!(l.max_climb_height(ClimbSkill::None), None);
        assert_eq!(l.max_climb_height(ClimbSkill::Basic), Some(4));
        assert_eq!(l.max_climb_height(ClimbSkill::Expert), Some(16));
        assert!(l.admits(ClimbSkill::Basic, 4));
        assert!(!l.admits(ClimbSkill::Basic, 5));
        assert!(!l.admits(ClimbSkill::None, 1));
    }

    #[test]
    fn override_replaces_per_skill_limit() {
        let mut l = ladder();
        l.max_height_override = Some(2);
        assert_eq!(l.max_climb_height(ClimbSkill::Expert), Some(2));
        assert_eq!(l.max_climb_height(ClimbSkill::None), None);
    }

    #[test]
    fn costs_are_asymmetric() {
        let l = ladder();
        assert_eq!(l.cost(true), 1.6);
        assert_eq!(l.cost(false), 1.3);
        assert_eq!(l.speed(true), 0.5);
        assert_eq!(l.speed(false), 0.7);
    }

    #[test]
    fn place_validates_geometry() {
        let mut grid = TerrainGrid::new(4, 1);
        let low = grid
            .add_node(GridCoord::new(0, 0), 0, 1, NodeKind::Ground, SurfaceId(0))
            .unwrap();
        let high = grid
            .add_node(GridCoord::new(1, 0), 0, 5, NodeKind::Ground, SurfaceId(0))
            .unwrap();
        let far = grid
            .add_node(GridCoord::new(3, 0), 0, 5, NodeKind::Ground, SurfaceId(0))
            .unwrap();

        let mut set = ClimbableSet::new();
        let id = set.place(&grid, low, high, Box::new(ladder())).unwrap();
        assert_eq!(set.between(high, low).count(), 1);

        // Not adjacent.
        assert!(set.place(&grid, low, far, Box::new(ladder())).is_err());
        // Upside down.
        let mut west = ladder();
        west.side = Direction::West;
        assert!(set.place(&grid, high, low, Box::new(west)).is_err());
        // Missing node.
        assert!(matches!(
            set.place(&grid, low, NodeId(42), Box::new(ladder())),
            Err(GridError::NodeNotFound(_))
        ));

        let removed = set.remove(id).unwrap();
        assert_eq!(removed.bottom, low);
        assert!(set.get(id).is_none());
        assert!(set.remove(id).is_err());
    }
}
