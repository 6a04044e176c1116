// Movement cost engine: evaluates a transition for a specific mover.
//
// Every transition carries two things from the builder: a predicate
// (`TransitionRequirement`) and a `CostModel`. This module checks the
// predicate against a `MoverProfile` and, if it passes, prices the move:
//
// - Distance: `base / (surface multiplier * mover aptitude on the surface)`.
// - Hop: the distance term plus `levels * per_level_cost / hop_aptitude`,
//   with separate per-level costs up and down.
// - Climbable: the climbable's fixed `cost_up` / `cost_down`.
//
// A failing predicate is a normal outcome, returned as
// `MoveCost::Inadmissible` with the reason, never an error.
//
// `CostContext` bundles the read-only state needed to answer a cost query
// (grid, graph, climbables, surface registry, graph params). It is built by
// `SimState::cost_context()` and borrowed for the duration of a query.
//
// See also: `transition.rs` for predicates and cost models,
// `reachability.rs` which sums these costs, `climbable.rs` for the climb
// contract.

use crate::climbable::ClimbableSet;
use crate::config::{GraphParams, SurfaceRegistry};
use crate::grid::TerrainGrid;
use crate::mover::MoverProfile;
use crate::transition::{CostModel, Transition, TransitionGraph};
use crate::types::{ClimbSkill, ClimbableId, NodeId};
use thiserror::Error;

/// Read-only state a cost query needs.
#[derive(Clone, Copy, Debug)]
pub struct CostContext<'a> {
    pub grid: &'a TerrainGrid,
    pub graph: &'a TransitionGraph,
    pub climbables: &'a ClimbableSet,
    pub surfaces: &'a SurfaceRegistry,
    pub params: &'a GraphParams,
}

/// Why a mover cannot take a transition.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum Inadmissible {
    #[error("no transition between the nodes")]
    NoTransition,
    #[error("requires swimming")]
    CannotSwim,
    #[error("hop up of {required} exceeds mover limit {max}")]
    HopTooHigh { required: u32, max: u32 },
    #[error("drop of {required} exceeds mover limit {max}")]
    DropTooFar { required: u32, max: u32 },
    #[error("requires climb skill {required:?}, mover has {has:?}")]
    Skill { required: ClimbSkill, has: ClimbSkill },
    #[error("climb of {height} exceeds limit {max:?} for this skill")]
    ClimbTooHigh { height: u32, max: Option<u32> },
    #[error("{0} no longer exists")]
    MissingClimbable(ClimbableId),
    #[error("mover cannot move on this surface")]
    ZeroAptitude,
}

/// The outcome of pricing one move.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MoveCost {
    Admissible(f32),
    Inadmissible(Inadmissible),
}

impl MoveCost {
    pub fn admissible(self) -> Option<f32> {
        match self {
            MoveCost::Admissible(cost) => Some(cost),
            MoveCost::Inadmissible(_) => None,
        }
    }

    pub fn is_admissible(self) -> bool {
        matches!(self, MoveCost::Admissible(_))
    }
}

/// Check a transition's predicate against the mover.
pub fn check_requirement(
    ctx: &CostContext<'_>,
    mover: &MoverProfile,
    transition: &Transition,
) -> Result<(), Inadmissible> {
    let req = &transition.requirement;
    if req.requires_swim && !mover.can_swim {
        return Err(Inadmissible::CannotSwim);
    }
    if req.hop_up > mover.max_hop_up {
        return Err(Inadmissible::HopTooHigh {
            required: req.hop_up,
            max: mover.max_hop_up,
        });
    }
    if req.hop_down > mover.max_hop_down {
        return Err(Inadmissible::DropTooFar {
            required: req.hop_down,
            max: mover.max_hop_down,
        });
    }
    if mover.climb_skill < req.min_climb_skill {
        return Err(Inadmissible::Skill {
            required: req.min_climb_skill,
            has: mover.climb_skill,
        });
    }
    if let Some(climb) = req.climb {
        let placed = ctx
            .climbables
            .get(climb.climbable)
            .ok_or(Inadmissible::MissingClimbable(climb.climbable))?;
        if !placed.object.admits(mover.climb_skill, climb.height) {
            return Err(Inadmissible::ClimbTooHigh {
                height: climb.height,
                max: placed.object.max_climb_height(mover.climb_skill),
            });
        }
    }
    Ok(())
}

/// Price a transition for a mover.
pub fn movement_cost(ctx: &CostContext<'_>, mover: &MoverProfile, transition: &Transition) -> MoveCost {
    if let Err(reason) = check_requirement(ctx, mover, transition) {
        return MoveCost::Inadmissible(reason);
    }

    let surface = ctx.grid.node(transition.to).surface;
    let aptitude = ctx.surfaces.speed_multiplier(surface) * mover.aptitude_on(surface);

    match transition.cost {
        CostModel::Distance { base } => {
            if aptitude <= 0.0 {
                return MoveCost::Inadmissible(Inadmissible::ZeroAptitude);
            }
            MoveCost::Admissible(base / aptitude)
        }
        CostModel::Hop {
            base,
            levels,
            ascending,
        } => {
            if aptitude <= 0.0 || mover.hop_aptitude <= 0.0 {
                return MoveCost::Inadmissible(Inadmissible::ZeroAptitude);
            }
            let per_level = if ascending {
                ctx.params.hop_up_cost_per_level
            } else {
                ctx.params.hop_down_cost_per_level
            };
            MoveCost::Admissible(base / aptitude + levels as f32 * per_level / mover.hop_aptitude)
        }
        CostModel::Climbable { id, ascending } => match ctx.climbables.get(id) {
            Some(placed) => MoveCost::Admissible(placed.object.cost(ascending)),
            None => MoveCost::Inadmissible(Inadmissible::MissingClimbable(id)),
        },
    }
}

/// Cheapest admissible move between two adjacent nodes. If none is
/// admissible, returns the reason the first candidate failed.
pub fn movement_cost_between(
    ctx: &CostContext<'_>,
    mover: &MoverProfile,
    from: NodeId,
    to: NodeId,
) -> MoveCost {
    let mut best: Option<f32> = None;
    let mut first_reason = None;
    for (_, t) in ctx.graph.between(from, to) {
        match movement_cost(ctx, mover, t) {
            MoveCost::Admissible(cost) => {
                if best.is_none_or(|b| cost < b) {
                    best = Some(cost);
                }
            }
            MoveCost::Inadmissible(reason) => {
                first_reason.get_or_insert(reason);
            }
        }
    }
    match best {
        Some(cost) => MoveCost::Admissible(cost),
        None => MoveCost::Inadmissible(first_reason.unwrap_or(Inadmissible::NoTransition)),
    }
}

/// Speed multiplier while executing a transition: the climbable's up/down
/// speed for climbs, 1.0 otherwise.
pub fn transition_speed(ctx: &CostContext<'_>, transition: &Transition) -> f32 {
    match transition.cost {
        CostModel::Climbable { id, ascending } => ctx
            .climbables
            .get(id)
            .map(|p| p.object.speed(ascending))
            .unwrap_or(1.0),
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::climbable::Ladder;
    use crate::config::{ClimbingParams, GameConfig};
    use crate::transition::build_graph;
    use crate::types::{Direction, GridCoord, NodeKind};

    struct Fixture {
        grid: TerrainGrid,
        graph: TransitionGraph,
        climbables: ClimbableSet,
        surfaces: SurfaceRegistry,
        params: GraphParams,
    }

    impl Fixture {
        /// One row of columns with the given surface heights and surface names.
        fn row(cols: &[(i32, &str)]) -> Self {
            let surfaces = SurfaceRegistry::from_config(&GameConfig::default());
            let mut grid = TerrainGrid::new(cols.len() as u32, 1);
            for (x, (h, s)) in cols.iter().enumerate() {
                let kind = if *s == "water" { NodeKind::Water } else { NodeKind::Ground };
                grid.add_node(GridCoord::new(x as i32, 0), 0, *h, kind, surfaces.resolve(s).unwrap())
                    .unwrap();
            }
            let climbables = ClimbableSet::new();
            let params = GraphParams::default();
            let graph = build_graph(&grid, &climbables, &params);
            Self {
                grid,
                graph,
                climbables,
                surfaces,
                params,
            }
        }

        fn ladder(&mut self, bottom: i32, top: i32) {
            let b = self.at(bottom);
            let t = self.at(top);
            let side = Direction::between(
                self.grid.node(b).coord,
                self.grid.node(t).coord,
            )
            .unwrap();
            self.climbables
                .place(&self.grid, b, t, Box::new(Ladder::from_params(side, &ClimbingParams::default())))
                .unwrap();
            self.graph = build_graph(&self.grid, &self.climbables, &self.params);
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

        fn cost(&self, mover: &MoverProfile, from: i32, to: i32) -> MoveCost {
            movement_cost_between(&self.ctx(), mover, self.at(from), self.at(to))
        }
    }

    #[test]
    fn flat_walk_divides_by_aptitude() {
        let f = Fixture::row(&[(1, "dirt"), (1, "road"), (1, "mud")]);
        let m = MoverProfile::default();
        assert_eq!(f.cost(&m, 1, 0), MoveCost::Admissible(1.0));
        assert_eq!(f.cost(&m, 0, 1), MoveCost::Admissible(0.8));
        assert_eq!(f.cost(&m, 1, 2), MoveCost::Admissible(2.0));

        let mud = f.surfaces.resolve("mud").unwrap();
        let bog_walker = MoverProfile::default().with_aptitude(mud, 2.0);
        assert_eq!(f.cost(&bog_walker, 1, 2), MoveCost::Admissible(1.0));
    }

    #[test]
    fn hop_adds_per_level_cost() {
        let f = Fixture::row(&[(1, "dirt"), (2, "dirt"), (4, "dirt")]);
        let m = MoverProfile::default().with_hops(2, 3).with_skill(ClimbSkill::Basic);
        assert_eq!(f.cost(&m, 0, 1), MoveCost::Admissible(1.5));
        assert_eq!(f.cost(&m, 1, 0), MoveCost::Admissible(1.25));
        assert_eq!(f.cost(&m, 1, 2), MoveCost::Admissible(2.0));

        let mut nimble = m.clone();
        nimble.hop_aptitude = 2.0;
        assert_eq!(f.cost(&nimble, 0, 1), MoveCost::Admissible(1.25));
    }

    #[test]
    fn hop_limits_and_skill_gate() {
        let f = Fixture::row(&[(1, "dirt"), (3, "dirt")]);
        let clumsy = MoverProfile::default().with_hops(1, 1);
        assert_eq!(
            f.cost(&clumsy, 0, 1),
            MoveCost::Inadmissible(Inadmissible::HopTooHigh { required: 2, max: 1 })
        );
        assert_eq!(
            f.cost(&clumsy, 1, 0),
            MoveCost::Inadmissible(Inadmissible::DropTooFar { required: 2, max: 1 })
        );
        let unskilled = MoverProfile::default().with_hops(2, 2);
        assert_eq!(
            f.cost(&unskilled, 0, 1),
            MoveCost::Inadmissible(Inadmissible::Skill {
                required: ClimbSkill::Basic,
                has: ClimbSkill::None,
            })
        );
        assert!(f.cost(&unskilled.with_skill(ClimbSkill::Basic), 0, 1).is_admissible());
    }

    #[test]
    fn water_needs_swimmer() {
        let f = Fixture::row(&[(1, "dirt"), (1, "water")]);
        let walker = MoverProfile::default();
        assert_eq!(
            f.cost(&walker, 0, 1),
            MoveCost::Inadmissible(Inadmissible::CannotSwim)
        );
        let swimmer = MoverProfile::default().with_swim(true);
        assert_eq!(f.cost(&swimmer, 0, 1), MoveCost::Admissible(2.5));
    }

    #[test]
    fn ladder_costs_are_fixed_and_asymmetric() {
        let mut f = Fixture::row(&[(1, "mud"), (5, "mud")]);
        f.ladder(0, 1);
        let climber = MoverProfile::default().with_skill(ClimbSkill::Basic);
        assert_eq!(f.cost(&climber, 0, 1), MoveCost::Admissible(1.6));
        assert_eq!(f.cost(&climber, 1, 0), MoveCost::Admissible(1.3));

        let (_, up) = f.graph.between(f.at(0), f.at(1)).next().unwrap();
        assert_eq!(transition_speed(&f.ctx(), up), 0.5);

        let none = MoverProfile::default();
        assert!(matches!(
            f.cost(&none, 0, 1),
            MoveCost::Inadmissible(Inadmissible::Skill { .. })
        ));
    }

    #[test]
    fn ladder_height_limit_depends_on_skill() {
        // Height 6: too tall for Basic (4), fine for Advanced (8).
        let mut f = Fixture::row(&[(1, "dirt"), (7, "dirt")]);
        f.ladder(0, 1);
        let basic = MoverProfile::default().with_skill(ClimbSkill::Basic);
        assert_eq!(
            f.cost(&basic, 0, 1),
            MoveCost::Inadmissible(Inadmissible::ClimbTooHigh {
                height: 6,
                max: Some(4),
            })
        );
        let advanced = MoverProfile::default().with_skill(ClimbSkill::Advanced);
        assert!(f.cost(&advanced, 0, 1).is_admissible());
    }

    #[test]
    fn removed_climbable_is_inadmissible() {
        let mut f = Fixture::row(&[(1, "dirt"), (5, "dirt")]);
        f.ladder(0, 1);
        f.climbables.remove(ClimbableId(0)).unwrap();
        let climber = MoverProfile::default().with_skill(ClimbSkill::Expert);
        assert_eq!(
            f.cost(&climber, 0, 1),
            MoveCost::Inadmissible(Inadmissible::MissingClimbable(ClimbableId(0)))
        );
    }

    #[test]
    fn zero_aptitude_blocks() {
        let f = Fixture::row(&[(1, "dirt"), (1, "mud")]);
        let mud = f.surfaces.resolve("mud").unwrap();
        let m = MoverProfile::default().with_aptitude(mud, 0.0);
        assert_eq!(f.cost(&m, 0, 1), MoveCost::Inadmissible(Inadmissible::ZeroAptitude));
    }

    #[test]
    fn non_adjacent_has_no_transition() {
        let f = Fixture::row(&[(1, "dirt"), (1, "dirt"), (1, "dirt")]);
        assert_eq!(
            f.cost(&MoverProfile::default(), 0, 2),
            MoveCost::Inadmissible(Inadmissible::NoTransition)
        );
    }
}
