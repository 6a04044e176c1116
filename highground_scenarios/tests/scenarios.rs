// End-to-end scenarios over ASCII maps.
//
// Each test builds a full `SimState` through `Scenario`, drives it with the
// public edit/command API and `step()`, and checks the observable result:
// reachability and costs for movement, `visible_*` / `explored_*` for
// vision. No sim internals are touched.

use std::collections::BTreeSet;

use highground_scenarios::Scenario;
use highground_sim::command::{SimAction, SimCommand};
use highground_sim::config::GameConfig;
use highground_sim::cost::MoveCost;
use highground_sim::sim::SimState;
use highground_sim::transition::TransitionKind;
use highground_sim::types::{ActorId, ClimbSkill, Direction, EntityId, GridCoord};

const RED: ActorId = ActorId(0);

fn spawn(tick: u64, x: i32, y: i32, mover: &str) -> SimCommand {
    SimCommand::new(
        tick,
        SimAction::SpawnEntity {
            actor: RED,
            coord: GridCoord::new(x, y),
            height: 1,
            mover: mover.into(),
        },
    )
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-5
}

fn explored(sim: &SimState) -> BTreeSet<u32> {
    sim.explored_nodes(RED).into_iter().map(|n| n.0).collect()
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

#[test]
fn flat_map_is_a_uniform_four_neighbour_grid() {
    let s = Scenario::new(
        "
        1111
        1111
        1111
        ",
    );
    let infantry = s.mover("infantry");
    let graph = s.sim.graph();
    // 4x3: (3 * 3 horizontal + 4 * 2 vertical) edges, both directions.
    assert_eq!(graph.len(), 2 * (3 * 3 + 4 * 2));

    for y in 0..3 {
        for x in 0..4 {
            let node = s.node(x, y);
            let expected = Direction::ALL
                .iter()
                .filter(|d| s.sim.grid().in_bounds(GridCoord::new(x, y).offset(**d)))
                .count();
            assert_eq!(graph.outgoing(node).count(), expected);
            for (_, t) in graph.outgoing(node) {
                assert_eq!(t.kind, TransitionKind::Walk);
                assert_eq!(
                    s.sim.movement_cost_between(&infantry, t.from, t.to),
                    MoveCost::Admissible(1.0)
                );
                assert_eq!(
                    s.sim.movement_cost_between(&infantry, t.to, t.from),
                    MoveCost::Admissible(1.0)
                );
            }
        }
    }
}

#[test]
fn road_cost_is_base_over_aptitude() {
    let s = Scenario::new("===");
    let infantry = s.mover("infantry");
    let r = s.sim.is_in_range(&infantry, s.node(0, 0), s.node(2, 0), 10.0);
    assert!(r.reachable);
    assert!(close(r.total_cost, 2.0 / 1.25));
    let back = s.sim.is_in_range(&infantry, s.node(2, 0), s.node(0, 0), 10.0);
    assert!(close(back.total_cost, r.total_cost));
}

#[test]
fn ladder_costs_depend_on_direction() {
    let mut s = Scenario::new("15");
    let (low, high) = (s.node(0, 0), s.node(1, 0));
    let infantry = s.mover("infantry");
    let heavy = s.mover("heavy");
    assert!(!s.sim.is_in_range(&infantry, low, high, 100.0).reachable);

    s.sim.place_ladder(low, high).unwrap();

    let up = s.sim.find_path(&infantry, low, high, 100.0).unwrap();
    assert!(close(up.total_cost, 1.6));
    assert_eq!(up.nodes, vec![low, high]);
    let kind = s.sim.graph().get(up.transitions[0]).unwrap().kind;
    assert_eq!(kind, TransitionKind::ClimbUp);

    let down = s.sim.find_path(&infantry, high, low, 100.0).unwrap();
    assert!(close(down.total_cost, 1.3));

    // No climbing skill: no path either way.
    assert!(s.sim.find_path(&heavy, low, high, 100.0).is_none());
    assert!(s.sim.find_path(&heavy, high, low, 100.0).is_none());
}

#[test]
fn skill_none_never_crosses_a_skilled_transition() {
    let mut config = GameConfig::default();
    config.climbing.ladder.min_skill = ClimbSkill::Advanced;
    let mut s = Scenario::with_config(
        config,
        "
        1111
        1551
        1111
        ",
    );
    let (west, east) = ((s.node(0, 1), s.node(1, 1)), (s.node(3, 1), s.node(2, 1)));
    s.sim.place_ladder(west.0, west.1).unwrap();
    s.sim.place_ladder(east.0, east.1).unwrap();

    for name in ["heavy", "infantry", "scout"] {
        let mover = s.mover(name);
        for (node, _) in s.sim.reachable_nodes(&mover, s.node(0, 0), f32::INFINITY) {
            let path = s.sim.find_path(&mover, s.node(0, 0), node, f32::INFINITY).unwrap();
            for tid in path.transitions {
                let required = s.sim.graph().get(tid).unwrap().requirement.min_climb_skill;
                assert!(required <= mover.climb_skill, "{name} used a {required:?} move");
            }
        }
    }
    let scout = s.mover("scout");
    let heavy = s.mover("heavy");
    assert!(s.sim.is_in_range(&scout, s.node(0, 0), s.node(1, 1), 100.0).reachable);
    assert!(!s.sim.is_in_range(&heavy, s.node(0, 0), s.node(1, 1), 100.0).reachable);
}

#[test]
fn water_needs_the_swim_capability() {
    let s = Scenario::new("1~1");
    let heavy = s.mover("heavy");
    let scout = s.mover("scout");
    assert!(!s.sim.is_in_range(&heavy, s.node(0, 0), s.node(2, 0), 100.0).reachable);
    let r = s.sim.is_in_range(&scout, s.node(0, 0), s.node(2, 0), 100.0);
    assert!(r.reachable);
    assert!(close(r.total_cost, 1.0 / 0.4 + 1.0));
}

#[test]
fn reachable_set_grows_with_budget() {
    let s = Scenario::new(
        "
        12321
        23432
        34543
        23432
        12321
        ",
    );
    let infantry = s.mover("infantry");
    let origin = s.node(0, 0);
    let mut previous = BTreeSet::new();
    for step in 0..=24 {
        let budget = step as f32 * 0.5;
        let reached = s.sim.reachable_nodes(&infantry, origin, budget);
        assert!(reached.iter().all(|(_, cost)| *cost <= budget));
        let set: BTreeSet<_> = reached.into_iter().map(|(n, _)| n).collect();
        assert!(previous.is_subset(&set), "budget {budget} lost nodes");
        previous = set;
    }
    assert!(previous.contains(&s.node(2, 2)));
}

#[test]
fn search_terminates_on_zero_cost_cycles() {
    let mut config = GameConfig::default();
    config.climbing.ladder.cost_up = 0.0;
    config.climbing.ladder.cost_down = 0.0;
    let mut s = Scenario::with_config(config, "15");
    let (low, high) = (s.node(0, 0), s.node(1, 0));
    s.sim.place_ladder(low, high).unwrap();

    let infantry = s.mover("infantry");
    let reached = s.sim.reachable_nodes(&infantry, low, 0.0);
    assert_eq!(reached, vec![(low, 0.0), (high, 0.0)]);
    assert!(s.sim.is_in_range(&infantry, high, low, 0.0).reachable);
}

#[test]
fn removing_a_wall_reopens_the_corridor() {
    let mut s = Scenario::new("111");
    let infantry = s.mover("infantry");
    let wall = s
        .sim
        .place_wall(GridCoord::new(0, 0), Direction::East, 0, 4, true, true)
        .unwrap();
    assert!(s.sim.find_path(&infantry, s.node(0, 0), s.node(2, 0), 100.0).is_none());
    s.sim.remove_wall(wall).unwrap();
    let path = s.sim.find_path(&infantry, s.node(0, 0), s.node(2, 0), 100.0).unwrap();
    assert_eq!(path.nodes.len(), 3);
}

// ---------------------------------------------------------------------------
// Vision
// ---------------------------------------------------------------------------

#[test]
fn tall_wall_hides_the_cells_behind_it() {
    let mut s = Scenario::new(
        "
        11111111111
        11111111111
        11111111111
        11111111111
        11111111111
        11111111111
        11111111111
        11111111111
        11111111111
        11111111111
        11111111111
        ",
    );
    let commands = [
        spawn(1, 5, 5, "infantry"),
        SimCommand::new(
            1,
            SimAction::SetVisionRange {
                entity: EntityId(0),
                range: 5.0,
            },
        ),
        // Two cells north of the caster, taller than its eye.
        SimCommand::new(
            1,
            SimAction::PlaceWall {
                coord: GridCoord::new(5, 6),
                side: Direction::North,
                base: 0,
                height: 4,
                blocks_vision: true,
                blocks_movement: true,
            },
        ),
    ];
    let result = s.sim.step(&commands, 1);
    assert!(result.rejected.is_empty());

    let visible = s.sim.visible_nodes(RED);
    let explored = s.sim.explored_nodes(RED);
    for y in 7..=10 {
        let behind = s.node(5, y);
        assert!(!visible.contains(&behind), "(5, {y}) seen through the wall");
        assert!(!explored.contains(&behind));
    }
    // Same distances in the open.
    for x in [0, 2, 3, 8, 10] {
        assert!(visible.contains(&s.node(x, 5)), "({x}, 5) should be visible");
    }
    assert!(visible.contains(&s.node(5, 6)));
    assert!(visible.contains(&s.node(5, 2)));
    assert_eq!(s.sim.visible_walls(RED).len(), 1);
}

#[test]
fn high_ground_sees_over_the_ridge() {
    let mut s = Scenario::new(
        "
        1111111
        1111111
        1112111
        1111111
        1111111
        1111111
        1119111
        ",
    );
    let ridge_shadow = s.node(3, 5);
    // On the plain, a ridge one level up hides the cell just past it.
    s.sim.step(&[spawn(1, 3, 3, "infantry")], 1);
    assert!(!s.sim.visible_nodes(RED).contains(&ridge_shadow));

    // Atop the 9-high tower the ridge no longer hides it.
    let tower = s.node(3, 0);
    s.sim.teleport_entity(EntityId(0), tower).unwrap();
    s.sim.step(&[], 2);
    assert!(s.sim.visible_nodes(RED).contains(&ridge_shadow));
}

#[test]
fn exploration_only_grows_and_covers_what_is_visible() {
    let mut s = Scenario::new(
        "
        1111111111111111111111111
        1111311111111111131111111
        1111111111111311111111111
        1111111113111111111111111
        1111111111111111111111111
        ",
    );
    let target = s.node(24, 2);
    s.sim.step(
        &[
            spawn(1, 0, 2, "scout"),
            SimCommand::new(
                1,
                SimAction::OrderMove {
                    entity: EntityId(0),
                    target,
                },
            ),
        ],
        1,
    );

    let mut previous = explored(&s.sim);
    for tick in 2..=200 {
        s.sim.step(&[], tick);
        let now = explored(&s.sim);
        assert!(previous.is_subset(&now), "tick {tick}: explored shrank");
        for node in s.sim.visible_nodes(RED) {
            assert!(now.contains(&node.0), "tick {tick}: visible but unexplored");
        }
        previous = now;
    }
    assert_eq!(s.sim.entity(EntityId(0)).unwrap().position(), target);
    // The whole strip has been seen on the way.
    assert_eq!(previous.len(), s.sim.grid().node_count());
}
