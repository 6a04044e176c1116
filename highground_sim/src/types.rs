// Core types shared across the simulation.
//
// Defines column coordinates (`GridCoord`), cardinal `Direction`s, compact
// integer identifiers for every addressable object (nodes, transitions,
// walls, climbables, entities, actors, surfaces), and the small enums that
// classify terrain and climbing ability. All types derive `Serialize` and
// `Deserialize` so commands and configs can carry them.
//
// Identifiers are plain sequential integers assigned in construction order.
// They double as indices into the `Vec`s that own the objects, which keeps
// lookup O(1) and iteration order deterministic.
//
// **Critical constraint: determinism.** Nothing here draws on OS entropy or
// hashing order. Everything that ends up as a map key is `Ord`.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A column position on the map grid. Heights are tracked separately on the
/// nodes that occupy the column.
///
/// - X: east  (positive) / west  (negative)
/// - Y: north (positive) / south (negative)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    pub x: i32,
    pub y: i32,
}

impl GridCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The adjacent column in `dir`.
    pub fn offset(self, dir: Direction) -> Self {
        let (dx, dy) = dir.delta();
        Self::new(self.x + dx, self.y + dy)
    }

    /// Manhattan distance between two columns.
    pub fn manhattan_distance(self, other: Self) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }

    /// Squared Euclidean distance between column centres.
    pub fn distance_sq(self, other: Self) -> i64 {
        let dx = i64::from(self.x - other.x);
        let dy = i64::from(self.y - other.y);
        dx * dx + dy * dy
    }

    /// Euclidean distance between column centres.
    pub fn distance(self, other: Self) -> f32 {
        (self.distance_sq(other) as f32).sqrt()
    }

    /// World-space centre of the column on the horizontal plane.
    pub fn center(self) -> [f32; 2] {
        [self.x as f32 + 0.5, self.y as f32 + 0.5]
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One of the four cardinal directions. Transitions and walls only ever run
/// along these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Fixed iteration order used by the graph builder. Transition order on a
    /// node follows this, which in turn fixes search tie-breaking.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Column delta `(dx, dy)` for one step in this direction.
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, 1),
            Direction::East => (1, 0),
            Direction::South => (0, -1),
            Direction::West => (-1, 0),
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// The direction of a unit step from `from` to `to`, if they are
    /// cardinal neighbours.
    pub fn between(from: GridCoord, to: GridCoord) -> Option<Self> {
        Self::ALL.into_iter().find(|&d| from.offset(d) == to)
    }
}

// ---------------------------------------------------------------------------
// Compact identifiers
// ---------------------------------------------------------------------------

macro_rules! compact_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            /// Position of the object in its owning `Vec`.
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

compact_id!(/// Identifier for a surface node in the terrain grid.
NodeId);
compact_id!(/// Identifier for a directed transition in the graph.
TransitionId);
compact_id!(/// Identifier for a placed wall segment.
WallId);
compact_id!(/// Identifier for a placed climbable (ladder or similar).
ClimbableId);
compact_id!(/// Identifier for a simulated entity (unit, vehicle, ...).
EntityId);
compact_id!(/// Identifier for an actor (faction / player) owning entities.
ActorId);
compact_id!(/// Identifier for a surface definition in the `SurfaceRegistry`.
SurfaceId);

// ---------------------------------------------------------------------------
// Terrain and capability enums
// ---------------------------------------------------------------------------

/// Classification of a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Natural terrain.
    #[default]
    Ground,
    /// Built floor: roofs, platforms, bridges.
    FlatSurface,
    /// A hole. Never walkable, never occludes.
    Void,
    /// Swimmable water. Entering requires the swim capability.
    Water,
}

impl NodeKind {
    /// Whether a column of this kind blocks sightlines passing through it.
    pub fn occludes(self) -> bool {
        matches!(self, NodeKind::Ground | NodeKind::FlatSurface)
    }
}

/// Ordered climbing category. Comparisons follow declaration order.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ClimbSkill {
    #[default]
    None,
    Basic,
    Advanced,
    Expert,
}

impl ClimbSkill {
    pub const MAX: ClimbSkill = ClimbSkill::Expert;

    /// Every skill, lowest first.
    pub const ALL: [ClimbSkill; 4] = [
        ClimbSkill::None,
        ClimbSkill::Basic,
        ClimbSkill::Advanced,
        ClimbSkill::Expert,
    ];
}
