// Test-support crate: build a `SimState` from an ASCII height map.
//
// Scenario tests describe terrain as a small picture instead of dozens of
// `add_node` calls. Each character is one column; the first line is the
// northern edge of the map (highest y), so the picture reads the way the map
// looks from above with north up.
//
//   '1'..'9'  ground whose surface is at that height
//   '='       road at height 1
//   'm'       mud at height 1
//   '~'       water at height 1
//   '.'       empty column (no node at all)
//
// Every node reaches down to height 0, so hills are solid and sightlines
// cannot pass underneath them. The graph is built once from the finished
// grid (`SimState::with_grid`), not column by column.
//
// See also: `tests/scenarios.rs` for the end-to-end scenarios.

use highground_sim::config::{GameConfig, SurfaceRegistry};
use highground_sim::error::{GridError, Result};
use highground_sim::grid::TerrainGrid;
use highground_sim::mover::MoverProfile;
use highground_sim::sim::SimState;
use highground_sim::types::{GridCoord, NodeId, NodeKind};

/// Bottom of every parsed column.
const BEDROCK: i32 = 0;

/// What one map character turns into.
fn cell(ch: char) -> Option<Option<(i32, NodeKind, &'static str)>> {
    match ch {
        '1'..='9' => Some(Some((ch as i32 - '0' as i32, NodeKind::Ground, "dirt"))),
        '=' => Some(Some((1, NodeKind::Ground, "road"))),
        'm' => Some(Some((1, NodeKind::Ground, "mud"))),
        '~' => Some(Some((1, NodeKind::Water, "water"))),
        '.' => Some(None),
        _ => None,
    }
}

/// Parse an ASCII height map into a fresh grid sized to the map. The
/// config's `grid_size` is overwritten with the map's size.
pub fn parse_map(mut config: GameConfig, map: &str) -> Result<SimState> {
    let rows: Vec<&str> = map
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let width = rows.first().map_or(0, |r| r.chars().count());
    if rows.iter().any(|r| r.chars().count() != width) {
        return Err(GridError::Config("map rows differ in length".into()));
    }
    let depth = rows.len();
    config.grid_size = (width as u32, depth as u32);

    let surfaces = SurfaceRegistry::from_config(&config);
    let mut grid = TerrainGrid::new(width as u32, depth as u32);
    for (row, line) in rows.iter().enumerate() {
        let y = (depth - 1 - row) as i32;
        for (x, ch) in line.chars().enumerate() {
            let spec = cell(ch)
                .ok_or_else(|| GridError::Config(format!("unknown map character '{ch}'")))?;
            let Some((height, kind, surface)) = spec else {
                continue;
            };
            let surface = surfaces.resolve(surface)?;
            grid.add_node(GridCoord::new(x as i32, y), BEDROCK, height, kind, surface)?;
        }
    }
    SimState::with_grid(config, grid)
}

/// A parsed map plus lookup helpers for tests.
pub struct Scenario {
    pub sim: SimState,
}

impl Scenario {
    /// Parse `map` with the default config. Panics on a malformed map.
    pub fn new(map: &str) -> Self {
        Self::with_config(GameConfig::default(), map)
    }

    /// Parse `map` with `config`. Panics on a malformed map.
    pub fn with_config(config: GameConfig, map: &str) -> Self {
        let sim = parse_map(config, map).expect("scenario map should parse");
        Self { sim }
    }

    /// The topmost node of column `(x, y)`. Panics if the column is empty.
    pub fn node(&self, x: i32, y: i32) -> NodeId {
        self.sim
            .grid()
            .top_node(GridCoord::new(x, y))
            .unwrap_or_else(|| panic!("no node at ({x}, {y})"))
    }

    /// A mover preset from the config. Panics if it does not exist.
    pub fn mover(&self, name: &str) -> MoverProfile {
        self.sim
            .mover_profile(name)
            .unwrap_or_else(|e| panic!("mover '{name}': {e}"))
    }
}
