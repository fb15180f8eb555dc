/// World: the complete mutable state of one program run.
///
/// ## Lifecycle
///
///   - Built fresh from a `Level` at level start, on reset and on every
///     re-run (`World::from_level`). The level itself is never mutated.
///   - Mutated in place, one primitive step at a time, while a run is
///     active. Tile changes (key picked, fire out, door opened) go through
///     `set_tile()`.
///   - Cloned wholesale into each `Snapshot` handed to the presentation
///     layer; grids are small.
///
/// The robot's position is always in bounds and never on a `Wall`: the
/// step evaluator rejects such moves instead of applying them.

use crate::domain::robot::{Facing, Robot};
use crate::domain::rules::{MapView, Probe};
use crate::domain::tile::Tile;
use crate::sim::level::{Level, LevelError};

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct World {
    /// Effective terrain, row-major (`tiles[y][x]`).
    pub tiles: Vec<Vec<Tile>>,
    pub width: usize,
    pub height: usize,
    pub robot: Robot,
    /// Value the water tank starts at and is refilled to.
    pub water_capacity: u32,
}

// ── Construction ──

impl World {
    pub fn from_level(level: &Level, water_capacity: u32) -> Self {
        let (sx, sy) = level.start;
        World {
            tiles: level.tiles.clone(),
            width: level.width,
            height: level.height,
            robot: Robot::new(sx, sy, level.facing, water_capacity),
            water_capacity,
        }
    }

    /// Build a world straight from a glyph diagram (see `sim::level` legend).
    pub fn from_diagram(rows: &[&str], facing: Facing, water_capacity: u32) -> Result<Self, LevelError> {
        let level = Level::from_rows("diagram", rows, facing)?;
        Ok(World::from_level(&level, water_capacity))
    }
}

// ── Tile query / mutation API ──

impl World {
    #[inline]
    pub fn map(&self) -> MapView<'_> {
        MapView { tiles: &self.tiles, width: self.width, height: self.height }
    }

    /// Tile at (x, y), or None off the grid.
    #[inline]
    pub fn terrain_at(&self, x: usize, y: usize) -> Option<Tile> {
        self.map().tile_at(x, y)
    }

    /// Set a tile (runtime change). Out-of-bounds writes are ignored.
    #[inline]
    pub fn set_tile(&mut self, x: usize, y: usize, tile: Tile) {
        if x < self.width && y < self.height {
            self.tiles[y][x] = tile;
        }
    }

    /// Tile the robot stands on.
    pub fn tile_under_robot(&self) -> Tile {
        self.terrain_at(self.robot.x, self.robot.y).unwrap_or_default()
    }

    /// In-bounds cell directly ahead of the robot.
    pub fn cell_ahead(&self) -> Option<(usize, usize)> {
        self.map().cell_ahead(self.robot.x, self.robot.y, self.robot.facing)
    }

    /// Look one cell ahead of the robot.
    pub fn probe_ahead(&self) -> Probe {
        self.map().probe(self.robot.x, self.robot.y, self.robot.facing)
    }

    /// Grid as glyph rows, for logs and test assertions.
    pub fn diagram(&self) -> Vec<String> {
        self.tiles
            .iter()
            .take(self.height)
            .enumerate()
            .map(|(y, row)| {
                row.iter()
                    .take(self.width)
                    .enumerate()
                    .map(|(x, t)| if (x, y) == self.robot.pos() { '@' } else { t.glyph() })
                    .collect()
            })
            .collect()
    }
}
