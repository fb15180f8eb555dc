/// Movement rules: truth-table driven.
///
/// Pure functions over an immutable map view. These encode "what is legal"
/// without performing the action; `sim::step` commits the result.
///
/// ## Single-unit move truth table
///
/// ┌──────────────────────────────┬──────────┬──────────────────┐
/// │ Cell ahead                    │ Probe    │ Step outcome     │
/// ├──────────────────────────────┼──────────┼──────────────────┤
/// │ off the grid (any edge)       │ Blocked  │ Crash, no commit │
/// │ Wall                          │ Blocked  │ Crash, no commit │
/// │ DoorLocked                    │ Blocked  │ Crash, no commit │
/// │ Goal                          │ Goal     │ commit, Win      │
/// │ anything else                 │ Open     │ commit, Continue │
/// └──────────────────────────────┴──────────┴──────────────────┘
///
/// The sensor loop and the tile-rule simulation use the same probe, so
/// "blocked" means the same thing everywhere.

use super::robot::Facing;
use super::tile::{Tile, TileClass};

/// Immutable view of the tile map for rule queries.
pub struct MapView<'a> {
    pub tiles: &'a [Vec<Tile>],
    pub width: usize,
    pub height: usize,
}

/// Result of looking one cell ahead.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Probe {
    Blocked,
    Open { x: usize, y: usize },
    Goal { x: usize, y: usize },
}

impl Probe {
    pub fn is_blocked(self) -> bool {
        matches!(self, Probe::Blocked)
    }
}

impl<'a> MapView<'a> {
    /// Tile at (x, y), or None off the grid.
    pub fn tile_at(&self, x: usize, y: usize) -> Option<Tile> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.tiles.get(y).and_then(|row| row.get(x)).copied()
    }

    /// Class of (x, y); off the grid counts as blocking.
    pub fn class_at(&self, x: usize, y: usize) -> TileClass {
        self.tile_at(x, y).map_or(TileClass::Blocking, Tile::class)
    }

    /// The in-bounds cell one step from (x, y) in `facing`, if any.
    pub fn cell_ahead(&self, x: usize, y: usize, facing: Facing) -> Option<(usize, usize)> {
        let (dx, dy) = facing.delta();
        let nx = x.checked_add_signed(dx as isize)?;
        let ny = y.checked_add_signed(dy as isize)?;
        if nx >= self.width || ny >= self.height {
            return None;
        }
        Some((nx, ny))
    }

    /// Classify the move from (x, y) in `facing`. See truth table above.
    pub fn probe(&self, x: usize, y: usize, facing: Facing) -> Probe {
        let Some((nx, ny)) = self.cell_ahead(x, y, facing) else {
            return Probe::Blocked;
        };
        match self.class_at(nx, ny) {
            TileClass::Blocking | TileClass::Locked => Probe::Blocked,
            TileClass::Winning => Probe::Goal { x: nx, y: ny },
            TileClass::Passable => Probe::Open { x: nx, y: ny },
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a tile grid from a string diagram using level-file glyphs.
    fn map_from(rows: &[&str]) -> (Vec<Vec<Tile>>, usize, usize) {
        let tiles: Vec<Vec<Tile>> = rows
            .iter()
            .map(|r| r.chars().map(|c| Tile::from_glyph(c).unwrap_or(Tile::Floor)).collect())
            .collect();
        let (w, h) = (tiles[0].len(), tiles.len());
        (tiles, w, h)
    }

    fn mv(tiles: &[Vec<Tile>], w: usize, h: usize) -> MapView<'_> {
        MapView { tiles, width: w, height: h }
    }

    #[test]
    fn open_floor_ahead() {
        let (t, w, h) = map_from(&["S.."]);
        let m = mv(&t, w, h);
        assert_eq!(m.probe(0, 0, Facing::Right), Probe::Open { x: 1, y: 0 });
    }

    #[test]
    fn edges_block() {
        let (t, w, h) = map_from(&["...", "...", "..."]);
        let m = mv(&t, w, h);
        assert!(m.probe(0, 1, Facing::Left).is_blocked());
        assert!(m.probe(1, 0, Facing::Up).is_blocked());
        assert!(m.probe(2, 1, Facing::Right).is_blocked());
        assert!(m.probe(1, 2, Facing::Down).is_blocked());
    }

    #[test]
    fn walls_and_locked_doors_block() {
        let (t, w, h) = map_from(&["SWD"]);
        let m = mv(&t, w, h);
        assert!(m.probe(0, 0, Facing::Right).is_blocked());
        assert!(m.probe(2, 0, Facing::Left).is_blocked()); // wall at (1,0)
        let (t, w, h) = map_from(&["S.D"]);
        let m = mv(&t, w, h);
        assert!(m.probe(1, 0, Facing::Right).is_blocked());
    }

    #[test]
    fn open_door_and_colors_pass() {
        let (t, w, h) = map_from(&["SORBY"]);
        let m = mv(&t, w, h);
        for x in 0..4 {
            assert_eq!(m.probe(x, 0, Facing::Right), Probe::Open { x: x + 1, y: 0 });
        }
    }

    #[test]
    fn goal_is_reported() {
        let (t, w, h) = map_from(&[".F", "S."]);
        let m = mv(&t, w, h);
        assert_eq!(m.probe(1, 1, Facing::Up), Probe::Goal { x: 1, y: 0 });
    }

    #[test]
    fn logical_size_smaller_than_rows() {
        // Rows are 4 wide but the view only admits 3 columns.
        let (t, _, h) = map_from(&["S..F"]);
        let m = mv(&t, 3, h);
        assert!(m.probe(2, 0, Facing::Right).is_blocked());
        assert_eq!(m.class_at(3, 0), TileClass::Blocking);
    }
}
