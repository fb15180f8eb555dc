/// Tile kinds and their properties.
/// Properties are queried via methods, not stored as flags,
/// so tile semantics are centralized here.
///
/// ## Tile Rule Table
///
/// ┌──────────────┬──────────┬──────────────────────────────┐
/// │ Tile          │ Class    │ Notes                        │
/// ├──────────────┼──────────┼──────────────────────────────┤
/// │ Wall          │ Blocking │ moving in = crash            │
/// │ DoorLocked    │ Locked   │ blocking until `use` + key   │
/// │ Goal          │ Winning  │ moving in = win              │
/// │ everything else│ Passable │                             │
/// └──────────────┴──────────┴──────────────────────────────┘
///
/// Out-of-bounds cells are reported as `Blocking` by the map view
/// (see `domain::rules`), never by this table.

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Tile {
    Floor,
    Wall,
    Start,
    Goal,
    Red,        // fire, or a logic-rule trigger
    Blue,       // water, or a logic-rule trigger
    Yellow,     // key, or a logic-rule trigger
    DoorLocked,
    DoorOpen,
}

/// Interaction class of a tile for step legality.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TileClass {
    Blocking,
    Winning,
    Locked,
    Passable,
}

impl TileClass {
    /// Would a single-unit move into this class be rejected?
    pub fn is_blocking(self) -> bool {
        matches!(self, TileClass::Blocking | TileClass::Locked)
    }
}

/// The three color tiles, as seen by the tile-rule simulation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Color {
    Red,
    Blue,
    Yellow,
}

impl Color {
    pub const ALL: [Color; 3] = [Color::Red, Color::Blue, Color::Yellow];

    pub fn name(self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Blue => "blue",
            Color::Yellow => "yellow",
        }
    }

    pub fn from_name(name: &str) -> Option<Color> {
        match name.to_ascii_lowercase().as_str() {
            "red" | "r" => Some(Color::Red),
            "blue" | "b" => Some(Color::Blue),
            "yellow" | "y" => Some(Color::Yellow),
            _ => None,
        }
    }
}

/// Tile Rule Table lookup.
pub fn classify(tile: Tile) -> TileClass {
    match tile {
        Tile::Wall => TileClass::Blocking,
        Tile::DoorLocked => TileClass::Locked,
        Tile::Goal => TileClass::Winning,
        _ => TileClass::Passable,
    }
}

impl Tile {
    pub fn class(self) -> TileClass {
        classify(self)
    }

    /// Key-bearing tile: `pick` takes the key.
    pub fn is_key(self) -> bool {
        matches!(self, Tile::Yellow)
    }

    /// Fire-bearing tile: `pick` extinguishes it.
    pub fn is_fire(self) -> bool {
        matches!(self, Tile::Red)
    }

    /// Water-bearing tile: `use` refills the tank.
    pub fn is_water(self) -> bool {
        matches!(self, Tile::Blue)
    }

    pub fn color(self) -> Option<Color> {
        match self {
            Tile::Red => Some(Color::Red),
            Tile::Blue => Some(Color::Blue),
            Tile::Yellow => Some(Color::Yellow),
            _ => None,
        }
    }

    /// Level-file glyph.
    pub fn glyph(self) -> char {
        match self {
            Tile::Floor => '.',
            Tile::Wall => 'W',
            Tile::Start => 'S',
            Tile::Goal => 'F',
            Tile::Red => 'R',
            Tile::Blue => 'B',
            Tile::Yellow => 'Y',
            Tile::DoorLocked => 'D',
            Tile::DoorOpen => 'O',
        }
    }

    pub fn from_glyph(ch: char) -> Option<Tile> {
        match ch {
            '.' | ' ' => Some(Tile::Floor),
            'W' => Some(Tile::Wall),
            'S' => Some(Tile::Start),
            'F' => Some(Tile::Goal),
            'R' => Some(Tile::Red),
            'B' => Some(Tile::Blue),
            'Y' => Some(Tile::Yellow),
            'D' => Some(Tile::DoorLocked),
            'O' => Some(Tile::DoorOpen),
            _ => None,
        }
    }
}

impl Default for Tile {
    fn default() -> Self {
        Tile::Floor
    }
}
