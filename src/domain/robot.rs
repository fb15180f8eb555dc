/// Robot pose: position, facing, single-slot inventory, water tank.

/// Cardinal facing. Encoded 0=up, 1=right, 2=down, 3=left.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Facing {
    Up,
    Right,
    Down,
    Left,
}

impl Facing {
    pub fn index(self) -> u8 {
        match self {
            Facing::Up => 0,
            Facing::Right => 1,
            Facing::Down => 2,
            Facing::Left => 3,
        }
    }

    /// Any integer is reduced modulo 4.
    pub fn from_index(i: u8) -> Facing {
        match i % 4 {
            0 => Facing::Up,
            1 => Facing::Right,
            2 => Facing::Down,
            _ => Facing::Left,
        }
    }

    /// Rotate by `quarter_turns` clockwise (negative = counter-clockwise).
    pub fn rotated(self, quarter_turns: i8) -> Facing {
        let i = (self.index() as i8 + quarter_turns).rem_euclid(4);
        Facing::from_index(i as u8)
    }

    pub fn turn_left(self) -> Facing { self.rotated(-1) }
    pub fn turn_right(self) -> Facing { self.rotated(1) }
    pub fn reverse(self) -> Facing { self.rotated(2) }

    /// Unit step (dx, dy); y grows downward.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Facing::Up => (0, -1),
            Facing::Right => (1, 0),
            Facing::Down => (0, 1),
            Facing::Left => (-1, 0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Facing::Up => "up",
            Facing::Right => "right",
            Facing::Down => "down",
            Facing::Left => "left",
        }
    }

    pub fn from_name(s: &str) -> Option<Facing> {
        match s.to_ascii_lowercase().as_str() {
            "up" | "0" => Some(Facing::Up),
            "right" | "1" => Some(Facing::Right),
            "down" | "2" => Some(Facing::Down),
            "left" | "3" => Some(Facing::Left),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Inventory {
    #[default]
    Empty,
    Key,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Robot {
    pub x: usize,
    pub y: usize,
    pub facing: Facing,
    pub inventory: Inventory,
    pub water: u32,
}

impl Robot {
    pub fn new(x: usize, y: usize, facing: Facing, water: u32) -> Self {
        Robot { x, y, facing, inventory: Inventory::Empty, water }
    }

    pub fn has_key(&self) -> bool {
        self.inventory == Inventory::Key
    }

    pub fn pos(&self) -> (usize, usize) {
        (self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_wraps() {
        assert_eq!(Facing::Up.turn_left(), Facing::Left);
        assert_eq!(Facing::Left.turn_right(), Facing::Up);
        assert_eq!(Facing::Right.reverse(), Facing::Left);
        assert_eq!(Facing::Down.rotated(-6), Facing::Up);
    }

    #[test]
    fn index_round_trip() {
        for i in 0..4 {
            assert_eq!(Facing::from_index(i).index(), i);
        }
        assert_eq!(Facing::from_index(5), Facing::Right);
    }

    #[test]
    fn names() {
        assert_eq!(Facing::from_name("LEFT"), Some(Facing::Left));
        assert_eq!(Facing::from_name("2"), Some(Facing::Down));
        assert_eq!(Facing::from_name("north"), None);
    }
}
