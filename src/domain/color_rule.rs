/// Per-color behavior rules for the tile-rule simulation mode.
///
/// The player assigns one action to each of the three colors before a run.
/// Unassigned colors ignore the robot.

use super::robot::Facing;
use super::tile::Color;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum RuleAction {
    #[default]
    Ignore,
    TurnRight,
    TurnLeft,
    UTurn,
}

impl RuleAction {
    pub const ALL: [RuleAction; 4] = [
        RuleAction::Ignore,
        RuleAction::TurnRight,
        RuleAction::TurnLeft,
        RuleAction::UTurn,
    ];

    /// Quarter turns clockwise implied by this action.
    pub fn quarter_turns(self) -> i8 {
        match self {
            RuleAction::Ignore => 0,
            RuleAction::TurnRight => 1,
            RuleAction::TurnLeft => -1,
            RuleAction::UTurn => 2,
        }
    }

    pub fn apply(self, facing: Facing) -> Facing {
        facing.rotated(self.quarter_turns())
    }

    /// Next action in the cycle (used by the editor).
    pub fn cycle(self) -> RuleAction {
        match self {
            RuleAction::Ignore => RuleAction::TurnRight,
            RuleAction::TurnRight => RuleAction::TurnLeft,
            RuleAction::TurnLeft => RuleAction::UTurn,
            RuleAction::UTurn => RuleAction::Ignore,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RuleAction::Ignore => "ignore",
            RuleAction::TurnRight => "right",
            RuleAction::TurnLeft => "left",
            RuleAction::UTurn => "u-turn",
        }
    }

    pub fn from_name(s: &str) -> Option<RuleAction> {
        match s.to_ascii_lowercase().as_str() {
            "ignore" | "none" => Some(RuleAction::Ignore),
            "right" | "turn-right" => Some(RuleAction::TurnRight),
            "left" | "turn-left" => Some(RuleAction::TurnLeft),
            "u-turn" | "uturn" | "back" => Some(RuleAction::UTurn),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ColorRules {
    pub red: RuleAction,
    pub blue: RuleAction,
    pub yellow: RuleAction,
}

impl ColorRules {
    pub fn get(&self, color: Color) -> RuleAction {
        match color {
            Color::Red => self.red,
            Color::Blue => self.blue,
            Color::Yellow => self.yellow,
        }
    }

    pub fn set(&mut self, color: Color, action: RuleAction) {
        match color {
            Color::Red => self.red = action,
            Color::Blue => self.blue = action,
            Color::Yellow => self.yellow = action,
        }
    }

    /// Action for whatever the robot stands on; non-color tiles ignore.
    pub fn action_for(&self, color: Option<Color>) -> RuleAction {
        color.map_or(RuleAction::Ignore, |c| self.get(c))
    }

    /// Parse `red=right` style assignments.
    pub fn parse_assignment(s: &str) -> Option<(Color, RuleAction)> {
        let (c, a) = s.split_once('=')?;
        Some((Color::from_name(c.trim())?, RuleAction::from_name(a.trim())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_rotate() {
        assert_eq!(RuleAction::Ignore.apply(Facing::Right), Facing::Right);
        assert_eq!(RuleAction::TurnRight.apply(Facing::Right), Facing::Down);
        assert_eq!(RuleAction::TurnLeft.apply(Facing::Up), Facing::Left);
        assert_eq!(RuleAction::UTurn.apply(Facing::Left), Facing::Right);
    }

    #[test]
    fn default_is_ignore_everywhere() {
        let rules = ColorRules::default();
        for c in Color::ALL {
            assert_eq!(rules.get(c), RuleAction::Ignore);
        }
        assert_eq!(rules.action_for(None), RuleAction::Ignore);
    }

    #[test]
    fn assignment_parsing() {
        assert_eq!(
            ColorRules::parse_assignment("blue=u-turn"),
            Some((Color::Blue, RuleAction::UTurn))
        );
        assert_eq!(ColorRules::parse_assignment("green=left"), None);
        assert_eq!(ColorRules::parse_assignment("red"), None);
    }

    #[test]
    fn cycle_visits_all() {
        let mut a = RuleAction::Ignore;
        for _ in 0..4 {
            a = a.cycle();
        }
        assert_eq!(a, RuleAction::Ignore);
    }
}
