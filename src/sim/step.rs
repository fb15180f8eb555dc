/// The step evaluator: applies exactly one primitive to the world.
///
/// Processing per primitive:
///   - TurnLeft / TurnRight  rotate facing, always Continue
///   - Step                  probe ahead (see `domain::rules`), commit or crash
///   - Pick                  act on the tile under the robot
///   - Use                   act on the tile ahead of the robot
///
/// A rejected step never writes to the world: the robot stays where it was
/// and the outcome is `Crash`. Pick and Use are no-ops on tiles they do not
/// understand and never fail.

use log::debug;

use crate::domain::command::Primitive;
use crate::domain::robot::Inventory;
use crate::domain::rules::Probe;
use crate::domain::tile::Tile;
use super::event::StepEvent;
use super::world::World;

/// Result of evaluating any command node.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Outcome {
    /// Proceed to the next sibling.
    Continue,
    /// Goal reached. Terminal.
    Win,
    /// Illegal move. Terminal.
    Crash,
}

impl Outcome {
    pub fn is_terminal(self) -> bool {
        self != Outcome::Continue
    }
}

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn evaluate(world: &mut World, prim: Primitive, events: &mut Vec<StepEvent>) -> Outcome {
    let outcome = match prim {
        Primitive::TurnLeft => turn(world, -1, events),
        Primitive::TurnRight => turn(world, 1, events),
        Primitive::Step => resolve_step(world, events),
        Primitive::Pick => resolve_pick(world, events),
        Primitive::Use => resolve_use(world, events),
    };
    debug!(
        "{:?} -> {:?} at ({}, {}) facing {}",
        prim, outcome, world.robot.x, world.robot.y, world.robot.facing.name()
    );
    outcome
}

/// `Move { distance }`: `distance` single steps, stopping at the first
/// terminal outcome. Zero distance counts as one.
pub fn move_forward(world: &mut World, distance: u32, events: &mut Vec<StepEvent>) -> Outcome {
    for _ in 0..distance.max(1) {
        let outcome = evaluate(world, Primitive::Step, events);
        if outcome.is_terminal() {
            return outcome;
        }
    }
    Outcome::Continue
}

// ══════════════════════════════════════════════════════════════
// Primitives
// ══════════════════════════════════════════════════════════════

fn turn(world: &mut World, quarter_turns: i8, events: &mut Vec<StepEvent>) -> Outcome {
    world.robot.facing = world.robot.facing.rotated(quarter_turns);
    events.push(StepEvent::Turned { facing: world.robot.facing });
    Outcome::Continue
}

fn resolve_step(world: &mut World, events: &mut Vec<StepEvent>) -> Outcome {
    match world.probe_ahead() {
        Probe::Blocked => {
            events.push(StepEvent::Blocked);
            Outcome::Crash
        }
        Probe::Goal { x, y } => {
            world.robot.x = x;
            world.robot.y = y;
            events.push(StepEvent::Moved { x, y });
            events.push(StepEvent::ReachedGoal { x, y });
            Outcome::Win
        }
        Probe::Open { x, y } => {
            world.robot.x = x;
            world.robot.y = y;
            events.push(StepEvent::Moved { x, y });
            Outcome::Continue
        }
    }
}

/// Pick acts on the tile under the robot: take a key or put out a fire.
fn resolve_pick(world: &mut World, events: &mut Vec<StepEvent>) -> Outcome {
    let (x, y) = world.robot.pos();
    let tile = world.tile_under_robot();
    if tile.is_key() {
        world.set_tile(x, y, Tile::Floor);
        world.robot.inventory = Inventory::Key;
        events.push(StepEvent::KeyPicked { x, y });
    } else if tile.is_fire() {
        world.set_tile(x, y, Tile::Floor);
        events.push(StepEvent::FireExtinguished { x, y });
    }
    Outcome::Continue
}

/// Use acts on the tile ahead: unlock a door (the key is kept) or refill water.
fn resolve_use(world: &mut World, events: &mut Vec<StepEvent>) -> Outcome {
    let Some((x, y)) = world.cell_ahead() else {
        return Outcome::Continue;
    };
    match world.terrain_at(x, y) {
        Some(Tile::DoorLocked) if world.robot.has_key() => {
            world.set_tile(x, y, Tile::DoorOpen);
            events.push(StepEvent::DoorOpened { x, y });
        }
        Some(t) if t.is_water() => {
            world.robot.water = world.water_capacity;
            events.push(StepEvent::WaterRefilled { water: world.robot.water });
        }
        _ => {}
    }
    Outcome::Continue
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::robot::Facing;

    fn world(rows: &[&str], facing: Facing) -> World {
        World::from_diagram(rows, facing, 3).unwrap()
    }

    fn eval(w: &mut World, p: Primitive) -> Outcome {
        evaluate(w, p, &mut vec![])
    }

    #[test]
    fn turns_always_continue() {
        let mut w = world(&["S"], Facing::Up);
        assert_eq!(eval(&mut w, Primitive::TurnLeft), Outcome::Continue);
        assert_eq!(w.robot.facing, Facing::Left);
        assert_eq!(eval(&mut w, Primitive::TurnRight), Outcome::Continue);
        assert_eq!(eval(&mut w, Primitive::TurnRight), Outcome::Continue);
        assert_eq!(w.robot.facing, Facing::Right);
    }

    #[test]
    fn step_onto_floor() {
        let mut w = world(&["S.."], Facing::Right);
        let mut ev = vec![];
        assert_eq!(evaluate(&mut w, Primitive::Step, &mut ev), Outcome::Continue);
        assert_eq!(w.robot.pos(), (1, 0));
        assert_eq!(ev, vec![StepEvent::Moved { x: 1, y: 0 }]);
    }

    #[test]
    fn step_into_wall_is_not_committed() {
        let mut w = world(&["SW."], Facing::Right);
        let before = w.clone();
        let mut ev = vec![];
        assert_eq!(evaluate(&mut w, Primitive::Step, &mut ev), Outcome::Crash);
        assert_eq!(w, before);
        assert_eq!(ev, vec![StepEvent::Blocked]);
    }

    #[test]
    fn step_off_grid_crashes() {
        let mut w = world(&["S.", ".."], Facing::Up);
        assert_eq!(eval(&mut w, Primitive::Step), Outcome::Crash);
        w.robot.facing = Facing::Left;
        assert_eq!(eval(&mut w, Primitive::Step), Outcome::Crash);
        assert_eq!(w.robot.pos(), (0, 0));
    }

    #[test]
    fn step_into_locked_door_crashes() {
        let mut w = world(&["SD"], Facing::Right);
        assert_eq!(eval(&mut w, Primitive::Step), Outcome::Crash);
        assert_eq!(w.robot.pos(), (0, 0));
    }

    #[test]
    fn step_onto_goal_wins() {
        let mut w = world(&["SF"], Facing::Right);
        assert_eq!(eval(&mut w, Primitive::Step), Outcome::Win);
        assert_eq!(w.robot.pos(), (1, 0));
    }

    #[test]
    fn move_stops_at_first_terminal() {
        let mut w = world(&["S.F.."], Facing::Right);
        assert_eq!(move_forward(&mut w, 4, &mut vec![]), Outcome::Win);
        assert_eq!(w.robot.pos(), (2, 0));

        let mut w = world(&["S.W.."], Facing::Right);
        assert_eq!(move_forward(&mut w, 4, &mut vec![]), Outcome::Crash);
        assert_eq!(w.robot.pos(), (1, 0));
    }

    #[test]
    fn move_zero_is_one_step() {
        let mut w = world(&["S.."], Facing::Right);
        assert_eq!(move_forward(&mut w, 0, &mut vec![]), Outcome::Continue);
        assert_eq!(w.robot.pos(), (1, 0));
    }

    #[test]
    fn pick_key() {
        let mut w = world(&["SY"], Facing::Right);
        eval(&mut w, Primitive::Step);
        let mut ev = vec![];
        assert_eq!(evaluate(&mut w, Primitive::Pick, &mut ev), Outcome::Continue);
        assert!(w.robot.has_key());
        assert_eq!(w.terrain_at(1, 0), Some(Tile::Floor));
        assert_eq!(ev, vec![StepEvent::KeyPicked { x: 1, y: 0 }]);
    }

    #[test]
    fn pick_fire_extinguishes() {
        let mut w = world(&["SR"], Facing::Right);
        eval(&mut w, Primitive::Step);
        eval(&mut w, Primitive::Pick);
        assert_eq!(w.terrain_at(1, 0), Some(Tile::Floor));
        assert!(!w.robot.has_key());
    }

    #[test]
    fn pick_on_plain_floor_is_noop() {
        let mut w = world(&["S."], Facing::Right);
        let before = w.clone();
        assert_eq!(eval(&mut w, Primitive::Pick), Outcome::Continue);
        assert_eq!(w, before);
    }

    #[test]
    fn use_without_key_leaves_door_locked() {
        let mut w = world(&["SD"], Facing::Right);
        let before = w.clone();
        assert_eq!(eval(&mut w, Primitive::Use), Outcome::Continue);
        assert_eq!(w, before);
    }

    #[test]
    fn use_with_key_opens_and_keeps_key() {
        let mut w = world(&["SDD"], Facing::Right);
        w.robot.inventory = Inventory::Key;
        eval(&mut w, Primitive::Use);
        assert_eq!(w.terrain_at(1, 0), Some(Tile::DoorOpen));
        assert!(w.robot.has_key());
        assert_eq!(eval(&mut w, Primitive::Step), Outcome::Continue);
        eval(&mut w, Primitive::Use);
        assert_eq!(w.terrain_at(2, 0), Some(Tile::DoorOpen));
    }

    #[test]
    fn use_on_water_refills() {
        let mut w = world(&["SB"], Facing::Right);
        w.robot.water = 0;
        let mut ev = vec![];
        evaluate(&mut w, Primitive::Use, &mut ev);
        assert_eq!(w.robot.water, 3);
        assert_eq!(ev, vec![StepEvent::WaterRefilled { water: 3 }]);
        // Water tile itself is untouched.
        assert_eq!(w.terrain_at(1, 0), Some(Tile::Blue));
    }

    #[test]
    fn use_facing_edge_is_noop() {
        let mut w = world(&["S"], Facing::Up);
        let before = w.clone();
        assert_eq!(eval(&mut w, Primitive::Use), Outcome::Continue);
        assert_eq!(w, before);
    }
}
