/// Command tree interpreter: recursive tree walk over a program.
///
/// Each node evaluates to an `Outcome`. `Continue` moves on to the next
/// sibling; `Win` and `Crash` return immediately through every enclosing
/// loop and pattern call. A top-level walk that ends in `Continue` becomes
/// the `Exhausted` verdict.
///
/// This is the batch form of the engine. `sim::exec::Execution` walks the
/// same tree one primitive at a time and must agree with it exactly.

use log::info;

use crate::domain::command::{Command, Program};
use super::event::StepEvent;
use super::step::{self, Outcome};
use super::world::World;

/// Sensor loop safety bound (iterations).
pub const SENSOR_LOOP_LIMIT: u32 = 30;
/// Tile-rule simulation tick ceiling.
pub const LOGIC_TICK_LIMIT: u32 = 50;
/// Water tank size at spawn and after a refill.
pub const WATER_CAPACITY: u32 = 3;

/// Fixed bounds that keep every run finite.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Limits {
    pub sensor_loop: u32,
    pub logic_ticks: u32,
    pub water_capacity: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            sensor_loop: SENSOR_LOOP_LIMIT,
            logic_ticks: LOGIC_TICK_LIMIT,
            water_capacity: WATER_CAPACITY,
        }
    }
}

/// Terminal verdict of a whole run.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Verdict {
    Win,
    Crash,
    /// Program (or tick budget) ran out before the goal. Not an error.
    Exhausted,
}

impl Verdict {
    pub fn from_outcome(outcome: Outcome) -> Verdict {
        match outcome {
            Outcome::Win => Verdict::Win,
            Outcome::Crash => Verdict::Crash,
            Outcome::Continue => Verdict::Exhausted,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Verdict::Win => "win",
            Verdict::Crash => "crash",
            Verdict::Exhausted => "exhausted",
        }
    }
}

pub struct Interpreter<'a> {
    pattern: &'a [Command],
    limits: Limits,
}

impl<'a> Interpreter<'a> {
    pub fn new(pattern: &'a [Command], limits: Limits) -> Self {
        Interpreter { pattern, limits }
    }

    /// Walk `seq` against `world`, mutating it in place.
    pub fn run(&self, seq: &[Command], world: &mut World, events: &mut Vec<StepEvent>) -> Outcome {
        self.walk(seq, world, events, false)
    }

    fn walk(&self, seq: &[Command], world: &mut World, events: &mut Vec<StepEvent>, in_pattern: bool) -> Outcome {
        for cmd in seq {
            let outcome = self.node(cmd, world, events, in_pattern);
            if outcome.is_terminal() {
                return outcome;
            }
        }
        Outcome::Continue
    }

    fn node(&self, cmd: &Command, world: &mut World, events: &mut Vec<StepEvent>, in_pattern: bool) -> Outcome {
        match cmd {
            Command::Move { distance } => step::move_forward(world, *distance, events),
            Command::CallPattern => {
                // The pattern never calls itself; a stray call in it is a no-op.
                if in_pattern {
                    return Outcome::Continue;
                }
                self.walk(self.pattern, world, events, true)
            }
            Command::BoundedRepeat { count, body } => {
                for _ in 0..*count {
                    let outcome = self.walk(body, world, events, in_pattern);
                    if outcome.is_terminal() {
                        return outcome;
                    }
                }
                Outcome::Continue
            }
            Command::SensorRepeat { body } => {
                for _ in 0..self.limits.sensor_loop {
                    if world.probe_ahead().is_blocked() {
                        break;
                    }
                    let outcome = self.walk(body, world, events, in_pattern);
                    if outcome.is_terminal() {
                        return outcome;
                    }
                }
                Outcome::Continue
            }
            leaf => match leaf.primitive() {
                Some(prim) => step::evaluate(world, prim, events),
                None => Outcome::Continue,
            },
        }
    }
}

/// Run a whole program to its verdict (instant batch evaluation).
pub fn execute(program: &Program, world: &mut World, limits: Limits) -> Verdict {
    let mut events = Vec::new();
    let outcome = Interpreter::new(&program.pattern, limits).run(&program.main, world, &mut events);
    let verdict = Verdict::from_outcome(outcome);
    info!("program finished: {} at ({}, {})", verdict.label(), world.robot.x, world.robot.y);
    verdict
}
