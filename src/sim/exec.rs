/// Cooperative stepper over a command tree.
///
/// `Execution` is a lazy, finite iterator of `Snapshot`s: one per
/// single-unit primitive step (a `Move { distance: 3 }` yields three). It
/// walks the tree with an explicit frame stack instead of recursion, so the
/// caller can pause between any two steps and resume later, or drop the
/// run at any point. Evaluation order and results are exactly those of
/// `interpreter::Interpreter::run`.
///
/// ## Frame stack
///
///   - The bottom frame is the main sequence.
///   - `loop n { }` pushes a frame that replays its body `n` times.
///   - `while { }` pushes a frame that probes the cell ahead before each
///     pass, up to `Limits::sensor_loop` passes.
///   - `call` pushes a frame over the pattern buffer (no-op inside it).
///
/// The iterator ends after the first `Win`/`Crash` snapshot, or when the
/// stack empties (`Exhausted`).

use log::info;

use crate::domain::command::{Command, Primitive, Program};
use super::event::StepEvent;
use super::interpreter::{Limits, Verdict};
use super::step::{self, Outcome};
use super::world::World;

/// Which buffer a command lives in.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Scope {
    Main,
    Pattern,
}

/// Location of a command node: buffer plus child indices from the root.
/// `[2, 0]` is the first child of the third top-level command.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Cursor {
    pub scope: Scope,
    pub path: Vec<usize>,
}

/// The world after one primitive step (or one simulation tick).
#[derive(Clone, Debug)]
pub struct Snapshot {
    /// 0-based index of the primitive command (or tick) that produced it.
    pub step: usize,
    /// Command being executed; None in tile-rule simulation.
    pub at: Option<Cursor>,
    pub world: World,
    pub outcome: Outcome,
    pub events: Vec<StepEvent>,
}

#[derive(Clone, Copy, Debug)]
enum Repeat {
    Once,
    Count { remaining: u32 },
    Sensor { remaining: u32 },
}

#[derive(Clone, Debug)]
struct Frame {
    scope: Scope,
    /// Path to the sequence this frame walks (empty for a root buffer).
    path: Vec<usize>,
    pc: usize,
    repeat: Repeat,
}

#[derive(Clone, Debug)]
struct PendingMove {
    units: u32,
    at: Cursor,
    step: usize,
}

/// What to do with the node under the program counter.
enum Action {
    Skip,
    EnterCount(u32),
    EnterSensor,
    Call,
    Move(u32),
    Prim(Primitive),
}

pub struct Execution {
    program: Program,
    initial: World,
    world: World,
    limits: Limits,
    stack: Vec<Frame>,
    pending: Option<PendingMove>,
    steps: usize,
    verdict: Option<Verdict>,
    crash_step: Option<usize>,
}

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

impl Execution {
    pub fn new(program: Program, world: World, limits: Limits) -> Self {
        let mut exec = Execution {
            program,
            initial: world.clone(),
            world,
            limits,
            stack: vec![],
            pending: None,
            steps: 0,
            verdict: None,
            crash_step: None,
        };
        exec.restart();
        exec
    }

    /// Rewind to the first step with the starting world.
    pub fn restart(&mut self) {
        self.world = self.initial.clone();
        self.stack = vec![Frame { scope: Scope::Main, path: vec![], pc: 0, repeat: Repeat::Once }];
        self.pending = None;
        self.steps = 0;
        self.verdict = None;
        self.crash_step = None;
        info!("run started: {} top-level commands", self.program.main.len());
    }

    /// Current world (after the last yielded step).
    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Set once the run is over.
    pub fn verdict(&self) -> Option<Verdict> {
        self.verdict
    }

    pub fn is_finished(&self) -> bool {
        self.verdict.is_some()
    }

    /// Index of the primitive command that crashed, if the run crashed.
    pub fn crash_step(&self) -> Option<usize> {
        self.crash_step
    }

    /// Primitive commands started so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Drain the remaining steps and return the verdict.
    pub fn finish(&mut self) -> Verdict {
        for _ in self.by_ref() {}
        self.verdict.unwrap_or(Verdict::Exhausted)
    }
}

impl Iterator for Execution {
    type Item = Snapshot;

    fn next(&mut self) -> Option<Snapshot> {
        if self.verdict.is_some() {
            return None;
        }
        if let Some(snapshot) = self.continue_move() {
            return Some(snapshot);
        }
        loop {
            let Some(frame) = self.stack.last() else {
                self.conclude(Verdict::Exhausted);
                return None;
            };
            let Some(seq) = sequence(&self.program, frame.scope, &frame.path) else {
                self.stack.pop();
                continue;
            };
            if frame.pc >= seq.len() {
                self.end_of_pass();
                continue;
            }

            let index = frame.pc;
            let scope = frame.scope;
            let mut path = frame.path.clone();
            path.push(index);
            let action = match &seq[index] {
                Command::Move { distance } => Action::Move((*distance).max(1)),
                Command::CallPattern => Action::Call,
                Command::BoundedRepeat { count, .. } => Action::EnterCount(*count),
                Command::SensorRepeat { .. } => Action::EnterSensor,
                leaf => match leaf.primitive() {
                    Some(prim) => Action::Prim(prim),
                    None => Action::Skip,
                },
            };

            if let Some(frame) = self.stack.last_mut() {
                frame.pc += 1;
            }

            match action {
                Action::Skip => {}
                Action::EnterCount(count) => {
                    if count > 0 {
                        let repeat = Repeat::Count { remaining: count - 1 };
                        self.stack.push(Frame { scope, path, pc: 0, repeat });
                    }
                }
                Action::EnterSensor => {
                    if self.limits.sensor_loop > 0 && !self.world.probe_ahead().is_blocked() {
                        let repeat = Repeat::Sensor { remaining: self.limits.sensor_loop - 1 };
                        self.stack.push(Frame { scope, path, pc: 0, repeat });
                    }
                }
                Action::Call => {
                    if scope == Scope::Main {
                        self.stack.push(Frame { scope: Scope::Pattern, path: vec![], pc: 0, repeat: Repeat::Once });
                    }
                }
                Action::Move(units) => {
                    let at = Cursor { scope, path };
                    let step = self.begin_step();
                    if units > 1 {
                        self.pending = Some(PendingMove { units: units - 1, at: at.clone(), step });
                    }
                    return Some(self.apply(Primitive::Step, at, step));
                }
                Action::Prim(prim) => {
                    let step = self.begin_step();
                    return Some(self.apply(prim, Cursor { scope, path }, step));
                }
            }
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Internals
// ══════════════════════════════════════════════════════════════

/// The sequence at `path` inside the given buffer.
pub fn sequence<'p>(program: &'p Program, scope: Scope, path: &[usize]) -> Option<&'p [Command]> {
    let mut seq: &[Command] = match scope {
        Scope::Main => &program.main,
        Scope::Pattern => &program.pattern,
    };
    for &i in path {
        seq = seq.get(i)?.body()?;
    }
    Some(seq)
}

impl Execution {
    fn begin_step(&mut self) -> usize {
        let step = self.steps;
        self.steps += 1;
        step
    }

    fn apply(&mut self, prim: Primitive, at: Cursor, step: usize) -> Snapshot {
        let mut events = Vec::new();
        let outcome = step::evaluate(&mut self.world, prim, &mut events);
        if outcome == Outcome::Crash {
            self.crash_step = Some(step);
        }
        if outcome.is_terminal() {
            self.conclude(Verdict::from_outcome(outcome));
        }
        Snapshot { step, at: Some(at), world: self.world.clone(), outcome, events }
    }

    /// Next unit of a multi-square move, if one is in flight.
    fn continue_move(&mut self) -> Option<Snapshot> {
        let pending = self.pending.take()?;
        if pending.units > 1 {
            self.pending = Some(PendingMove { units: pending.units - 1, ..pending.clone() });
        }
        Some(self.apply(Primitive::Step, pending.at, pending.step))
    }

    /// The top frame ran off the end of its sequence: repeat it or pop it.
    fn end_of_pass(&mut self) {
        let blocked = self.world.probe_ahead().is_blocked();
        let Some(frame) = self.stack.last_mut() else {
            return;
        };
        let again = match &mut frame.repeat {
            Repeat::Count { remaining } if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            Repeat::Sensor { remaining } if *remaining > 0 && !blocked => {
                *remaining -= 1;
                true
            }
            _ => false,
        };
        if again {
            frame.pc = 0;
        } else {
            self.stack.pop();
        }
    }

    fn conclude(&mut self, verdict: Verdict) {
        self.verdict = Some(verdict);
        self.stack.clear();
        self.pending = None;
        match self.crash_step {
            Some(step) => info!("run finished: crash at step {}", step),
            None => info!("run finished: {} after {} steps", verdict.label(), self.steps),
        }
    }
}
