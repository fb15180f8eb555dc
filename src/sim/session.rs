/// Session controller: one level being played.
///
/// Owns the player's program (main sequence plus pattern buffer), the color
/// rules, the current world and at most one active run. Edits are rejected
/// while a run is active; `reset` is the only way to abort one.
///
/// Command nodes are addressed by index paths from the root of a buffer:
/// `[1]` is the second top-level command, `[1, 0]` the first command in its
/// loop body. `push` takes the path of the parent sequence (`[]` for the
/// root).

use log::{debug, info};
use thiserror::Error;

use crate::domain::color_rule::{ColorRules, RuleAction};
use crate::domain::command::{Command, CommandKind, Program};
use crate::domain::tile::Color;
use super::exec::{Cursor, Execution, Scope, Snapshot};
use super::interpreter::{Limits, Verdict};
use super::level::{Level, Mode};
use super::logic::LogicSim;
use super::world::World;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("cannot edit while the robot is running")]
    Running,
    #[error("`{0}` is not available in this level")]
    NotInPalette(&'static str),
    #[error("no command at {0:?}")]
    BadPath(Vec<usize>),
    #[error("command at {0:?} has no count")]
    NoCount(Vec<usize>),
    #[error("the pattern cannot call itself")]
    CallInPattern,
    #[error("this level is solved with color rules, not a program")]
    RulesLevel,
    #[error("this level is solved with a program, not color rules")]
    ProgramLevel,
}

enum Run {
    Program(Execution),
    Rules(LogicSim),
}

pub struct Session {
    level: Level,
    limits: Limits,
    program: Program,
    rules: ColorRules,
    world: World,
    run: Option<Run>,
    cursor: Option<Cursor>,
    verdict: Option<Verdict>,
    crash_step: Option<usize>,
    message: String,
}

// ══════════════════════════════════════════════════════════════
// Lifecycle
// ══════════════════════════════════════════════════════════════

impl Session {
    pub fn new(level: Level, limits: Limits) -> Self {
        let world = World::from_level(&level, limits.water_capacity);
        let program = level.code.clone();
        let message = level.hint.clone();
        info!("level {} ({}) loaded", level.id, level.mode.name());
        Session {
            level,
            limits,
            program,
            rules: ColorRules::default(),
            world,
            run: None,
            cursor: None,
            verdict: None,
            crash_step: None,
            message,
        }
    }

    /// Abort any run and rebuild the world. The program and rules are kept.
    pub fn reset(&mut self) {
        if self.run.take().is_some() {
            debug!("run aborted");
        }
        self.world = World::from_level(&self.level, self.limits.water_capacity);
        self.cursor = None;
        self.verdict = None;
        self.crash_step = None;
        self.message = self.level.hint.clone();
    }

    /// `reset` plus the level's initial code, an empty pattern and all
    /// rules back to `Ignore`.
    pub fn reset_level(&mut self) {
        self.reset();
        self.program = self.level.code.clone();
        self.rules = ColorRules::default();
    }

    /// Begin a run on a fresh world.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.is_running() {
            return Err(SessionError::Running);
        }
        self.reset();
        let world = self.world.clone();
        self.run = Some(match self.level.mode {
            Mode::Program => Run::Program(Execution::new(self.program.clone(), world, self.limits)),
            Mode::Rules => Run::Rules(LogicSim::new(world, self.rules, self.limits)),
        });
        self.message = "Running...".into();
        Ok(())
    }

    /// Advance the active run by one primitive step (or tick).
    /// Returns None when there is no run or it has just ended.
    pub fn step(&mut self) -> Option<Snapshot> {
        let run = self.run.as_mut()?;
        let (snapshot, finished) = match run {
            Run::Program(exec) => {
                let s = exec.next();
                (s, exec.is_finished())
            }
            Run::Rules(sim) => {
                let s = sim.next();
                (s, sim.is_finished())
            }
        };
        if let Some(s) = &snapshot {
            self.world = s.world.clone();
            self.cursor = s.at.clone();
        }
        if finished || snapshot.is_none() {
            self.conclude();
        }
        snapshot
    }

    /// Run the active run (starting one if needed) to its verdict.
    pub fn run_to_end(&mut self) -> Result<Verdict, SessionError> {
        if !self.is_running() {
            self.start()?;
        }
        while self.is_running() {
            self.step();
        }
        Ok(self.verdict.unwrap_or(Verdict::Exhausted))
    }

    fn conclude(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };
        let (verdict, crash_step) = match &run {
            Run::Program(exec) => (exec.verdict(), exec.crash_step()),
            Run::Rules(sim) => (sim.verdict(), None),
        };
        let verdict = verdict.unwrap_or(Verdict::Exhausted);
        self.verdict = Some(verdict);
        self.crash_step = crash_step;
        self.message = match (verdict, self.level.mode) {
            (Verdict::Win, _) => "Goal reached!".into(),
            (Verdict::Crash, Mode::Program) => match crash_step {
                Some(step) => format!("Crashed at step {}.", step + 1),
                None => "Crashed.".into(),
            },
            (Verdict::Crash, Mode::Rules) => "Crashed.".into(),
            (Verdict::Exhausted, Mode::Program) => "The program ended before the goal.".into(),
            (Verdict::Exhausted, Mode::Rules) => "Out of time before the goal.".into(),
        };
        info!("level {}: {}", self.level.id, verdict.label());
    }
}

// ══════════════════════════════════════════════════════════════
// Queries
// ══════════════════════════════════════════════════════════════

impl Session {
    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn buffer(&self, scope: Scope) -> &[Command] {
        match scope {
            Scope::Main => &self.program.main,
            Scope::Pattern => &self.program.pattern,
        }
    }

    pub fn rules(&self) -> ColorRules {
        self.rules
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Command of the most recent step, for highlighting.
    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn verdict(&self) -> Option<Verdict> {
        self.verdict
    }

    pub fn crash_step(&self) -> Option<usize> {
        self.crash_step
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

// ══════════════════════════════════════════════════════════════
// Editing
// ══════════════════════════════════════════════════════════════

impl Session {
    /// Append `cmd` to the sequence at `parent` (`[]` = buffer root).
    pub fn push(&mut self, scope: Scope, parent: &[usize], cmd: Command) -> Result<(), SessionError> {
        self.check_command(scope, &cmd)?;
        let seq = sequence_mut(&mut self.program, scope, parent).ok_or_else(|| SessionError::BadPath(parent.to_vec()))?;
        seq.push(cmd);
        self.edited();
        Ok(())
    }

    /// Insert `cmd` so that it ends up at `path`.
    pub fn insert(&mut self, scope: Scope, path: &[usize], cmd: Command) -> Result<(), SessionError> {
        self.check_command(scope, &cmd)?;
        let bad = || SessionError::BadPath(path.to_vec());
        let (&index, parent) = path.split_last().ok_or_else(bad)?;
        let seq = sequence_mut(&mut self.program, scope, parent).ok_or_else(bad)?;
        if index > seq.len() {
            return Err(bad());
        }
        seq.insert(index, cmd);
        self.edited();
        Ok(())
    }

    pub fn remove(&mut self, scope: Scope, path: &[usize]) -> Result<Command, SessionError> {
        self.check_editable()?;
        let bad = || SessionError::BadPath(path.to_vec());
        let (&index, parent) = path.split_last().ok_or_else(bad)?;
        let seq = sequence_mut(&mut self.program, scope, parent).ok_or_else(bad)?;
        if index >= seq.len() {
            return Err(bad());
        }
        let removed = seq.remove(index);
        self.edited();
        Ok(removed)
    }

    pub fn replace(&mut self, scope: Scope, path: &[usize], cmd: Command) -> Result<Command, SessionError> {
        self.check_command(scope, &cmd)?;
        let node = node_mut(&mut self.program, scope, path).ok_or_else(|| SessionError::BadPath(path.to_vec()))?;
        let old = std::mem::replace(node, cmd);
        self.edited();
        Ok(old)
    }

    /// Set a loop's count or a move's distance (a distance of 0 becomes 1).
    pub fn set_count(&mut self, scope: Scope, path: &[usize], n: u32) -> Result<(), SessionError> {
        self.check_editable()?;
        let node = node_mut(&mut self.program, scope, path).ok_or_else(|| SessionError::BadPath(path.to_vec()))?;
        match node {
            Command::BoundedRepeat { count, .. } => *count = n,
            Command::Move { distance } => *distance = n.max(1),
            _ => return Err(SessionError::NoCount(path.to_vec())),
        }
        self.edited();
        Ok(())
    }

    pub fn clear(&mut self, scope: Scope) -> Result<(), SessionError> {
        self.check_editable()?;
        match scope {
            Scope::Main => self.program.main.clear(),
            Scope::Pattern => self.program.pattern.clear(),
        }
        self.edited();
        Ok(())
    }

    /// Replace the whole program (e.g. loaded from a file).
    pub fn set_program(&mut self, program: Program) -> Result<(), SessionError> {
        self.check_editable()?;
        for cmd in &program.main {
            self.check_command(Scope::Main, cmd)?;
        }
        for cmd in &program.pattern {
            self.check_command(Scope::Pattern, cmd)?;
        }
        self.program = program;
        self.edited();
        Ok(())
    }

    pub fn set_rule(&mut self, color: Color, action: RuleAction) -> Result<(), SessionError> {
        self.check_editable()?;
        if self.level.mode != Mode::Rules {
            return Err(SessionError::ProgramLevel);
        }
        self.rules.set(color, action);
        self.edited();
        Ok(())
    }

    /// Step a color's rule to the next action.
    pub fn cycle_rule(&mut self, color: Color) -> Result<RuleAction, SessionError> {
        let next = self.rules.get(color).cycle();
        self.set_rule(color, next)?;
        Ok(next)
    }

    fn check_editable(&self) -> Result<(), SessionError> {
        if self.is_running() {
            return Err(SessionError::Running);
        }
        Ok(())
    }

    fn check_command(&self, scope: Scope, cmd: &Command) -> Result<(), SessionError> {
        self.check_editable()?;
        if self.level.mode == Mode::Rules {
            return Err(SessionError::RulesLevel);
        }
        if scope == Scope::Pattern && cmd.calls_pattern() {
            return Err(SessionError::CallInPattern);
        }
        let mut kinds: Vec<CommandKind> = vec![];
        cmd.kinds(&mut kinds);
        if let Some(kind) = kinds.into_iter().find(|k| !self.level.allows(*k)) {
            return Err(SessionError::NotInPalette(kind.name()));
        }
        Ok(())
    }

    /// A finished run's verdict no longer describes the edited program.
    fn edited(&mut self) {
        if self.verdict.take().is_some() {
            self.world = World::from_level(&self.level, self.limits.water_capacity);
            self.cursor = None;
            self.crash_step = None;
            self.message = self.level.hint.clone();
        }
    }
}

fn sequence_mut<'p>(program: &'p mut Program, scope: Scope, parent: &[usize]) -> Option<&'p mut Vec<Command>> {
    let mut seq = match scope {
        Scope::Main => &mut program.main,
        Scope::Pattern => &mut program.pattern,
    };
    for &i in parent {
        seq = seq.get_mut(i)?.body_mut()?;
    }
    Some(seq)
}

fn node_mut<'p>(program: &'p mut Program, scope: Scope, path: &[usize]) -> Option<&'p mut Command> {
    let (&index, parent) = path.split_last()?;
    sequence_mut(program, scope, parent)?.get_mut(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::robot::Facing;
    use crate::sim::level::parse_level;

    fn session(text: &str) -> Session {
        Session::new(parse_level(text, "test").unwrap(), Limits::default())
    }

    fn open_level() -> Session {
        session("@ code move\n.....\nS.F..\n.....")
    }

    #[test]
    fn new_session_loads_initial_code() {
        let s = open_level();
        assert_eq!(s.program().main, vec![Command::forward(1)]);
        assert_eq!(s.verdict(), None);
        assert!(!s.is_running());
    }

    #[test]
    fn run_to_end_reports_verdict() {
        let mut s = open_level();
        assert_eq!(s.run_to_end(), Ok(Verdict::Exhausted));
        s.push(Scope::Main, &[], Command::forward(1)).unwrap();
        assert_eq!(s.run_to_end(), Ok(Verdict::Win));
        assert_eq!(s.world().robot.pos(), (2, 1));
        assert_eq!(s.message(), "Goal reached!");
    }

    #[test]
    fn edits_rejected_while_running() {
        let mut s = open_level();
        s.start().unwrap();
        assert!(s.is_running());
        assert_eq!(s.push(Scope::Main, &[], Command::TurnLeft), Err(SessionError::Running));
        assert_eq!(s.remove(Scope::Main, &[0]), Err(SessionError::Running));
        assert_eq!(s.clear(Scope::Pattern), Err(SessionError::Running));
        assert_eq!(s.start(), Err(SessionError::Running));
        s.reset();
        assert!(!s.is_running());
        assert!(s.push(Scope::Main, &[], Command::TurnLeft).is_ok());
    }

    #[test]
    fn stepping_updates_world_and_cursor() {
        let mut s = open_level();
        s.set_program(Program::new(vec![Command::forward(2)])).unwrap();
        s.start().unwrap();
        let first = s.step().unwrap();
        assert_eq!(first.world.robot.pos(), (1, 1));
        assert_eq!(s.world().robot.pos(), (1, 1));
        assert_eq!(s.cursor().map(|c| c.path.clone()), Some(vec![0]));
        s.step().unwrap();
        assert!(!s.is_running());
        assert_eq!(s.verdict(), Some(Verdict::Win));
    }

    #[test]
    fn crash_reports_step_number() {
        let mut s = session(".....\nS.W.F\n.....");
        s.set_program(Program::new(vec![Command::TurnLeft, Command::TurnRight, Command::forward(3)]))
            .unwrap();
        assert_eq!(s.run_to_end(), Ok(Verdict::Crash));
        assert_eq!(s.crash_step(), Some(2));
        assert_eq!(s.message(), "Crashed at step 3.");
        assert_eq!(s.world().robot.pos(), (1, 1));
    }

    #[test]
    fn nested_editing_by_path() {
        let mut s = open_level();
        s.clear(Scope::Main).unwrap();
        s.push(Scope::Main, &[], Command::repeat(2, vec![])).unwrap();
        s.push(Scope::Main, &[0], Command::forward(1)).unwrap();
        s.insert(Scope::Main, &[0, 0], Command::TurnLeft).unwrap();
        s.set_count(Scope::Main, &[0], 5).unwrap();
        s.set_count(Scope::Main, &[0, 1], 0).unwrap();
        assert_eq!(
            s.program().main,
            vec![Command::repeat(5, vec![Command::TurnLeft, Command::forward(1)])]
        );
        assert_eq!(s.replace(Scope::Main, &[0, 0], Command::TurnRight), Ok(Command::TurnLeft));
        assert_eq!(s.remove(Scope::Main, &[0, 1]), Ok(Command::forward(1)));
        assert_eq!(s.set_count(Scope::Main, &[0, 0], 3), Err(SessionError::NoCount(vec![0, 0])));
        assert_eq!(s.push(Scope::Main, &[0, 0], Command::Pick), Err(SessionError::BadPath(vec![0, 0])));
        assert_eq!(s.remove(Scope::Main, &[4]), Err(SessionError::BadPath(vec![4])));
        assert_eq!(s.insert(Scope::Main, &[], Command::Pick), Err(SessionError::BadPath(vec![])));
    }

    #[test]
    fn palette_and_pattern_rules() {
        let mut s = session("@ palette move loop callPattern\nS.F");
        assert_eq!(s.push(Scope::Main, &[], Command::TurnLeft), Err(SessionError::NotInPalette("turnLeft")));
        assert_eq!(
            s.push(Scope::Main, &[], Command::repeat(2, vec![Command::Pick])),
            Err(SessionError::NotInPalette("pick"))
        );
        assert_eq!(s.push(Scope::Pattern, &[], Command::CallPattern), Err(SessionError::CallInPattern));
        s.push(Scope::Pattern, &[], Command::forward(1)).unwrap();
        s.push(Scope::Main, &[], Command::CallPattern).unwrap();
        s.push(Scope::Main, &[], Command::CallPattern).unwrap();
        assert_eq!(s.run_to_end(), Ok(Verdict::Win));
    }

    #[test]
    fn rules_level_rejects_program_edits() {
        let mut s = session("@ mode rules\n.....\nS.R..\n..F..");
        assert_eq!(s.push(Scope::Main, &[], Command::forward(1)), Err(SessionError::RulesLevel));
        assert_eq!(s.run_to_end(), Ok(Verdict::Crash));
        assert_eq!(s.cycle_rule(Color::Red), Ok(RuleAction::TurnRight));
        assert_eq!(s.run_to_end(), Ok(Verdict::Win));

        let mut p = open_level();
        assert_eq!(p.set_rule(Color::Red, RuleAction::TurnLeft), Err(SessionError::ProgramLevel));
    }

    #[test]
    fn reset_is_idempotent_and_keeps_program() {
        let mut s = open_level();
        s.push(Scope::Main, &[], Command::TurnLeft).unwrap();
        s.start().unwrap();
        s.step();
        s.reset();
        let once = (s.world().clone(), s.program().clone(), s.verdict());
        s.reset();
        assert_eq!((s.world().clone(), s.program().clone(), s.verdict()), once);
        assert_eq!(s.world().robot.pos(), (0, 1));
        assert_eq!(s.world().robot.facing, Facing::Right);
        assert_eq!(s.program().main.len(), 2);
    }

    #[test]
    fn reset_level_restores_everything() {
        let mut s = session("@ mode rules\nS.R\n..F");
        s.set_rule(Color::Blue, RuleAction::UTurn).unwrap();
        s.reset_level();
        assert_eq!(s.rules(), ColorRules::default());

        let mut p = session("@ code move\nS.F");
        assert!(p.program().pattern.is_empty());
        p.push(Scope::Pattern, &[], Command::TurnLeft).unwrap();
        p.clear(Scope::Main).unwrap();
        p.reset_level();
        assert_eq!(p.program(), &Program::new(vec![Command::forward(1)]));
    }

    #[test]
    fn editing_after_a_run_clears_the_verdict() {
        let mut s = open_level();
        s.run_to_end().unwrap();
        assert!(s.verdict().is_some());
        s.push(Scope::Main, &[], Command::forward(1)).unwrap();
        assert_eq!(s.verdict(), None);
        assert_eq!(s.world().robot.pos(), (0, 1));
    }
}
