/// Keyboard program editor.
///
/// Commands are appended to the end of the sequence being recorded. Opening
/// a loop (`(` or `w`) appends an empty loop and moves recording into its
/// body; `)` closes it again. `+`/`-` adjust the count of the last command
/// (a loop's repetitions or a move's distance), Backspace removes it.
///
/// All edits go through `Session`, so palette and pattern checks apply.

use crossterm::event::KeyCode;

use crate::domain::command::Command;
use crate::domain::tile::Color;
use crate::sim::exec::{self, Scope};
use crate::sim::program;
use crate::sim::session::{Session, SessionError};

/// Default repetitions of a freshly opened loop.
const NEW_LOOP_COUNT: u32 = 2;
const MAX_COUNT: u32 = 99;

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Edit {
    Add(Command),
    OpenLoop,
    OpenWhile,
    CloseLoop,
    Bump(i32),
    Undo,
    Clear,
    SwitchBuffer,
    CycleRule(Color),
}

impl Edit {
    pub fn from_key(code: KeyCode) -> Option<Edit> {
        let edit = match code {
            KeyCode::Char('f') | KeyCode::Char('m') => Edit::Add(Command::forward(1)),
            KeyCode::Char('a') => Edit::Add(Command::TurnLeft),
            KeyCode::Char('d') => Edit::Add(Command::TurnRight),
            KeyCode::Char('p') => Edit::Add(Command::Pick),
            KeyCode::Char('u') => Edit::Add(Command::Use),
            KeyCode::Char('c') => Edit::Add(Command::CallPattern),
            KeyCode::Char('(') | KeyCode::Char('[') => Edit::OpenLoop,
            KeyCode::Char('w') => Edit::OpenWhile,
            KeyCode::Char(')') | KeyCode::Char(']') => Edit::CloseLoop,
            KeyCode::Char('+') | KeyCode::Char('=') => Edit::Bump(1),
            KeyCode::Char('-') | KeyCode::Char('_') => Edit::Bump(-1),
            KeyCode::Backspace => Edit::Undo,
            KeyCode::Delete | KeyCode::Char('x') => Edit::Clear,
            KeyCode::Tab | KeyCode::BackTab => Edit::SwitchBuffer,
            KeyCode::Char('1') => Edit::CycleRule(Color::Red),
            KeyCode::Char('2') => Edit::CycleRule(Color::Blue),
            KeyCode::Char('3') => Edit::CycleRule(Color::Yellow),
            _ => return None,
        };
        Some(edit)
    }
}

/// One printed line of a program listing.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Line {
    /// Node this line belongs to; None for a closing brace.
    pub path: Option<Vec<usize>>,
    pub depth: usize,
    pub text: String,
}

pub struct Editor {
    scope: Scope,
    /// Path of the loop currently being recorded into (`[]` = buffer root).
    open: Vec<usize>,
}

impl Editor {
    pub fn new() -> Self {
        Editor { scope: Scope::Main, open: vec![] }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Path of the innermost open loop, empty at the root.
    pub fn open_path(&self) -> &[usize] {
        &self.open
    }

    /// Forget recording state, e.g. after the program was replaced.
    pub fn reset(&mut self) {
        self.scope = Scope::Main;
        self.open.clear();
    }

    pub fn apply(&mut self, session: &mut Session, edit: Edit) -> Result<(), SessionError> {
        self.revalidate(session);
        match edit {
            Edit::Add(cmd) => session.push(self.scope, &self.open, cmd),
            Edit::OpenLoop => self.open_loop(session, Command::repeat(NEW_LOOP_COUNT, vec![])),
            Edit::OpenWhile => self.open_loop(session, Command::until_blocked(vec![])),
            Edit::CloseLoop => {
                self.open.pop();
                Ok(())
            }
            Edit::Bump(delta) => self.bump(session, delta),
            Edit::Undo => self.undo(session),
            Edit::Clear => {
                session.clear(self.scope)?;
                self.open.clear();
                Ok(())
            }
            Edit::SwitchBuffer => {
                self.scope = match self.scope {
                    Scope::Main => Scope::Pattern,
                    Scope::Pattern => Scope::Main,
                };
                self.open.clear();
                Ok(())
            }
            Edit::CycleRule(color) => session.cycle_rule(color).map(|_| ()),
        }
    }

    fn open_loop(&mut self, session: &mut Session, cmd: Command) -> Result<(), SessionError> {
        let index = self.current_len(session);
        session.push(self.scope, &self.open, cmd)?;
        self.open.push(index);
        Ok(())
    }

    /// Adjust the last command of the open sequence, or the open loop itself
    /// while its body is still empty.
    fn bump(&mut self, session: &mut Session, delta: i32) -> Result<(), SessionError> {
        let len = self.current_len(session);
        let path = if len > 0 {
            let mut p = self.open.clone();
            p.push(len - 1);
            p
        } else {
            self.open.clone()
        };
        let current = node(session, self.scope, &path).and_then(count_of);
        let Some(current) = current else {
            return Err(SessionError::NoCount(path));
        };
        let next = (current as i64 + delta as i64).clamp(0, MAX_COUNT as i64) as u32;
        session.set_count(self.scope, &path, next)
    }

    fn undo(&mut self, session: &mut Session) -> Result<(), SessionError> {
        let len = self.current_len(session);
        if len > 0 {
            let mut path = self.open.clone();
            path.push(len - 1);
            session.remove(self.scope, &path)?;
        } else if !self.open.is_empty() {
            session.remove(self.scope, &self.open)?;
            self.open.pop();
        }
        Ok(())
    }

    fn current_len(&self, session: &Session) -> usize {
        exec::sequence(session.program(), self.scope, &self.open).map_or(0, |s| s.len())
    }

    /// Drop open loops that no longer exist (the program was reset or loaded).
    fn revalidate(&mut self, session: &Session) {
        while !self.open.is_empty()
            && exec::sequence(session.program(), self.scope, &self.open).is_none()
        {
            self.open.pop();
        }
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

fn node<'s>(session: &'s Session, scope: Scope, path: &[usize]) -> Option<&'s Command> {
    let (&last, parent) = path.split_last()?;
    exec::sequence(session.program(), scope, parent)?.get(last)
}

fn count_of(cmd: &Command) -> Option<u32> {
    match cmd {
        Command::Move { distance } => Some(*distance),
        Command::BoundedRepeat { count, .. } => Some(*count),
        _ => None,
    }
}

/// Flatten a command tree into indented lines, loops closed by `}`.
pub fn listing(cmds: &[Command]) -> Vec<Line> {
    let mut out = vec![];
    flatten(cmds, &mut vec![], 0, &mut out);
    out
}

fn flatten(cmds: &[Command], path: &mut Vec<usize>, depth: usize, out: &mut Vec<Line>) {
    for (i, cmd) in cmds.iter().enumerate() {
        path.push(i);
        match cmd.body() {
            Some(body) => {
                out.push(Line { path: Some(path.clone()), depth, text: format!("{} {{", program::label(cmd)) });
                flatten(body, path, depth + 1, out);
                out.push(Line { path: None, depth, text: "}".into() });
            }
            None => out.push(Line { path: Some(path.clone()), depth, text: program::label(cmd) }),
        }
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::color_rule::RuleAction;
    use crate::sim::interpreter::Limits;
    use crate::sim::level::parse_level;

    fn session(text: &str) -> Session {
        Session::new(parse_level(text, "t").unwrap(), Limits::default())
    }

    fn key(c: char) -> Edit {
        Edit::from_key(KeyCode::Char(c)).unwrap()
    }

    #[test]
    fn records_nested_loops() {
        let mut s = session("S....F");
        let mut ed = Editor::new();
        for c in "f(f+a)d".chars() {
            ed.apply(&mut s, key(c)).unwrap();
        }
        assert_eq!(
            s.program().main,
            vec![
                Command::forward(1),
                Command::repeat(2, vec![Command::forward(2), Command::TurnLeft]),
                Command::TurnRight,
            ]
        );
        assert!(ed.open_path().is_empty());
    }

    #[test]
    fn bump_adjusts_empty_open_loop() {
        let mut s = session("S....F");
        let mut ed = Editor::new();
        ed.apply(&mut s, Edit::OpenLoop).unwrap();
        ed.apply(&mut s, Edit::Bump(3)).unwrap();
        ed.apply(&mut s, Edit::Bump(-10)).unwrap();
        assert_eq!(s.program().main, vec![Command::repeat(0, vec![])]);
        assert_eq!(ed.open_path(), &[0]);
    }

    #[test]
    fn bump_on_turn_has_no_count() {
        let mut s = session("S....F");
        let mut ed = Editor::new();
        ed.apply(&mut s, key('a')).unwrap();
        assert_eq!(ed.apply(&mut s, Edit::Bump(1)), Err(SessionError::NoCount(vec![0])));
    }

    #[test]
    fn undo_walks_out_of_empty_loop() {
        let mut s = session("S....F");
        let mut ed = Editor::new();
        for c in "fw".chars() {
            ed.apply(&mut s, key(c)).unwrap();
        }
        ed.apply(&mut s, Edit::Undo).unwrap();
        assert!(ed.open_path().is_empty());
        assert_eq!(s.program().main, vec![Command::forward(1)]);
        ed.apply(&mut s, Edit::Undo).unwrap();
        assert!(s.program().main.is_empty());
        ed.apply(&mut s, Edit::Undo).unwrap();
    }

    #[test]
    fn pattern_buffer_rejects_call() {
        let mut s = session("S....F");
        let mut ed = Editor::new();
        ed.apply(&mut s, Edit::SwitchBuffer).unwrap();
        assert_eq!(ed.scope(), Scope::Pattern);
        assert_eq!(ed.apply(&mut s, key('c')), Err(SessionError::CallInPattern));
        ed.apply(&mut s, key('f')).unwrap();
        assert_eq!(s.program().pattern, vec![Command::forward(1)]);
    }

    #[test]
    fn rule_keys_cycle_colors() {
        let mut s = session("@ mode rules\nS.R.F");
        let mut ed = Editor::new();
        ed.apply(&mut s, key('1')).unwrap();
        ed.apply(&mut s, key('1')).unwrap();
        assert_eq!(s.rules().get(Color::Red), RuleAction::TurnLeft);
        assert_eq!(ed.apply(&mut s, key('f')), Err(SessionError::RulesLevel));
    }

    #[test]
    fn reset_level_drops_stale_open_loop() {
        let mut s = session("S....F");
        let mut ed = Editor::new();
        ed.apply(&mut s, Edit::OpenLoop).unwrap();
        s.reset_level();
        ed.apply(&mut s, key('f')).unwrap();
        assert_eq!(s.program().main, vec![Command::forward(1)]);
    }

    #[test]
    fn listing_marks_paths() {
        let cmds = vec![
            Command::TurnRight,
            Command::repeat(3, vec![Command::forward(2)]),
        ];
        let lines = listing(&cmds);
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, ["right", "loop 3 {", "move 2", "}"]);
        assert_eq!(lines[2].path, Some(vec![1, 0]));
        assert_eq!(lines[2].depth, 1);
        assert_eq!(lines[3].path, None);
    }
}
