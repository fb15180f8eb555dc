/// Command tree: the program a player hands to the robot.
///
/// A program is an ordered sequence of `Command`s plus one shared
/// subroutine buffer (the "pattern"). Loop bodies nest without limit;
/// the pattern may never contain `CallPattern`, so a call cannot recurse.

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Command {
    /// Move forward `distance` cells. Zero is treated as one.
    Move { distance: u32 },
    TurnLeft,
    TurnRight,
    Pick,
    Use,
    CallPattern,
    /// Run `body` exactly `count` times (zero = skip).
    BoundedRepeat { count: u32, body: Vec<Command> },
    /// Run `body` until the cell ahead is blocked, capped by the sensor bound.
    SensorRepeat { body: Vec<Command> },
}

/// Palette entry: what kind of block a command is, ignoring parameters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CommandKind {
    Move,
    TurnLeft,
    TurnRight,
    Pick,
    Use,
    CallPattern,
    Loop,
    While,
}

impl CommandKind {
    pub const ALL: [CommandKind; 8] = [
        CommandKind::Move,
        CommandKind::TurnLeft,
        CommandKind::TurnRight,
        CommandKind::Pick,
        CommandKind::Use,
        CommandKind::CallPattern,
        CommandKind::Loop,
        CommandKind::While,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Move => "move",
            CommandKind::TurnLeft => "turnLeft",
            CommandKind::TurnRight => "turnRight",
            CommandKind::Pick => "pick",
            CommandKind::Use => "use",
            CommandKind::CallPattern => "callPattern",
            CommandKind::Loop => "loop",
            CommandKind::While => "while",
        }
    }

    pub fn from_name(s: &str) -> Option<CommandKind> {
        CommandKind::ALL.iter().copied().find(|k| k.name().eq_ignore_ascii_case(s))
    }
}

/// Atomic instruction understood by the step evaluator.
/// `Step` is exactly one unit of a `Move`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Primitive {
    Step,
    TurnLeft,
    TurnRight,
    Pick,
    Use,
}

impl Command {
    pub fn forward(distance: u32) -> Command {
        Command::Move { distance: distance.max(1) }
    }

    pub fn repeat(count: u32, body: Vec<Command>) -> Command {
        Command::BoundedRepeat { count, body }
    }

    pub fn until_blocked(body: Vec<Command>) -> Command {
        Command::SensorRepeat { body }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Move { .. } => CommandKind::Move,
            Command::TurnLeft => CommandKind::TurnLeft,
            Command::TurnRight => CommandKind::TurnRight,
            Command::Pick => CommandKind::Pick,
            Command::Use => CommandKind::Use,
            Command::CallPattern => CommandKind::CallPattern,
            Command::BoundedRepeat { .. } => CommandKind::Loop,
            Command::SensorRepeat { .. } => CommandKind::While,
        }
    }

    /// Primitive for non-move leaf commands. `Move` is expanded by the
    /// caller into `distance` single steps.
    pub fn primitive(&self) -> Option<Primitive> {
        match self {
            Command::TurnLeft => Some(Primitive::TurnLeft),
            Command::TurnRight => Some(Primitive::TurnRight),
            Command::Pick => Some(Primitive::Pick),
            Command::Use => Some(Primitive::Use),
            _ => None,
        }
    }

    /// Loop body, if this command has one.
    pub fn body(&self) -> Option<&[Command]> {
        match self {
            Command::BoundedRepeat { body, .. } | Command::SensorRepeat { body } => Some(body.as_slice()),
            _ => None,
        }
    }

    pub fn body_mut(&mut self) -> Option<&mut Vec<Command>> {
        match self {
            Command::BoundedRepeat { body, .. } | Command::SensorRepeat { body } => Some(body),
            _ => None,
        }
    }

    /// Does this command (or anything nested in it) call the pattern?
    pub fn calls_pattern(&self) -> bool {
        match self {
            Command::CallPattern => true,
            _ => self.body().map_or(false, |b| b.iter().any(Command::calls_pattern)),
        }
    }

    /// Every kind used by this command, nested ones included.
    pub fn kinds(&self, out: &mut Vec<CommandKind>) {
        out.push(self.kind());
        if let Some(body) = self.body() {
            for c in body {
                c.kinds(out);
            }
        }
    }
}

/// Main sequence plus the single subroutine slot.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Program {
    pub main: Vec<Command>,
    pub pattern: Vec<Command>,
}

impl Program {
    pub fn new(main: Vec<Command>) -> Self {
        Program { main, pattern: vec![] }
    }

    pub fn with_pattern(mut self, pattern: Vec<Command>) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.main.is_empty()
    }

    /// A pattern that calls itself would recurse.
    pub fn pattern_is_valid(&self) -> bool {
        !self.pattern.iter().any(Command::calls_pattern)
    }
}
