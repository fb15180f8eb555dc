/// Program text format.
///
/// ```text
/// # comment to end of line
/// move 2; left
/// loop 3 { move; right }
/// while { move }
/// call
/// pattern { move; move }
/// ```
///
/// Commands are separated by whitespace, `;` or newlines. `move` takes an
/// optional distance (default 1), `loop` a required count. At most one
/// `pattern { ... }` block may appear, at the top level; it fills the
/// subroutine buffer and may not contain `call`.
///
/// `Display` on `Program` prints this format back; the output parses to an
/// equal program.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::domain::command::{Command, Program};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProgramError {
    #[error("line {line}: unexpected `{found}`")]
    Unexpected { line: usize, found: String },
    #[error("line {line}: unexpected end of input, expected {expected}")]
    UnexpectedEnd { line: usize, expected: &'static str },
    #[error("line {line}: bad number `{text}`")]
    BadNumber { line: usize, text: String },
    #[error("line {line}: `call` is not allowed inside the pattern")]
    CallInPattern { line: usize },
    #[error("line {line}: pattern is defined twice")]
    DuplicatePattern { line: usize },
    #[error("line {line}: pattern block must be at the top level")]
    NestedPattern { line: usize },
    #[error("line {line}: unmatched `}}`")]
    UnmatchedClose { line: usize },
}

pub fn parse(text: &str) -> Result<Program, ProgramError> {
    let mut parser = Parser::new(text);
    let mut program = Program::default();
    let mut seen_pattern = false;

    while let Some(Lexed { token, line }) = parser.next() {
        match token {
            Token::Close => return Err(ProgramError::UnmatchedClose { line }),
            Token::Open => return Err(ProgramError::Unexpected { line, found: "{".into() }),
            Token::Word(w) if w.eq_ignore_ascii_case("pattern") => {
                if seen_pattern {
                    return Err(ProgramError::DuplicatePattern { line });
                }
                parser.expect_open(line)?;
                program.pattern = parser.block(true)?;
                seen_pattern = true;
            }
            Token::Word(w) => {
                let cmd = parser.command(&w, line, false)?;
                program.main.push(cmd);
            }
        }
    }
    Ok(program)
}

impl FromStr for Program {
    type Err = ProgramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// One-line label for a single node, without its body (`move 2`, `loop 3`).
pub fn label(cmd: &Command) -> String {
    match cmd {
        Command::Move { distance } if *distance > 1 => format!("move {}", distance),
        Command::Move { .. } => "move".into(),
        Command::TurnLeft => "left".into(),
        Command::TurnRight => "right".into(),
        Command::Pick => "pick".into(),
        Command::Use => "use".into(),
        Command::CallPattern => "call".into(),
        Command::BoundedRepeat { count, .. } => format!("loop {}", count),
        Command::SensorRepeat { .. } => "while".into(),
    }
}

// ══════════════════════════════════════════════════════════════
// Printing
// ══════════════════════════════════════════════════════════════

const INDENT: &str = "    ";

fn write_seq(f: &mut fmt::Formatter<'_>, seq: &[Command], depth: usize) -> fmt::Result {
    for cmd in seq {
        write!(f, "{}{}", INDENT.repeat(depth), label(cmd))?;
        match cmd.body() {
            Some(body) => {
                writeln!(f, " {{")?;
                write_seq(f, body, depth + 1)?;
                writeln!(f, "{}}}", INDENT.repeat(depth))?;
            }
            None => writeln!(f)?,
        }
    }
    Ok(())
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_seq(f, &self.main, 0)?;
        if !self.pattern.is_empty() {
            writeln!(f, "pattern {{")?;
            write_seq(f, &self.pattern, 1)?;
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}

// ══════════════════════════════════════════════════════════════
// Lexer
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Word(String),
    Open,
    Close,
}

#[derive(Clone, Debug)]
struct Lexed {
    token: Token,
    line: usize,
}

fn flush(word: &mut String, line: usize, out: &mut Vec<Lexed>) {
    if !word.is_empty() {
        out.push(Lexed { token: Token::Word(std::mem::take(word)), line });
    }
}

fn tokenize(text: &str) -> Vec<Lexed> {
    let mut out = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = i + 1;
        let code = raw.split('#').next().unwrap_or("");
        let mut word = String::new();
        for ch in code.chars() {
            match ch {
                '{' => {
                    flush(&mut word, line, &mut out);
                    out.push(Lexed { token: Token::Open, line });
                }
                '}' => {
                    flush(&mut word, line, &mut out);
                    out.push(Lexed { token: Token::Close, line });
                }
                ';' => flush(&mut word, line, &mut out),
                c if c.is_whitespace() => flush(&mut word, line, &mut out),
                c => word.push(c),
            }
        }
        flush(&mut word, line, &mut out);
    }
    out
}

// ══════════════════════════════════════════════════════════════
// Parser
// ══════════════════════════════════════════════════════════════

struct Parser {
    tokens: Vec<Lexed>,
    pos: usize,
    last_line: usize,
}

impl Parser {
    fn new(text: &str) -> Self {
        Parser { tokens: tokenize(text), pos: 0, last_line: 1 }
    }

    fn next(&mut self) -> Option<Lexed> {
        let lexed = self.tokens.get(self.pos).cloned()?;
        self.pos += 1;
        self.last_line = lexed.line;
        Some(lexed)
    }

    fn peek_word(&self) -> Option<&str> {
        match self.tokens.get(self.pos) {
            Some(Lexed { token: Token::Word(w), .. }) => Some(w.as_str()),
            _ => None,
        }
    }

    fn expect_open(&mut self, line: usize) -> Result<(), ProgramError> {
        match self.next() {
            Some(Lexed { token: Token::Open, .. }) => Ok(()),
            Some(Lexed { token: Token::Word(w), line }) => Err(ProgramError::Unexpected { line, found: w }),
            Some(Lexed { token: Token::Close, line }) => Err(ProgramError::Unexpected { line, found: "}".into() }),
            None => Err(ProgramError::UnexpectedEnd { line, expected: "`{`" }),
        }
    }

    fn number(&mut self, line: usize, expected: &'static str) -> Result<u32, ProgramError> {
        match self.next() {
            Some(Lexed { token: Token::Word(w), line }) => {
                w.parse().map_err(|_| ProgramError::BadNumber { line, text: w })
            }
            Some(Lexed { token, line }) => Err(ProgramError::Unexpected {
                line,
                found: if token == Token::Open { "{".into() } else { "}".into() },
            }),
            None => Err(ProgramError::UnexpectedEnd { line, expected }),
        }
    }

    /// Commands up to and including the closing `}`.
    fn block(&mut self, in_pattern: bool) -> Result<Vec<Command>, ProgramError> {
        let mut seq = Vec::new();
        loop {
            match self.next() {
                None => {
                    return Err(ProgramError::UnexpectedEnd { line: self.last_line, expected: "`}`" });
                }
                Some(Lexed { token: Token::Close, .. }) => return Ok(seq),
                Some(Lexed { token: Token::Open, line }) => {
                    return Err(ProgramError::Unexpected { line, found: "{".into() });
                }
                Some(Lexed { token: Token::Word(w), line }) => {
                    if w.eq_ignore_ascii_case("pattern") {
                        return Err(ProgramError::NestedPattern { line });
                    }
                    seq.push(self.command(&w, line, in_pattern)?);
                }
            }
        }
    }

    fn command(&mut self, word: &str, line: usize, in_pattern: bool) -> Result<Command, ProgramError> {
        let cmd = match word.to_ascii_lowercase().as_str() {
            "move" | "forward" => {
                let has_distance = self.peek_word().is_some_and(|w| w.starts_with(|c: char| c.is_ascii_digit()));
                let distance = if has_distance { self.number(line, "distance")? } else { 1 };
                Command::forward(distance)
            }
            "left" | "turnleft" => Command::TurnLeft,
            "right" | "turnright" => Command::TurnRight,
            "pick" => Command::Pick,
            "use" => Command::Use,
            "call" | "callpattern" => {
                if in_pattern {
                    return Err(ProgramError::CallInPattern { line });
                }
                Command::CallPattern
            }
            "loop" | "repeat" => {
                let count = self.number(line, "loop count")?;
                self.expect_open(line)?;
                Command::repeat(count, self.block(in_pattern)?)
            }
            "while" => {
                self.expect_open(line)?;
                Command::until_blocked(self.block(in_pattern)?)
            }
            _ => return Err(ProgramError::Unexpected { line, found: word.to_string() }),
        };
        Ok(cmd)
    }
}
