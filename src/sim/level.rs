/// Level loader with pack support.
///
/// ## Sources (in list order):
///   1. Built-in pack, embedded in the binary
///   2. `levels/` directory (individual `.txt` files, sorted by file name)
///
/// ## Pack format:
///   ```text
///   ## Pack Name
///   ## Author: name
///   ---
///   # Level 1 - First Steps
///   @ id mars-1
///   @ facing right
///   <map rows>
///   ---
///   # Level 2 - ...
///   ```
///
/// Levels are separated by a line containing only `---`.
/// Pack metadata lines start with `##` and come before the first `---`.
///
/// ## Single-level format (`.txt`):
///   First `#` line: level name (later `#` lines are comments)
///   `@ key value` metadata lines:
///     id, category, facing (up/right/down/left), mode (program/rules),
///     palette (command names), hint, code (program text, may repeat),
///     size (logical N×N grid)
///   Remaining lines: map rows
///
/// ## Tile legend:
///   '.' = Floor         'W' = Wall
///   'S' = Start         'F' = Goal (flag)
///   'R' = Red / fire    'B' = Blue / water
///   'Y' = Yellow / key  'D' = Door (locked)
///   'O' = Door (open)   ' ' = Floor
///
/// Jagged rows are padded with floor to the widest row. With `@ size N`
/// the grid is then cropped (or padded) to exactly N×N.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;

use crate::domain::command::{CommandKind, Program};
use crate::domain::robot::Facing;
use crate::domain::tile::Tile;
use crate::sim::program::{self, ProgramError};

const BUILTIN_PACK: &str = include_str!("../../levels/builtin.pack");

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level {level}: unknown glyph {ch:?} at row {row}, column {col}")]
    UnknownGlyph { level: String, row: usize, col: usize, ch: char },
    #[error("level {0}: no start tile")]
    MissingStart(String),
    #[error("level {0}: more than one start tile")]
    MultipleStarts(String),
    #[error("level {0}: empty grid")]
    EmptyGrid(String),
    #[error("level {level}: bad `@ {key}` value {value:?}")]
    BadMetadata { level: String, key: String, value: String },
    #[error("level {level}: bad initial code")]
    BadCode {
        level: String,
        #[source]
        source: ProgramError,
    },
    #[error("unknown level {0:?}")]
    UnknownLevel(String),
    #[error("cannot read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// How a level is played.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Mode {
    /// The player writes a command tree.
    #[default]
    Program,
    /// The player sets color rules; the robot moves by itself.
    Rules,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Program => "program",
            Mode::Rules => "rules",
        }
    }

    pub fn from_name(s: &str) -> Option<Mode> {
        match s.trim().to_ascii_lowercase().as_str() {
            "program" | "code" => Some(Mode::Program),
            "rules" | "logic" => Some(Mode::Rules),
            _ => None,
        }
    }
}

/// Immutable level data. Worlds are built from it and never write back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Level {
    pub id: String,
    pub name: String,
    pub category: String,
    pub hint: String,
    pub facing: Facing,
    pub mode: Mode,
    /// Command kinds the player may use; empty allows all.
    pub palette: Vec<CommandKind>,
    /// Program loaded on level start and on `reset_level`.
    pub code: Program,
    pub tiles: Vec<Vec<Tile>>,
    pub width: usize,
    pub height: usize,
    pub start: (usize, usize),
}

impl Level {
    /// Level from bare map rows with default metadata.
    pub fn from_rows(id: &str, rows: &[&str], facing: Facing) -> Result<Level, LevelError> {
        let grid = build_grid(id, rows, None)?;
        Ok(Level {
            id: id.to_string(),
            name: id.to_string(),
            category: String::new(),
            hint: String::new(),
            facing,
            mode: Mode::Program,
            palette: Vec::new(),
            code: Program::default(),
            tiles: grid.tiles,
            width: grid.width,
            height: grid.height,
            start: grid.start,
        })
    }

    pub fn allows(&self, kind: CommandKind) -> bool {
        self.palette.is_empty() || self.palette.contains(&kind)
    }
}

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

/// Every level available to the game, in list order.
#[derive(Clone, Debug, Default)]
pub struct LevelSet {
    pub levels: Vec<Level>,
}

impl LevelSet {
    /// Built-in pack followed by `*.txt` files in `dir` (if it exists).
    pub fn load(dir: &Path) -> LevelSet {
        let mut set = LevelSet::builtin();
        if dir.is_dir() {
            for level in load_from_directory(dir) {
                if set.levels.iter().any(|l| l.id == level.id) {
                    warn!("{}: duplicate level id {:?}, skipped", dir.display(), level.id);
                    continue;
                }
                set.levels.push(level);
            }
        }
        debug!("{} levels available", set.levels.len());
        set
    }

    pub fn builtin() -> LevelSet {
        if let Some(name) = pack_name(BUILTIN_PACK) {
            debug!("built-in pack: {name}");
        }
        LevelSet { levels: parse_pack_levels(BUILTIN_PACK, "builtin") }
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Level> {
        self.levels.get(index)
    }

    /// Look a level up by id, 1-based list number, or name (case-insensitive).
    pub fn find(&self, key: &str) -> Result<&Level, LevelError> {
        let key = key.trim();
        if let Some(level) = self.levels.iter().find(|l| l.id == key) {
            return Ok(level);
        }
        if let Ok(n) = key.parse::<usize>() {
            if let Some(level) = n.checked_sub(1).and_then(|i| self.levels.get(i)) {
                return Ok(level);
            }
        }
        self.levels
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(key))
            .ok_or_else(|| LevelError::UnknownLevel(key.to_string()))
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.levels.iter().position(|l| l.id == id)
    }
}

/// Read and parse one level file. The file stem is the default id.
pub fn read_level_file(path: &Path) -> Result<Level, LevelError> {
    let content = std::fs::read_to_string(path)
        .map_err(|source| LevelError::Io { path: path.to_path_buf(), source })?;
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    parse_level(&content, &stem)
}

// ══════════════════════════════════════════════════════════════
// Pack parsing
// ══════════════════════════════════════════════════════════════

/// Parse all levels from pack text. Broken sections are logged and skipped.
pub fn parse_pack_levels(content: &str, source: &str) -> Vec<Level> {
    let mut sections: Vec<String> = vec![];
    let mut current = String::new();
    let mut in_levels = false;

    for line in content.lines() {
        if line.trim() == "---" {
            if in_levels && !current.trim().is_empty() {
                sections.push(std::mem::take(&mut current));
            }
            current.clear();
            in_levels = true;
            continue;
        }
        if !in_levels {
            // Pack metadata before the first ---
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    if in_levels && !current.trim().is_empty() {
        sections.push(current);
    }

    let mut levels = vec![];
    for (i, section) in sections.iter().enumerate() {
        let default_id = format!("{}-{}", source, i + 1);
        match parse_level(section, &default_id) {
            Ok(level) => levels.push(level),
            Err(e) => warn!("{}: level {} skipped: {}", source, i + 1, e),
        }
    }
    levels
}

/// `## Name` line of a pack header, if any.
pub fn pack_name(content: &str) -> Option<String> {
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed == "---" {
            break;
        }
        if let Some(rest) = trimmed.strip_prefix("##") {
            let rest = rest.trim();
            if !rest.contains(':') && !rest.is_empty() {
                return Some(rest.to_string());
            }
        }
    }
    None
}

// ══════════════════════════════════════════════════════════════
// Single-level parsing
// ══════════════════════════════════════════════════════════════

/// Parse a single level from text content.
pub fn parse_level(content: &str, default_id: &str) -> Result<Level, LevelError> {
    let mut name = String::new();
    let mut meta: Vec<(String, String)> = vec![];
    let mut rows: Vec<&str> = vec![];

    for line in content.lines() {
        if line.starts_with('#') {
            if name.is_empty() && is_name_line(line) {
                name = line[1..].trim().to_string();
            }
        } else if let Some(rest) = line.strip_prefix("@ ") {
            let rest = rest.trim();
            let (key, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            meta.push((key.to_ascii_lowercase(), value.trim().to_string()));
        } else {
            // Spaces are floor, so only wholly empty lines are padding.
            rows.push(line);
        }
    }

    while rows.first().is_some_and(|r| r.is_empty()) {
        rows.remove(0);
    }
    while rows.last().is_some_and(|r| r.is_empty()) {
        rows.pop();
    }

    let id = meta
        .iter()
        .find(|(k, _)| k == "id")
        .map_or_else(|| default_id.to_string(), |(_, v)| v.clone());
    let bad = |key: &str, value: &str| LevelError::BadMetadata {
        level: id.clone(),
        key: key.to_string(),
        value: value.to_string(),
    };

    let mut category = String::new();
    let mut hint = String::new();
    let mut facing = Facing::Right;
    let mut mode = Mode::Program;
    let mut palette = vec![];
    let mut code = String::new();
    let mut size = None;

    for (key, value) in &meta {
        match key.as_str() {
            "id" => {}
            "category" => category = value.clone(),
            "hint" => {
                if !hint.is_empty() {
                    hint.push('\n');
                }
                hint.push_str(value);
            }
            "facing" => facing = Facing::from_name(value).ok_or_else(|| bad(key, value))?,
            "mode" => mode = Mode::from_name(value).ok_or_else(|| bad(key, value))?,
            "palette" => {
                for word in value.split_whitespace() {
                    let kind = CommandKind::from_name(word).ok_or_else(|| bad(key, word))?;
                    if !palette.contains(&kind) {
                        palette.push(kind);
                    }
                }
            }
            "code" => {
                code.push_str(value);
                code.push('\n');
            }
            "size" => match value.parse::<usize>() {
                Ok(n) if n > 0 => size = Some(n),
                _ => return Err(bad(key, value)),
            },
            other => warn!("level {}: unknown metadata `@ {}` ignored", id, other),
        }
    }

    let code = program::parse(&code).map_err(|source| LevelError::BadCode { level: id.clone(), source })?;
    let grid = build_grid(&id, &rows, size)?;

    if name.is_empty() {
        name = id.clone();
    }

    Ok(Level {
        id,
        name,
        category,
        hint,
        facing,
        mode,
        palette,
        code,
        tiles: grid.tiles,
        width: grid.width,
        height: grid.height,
        start: grid.start,
    })
}

/// A name line starts with `#` and contains at least one letter.
fn is_name_line(line: &str) -> bool {
    line[1..].chars().any(|c| c.is_alphabetic())
}

struct Grid {
    tiles: Vec<Vec<Tile>>,
    width: usize,
    height: usize,
    start: (usize, usize),
}

fn build_grid(id: &str, rows: &[&str], size: Option<usize>) -> Result<Grid, LevelError> {
    let mut tiles: Vec<Vec<Tile>> = Vec::with_capacity(rows.len());
    for (y, row) in rows.iter().enumerate() {
        let mut parsed = Vec::with_capacity(row.len());
        for (x, ch) in row.chars().enumerate() {
            let tile = Tile::from_glyph(ch).ok_or_else(|| LevelError::UnknownGlyph {
                level: id.to_string(),
                row: y + 1,
                col: x + 1,
                ch,
            })?;
            parsed.push(tile);
        }
        tiles.push(parsed);
    }

    let widest = tiles.iter().map(Vec::len).max().unwrap_or(0);
    let (width, height) = match size {
        Some(n) => (n, n),
        None => (widest, tiles.len()),
    };
    if width == 0 || height == 0 {
        return Err(LevelError::EmptyGrid(id.to_string()));
    }

    tiles.resize_with(height, Vec::new);
    for row in &mut tiles {
        row.resize(width, Tile::Floor);
    }

    let mut start = None;
    for (y, row) in tiles.iter().enumerate() {
        for (x, tile) in row.iter().enumerate() {
            if *tile == Tile::Start {
                if start.is_some() {
                    return Err(LevelError::MultipleStarts(id.to_string()));
                }
                start = Some((x, y));
            }
        }
    }
    let start = start.ok_or_else(|| LevelError::MissingStart(id.to_string()))?;

    Ok(Grid { tiles, width, height, start })
}

// ══════════════════════════════════════════════════════════════
// Directory loading (individual .txt files)
// ══════════════════════════════════════════════════════════════

fn load_from_directory(dir: &Path) -> Vec<Level> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!("cannot list {}: {}", dir.display(), e);
            return vec![];
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|e| e == "txt"))
        .collect();
    paths.sort();

    let mut levels = vec![];
    for path in paths {
        match read_level_file(&path) {
            Ok(level) => levels.push(level),
            Err(e) => warn!("{}: {}", path.display(), error_chain(&e)),
        }
    }
    levels
}

/// Error plus its source chain on one line.
fn error_chain(e: &LevelError) -> String {
    let mut text = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(s) = source {
        text.push_str(": ");
        text.push_str(&s.to_string());
        source = s.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::command::Command;

    const SAMPLE: &str = "\
# Level 3 - Key Room
@ id data-x
@ category Data Warehouse
@ facing up
@ palette move turnLeft pick use
@ hint Take the key first.
@ code move; left
@ code pick
.Y...
.W...
S...D.F
.....
";

    #[test]
    fn parses_metadata_and_grid() {
        let level = parse_level(SAMPLE, "fallback").unwrap();
        assert_eq!(level.id, "data-x");
        assert_eq!(level.name, "Level 3 - Key Room");
        assert_eq!(level.category, "Data Warehouse");
        assert_eq!(level.facing, Facing::Up);
        assert_eq!(level.mode, Mode::Program);
        assert_eq!(
            level.palette,
            vec![CommandKind::Move, CommandKind::TurnLeft, CommandKind::Pick, CommandKind::Use]
        );
        assert_eq!(level.code.main, vec![Command::forward(1), Command::TurnLeft, Command::Pick]);
        assert_eq!(level.start, (0, 2));
        // Jagged rows are padded to the widest.
        assert_eq!((level.width, level.height), (7, 4));
        assert_eq!(level.tiles[0][6], Tile::Floor);
        assert_eq!(level.tiles[2][6], Tile::Goal);
    }

    #[test]
    fn size_crops_the_grid() {
        let text = format!("@ size 5\n{}", SAMPLE.lines().skip(8).collect::<Vec<_>>().join("\n"));
        let level = parse_level(&text, "cropped").unwrap();
        assert_eq!((level.width, level.height), (5, 5));
        assert_eq!(level.tiles[2][4], Tile::DoorLocked);
        assert!(level.tiles[2].len() == 5);
        assert_eq!(level.tiles[4], vec![Tile::Floor; 5]);
        assert_eq!(level.id, "cropped");
        assert_eq!(level.name, "cropped");
    }

    #[test]
    fn grid_errors() {
        assert!(matches!(parse_level("...\n.F.", "a"), Err(LevelError::MissingStart(_))));
        assert!(matches!(parse_level("S..\n.S.", "a"), Err(LevelError::MultipleStarts(_))));
        assert!(matches!(parse_level("# Empty\n", "a"), Err(LevelError::EmptyGrid(_))));
        match parse_level("S.\n.X", "a") {
            Err(LevelError::UnknownGlyph { row, col, ch, .. }) => assert_eq!((row, col, ch), (2, 2, 'X')),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn space_rows_are_floor_not_padding() {
        let level = parse_level("# Spaces\n\n   \n S \n  F\n   \n\n", "a").unwrap();
        assert_eq!((level.width, level.height), (3, 4));
        assert_eq!(level.start, (1, 1));
        assert_eq!(level.tiles[0], vec![Tile::Floor; 3]);
        assert_eq!(level.tiles[2][2], Tile::Goal);
        assert_eq!(level.tiles[3], vec![Tile::Floor; 3]);
    }

    #[test]
    fn metadata_errors() {
        assert!(matches!(
            parse_level("@ facing north\nS.F", "a"),
            Err(LevelError::BadMetadata { ref key, .. }) if key == "facing"
        ));
        assert!(matches!(parse_level("@ palette fly\nS.F", "a"), Err(LevelError::BadMetadata { .. })));
        assert!(matches!(parse_level("@ size 0\nS.F", "a"), Err(LevelError::BadMetadata { .. })));
        assert!(matches!(parse_level("@ code jump\nS.F", "a"), Err(LevelError::BadCode { .. })));
    }

    #[test]
    fn start_cropped_away_is_missing() {
        assert!(matches!(parse_level("@ size 2\n...S\n....", "a"), Err(LevelError::MissingStart(_))));
    }

    #[test]
    fn pack_sections_and_bad_levels() {
        let pack = "## Test Pack\n## Author: me\n---\n# One\nS.F\n---\n# Broken\n...\n---\n# Three\n@ id third\nSF\n";
        let levels = parse_pack_levels(pack, "test");
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].id, "test-1");
        assert_eq!(levels[0].name, "One");
        assert_eq!(levels[1].id, "third");
        assert_eq!(pack_name(pack).as_deref(), Some("Test Pack"));
    }

    #[test]
    fn builtin_pack_is_well_formed() {
        let set = LevelSet::builtin();
        assert!(set.len() >= 20);
        let mut ids: Vec<&str> = set.levels.iter().map(|l| l.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), set.len());
        assert!(set.levels.iter().any(|l| l.mode == Mode::Rules));
        assert!(set.levels.iter().any(|l| !l.code.is_empty()));
    }

    #[test]
    fn find_by_id_number_and_name() {
        let set = LevelSet::builtin();
        let first = &set.levels[0];
        assert_eq!(set.find(&first.id).unwrap().id, first.id);
        assert_eq!(set.find("1").unwrap().id, first.id);
        assert_eq!(set.find(&first.name.to_uppercase()).unwrap().id, first.id);
        assert!(matches!(set.find("nope"), Err(LevelError::UnknownLevel(_))));
    }

    #[test]
    fn loads_txt_files_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b-second.txt"), "# Second\nS.F\n").unwrap();
        std::fs::write(dir.path().join("a-first.txt"), "# First\nSF\n").unwrap();
        std::fs::write(dir.path().join("broken.txt"), "no start here\n").unwrap();
        std::fs::write(dir.path().join("notes.md"), "S.F").unwrap();

        let set = LevelSet::load(dir.path());
        let builtin = LevelSet::builtin().len();
        assert_eq!(set.len(), builtin + 2);
        assert_eq!(set.levels[builtin].id, "a-first");
        assert_eq!(set.levels[builtin + 1].name, "Second");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_level_file(&dir.path().join("absent.txt")).unwrap_err();
        assert!(matches!(err, LevelError::Io { .. }));
        assert!(err.to_string().contains("absent.txt"));
    }
}
