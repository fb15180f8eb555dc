/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// The play screen puts the grid on the left and the program (or the
/// color rules) on the right, with the message and key help underneath.

use std::collections::HashSet;
use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::color_rule::RuleAction;
use crate::domain::robot::Facing;
use crate::domain::tile::{self as tile, Tile};
use crate::sim::exec::Scope;
use crate::sim::interpreter::Verdict;
use crate::sim::level::{LevelSet, Mode};
use crate::sim::session::Session;
use crate::ui::editor::{self, Editor};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: [u8; 4],
    ch_len: u8,
    fg: Color,
    bg: Color,
    wide: bool,    // true = this char occupies 2 terminal columns
    cont: bool,    // true = continuation of previous wide char (skip render)
}

impl Cell {
    /// Explicit dark background for all "empty" terminal cells, so the
    /// gaps between rows match the cell color on VTE terminals.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell {
        ch: [b' ', 0, 0, 0],
        ch_len: 1,
        fg: Color::White,
        bg: Cell::BASE_BG,
        wide: false,
        cont: false,
    };

    const WIDE_CONT: Cell = Cell {
        ch: [0; 4],
        ch_len: 0,
        fg: Color::White,
        bg: Cell::BASE_BG,
        wide: false,
        cont: true,
    };

    /// Sentinel cell used to invalidate the back buffer.
    const INVALID: Cell = Cell {
        ch: [b'?', 0, 0, 0],
        ch_len: 1,
        fg: Color::Magenta,
        bg: Color::Magenta,
        wide: false,
        cont: false,
    };

    #[inline]
    fn norm_bg(bg: Color) -> Color {
        match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        }
    }

    fn from_char(c: char, fg: Color, bg: Color) -> Self {
        let mut cell = Self::BLANK;
        cell.ch_len = c.encode_utf8(&mut cell.ch).len() as u8;
        cell.fg = fg;
        cell.bg = Self::norm_bg(bg);
        cell
    }

    fn from_char_wide(c: char, bg: Color) -> Self {
        let mut cell = Self::from_char(c, Color::Reset, bg);
        cell.wide = true;
        cell
    }

    fn as_str(&self) -> &str {
        std::str::from_utf8(&self.ch[..self.ch_len as usize]).unwrap_or(" ")
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    /// Write a string at (x, y). Each char occupies 1 column.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Cell::from_char(ch, fg, bg));
        }
    }

    /// Paint a whole row with `bg`, then write `s` on it.
    fn put_bar(&mut self, y: usize, s: &str, fg: Color, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Cell::from_char(' ', fg, bg));
        }
        self.put_str(0, y, s, fg, bg);
    }
}

// ── What to draw ──

/// Everything the renderer needs for one frame.
pub enum View<'a> {
    LevelSelect {
        levels: &'a LevelSet,
        cursor: usize,
        scroll: usize,
        solved: &'a HashSet<String>,
    },
    Playing {
        session: &'a Session,
        editor: &'a Editor,
        /// Feedback for the last rejected edit.
        notice: &'a str,
        number: usize,
    },
}

impl View<'_> {
    fn screen_id(&self) -> u8 {
        match self {
            View::LevelSelect { .. } => 0,
            View::Playing { .. } => 1,
        }
    }
}

// ── Renderer ──

/// Each grid cell is 2 terminal columns.
const CELL_W: usize = 2;

const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;
/// Gap between the grid and the side panel.
const PANEL_GAP: usize = 4;

const HUD_BG: Color = Color::Rgb { r: 20, g: 20, b: 60 };
const MSG_BG: Color = Color::Rgb { r: 200, g: 180, b: 50 };
const TITLE_FG: Color = Color::Rgb { r: 255, g: 200, b: 50 };
const HIGHLIGHT_BG: Color = Color::Rgb { r: 30, g: 60, b: 30 };
const HIGHLIGHT_FG: Color = Color::Rgb { r: 80, g: 255, b: 80 };
const RECORD_FG: Color = Color::Rgb { r: 220, g: 120, b: 255 };
const ERROR_FG: Color = Color::Rgb { r: 255, g: 90, b: 90 };

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_screen: Option<u8>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_screen: None,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        // Force full repaint on first frame.
        self.back.cells.fill(Cell::INVALID);

        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    pub fn render(&mut self, view: &View) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        let resized = tw as usize != self.term_w || th as usize != self.term_h;
        let switched = self.last_screen != Some(view.screen_id());
        if resized {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
        }
        if resized || switched {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_screen = Some(view.screen_id());
        }

        self.front.clear();
        match view {
            View::LevelSelect { levels, cursor, scroll, solved } => {
                self.compose_level_select(levels, *cursor, *scroll, solved)
            }
            View::Playing { session, editor, notice, number } => {
                self.compose_play(session, editor, notice, *number)
            }
        }

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    /// Rows available for the level list.
    pub fn list_rows(&self) -> usize {
        16_usize.min(self.term_h.saturating_sub(LIST_TOP + 4)).max(1)
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut need_move = true;
        let mut last_x: usize = 0;
        let mut last_y: usize = 0;

        // Never ResetColor here: the terminal default may differ from BASE_BG.
        queue!(self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            let mut x = 0;
            while x < self.front.width {
                let cell = self.front.get(x, y);
                let prev = self.back.get(x, y);

                if cell.cont {
                    if cell != prev { need_move = true; }
                    x += 1;
                    continue;
                }

                let cont_changed = cell.wide
                    && x + 1 < self.front.width
                    && self.front.get(x + 1, y) != self.back.get(x + 1, y);

                if cell == prev && !cont_changed {
                    need_move = true;
                    x += 1;
                    continue;
                }

                if need_move || x != last_x + 1 || y != last_y {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                    need_move = false;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }

                queue!(self.writer, Print(cell.as_str()))?;

                if cell.wide {
                    last_x = x + 1;
                    x += 2;
                } else {
                    last_x = x;
                    x += 1;
                }
                last_y = y;
            }
        }

        self.writer.flush()
    }

    // ══════════════════════════════════════════════════════════════
    // Play screen
    // ══════════════════════════════════════════════════════════════

    fn compose_play(&mut self, s: &Session, ed: &Editor, notice: &str, number: usize) {
        let level = s.level();
        let world = s.world();

        // ── HUD row ──
        let state = match (s.is_running(), s.verdict()) {
            (true, _) => "RUNNING",
            (false, Some(Verdict::Win)) => "CLEAR",
            (false, Some(Verdict::Crash)) => "CRASH",
            (false, Some(Verdict::Exhausted)) => "STOPPED",
            (false, None) => "EDIT",
        };
        let mut hud = format!(" {}. {}", number, level.name);
        if !level.category.is_empty() {
            hud.push_str(&format!("  [{}]", level.category));
        }
        if level.mode == Mode::Program {
            hud.push_str(&format!(
                "  water:{}/{}  key:{}",
                world.robot.water,
                world.water_capacity,
                if world.robot.has_key() { "yes" } else { "no" },
            ));
        }
        hud.push_str(&format!("  {} ", state));
        self.front.put_bar(HUD_ROW, &hud, Color::White, HUD_BG);

        // ── Grid ──
        for gy in 0..world.height {
            let row = MAP_ROW + gy;
            if row >= self.front.height { break; }
            for gx in 0..world.width {
                self.compose_cell(s, gx, gy, gx * CELL_W, row);
            }
        }

        // ── Side panel ──
        let panel_x = world.width * CELL_W + PANEL_GAP;
        let panel_bottom = match level.mode {
            Mode::Program => self.compose_program(s, ed, panel_x),
            Mode::Rules => self.compose_rules(s, panel_x),
        };

        // ── Message, notice and help ──
        let mut row = (MAP_ROW + world.height).max(panel_bottom) + 1;
        if row < self.front.height && !s.message().is_empty() {
            self.front.put_bar(row, &format!(" ◈ {} ", s.message()), Color::Black, MSG_BG);
        }
        row += 1;
        if row < self.front.height && !notice.is_empty() {
            self.front.put_str(1, row, notice, ERROR_FG, Color::Reset);
        }
        row += 1;
        let help = match level.mode {
            Mode::Program => [
                " f:move a:left d:right p:pick u:use c:call  (:loop w:while ):close  +/-:count  Bksp:undo x:clear Tab:buffer",
                " Enter:run  s:step  r:reset  R:restore level  n:next  Esc:levels",
            ],
            Mode::Rules => [
                " 1:red  2:blue  3:yellow   cycle ignore > right > left > u-turn",
                " Enter:run  s:step  r:reset  R:restore level  n:next  Esc:levels",
            ],
        };
        for (i, line) in help.iter().enumerate() {
            if row + i < self.front.height {
                self.front.put_str(0, row + i, line, Color::DarkGrey, Color::Reset);
            }
        }
    }

    /// Write the visual for grid cell (gx, gy) at terminal (col, row).
    fn compose_cell(&mut self, s: &Session, gx: usize, gy: usize, col: usize, row: usize) {
        let world = s.world();
        let Some(t) = world.terrain_at(gx, gy) else { return };
        let rules_mode = s.level().mode == Mode::Rules;
        let bg = tile_bg(t);

        if world.robot.pos() == (gx, gy) {
            let arrow = match world.robot.facing {
                Facing::Up => '▲',
                Facing::Right => '▶',
                Facing::Down => '▼',
                Facing::Left => '◀',
            };
            let fg = match s.verdict() {
                Some(Verdict::Crash) => ERROR_FG,
                Some(Verdict::Win) => HIGHLIGHT_FG,
                _ => Color::Rgb { r: 120, g: 230, b: 255 },
            };
            self.front.set(col, row, Cell::from_char(arrow, fg, bg));
            self.front.set(col + 1, row, Cell::from_char(' ', fg, bg));
            return;
        }

        // Emoji for items; rules levels show plain color pads instead.
        let emoji = match t {
            Tile::Goal => Some('🏁'),
            Tile::Red if !rules_mode => Some('🔥'),
            Tile::Blue if !rules_mode => Some('💧'),
            Tile::Yellow if !rules_mode => Some('🔑'),
            Tile::DoorLocked => Some('🔒'),
            _ => None,
        };
        if let Some(ch) = emoji {
            self.front.set(col, row, Cell::from_char_wide(ch, bg));
            self.front.set(col + 1, row, Cell::WIDE_CONT);
            return;
        }

        let (c0, c1, fg) = match t {
            Tile::Floor => ('·', ' ', Color::Rgb { r: 70, g: 70, b: 90 }),
            Tile::Wall => ('█', '█', Color::Rgb { r: 120, g: 120, b: 120 }),
            Tile::Start => ('░', '░', Color::Rgb { r: 60, g: 110, b: 60 }),
            Tile::DoorOpen => ('▯', ' ', Color::Rgb { r: 180, g: 120, b: 60 }),
            _ => (' ', ' ', Color::White),
        };
        self.front.set(col, row, Cell::from_char(c0, fg, bg));
        self.front.set(col + 1, row, Cell::from_char(c1, fg, bg));
    }

    /// Main sequence and pattern buffer. Returns the first free row.
    fn compose_program(&mut self, s: &Session, ed: &Editor, x: usize) -> usize {
        let mut row = MAP_ROW;
        for scope in [Scope::Main, Scope::Pattern] {
            let editing = ed.scope() == scope && !s.is_running();
            let title = match scope {
                Scope::Main => "MAIN",
                Scope::Pattern => "PATTERN",
            };
            let title_fg = if editing { TITLE_FG } else { Color::DarkGrey };
            let marker = if editing { "▸ " } else { "  " };
            self.front.put_str(x, row, &format!("{}{}", marker, title), title_fg, Color::Reset);
            row += 1;

            let lines = editor::listing(s.buffer(scope));
            if lines.is_empty() {
                self.front.put_str(x + 2, row, "(empty)", Color::DarkGrey, Color::Reset);
                row += 1;
            }
            for line in &lines {
                if row >= self.front.height { break; }
                let at_cursor = match (s.cursor(), &line.path) {
                    (Some(c), Some(p)) => c.scope == scope && &c.path == p,
                    _ => false,
                };
                let recording = editing
                    && !ed.open_path().is_empty()
                    && line.path.as_deref() == Some(ed.open_path());
                let (fg, bg) = if at_cursor {
                    (HIGHLIGHT_FG, HIGHLIGHT_BG)
                } else if recording {
                    (RECORD_FG, Color::Reset)
                } else {
                    (Color::White, Color::Reset)
                };
                let text = format!("{}{}", "  ".repeat(line.depth), line.text);
                self.front.put_str(x + 2, row, &text, fg, bg);
                row += 1;
            }
            row += 1;
        }
        if let Some(step) = s.crash_step() {
            self.front.put_str(x, row, &format!("crashed at step {}", step + 1), ERROR_FG, Color::Reset);
            row += 1;
        }
        row
    }

    /// Color rule table. Returns the first free row.
    fn compose_rules(&mut self, s: &Session, x: usize) -> usize {
        let mut row = MAP_ROW;
        self.front.put_str(x, row, "COLOR RULES", TITLE_FG, Color::Reset);
        row += 1;
        let rules = s.rules();
        for (i, color) in tile::Color::ALL.iter().enumerate() {
            let action = rules.get(*color);
            let pad = match color {
                tile::Color::Red => Tile::Red,
                tile::Color::Blue => Tile::Blue,
                tile::Color::Yellow => Tile::Yellow,
            };
            self.front.set(x, row, Cell::from_char(' ', Color::White, tile_bg(pad)));
            self.front.set(x + 1, row, Cell::from_char(' ', Color::White, tile_bg(pad)));
            let fg = if action == RuleAction::Ignore { Color::DarkGrey } else { Color::White };
            let text = format!(" {} {:<7} {}", i + 1, color.name(), action_arrow(action));
            self.front.put_str(x + 2, row, &text, fg, Color::Reset);
            row += 1;
        }
        row
    }

    // ══════════════════════════════════════════════════════════════
    // Level select
    // ══════════════════════════════════════════════════════════════

    fn compose_level_select(&mut self, levels: &LevelSet, cursor: usize, scroll: usize, solved: &HashSet<String>) {
        let dim = Color::DarkGrey;

        self.front.put_str(2, 1, "╔══════════════════════════════════════════╗", TITLE_FG, Color::Reset);
        self.front.put_str(2, 2, "║              G R I D B O T               ║", TITLE_FG, Color::Reset);
        self.front.put_str(2, 3, "╚══════════════════════════════════════════╝", TITLE_FG, Color::Reset);

        let visible = self.list_rows();
        let total = levels.len();

        if scroll > 0 {
            self.front.put_str(2, LIST_TOP - 1, "    ▲ ▲ ▲", dim, Color::Reset);
        }

        for i in 0..visible {
            let idx = scroll + i;
            let Some(level) = levels.get(idx) else { break };
            let row = LIST_TOP + i;
            if row >= self.front.height { break; }

            let mark = if solved.contains(&level.id) { '✓' } else { ' ' };
            let mode = match level.mode {
                Mode::Program => "",
                Mode::Rules => "rules",
            };
            let mut name: String = level.name.chars().take(32).collect();
            if level.name.chars().count() > 32 {
                name.push('…');
            }
            let text = format!("{:>3}. {} {:<34}{}", idx + 1, mark, name, mode);

            if idx == cursor {
                for x in 0..56.min(self.front.width) {
                    self.front.set(x, row, Cell::from_char(' ', Color::White, HIGHLIGHT_BG));
                }
                self.front.put_str(2, row, "▸", HIGHLIGHT_FG, HIGHLIGHT_BG);
                self.front.put_str(3, row, &text, HIGHLIGHT_FG, HIGHLIGHT_BG);
            } else {
                self.front.put_str(3, row, &text, Color::White, Color::Reset);
            }
        }

        if scroll + visible < total {
            let ind_row = LIST_TOP + visible;
            self.front.put_str(2, ind_row, "    ▼ ▼ ▼", dim, Color::Reset);
        }

        let footer_row = LIST_TOP + visible + 2;
        self.front.put_str(2, footer_row, "  ENTER: Play   ↑↓: Select   PgUp/PgDn   Q/ESC: Quit", dim, Color::Reset);
        let count = format!("  {}/{} levels, {} solved", (cursor + 1).min(total), total, solved.len());
        self.front.put_str(2, footer_row + 1, &count, dim, Color::Reset);
        if let Some(level) = levels.get(cursor) {
            if !level.hint.is_empty() {
                self.front.put_str(2, footer_row + 3, &format!("  {}", level.hint), TITLE_FG, Color::Reset);
            }
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

const LIST_TOP: usize = 6;

fn tile_bg(t: Tile) -> Color {
    match t {
        Tile::Red => Color::Rgb { r: 150, g: 40, b: 40 },
        Tile::Blue => Color::Rgb { r: 40, g: 70, b: 160 },
        Tile::Yellow => Color::Rgb { r: 160, g: 140, b: 30 },
        Tile::Goal => Color::Rgb { r: 30, g: 110, b: 50 },
        Tile::DoorLocked => Color::Rgb { r: 100, g: 65, b: 30 },
        Tile::Wall => Color::Rgb { r: 70, g: 70, b: 70 },
        _ => Color::Reset,
    }
}

fn action_arrow(action: RuleAction) -> &'static str {
    match action {
        RuleAction::Ignore => "·  ignore",
        RuleAction::TurnRight => "↻  turn right",
        RuleAction::TurnLeft => "↺  turn left",
        RuleAction::UTurn => "⮌  u-turn",
    }
}
