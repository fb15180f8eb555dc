/// Entry point: command line, headless runs and the interactive game loop.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossterm::event::KeyCode;
use log::{info, warn};

use gridbot::config::GameConfig;
use gridbot::domain::color_rule::ColorRules;
use gridbot::domain::command::Program;
use gridbot::sim::event::StepEvent;
use gridbot::sim::exec::{self, Snapshot};
use gridbot::sim::interpreter::{Limits, Verdict};
use gridbot::sim::level::{LevelSet, Mode};
use gridbot::sim::program;
use gridbot::sim::session::Session;
use gridbot::ui::editor::{Edit, Editor};
use gridbot::ui::input::InputState;
use gridbot::ui::renderer::{Renderer, View};
use gridbot::ui::sound::SoundEngine;

const FRAME_SLEEP: Duration = Duration::from_millis(5);

/// Exit code of `run` when the robot did not reach the goal.
const EXIT_NOT_SOLVED: u8 = 2;

#[derive(Parser)]
#[command(name = "gridbot", version, about = "Program a robot across a tile grid")]
struct Cli {
    /// Read settings from this file instead of searching for config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory with extra *.txt levels (overrides the config file)
    #[arg(long, global = true)]
    levels: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// List all available levels
    List,
    /// Run a program or a set of color rules against a level
    Run {
        /// Level id, list number or name
        level: String,
        /// Program file; defaults to the level's initial code
        #[arg(short, long)]
        program: Option<PathBuf>,
        /// Color rule such as `red=right` (repeatable)
        #[arg(short, long = "rule")]
        rules: Vec<String>,
        /// Print the grid after every step
        #[arg(long)]
        trace: bool,
    },
    /// Check a program file and print it back in normal form
    Check { program: PathBuf },
    /// Play in the terminal (the default)
    Play {
        /// Level to open directly
        level: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = match cli.command {
        Some(Cmd::Run { .. }) => "info",
        _ => "warn",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    match dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => GameConfig::load_from(path),
        None => GameConfig::load(),
    };
    let levels_dir = cli.levels.clone().unwrap_or_else(|| config.levels_dir.clone());
    let levels = LevelSet::load(&levels_dir);

    match cli.command.unwrap_or(Cmd::Play { level: None }) {
        Cmd::List => {
            list_levels(&levels);
            Ok(ExitCode::SUCCESS)
        }
        Cmd::Run { level, program, rules, trace } => {
            run_headless(&levels, config.limits, &level, program.as_deref(), &rules, trace)
        }
        Cmd::Check { program } => {
            let program = read_program(&program)?;
            print!("{}", program);
            Ok(ExitCode::SUCCESS)
        }
        Cmd::Play { level } => {
            play(levels, &config, level.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Headless commands
// ══════════════════════════════════════════════════════════════

fn list_levels(levels: &LevelSet) {
    for (i, level) in levels.levels.iter().enumerate() {
        println!("{:>3}  {:<12} {:<8} {}", i + 1, level.id, level.mode.name(), level.name);
    }
}

fn read_program(path: &Path) -> Result<Program> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let program = text.parse::<Program>()
        .with_context(|| format!("{} is not a valid program", path.display()))?;
    Ok(program)
}

fn run_headless(
    levels: &LevelSet,
    limits: Limits,
    key: &str,
    program: Option<&Path>,
    rules: &[String],
    trace: bool,
) -> Result<ExitCode> {
    let level = levels.find(key)?.clone();
    let mut session = Session::new(level, limits);

    if let Some(path) = program {
        let program = read_program(path)?;
        session.set_program(program).context("program rejected")?;
    }
    for rule in rules {
        let Some((color, action)) = ColorRules::parse_assignment(rule) else {
            bail!("bad rule `{rule}`, expected e.g. `red=right`");
        };
        session.set_rule(color, action).context("rule rejected")?;
    }

    session.start()?;
    while session.is_running() {
        let Some(snap) = session.step() else { continue };
        info!("{}", describe_step(&session, &snap));
        if trace {
            for row in snap.world.diagram() {
                println!("{row}");
            }
            println!();
        }
    }

    println!("{}: {}", session.level().id, session.message());
    Ok(match session.verdict() {
        Some(Verdict::Win) => ExitCode::SUCCESS,
        _ => ExitCode::from(EXIT_NOT_SOLVED),
    })
}

/// `step 3 [move 2]: (4, 1) facing up, Continue`
fn describe_step(session: &Session, snap: &Snapshot) -> String {
    let robot = &snap.world.robot;
    let command = snap.at.as_ref().and_then(|at| {
        let (&last, parent) = at.path.split_last()?;
        let cmd = exec::sequence(session.program(), at.scope, parent)?.get(last)?;
        Some(format!(" [{}]", program::label(cmd)))
    });
    format!(
        "step {}{}: ({}, {}) facing {}, {:?}",
        snap.step + 1,
        command.unwrap_or_default(),
        robot.x,
        robot.y,
        robot.facing.name(),
        snap.outcome,
    )
}

// ══════════════════════════════════════════════════════════════
// Interactive game
// ══════════════════════════════════════════════════════════════

struct Game {
    levels: LevelSet,
    limits: Limits,
    /// Selected entry in the level list.
    cursor: usize,
    scroll: usize,
    solved: HashSet<String>,
    /// Some while a level is open.
    session: Option<Session>,
    editor: Editor,
    notice: String,
    /// Advance the active run on a timer.
    auto: bool,
    last_step: Instant,
}

impl Game {
    fn new(levels: LevelSet, limits: Limits) -> Self {
        Game {
            levels,
            limits,
            cursor: 0,
            scroll: 0,
            solved: HashSet::new(),
            session: None,
            editor: Editor::new(),
            notice: String::new(),
            auto: false,
            last_step: Instant::now(),
        }
    }

    fn open_level(&mut self, index: usize) {
        let Some(level) = self.levels.get(index) else { return };
        self.session = Some(Session::new(level.clone(), self.limits));
        self.cursor = index;
        self.editor.reset();
        self.notice.clear();
        self.auto = false;
    }

    fn view(&self) -> View<'_> {
        match &self.session {
            Some(session) => View::Playing {
                session,
                editor: &self.editor,
                notice: &self.notice,
                number: self.cursor + 1,
            },
            None => View::LevelSelect {
                levels: &self.levels,
                cursor: self.cursor,
                scroll: self.scroll,
                solved: &self.solved,
            },
        }
    }
}

fn play(levels: LevelSet, config: &GameConfig, start: Option<&str>) -> Result<()> {
    if levels.is_empty() {
        bail!("no levels available");
    }
    let mut game = Game::new(levels, config.limits);
    if let Some(key) = start {
        let id = game.levels.find(key)?.id.clone();
        if let Some(index) = game.levels.position(&id) {
            game.open_level(index);
        }
    }

    let mut renderer = Renderer::new();
    renderer.init().context("terminal init failed")?;

    let sound = SoundEngine::new();
    let result = game_loop(&mut game, &mut renderer, sound.as_ref(), config);

    if let Err(e) = renderer.cleanup() {
        warn!("terminal cleanup failed: {e}");
    }
    result.context("game loop failed")?;

    println!("Solved {} of {} levels.", game.solved.len(), game.levels.len());
    Ok(())
}

fn game_loop(
    game: &mut Game,
    renderer: &mut Renderer,
    sound: Option<&SoundEngine>,
    config: &GameConfig,
) -> io::Result<()> {
    let mut kb = InputState::new();

    loop {
        kb.drain_events();

        if kb.ctrl_c_pressed() {
            break;
        }
        if handle_meta(game, sound, &kb, renderer.list_rows()) {
            break;
        }

        if let Some(session) = game.session.as_mut() {
            let delay = match session.level().mode {
                Mode::Program => config.speed.step_delay(),
                Mode::Rules => config.speed.tick_delay(),
            };
            if game.auto && session.is_running() && game.last_step.elapsed() >= delay {
                advance(session, sound, &mut game.solved);
                game.last_step = Instant::now();
            }
        }

        renderer.render(&game.view())?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

/// One step of the active run, with sounds and win bookkeeping.
fn advance(session: &mut Session, sound: Option<&SoundEngine>, solved: &mut HashSet<String>) {
    if let Some(snap) = session.step() {
        process_sound_events(sound, &snap.events);
    }
    if session.is_running() {
        return;
    }
    match session.verdict() {
        Some(Verdict::Win) => {
            solved.insert(session.level().id.clone());
            if let Some(sfx) = sound { sfx.play_win(); }
        }
        Some(Verdict::Crash) => {
            if let Some(sfx) = sound { sfx.play_crash(); }
        }
        _ => {}
    }
}

fn process_sound_events(sound: Option<&SoundEngine>, events: &[StepEvent]) {
    let Some(sfx) = sound else { return };
    for ev in events {
        match ev {
            StepEvent::Moved { .. } => sfx.play_step(),
            StepEvent::Turned { .. } => sfx.play_turn(),
            StepEvent::KeyPicked { .. } | StepEvent::WaterRefilled { .. } => sfx.play_pick(),
            StepEvent::FireExtinguished { .. } => sfx.play_splash(),
            StepEvent::DoorOpened { .. } => sfx.play_door(),
            StepEvent::Blocked => sfx.play_bump(),
            StepEvent::ReachedGoal { .. } => {}
        }
    }
}

// ── Key bindings ──

const KEYS_UP: &[KeyCode] = &[KeyCode::Up, KeyCode::Char('k')];
const KEYS_DOWN: &[KeyCode] = &[KeyCode::Down, KeyCode::Char('j')];
const KEYS_CONFIRM: &[KeyCode] = &[KeyCode::Enter, KeyCode::Char(' ')];
const KEYS_QUIT: &[KeyCode] = &[KeyCode::Esc, KeyCode::Char('q'), KeyCode::Char('Q')];
const KEYS_BACK: &[KeyCode] = &[KeyCode::Esc];
const KEYS_STEP: &[KeyCode] = &[KeyCode::Char('s')];
const KEYS_RESET: &[KeyCode] = &[KeyCode::Char('r')];
const KEYS_RESET_LEVEL: &[KeyCode] = &[KeyCode::Char('R')];
const KEYS_NEXT: &[KeyCode] = &[KeyCode::Char('n'), KeyCode::PageDown];

/// Handle this frame's key presses. Returns true to quit.
fn handle_meta(game: &mut Game, sound: Option<&SoundEngine>, kb: &InputState, list_rows: usize) -> bool {
    for key in kb.presses() {
        let quit = if game.session.is_some() {
            handle_play_key(game, sound, key.code);
            false
        } else {
            handle_select_key(game, key.code, list_rows)
        };
        if quit {
            return true;
        }
    }
    false
}

fn handle_select_key(game: &mut Game, code: KeyCode, list_rows: usize) -> bool {
    let total = game.levels.len();
    if KEYS_QUIT.contains(&code) {
        return true;
    }
    if KEYS_UP.contains(&code) {
        game.cursor = game.cursor.saturating_sub(1);
    } else if KEYS_DOWN.contains(&code) {
        game.cursor = (game.cursor + 1).min(total.saturating_sub(1));
    } else if code == KeyCode::PageUp {
        game.cursor = game.cursor.saturating_sub(list_rows);
    } else if code == KeyCode::PageDown {
        game.cursor = (game.cursor + list_rows).min(total.saturating_sub(1));
    } else if code == KeyCode::Home {
        game.cursor = 0;
    } else if code == KeyCode::End {
        game.cursor = total.saturating_sub(1);
    } else if KEYS_CONFIRM.contains(&code) {
        game.open_level(game.cursor);
    }

    // Keep the cursor inside the visible window.
    if game.cursor < game.scroll {
        game.scroll = game.cursor;
    } else if game.cursor >= game.scroll + list_rows {
        game.scroll = game.cursor + 1 - list_rows;
    }
    false
}

fn handle_play_key(game: &mut Game, sound: Option<&SoundEngine>, code: KeyCode) {
    if KEYS_BACK.contains(&code) {
        game.session = None;
        game.auto = false;
        return;
    }
    if KEYS_NEXT.contains(&code) {
        if game.cursor + 1 < game.levels.len() {
            game.open_level(game.cursor + 1);
        }
        return;
    }

    let Some(session) = game.session.as_mut() else { return };

    if KEYS_CONFIRM.contains(&code) {
        if session.is_running() {
            game.auto = !game.auto;
        } else if let Err(e) = session.start() {
            game.notice = e.to_string();
        } else {
            game.notice.clear();
            game.auto = true;
            game.last_step = Instant::now();
        }
    } else if KEYS_STEP.contains(&code) {
        game.auto = false;
        if !session.is_running() {
            if let Err(e) = session.start() {
                game.notice = e.to_string();
                return;
            }
        }
        advance(session, sound, &mut game.solved);
    } else if KEYS_RESET.contains(&code) {
        session.reset();
        game.auto = false;
    } else if KEYS_RESET_LEVEL.contains(&code) {
        session.reset_level();
        game.editor.reset();
        game.auto = false;
    } else if let Some(edit) = Edit::from_key(code) {
        match game.editor.apply(session, edit) {
            Ok(()) => {
                game.notice.clear();
                if let Some(sfx) = sound { sfx.play_click(); }
            }
            Err(e) => {
                game.notice = e.to_string();
                if let Some(sfx) = sound { sfx.play_bump(); }
            }
        }
    }
}
