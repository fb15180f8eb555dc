/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory, the CWD,
/// `~/.local/share/gridbot` or `/usr/share/gridbot` (first match wins).
/// Falls back to sensible defaults if the file is missing or incomplete.

use log::{debug, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sim::interpreter::{Limits, LOGIC_TICK_LIMIT, SENSOR_LOOP_LIMIT, WATER_CAPACITY};

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub speed: SpeedConfig,
    pub limits: Limits,
    pub levels_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpeedConfig {
    /// Delay between primitive steps while a program animates.
    pub step_ms: u64,
    /// Delay between tile-rule simulation ticks.
    pub tick_ms: u64,
}

impl SpeedConfig {
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_ms)
    }

    pub fn tick_delay(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    speed: TomlSpeed,
    #[serde(default)]
    limits: TomlLimits,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlSpeed {
    #[serde(default = "default_step_ms")]
    step_ms: u64,
    #[serde(default = "default_tick_ms")]
    tick_ms: u64,
}

#[derive(Deserialize, Debug)]
struct TomlLimits {
    #[serde(default = "default_sensor_loop")]
    sensor_loop: u32,
    #[serde(default = "default_logic_ticks")]
    logic_ticks: u32,
    #[serde(default = "default_water_capacity")]
    water_capacity: u32,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
}

// ── Defaults ──

fn default_step_ms() -> u64 { 500 }
fn default_tick_ms() -> u64 { 500 }
fn default_sensor_loop() -> u32 { SENSOR_LOOP_LIMIT }
fn default_logic_ticks() -> u32 { LOGIC_TICK_LIMIT }
fn default_water_capacity() -> u32 { WATER_CAPACITY }
fn default_levels_dir() -> String { "levels".into() }

impl Default for TomlSpeed {
    fn default() -> Self {
        TomlSpeed {
            step_ms: default_step_ms(),
            tick_ms: default_tick_ms(),
        }
    }
}

impl Default for TomlLimits {
    fn default() -> Self {
        TomlLimits {
            sensor_loop: default_sensor_loop(),
            logic_ticks: default_logic_ticks(),
            water_capacity: default_water_capacity(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            levels_dir: default_levels_dir(),
        }
    }
}

// ── Loading ──

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig::from_toml(TomlConfig::default(), &[])
    }
}

impl GameConfig {
    /// Load config from `config.toml` in the usual search directories.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        GameConfig::from_toml(toml_cfg, &search_dirs)
    }

    /// Load from one explicit file. Parse errors fall back to defaults.
    pub fn load_from(path: &Path) -> Self {
        let dirs: Vec<PathBuf> = path.parent().map(Path::to_path_buf).into_iter().collect();
        let toml_cfg = read_toml(path).unwrap_or_default();
        GameConfig::from_toml(toml_cfg, &dirs)
    }

    fn from_toml(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        // Resolve levels directory
        let levels_dir_str = &toml_cfg.general.levels_dir;
        let levels_dir = if PathBuf::from(levels_dir_str).is_absolute() {
            PathBuf::from(levels_dir_str)
        } else {
            search_dirs.iter()
                .map(|d| d.join(levels_dir_str))
                .find(|p| p.is_dir())
                .unwrap_or_else(|| PathBuf::from(levels_dir_str))
        };

        GameConfig {
            speed: SpeedConfig {
                step_ms: toml_cfg.speed.step_ms,
                tick_ms: toml_cfg.speed.tick_ms,
            },
            limits: Limits {
                sensor_loop: toml_cfg.limits.sensor_loop,
                logic_ticks: toml_cfg.limits.logic_ticks,
                water_capacity: toml_cfg.limits.water_capacity,
            },
            levels_dir,
        }
    }
}

/// Candidate directories to search: exe dir + CWD + data paths (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        // Resolve symlinks so /usr/bin/gridbot still finds data next to
        // the real binary.
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // 3. XDG data home (~/.local/share/gridbot)
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/gridbot");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    // 4. System data directory (/usr/share/gridbot)
    let sys = PathBuf::from("/usr/share/gridbot");
    if sys.is_dir() && !dirs.iter().any(|d| d == &sys) {
        dirs.push(sys);
    }

    // 5. Fallback
    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            debug!("config: {}", path.display());
            return read_toml(&path).unwrap_or_default();
        }
    }
    TomlConfig::default()
}

fn read_toml(path: &Path) -> Option<TomlConfig> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            warn!("could not read {}: {e}", path.display());
            return None;
        }
    };
    match toml::from_str::<TomlConfig>(&text) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            warn!("{} parse error: {e}; using default settings", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_constants() {
        let cfg = GameConfig::default();
        assert_eq!(cfg.speed, SpeedConfig { step_ms: 500, tick_ms: 500 });
        assert_eq!(cfg.limits, Limits::default());
        assert_eq!(cfg.levels_dir, PathBuf::from("levels"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("mylevels")).unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[speed]\nstep_ms = 120\n\n[limits]\nsensor_loop = 10\n\n[general]\nlevels_dir = \"mylevels\"\n",
        )
        .unwrap();

        let cfg = GameConfig::load_from(&path);
        assert_eq!(cfg.speed.step_ms, 120);
        assert_eq!(cfg.speed.tick_ms, 500);
        assert_eq!(cfg.limits.sensor_loop, 10);
        assert_eq!(cfg.limits.logic_ticks, LOGIC_TICK_LIMIT);
        assert_eq!(cfg.levels_dir, dir.path().join("mylevels"));
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[speed\nstep_ms = ").unwrap();
        let cfg = GameConfig::load_from(&path);
        assert_eq!(cfg.limits, Limits::default());
        assert_eq!(cfg.speed.step_delay(), Duration::from_millis(500));
    }
}
