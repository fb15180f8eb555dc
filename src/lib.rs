/// GridBot: a coding puzzle where a robot walks a tile grid.
///
/// `domain` holds the pure rules (tiles, commands, color rules),
/// `sim` runs programs and simulations against a level, `ui` draws the
/// terminal front end. `config` reads `config.toml`.

pub mod config;
pub mod domain;
pub mod sim;
pub mod ui;
