pub mod color_rule;
pub mod command;
pub mod robot;
pub mod rules;
pub mod tile;
