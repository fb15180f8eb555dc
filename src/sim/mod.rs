pub mod event;
pub mod exec;
pub mod interpreter;
pub mod level;
pub mod logic;
pub mod program;
pub mod session;
pub mod step;
pub mod world;
