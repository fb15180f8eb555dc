pub mod editor;
pub mod input;
pub mod renderer;
pub mod sound;
