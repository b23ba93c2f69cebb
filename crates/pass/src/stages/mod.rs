mod fxaa;
mod lut;
mod timed;

pub use fxaa::Fxaa;
pub use lut::{identity_table, Lut};
pub use timed::{FilmGrain, Glitch, TimedEffect};
