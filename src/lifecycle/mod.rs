//! Match lifecycle and live-clock engine.

pub mod actions;
pub mod errors;
pub mod resolver;
pub mod scheduler;
pub mod ticker;
pub mod trigger;
