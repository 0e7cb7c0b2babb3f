//! Library entrypoint for match-dashboard.
//!
//! Exposes all modules so integration tests can import them.

pub mod api;
pub mod clock;
pub mod config;
pub mod data;
pub mod lifecycle;
pub mod state;
