//! Utility functions and helpers
//!
//! Revocable background tasks and time helpers.

pub mod task;
pub mod time;

pub use task::TaskGuard;
pub use time::{clock_text, Rotator};
