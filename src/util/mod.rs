//! Shared utilities

pub mod events;
pub mod time;
