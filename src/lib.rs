//! CivicVerse client core - live state sync for the 3D scene
//!
//! - Authority channel with fixed-delay reconnect
//! - Local player prediction and attack debounce
//! - Remote roster reconciliation and hit feedback
//! - Host telemetry polling with rolling and long-range views

pub mod app;
pub mod config;
pub mod game;
pub mod telemetry;
pub mod util;
pub mod ws;
