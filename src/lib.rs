//! Blastgrid Server Library
//!
//! Authoritative simulation for a tile-grid bomber arena: blast geometry,
//! hazard maps and BFS, bot decision making, entity lifecycle, rooms.
//!
//! # Features
//!
//! - `lobby` - Rooms, restart votes and the multi-room manager (enabled by default)

pub mod config;
pub mod util;
pub mod game;
pub mod net;
pub mod metrics;
pub mod anticheat;

#[cfg(feature = "lobby")]
pub mod lobby;
