//! Rooms and matchmaking
//!
//! A room owns its roster and at most one running match. The manager keeps
//! the room registry and routes player messages to the right room.

pub mod manager;
pub mod player;
pub mod room;
