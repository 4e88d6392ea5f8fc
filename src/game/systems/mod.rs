pub mod ai;
pub mod ai_profile;
pub mod blast;
pub mod explosion;
pub mod hazard;
pub mod late_game;
pub mod lifecycle;
pub mod pathfinding;
