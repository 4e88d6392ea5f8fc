//! Bot difficulty profiles

use serde::{Deserialize, Serialize};

use crate::game::state::Millis;

/// Bot difficulty level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// How the bot walks towards chase and attack targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pathing {
    /// Shortest path via BFS
    Bfs,
    /// Random non-reversing steps
    Naive,
}

/// How much of the hazard map the bot reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HazardAwareness {
    /// Own tile and the four neighbours
    AdjacentOnly,
    /// Every stamped tile on the map counts as hazardous
    Full,
}

/// Tunables for one difficulty level
#[derive(Debug, Clone, PartialEq)]
pub struct BotProfile {
    /// Time between two decisions
    pub decision_interval_ms: Millis,
    /// Chance to replace a non-survival decision with a random step
    pub mistake_chance: f64,
    pub pathing: Pathing,
    pub awareness: HazardAwareness,
    /// Account for chain reactions when building the hazard map
    pub chain_awareness: bool,
    /// Only bomb when a safe tile is reachable before the fuse runs out
    pub require_escape_route: bool,
    /// Only bomb when the trap score beats `trap_threshold`
    pub use_trap_logic: bool,
    pub trap_threshold: i32,
    pub seek_powerups: bool,
    pub chase_enabled: bool,
    /// Manhattan distance at which chasing starts
    pub chase_range: u32,
    pub bomb_cooldown_ms: Millis,
}

impl BotProfile {
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Easy => Self {
                decision_interval_ms: 500,
                mistake_chance: 0.25,
                pathing: Pathing::Naive,
                awareness: HazardAwareness::AdjacentOnly,
                chain_awareness: false,
                require_escape_route: false,
                use_trap_logic: false,
                trap_threshold: 0,
                seek_powerups: false,
                chase_enabled: true,
                chase_range: 4,
                bomb_cooldown_ms: 3000,
            },
            Difficulty::Medium => Self {
                decision_interval_ms: 300,
                mistake_chance: 0.1,
                pathing: Pathing::Bfs,
                awareness: HazardAwareness::Full,
                chain_awareness: false,
                require_escape_route: true,
                use_trap_logic: false,
                trap_threshold: 0,
                seek_powerups: true,
                chase_enabled: true,
                chase_range: 6,
                bomb_cooldown_ms: 2000,
            },
            Difficulty::Hard => Self {
                decision_interval_ms: 150,
                mistake_chance: 0.02,
                pathing: Pathing::Bfs,
                awareness: HazardAwareness::Full,
                chain_awareness: true,
                require_escape_route: true,
                use_trap_logic: true,
                trap_threshold: 60,
                seek_powerups: true,
                chase_enabled: true,
                chase_range: 12,
                bomb_cooldown_ms: 1000,
            },
        }
    }
}

impl From<Difficulty> for BotProfile {
    fn from(difficulty: Difficulty) -> Self {
        Self::for_difficulty(difficulty)
    }
}
