/// Tick loop constants
pub mod tick {
    /// Main loop rate in Hz
    pub const TICK_RATE: u32 = 60;
    /// Tick duration in milliseconds (rounded down)
    pub const TICK_DURATION_MS: u64 = 1000 / TICK_RATE as u64;
}

/// Map/grid constants
pub mod map {
    /// Default grid width (odd so pillars line up)
    pub const DEFAULT_WIDTH: i32 = 15;
    /// Default grid height
    pub const DEFAULT_HEIGHT: i32 = 13;
    /// Smallest accepted grid dimension
    pub const MIN_DIMENSION: i32 = 7;
    /// Largest accepted grid dimension
    pub const MAX_DIMENSION: i32 = 41;
    /// Chance an eligible interior tile becomes a destructible block
    pub const BLOCK_DENSITY: f64 = 0.7;
    /// Chance a block hides a powerup
    pub const HIDDEN_POWERUP_CHANCE: f64 = 0.25;
    /// Maximum number of combatants (one per spawn corner)
    pub const MAX_COMBATANTS: usize = 4;
    /// Maximum number of human players per room
    pub const MAX_HUMANS: usize = 2;
}

/// Bomb constants
pub mod bomb {
    /// Delay between placement and detonation
    pub const FUSE_MS: u64 = 3000;
    /// Default blast range in tiles
    pub const DEFAULT_POWER: u32 = 2;
    /// Default simultaneous bomb allowance
    pub const DEFAULT_MAX_BOMBS: u32 = 1;
}

/// Directional weapon constants
pub mod weapon {
    /// Flamethrower arm length
    pub const FLAMETHROWER_RANGE: u32 = 5;
    /// Charges granted by a flamethrower pickup
    pub const FLAMETHROWER_CHARGES: u32 = 3;
    /// Charges granted by a raygun pickup
    pub const RAYGUN_CHARGES: u32 = 2;
}

/// Death/respawn constants
pub mod respawn {
    /// Respawn delay in Lives mode
    pub const DELAY_MS: u64 = 3000;
    /// Respawn delay in FirstToKills mode
    pub const FIRST_TO_KILLS_DELAY_MS: u64 = 1500;
    /// Post-respawn invincibility window
    pub const INVINCIBILITY_MS: u64 = 2000;
    /// Starting lives in Lives mode when unspecified
    pub const DEFAULT_LIVES: u32 = 3;
}

/// Room lifecycle constants
pub mod room {
    /// Delay from Ended to the automatic next transition
    pub const RESTART_DELAY_MS: u64 = 5000;
    /// Default kill target for FirstToKills
    pub const DEFAULT_KILL_TARGET: u32 = 5;
}

/// Late-game escalation constants
pub mod late_game {
    /// Interval between random powerup drops once blocks are gone
    pub const DROP_INTERVAL_MS: u64 = 8000;
    /// Cap on powerup tiles lying on the map for drops to continue
    pub const MAX_POWERUPS_ON_MAP: usize = 4;
    /// Delay from blocks exhausted until the border starts shrinking
    pub const SHRINK_DELAY_MS: u64 = 30_000;
    /// Interval between border advances
    pub const SHRINK_INTERVAL_MS: u64 = 4000;
    /// Shrinking stops before the playable interior gets narrower than this
    pub const MIN_PLAYABLE_SIZE: i32 = 5;
}

/// Input throttling constants
pub mod rate_limit {
    /// Minimum interval between two accepted moves of one combatant
    pub const MIN_MOVE_INTERVAL_MS: u64 = 100;
    /// Maximum accepted actions per combatant per second
    pub const MAX_ACTIONS_PER_SECOND: u32 = 30;
}

/// AI bot constants
pub mod ai {
    /// Direction commitment window after a chase/seek/clear step
    pub const COMMITMENT_MS: u64 = 400;
    /// Trap score added when the opponent stands inside the blast
    pub const TRAP_IN_BLAST_SCORE: i32 = 60;
    /// Trap score per escape tile fewer than `TRAP_ESCAPE_CAP`
    pub const TRAP_SCORE_PER_MISSING_ESCAPE: i32 = 10;
    /// Escape tiles beyond this count no longer lower the score
    pub const TRAP_ESCAPE_CAP: i32 = 6;
    /// Extra Manhattan margin beyond bomb power for a safe retreat
    pub const RETREAT_MARGIN: u32 = 1;
    /// Decision steps held back from the fuse window when checking escape routes
    pub const ESCAPE_MARGIN_STEPS: u64 = 1;
}
