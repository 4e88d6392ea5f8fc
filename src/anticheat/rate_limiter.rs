//! Per-combatant input throttling
//!
//! Every action, human or bot, passes through here before it reaches the
//! room handlers. Rejections are silent at the protocol level; the caller
//! only logs them.

use hashbrown::HashMap;

use crate::game::constants::rate_limit::{MAX_ACTIONS_PER_SECOND, MIN_MOVE_INTERVAL_MS};
use crate::game::state::{CombatantId, Millis};

/// Violations from rate limiting
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitViolation {
    #[error("Move too soon: {0}ms until the next move is allowed")]
    MoveTooSoon(Millis),
    #[error("Action rate exceeded: {0} actions this second")]
    ActionRateExceeded(u32),
}

/// Rate limits for a single combatant
#[derive(Debug, Clone)]
pub struct CombatantRateLimits {
    /// Last accepted move
    pub last_move_at: Option<Millis>,
    /// Start of the current one-second window
    pub window_start: Millis,
    /// Accepted actions in the current window
    pub actions_in_window: u32,
    pub min_move_interval_ms: Millis,
    pub max_actions_per_second: u32,
}

impl CombatantRateLimits {
    pub fn new() -> Self {
        Self {
            last_move_at: None,
            window_start: 0,
            actions_in_window: 0,
            min_move_interval_ms: MIN_MOVE_INTERVAL_MS,
            max_actions_per_second: MAX_ACTIONS_PER_SECOND,
        }
    }

    fn check_window(&mut self, now: Millis) -> Result<(), RateLimitViolation> {
        if now.saturating_sub(self.window_start) >= 1000 {
            self.window_start = now;
            self.actions_in_window = 0;
        }
        if self.actions_in_window >= self.max_actions_per_second {
            return Err(RateLimitViolation::ActionRateExceeded(self.actions_in_window));
        }
        Ok(())
    }

    /// Bomb placement, weapon fire, restart vote
    pub fn check_action(&mut self, now: Millis) -> Result<(), RateLimitViolation> {
        self.check_window(now)?;
        self.actions_in_window += 1;
        Ok(())
    }

    /// Moves additionally respect the minimum interval
    pub fn check_move(&mut self, now: Millis) -> Result<(), RateLimitViolation> {
        if let Some(last) = self.last_move_at {
            let elapsed = now.saturating_sub(last);
            if elapsed < self.min_move_interval_ms {
                return Err(RateLimitViolation::MoveTooSoon(self.min_move_interval_ms - elapsed));
            }
        }
        self.check_window(now)?;
        self.actions_in_window += 1;
        self.last_move_at = Some(now);
        Ok(())
    }

    /// Reset all limits (new match)
    pub fn reset(&mut self) {
        self.last_move_at = None;
        self.window_start = 0;
        self.actions_in_window = 0;
    }
}

impl Default for CombatantRateLimits {
    fn default() -> Self {
        Self::new()
    }
}

/// Rate limiter manager for all combatants of a room
#[derive(Debug, Default)]
pub struct RateLimiterManager {
    limits: HashMap<CombatantId, CombatantRateLimits>,
}

impl RateLimiterManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: CombatantId) {
        self.limits.insert(id, CombatantRateLimits::new());
    }

    pub fn unregister(&mut self, id: CombatantId) {
        self.limits.remove(&id);
    }

    pub fn get(&self, id: CombatantId) -> Option<&CombatantRateLimits> {
        self.limits.get(&id)
    }

    pub fn len(&self) -> usize {
        self.limits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }

    pub fn clear(&mut self) {
        self.limits.clear();
    }

    /// Unknown ids are rejected by the room before they get here
    pub fn check_action(&mut self, id: CombatantId, now: Millis) -> Result<(), RateLimitViolation> {
        self.limits
            .entry(id)
            .or_default()
            .check_action(now)
    }

    pub fn check_move(&mut self, id: CombatantId, now: Millis) -> Result<(), RateLimitViolation> {
        self.limits
            .entry(id)
            .or_default()
            .check_move(now)
    }

    pub fn reset_all(&mut self) {
        for limits in self.limits.values_mut() {
            limits.reset();
        }
    }
}
