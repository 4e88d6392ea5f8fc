//! Entity lifecycle: kills, shields, lives and the respawn queue

use tracing::debug;

use crate::game::events::GameEvent;
use crate::game::state::{CombatantId, GameMode, GameState, Millis, RespawnEntry};
use crate::util::tile::TilePos;

/// What killed a combatant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillCause {
    /// Caught in a bomb blast, credited to the bomb owner
    Blast { owner: CombatantId },
    /// Hit by a weapon discharge
    Weapon { shooter: CombatantId },
    /// Standing on a tile converted by the shrinking border
    Border,
}

impl KillCause {
    pub fn killer(self) -> Option<CombatantId> {
        match self {
            KillCause::Blast { owner } => Some(owner),
            KillCause::Weapon { shooter } => Some(shooter),
            KillCause::Border => None,
        }
    }

    /// Forced kills ignore shields and invincibility
    fn is_forced(self) -> bool {
        matches!(self, KillCause::Border)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    /// Already dead, unknown, or invincible
    Ignored,
    ShieldAbsorbed,
    Killed { permanent: bool },
}

/// Kill `victim`, honouring invincibility, shields and the mode's life rules
pub fn kill(
    state: &mut GameState,
    victim: CombatantId,
    cause: KillCause,
    now: Millis,
    events: &mut Vec<GameEvent>,
) -> KillOutcome {
    let mode = state.mode;
    let permanent = {
        let Some(c) = state.get_combatant_mut(victim) else {
            return KillOutcome::Ignored;
        };
        if !c.alive {
            return KillOutcome::Ignored;
        }
        if !cause.is_forced() {
            if c.is_invincible(now) {
                return KillOutcome::Ignored;
            }
            if c.shield {
                c.shield = false;
                events.push(GameEvent::ShieldAbsorbed { entity_id: victim });
                debug!("Shield absorbed hit on {}", c.name);
                return KillOutcome::ShieldAbsorbed;
            }
        }

        c.alive = false;
        c.deaths += 1;
        let permanent = match mode {
            GameMode::LastStanding => {
                c.lives = 0;
                true
            }
            GameMode::Lives(_) | GameMode::FirstToKills(_) => {
                c.lives = c.lives.saturating_sub(1);
                c.lives == 0
            }
        };
        if !permanent {
            c.respawn_at = Some(now + mode.respawn_delay());
        }
        debug!("{} killed ({:?}), lives left {}", c.name, cause, c.lives);
        permanent
    };

    if !permanent {
        state.respawn_queue.push(RespawnEntry {
            id: victim,
            at: now + mode.respawn_delay(),
        });
    }

    let killer = cause.killer().filter(|&k| k != victim);
    if let Some(k) = killer.and_then(|k| state.get_combatant_mut(k)) {
        k.kills += 1;
    }
    events.push(GameEvent::CombatantKilled { victim, killer });

    KillOutcome::Killed { permanent }
}

/// Revive every queued combatant whose respawn time has passed.
/// Returns the revived ids in revival order.
pub fn process_respawns(state: &mut GameState, now: Millis, events: &mut Vec<GameEvent>) -> Vec<CombatantId> {
    let mut due: Vec<RespawnEntry> = Vec::new();
    state.respawn_queue.retain(|entry| {
        if entry.at <= now {
            due.push(*entry);
            false
        } else {
            true
        }
    });
    due.sort_by_key(|e| (e.at, state.combatants.get(&e.id).map_or(u8::MAX, |c| c.slot)));

    let mut revived = Vec::with_capacity(due.len());
    for entry in due {
        let Some(spawn) = state.get_combatant(entry.id).map(|c| c.spawn) else {
            continue;
        };
        let Some(position) = respawn_tile(state, spawn) else {
            continue;
        };
        if let Some(c) = state.get_combatant_mut(entry.id) {
            c.revive(position, now);
            debug!("{} respawned at {}", c.name, position);
        }
        events.push(GameEvent::CombatantRespawned {
            entity_id: entry.id,
            position,
        });
        revived.push(entry.id);
    }
    revived
}

/// Spawn tile, or the nearest open tile if the border has swallowed it
fn respawn_tile(state: &GameState, spawn: TilePos) -> Option<TilePos> {
    let open = |p: TilePos| !state.grid.get(p).is_solid() && !state.has_bomb_at(p);
    if open(spawn) {
        return Some(spawn);
    }
    state
        .grid
        .positions()
        .filter(|&p| open(p))
        .min_by_key(|&p| (p.manhattan(spawn), p.y, p.x))
}
