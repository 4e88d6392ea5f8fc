//! Late-game escalation
//!
//! Starts once the last destructible block is gone: powerups rain down at a
//! fixed interval, and after a longer delay the border closes in ring by ring.

use rand::Rng;
use tracing::{debug, info};

use crate::game::constants::late_game::*;
use crate::game::events::GameEvent;
use crate::game::grid::{PowerupKind, Tile};
use crate::game::state::{GameState, Millis};
use crate::game::systems::explosion::detonate_chain;
use crate::game::systems::lifecycle::{kill, KillCause};
use crate::util::tile::TilePos;

/// Advance late-game timers and apply whatever is due
pub fn update<R: Rng>(state: &mut GameState, now: Millis, rng: &mut R, events: &mut Vec<GameEvent>) {
    if state.late_game.blocks_exhausted_at.is_none() {
        if state.grid.block_count() > 0 {
            return;
        }
        let lg = &mut state.late_game;
        lg.blocks_exhausted_at = Some(now);
        lg.next_drop_at = now + DROP_INTERVAL_MS;
        lg.next_shrink_at = now + SHRINK_DELAY_MS;
        info!("Blocks exhausted at {}ms, late game started", now);
        return;
    }

    if now >= state.late_game.next_drop_at {
        state.late_game.next_drop_at = now + DROP_INTERVAL_MS;
        if state.grid.powerup_count() < MAX_POWERUPS_ON_MAP {
            drop_powerup(state, rng, events);
        }
    }

    if !state.late_game.shrink_finished && now >= state.late_game.next_shrink_at {
        state.late_game.next_shrink_at = now + SHRINK_INTERVAL_MS;
        shrink_border(state, now, events);
    }
}

/// Place a random powerup on a random free tile
fn drop_powerup<R: Rng>(state: &mut GameState, rng: &mut R, events: &mut Vec<GameEvent>) {
    let candidates: Vec<TilePos> = state
        .grid
        .positions()
        .filter(|&p| state.grid.get(p) == Tile::Empty)
        .filter(|&p| !state.has_bomb_at(p) && state.combatants_at(p).is_empty())
        .collect();
    if candidates.is_empty() {
        return;
    }

    let position = candidates[rng.gen_range(0..candidates.len())];
    let kind = PowerupKind::ALL[rng.gen_range(0..PowerupKind::ALL.len())];
    state.apply_tile_change(position, kind.tile());
    debug!("Dropped {:?} at {}", kind, position);
    events.push(GameEvent::PowerupDropped { position, kind });
}

/// Convert the next ring to wall. Returns the converted tiles.
pub fn shrink_border(state: &mut GameState, now: Millis, events: &mut Vec<GameEvent>) -> Vec<TilePos> {
    let ring = state.late_game.rings_closed + 1;
    let remaining_w = state.grid.width() - 2 * (ring + 1);
    let remaining_h = state.grid.height() - 2 * (ring + 1);
    if remaining_w < MIN_PLAYABLE_SIZE || remaining_h < MIN_PLAYABLE_SIZE {
        state.late_game.shrink_finished = true;
        info!("Border reached minimum size");
        return Vec::new();
    }

    let tiles: Vec<TilePos> = state
        .grid
        .positions()
        .filter(|&p| state.grid.ring_of(p) == ring && state.grid.get(p) != Tile::Wall)
        .collect();
    for &pos in &tiles {
        state.apply_tile_change(pos, Tile::Wall);
    }
    state.late_game.rings_closed = ring;

    for &pos in &tiles {
        for victim in state.combatants_at(pos) {
            kill(state, victim, KillCause::Border, now, events);
        }
    }
    let caught: Vec<_> = tiles
        .iter()
        .filter_map(|&pos| state.bomb_at(pos).map(|b| b.id))
        .collect();
    for id in caught {
        detonate_chain(state, id, now, events);
    }

    info!("Border shrunk to ring {} ({} tiles)", ring, tiles.len());
    events.push(GameEvent::BorderShrunk { tiles: tiles.clone() });
    tiles
}
