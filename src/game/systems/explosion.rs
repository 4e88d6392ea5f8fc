//! Bomb detonation and blast effects
//!
//! Chain detonations resolve within the same call through an explicit
//! depth-first worklist. A bomb is removed from the state before anything it
//! catches is pushed, so overlapping blasts can never revisit it.

use tracing::trace;

use crate::game::events::GameEvent;
use crate::game::state::{EntityId, GameState, Millis};
use crate::game::systems::blast::{bomb_blast, Blast};
use crate::game::systems::lifecycle::{kill, KillCause};

/// Detonate every bomb whose fuse has elapsed, oldest first.
/// Returns the number of bombs that went off, chain reactions included.
pub fn detonate_expired(state: &mut GameState, now: Millis, events: &mut Vec<GameEvent>) -> usize {
    let mut due: Vec<(Millis, EntityId)> = state
        .bombs
        .iter()
        .filter(|b| b.detonate_at <= now)
        .map(|b| (b.detonate_at, b.id))
        .collect();
    due.sort_unstable();

    due.into_iter()
        .map(|(_, id)| detonate_chain(state, id, now, events))
        .sum()
}

/// Detonate one bomb and everything its blast reaches
pub fn detonate_chain(state: &mut GameState, bomb_id: EntityId, now: Millis, events: &mut Vec<GameEvent>) -> usize {
    let mut stack = vec![bomb_id];
    let mut detonated = 0;

    while let Some(id) = stack.pop() {
        let Some(idx) = state.bombs.iter().position(|b| b.id == id) else {
            continue;
        };
        let bomb = state.bombs.remove(idx);
        detonated += 1;

        if let Some(owner) = state.get_combatant_mut(bomb.owner) {
            owner.bombs_active = owner.bombs_active.saturating_sub(1);
        }

        let blast = bomb_blast(&state.grid, bomb.position, bomb.power);
        trace!("Bomb {} detonated at {} ({} tiles)", bomb.id, bomb.position, blast.len());
        events.push(GameEvent::ExplosionOccurred {
            bomb_id: bomb.id,
            owner: bomb.owner,
            tiles: blast.tiles.clone(),
        });

        let caught = apply_blast_effects(state, &blast, KillCause::Blast { owner: bomb.owner }, now, events);
        // Reverse so the first caught bomb is handled next
        stack.extend(caught.into_iter().rev());
    }

    detonated
}

/// Kill combatants on the blast tiles and destroy its blocks.
/// Returns the ids of live bombs lying inside the blast.
pub fn apply_blast_effects(
    state: &mut GameState,
    blast: &Blast,
    cause: KillCause,
    now: Millis,
    events: &mut Vec<GameEvent>,
) -> Vec<EntityId> {
    for &pos in &blast.tiles {
        for victim in state.combatants_at(pos) {
            kill(state, victim, cause, now, events);
        }
    }

    for &pos in &blast.destroyed {
        state.destroy_block(pos);
    }

    blast
        .tiles
        .iter()
        .filter_map(|&pos| state.bomb_at(pos).map(|b| b.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::grid::{Grid, PowerupKind, Tile};
    use crate::game::state::{Bomb, Combatant, CombatantId, CombatantKind, GameMode};
    use crate::game::systems::ai_profile::Difficulty;
    use crate::util::tile::TilePos;
    use uuid::Uuid;

    fn add_bot(state: &mut GameState, slot: u8, pos: TilePos) -> CombatantId {
        let c = Combatant::new(
            Uuid::new_v4(),
            format!("Bot{}", slot),
            CombatantKind::Bot { difficulty: Difficulty::Medium },
            slot,
            pos,
            state.mode.starting_lives(),
        );
        let id = c.id;
        state.add_combatant(c);
        id
    }

    fn place(state: &mut GameState, owner: CombatantId, pos: TilePos, at: Millis) -> EntityId {
        let id = state.next_entity_id();
        state.bombs.push(Bomb {
            id,
            position: pos,
            owner,
            detonate_at: at,
            power: 2,
        });
        if let Some(c) = state.get_combatant_mut(owner) {
            c.bombs_active += 1;
        }
        id
    }

    #[test]
    fn test_only_expired_bombs_detonate() {
        let mut state = GameState::new(Grid::bordered(15, 15), GameMode::LastStanding);
        let owner = add_bot(&mut state, 0, TilePos::new(1, 1));
        place(&mut state, owner, TilePos::new(3, 3), 1000);
        place(&mut state, owner, TilePos::new(11, 11), 2000);
        let mut events = Vec::new();

        assert_eq!(detonate_expired(&mut state, 999, &mut events), 0);
        assert_eq!(detonate_expired(&mut state, 1000, &mut events), 1);
        assert_eq!(state.bombs.len(), 1);
        assert_eq!(state.get_combatant(owner).unwrap().bombs_active, 1);
    }

    #[test]
    fn test_blast_kills_and_destroys() {
        let mut grid = Grid::bordered(9, 9);
        grid.set(TilePos::new(4, 2), Tile::Block);
        grid.hide_powerup(TilePos::new(4, 2), PowerupKind::Flamethrower);
        let mut state = GameState::new(grid, GameMode::LastStanding);
        let owner = add_bot(&mut state, 0, TilePos::new(1, 1));
        let victim = add_bot(&mut state, 1, TilePos::new(6, 4));
        place(&mut state, owner, TilePos::new(4, 4), 0);
        let mut events = Vec::new();

        detonate_expired(&mut state, 0, &mut events);

        assert!(!state.get_combatant(victim).unwrap().alive);
        assert!(state.get_combatant(owner).unwrap().alive);
        assert_eq!(state.get_combatant(owner).unwrap().kills, 1);
        assert_eq!(state.grid.get(TilePos::new(4, 2)), Tile::PowerupFlamethrower);
        assert!(matches!(events[0], GameEvent::ExplosionOccurred { .. }));
    }

    #[test]
    fn test_chain_detonates_same_call() {
        let mut state = GameState::new(Grid::bordered(15, 5), GameMode::LastStanding);
        let owner = add_bot(&mut state, 0, TilePos::new(13, 3));
        place(&mut state, owner, TilePos::new(1, 2), 100);
        place(&mut state, owner, TilePos::new(3, 2), 9000);
        place(&mut state, owner, TilePos::new(5, 2), 9000);
        place(&mut state, owner, TilePos::new(11, 2), 9000);
        let mut events = Vec::new();

        let detonated = detonate_expired(&mut state, 100, &mut events);

        assert_eq!(detonated, 3);
        assert_eq!(state.bombs.len(), 1);
        assert_eq!(state.bombs[0].position, TilePos::new(11, 2));
        let explosions = events
            .iter()
            .filter(|e| matches!(e, GameEvent::ExplosionOccurred { .. }))
            .count();
        assert_eq!(explosions, 3);
    }

    #[test]
    fn test_cyclic_overlap_terminates() {
        let mut state = GameState::new(Grid::bordered(9, 9), GameMode::LastStanding);
        let owner = add_bot(&mut state, 0, TilePos::new(7, 7));
        // Every bomb reaches every other one
        for pos in [TilePos::new(3, 3), TilePos::new(4, 3), TilePos::new(3, 4), TilePos::new(4, 4)] {
            place(&mut state, owner, pos, 0);
        }
        let mut events = Vec::new();

        let detonated = detonate_expired(&mut state, 0, &mut events);

        assert_eq!(detonated, 4);
        assert!(state.bombs.is_empty());
        assert_eq!(state.get_combatant(owner).unwrap().bombs_active, 0);
    }

    #[test]
    fn test_victim_hit_by_two_blasts_dies_once() {
        let mut state = GameState::new(Grid::bordered(9, 9), GameMode::Lives(3));
        let owner = add_bot(&mut state, 0, TilePos::new(1, 7));
        let victim = add_bot(&mut state, 1, TilePos::new(4, 4));
        place(&mut state, owner, TilePos::new(3, 4), 0);
        place(&mut state, owner, TilePos::new(5, 4), 0);
        let mut events = Vec::new();

        detonate_expired(&mut state, 0, &mut events);

        let v = state.get_combatant(victim).unwrap();
        assert_eq!(v.deaths, 1);
        assert_eq!(v.lives, 2);
    }
}
