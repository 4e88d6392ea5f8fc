//! Authoritative simulation of one match
//!
//! `GameLoop` is the single writer of a room's `GameState`. Human input and
//! bot decisions both go through `handle_move`, `handle_bomb` and
//! `handle_fire`; invalid requests are dropped without a state change.
//!
//! Tick order: bomb expiry, respawns, late-game effects, win check, bots.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace};

use crate::anticheat::rate_limiter::RateLimiterManager;
use crate::config::MatchSettings;
use crate::game::constants::bomb::FUSE_MS;
use crate::game::constants::map::MAX_COMBATANTS;
use crate::game::constants::weapon::{FLAMETHROWER_CHARGES, RAYGUN_CHARGES};
use crate::game::events::GameEvent;
use crate::game::grid::{PowerupKind, Tile};
use crate::game::mapgen;
use crate::game::match_result::check_match_end;
use crate::game::state::{
    spawn_position, Bomb, Combatant, CombatantId, CombatantKind, GameState, MatchOutcome, Millis,
    Weapon, WeaponKind,
};
use crate::game::systems::ai::{AiManager, BotAction};
use crate::game::systems::blast::weapon_shot;
use crate::game::systems::explosion::{apply_blast_effects, detonate_chain, detonate_expired};
use crate::game::systems::late_game;
use crate::game::systems::lifecycle::{process_respawns, KillCause};
use crate::util::tile::Direction;

/// A participant handed over by the lobby at match start
#[derive(Debug, Clone)]
pub struct Entrant {
    pub id: CombatantId,
    pub name: String,
    pub kind: CombatantKind,
}

/// One running match
#[derive(Debug)]
pub struct GameLoop {
    state: GameState,
    ai: AiManager,
    limiter: RateLimiterManager,
    rng: StdRng,
    events: Vec<GameEvent>,
    started_at: Millis,
}

impl GameLoop {
    /// Fresh grid, every entrant at its spawn slot, one brain per bot
    pub fn start(entrants: &[Entrant], settings: &MatchSettings, seed: u64, now: Millis) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let grid = mapgen::generate(settings.width, settings.height, &mut rng);
        let mut state = GameState::new(grid, settings.mode);

        for (slot, entrant) in entrants.iter().take(MAX_COMBATANTS).enumerate() {
            let slot = slot as u8;
            let spawn = spawn_position(settings.width, settings.height, slot);
            state.add_combatant(Combatant::new(
                entrant.id,
                entrant.name.clone(),
                entrant.kind.clone(),
                slot,
                spawn,
                settings.mode.starting_lives(),
            ));
        }

        let mut game = Self::with_rng(state, rng, now);
        game.events.push(GameEvent::MatchStarted { mode: settings.mode });
        info!(
            "Match started: {:?}, {} combatants on {}x{}",
            settings.mode,
            game.state.combatants.len(),
            settings.width,
            settings.height
        );
        game
    }

    /// Wrap an existing state (custom maps, tests)
    pub fn from_state(state: GameState, seed: u64, now: Millis) -> Self {
        Self::with_rng(state, StdRng::seed_from_u64(seed), now)
    }

    fn with_rng(state: GameState, mut rng: StdRng, now: Millis) -> Self {
        let mut ai = AiManager::new();
        let mut limiter = RateLimiterManager::new();
        for id in state.ids_by_slot() {
            limiter.register(id);
            if let Some(CombatantKind::Bot { difficulty }) = state.get_combatant(id).map(|c| &c.kind) {
                ai.register_bot(id, *difficulty, rng.gen());
            }
        }

        Self {
            state,
            ai,
            limiter,
            rng,
            events: Vec::new(),
            started_at: now,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Direct state access for scenario setup in tests
    #[cfg(test)]
    pub(crate) fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn bot_count(&self) -> usize {
        self.ai.len()
    }

    pub fn elapsed(&self, now: Millis) -> Millis {
        now.saturating_sub(self.started_at)
    }

    /// Take every event produced since the last call
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Advance the simulation. Returns the outcome once a win condition holds.
    pub fn tick(&mut self, now: Millis) -> Option<MatchOutcome> {
        self.state.tick += 1;

        detonate_expired(&mut self.state, now, &mut self.events);
        process_respawns(&mut self.state, now, &mut self.events);
        late_game::update(&mut self.state, now, &mut self.rng, &mut self.events);

        let outcome = check_match_end(&self.state);
        if outcome.is_none() {
            // One bot at a time in slot order; each sees what the previous ones did
            for id in self.state.ids_by_slot() {
                if let Some(action) = self.ai.decide(id, &self.state, now) {
                    self.apply_bot_action(id, action, now);
                }
            }
        }

        let changes = self.state.take_tile_changes();
        if !changes.is_empty() {
            self.events.push(GameEvent::TilesChanged { changes });
        }
        outcome
    }

    fn apply_bot_action(&mut self, id: CombatantId, action: BotAction, now: Millis) {
        match action {
            BotAction::Idle => {}
            BotAction::Move(dir) => {
                self.handle_move(id, dir, now);
            }
            BotAction::PlaceBomb => {
                self.handle_bomb(id, now);
            }
            BotAction::Fire(dir) => {
                self.handle_fire(id, Some(dir), now);
            }
        }
    }

    /// Step one tile. Rejected when dead, blocked, or too fast.
    pub fn handle_move(&mut self, id: CombatantId, dir: Direction, now: Millis) -> bool {
        let Some(c) = self.state.get_combatant(id).filter(|c| c.alive) else {
            trace!("Move rejected for {}: not alive", id);
            return false;
        };
        let target = c.position.step(dir);
        if !self.state.grid.in_bounds(target) || self.state.grid.get(target).is_solid() {
            trace!("Move rejected for {}: {} is blocked", id, target);
            return false;
        }
        if self.state.has_bomb_at(target) {
            trace!("Move rejected for {}: bomb at {}", id, target);
            return false;
        }
        if let Err(violation) = self.limiter.check_move(id, now) {
            trace!("Move rejected for {}: {}", id, violation);
            return false;
        }

        if let Some(c) = self.state.get_combatant_mut(id) {
            c.position = target;
            c.facing = dir;
        }
        self.collect_powerup(id);
        true
    }

    fn collect_powerup(&mut self, id: CombatantId) {
        let Some(position) = self.state.get_combatant(id).map(|c| c.position) else {
            return;
        };
        let Some(kind) = self.state.grid.get(position).powerup() else {
            return;
        };
        self.state.apply_tile_change(position, Tile::Empty);
        if let Some(c) = self.state.get_combatant_mut(id) {
            match kind {
                PowerupKind::Shield => c.shield = true,
                PowerupKind::Flamethrower => {
                    c.weapon = Some(Weapon {
                        kind: WeaponKind::Flamethrower,
                        charges: FLAMETHROWER_CHARGES,
                    })
                }
                PowerupKind::Raygun => {
                    c.weapon = Some(Weapon {
                        kind: WeaponKind::Raygun,
                        charges: RAYGUN_CHARGES,
                    })
                }
            }
            debug!("{} picked up {:?}", c.name, kind);
        }
        self.events.push(GameEvent::PowerupCollected { entity_id: id, kind });
    }

    /// Drop a bomb on the combatant's tile
    pub fn handle_bomb(&mut self, id: CombatantId, now: Millis) -> bool {
        let Some(c) = self.state.get_combatant(id) else {
            return false;
        };
        if !c.can_place_bomb() {
            trace!("Bomb rejected for {}: dead or no allowance", id);
            return false;
        }
        let (position, power) = (c.position, c.bomb_power);
        if self.state.has_bomb_at(position) {
            trace!("Bomb rejected for {}: tile occupied", id);
            return false;
        }
        if let Err(violation) = self.limiter.check_action(id, now) {
            trace!("Bomb rejected for {}: {}", id, violation);
            return false;
        }

        let bomb_id = self.state.next_entity_id();
        self.state.bombs.push(Bomb {
            id: bomb_id,
            position,
            owner: id,
            detonate_at: now + FUSE_MS,
            power,
        });
        if let Some(c) = self.state.get_combatant_mut(id) {
            c.bombs_active += 1;
        }
        true
    }

    /// Discharge the active weapon, towards `direction` or the facing
    pub fn handle_fire(&mut self, id: CombatantId, direction: Option<Direction>, now: Millis) -> bool {
        let Some(c) = self.state.get_combatant(id).filter(|c| c.alive) else {
            return false;
        };
        let Some(weapon) = c.weapon.filter(|w| w.charges > 0) else {
            trace!("Fire rejected for {}: no charge", id);
            return false;
        };
        let origin = c.position;
        let direction = direction.unwrap_or(c.facing);
        if let Err(violation) = self.limiter.check_action(id, now) {
            trace!("Fire rejected for {}: {}", id, violation);
            return false;
        }

        if let Some(c) = self.state.get_combatant_mut(id) {
            c.facing = direction;
            c.weapon = (weapon.charges > 1).then_some(Weapon {
                charges: weapon.charges - 1,
                ..weapon
            });
        }

        let blast = weapon_shot(&self.state.grid, origin, weapon.kind, direction);
        debug!("{} fired {:?} {:?} ({} tiles)", id, weapon.kind, direction, blast.len());
        self.events.push(GameEvent::WeaponFired {
            shooter: id,
            weapon: weapon.kind,
            direction,
            origin,
            tiles: blast.tiles.clone(),
        });

        let caught = apply_blast_effects(&mut self.state, &blast, KillCause::Weapon { shooter: id }, now, &mut self.events);
        for bomb_id in caught {
            detonate_chain(&mut self.state, bomb_id, now, &mut self.events);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::grid::Grid;
    use crate::game::state::GameMode;
    use crate::game::systems::ai_profile::Difficulty;
    use crate::util::tile::TilePos;
    use uuid::Uuid;

    fn player(slot: u8, pos: TilePos, lives: u32) -> Combatant {
        Combatant::new(
            Uuid::new_v4(),
            format!("P{}", slot),
            CombatantKind::Player { session_id: Uuid::new_v4() },
            slot,
            pos,
            lives,
        )
    }

    /// Two players on an open grid, no bots
    fn duel(mode: GameMode) -> (GameLoop, CombatantId, CombatantId) {
        let mut state = GameState::new(Grid::bordered(11, 11), mode);
        let a = player(0, TilePos::new(1, 1), mode.starting_lives());
        let b = player(1, TilePos::new(9, 9), mode.starting_lives());
        let (a_id, b_id) = (a.id, b.id);
        state.add_combatant(a);
        state.add_combatant(b);
        (GameLoop::from_state(state, 7, 0), a_id, b_id)
    }

    fn entrants(humans: usize, bots: usize) -> Vec<Entrant> {
        let mut list = Vec::new();
        for i in 0..humans {
            list.push(Entrant {
                id: Uuid::new_v4(),
                name: format!("Human{}", i),
                kind: CombatantKind::Player { session_id: Uuid::new_v4() },
            });
        }
        for i in 0..bots {
            list.push(Entrant {
                id: Uuid::new_v4(),
                name: format!("Bot{}", i),
                kind: CombatantKind::Bot { difficulty: Difficulty::Hard },
            });
        }
        list
    }

    #[test]
    fn test_start_places_spawns_and_bots() {
        let settings = MatchSettings { humans: 1, bots: 3, ..MatchSettings::default() };
        let mut game = GameLoop::start(&entrants(1, 3), &settings, 11, 0);

        assert_eq!(game.state().combatants.len(), 4);
        assert_eq!(game.bot_count(), 3);
        for c in game.state().combatants.values() {
            assert_eq!(c.position, spawn_position(settings.width, settings.height, c.slot));
            assert!(!game.state().grid.get(c.position).is_solid());
        }
        assert_eq!(game.drain_events(), vec![GameEvent::MatchStarted { mode: GameMode::LastStanding }]);
    }

    #[test]
    fn test_move_validation() {
        let (mut game, a, _) = duel(GameMode::LastStanding);

        // Border wall
        assert!(!game.handle_move(a, Direction::Up, 0));
        assert!(game.handle_move(a, Direction::Right, 0));
        assert_eq!(game.state().get_combatant(a).unwrap().position, TilePos::new(2, 1));
        assert_eq!(game.state().get_combatant(a).unwrap().facing, Direction::Right);

        // Too fast
        assert!(!game.handle_move(a, Direction::Right, 50));
        assert!(game.handle_move(a, Direction::Right, 100));
    }

    #[test]
    fn test_cannot_walk_into_bomb() {
        let (mut game, a, _) = duel(GameMode::LastStanding);
        assert!(game.handle_bomb(a, 0));
        assert!(game.handle_move(a, Direction::Right, 0));
        assert!(!game.handle_move(a, Direction::Left, 200));
    }

    #[test]
    fn test_bomb_allowance() {
        let (mut game, a, _) = duel(GameMode::LastStanding);
        assert!(game.handle_bomb(a, 0));
        assert!(!game.handle_bomb(a, 10));
        assert_eq!(game.state().bombs.len(), 1);
        assert_eq!(game.state().bombs[0].detonate_at, FUSE_MS);
        assert_eq!(game.state().get_combatant(a).unwrap().bombs_active, 1);
    }

    #[test]
    fn test_dead_cannot_act() {
        let (mut game, a, _) = duel(GameMode::LastStanding);
        game.state.get_combatant_mut(a).unwrap().alive = false;
        assert!(!game.handle_move(a, Direction::Right, 0));
        assert!(!game.handle_bomb(a, 0));
        assert!(!game.handle_fire(a, None, 0));
        assert!(!game.handle_move(Uuid::new_v4(), Direction::Right, 0));
    }

    #[test]
    fn test_pickup_weapon_replaces_previous() {
        let (mut game, a, _) = duel(GameMode::LastStanding);
        game.state.apply_tile_change(TilePos::new(2, 1), Tile::PowerupFlamethrower);
        game.state.apply_tile_change(TilePos::new(3, 1), Tile::PowerupRaygun);
        game.state.apply_tile_change(TilePos::new(4, 1), Tile::PowerupShield);

        game.handle_move(a, Direction::Right, 0);
        assert_eq!(game.state().get_combatant(a).unwrap().weapon.unwrap().kind, WeaponKind::Flamethrower);
        game.handle_move(a, Direction::Right, 100);
        let weapon = game.state().get_combatant(a).unwrap().weapon.unwrap();
        assert_eq!(weapon, Weapon { kind: WeaponKind::Raygun, charges: RAYGUN_CHARGES });
        game.handle_move(a, Direction::Right, 200);
        assert!(game.state().get_combatant(a).unwrap().shield);
        assert_eq!(game.state().grid.get(TilePos::new(3, 1)), Tile::Empty);
    }

    #[test]
    fn test_fire_kills_and_consumes_charge() {
        let (mut game, a, b) = duel(GameMode::LastStanding);
        game.state.get_combatant_mut(a).unwrap().weapon = Some(Weapon { kind: WeaponKind::Raygun, charges: 1 });
        game.state.get_combatant_mut(b).unwrap().position = TilePos::new(1, 8);

        assert!(game.handle_fire(a, Some(Direction::Down), 0));

        assert!(!game.state().get_combatant(b).unwrap().alive);
        let shooter = game.state().get_combatant(a).unwrap();
        assert!(shooter.weapon.is_none());
        assert_eq!(shooter.facing, Direction::Down);
        assert_eq!(shooter.kills, 1);
        assert!(!game.handle_fire(a, None, 10));
    }

    #[test]
    fn test_fire_uses_facing_and_skips_own_tile() {
        let (mut game, a, _) = duel(GameMode::LastStanding);
        {
            let c = game.state.get_combatant_mut(a).unwrap();
            c.weapon = Some(Weapon { kind: WeaponKind::Flamethrower, charges: 2 });
            c.facing = Direction::Right;
        }
        assert!(game.handle_fire(a, None, 0));

        let events = game.drain_events();
        let GameEvent::WeaponFired { direction, tiles, .. } = &events[0] else {
            panic!("expected WeaponFired");
        };
        assert_eq!(*direction, Direction::Right);
        assert!(!tiles.contains(&TilePos::new(1, 1)));
        assert!(game.state().get_combatant(a).unwrap().alive);
        assert_eq!(game.state().get_combatant(a).unwrap().weapon.unwrap().charges, 1);
    }

    #[test]
    fn test_fire_detonates_bomb_in_path() {
        let (mut game, a, b) = duel(GameMode::LastStanding);
        game.state.get_combatant_mut(a).unwrap().weapon = Some(Weapon { kind: WeaponKind::Raygun, charges: 2 });
        game.state.get_combatant_mut(b).unwrap().position = TilePos::new(8, 3);
        game.state.bombs.push(Bomb {
            id: 50,
            position: TilePos::new(8, 1),
            owner: b,
            detonate_at: 99_999,
            power: 2,
        });
        game.state.get_combatant_mut(b).unwrap().bombs_active = 1;

        game.handle_fire(a, Some(Direction::Right), 0);

        assert!(game.state().bombs.is_empty());
        // Own bomb killed its owner
        assert!(!game.state().get_combatant(b).unwrap().alive);
        assert_eq!(game.state().get_combatant(a).unwrap().kills, 0);
    }

    #[test]
    fn test_last_standing_ends_in_kill_tick() {
        let (mut game, a, b) = duel(GameMode::LastStanding);
        game.state.get_combatant_mut(b).unwrap().position = TilePos::new(3, 1);
        game.handle_bomb(a, 0);
        game.handle_move(a, Direction::Down, 0);
        game.handle_move(a, Direction::Right, 100);

        assert_eq!(game.tick(FUSE_MS - 1), None);
        assert_eq!(game.tick(FUSE_MS), Some(MatchOutcome::Winner(a)));
    }

    #[test]
    fn test_first_to_kills_target_wins() {
        let (mut game, a, b) = duel(GameMode::FirstToKills(2));
        game.state.get_combatant_mut(a).unwrap().weapon = Some(Weapon { kind: WeaponKind::Raygun, charges: 2 });
        game.state.get_combatant_mut(b).unwrap().position = TilePos::new(1, 5);

        game.handle_fire(a, Some(Direction::Down), 0);
        assert_eq!(game.tick(16), None);

        // Respawned at its spawn, walk it back into line and shoot again
        let respawn_at = game.state().get_combatant(b).unwrap().respawn_at.unwrap();
        game.tick(respawn_at);
        assert!(game.state().get_combatant(b).unwrap().alive);
        game.state.get_combatant_mut(b).unwrap().position = TilePos::new(1, 6);
        game.state.get_combatant_mut(b).unwrap().invincible_until = 0;

        game.handle_fire(a, Some(Direction::Down), respawn_at + 10);
        assert_eq!(game.state().get_combatant(a).unwrap().kills, 2);
        assert_eq!(game.tick(respawn_at + 20), Some(MatchOutcome::Winner(a)));
    }

    #[test]
    fn test_later_bot_sees_earlier_bomb_in_same_tick() {
        use crate::game::systems::ai::BotBrain;
        use crate::game::systems::ai_profile::BotProfile;

        let grid = Grid::parse(&["###########", "#.........#", "###########"]);
        let mut state = GameState::new(grid, GameMode::LastStanding);
        let bot = |slot: u8, pos: TilePos| {
            Combatant::new(
                Uuid::new_v4(),
                format!("Bot{}", slot),
                CombatantKind::Bot { difficulty: Difficulty::Medium },
                slot,
                pos,
                1,
            )
        };
        let a = bot(0, TilePos::new(3, 1));
        let b = bot(1, TilePos::new(1, 1));
        let (a_id, b_id) = (a.id, b.id);
        state.add_combatant(a);
        state.add_combatant(b);

        let mut game = GameLoop::from_state(state, 3, 0);
        let profile = BotProfile {
            mistake_chance: 0.0,
            ..BotProfile::for_difficulty(Difficulty::Medium)
        };
        game.ai.insert(BotBrain::with_profile(a_id, profile.clone(), 1));
        game.ai.insert(BotBrain::with_profile(b_id, profile, 2));

        game.tick(0);

        // A bombs first; B is then caught in the dead end and must not bomb too
        let owners: Vec<_> = game.state().bombs.iter().map(|bomb| bomb.owner).collect();
        assert_eq!(owners, vec![a_id]);
        assert_eq!(game.state().get_combatant(b_id).unwrap().bombs_active, 0);
    }

    #[test]
    fn test_tile_changes_broadcast_once_per_tick() {
        let mut state = GameState::new(Grid::bordered(11, 11), GameMode::Lives(3));
        state.grid.set(TilePos::new(3, 1), Tile::Block);
        let a = player(0, TilePos::new(1, 1), 3);
        let b = player(1, TilePos::new(9, 9), 3);
        let a_id = a.id;
        state.add_combatant(a);
        state.add_combatant(b);
        let mut game = GameLoop::from_state(state, 3, 0);

        game.handle_bomb(a_id, 0);
        game.handle_move(a_id, Direction::Down, 0);
        game.handle_move(a_id, Direction::Down, 100);
        game.handle_move(a_id, Direction::Right, 200);
        game.drain_events();

        game.tick(FUSE_MS);
        let events = game.drain_events();
        let tile_events: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                GameEvent::TilesChanged { changes } => Some(changes.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(tile_events.len(), 1);
        assert_eq!(tile_events[0][0].position, TilePos::new(3, 1));

        game.tick(FUSE_MS + 16);
        assert!(!game
            .drain_events()
            .iter()
            .any(|e| matches!(e, GameEvent::TilesChanged { .. })));
    }

    #[test]
    fn test_bot_match_keeps_invariants() {
        let settings = MatchSettings {
            humans: 0,
            bots: 4,
            width: 11,
            height: 11,
            ..MatchSettings::default()
        };
        let mut game = GameLoop::start(&entrants(0, 4), &settings, 21, 0);

        let mut now = 0;
        for _ in 0..3000 {
            now += 16;
            let outcome = game.tick(now);
            let state = game.state();
            for c in state.alive_combatants() {
                assert!(!state.grid.get(c.position).is_solid(), "{} inside solid tile", c.name);
            }
            for c in state.combatants.values() {
                let owned = state.bombs.iter().filter(|b| b.owner == c.id).count() as u32;
                assert_eq!(c.bombs_active, owned);
            }
            if outcome.is_some() {
                break;
            }
        }
    }
}
