//! Bot decision engine
//!
//! One `BotBrain` per computer-controlled combatant. Every decision tick it
//! rebuilds the hazard map and walks a fixed priority list, stopping at the
//! first rule that yields an action:
//!
//! 1. Survive: leave hazardous tiles (never subject to mistakes)
//! 2. Retreat: keep moving away from a freshly placed bomb
//! 3. Mistake roll: a random step instead of the real decision
//! 4. Attack: fire a charged weapon, or bomb an opponent when safe
//! 5. Commitment: keep the previous direction for a short window
//! 6. Seek powerups, 7. Chase, 8. Clear blocks
//! 9. Fallback random step
//!
//! Emitted actions go through the same room handlers as human input.

use hashbrown::HashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::game::constants::ai::*;
use crate::game::constants::bomb::FUSE_MS;
use crate::game::grid::Tile;
use crate::game::state::{Combatant, CombatantId, GameState, Millis};
use crate::game::systems::ai_profile::{BotProfile, Difficulty, HazardAwareness, Pathing};
use crate::game::systems::blast::{bomb_blast, weapon_shot, Blast};
use crate::game::systems::hazard::HazardMap;
use crate::game::systems::pathfinding::{bfs_first_step, flood_fill, Passability};
use crate::util::tile::{Direction, TilePos};

/// A single bot decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotAction {
    Idle,
    Move(Direction),
    PlaceBomb,
    Fire(Direction),
}

#[derive(Debug, Clone, Copy)]
struct Commitment {
    direction: Direction,
    until: Millis,
}

#[derive(Debug, Clone, Copy)]
struct Retreat {
    origin: TilePos,
    power: u32,
}

/// What one bot sees on a decision tick
struct Perception<'a> {
    state: &'a GameState,
    me: &'a Combatant,
    hazard: HazardMap,
    pass: Passability<'a>,
    /// Living opponents in slot order
    opponents: Vec<&'a Combatant>,
    awareness: HazardAwareness,
}

impl<'a> Perception<'a> {
    fn new(state: &'a GameState, me: &'a Combatant, profile: &BotProfile) -> Self {
        let mut opponents: Vec<&Combatant> = state
            .alive_combatants()
            .filter(|c| c.id != me.id)
            .collect();
        opponents.sort_by_key(|c| c.slot);

        Self {
            state,
            me,
            hazard: HazardMap::build(&state.grid, &state.bombs, profile.chain_awareness),
            pass: Passability::with_bombs(&state.grid, &state.bombs),
            opponents,
            awareness: profile.awareness,
        }
    }

    fn position(&self) -> TilePos {
        self.me.position
    }

    /// Hazard as this bot perceives it
    fn perceives_hazard(&self, pos: TilePos) -> bool {
        match self.awareness {
            HazardAwareness::Full => self.hazard.is_hazardous(pos),
            HazardAwareness::AdjacentOnly => {
                pos.manhattan(self.position()) <= 1 && self.hazard.is_hazardous(pos)
            }
        }
    }

    fn in_danger(&self) -> bool {
        let here = self.position();
        match self.awareness {
            HazardAwareness::Full => self.hazard.is_hazardous(here),
            HazardAwareness::AdjacentOnly => {
                self.hazard.is_hazardous(here)
                    || here.neighbors().iter().any(|&(_, n)| self.hazard.is_hazardous(n))
            }
        }
    }

    /// Passability with hazardous first steps removed
    fn cautious_pass(&self) -> Passability<'a> {
        let mut pass = self.pass.clone();
        for (_, next) in self.position().neighbors() {
            if self.perceives_hazard(next) {
                pass = pass.with_blocked(next);
            }
        }
        pass
    }

    fn nearest_opponent(&self) -> Option<&'a Combatant> {
        let here = self.position();
        self.opponents
            .iter()
            .copied()
            .min_by_key(|c| (c.position.manhattan(here), c.slot))
    }
}

/// Decision engine of one bot
#[derive(Debug, Clone)]
pub struct BotBrain {
    pub id: CombatantId,
    pub profile: BotProfile,
    rng: StdRng,
    next_decision_at: Millis,
    last_bomb_at: Option<Millis>,
    last_move: Option<Direction>,
    commitment: Option<Commitment>,
    retreat: Option<Retreat>,
}

impl BotBrain {
    pub fn new(id: CombatantId, difficulty: Difficulty, seed: u64) -> Self {
        Self::with_profile(id, BotProfile::for_difficulty(difficulty), seed)
    }

    pub fn with_profile(id: CombatantId, profile: BotProfile, seed: u64) -> Self {
        Self {
            id,
            profile,
            rng: StdRng::seed_from_u64(seed),
            next_decision_at: 0,
            last_bomb_at: None,
            last_move: None,
            commitment: None,
            retreat: None,
        }
    }

    pub fn is_due(&self, now: Millis) -> bool {
        now >= self.next_decision_at
    }

    /// Decide the next action. `None` when not due yet or the bot is dead.
    pub fn decide(&mut self, state: &GameState, now: Millis) -> Option<BotAction> {
        if !self.is_due(now) {
            return None;
        }
        let me = state.get_combatant(self.id).filter(|c| c.alive)?;
        self.next_decision_at = now + self.profile.decision_interval_ms;

        let view = Perception::new(state, me, &self.profile);
        let action = self.choose(&view, now);
        self.record(action, me, now);
        trace!("Bot {} at {} -> {:?}", me.name, me.position, action);
        Some(action)
    }

    fn choose(&mut self, view: &Perception<'_>, now: Millis) -> BotAction {
        if let Some(action) = self.survive(view) {
            return action;
        }
        if let Some(action) = self.retreat(view) {
            return action;
        }
        if self.profile.mistake_chance > 0.0 && self.rng.gen_bool(self.profile.mistake_chance) {
            return self.random_step(view, false).map_or(BotAction::Idle, BotAction::Move);
        }
        if let Some(action) = self.attack(view, now) {
            return action;
        }
        if let Some(action) = self.follow_commitment(view, now) {
            return action;
        }
        if self.profile.seek_powerups {
            if let Some(dir) = self.seek(view) {
                return self.commit(dir, now);
            }
        }
        if let Some(dir) = self.chase(view) {
            return self.commit(dir, now);
        }
        if let Some(action) = self.clear(view, now) {
            return action;
        }
        self.random_step(view, true).map_or(BotAction::Idle, BotAction::Move)
    }

    fn record(&mut self, action: BotAction, me: &Combatant, now: Millis) {
        match action {
            BotAction::Move(dir) => self.last_move = Some(dir),
            BotAction::PlaceBomb => {
                self.last_bomb_at = Some(now);
                self.commitment = None;
                self.retreat = Some(Retreat {
                    origin: me.position,
                    power: me.bomb_power,
                });
            }
            BotAction::Idle | BotAction::Fire(_) => {}
        }
    }

    fn survive(&mut self, view: &Perception<'_>) -> Option<BotAction> {
        if !view.in_danger() {
            return None;
        }
        self.commitment = None;
        let route = bfs_first_step(view.position(), &view.pass, |p| !view.perceives_hazard(p));
        match route.and_then(|r| r.first_step) {
            Some(dir) => Some(BotAction::Move(dir)),
            // Danger only next door: the lower rules already step around it
            None if view.hazard.is_safe(view.position()) => None,
            // Boxed in
            None => Some(BotAction::Idle),
        }
    }

    fn retreat(&mut self, view: &Perception<'_>) -> Option<BotAction> {
        let retreat = self.retreat?;
        let safe_distance = retreat.power + RETREAT_MARGIN;
        let here = view.position();
        if !view.state.has_bomb_at(retreat.origin) || here.manhattan(retreat.origin) > safe_distance {
            self.retreat = None;
            return None;
        }
        let route = bfs_first_step(here, &view.cautious_pass(), |p| {
            p.manhattan(retreat.origin) > safe_distance && !view.perceives_hazard(p)
        })?;
        route.first_step.map(BotAction::Move)
    }

    fn bomb_ready(&self, view: &Perception<'_>, now: Millis) -> bool {
        let cooled = self
            .last_bomb_at
            .map_or(true, |t| now >= t + self.profile.bomb_cooldown_ms);
        cooled && view.me.can_place_bomb() && !view.state.has_bomb_at(view.position())
    }

    fn attack(&mut self, view: &Perception<'_>, now: Millis) -> Option<BotAction> {
        let targets: Vec<&Combatant> = view
            .opponents
            .iter()
            .copied()
            .filter(|c| !c.is_invincible(now))
            .collect();
        if targets.is_empty() {
            return None;
        }
        let here = view.position();
        let grid = &view.state.grid;

        if let Some(weapon) = view.me.weapon.filter(|w| w.charges > 0) {
            for dir in Direction::ALL {
                let shot = weapon_shot(grid, here, weapon.kind, dir);
                if targets.iter().any(|t| shot.contains(t.position)) {
                    return Some(BotAction::Fire(dir));
                }
            }
        }

        if !self.bomb_ready(view, now) {
            return None;
        }
        let blast = bomb_blast(grid, here, view.me.bomb_power);
        let hit: Vec<&Combatant> = targets
            .into_iter()
            .filter(|t| blast.contains(t.position))
            .collect();
        if hit.is_empty() {
            return None;
        }
        if self.profile.require_escape_route && !self.escape_route_exists(view, &blast, now) {
            return None;
        }
        if self.profile.use_trap_logic {
            let best = hit
                .iter()
                .map(|t| trap_score(view, t, &blast))
                .max()
                .unwrap_or(0);
            if best <= self.profile.trap_threshold {
                return None;
            }
        }
        Some(BotAction::PlaceBomb)
    }

    /// Is a hazard-free tile reachable before a bomb placed here would go off?
    fn escape_route_exists(&self, view: &Perception<'_>, blast: &Blast, now: Millis) -> bool {
        let mut hypothetical = view.hazard.clone();
        hypothetical.stamp(&blast.tiles, now + FUSE_MS);

        let interval = self.profile.decision_interval_ms.max(1);
        let max_steps = (FUSE_MS / interval).saturating_sub(ESCAPE_MARGIN_STEPS) as u32;
        let reach = flood_fill(view.position(), &view.pass, Some(max_steps));
        let found = reach.reachable().any(|(p, _)| hypothetical.is_safe(p));
        found
    }

    fn follow_commitment(&mut self, view: &Perception<'_>, now: Millis) -> Option<BotAction> {
        let commitment = self.commitment?;
        let next = view.position().step(commitment.direction);
        if now >= commitment.until || !view.pass.is_passable(next) || view.perceives_hazard(next) {
            self.commitment = None;
            return None;
        }
        Some(BotAction::Move(commitment.direction))
    }

    fn commit(&mut self, direction: Direction, now: Millis) -> BotAction {
        self.commitment = Some(Commitment {
            direction,
            until: now + COMMITMENT_MS,
        });
        BotAction::Move(direction)
    }

    fn seek(&self, view: &Perception<'_>) -> Option<Direction> {
        let grid = &view.state.grid;
        bfs_first_step(view.position(), &view.cautious_pass(), |p| grid.get(p).is_powerup())?.first_step
    }

    fn chase(&mut self, view: &Perception<'_>) -> Option<Direction> {
        if !self.profile.chase_enabled {
            return None;
        }
        let target = view.nearest_opponent()?;
        if target.position.manhattan(view.position()) > self.profile.chase_range {
            return None;
        }
        match self.profile.pathing {
            Pathing::Bfs => {
                bfs_first_step(view.position(), &view.cautious_pass(), |p| p == target.position)?.first_step
            }
            Pathing::Naive => self.random_step(view, true),
        }
    }

    fn clear(&mut self, view: &Perception<'_>, now: Millis) -> Option<BotAction> {
        let grid = &view.state.grid;
        let here = view.position();
        let next_to_block = |p: TilePos| p.neighbors().iter().any(|&(_, n)| grid.get(n) == Tile::Block);

        if next_to_block(here) && self.bomb_ready(view, now) {
            let blast = bomb_blast(grid, here, view.me.bomb_power);
            if !self.profile.require_escape_route || self.escape_route_exists(view, &blast, now) {
                return Some(BotAction::PlaceBomb);
            }
        }

        let dir = bfs_first_step(here, &view.cautious_pass(), |p| p != here && next_to_block(p))?.first_step?;
        Some(self.commit(dir, now))
    }

    /// Random passable step that avoids reversing when possible
    fn random_step(&mut self, view: &Perception<'_>, avoid_hazard: bool) -> Option<Direction> {
        let here = view.position();
        let open: Vec<Direction> = here
            .neighbors()
            .iter()
            .filter(|&&(_, n)| view.pass.is_passable(n))
            .filter(|&&(_, n)| !avoid_hazard || !view.perceives_hazard(n))
            .map(|&(d, _)| d)
            .collect();
        let reverse = self.last_move.map(Direction::opposite);
        let forward: Vec<Direction> = open.iter().copied().filter(|&d| Some(d) != reverse).collect();

        let choices = if forward.is_empty() { open } else { forward };
        if choices.is_empty() {
            return None;
        }
        Some(choices[self.rng.gen_range(0..choices.len())])
    }
}

/// How badly a bomb with `blast` would trap `target`: fewer nearby escape
/// tiles outside the blast score higher.
fn trap_score(view: &Perception<'_>, target: &Combatant, blast: &Blast) -> i32 {
    let pass = view.pass.clone().with_blocked(blast.origin);
    let reach = flood_fill(target.position, &pass, Some(view.me.bomb_power + 1));
    let escapes = reach
        .reachable()
        .filter(|&(p, _)| !blast.contains(p) && view.hazard.is_safe(p))
        .count()
        .min(TRAP_ESCAPE_CAP as usize) as i32;

    let mut score = TRAP_SCORE_PER_MISSING_ESCAPE * (TRAP_ESCAPE_CAP - escapes);
    if blast.contains(target.position) {
        score += TRAP_IN_BLAST_SCORE;
    }
    score
}

/// AI manager for all bots of one room
#[derive(Debug, Default)]
pub struct AiManager {
    brains: HashMap<CombatantId, BotBrain>,
}

impl AiManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_bot(&mut self, id: CombatantId, difficulty: Difficulty, seed: u64) {
        self.brains.insert(id, BotBrain::new(id, difficulty, seed));
    }

    pub fn insert(&mut self, brain: BotBrain) {
        self.brains.insert(brain.id, brain);
    }

    pub fn unregister_bot(&mut self, id: CombatantId) {
        self.brains.remove(&id);
    }

    pub fn get(&self, id: CombatantId) -> Option<&BotBrain> {
        self.brains.get(&id)
    }

    pub fn clear(&mut self) {
        self.brains.clear();
    }

    pub fn len(&self) -> usize {
        self.brains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brains.is_empty()
    }

    /// Decision of one bot against the current state. `None` for unknown ids,
    /// dead bots and bots that are not due yet.
    pub fn decide(&mut self, id: CombatantId, state: &GameState, now: Millis) -> Option<BotAction> {
        self.brains.get_mut(&id)?.decide(state, now)
    }
}
