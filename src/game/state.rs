//! Game state definitions and structures
//!
//! Contains combatants, bombs, the grid and per-match bookkeeping. One
//! `GameState` belongs to exactly one room and is only mutated by that room.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::constants::{bomb, respawn};
use crate::game::grid::{Grid, Tile};
use crate::game::systems::ai_profile::Difficulty;
use crate::util::tile::{Direction, TilePos};

/// Unique combatant identifier (humans keep their lobby id)
pub type CombatantId = Uuid;

/// Identifier for bombs
pub type EntityId = u64;

/// Milliseconds on the room clock
pub type Millis = u64;

/// Directional weapon kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponKind {
    Flamethrower,
    Raygun,
}

/// Active weapon powerup with remaining charges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weapon {
    pub kind: WeaponKind,
    pub charges: u32,
}

/// Human or computer-controlled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatantKind {
    /// Linked to a lobby session
    Player { session_id: Uuid },
    /// Decision engine lives in the `AiManager` under the combatant's id
    Bot { difficulty: Difficulty },
}

/// A player or bot on the grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Combatant {
    pub id: CombatantId,
    pub name: String,
    pub kind: CombatantKind,
    /// Spawn slot index; also the deterministic tie-break order
    pub slot: u8,
    pub position: TilePos,
    pub spawn: TilePos,
    pub facing: Direction,
    pub alive: bool,
    /// Remaining lives; 0 with `alive == false` means out of the match
    pub lives: u32,
    pub bombs_active: u32,
    pub max_bombs: u32,
    pub bomb_power: u32,
    pub weapon: Option<Weapon>,
    pub shield: bool,
    pub kills: u32,
    pub deaths: u32,
    /// Hits are ignored until this timestamp
    pub invincible_until: Millis,
    /// Scheduled respawn, if queued
    pub respawn_at: Option<Millis>,
}

impl Combatant {
    pub fn new(id: CombatantId, name: String, kind: CombatantKind, slot: u8, spawn: TilePos, lives: u32) -> Self {
        Self {
            id,
            name,
            kind,
            slot,
            position: spawn,
            spawn,
            facing: Direction::Down,
            alive: true,
            lives,
            bombs_active: 0,
            max_bombs: bomb::DEFAULT_MAX_BOMBS,
            bomb_power: bomb::DEFAULT_POWER,
            weapon: None,
            shield: false,
            kills: 0,
            deaths: 0,
            invincible_until: 0,
            respawn_at: None,
        }
    }

    pub fn is_bot(&self) -> bool {
        matches!(self.kind, CombatantKind::Bot { .. })
    }

    /// Permanently out: dead with no lives left
    pub fn is_out(&self) -> bool {
        !self.alive && self.lives == 0
    }

    pub fn is_invincible(&self, now: Millis) -> bool {
        now < self.invincible_until
    }

    pub fn can_place_bomb(&self) -> bool {
        self.alive && self.bombs_active < self.max_bombs
    }

    /// Back at spawn with cleared powerups and a short invincibility window
    pub fn revive(&mut self, position: TilePos, now: Millis) {
        self.position = position;
        self.alive = true;
        self.shield = false;
        self.weapon = None;
        self.respawn_at = None;
        self.invincible_until = now + respawn::INVINCIBILITY_MS;
    }
}

/// A live bomb. Never mutated after placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bomb {
    pub id: EntityId,
    pub position: TilePos,
    pub owner: CombatantId,
    pub detonate_at: Millis,
    pub power: u32,
}

/// Match rules, fixed for a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    LastStanding,
    Lives(u32),
    FirstToKills(u32),
}

impl GameMode {
    pub fn starting_lives(self) -> u32 {
        match self {
            GameMode::LastStanding => 1,
            GameMode::Lives(n) => n.max(1),
            // Respawns never run out; the kill target ends the match
            GameMode::FirstToKills(_) => u32::MAX,
        }
    }

    pub fn respawn_delay(self) -> Millis {
        match self {
            GameMode::FirstToKills(_) => respawn::FIRST_TO_KILLS_DELAY_MS,
            _ => respawn::DELAY_MS,
        }
    }
}

impl Default for GameMode {
    fn default() -> Self {
        Self::LastStanding
    }
}

/// Room lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    /// Accepting joins, no simulation
    Lobby,
    /// Tick loop active
    Playing,
    /// Showing results, auto-transition scheduled
    Ended,
}

impl Default for RoomStatus {
    fn default() -> Self {
        Self::Lobby
    }
}

/// How a match ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    Winner(CombatantId),
    Draw,
    /// A participating player left mid-match
    Disconnect { player: CombatantId },
}

/// One recorded tile mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileChange {
    pub position: TilePos,
    pub tile: Tile,
}

/// Pending revival
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RespawnEntry {
    pub id: CombatantId,
    pub at: Millis,
}

/// Late-game escalation timers
#[derive(Debug, Clone, Default)]
pub struct LateGameState {
    /// When the last destructible block disappeared
    pub blocks_exhausted_at: Option<Millis>,
    pub next_drop_at: Millis,
    pub next_shrink_at: Millis,
    /// Rings already converted to wall (the border itself is ring 0)
    pub rings_closed: i32,
    /// Set once the playable area hit its minimum
    pub shrink_finished: bool,
}

/// Fixed spawn-slot table: corners, clockwise from top-left then diagonals
pub fn spawn_position(width: i32, height: i32, slot: u8) -> TilePos {
    match slot % 4 {
        0 => TilePos::new(1, 1),
        1 => TilePos::new(width - 2, height - 2),
        2 => TilePos::new(width - 2, 1),
        _ => TilePos::new(1, height - 2),
    }
}

/// Complete simulation state of one room
#[derive(Debug, Clone)]
pub struct GameState {
    pub tick: u64,
    pub mode: GameMode,
    pub grid: Grid,
    pub combatants: HashMap<CombatantId, Combatant>,
    pub bombs: Vec<Bomb>,
    pub respawn_queue: Vec<RespawnEntry>,
    pub late_game: LateGameState,
    tile_changes: Vec<TileChange>,
    next_entity_id: EntityId,
}

impl GameState {
    pub fn new(grid: Grid, mode: GameMode) -> Self {
        Self {
            tick: 0,
            mode,
            grid,
            combatants: HashMap::new(),
            bombs: Vec::new(),
            respawn_queue: Vec::new(),
            late_game: LateGameState::default(),
            tile_changes: Vec::new(),
            next_entity_id: 1,
        }
    }

    /// Generate a new unique entity ID
    pub fn next_entity_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    pub fn get_combatant(&self, id: CombatantId) -> Option<&Combatant> {
        self.combatants.get(&id)
    }

    pub fn get_combatant_mut(&mut self, id: CombatantId) -> Option<&mut Combatant> {
        self.combatants.get_mut(&id)
    }

    pub fn add_combatant(&mut self, combatant: Combatant) {
        self.combatants.insert(combatant.id, combatant);
    }

    pub fn remove_combatant(&mut self, id: CombatantId) -> Option<Combatant> {
        self.respawn_queue.retain(|e| e.id != id);
        self.combatants.remove(&id)
    }

    /// Ids ordered by spawn slot, for deterministic iteration
    pub fn ids_by_slot(&self) -> Vec<CombatantId> {
        let mut ids: Vec<(u8, CombatantId)> =
            self.combatants.values().map(|c| (c.slot, c.id)).collect();
        ids.sort_unstable();
        ids.into_iter().map(|(_, id)| id).collect()
    }

    pub fn alive_combatants(&self) -> impl Iterator<Item = &Combatant> {
        self.combatants.values().filter(|c| c.alive)
    }

    pub fn alive_count(&self) -> usize {
        self.alive_combatants().count()
    }

    /// Alive combatants standing on `pos`, in slot order
    pub fn combatants_at(&self, pos: TilePos) -> Vec<CombatantId> {
        self.ids_by_slot()
            .into_iter()
            .filter(|id| {
                self.combatants
                    .get(id)
                    .is_some_and(|c| c.alive && c.position == pos)
            })
            .collect()
    }

    pub fn bomb_at(&self, pos: TilePos) -> Option<&Bomb> {
        self.bombs.iter().find(|b| b.position == pos)
    }

    pub fn has_bomb_at(&self, pos: TilePos) -> bool {
        self.bomb_at(pos).is_some()
    }

    /// Single write path for grid tiles; records the change for broadcast
    pub fn apply_tile_change(&mut self, position: TilePos, tile: Tile) {
        if !self.grid.in_bounds(position) || self.grid.get(position) == tile {
            return;
        }
        self.grid.set(position, tile);
        self.tile_changes.push(TileChange { position, tile });
    }

    /// Destroy a block, revealing whatever it hid
    pub fn destroy_block(&mut self, position: TilePos) {
        if self.grid.get(position) != Tile::Block {
            return;
        }
        let revealed = self.grid.take_revealed(position);
        self.apply_tile_change(position, revealed);
    }

    /// Drain the tile changes recorded since the last call
    pub fn take_tile_changes(&mut self) -> Vec<TileChange> {
        std::mem::take(&mut self.tile_changes)
    }
}
