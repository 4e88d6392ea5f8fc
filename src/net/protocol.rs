use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::MatchSettings;
use crate::game::events::GameEvent;
use crate::game::grid::Tile;
use crate::game::match_result::MatchResult;
use crate::game::state::{
    Bomb, Combatant, CombatantId, EntityId, GameMode, GameState, Millis, RoomStatus, Weapon,
};
use crate::util::tile::{Direction, TilePos};

/// Messages from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Request to join a room
    JoinRequest { player_name: String },
    /// Step one tile
    Move { direction: Direction },
    /// Drop a bomb on the current tile
    PlaceBomb,
    /// Discharge the active weapon; `None` fires along the facing
    FireWeapon { direction: Option<Direction> },
    /// Vote for an immediate restart while the room shows results
    RequestRestart,
    /// Leave the room
    Leave,
    /// Ping for latency measurement
    Ping { timestamp: u64 },
}

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Confirmation of joining with assigned combatant ID
    JoinAccepted { player_id: CombatantId, room_id: Uuid },
    /// Join was rejected
    JoinRejected { reason: String },
    /// Full mirrored room state
    Snapshot(GameSnapshot),
    /// Broadcast game event
    Event(GameEvent),
    /// Room status changed
    StatusChange { status: RoomStatus },
    /// Final standings of the last match
    MatchResult(MatchResult),
    /// Pong response with server timestamp
    Pong {
        client_timestamp: u64,
        server_timestamp: u64,
    },
}

/// Combatant record as mirrored to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatantSnapshot {
    pub id: CombatantId,
    pub name: String,
    pub is_bot: bool,
    pub slot: u8,
    pub position: TilePos,
    pub facing: Direction,
    pub alive: bool,
    pub lives: u32,
    pub bombs_active: u32,
    pub max_bombs: u32,
    pub weapon: Option<Weapon>,
    pub shield: bool,
    pub kills: u32,
    pub deaths: u32,
    pub invincible_until: Millis,
    pub respawn_at: Option<Millis>,
}

impl CombatantSnapshot {
    pub fn from_combatant(c: &Combatant) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            is_bot: c.is_bot(),
            slot: c.slot,
            position: c.position,
            facing: c.facing,
            alive: c.alive,
            lives: c.lives,
            bombs_active: c.bombs_active,
            max_bombs: c.max_bombs,
            weapon: c.weapon,
            shield: c.shield,
            kills: c.kills,
            deaths: c.deaths,
            invincible_until: c.invincible_until,
            respawn_at: c.respawn_at,
        }
    }
}

/// Bomb record as mirrored to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BombSnapshot {
    pub id: EntityId,
    pub position: TilePos,
    pub owner: CombatantId,
    pub detonate_at: Millis,
    pub power: u32,
}

impl BombSnapshot {
    pub fn from_bomb(bomb: &Bomb) -> Self {
        Self {
            id: bomb.id,
            position: bomb.position,
            owner: bomb.owner,
            detonate_at: bomb.detonate_at,
            power: bomb.power,
        }
    }
}

/// Everything the rendering layer needs to draw a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub tick: u64,
    pub status: RoomStatus,
    pub mode: GameMode,
    pub width: i32,
    pub height: i32,
    /// Row-major, `width * height` entries; empty while no match was played yet
    pub tiles: Vec<Tile>,
    pub combatants: Vec<CombatantSnapshot>,
    pub bombs: Vec<BombSnapshot>,
    pub result: Option<MatchResult>,
    pub settings: MatchSettings,
}

impl GameSnapshot {
    /// Mirror a room. `state` is `None` before the first match.
    pub fn build(
        status: RoomStatus,
        settings: &MatchSettings,
        state: Option<&GameState>,
        result: Option<&MatchResult>,
    ) -> Self {
        let Some(state) = state else {
            return Self {
                tick: 0,
                status,
                mode: settings.mode,
                width: settings.width,
                height: settings.height,
                tiles: Vec::new(),
                combatants: Vec::new(),
                bombs: Vec::new(),
                result: result.cloned(),
                settings: settings.clone(),
            };
        };

        Self {
            tick: state.tick,
            status,
            mode: state.mode,
            width: state.grid.width(),
            height: state.grid.height(),
            tiles: state.grid.tiles().to_vec(),
            combatants: state
                .ids_by_slot()
                .into_iter()
                .filter_map(|id| state.get_combatant(id))
                .map(CombatantSnapshot::from_combatant)
                .collect(),
            bombs: state.bombs.iter().map(BombSnapshot::from_bomb).collect(),
            result: result.cloned(),
            settings: settings.clone(),
        }
    }

    /// Tile at `pos`, walls outside the grid
    pub fn tile(&self, pos: TilePos) -> Tile {
        if pos.x < 0 || pos.y < 0 || pos.x >= self.width || pos.y >= self.height {
            return Tile::Wall;
        }
        self.tiles
            .get((pos.y * self.width + pos.x) as usize)
            .copied()
            .unwrap_or(Tile::Wall)
    }
}

/// Encode a message using bincode
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, EncodeError> {
    bincode::serde::encode_to_vec(message, bincode::config::legacy())
        .map_err(|e| EncodeError(e.to_string()))
}

/// Decode a message using bincode
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, DecodeError> {
    bincode::serde::decode_from_slice(data, bincode::config::legacy())
        .map(|(msg, _)| msg)
        .map_err(|e| DecodeError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(String);
