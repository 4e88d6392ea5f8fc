//! Outbound room events, broadcast to every participant

use serde::{Deserialize, Serialize};

use crate::game::grid::PowerupKind;
use crate::game::state::{CombatantId, EntityId, GameMode, MatchOutcome, TileChange, WeaponKind};
use crate::util::tile::{Direction, TilePos};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// A bomb detonated (chain detonations each emit their own event)
    ExplosionOccurred {
        bomb_id: EntityId,
        owner: CombatantId,
        tiles: Vec<TilePos>,
    },
    /// A directional weapon was discharged
    WeaponFired {
        shooter: CombatantId,
        weapon: WeaponKind,
        direction: Direction,
        origin: TilePos,
        tiles: Vec<TilePos>,
    },
    /// A shield absorbed an otherwise lethal hit
    ShieldAbsorbed { entity_id: CombatantId },
    CombatantKilled {
        victim: CombatantId,
        killer: Option<CombatantId>,
    },
    CombatantRespawned {
        entity_id: CombatantId,
        position: TilePos,
    },
    PowerupCollected {
        entity_id: CombatantId,
        kind: PowerupKind,
    },
    PowerupDropped {
        position: TilePos,
        kind: PowerupKind,
    },
    BorderShrunk { tiles: Vec<TilePos> },
    /// All tile mutations of one tick
    TilesChanged { changes: Vec<TileChange> },
    RestartVoteProgress { current: usize, needed: usize },
    MatchStarted { mode: GameMode },
    MatchEnded { outcome: MatchOutcome },
}
