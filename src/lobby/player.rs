use uuid::Uuid;

use crate::game::state::CombatantId;

/// Player connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerConnectionState {
    Connected,
    /// Transport dropped; the room treats this like leaving mid-match
    Disconnected,
    Left,
}

/// A human participant as the lobby sees it
#[derive(Debug, Clone)]
pub struct LobbyPlayer {
    /// Also the combatant id once a match starts
    pub id: CombatantId,
    pub name: String,
    /// Transport-level session the player arrived on
    pub session_id: Uuid,
    pub connection_state: PlayerConnectionState,
    pub room_id: Option<Uuid>,
    pub ping_ms: u32,
}

impl LobbyPlayer {
    pub fn new(id: CombatantId, name: String) -> Self {
        Self {
            id,
            name,
            session_id: Uuid::new_v4(),
            connection_state: PlayerConnectionState::Connected,
            room_id: None,
            ping_ms: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state == PlayerConnectionState::Connected
    }

    pub fn disconnect(&mut self) {
        self.connection_state = PlayerConnectionState::Disconnected;
    }

    pub fn reconnect(&mut self) {
        self.connection_state = PlayerConnectionState::Connected;
    }

    pub fn leave(&mut self) {
        self.connection_state = PlayerConnectionState::Left;
        self.room_id = None;
    }

    pub fn update_ping(&mut self, ping_ms: u32) {
        self.ping_ms = ping_ms;
    }
}
