use hashbrown::HashMap;
use rayon::prelude::*;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{ConfigError, MatchSettings};
use crate::game::match_result::MatchResult;
use crate::game::state::{CombatantId, Millis, RoomStatus};
use crate::lobby::player::LobbyPlayer;
use crate::lobby::room::{GameRoom, RoomError};
use crate::net::protocol::{ClientMessage, ServerMessage};

/// Lobby manager for managing game rooms
#[derive(Debug)]
pub struct LobbyManager {
    rooms: HashMap<Uuid, GameRoom>,
    player_rooms: HashMap<CombatantId, Uuid>,
    max_rooms: usize,
    default_settings: MatchSettings,
}

impl LobbyManager {
    pub fn new(max_rooms: usize, default_settings: MatchSettings) -> Self {
        Self {
            rooms: HashMap::new(),
            player_rooms: HashMap::new(),
            max_rooms,
            default_settings,
        }
    }

    /// Create a room with the default match settings
    pub fn create_room(&mut self, name: String) -> Result<Uuid, ManagerError> {
        let settings = self.default_settings.clone();
        self.create_room_with(name, settings)
    }

    pub fn create_room_with(&mut self, name: String, settings: MatchSettings) -> Result<Uuid, ManagerError> {
        if self.rooms.len() >= self.max_rooms {
            return Err(ManagerError::TooManyRooms);
        }
        settings.validate()?;

        let room = GameRoom::new(name, settings);
        let id = room.id();
        info!("Room '{}' created ({} humans, {} bots)", room.name, room.settings().humans, room.settings().bots);
        self.rooms.insert(id, room);
        Ok(id)
    }

    /// A lobby room with a free seat, or a new one
    pub fn find_or_create_room(&mut self) -> Result<Uuid, ManagerError> {
        let open = self
            .rooms
            .values()
            .filter(|room| room.status() == RoomStatus::Lobby && !room.is_bot_only() && !room.is_full())
            .min_by_key(|room| room.created_at)
            .map(GameRoom::id);
        if let Some(id) = open {
            return Ok(id);
        }

        self.create_room(format!("Game {}", self.rooms.len() + 1))
    }

    pub fn get_room(&self, room_id: Uuid) -> Option<&GameRoom> {
        self.rooms.get(&room_id)
    }

    pub fn get_room_mut(&mut self, room_id: Uuid) -> Option<&mut GameRoom> {
        self.rooms.get_mut(&room_id)
    }

    pub fn remove_room(&mut self, room_id: Uuid) -> Option<GameRoom> {
        let room = self.rooms.remove(&room_id)?;
        for player_id in room.player_ids() {
            self.player_rooms.remove(&player_id);
        }
        Some(room)
    }

    pub fn join_room(&mut self, room_id: Uuid, player: LobbyPlayer) -> Result<(), ManagerError> {
        let player_id = player.id;
        if self.player_rooms.contains_key(&player_id) {
            return Err(ManagerError::AlreadyInRoom);
        }

        let room = self
            .rooms
            .get_mut(&room_id)
            .ok_or(ManagerError::RoomNotFound)?;
        room.add_player(player)?;
        self.player_rooms.insert(player_id, room_id);
        Ok(())
    }

    pub fn leave_room(&mut self, player_id: CombatantId, now: Millis) -> Result<(), ManagerError> {
        let room_id = self
            .player_rooms
            .remove(&player_id)
            .ok_or(ManagerError::NotInRoom)?;

        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.remove_player(player_id, now);
            if room.is_abandoned() {
                info!("Room '{}' is empty, closing", room.name);
                self.rooms.remove(&room_id);
            }
        }
        Ok(())
    }

    /// Transport of `player_id` dropped. Ends a running match it takes part in.
    pub fn disconnect_player(&mut self, player_id: CombatantId, now: Millis) -> Result<(), ManagerError> {
        let room_id = *self
            .player_rooms
            .get(&player_id)
            .ok_or(ManagerError::NotInRoom)?;
        let room = self
            .rooms
            .get_mut(&room_id)
            .ok_or(ManagerError::RoomNotFound)?;
        room.disconnect_player(player_id, now)?;
        Ok(())
    }

    pub fn reconnect_player(&mut self, player_id: CombatantId) -> Result<(), ManagerError> {
        let room_id = *self
            .player_rooms
            .get(&player_id)
            .ok_or(ManagerError::NotInRoom)?;
        let room = self
            .rooms
            .get_mut(&room_id)
            .ok_or(ManagerError::RoomNotFound)?;
        room.reconnect_player(player_id)?;
        Ok(())
    }

    /// Dispatch an inbound message from `player_id`. Returns a direct reply, if any.
    pub fn handle_message(&mut self, player_id: CombatantId, message: ClientMessage, now: Millis) -> Option<ServerMessage> {
        match message {
            ClientMessage::JoinRequest { player_name } => {
                let joined = self.find_or_create_room().and_then(|room_id| {
                    self.join_room(room_id, LobbyPlayer::new(player_id, player_name))
                        .map(|_| room_id)
                });
                Some(match joined {
                    Ok(room_id) => ServerMessage::JoinAccepted { player_id, room_id },
                    Err(e) => {
                        warn!("Join rejected for {}: {}", player_id, e);
                        ServerMessage::JoinRejected { reason: e.to_string() }
                    }
                })
            }
            ClientMessage::Leave => {
                // Leaving twice is harmless
                let _ = self.leave_room(player_id, now);
                None
            }
            message => {
                let room_id = self.player_rooms.get(&player_id)?;
                self.rooms
                    .get_mut(room_id)?
                    .handle_message(player_id, message, now)
            }
        }
    }

    pub fn get_player_room(&self, player_id: CombatantId) -> Option<Uuid> {
        self.player_rooms.get(&player_id).copied()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_player_count(&self) -> usize {
        self.player_rooms.len()
    }

    /// Room browser listing
    pub fn list_rooms(&self) -> Vec<RoomInfo> {
        let mut rooms: Vec<RoomInfo> = self
            .rooms
            .values()
            .map(|room| RoomInfo {
                id: room.id(),
                name: room.name.clone(),
                player_count: room.player_count(),
                max_humans: room.settings().humans,
                bots: room.settings().bots,
                status: room.status(),
                matches_played: room.matches_played(),
            })
            .collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        rooms
    }

    /// Advance every room in parallel. Returns the matches that ended during this call.
    pub fn update_all(&mut self, now: Millis) -> Vec<(Uuid, MatchResult)> {
        let finished: Vec<(Uuid, MatchResult)> = self
            .rooms
            .par_values_mut()
            .filter_map(|room| room.update(now).map(|result| (room.id(), result)))
            .collect();

        let abandoned: Vec<Uuid> = self
            .rooms
            .values()
            .filter(|room| room.is_abandoned())
            .map(GameRoom::id)
            .collect();
        for room_id in abandoned {
            self.remove_room(room_id);
        }
        // Rooms release disconnected seats when they go back to Lobby
        let rooms = &self.rooms;
        self.player_rooms
            .retain(|player_id, room_id| rooms.get(room_id).is_some_and(|r| r.get_player(*player_id).is_some()));

        finished
    }

    /// Rooms by id, for broadcasting and metrics
    pub fn rooms(&self) -> impl Iterator<Item = &GameRoom> {
        self.rooms.values()
    }

    pub fn rooms_mut(&mut self) -> impl Iterator<Item = &mut GameRoom> {
        self.rooms.values_mut()
    }

    pub async fn shutdown_all_rooms(&mut self) {
        for room in self.rooms.values() {
            info!(
                "Closing room '{}' ({:?}, {} matches played)",
                room.name,
                room.status(),
                room.matches_played()
            );
        }
        self.rooms.clear();
        self.player_rooms.clear();
    }
}

impl Default for LobbyManager {
    fn default() -> Self {
        Self::new(100, MatchSettings::default())
    }
}

/// Room information for listing
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub id: Uuid,
    pub name: String,
    pub player_count: usize,
    pub max_humans: usize,
    pub bots: usize,
    pub status: RoomStatus,
    pub matches_played: u64,
}

/// Manager errors
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("Too many rooms")]
    TooManyRooms,
    #[error("Room not found")]
    RoomNotFound,
    #[error("Already in a room")]
    AlreadyInRoom,
    #[error("Not in a room")]
    NotInRoom,
    #[error("Invalid match settings: {0}")]
    InvalidSettings(#[from] ConfigError),
    #[error("Room error: {0}")]
    RoomError(#[from] RoomError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::room::RESTART_DELAY_MS;
    use crate::game::systems::ai_profile::Difficulty;

    fn create_player(name: &str) -> LobbyPlayer {
        LobbyPlayer::new(Uuid::new_v4(), name.to_string())
    }

    fn two_player_settings() -> MatchSettings {
        MatchSettings {
            humans: 2,
            bots: 0,
            ..MatchSettings::default()
        }
    }

    #[test]
    fn test_create_room() {
        let mut manager = LobbyManager::default();
        let room_id = manager.create_room("Test Room".to_string()).unwrap();

        assert!(manager.get_room(room_id).is_some());
        assert_eq!(manager.room_count(), 1);
    }

    #[test]
    fn test_max_rooms() {
        let mut manager = LobbyManager::new(2, MatchSettings::default());
        manager.create_room("Room 1".to_string()).unwrap();
        manager.create_room("Room 2".to_string()).unwrap();

        let result = manager.create_room("Room 3".to_string());
        assert!(matches!(result, Err(ManagerError::TooManyRooms)));
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let mut manager = LobbyManager::default();
        let settings = MatchSettings { width: 8, ..MatchSettings::default() };
        let result = manager.create_room_with("Bad".to_string(), settings);
        assert!(matches!(result, Err(ManagerError::InvalidSettings(_))));
    }

    #[test]
    fn test_join_and_leave_room() {
        let mut manager = LobbyManager::new(10, two_player_settings());
        let room_id = manager.create_room("Test".to_string()).unwrap();
        let player = create_player("Player1");
        let player_id = player.id;

        manager.join_room(room_id, player).unwrap();
        assert_eq!(manager.get_player_room(player_id), Some(room_id));
        assert_eq!(manager.total_player_count(), 1);

        manager.leave_room(player_id, 0).unwrap();
        assert!(manager.get_player_room(player_id).is_none());
        assert!(matches!(manager.leave_room(player_id, 0), Err(ManagerError::NotInRoom)));
    }

    #[test]
    fn test_cannot_join_twice() {
        let mut manager = LobbyManager::new(10, two_player_settings());
        let room_id = manager.create_room("Test".to_string()).unwrap();
        let player1 = create_player("Player1");
        let player2 = LobbyPlayer::new(player1.id, "Player1".to_string());

        manager.join_room(room_id, player1).unwrap();
        let result = manager.join_room(room_id, player2);

        assert!(matches!(result, Err(ManagerError::AlreadyInRoom)));
    }

    #[test]
    fn test_find_or_create_room() {
        let mut manager = LobbyManager::new(10, two_player_settings());

        let room_id1 = manager.find_or_create_room().unwrap();
        assert_eq!(manager.room_count(), 1);

        let room_id2 = manager.find_or_create_room().unwrap();
        assert_eq!(room_id1, room_id2);

        manager.join_room(room_id1, create_player("P1")).unwrap();
        manager.join_room(room_id1, create_player("P2")).unwrap();
        let room_id3 = manager.find_or_create_room().unwrap();
        assert_ne!(room_id1, room_id3);
    }

    #[test]
    fn test_join_request_message() {
        let mut manager = LobbyManager::new(10, two_player_settings());
        let player_id = Uuid::new_v4();

        let reply = manager.handle_message(player_id, ClientMessage::JoinRequest { player_name: "Ann".to_string() }, 0);
        let Some(ServerMessage::JoinAccepted { room_id, .. }) = reply else {
            panic!("expected JoinAccepted, got {:?}", reply);
        };
        assert_eq!(manager.get_player_room(player_id), Some(room_id));

        let again = manager.handle_message(player_id, ClientMessage::JoinRequest { player_name: "Ann".to_string() }, 0);
        assert!(matches!(again, Some(ServerMessage::JoinRejected { .. })));

        manager.handle_message(player_id, ClientMessage::Leave, 0);
        assert!(manager.get_player_room(player_id).is_none());
    }

    #[test]
    fn test_messages_reach_room() {
        let mut manager = LobbyManager::new(10, MatchSettings::default());
        let player_id = Uuid::new_v4();
        manager.handle_message(player_id, ClientMessage::JoinRequest { player_name: "Ann".to_string() }, 0);
        manager.update_all(0);

        manager.handle_message(player_id, ClientMessage::PlaceBomb, 10);

        let room_id = manager.get_player_room(player_id).unwrap();
        let room = manager.get_room(room_id).unwrap();
        assert_eq!(room.status(), RoomStatus::Playing);
        assert_eq!(room.game().unwrap().state().bombs.len(), 1);

        // Unknown senders get nothing
        assert!(manager.handle_message(Uuid::new_v4(), ClientMessage::PlaceBomb, 20).is_none());
    }

    #[test]
    fn test_list_rooms() {
        let mut manager = LobbyManager::default();
        manager.create_room("Room B".to_string()).unwrap();
        manager.create_room("Room A".to_string()).unwrap();

        let rooms = manager.list_rooms();
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].name, "Room A");
        assert_eq!(rooms[0].status, RoomStatus::Lobby);
    }

    #[test]
    fn test_empty_room_cleanup() {
        let mut manager = LobbyManager::new(10, two_player_settings());
        let room_id = manager.create_room("Test".to_string()).unwrap();
        let player = create_player("P1");
        let player_id = player.id;

        manager.join_room(room_id, player).unwrap();
        manager.leave_room(player_id, 0).unwrap();

        assert!(manager.get_room(room_id).is_none());

        // Never-joined rooms go on the next update
        manager.create_room("Idle".to_string()).unwrap();
        manager.update_all(0);
        assert_eq!(manager.room_count(), 0);
    }

    #[test]
    fn test_disconnected_seat_reopens_room() {
        let mut manager = LobbyManager::new(10, two_player_settings());
        let room_id = manager.create_room("Test".to_string()).unwrap();
        let (p1, p2) = (create_player("P1"), create_player("P2"));
        let (p1_id, p2_id) = (p1.id, p2.id);
        manager.join_room(room_id, p1).unwrap();
        manager.join_room(room_id, p2).unwrap();
        manager.update_all(0);
        assert_eq!(manager.get_room(room_id).unwrap().status(), RoomStatus::Playing);

        manager.disconnect_player(p2_id, 100).unwrap();
        assert_eq!(manager.get_room(room_id).unwrap().status(), RoomStatus::Ended);

        manager.update_all(100 + RESTART_DELAY_MS);
        assert_eq!(manager.get_room(room_id).unwrap().status(), RoomStatus::Lobby);
        assert_eq!(manager.get_player_room(p1_id), Some(room_id));
        assert!(manager.get_player_room(p2_id).is_none());

        let newcomer = Uuid::new_v4();
        let reply = manager.handle_message(newcomer, ClientMessage::JoinRequest { player_name: "P3".to_string() }, 200 + RESTART_DELAY_MS);
        assert_eq!(reply, Some(ServerMessage::JoinAccepted { player_id: newcomer, room_id }));

        manager.update_all(300 + RESTART_DELAY_MS);
        assert_eq!(manager.get_room(room_id).unwrap().status(), RoomStatus::Playing);
    }

    #[test]
    fn test_disconnect_requires_membership() {
        let mut manager = LobbyManager::default();
        assert!(matches!(manager.disconnect_player(Uuid::new_v4(), 0), Err(ManagerError::NotInRoom)));
        assert!(matches!(manager.reconnect_player(Uuid::new_v4()), Err(ManagerError::NotInRoom)));
    }

    #[test]
    fn test_update_all_runs_bot_rooms() {
        let mut manager = LobbyManager::default();
        for i in 0..3 {
            let settings = MatchSettings {
                seed: Some(i),
                ..MatchSettings::demo(2, Difficulty::Easy)
            };
            manager.create_room_with(format!("Demo {}", i), settings).unwrap();
        }

        manager.update_all(0);
        manager.update_all(16);

        assert_eq!(manager.room_count(), 3);
        assert!(manager.rooms().all(|room| room.status() == RoomStatus::Playing));
        assert!(manager.rooms().all(|room| room.game().unwrap().state().tick == 1));
    }

    #[test]
    fn test_shutdown_all_rooms() {
        let mut manager = LobbyManager::default();
        manager.create_room_with("Demo".to_string(), MatchSettings::demo(2, Difficulty::Medium)).unwrap();

        tokio_test::block_on(manager.shutdown_all_rooms());

        assert_eq!(manager.room_count(), 0);
        assert_eq!(manager.total_player_count(), 0);
    }
}
