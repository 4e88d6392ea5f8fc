use std::time::Instant;

use hashbrown::{HashMap, HashSet};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::config::MatchSettings;
use crate::game::constants::room::RESTART_DELAY_MS;
use crate::game::events::GameEvent;
use crate::game::game_loop::{Entrant, GameLoop};
use crate::game::match_result::{determine_result, MatchResult};
use crate::game::state::{CombatantId, CombatantKind, MatchOutcome, Millis, RoomStatus};
use crate::lobby::player::LobbyPlayer;
use crate::net::protocol::{ClientMessage, GameSnapshot, ServerMessage};

/// Delayed exit from `Ended`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingTransition {
    at: Millis,
    /// Start a fresh round when the population allows; otherwise back to Lobby
    rematch: bool,
}

/// One room: lobby roster, the running match and its status machine
#[derive(Debug)]
pub struct GameRoom {
    pub id: Uuid,
    pub name: String,
    pub created_at: Instant,
    status: RoomStatus,
    settings: MatchSettings,
    players: HashMap<CombatantId, LobbyPlayer>,
    /// Join order decides spawn slots
    join_order: Vec<CombatantId>,
    game: Option<GameLoop>,
    result: Option<MatchResult>,
    restart_votes: HashSet<CombatantId>,
    pending: Option<PendingTransition>,
    outbox: Vec<ServerMessage>,
    rng: StdRng,
    matches_played: u64,
}

impl GameRoom {
    pub fn new(name: String, settings: MatchSettings) -> Self {
        let rng = settings
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self {
            id: Uuid::new_v4(),
            name,
            created_at: Instant::now(),
            status: RoomStatus::Lobby,
            settings,
            players: HashMap::new(),
            join_order: Vec::new(),
            game: None,
            result: None,
            restart_votes: HashSet::new(),
            pending: None,
            outbox: Vec::new(),
            rng,
            matches_played: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    /// Result of the most recent match
    pub fn result(&self) -> Option<&MatchResult> {
        self.result.as_ref()
    }

    pub fn game(&self) -> Option<&GameLoop> {
        self.game.as_ref()
    }

    pub fn matches_played(&self) -> u64 {
        self.matches_played
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Connected humans
    pub fn human_count(&self) -> usize {
        self.players.values().filter(|p| p.is_connected()).count()
    }

    /// Disconnected seats do not hold a place
    pub fn is_full(&self) -> bool {
        self.human_count() >= self.settings.humans
    }

    pub fn is_bot_only(&self) -> bool {
        self.settings.humans == 0
    }

    /// A human room with nobody connected; safe to drop unless mid-match
    pub fn is_abandoned(&self) -> bool {
        !self.is_bot_only() && self.human_count() == 0 && self.status != RoomStatus::Playing
    }

    fn has_enough_players(&self) -> bool {
        self.human_count() >= self.settings.humans
    }

    pub fn get_player(&self, player_id: CombatantId) -> Option<&LobbyPlayer> {
        self.players.get(&player_id)
    }

    /// Player ids in join order
    pub fn player_ids(&self) -> Vec<CombatantId> {
        self.join_order.clone()
    }

    /// Add a human to the roster. Only possible in Lobby.
    pub fn add_player(&mut self, mut player: LobbyPlayer) -> Result<(), RoomError> {
        if self.status != RoomStatus::Lobby {
            return Err(RoomError::GameInProgress);
        }
        if self.players.contains_key(&player.id) {
            return Err(RoomError::AlreadyJoined);
        }
        if self.is_full() {
            return Err(RoomError::RoomFull);
        }

        info!("{} joined room '{}'", player.name, self.name);
        player.room_id = Some(self.id);
        self.join_order.push(player.id);
        self.players.insert(player.id, player);
        Ok(())
    }

    /// Remove a player. Leaving a running match ends it for everyone.
    pub fn remove_player(&mut self, player_id: CombatantId, now: Millis) -> Option<LobbyPlayer> {
        let mut player = self.players.remove(&player_id)?;
        self.join_order.retain(|id| *id != player_id);
        player.leave();
        info!("{} left room '{}'", player.name, self.name);

        self.abort_if_participant(player_id, now);
        if self.status == RoomStatus::Ended && self.restart_votes.remove(&player_id) {
            self.broadcast_vote_progress(now);
        }
        Some(player)
    }

    /// Transport dropped. The player stays on the roster but no longer counts.
    pub fn disconnect_player(&mut self, player_id: CombatantId, now: Millis) -> Result<(), RoomError> {
        let player = self
            .players
            .get_mut(&player_id)
            .ok_or(RoomError::PlayerNotFound)?;
        player.disconnect();
        self.restart_votes.remove(&player_id);
        self.abort_if_participant(player_id, now);
        Ok(())
    }

    pub fn reconnect_player(&mut self, player_id: CombatantId) -> Result<(), RoomError> {
        let player = self
            .players
            .get_mut(&player_id)
            .ok_or(RoomError::PlayerNotFound)?;
        player.reconnect();
        Ok(())
    }

    fn abort_if_participant(&mut self, player_id: CombatantId, now: Millis) {
        let participates = self
            .game
            .as_ref()
            .is_some_and(|g| g.state().get_combatant(player_id).is_some());
        if self.status == RoomStatus::Playing && participates {
            self.end_match(MatchOutcome::Disconnect { player: player_id }, now);
        }
    }

    /// Route an inbound message. Returns a direct reply for the sender, if any.
    pub fn handle_message(&mut self, player_id: CombatantId, message: ClientMessage, now: Millis) -> Option<ServerMessage> {
        if !self.players.get(&player_id).is_some_and(|p| p.is_connected()) {
            trace!("Ignoring message from {}: not in room", player_id);
            return None;
        }

        match message {
            ClientMessage::Move { direction } => {
                self.game_action(player_id, |game| game.handle_move(player_id, direction, now));
            }
            ClientMessage::PlaceBomb => {
                self.game_action(player_id, |game| game.handle_bomb(player_id, now));
            }
            ClientMessage::FireWeapon { direction } => {
                self.game_action(player_id, |game| game.handle_fire(player_id, direction, now));
            }
            ClientMessage::RequestRestart => self.request_restart(player_id, now),
            ClientMessage::Ping { timestamp } => {
                return Some(ServerMessage::Pong {
                    client_timestamp: timestamp,
                    server_timestamp: now,
                });
            }
            ClientMessage::JoinRequest { .. } | ClientMessage::Leave => {
                trace!("Roster message from {} reached the room, ignoring", player_id);
            }
        }
        None
    }

    fn game_action(&mut self, player_id: CombatantId, action: impl FnOnce(&mut GameLoop) -> bool) {
        if self.status != RoomStatus::Playing {
            trace!("Action from {} ignored: room is {:?}", player_id, self.status);
            return;
        }
        if let Some(game) = self.game.as_mut() {
            action(game);
        }
    }

    /// Vote for an immediate rematch while results are shown
    pub fn request_restart(&mut self, player_id: CombatantId, now: Millis) {
        if self.status != RoomStatus::Ended {
            trace!("Restart vote from {} ignored: room is {:?}", player_id, self.status);
            return;
        }
        if !self.players.get(&player_id).is_some_and(|p| p.is_connected()) {
            return;
        }
        if self.restart_votes.insert(player_id) {
            self.broadcast_vote_progress(now);
        }
    }

    fn broadcast_vote_progress(&mut self, now: Millis) {
        let needed = self.human_count();
        let current = self
            .restart_votes
            .iter()
            .filter(|id| self.players.get(*id).is_some_and(|p| p.is_connected()))
            .count();
        self.outbox.push(ServerMessage::Event(GameEvent::RestartVoteProgress { current, needed }));
        debug!("Room '{}' restart votes {}/{}", self.name, current, needed);

        if needed > 0 && current >= needed {
            info!("Room '{}' unanimous restart", self.name);
            self.rematch_or_lobby(now);
        }
    }

    /// Start a match by hand. The tick does this automatically once the roster is complete.
    pub fn start_game(&mut self, now: Millis) -> Result<(), RoomError> {
        if self.status != RoomStatus::Lobby {
            return Err(RoomError::GameInProgress);
        }
        if !self.has_enough_players() {
            return Err(RoomError::NotEnoughPlayers);
        }
        self.launch(now);
        Ok(())
    }

    fn launch(&mut self, now: Millis) {
        let mut entrants: Vec<Entrant> = self
            .join_order
            .iter()
            .filter_map(|id| self.players.get(id))
            .filter(|p| p.is_connected())
            .take(self.settings.humans)
            .map(|p| Entrant {
                id: p.id,
                name: p.name.clone(),
                kind: CombatantKind::Player { session_id: p.session_id },
            })
            .collect();
        entrants.extend((0..self.settings.bots).map(|i| Entrant {
            id: Uuid::new_v4(),
            name: format!("Bot {}", i + 1),
            kind: CombatantKind::Bot { difficulty: self.settings.difficulty },
        }));

        let seed = self.rng.gen();
        let mut game = GameLoop::start(&entrants, &self.settings, seed, now);
        self.outbox.extend(game.drain_events().into_iter().map(ServerMessage::Event));
        self.game = Some(game);

        // Supersedes any transition scheduled by the previous match
        self.pending = None;
        self.restart_votes.clear();
        self.result = None;
        self.matches_played += 1;
        self.set_status(RoomStatus::Playing);
        info!("Room '{}' match #{} started", self.name, self.matches_played);
    }

    fn end_match(&mut self, outcome: MatchOutcome, now: Millis) -> Option<MatchResult> {
        let game = self.game.as_ref()?;
        let result = determine_result(game.state(), outcome, game.elapsed(now));
        info!(
            "Room '{}' match #{} ended: {:?} after {}ms",
            self.name, self.matches_played, outcome, result.duration_ms
        );

        self.outbox.push(ServerMessage::Event(GameEvent::MatchEnded { outcome }));
        self.outbox.push(ServerMessage::MatchResult(result.clone()));
        self.result = Some(result.clone());
        self.pending = Some(PendingTransition {
            at: now + RESTART_DELAY_MS,
            rematch: !matches!(outcome, MatchOutcome::Disconnect { .. }),
        });
        self.set_status(RoomStatus::Ended);
        Some(result)
    }

    fn rematch_or_lobby(&mut self, now: Millis) {
        if self.has_enough_players() {
            self.launch(now);
        } else {
            self.return_to_lobby();
        }
    }

    fn return_to_lobby(&mut self) {
        self.game = None;
        self.pending = None;
        self.restart_votes.clear();
        self.drop_disconnected();
        self.set_status(RoomStatus::Lobby);
        info!("Room '{}' back in lobby", self.name);
    }

    /// Seats of players whose transport is gone are released in Lobby
    fn drop_disconnected(&mut self) {
        let gone: Vec<CombatantId> = self
            .players
            .values()
            .filter(|p| !p.is_connected())
            .map(|p| p.id)
            .collect();
        for id in gone {
            if let Some(mut player) = self.players.remove(&id) {
                player.leave();
                debug!("Released seat of {} in room '{}'", player.name, self.name);
            }
            self.join_order.retain(|other| *other != id);
        }
    }

    fn set_status(&mut self, status: RoomStatus) {
        self.status = status;
        self.outbox.push(ServerMessage::StatusChange { status });
    }

    /// Advance the room. Returns the result when a match ended during this call.
    pub fn update(&mut self, now: Millis) -> Option<MatchResult> {
        match self.status {
            RoomStatus::Lobby => {
                if self.has_enough_players() {
                    self.launch(now);
                }
                None
            }
            RoomStatus::Playing => {
                let game = self.game.as_mut()?;
                let outcome = game.tick(now);
                let events = game.drain_events();
                self.outbox.extend(events.into_iter().map(ServerMessage::Event));
                outcome.and_then(|outcome| self.end_match(outcome, now))
            }
            RoomStatus::Ended => {
                if let Some(pending) = self.pending.filter(|p| now >= p.at) {
                    if pending.rematch {
                        self.rematch_or_lobby(now);
                    } else {
                        self.return_to_lobby();
                    }
                }
                None
            }
        }
    }

    /// Current mirrored state
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot::build(
            self.status,
            &self.settings,
            self.game.as_ref().map(GameLoop::state),
            self.result.as_ref(),
        )
    }

    /// Take everything queued for broadcast
    pub fn drain_outbox(&mut self) -> Vec<ServerMessage> {
        std::mem::take(&mut self.outbox)
    }
}

/// Room errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("Room is full")]
    RoomFull,
    #[error("Game already in progress")]
    GameInProgress,
    #[error("Not enough players")]
    NotEnoughPlayers,
    #[error("Player not found")]
    PlayerNotFound,
    #[error("Player already in this room")]
    AlreadyJoined,
}
