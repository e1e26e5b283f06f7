//! Authoritative state of a single room.
//!
//! `Room` only mutates data and reports what happened; timers and outbound
//! messages are driven by [`crate::session::RoomSession`].

use crate::config::SpawnArea;
use log::info;
use rand::Rng;
use shared::{ConnectionId, Player, PlayerMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    Waiting,
    Playing,
}

/// What a `set_word_and_ready` call did to the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyOutcome {
    Ready,
    GameStarted,
}

/// Data about a player at the moment they were knocked out.
#[derive(Debug, Clone, PartialEq)]
pub struct Elimination {
    pub id: ConnectionId,
    pub name: String,
    pub word: String,
}

/// State of the current round as seen from the alive set.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundOutcome {
    Continue,
    Winner { id: ConnectionId, name: String },
    NoSurvivors,
}

#[derive(Debug, Clone)]
pub struct Room {
    pub code: String,
    pub status: RoomStatus,
    /// `None` only while the room has no players.
    pub host_id: Option<ConnectionId>,
    pub players: PlayerMap,
}

impl Room {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            status: RoomStatus::Waiting,
            host_id: None,
            players: PlayerMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn player(&self, id: ConnectionId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn is_host(&self, id: ConnectionId) -> bool {
        self.host_id == Some(id)
    }

    /// Inserts (or replaces) the player for `id` at a random spawn point.
    ///
    /// The first player of an empty room becomes host. Players arriving while a
    /// game is running are seated as spectators until the next reset.
    pub fn add_player<R: Rng + ?Sized>(
        &mut self,
        id: ConnectionId,
        name: String,
        avatar: String,
        spawn: &SpawnArea,
        rng: &mut R,
    ) -> &Player {
        if self.host_id.map_or(true, |host| !self.players.contains_key(&host)) {
            self.host_id = Some(id);
        }

        let (x, y) = spawn.sample(rng);
        let mut player = Player::new(id, name, avatar, x, y);
        player.is_host = self.is_host(id);
        if self.status == RoomStatus::Playing {
            player.is_alive = false;
            player.is_ready = true;
        }

        info!(
            "Room {}: player {} ({}) joined at ({:.1}, {:.1})",
            self.code, id, player.name, x, y
        );
        self.players.insert(id, player);
        &self.players[&id]
    }

    /// Removes a player, handing the host role to the lowest remaining id when needed.
    pub fn remove_player(&mut self, id: ConnectionId) -> Option<Player> {
        let removed = self.players.remove(&id)?;
        info!("Room {}: player {} left", self.code, id);

        if self.is_host(id) {
            self.host_id = self.players.keys().next().copied();
            if let Some(next_host) = self.host_id {
                if let Some(player) = self.players.get_mut(&next_host) {
                    player.is_host = true;
                }
                info!("Room {}: host passed to {}", self.code, next_host);
            }
        }

        Some(removed)
    }

    pub fn move_player(&mut self, id: ConnectionId, x: f32, y: f32, is_moving: bool) -> bool {
        match self.players.get_mut(&id) {
            Some(player) => {
                player.x = x;
                player.y = y;
                player.is_moving = is_moving;
                true
            }
            None => false,
        }
    }

    /// `setter` assigns `word` to `target` and marks itself ready.
    ///
    /// Returns `None` when the call is ignored: unknown setter or target, or a
    /// player trying to choose their own word.
    pub fn set_word_and_ready(
        &mut self,
        setter: ConnectionId,
        target: ConnectionId,
        word: String,
    ) -> Option<ReadyOutcome> {
        if setter == target
            || !self.players.contains_key(&setter)
            || !self.players.contains_key(&target)
        {
            return None;
        }

        if let Some(player) = self.players.get_mut(&target) {
            player.forbidden_word = word;
        }
        if let Some(player) = self.players.get_mut(&setter) {
            player.is_ready = true;
        }

        if self.status == RoomStatus::Waiting && self.players.values().all(|p| p.is_ready) {
            self.status = RoomStatus::Playing;
            info!("Room {}: game started with {} players", self.code, self.len());
            return Some(ReadyOutcome::GameStarted);
        }
        Some(ReadyOutcome::Ready)
    }

    /// Marks a player dead. No-op outside a game or for an already dead player.
    pub fn eliminate(&mut self, id: ConnectionId) -> Option<Elimination> {
        if self.status != RoomStatus::Playing {
            return None;
        }
        let player = self.players.get_mut(&id).filter(|p| p.is_alive)?;
        player.is_alive = false;

        Some(Elimination {
            id,
            name: player.name.clone(),
            word: player.forbidden_word.clone(),
        })
    }

    pub fn alive_ids(&self) -> Vec<ConnectionId> {
        self.players
            .values()
            .filter(|p| p.is_alive)
            .map(|p| p.id)
            .collect()
    }

    pub fn round_outcome(&self) -> RoundOutcome {
        if self.status != RoomStatus::Playing {
            return RoundOutcome::Continue;
        }

        let mut alive = self.players.values().filter(|p| p.is_alive);
        match (alive.next(), alive.next()) {
            (None, _) => RoundOutcome::NoSurvivors,
            (Some(last), None) => RoundOutcome::Winner {
                id: last.id,
                name: last.name.clone(),
            },
            _ => RoundOutcome::Continue,
        }
    }

    /// Puts the room back into the lobby with every player's round state cleared.
    pub fn reset(&mut self) {
        self.status = RoomStatus::Waiting;
        for player in self.players.values_mut() {
            player.reset_round();
        }
    }
}
