//! Game rules of one room: player lifecycle, word assignment, elimination and
//! win detection.
//!
//! A `RoomSession` owns the room state together with its AFK timers and its
//! broadcast group. It is driven one command at a time by the room task in
//! [`crate::room_store`], which gives every mutation exclusive access to the
//! room and pushes the resulting snapshot before the next command runs.

use crate::broadcast::{BroadcastDispatcher, Outbound};
use crate::config::GameConfig;
use crate::room::{ReadyOutcome, Room, RoomStatus, RoundOutcome};
use crate::timers::{TimerExpired, TimerSupervisor};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{ClientMessage, ConnectionId, ServerMessage, REASON_FORBIDDEN_WORD, REASON_TIMEOUT};
use tokio::sync::mpsc;

/// An inbound event already resolved to its originating connection.
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        connection_id: ConnectionId,
        name: String,
        avatar: String,
        outbound: Outbound,
    },
    Move {
        connection_id: ConnectionId,
        x: f32,
        y: f32,
        is_moving: bool,
    },
    RequestStart {
        connection_id: ConnectionId,
    },
    SetWordAndReady {
        connection_id: ConnectionId,
        target_id: ConnectionId,
        word: String,
    },
    Chat {
        connection_id: ConnectionId,
        message: String,
    },
    ForceEnd {
        connection_id: ConnectionId,
    },
    Leave {
        connection_id: ConnectionId,
    },
}

impl RoomCommand {
    /// Converts a client message into a command for its room.
    ///
    /// `Join` needs the connection's outbound queue and is built by the caller,
    /// so it yields `None` here.
    pub fn from_client(connection_id: ConnectionId, message: ClientMessage) -> Option<Self> {
        let command = match message {
            ClientMessage::Join { .. } => return None,
            ClientMessage::Move {
                x, y, is_moving, ..
            } => RoomCommand::Move {
                connection_id,
                x,
                y,
                is_moving,
            },
            ClientMessage::RequestStart { .. } => RoomCommand::RequestStart { connection_id },
            ClientMessage::SetWordAndReady {
                target_id, word, ..
            } => RoomCommand::SetWordAndReady {
                connection_id,
                target_id,
                word,
            },
            ClientMessage::Chat { message, .. } => RoomCommand::Chat {
                connection_id,
                message,
            },
            ClientMessage::ForceEndGame { .. } => RoomCommand::ForceEnd { connection_id },
        };
        Some(command)
    }
}

pub struct RoomSession {
    room: Room,
    timers: TimerSupervisor,
    dispatcher: BroadcastDispatcher,
    config: GameConfig,
    rng: StdRng,
}

impl RoomSession {
    /// Creates an empty session and the receiver its AFK expiries arrive on.
    pub fn new(
        code: impl Into<String>,
        config: GameConfig,
    ) -> (Self, mpsc::UnboundedReceiver<TimerExpired>) {
        Self::with_dispatcher(code, config, BroadcastDispatcher::new())
    }

    pub fn with_dispatcher(
        code: impl Into<String>,
        config: GameConfig,
        dispatcher: BroadcastDispatcher,
    ) -> (Self, mpsc::UnboundedReceiver<TimerExpired>) {
        let (timers, expired_rx) = TimerSupervisor::new(config.afk_timeout);
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let session = Self {
            room: Room::new(code),
            timers,
            dispatcher,
            config,
            rng,
        };
        (session, expired_rx)
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn timers(&self) -> &TimerSupervisor {
        &self.timers
    }

    pub fn handle(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Join {
                connection_id,
                name,
                avatar,
                outbound,
            } => self.join(connection_id, name, avatar, outbound),
            RoomCommand::Move {
                connection_id,
                x,
                y,
                is_moving,
            } => self.move_player(connection_id, x, y, is_moving),
            RoomCommand::RequestStart { connection_id } => self.request_start(connection_id),
            RoomCommand::SetWordAndReady {
                connection_id,
                target_id,
                word,
            } => self.set_word_and_ready(connection_id, target_id, word),
            RoomCommand::Chat {
                connection_id,
                message,
            } => self.chat(connection_id, message),
            RoomCommand::ForceEnd { connection_id } => self.force_end(connection_id),
            RoomCommand::Leave { connection_id } => self.leave(connection_id),
        }
    }

    pub fn join(
        &mut self,
        connection_id: ConnectionId,
        name: String,
        avatar: String,
        outbound: Outbound,
    ) {
        // A re-join replaces the old entry, including any running countdown.
        self.timers.cancel(connection_id);
        self.dispatcher.subscribe(connection_id, outbound);
        self.room.add_player(
            connection_id,
            name,
            avatar,
            &self.config.spawn_area,
            &mut self.rng,
        );
        // Re-joining mid-game turns the player into a spectator.
        self.settle_round();
        self.dispatcher.push_snapshot(&self.room.players);
    }

    pub fn leave(&mut self, connection_id: ConnectionId) {
        self.dispatcher.unsubscribe(connection_id);
        self.timers.cancel(connection_id);
        if self.room.remove_player(connection_id).is_none() {
            debug!(
                "Room {}: leave from unknown connection {}",
                self.room.code, connection_id
            );
            return;
        }

        self.settle_round();
        self.dispatcher.push_snapshot(&self.room.players);
    }

    pub fn move_player(&mut self, connection_id: ConnectionId, x: f32, y: f32, is_moving: bool) {
        if self.room.move_player(connection_id, x, y, is_moving) {
            self.dispatcher.push_snapshot(&self.room.players);
        }
    }

    pub fn request_start(&mut self, connection_id: ConnectionId) {
        if !self.room.is_host(connection_id) {
            debug!(
                "Room {}: start requested by non-host {}",
                self.room.code, connection_id
            );
            return;
        }

        info!("Room {}: opening word setter", self.room.code);
        self.dispatcher.notify(&ServerMessage::OpenWordSetter {
            players: self.room.players.clone(),
        });
    }

    pub fn set_word_and_ready(
        &mut self,
        connection_id: ConnectionId,
        target_id: ConnectionId,
        word: String,
    ) {
        match self.room.set_word_and_ready(connection_id, target_id, word) {
            None => {
                debug!(
                    "Room {}: ignored word from {} for {}",
                    self.room.code, connection_id, target_id
                );
                return;
            }
            Some(ReadyOutcome::GameStarted) => {
                self.dispatcher.notify(&ServerMessage::GameStarted);
                for id in self.room.alive_ids() {
                    self.timers.arm(id);
                }
            }
            Some(ReadyOutcome::Ready) => {}
        }
        self.dispatcher.push_snapshot(&self.room.players);
    }

    pub fn chat(&mut self, connection_id: ConnectionId, message: String) {
        let Some(player) = self.room.player(connection_id) else {
            return;
        };
        let name = player.name.clone();
        let is_alive = player.is_alive;
        let in_game = self.room.status == RoomStatus::Playing && is_alive;

        if in_game {
            self.timers.arm(connection_id);
        }

        if in_game && player.says_forbidden_word(&message) {
            self.eliminate(connection_id, REASON_FORBIDDEN_WORD);
            return;
        }

        self.dispatcher.notify(&ServerMessage::NewMessage {
            name,
            message,
            is_alive,
        });
        self.dispatcher.push_snapshot(&self.room.players);
    }

    /// Knocks a player out and settles the round. Repeated calls are no-ops.
    pub fn eliminate(&mut self, connection_id: ConnectionId, reason: &str) {
        let Some(out) = self.room.eliminate(connection_id) else {
            return;
        };
        self.timers.cancel(connection_id);

        info!(
            "Room {}: {} eliminated ({}), word was {:?}",
            self.room.code, out.name, reason, out.word
        );
        self.dispatcher.notify(&ServerMessage::PlayerOut {
            name: out.name,
            word: out.word,
            reason: reason.to_string(),
        });

        self.settle_round();
        self.dispatcher.push_snapshot(&self.room.players);
    }

    pub fn force_end(&mut self, connection_id: ConnectionId) {
        if !self.room.is_host(connection_id) {
            debug!(
                "Room {}: force end requested by non-host {}",
                self.room.code, connection_id
            );
            return;
        }

        info!("Room {}: game ended by host", self.room.code);
        self.reset_round();
        self.dispatcher.notify(&ServerMessage::GameEnded);
        self.dispatcher.push_snapshot(&self.room.players);
    }

    pub fn on_timer_expired(&mut self, expired: TimerExpired) {
        if self.timers.claim(expired) {
            self.eliminate(expired.player_id, REASON_TIMEOUT);
        }
    }

    /// Ends the round if the alive set has been reduced to one player or none.
    fn settle_round(&mut self) {
        match self.room.round_outcome() {
            RoundOutcome::Continue => {}
            RoundOutcome::Winner { name, .. } => {
                info!("Room {}: {} wins", self.room.code, name);
                self.dispatcher.notify(&ServerMessage::GameWinner { name });
                self.reset_round();
            }
            RoundOutcome::NoSurvivors => {
                info!("Room {}: round ended without survivors", self.room.code);
                self.reset_round();
                self.dispatcher.notify(&ServerMessage::GameEnded);
            }
        }
    }

    fn reset_round(&mut self) {
        self.timers.cancel_all();
        self.room.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    type Inbox = UnboundedReceiver<ServerMessage>;

    fn config() -> GameConfig {
        GameConfig {
            rng_seed: Some(11),
            ..GameConfig::default()
        }
    }

    fn new_session() -> (RoomSession, UnboundedReceiver<TimerExpired>) {
        RoomSession::new("room", config())
    }

    fn join(session: &mut RoomSession, id: ConnectionId, name: &str) -> Inbox {
        let (tx, rx) = mpsc::unbounded_channel();
        session.join(id, name.to_string(), String::new(), tx);
        rx
    }

    fn drain(inbox: &mut Inbox) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = inbox.try_recv() {
            messages.push(message);
        }
        messages
    }

    fn events(inbox: &mut Inbox) -> Vec<ServerMessage> {
        drain(inbox)
            .into_iter()
            .filter(|m| !matches!(m, ServerMessage::UpdatePlayers { .. }))
            .collect()
    }

    /// Three players a, b, c (ids 1..=3) in a running game with words set cyclically.
    fn playing_room() -> (
        RoomSession,
        UnboundedReceiver<TimerExpired>,
        Vec<Inbox>,
    ) {
        let (mut session, expired_rx) = new_session();
        let mut inboxes = vec![
            join(&mut session, 1, "a"),
            join(&mut session, 2, "b"),
            join(&mut session, 3, "c"),
        ];
        session.set_word_and_ready(1, 2, "banana".to_string());
        session.set_word_and_ready(2, 3, "cherry".to_string());
        session.set_word_and_ready(3, 1, "apple".to_string());
        assert_eq!(session.room().status, RoomStatus::Playing);
        for inbox in &mut inboxes {
            drain(inbox);
        }
        (session, expired_rx, inboxes)
    }

    #[tokio::test]
    async fn test_join_broadcasts_snapshot_to_all_members() {
        let (mut session, _expired) = new_session();
        let mut first = join(&mut session, 1, "a");
        let mut second = join(&mut session, 2, "b");

        let first_msgs = drain(&mut first);
        assert_eq!(first_msgs.len(), 2);
        match first_msgs.last().unwrap() {
            ServerMessage::UpdatePlayers { players } => {
                assert_eq!(players.len(), 2);
                assert!(players[&1].is_host);
                assert!(!players[&2].is_host);
            }
            other => panic!("Unexpected message {:?}", other),
        }
        assert_eq!(drain(&mut second).len(), 1);
    }

    #[tokio::test]
    async fn test_move_broadcasts_even_when_unchanged() {
        let (mut session, _expired) = new_session();
        let mut inbox = join(&mut session, 1, "a");
        drain(&mut inbox);

        session.move_player(1, 10.0, 20.0, true);
        session.move_player(1, 10.0, 20.0, true);
        session.move_player(9, 1.0, 1.0, false);

        assert_eq!(drain(&mut inbox).len(), 2);
        let player = session.room().player(1).unwrap();
        assert_eq!((player.x, player.y, player.is_moving), (10.0, 20.0, true));
    }

    #[tokio::test]
    async fn test_request_start_is_host_only() {
        let (mut session, _expired) = new_session();
        let mut host = join(&mut session, 1, "a");
        let mut guest = join(&mut session, 2, "b");
        drain(&mut host);
        drain(&mut guest);

        session.request_start(2);
        assert!(drain(&mut guest).is_empty());

        session.request_start(1);
        match drain(&mut guest).as_slice() {
            [ServerMessage::OpenWordSetter { players }] => assert_eq!(players.len(), 2),
            other => panic!("Unexpected messages {:?}", other),
        }
        assert_eq!(session.room().status, RoomStatus::Waiting);
    }

    #[tokio::test]
    async fn test_game_started_fires_exactly_once() {
        let (mut session, _expired) = new_session();
        let mut inbox = join(&mut session, 1, "a");
        join(&mut session, 2, "b");
        drain(&mut inbox);

        session.set_word_and_ready(1, 2, "sun".to_string());
        assert_eq!(session.room().status, RoomStatus::Waiting);
        assert!(events(&mut inbox).is_empty());
        assert_eq!(session.timers().armed_count(), 0);

        session.set_word_and_ready(2, 1, "moon".to_string());
        assert_eq!(session.room().status, RoomStatus::Playing);
        assert_eq!(events(&mut inbox), vec![ServerMessage::GameStarted]);
        assert!(session.timers().is_armed(1));
        assert!(session.timers().is_armed(2));

        session.set_word_and_ready(2, 1, "star".to_string());
        assert!(events(&mut inbox).is_empty());
    }

    #[tokio::test]
    async fn test_ignored_set_word_sends_nothing() {
        let (mut session, _expired) = new_session();
        let mut inbox = join(&mut session, 1, "a");
        drain(&mut inbox);

        session.set_word_and_ready(1, 42, "nope".to_string());
        session.set_word_and_ready(1, 1, "self".to_string());
        assert!(drain(&mut inbox).is_empty());
    }

    #[tokio::test]
    async fn test_chat_while_waiting_never_eliminates() {
        let (mut session, _expired) = new_session();
        let mut inbox = join(&mut session, 1, "a");
        join(&mut session, 2, "b");
        session.set_word_and_ready(2, 1, "secret".to_string());
        drain(&mut inbox);

        session.chat(1, "my secret is out".to_string());

        assert!(session.room().player(1).unwrap().is_alive);
        assert_eq!(
            events(&mut inbox),
            vec![ServerMessage::NewMessage {
                name: "a".to_string(),
                message: "my secret is out".to_string(),
                is_alive: true,
            }]
        );
    }

    #[tokio::test]
    async fn test_forbidden_word_eliminates_without_echo() {
        let (mut session, _expired, mut inboxes) = playing_room();

        // a's word is "apple", so this is plain chat.
        session.chat(1, "no bananas allowed".to_string());
        assert!(session.room().player(1).unwrap().is_alive);

        session.chat(2, "no bananas allowed".to_string());
        assert!(!session.room().player(2).unwrap().is_alive);
        assert!(!session.timers().is_armed(2));
        assert_eq!(session.room().status, RoomStatus::Playing);

        let seen = events(&mut inboxes[2]);
        assert_eq!(
            seen,
            vec![
                ServerMessage::NewMessage {
                    name: "a".to_string(),
                    message: "no bananas allowed".to_string(),
                    is_alive: true,
                },
                ServerMessage::PlayerOut {
                    name: "b".to_string(),
                    word: "banana".to_string(),
                    reason: REASON_FORBIDDEN_WORD.to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_partial_word_does_not_eliminate() {
        let (mut session, _expired, _inboxes) = playing_room();
        session.chat(3, "cherrie cherr y".to_string());
        session.chat(3, "Cherry".to_string());
        assert!(session.room().player(3).unwrap().is_alive);
    }

    #[tokio::test]
    async fn test_ghost_chat_is_inert() {
        let (mut session, _expired, mut inboxes) = playing_room();
        session.eliminate(3, REASON_TIMEOUT);
        drain(&mut inboxes[0]);

        session.chat(3, "cherry cherry".to_string());
        assert!(!session.timers().is_armed(3));
        assert_eq!(
            events(&mut inboxes[0]),
            vec![ServerMessage::NewMessage {
                name: "c".to_string(),
                message: "cherry cherry".to_string(),
                is_alive: false,
            }]
        );
    }

    #[tokio::test]
    async fn test_elimination_is_idempotent() {
        let (mut session, _expired, mut inboxes) = playing_room();

        session.eliminate(3, REASON_TIMEOUT);
        let once = drain(&mut inboxes[0]);
        session.eliminate(3, REASON_TIMEOUT);

        assert_eq!(once.len(), 2);
        assert!(drain(&mut inboxes[0]).is_empty());
        assert_eq!(session.room().alive_ids(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_last_survivor_wins_and_room_resets() {
        let (mut session, _expired, mut inboxes) = playing_room();
        session.eliminate(3, REASON_TIMEOUT);
        drain(&mut inboxes[0]);

        session.eliminate(2, REASON_FORBIDDEN_WORD);

        let seen = events(&mut inboxes[0]);
        let winners: Vec<_> = seen
            .iter()
            .filter(|m| matches!(m, ServerMessage::GameWinner { .. }))
            .collect();
        assert_eq!(
            winners,
            vec![&ServerMessage::GameWinner {
                name: "a".to_string()
            }]
        );

        let room = session.room();
        assert_eq!(room.status, RoomStatus::Waiting);
        for player in room.players.values() {
            assert!(player.is_alive);
            assert!(!player.is_ready);
            assert!(player.forbidden_word.is_empty());
        }
        assert_eq!(session.timers().armed_count(), 0);
    }

    #[tokio::test]
    async fn test_force_end_is_host_only() {
        let (mut session, _expired, mut inboxes) = playing_room();

        session.force_end(2);
        assert_eq!(session.room().status, RoomStatus::Playing);
        assert!(drain(&mut inboxes[1]).is_empty());

        session.force_end(1);
        assert_eq!(session.room().status, RoomStatus::Waiting);
        assert_eq!(session.timers().armed_count(), 0);
        assert_eq!(events(&mut inboxes[1]), vec![ServerMessage::GameEnded]);
    }

    #[tokio::test]
    async fn test_host_disconnect_reassigns_and_broadcasts() {
        let (mut session, _expired) = new_session();
        let _host = join(&mut session, 1, "a");
        let mut second = join(&mut session, 2, "b");
        let mut third = join(&mut session, 3, "c");
        drain(&mut second);
        drain(&mut third);

        session.leave(1);

        assert_eq!(session.room().host_id, Some(2));
        for inbox in [&mut second, &mut third] {
            match drain(inbox).as_slice() {
                [ServerMessage::UpdatePlayers { players }] => {
                    assert_eq!(players.len(), 2);
                    assert!(players[&2].is_host);
                    assert!(!players[&3].is_host);
                }
                other => panic!("Unexpected messages {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_leave_cancels_timer_and_can_decide_round() {
        let (mut session, _expired, mut inboxes) = playing_room();

        session.leave(3);
        assert!(!session.timers().is_armed(3));
        assert_eq!(session.room().status, RoomStatus::Playing);

        session.leave(2);
        assert_eq!(session.room().status, RoomStatus::Waiting);
        assert_eq!(
            events(&mut inboxes[0]),
            vec![ServerMessage::GameWinner {
                name: "a".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_unknown_connection_is_ignored() {
        let (mut session, _expired) = new_session();
        let mut inbox = join(&mut session, 1, "a");
        drain(&mut inbox);

        session.chat(5, "hello".to_string());
        session.leave(5);
        session.force_end(5);
        session.request_start(5);

        assert!(drain(&mut inbox).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_afk_timeout_eliminates_exactly_once() {
        let (mut session, mut expired_rx, mut inboxes) = playing_room();

        // Keep a and b chatting; c stays silent.
        tokio::time::advance(Duration::from_secs(20)).await;
        session.chat(1, "hi".to_string());
        session.chat(2, "hello".to_string());

        let expired = expired_rx.recv().await.unwrap();
        assert_eq!(expired.player_id, 3);
        session.on_timer_expired(expired);
        session.on_timer_expired(expired);

        assert!(!session.room().player(3).unwrap().is_alive);
        let outs: Vec<_> = events(&mut inboxes[0])
            .into_iter()
            .filter(|m| matches!(m, ServerMessage::PlayerOut { .. }))
            .collect();
        assert_eq!(
            outs,
            vec![ServerMessage::PlayerOut {
                name: "c".to_string(),
                word: "cherry".to_string(),
                reason: REASON_TIMEOUT.to_string(),
            }]
        );
        assert!(session.room().player(1).unwrap().is_alive);
        assert!(session.room().player(2).unwrap().is_alive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_expiry_after_reset_is_discarded() {
        let (mut session, mut expired_rx, _inboxes) = playing_room();

        let expired = expired_rx.recv().await.unwrap();
        // The countdown already fired, but chat resets it before the expiry is handled.
        session.chat(expired.player_id, "still here".to_string());
        session.on_timer_expired(expired);

        assert!(session.room().player(expired.player_id).unwrap().is_alive);
        assert_eq!(session.room().status, RoomStatus::Playing);
    }

    #[tokio::test]
    async fn test_spectator_joins_mid_game() {
        let (mut session, _expired, mut inboxes) = playing_room();
        let mut late = join(&mut session, 9, "late");

        let spectator = session.room().player(9).unwrap();
        assert!(!spectator.is_alive);
        assert!(!session.timers().is_armed(9));
        assert!(matches!(
            drain(&mut late).as_slice(),
            [ServerMessage::UpdatePlayers { .. }]
        ));
        assert_eq!(drain(&mut inboxes[0]).len(), 1);
    }

    #[tokio::test]
    async fn test_rejoin_mid_game_can_decide_round() {
        let (mut session, _expired, mut inboxes) = playing_room();
        session.leave(3);
        drain(&mut inboxes[0]);

        let _again = join(&mut session, 2, "b");

        assert_eq!(
            events(&mut inboxes[0]),
            vec![ServerMessage::GameWinner {
                name: "a".to_string()
            }]
        );
        assert_eq!(session.room().status, RoomStatus::Waiting);
        assert_eq!(session.timers().armed_count(), 0);
    }

    #[test]
    fn test_command_from_client_message() {
        let command = RoomCommand::from_client(
            4,
            ClientMessage::SetWordAndReady {
                room: "r".to_string(),
                target_id: 5,
                word: "w".to_string(),
            },
        );
        match command {
            Some(RoomCommand::SetWordAndReady {
                connection_id,
                target_id,
                word,
            }) => {
                assert_eq!((connection_id, target_id), (4, 5));
                assert_eq!(word, "w");
            }
            other => panic!("Unexpected command {:?}", other),
        }

        let join = ClientMessage::Join {
            room: "r".to_string(),
            name: "n".to_string(),
            avatar: String::new(),
        };
        assert!(RoomCommand::from_client(4, join).is_none());
    }
}
