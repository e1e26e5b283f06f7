//! Registry of live rooms, each driven by its own task.
//!
//! Rooms are created on the first join to an unseen code and drop themselves
//! once their last player has left and no command is queued for them.

use crate::broadcast::Outbound;
use crate::config::GameConfig;
use crate::session::{RoomCommand, RoomSession};
use crate::timers::TimerExpired;
use log::{debug, info};
use shared::ConnectionId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

#[derive(Debug, Clone)]
struct RoomHandle {
    commands: mpsc::UnboundedSender<RoomCommand>,
}

#[derive(Clone)]
pub struct RoomStore {
    rooms: Arc<Mutex<HashMap<String, RoomHandle>>>,
    config: GameConfig,
}

impl RoomStore {
    pub fn new(config: GameConfig) -> Self {
        Self {
            rooms: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    /// Adds a connection to a room, creating the room if needed.
    ///
    /// The join is queued while the store is locked so the room cannot retire
    /// between the lookup and the send.
    pub async fn join(
        &self,
        code: &str,
        connection_id: ConnectionId,
        name: String,
        avatar: String,
        outbound: Outbound,
    ) {
        let mut rooms = self.rooms.lock().await;
        let handle = match rooms.get(code) {
            Some(handle) if !handle.commands.is_closed() => handle.clone(),
            _ => {
                let handle = self.spawn_room(code);
                rooms.insert(code.to_string(), handle.clone());
                handle
            }
        };

        let command = RoomCommand::Join {
            connection_id,
            name,
            avatar,
            outbound,
        };
        if handle.commands.send(command).is_err() {
            debug!("Room {} closed before join from {}", code, connection_id);
        }
    }

    /// Forwards a command to an existing room. Unknown rooms are ignored.
    pub async fn dispatch(&self, code: &str, command: RoomCommand) -> bool {
        let handle = {
            let rooms = self.rooms.lock().await;
            rooms.get(code).cloned()
        };

        match handle {
            Some(handle) => handle.commands.send(command).is_ok(),
            None => {
                debug!("Dropping command for unknown room {:?}", code);
                false
            }
        }
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }

    pub async fn contains(&self, code: &str) -> bool {
        self.rooms.lock().await.contains_key(code)
    }

    fn spawn_room(&self, code: &str) -> RoomHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (session, expired_rx) = RoomSession::new(code, self.config.clone());

        info!("Room {} created", code);
        tokio::spawn(run_room(session, commands_rx, expired_rx, self.clone()));

        RoomHandle {
            commands: commands_tx,
        }
    }

    /// Removes `code` from the store if its room is idle.
    ///
    /// Called by the room task itself; holding the lock while checking the
    /// queue guarantees no join slipped in after the room emptied.
    async fn retire_if_idle(
        &self,
        code: &str,
        commands: &mut mpsc::UnboundedReceiver<RoomCommand>,
    ) -> bool {
        let mut rooms = self.rooms.lock().await;
        if !commands.is_empty() {
            return false;
        }
        rooms.remove(code);
        info!("Room {} dropped", code);
        true
    }
}

async fn run_room(
    mut session: RoomSession,
    mut commands: mpsc::UnboundedReceiver<RoomCommand>,
    mut expirations: mpsc::UnboundedReceiver<TimerExpired>,
    store: RoomStore,
) {
    let code = session.room().code.clone();

    loop {
        tokio::select! {
            Some(command) = commands.recv() => {
                session.handle(command);
                if session.room().is_empty() && store.retire_if_idle(&code, &mut commands).await {
                    break;
                }
            },
            Some(expired) = expirations.recv() => {
                session.on_timer_expired(expired);
            },
            else => break,
        }
    }
}
