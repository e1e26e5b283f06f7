//! Fan-out of room state to the connections joined to a room.

use log::debug;
use shared::{ConnectionId, PlayerMap, ServerMessage};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Queue feeding a connection's writer task.
pub type Outbound = mpsc::UnboundedSender<ServerMessage>;

/// Decides what a room pushes after a mutation.
///
/// Implementations may keep state between calls (e.g. the last sent map) to
/// emit diffs; returning `None` skips the push.
pub trait SnapshotPolicy: Send {
    fn snapshot(&mut self, players: &PlayerMap) -> Option<ServerMessage>;
}

/// Sends the entire player map every time.
#[derive(Debug, Default, Clone, Copy)]
pub struct FullSnapshot;

impl SnapshotPolicy for FullSnapshot {
    fn snapshot(&mut self, players: &PlayerMap) -> Option<ServerMessage> {
        Some(ServerMessage::UpdatePlayers {
            players: players.clone(),
        })
    }
}

pub struct BroadcastDispatcher {
    members: HashMap<ConnectionId, Outbound>,
    policy: Box<dyn SnapshotPolicy>,
}

impl Default for BroadcastDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastDispatcher {
    pub fn new() -> Self {
        Self::with_policy(Box::new(FullSnapshot))
    }

    pub fn with_policy(policy: Box<dyn SnapshotPolicy>) -> Self {
        Self {
            members: HashMap::new(),
            policy,
        }
    }

    pub fn subscribe(&mut self, id: ConnectionId, outbound: Outbound) {
        self.members.insert(id, outbound);
    }

    pub fn unsubscribe(&mut self, id: ConnectionId) -> bool {
        self.members.remove(&id).is_some()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Pushes a one-shot notification to every member.
    pub fn notify(&self, message: &ServerMessage) {
        for (id, outbound) in &self.members {
            if outbound.send(message.clone()).is_err() {
                debug!("Outbound queue for connection {} is closed", id);
            }
        }
    }

    /// Pushes the room snapshot produced by the current policy.
    pub fn push_snapshot(&mut self, players: &PlayerMap) {
        if let Some(message) = self.policy.snapshot(players) {
            self.notify(&message);
        }
    }
}
