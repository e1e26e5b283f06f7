//! Per-player AFK countdowns.
//!
//! Each armed timer is a spawned task that sleeps for the configured timeout
//! and then reports a [`TimerExpired`] carrying the generation it was armed
//! with. Re-arming bumps the generation, cancelling forgets the entry, and both
//! abort the task. [`TimerSupervisor::claim`] rejects any expiry whose
//! generation is no longer current, so a timeout that fired just before a reset
//! is discarded.

use log::debug;
use shared::ConnectionId;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerExpired {
    pub player_id: ConnectionId,
    pub generation: u64,
}

#[derive(Debug)]
struct ArmedTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Debug)]
pub struct TimerSupervisor {
    timeout: Duration,
    next_generation: u64,
    timers: HashMap<ConnectionId, ArmedTimer>,
    expired_tx: mpsc::UnboundedSender<TimerExpired>,
}

impl TimerSupervisor {
    /// Creates a supervisor and the receiver on which expiries are delivered.
    pub fn new(timeout: Duration) -> (Self, mpsc::UnboundedReceiver<TimerExpired>) {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        let supervisor = Self {
            timeout,
            next_generation: 0,
            timers: HashMap::new(),
            expired_tx,
        };
        (supervisor, expired_rx)
    }

    /// Starts a fresh countdown for `player_id`, replacing any running one.
    pub fn arm(&mut self, player_id: ConnectionId) -> u64 {
        self.cancel(player_id);

        self.next_generation += 1;
        let generation = self.next_generation;
        let deadline = Instant::now() + self.timeout;
        let expired_tx = self.expired_tx.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            // Receiver is gone once the room shuts down.
            let _ = expired_tx.send(TimerExpired {
                player_id,
                generation,
            });
        });

        self.timers.insert(player_id, ArmedTimer { generation, handle });
        generation
    }

    pub fn cancel(&mut self, player_id: ConnectionId) -> bool {
        match self.timers.remove(&player_id) {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.handle.abort();
        }
    }

    /// Accepts an expiry if it belongs to the player's current countdown.
    ///
    /// A claimed timer is disarmed, so the same expiry can be claimed only once.
    pub fn claim(&mut self, expired: TimerExpired) -> bool {
        match self.timers.get(&expired.player_id) {
            Some(timer) if timer.generation == expired.generation => {
                self.timers.remove(&expired.player_id);
                true
            }
            _ => {
                debug!(
                    "Discarding stale timer for player {} (generation {})",
                    expired.player_id, expired.generation
                );
                false
            }
        }
    }

    pub fn is_armed(&self, player_id: ConnectionId) -> bool {
        self.timers.contains_key(&player_id)
    }

    pub fn armed_count(&self) -> usize {
        self.timers.len()
    }
}

impl Drop for TimerSupervisor {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
