//! Connection tracking for the server
//!
//! This module handles the server-side bookkeeping of connected clients:
//! - Connection lifecycle (connect, disconnect)
//! - Assignment of the opaque connection ids used as player ids
//! - The room each connection currently belongs to
//! - Capacity management and outbound queue lookup
//!
//! The registry is the boundary between the transport and the rooms: inbound
//! events are tagged with the connection id it handed out, and outbound
//! traffic for a connection goes through the queue stored here.

use crate::broadcast::Outbound;
use log::{info, warn};
use shared::ConnectionId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

/// A connected client
#[derive(Debug)]
pub struct Connection {
    /// Unique connection identifier assigned by the server
    pub id: ConnectionId,
    /// Remote address, for logging
    pub addr: SocketAddr,
    /// Room joined by this connection, if any
    pub room: Option<String>,
    /// Queue drained by the connection's writer task
    pub outbound: Outbound,
    pub connected_at: Instant,
}

impl Connection {
    pub fn new(id: ConnectionId, addr: SocketAddr, outbound: Outbound) -> Self {
        Self {
            id,
            addr,
            room: None,
            outbound,
            connected_at: Instant::now(),
        }
    }
}

/// Tracks all live connections and the room each one is in.
///
/// Ids start at 1 and are never reused during the lifetime of the process, so
/// a stale id can never address a newer connection.
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
    next_connection_id: ConnectionId,
    max_connections: usize,
}

impl ConnectionRegistry {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: HashMap::new(),
            next_connection_id: 1,
            max_connections,
        }
    }

    /// Registers a new connection.
    ///
    /// Returns `None` if the server is at capacity.
    pub fn add_connection(&mut self, addr: SocketAddr, outbound: Outbound) -> Option<ConnectionId> {
        if self.connections.len() >= self.max_connections {
            return None;
        }

        let id = self.next_connection_id;
        let Some(next) = id.checked_add(1) else {
            warn!("Connection ids exhausted, refusing {}", addr);
            return None;
        };
        self.next_connection_id = next;

        info!("Connection {} opened from {}", id, addr);
        self.connections
            .insert(id, Connection::new(id, addr, outbound));
        Some(id)
    }

    /// Forgets a connection and returns it so the caller can leave its room.
    pub fn remove_connection(&mut self, id: ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(&id)?;
        info!(
            "Connection {} from {} closed after {:.1}s",
            id,
            connection.addr,
            connection.connected_at.elapsed().as_secs_f32()
        );
        Some(connection)
    }

    /// Records that `id` joined `room` and returns the room it was in before.
    ///
    /// Returns `None` for unknown connections as well as for a first join.
    pub fn bind_room(&mut self, id: ConnectionId, room: &str) -> Option<String> {
        let connection = self.connections.get_mut(&id)?;
        connection.room.replace(room.to_string())
    }

    pub fn room_of(&self, id: ConnectionId) -> Option<&str> {
        self.connections.get(&id)?.room.as_deref()
    }

    /// Queue feeding the writer task of `id`, handed to rooms on join.
    pub fn outbound(&self, id: ConnectionId) -> Option<Outbound> {
        self.connections.get(&id).map(|c| c.outbound.clone())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
