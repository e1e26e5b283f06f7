//! Server network layer: TCP accept loop and per-connection tasks
//!
//! Every accepted socket gets a reader task and a writer task. The reader
//! decodes [`ClientMessage`] frames and routes them to the addressed room; the
//! writer drains the connection's outbound queue, which rooms feed through
//! their broadcast dispatcher.

use crate::config::ServerConfig;
use crate::connection_registry::ConnectionRegistry;
use crate::room_store::RoomStore;
use crate::session::RoomCommand;
use log::{debug, error, info, warn};
use shared::{read_frame, write_frame, ClientMessage, ConnectionId, ProtocolError, ServerMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Accepts connections and wires them to rooms
pub struct Server {
    listener: TcpListener,
    registry: Arc<RwLock<ConnectionRegistry>>,
    rooms: RoomStore,
    config: ServerConfig,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            registry: Arc::new(RwLock::new(ConnectionRegistry::new(config.max_connections))),
            rooms: RoomStore::new(config.game.clone()),
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn rooms(&self) -> &RoomStore {
        &self.rooms
    }

    /// Runs the accept loop forever.
    pub async fn run(self) -> Result<(), ServerError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => self.accept(stream, addr).await,
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }

    async fn accept(&self, stream: TcpStream, addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle for {}: {}", addr, e);
        }

        // The registry keeps the only long-lived sender; rooms get clones on join.
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let connection_id = {
            let mut registry = self.registry.write().await;
            registry.add_connection(addr, outbound_tx.clone())
        };

        let Some(connection_id) = connection_id else {
            warn!("Rejecting connection from {}: server full", addr);
            return;
        };

        let (reader, writer) = stream.into_split();
        let writer_task = tokio::spawn(write_loop(writer, outbound_rx, connection_id));

        if outbound_tx
            .send(ServerMessage::Connected { connection_id })
            .is_err()
        {
            debug!("Writer for connection {} stopped early", connection_id);
        }

        drop(outbound_tx);

        let handler = ConnectionHandler {
            connection_id,
            registry: Arc::clone(&self.registry),
            rooms: self.rooms.clone(),
            max_frame_bytes: self.config.max_frame_bytes,
        };

        tokio::spawn(async move {
            if let Err(e) = handler.read_loop(reader).await {
                warn!("Connection {} failed: {}", handler.connection_id, e);
            }
            handler.disconnect().await;
            writer_task.abort();
        });
    }
}

/// Reader-side state of one connection
struct ConnectionHandler {
    connection_id: ConnectionId,
    registry: Arc<RwLock<ConnectionRegistry>>,
    rooms: RoomStore,
    max_frame_bytes: usize,
}

impl ConnectionHandler {
    async fn read_loop<R>(&self, mut reader: R) -> Result<(), ServerError>
    where
        R: AsyncRead + Unpin,
    {
        while let Some(message) =
            read_frame::<_, ClientMessage>(&mut reader, self.max_frame_bytes).await?
        {
            self.handle_message(message).await;
        }
        Ok(())
    }

    async fn handle_message(&self, message: ClientMessage) {
        match message {
            ClientMessage::Join { room, name, avatar } => {
                let (previous, outbound) = {
                    let mut registry = self.registry.write().await;
                    let Some(outbound) = registry.outbound(self.connection_id) else {
                        debug!("Join from unregistered connection {}", self.connection_id);
                        return;
                    };
                    (registry.bind_room(self.connection_id, &room), outbound)
                };

                if let Some(previous) = previous.filter(|previous| *previous != room) {
                    debug!(
                        "Connection {} moving from room {} to {}",
                        self.connection_id, previous, room
                    );
                    self.rooms
                        .dispatch(
                            &previous,
                            RoomCommand::Leave {
                                connection_id: self.connection_id,
                            },
                        )
                        .await;
                }

                info!(
                    "Connection {} joining room {} as {:?}",
                    self.connection_id, room, name
                );
                self.rooms
                    .join(&room, self.connection_id, name, avatar, outbound)
                    .await;
            }
            other => {
                let room = other.room().to_string();
                if let Some(command) = RoomCommand::from_client(self.connection_id, other) {
                    self.rooms.dispatch(&room, command).await;
                }
            }
        }
    }

    async fn disconnect(&self) {
        let connection = {
            let mut registry = self.registry.write().await;
            registry.remove_connection(self.connection_id)
        };

        if let Some(room) = connection.and_then(|c| c.room) {
            self.rooms
                .dispatch(
                    &room,
                    RoomCommand::Leave {
                        connection_id: self.connection_id,
                    },
                )
                .await;
        }
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<ServerMessage>,
    connection_id: ConnectionId,
) {
    while let Some(message) = outbound.recv().await {
        if let Err(e) = write_frame(&mut writer, &message).await {
            debug!("Failed to write to connection {}: {}", connection_id, e);
            break;
        }
    }
}
