use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Bound;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Seconds a player may stay silent during a game before being eliminated.
pub const AFK_TIMEOUT_SECS: u64 = 30;
pub const SPAWN_MIN_X: f32 = 50.0;
pub const SPAWN_MAX_X: f32 = 350.0;
pub const SPAWN_MIN_Y: f32 = 100.0;
pub const SPAWN_MAX_Y: f32 = 400.0;
/// Upper bound on a single frame; avatars are shipped inline so this is generous.
pub const MAX_FRAME_BYTES: usize = 10_000_000;
pub const FRAME_HEADER_LEN: usize = 4;

pub const REASON_FORBIDDEN_WORD: &str = "forbidden word used";
pub const REASON_TIMEOUT: &str = "timeout";

pub type ConnectionId = u32;

/// Full player mapping of a room, keyed and ordered by connection id.
pub type PlayerMap = BTreeMap<ConnectionId, Player>;

/// Messages sent by clients. Every variant carries the room code it targets.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ClientMessage {
    Join {
        room: String,
        name: String,
        avatar: String,
    },
    Move {
        room: String,
        x: f32,
        y: f32,
        is_moving: bool,
    },
    RequestStart {
        room: String,
    },
    SetWordAndReady {
        room: String,
        target_id: ConnectionId,
        word: String,
    },
    Chat {
        room: String,
        message: String,
    },
    ForceEndGame {
        room: String,
    },
}

impl ClientMessage {
    pub fn room(&self) -> &str {
        match self {
            ClientMessage::Join { room, .. }
            | ClientMessage::Move { room, .. }
            | ClientMessage::RequestStart { room }
            | ClientMessage::SetWordAndReady { room, .. }
            | ClientMessage::Chat { room, .. }
            | ClientMessage::ForceEndGame { room } => room,
        }
    }
}

/// Messages pushed by the server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ServerMessage {
    Connected {
        connection_id: ConnectionId,
    },
    UpdatePlayers {
        players: PlayerMap,
    },
    OpenWordSetter {
        players: PlayerMap,
    },
    GameStarted,
    GameEnded,
    PlayerOut {
        name: String,
        word: String,
        reason: String,
    },
    GameWinner {
        name: String,
    },
    NewMessage {
        name: String,
        message: String,
        is_alive: bool,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Player {
    pub id: ConnectionId,
    pub name: String,
    pub avatar: String,
    pub x: f32,
    pub y: f32,
    pub is_moving: bool,
    pub forbidden_word: String,
    pub is_alive: bool,
    pub is_ready: bool,
    pub is_host: bool,
}

impl Player {
    pub fn new(id: ConnectionId, name: String, avatar: String, x: f32, y: f32) -> Self {
        Self {
            id,
            name,
            avatar,
            x,
            y,
            is_moving: false,
            forbidden_word: String::new(),
            is_alive: true,
            is_ready: false,
            is_host: false,
        }
    }

    /// Restores the per-game fields to their values at join time.
    pub fn reset_round(&mut self) {
        self.is_alive = true;
        self.is_ready = false;
        self.forbidden_word.clear();
    }

    /// Literal, case-sensitive containment of this player's forbidden word.
    pub fn says_forbidden_word(&self, message: &str) -> bool {
        !self.forbidden_word.is_empty() && message.contains(self.forbidden_word.as_str())
    }
}

/// Cyclic successor of `id` in the key order of `players`.
///
/// Every client runs this on the same `OpenWordSetter` snapshot to find the
/// player whose forbidden word it sets. Returns `None` if `id` is not present.
pub fn successor_of(players: &PlayerMap, id: ConnectionId) -> Option<ConnectionId> {
    if !players.contains_key(&id) {
        return None;
    }
    players
        .range((Bound::Excluded(id), Bound::Unbounded))
        .next()
        .or_else(|| players.iter().next())
        .map(|(next, _)| *next)
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    FrameTooLarge { len: usize, max: usize },
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serializes `message` as a length-prefixed frame (4-byte big-endian length + bincode body).
pub fn encode_frame<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    let body = bincode::serialize(message)?;
    let len = u32::try_from(body.len()).map_err(|_| ProtocolError::FrameTooLarge {
        len: body.len(),
        max: u32::MAX as usize,
    })?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Validates a frame header and returns the body length that follows it.
pub fn frame_body_len(header: [u8; FRAME_HEADER_LEN], max: usize) -> Result<usize, ProtocolError> {
    let len = u32::from_be_bytes(header) as usize;
    if len > max {
        return Err(ProtocolError::FrameTooLarge { len, max });
    }
    Ok(len)
}

pub fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ProtocolError> {
    Ok(bincode::deserialize(body)?)
}

/// Reads one frame from `reader`.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly before a new header.
pub async fn read_frame<R, T>(reader: &mut R, max: usize) -> Result<Option<T>, ProtocolError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = frame_body_len(header, max)?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    decode_body(&body).map(Some)
}

pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode_frame(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
