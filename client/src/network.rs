use crate::game::ClientGameState;
use crate::input::{parse_command, Command};
use log::{debug, error, info, warn};
use shared::{read_frame, write_frame, ClientMessage, ProtocolError, ServerMessage, MAX_FRAME_BYTES};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

pub struct Client {
    writer: OwnedWriteHalf,
    inbound: mpsc::UnboundedReceiver<ServerMessage>,
    room: String,
    name: String,
    avatar: String,
    game_state: ClientGameState,
}

impl Client {
    pub async fn connect(
        server_addr: &str,
        room: String,
        name: String,
        avatar: String,
    ) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(server_addr).await?;
        stream.set_nodelay(true)?;
        info!("Connected to {}", server_addr);

        let (reader, writer) = stream.into_split();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        tokio::spawn(pump_server_messages(reader, inbound_tx));

        Ok(Client {
            writer,
            inbound,
            room,
            name,
            avatar,
            game_state: ClientGameState::new(),
        })
    }

    async fn send(&mut self, message: &ClientMessage) -> Result<(), ClientError> {
        write_frame(&mut self.writer, message).await?;
        Ok(())
    }

    /// Joins the room and interleaves server pushes with stdin commands until
    /// the user quits or the server closes the connection.
    pub async fn run(&mut self) -> Result<(), ClientError> {
        let join = ClientMessage::Join {
            room: self.room.clone(),
            name: self.name.clone(),
            avatar: self.avatar.clone(),
        };
        self.send(&join).await?;
        info!("Joined room {} as {}", self.room, self.name);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                message = self.inbound.recv() => {
                    let Some(message) = message else {
                        warn!("Server closed the connection");
                        break;
                    };
                    if let Some(line) = self.game_state.apply(message) {
                        println!("{}", line);
                    }
                },
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    match parse_command(&line) {
                        Ok(Some(Command::Quit)) => break,
                        Ok(Some(Command::Players)) => println!("{}", self.game_state.roster()),
                        Ok(Some(command)) => {
                            if let Some(message) = command_message(&self.room, &self.game_state, command) {
                                self.send(&message).await?;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => println!("{}", e),
                    }
                },
            }
        }

        Ok(())
    }
}

/// Turns a user command into the message for `room`.
///
/// `/start` and `/end` are host-only and `/word` needs a target from the last
/// word-setter snapshot; otherwise the command is dropped locally.
pub fn command_message(
    room: &str,
    state: &ClientGameState,
    command: Command,
) -> Option<ClientMessage> {
    let room = room.to_string();
    let message = match command {
        Command::Start | Command::End if !state.is_host() => {
            println!("Only the host can start or end the game");
            return None;
        }
        Command::Start => ClientMessage::RequestStart { room },
        Command::End => ClientMessage::ForceEndGame { room },
        Command::Chat(message) => ClientMessage::Chat { room, message },
        Command::Move { x, y } => ClientMessage::Move {
            room,
            x,
            y,
            is_moving: false,
        },
        Command::Word(word) => {
            let Some(target_id) = state.word_target else {
                println!("No word to set right now");
                return None;
            };
            ClientMessage::SetWordAndReady {
                room,
                target_id,
                word,
            }
        }
        Command::Players | Command::Quit => return None,
    };
    Some(message)
}

/// Decodes frames from `reader` into `inbound` until the stream ends.
pub async fn pump_server_messages<R>(mut reader: R, inbound: mpsc::UnboundedSender<ServerMessage>)
where
    R: AsyncRead + Unpin,
{
    loop {
        match read_frame::<_, ServerMessage>(&mut reader, MAX_FRAME_BYTES).await {
            Ok(Some(message)) => {
                if inbound.send(message).is_err() {
                    break;
                }
            }
            Ok(None) => {
                debug!("Server stream ended");
                break;
            }
            Err(e) => {
                error!("Error reading from server: {}", e);
                break;
            }
        }
    }
}
