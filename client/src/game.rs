use log::debug;
use shared::{successor_of, ConnectionId, Player, PlayerMap, ServerMessage};

/// Client-side view of the room, rebuilt from server pushes.
#[derive(Debug, Clone, Default)]
pub struct ClientGameState {
    pub my_id: Option<ConnectionId>,
    pub players: PlayerMap,
    /// Player whose forbidden word this client sets in the current round
    pub word_target: Option<ConnectionId>,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn me(&self) -> Option<&Player> {
        self.players.get(&self.my_id?)
    }

    pub fn is_host(&self) -> bool {
        self.me().map_or(false, |p| p.is_host)
    }

    pub fn word_target(&self) -> Option<&Player> {
        self.players.get(&self.word_target?)
    }

    /// Applies a server message and returns a line describing it, if any.
    pub fn apply(&mut self, message: ServerMessage) -> Option<String> {
        match message {
            ServerMessage::Connected { connection_id } => {
                self.my_id = Some(connection_id);
                Some(format!("Connected as #{}", connection_id))
            }
            ServerMessage::UpdatePlayers { players } => {
                self.players = players;
                None
            }
            ServerMessage::OpenWordSetter { players } => {
                self.players = players;
                self.word_target = self.my_id.and_then(|id| successor_of(&self.players, id));
                debug!("Word target is {:?}", self.word_target);
                match self.word_target() {
                    Some(target) => Some(format!(
                        "Choose a forbidden word for {} with /word <text>",
                        target.name
                    )),
                    None => Some("Word setup opened, but you are not in the room".to_string()),
                }
            }
            ServerMessage::GameStarted => {
                Some("Game started! Keep talking and avoid your word.".to_string())
            }
            ServerMessage::GameEnded => {
                self.word_target = None;
                Some("Game ended.".to_string())
            }
            ServerMessage::PlayerOut { name, word, reason } => {
                Some(format!("{} is out ({}). Their word was {:?}", name, reason, word))
            }
            ServerMessage::GameWinner { name } => Some(format!("{} wins!", name)),
            ServerMessage::NewMessage {
                name,
                message,
                is_alive,
            } => {
                let marker = if is_alive { "" } else { " [out]" };
                Some(format!("{}{}: {}", name, marker, message))
            }
        }
    }

    /// One line per player, in id order.
    pub fn roster(&self) -> String {
        self.players
            .values()
            .map(|p| {
                let mut line = format!("#{} {} ({:.0}, {:.0})", p.id, p.name, p.x, p.y);
                if p.is_host {
                    line.push_str(" host");
                }
                if !p.is_alive {
                    line.push_str(" out");
                } else if p.is_ready {
                    line.push_str(" ready");
                }
                if Some(p.id) == self.my_id {
                    line.push_str(" (you)");
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
