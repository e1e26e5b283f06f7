//! Terminal command parsing

use thiserror::Error;

/// A line typed by the user
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Word(String),
    End,
    Move { x: f32, y: f32 },
    Players,
    Quit,
    Chat(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("usage: /word <text>")]
    MissingWord,
    #[error("usage: /move <x> <y>")]
    BadCoordinates,
    #[error("unknown command /{0}")]
    Unknown(String),
}

/// Parses one input line. Blank lines yield `Ok(None)`.
///
/// Chat is passed through exactly as typed, surrounding spaces included.
pub fn parse_command(line: &str) -> Result<Option<Command>, InputError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let Some(rest) = trimmed.strip_prefix('/') else {
        return Ok(Some(Command::Chat(line.to_string())));
    };

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    let command = match name {
        "start" => Command::Start,
        "end" => Command::End,
        "players" => Command::Players,
        "quit" | "exit" => Command::Quit,
        "word" if args.is_empty() => return Err(InputError::MissingWord),
        "word" => Command::Word(args.to_string()),
        "move" => {
            let mut coords = args.split_whitespace().map(str::parse::<f32>);
            match (coords.next(), coords.next(), coords.next()) {
                (Some(Ok(x)), Some(Ok(y)), None) => Command::Move { x, y },
                _ => return Err(InputError::BadCoordinates),
            }
        }
        other => return Err(InputError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_plain_text_is_chat() {
        assert_eq!(
            parse_command("hello there"),
            Ok(Some(Command::Chat("hello there".to_string())))
        );
        assert_eq!(parse_command("   "), Ok(None));
    }

    #[test]
    fn test_chat_keeps_surrounding_spaces() {
        assert_eq!(
            parse_command("  pass the salt "),
            Ok(Some(Command::Chat("  pass the salt ".to_string())))
        );
        assert_eq!(parse_command("  /start "), Ok(Some(Command::Start)));
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse_command("/start"), Ok(Some(Command::Start)));
        assert_eq!(parse_command("/end"), Ok(Some(Command::End)));
        assert_eq!(parse_command("/players"), Ok(Some(Command::Players)));
        assert_eq!(parse_command("/quit"), Ok(Some(Command::Quit)));
    }

    #[test]
    fn test_word_keeps_inner_spaces() {
        assert_eq!(
            parse_command("/word  ice cream "),
            Ok(Some(Command::Word("ice cream".to_string())))
        );
        assert_eq!(parse_command("/word"), Err(InputError::MissingWord));
    }

    #[test]
    fn test_move_parses_coordinates() {
        match parse_command("/move 120.5 300") {
            Ok(Some(Command::Move { x, y })) => {
                assert_approx_eq!(x, 120.5);
                assert_approx_eq!(y, 300.0);
            }
            other => panic!("Unexpected parse {:?}", other),
        }
        assert_eq!(parse_command("/move 1"), Err(InputError::BadCoordinates));
        assert_eq!(parse_command("/move a b"), Err(InputError::BadCoordinates));
        assert_eq!(parse_command("/move 1 2 3"), Err(InputError::BadCoordinates));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse_command("/dance"),
            Err(InputError::Unknown("dance".to_string()))
        );
    }
}
