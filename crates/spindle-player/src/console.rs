//! Line-based transport console
//!
//! One command per line:
//!
//! | input        | action                                  |
//! |--------------|-----------------------------------------|
//! | `p`          | toggle play/pause                       |
//! | `r <rate>`   | continuous rate (1.0 = normal)          |
//! | `j <delta>`  | jog nudge                               |
//! | `s <change>` | relative seek in track lengths          |
//! | `g <pct>`    | seek to a position 0–100                |
//! | `l <path>`   | load another track                      |
//! | `w <0-127>`  | absolute wheel position                 |
//! | `h`          | touch / release the wheel (seek-hold)   |
//! | `i`          | print status                            |
//! | `q`          | quit                                    |

use std::path::PathBuf;

use spindle_core::transport::{TransportCommand, WHEEL_STEPS};
use thiserror::Error;

pub const HELP: &str = "commands: p | r <rate> | j <delta> | s <change> | g <percent> | l <path> | w <0-127> | h | i | q";

/// A parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Transport(TransportCommand),
    ToggleHold,
    Status,
    Help,
    Quit,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("wheel position must be 0-127")]
    WheelOutOfRange,
}

/// Parse one console line; blank lines yield `None`
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb {
        "p" => ConsoleCommand::Transport(TransportCommand::TogglePlay),
        "r" => ConsoleCommand::Transport(TransportCommand::SetRate(number(rest, "r")?)),
        "j" => ConsoleCommand::Transport(TransportCommand::Jog(number(rest, "j")?)),
        "s" => ConsoleCommand::Transport(TransportCommand::Seek(number(rest, "s")?)),
        "g" => ConsoleCommand::Transport(TransportCommand::SeekToPercent(number(rest, "g")?)),
        "l" => {
            if rest.is_empty() {
                return Err(ParseError::MissingArgument("l"));
            }
            ConsoleCommand::Transport(TransportCommand::Load(PathBuf::from(rest)))
        }
        "w" => {
            let position: u8 = if rest.is_empty() {
                return Err(ParseError::MissingArgument("w"));
            } else {
                rest.parse().map_err(|_| ParseError::InvalidNumber(rest.to_string()))?
            };
            if position >= WHEEL_STEPS {
                return Err(ParseError::WheelOutOfRange);
            }
            ConsoleCommand::Transport(TransportCommand::MoveWheel(position))
        }
        "h" => ConsoleCommand::ToggleHold,
        "i" => ConsoleCommand::Status,
        "?" | "help" => ConsoleCommand::Help,
        "q" | "quit" => ConsoleCommand::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn number(arg: &str, verb: &'static str) -> Result<f64, ParseError> {
    if arg.is_empty() {
        return Err(ParseError::MissingArgument(verb));
    }
    match arg.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ParseError::InvalidNumber(arg.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(line: &str) -> TransportCommand {
        match parse_line(line).unwrap() {
            Some(ConsoleCommand::Transport(cmd)) => cmd,
            other => panic!("expected transport command, got {:?}", other),
        }
    }

    #[test]
    fn test_transport_commands() {
        assert_eq!(transport("p"), TransportCommand::TogglePlay);
        assert_eq!(transport("r 1.05"), TransportCommand::SetRate(1.05));
        assert_eq!(transport("  j   -0.2 "), TransportCommand::Jog(-0.2));
        assert_eq!(transport("s 0.25"), TransportCommand::Seek(0.25));
        assert_eq!(transport("g 50"), TransportCommand::SeekToPercent(50.0));
        assert_eq!(transport("w 127"), TransportCommand::MoveWheel(127));
        assert_eq!(
            transport("l /music/my track.flac"),
            TransportCommand::Load(PathBuf::from("/music/my track.flac"))
        );
    }

    #[test]
    fn test_console_commands() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("h").unwrap(), Some(ConsoleCommand::ToggleHold));
        assert_eq!(parse_line("i").unwrap(), Some(ConsoleCommand::Status));
        assert_eq!(parse_line("?").unwrap(), Some(ConsoleCommand::Help));
        assert_eq!(parse_line("q").unwrap(), Some(ConsoleCommand::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_line("x"), Err(ParseError::Unknown("x".into())));
        assert_eq!(parse_line("r"), Err(ParseError::MissingArgument("r")));
        assert_eq!(parse_line("r fast"), Err(ParseError::InvalidNumber("fast".into())));
        assert_eq!(parse_line("s NaN"), Err(ParseError::InvalidNumber("NaN".into())));
        assert_eq!(parse_line("w 128"), Err(ParseError::WheelOutOfRange));
        assert_eq!(parse_line("w -1"), Err(ParseError::InvalidNumber("-1".into())));
        assert_eq!(parse_line("l"), Err(ParseError::MissingArgument("l")));
    }
}
