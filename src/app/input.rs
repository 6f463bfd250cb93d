//! Input events from the host and a line-based stdin source

use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Input delivered to the session loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// `KeyboardEvent.code` of a pressed key
    KeyDown(String),
    KeyUp(String),
    /// Window lost focus
    ReleaseAll,
    OpenDetail,
    CloseDetail,
}

#[derive(Debug, thiserror::Error)]
pub enum InputParseError {
    #[error("Unrecognised input command: {0}")]
    Unknown(String),
}

impl FromStr for InputEvent {
    type Err = InputParseError;

    /// `down KeyW`, `up KeyW`, `release`, `detail open`, `detail close`
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some("down"), Some(code), None) => Ok(InputEvent::KeyDown(code.to_string())),
            (Some("up"), Some(code), None) => Ok(InputEvent::KeyUp(code.to_string())),
            (Some("release"), None, None) => Ok(InputEvent::ReleaseAll),
            (Some("detail"), Some("open"), None) => Ok(InputEvent::OpenDetail),
            (Some("detail"), Some("close"), None) => Ok(InputEvent::CloseDetail),
            _ => Err(InputParseError::Unknown(line.trim().to_string())),
        }
    }
}

/// Forward stdin commands to the session until EOF
pub fn spawn_stdin_reader(tx: mpsc::UnboundedSender<InputEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match line.parse::<InputEvent>() {
                    Ok(event) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "Ignoring input line"),
                },
                Ok(None) => {
                    debug!("Input closed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read input");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!("down KeyW".parse::<InputEvent>().unwrap(), InputEvent::KeyDown("KeyW".into()));
        assert_eq!("up  ArrowLeft ".parse::<InputEvent>().unwrap(), InputEvent::KeyUp("ArrowLeft".into()));
        assert_eq!("release".parse::<InputEvent>().unwrap(), InputEvent::ReleaseAll);
        assert_eq!("detail open".parse::<InputEvent>().unwrap(), InputEvent::OpenDetail);
        assert_eq!("detail close".parse::<InputEvent>().unwrap(), InputEvent::CloseDetail);
    }

    #[test]
    fn rejects_unknown_commands() {
        assert!("jump".parse::<InputEvent>().is_err());
        assert!("down".parse::<InputEvent>().is_err());
        assert!("down KeyW KeyA".parse::<InputEvent>().is_err());
    }
}
