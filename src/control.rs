//! Console control surface
//!
//! A minimal line-based menu on stdin running in its own thread. Each
//! recognized command becomes exactly one message on the control
//! channel; unrecognized input is answered on the console and ignored.

use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use tracing::{debug, info};

use crate::error::ControlError;

/// Commands the console can issue to the orchestration loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    ToggleDisplay,
    ToggleTransmit,
    Snapshot,
    ReloadCameras,
    Quit,
}

/// Map one input line to a command. The first non-blank character
/// decides, case-insensitive; blank lines map to nothing.
pub fn parse_command(line: &str) -> Option<ControlCommand> {
    let c = line.trim().chars().next()?;
    match c.to_ascii_lowercase() {
        'f' => Some(ControlCommand::ToggleDisplay),
        't' => Some(ControlCommand::ToggleTransmit),
        's' => Some(ControlCommand::Snapshot),
        'r' => Some(ControlCommand::ReloadCameras),
        'q' => Some(ControlCommand::Quit),
        _ => None,
    }
}

pub fn print_menu() {
    println!();
    println!("x=============x CCTV Node Menu x=============x");
    println!("[F] - Toggle preview window");
    println!("[T] - Toggle transmission to server");
    println!("[S] - Save snapshot (grid)");
    println!("[R] - Reload cameras");
    println!("[Q] - Quit");
    println!("x============================================x");
}

/// Spawn the stdin reader thread.
///
/// The thread runs until stdin reaches EOF, a quit command is read, or
/// the receiving side goes away. It cannot be interrupted while blocked
/// on a read, so it is left detached at shutdown.
pub fn spawn_stdin_reader(sender: Sender<ControlCommand>) -> Result<JoinHandle<()>, ControlError> {
    thread::Builder::new()
        .name("control-input".to_string())
        .spawn(move || {
            print_menu();
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let Some(command) = parse_command(&line) else {
                    if !line.trim().is_empty() {
                        println!("Unknown command...");
                    }
                    continue;
                };
                debug!(?command, "console command");
                let quit = command == ControlCommand::Quit;
                if sender.send(command).is_err() || quit {
                    break;
                }
            }
            info!("control input closed");
        })
        .map_err(|e| ControlError::SpawnFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_letters_map_to_commands() {
        assert_eq!(parse_command("f"), Some(ControlCommand::ToggleDisplay));
        assert_eq!(parse_command("t"), Some(ControlCommand::ToggleTransmit));
        assert_eq!(parse_command("s"), Some(ControlCommand::Snapshot));
        assert_eq!(parse_command("r"), Some(ControlCommand::ReloadCameras));
        assert_eq!(parse_command("q"), Some(ControlCommand::Quit));
    }

    #[test]
    fn test_case_and_whitespace_are_ignored() {
        assert_eq!(parse_command("  Q  "), Some(ControlCommand::Quit));
        assert_eq!(parse_command("T\n"), Some(ControlCommand::ToggleTransmit));
        assert_eq!(parse_command("\tF"), Some(ControlCommand::ToggleDisplay));
    }

    #[test]
    fn test_only_first_character_counts() {
        assert_eq!(parse_command("quit"), Some(ControlCommand::Quit));
        assert_eq!(parse_command("snapshot please"), Some(ControlCommand::Snapshot));
    }

    #[test]
    fn test_blank_and_unknown_input_map_to_nothing() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("   "), None);
        assert_eq!(parse_command("x"), None);
        assert_eq!(parse_command("7"), None);
    }
}
