// Keybindings for the flick viewer
// Maps key names to viewer commands and applies them
//
// Keybindings:
// - Right / l / n: Next item
// - Left / h / p: Previous item
// - Delete / d: Delete current file
// - Escape / q: Quit

use tracing::{info, warn};

use crate::error::{Result, ViewerError};
use crate::viewer::{DisplaySurface, Viewer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Right,
    Left,
    Delete,
    Escape,
    Char(char),
}

impl Key {
    /// Parses a key name such as `Right`, `esc` or a single character.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        match input.to_ascii_lowercase().as_str() {
            "right" => return Some(Key::Right),
            "left" => return Some(Key::Left),
            "delete" | "del" => return Some(Key::Delete),
            "escape" | "esc" => return Some(Key::Escape),
            _ => {}
        }

        let mut chars = input.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(Key::Char(c)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Next,
    Previous,
    Delete,
    Quit,
}

impl Command {
    pub fn from_key(key: Key) -> Option<Self> {
        match key {
            Key::Right | Key::Char('l') | Key::Char('n') => Some(Command::Next),
            Key::Left | Key::Char('h') | Key::Char('p') => Some(Command::Previous),
            Key::Delete | Key::Char('d') => Some(Command::Delete),
            Key::Escape | Key::Char('q') => Some(Command::Quit),
            _ => None,
        }
    }
}

/// Whether the input loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Applies `command` to `viewer`.
///
/// A failed delete is logged and the loop continues; only unexpected errors
/// are returned.
pub fn dispatch<D: DisplaySurface>(viewer: &mut Viewer<D>, command: Command) -> Result<Flow> {
    match command {
        Command::Next => viewer.navigate(1),
        Command::Previous => viewer.navigate(-1),
        Command::Delete => match viewer.delete_current() {
            Ok(path) => info!(?path, remaining = viewer.list().len(), "Removed from list"),
            Err(e @ ViewerError::Storage { .. }) => warn!(error = %e, "Delete failed"),
            Err(ViewerError::NoSelection) => warn!("Nothing to delete"),
            Err(e) => return Err(e),
        },
        Command::Quit => return Ok(Flow::Exit),
    }
    Ok(Flow::Continue)
}
