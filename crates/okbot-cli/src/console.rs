//! Console front-end: stdin stands in for the microphone and the keyboard.
//!
//! Every line typed at the `okbot>` prompt is one heard utterance. A line
//! starting with `!` is a key press instead: `!w`, `!1`, `!?`, `!q`, or one of
//! the named keys `!up`, `!down`, `!left`, `!right`, `!space`, `!esc`.

use std::thread::{self, JoinHandle};

use colored::Colorize;
use okbot_types::KeyEvent;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleLine {
    Utterance(String),
    Key(KeyEvent),
    /// `!` followed by something that is not a key.
    UnknownKey(String),
    Empty,
}

pub fn parse_line(line: &str) -> ConsoleLine {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleLine::Empty;
    }
    let Some(key) = line.strip_prefix('!') else {
        return ConsoleLine::Utterance(line.to_string());
    };
    match parse_key(key) {
        Some(k) => ConsoleLine::Key(k),
        None => ConsoleLine::UnknownKey(key.to_string()),
    }
}

fn parse_key(name: &str) -> Option<KeyEvent> {
    let key = match name.to_ascii_lowercase().as_str() {
        "up" => KeyEvent::Up,
        "down" => KeyEvent::Down,
        "left" => KeyEvent::Left,
        "right" => KeyEvent::Right,
        "space" | "" => KeyEvent::Space,
        "esc" | "escape" => KeyEvent::Escape,
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => KeyEvent::Char(c),
                _ => return None,
            }
        }
    };
    Some(key)
}

/// Where console input goes.
pub struct ConsoleSinks {
    pub speech: mpsc::Sender<String>,
    /// `None` when keyboard control is disabled.
    pub keys: Option<mpsc::Sender<KeyEvent>>,
    /// Signalled on Ctrl-C or Ctrl-D at the prompt.
    pub quit: mpsc::UnboundedSender<&'static str>,
}

/// Read the console on a dedicated thread until EOF, an interrupt, or a
/// closed sink.
pub fn spawn(sinks: ConsoleSinks) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut editor = match DefaultEditor::new() {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "console unavailable");
                return;
            }
        };
        loop {
            let line = match editor.readline(&format!("{} ", "okbot>".bold().cyan())) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => {
                    let _ = sinks.quit.send("Ctrl-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    let _ = sinks.quit.send("end of input");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "console read error");
                    break;
                }
            };
            let _ = editor.add_history_entry(line.as_str());

            let delivered = match parse_line(&line) {
                ConsoleLine::Empty => true,
                ConsoleLine::Utterance(text) => sinks.speech.blocking_send(text).is_ok(),
                ConsoleLine::Key(key) => match &sinks.keys {
                    Some(keys) => keys.blocking_send(key).is_ok(),
                    None => {
                        println!("  {}", "Keyboard control is disabled.".yellow());
                        true
                    }
                },
                ConsoleLine::UnknownKey(name) => {
                    println!("  {} '!{}'. Type {} for key help.", "Unknown key".red(), name, "!?".bold());
                    true
                }
            };
            if !delivered {
                debug!("console sink closed");
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_utterances() {
        assert_eq!(
            parse_line("  okay robot  "),
            ConsoleLine::Utterance("okay robot".to_string())
        );
        assert_eq!(parse_line("   "), ConsoleLine::Empty);
    }

    #[test]
    fn bang_lines_are_keys() {
        assert_eq!(parse_line("!w"), ConsoleLine::Key(KeyEvent::Char('w')));
        assert_eq!(parse_line("!1"), ConsoleLine::Key(KeyEvent::Char('1')));
        assert_eq!(parse_line("!UP"), ConsoleLine::Key(KeyEvent::Up));
        assert_eq!(parse_line("!space"), ConsoleLine::Key(KeyEvent::Space));
        assert_eq!(parse_line("!"), ConsoleLine::Key(KeyEvent::Space));
        assert_eq!(parse_line("!esc"), ConsoleLine::Key(KeyEvent::Escape));
        assert_eq!(parse_line("!?"), ConsoleLine::Key(KeyEvent::Char('?')));
    }

    #[test]
    fn unknown_key_names_are_reported() {
        assert_eq!(
            parse_line("!warp"),
            ConsoleLine::UnknownKey("warp".to_string())
        );
    }
}
