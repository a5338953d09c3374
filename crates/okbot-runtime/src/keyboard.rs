//! Keyboard input: key bindings and the keyboard loop.
//!
//! Keys are bound to the same canonical phrases a user would say, so a key
//! press goes through exactly the same dispatch path as speech. Two keys are
//! handled specially: `?` prints the help card and `q`/Esc request shutdown.

use std::sync::Arc;

use okbot_types::{Command, KeyEvent};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::dispatcher::CommandDispatcher;

/// What a key does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyBinding {
    /// Dispatch this phrase.
    Phrase(&'static str),
    Help,
    Quit,
}

/// The binding for `key`, if any. Letters are case-insensitive.
pub fn binding(key: KeyEvent) -> Option<KeyBinding> {
    use KeyBinding::{Help, Phrase, Quit};
    let b = match key {
        KeyEvent::Up => Phrase("forward"),
        KeyEvent::Down => Phrase("backward"),
        KeyEvent::Left => Phrase("turn left"),
        KeyEvent::Right => Phrase("turn right"),
        KeyEvent::Space => Phrase("stop"),
        KeyEvent::Escape => Quit,
        KeyEvent::Char(c) => match c.to_ascii_lowercase() {
            'w' => Phrase("look up"),
            'a' => Phrase("look left"),
            'x' => Phrase("look down"),
            'e' => Phrase("look right"),
            'c' => Phrase("look center"),
            'd' => Phrase("dance"),
            's' => Phrase("shake head"),
            'n' => Phrase("nod"),
            'v' => Phrase("wave hands"),
            'b' => Phrase("celebrate"),
            'g' => Phrase("act cute"),
            't' => Phrase("think"),
            'p' => Phrase("patrol"),
            'o' => Phrase("spin around"),
            'j' => Phrase("twist body"),
            'k' => Phrase("depressed"),
            'r' => Phrase("reset"),
            'h' => Phrase("horn"),
            '1' => Phrase("line tracking"),
            '2' => Phrase("obstacle avoidance"),
            '0' => Phrase("cancel mode"),
            ' ' => Phrase("stop"),
            '?' => Help,
            'q' => Quit,
            _ => return None,
        },
    };
    Some(b)
}

pub const HELP: &str = "\
KEYBOARD CONTROLS
  Movement   Up Forward | Down Backward | Left Turn Left | Right Turn Right | Space Stop
  Camera     W Look Up | A Look Left | X Look Down | E Look Right | C Center
  Gestures   D Dance | S Shake Head | N Nod | V Wave Hands | B Celebrate | G Act Cute
             T Think | P Patrol | O Spin Around | J Twist Body | K Depressed | R Reset
  Modes      1 Line Tracking | 2 Obstacle Avoidance | 0 Cancel Mode
  Sound      H Horn
  System     Q / Esc Quit | ? Help";

/// Feeds key presses from a channel into the dispatcher until the channel
/// closes or the robot stops running.
pub struct KeyboardLoop {
    dispatcher: Arc<CommandDispatcher>,
    keys: mpsc::Receiver<KeyEvent>,
}

impl KeyboardLoop {
    pub fn new(dispatcher: Arc<CommandDispatcher>, keys: mpsc::Receiver<KeyEvent>) -> Self {
        Self { dispatcher, keys }
    }

    pub async fn run(mut self) {
        let cancel = self.dispatcher.robot().state.cancellation();
        info!("keyboard control active, press '?' for help");
        loop {
            let key = tokio::select! {
                _ = cancel.cancelled() => break,
                key = self.keys.recv() => match key {
                    Some(k) => k,
                    None => break,
                },
            };
            if let Err(e) = self.dispatcher.handle(&Command::key(key)).await {
                error!(?key, error = %e, "keyboard command failed");
            }
        }
        info!("keyboard listener stopped");
    }
}
