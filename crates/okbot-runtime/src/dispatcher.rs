//! [`CommandDispatcher`] – turns a [`Command`] into robot behaviour.
//!
//! # Keyword resolution
//!
//! Text is [`normalize`]d and then resolved in this order:
//!
//! 1. System commands: sleep, cancel mode, start a mode, horn, engine,
//!    status, help (whole-word phrase match), and stop/halt/freeze (exact
//!    match only).
//! 2. Exact match against the action keyword table.
//! 3. Longest action keyword contained in the text.
//! 4. Otherwise unhandled; the caller owns the fallback message.
//!
//! # Generative mode
//!
//! With a chat provider configured, voice text other than sleep and stop is
//! sent to the model. The reply's free text is spoken and each name on its
//! `ACTIONS:` line is performed by exact lookup. If the provider fails, the
//! command falls back to keyword resolution.
//!
//! Replies to voice commands are spoken; replies to key presses are logged.

use std::sync::Arc;

use okbot_hal::{Action, ActionLibrary};
use okbot_kernel::Outcome;
use okbot_types::{
    ActionSpec, Command, CommandPayload, CommandSource, DriveMode, Priority, RobotError,
};
use tracing::{debug, error, info, instrument, warn};

use crate::chat::{ChatProvider, parse_reply, system_prompt};
use crate::keyboard::{self, HELP, KeyBinding};
use crate::lifecycle::{SleepReason, StateMachine};
use crate::robot::Robot;

// ─────────────────────────────────────────────────────────────────────────────
// Resolution
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemCommand {
    Sleep,
    CancelMode,
    StartMode(DriveMode),
    Horn,
    Engine,
    Status,
    Help,
    Stop,
}

/// Phrase triggers, checked in order. `Stop` is handled separately.
const SYSTEM_TRIGGERS: &[(SystemCommand, &[&str])] = &[
    (SystemCommand::Sleep, &["go to sleep", "sleep", "goodbye", "bye"]),
    (
        SystemCommand::CancelMode,
        &["stop mode", "cancel mode", "exit mode", "normal mode"],
    ),
    (
        SystemCommand::StartMode(DriveMode::LineTrack),
        &["line tracking", "track line", "follow line", "line track", "follow the line"],
    ),
    (
        SystemCommand::StartMode(DriveMode::ObstacleAvoid),
        &["obstacle avoidance", "avoid obstacles", "obstacle mode", "avoid mode"],
    ),
    (SystemCommand::Horn, &["honk", "horn", "beep"]),
    (SystemCommand::Engine, &["start engine", "engine"]),
    (SystemCommand::Status, &["status", "how are you", "what's up"]),
    (SystemCommand::Help, &["help", "what can you do", "commands"]),
];

const STOP_WORDS: &[&str] = &["stop", "halt", "freeze"];

/// Mode names the chat model may put on its directive line.
const DIRECTIVE_MODES: &[(&str, DriveMode)] = &[
    ("line track", DriveMode::LineTrack),
    ("obstacle avoid", DriveMode::ObstacleAvoid),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    System(SystemCommand),
    /// The whole text is an action keyword.
    Exact(Action),
    /// The longest action keyword found inside the text.
    Keyword(&'static str, Action),
    Unhandled,
}

/// Lowercase, drop punctuation other than apostrophes, and collapse
/// whitespace.
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '\'' {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    cleaned
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// `true` when `phrase` occurs in `text` on word boundaries.
fn contains_phrase(text: &str, phrase: &str) -> bool {
    let words: Vec<&str> = text.split(' ').collect();
    let wanted: Vec<&str> = phrase.split(' ').collect();
    words.windows(wanted.len()).any(|w| w == wanted.as_slice())
}

/// The system command named by already-normalized `text`, if any.
pub fn resolve_system(text: &str) -> Option<SystemCommand> {
    if STOP_WORDS.contains(&text) {
        return Some(SystemCommand::Stop);
    }
    SYSTEM_TRIGGERS
        .iter()
        .find(|(_, phrases)| phrases.iter().any(|p| contains_phrase(text, p)))
        .map(|(cmd, _)| *cmd)
}

/// Deterministic keyword resolution of already-normalized `text`.
pub fn resolve(library: &ActionLibrary, text: &str) -> Resolution {
    if let Some(cmd) = resolve_system(text) {
        return Resolution::System(cmd);
    }
    if let Some(action) = library.lookup_exact(text) {
        return Resolution::Exact(action);
    }
    match library.longest_substring(text) {
        Some((keyword, action)) => Resolution::Keyword(keyword, action),
        None => Resolution::Unhandled,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// How a command was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled,
    /// Nothing matched; the caller should tell the user.
    Unhandled,
    /// Empty text or an unbound key.
    Ignored,
}

const HELP_REPLY: &str = "I can go forward, backward, turn left or right, look around, \
dance, celebrate, patrol, track lines, avoid obstacles, and more! Just tell me what to do.";

pub struct CommandDispatcher {
    lifecycle: Arc<StateMachine>,
    chat: Option<Arc<dyn ChatProvider>>,
    prompt: String,
}

impl CommandDispatcher {
    pub fn new(lifecycle: Arc<StateMachine>, chat: Option<Arc<dyn ChatProvider>>) -> Self {
        let prompt = system_prompt(&lifecycle.robot().config.robot_name);
        Self {
            lifecycle,
            chat,
            prompt,
        }
    }

    pub fn robot(&self) -> &Arc<Robot> {
        self.lifecycle.robot()
    }

    /// Handle one command event.
    ///
    /// # Errors
    ///
    /// [`RobotError::ActuatorFault`] when an action's actuator call fails.
    /// Lifecycle state is left as it was.
    #[instrument(skip_all, fields(id = %cmd.id, source = ?cmd.source))]
    pub async fn handle(&self, cmd: &Command) -> Result<Dispatch, RobotError> {
        match &cmd.payload {
            CommandPayload::Text(text) => {
                let generative = cmd.source == CommandSource::Voice && self.chat.is_some();
                self.handle_text(cmd.source, text, generative).await
            }
            CommandPayload::Key(key) => match keyboard::binding(*key) {
                None => {
                    debug!(?key, "unbound key");
                    Ok(Dispatch::Ignored)
                }
                Some(KeyBinding::Help) => {
                    info!("\n{HELP}");
                    Ok(Dispatch::Handled)
                }
                Some(KeyBinding::Quit) => {
                    info!("keyboard: quit requested");
                    self.lifecycle.shutdown().await;
                    Ok(Dispatch::Handled)
                }
                Some(KeyBinding::Phrase(phrase)) => {
                    info!(?key, phrase, "keyboard");
                    self.handle_text(CommandSource::Keyboard, phrase, false).await
                }
            },
        }
    }

    async fn handle_text(
        &self,
        source: CommandSource,
        text: &str,
        generative: bool,
    ) -> Result<Dispatch, RobotError> {
        let text = normalize(text);
        if text.is_empty() {
            return Ok(Dispatch::Ignored);
        }
        self.robot().state.touch();
        info!("[HEARD] {text}");

        if generative {
            match resolve_system(&text) {
                Some(cmd @ (SystemCommand::Sleep | SystemCommand::Stop)) => {
                    self.run_system(source, cmd).await
                }
                _ => self.converse(source, &text).await,
            }
        } else {
            self.run_keyword(source, &text).await
        }
    }

    async fn run_keyword(&self, source: CommandSource, text: &str) -> Result<Dispatch, RobotError> {
        match resolve(&self.robot().library, text) {
            Resolution::System(cmd) => self.run_system(source, cmd).await,
            Resolution::Exact(action) => {
                self.reply(source, &format!("Okay, {text}!")).await;
                self.perform(action).await?;
                Ok(Dispatch::Handled)
            }
            Resolution::Keyword(keyword, action) => {
                self.reply(source, &format!("Got it, {keyword}!")).await;
                self.perform(action).await?;
                Ok(Dispatch::Handled)
            }
            Resolution::Unhandled => Ok(Dispatch::Unhandled),
        }
    }

    async fn run_system(
        &self,
        source: CommandSource,
        cmd: SystemCommand,
    ) -> Result<Dispatch, RobotError> {
        let robot = self.robot();
        debug!(?cmd, "system command");
        match cmd {
            SystemCommand::Sleep => {
                if !self.lifecycle.sleep(SleepReason::Command).await {
                    self.reply(source, "I'm already asleep.").await;
                }
            }
            SystemCommand::CancelMode => {
                self.halt().await?;
                self.reply(source, "Autonomous mode stopped. I'm listening for commands.")
                    .await;
            }
            SystemCommand::StartMode(mode) => {
                if self.lifecycle.modes().enter(mode).await {
                    self.reply(source, &format!("Starting {mode} mode. Say stop to exit."))
                        .await;
                } else {
                    self.reply(source, &format!("I'm already in {mode} mode.")).await;
                }
            }
            SystemCommand::Horn => {
                robot.play(&robot.config.sound.horn).await;
                self.reply(source, "Beep beep!").await;
            }
            SystemCommand::Engine => {
                robot.play(&robot.config.sound.engine).await;
                self.reply(source, "Vroom vroom!").await;
            }
            SystemCommand::Status => {
                let status = match robot.sensors.read_distance() {
                    Ok(d) if d > 0.0 => format!(
                        "I'm doing great! Distance ahead is {} centimeters.",
                        round2(d)
                    ),
                    _ => "I'm doing great and ready for commands!".to_string(),
                };
                self.reply(source, &status).await;
            }
            SystemCommand::Help => self.reply(source, HELP_REPLY).await,
            SystemCommand::Stop => {
                self.halt().await?;
                self.reply(source, "Stopped!").await;
            }
        }
        Ok(Dispatch::Handled)
    }

    /// Cancel any mode, then stop the motors and centre the steering.
    async fn halt(&self) -> Result<(), RobotError> {
        if let Some(mode) = self.lifecycle.modes().cancel().await {
            info!(%mode, "mode cancelled");
        }
        let spec = ActionSpec::new("halt").stop().steer(0);
        match self
            .robot()
            .arbiter
            .submit_when_clear(Priority::AutonomousMode, &spec)
            .await?
        {
            Outcome::Applied => Ok(()),
            Outcome::Superseded => Err(RobotError::ShuttingDown),
        }
    }

    async fn perform(&self, action: Action) -> Result<(), RobotError> {
        let robot = self.robot();
        let spec = robot.library.script(action);
        let outcome = robot.arbiter.submit(Priority::Manual, &spec).await?;
        debug!(%action, ?outcome, "action finished");
        Ok(())
    }

    async fn converse(&self, source: CommandSource, text: &str) -> Result<Dispatch, RobotError> {
        let Some(chat) = self.chat.as_ref() else {
            return self.run_keyword(source, text).await;
        };
        let robot = self.robot();

        let user_text = match robot.state.too_close() {
            Some(stored) => {
                let d = match robot.sensors.read_distance() {
                    Ok(d) if d > 0.0 => d,
                    _ => stored,
                };
                format!("<<<Ultrasonic sense too close: {}cm>>> {text}", round2(d))
            }
            None => text.to_string(),
        };

        info!(provider = chat.name(), "[LLM] sending");
        let reply = match chat.chat(&user_text, &self.prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "LLM error");
                self.reply(source, "Sorry, I couldn't reach my brain right now.")
                    .await;
                return self.run_keyword(source, text).await;
            }
        };
        info!("[LLM RESPONSE] {reply}");

        let parsed = parse_reply(&reply);
        if !parsed.speech.is_empty() {
            self.reply(source, &parsed.speech).await;
        }
        for name in &parsed.actions {
            if let Some(action) = robot.library.lookup_exact(name) {
                self.perform(action).await?;
            } else if let Some((_, mode)) = DIRECTIVE_MODES.iter().find(|(n, _)| *n == name.as_str()) {
                self.lifecycle.modes().enter(*mode).await;
            } else {
                warn!(%name, "[ACTION] unknown action");
            }
        }
        Ok(Dispatch::Handled)
    }

    async fn reply(&self, source: CommandSource, text: &str) {
        match source {
            CommandSource::Voice => self.robot().say(text).await,
            CommandSource::Keyboard => info!("[KEYBOARD] {text}"),
        }
    }
}

fn round2(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}
