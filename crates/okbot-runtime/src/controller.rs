//! [`VoiceController`] – the main voice loop.
//!
//! Alternates between two phases for as long as the robot is running:
//!
//! - **Wake phase** (asleep): block on the recogniser until a wake phrase is
//!   heard, then hand over to [`StateMachine::wake`].
//! - **Command phase** (awake): listen in short windows so the idle timeout
//!   and shutdown are noticed promptly, and pass each utterance to the
//!   [`CommandDispatcher`].
//!
//! With `wake_enabled = false` the wake phase is skipped entirely.

use std::sync::Arc;
use std::time::Duration;

use okbot_types::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dispatcher::{CommandDispatcher, Dispatch};
use crate::lifecycle::StateMachine;
use crate::robot::Robot;
use crate::speech::{SpeechError, SpeechInput};

/// Upper bound on one listen call in the command phase.
pub const LISTEN_WINDOW: Duration = Duration::from_secs(1);
const WAKE_RETRY: Duration = Duration::from_secs(1);
const LISTEN_RETRY: Duration = Duration::from_millis(500);

const NOT_UNDERSTOOD: &str =
    "I didn't understand that. Try saying a command like forward, turn left, or dance.";

pub struct VoiceController {
    lifecycle: Arc<StateMachine>,
    dispatcher: Arc<CommandDispatcher>,
    input: Arc<dyn SpeechInput>,
}

impl VoiceController {
    pub fn new(
        lifecycle: Arc<StateMachine>,
        dispatcher: Arc<CommandDispatcher>,
        input: Arc<dyn SpeechInput>,
    ) -> Self {
        Self {
            lifecycle,
            dispatcher,
            input,
        }
    }

    fn robot(&self) -> &Arc<Robot> {
        self.lifecycle.robot()
    }

    /// Run until shutdown or until the speech input closes.
    pub async fn run(self) {
        let cancel = self.robot().state.cancellation();
        if !self.robot().config.wake_enabled {
            info!("wake word disabled, listening for commands");
            self.lifecycle.wake().await;
        }

        while self.robot().state.running() {
            if !self.robot().state.is_awake() && !self.wake_phase(&cancel).await {
                break;
            }
            if self.robot().state.is_awake() && !self.command_phase(&cancel).await {
                break;
            }
        }
        info!("voice controller stopped");
    }

    /// Returns `false` when the controller should stop.
    async fn wake_phase(&self, cancel: &CancellationToken) -> bool {
        let robot = self.robot();
        info!(hint = %robot.wake_hint(), "waiting for wake word");
        let heard = tokio::select! {
            _ = cancel.cancelled() => return false,
            r = self.input.wait_for_wake(&robot.config.wake_words) => r,
        };
        match heard {
            Ok(text) => {
                debug!(%text, "wake phrase");
                self.lifecycle.wake().await;
                true
            }
            Err(SpeechError::Closed) => {
                info!("speech input closed");
                false
            }
            Err(e) => {
                warn!(error = %e, "wake word error");
                robot.state.tick(WAKE_RETRY).await
            }
        }
    }

    /// Returns `false` when the controller should stop, `true` when the robot
    /// fell asleep.
    async fn command_phase(&self, cancel: &CancellationToken) -> bool {
        let robot = self.robot();
        robot.state.set_listening(true);
        info!("listening for commands");

        let keep_running = loop {
            if !robot.state.running() {
                break false;
            }
            if self.lifecycle.check_timeout().await || !robot.state.is_awake() {
                break true;
            }

            let heard = tokio::select! {
                _ = cancel.cancelled() => break false,
                r = tokio::time::timeout(LISTEN_WINDOW, self.input.listen(robot.config.stt_stream)) => r,
            };
            let text = match heard {
                Err(_) | Ok(Err(SpeechError::Timeout)) => continue,
                Ok(Err(SpeechError::Closed)) => {
                    info!("speech input closed");
                    break false;
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "listen error");
                    if !robot.state.tick(LISTEN_RETRY).await {
                        break false;
                    }
                    continue;
                }
                Ok(Ok(text)) => text,
            };

            let text = text.trim();
            if !text.is_empty() {
                self.on_utterance(text).await;
            }
        };

        robot.state.set_listening(false);
        keep_running
    }

    async fn on_utterance(&self, text: &str) {
        let robot = self.robot();
        if robot.is_wake_phrase(text) {
            robot.state.touch();
            robot.say("Yes, I'm here! What's up?").await;
            return;
        }
        match self.dispatcher.handle(&Command::voice(text)).await {
            Ok(Dispatch::Unhandled) => robot.say(NOT_UNDERSTOOD).await,
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, %text, "command failed");
                robot.say("Sorry, something went wrong with that command.").await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use okbot_types::RobotConfig;
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::autonomy::AutonomousModeRunner;
    use crate::speech::ChannelInput;
    use crate::testing::{Rig, rig_with};

    const GREETING: &str = "Hi there! I'm Robot. What would you like me to do?";

    fn start(config: RobotConfig) -> (Rig, mpsc::Sender<String>, JoinHandle<()>) {
        let rig = rig_with(config);
        let modes = Arc::new(AutonomousModeRunner::new(rig.robot.clone()));
        let lifecycle = Arc::new(StateMachine::new(rig.robot.clone(), modes));
        let dispatcher = Arc::new(CommandDispatcher::new(lifecycle.clone(), None));
        let (tx, input) = ChannelInput::channel(16);
        let controller = VoiceController::new(lifecycle, dispatcher, Arc::new(input));
        let task = tokio::spawn(controller.run());
        (rig, tx, task)
    }

    async fn say_lines(tx: &mpsc::Sender<String>, lines: &[&str]) {
        for line in lines {
            tx.send(line.to_string()).await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn wake_then_command() {
        let (rig, tx, task) = start(RobotConfig::default());
        say_lines(&tx, &["turn left", "okay robot", "please turn left"]).await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(rig.robot.state.is_awake());
        assert!(rig.robot.state.is_listening());
        assert_eq!(rig.spoken(), vec![GREETING, "Got it, turn left!"]);

        drop(tx);
        task.await.unwrap();
        assert!(!rig.robot.state.is_listening());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_text_gets_the_fallback_and_wake_retriggers() {
        let (rig, tx, task) = start(RobotConfig::default());
        say_lines(&tx, &["hey robot", "tell me a joke", "   ", "hey robot"]).await;
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(
            rig.spoken(),
            vec![GREETING, NOT_UNDERSTOOD, "Yes, I'm here! What's up?"]
        );
        drop(tx);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timeout_returns_to_the_wake_phase() {
        let (rig, tx, task) = start(RobotConfig {
            command_timeout_secs: 2,
            ..RobotConfig::default()
        });
        say_lines(&tx, &["okay robot"]).await;
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(!rig.robot.state.is_awake());
        assert!(!rig.robot.state.is_listening());

        say_lines(&tx, &["dance", "ok robot"]).await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        let spoken = rig.spoken();
        assert_eq!(spoken.len(), 3);
        assert!(spoken[1].starts_with("I haven't heard anything for a while."));
        assert_eq!(spoken[2], GREETING);

        rig.robot.state.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn wake_disabled_accepts_commands_immediately() {
        let (rig, tx, task) = start(RobotConfig {
            wake_enabled: false,
            command_timeout_secs: 1,
            ..RobotConfig::default()
        });
        tokio::time::sleep(Duration::from_secs(5)).await;
        say_lines(&tx, &["look up"]).await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(rig.robot.state.is_awake());
        assert_eq!(rig.spoken().last().unwrap(), "Okay, look up!");
        drop(tx);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_an_idle_controller() {
        let (rig, tx, task) = start(RobotConfig::default());
        tokio::time::sleep(Duration::from_secs(2)).await;
        rig.robot.state.shutdown();
        task.await.unwrap();

        assert!(tx.is_closed());
        assert!(rig.spoken().is_empty());
    }
}
