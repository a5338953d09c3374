//! [`Robot`] – the shared context every loop is built from.
//!
//! Bundles the static configuration, the lifecycle state, the arbiter, the
//! sensors, the action library, and the output collaborators. Loops hold an
//! `Arc<Robot>` and never reach the hardware except through the arbiter.

use std::path::PathBuf;
use std::sync::Arc;

use okbot_hal::{ActionLibrary, Actuator, MotionProfile, Sensors};
use okbot_kernel::{ActuatorArbiter, Outcome, RobotState};
use okbot_types::{ActionSpec, Priority, RobotConfig};
use tracing::{debug, error, info, warn};

use crate::speech::{SoundPlayer, SpeechOutput};

pub struct Robot {
    pub config: RobotConfig,
    pub state: Arc<RobotState>,
    pub arbiter: Arc<ActuatorArbiter>,
    pub sensors: Arc<dyn Sensors>,
    pub library: ActionLibrary,
    speaker: Arc<dyn SpeechOutput>,
    sounds: Arc<dyn SoundPlayer>,
}

impl Robot {
    pub fn new(
        config: RobotConfig,
        actuator: Box<dyn Actuator>,
        sensors: Arc<dyn Sensors>,
        speaker: Arc<dyn SpeechOutput>,
        sounds: Arc<dyn SoundPlayer>,
    ) -> Arc<Self> {
        let library = ActionLibrary::new(MotionProfile::from_config(&config));
        Arc::new(Self {
            config,
            state: Arc::new(RobotState::new()),
            arbiter: Arc::new(ActuatorArbiter::new(actuator)),
            sensors,
            library,
            speaker,
            sounds,
        })
    }

    /// Speak `text`, logging it first. Never fails.
    pub async fn say(&self, text: &str) {
        info!("[SAY] {text}");
        if let Err(e) = self.speaker.speak(text).await {
            error!(error = %e, "TTS error");
        }
    }

    /// Play a sound file from the configured sound directory. Never fails.
    pub async fn play(&self, file: &str) {
        let path = PathBuf::from(&self.config.sound.sound_dir).join(file);
        if let Err(e) = self.sounds.play(&path).await {
            warn!(error = %e, "sound play error");
        }
    }

    /// Stop the motors and centre everything at `AutonomousMode` priority.
    ///
    /// Waits out any safety or emergency sequence in flight instead of being
    /// superseded by it, so the car is neutral once this returns `true`.
    /// `false` means the arbiter is closed or an actuator call failed.
    pub async fn neutralize(&self) -> bool {
        self.settle(&ActionSpec::neutral()).await
    }

    /// Apply `spec` at `AutonomousMode` priority once higher-priority work
    /// has drained. Faults are logged.
    pub async fn settle(&self, spec: &ActionSpec) -> bool {
        match self
            .arbiter
            .submit_when_clear(Priority::AutonomousMode, spec)
            .await
        {
            Ok(Outcome::Applied) => true,
            Ok(Outcome::Superseded) => {
                debug!(action = %spec.name, "arbiter closed");
                false
            }
            Err(e) => {
                error!(action = %spec.name, error = %e, "actuator fault");
                false
            }
        }
    }

    /// Submit and log instead of propagating; for callers that cannot act on
    /// an actuator fault.
    pub async fn submit_logged(&self, priority: Priority, spec: &ActionSpec) -> Option<Outcome> {
        match self.arbiter.submit(priority, spec).await {
            Ok(outcome) => {
                if outcome == Outcome::Superseded {
                    debug!(action = %spec.name, ?priority, "superseded");
                }
                Some(outcome)
            }
            Err(e) => {
                error!(action = %spec.name, ?priority, error = %e, "actuator fault");
                None
            }
        }
    }

    /// The phrase users are told to say to wake the robot.
    pub fn wake_hint(&self) -> String {
        self.config
            .wake_words
            .first()
            .cloned()
            .unwrap_or_else(|| format!("okay {}", self.config.robot_name.to_lowercase()))
    }

    /// Whether `text` contains any configured wake phrase.
    pub fn is_wake_phrase(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.config
            .wake_words
            .iter()
            .map(|w| w.trim().to_lowercase())
            .any(|w| !w.is_empty() && text.contains(&w))
    }
}
