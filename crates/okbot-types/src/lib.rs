//! Shared vocabulary for the okbot workspace: command events, arbitration
//! priorities, driving modes, actuator steps, and the global error type.

pub mod config;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use config::{LlmConfig, LlmProvider, RobotConfig, SoundConfig};

/// Urgency class of an actuator submission.
///
/// Ordered lowest to highest so that `Priority::Emergency > Priority::Manual`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    /// Voice or keyboard commands.
    Manual,
    /// Steady driving from a line-track or obstacle-avoid loop.
    AutonomousMode,
    /// Steer-away issued by the safety monitor at the danger threshold.
    SafetyAvoid,
    /// Too-close backoff and cliff backoff.
    Emergency,
}

/// A self-driving behaviour. At most one is active at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriveMode {
    LineTrack,
    ObstacleAvoid,
}

impl std::fmt::Display for DriveMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriveMode::LineTrack => write!(f, "line tracking"),
            DriveMode::ObstacleAvoid => write!(f, "obstacle avoidance"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command events
// ─────────────────────────────────────────────────────────────────────────────

/// Where a [`Command`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandSource {
    Voice,
    Keyboard,
}

/// A normalized key press. Raw scancode or escape-sequence decoding happens
/// in the front-end that produces these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyEvent {
    Up,
    Down,
    Left,
    Right,
    Space,
    Escape,
    Char(char),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandPayload {
    Text(String),
    Key(KeyEvent),
}

/// One transient input event, produced by an input source and consumed by
/// the command dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub id: Uuid,
    pub source: CommandSource,
    pub payload: CommandPayload,
    pub timestamp: DateTime<Utc>,
}

impl Command {
    /// A recognised utterance from the voice loop.
    pub fn voice(text: impl Into<String>) -> Self {
        Self::new(CommandSource::Voice, CommandPayload::Text(text.into()))
    }

    /// A key press from the keyboard loop.
    pub fn key(key: KeyEvent) -> Self {
        Self::new(CommandSource::Keyboard, CommandPayload::Key(key))
    }

    fn new(source: CommandSource, payload: CommandPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            payload,
            timestamp: Utc::now(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Actuator steps
// ─────────────────────────────────────────────────────────────────────────────

/// A single instantaneous call on the actuator surface. Angles are degrees,
/// negative steering is left; speeds are 0–100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActuatorOp {
    Steer(i32),
    Pan(i32),
    Tilt(i32),
    Forward(u8),
    Backward(u8),
    Stop,
}

/// Camera sweep that bounces the pan angle between `-bound` and `+bound`
/// every `tick` until `duration` has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sweep {
    pub step: i32,
    pub bound: i32,
    pub tick: Duration,
    pub duration: Duration,
}

/// One element of an [`ActionSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    Op(ActuatorOp),
    Hold(Duration),
    Sweep(Sweep),
}

/// An ordered, branch-free actuator script.
///
/// Built with the chainable helpers:
///
/// ```
/// use okbot_types::{ActionSpec, ActuatorOp, Step};
///
/// let spec = ActionSpec::new("nudge").steer(0).forward(30).hold_ms(500).stop();
/// assert_eq!(spec.steps.len(), 4);
/// assert_eq!(spec.steps[1], Step::Op(ActuatorOp::Forward(30)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub name: String,
    pub steps: Vec<Step>,
}

impl ActionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Stop the motors, then centre steering and camera.
    pub fn neutral() -> Self {
        Self::new("neutral").stop().steer(0).pan(0).tilt(0)
    }

    pub fn op(mut self, op: ActuatorOp) -> Self {
        self.steps.push(Step::Op(op));
        self
    }

    pub fn steer(self, degrees: i32) -> Self {
        self.op(ActuatorOp::Steer(degrees))
    }

    pub fn pan(self, degrees: i32) -> Self {
        self.op(ActuatorOp::Pan(degrees))
    }

    pub fn tilt(self, degrees: i32) -> Self {
        self.op(ActuatorOp::Tilt(degrees))
    }

    pub fn forward(self, speed: u8) -> Self {
        self.op(ActuatorOp::Forward(speed))
    }

    pub fn backward(self, speed: u8) -> Self {
        self.op(ActuatorOp::Backward(speed))
    }

    pub fn stop(self) -> Self {
        self.op(ActuatorOp::Stop)
    }

    pub fn hold(mut self, duration: Duration) -> Self {
        self.steps.push(Step::Hold(duration));
        self
    }

    pub fn hold_ms(self, millis: u64) -> Self {
        self.hold(Duration::from_millis(millis))
    }

    pub fn sweep(mut self, sweep: Sweep) -> Self {
        self.steps.push(Step::Sweep(sweep));
        self
    }

    /// Append every step of `other`, keeping this spec's name.
    pub fn then(mut self, other: ActionSpec) -> Self {
        self.steps.extend(other.steps);
        self
    }

    /// Instantaneous operations in order, ignoring holds and sweeps.
    pub fn ops(&self) -> impl Iterator<Item = ActuatorOp> + '_ {
        self.steps.iter().filter_map(|s| match s {
            Step::Op(op) => Some(*op),
            _ => None,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sensor readings
// ─────────────────────────────────────────────────────────────────────────────

/// Raw values of the three downward-facing grayscale sensors (left, centre,
/// right).
pub type GrayscaleTriple = [u16; 3];

/// Per-sensor line detection for (left, centre, right).
pub type LineStatus = [bool; 3];

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Global error type spanning actuator faults, sensor faults, collaborator
/// failures, and configuration problems.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RobotError {
    #[error("Actuator fault on {op}: {details}")]
    ActuatorFault { op: String, details: String },

    #[error("Sensor read failed on {sensor}: {details}")]
    SensorRead { sensor: String, details: String },

    #[error("Speech error: {0}")]
    Speech(String),

    #[error("Chat provider error: {0}")]
    Chat(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Robot is shutting down")]
    ShuttingDown,
}

impl RobotError {
    pub fn actuator(op: ActuatorOp, details: impl Into<String>) -> Self {
        RobotError::ActuatorFault {
            op: format!("{op:?}"),
            details: details.into(),
        }
    }

    pub fn sensor(sensor: &str, details: impl Into<String>) -> Self {
        RobotError::SensorRead {
            sensor: sensor.to_string(),
            details: details.into(),
        }
    }
}
