//! `okbot-kernel` – Shared State & Actuator Arbitration
//!
//! The synchronization core of okbot. It owns no loops; it enforces the rules
//! every loop must follow when touching shared flags or the actuators.
//!
//! # Modules
//!
//! - [`state`] – [`RobotState`][state::RobotState]: the single lifecycle
//!   container (awake, listening, active mode, last command time, too-close
//!   flag) plus the process-wide cancellation token behind `running`.
//! - [`arbiter`] – [`ActuatorArbiter`][arbiter::ActuatorArbiter]: serializes
//!   whole actuator sequences and resolves contention by
//!   [`Priority`][okbot_types::Priority]. Every actuator call in the system
//!   passes through it.

pub mod arbiter;
pub mod state;

pub use arbiter::{ActuatorArbiter, Outcome};
pub use state::{RobotState, StateSnapshot};
