//! `okbot-hal` – Hardware Abstraction Layer
//!
//! The rest of the system talks only to the traits defined here, so a real
//! car driver and the in-process simulator are interchangeable.
//!
//! # Modules
//!
//! - [`actuator`] – [`Actuator`][actuator::Actuator]: steering, camera
//!   pan/tilt, and drive motor calls.
//! - [`sensors`] – [`Sensors`][sensors::Sensors]: ultrasonic distance and the
//!   grayscale triple with its cliff and line classifiers.
//! - [`actions`] – [`ActionLibrary`][actions::ActionLibrary]: the named
//!   gesture and drive scripts plus their keyword table, and
//!   [`SweepState`][actions::SweepState] for the scanning sweep.
//! - [`sim`] – [`SimCar`][sim::SimCar]: a recording simulator implementing
//!   both traits for tests and the console front-end.

pub mod actions;
pub mod actuator;
pub mod sensors;
pub mod sim;

pub use actions::{Action, ActionLibrary, MotionProfile, SweepState};
pub use actuator::Actuator;
pub use sensors::{GrayscaleReference, Sensors};
pub use sim::{Motor, OP_LOG_CAPACITY, SimCar, SimPose};
