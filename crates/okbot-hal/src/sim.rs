//! In-process car simulator for tests and headless runs.
//!
//! [`SimCar`] is a cheap, cloneable handle onto shared simulated hardware.
//! One clone is boxed as the arbiter's [`Actuator`], another serves as the
//! [`Sensors`] for the background loops, and a third stays with the test so
//! it can script readings and assert on every applied operation.
//!
//! # Example
//!
//! ```rust
//! use okbot_hal::{Actuator, Sensors, SimCar};
//! use okbot_types::ActuatorOp;
//!
//! let car = SimCar::new();
//! let mut driver = car.clone();
//! driver.apply(ActuatorOp::Forward(30)).unwrap();
//!
//! car.set_distance(12.5);
//! assert_eq!(car.read_distance().unwrap(), 12.5);
//! assert_eq!(car.ops(), vec![ActuatorOp::Forward(30)]);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use okbot_types::{ActuatorOp, GrayscaleTriple, LineStatus, RobotConfig, RobotError};
use tracing::trace;

use crate::actuator::Actuator;
use crate::sensors::{GrayscaleReference, Sensors};

/// Applied operations kept for inspection; older ones are dropped first.
pub const OP_LOG_CAPACITY: usize = 1024;

/// Drive motor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Motor {
    #[default]
    Stopped,
    Forward(u8),
    Backward(u8),
}

/// Current set-points of the simulated car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimPose {
    pub steering: i32,
    pub pan: i32,
    pub tilt: i32,
    pub motor: Motor,
}

impl SimPose {
    /// Steering and camera centred, motors stopped.
    pub fn is_neutral(&self) -> bool {
        *self == SimPose::default()
    }
}

struct SimInner {
    pose: SimPose,
    log: VecDeque<ActuatorOp>,
    distance: f32,
    grayscale: GrayscaleTriple,
    reference: GrayscaleReference,
    distance_fault: bool,
    grayscale_fault: bool,
    actuator_fault: bool,
}

impl Default for SimInner {
    fn default() -> Self {
        Self {
            pose: SimPose::default(),
            log: VecDeque::with_capacity(OP_LOG_CAPACITY),
            distance: 100.0,
            grayscale: [1500, 1500, 1500],
            reference: GrayscaleReference::default(),
            distance_fault: false,
            grayscale_fault: false,
            actuator_fault: false,
        }
    }
}

/// Simulated PiCar-style robot: open floor, nothing ahead, no line.
#[derive(Clone, Default)]
pub struct SimCar {
    inner: Arc<Mutex<SimInner>>,
}

impl SimCar {
    pub fn new() -> Self {
        Self::default()
    }

    /// A car whose grayscale module uses the configured cliff reference.
    pub fn from_config(config: &RobotConfig) -> Self {
        let car = Self::new();
        car.set_reference(GrayscaleReference::from_config(config));
        car
    }

    fn lock(&self) -> MutexGuard<'_, SimInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Scripting ────────────────────────────────────────────────────────────

    pub fn set_distance(&self, cm: f32) {
        self.lock().distance = cm;
    }

    pub fn set_grayscale(&self, values: GrayscaleTriple) {
        self.lock().grayscale = values;
    }

    pub fn set_reference(&self, reference: GrayscaleReference) {
        self.lock().reference = reference;
    }

    /// Make subsequent distance reads fail until cleared.
    pub fn fail_distance(&self, fail: bool) {
        self.lock().distance_fault = fail;
    }

    pub fn fail_grayscale(&self, fail: bool) {
        self.lock().grayscale_fault = fail;
    }

    /// Make subsequent actuator calls fail until cleared.
    pub fn fail_actuator(&self, fail: bool) {
        self.lock().actuator_fault = fail;
    }

    // ── Inspection ───────────────────────────────────────────────────────────

    pub fn pose(&self) -> SimPose {
        self.lock().pose
    }

    /// The last [`OP_LOG_CAPACITY`] successfully applied operations, in order.
    pub fn ops(&self) -> Vec<ActuatorOp> {
        self.lock().log.iter().copied().collect()
    }

    pub fn clear_ops(&self) {
        self.lock().log.clear();
    }

    fn record(&mut self, op: ActuatorOp) -> Result<(), RobotError> {
        let mut inner = self.lock();
        if inner.actuator_fault {
            return Err(RobotError::actuator(op, "simulated driver fault"));
        }
        match op {
            ActuatorOp::Steer(d) => inner.pose.steering = d,
            ActuatorOp::Pan(d) => inner.pose.pan = d,
            ActuatorOp::Tilt(d) => inner.pose.tilt = d,
            ActuatorOp::Forward(s) => inner.pose.motor = Motor::Forward(s),
            ActuatorOp::Backward(s) => inner.pose.motor = Motor::Backward(s),
            ActuatorOp::Stop => inner.pose.motor = Motor::Stopped,
        }
        if inner.log.len() == OP_LOG_CAPACITY {
            inner.log.pop_front();
        }
        inner.log.push_back(op);
        trace!(?op, "sim actuator");
        Ok(())
    }
}

impl Actuator for SimCar {
    fn set_steering_angle(&mut self, degrees: i32) -> Result<(), RobotError> {
        self.record(ActuatorOp::Steer(degrees))
    }

    fn set_camera_pan(&mut self, degrees: i32) -> Result<(), RobotError> {
        self.record(ActuatorOp::Pan(degrees))
    }

    fn set_camera_tilt(&mut self, degrees: i32) -> Result<(), RobotError> {
        self.record(ActuatorOp::Tilt(degrees))
    }

    fn drive_forward(&mut self, speed: u8) -> Result<(), RobotError> {
        self.record(ActuatorOp::Forward(speed))
    }

    fn drive_backward(&mut self, speed: u8) -> Result<(), RobotError> {
        self.record(ActuatorOp::Backward(speed))
    }

    fn stop(&mut self) -> Result<(), RobotError> {
        self.record(ActuatorOp::Stop)
    }
}

impl Sensors for SimCar {
    fn read_distance(&self) -> Result<f32, RobotError> {
        let inner = self.lock();
        if inner.distance_fault {
            return Err(RobotError::sensor("ultrasonic", "simulated read fault"));
        }
        Ok(inner.distance)
    }

    fn read_grayscale(&self) -> Result<GrayscaleTriple, RobotError> {
        let inner = self.lock();
        if inner.grayscale_fault {
            return Err(RobotError::sensor("grayscale", "simulated read fault"));
        }
        Ok(inner.grayscale)
    }

    fn is_cliff(&self, values: &GrayscaleTriple) -> bool {
        self.lock().reference.is_cliff(values)
    }

    fn line_status(&self, values: &GrayscaleTriple) -> LineStatus {
        self.lock().reference.line_status(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_car_is_neutral_on_open_floor() {
        let car = SimCar::new();
        assert!(car.pose().is_neutral());
        let g = car.read_grayscale().unwrap();
        assert!(!car.is_cliff(&g));
        assert_eq!(car.line_status(&g), [false, false, false]);
        assert!(car.read_distance().unwrap() > 40.0);
    }

    #[test]
    fn clones_share_hardware() {
        let car = SimCar::new();
        let mut driver = car.clone();
        driver.apply(ActuatorOp::Steer(-25)).unwrap();
        driver.apply(ActuatorOp::Backward(30)).unwrap();
        let pose = car.pose();
        assert_eq!(pose.steering, -25);
        assert_eq!(pose.motor, Motor::Backward(30));
        assert!(!pose.is_neutral());
    }

    #[test]
    fn actuator_fault_is_reported_and_not_recorded() {
        let car = SimCar::new();
        let mut driver = car.clone();
        car.fail_actuator(true);
        assert!(driver.apply(ActuatorOp::Stop).is_err());
        assert!(car.ops().is_empty());
        car.fail_actuator(false);
        driver.apply(ActuatorOp::Stop).unwrap();
        assert_eq!(car.ops(), vec![ActuatorOp::Stop]);
    }

    #[test]
    fn op_log_keeps_only_the_newest_ops() {
        let car = SimCar::new();
        let mut driver = car.clone();
        for i in 0..OP_LOG_CAPACITY + 10 {
            driver.apply(ActuatorOp::Steer(i as i32)).unwrap();
        }
        let ops = car.ops();
        assert_eq!(ops.len(), OP_LOG_CAPACITY);
        assert_eq!(ops[0], ActuatorOp::Steer(10));
        assert_eq!(
            ops.last(),
            Some(&ActuatorOp::Steer((OP_LOG_CAPACITY + 9) as i32))
        );
    }

    #[test]
    fn configured_cliff_reference_changes_classification() {
        let config = RobotConfig {
            cliff_reference: [600, 600, 600],
            ..RobotConfig::default()
        };
        let dim = [500, 1500, 1500];
        assert!(!SimCar::new().is_cliff(&dim));
        assert!(SimCar::from_config(&config).is_cliff(&dim));
    }

    #[test]
    fn sensor_faults_are_independent() {
        let car = SimCar::new();
        car.fail_distance(true);
        assert!(car.read_distance().is_err());
        assert!(car.read_grayscale().is_ok());
        car.fail_grayscale(true);
        assert!(car.read_grayscale().is_err());
    }
}
