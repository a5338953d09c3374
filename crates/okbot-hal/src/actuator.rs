//! Generic `Actuator` trait for the car's physical actuation surface.
//!
//! Drivers implement the per-channel calls; [`Actuator::apply`] routes an
//! [`ActuatorOp`] to the matching call. Nothing here is atomic across calls:
//! serializing whole sequences is the arbiter's job.

use okbot_types::{ActuatorOp, RobotError};

/// The steering servo, camera pan/tilt servos, and the drive motors.
///
/// # Errors
///
/// Every call returns [`RobotError::ActuatorFault`] when the command cannot
/// be applied (bus error, driver fault, out-of-range value).
pub trait Actuator: Send {
    fn set_steering_angle(&mut self, degrees: i32) -> Result<(), RobotError>;

    fn set_camera_pan(&mut self, degrees: i32) -> Result<(), RobotError>;

    fn set_camera_tilt(&mut self, degrees: i32) -> Result<(), RobotError>;

    fn drive_forward(&mut self, speed: u8) -> Result<(), RobotError>;

    fn drive_backward(&mut self, speed: u8) -> Result<(), RobotError>;

    fn stop(&mut self) -> Result<(), RobotError>;

    /// Dispatch one [`ActuatorOp`] to the corresponding driver call.
    fn apply(&mut self, op: ActuatorOp) -> Result<(), RobotError> {
        match op {
            ActuatorOp::Steer(d) => self.set_steering_angle(d),
            ActuatorOp::Pan(d) => self.set_camera_pan(d),
            ActuatorOp::Tilt(d) => self.set_camera_tilt(d),
            ActuatorOp::Forward(s) => self.drive_forward(s),
            ActuatorOp::Backward(s) => self.drive_backward(s),
            ActuatorOp::Stop => self.stop(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal in-process actuator used only for tests.
    #[derive(Default)]
    struct MockActuator {
        calls: Vec<String>,
    }

    impl Actuator for MockActuator {
        fn set_steering_angle(&mut self, degrees: i32) -> Result<(), RobotError> {
            self.calls.push(format!("steer {degrees}"));
            Ok(())
        }
        fn set_camera_pan(&mut self, degrees: i32) -> Result<(), RobotError> {
            self.calls.push(format!("pan {degrees}"));
            Ok(())
        }
        fn set_camera_tilt(&mut self, degrees: i32) -> Result<(), RobotError> {
            self.calls.push(format!("tilt {degrees}"));
            Ok(())
        }
        fn drive_forward(&mut self, speed: u8) -> Result<(), RobotError> {
            self.calls.push(format!("forward {speed}"));
            Ok(())
        }
        fn drive_backward(&mut self, speed: u8) -> Result<(), RobotError> {
            if speed > 100 {
                return Err(RobotError::actuator(ActuatorOp::Backward(speed), "out of range"));
            }
            self.calls.push(format!("backward {speed}"));
            Ok(())
        }
        fn stop(&mut self) -> Result<(), RobotError> {
            self.calls.push("stop".to_string());
            Ok(())
        }
    }

    #[test]
    fn apply_routes_each_op_to_its_channel() {
        let mut act = MockActuator::default();
        for op in [
            ActuatorOp::Steer(-25),
            ActuatorOp::Pan(30),
            ActuatorOp::Tilt(-10),
            ActuatorOp::Forward(40),
            ActuatorOp::Backward(20),
            ActuatorOp::Stop,
        ] {
            act.apply(op).unwrap();
        }
        assert_eq!(
            act.calls,
            vec!["steer -25", "pan 30", "tilt -10", "forward 40", "backward 20", "stop"]
        );
    }

    #[test]
    fn apply_propagates_driver_faults() {
        let mut act = MockActuator::default();
        let err = act.apply(ActuatorOp::Backward(200)).unwrap_err();
        assert!(matches!(err, RobotError::ActuatorFault { .. }));
        assert!(act.calls.is_empty());
    }
}
