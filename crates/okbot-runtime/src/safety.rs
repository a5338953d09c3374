//! [`SafetyMonitor`] – the always-on proximity and cliff guard.
//!
//! Runs every [`SAFETY_TICK`] for as long as the robot is running and talks
//! to the arbiter directly, above every other caller:
//!
//! | Condition | Priority | Sequence |
//! |---|---|---|
//! | distance < too-close | `Emergency` | centre, reverse 0.5 s, stop |
//! | distance < danger, obstacle-avoid mode | `SafetyAvoid` | steer 30°, forward 0.3 s, stop |
//! | cliff under the car | `Emergency` | stop, centre, reverse 0.6 s, stop |
//!
//! A failed sensor read skips that check for one tick. An actuator fault is
//! logged and the monitor keeps going.

use std::sync::Arc;
use std::time::Duration;

use okbot_types::{ActionSpec, DriveMode, Priority};
use tracing::{debug, info, warn};

use crate::robot::Robot;

pub const SAFETY_TICK: Duration = Duration::from_millis(100);

/// What one tick of the proximity check decided.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Proximity {
    /// Reading failed or was invalid.
    Unknown,
    Clear,
    Avoiding(f32),
    TooClose(f32),
}

/// Both checks of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyReport {
    pub proximity: Proximity,
    pub cliff: bool,
}

pub struct SafetyMonitor {
    robot: Arc<Robot>,
}

impl SafetyMonitor {
    pub fn new(robot: Arc<Robot>) -> Self {
        Self { robot }
    }

    /// Backoff submitted when something is too close.
    pub fn too_close_backoff(speed: u8) -> ActionSpec {
        ActionSpec::new("too_close_backoff")
            .steer(0)
            .backward(speed)
            .hold_ms(500)
            .stop()
    }

    /// Steer-away submitted at the danger threshold in obstacle-avoid mode.
    pub fn steer_away(speed: u8) -> ActionSpec {
        ActionSpec::new("steer_away")
            .steer(30)
            .forward(speed)
            .hold_ms(300)
            .stop()
    }

    pub fn cliff_backoff(speed: u8) -> ActionSpec {
        ActionSpec::new("cliff_backoff")
            .stop()
            .steer(0)
            .backward(speed)
            .hold_ms(600)
            .stop()
    }

    /// Loop until `running` is cleared.
    pub async fn run(self) {
        info!("safety monitor started");
        while self.robot.state.running() {
            self.check_once().await;
            if !self.robot.state.tick(SAFETY_TICK).await {
                break;
            }
        }
        info!("safety monitor stopped");
    }

    /// Evaluate both checks once and submit whatever they call for.
    pub async fn check_once(&self) -> SafetyReport {
        let proximity = if self.robot.config.obstacle_avoidance_enabled {
            self.check_proximity().await
        } else {
            Proximity::Unknown
        };
        let cliff = self.robot.config.cliff_detection_enabled && self.check_cliff().await;
        SafetyReport { proximity, cliff }
    }

    async fn check_proximity(&self) -> Proximity {
        let cfg = &self.robot.config;
        let distance = match self.robot.sensors.read_distance() {
            Ok(d) if d > 0.0 => d,
            Ok(d) => {
                debug!(distance = d, "invalid ultrasonic reading");
                return Proximity::Unknown;
            }
            Err(e) => {
                debug!(error = %e, "ultrasonic read failed");
                return Proximity::Unknown;
            }
        };

        if distance < cfg.too_close_distance {
            self.robot.state.set_too_close(Some(distance));
            warn!(distance, "TOO CLOSE: emergency backward");
            self.robot
                .submit_logged(Priority::Emergency, &Self::too_close_backoff(cfg.move_speed))
                .await;
            Proximity::TooClose(distance)
        } else if distance < cfg.danger_distance
            && self.robot.state.mode() == Some(DriveMode::ObstacleAvoid)
        {
            debug!(distance, "danger threshold: steering away");
            self.robot
                .submit_logged(Priority::SafetyAvoid, &Self::steer_away(cfg.move_speed))
                .await;
            Proximity::Avoiding(distance)
        } else {
            self.robot.state.set_too_close(None);
            Proximity::Clear
        }
    }

    async fn check_cliff(&self) -> bool {
        let values = match self.robot.sensors.read_grayscale() {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "grayscale read failed");
                return false;
            }
        };
        if !self.robot.sensors.is_cliff(&values) {
            return false;
        }
        warn!(?values, "CLIFF detected: backing up");
        self.robot
            .submit_logged(
                Priority::Emergency,
                &Self::cliff_backoff(self.robot.config.move_speed),
            )
            .await;
        true
    }
}

#[cfg(test)]
mod tests {
    use okbot_types::ActuatorOp;
    use tokio::time::Instant;

    use super::*;
    use crate::testing::{rig, rig_with};

    #[tokio::test(start_paused = true)]
    async fn clear_path_submits_nothing() {
        let rig = rig();
        let report = SafetyMonitor::new(rig.robot.clone()).check_once().await;
        assert_eq!(report.proximity, Proximity::Clear);
        assert!(!report.cliff);
        assert!(rig.car.ops().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn too_close_backs_off_and_sets_flag() {
        let rig = rig();
        rig.car.set_distance(5.0);
        let report = SafetyMonitor::new(rig.robot.clone()).check_once().await;
        assert_eq!(report.proximity, Proximity::TooClose(5.0));
        assert_eq!(rig.robot.state.too_close(), Some(5.0));
        assert_eq!(
            rig.car.ops(),
            vec![ActuatorOp::Steer(0), ActuatorOp::Backward(30), ActuatorOp::Stop]
        );

        rig.car.set_distance(80.0);
        SafetyMonitor::new(rig.robot.clone()).check_once().await;
        assert_eq!(rig.robot.state.too_close(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn emergency_preempts_pending_manual_within_one_tick() {
        let rig = rig();
        let robot = rig.robot.clone();
        let manual = tokio::spawn(async move {
            let spec = ActionSpec::new("long drive").forward(30).hold_ms(3000).stop();
            robot.arbiter.submit(Priority::Manual, &spec).await
        });
        tokio::time::sleep(Duration::from_millis(5)).await;

        rig.car.set_distance(4.0);
        let started = Instant::now();
        let monitor = tokio::spawn(SafetyMonitor::new(rig.robot.clone()).run());

        tokio::time::sleep(SAFETY_TICK).await;
        assert!(started.elapsed() <= SAFETY_TICK);
        assert!(rig.car.ops().contains(&ActuatorOp::Backward(30)));
        assert_eq!(
            manual.await.unwrap().unwrap(),
            okbot_kernel::Outcome::Superseded
        );

        rig.robot.state.shutdown();
        monitor.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn danger_only_steers_away_in_obstacle_mode() {
        let rig = rig();
        rig.car.set_distance(15.0);
        let monitor = SafetyMonitor::new(rig.robot.clone());
        assert_eq!(monitor.check_once().await.proximity, Proximity::Clear);
        assert!(rig.car.ops().is_empty());

        rig.robot.state.set_mode(Some(DriveMode::ObstacleAvoid));
        assert_eq!(monitor.check_once().await.proximity, Proximity::Avoiding(15.0));
        assert_eq!(
            rig.car.ops(),
            vec![ActuatorOp::Steer(30), ActuatorOp::Forward(30), ActuatorOp::Stop]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cliff_triggers_regardless_of_mode() {
        let rig = rig();
        rig.car.set_grayscale([100, 1500, 1500]);
        let report = SafetyMonitor::new(rig.robot.clone()).check_once().await;
        assert!(report.cliff);
        assert_eq!(
            rig.car.ops(),
            vec![
                ActuatorOp::Stop,
                ActuatorOp::Steer(0),
                ActuatorOp::Backward(30),
                ActuatorOp::Stop
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sensor_failures_are_skipped_for_the_tick() {
        let rig = rig();
        rig.car.fail_distance(true);
        rig.car.fail_grayscale(true);
        let monitor = SafetyMonitor::new(rig.robot.clone());
        let report = monitor.check_once().await;
        assert_eq!(report.proximity, Proximity::Unknown);
        assert!(!report.cliff);

        rig.car.fail_distance(false);
        rig.car.set_distance(-1.0);
        assert_eq!(monitor.check_once().await.proximity, Proximity::Unknown);
        assert!(rig.car.ops().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_checks_are_skipped() {
        let rig = rig_with(okbot_types::RobotConfig {
            obstacle_avoidance_enabled: false,
            cliff_detection_enabled: false,
            ..Default::default()
        });
        rig.car.set_distance(2.0);
        rig.car.set_grayscale([0, 0, 0]);
        let report = SafetyMonitor::new(rig.robot.clone()).check_once().await;
        assert_eq!(report.proximity, Proximity::Unknown);
        assert!(!report.cliff);
        assert!(rig.car.ops().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn actuator_fault_does_not_stop_the_monitor() {
        let rig = rig();
        rig.car.set_distance(3.0);
        rig.car.fail_actuator(true);
        let monitor = tokio::spawn(SafetyMonitor::new(rig.robot.clone()).run());
        tokio::time::sleep(SAFETY_TICK * 3).await;
        assert!(!monitor.is_finished());

        rig.robot.state.shutdown();
        let started = Instant::now();
        monitor.await.unwrap();
        assert!(started.elapsed() <= SAFETY_TICK);
    }
}
