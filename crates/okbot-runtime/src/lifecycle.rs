//! [`StateMachine`] – the Asleep/Awake lifecycle and its side effects.
//!
//! ```text
//!            wake word                      timeout / sleep command
//!   Asleep ─────────────▶ Awake ──────────────────────────────────▶ Asleep
//!      │                    │
//!      └──── shutdown ──────┴──▶ terminal (running = false)
//! ```
//!
//! The flag flips themselves are compare-and-transition calls on
//! [`RobotState`][okbot_kernel::RobotState], so concurrent callers (the voice
//! loop's timeout check and a keyboard sleep command, say) cannot both win.
//! Only the winner performs the side effects.

use std::sync::Arc;
use std::time::Duration;

use okbot_hal::Action;
use okbot_types::Priority;
use tracing::info;

use crate::autonomy::AutonomousModeRunner;
use crate::robot::Robot;

/// How long shutdown waits for an in-flight actuator sequence to yield.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepReason {
    Timeout,
    Command,
}

pub struct StateMachine {
    robot: Arc<Robot>,
    modes: Arc<AutonomousModeRunner>,
}

impl StateMachine {
    pub fn new(robot: Arc<Robot>, modes: Arc<AutonomousModeRunner>) -> Self {
        Self { robot, modes }
    }

    pub fn robot(&self) -> &Arc<Robot> {
        &self.robot
    }

    pub fn modes(&self) -> &Arc<AutonomousModeRunner> {
        &self.modes
    }

    /// Asleep → Awake: greet and nod. Returns `false` if already awake.
    pub async fn wake(&self) -> bool {
        if !self.robot.state.wake() {
            return false;
        }
        info!("wake word detected");
        let greeting = format!(
            "Hi there! I'm {}. What would you like me to do?",
            self.robot.config.robot_name
        );
        self.robot.say(&greeting).await;

        let robot = self.robot.clone();
        tokio::spawn(async move {
            let nod = robot.library.script(Action::Nod);
            robot.submit_logged(Priority::Manual, &nod).await;
        });
        true
    }

    /// Awake → Asleep on an explicit command. Returns `false` if already
    /// asleep.
    pub async fn sleep(&self, reason: SleepReason) -> bool {
        if !self.robot.state.fall_asleep() {
            return false;
        }
        self.after_sleep(reason).await;
        true
    }

    /// Fall asleep if no command has been accepted for longer than the
    /// configured timeout. Never fires when the wake phase is disabled.
    pub async fn check_timeout(&self) -> bool {
        if !self.robot.config.wake_enabled {
            return false;
        }
        if !self.robot.state.sleep_if_idle(self.robot.config.command_timeout()) {
            return false;
        }
        self.after_sleep(SleepReason::Timeout).await;
        true
    }

    async fn after_sleep(&self, reason: SleepReason) {
        info!(?reason, "going to sleep");
        self.modes.cancel().await;
        self.robot.neutralize().await;
        let hint = self.robot.wake_hint();
        let message = match reason {
            SleepReason::Timeout => format!(
                "I haven't heard anything for a while. Going to sleep. Say '{hint}' to wake me again."
            ),
            SleepReason::Command => format!("Going to sleep. Say '{hint}' to wake me again."),
        };
        self.robot.say(&message).await;
    }

    /// Clear `running`, wait for the mode loop, and leave the car neutral.
    /// Idempotent.
    pub async fn shutdown(&self) {
        if self.robot.state.running() {
            info!("shutdown signal received");
        }
        self.robot.state.shutdown();
        self.modes.cancel().await;
        self.robot.arbiter.shutdown(SHUTDOWN_GRACE).await;
    }
}

#[cfg(test)]
mod tests {
    use okbot_types::{ActionSpec, DriveMode, RobotConfig};
    use tokio::time::Instant;

    use super::*;
    use crate::safety::SafetyMonitor;
    use crate::testing::{Rig, rig_with};

    fn machine(config: RobotConfig) -> (Rig, StateMachine) {
        let rig = rig_with(config);
        let modes = Arc::new(AutonomousModeRunner::new(rig.robot.clone()));
        let sm = StateMachine::new(rig.robot.clone(), modes);
        (rig, sm)
    }

    fn short_timeout() -> RobotConfig {
        RobotConfig {
            command_timeout_secs: 2,
            ..RobotConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn wake_greets_and_nods() {
        let (rig, sm) = machine(RobotConfig::default());
        assert!(sm.wake().await);
        assert!(!sm.wake().await);
        assert_eq!(
            rig.spoken(),
            vec!["Hi there! I'm Robot. What would you like me to do?"]
        );
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rig.car.ops().contains(&okbot_types::ActuatorOp::Tilt(20)));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_sleeps_exactly_once_and_clears_mode() {
        let (rig, sm) = machine(short_timeout());
        sm.wake().await;
        sm.modes().enter(DriveMode::ObstacleAvoid).await;

        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert!(!sm.check_timeout().await);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(sm.check_timeout().await);
        assert!(!sm.check_timeout().await);

        assert!(!rig.robot.state.is_awake());
        assert_eq!(rig.robot.state.mode(), None);
        assert_eq!(sm.modes().live_loops(), 0);
        assert!(rig.car.pose().is_neutral());
        let spoken = rig.spoken();
        assert!(spoken.last().unwrap().starts_with("I haven't heard anything"));
    }

    #[tokio::test(start_paused = true)]
    async fn commands_defer_the_timeout() {
        let (rig, sm) = machine(short_timeout());
        sm.wake().await;
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            rig.robot.state.touch();
            assert!(!sm.check_timeout().await);
        }
        assert!(rig.robot.state.is_awake());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_never_fires_with_wake_disabled() {
        let (rig, sm) = machine(RobotConfig {
            wake_enabled: false,
            command_timeout_secs: 1,
            ..RobotConfig::default()
        });
        rig.robot.state.wake();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!sm.check_timeout().await);
        assert!(rig.robot.state.is_awake());
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_sleep_neutralizes_and_hints_wake_word() {
        let (rig, sm) = machine(RobotConfig::default());
        sm.wake().await;
        assert!(sm.sleep(SleepReason::Command).await);
        assert!(!sm.sleep(SleepReason::Command).await);
        assert_eq!(
            rig.spoken().last().unwrap(),
            "Going to sleep. Say 'okay robot' to wake me again."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_during_steer_away_still_leaves_car_neutral() {
        let (rig, sm) = machine(RobotConfig::default());
        sm.wake().await;
        sm.modes().enter(DriveMode::ObstacleAvoid).await;
        rig.car.set_distance(15.0);
        let monitor = SafetyMonitor::new(rig.robot.clone());
        let check = tokio::spawn(async move { monitor.check_once().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(rig.robot.arbiter.executing(), Some(Priority::SafetyAvoid));

        assert!(sm.sleep(SleepReason::Command).await);
        check.await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(!rig.robot.state.is_awake());
        assert_eq!(rig.robot.state.mode(), None);
        assert!(rig.car.pose().is_neutral());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_bounds_loops_and_leaves_car_neutral() {
        let (rig, sm) = machine(RobotConfig::default());
        sm.wake().await;
        sm.modes().enter(DriveMode::ObstacleAvoid).await;
        let robot = rig.robot.clone();
        let manual = tokio::spawn(async move {
            let spec = ActionSpec::new("long").pan(40).forward(30).hold_ms(10_000);
            robot.arbiter.submit(Priority::Manual, &spec).await
        });
        tokio::time::sleep(Duration::from_millis(120)).await;

        let started = Instant::now();
        sm.shutdown().await;
        assert!(started.elapsed() < Duration::from_millis(100));
        assert!(!rig.robot.state.running());
        assert_eq!(sm.modes().live_loops(), 0);
        assert!(rig.car.pose().is_neutral());
        manual.await.unwrap().unwrap();

        sm.shutdown().await;
    }
}
