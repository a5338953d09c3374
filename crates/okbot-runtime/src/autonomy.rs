//! [`AutonomousModeRunner`] – at most one self-driving loop at a time.
//!
//! | Mode | Tick | Reads | Priority |
//! |---|---|---|---|
//! | [`DriveMode::LineTrack`] | [`LINE_TRACK_TICK`] | grayscale triple | `AutonomousMode` |
//! | [`DriveMode::ObstacleAvoid`] | [`OBSTACLE_TICK`] | ultrasonic distance | `AutonomousMode` |
//!
//! Mode switches are synchronous: [`AutonomousModeRunner::enter`] publishes
//! the new mode, waits for the previous loop to notice and exit, and only
//! then spawns the new loop. Each loop re-checks `running` and its own mode
//! tag at the top of every iteration and centres the car on the way out.
//!
//! The per-tick decisions live in [`LineTracker`] and [`plan_avoidance`] so
//! they can be tested without a clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use okbot_types::{ActionSpec, DriveMode, LineStatus, Priority, RobotConfig};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::robot::Robot;

pub const LINE_TRACK_TICK: Duration = Duration::from_millis(10);
pub const OBSTACLE_TICK: Duration = Duration::from_millis(50);

/// Back-off after an invalid distance reading or a failed sensor read.
const SENSOR_RETRY: Duration = Duration::from_millis(100);

/// Steering used when reversing to find a lost line.
const RECOVERY_STEER: i32 = 30;
const RECOVERY_SPEED: u8 = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Line tracking
// ─────────────────────────────────────────────────────────────────────────────

/// Where the line is relative to the car.
///
/// `Right` means the car has drifted right of the line (only the left sensor
/// sees it), so the correction steers left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineReading {
    Forward,
    Left,
    Right,
    Lost,
}

impl LineReading {
    pub fn classify(status: LineStatus) -> Self {
        match status {
            [false, false, false] => LineReading::Lost,
            [_, true, _] => LineReading::Forward,
            [true, _, _] => LineReading::Right,
            [_, _, true] => LineReading::Left,
        }
    }
}

/// Turns grayscale classifications into drive commands, remembering the last
/// non-lost reading for recovery.
#[derive(Debug, Clone)]
pub struct LineTracker {
    speed: u8,
    offset: i32,
    last: Option<LineReading>,
}

impl LineTracker {
    pub fn new(speed: u8, offset: i32) -> Self {
        Self {
            speed,
            offset,
            last: None,
        }
    }

    pub fn from_config(config: &RobotConfig) -> Self {
        Self::new(config.line_track_speed, config.line_track_offset)
    }

    /// The drive command for this tick, or `None` if the line is lost and
    /// there is no history to recover from.
    pub fn step(&mut self, status: LineStatus) -> Option<ActionSpec> {
        let reading = LineReading::classify(status);
        if reading != LineReading::Lost {
            self.last = Some(reading);
        }
        let spec = ActionSpec::new("line_track");
        match reading {
            LineReading::Forward => Some(spec.steer(0).forward(self.speed)),
            LineReading::Left => Some(spec.steer(self.offset).forward(self.speed)),
            LineReading::Right => Some(spec.steer(-self.offset).forward(self.speed)),
            LineReading::Lost => match self.last {
                Some(LineReading::Right) => {
                    Some(spec.steer(-RECOVERY_STEER).backward(RECOVERY_SPEED))
                }
                Some(LineReading::Left) => {
                    Some(spec.steer(RECOVERY_STEER).backward(RECOVERY_SPEED))
                }
                _ => None,
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Obstacle avoidance
// ─────────────────────────────────────────────────────────────────────────────

/// The drive command for one obstacle-avoid tick, or `None` for an invalid
/// (negative) reading.
pub fn plan_avoidance(distance: f32, config: &RobotConfig) -> Option<ActionSpec> {
    if distance < 0.0 {
        return None;
    }
    let speed = config.move_speed;
    let spec = ActionSpec::new("obstacle_avoid");
    Some(if distance >= config.safe_distance {
        spec.steer(0).forward(speed)
    } else if distance >= config.danger_distance {
        spec.steer(30).forward(speed).hold_ms(100)
    } else {
        spec.steer(-30).backward(speed).hold_ms(500)
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Runner
// ─────────────────────────────────────────────────────────────────────────────

struct ActiveLoop {
    mode: DriveMode,
    handle: JoinHandle<()>,
}

/// Decrements the live-loop counter however the loop exits.
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct AutonomousModeRunner {
    robot: Arc<Robot>,
    active: Mutex<Option<ActiveLoop>>,
    live: Arc<AtomicUsize>,
}

impl AutonomousModeRunner {
    pub fn new(robot: Arc<Robot>) -> Self {
        Self {
            robot,
            active: Mutex::new(None),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of mode loops currently running. Never more than one once a
    /// mode switch has returned.
    pub fn live_loops(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Start `mode`, stopping any other mode first.
    ///
    /// Returns `false` without doing anything when `mode` is already running.
    pub async fn enter(&self, mode: DriveMode) -> bool {
        let mut active = self.active.lock().await;
        if let Some(current) = active.as_ref() {
            if current.mode == mode
                && !current.handle.is_finished()
                && self.robot.state.mode() == Some(mode)
            {
                debug!(%mode, "mode already active");
                return false;
            }
        }

        let previous = self.robot.state.set_mode(Some(mode));
        if let Some(old) = active.take() {
            debug!(from = %old.mode, to = %mode, ?previous, "switching mode");
            join(old).await;
        }

        let robot = self.robot.clone();
        let live = self.live.clone();
        let handle = tokio::spawn(async move {
            let _guard = LiveGuard::enter(&live);
            match mode {
                DriveMode::LineTrack => line_track_loop(robot).await,
                DriveMode::ObstacleAvoid => obstacle_avoid_loop(robot).await,
            }
        });
        *active = Some(ActiveLoop { mode, handle });
        true
    }

    /// Stop the active mode and wait for its loop to exit. Returns the mode
    /// that was running.
    pub async fn cancel(&self) -> Option<DriveMode> {
        let mut active = self.active.lock().await;
        let flagged = self.robot.state.set_mode(None);
        let old = active.take()?;
        let mode = old.mode;
        join(old).await;
        Some(flagged.unwrap_or(mode))
    }
}

async fn join(active: ActiveLoop) {
    if let Err(e) = active.handle.await {
        error!(mode = %active.mode, error = %e, "mode loop panicked");
    }
}

/// Whether a mode loop tagged `mode` should keep going.
fn still_active(robot: &Robot, mode: DriveMode) -> bool {
    robot.state.running() && robot.state.mode() == Some(mode)
}

/// Submit one tick's command. `false` means the loop must stop: an actuator
/// fault clears the mode, if it is still this loop's.
async fn drive(robot: &Robot, mode: DriveMode, spec: &ActionSpec) -> bool {
    match robot.arbiter.submit(Priority::AutonomousMode, spec).await {
        Ok(_) => true,
        Err(e) => {
            error!(%mode, error = %e, "actuator fault, leaving mode");
            robot.state.clear_mode_if(mode);
            false
        }
    }
}

async fn finish(robot: &Robot, mode: DriveMode) {
    robot.settle(&ActionSpec::new("mode_exit").stop().steer(0)).await;
    info!(%mode, "mode stopped");
}

async fn line_track_loop(robot: Arc<Robot>) {
    let mode = DriveMode::LineTrack;
    info!(%mode, "mode active");
    let mut tracker = LineTracker::from_config(&robot.config);
    while still_active(&robot, mode) {
        let period = match robot.sensors.read_grayscale() {
            Ok(values) => {
                let status = robot.sensors.line_status(&values);
                if let Some(spec) = tracker.step(status) {
                    if !drive(&robot, mode, &spec).await {
                        break;
                    }
                }
                LINE_TRACK_TICK
            }
            Err(e) => {
                debug!(error = %e, "grayscale read failed");
                SENSOR_RETRY
            }
        };
        if !robot.state.tick(period).await {
            break;
        }
    }
    finish(&robot, mode).await;
}

async fn obstacle_avoid_loop(robot: Arc<Robot>) {
    let mode = DriveMode::ObstacleAvoid;
    info!(%mode, "mode active");
    while still_active(&robot, mode) {
        let plan = match robot.sensors.read_distance() {
            Ok(d) => plan_avoidance(d, &robot.config),
            Err(e) => {
                debug!(error = %e, "ultrasonic read failed");
                None
            }
        };
        let period = match plan {
            Some(spec) => {
                if !drive(&robot, mode, &spec).await {
                    break;
                }
                OBSTACLE_TICK
            }
            None => SENSOR_RETRY,
        };
        if !robot.state.tick(period).await {
            break;
        }
    }
    finish(&robot, mode).await;
}
