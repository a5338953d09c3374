//! [`RobotState`] – the single shared lifecycle container.
//!
//! All flags live behind one mutex and are only reachable through narrow
//! accessors, including compare-and-transition helpers such as
//! [`RobotState::sleep_if_idle`] and [`RobotState::clear_mode_if`]. The lock
//! is never held across an `.await` or a hardware call.
//!
//! `running` is a [`CancellationToken`]: once cancelled it can never be
//! un-cancelled, and every loop can await it alongside its tick sleep.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use okbot_types::DriveMode;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

// ────────────────────────────────────────────────────────────────────────────
// Internal flags
// ────────────────────────────────────────────────────────────────────────────

struct Flags {
    awake: bool,
    listening: bool,
    mode: Option<DriveMode>,
    last_command: Instant,
    /// Distance that tripped the too-close threshold, while it is tripped.
    too_close: Option<f32>,
}

/// Point-in-time copy of the lifecycle flags, for status reporting and logs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateSnapshot {
    pub running: bool,
    pub awake: bool,
    pub listening: bool,
    pub mode: Option<DriveMode>,
    pub idle: Duration,
    pub too_close: Option<f32>,
}

// ────────────────────────────────────────────────────────────────────────────
// RobotState
// ────────────────────────────────────────────────────────────────────────────

/// Process-wide robot state, shared as `Arc<RobotState>`.
///
/// # Example
///
/// ```
/// use okbot_kernel::RobotState;
/// use okbot_types::DriveMode;
///
/// let state = RobotState::new();
/// assert!(state.running());
/// assert!(state.wake());
/// state.set_mode(Some(DriveMode::LineTrack));
/// assert!(state.fall_asleep());
/// assert_eq!(state.mode(), None);
/// ```
pub struct RobotState {
    flags: Mutex<Flags>,
    running: CancellationToken,
}

impl Default for RobotState {
    fn default() -> Self {
        Self::new()
    }
}

impl RobotState {
    /// Fresh state: running, asleep, no mode.
    pub fn new() -> Self {
        Self {
            flags: Mutex::new(Flags {
                awake: false,
                listening: false,
                mode: None,
                last_command: Instant::now(),
                too_close: None,
            }),
            running: CancellationToken::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Flags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Liveness ─────────────────────────────────────────────────────────────

    pub fn running(&self) -> bool {
        !self.running.is_cancelled()
    }

    /// Clear `running`. Idempotent and irreversible.
    pub fn shutdown(&self) {
        if !self.running.is_cancelled() {
            debug!("running cleared");
        }
        self.running.cancel();
    }

    /// A clone of the token behind `running`, for `select!`-style waits.
    pub fn cancellation(&self) -> CancellationToken {
        self.running.clone()
    }

    /// Sleep for one tick. Returns `false` if `running` was cleared first.
    pub async fn tick(&self, period: Duration) -> bool {
        tokio::select! {
            _ = self.running.cancelled() => false,
            _ = tokio::time::sleep(period) => self.running(),
        }
    }

    // ── Wake / sleep ─────────────────────────────────────────────────────────

    pub fn is_awake(&self) -> bool {
        self.lock().awake
    }

    /// Asleep → Awake. Refreshes the last-command time. Returns `false` when
    /// already awake.
    pub fn wake(&self) -> bool {
        let mut f = self.lock();
        if f.awake {
            return false;
        }
        f.awake = true;
        f.last_command = Instant::now();
        true
    }

    /// Awake → Asleep, clearing the active mode and the listening flag.
    /// Returns `false` when already asleep.
    pub fn fall_asleep(&self) -> bool {
        let mut f = self.lock();
        if !f.awake {
            return false;
        }
        f.awake = false;
        f.listening = false;
        f.mode = None;
        true
    }

    /// Atomically fall asleep if awake and idle for longer than `timeout`.
    ///
    /// Only one caller can observe `true` for a given idle period.
    pub fn sleep_if_idle(&self, timeout: Duration) -> bool {
        let mut f = self.lock();
        if !f.awake || f.last_command.elapsed() <= timeout {
            return false;
        }
        f.awake = false;
        f.listening = false;
        f.mode = None;
        true
    }

    /// Record an accepted command.
    pub fn touch(&self) {
        self.lock().last_command = Instant::now();
    }

    /// Time since the last accepted command.
    pub fn idle(&self) -> Duration {
        self.lock().last_command.elapsed()
    }

    // ── Listening ────────────────────────────────────────────────────────────

    pub fn is_listening(&self) -> bool {
        self.lock().listening
    }

    pub fn set_listening(&self, listening: bool) {
        self.lock().listening = listening;
    }

    // ── Driving mode ─────────────────────────────────────────────────────────

    pub fn mode(&self) -> Option<DriveMode> {
        self.lock().mode
    }

    /// Replace the active mode, returning the previous one.
    pub fn set_mode(&self, mode: Option<DriveMode>) -> Option<DriveMode> {
        std::mem::replace(&mut self.lock().mode, mode)
    }

    /// Clear the active mode only if it is still `mode`.
    pub fn clear_mode_if(&self, mode: DriveMode) -> bool {
        let mut f = self.lock();
        if f.mode == Some(mode) {
            f.mode = None;
            true
        } else {
            false
        }
    }

    // ── Too-close advisory ───────────────────────────────────────────────────

    /// The distance that tripped the too-close threshold, if still tripped.
    pub fn too_close(&self) -> Option<f32> {
        self.lock().too_close
    }

    pub fn set_too_close(&self, distance: Option<f32>) {
        self.lock().too_close = distance;
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let f = self.lock();
        StateSnapshot {
            running: self.running(),
            awake: f.awake,
            listening: f.listening,
            mode: f.mode,
            idle: f.last_command.elapsed(),
            too_close: f.too_close,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_running_and_asleep() {
        let s = RobotState::new();
        let snap = s.snapshot();
        assert!(snap.running);
        assert!(!snap.awake);
        assert_eq!(snap.mode, None);
        assert_eq!(snap.too_close, None);
    }

    #[test]
    fn shutdown_is_monotonic() {
        let s = RobotState::new();
        s.shutdown();
        s.shutdown();
        assert!(!s.running());
        assert!(s.cancellation().is_cancelled());
    }

    #[test]
    fn wake_and_sleep_report_transitions_once() {
        let s = RobotState::new();
        assert!(s.wake());
        assert!(!s.wake());
        s.set_listening(true);
        s.set_mode(Some(DriveMode::ObstacleAvoid));
        assert!(s.fall_asleep());
        assert!(!s.fall_asleep());
        assert!(!s.is_listening());
        assert_eq!(s.mode(), None);
    }

    #[test]
    fn clear_mode_if_only_clears_matching_mode() {
        let s = RobotState::new();
        assert_eq!(s.set_mode(Some(DriveMode::LineTrack)), None);
        assert_eq!(
            s.set_mode(Some(DriveMode::ObstacleAvoid)),
            Some(DriveMode::LineTrack)
        );
        assert!(!s.clear_mode_if(DriveMode::LineTrack));
        assert_eq!(s.mode(), Some(DriveMode::ObstacleAvoid));
        assert!(s.clear_mode_if(DriveMode::ObstacleAvoid));
        assert_eq!(s.mode(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_if_idle_fires_after_timeout_exactly_once() {
        let s = RobotState::new();
        s.wake();
        s.set_mode(Some(DriveMode::LineTrack));
        let timeout = Duration::from_secs(5);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(!s.sleep_if_idle(timeout), "equal to timeout is not expired");

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(s.sleep_if_idle(timeout));
        assert!(!s.sleep_if_idle(timeout));
        assert!(!s.is_awake());
        assert_eq!(s.mode(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn touch_defers_timeout() {
        let s = RobotState::new();
        s.wake();
        let timeout = Duration::from_secs(2);
        tokio::time::advance(Duration::from_millis(1500)).await;
        s.touch();
        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!(!s.sleep_if_idle(timeout));
        assert!(s.idle() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn tick_returns_false_once_shut_down() {
        let s = std::sync::Arc::new(RobotState::new());
        assert!(s.tick(Duration::from_millis(10)).await);

        let s2 = s.clone();
        let handle = tokio::spawn(async move { s2.tick(Duration::from_secs(60)).await });
        tokio::task::yield_now().await;
        s.shutdown();
        assert!(!handle.await.unwrap());
    }
}
