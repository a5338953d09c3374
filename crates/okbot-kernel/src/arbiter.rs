//! [`ActuatorArbiter`] – the only path from software to the actuators.
//!
//! Every caller hands over a whole [`ActionSpec`]; the arbiter runs at most
//! one spec at a time so two callers' steer/drive calls can never interleave.
//! Contention is resolved by [`Priority`]:
//!
//! 1. A submission is **superseded** on arrival if a higher-priority spec is
//!    executing or already waiting.
//! 2. A submission evicts every waiting submission of lower priority; those
//!    callers get [`Outcome::Superseded`].
//! 3. Equal priorities are served in arrival order.
//! 4. A running spec checks for a strictly higher-priority waiter at every
//!    step boundary and inside every hold. If one is present it stops and
//!    reports [`Outcome::Superseded`]. A single actuator call is never cut
//!    short.
//!
//! Consequently every waiter in the queue shares one priority.
//!
//! # Example
//!
//! ```
//! use okbot_hal::SimCar;
//! use okbot_kernel::{ActuatorArbiter, Outcome};
//! use okbot_types::{ActionSpec, Priority};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
//! let car = SimCar::new();
//! let arbiter = ActuatorArbiter::new(Box::new(car.clone()));
//!
//! let spec = ActionSpec::new("nudge").steer(0).forward(30).hold_ms(5).stop();
//! assert_eq!(arbiter.submit(Priority::Manual, &spec).await.unwrap(), Outcome::Applied);
//! assert_eq!(car.ops().len(), 3);
//! # });
//! ```

use std::collections::VecDeque;
use std::pin::pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use okbot_hal::{Actuator, SweepState};
use okbot_types::{ActionSpec, ActuatorOp, Priority, RobotError, Step, Sweep};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, error, warn};

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Result of a successful [`ActuatorArbiter::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every step of the spec was applied.
    Applied,
    /// Rejected, evicted, or preempted by a higher-priority submission, or
    /// the arbiter was shut down.
    Superseded,
}

// ────────────────────────────────────────────────────────────────────────────
// Internal lane
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Ticket {
    id: u64,
    priority: Priority,
}

#[derive(Default)]
struct Lane {
    executing: Option<Priority>,
    waiting: VecDeque<Ticket>,
    next_ticket: u64,
    closed: bool,
}

impl Lane {
    fn should_yield(&self, priority: Priority) -> bool {
        self.closed || self.waiting.iter().any(|t| t.priority > priority)
    }

    fn is_waiting(&self, id: u64) -> bool {
        self.waiting.iter().any(|t| t.id == id)
    }
}

enum Held {
    Waiting(u64),
    Executing,
}

/// Releases the caller's place in the lane however `submit` exits.
struct Admission<'a> {
    arbiter: &'a ActuatorArbiter,
    held: Held,
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        let mut lane = self.arbiter.lane();
        match self.held {
            Held::Waiting(id) => lane.waiting.retain(|t| t.id != id),
            Held::Executing => lane.executing = None,
        }
        drop(lane);
        self.arbiter.changed.notify_waiters();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ActuatorArbiter
// ────────────────────────────────────────────────────────────────────────────

/// Serializes and prioritizes actuator sequences. Shared as
/// `Arc<ActuatorArbiter>`.
///
/// The lane bookkeeping and the actuator sit behind two separate locks, and
/// neither is held across an `.await`.
pub struct ActuatorArbiter {
    lane: Mutex<Lane>,
    actuator: Mutex<Box<dyn Actuator>>,
    changed: Notify,
}

impl ActuatorArbiter {
    pub fn new(actuator: Box<dyn Actuator>) -> Self {
        Self {
            lane: Mutex::new(Lane::default()),
            actuator: Mutex::new(actuator),
            changed: Notify::new(),
        }
    }

    fn lane(&self) -> MutexGuard<'_, Lane> {
        self.lane.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Priority of the spec currently executing, if any.
    pub fn executing(&self) -> Option<Priority> {
        self.lane().executing
    }

    pub fn is_closed(&self) -> bool {
        self.lane().closed
    }

    /// Run `spec` at `priority`, waiting behind equal-priority work.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::ActuatorFault`] from the first actuator call that
    /// fails; the remaining steps are skipped and the lane is released.
    pub async fn submit(&self, priority: Priority, spec: &ActionSpec) -> Result<Outcome, RobotError> {
        let id = {
            let mut lane = self.lane();
            let outranked = lane.executing.is_some_and(|p| p > priority)
                || lane.waiting.iter().any(|t| t.priority > priority);
            if lane.closed || outranked {
                debug!(action = %spec.name, ?priority, "submission superseded on arrival");
                return Ok(Outcome::Superseded);
            }
            let before = lane.waiting.len();
            lane.waiting.retain(|t| t.priority >= priority);
            if lane.waiting.len() < before {
                debug!(
                    action = %spec.name,
                    ?priority,
                    evicted = before - lane.waiting.len(),
                    "evicted lower-priority waiters"
                );
            }
            let id = lane.next_ticket;
            lane.next_ticket += 1;
            lane.waiting.push_back(Ticket { id, priority });
            id
        };
        self.changed.notify_waiters();

        let mut admission = Admission {
            arbiter: self,
            held: Held::Waiting(id),
        };

        // ── Wait for our turn ────────────────────────────────────────────────
        loop {
            let mut notified = pin!(self.changed.notified());
            notified.as_mut().enable();
            {
                let mut lane = self.lane();
                if lane.closed || !lane.is_waiting(id) {
                    debug!(action = %spec.name, ?priority, "superseded while waiting");
                    return Ok(Outcome::Superseded);
                }
                if lane.executing.is_none() && lane.waiting.front().is_some_and(|t| t.id == id) {
                    lane.waiting.pop_front();
                    lane.executing = Some(priority);
                    admission.held = Held::Executing;
                    break;
                }
            }
            notified.await;
        }

        // ── Execute ──────────────────────────────────────────────────────────
        for step in &spec.steps {
            if self.lane().should_yield(priority) {
                debug!(action = %spec.name, ?priority, "preempted");
                return Ok(Outcome::Superseded);
            }
            let completed = match step {
                Step::Op(op) => {
                    self.apply(*op)?;
                    true
                }
                Step::Hold(duration) => self.hold(*duration, priority).await,
                Step::Sweep(sweep) => self.sweep(sweep, priority).await?,
            };
            if !completed {
                debug!(action = %spec.name, ?priority, "preempted");
                return Ok(Outcome::Superseded);
            }
        }
        Ok(Outcome::Applied)
    }

    /// Like [`submit`](Self::submit), but never superseded by higher-priority
    /// work: waits until none is executing or waiting, then submits, and
    /// resubmits if preempted. Returns [`Outcome::Superseded`] only once the
    /// arbiter is closed.
    ///
    /// # Errors
    ///
    /// Same as [`submit`](Self::submit).
    pub async fn submit_when_clear(
        &self,
        priority: Priority,
        spec: &ActionSpec,
    ) -> Result<Outcome, RobotError> {
        loop {
            loop {
                let mut notified = pin!(self.changed.notified());
                notified.as_mut().enable();
                {
                    let lane = self.lane();
                    if lane.closed {
                        return Ok(Outcome::Superseded);
                    }
                    let outranked = lane.executing.is_some_and(|p| p > priority)
                        || lane.waiting.iter().any(|t| t.priority > priority);
                    if !outranked {
                        break;
                    }
                }
                debug!(action = %spec.name, ?priority, "waiting for the lane to clear");
                notified.await;
            }
            match self.submit(priority, spec).await? {
                Outcome::Applied => return Ok(Outcome::Applied),
                Outcome::Superseded if self.is_closed() => return Ok(Outcome::Superseded),
                Outcome::Superseded => continue,
            }
        }
    }

    /// Close the arbiter and leave the car neutral.
    ///
    /// Waiting submissions are superseded immediately; the executing one
    /// yields at its next step boundary. After at most `grace` the neutral
    /// ops are applied directly, each failure logged and skipped. Later
    /// submissions are superseded on arrival.
    pub async fn shutdown(&self, grace: Duration) {
        {
            let mut lane = self.lane();
            lane.closed = true;
            lane.waiting.clear();
        }
        self.changed.notify_waiters();

        let deadline = Instant::now() + grace;
        loop {
            let mut notified = pin!(self.changed.notified());
            notified.as_mut().enable();
            if self.lane().executing.is_none() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    warn!("actuator sequence still running after shutdown grace; neutralizing anyway");
                    break;
                }
                _ = notified => {}
            }
        }

        for op in ActionSpec::neutral().ops() {
            if let Err(e) = self.apply(op) {
                error!(error = %e, "neutralize failed during shutdown");
            }
        }
        debug!("arbiter closed, actuators neutral");
    }

    fn apply(&self, op: ActuatorOp) -> Result<(), RobotError> {
        let mut actuator = self.actuator.lock().unwrap_or_else(PoisonError::into_inner);
        actuator.apply(op)
    }

    /// Wait out `duration` unless a higher-priority waiter shows up. Returns
    /// `false` when preempted.
    async fn hold(&self, duration: Duration, priority: Priority) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            let mut notified = pin!(self.changed.notified());
            notified.as_mut().enable();
            if self.lane().should_yield(priority) {
                return false;
            }
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return true,
                _ = notified => {}
            }
        }
    }

    /// Bounce the camera pan until the sweep's deadline.
    async fn sweep(&self, sweep: &Sweep, priority: Priority) -> Result<bool, RobotError> {
        let deadline = Instant::now() + sweep.duration;
        let mut state = SweepState::from(sweep);
        while Instant::now() < deadline {
            self.apply(ActuatorOp::Pan(state.angle()))?;
            state.advance();
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !self.hold(sweep.tick.min(remaining), priority).await {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
