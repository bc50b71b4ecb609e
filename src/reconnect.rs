//! Bounded-retry recovery for a dropped relay connection.
//!
//! Recovery is split into a pure retry schedule and an async driver. The
//! schedule owns the attempt arithmetic and is testable without a runtime;
//! the driver owns the timers and the cancellation race. Reconnect success
//! never resumes match state here - rejoining a room re-enters through the
//! roster-driven session path, which is the sole authority for resuming
//! play.

use crate::transport::RoomHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

/// Retry policy: fixed interval, bounded attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Attempts before giving up.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub retry_interval: Duration,
    /// Delay between reporting exhaustion and abandoning the session.
    pub abandon_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_interval: Duration::from_secs(2),
            abandon_delay: Duration::from_secs(2),
        }
    }
}

/// Observable state of the recovery loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    /// No recovery in progress.
    Idle,
    /// Waiting on the numbered attempt.
    Retrying(u32),
    /// The connection came back while retrying.
    Succeeded,
    /// All attempts used without success.
    GaveUp,
}

/// Pure bounded-retry counter.
///
/// `next_attempt` advances `Idle -> Retrying(1) -> .. -> Retrying(max)`
/// and yields `None` exactly once the budget is spent, flipping the state
/// to `GaveUp`.
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    policy: ReconnectPolicy,
    state: RecoveryState,
}

impl RetrySchedule {
    /// Creates an idle schedule with the given policy.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: RecoveryState::Idle,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> RecoveryState {
        self.state
    }

    /// Returns the policy driving this schedule.
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Advances to the next attempt number, or gives up.
    pub fn next_attempt(&mut self) -> Option<u32> {
        let next = match self.state {
            RecoveryState::Idle => 1,
            RecoveryState::Retrying(attempt) => attempt + 1,
            RecoveryState::Succeeded | RecoveryState::GaveUp => return None,
        };

        if next > self.policy.max_attempts {
            self.state = RecoveryState::GaveUp;
            return None;
        }

        self.state = RecoveryState::Retrying(next);
        Some(next)
    }

    /// Records that the connection came back mid-recovery.
    pub fn mark_succeeded(&mut self) {
        if matches!(self.state, RecoveryState::Retrying(_)) {
            self.state = RecoveryState::Succeeded;
        }
    }
}

/// Progress reports from the supervisor to the session loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryReport {
    /// A numbered attempt is being issued.
    Attempting {
        /// This attempt, 1-based.
        attempt: u32,
        /// Total attempts the policy allows.
        max_attempts: u32,
    },
    /// The attempt budget is spent.
    Exhausted,
    /// The session should be abandoned and the participant returned to
    /// matchmaking.
    Abandon,
}

/// Drives bounded reconnect attempts against the transport.
///
/// Independent of the match state machine: it only touches the transport's
/// reconnect primitive and reports progress. Cancellation (the `cancel`
/// watch flipping to `true`) takes effect at the next await point, covering
/// reconnect acknowledgments and out-of-band room rejoins alike.
#[derive(Debug)]
pub struct ReconnectionSupervisor {
    schedule: RetrySchedule,
}

impl ReconnectionSupervisor {
    /// Creates a supervisor with the given policy.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            schedule: RetrySchedule::new(policy),
        }
    }

    /// Runs the recovery loop to completion or cancellation.
    ///
    /// Each round issues one reconnect request, then sleeps the fixed
    /// interval unless cancelled. Exhaustion reports
    /// [`RecoveryReport::Exhausted`] once, waits one more delay, then
    /// reports [`RecoveryReport::Abandon`].
    #[instrument(skip_all)]
    pub async fn run(
        mut self,
        room: Arc<dyn RoomHandle>,
        mut cancel: watch::Receiver<bool>,
        reports: mpsc::UnboundedSender<RecoveryReport>,
    ) {
        let policy = *self.schedule.policy();

        while let Some(attempt) = self.schedule.next_attempt() {
            info!(attempt, max = policy.max_attempts, "reconnect attempt");
            if reports
                .send(RecoveryReport::Attempting {
                    attempt,
                    max_attempts: policy.max_attempts,
                })
                .is_err()
            {
                return;
            }

            if let Err(err) = room.request_reconnect().await {
                warn!(%err, "reconnect request failed to issue");
            }

            tokio::select! {
                _ = wait_cancelled(&mut cancel) => {
                    self.schedule.mark_succeeded();
                    debug!("recovery cancelled, connection restored");
                    return;
                }
                _ = tokio::time::sleep(policy.retry_interval) => {}
            }
        }

        warn!(attempts = policy.max_attempts, "reconnect attempts exhausted");
        if reports.send(RecoveryReport::Exhausted).is_err() {
            return;
        }

        tokio::select! {
            _ = wait_cancelled(&mut cancel) => {}
            _ = tokio::time::sleep(policy.abandon_delay) => {
                let _ = reports.send(RecoveryReport::Abandon);
            }
        }
    }
}

async fn wait_cancelled(cancel: &mut watch::Receiver<bool>) {
    // Already-cancelled check first: the flag may flip before run() starts.
    while !*cancel.borrow_and_update() {
        if cancel.changed().await.is_err() {
            // Sender dropped: session loop is gone, stop retrying.
            return;
        }
    }
}
