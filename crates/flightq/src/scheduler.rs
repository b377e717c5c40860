//! Periodic and on-demand scheduling of update cycles.
//!
//! The scheduler runs cycles one at a time in a single loop. Manual requests
//! go through a channel of capacity one, so requests made while a cycle is
//! queued or running collapse into a single extra run.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::worker::UpdateWorker;

/// What started an update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// The periodic schedule.
    Scheduled,
    /// An explicit user request.
    Manual,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scheduled => write!(f, "scheduled"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// Timing of scheduled cycles and their retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulePolicy {
    /// Time between scheduled cycles.
    pub period: Duration,
    /// Delay before the first scheduled cycle.
    pub initial_delay: Duration,
    /// Backoff before the first retry of a failed cycle.
    pub retry_backoff: Duration,
    /// Upper bound on the backoff.
    pub max_backoff: Duration,
    /// Retries per period.
    pub max_retries: u32,
}

impl SchedulePolicy {
    /// The policy described by the configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            period: config.update_period(),
            initial_delay: config.initial_delay(),
            retry_backoff: config.retry_backoff(),
            max_backoff: config.max_backoff(),
            max_retries: config.schedule.max_retries,
        }
    }

    /// Backoff before retry number `retry` (1-based), doubling each time.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.retry_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Requests manual cycles from a running [`Scheduler`].
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    tx: mpsc::Sender<()>,
}

impl TriggerHandle {
    /// Request a manual cycle.
    ///
    /// Returns `false` if a request is already pending.
    pub fn request(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                debug!("Manual update already pending");
                false
            }
            Err(TrySendError::Closed(())) => {
                warn!("Scheduler stopped, manual update ignored");
                false
            }
        }
    }
}

/// Cycle counts of a scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Scheduled cycles attempted, retries included.
    pub scheduled: usize,
    /// Manual cycles attempted.
    pub manual: usize,
    /// Cycles that failed.
    pub failed: usize,
}

/// Drives an [`UpdateWorker`] on a schedule.
#[derive(Debug)]
pub struct Scheduler {
    policy: SchedulePolicy,
    tx: mpsc::Sender<()>,
    rx: mpsc::Receiver<()>,
}

impl Scheduler {
    /// Create a scheduler with the given policy.
    #[must_use]
    pub fn new(policy: SchedulePolicy) -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self { policy, tx, rx }
    }

    /// The scheduling policy.
    #[must_use]
    pub fn policy(&self) -> &SchedulePolicy {
        &self.policy
    }

    /// A handle for requesting manual cycles.
    #[must_use]
    pub fn handle(&self) -> TriggerHandle {
        TriggerHandle {
            tx: self.tx.clone(),
        }
    }

    /// Run cycles until `shutdown` completes.
    ///
    /// A cycle in progress when `shutdown` completes is abandoned.
    pub async fn run<F>(&mut self, worker: &UpdateWorker<'_>, shutdown: F) -> RunSummary
    where
        F: Future<Output = ()>,
    {
        let mut shutdown = std::pin::pin!(shutdown);
        let mut summary = RunSummary::default();
        let mut slot = Instant::now() + self.policy.initial_delay;
        let mut next_run = slot;
        let mut retries = 0;

        info!(
            first_run_in = ?self.policy.initial_delay,
            period = ?self.policy.period,
            "Scheduler started"
        );

        loop {
            let trigger = tokio::select! {
                () = &mut shutdown => break,
                () = tokio::time::sleep_until(next_run) => Trigger::Scheduled,
                Some(()) = self.rx.recv() => Trigger::Manual,
            };

            match trigger {
                Trigger::Scheduled => summary.scheduled += 1,
                Trigger::Manual => summary.manual += 1,
            }

            let result = tokio::select! {
                () = &mut shutdown => {
                    info!(%trigger, "Shutdown requested, abandoning update cycle");
                    break;
                }
                result = worker.run_cycle(trigger) => result,
            };

            if result.is_err() {
                summary.failed += 1;
            }

            if trigger == Trigger::Manual {
                continue;
            }

            if result.is_err() && retries < self.policy.max_retries {
                retries += 1;
                let backoff = self.policy.backoff(retries);
                warn!(retry = retries, ?backoff, "Scheduled update failed, retrying");
                next_run = Instant::now() + backoff;
                continue;
            }

            retries = 0;
            slot += self.policy.period;
            let now = Instant::now();
            if slot <= now {
                slot = now + self.policy.period;
            }
            next_run = slot;
            debug!(next_in = ?next_run.saturating_duration_since(now), "Next scheduled update");
        }

        info!(
            scheduled = summary.scheduled,
            manual = summary.manual,
            failed = summary.failed,
            "Scheduler stopped"
        );
        summary
    }
}
