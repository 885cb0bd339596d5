//! Background job scheduler.
//!
//! Owns the single periodic trigger that launches the scraper. A spawned
//! driver task sleeps until the next fire time, advances the schedule by one
//! interval, and awaits the job — so there is never more than one invocation
//! in flight, even when a run overruns its interval.
//!
//! All cadence arithmetic lives in [`fms_core::ScheduleState`]; the scheduler
//! only adds the timer loop and the wake-on-reschedule plumbing around it.

mod runner;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};

use fms_core::ScheduleState;

pub use runner::{scrape_job, ProcessScrapeRunner, RunFuture, RunOutcome, ScrapeRunner};

pub type JobFuture = BoxFuture<'static, ()>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("a periodic job is already registered")]
    AlreadyRegistered,
    #[error("no periodic job is registered")]
    NotRegistered,
}

/// Read/adjust access to the running schedule, behind a trait so the
/// reconfiguration path can be exercised against a stub schedule in tests.
#[async_trait]
pub trait ScheduleControl: Send + Sync {
    async fn snapshot(&self) -> Result<ScheduleState, SchedulerError>;
    async fn reschedule(&self, interval_seconds: i64) -> Result<(), SchedulerError>;
}

#[derive(Default)]
struct SchedulerInner {
    state: Option<ScheduleState>,
}

/// Owner of the single periodic trigger.
pub struct JobScheduler {
    inner: Arc<Mutex<SchedulerInner>>,
    wake: Arc<Notify>,
}

/// Handle to the registered trigger; proof that registration succeeded.
pub struct JobHandle {
    inner: Arc<Mutex<SchedulerInner>>,
    wake: Arc<Notify>,
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl JobScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SchedulerInner::default())),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Register the periodic job and start its driver task.
    ///
    /// The first fire is one full interval from now; the driver keeps running
    /// for the lifetime of the process.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::AlreadyRegistered`] if a job is already registered.
    pub async fn register_periodic<F>(
        &self,
        interval_seconds: i64,
        job: F,
    ) -> Result<JobHandle, SchedulerError>
    where
        F: Fn() -> JobFuture + Send + Sync + 'static,
    {
        {
            let mut inner = self.inner.lock().await;
            if inner.state.is_some() {
                return Err(SchedulerError::AlreadyRegistered);
            }
            inner.state = Some(ScheduleState::starting_at(interval_seconds, Utc::now()));
        }

        tokio::spawn(drive(
            Arc::clone(&self.inner),
            Arc::clone(&self.wake),
            Arc::new(job),
        ));

        Ok(JobHandle {
            inner: Arc::clone(&self.inner),
            wake: Arc::clone(&self.wake),
        })
    }
}

#[async_trait]
impl ScheduleControl for JobHandle {
    async fn snapshot(&self) -> Result<ScheduleState, SchedulerError> {
        self.inner
            .lock()
            .await
            .state
            .ok_or(SchedulerError::NotRegistered)
    }

    /// Apply a new interval, continuing the current cadence.
    ///
    /// Never fires the job immediately and never loses the current cycle's
    /// progress; only the future cadence changes. Wakes the driver so the
    /// new fire time takes effect at once.
    async fn reschedule(&self, interval_seconds: i64) -> Result<(), SchedulerError> {
        let mut inner = self.inner.lock().await;
        let state = inner.state.ok_or(SchedulerError::NotRegistered)?;
        inner.state = Some(state.rescheduled(interval_seconds, Utc::now()));
        self.wake.notify_waiters();
        Ok(())
    }
}

async fn drive(
    inner: Arc<Mutex<SchedulerInner>>,
    wake: Arc<Notify>,
    job: Arc<dyn Fn() -> JobFuture + Send + Sync>,
) {
    loop {
        // Arm the wake listener before reading the fire time; a reschedule
        // landing between the read and the select is then still observed.
        let rescheduled = wake.notified();
        let Some(next) = inner.lock().await.state.map(|s| s.next_fire_time) else {
            return;
        };

        let now = Utc::now();
        if next > now {
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::select! {
                () = tokio::time::sleep(wait) => {}
                // A reschedule moved the fire time; recompute the wait.
                () = rescheduled => continue,
            }
        }

        {
            let mut guard = inner.lock().await;
            match guard.state {
                Some(state) if state.next_fire_time <= Utc::now() => {
                    guard.state = Some(state.after_fire());
                }
                // Fire moved into the future while we slept.
                _ => continue,
            }
        }

        // Awaiting here is what guarantees at most one invocation in flight.
        job().await;
    }
}
