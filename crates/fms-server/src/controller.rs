//! Orchestration of a configuration change.
//!
//! A PUT runs validate → compare → guard → persist → reschedule under one
//! mutex, so two concurrent requests can never interleave a read-modify-write
//! of the document or the schedule. Reads take the shared config snapshot and
//! never touch the file.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use fms_core::{guard, ConfigStore, GuardDecision, ScraperConfig, StoreError, ValidationError};

use crate::scheduler::{ScheduleControl, SchedulerError};

#[derive(Debug, Error)]
pub enum PutError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("scraper may still be running; retry at {retry_at}")]
    StillRunning { retry_at: DateTime<Utc> },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Owns the full reconfiguration sequence for the scraping job.
pub struct ConfigController {
    store: ConfigStore,
    schedule: Arc<dyn ScheduleControl>,
    current: Arc<RwLock<ScraperConfig>>,
    // Single serialization boundary spanning validate through apply.
    apply_lock: Mutex<()>,
}

impl ConfigController {
    pub fn new(
        store: ConfigStore,
        schedule: Arc<dyn ScheduleControl>,
        current: Arc<RwLock<ScraperConfig>>,
    ) -> Self {
        Self {
            store,
            schedule,
            current,
            apply_lock: Mutex::new(()),
        }
    }

    /// The currently active configuration.
    pub async fn current(&self) -> ScraperConfig {
        self.current.read().await.clone()
    }

    /// Validate and apply a candidate configuration document.
    ///
    /// Equal candidates are an idempotent no-op. An interval change is only
    /// applied when the schedule guard deems the job idle; otherwise nothing
    /// is mutated and the caller gets the next safe retry time. Persisting
    /// and rescheduling either both happen or the previous document is
    /// restored.
    ///
    /// # Errors
    ///
    /// [`PutError::Invalid`] for validation failures, [`PutError::StillRunning`]
    /// when the guard defers the change, [`PutError::Store`] /
    /// [`PutError::Scheduler`] for apply failures (prior state intact).
    pub async fn apply(&self, candidate: &Map<String, Value>) -> Result<ScraperConfig, PutError> {
        let _applying = self.apply_lock.lock().await;

        let requested = fms_core::validate(candidate)?;
        let active = self.current.read().await.clone();
        if requested == active {
            return Ok(active);
        }

        let interval_changed = requested.run_interval_seconds != active.run_interval_seconds;
        if interval_changed {
            let state = self.schedule.snapshot().await?;
            if let GuardDecision::Reject { retry_at } =
                guard::decide(Utc::now(), &state, &active, &requested)
            {
                tracing::warn!(
                    retry_at = %retry_at,
                    "reconfiguration deferred; scraper presumed running"
                );
                return Err(PutError::StillRunning { retry_at });
            }
        }

        self.store.save(&requested)?;
        if interval_changed {
            if let Err(e) = self.schedule.reschedule(requested.run_interval_seconds).await {
                // The persisted interval must always match the scheduler's
                // active interval; restore the previous document.
                if let Err(revert) = self.store.save(&active) {
                    tracing::error!(error = %revert, "failed to restore previous configuration");
                }
                return Err(PutError::Scheduler(e));
            }
            tracing::info!(
                interval = requested.run_interval_seconds,
                "job rescheduled with new interval"
            );
        }

        *self.current.write().await = requested.clone();
        Ok(requested)
    }
}
