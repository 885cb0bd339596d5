//! Boundary to the external scraper process.
//!
//! The scraper is its own program with its own database connection; the
//! control plane launches it, mirrors the current configuration into its
//! environment, and keeps the run ledger: a run record is opened before the
//! launch and closed with the child's outcome. The scraper reports its own
//! post count against the run id it is handed. Run failures are logged and
//! recorded but never propagate into controller state.

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use sqlx::PgPool;
use tokio::process::Command;
use tokio::sync::RwLock;

use fms_core::ScraperConfig;

use super::JobFuture;

/// Outcome of one scraper run, as observed by the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Failed(String),
}

pub type RunFuture = BoxFuture<'static, RunOutcome>;

/// Launches one scraper run. Implemented by the child-process runner in
/// production and by stubs in tests.
pub trait ScrapeRunner: Send + Sync + 'static {
    fn run(&self, run_id: i64, cfg: ScraperConfig) -> RunFuture;
}

/// Runs the scraper binary as a child process.
pub struct ProcessScrapeRunner {
    scraper_bin: PathBuf,
}

impl ProcessScrapeRunner {
    #[must_use]
    pub fn new(scraper_bin: PathBuf) -> Self {
        Self { scraper_bin }
    }
}

impl ScrapeRunner for ProcessScrapeRunner {
    fn run(&self, run_id: i64, cfg: ScraperConfig) -> RunFuture {
        let bin = self.scraper_bin.clone();
        Box::pin(async move {
            let status = Command::new(&bin)
                .env("DATABASE_URL", &cfg.database_url)
                .env("SCRAPER_RUN_ID", run_id.to_string())
                .env("MAX_SCROLL_SECONDS", cfg.max_scroll_seconds.to_string())
                .env("SCRAPER_HEADLESS", cfg.headless.to_string())
                .env("SCRAPER_CREATE_LOGFILE", cfg.create_logfile.to_string())
                .env("GECKO_DRIVER_PATH", &cfg.gecko_driver_path)
                .status()
                .await;

            match status {
                Ok(exit) if exit.success() => {
                    tracing::info!(run_id, "scheduler: scraper run finished");
                    RunOutcome::Succeeded
                }
                Ok(exit) => {
                    tracing::warn!(run_id, code = ?exit.code(), "scheduler: scraper exited with failure");
                    RunOutcome::Failed(format!("scraper exited with {exit}"))
                }
                Err(e) => {
                    tracing::error!(run_id, error = %e, path = %bin.display(), "scheduler: failed to launch scraper");
                    RunOutcome::Failed(format!("failed to launch scraper: {e}"))
                }
            }
        })
    }
}

/// Build the closure the scheduler invokes on each fire.
///
/// The configuration is read at fire time, so a reconfiguration applied
/// between fires takes effect on the next run. The run is skipped entirely
/// when the database is unreachable (the scraper could not store anything,
/// and no run record could be kept).
pub fn scrape_job(
    pool: PgPool,
    current: Arc<RwLock<ScraperConfig>>,
    runner: Arc<dyn ScrapeRunner>,
) -> impl Fn() -> JobFuture + Send + Sync + 'static {
    move || {
        let pool = pool.clone();
        let current = Arc::clone(&current);
        let runner = Arc::clone(&runner);
        Box::pin(async move {
            if let Err(e) = fms_db::health_check(&pool).await {
                tracing::error!(error = %e, "scheduler: database unreachable; skipping scraper run");
                return;
            }
            let run = match fms_db::insert_run(&pool).await {
                Ok(run) => run,
                Err(e) => {
                    tracing::error!(error = %e, "scheduler: could not open run record; skipping scraper run");
                    return;
                }
            };

            let cfg = current.read().await.clone();
            tracing::info!(
                run_id = run.id,
                interval = cfg.run_interval_seconds,
                scroll_budget = cfg.max_scroll_seconds,
                "scheduler: starting scraper run"
            );
            let outcome = runner.run(run.id, cfg).await;

            let (status, error_message) = match &outcome {
                RunOutcome::Succeeded => ("succeeded", None),
                RunOutcome::Failed(reason) => ("failed", Some(reason.as_str())),
            };
            // The scraper owns posts_scraped; only the lifecycle is closed here.
            if let Err(e) = fms_db::complete_run(&pool, run.id, None, status, error_message).await {
                tracing::error!(run_id = run.id, error = %e, "scheduler: could not close run record");
            }
        })
    }
}
