mod api;
mod controller;
mod scheduler;
mod settings;

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing_subscriber::EnvFilter;

use fms_core::ConfigStore;

use crate::api::{build_app, AppState};
use crate::controller::ConfigController;
use crate::scheduler::{scrape_job, JobScheduler, ProcessScrapeRunner, ScheduleControl, ScrapeRunner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let server_cfg = settings::load_server_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(server_cfg.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // No usable configuration means no usable process; synthesis failures
    // are fatal here, unlike a later PUT.
    let store = ConfigStore::new(&server_cfg.config_path);
    let cfg = store.load()?;
    tracing::info!(config = ?cfg, path = %store.path().display(), "configuration loaded");

    let pool = fms_db::connect_pool(&cfg.database_url, fms_db::PoolConfig::from_env()).await?;
    fms_db::run_migrations(&pool).await?;

    let current = Arc::new(RwLock::new(cfg.clone()));
    let runner: Arc<dyn ScrapeRunner> =
        Arc::new(ProcessScrapeRunner::new(server_cfg.scraper_bin.clone()));
    let scheduler = JobScheduler::new();
    let handle = scheduler
        .register_periodic(
            cfg.run_interval_seconds,
            scrape_job(pool.clone(), Arc::clone(&current), runner),
        )
        .await?;

    let controller = Arc::new(ConfigController::new(
        store,
        Arc::new(handle) as Arc<dyn ScheduleControl>,
        current,
    ));

    let app = build_app(AppState { pool, controller });
    let listener = tokio::net::TcpListener::bind(server_cfg.bind_addr).await?;
    tracing::info!(addr = %server_cfg.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
