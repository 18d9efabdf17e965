//! Background sync sweep.
//!
//! Hosts the external timer in-process: on every tick of
//! `STOCKSYNC_SCHEDULER_CRON` each user owning a due config gets a
//! `sync_all` run.

use std::sync::Arc;

use chrono::Utc;
use stocksync_engine::SyncOrchestrator;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    orchestrator: Arc<SyncOrchestrator>,
    config: Arc<stocksync_core::AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    if config.scheduler_enabled {
        register_sync_sweep_job(&scheduler, orchestrator, &config.scheduler_cron).await?;
    } else {
        tracing::info!("scheduler: sync sweep disabled by STOCKSYNC_SCHEDULER_ENABLED");
    }

    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_sync_sweep_job(
    scheduler: &JobScheduler,
    orchestrator: Arc<SyncOrchestrator>,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    // A tick that fires while the previous sweep is still running is skipped.
    let running = Arc::new(Mutex::new(()));

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let orchestrator = Arc::clone(&orchestrator);
        let running = Arc::clone(&running);

        Box::pin(async move {
            let Ok(_guard) = running.try_lock() else {
                tracing::warn!("scheduler: previous sync sweep still running; skipping tick");
                return;
            };
            run_sync_sweep(&orchestrator).await;
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: sync sweep registered");
    Ok(())
}

/// Runs `sync_all` for every user with at least one due config.
pub async fn run_sync_sweep(orchestrator: &SyncOrchestrator) {
    match orchestrator.sweep_due_users(Utc::now()).await {
        Ok(summary) if summary.users == 0 => tracing::debug!("scheduler: no due sync configs"),
        Ok(summary) => tracing::info!(
            users = summary.users,
            runs = summary.runs,
            failed_runs = summary.failed_runs,
            "scheduler: sync sweep complete"
        ),
        Err(e) => tracing::error!(error = %e, "scheduler: failed to load users with due configs"),
    }
}
