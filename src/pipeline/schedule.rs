//! Scheduled sync using tokio-cron-scheduler.
//!
//! ```text
//! Scheduler (every hour, on the hour)
//!     │
//!     └─► run_guarded()
//!             ├─► state busy? → skip this trigger
//!             └─► SyncPipeline::run_cycle(&mut state)
//! ```

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::error::{AppError, Result};
use crate::storage::SyncState;

use super::sync::{CycleReport, SyncPipeline};

/// Convert a cron expression to the seconds-first form the scheduler expects.
///
/// Five-field expressions get a leading `0` seconds field; six- and
/// seven-field expressions are returned unchanged.
pub fn normalize_cron(expression: &str) -> Result<String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    match fields.len() {
        5 => Ok(format!("0 {}", fields.join(" "))),
        6 | 7 => Ok(fields.join(" ")),
        n => Err(AppError::config(format!(
            "cron expression '{}' has {} fields, expected 5, 6 or 7",
            expression, n
        ))),
    }
}

/// Run one cycle unless another one still holds the state.
///
/// Returns `Ok(None)` when the trigger was skipped because of overlap.
pub async fn run_guarded(
    pipeline: &SyncPipeline,
    state: &Mutex<SyncState>,
) -> Result<Option<CycleReport>> {
    let Ok(mut state) = state.try_lock() else {
        log::warn!("Previous sync cycle still running, skipping this trigger");
        return Ok(None);
    };

    let report = pipeline.run_cycle(&mut state).await?;
    if report.fetched {
        log::info!(
            "Cycle done: {} jobs, {} delivered, {} pending",
            report.job_count,
            report.delivered,
            report.pending
        );
    }
    Ok(Some(report))
}

/// Start the scheduler running the pipeline on the given cron schedule.
pub async fn start_scheduler(
    pipeline: Arc<SyncPipeline>,
    state: Arc<Mutex<SyncState>>,
    cron: &str,
) -> Result<JobScheduler> {
    let schedule = normalize_cron(cron)?;
    let scheduler = JobScheduler::new().await.map_err(AppError::scheduler)?;

    let sync_job = Job::new_async(schedule.as_str(), move |_uuid, _lock| {
        let pipeline = Arc::clone(&pipeline);
        let state = Arc::clone(&state);
        Box::pin(async move {
            if let Err(e) = run_guarded(&pipeline, &state).await {
                log::error!("Sync cycle failed: {}", e);
            }
        })
    })
    .map_err(AppError::scheduler)?;

    scheduler.add(sync_job).await.map_err(AppError::scheduler)?;
    scheduler.start().await.map_err(AppError::scheduler)?;

    log::info!("Scheduled sync started ({} UTC)", schedule);
    Ok(scheduler)
}
