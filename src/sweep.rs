//! Daily full sweep, anchored to local midnight.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use cron::Schedule;
use tracing::{debug, info, warn};

use crate::engine::CacheEngine;

/// Fires at midnight in the engine's configured timezone.
const SWEEP_CRON: &str = "0 0 0 * * *";

/// Create the cron schedule for the daily sweep.
pub fn sweep_schedule() -> Schedule {
    Schedule::from_str(SWEEP_CRON).expect("invalid cron expression for daily sweep")
}

/// Registers the daily full-purge task.
///
/// Registration is idempotent: if a sweep is already scheduled, a second
/// call is a no-op.
pub struct SweepScheduler {
    scheduled: AtomicBool,
}

impl SweepScheduler {
    pub fn new() -> Self {
        Self {
            scheduled: AtomicBool::new(false),
        }
    }

    /// Spawn the sweep task for `engine` on the current tokio runtime.
    /// Returns `false` when a sweep was already scheduled.
    pub fn schedule(&self, engine: Arc<CacheEngine>) -> bool {
        if self.scheduled.swap(true, Ordering::SeqCst) {
            debug!("daily sweep already scheduled");
            return false;
        }

        let timezone = engine.settings().timezone;
        info!(%timezone, cron = SWEEP_CRON, "daily sweep scheduled");

        tokio::spawn(async move {
            let schedule = sweep_schedule();
            loop {
                let now = Utc::now().with_timezone(&timezone);
                let Some(next) = schedule.upcoming(timezone).next() else {
                    warn!("sweep schedule exhausted, stopping");
                    break;
                };
                let wait = (next - now).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                let report = engine.purge_all().await;
                info!(
                    removed_files = report.removed_files,
                    removed_dirs = report.removed_dirs,
                    failures = report.failures.len(),
                    "scheduled sweep complete"
                );
            }
        });

        true
    }

    /// Whether a sweep task has been registered.
    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::SeqCst)
    }
}

impl Default for SweepScheduler {
    fn default() -> Self {
        Self::new()
    }
}
