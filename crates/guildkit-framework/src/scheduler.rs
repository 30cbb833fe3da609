//! Runs registered jobs on their intervals.
//!
//! Each started generation gets its own [`CancellationToken`].  Stopping (or
//! starting again) cancels the previous generation; a job mid-run is dropped
//! at its next await point.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::context::{BotCore, JobContext};
use crate::extension::DispatchTables;

#[derive(Debug, Default)]
pub(crate) struct JobScheduler {
    generation: Mutex<Option<CancellationToken>>,
}

impl JobScheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Spawns one task per job in `tables`, cancelling any previous
    /// generation.  Must be called from within a Tokio runtime.
    pub(crate) fn start(&self, core: &Arc<BotCore>, tables: &DispatchTables) {
        let token = CancellationToken::new();
        if let Some(previous) = self.generation.lock().replace(token.clone()) {
            previous.cancel();
        }

        for entry in tables.jobs() {
            let entry = Arc::clone(entry);
            let core = Arc::clone(core);
            let token = token.clone();

            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(entry.descriptor.interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                // The first tick completes immediately; jobs first run one
                // interval after start.
                ticker.tick().await;

                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {}
                    }

                    debug!(extension = %entry.extension, job = %entry.descriptor.name, "Running job");
                    let ctx = JobContext {
                        core: Arc::clone(&core),
                        extension: Arc::clone(&entry.extension),
                        job: entry.descriptor.name.clone(),
                    };
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = (entry.descriptor.run)(ctx) => {}
                    }
                }
                debug!(extension = %entry.extension, job = %entry.descriptor.name, "Job stopped");
            });
        }

        info!(jobs = tables.jobs().len(), "Scheduled jobs started");
    }

    /// Cancels the running generation.  Returns `true` if one was running.
    pub(crate) fn stop(&self) -> bool {
        match self.generation.lock().take() {
            Some(token) => {
                token.cancel();
                info!("Scheduled jobs stopped");
                true
            }
            None => false,
        }
    }
}
