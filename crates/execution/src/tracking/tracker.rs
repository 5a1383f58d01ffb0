//! Timer-driven profit tracker.

use super::SweepRunner;
use crate::scheduler::{Schedule, ScheduledTask, Scheduler, SchedulerConfig, TaskStatus};
use alphapulse_domain::enums::TrackingCadence;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};

/// Drives one sweep per cadence firing.
///
/// Cadence tasks are registered on the first start; stopping pauses the
/// timers and a later start resumes them without registering again.
pub struct ProfitTracker {
    runner: Arc<SweepRunner>,
    scheduler: Scheduler,
    registered: AtomicBool,
}

impl ProfitTracker {
    /// Creates a new profit tracker.
    pub fn new(runner: Arc<SweepRunner>, scheduler_config: SchedulerConfig) -> Self {
        Self {
            runner,
            scheduler: Scheduler::new(scheduler_config),
            registered: AtomicBool::new(false),
        }
    }

    /// Gets the sweep runner.
    pub fn runner(&self) -> &Arc<SweepRunner> {
        &self.runner
    }

    /// Scheduler task name of a cadence.
    pub fn task_name(cadence: TrackingCadence) -> String {
        format!("profit_{}", cadence.label())
    }

    /// Registers the cadence timers if needed and starts them.
    pub async fn start(&self) -> bool {
        if !self.registered.swap(true, Ordering::SeqCst) {
            self.register_cadences().await;
        }
        let started = self.scheduler.start().await;
        if started {
            info!("Profit tracker started");
        }
        started
    }

    /// Stops all cadence timers, keeping their registrations.
    pub fn stop(&self) {
        self.scheduler.stop();
        info!("Profit tracker stopped");
    }

    /// Checks if the timers are running.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Status of every cadence timer.
    pub async fn status(&self) -> Vec<TaskStatus> {
        self.scheduler.status().await
    }

    async fn register_cadences(&self) {
        let config = self.runner.config();
        for &cadence in &config.cadences {
            let Some(period) = cadence.period() else {
                continue;
            };
            let schedule = if config.align_to_clock {
                Schedule::Aligned(period)
            } else {
                Schedule::Interval(period)
            };
            let runner = Arc::clone(&self.runner);
            let task = ScheduledTask::new(Self::task_name(cadence), schedule, move || {
                let runner = Arc::clone(&runner);
                async move {
                    if let Err(e) = runner.run(cadence).await {
                        error!(cadence = %cadence, error = %e, "Sweep failed");
                    }
                }
            });
            self.scheduler.add_task(task).await;
        }
    }
}
