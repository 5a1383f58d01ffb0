//! Timer scheduler shared by the profit tracker and the signal scheduler.
//!
//! Provides:
//! - Fixed-period and wall-clock aligned schedules
//! - Fire-and-forget task dispatch, never blocking the timer
//! - Pause/resume per task and start/stop without losing registrations

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info};

/// Boxed future returned by task actions.
pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Work run on every firing of a task.
pub type TaskAction = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// Schedule type for task execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Run every period, counted from when the task was (re)armed.
    Interval(Duration),
    /// Run on wall-clock multiples of the period since the Unix epoch,
    /// e.g. every 20 minutes at :00, :20 and :40.
    Aligned(Duration),
}

impl Schedule {
    /// Period between firings.
    pub fn period(&self) -> Duration {
        match self {
            Self::Interval(period) | Self::Aligned(period) => *period,
        }
    }

    /// First firing when armed at `now`.
    fn first_run(&self, now: Instant, wall: DateTime<Utc>) -> Instant {
        match self {
            Self::Interval(period) => now + *period,
            Self::Aligned(period) => now + until_boundary(wall, *period),
        }
    }

    /// Next firing after a firing that was due at `due`, skipping periods
    /// missed while the timer was late.
    fn next_run(&self, due: Instant, now: Instant) -> Instant {
        let period = self.period().max(Duration::from_millis(1));
        match self {
            Self::Interval(_) => now + period,
            Self::Aligned(_) => {
                let mut next = due + period;
                while next <= now {
                    next += period;
                }
                next
            }
        }
    }
}

/// Time from `wall` to the next multiple of `period` since the epoch.
fn until_boundary(wall: DateTime<Utc>, period: Duration) -> Duration {
    let period_ms = period.as_millis().max(1);
    let now_ms = u128::try_from(wall.timestamp_millis()).unwrap_or_default();
    let remaining = period_ms - now_ms % period_ms;
    Duration::from_millis(u64::try_from(remaining).unwrap_or(u64::MAX))
}

/// A scheduled task.
#[derive(Clone)]
pub struct ScheduledTask {
    /// Task name, unique within a scheduler.
    pub name: String,
    /// Schedule.
    pub schedule: Schedule,
    /// Whether task is enabled.
    pub enabled: bool,
    /// Last firing.
    pub last_run: Option<DateTime<Utc>>,
    /// Next scheduled firing.
    pub next_run: Option<Instant>,
    /// Number of firings.
    pub run_count: u64,
    action: TaskAction,
}

impl ScheduledTask {
    /// Creates a new scheduled task.
    pub fn new<F, Fut>(name: impl Into<String>, schedule: Schedule, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let action: TaskAction = Arc::new(move || Box::pin(action()) as TaskFuture);
        Self {
            name: name.into(),
            schedule,
            enabled: true,
            last_run: None,
            next_run: None,
            run_count: 0,
            action,
        }
    }

    /// Disables the task.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    fn status(&self, now: Instant) -> TaskStatus {
        TaskStatus {
            name: self.name.clone(),
            schedule: self.schedule,
            enabled: self.enabled,
            last_run: self.last_run,
            next_run_in: self
                .next_run
                .filter(|_| self.enabled)
                .map(|next| next.saturating_duration_since(now)),
            run_count: self.run_count,
        }
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("name", &self.name)
            .field("schedule", &self.schedule)
            .field("enabled", &self.enabled)
            .field("last_run", &self.last_run)
            .field("next_run", &self.next_run)
            .field("run_count", &self.run_count)
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatus {
    /// Task name.
    pub name: String,
    /// Schedule.
    pub schedule: Schedule,
    /// Whether the task fires.
    pub enabled: bool,
    /// Last firing.
    pub last_run: Option<DateTime<Utc>>,
    /// Time until the next firing, `None` while paused or unarmed.
    pub next_run_in: Option<Duration>,
    /// Number of firings.
    pub run_count: u64,
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Timer resolution.
    pub tick: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
        }
    }
}

/// Scheduler for managing task execution timing.
///
/// Due tasks are spawned as independent tokio tasks, so a slow firing never
/// delays the timer or any other task.
pub struct Scheduler {
    /// Scheduled tasks by name.
    tasks: Arc<RwLock<HashMap<String, ScheduledTask>>>,
    /// Running flag.
    running: Arc<AtomicBool>,
    /// Timer loop handle.
    handle: Mutex<Option<JoinHandle<()>>>,
    config: SchedulerConfig,
}

impl Scheduler {
    /// Creates a new scheduler.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
            config,
        }
    }

    /// Adds a task, replacing any task with the same name.
    ///
    /// Returns `true` when an existing task was replaced.
    pub async fn add_task(&self, mut task: ScheduledTask) -> bool {
        if self.is_running() && task.enabled {
            task.next_run = Some(task.schedule.first_run(Instant::now(), Utc::now()));
        }
        info!(task = %task.name, schedule = ?task.schedule, "Adding task to scheduler");
        self.tasks
            .write()
            .await
            .insert(task.name.clone(), task)
            .is_some()
    }

    /// Removes a task by name. Returns `false` for unknown names.
    pub async fn remove_task(&self, name: &str) -> bool {
        self.tasks.write().await.remove(name).is_some()
    }

    /// Stops a task from firing. Returns `false` for unknown names.
    pub async fn pause_task(&self, name: &str) -> bool {
        match self.tasks.write().await.get_mut(name) {
            Some(task) => {
                task.enabled = false;
                task.next_run = None;
                true
            }
            None => false,
        }
    }

    /// Re-arms a paused task from now. Returns `false` for unknown names.
    pub async fn resume_task(&self, name: &str) -> bool {
        let running = self.is_running();
        match self.tasks.write().await.get_mut(name) {
            Some(task) => {
                task.enabled = true;
                task.next_run =
                    running.then(|| task.schedule.first_run(Instant::now(), Utc::now()));
                true
            }
            None => false,
        }
    }

    /// Whether a task with this name exists.
    pub async fn contains(&self, name: &str) -> bool {
        self.tasks.read().await.contains_key(name)
    }

    /// Status of one task.
    pub async fn task_status(&self, name: &str) -> Option<TaskStatus> {
        let now = Instant::now();
        self.tasks.read().await.get(name).map(|t| t.status(now))
    }

    /// Status of all tasks, sorted by name.
    pub async fn status(&self) -> Vec<TaskStatus> {
        let now = Instant::now();
        let mut statuses: Vec<_> = self
            .tasks
            .read()
            .await
            .values()
            .map(|t| t.status(now))
            .collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    /// Starts the timer loop. Returns `false` if it was already running.
    pub async fn start(&self) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }

        {
            let now = Instant::now();
            let wall = Utc::now();
            let mut tasks = self.tasks.write().await;
            for task in tasks.values_mut().filter(|t| t.enabled) {
                task.next_run = Some(task.schedule.first_run(now, wall));
            }
            info!(tasks = tasks.len(), "Starting scheduler");
        }

        let tasks = Arc::clone(&self.tasks);
        let running = Arc::clone(&self.running);
        let tick = self.config.tick;
        let handle = tokio::spawn(async move {
            let mut check_interval = interval(tick);
            check_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            while running.load(Ordering::SeqCst) {
                check_interval.tick().await;
                for action in Self::collect_due(&tasks).await {
                    tokio::spawn(action());
                }
            }
        });

        if let Ok(mut slot) = self.handle.lock() {
            *slot = Some(handle);
        }
        true
    }

    /// Stops the timer loop. Tasks stay registered; firings already
    /// dispatched run to completion.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Ok(mut slot) = self.handle.lock()
            && let Some(handle) = slot.take()
        {
            handle.abort();
        }
        info!("Scheduler stopped");
    }

    /// Checks if the scheduler is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn collect_due(tasks: &RwLock<HashMap<String, ScheduledTask>>) -> Vec<TaskAction> {
        let now = Instant::now();
        let mut due = Vec::new();

        for task in tasks.write().await.values_mut() {
            if !task.enabled {
                continue;
            }
            if let Some(next_run) = task.next_run
                && now >= next_run
            {
                task.last_run = Some(Utc::now());
                task.run_count += 1;
                task.next_run = Some(task.schedule.next_run(next_run, now));
                due.push(Arc::clone(&task.action));

                debug!(
                    task = %task.name,
                    next_run = ?task.next_run,
                    "Task triggered"
                );
            }
        }
        due
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.handle.lock()
            && let Some(handle) = slot.take()
        {
            handle.abort();
        }
    }
}
