//! Trading-signal scheduler.

use super::{JobOutcome, JobRun, SignalJob, SignalJobSpec, SignalJobStatus};
use crate::alerts::{notify_best_effort, order_opened_message};
use crate::error::{ExecutionError, Result};
use crate::lifecycle::OrderLifecycleEngine;
use crate::ports::{PriceSource, SignalGenerator, source_call};
use crate::scheduler::{Schedule, ScheduledTask, Scheduler, SchedulerConfig};
use alphapulse_domain::value_objects::JobId;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{Instrument, info, info_span, warn};

/// Configuration for the signal scheduler.
#[derive(Debug, Clone)]
pub struct SignalSchedulerConfig {
    /// Deadline for one signal generation call.
    pub signal_timeout: Duration,
    /// Deadline for market data calls.
    pub call_timeout: Duration,
    /// Deadline for alert delivery.
    pub notify_timeout: Duration,
    /// Fire on wall-clock boundaries instead of relative to registration.
    pub align_to_clock: bool,
    /// Send an alert when a signal opens an order.
    pub notify_new_orders: bool,
}

impl Default for SignalSchedulerConfig {
    fn default() -> Self {
        Self {
            signal_timeout: Duration::from_secs(200),
            call_timeout: Duration::from_secs(10),
            notify_timeout: Duration::from_secs(10),
            align_to_clock: true,
            notify_new_orders: true,
        }
    }
}

struct Registered {
    generation: u64,
    job: SignalJob,
}

/// Executes job firings and records their outcome.
struct JobRunner {
    engine: Arc<OrderLifecycleEngine>,
    generator: Arc<dyn SignalGenerator>,
    prices: Arc<dyn PriceSource>,
    config: SignalSchedulerConfig,
    jobs: RwLock<HashMap<JobId, Registered>>,
    generations: AtomicU64,
}

impl JobRunner {
    async fn execute(&self, job_id: &JobId) -> Result<JobRun> {
        let (generation, job) = {
            let jobs = self.jobs.read().await;
            let registered = jobs
                .get(job_id)
                .ok_or_else(|| ExecutionError::not_found("signal job", job_id))?;
            (registered.generation, registered.job.clone())
        };

        let span = info_span!("signal_job", job_id = %job_id, symbol = %job.symbol);
        let started_at = Utc::now();
        let started = Instant::now();
        let outcome = self.pipeline(&job).instrument(span).await;
        let run = JobRun {
            started_at,
            elapsed: started.elapsed(),
            outcome,
        };

        match &run.outcome {
            JobOutcome::OrderOpened(order_id) => {
                info!(job_id = %job_id, order_id = %order_id, "Signal job opened order");
            }
            JobOutcome::Hold => info!(job_id = %job_id, "Signal job: hold"),
            JobOutcome::Rejected(reason) => {
                info!(job_id = %job_id, reason = %reason, "Signal job: signal rejected");
            }
            JobOutcome::Failed(reason) => {
                warn!(job_id = %job_id, reason = %reason, "Signal job failed");
            }
        }

        // a job replaced while this firing ran keeps its own history
        if let Some(registered) = self.jobs.write().await.get_mut(job_id)
            && registered.generation == generation
        {
            registered.job.run_count += 1;
            registered.job.last_run = Some(run.clone());
        }

        Ok(run)
    }

    async fn pipeline(&self, job: &SignalJob) -> JobOutcome {
        let signal = match source_call(
            self.config.signal_timeout,
            self.generator.analyze(&job.symbol, &job.params),
        )
        .await
        {
            Ok(signal) => signal,
            Err(e) => return JobOutcome::Failed(e.to_string()),
        };

        if signal.recommendation.direction().is_none() {
            return JobOutcome::Hold;
        }
        if !signal.risk_level.permits_auto_open() {
            return JobOutcome::Rejected(format!(
                "{} risk signals are not opened",
                signal.risk_level
            ));
        }

        let price = match source_call(
            self.config.call_timeout,
            self.prices.current_price(&job.symbol),
        )
        .await
        {
            Ok(price) if price > Decimal::ZERO => Some(price),
            Ok(price) => {
                warn!(symbol = %job.symbol, price = %price, "Invalid market price, using signal entry");
                None
            }
            Err(e) => {
                warn!(symbol = %job.symbol, error = %e, "Market price unavailable, using signal entry");
                None
            }
        };

        let mut signal = signal;
        signal.symbol = job.symbol.clone();
        match self.engine.create(signal.into_intent(price, &job.params)).await {
            Ok(order) => {
                if self.config.notify_new_orders {
                    notify_best_effort(
                        self.engine.notifier().as_ref(),
                        &order_opened_message(&order),
                        self.config.notify_timeout,
                    )
                    .await;
                }
                JobOutcome::OrderOpened(order.id)
            }
            Err(ExecutionError::Validation(reason)) => JobOutcome::Rejected(reason),
            Err(e) => JobOutcome::Failed(e.to_string()),
        }
    }
}

/// Registry of signal jobs driven by a timer scheduler.
///
/// Job ids are idempotent: adding an existing id replaces the job.
/// Firings run as independent tasks, so a slow signal call never delays
/// another firing.
pub struct TradingSignalScheduler {
    runner: Arc<JobRunner>,
    scheduler: Scheduler,
}

impl TradingSignalScheduler {
    /// Creates a new signal scheduler.
    pub fn new(
        engine: Arc<OrderLifecycleEngine>,
        generator: Arc<dyn SignalGenerator>,
        prices: Arc<dyn PriceSource>,
        config: SignalSchedulerConfig,
        scheduler_config: SchedulerConfig,
    ) -> Self {
        Self {
            runner: Arc::new(JobRunner {
                engine,
                generator,
                prices,
                config,
                jobs: RwLock::new(HashMap::new()),
                generations: AtomicU64::new(0),
            }),
            scheduler: Scheduler::new(scheduler_config),
        }
    }

    /// Starts the job timers.
    pub async fn start(&self) -> bool {
        let started = self.scheduler.start().await;
        if started {
            info!("Trading signal scheduler started");
        }
        started
    }

    /// Stops the job timers, keeping every job registered.
    pub fn stop(&self) {
        self.scheduler.stop();
        info!("Trading signal scheduler stopped");
    }

    /// Checks if the timers are running.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Registers a job, replacing any job with the same id.
    ///
    /// # Errors
    /// [`ExecutionError::Validation`] for an empty symbol.
    pub async fn add(&self, spec: SignalJobSpec) -> Result<JobId> {
        let symbol = spec.symbol.trim().to_ascii_uppercase();
        if symbol.is_empty() {
            return Err(ExecutionError::Validation("symbol is required".to_string()));
        }
        let job_id = spec.resolved_id();

        let job = SignalJob {
            id: job_id.clone(),
            symbol,
            cadence: spec.cadence,
            params: spec.params,
            paused: false,
            created_at: Utc::now(),
            run_count: 0,
            last_run: None,
        };
        let period = job.cadence.period();
        let schedule = if self.runner.config.align_to_clock {
            Schedule::Aligned(period)
        } else {
            Schedule::Interval(period)
        };

        let runner = Arc::clone(&self.runner);
        let task_id = job_id.clone();
        let task = ScheduledTask::new(job_id.as_str(), schedule, move || {
            let runner = Arc::clone(&runner);
            let job_id = task_id.clone();
            async move {
                if let Err(e) = runner.execute(&job_id).await {
                    warn!(job_id = %job_id, error = %e, "Signal job firing skipped");
                }
            }
        });

        // Registry entry and timer task change under one guard.
        let mut jobs = self.runner.jobs.write().await;
        let generation = self.runner.generations.fetch_add(1, Ordering::SeqCst);
        let replaced = jobs.contains_key(&job_id);
        info!(
            job_id = %job_id,
            symbol = %job.symbol,
            cadence = %job.cadence,
            replaced,
            "Adding signal job"
        );
        jobs.insert(job_id.clone(), Registered { generation, job });
        self.scheduler.add_task(task).await;
        drop(jobs);

        Ok(job_id)
    }

    /// Removes a job.
    ///
    /// # Errors
    /// [`ExecutionError::NotFound`] for unknown ids.
    pub async fn remove(&self, job_id: &JobId) -> Result<()> {
        if !self.remove_entry(job_id).await {
            return Err(ExecutionError::not_found("signal job", job_id));
        }
        info!(job_id = %job_id, "Removed signal job");
        Ok(())
    }

    /// Suspends timer firings of a job.
    ///
    /// # Errors
    /// [`ExecutionError::NotFound`] for unknown ids.
    pub async fn pause(&self, job_id: &JobId) -> Result<()> {
        self.set_paused(job_id, true).await?;
        info!(job_id = %job_id, "Paused signal job");
        Ok(())
    }

    /// Resumes timer firings of a job.
    ///
    /// # Errors
    /// [`ExecutionError::NotFound`] for unknown ids.
    pub async fn resume(&self, job_id: &JobId) -> Result<()> {
        self.set_paused(job_id, false).await?;
        info!(job_id = %job_id, "Resumed signal job");
        Ok(())
    }

    /// Runs a job immediately and waits for its outcome. The timer
    /// schedule is left untouched.
    ///
    /// # Errors
    /// [`ExecutionError::NotFound`] for unknown ids.
    pub async fn run_now(&self, job_id: &JobId) -> Result<JobRun> {
        info!(job_id = %job_id, "Running signal job now");
        self.runner.execute(job_id).await
    }

    /// Status of one job.
    pub async fn job(&self, job_id: &JobId) -> Option<SignalJobStatus> {
        let job = self.runner.jobs.read().await.get(job_id)?.job.clone();
        let next_run_in = self
            .scheduler
            .task_status(job_id.as_str())
            .await
            .and_then(|s| s.next_run_in);
        Some(SignalJobStatus { job, next_run_in })
    }

    /// Status of all jobs, sorted by id.
    pub async fn jobs(&self) -> Vec<SignalJobStatus> {
        let mut ids: Vec<JobId> = self.runner.jobs.read().await.keys().cloned().collect();
        ids.sort();
        let mut statuses = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(status) = self.job(&id).await {
                statuses.push(status);
            }
        }
        statuses
    }

    async fn remove_entry(&self, job_id: &JobId) -> bool {
        let mut jobs = self.runner.jobs.write().await;
        let removed = jobs.remove(job_id).is_some();
        self.scheduler.remove_task(job_id.as_str()).await;
        removed
    }

    async fn set_paused(&self, job_id: &JobId, paused: bool) -> Result<()> {
        let mut jobs = self.runner.jobs.write().await;
        let registered = jobs
            .get_mut(job_id)
            .ok_or_else(|| ExecutionError::not_found("signal job", job_id))?;
        registered.job.paused = paused;
        if paused {
            self.scheduler.pause_task(job_id.as_str()).await;
        } else {
            self.scheduler.resume_task(job_id.as_str()).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecycleConfig;
    use crate::ports::{InMemoryOrderStore, OrderStore};
    use crate::testing::{
        FakePriceSource, FakeSignalGenerator, RecordingNotifier, buy_signal, window,
    };
    use alphapulse_domain::entities::SignalParams;
    use alphapulse_domain::enums::{Recommendation, RiskLevel};
    use alphapulse_domain::value_objects::JobCadence;
    use rust_decimal_macros::dec;

    struct Fixture {
        store: Arc<InMemoryOrderStore>,
        prices: Arc<FakePriceSource>,
        generator: Arc<FakeSignalGenerator>,
        notifier: Arc<RecordingNotifier>,
        scheduler: TradingSignalScheduler,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryOrderStore::new());
        let prices = Arc::new(FakePriceSource::default());
        let generator = Arc::new(FakeSignalGenerator::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = Arc::new(OrderLifecycleEngine::new(
            store.clone(),
            notifier.clone(),
            LifecycleConfig::default(),
        ));
        let config = SignalSchedulerConfig {
            align_to_clock: false,
            ..SignalSchedulerConfig::default()
        };
        let scheduler = TradingSignalScheduler::new(
            engine,
            generator.clone(),
            prices.clone(),
            config,
            SchedulerConfig::default(),
        );
        Fixture {
            store,
            prices,
            generator,
            notifier,
            scheduler,
        }
    }

    fn spec(symbol: &str, minutes: u32, model: &str) -> SignalJobSpec {
        let params = SignalParams {
            model: Some(model.to_string()),
            ..SignalParams::default()
        };
        SignalJobSpec::new(symbol, JobCadence::minutes(minutes).unwrap(), params)
    }

    #[tokio::test]
    async fn test_add_is_idempotent_by_job_id() {
        let f = fixture();
        let id = JobId::new("x");
        f.scheduler
            .add(spec("BTCUSDT", 20, "first").with_id(id.clone()))
            .await
            .unwrap();
        f.scheduler
            .add(spec("BTCUSDT", 30, "second").with_id(id.clone()))
            .await
            .unwrap();

        let jobs = f.scheduler.jobs().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job.params.model.as_deref(), Some("second"));
        assert_eq!(jobs[0].job.cadence, JobCadence::minutes(30).unwrap());

        f.generator.set_signal(buy_signal("BTCUSDT", RiskLevel::Low));
        f.prices
            .set_window("BTCUSDT", window(dec!(100), dec!(100), dec!(100)));
        f.scheduler.run_now(&id).await.unwrap();
        assert_eq!(f.generator.calls()[0].1.model.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_derived_ids_collapse_duplicates() {
        let f = fixture();
        let a = f.scheduler.add(spec("btcusdt", 20, "a")).await.unwrap();
        let b = f.scheduler.add(spec("BTCUSDT", 20, "b")).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(f.scheduler.jobs().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_job_ids_report_not_found() {
        let f = fixture();
        let missing = JobId::new("missing");
        for result in [
            f.scheduler.remove(&missing).await,
            f.scheduler.pause(&missing).await,
            f.scheduler.resume(&missing).await,
        ] {
            assert!(matches!(result, Err(ExecutionError::NotFound { .. })));
        }
        assert!(matches!(
            f.scheduler.run_now(&missing).await,
            Err(ExecutionError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_now_opens_order_at_market_price() {
        let f = fixture();
        let id = f.scheduler.add(spec("BTCUSDT", 20, "m")).await.unwrap();
        f.generator.set_signal(buy_signal("BTCUSDT", RiskLevel::Medium));
        f.prices
            .set_window("BTCUSDT", window(dec!(100.5), dec!(100.5), dec!(100.5)));

        let run = f.scheduler.run_now(&id).await.unwrap();
        let JobOutcome::OrderOpened(order_id) = run.outcome else {
            panic!("expected an order, got {:?}", run.outcome);
        };
        let order = f.store.get(order_id).await.unwrap().unwrap();
        assert_eq!(order.entry_price, dec!(100.5));
        assert_eq!(order.ai_model.as_deref(), Some("m"));
        assert_eq!(f.notifier.count(), 1);

        let status = f.scheduler.job(&id).await.unwrap();
        assert_eq!(status.job.run_count, 1);
        assert_eq!(status.job.last_run.unwrap().outcome, run.outcome);
    }

    #[tokio::test]
    async fn test_missing_price_falls_back_to_signal_entry() {
        let f = fixture();
        let id = f.scheduler.add(spec("BTCUSDT", 20, "m")).await.unwrap();
        f.generator.set_signal(buy_signal("BTCUSDT", RiskLevel::Low));
        f.prices.set_failing("BTCUSDT");

        let run = f.scheduler.run_now(&id).await.unwrap();
        let JobOutcome::OrderOpened(order_id) = run.outcome else {
            panic!("expected an order, got {:?}", run.outcome);
        };
        let order = f.store.get(order_id).await.unwrap().unwrap();
        assert_eq!(order.entry_price, dec!(99));
    }

    #[tokio::test]
    async fn test_high_risk_and_hold_do_not_open() {
        let f = fixture();
        let id = f.scheduler.add(spec("BTCUSDT", 20, "m")).await.unwrap();
        f.prices
            .set_window("BTCUSDT", window(dec!(100), dec!(100), dec!(100)));

        f.generator.set_signal(buy_signal("BTCUSDT", RiskLevel::High));
        let run = f.scheduler.run_now(&id).await.unwrap();
        assert!(matches!(run.outcome, JobOutcome::Rejected(_)));

        let mut hold = buy_signal("BTCUSDT", RiskLevel::Low);
        hold.recommendation = Recommendation::Hold;
        f.generator.set_signal(hold);
        let run = f.scheduler.run_now(&id).await.unwrap();
        assert_eq!(run.outcome, JobOutcome::Hold);

        assert!(f.store.list_open().await.unwrap().is_empty());
        assert_eq!(f.notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_generator_failure_is_recorded() {
        let f = fixture();
        let id = f.scheduler.add(spec("ETHUSDT", 20, "m")).await.unwrap();
        let run = f.scheduler.run_now(&id).await.unwrap();
        assert!(matches!(run.outcome, JobOutcome::Failed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_firing_does_not_delay_next_firing() {
        let f = fixture();
        f.generator.set_signal(buy_signal("BTCUSDT", RiskLevel::Low));
        f.generator.set_delay(Duration::from_secs(50 * 60));
        f.prices
            .set_window("BTCUSDT", window(dec!(100), dec!(100), dec!(100)));
        f.scheduler.add(spec("BTCUSDT", 20, "slow")).await.unwrap();
        f.scheduler.start().await;

        tokio::time::sleep(Duration::from_secs(61 * 60)).await;
        assert_eq!(f.generator.call_count(), 3);
        f.scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_and_resume_control_timer() {
        let f = fixture();
        let id = f.scheduler.add(spec("BTCUSDT", 20, "m")).await.unwrap();
        f.scheduler.start().await;
        f.scheduler.pause(&id).await.unwrap();

        tokio::time::sleep(Duration::from_secs(45 * 60)).await;
        assert_eq!(f.generator.call_count(), 0);
        let status = f.scheduler.job(&id).await.unwrap();
        assert!(status.job.paused);
        assert_eq!(status.next_run_in, None);

        f.scheduler.resume(&id).await.unwrap();
        tokio::time::sleep(Duration::from_secs(20 * 60 + 2)).await;
        tokio::task::yield_now().await;
        assert_eq!(f.generator.call_count(), 1);
        f.scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_now_leaves_schedule_untouched() {
        let f = fixture();
        let id = f.scheduler.add(spec("BTCUSDT", 20, "m")).await.unwrap();
        f.scheduler.start().await;
        tokio::time::sleep(Duration::from_secs(5 * 60)).await;

        let before = f.scheduler.job(&id).await.unwrap().next_run_in;
        f.scheduler.run_now(&id).await.unwrap();
        let after = f.scheduler.job(&id).await.unwrap().next_run_in;
        assert_eq!(before, after);
        assert_eq!(before, Some(Duration::from_secs(15 * 60)));
        f.scheduler.stop();
    }

    #[tokio::test]
    async fn test_signal_opens_when_market_is_past_first_target() {
        let f = fixture();
        let id = f.scheduler.add(spec("BTCUSDT", 20, "m")).await.unwrap();
        f.generator.set_signal(buy_signal("BTCUSDT", RiskLevel::Low));
        f.prices
            .set_window("BTCUSDT", window(dec!(106), dec!(106), dec!(106)));

        let run = f.scheduler.run_now(&id).await.unwrap();
        let JobOutcome::OrderOpened(order_id) = run.outcome else {
            panic!("expected an order, got {:?}", run.outcome);
        };
        let order = f.store.get(order_id).await.unwrap().unwrap();
        assert_eq!(order.entry_price, dec!(106));
        assert!(order.is_open());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_add_and_remove_keep_timer_in_sync() {
        let scheduler = Arc::new(fixture().scheduler);
        let id = JobId::new("contended");

        for round in 0..50 {
            let adder = {
                let scheduler = Arc::clone(&scheduler);
                let spec = spec("BTCUSDT", 20, &format!("m{round}")).with_id(id.clone());
                tokio::spawn(async move { scheduler.add(spec).await })
            };
            let remover = {
                let scheduler = Arc::clone(&scheduler);
                let id = id.clone();
                tokio::spawn(async move { scheduler.remove(&id).await })
            };
            adder.await.unwrap().unwrap();
            let _ = remover.await.unwrap();

            let registered = scheduler.job(&id).await.is_some();
            let timed = scheduler.scheduler.contains(id.as_str()).await;
            assert_eq!(registered, timed, "round {round}");
        }
    }
}
