//! Control surface over the whole execution core.

use crate::error::{ExecutionError, Result};
use crate::lifecycle::{ClosedOrder, LifecycleConfig, OrderLifecycleEngine, Tracked};
use crate::ports::{
    Notifier, OrderFilter, OrderStore, PriceSource, SignalGenerator, source_call, store_call,
};
use crate::scheduler::{SchedulerConfig, TaskStatus};
use crate::signals::{
    JobRun, SignalJobSpec, SignalJobStatus, SignalSchedulerConfig, TradingSignalScheduler,
};
use crate::tracking::{ProfitTracker, SweepReport, SweepRunner, TrackerConfig};
use alphapulse_domain::entities::{
    Order, OrderId, OrderIntent, RealtimeConfig, SymbolStatistics, TrackingSample,
};
use alphapulse_domain::enums::KlineInterval;
use alphapulse_domain::value_objects::JobId;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

/// Configuration for every engine component.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Lifecycle engine settings.
    pub lifecycle: LifecycleConfig,
    /// Profit tracker settings.
    pub tracker: TrackerConfig,
    /// Signal scheduler settings.
    pub signals: SignalSchedulerConfig,
    /// Timer settings shared by both schedulers.
    pub scheduler: SchedulerConfig,
}

/// Explicitly constructed engine owning both schedulers.
pub struct TradingEngine {
    lifecycle: Arc<OrderLifecycleEngine>,
    prices: Arc<dyn PriceSource>,
    tracker: ProfitTracker,
    signals: TradingSignalScheduler,
    config: EngineConfig,
}

impl TradingEngine {
    /// Wires the engine from its collaborators.
    pub fn new(
        store: Arc<dyn OrderStore>,
        prices: Arc<dyn PriceSource>,
        generator: Arc<dyn SignalGenerator>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> Self {
        let lifecycle = Arc::new(OrderLifecycleEngine::new(
            store,
            notifier,
            config.lifecycle.clone(),
        ));
        let runner = Arc::new(SweepRunner::new(
            Arc::clone(&lifecycle),
            Arc::clone(&prices),
            config.tracker.clone(),
        ));
        let tracker = ProfitTracker::new(runner, config.scheduler.clone());
        let signals = TradingSignalScheduler::new(
            Arc::clone(&lifecycle),
            generator,
            Arc::clone(&prices),
            config.signals.clone(),
            config.scheduler.clone(),
        );
        Self {
            lifecycle,
            prices,
            tracker,
            signals,
            config,
        }
    }

    /// Gets the lifecycle engine.
    pub fn lifecycle(&self) -> &Arc<OrderLifecycleEngine> {
        &self.lifecycle
    }

    /// Gets the profit tracker.
    pub fn tracker(&self) -> &ProfitTracker {
        &self.tracker
    }

    /// Gets the signal scheduler.
    pub fn signals(&self) -> &TradingSignalScheduler {
        &self.signals
    }

    fn store(&self) -> &Arc<dyn OrderStore> {
        self.lifecycle.store()
    }

    /// Starts profit tracking and signal jobs.
    pub async fn start(&self) {
        self.tracker.start().await;
        self.signals.start().await;
        info!("Trading engine started");
    }

    /// Stops both schedulers. Registrations are kept.
    pub fn stop(&self) {
        self.tracker.stop();
        self.signals.stop();
        info!("Trading engine stopped");
    }

    /// Whether either scheduler is running.
    pub fn is_running(&self) -> bool {
        self.tracker.is_running() || self.signals.is_running()
    }

    // Signal jobs

    /// Registers or replaces a signal job.
    pub async fn add_signal_job(&self, spec: SignalJobSpec) -> Result<JobId> {
        self.signals.add(spec).await
    }

    /// Removes a signal job.
    pub async fn remove_signal_job(&self, job_id: &JobId) -> Result<()> {
        self.signals.remove(job_id).await
    }

    /// Pauses a signal job.
    pub async fn pause_signal_job(&self, job_id: &JobId) -> Result<()> {
        self.signals.pause(job_id).await
    }

    /// Resumes a signal job.
    pub async fn resume_signal_job(&self, job_id: &JobId) -> Result<()> {
        self.signals.resume(job_id).await
    }

    /// Runs a signal job immediately.
    pub async fn run_signal_job_now(&self, job_id: &JobId) -> Result<JobRun> {
        self.signals.run_now(job_id).await
    }

    /// Status of all signal jobs.
    pub async fn signal_jobs(&self) -> Vec<SignalJobStatus> {
        self.signals.jobs().await
    }

    /// Status of the profit tracking timers.
    pub async fn tracker_status(&self) -> Vec<TaskStatus> {
        self.tracker.status().await
    }

    // Orders

    /// Opens an order from an operator-supplied intent.
    pub async fn open_order(&self, intent: OrderIntent) -> Result<Order> {
        self.lifecycle.create(intent).await
    }

    /// Looks an order up.
    pub async fn order(&self, order_id: OrderId) -> Result<Order> {
        store_call(self.config.lifecycle.call_timeout, self.store().get(order_id))
            .await?
            .ok_or_else(|| ExecutionError::not_found("order", order_id))
    }

    /// Lists orders.
    pub async fn orders(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
        Ok(store_call(
            self.config.lifecycle.call_timeout,
            self.store().list_orders(filter),
        )
        .await?)
    }

    /// Tracking history of an order, oldest first.
    pub async fn order_history(&self, order_id: OrderId) -> Result<Vec<TrackingSample>> {
        self.order(order_id).await?;
        Ok(store_call(
            self.config.lifecycle.call_timeout,
            self.store().list_samples(order_id),
        )
        .await?)
    }

    /// Win/loss statistics per symbol, most orders first.
    pub async fn statistics(&self, symbol: Option<&str>) -> Result<Vec<SymbolStatistics>> {
        Ok(store_call(
            self.config.lifecycle.call_timeout,
            self.store().statistics(symbol),
        )
        .await?)
    }

    /// Closes an order on operator request, at `price` or else at the
    /// current market price.
    ///
    /// # Errors
    /// [`ExecutionError::StateConflict`] when the order is not `OPEN`.
    pub async fn close_order(&self, order_id: OrderId, price: Option<Decimal>) -> Result<ClosedOrder> {
        let price = match price {
            Some(price) => price,
            None => {
                let order = self.order(order_id).await?;
                if !order.is_open() {
                    return Err(ExecutionError::StateConflict {
                        order_id,
                        status: order.status,
                    });
                }
                source_call(
                    self.config.tracker.call_timeout,
                    self.prices.current_price(&order.symbol),
                )
                .await?
            }
        };
        self.lifecycle.close_manually(order_id, price).await
    }

    /// Re-evaluates one open order against its current price.
    pub async fn recompute_order(&self, order_id: OrderId) -> Result<Tracked> {
        self.tracker.runner().recompute(order_id).await
    }

    /// Re-evaluates every open order against its current price.
    pub async fn recompute_open_orders(&self) -> Result<SweepReport> {
        self.tracker.runner().recompute_all().await
    }

    // Realtime tracking

    /// Opts an order into realtime tracking, keeping a previously chosen
    /// sub-interval or defaulting to 1m.
    pub async fn enable_realtime(&self, order_id: OrderId) -> Result<RealtimeConfig> {
        self.order(order_id).await?;
        let interval = self
            .realtime_config(order_id)
            .await?
            .map(|c| c.interval)
            .unwrap_or_default();
        self.save_realtime(RealtimeConfig {
            order_id,
            enabled: true,
            interval,
        })
        .await
    }

    /// Opts an order out of realtime tracking.
    ///
    /// # Errors
    /// [`ExecutionError::NotFound`] when the order was never configured.
    pub async fn disable_realtime(&self, order_id: OrderId) -> Result<RealtimeConfig> {
        let mut config = self
            .realtime_config(order_id)
            .await?
            .ok_or_else(|| ExecutionError::not_found("realtime config", order_id))?;
        config.enabled = false;
        self.save_realtime(config).await
    }

    /// Sets the realtime sub-interval of an order, enabling tracking when
    /// the order was not configured yet.
    pub async fn set_realtime_interval(
        &self,
        order_id: OrderId,
        interval: KlineInterval,
    ) -> Result<RealtimeConfig> {
        self.order(order_id).await?;
        let enabled = self
            .realtime_config(order_id)
            .await?
            .is_none_or(|c| c.enabled);
        self.save_realtime(RealtimeConfig {
            order_id,
            enabled,
            interval,
        })
        .await
    }

    async fn realtime_config(&self, order_id: OrderId) -> Result<Option<RealtimeConfig>> {
        Ok(store_call(
            self.config.lifecycle.call_timeout,
            self.store().realtime_config(order_id),
        )
        .await?)
    }

    async fn save_realtime(&self, config: RealtimeConfig) -> Result<RealtimeConfig> {
        store_call(
            self.config.lifecycle.call_timeout,
            self.store().upsert_realtime(config),
        )
        .await?;
        info!(
            order_id = %config.order_id,
            enabled = config.enabled,
            interval = %config.interval,
            "Realtime tracking updated"
        );
        Ok(config)
    }
}
