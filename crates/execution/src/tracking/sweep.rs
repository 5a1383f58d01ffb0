//! One sweep: one firing of one cadence over its due orders.

use crate::error::{ExecutionError, Result};
use crate::lifecycle::{OrderLifecycleEngine, Tracked, TransitionOutcome};
use crate::ports::{PriceSource, SourceError, source_call, store_call};
use alphapulse_domain::entities::{Order, OrderId};
use alphapulse_domain::enums::{KlineInterval, TrackingCadence};
use alphapulse_domain::value_objects::PriceWindow;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};
use uuid::Uuid;

/// Configuration for profit tracking.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Orders evaluated concurrently within one sweep.
    pub sweep_concurrency: usize,
    /// Deadline for each market data and store call.
    pub call_timeout: Duration,
    /// Klines aggregated into one window.
    pub lookback: u32,
    /// Cadences driven by timers.
    pub cadences: Vec<TrackingCadence>,
    /// Fire on wall-clock boundaries instead of relative to start.
    pub align_to_clock: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            sweep_concurrency: 8,
            call_timeout: Duration::from_secs(10),
            lookback: 1,
            cadences: TrackingCadence::SCHEDULED.to_vec(),
            align_to_clock: true,
        }
    }
}

/// How the price window of a due order is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sampling {
    Klines(KlineInterval),
    Ticker,
}

/// Summary of one sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Correlation id of the sweep.
    pub sweep_id: Uuid,
    /// Cadence that fired.
    pub cadence: TrackingCadence,
    /// Orders selected for the sweep.
    pub due: usize,
    /// Orders evaluated against a price window.
    pub evaluated: usize,
    /// Orders moved out of `OPEN` by this sweep.
    pub transitioned: usize,
    /// Terminal evaluations that lost to another cadence.
    pub already_closed: usize,
    /// Orders skipped because market data was unavailable.
    pub skipped: usize,
    /// Orders whose evaluation failed after the window was fetched.
    pub failed: usize,
    /// The sweep did not run because the same cadence was still in flight.
    pub overlapped: bool,
}

impl SweepReport {
    fn new(sweep_id: Uuid, cadence: TrackingCadence) -> Self {
        Self {
            sweep_id,
            cadence,
            due: 0,
            evaluated: 0,
            transitioned: 0,
            already_closed: 0,
            skipped: 0,
            failed: 0,
            overlapped: false,
        }
    }
}

enum OrderResult {
    Tracked(Tracked),
    Skipped,
    Failed,
}

/// Marks a cadence as in flight until dropped.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<TrackingCadence>>,
    cadence: TrackingCadence,
}

impl<'a> InFlight<'a> {
    fn acquire(set: &'a Mutex<HashSet<TrackingCadence>>, cadence: TrackingCadence) -> Option<Self> {
        let mut guard = set.lock().ok()?;
        guard.insert(cadence).then(|| Self { set, cadence })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.set.lock() {
            guard.remove(&self.cadence);
        }
    }
}

/// Runs sweeps and manual recomputes.
pub struct SweepRunner {
    engine: Arc<OrderLifecycleEngine>,
    prices: Arc<dyn PriceSource>,
    config: TrackerConfig,
    in_flight: Mutex<HashSet<TrackingCadence>>,
}

impl SweepRunner {
    /// Creates a new sweep runner.
    pub fn new(
        engine: Arc<OrderLifecycleEngine>,
        prices: Arc<dyn PriceSource>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            engine,
            prices,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Gets the configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Runs one sweep of `cadence` over its due orders.
    ///
    /// Per-order failures are logged and counted, never propagated. A sweep
    /// of a cadence that is still running is skipped.
    ///
    /// # Errors
    /// Fails only when the open orders cannot be listed.
    pub async fn run(&self, cadence: TrackingCadence) -> Result<SweepReport> {
        let sweep_id = Uuid::new_v4();
        let Some(_in_flight) = InFlight::acquire(&self.in_flight, cadence) else {
            warn!(cadence = %cadence, "Previous sweep still running, skipping");
            let mut report = SweepReport::new(sweep_id, cadence);
            report.overlapped = true;
            return Ok(report);
        };

        let span = info_span!("sweep", sweep_id = %sweep_id, cadence = %cadence);
        async {
            let due = self.select_due(cadence).await?;
            Ok::<_, ExecutionError>(self.run_due(sweep_id, cadence, due).await)
        }
        .instrument(span)
        .await
    }

    /// Re-evaluates every open order against its current price.
    pub async fn recompute_all(&self) -> Result<SweepReport> {
        self.run(TrackingCadence::Manual).await
    }

    /// Re-evaluates one order against its current price.
    ///
    /// # Errors
    /// [`ExecutionError::NotFound`] for unknown orders,
    /// [`ExecutionError::StateConflict`] when the order is not `OPEN` and
    /// [`ExecutionError::TransientFetch`] when no price is available.
    pub async fn recompute(&self, order_id: OrderId) -> Result<Tracked> {
        let order = store_call(self.config.call_timeout, self.engine.store().get(order_id))
            .await?
            .ok_or_else(|| ExecutionError::not_found("order", order_id))?;
        if !order.is_open() {
            return Err(ExecutionError::StateConflict {
                order_id,
                status: order.status,
            });
        }

        let window = fetch_window(
            self.prices.as_ref(),
            &order.symbol,
            Sampling::Ticker,
            self.config.call_timeout,
            self.config.lookback,
        )
        .await?;
        self.engine
            .track(&order, &window, TrackingCadence::Manual)
            .await
    }

    async fn select_due(&self, cadence: TrackingCadence) -> Result<Vec<(Order, Sampling)>> {
        let timeout = self.config.call_timeout;
        let store = self.engine.store();

        let mut seen = HashSet::new();
        let open: Vec<Order> = store_call(timeout, store.list_open())
            .await
            .inspect_err(|e| error!(error = %e, "Failed to list open orders"))?
            .into_iter()
            .filter(|o| seen.insert(o.id))
            .collect();

        let due = match (cadence, cadence.kline_interval()) {
            (TrackingCadence::Realtime, _) => {
                let enabled = store_call(timeout, store.list_realtime_enabled())
                    .await
                    .inspect_err(|e| error!(error = %e, "Failed to list realtime configs"))?;
                open.into_iter()
                    .filter_map(|o| {
                        let interval = *enabled.get(&o.id)?;
                        Some((o, Sampling::Klines(interval)))
                    })
                    .collect()
            }
            (_, Some(interval)) => open
                .into_iter()
                .map(|o| (o, Sampling::Klines(interval)))
                .collect(),
            (_, None) => open.into_iter().map(|o| (o, Sampling::Ticker)).collect(),
        };
        Ok(due)
    }

    async fn run_due(
        &self,
        sweep_id: Uuid,
        cadence: TrackingCadence,
        due: Vec<(Order, Sampling)>,
    ) -> SweepReport {
        let started = Instant::now();
        let mut report = SweepReport::new(sweep_id, cadence);
        report.due = due.len();
        info!(due = report.due, "Sweep started");

        let permits = Arc::new(Semaphore::new(self.config.sweep_concurrency.max(1)));
        let mut set = JoinSet::new();
        for (order, sampling) in due {
            let engine = Arc::clone(&self.engine);
            let prices = Arc::clone(&self.prices);
            let permits = Arc::clone(&permits);
            let timeout = self.config.call_timeout;
            let lookback = self.config.lookback;
            set.spawn(
                async move {
                    let Ok(_permit) = permits.acquire_owned().await else {
                        return OrderResult::Failed;
                    };
                    track_one(&engine, prices.as_ref(), order, sampling, cadence, timeout, lookback)
                        .await
                }
                .instrument(Span::current()),
            );
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(OrderResult::Tracked(tracked)) => {
                    report.evaluated += 1;
                    match tracked.outcome {
                        TransitionOutcome::Transitioned(_) => report.transitioned += 1,
                        TransitionOutcome::AlreadyClosed => report.already_closed += 1,
                        TransitionOutcome::NotTriggered => {}
                    }
                }
                Ok(OrderResult::Skipped) => report.skipped += 1,
                Ok(OrderResult::Failed) => report.failed += 1,
                Err(e) => {
                    error!(error = %e, "Order evaluation task aborted");
                    report.failed += 1;
                }
            }
        }

        info!(
            evaluated = report.evaluated,
            transitioned = report.transitioned,
            already_closed = report.already_closed,
            skipped = report.skipped,
            failed = report.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Sweep finished"
        );
        report
    }
}

async fn fetch_window(
    prices: &dyn PriceSource,
    symbol: &str,
    sampling: Sampling,
    timeout: Duration,
    lookback: u32,
) -> std::result::Result<PriceWindow, SourceError> {
    match sampling {
        Sampling::Klines(interval) => {
            source_call(timeout, prices.range(symbol, interval, lookback)).await
        }
        Sampling::Ticker => {
            let price = source_call(timeout, prices.current_price(symbol)).await?;
            PriceWindow::at(price).map_err(|e| SourceError::InvalidResponse(e.to_string()))
        }
    }
}

async fn track_one(
    engine: &OrderLifecycleEngine,
    prices: &dyn PriceSource,
    order: Order,
    sampling: Sampling,
    cadence: TrackingCadence,
    timeout: Duration,
    lookback: u32,
) -> OrderResult {
    let window = match fetch_window(prices, &order.symbol, sampling, timeout, lookback).await {
        Ok(window) => window,
        Err(e) => {
            warn!(
                order_id = %order.id,
                symbol = %order.symbol,
                error = %e,
                "Skipping order, market data unavailable"
            );
            return OrderResult::Skipped;
        }
    };

    match engine.track(&order, &window, cadence).await {
        Ok(tracked) => {
            debug!(
                order_id = %order.id,
                symbol = %order.symbol,
                trigger = %tracked.evaluation.trigger,
                profit = %tracked.evaluation.profit_percentage,
                "Order evaluated"
            );
            OrderResult::Tracked(tracked)
        }
        Err(e) => {
            warn!(order_id = %order.id, error = %e, "Order evaluation failed");
            OrderResult::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecycleConfig;
    use crate::ports::{InMemoryOrderStore, OrderStore};
    use crate::testing::{FakePriceSource, RecordingNotifier, buy_intent, window};
    use alphapulse_domain::entities::RealtimeConfig;
    use alphapulse_domain::enums::OrderStatus;
    use rust_decimal_macros::dec;

    struct Fixture {
        store: Arc<InMemoryOrderStore>,
        prices: Arc<FakePriceSource>,
        notifier: Arc<RecordingNotifier>,
        engine: Arc<OrderLifecycleEngine>,
        runner: SweepRunner,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryOrderStore::new());
        let prices = Arc::new(FakePriceSource::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = Arc::new(OrderLifecycleEngine::new(
            store.clone(),
            notifier.clone(),
            LifecycleConfig::default(),
        ));
        let runner = SweepRunner::new(engine.clone(), prices.clone(), TrackerConfig::default());
        Fixture {
            store,
            prices,
            notifier,
            engine,
            runner,
        }
    }

    #[tokio::test]
    async fn test_fixed_cadence_uses_its_own_interval() {
        let f = fixture();
        f.engine.create(buy_intent("BTCUSDT")).await.unwrap();
        f.prices
            .set_window("BTCUSDT", window(dec!(98), dec!(103), dec!(101)));

        let report = f.runner.run(TrackingCadence::FourHours).await.unwrap();
        assert_eq!(report.due, 1);
        assert_eq!(report.evaluated, 1);
        assert_eq!(
            f.prices.range_calls(),
            vec![("BTCUSDT".to_string(), KlineInterval::H4)]
        );
    }

    #[tokio::test]
    async fn test_realtime_only_includes_opted_in_orders() {
        let f = fixture();
        let tracked = f.engine.create(buy_intent("BTCUSDT")).await.unwrap();
        f.engine.create(buy_intent("ETHUSDT")).await.unwrap();
        f.store
            .upsert_realtime(RealtimeConfig {
                order_id: tracked.id,
                enabled: true,
                interval: KlineInterval::M5,
            })
            .await
            .unwrap();
        f.prices
            .set_window("BTCUSDT", window(dec!(98), dec!(103), dec!(101)));
        f.prices
            .set_window("ETHUSDT", window(dec!(98), dec!(103), dec!(101)));

        let report = f.runner.run(TrackingCadence::Realtime).await.unwrap();
        assert_eq!(report.due, 1);
        assert_eq!(
            f.prices.range_calls(),
            vec![("BTCUSDT".to_string(), KlineInterval::M5)]
        );
    }

    #[tokio::test]
    async fn test_failed_fetch_is_isolated() {
        let f = fixture();
        for symbol in ["BTCUSDT", "ETHUSDT", "SOLUSDT"] {
            f.engine.create(buy_intent(symbol)).await.unwrap();
        }
        f.prices
            .set_window("BTCUSDT", window(dec!(98), dec!(103), dec!(101)));
        f.prices
            .set_window("SOLUSDT", window(dec!(90), dec!(99), dec!(92)));
        f.prices.set_failing("ETHUSDT");

        let report = f.runner.run(TrackingCadence::OneHour).await.unwrap();
        assert_eq!(report.due, 3);
        assert_eq!(report.evaluated, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.transitioned, 1);
        assert_eq!(f.notifier.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_fetch_times_out() {
        let f = fixture();
        f.engine.create(buy_intent("BTCUSDT")).await.unwrap();
        f.engine.create(buy_intent("ETHUSDT")).await.unwrap();
        f.prices
            .set_window("BTCUSDT", window(dec!(98), dec!(103), dec!(101)));
        f.prices.set_hanging("ETHUSDT");

        let report = f.runner.run(TrackingCadence::ThirtyMinutes).await.unwrap();
        assert_eq!(report.evaluated, 1);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_recompute_uses_ticker_and_manual_cadence() {
        let f = fixture();
        let order = f.engine.create(buy_intent("BTCUSDT")).await.unwrap();
        f.prices
            .set_window("BTCUSDT", window(dec!(121), dec!(121), dec!(121)));

        let tracked = f.runner.recompute(order.id).await.unwrap();
        assert!(tracked.outcome.is_transitioned());
        assert!(f.prices.range_calls().is_empty());

        let samples = f.store.list_samples(order.id).await.unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].cadence, TrackingCadence::Manual);
        let stored = f.store.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::TakeProfitT3);

        let err = f.runner.recompute(order.id).await.unwrap_err();
        assert!(matches!(err, ExecutionError::StateConflict { .. }));
        let err = f.runner.recompute(OrderId(404)).await.unwrap_err();
        assert!(matches!(err, ExecutionError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_recompute_all_reports_each_order() {
        let f = fixture();
        f.engine.create(buy_intent("BTCUSDT")).await.unwrap();
        f.engine.create(buy_intent("ETHUSDT")).await.unwrap();
        f.prices
            .set_window("BTCUSDT", window(dec!(102), dec!(102), dec!(102)));
        f.prices.set_failing("ETHUSDT");

        let report = f.runner.recompute_all().await.unwrap();
        assert_eq!(report.cadence, TrackingCadence::Manual);
        assert_eq!(report.evaluated, 1);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_overlapping_sweep_of_same_cadence_is_skipped() {
        let f = fixture();
        let _held = InFlight::acquire(&f.runner.in_flight, TrackingCadence::OneHour).unwrap();

        let report = f.runner.run(TrackingCadence::OneHour).await.unwrap();
        assert!(report.overlapped);

        let other = f.runner.run(TrackingCadence::TwoHours).await.unwrap();
        assert!(!other.overlapped);
    }
}
