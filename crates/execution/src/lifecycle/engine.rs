//! Order lifecycle engine.

use super::{CloseReason, ClosedOrder, Tracked, TransitionOutcome};
use crate::alerts::{notify_best_effort, transition_message};
use crate::error::{ExecutionError, Result};
use crate::ports::{Notifier, OrderStore, StatusUpdate, StoreError, store_call};
use crate::trigger::{Evaluation, Trigger, evaluate};
use alphapulse_domain::entities::{Order, OrderId, OrderIntent, TrackingSample};
use alphapulse_domain::enums::TrackingCadence;
use alphapulse_domain::value_objects::PriceWindow;
use chrono::{SubsecRound, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Configuration for the lifecycle engine.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Attempts for a status write before giving up.
    pub persist_attempts: u32,
    /// Base delay between status write attempts, multiplied by the attempt.
    pub retry_backoff: Duration,
    /// Deadline for each store call.
    pub call_timeout: Duration,
    /// Deadline for alert delivery.
    pub notify_timeout: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            persist_attempts: 3,
            retry_backoff: Duration::from_millis(250),
            call_timeout: Duration::from_secs(10),
            notify_timeout: Duration::from_secs(10),
        }
    }
}

/// Single authoritative writer of order status.
///
/// Orders go from `OPEN` to exactly one terminal status. The transition is
/// a conditional store write, so concurrent cadences evaluating the same
/// order produce one winner; every other caller observes
/// [`TransitionOutcome::AlreadyClosed`].
pub struct OrderLifecycleEngine {
    store: Arc<dyn OrderStore>,
    notifier: Arc<dyn Notifier>,
    config: LifecycleConfig,
}

impl OrderLifecycleEngine {
    /// Creates a new lifecycle engine.
    pub fn new(
        store: Arc<dyn OrderStore>,
        notifier: Arc<dyn Notifier>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Gets the underlying store.
    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.store
    }

    /// Gets the notifier.
    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Gets the configuration.
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Opens an order.
    ///
    /// # Errors
    /// [`ExecutionError::Validation`] when the intent is incomplete, its
    /// prices are inconsistent or its risk level is excluded from
    /// automatic opening.
    pub async fn create(&self, intent: OrderIntent) -> Result<Order> {
        let new = intent.validate()?;
        let order = store_call(self.config.call_timeout, self.store.insert(new)).await?;

        info!(
            order_id = %order.id,
            symbol = %order.symbol,
            direction = %order.direction,
            risk = %order.risk_level,
            entry = %order.entry_price,
            "Order opened"
        );

        Ok(order)
    }

    /// Appends a tracking sample. Never changes order status.
    pub async fn record_sample(&self, sample: &TrackingSample) -> Result<()> {
        store_call(self.config.call_timeout, self.store.append_sample(sample)).await?;
        debug!(
            order_id = %sample.order_id,
            cadence = %sample.cadence,
            price = %sample.price,
            profit = %sample.profit_percentage,
            "Sample recorded"
        );
        Ok(())
    }

    /// Moves an `OPEN` order to the status implied by a terminal evaluation.
    ///
    /// Idempotent: a second call for the same order returns
    /// [`TransitionOutcome::AlreadyClosed`] without writing or notifying.
    ///
    /// # Errors
    /// [`ExecutionError::Persistence`] when the status write keeps failing.
    pub async fn apply_trigger(
        &self,
        order: &Order,
        evaluation: &Evaluation,
    ) -> Result<TransitionOutcome> {
        let Some(reason) = CloseReason::from_trigger(evaluation.trigger) else {
            return Ok(TransitionOutcome::NotTriggered);
        };
        if !order.is_open() {
            return Ok(TransitionOutcome::AlreadyClosed);
        }

        let closed = self
            .transition(order, reason, evaluation.price, evaluation.profit_percentage)
            .await?;

        Ok(match closed {
            Some(closed) => TransitionOutcome::Transitioned(closed),
            None => {
                debug!(order_id = %order.id, trigger = %evaluation.trigger, "Order already closed");
                TransitionOutcome::AlreadyClosed
            }
        })
    }

    /// Evaluates an order against a window and applies the result.
    ///
    /// A terminal evaluation records its sample only when this call won
    /// the transition, so each transition leaves exactly one sample with
    /// trigger flags. Non-terminal evaluations always record a sample.
    pub async fn track(
        &self,
        order: &Order,
        window: &PriceWindow,
        cadence: TrackingCadence,
    ) -> Result<Tracked> {
        let evaluation = evaluate(order, window);
        let sample = evaluation.sample(order.id, cadence, Utc::now());

        let outcome = self.apply_trigger(order, &evaluation).await?;
        let sample_recorded = match &outcome {
            TransitionOutcome::NotTriggered => {
                self.record_sample(&sample).await?;
                true
            }
            TransitionOutcome::Transitioned(_) => self.record_transition_sample(&sample).await,
            TransitionOutcome::AlreadyClosed => false,
        };

        Ok(Tracked {
            order_id: order.id,
            evaluation,
            outcome,
            sample_recorded,
        })
    }

    /// Closes an order on operator request.
    ///
    /// # Errors
    /// [`ExecutionError::NotFound`] for unknown orders and
    /// [`ExecutionError::StateConflict`] when the order is not `OPEN`.
    pub async fn close_manually(&self, order_id: OrderId, price: Decimal) -> Result<ClosedOrder> {
        if price <= Decimal::ZERO {
            return Err(ExecutionError::Validation(format!(
                "close price must be positive, got {price}"
            )));
        }
        let order = self.load(order_id).await?;
        if !order.is_open() {
            return Err(ExecutionError::StateConflict {
                order_id,
                status: order.status,
            });
        }

        let profit = order.profit_percentage(price);
        match self
            .transition(&order, CloseReason::Manual, price, profit)
            .await?
        {
            Some(closed) => {
                let sample = Evaluation {
                    trigger: Trigger::None,
                    price,
                    profit_percentage: profit,
                }
                .sample(order_id, TrackingCadence::Manual, closed.closed_at);
                self.record_transition_sample(&sample).await;
                Ok(closed)
            }
            None => {
                let current = self.load(order_id).await?;
                Err(ExecutionError::StateConflict {
                    order_id,
                    status: current.status,
                })
            }
        }
    }

    async fn load(&self, order_id: OrderId) -> Result<Order> {
        store_call(self.config.call_timeout, self.store.get(order_id))
            .await?
            .ok_or_else(|| ExecutionError::not_found("order", order_id))
    }

    /// Writes the transition and notifies when this caller won it.
    async fn transition(
        &self,
        order: &Order,
        reason: CloseReason,
        price: Decimal,
        profit: Decimal,
    ) -> Result<Option<ClosedOrder>> {
        let update = StatusUpdate {
            status: reason.status(),
            closed_price: price,
            closed_profit: profit,
            // Microseconds, so the value survives a database round trip.
            closed_at: Utc::now().trunc_subsecs(6),
        };
        if !self.persist_transition(order.id, update).await? {
            return Ok(None);
        }

        let closed = ClosedOrder {
            order_id: order.id,
            symbol: order.symbol.clone(),
            direction: order.direction,
            entry_price: order.entry_price,
            status: update.status,
            reason,
            closed_price: price,
            profit_percentage: profit,
            closed_at: update.closed_at,
        };

        info!(
            order_id = %closed.order_id,
            symbol = %closed.symbol,
            status = %closed.status,
            price = %closed.closed_price,
            profit = %closed.profit_percentage,
            "Order closed"
        );

        notify_best_effort(
            self.notifier.as_ref(),
            &transition_message(&closed),
            self.config.notify_timeout,
        )
        .await;

        Ok(Some(closed))
    }

    async fn persist_transition(&self, order_id: OrderId, update: StatusUpdate) -> Result<bool> {
        let attempts = self.config.persist_attempts.max(1);
        let mut last_error = String::new();
        let mut failed = false;

        for attempt in 1..=attempts {
            match store_call(
                self.config.call_timeout,
                self.store.update_status(order_id, update),
            )
            .await
            {
                Ok(true) => return Ok(true),
                // A failed attempt may still have committed.
                Ok(false) if failed => return self.committed_earlier(order_id, update).await,
                Ok(false) => return Ok(false),
                Err(StoreError::OrderNotFound(id)) => {
                    return Err(ExecutionError::not_found("order", id));
                }
                Err(StoreError::Backend(e)) => {
                    warn!(
                        order_id = %order_id,
                        status = %update.status,
                        attempt,
                        attempts,
                        error = %e,
                        "Status write failed"
                    );
                    last_error = e;
                    failed = true;
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.retry_backoff * attempt).await;
            }
        }

        error!(
            order_id = %order_id,
            status = %update.status,
            price = %update.closed_price,
            error = %last_error,
            "Order transition lost after retries"
        );
        Err(ExecutionError::Persistence(format!(
            "order {order_id} -> {}: {last_error}",
            update.status
        )))
    }

    /// True when the stored terminal fields are the ones `update` wrote.
    async fn committed_earlier(&self, order_id: OrderId, update: StatusUpdate) -> Result<bool> {
        let stored = self.load(order_id).await?;
        let ours = stored.status == update.status
            && stored.closed_at == Some(update.closed_at)
            && stored.closed_price == Some(update.closed_price);
        if ours {
            info!(order_id = %order_id, status = %update.status, "Status write committed before failing");
        }
        Ok(ours)
    }

    /// Appends the sample of a won transition, retrying like status writes.
    ///
    /// Returns whether the sample was stored. A sample that is still missing
    /// after the last attempt is logged and dropped; the transition stands.
    async fn record_transition_sample(&self, sample: &TrackingSample) -> bool {
        let attempts = self.config.persist_attempts.max(1);

        for attempt in 1..=attempts {
            match self.record_sample(sample).await {
                Ok(()) => return true,
                Err(e) => {
                    warn!(
                        order_id = %sample.order_id,
                        attempt,
                        attempts,
                        error = %e,
                        "Transition sample write failed"
                    );
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.retry_backoff * attempt).await;
            }
        }

        error!(
            order_id = %sample.order_id,
            cadence = %sample.cadence,
            price = %sample.price,
            "Transition sample lost after retries"
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FlakyStore, RecordingNotifier, buy_intent, window};
    use crate::ports::InMemoryOrderStore;
    use alphapulse_domain::enums::{OrderStatus, RiskLevel, TargetLevel};
    use rust_decimal_macros::dec;

    fn engine_with(store: Arc<dyn OrderStore>) -> (OrderLifecycleEngine, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = OrderLifecycleEngine::new(store, notifier.clone(), LifecycleConfig::default());
        (engine, notifier)
    }

    #[tokio::test]
    async fn test_create_rejects_high_risk() {
        let (engine, _) = engine_with(Arc::new(InMemoryOrderStore::new()));
        let mut intent = buy_intent("BTCUSDT");
        intent.risk_level = Some(RiskLevel::High);

        let err = engine.create(intent).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Validation(_)));
        assert!(engine.store().list_open().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_apply_trigger_transitions_once() {
        let (engine, notifier) = engine_with(Arc::new(InMemoryOrderStore::new()));
        let order = engine.create(buy_intent("BTCUSDT")).await.unwrap();
        let evaluation = evaluate(&order, &window(dec!(94), dec!(121), dec!(100)));

        let first = engine.apply_trigger(&order, &evaluation).await.unwrap();
        let second = engine.apply_trigger(&order, &evaluation).await.unwrap();

        match first {
            TransitionOutcome::Transitioned(closed) => {
                assert_eq!(closed.status, OrderStatus::StopLoss);
                assert_eq!(closed.closed_price, dec!(100));
            }
            other => panic!("expected transition, got {other:?}"),
        }
        assert_eq!(second, TransitionOutcome::AlreadyClosed);
        assert_eq!(notifier.count(), 1);

        let stored = engine.store().get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::StopLoss);
        assert_eq!(stored.closed_price, Some(dec!(100)));
    }

    #[tokio::test]
    async fn test_track_records_one_flagged_sample_per_transition() {
        let store = Arc::new(InMemoryOrderStore::new());
        let (engine, notifier) = engine_with(store.clone());
        let order = engine.create(buy_intent("BTCUSDT")).await.unwrap();
        let w = window(dec!(101), dec!(115), dec!(112));

        let first = engine.track(&order, &w, TrackingCadence::Realtime).await.unwrap();
        let second = engine.track(&order, &w, TrackingCadence::OneHour).await.unwrap();

        assert!(first.outcome.is_transitioned());
        assert!(first.sample_recorded);
        assert_eq!(second.outcome, TransitionOutcome::AlreadyClosed);
        assert!(!second.sample_recorded);

        let samples = store.list_samples(order.id).await.unwrap();
        assert_eq!(samples.len(), 1);
        assert!(samples[0].take_profit_triggered);
        assert_eq!(samples[0].triggered_target, Some(TargetLevel::T2));
        assert_eq!(notifier.count(), 1);
    }

    #[tokio::test]
    async fn test_quiet_window_only_records_sample() {
        let store = Arc::new(InMemoryOrderStore::new());
        let (engine, notifier) = engine_with(store.clone());
        let order = engine.create(buy_intent("BTCUSDT")).await.unwrap();

        let tracked = engine
            .track(&order, &window(dec!(98), dec!(103), dec!(101)), TrackingCadence::ThirtyMinutes)
            .await
            .unwrap();

        assert_eq!(tracked.outcome, TransitionOutcome::NotTriggered);
        assert_eq!(store.sample_count(order.id).await, 1);
        assert_eq!(notifier.count(), 0);
        assert!(store.get(order.id).await.unwrap().unwrap().is_open());
    }

    #[tokio::test]
    async fn test_close_manually() {
        let store = Arc::new(InMemoryOrderStore::new());
        let (engine, notifier) = engine_with(store.clone());
        let order = engine.create(buy_intent("BTCUSDT")).await.unwrap();

        let closed = engine.close_manually(order.id, dec!(103)).await.unwrap();
        assert_eq!(closed.status, OrderStatus::Closed);
        assert_eq!(closed.profit_percentage, dec!(3));
        assert_eq!(notifier.count(), 1);
        assert_eq!(store.sample_count(order.id).await, 1);

        let err = engine.close_manually(order.id, dec!(104)).await.unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::StateConflict { status: OrderStatus::Closed, .. }
        ));

        let err = engine.close_manually(OrderId(999), dec!(1)).await.unwrap_err();
        assert!(matches!(err, ExecutionError::NotFound { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_write_is_retried() {
        let store = Arc::new(FlakyStore::failing_updates(2));
        let (engine, notifier) = engine_with(store.clone());
        let order = engine.create(buy_intent("BTCUSDT")).await.unwrap();
        let evaluation = evaluate(&order, &window(dec!(90), dec!(99), dec!(91)));

        let outcome = engine.apply_trigger(&order, &evaluation).await.unwrap();
        assert!(outcome.is_transitioned());
        assert_eq!(store.update_attempts(), 3);
        assert_eq!(notifier.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_write_failure_is_surfaced() {
        let store = Arc::new(FlakyStore::failing_updates(10));
        let (engine, notifier) = engine_with(store.clone());
        let order = engine.create(buy_intent("BTCUSDT")).await.unwrap();
        let evaluation = evaluate(&order, &window(dec!(90), dec!(99), dec!(91)));

        let err = engine.apply_trigger(&order, &evaluation).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Persistence(_)));
        assert_eq!(store.update_attempts(), 3);
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_write_committed_before_timeout_still_wins() {
        let store = Arc::new(FlakyStore::slow_commits(1));
        let (engine, notifier) = engine_with(store.clone());
        let order = engine.create(buy_intent("BTCUSDT")).await.unwrap();

        let tracked = engine
            .track(&order, &window(dec!(90), dec!(99), dec!(91)), TrackingCadence::OneHour)
            .await
            .unwrap();

        match tracked.outcome {
            TransitionOutcome::Transitioned(closed) => {
                assert_eq!(closed.status, OrderStatus::StopLoss);
            }
            other => panic!("expected transition, got {other:?}"),
        }
        assert!(tracked.sample_recorded);
        assert_eq!(store.update_attempts(), 2);
        assert_eq!(notifier.count(), 1);

        let samples = store.list_samples(order.id).await.unwrap();
        assert_eq!(samples.len(), 1);
        assert!(samples[0].stop_loss_triggered);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transition_sample_is_retried() {
        let store = Arc::new(FlakyStore::failing_appends(2));
        let (engine, notifier) = engine_with(store.clone());
        let order = engine.create(buy_intent("BTCUSDT")).await.unwrap();

        let tracked = engine
            .track(&order, &window(dec!(90), dec!(99), dec!(91)), TrackingCadence::FourHours)
            .await
            .unwrap();

        assert!(tracked.outcome.is_transitioned());
        assert!(tracked.sample_recorded);
        assert_eq!(store.append_attempts(), 3);
        assert_eq!(store.inner().sample_count(order.id).await, 1);
        assert_eq!(notifier.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_transition_sample_keeps_the_transition() {
        let store = Arc::new(FlakyStore::failing_appends(10));
        let (engine, _) = engine_with(store.clone());
        let order = engine.create(buy_intent("BTCUSDT")).await.unwrap();

        let tracked = engine
            .track(&order, &window(dec!(90), dec!(99), dec!(91)), TrackingCadence::FourHours)
            .await
            .unwrap();

        assert!(tracked.outcome.is_transitioned());
        assert!(!tracked.sample_recorded);
        assert_eq!(store.append_attempts(), 3);
        let stored = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::StopLoss);
    }
}
