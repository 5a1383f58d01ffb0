//! Fakes shared by unit tests.

use crate::ports::{
    InMemoryOrderStore, Notifier, NotifyError, OrderFilter, OrderStore, PriceSource,
    SignalGenerator, SourceError, StatusUpdate, StoreError,
};
use alphapulse_domain::entities::{
    NewOrder, Order, OrderId, OrderIntent, RealtimeConfig, SignalParams, SymbolStatistics,
    TakeProfitTargets, TrackingSample, TradingSignal,
};
use alphapulse_domain::enums::{KlineInterval, Recommendation, RiskLevel};
use alphapulse_domain::value_objects::PriceWindow;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// BUY at 100, stop 95, targets 105 / 110 / 120.
pub fn buy_intent(symbol: &str) -> OrderIntent {
    OrderIntent {
        symbol: symbol.to_string(),
        recommendation: Some(Recommendation::Buy),
        risk_level: Some(RiskLevel::Low),
        entry_price: Some(dec!(100)),
        stop_loss: Some(dec!(95)),
        targets: TakeProfitTargets::new(Some(dec!(105)), Some(dec!(110)), Some(dec!(120))),
        ..Default::default()
    }
}

pub fn window(low: Decimal, high: Decimal, close: Decimal) -> PriceWindow {
    PriceWindow::new(low, high, close).unwrap()
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// In-memory store with scripted write failures.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryOrderStore,
    failures_left: AtomicUsize,
    slow_commits_left: AtomicUsize,
    append_failures_left: AtomicUsize,
    attempts: AtomicUsize,
    append_attempts: AtomicUsize,
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl FlakyStore {
    /// The first `n` status writes fail without committing.
    pub fn failing_updates(n: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(n),
            ..Self::default()
        }
    }

    /// The first `n` status writes commit, then hang past any deadline.
    pub fn slow_commits(n: usize) -> Self {
        Self {
            slow_commits_left: AtomicUsize::new(n),
            ..Self::default()
        }
    }

    /// The first `n` sample appends fail.
    pub fn failing_appends(n: usize) -> Self {
        Self {
            append_failures_left: AtomicUsize::new(n),
            ..Self::default()
        }
    }

    pub fn update_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn append_attempts(&self) -> usize {
        self.append_attempts.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &InMemoryOrderStore {
        &self.inner
    }
}

#[async_trait]
impl OrderStore for FlakyStore {
    async fn insert(&self, order: NewOrder) -> Result<Order, StoreError> {
        self.inner.insert(order).await
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.inner.get(id).await
    }

    async fn list_open(&self) -> Result<Vec<Order>, StoreError> {
        self.inner.list_open().await
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        self.inner.list_orders(filter).await
    }

    async fn update_status(&self, id: OrderId, update: StatusUpdate) -> Result<bool, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.failures_left) {
            return Err(StoreError::Backend("connection reset".into()));
        }
        if take_one(&self.slow_commits_left) {
            let committed = self.inner.update_status(id, update).await;
            tokio::time::sleep(Duration::from_secs(3600)).await;
            return committed;
        }
        self.inner.update_status(id, update).await
    }

    async fn append_sample(&self, sample: &TrackingSample) -> Result<(), StoreError> {
        self.append_attempts.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.append_failures_left) {
            return Err(StoreError::Backend("connection reset".into()));
        }
        self.inner.append_sample(sample).await
    }

    async fn list_samples(&self, id: OrderId) -> Result<Vec<TrackingSample>, StoreError> {
        self.inner.list_samples(id).await
    }

    async fn list_realtime_enabled(&self) -> Result<HashMap<OrderId, KlineInterval>, StoreError> {
        self.inner.list_realtime_enabled().await
    }

    async fn realtime_config(&self, id: OrderId) -> Result<Option<RealtimeConfig>, StoreError> {
        self.inner.realtime_config(id).await
    }

    async fn upsert_realtime(&self, config: RealtimeConfig) -> Result<(), StoreError> {
        self.inner.upsert_realtime(config).await
    }

    async fn statistics(&self, symbol: Option<&str>) -> Result<Vec<SymbolStatistics>, StoreError> {
        self.inner.statistics(symbol).await
    }
}

enum PriceBehavior {
    Window(PriceWindow),
    Fail,
    Hang,
}

/// Scripted market data keyed by symbol.
#[derive(Default)]
pub struct FakePriceSource {
    symbols: Mutex<HashMap<String, PriceBehavior>>,
    range_calls: Mutex<Vec<(String, KlineInterval)>>,
}

impl FakePriceSource {
    pub fn set_window(&self, symbol: &str, window: PriceWindow) {
        self.symbols
            .lock()
            .unwrap()
            .insert(symbol.to_string(), PriceBehavior::Window(window));
    }

    pub fn set_failing(&self, symbol: &str) {
        self.symbols
            .lock()
            .unwrap()
            .insert(symbol.to_string(), PriceBehavior::Fail);
    }

    pub fn set_hanging(&self, symbol: &str) {
        self.symbols
            .lock()
            .unwrap()
            .insert(symbol.to_string(), PriceBehavior::Hang);
    }

    pub fn range_calls(&self) -> Vec<(String, KlineInterval)> {
        self.range_calls.lock().unwrap().clone()
    }

    async fn lookup(&self, symbol: &str) -> Result<PriceWindow, SourceError> {
        let scripted = match self.symbols.lock().unwrap().get(symbol) {
            Some(PriceBehavior::Window(w)) => Some(Some(*w)),
            Some(PriceBehavior::Hang) => None,
            Some(PriceBehavior::Fail) | None => Some(None),
        };
        match scripted {
            Some(Some(w)) => Ok(w),
            Some(None) => Err(SourceError::Unavailable(format!(
                "no market data for {symbol}"
            ))),
            None => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(SourceError::Unavailable(format!("{symbol} hung")))
            }
        }
    }
}

#[async_trait]
impl PriceSource for FakePriceSource {
    async fn current_price(&self, symbol: &str) -> Result<Decimal, SourceError> {
        self.lookup(symbol).await.map(|w| w.close)
    }

    async fn range(
        &self,
        symbol: &str,
        interval: KlineInterval,
        _lookback: u32,
    ) -> Result<PriceWindow, SourceError> {
        self.range_calls
            .lock()
            .unwrap()
            .push((symbol.to_string(), interval));
        self.lookup(symbol).await
    }
}

/// Scripted signal generator keyed by symbol.
#[derive(Default)]
pub struct FakeSignalGenerator {
    signals: Mutex<HashMap<String, TradingSignal>>,
    delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<(String, SignalParams)>>,
}

impl FakeSignalGenerator {
    pub fn set_signal(&self, signal: TradingSignal) {
        self.signals
            .lock()
            .unwrap()
            .insert(signal.symbol.clone(), signal);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<(String, SignalParams)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SignalGenerator for FakeSignalGenerator {
    async fn analyze(
        &self,
        symbol: &str,
        params: &SignalParams,
    ) -> Result<TradingSignal, SourceError> {
        self.calls
            .lock()
            .unwrap()
            .push((symbol.to_string(), params.clone()));
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.signals
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .ok_or_else(|| SourceError::Unavailable(format!("no signal for {symbol}")))
    }
}

pub fn buy_signal(symbol: &str, risk: RiskLevel) -> TradingSignal {
    use alphapulse_domain::entities::SignalTarget;
    use alphapulse_domain::enums::TargetLevel;

    TradingSignal {
        symbol: symbol.to_string(),
        recommendation: Recommendation::Buy,
        risk_level: risk,
        entry_price_min: Some(dec!(99)),
        entry_price_max: Some(dec!(101)),
        stop_loss: Some(dec!(95)),
        targets: vec![
            SignalTarget {
                level: TargetLevel::T1,
                price: dec!(105),
            },
            SignalTarget {
                level: TargetLevel::T2,
                price: dec!(110),
            },
        ],
        position_size_percentage: Some(dec!(5)),
        analysis_summary: Some("breakout above resistance".to_string()),
    }
}
