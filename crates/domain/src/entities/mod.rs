pub mod order;
pub mod signal;
pub mod statistics;
pub mod tracking_sample;

pub use order::{NewOrder, Order, OrderId, OrderIntent, TakeProfitTargets};
pub use signal::{SignalParams, SignalTarget, TradingSignal};
pub use statistics::SymbolStatistics;
pub use tracking_sample::{RealtimeConfig, TrackingSample};
