//! Adapters behind the execution ports: PostgreSQL order store, Binance
//! futures market data, the AI signal service and the webhook notifier.

pub mod notifier;
pub mod providers;
pub mod repositories;

pub use notifier::WebhookNotifier;
pub use providers::{BinancePriceSource, HttpSignalGenerator};
pub use repositories::{Database, OrderRepository};
