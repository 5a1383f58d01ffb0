//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types from the crate.
//!
//! # Example
//!
//! ```rust
//! use alphapulse_execution::prelude::*;
//! ```

// Alerts
pub use crate::alerts::{ConsoleNotifier, MultiNotifier, notify_best_effort};

// Engine
pub use crate::engine::{EngineConfig, TradingEngine};

// Errors
pub use crate::error::ExecutionError;

// Lifecycle
pub use crate::lifecycle::{
    CloseReason, ClosedOrder, LifecycleConfig, OrderLifecycleEngine, Tracked, TransitionOutcome,
};

// Ports
pub use crate::ports::{
    InMemoryOrderStore, Notifier, NotifyError, OrderFilter, OrderStore, PriceSource,
    SignalGenerator, SourceError, StatusUpdate, StoreError,
};

// Scheduler
pub use crate::scheduler::{Schedule, ScheduledTask, Scheduler, SchedulerConfig, TaskStatus};

// Signals
pub use crate::signals::{
    JobOutcome, JobRun, SignalJob, SignalJobSpec, SignalJobStatus, SignalSchedulerConfig,
    TradingSignalScheduler,
};

// Tracking
pub use crate::tracking::{ProfitTracker, SweepReport, SweepRunner, TrackerConfig};

// Trigger
pub use crate::trigger::{Evaluation, Trigger, check_stop_loss, check_take_profit, evaluate};
