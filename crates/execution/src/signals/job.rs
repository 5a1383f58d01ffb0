//! Signal job definitions and run outcomes.

use alphapulse_domain::entities::{OrderId, SignalParams};
use alphapulse_domain::value_objects::{JobCadence, JobId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Registration request for a signal job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalJobSpec {
    /// Job id; derived from symbol and cadence when absent.
    #[serde(default)]
    pub job_id: Option<JobId>,
    /// Symbol analyzed.
    pub symbol: String,
    /// Firing cadence.
    pub cadence: JobCadence,
    /// Parameters forwarded to the signal generator.
    #[serde(default)]
    pub params: SignalParams,
}

impl SignalJobSpec {
    /// Creates a spec with a derived job id.
    pub fn new(symbol: impl Into<String>, cadence: JobCadence, params: SignalParams) -> Self {
        Self {
            job_id: None,
            symbol: symbol.into(),
            cadence,
            params,
        }
    }

    /// Uses an explicit job id.
    #[must_use]
    pub fn with_id(mut self, job_id: JobId) -> Self {
        self.job_id = Some(job_id);
        self
    }

    /// Explicit id, or the one derived from symbol and cadence.
    pub fn resolved_id(&self) -> JobId {
        self.job_id
            .clone()
            .unwrap_or_else(|| JobId::derive(&self.symbol, &self.cadence))
    }
}

/// What one firing of a job produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    /// An order was opened.
    OrderOpened(OrderId),
    /// The signal recommended holding.
    Hold,
    /// The signal was rejected by validation or risk policy.
    Rejected(String),
    /// The signal could not be obtained or the order not stored.
    Failed(String),
}

/// Record of one firing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRun {
    /// When the firing started.
    pub started_at: DateTime<Utc>,
    /// How long it took.
    pub elapsed: Duration,
    /// Outcome.
    pub outcome: JobOutcome,
}

/// A registered signal job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalJob {
    /// Job id.
    pub id: JobId,
    /// Symbol analyzed.
    pub symbol: String,
    /// Firing cadence.
    pub cadence: JobCadence,
    /// Parameters forwarded to the signal generator.
    pub params: SignalParams,
    /// Whether timer firings are suspended.
    pub paused: bool,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Number of completed firings, timer or manual.
    pub run_count: u64,
    /// Most recent completed firing.
    pub last_run: Option<JobRun>,
}

/// Point-in-time view of a job including its timer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalJobStatus {
    /// Job definition and history.
    pub job: SignalJob,
    /// Time until the next timer firing, `None` while paused or stopped.
    pub next_run_in: Option<Duration>,
}
