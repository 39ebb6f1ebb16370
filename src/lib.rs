//! salescycle — metrics engine for a rolling commercial cycle.
//!
//! A cycle runs from the 27th of one month to the 26th of the next and
//! is accounted under the month containing its end. The crate computes
//! period boundaries, aggregates client/deal collections into metric
//! snapshots, evaluates goal and pace alerts at most once per period,
//! and keeps an archive of closed periods for period-over-period
//! comparison. All computation is pure and synchronous; `CycleEngine`
//! adds persistence and `RefreshDriver` adds the recomputation cadence.

pub mod aggregate;
pub mod alerts;
pub mod cycle;
pub mod engine;
pub mod errors;
pub mod ledger;
pub mod models;
pub mod refresh;
pub mod store;

pub use aggregate::aggregate;
pub use alerts::evaluate;
pub use cycle::{current_period, period_containing, period_id};
pub use engine::CycleEngine;
pub use errors::{EngineError, EngineResult};
pub use ledger::Ledger;
pub use models::{
    AggregationResult, Alert, AlertKind, AlertSeverity, AlertState, ArchiveMode, Client,
    ClientStatus, Comparison, CycleStatus, Deal, DealStatus, EngineConfig, GoalStatus, GoalTier,
    HistoricalEntry, MetricsSnapshot, NewSale, Pace, Period, PeriodProgress, SaleRecord, Stage,
    StageBreakdown, StoreStats, SuggestedAction, Trend, WeeklyCheckpoint, UNKNOWN_ORIGIN,
};
pub use refresh::{RefreshCallback, RefreshDriver};
pub use store::Store;
