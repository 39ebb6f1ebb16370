use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{EngineError, EngineResult};

/// Bucket label for clients that arrive without an origin.
pub const UNKNOWN_ORIGIN: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClientStatus {
    Lead,
    Active,
    Closed,
}

impl Default for ClientStatus {
    fn default() -> Self {
        Self::Lead
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DealStatus {
    Negotiating,
    ProposalSent,
    Closed,
    Lost,
}

impl DealStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Negotiating => "negotiating",
            Self::ProposalSent => "proposal-sent",
            Self::Closed => "closed",
            Self::Lost => "lost",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub base_value: f64,
    #[serde(default)]
    pub bonus_value: f64,
    pub status: DealStatus,
    #[serde(default)]
    pub probability: Option<u8>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

impl Deal {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        base_value: f64,
        bonus_value: f64,
        status: DealStatus,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            base_value,
            bonus_value,
            status,
            probability: None,
            created_at: Some(created_at),
            closed_at: None,
        }
    }

    /// Single source of truth for a deal's worth; the two sub-values are
    /// never summed ad hoc anywhere else.
    pub fn total_value(&self) -> f64 {
        self.base_value + self.bonus_value
    }

    /// Date used for period bucketing: close date when present, else
    /// creation date.
    pub fn effective_date(&self) -> Option<DateTime<Utc>> {
        self.closed_at.or(self.created_at)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_interaction_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: ClientStatus,
    #[serde(default)]
    pub deals: Vec<Deal>,
}

/// Pipeline column; holds the ids of the clients currently assigned to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub clients: Vec<String>,
}

// ─── Commercial cycle ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// First day of the month this period is accounted under.
    pub reference_month: NaiveDate,
    /// `YYYY-MM` of the reference month.
    pub id: String,
    pub full_name: String,
    pub short_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CycleStatus {
    Active,
    Early,
    Midway,
    Advanced,
    Critical,
    Finishing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodProgress {
    pub days_total: i64,
    pub days_elapsed: i64,
    pub days_remaining: i64,
    /// Clamped to [0, 100].
    pub progress_percent: i64,
    pub status: CycleStatus,
}

// ─── Metrics ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Trend {
    Rising,
    Steady,
    Falling,
}

impl Default for Trend {
    fn default() -> Self {
        Self::Steady
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageBreakdown {
    pub title: String,
    pub client_count: u32,
    pub deal_count: u32,
    /// Pipeline exposure: in-period deal values regardless of status.
    /// Intentionally independent of the closed-revenue totals.
    pub value: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub period_id: String,
    pub total_leads: u32,
    pub qualified_leads: u32,
    pub by_origin: BTreeMap<String, u32>,
    pub by_tag: BTreeMap<String, u32>,
    pub closed_count: u32,
    pub lost_count: u32,
    pub active_count: u32,
    pub proposal_count: u32,
    pub deals_total: u32,
    pub total_base: f64,
    pub total_bonus: f64,
    pub total_value: f64,
    pub lost_value: f64,
    /// Percent, rounded; 0 when there are no leads.
    pub conversion_rate: i64,
    /// Percent of in-period deals that closed; 0 when there are none.
    pub closing_rate: i64,
    /// 0 when nothing closed.
    pub average_ticket: f64,
    /// Unclamped; over 100 signals over-achievement. Display layers clamp.
    pub goal_progress_percent: i64,
    pub by_stage: BTreeMap<String, StageBreakdown>,
    pub sales_by_day: BTreeMap<NaiveDate, u32>,
    pub productive_days: u32,
    pub trend: Trend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    pub snapshot: MetricsSnapshot,
    /// Records excluded because a date needed for bucketing was missing.
    pub skipped: u32,
}

// ─── Alerts & goals ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertKind {
    PeriodEnding,
    LastDay,
    GoalReached,
    PaceWarning,
}

impl AlertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PeriodEnding => "period-ending",
            Self::LastDay => "last-day",
            Self::GoalReached => "goal-reached",
            Self::PaceWarning => "pace-warning",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertSeverity {
    Info,
    Success,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuggestedAction {
    ArchivePeriod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub icon: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub suggested_action: Option<SuggestedAction>,
}

/// Per-period memo of which alert kinds already fired, plus the period id
/// it was last evaluated against so rollover can be detected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertState {
    pub last_seen_period_id: Option<String>,
    pub fired: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GoalTier {
    Bronze,
    Silver,
    Gold,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalStatus {
    pub reached: bool,
    pub progress_percent: i64,
    pub remaining: u32,
    pub tier: GoalTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pace {
    OnTrack,
    Ahead,
    Behind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyCheckpoint {
    pub week: u32,
    pub total_weeks: u32,
    pub weekly_goal: u32,
    pub cumulative_goal: u32,
    pub cumulative_closed: u32,
    pub pace: Pace,
}

// ─── Sales & history ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSale {
    pub client_id: String,
    pub client_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub base_value: f64,
    #[serde(default)]
    pub bonus_value: f64,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleRecord {
    pub id: String,
    /// Sequential position in the sale log, starting at 1.
    pub number: u32,
    pub client_id: String,
    pub client_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: String,
    pub base_value: f64,
    pub bonus_value: f64,
    /// Always base + bonus, fixed at creation.
    pub total_value: f64,
    pub origin: String,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub period_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalEntry {
    pub period: Period,
    pub goal: u32,
    pub goal_reached: bool,
    pub snapshot: MetricsSnapshot,
    pub archived_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSide {
    pub closed_count: u32,
    pub total_value: f64,
    pub conversion_rate: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub previous_period_id: String,
    pub current: ComparisonSide,
    pub previous: ComparisonSide,
    pub closed_count_delta: i64,
    pub closed_count_percent: i64,
    pub total_value_delta: f64,
    pub total_value_percent: i64,
    pub conversion_rate_delta: i64,
    pub conversion_rate_percent: i64,
}

// ─── Configuration ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveMode {
    /// Append unconditionally; archiving the same period twice yields two
    /// entries.
    Append,
    /// Replace any existing entry carrying the same period id.
    UpsertByPeriod,
}

impl Default for ArchiveMode {
    fn default() -> Self {
        Self::Append
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub monthly_goal: u32,
    pub lead_time_days: i64,
    pub alerts_enabled: bool,
    pub archive_mode: ArchiveMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            monthly_goal: 12,
            lead_time_days: 7,
            alerts_enabled: true,
            archive_mode: ArchiveMode::Append,
        }
    }
}

impl EngineConfig {
    /// Fail fast on values that would make every derived percentage
    /// nonsensical. Nothing downstream revalidates.
    pub fn validate(&self) -> EngineResult<()> {
        if self.monthly_goal == 0 {
            return Err(EngineError::InvalidConfig(
                "monthlyGoal must be greater than zero".to_string(),
            ));
        }
        if self.lead_time_days <= 0 {
            return Err(EngineError::InvalidConfig(
                "leadTimeDays must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub entries: u64,
    pub total_bytes: u64,
    pub last_updated: Option<DateTime<Utc>>,
}
