//! Append-only archive of period snapshots, plus period-over-period
//! comparison against the most recently archived entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    ArchiveMode, Comparison, ComparisonSide, HistoricalEntry, MetricsSnapshot, Period,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    entries: Vec<HistoricalEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<HistoricalEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Archives a snapshot for a period. Under `ArchiveMode::Append` a
    /// period archived twice produces two entries; `UpsertByPeriod`
    /// replaces any entry already carrying the same period id.
    pub fn archive(
        &mut self,
        snapshot: MetricsSnapshot,
        period: Period,
        goal: u32,
        mode: ArchiveMode,
        archived_at: DateTime<Utc>,
    ) -> &HistoricalEntry {
        if mode == ArchiveMode::UpsertByPeriod {
            self.entries.retain(|entry| entry.period.id != period.id);
        }
        let goal_reached = snapshot.closed_count >= goal;
        self.entries.push(HistoricalEntry {
            period,
            goal,
            goal_reached,
            snapshot,
            archived_at,
        });
        self.entries.last().expect("entry was just pushed")
    }

    /// Entries ordered by period start, newest first.
    pub fn list(&self) -> Vec<HistoricalEntry> {
        let mut ordered = self.entries.clone();
        ordered.sort_by(|a, b| b.period.start.cmp(&a.period.start));
        ordered
    }

    /// Compares a live snapshot against the most recently archived
    /// period. None when nothing has been archived yet.
    pub fn compare_to_previous(&self, current: &MetricsSnapshot) -> Option<Comparison> {
        let ordered = self.list();
        let previous_entry = ordered.first()?;
        let previous = &previous_entry.snapshot;

        let current_side = ComparisonSide {
            closed_count: current.closed_count,
            total_value: current.total_value,
            conversion_rate: current.conversion_rate,
        };
        let previous_side = ComparisonSide {
            closed_count: previous.closed_count,
            total_value: previous.total_value,
            conversion_rate: previous.conversion_rate,
        };

        Some(Comparison {
            previous_period_id: previous_entry.period.id.clone(),
            current: current_side,
            previous: previous_side,
            closed_count_delta: i64::from(current.closed_count) - i64::from(previous.closed_count),
            closed_count_percent: percent_delta(
                f64::from(previous.closed_count),
                f64::from(current.closed_count),
            ),
            total_value_delta: current.total_value - previous.total_value,
            total_value_percent: percent_delta(previous.total_value, current.total_value),
            conversion_rate_delta: current.conversion_rate - previous.conversion_rate,
            conversion_rate_percent: percent_delta(
                previous.conversion_rate as f64,
                current.conversion_rate as f64,
            ),
        })
    }
}

/// Percentage change with the zero-baseline convention: growing from
/// nothing reads as 100%, staying at nothing as 0%.
fn percent_delta(previous: f64, current: f64) -> i64 {
    if previous == 0.0 {
        return if current > 0.0 { 100 } else { 0 };
    }
    (((current - previous) / previous) * 100.0).round() as i64
}
