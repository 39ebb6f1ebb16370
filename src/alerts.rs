//! Goal and threshold evaluation. Pure: given the same snapshot, period
//! progress and fired set, the output is the same. The caller persists
//! the returned fired set and resets it when the period id changes.

use std::collections::BTreeSet;

use crate::errors::EngineResult;
use crate::models::{
    Alert, AlertKind, AlertSeverity, AlertState, EngineConfig, GoalStatus, GoalTier,
    MetricsSnapshot, Pace, PeriodProgress, SuggestedAction, WeeklyCheckpoint,
};

/// Progress-of-goal floor under the pace heuristic: three quarters of the
/// time spent with less than half the goal met.
const PACE_TIME_FLOOR: i64 = 75;
const PACE_GOAL_CEILING: i64 = 50;

const CHECKPOINT_WEEKS: u32 = 4;

impl AlertState {
    /// Clears the fired set whenever the current period id differs from
    /// the one last seen. Returns true when a rollover happened.
    pub fn roll_over(&mut self, period_id: &str) -> bool {
        if self.last_seen_period_id.as_deref() == Some(period_id) {
            return false;
        }
        self.fired.clear();
        self.last_seen_period_id = Some(period_id.to_string());
        true
    }
}

/// Evaluates every alert rule once. Each kind fires at most once per
/// period: kinds already present in `fired` are suppressed, and the
/// returned set is `fired` plus whatever fired now.
pub fn evaluate(
    snapshot: &MetricsSnapshot,
    progress: &PeriodProgress,
    config: &EngineConfig,
    fired: &BTreeSet<String>,
) -> EngineResult<(Vec<Alert>, BTreeSet<String>)> {
    config.validate()?;

    let mut updated = fired.clone();
    let mut alerts = Vec::new();
    if !config.alerts_enabled {
        return Ok((alerts, updated));
    }

    let mut push = |alert: Alert, updated: &mut BTreeSet<String>| {
        if updated.insert(alert.kind.as_str().to_string()) {
            alerts.push(alert);
        }
    };

    // On the final day the last-day alert takes over entirely.
    if progress.days_remaining > 0 && progress.days_remaining <= config.lead_time_days {
        push(
            Alert {
                kind: AlertKind::PeriodEnding,
                severity: AlertSeverity::Warning,
                icon: "⏰".to_string(),
                title: "Commercial cycle ending".to_string(),
                message: format!(
                    "Only {} day(s) left in the current commercial cycle.",
                    progress.days_remaining
                ),
                suggested_action: None,
            },
            &mut updated,
        );
    }

    if progress.days_remaining == 0 {
        push(
            Alert {
                kind: AlertKind::LastDay,
                severity: AlertSeverity::Critical,
                icon: "🚨".to_string(),
                title: "Last day of the cycle".to_string(),
                message: "Today is the last day of the commercial cycle. Close what you can and archive the period.".to_string(),
                suggested_action: Some(SuggestedAction::ArchivePeriod),
            },
            &mut updated,
        );
    }

    if snapshot.closed_count >= config.monthly_goal {
        push(
            Alert {
                kind: AlertKind::GoalReached,
                severity: AlertSeverity::Success,
                icon: "🏆".to_string(),
                title: "Monthly goal reached".to_string(),
                message: format!(
                    "{} sale(s) closed against a goal of {}.",
                    snapshot.closed_count, config.monthly_goal
                ),
                suggested_action: None,
            },
            &mut updated,
        );
    }

    if progress.progress_percent >= PACE_TIME_FLOOR
        && snapshot.goal_progress_percent < PACE_GOAL_CEILING
    {
        push(
            Alert {
                kind: AlertKind::PaceWarning,
                severity: AlertSeverity::Warning,
                icon: "🚀".to_string(),
                title: "Pick up the pace".to_string(),
                message: format!(
                    "{}% of the goal met with {}% of the cycle remaining.",
                    snapshot.goal_progress_percent,
                    100 - progress.progress_percent
                ),
                suggested_action: None,
            },
            &mut updated,
        );
    }

    Ok((alerts, updated))
}

impl GoalStatus {
    pub fn of(snapshot: &MetricsSnapshot, goal: u32) -> Self {
        let progress_percent = snapshot.goal_progress_percent;
        let tier = if progress_percent >= 100 {
            GoalTier::Gold
        } else if progress_percent >= 80 {
            GoalTier::Silver
        } else {
            GoalTier::Bronze
        };
        Self {
            reached: snapshot.closed_count >= goal,
            progress_percent,
            remaining: goal.saturating_sub(snapshot.closed_count),
            tier,
        }
    }
}

impl WeeklyCheckpoint {
    /// The cycle is split into four goal checkpoints of ceil(goal / 4)
    /// sales each; behind means under 80% of the cumulative target.
    pub fn at(progress: &PeriodProgress, snapshot: &MetricsSnapshot, goal: u32) -> Self {
        let week = ((progress.days_elapsed / 7) as u32).min(CHECKPOINT_WEEKS - 1) + 1;
        let weekly_goal = goal.div_ceil(CHECKPOINT_WEEKS);
        let cumulative_goal = weekly_goal * week;
        let cumulative_closed = snapshot.closed_count;

        let pace = if cumulative_closed >= cumulative_goal {
            Pace::Ahead
        } else if f64::from(cumulative_closed) < f64::from(cumulative_goal) * 0.8 {
            Pace::Behind
        } else {
            Pace::OnTrack
        };

        Self {
            week,
            total_weeks: CHECKPOINT_WEEKS,
            weekly_goal,
            cumulative_goal,
            cumulative_closed,
            pace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CycleStatus;

    fn progress(days_remaining: i64, progress_percent: i64) -> PeriodProgress {
        PeriodProgress {
            days_total: 30,
            days_elapsed: 30 - days_remaining,
            days_remaining,
            progress_percent,
            status: CycleStatus::Active,
        }
    }

    fn snapshot(closed_count: u32, goal_progress_percent: i64) -> MetricsSnapshot {
        MetricsSnapshot {
            period_id: "2024-03".to_string(),
            closed_count,
            goal_progress_percent,
            ..Default::default()
        }
    }

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn quiet_mid_cycle_fires_nothing() {
        let (alerts, fired) = evaluate(
            &snapshot(3, 25),
            &progress(15, 50),
            &config(),
            &BTreeSet::new(),
        )
        .unwrap();
        assert!(alerts.is_empty());
        assert!(fired.is_empty());
    }

    #[test]
    fn period_ending_fires_inside_the_lead_window() {
        let (alerts, fired) = evaluate(
            &snapshot(3, 25),
            &progress(6, 80),
            &config(),
            &BTreeSet::new(),
        )
        .unwrap();
        assert!(alerts.iter().any(|a| a.kind == AlertKind::PeriodEnding));
        assert!(fired.contains("period-ending"));
    }

    #[test]
    fn last_day_suggests_archiving() {
        let (alerts, _) = evaluate(
            &snapshot(12, 100),
            &progress(0, 100),
            &config(),
            &BTreeSet::new(),
        )
        .unwrap();
        let last_day = alerts
            .iter()
            .find(|a| a.kind == AlertKind::LastDay)
            .expect("last-day alert");
        assert_eq!(last_day.suggested_action, Some(SuggestedAction::ArchivePeriod));
        assert_eq!(last_day.severity, AlertSeverity::Critical);
    }

    #[test]
    fn final_day_fires_last_day_without_period_ending() {
        let (alerts, fired) = evaluate(
            &snapshot(3, 25),
            &progress(0, 100),
            &config(),
            &BTreeSet::new(),
        )
        .unwrap();
        assert!(alerts.iter().any(|a| a.kind == AlertKind::LastDay));
        assert!(!alerts.iter().any(|a| a.kind == AlertKind::PeriodEnding));
        assert!(!fired.contains("period-ending"));
    }

    #[test]
    fn pace_warning_needs_lagging_goal_progress() {
        // 9 of 12 closed is 75% of goal: no warning.
        let (alerts, _) = evaluate(
            &snapshot(9, 75),
            &progress(10, 80),
            &config(),
            &BTreeSet::new(),
        )
        .unwrap();
        assert!(!alerts.iter().any(|a| a.kind == AlertKind::PaceWarning));

        // 4 of 12 is 33%: warning fires.
        let (alerts, _) = evaluate(
            &snapshot(4, 33),
            &progress(10, 80),
            &config(),
            &BTreeSet::new(),
        )
        .unwrap();
        assert!(alerts.iter().any(|a| a.kind == AlertKind::PaceWarning));
    }

    #[test]
    fn goal_reached_fires_at_and_above_goal() {
        let (alerts, _) = evaluate(
            &snapshot(12, 100),
            &progress(15, 50),
            &config(),
            &BTreeSet::new(),
        )
        .unwrap();
        assert!(alerts.iter().any(|a| a.kind == AlertKind::GoalReached));
    }

    #[test]
    fn second_evaluation_is_idempotent() {
        let snapshot = snapshot(12, 100);
        let progress = progress(0, 100);
        let (first, fired) = evaluate(&snapshot, &progress, &config(), &BTreeSet::new()).unwrap();
        assert!(!first.is_empty());
        let (second, fired_again) = evaluate(&snapshot, &progress, &config(), &fired).unwrap();
        assert!(second.is_empty());
        assert_eq!(fired, fired_again);
    }

    #[test]
    fn disabled_alerts_short_circuit() {
        let muted = EngineConfig {
            alerts_enabled: false,
            ..EngineConfig::default()
        };
        let (alerts, _) = evaluate(
            &snapshot(12, 100),
            &progress(0, 100),
            &muted,
            &BTreeSet::new(),
        )
        .unwrap();
        assert!(alerts.is_empty());
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let bad = EngineConfig {
            lead_time_days: 0,
            ..EngineConfig::default()
        };
        assert!(evaluate(&snapshot(0, 0), &progress(10, 50), &bad, &BTreeSet::new()).is_err());
    }

    #[test]
    fn roll_over_resets_only_on_period_change() {
        let mut state = AlertState::default();
        assert!(state.roll_over("2024-03"));
        state.fired.insert("goal-reached".to_string());
        assert!(!state.roll_over("2024-03"));
        assert!(!state.fired.is_empty());
        assert!(state.roll_over("2024-04"));
        assert!(state.fired.is_empty());
        assert_eq!(state.last_seen_period_id.as_deref(), Some("2024-04"));
    }

    #[test]
    fn goal_status_tiers() {
        assert_eq!(GoalStatus::of(&snapshot(12, 100), 12).tier, GoalTier::Gold);
        assert_eq!(GoalStatus::of(&snapshot(10, 83), 12).tier, GoalTier::Silver);
        let bronze = GoalStatus::of(&snapshot(4, 33), 12);
        assert_eq!(bronze.tier, GoalTier::Bronze);
        assert_eq!(bronze.remaining, 8);
        assert!(!bronze.reached);
    }

    #[test]
    fn weekly_checkpoint_paces_against_cumulative_goal() {
        let snapshot_behind = snapshot(1, 8);
        let checkpoint = WeeklyCheckpoint::at(&progress(16, 47), &snapshot_behind, 12);
        assert_eq!(checkpoint.week, 3);
        assert_eq!(checkpoint.weekly_goal, 3);
        assert_eq!(checkpoint.cumulative_goal, 9);
        assert_eq!(checkpoint.pace, Pace::Behind);

        let snapshot_ahead = snapshot(10, 83);
        let checkpoint = WeeklyCheckpoint::at(&progress(16, 47), &snapshot_ahead, 12);
        assert_eq!(checkpoint.pace, Pace::Ahead);

        // Late-cycle day counts never run past the final week.
        let checkpoint = WeeklyCheckpoint::at(&progress(0, 100), &snapshot_ahead, 12);
        assert_eq!(checkpoint.week, 4);
    }
}
