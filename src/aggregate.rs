//! Turns the client/deal collections into a `MetricsSnapshot` for one
//! period. Pure; the caller owns the collections and decides when to
//! recompute.

use std::collections::BTreeMap;

use crate::errors::EngineResult;
use crate::models::{
    AggregationResult, Client, DealStatus, EngineConfig, MetricsSnapshot, Period, Stage,
    StageBreakdown, Trend, UNKNOWN_ORIGIN,
};

/// Tags that mark a lead as qualified.
const QUALIFYING_TAGS: [&str; 2] = ["hot", "high-potential"];

/// Aggregates every client and deal whose dates fall inside `period`.
///
/// Records missing the date needed for bucketing are excluded and
/// reported through `AggregationResult::skipped` rather than failing the
/// whole computation.
pub fn aggregate(
    clients: &BTreeMap<String, Client>,
    stages: &[Stage],
    period: &Period,
    config: &EngineConfig,
) -> EngineResult<AggregationResult> {
    config.validate()?;

    let mut snapshot = MetricsSnapshot {
        period_id: period.id.clone(),
        ..Default::default()
    };
    let mut skipped = 0u32;

    for client in clients.values() {
        match client.created_at {
            Some(created) if period.contains(created) => {
                snapshot.total_leads += 1;

                let origin = client
                    .origin
                    .as_deref()
                    .filter(|origin| !origin.trim().is_empty())
                    .unwrap_or(UNKNOWN_ORIGIN);
                *snapshot.by_origin.entry(origin.to_string()).or_insert(0) += 1;

                for tag in &client.tags {
                    *snapshot.by_tag.entry(tag.clone()).or_insert(0) += 1;
                }
                if QUALIFYING_TAGS.iter().any(|tag| client.tags.contains(*tag)) {
                    snapshot.qualified_leads += 1;
                }
            }
            Some(_) => {}
            None => skipped += 1,
        }

        for deal in &client.deals {
            // Deals without their own dates fall back to the client's
            // registration date before being given up on.
            let effective = match deal.effective_date().or(client.created_at) {
                Some(date) => date,
                None => {
                    skipped += 1;
                    continue;
                }
            };
            if !period.contains(effective) {
                continue;
            }

            snapshot.deals_total += 1;
            let value = deal.total_value();
            match deal.status {
                DealStatus::Closed => {
                    snapshot.closed_count += 1;
                    snapshot.total_base += deal.base_value;
                    snapshot.total_bonus += deal.bonus_value;
                    snapshot.total_value += value;
                    *snapshot
                        .sales_by_day
                        .entry(effective.date_naive())
                        .or_insert(0) += 1;
                }
                DealStatus::Lost => {
                    snapshot.lost_count += 1;
                    snapshot.lost_value += value;
                }
                DealStatus::ProposalSent => {
                    snapshot.proposal_count += 1;
                    snapshot.active_count += 1;
                }
                DealStatus::Negotiating => {
                    snapshot.active_count += 1;
                }
            }
        }
    }

    for stage in stages {
        snapshot
            .by_stage
            .insert(stage.id.clone(), stage_breakdown(stage, clients, period));
    }

    snapshot.conversion_rate = percent_of(snapshot.closed_count, snapshot.total_leads);
    snapshot.closing_rate = percent_of(snapshot.closed_count, snapshot.deals_total);
    snapshot.average_ticket = if snapshot.closed_count > 0 {
        snapshot.total_value / f64::from(snapshot.closed_count)
    } else {
        0.0
    };
    snapshot.goal_progress_percent =
        ((f64::from(snapshot.closed_count) / f64::from(config.monthly_goal)) * 100.0).round()
            as i64;
    snapshot.productive_days = snapshot.sales_by_day.len() as u32;
    snapshot.trend = trend_of(&snapshot.sales_by_day);

    Ok(AggregationResult { snapshot, skipped })
}

/// Pipeline exposure for one stage: every in-period deal of every client
/// currently sitting in it, regardless of deal status. This measures
/// pipeline weight and deliberately overlaps the closed-revenue totals.
fn stage_breakdown(
    stage: &Stage,
    clients: &BTreeMap<String, Client>,
    period: &Period,
) -> StageBreakdown {
    let mut breakdown = StageBreakdown {
        title: stage.title.clone(),
        client_count: stage.clients.len() as u32,
        ..Default::default()
    };

    for client_id in &stage.clients {
        let Some(client) = clients.get(client_id) else {
            continue;
        };
        for deal in &client.deals {
            let Some(date) = deal.effective_date().or(client.created_at) else {
                continue;
            };
            if period.contains(date) {
                breakdown.deal_count += 1;
                breakdown.value += deal.total_value();
            }
        }
    }
    breakdown
}

fn percent_of(part: u32, whole: u32) -> i64 {
    if whole == 0 {
        return 0;
    }
    ((f64::from(part) / f64::from(whole)) * 100.0).round() as i64
}

/// Sum of the three most recent active days: 3 or more sales reads as
/// rising, at most 1 as falling. No sales at all gives no signal.
fn trend_of(sales_by_day: &BTreeMap<chrono::NaiveDate, u32>) -> Trend {
    if sales_by_day.is_empty() {
        return Trend::Steady;
    }
    let recent: u32 = sales_by_day.values().rev().take(3).sum();
    if recent >= 3 {
        Trend::Rising
    } else if recent <= 1 {
        Trend::Falling
    } else {
        Trend::Steady
    }
}
