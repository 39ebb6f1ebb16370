//! Commercial cycle math. A cycle runs from the 27th of one month at
//! midnight to the 26th of the next at 23:59:59.999, and is accounted
//! under the month containing its end date. Days 26 and 27 exist in
//! every month, so the math is total for all valid dates.

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};

use crate::models::{CycleStatus, Period, PeriodProgress};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Computes the period containing the given instant.
pub fn period_containing(instant: DateTime<Utc>) -> Period {
    let date = instant.date_naive();
    let first = date.with_day(1).expect("day 1 exists in every month");
    let reference_month = if date.day() >= 27 {
        first + Months::new(1)
    } else {
        first
    };

    let start_date = (reference_month - Months::new(1))
        .with_day(27)
        .expect("day 27 exists in every month");
    let end_date = reference_month
        .with_day(26)
        .expect("day 26 exists in every month");

    let start = start_date
        .and_hms_opt(0, 0, 0)
        .expect("valid midnight")
        .and_utc();
    let end = end_date
        .and_hms_milli_opt(23, 59, 59, 999)
        .expect("valid end of day")
        .and_utc();

    Period {
        start,
        end,
        reference_month,
        id: period_id(reference_month),
        full_name: reference_month.format("%B %Y").to_string(),
        short_name: reference_month.format("%b %Y").to_string().to_uppercase(),
    }
}

/// The period containing `now`. Recomputed on demand, never cached.
pub fn current_period(now: DateTime<Utc>) -> Period {
    period_containing(now)
}

pub fn period_id(reference_month: NaiveDate) -> String {
    format!("{:04}-{:02}", reference_month.year(), reference_month.month())
}

impl Period {
    /// Closed-interval containment check.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

impl PeriodProgress {
    /// Day counters for a period as seen from `now`. Elapsed floors,
    /// total and remaining ceil, matching the display convention that a
    /// started day counts as remaining until it is over.
    pub fn at(period: &Period, now: DateTime<Utc>, lead_time_days: i64) -> Self {
        let total_ms = (period.end - period.start).num_milliseconds().max(1);
        let elapsed_ms = (now - period.start).num_milliseconds().max(0);
        let remaining_ms = (period.end - now).num_milliseconds().max(0);

        let days_total = div_ceil(total_ms, DAY_MS);
        let days_elapsed = elapsed_ms / DAY_MS;
        let days_remaining = div_ceil(remaining_ms, DAY_MS);

        let progress_percent = ((days_elapsed as f64 / days_total as f64) * 100.0)
            .round()
            .clamp(0.0, 100.0) as i64;

        Self {
            days_total,
            days_elapsed,
            days_remaining,
            progress_percent,
            status: status_for(days_remaining, progress_percent, lead_time_days),
        }
    }
}

fn status_for(days_remaining: i64, progress_percent: i64, lead_time_days: i64) -> CycleStatus {
    if days_remaining == 0 {
        CycleStatus::Finishing
    } else if days_remaining <= lead_time_days {
        CycleStatus::Critical
    } else if progress_percent >= 75 {
        CycleStatus::Advanced
    } else if progress_percent >= 50 {
        CycleStatus::Midway
    } else if progress_percent >= 25 {
        CycleStatus::Early
    } else {
        CycleStatus::Active
    }
}

fn div_ceil(value: i64, divisor: i64) -> i64 {
    (value + divisor - 1) / divisor
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn mid_month_reference_uses_previous_27th() {
        let period = period_containing(utc(2024, 3, 15, 12, 0, 0));
        assert_eq!(period.start, utc(2024, 2, 27, 0, 0, 0));
        assert_eq!(
            period.end,
            utc(2024, 3, 26, 23, 59, 59) + chrono::Duration::milliseconds(999)
        );
        assert_eq!(period.id, "2024-03");
    }

    #[test]
    fn day_27_starts_the_next_period() {
        let period = period_containing(utc(2024, 3, 27, 0, 0, 0));
        assert_eq!(period.start, utc(2024, 3, 27, 0, 0, 0));
        assert_eq!(
            period.end,
            utc(2024, 4, 26, 23, 59, 59) + chrono::Duration::milliseconds(999)
        );
        assert_eq!(period.id, "2024-04");
    }

    #[test]
    fn boundaries_always_fall_on_27_and_26() {
        let samples = [
            utc(2023, 1, 1, 0, 0, 0),
            utc(2024, 2, 28, 9, 30, 0),
            utc(2024, 2, 29, 9, 30, 0),
            utc(2024, 12, 26, 23, 59, 59),
            utc(2024, 12, 27, 0, 0, 0),
            utc(2025, 6, 30, 18, 0, 0),
        ];
        for sample in samples {
            let period = period_containing(sample);
            assert_eq!(period.start.day(), 27, "start for {sample}");
            assert_eq!(period.end.day(), 26, "end for {sample}");
            assert_eq!(
                (period.reference_month - Months::new(1)).month(),
                period.start.month(),
                "end month follows start month for {sample}"
            );
        }
    }

    #[test]
    fn a_date_is_always_inside_its_own_period() {
        let samples = [
            utc(2024, 1, 26, 23, 59, 59),
            utc(2024, 1, 27, 0, 0, 0),
            utc(2024, 7, 4, 12, 0, 0),
            utc(2025, 2, 28, 23, 0, 0),
        ];
        for sample in samples {
            let period = period_containing(sample);
            assert!(period.contains(sample), "{sample} outside {}", period.id);
        }
    }

    #[test]
    fn containment_is_a_closed_interval() {
        let period = period_containing(utc(2024, 3, 15, 0, 0, 0));
        assert!(period.contains(period.start));
        assert!(period.contains(period.end));
        assert!(!period.contains(period.start - chrono::Duration::milliseconds(1)));
        assert!(!period.contains(period.end + chrono::Duration::milliseconds(1)));
    }

    #[test]
    fn december_reference_rolls_into_january() {
        let period = period_containing(utc(2024, 12, 28, 10, 0, 0));
        assert_eq!(period.id, "2025-01");
        assert_eq!(period.start, utc(2024, 12, 27, 0, 0, 0));
        assert_eq!(period.end.month(), 1);
    }

    #[test]
    fn display_names_follow_the_reference_month() {
        let period = period_containing(utc(2024, 3, 15, 0, 0, 0));
        assert_eq!(period.full_name, "March 2024");
        assert_eq!(period.short_name, "MAR 2024");
    }

    #[test]
    fn day_counters_sum_to_total_within_one() {
        let period = period_containing(utc(2024, 3, 15, 0, 0, 0));
        let samples = [
            period.start,
            period.start + chrono::Duration::hours(13),
            utc(2024, 3, 10, 6, 45, 0),
            period.end - chrono::Duration::hours(2),
            period.end,
        ];
        for now in samples {
            let progress = PeriodProgress::at(&period, now, 7);
            assert!(progress.days_elapsed >= 0);
            assert!(progress.days_remaining >= 0);
            let sum = progress.days_elapsed + progress.days_remaining;
            assert!(
                (sum - progress.days_total).abs() <= 1,
                "elapsed {} + remaining {} vs total {} at {now}",
                progress.days_elapsed,
                progress.days_remaining,
                progress.days_total
            );
        }
    }

    #[test]
    fn progress_is_clamped_even_outside_the_period() {
        let period = period_containing(utc(2024, 3, 15, 0, 0, 0));
        let before = PeriodProgress::at(&period, period.start - chrono::Duration::days(3), 7);
        assert_eq!(before.days_elapsed, 0);
        assert_eq!(before.progress_percent, 0);
        let after = PeriodProgress::at(&period, period.end + chrono::Duration::days(3), 7);
        assert_eq!(after.days_remaining, 0);
        assert_eq!(after.progress_percent, 100);
    }

    #[test]
    fn status_bands_by_remaining_days_and_progress() {
        let period = period_containing(utc(2024, 3, 15, 0, 0, 0));
        assert_eq!(
            PeriodProgress::at(&period, period.start, 7).status,
            CycleStatus::Active
        );
        assert_eq!(
            PeriodProgress::at(&period, period.start + chrono::Duration::days(9), 7).status,
            CycleStatus::Early
        );
        assert_eq!(
            PeriodProgress::at(&period, period.start + chrono::Duration::days(15), 7).status,
            CycleStatus::Midway
        );
        assert_eq!(
            PeriodProgress::at(&period, period.start + chrono::Duration::days(23), 3).status,
            CycleStatus::Advanced
        );
        assert_eq!(
            PeriodProgress::at(&period, period.end - chrono::Duration::days(5), 7).status,
            CycleStatus::Critical
        );
        assert_eq!(
            PeriodProgress::at(&period, period.end, 7).status,
            CycleStatus::Finishing
        );
    }
}
