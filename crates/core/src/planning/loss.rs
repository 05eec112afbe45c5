//! Spoilage rate estimation.
//!
//! The median of weekly loss ratios is used instead of the mean: a single
//! spoiled batch or clearance day must not dominate the rate.

use serde::{Deserialize, Serialize};

use crate::planning::settings::ForecastStrategy;
use crate::planning::window::{PeriodAggregate, WeeklyBucket};

/// Upper bound for the rate used in `demand / (1 - rate)`.
pub const MAX_LOSS_RATE: f64 = 0.90;
/// Share of the recent median when blended with the year-ago rate.
pub const RECENT_LOSS_WEIGHT: f64 = 0.70;

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let middle = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[middle - 1] + sorted[middle]) / 2.0)
    } else {
        Some(sorted[middle])
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossRateSource {
    None,
    RecentMedian,
    YearAgo,
    Blended,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LossRateEstimate {
    pub source: LossRateSource,
    pub recent_median: Option<f64>,
    pub year_ago_rate: Option<f64>,
    pub raw_rate: f64,
    /// `raw_rate` clamped to `[0, MAX_LOSS_RATE]`; the only rate used downstream.
    pub applied_rate: f64,
    pub clamped: bool,
}

pub fn estimate_loss_rate(
    buckets: &[WeeklyBucket],
    year_ago: Option<&PeriodAggregate>,
    strategy: ForecastStrategy,
) -> LossRateEstimate {
    let ratios: Vec<f64> = buckets.iter().filter_map(WeeklyBucket::loss_ratio).collect();
    let recent_median = median(&ratios);
    let year_ago_rate = match strategy {
        ForecastStrategy::Simple => None,
        ForecastStrategy::Blended => year_ago.and_then(PeriodAggregate::loss_rate),
    };

    let (source, raw_rate) = match (recent_median, year_ago_rate) {
        (Some(recent), Some(year_ago)) => (
            LossRateSource::Blended,
            RECENT_LOSS_WEIGHT * recent + (1.0 - RECENT_LOSS_WEIGHT) * year_ago,
        ),
        (Some(recent), None) => (LossRateSource::RecentMedian, recent),
        (None, Some(year_ago)) => (LossRateSource::YearAgo, year_ago),
        (None, None) => (LossRateSource::None, 0.0),
    };

    let applied_rate = if raw_rate.is_finite() { raw_rate.clamp(0.0, MAX_LOSS_RATE) } else { 0.0 };
    LossRateEstimate {
        source,
        recent_median,
        year_ago_rate,
        raw_rate,
        applied_rate,
        clamped: applied_rate != raw_rate,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{estimate_loss_rate, median, LossRateSource, MAX_LOSS_RATE};
    use crate::planning::settings::ForecastStrategy;
    use crate::planning::window::{PeriodAggregate, WeeklyBucket};

    fn bucket(sales: f64, losses: f64) -> WeeklyBucket {
        let day = NaiveDate::from_ymd_opt(2025, 1, 6).expect("valid test date");
        WeeklyBucket {
            week_start: day,
            week_end: day,
            sales,
            losses,
            has_data: sales + losses > 0.0,
            damping: 1.0,
        }
    }

    #[test]
    fn median_handles_odd_and_even_lengths() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn one_catastrophic_week_does_not_dominate() {
        let buckets =
            vec![bucket(90.0, 10.0), bucket(95.0, 5.0), bucket(10.0, 90.0), bucket(92.0, 8.0)];
        let estimate = estimate_loss_rate(&buckets, None, ForecastStrategy::Simple);

        assert_eq!(estimate.source, LossRateSource::RecentMedian);
        assert!((estimate.applied_rate - 0.09).abs() < 1e-12);
    }

    #[test]
    fn blended_strategy_mixes_in_year_ago_rate() {
        let buckets = vec![bucket(80.0, 20.0)];
        let year_ago = PeriodAggregate { sales: 90.0, losses: 10.0, weeks: 3.0 };
        let estimate = estimate_loss_rate(&buckets, Some(&year_ago), ForecastStrategy::Blended);

        assert_eq!(estimate.source, LossRateSource::Blended);
        assert!((estimate.applied_rate - (0.7 * 0.2 + 0.3 * 0.1)).abs() < 1e-12);

        let simple = estimate_loss_rate(&buckets, Some(&year_ago), ForecastStrategy::Simple);
        assert_eq!(simple.source, LossRateSource::RecentMedian);
    }

    #[test]
    fn year_ago_rate_stands_alone_without_recent_weeks() {
        let year_ago = PeriodAggregate { sales: 75.0, losses: 25.0, weeks: 3.0 };
        let estimate =
            estimate_loss_rate(&[bucket(0.0, 0.0)], Some(&year_ago), ForecastStrategy::Blended);

        assert_eq!(estimate.source, LossRateSource::YearAgo);
        assert_eq!(estimate.applied_rate, 0.25);
    }

    #[test]
    fn extreme_rates_are_clamped() {
        let estimate = estimate_loss_rate(
            &[bucket(1.0, 99.0), bucket(0.0, 50.0)],
            None,
            ForecastStrategy::Simple,
        );

        assert!(estimate.raw_rate > MAX_LOSS_RATE);
        assert_eq!(estimate.applied_rate, MAX_LOSS_RATE);
        assert!(estimate.clamped);
    }

    #[test]
    fn no_movement_means_no_loss() {
        let estimate = estimate_loss_rate(&[], None, ForecastStrategy::Simple);
        assert_eq!(estimate.source, LossRateSource::None);
        assert_eq!(estimate.applied_rate, 0.0);
        assert!(!estimate.clamped);
    }
}
