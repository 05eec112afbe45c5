//! Weekly demand estimation: recency weighting, blending, trend and calendar.

use serde::{Deserialize, Serialize};

use crate::planning::settings::{BlendWeights, ForecastStrategy, PlanningSettings};
use crate::planning::window::{HistoricalAggregates, WeeklyBucket};

/// Valid weeks needed before a trend is measured.
pub const MIN_WEEKS_FOR_TREND: usize = 4;

/// `Σ(vᵢ·i) / Σ(i)` with `i` counting from the oldest value (1) to the newest.
///
/// Computed as an offset from the newest value so a constant series returns
/// that constant exactly.
pub fn recency_weighted_average(values: &[f64]) -> Option<f64> {
    let anchor = *values.last()?;
    let (weighted_offset, weight_total) =
        values.iter().enumerate().fold((0.0, 0.0), |(offset, total), (index, value)| {
            let weight = (index + 1) as f64;
            (offset + weight * (value - anchor), total + weight)
        });

    Some(anchor + weighted_offset / weight_total)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Relative change between the older and newer halves of a series.
///
/// For odd lengths the middle value belongs to neither half. Returns `None`
/// below [`MIN_WEEKS_FOR_TREND`] values.
pub fn half_growth(values: &[f64]) -> Option<HalfGrowth> {
    if values.len() < MIN_WEEKS_FOR_TREND {
        return None;
    }
    let half = values.len() / 2;
    let older_mean = mean(&values[..half])?;
    let newer_mean = mean(&values[values.len() - half..])?;
    let growth = if older_mean > 0.0 { (newer_mean - older_mean) / older_mean } else { 0.0 };

    Some(HalfGrowth { older_mean, newer_mean, growth })
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HalfGrowth {
    pub older_mean: f64,
    pub newer_mean: f64,
    pub growth: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendAdjustment {
    pub older_mean: f64,
    pub newer_mean: f64,
    pub raw_growth: f64,
    pub applied_growth: f64,
}

pub fn trend_adjustment(values: &[f64], cap: f64) -> Option<TrendAdjustment> {
    let halves = half_growth(values)?;
    Some(TrendAdjustment {
        older_mean: halves.older_mean,
        newer_mean: halves.newer_mean,
        raw_growth: halves.growth,
        applied_growth: halves.growth.clamp(-cap, cap),
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DemandEstimate {
    pub weeks_with_data: usize,
    pub recent_average: Option<f64>,
    pub year_ago_weekly: Option<f64>,
    pub trailing_year_weekly: Option<f64>,
    pub blend_weights: BlendWeights,
    pub baseline: f64,
    pub trend: Option<TrendAdjustment>,
    pub calendar_multiplier: f64,
    pub predicted: f64,
}

/// Estimates next-week demand, or `None` when no demand source has data.
pub fn estimate_demand(
    buckets: &[WeeklyBucket],
    aggregates: &HistoricalAggregates,
    settings: &PlanningSettings,
    calendar_multiplier: f64,
) -> Option<DemandEstimate> {
    let damped: Vec<f64> =
        buckets.iter().filter(|bucket| bucket.has_data).map(WeeklyBucket::damped_sales).collect();
    let recent_average = recency_weighted_average(&damped);

    let (year_ago_weekly, trailing_year_weekly) = match settings.strategy {
        ForecastStrategy::Simple => (None, None),
        ForecastStrategy::Blended => (
            aggregates.year_ago.and_then(|aggregate| aggregate.weekly_sales()),
            aggregates.trailing_year.and_then(|aggregate| aggregate.weekly_sales()),
        ),
    };

    let preferred = match settings.strategy {
        ForecastStrategy::Simple => BlendWeights::RECENT_ONLY,
        ForecastStrategy::Blended => settings.risk_posture.blend_weights(),
    };
    let blend_weights = preferred.renormalized(
        recent_average.is_some(),
        year_ago_weekly.is_some(),
        trailing_year_weekly.is_some(),
    )?;

    let baseline = blend_weights.recent * recent_average.unwrap_or(0.0)
        + blend_weights.year_ago * year_ago_weekly.unwrap_or(0.0)
        + blend_weights.trailing_year * trailing_year_weekly.unwrap_or(0.0);

    let trend = trend_adjustment(&damped, settings.risk_posture.trend_cap());
    let trended = baseline * (1.0 + trend.map_or(0.0, |trend| trend.applied_growth));
    let predicted = (trended * calendar_multiplier).max(0.0);

    Some(DemandEstimate {
        weeks_with_data: damped.len(),
        recent_average,
        year_ago_weekly,
        trailing_year_weekly,
        blend_weights,
        baseline,
        trend,
        calendar_multiplier,
        predicted,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use super::{estimate_demand, half_growth, recency_weighted_average, trend_adjustment};
    use crate::planning::settings::{ForecastStrategy, PlanningSettings, RiskPosture};
    use crate::planning::window::{HistoricalAggregates, PeriodAggregate, WeeklyBucket};

    fn buckets(sales: &[f64]) -> Vec<WeeklyBucket> {
        let start = NaiveDate::from_ymd_opt(2025, 1, 6).expect("valid test date");
        sales
            .iter()
            .enumerate()
            .map(|(index, sales)| {
                let week_start = start + Duration::weeks(index as i64);
                WeeklyBucket {
                    week_start,
                    week_end: week_start + Duration::days(6),
                    sales: *sales,
                    losses: 0.0,
                    has_data: *sales > 0.0,
                    damping: 1.0,
                }
            })
            .collect()
    }

    #[test]
    fn newest_week_weighs_most() {
        let average = recency_weighted_average(&[10.0, 20.0]).unwrap();
        assert!((average - (10.0 + 40.0) / 3.0).abs() < 1e-12);
        assert_eq!(recency_weighted_average(&[]), None);
    }

    #[test]
    fn constant_series_average_is_exact() {
        for value in [0.1, 7.3, 1e9 / 3.0, 100.0] {
            assert_eq!(recency_weighted_average(&[value; 13]), Some(value));
        }
    }

    #[test]
    fn growth_is_zero_when_older_half_is_empty() {
        let halves = half_growth(&[0.0, 0.0, 5.0, 5.0]).unwrap();
        assert_eq!(halves.growth, 0.0);
        assert_eq!(half_growth(&[1.0, 2.0, 3.0]), None);
    }

    #[test]
    fn trend_growth_is_clamped_to_cap() {
        let trend = trend_adjustment(&[10.0, 10.0, 20.0, 20.0], 0.12).unwrap();
        assert_eq!(trend.raw_growth, 1.0);
        assert_eq!(trend.applied_growth, 0.12);

        let trend = trend_adjustment(&[20.0, 20.0, 10.0, 10.0], 0.05).unwrap();
        assert_eq!(trend.applied_growth, -0.05);
    }

    #[test]
    fn damped_weeks_and_empty_weeks_shape_the_baseline() {
        let mut history = buckets(&[50.0, 0.0, 200.0]);
        history[2].damping = 0.25;
        let estimate = estimate_demand(
            &history,
            &HistoricalAggregates::default(),
            &PlanningSettings::default(),
            1.0,
        )
        .unwrap();

        assert_eq!(estimate.weeks_with_data, 2);
        assert!((estimate.baseline - (50.0 + 2.0 * 50.0) / 3.0).abs() < 1e-12);
        assert!(estimate.trend.is_none());
    }

    #[test]
    fn simple_strategy_ignores_year_ago_data() {
        let aggregates = HistoricalAggregates {
            year_ago: Some(PeriodAggregate { sales: 900.0, losses: 0.0, weeks: 3.0 }),
            ..HistoricalAggregates::default()
        };
        let estimate =
            estimate_demand(&buckets(&[30.0]), &aggregates, &PlanningSettings::default(), 1.5)
                .unwrap();

        assert_eq!(estimate.year_ago_weekly, None);
        assert_eq!(estimate.predicted, 45.0);
    }

    #[test]
    fn blended_strategy_mixes_available_sources() {
        let settings = PlanningSettings {
            strategy: ForecastStrategy::Blended,
            risk_posture: RiskPosture::Balanced,
            ..PlanningSettings::default()
        };
        let aggregates = HistoricalAggregates {
            year_ago: Some(PeriodAggregate { sales: 120.0, losses: 0.0, weeks: 3.0 }),
            trailing_year: Some(PeriodAggregate { sales: 1560.0, losses: 0.0, weeks: 52.0 }),
            current_week: None,
        };
        let estimate = estimate_demand(&buckets(&[60.0]), &aggregates, &settings, 1.0).unwrap();

        assert!((estimate.blend_weights.total() - 1.0).abs() < 1e-12);
        assert!((estimate.baseline - (0.5 * 60.0 + 0.25 * 40.0 + 0.25 * 30.0)).abs() < 1e-9);
    }

    #[test]
    fn blended_strategy_redistributes_missing_sources() {
        let settings =
            PlanningSettings { strategy: ForecastStrategy::Blended, ..PlanningSettings::default() };
        let aggregates = HistoricalAggregates {
            year_ago: Some(PeriodAggregate { sales: 90.0, losses: 0.0, weeks: 3.0 }),
            ..HistoricalAggregates::default()
        };

        let estimate = estimate_demand(&buckets(&[0.0, 0.0]), &aggregates, &settings, 1.0)
            .expect("year-ago data alone is enough in blended mode");
        assert_eq!(estimate.blend_weights.year_ago, 1.0);
        assert_eq!(estimate.baseline, 30.0);
        assert_eq!(estimate.weeks_with_data, 0);
    }

    #[test]
    fn no_sources_means_no_estimate() {
        assert!(estimate_demand(
            &buckets(&[0.0, 0.0, 0.0, 0.0]),
            &HistoricalAggregates::default(),
            &PlanningSettings::default(),
            2.0,
        )
        .is_none());
    }
}
