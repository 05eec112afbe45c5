//! Weekly bucketing of a product's sales and loss history.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::records::{DatedQuantity, MovementRecord};
use crate::domain::week::TargetWeek;

/// One week of aggregated history, oldest-first within a window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeeklyBucket {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub sales: f64,
    pub losses: f64,
    pub has_data: bool,
    /// Calendar damping in `(0, 1]`; `1.0` until the calendar weigher runs.
    pub damping: f64,
}

impl WeeklyBucket {
    pub fn damped_sales(&self) -> f64 {
        self.sales * self.damping
    }

    pub fn loss_ratio(&self) -> Option<f64> {
        let movement = self.sales + self.losses;
        (movement > 0.0).then(|| self.losses / movement)
    }
}

/// Sales and losses over an arbitrary period, with its length in weeks.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeriodAggregate {
    pub sales: f64,
    pub losses: f64,
    pub weeks: f64,
}

impl PeriodAggregate {
    pub fn weekly_sales(&self) -> Option<f64> {
        (self.weeks > 0.0 && self.sales > 0.0).then(|| self.sales / self.weeks)
    }

    pub fn loss_rate(&self) -> Option<f64> {
        let movement = self.sales + self.losses;
        (movement > 0.0).then(|| self.losses / movement)
    }
}

/// Parsed history for one product plus the count of rows that could not be used.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CleanHistory {
    pub sales: Vec<DatedQuantity>,
    pub losses: Vec<DatedQuantity>,
    pub skipped_records: usize,
}

impl CleanHistory {
    pub fn from_records(sales: &[MovementRecord], losses: &[MovementRecord]) -> Self {
        let mut skipped_records = 0;
        let mut parse_all = |records: &[MovementRecord]| {
            records
                .iter()
                .filter_map(|record| {
                    let parsed = record.parse();
                    if parsed.is_none() {
                        skipped_records += 1;
                    }
                    parsed
                })
                .collect::<Vec<_>>()
        };

        let sales = parse_all(sales);
        let losses = parse_all(losses);
        Self { sales, losses, skipped_records }
    }
}

/// Builds `weeks` contiguous 7-day buckets ending the day before `anchor`.
///
/// Buckets start on the anchor's weekday. Records outside
/// `[anchor - weeks, anchor)` are ignored.
pub fn build_window(anchor: NaiveDate, weeks: u32, history: &CleanHistory) -> Vec<WeeklyBucket> {
    let window_start = anchor - Duration::weeks(i64::from(weeks));
    let mut buckets: Vec<WeeklyBucket> = (0..i64::from(weeks))
        .map(|index| {
            let week_start = window_start + Duration::weeks(index);
            WeeklyBucket {
                week_start,
                week_end: week_start + Duration::days(6),
                sales: 0.0,
                losses: 0.0,
                has_data: false,
                damping: 1.0,
            }
        })
        .collect();

    let bucket_index = |date: NaiveDate| {
        let offset = (date - window_start).num_days();
        (offset >= 0 && offset < i64::from(weeks) * 7).then(|| (offset / 7) as usize)
    };

    for entry in &history.sales {
        if let Some(index) = bucket_index(entry.date) {
            buckets[index].sales += entry.quantity;
        }
    }
    for entry in &history.losses {
        if let Some(index) = bucket_index(entry.date) {
            buckets[index].losses += entry.quantity;
        }
    }
    for bucket in &mut buckets {
        bucket.has_data = bucket.sales + bucket.losses > 0.0;
    }

    buckets
}

/// Sums records dated within `[start, end]`.
pub fn aggregate_period(
    history: &CleanHistory,
    start: NaiveDate,
    end: NaiveDate,
    weeks: f64,
) -> PeriodAggregate {
    let in_range = |entry: &&DatedQuantity| entry.date >= start && entry.date <= end;
    PeriodAggregate {
        sales: history.sales.iter().filter(in_range).map(|entry| entry.quantity).sum(),
        losses: history.losses.iter().filter(in_range).map(|entry| entry.quantity).sum(),
        weeks,
    }
}

/// Aggregates derived from a product's full history, relative to the target week.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalAggregates {
    pub year_ago: Option<PeriodAggregate>,
    pub trailing_year: Option<PeriodAggregate>,
    pub current_week: Option<PeriodAggregate>,
}

impl HistoricalAggregates {
    /// Derives year-ago, trailing-year and current-week figures from raw history.
    ///
    /// The trailing-year figure is spread over the weeks actually covered by
    /// history (at most 52) so short histories are not diluted.
    pub fn derive(week: &TargetWeek, history: &CleanHistory) -> Self {
        let (year_ago_start, year_ago_end) = week.year_ago_span();
        let year_ago = aggregate_period(history, year_ago_start, year_ago_end, 3.0);

        let (trailing_start, trailing_end) = week.trailing_year_span();
        let earliest = history
            .sales
            .iter()
            .chain(history.losses.iter())
            .map(|entry| entry.date)
            .filter(|date| *date >= trailing_start && *date <= trailing_end)
            .min();
        let trailing_year = earliest.map(|earliest| {
            let covered_days = (week.start - earliest).num_days();
            let covered_weeks = ((covered_days + 6) / 7).clamp(1, 52) as f64;
            aggregate_period(history, trailing_start, trailing_end, covered_weeks)
        });

        let current_week =
            aggregate_period(history, week.start, week.end, week.days() as f64 / 7.0);

        Self {
            year_ago: (year_ago.sales + year_ago.losses > 0.0).then_some(year_ago),
            trailing_year,
            current_week: Some(current_week),
        }
    }
}
