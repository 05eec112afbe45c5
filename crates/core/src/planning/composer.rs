//! Turns the stage outputs for one product into a production suggestion.

use std::fmt::Write as _;

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::product::{Product, ProductId};
use crate::planning::calendar::{
    apply_damping, target_week_impact, AppliedEvent, EventNote, TargetWeekImpact,
};
use crate::planning::confidence::{classify, ConfidenceLevel};
use crate::planning::demand::{estimate_demand, half_growth, mean, DemandEstimate};
use crate::planning::engine::{PlanContext, ProductHistory};
use crate::planning::loss::{estimate_loss_rate, LossRateEstimate};
use crate::planning::settings::{
    ForecastStrategy, PlanningSettings, MAX_LOOKBACK_WEEKS, MIN_LOOKBACK_WEEKS,
};
use crate::planning::variability::{safety_buffer, BufferMethod, SafetyBuffer};
use crate::planning::window::{
    build_window, CleanHistory, HistoricalAggregates, PeriodAggregate, WeeklyBucket,
};

/// Relative change between history halves below which a trend reads as stable.
pub const STABLE_TREND_THRESHOLD: f64 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendLabel {
    Rising,
    Falling,
    Stable,
    Unknown,
}

impl TrendLabel {
    fn from_series(values: &[f64]) -> Self {
        match half_growth(values) {
            None => Self::Unknown,
            Some(halves) if halves.growth > STABLE_TREND_THRESHOLD => Self::Rising,
            Some(halves) if halves.growth < -STABLE_TREND_THRESHOLD => Self::Falling,
            Some(_) => Self::Stable,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastBasis {
    /// Computed from history.
    History,
    /// No usable history; the configured new-product default was used.
    NewProductDefault,
    /// An intermediate value was not finite; the default was used instead.
    Degraded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAllocation {
    pub day: Weekday,
    pub units: u64,
}

/// Every intermediate quantity behind a suggestion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastBreakdown {
    pub window: Vec<WeeklyBucket>,
    pub aggregates: HistoricalAggregates,
    pub demand: Option<DemandEstimate>,
    pub buffer: Option<SafetyBuffer>,
    pub loss_rate: Option<LossRateEstimate>,
    pub gross_demand: f64,
    pub raw_production: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub product_id: ProductId,
    pub product_name: String,
    pub sector: String,
    pub unit: String,
    pub basis: ForecastBasis,
    pub weeks_with_data: usize,
    /// Recency-weighted, calendar-damped weekly sales.
    pub average_weekly_sales: f64,
    pub simple_average_sales: f64,
    pub average_weekly_losses: f64,
    pub current_week: Option<PeriodAggregate>,
    pub sales_trend: TrendLabel,
    pub loss_trend: TrendLabel,
    pub confidence: ConfidenceLevel,
    pub calendar_multiplier: f64,
    pub calendar_events: Vec<AppliedEvent>,
    pub calendar_notes: Vec<EventNote>,
    pub breakdown: ForecastBreakdown,
    pub suggested_production: u64,
    pub daily_plan: Vec<DailyAllocation>,
    pub skipped_records: usize,
    pub explanation: String,
}

/// Runs every stage for one product. Never fails: unusable inputs fall back to
/// the new-product default.
pub fn compose_forecast(
    context: &PlanContext<'_>,
    product: &Product,
    history: &ProductHistory,
) -> ForecastResult {
    let settings = context.settings;
    let lookback_weeks = settings.lookback_weeks.clamp(MIN_LOOKBACK_WEEKS, MAX_LOOKBACK_WEEKS);

    let clean = CleanHistory::from_records(&history.sales, &history.losses);
    let derived = HistoricalAggregates::derive(&context.week, &clean);
    let aggregates = match &history.aggregates {
        Some(supplied) => HistoricalAggregates {
            year_ago: supplied.year_ago.or(derived.year_ago),
            trailing_year: supplied.trailing_year.or(derived.trailing_year),
            current_week: supplied.current_week.or(derived.current_week),
        },
        None => derived,
    };

    let mut window = build_window(context.week.start, lookback_weeks, &clean);
    apply_damping(&mut window, context.calendar, &product.sector);
    let impact = target_week_impact(context.calendar, &product.sector, &context.week);

    let valid: Vec<&WeeklyBucket> = window.iter().filter(|bucket| bucket.has_data).collect();
    let raw_sales: Vec<f64> = valid.iter().map(|bucket| bucket.sales).collect();
    let raw_losses: Vec<f64> = valid.iter().map(|bucket| bucket.losses).collect();

    let summary = HistorySummary {
        lookback_weeks,
        weeks_with_data: valid.len(),
        simple_average_sales: mean(&raw_sales).unwrap_or(0.0),
        average_weekly_losses: mean(&raw_losses).unwrap_or(0.0),
        sales_trend: TrendLabel::from_series(&raw_sales),
        loss_trend: TrendLabel::from_series(&raw_losses),
        skipped_records: clean.skipped_records,
        has_year_ago: aggregates.year_ago.is_some(),
    };

    let Some(demand) = estimate_demand(&window, &aggregates, &settings, impact.multiplier) else {
        warn!(
            event_name = "planning.product.default_suggestion",
            product_id = %product.id.as_str(),
            lookback_weeks,
            "no usable history; applying new-product default"
        );
        let breakdown = empty_breakdown(window, aggregates);
        return default_forecast(
            product,
            &settings,
            &summary,
            impact,
            breakdown,
            ForecastBasis::NewProductDefault,
        );
    };

    let buffer = safety_buffer(&raw_sales, demand.predicted, &settings);
    let loss_rate = estimate_loss_rate(&window, aggregates.year_ago.as_ref(), settings.strategy);
    let gross_demand = demand.predicted + buffer.units;
    let raw_production = gross_demand / (1.0 - loss_rate.applied_rate);

    let breakdown = ForecastBreakdown {
        window,
        aggregates,
        demand: Some(demand),
        buffer: Some(buffer),
        loss_rate: Some(loss_rate),
        gross_demand,
        raw_production,
    };

    if !raw_production.is_finite() {
        warn!(
            event_name = "planning.product.degraded",
            product_id = %product.id.as_str(),
            raw_production,
            "forecast produced a non-finite value; applying new-product default"
        );
        return default_forecast(
            product,
            &settings,
            &summary,
            impact,
            breakdown,
            ForecastBasis::Degraded,
        );
    }

    let suggested_production = raw_production.ceil().max(0.0) as u64;
    let confidence = classify(summary.weeks_with_data, summary.has_year_ago, settings.strategy);
    let explanation = explain_history(
        &summary,
        &settings,
        &demand,
        &buffer,
        &loss_rate,
        &impact,
        suggested_production,
        &product.unit,
    );

    debug!(
        event_name = "planning.product.forecast",
        product_id = %product.id.as_str(),
        weeks_with_data = summary.weeks_with_data,
        predicted_demand = demand.predicted,
        suggested_production,
        confidence = confidence.as_str(),
        "product forecast composed"
    );

    ForecastResult {
        product_id: product.id.clone(),
        product_name: product.name.clone(),
        sector: product.sector.clone(),
        unit: product.unit.clone(),
        basis: ForecastBasis::History,
        weeks_with_data: summary.weeks_with_data,
        average_weekly_sales: demand.recent_average.unwrap_or(0.0),
        simple_average_sales: summary.simple_average_sales,
        average_weekly_losses: summary.average_weekly_losses,
        current_week: breakdown.aggregates.current_week,
        sales_trend: summary.sales_trend,
        loss_trend: summary.loss_trend,
        confidence,
        calendar_multiplier: impact.multiplier,
        calendar_events: impact.applied,
        calendar_notes: impact.informational,
        breakdown,
        suggested_production,
        daily_plan: split_across_days(suggested_production, &product.production_days),
        skipped_records: summary.skipped_records,
        explanation,
    }
}

/// Spreads `total` units over the production days, Monday first; earlier days
/// take the remainder.
pub fn split_across_days(total: u64, production_days: &[Weekday]) -> Vec<DailyAllocation> {
    let mut days = production_days.to_vec();
    days.sort_by_key(Weekday::num_days_from_monday);
    days.dedup();
    if days.is_empty() {
        return Vec::new();
    }

    let count = days.len() as u64;
    let (base, remainder) = (total / count, total % count);
    days.into_iter()
        .enumerate()
        .map(|(index, day)| DailyAllocation {
            day,
            units: base + u64::from((index as u64) < remainder),
        })
        .collect()
}

struct HistorySummary {
    lookback_weeks: u32,
    weeks_with_data: usize,
    simple_average_sales: f64,
    average_weekly_losses: f64,
    sales_trend: TrendLabel,
    loss_trend: TrendLabel,
    skipped_records: usize,
    has_year_ago: bool,
}

fn empty_breakdown(
    window: Vec<WeeklyBucket>,
    aggregates: HistoricalAggregates,
) -> ForecastBreakdown {
    ForecastBreakdown {
        window,
        aggregates,
        demand: None,
        buffer: None,
        loss_rate: None,
        gross_demand: 0.0,
        raw_production: 0.0,
    }
}

fn default_forecast(
    product: &Product,
    settings: &PlanningSettings,
    summary: &HistorySummary,
    impact: TargetWeekImpact,
    breakdown: ForecastBreakdown,
    basis: ForecastBasis,
) -> ForecastResult {
    let default = settings.new_product_default;
    let suggested_production =
        if default.is_finite() && default > 0.0 { default.ceil() as u64 } else { 0 };

    let mut explanation = match basis {
        ForecastBasis::Degraded => format!(
            "Forecast could not be computed from history (non-finite intermediate value); \
             using the default suggestion of {suggested_production} {}.",
            product.unit
        ),
        _ => format!(
            "No sales or losses recorded in the last {} weeks; using the new-product default \
             of {suggested_production} {}.",
            summary.lookback_weeks, product.unit
        ),
    };
    if !impact.applied.is_empty() {
        let _ = write!(
            explanation,
            " Calendar events ({}) were not applied to the default.",
            event_names(&impact.applied)
        );
    }
    push_skipped(&mut explanation, summary.skipped_records);

    ForecastResult {
        product_id: product.id.clone(),
        product_name: product.name.clone(),
        sector: product.sector.clone(),
        unit: product.unit.clone(),
        basis,
        weeks_with_data: summary.weeks_with_data,
        average_weekly_sales: 0.0,
        simple_average_sales: summary.simple_average_sales,
        average_weekly_losses: summary.average_weekly_losses,
        current_week: breakdown.aggregates.current_week,
        sales_trend: summary.sales_trend,
        loss_trend: summary.loss_trend,
        confidence: ConfidenceLevel::NoData,
        calendar_multiplier: impact.multiplier,
        calendar_events: impact.applied,
        calendar_notes: impact.informational,
        breakdown,
        suggested_production,
        daily_plan: split_across_days(suggested_production, &product.production_days),
        skipped_records: summary.skipped_records,
        explanation,
    }
}

#[allow(clippy::too_many_arguments)]
fn explain_history(
    summary: &HistorySummary,
    settings: &PlanningSettings,
    demand: &DemandEstimate,
    buffer: &SafetyBuffer,
    loss_rate: &LossRateEstimate,
    impact: &TargetWeekImpact,
    suggested_production: u64,
    unit: &str,
) -> String {
    let mut text = if summary.weeks_with_data == 0 {
        format!(
            "No sales recorded in the last {} weeks; demand taken from last year's figures",
            summary.lookback_weeks
        )
    } else {
        format!(
            "{} of {} weeks with history (weighted average {:.1})",
            summary.weeks_with_data,
            summary.lookback_weeks,
            demand.recent_average.unwrap_or(0.0)
        )
    };

    if settings.strategy == ForecastStrategy::Blended {
        let weights = demand.blend_weights;
        let _ = write!(
            text,
            "; blend recent {:.0}% / year-ago {:.0}% / trailing year {:.0}%",
            weights.recent * 100.0,
            weights.year_ago * 100.0,
            weights.trailing_year * 100.0
        );
    }
    if let Some(trend) = demand.trend {
        let _ = write!(text, "; trend {:+.1}%", trend.applied_growth * 100.0);
    }

    let _ = write!(text, "; std dev {:.2}", buffer.std_dev);
    match buffer.method {
        BufferMethod::Statistical => {
            let _ = write!(
                text,
                "; buffer {:.1} (k={:.2}, ~{:.0}% service level)",
                buffer.units,
                buffer.safety_factor,
                buffer.service_level * 100.0
            );
        }
        BufferMethod::Percentage => {
            let _ = write!(
                text,
                "; buffer {:.1} ({:.0}% of demand)",
                buffer.units,
                buffer.buffer_pct.unwrap_or(0.0) * 100.0
            );
        }
    }

    let _ = write!(text, "; loss rate {:.1}%", loss_rate.applied_rate * 100.0);
    if loss_rate.clamped {
        let _ = write!(text, " (capped from {:.1}%)", loss_rate.raw_rate * 100.0);
    }

    if !impact.applied.is_empty() {
        let _ = write!(
            text,
            "; calendar: {} (x{:.2})",
            event_names(&impact.applied),
            impact.multiplier
        );
    }

    let _ = write!(
        text,
        ". Predicted demand {:.1}, suggested production {suggested_production} {unit}.",
        demand.predicted
    );
    push_skipped(&mut text, summary.skipped_records);
    text
}

fn event_names(events: &[AppliedEvent]) -> String {
    events
        .iter()
        .map(|event| format!("{} {:+.0}%", event.name, event.impact_percentage))
        .collect::<Vec<_>>()
        .join(", ")
}

fn push_skipped(text: &mut String, skipped_records: usize) {
    if skipped_records > 0 {
        let _ = write!(text, " {skipped_records} malformed record(s) ignored.");
    }
}
