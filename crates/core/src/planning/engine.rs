use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::calendar::CalendarEvent;
use crate::domain::product::{Product, ProductId};
use crate::domain::records::MovementRecord;
use crate::domain::week::TargetWeek;
use crate::planning::calendar::CalendarIndex;
use crate::planning::composer::{compose_forecast, ForecastBasis, ForecastResult};
use crate::planning::settings::{PlanningSettings, SettingNote};
use crate::planning::window::HistoricalAggregates;

/// Raw history for one product, as handed over by a collaborator.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductHistory {
    pub sales: Vec<MovementRecord>,
    pub losses: Vec<MovementRecord>,
    /// Pre-computed aggregates; any missing figure is derived from the records.
    pub aggregates: Option<HistoricalAggregates>,
}

/// Shared, read-only inputs of a planning run.
#[derive(Clone, Copy, Debug)]
pub struct PlanContext<'a> {
    pub week: TargetWeek,
    pub settings: PlanningSettings,
    pub calendar: &'a CalendarIndex,
}

#[derive(Clone, Debug)]
pub struct PlanInput<'a> {
    pub week: TargetWeek,
    pub settings: PlanningSettings,
    pub setting_notes: Vec<SettingNote>,
    pub products: &'a [Product],
    pub history: &'a BTreeMap<ProductId, ProductHistory>,
    pub calendar_events: &'a [CalendarEvent],
    pub correlation_id: &'a str,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeeklyPlan {
    pub week: TargetWeek,
    pub settings: PlanningSettings,
    pub setting_notes: Vec<SettingNote>,
    pub forecasts: Vec<ForecastResult>,
    pub products_planned: usize,
    pub products_defaulted: usize,
    pub products_degraded: usize,
    pub skipped_records: usize,
    pub skipped_events: usize,
}

impl WeeklyPlan {
    pub fn total_suggested(&self) -> u64 {
        self.forecasts.iter().map(|forecast| forecast.suggested_production).sum()
    }

    pub fn forecast_for(&self, product_id: &str) -> Option<&ForecastResult> {
        self.forecasts.iter().find(|forecast| forecast.product_id.as_str() == product_id)
    }
}

pub trait ForecastEngine: Send + Sync {
    fn forecast(
        &self,
        context: &PlanContext<'_>,
        product: &Product,
        history: &ProductHistory,
    ) -> ForecastResult;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicForecastEngine;

impl ForecastEngine for DeterministicForecastEngine {
    fn forecast(
        &self,
        context: &PlanContext<'_>,
        product: &Product,
        history: &ProductHistory,
    ) -> ForecastResult {
        compose_forecast(context, product, history)
    }
}

/// Plans every active product for one target week.
pub struct WeeklyPlanner<E = DeterministicForecastEngine> {
    engine: E,
}

impl<E> WeeklyPlanner<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }
}

impl Default for WeeklyPlanner<DeterministicForecastEngine> {
    fn default() -> Self {
        Self::new(DeterministicForecastEngine)
    }
}

impl<E: ForecastEngine> WeeklyPlanner<E> {
    /// Products are forecast in parallel; results keep catalog order.
    pub fn plan(&self, input: PlanInput<'_>) -> WeeklyPlan {
        let calendar = CalendarIndex::new(input.calendar_events);
        let context =
            PlanContext { week: input.week, settings: input.settings, calendar: &calendar };
        let active: Vec<&Product> =
            input.products.iter().filter(|product| product.active).collect();

        info!(
            event_name = "planning.plan.started",
            correlation_id = %input.correlation_id,
            week_start = %input.week.start,
            week_end = %input.week.end,
            products = active.len(),
            strategy = input.settings.strategy.as_str(),
            risk_posture = input.settings.risk_posture.as_str(),
            "weekly plan started"
        );

        let empty = ProductHistory::default();
        let forecasts: Vec<ForecastResult> = active
            .par_iter()
            .map(|product| {
                let history = input.history.get(&product.id).unwrap_or(&empty);
                self.engine.forecast(&context, product, history)
            })
            .collect();

        let count = |basis: ForecastBasis| {
            forecasts.iter().filter(|forecast| forecast.basis == basis).count()
        };
        let plan = WeeklyPlan {
            week: input.week,
            settings: input.settings,
            setting_notes: input.setting_notes,
            products_planned: forecasts.len(),
            products_defaulted: count(ForecastBasis::NewProductDefault),
            products_degraded: count(ForecastBasis::Degraded),
            skipped_records: forecasts.iter().map(|forecast| forecast.skipped_records).sum(),
            skipped_events: calendar.skipped_events(),
            forecasts,
        };

        info!(
            event_name = "planning.plan.finished",
            correlation_id = %input.correlation_id,
            products_planned = plan.products_planned,
            products_defaulted = plan.products_defaulted,
            products_degraded = plan.products_degraded,
            skipped_records = plan.skipped_records,
            total_suggested = plan.total_suggested(),
            "weekly plan finished"
        );

        plan
    }
}
