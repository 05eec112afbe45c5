//! Collaborator seam: where catalog, history, calendar and configuration come from.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::warn;

use crate::domain::calendar::CalendarEvent;
use crate::domain::product::{Product, ProductId};
use crate::domain::records::{LossRecord, MovementRecord, SalesRecord};
use crate::domain::week::TargetWeek;
use crate::errors::ApplicationError;
use crate::planning::engine::{PlanInput, ProductHistory, WeeklyPlan, WeeklyPlanner};
use crate::planning::settings::{resolve, ConfigEntry, PlanningSettings};
use crate::planning::window::HistoricalAggregates;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{collection} unavailable: {reason}")]
    Unavailable { collection: &'static str, reason: String },
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait PlanningSource: Send + Sync {
    async fn products(&self) -> Result<Vec<Product>, SourceError>;
    async fn sales(&self) -> Result<Vec<SalesRecord>, SourceError>;
    async fn losses(&self) -> Result<Vec<LossRecord>, SourceError>;
    async fn calendar_events(&self) -> Result<Vec<CalendarEvent>, SourceError>;
    /// `Ok(None)` when the store keeps no configuration at all.
    async fn config_entries(&self) -> Result<Option<Vec<ConfigEntry>>, SourceError>;
    /// Pre-computed aggregates keyed by product. Most stores have none.
    async fn aggregates(&self) -> Result<BTreeMap<ProductId, HistoricalAggregates>, SourceError> {
        Ok(BTreeMap::new())
    }
}

/// Everything a planning run reads, in one serializable document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanningSnapshot {
    #[serde(default)]
    pub week_start: Option<String>,
    #[serde(default)]
    pub week_end: Option<String>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub sales: Vec<SalesRecord>,
    #[serde(default)]
    pub losses: Vec<LossRecord>,
    #[serde(default)]
    pub calendar_events: Vec<CalendarEvent>,
    #[serde(default)]
    pub config_entries: Option<Vec<ConfigEntry>>,
    #[serde(default)]
    pub aggregates: BTreeMap<ProductId, HistoricalAggregates>,
}

impl PlanningSnapshot {
    pub fn from_json(raw: &str) -> Result<Self, SourceError> {
        serde_json::from_str(raw).map_err(|error| SourceError::Decode(error.to_string()))
    }
}

#[derive(Default)]
pub struct InMemoryPlanningSource {
    snapshot: RwLock<PlanningSnapshot>,
}

impl InMemoryPlanningSource {
    pub fn new(snapshot: PlanningSnapshot) -> Self {
        Self { snapshot: RwLock::new(snapshot) }
    }

    pub async fn replace(&self, snapshot: PlanningSnapshot) {
        *self.snapshot.write().await = snapshot;
    }
}

#[async_trait]
impl PlanningSource for InMemoryPlanningSource {
    async fn products(&self) -> Result<Vec<Product>, SourceError> {
        Ok(self.snapshot.read().await.products.clone())
    }

    async fn sales(&self) -> Result<Vec<SalesRecord>, SourceError> {
        Ok(self.snapshot.read().await.sales.clone())
    }

    async fn losses(&self) -> Result<Vec<LossRecord>, SourceError> {
        Ok(self.snapshot.read().await.losses.clone())
    }

    async fn calendar_events(&self) -> Result<Vec<CalendarEvent>, SourceError> {
        Ok(self.snapshot.read().await.calendar_events.clone())
    }

    async fn config_entries(&self) -> Result<Option<Vec<ConfigEntry>>, SourceError> {
        Ok(self.snapshot.read().await.config_entries.clone())
    }

    async fn aggregates(&self) -> Result<BTreeMap<ProductId, HistoricalAggregates>, SourceError> {
        Ok(self.snapshot.read().await.aggregates.clone())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlanRequest {
    pub week_start: Option<String>,
    pub week_end: Option<String>,
    pub correlation_id: String,
}

/// Fetches inputs from a [`PlanningSource`] and runs the weekly planner.
pub struct PlanningService<S> {
    source: S,
    fallback: PlanningSettings,
    planner: WeeklyPlanner,
}

impl<S: PlanningSource> PlanningService<S> {
    pub fn new(source: S, fallback: PlanningSettings) -> Self {
        Self { source, fallback, planner: WeeklyPlanner::default() }
    }

    pub async fn plan_week(&self, request: &PlanRequest) -> Result<WeeklyPlan, ApplicationError> {
        let week = TargetWeek::parse(request.week_start.as_deref(), request.week_end.as_deref())?;

        let entries = match self.source.config_entries().await {
            Ok(entries) => entries,
            Err(error) => {
                warn!(
                    event_name = "planning.config.unavailable",
                    correlation_id = %request.correlation_id,
                    error = %error,
                    "configuration store unavailable; using fallback settings"
                );
                None
            }
        };
        let resolution = resolve(entries.as_deref(), &self.fallback);
        for note in &resolution.notes {
            warn!(
                event_name = "planning.config.fallback",
                correlation_id = %request.correlation_id,
                key = %note.key,
                reason = ?note.reason,
                "planning setting fell back to default"
            );
        }

        let products = self.source.products().await.map_err(source_error)?;
        let sales = self.source.sales().await.map_err(source_error)?;
        let losses = self.source.losses().await.map_err(source_error)?;
        let calendar_events = self.source.calendar_events().await.map_err(source_error)?;
        let aggregates = self.source.aggregates().await.map_err(source_error)?;

        let history = group_history(&products, sales, losses, aggregates);

        Ok(self.planner.plan(PlanInput {
            week,
            settings: resolution.settings,
            setting_notes: resolution.notes,
            products: &products,
            history: &history,
            calendar_events: &calendar_events,
            correlation_id: &request.correlation_id,
        }))
    }
}

fn source_error(error: SourceError) -> ApplicationError {
    ApplicationError::Source(error.to_string())
}

/// Groups records under catalog products; records for unknown products are dropped.
fn group_history(
    products: &[Product],
    sales: Vec<MovementRecord>,
    losses: Vec<MovementRecord>,
    mut aggregates: BTreeMap<ProductId, HistoricalAggregates>,
) -> BTreeMap<ProductId, ProductHistory> {
    let mut history: BTreeMap<ProductId, ProductHistory> = products
        .iter()
        .map(|product| {
            let entry = ProductHistory {
                aggregates: aggregates.remove(&product.id),
                ..ProductHistory::default()
            };
            (product.id.clone(), entry)
        })
        .collect();

    for record in sales {
        if let Some(entry) = history.get_mut(&record.product_id) {
            entry.sales.push(record);
        }
    }
    for record in losses {
        if let Some(entry) = history.get_mut(&record.product_id) {
            entry.losses.push(record);
        }
    }

    history
}
