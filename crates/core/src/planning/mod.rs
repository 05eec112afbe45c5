//! Weekly production planning: history in, one suggested quantity per product out.

pub mod calendar;
pub mod composer;
pub mod confidence;
pub mod demand;
pub mod engine;
pub mod loss;
pub mod settings;
pub mod source;
pub mod variability;
pub mod window;

pub use composer::{
    compose_forecast, DailyAllocation, ForecastBasis, ForecastBreakdown, ForecastResult,
    TrendLabel,
};
pub use confidence::ConfidenceLevel;
pub use engine::{
    DeterministicForecastEngine, ForecastEngine, PlanContext, PlanInput, ProductHistory,
    WeeklyPlan, WeeklyPlanner,
};
pub use settings::{
    resolve, ConfigEntry, ForecastStrategy, PlanningSettings, RiskPosture, SettingNote,
    SettingsResolution,
};
pub use source::{
    InMemoryPlanningSource, PlanRequest, PlanningService, PlanningSnapshot, PlanningSource,
    SourceError,
};
