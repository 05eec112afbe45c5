pub mod config;
pub mod domain;
pub mod errors;
pub mod planning;

pub use domain::calendar::{CalendarEvent, EventPriority, SectorScope};
pub use domain::product::{Product, ProductId};
pub use domain::records::{LossRecord, MovementRecord, RawQuantity, SalesRecord};
pub use domain::week::TargetWeek;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use planning::{
    ConfidenceLevel, DeterministicForecastEngine, ForecastEngine, ForecastResult,
    ForecastStrategy, InMemoryPlanningSource, PlanRequest, PlanningService, PlanningSettings,
    PlanningSnapshot, PlanningSource, RiskPosture, WeeklyPlan, WeeklyPlanner,
};
