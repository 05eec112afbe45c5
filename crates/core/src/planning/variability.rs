use serde::{Deserialize, Serialize};

use crate::planning::settings::{ForecastStrategy, PlanningSettings};

/// Sample standard deviation (`n - 1` denominator); `0.0` below two samples.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let squared: f64 = values.iter().map(|value| (value - mean).powi(2)).sum();
    (squared / (values.len() - 1) as f64).sqrt()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferMethod {
    /// `k · σ` with `k` taken from the risk posture.
    Statistical,
    /// A flat share of predicted demand.
    Percentage,
}

/// Absolute extra units added to predicted demand before loss inversion.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SafetyBuffer {
    pub method: BufferMethod,
    pub std_dev: f64,
    pub safety_factor: f64,
    pub service_level: f64,
    pub buffer_pct: Option<f64>,
    pub units: f64,
}

pub fn statistical_buffer(std_dev: f64, settings: &PlanningSettings) -> SafetyBuffer {
    let posture = settings.risk_posture;
    SafetyBuffer {
        method: BufferMethod::Statistical,
        std_dev,
        safety_factor: posture.safety_factor(),
        service_level: posture.service_level(),
        buffer_pct: None,
        units: posture.safety_factor() * std_dev,
    }
}

pub fn percentage_buffer(
    std_dev: f64,
    predicted_demand: f64,
    settings: &PlanningSettings,
) -> SafetyBuffer {
    let posture = settings.risk_posture;
    SafetyBuffer {
        method: BufferMethod::Percentage,
        std_dev,
        safety_factor: posture.safety_factor(),
        service_level: posture.service_level(),
        buffer_pct: Some(settings.buffer_pct),
        units: predicted_demand * settings.buffer_pct,
    }
}

/// Buffer for the configured strategy, from raw (undamped) weekly sales.
pub fn safety_buffer(
    raw_weekly_sales: &[f64],
    predicted_demand: f64,
    settings: &PlanningSettings,
) -> SafetyBuffer {
    let std_dev = sample_std_dev(raw_weekly_sales);
    match settings.strategy {
        ForecastStrategy::Simple => statistical_buffer(std_dev, settings),
        ForecastStrategy::Blended => percentage_buffer(std_dev, predicted_demand, settings),
    }
}
