use bakecast_core::planning::composer::ForecastBasis;
use bakecast_core::planning::loss::MAX_LOSS_RATE;
use bakecast_core::planning::settings::ConfigEntry;
use bakecast_core::planning::variability::BufferMethod;
use bakecast_core::{
    CalendarEvent, ConfidenceLevel, InMemoryPlanningSource, MovementRecord, PlanRequest,
    PlanningService, PlanningSettings, PlanningSnapshot, Product, RiskPosture, WeeklyPlan,
};
use chrono::{Duration, NaiveDate, Weekday};

const WEEK_START: &str = "2025-03-10";
const WEEK_END: &str = "2025-03-16";

fn week_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).expect("valid test date")
}

/// One record per week, oldest first, ending the week before the target week.
fn weekly_records(product_id: &str, weekly: &[f64]) -> Vec<MovementRecord> {
    let weeks = weekly.len() as i64;
    weekly
        .iter()
        .enumerate()
        .map(|(index, quantity)| {
            let day = week_start() - Duration::weeks(weeks - index as i64);
            MovementRecord::new(product_id, day.format("%Y-%m-%d").to_string(), *quantity)
        })
        .collect()
}

fn snapshot(products: Vec<Product>, sales: Vec<MovementRecord>) -> PlanningSnapshot {
    PlanningSnapshot {
        week_start: Some(WEEK_START.to_string()),
        week_end: Some(WEEK_END.to_string()),
        products,
        sales,
        config_entries: Some(Vec::new()),
        ..PlanningSnapshot::default()
    }
}

fn request() -> PlanRequest {
    PlanRequest {
        week_start: Some(WEEK_START.to_string()),
        week_end: Some(WEEK_END.to_string()),
        correlation_id: "scenario".to_string(),
    }
}

async fn plan(snapshot: PlanningSnapshot) -> WeeklyPlan {
    let service =
        PlanningService::new(InMemoryPlanningSource::new(snapshot), PlanningSettings::default());
    match service.plan_week(&request()).await {
        Ok(plan) => plan,
        Err(error) => panic!("planning failed: {error}"),
    }
}

#[tokio::test]
async fn eight_steady_weeks_follow_the_documented_formula() {
    let weekly = [98.0, 101.0, 99.0, 100.0, 102.0, 98.0, 101.0, 100.0];
    let plan = plan(snapshot(
        vec![Product::new("pao-frances", "Pão francês", "padaria")],
        weekly_records("pao-frances", &weekly),
    ))
    .await;
    let forecast = &plan.forecasts[0];

    let weights: f64 = (1..=8_u32).map(f64::from).sum();
    let weighted =
        weekly.iter().zip(1..=8_u32).map(|(v, i)| v * f64::from(i)).sum::<f64>() / weights;
    let older = weekly[..4].iter().sum::<f64>() / 4.0;
    let newer = weekly[4..].iter().sum::<f64>() / 4.0;
    let growth = ((newer - older) / older).clamp(-0.12, 0.12);
    let mean = weekly.iter().sum::<f64>() / 8.0;
    let sigma = (weekly.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 7.0).sqrt();
    let expected = (weighted * (1.0 + growth) + 1.28 * sigma).ceil() as u64;

    assert_eq!(forecast.suggested_production, expected);
    assert_eq!(forecast.suggested_production, 103);
    assert_eq!(forecast.confidence, ConfidenceLevel::High);
    assert_eq!(forecast.basis, ForecastBasis::History);

    let buffer = forecast.breakdown.buffer.expect("buffer computed");
    assert!((buffer.std_dev - sigma).abs() < 1e-9);
    assert!((buffer.units - 1.28 * sigma).abs() < 1e-9);
    assert!(forecast.explanation.contains("8 of 8 weeks"));
}

#[tokio::test]
async fn a_product_without_history_gets_the_default_even_in_a_busy_week() {
    let products = vec![Product::new("bolo-novo", "Bolo novo", "confeitaria")];
    let mut snapshot = snapshot(products, vec![]);
    snapshot.calendar_events = vec![CalendarEvent::new("Mother's Day", "2025-03-15", 60.0)];
    let plan = plan(snapshot).await;
    let forecast = &plan.forecasts[0];

    assert_eq!(forecast.suggested_production, 10);
    assert_eq!(forecast.confidence, ConfidenceLevel::NoData);
    assert_eq!(forecast.basis, ForecastBasis::NewProductDefault);
    assert_eq!(plan.products_defaulted, 1);
    assert!(forecast.explanation.contains("Mother's Day"));
}

#[tokio::test]
async fn configured_default_is_rounded_up() {
    let products = vec![Product::new("bolo-novo", "Bolo novo", "confeitaria")];
    let mut snapshot = snapshot(products, vec![]);
    snapshot.config_entries = Some(vec![ConfigEntry::new("new_product_default", "12,5")]);
    let plan = plan(snapshot).await;

    assert_eq!(plan.forecasts[0].suggested_production, 13);
}

#[tokio::test]
async fn identical_inputs_give_identical_plans() {
    let build = || {
        let mut snapshot = snapshot(
            vec![
                Product::new("baguete", "Baguete", "padaria"),
                Product::new("sonho", "Sonho", "confeitaria"),
            ],
            [
                weekly_records("baguete", &[40.0, 42.0, 39.0, 45.0, 41.0, 44.0]),
                weekly_records("sonho", &[12.0, 0.0, 15.0, 11.0]),
            ]
            .concat(),
        );
        snapshot.losses = weekly_records("sonho", &[1.0, 0.0, 2.0, 1.0]);
        snapshot.calendar_events = vec![
            CalendarEvent::new("Carnival", "2025-02-18", 35.0),
            CalendarEvent::new("Local fair", "2025-03-12", 15.0),
        ];
        snapshot
    };

    let first = plan(build()).await;
    let second = plan(build()).await;
    let first_json = serde_json::to_string(&first).expect("plan serializes");
    let second_json = serde_json::to_string(&second).expect("plan serializes");

    assert_eq!(first, second);
    assert_eq!(first_json, second_json);
}

#[tokio::test]
async fn catastrophic_spoilage_is_capped() {
    let products = vec![Product::new("sonho", "Sonho", "confeitaria")];
    let mut snapshot = snapshot(products, weekly_records("sonho", &[1.0; 6]));
    snapshot.losses = weekly_records("sonho", &[99.0; 6]);
    let plan = plan(snapshot).await;
    let forecast = &plan.forecasts[0];
    let loss = forecast.breakdown.loss_rate.expect("loss rate computed");

    assert_eq!(loss.applied_rate, MAX_LOSS_RATE);
    assert!(loss.clamped);
    let expected = (forecast.breakdown.gross_demand / (1.0 - MAX_LOSS_RATE)).ceil() as u64;
    assert_eq!(forecast.suggested_production, expected);
    assert!(forecast.breakdown.raw_production.is_finite());
}

#[tokio::test]
async fn exceptional_weeks_are_damped_and_target_events_applied() {
    let mut weekly = [100.0; 8];
    weekly[7] = 250.0;
    let products = vec![Product::new("panettone", "Panettone", "padaria")];

    let undamped = plan(snapshot(products.clone(), weekly_records("panettone", &weekly))).await;

    let mut with_calendar = snapshot(products, weekly_records("panettone", &weekly));
    with_calendar.calendar_events = vec![
        CalendarEvent::new("Festival", "2025-03-04", 150.0),
        CalendarEvent::new("Holiday", "2025-03-14", 20.0).for_sectors(["padaria"]),
        CalendarEvent::new("Butcher promo", "2025-03-14", 80.0).for_sectors(["açougue"]),
        CalendarEvent::new("Stocktake", "2025-03-11", 0.0),
    ];
    let damped = plan(with_calendar).await;
    let forecast = &damped.forecasts[0];

    let last_week = forecast.breakdown.window.last().expect("window has weeks");
    assert!((last_week.damping - 0.2).abs() < 1e-12);
    assert!((forecast.calendar_multiplier - 1.2).abs() < 1e-12);
    assert_eq!(forecast.calendar_events.len(), 1);
    assert_eq!(forecast.calendar_notes.len(), 1);
    assert!(forecast.explanation.contains("Holiday"));

    let baseline =
        |plan: &WeeklyPlan| plan.forecasts[0].breakdown.demand.expect("demand").baseline;
    assert!(baseline(&damped) < baseline(&undamped));
}

#[tokio::test]
async fn blended_strategy_uses_last_year_and_a_percentage_buffer() {
    let mut sales = weekly_records("colomba", &[50.0, 55.0, 52.0, 58.0, 54.0, 56.0]);
    let year_ago = week_start() - Duration::weeks(52);
    sales.push(MovementRecord::new("colomba", year_ago.format("%Y-%m-%d").to_string(), 240.0));

    let mut snapshot = snapshot(vec![Product::new("colomba", "Colomba", "padaria")], sales);
    snapshot.config_entries = Some(vec![
        ConfigEntry::new("strategy", "blended"),
        ConfigEntry::new("risk_posture", "conservador"),
        ConfigEntry::new("buffer_pct", "15"),
    ]);
    let plan = plan(snapshot).await;
    let forecast = &plan.forecasts[0];

    assert_eq!(plan.settings.risk_posture, RiskPosture::Conservative);
    assert_eq!(forecast.confidence, ConfidenceLevel::High);

    let demand = forecast.breakdown.demand.expect("demand");
    assert_eq!(demand.year_ago_weekly, Some(80.0));
    assert!((demand.blend_weights.total() - 1.0).abs() < 1e-12);

    let buffer = forecast.breakdown.buffer.expect("buffer");
    assert_eq!(buffer.method, BufferMethod::Percentage);
    assert!((buffer.units - demand.predicted * 0.15).abs() < 1e-9);
    assert!(forecast.explanation.contains("blend"));
}

#[tokio::test]
async fn blended_strategy_falls_back_to_last_year_when_recent_weeks_are_empty() {
    let year_ago_start = week_start() - Duration::weeks(53);
    let sales = vec![MovementRecord::new(
        "panettone",
        year_ago_start.format("%Y-%m-%d").to_string(),
        240.0,
    )];

    let mut snapshot = snapshot(vec![Product::new("panettone", "Panettone", "padaria")], sales);
    snapshot.config_entries = Some(vec![ConfigEntry::new("strategy", "blended")]);
    let plan = plan(snapshot).await;
    let forecast = &plan.forecasts[0];

    assert_eq!(forecast.basis, ForecastBasis::History);
    assert_eq!(forecast.confidence, ConfidenceLevel::NoData);
    assert_eq!(forecast.weeks_with_data, 0);

    let demand = forecast.breakdown.demand.expect("demand from last year");
    assert_eq!(demand.weeks_with_data, 0);
    assert_eq!(demand.recent_average, None);
    assert_eq!(demand.trailing_year_weekly, None);
    assert_eq!(demand.year_ago_weekly, Some(80.0));
    assert_eq!(demand.blend_weights.year_ago, 1.0);

    // 80 a week last year plus the default 10% buffer.
    assert_eq!(forecast.suggested_production, 88);
    assert!(forecast.explanation.contains("last year's figures"));
    assert_eq!(plan.products_defaulted, 0);
}

#[tokio::test]
async fn daily_plan_covers_the_whole_suggestion() {
    let product = Product {
        production_days: vec![Weekday::Sat, Weekday::Tue, Weekday::Thu],
        ..Product::new("croissant", "Croissant", "padaria")
    };
    let plan = plan(snapshot(vec![product], weekly_records("croissant", &[61.0; 5]))).await;
    let forecast = &plan.forecasts[0];

    let days: Vec<Weekday> = forecast.daily_plan.iter().map(|day| day.day).collect();
    assert_eq!(days, vec![Weekday::Tue, Weekday::Thu, Weekday::Sat]);
    let total: u64 = forecast.daily_plan.iter().map(|day| day.units).sum();
    assert_eq!(total, forecast.suggested_production);
}

#[tokio::test]
async fn malformed_records_are_counted_not_fatal() {
    let mut sales = weekly_records("baguete", &[40.0; 4]);
    sales.push(MovementRecord::new("baguete", "not a date", 40.0));
    sales.push(MovementRecord::new("baguete", "2025-03-03", -3.0));
    let plan = plan(snapshot(vec![Product::new("baguete", "Baguete", "padaria")], sales)).await;

    assert_eq!(plan.forecasts[0].skipped_records, 2);
    assert_eq!(plan.skipped_records, 2);
    assert_eq!(plan.forecasts[0].suggested_production, 40);
}
