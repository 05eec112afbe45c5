use std::path::{Path, PathBuf};

use bakecast_core::config::{AppConfig, LoadOptions};
use bakecast_core::{
    InMemoryPlanningSource, PlanRequest, PlanningService, PlanningSnapshot, TargetWeek,
};
use serde::Serialize;

use crate::commands::{escape_json, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Skipped, details: details.into() }
    }
}

/// Exit code is 1 when any check fails.
pub fn run(json_output: bool, input: Option<&Path>) -> CommandResult {
    let report = build_report(input);
    let exit_code = u8::from(report.overall_status == CheckStatus::Fail);

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(input: Option<&Path>) -> DoctorReport {
    let mut checks = Vec::new();

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass(
                "config_validation",
                "configuration loaded and validated",
            ));
            Some(config)
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            None
        }
    };

    let snapshot_path: Option<PathBuf> = input
        .map(Path::to_path_buf)
        .or_else(|| config.as_ref().and_then(|config| config.data.snapshot_path.clone()));
    let snapshot = match snapshot_path {
        None => {
            checks.push(DoctorCheck::skipped(
                "snapshot_readable",
                "no snapshot configured (pass --input or set data.snapshot_path)",
            ));
            None
        }
        Some(path) => check_snapshot(&path, &mut checks),
    };

    match &snapshot {
        Some(snapshot) => checks.push(check_target_week(snapshot)),
        None => checks.push(DoctorCheck::skipped(
            "target_week",
            "skipped because no snapshot was loaded",
        )),
    }

    match (&config, snapshot) {
        (Some(config), Some(snapshot)) => checks.push(check_dry_run(config, snapshot)),
        _ => checks.push(DoctorCheck::skipped(
            "planning_dry_run",
            "skipped because configuration or snapshot is unavailable",
        )),
    }

    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_snapshot(path: &Path, checks: &mut Vec<DoctorCheck>) -> Option<PlanningSnapshot> {
    let parsed = std::fs::read_to_string(path)
        .map_err(|error| format!("failed to read `{}`: {error}", path.display()))
        .and_then(|raw| {
            PlanningSnapshot::from_json(&raw)
                .map_err(|error| format!("failed to parse `{}`: {error}", path.display()))
        });

    match parsed {
        Ok(snapshot) => {
            checks.push(DoctorCheck::pass(
                "snapshot_readable",
                format!(
                    "`{}`: {} products, {} sales, {} losses, {} calendar events",
                    path.display(),
                    snapshot.products.len(),
                    snapshot.sales.len(),
                    snapshot.losses.len(),
                    snapshot.calendar_events.len()
                ),
            ));
            Some(snapshot)
        }
        Err(details) => {
            checks.push(DoctorCheck::fail("snapshot_readable", details));
            None
        }
    }
}

fn check_target_week(snapshot: &PlanningSnapshot) -> DoctorCheck {
    match TargetWeek::parse(snapshot.week_start.as_deref(), snapshot.week_end.as_deref()) {
        Ok(week) => DoctorCheck::pass(
            "target_week",
            format!("{} to {} ({} days)", week.start, week.end, week.days()),
        ),
        Err(error) => DoctorCheck::fail("target_week", error.to_string()),
    }
}

fn check_dry_run(config: &AppConfig, snapshot: PlanningSnapshot) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck::fail(
                "planning_dry_run",
                format!("failed to initialize async runtime: {error}"),
            );
        }
    };

    let request = PlanRequest {
        week_start: snapshot.week_start.clone(),
        week_end: snapshot.week_end.clone(),
        correlation_id: "doctor-dry-run".to_string(),
    };
    let service = PlanningService::new(InMemoryPlanningSource::new(snapshot), config.planning);

    match runtime.block_on(service.plan_week(&request)) {
        Ok(plan) => DoctorCheck::pass(
            "planning_dry_run",
            format!(
                "{} products planned ({} on the new-product default, {} degraded), {} units",
                plan.products_planned,
                plan.products_defaulted,
                plan.products_degraded,
                plan.total_suggested()
            ),
        ),
        Err(error) => DoctorCheck::fail("planning_dry_run", error.to_string()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
