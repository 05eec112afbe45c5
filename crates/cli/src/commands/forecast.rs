use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use bakecast_core::config::{AppConfig, LoadOptions};
use bakecast_core::{
    InMemoryPlanningSource, InterfaceError, PlanRequest, PlanningService, PlanningSnapshot,
    WeeklyPlan,
};
use tracing::info;

use crate::commands::CommandResult;

const COMMAND: &str = "forecast";

#[derive(Clone, Debug, Default)]
pub struct ForecastArgs {
    pub input: Option<PathBuf>,
    pub week_start: Option<String>,
    pub week_end: Option<String>,
    pub correlation_id: Option<String>,
    pub compact: bool,
}

pub fn run(args: &ForecastArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let Some(path) = args.input.clone().or_else(|| config.data.snapshot_path.clone()) else {
        return CommandResult::failure(
            COMMAND,
            "snapshot",
            "no snapshot given: pass --input or set data.snapshot_path",
            4,
        );
    };
    let snapshot = match load_snapshot(&path) {
        Ok(snapshot) => snapshot,
        Err(error) => return CommandResult::failure(COMMAND, "snapshot", format!("{error:#}"), 4),
    };

    let request = build_request(args, &snapshot);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let service = PlanningService::new(InMemoryPlanningSource::new(snapshot), config.planning);
    match runtime.block_on(service.plan_week(&request)) {
        Ok(plan) => {
            info!(
                event_name = "cli.forecast.completed",
                correlation_id = %request.correlation_id,
                snapshot = %path.display(),
                products_planned = plan.products_planned,
                "forecast command completed"
            );
            render_plan(&plan, args.compact)
        }
        Err(error) => {
            let interface = error.into_interface(request.correlation_id.as_str());
            let (error_class, exit_code) = match &interface {
                InterfaceError::BadRequest { .. } => ("bad_request", 5),
                InterfaceError::ServiceUnavailable { .. } => ("source_unavailable", 6),
            };
            CommandResult::failure_with_correlation(
                COMMAND,
                error_class,
                format!("{} ({interface})", interface.user_message()),
                Some(interface.correlation_id()),
                exit_code,
            )
        }
    }
}

/// Command-line week bounds take precedence over the ones stored in the snapshot.
fn build_request(args: &ForecastArgs, snapshot: &PlanningSnapshot) -> PlanRequest {
    let week_start = args.week_start.clone().or_else(|| snapshot.week_start.clone());
    let week_end = args.week_end.clone().or_else(|| snapshot.week_end.clone());
    let correlation_id = args.correlation_id.clone().unwrap_or_else(|| {
        format!("forecast-{}", week_start.as_deref().unwrap_or("unscheduled").trim())
    });

    PlanRequest { week_start, week_end, correlation_id }
}

fn load_snapshot(path: &Path) -> anyhow::Result<PlanningSnapshot> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot `{}`", path.display()))?;
    PlanningSnapshot::from_json(&raw)
        .with_context(|| format!("failed to parse snapshot `{}`", path.display()))
}

fn render_plan(plan: &WeeklyPlan, compact: bool) -> CommandResult {
    let rendered =
        if compact { serde_json::to_string(plan) } else { serde_json::to_string_pretty(plan) };

    match rendered {
        Ok(output) => CommandResult::output(output),
        Err(error) => CommandResult::failure(
            COMMAND,
            "serialization",
            format!("failed to serialize weekly plan: {error}"),
            6,
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use bakecast_core::PlanningSnapshot;

    use super::{build_request, ForecastArgs};

    #[test]
    fn command_line_week_overrides_snapshot_week() {
        let snapshot = PlanningSnapshot {
            week_start: Some("2025-03-10".to_string()),
            week_end: Some("2025-03-16".to_string()),
            ..PlanningSnapshot::default()
        };
        let args = ForecastArgs {
            input: Some(PathBuf::from("snapshot.json")),
            week_start: Some("2025-03-17".to_string()),
            ..ForecastArgs::default()
        };

        let request = build_request(&args, &snapshot);

        assert_eq!(request.week_start.as_deref(), Some("2025-03-17"));
        assert_eq!(request.week_end.as_deref(), Some("2025-03-16"));
        assert_eq!(request.correlation_id, "forecast-2025-03-17");
    }

    #[test]
    fn explicit_correlation_id_is_kept() {
        let args = ForecastArgs {
            correlation_id: Some("req-42".to_string()),
            ..ForecastArgs::default()
        };

        let request = build_request(&args, &PlanningSnapshot::default());

        assert_eq!(request.correlation_id, "req-42");
        assert_eq!(request.week_start, None);
    }
}
