//! Calendar influence on history (damping) and on the target week (multiplier).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::calendar::CalendarEvent;
use crate::domain::week::TargetWeek;
use crate::planning::window::WeeklyBucket;

/// Smallest weight an exceptional week keeps in the baseline.
pub const MIN_DAMPING: f64 = 0.2;
/// How strongly an event's impact reduces its week's weight.
pub const DAMPING_SENSITIVITY: f64 = 1.2;

/// Calendar events with parsed dates, sorted by date then name.
#[derive(Clone, Debug, Default)]
pub struct CalendarIndex {
    events: Vec<(NaiveDate, CalendarEvent)>,
    skipped_events: usize,
}

impl CalendarIndex {
    pub fn new(events: &[CalendarEvent]) -> Self {
        let mut parsed = Vec::with_capacity(events.len());
        let mut skipped_events = 0;
        for event in events {
            match event.day() {
                Some(date) => parsed.push((date, event.clone())),
                None => skipped_events += 1,
            }
        }
        parsed.sort_by(|left, right| {
            left.0.cmp(&right.0).then_with(|| left.1.name.cmp(&right.1.name))
        });
        Self { events: parsed, skipped_events }
    }

    pub fn skipped_events(&self) -> usize {
        self.skipped_events
    }

    /// Events dated within `[start, end]` that reach `sector`.
    pub fn affecting<'a>(
        &'a self,
        sector: &'a str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Iterator<Item = (NaiveDate, &'a CalendarEvent)> + 'a {
        let first = self.events.partition_point(|(date, _)| *date < start);
        self.events[first..]
            .iter()
            .take_while(move |(date, _)| *date <= end)
            .filter(move |(_, event)| event.affects(sector))
            .map(|(date, event)| (*date, event))
    }
}

/// Weight an event with `impact_percentage` leaves on its week.
pub fn damping_candidate(impact_percentage: f64) -> f64 {
    (1.0 - impact_percentage.abs() / 100.0 * DAMPING_SENSITIVITY).max(MIN_DAMPING)
}

/// Most extreme damping among impactful events inside `[start, end]`.
pub fn damping_factor(
    calendar: &CalendarIndex,
    sector: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> f64 {
    calendar
        .affecting(sector, start, end)
        .filter(|(_, event)| !event.is_informational())
        .map(|(_, event)| damping_candidate(event.impact_percentage))
        .fold(1.0, f64::min)
}

pub fn apply_damping(buckets: &mut [WeeklyBucket], calendar: &CalendarIndex, sector: &str) {
    for bucket in buckets {
        bucket.damping = damping_factor(calendar, sector, bucket.week_start, bucket.week_end);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppliedEvent {
    pub name: String,
    pub date: NaiveDate,
    pub impact_percentage: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventNote {
    pub name: String,
    pub date: NaiveDate,
    pub event_type: String,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetWeekImpact {
    pub multiplier: f64,
    pub applied: Vec<AppliedEvent>,
    pub informational: Vec<EventNote>,
}

impl TargetWeekImpact {
    pub fn neutral() -> Self {
        Self { multiplier: 1.0, applied: Vec::new(), informational: Vec::new() }
    }
}

/// Combines every impactful target-week event multiplicatively.
pub fn target_week_impact(
    calendar: &CalendarIndex,
    sector: &str,
    week: &TargetWeek,
) -> TargetWeekImpact {
    let mut impact = TargetWeekImpact::neutral();

    for (date, event) in calendar.affecting(sector, week.start, week.end) {
        if event.is_informational() {
            impact.informational.push(EventNote {
                name: event.name.clone(),
                date,
                event_type: event.event_type.clone(),
                notes: event.notes.clone(),
            });
            continue;
        }

        impact.multiplier *= combined_factor(event.impact_percentage);
        impact.applied.push(AppliedEvent {
            name: event.name.clone(),
            date,
            impact_percentage: event.impact_percentage,
        });
    }

    impact
}

/// Demand factor of a single event; an impact below -100% stops demand entirely.
pub fn combined_factor(impact_percentage: f64) -> f64 {
    (1.0 + impact_percentage / 100.0).max(0.0)
}
