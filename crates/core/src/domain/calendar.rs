use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::records::lenient_text;
use crate::domain::week::parse_day;

/// Canonical spelling of the "every sector" sentinel.
pub const ALL_SECTORS: &str = "all";

const ALL_SECTORS_ALIASES: &[&str] =
    &[ALL_SECTORS, "all sectors", "*", "todos", "todos os setores"];

/// Sectors a calendar event applies to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum SectorScope {
    #[default]
    All,
    Sectors(BTreeSet<String>),
}

impl SectorScope {
    pub fn includes(&self, sector: &str) -> bool {
        match self {
            Self::All => true,
            Self::Sectors(sectors) => sectors.contains(&normalize_sector(sector)),
        }
    }
}

impl From<Vec<String>> for SectorScope {
    fn from(values: Vec<String>) -> Self {
        let normalized: BTreeSet<String> = values
            .iter()
            .map(|value| normalize_sector(value))
            .filter(|value| !value.is_empty())
            .collect();

        let has_sentinel =
            normalized.iter().any(|value| ALL_SECTORS_ALIASES.contains(&value.as_str()));
        if normalized.is_empty() || has_sentinel {
            return Self::All;
        }
        Self::Sectors(normalized)
    }
}

impl From<SectorScope> for Vec<String> {
    fn from(scope: SectorScope) -> Self {
        match scope {
            SectorScope::All => vec![ALL_SECTORS.to_string()],
            SectorScope::Sectors(sectors) => sectors.into_iter().collect(),
        }
    }
}

pub fn normalize_sector(sector: &str) -> String {
    sector.trim().to_lowercase()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub date: String,
    /// Signed demand impact in percent. Zero marks an informational entry.
    #[serde(default, deserialize_with = "lenient_impact")]
    pub impact_percentage: f64,
    #[serde(default)]
    pub sectors: SectorScope,
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub priority: EventPriority,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CalendarEvent {
    pub fn new(name: impl Into<String>, date: impl Into<String>, impact_percentage: f64) -> Self {
        Self {
            name: name.into(),
            date: date.into(),
            impact_percentage,
            sectors: SectorScope::All,
            event_type: String::new(),
            priority: EventPriority::default(),
            notes: None,
        }
    }

    pub fn for_sectors<I, S>(mut self, sectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sectors = SectorScope::from(sectors.into_iter().map(Into::into).collect::<Vec<_>>());
        self
    }

    pub fn day(&self) -> Option<NaiveDate> {
        parse_day(&self.date)
    }

    pub fn affects(&self, sector: &str) -> bool {
        self.sectors.includes(sector)
    }

    /// Events without a usable impact only annotate the plan.
    pub fn is_informational(&self) -> bool {
        !self.impact_percentage.is_finite() || self.impact_percentage == 0.0
    }
}

/// Null or non-numeric impacts read as 0, which makes the event informational.
fn lenient_impact<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let impact = match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => {
            text.trim().trim_end_matches('%').trim().replace(',', ".").parse::<f64>().ok()
        }
        _ => None,
    };
    Ok(impact.filter(|value| value.is_finite()).unwrap_or(0.0))
}
