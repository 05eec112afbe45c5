use std::fmt;

use serde::{Deserialize, Serialize};

use crate::planning::settings::ForecastStrategy;

pub const HIGH_CONFIDENCE_WEEKS: usize = 8;
pub const HIGH_CONFIDENCE_WEEKS_WITH_YEAR_AGO: usize = 6;
pub const MEDIUM_CONFIDENCE_WEEKS: usize = 4;

/// Advisory reliability label. Never feeds back into the numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    #[serde(rename = "no data")]
    NoData,
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "medium")]
    Medium,
    #[serde(rename = "high")]
    High,
}

impl ConfidenceLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoData => "no data",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn classify(
    weeks_with_data: usize,
    has_year_ago: bool,
    strategy: ForecastStrategy,
) -> ConfidenceLevel {
    let year_ago_counts = has_year_ago && strategy == ForecastStrategy::Blended;
    match weeks_with_data {
        0 => ConfidenceLevel::NoData,
        weeks if weeks >= HIGH_CONFIDENCE_WEEKS => ConfidenceLevel::High,
        weeks if year_ago_counts && weeks >= HIGH_CONFIDENCE_WEEKS_WITH_YEAR_AGO => {
            ConfidenceLevel::High
        }
        weeks if weeks >= MEDIUM_CONFIDENCE_WEEKS => ConfidenceLevel::Medium,
        _ => ConfidenceLevel::Low,
    }
}
