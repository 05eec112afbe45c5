//! Resolution of the named planning settings kept in the configuration store.
//!
//! The store is a loose key/value list maintained by back-office users. Every key
//! degrades independently to its fallback so a missing or mistyped entry never
//! blocks a plan; each fallback is recorded in [`SettingsResolution::notes`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const MIN_LOOKBACK_WEEKS: u32 = 4;
pub const MAX_LOOKBACK_WEEKS: u32 = 52;
pub const DEFAULT_LOOKBACK_WEEKS: u32 = 8;
pub const DEFAULT_NEW_PRODUCT_SUGGESTION: f64 = 10.0;
pub const DEFAULT_BUFFER_PCT: f64 = 0.10;
pub const MAX_BUFFER_PCT: f64 = 0.30;

pub const KEY_LOOKBACK_WEEKS: &str = "lookback_weeks";
pub const KEY_RISK_POSTURE: &str = "risk_posture";
pub const KEY_NEW_PRODUCT_DEFAULT: &str = "new_product_default";
pub const KEY_BUFFER_PCT: &str = "buffer_pct";
pub const KEY_STRATEGY: &str = "strategy";

/// Risk appetite for the safety buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskPosture {
    #[serde(alias = "conservador")]
    Conservative,
    #[default]
    #[serde(alias = "equilibrado")]
    Balanced,
    #[serde(alias = "agressivo")]
    Aggressive,
}

/// Share of each demand source in the blended baseline.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlendWeights {
    pub recent: f64,
    pub year_ago: f64,
    pub trailing_year: f64,
}

impl BlendWeights {
    pub const RECENT_ONLY: Self = Self { recent: 1.0, year_ago: 0.0, trailing_year: 0.0 };

    pub fn total(&self) -> f64 {
        self.recent + self.year_ago + self.trailing_year
    }

    /// Drops unavailable sources and rescales the rest to sum to one.
    pub fn renormalized(&self, recent: bool, year_ago: bool, trailing_year: bool) -> Option<Self> {
        let kept = Self {
            recent: if recent { self.recent } else { 0.0 },
            year_ago: if year_ago { self.year_ago } else { 0.0 },
            trailing_year: if trailing_year { self.trailing_year } else { 0.0 },
        };
        let total = kept.total();
        if total <= 0.0 {
            return None;
        }

        Some(Self {
            recent: kept.recent / total,
            year_ago: kept.year_ago / total,
            trailing_year: kept.trailing_year / total,
        })
    }
}

impl RiskPosture {
    /// One-sided z-score applied to the weekly standard deviation.
    pub fn safety_factor(self) -> f64 {
        match self {
            Self::Conservative => 0.84,
            Self::Balanced => 1.28,
            Self::Aggressive => 1.65,
        }
    }

    /// Approximate one-sided service level matching [`Self::safety_factor`].
    pub fn service_level(self) -> f64 {
        match self {
            Self::Conservative => 0.80,
            Self::Balanced => 0.90,
            Self::Aggressive => 0.95,
        }
    }

    /// Largest relative growth the trend adjustment may apply, either direction.
    pub fn trend_cap(self) -> f64 {
        match self {
            Self::Conservative => 0.05,
            Self::Balanced => 0.12,
            Self::Aggressive => 0.22,
        }
    }

    pub fn blend_weights(self) -> BlendWeights {
        match self {
            Self::Conservative => {
                BlendWeights { recent: 0.40, year_ago: 0.25, trailing_year: 0.35 }
            }
            Self::Balanced => BlendWeights { recent: 0.50, year_ago: 0.25, trailing_year: 0.25 },
            Self::Aggressive => BlendWeights { recent: 0.65, year_ago: 0.20, trailing_year: 0.15 },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Balanced => "balanced",
            Self::Aggressive => "aggressive",
        }
    }
}

impl fmt::Display for RiskPosture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskPosture {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "conservative" | "conservador" => Ok(Self::Conservative),
            "balanced" | "equilibrado" => Ok(Self::Balanced),
            "aggressive" | "agressivo" => Ok(Self::Aggressive),
            other => Err(format!(
                "unsupported risk posture `{other}` (expected conservative|balanced|aggressive)"
            )),
        }
    }
}

/// Which demand model the engine runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastStrategy {
    /// Recency-weighted average plus a `k·σ` safety buffer.
    #[default]
    Simple,
    /// Recency blended with year-ago and trailing-year baselines plus a flat buffer share.
    Blended,
}

impl ForecastStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Blended => "blended",
        }
    }
}

impl fmt::Display for ForecastStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForecastStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "blended" => Ok(Self::Blended),
            other => Err(format!("unsupported strategy `{other}` (expected simple|blended)")),
        }
    }
}

/// Settings resolved once per request and passed by value into every stage.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanningSettings {
    pub lookback_weeks: u32,
    pub risk_posture: RiskPosture,
    pub new_product_default: f64,
    pub buffer_pct: f64,
    pub strategy: ForecastStrategy,
}

impl Default for PlanningSettings {
    fn default() -> Self {
        Self {
            lookback_weeks: DEFAULT_LOOKBACK_WEEKS,
            risk_posture: RiskPosture::default(),
            new_product_default: DEFAULT_NEW_PRODUCT_SUGGESTION,
            buffer_pct: DEFAULT_BUFFER_PCT,
            strategy: ForecastStrategy::default(),
        }
    }
}

/// A named entry from the configuration store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
}

impl ConfigEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    StoreUnavailable,
    Missing,
    Invalid { value: String },
    Clamped { value: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingNote {
    pub key: String,
    pub reason: FallbackReason,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SettingsResolution {
    pub settings: PlanningSettings,
    pub notes: Vec<SettingNote>,
}

/// Resolves store entries over `fallback`. `None` means the store could not be read.
pub fn resolve(entries: Option<&[ConfigEntry]>, fallback: &PlanningSettings) -> SettingsResolution {
    let mut settings = *fallback;
    let mut notes = Vec::new();

    let Some(entries) = entries else {
        notes.push(SettingNote { key: "*".to_string(), reason: FallbackReason::StoreUnavailable });
        return SettingsResolution { settings, notes };
    };

    let lookup = |key: &str| {
        entries.iter().rev().find(|entry| entry.key.trim().eq_ignore_ascii_case(key)).map(|entry| {
            entry.value.trim().to_string()
        })
    };

    match lookup(KEY_LOOKBACK_WEEKS) {
        None => notes.push(missing(KEY_LOOKBACK_WEEKS)),
        Some(raw) => match raw.parse::<f64>() {
            Ok(weeks) if weeks.is_finite() && weeks >= 1.0 => {
                let requested = weeks.floor() as u32;
                settings.lookback_weeks = requested.clamp(MIN_LOOKBACK_WEEKS, MAX_LOOKBACK_WEEKS);
                if settings.lookback_weeks != requested {
                    notes.push(clamped(KEY_LOOKBACK_WEEKS, raw));
                }
            }
            _ => notes.push(invalid(KEY_LOOKBACK_WEEKS, raw)),
        },
    }

    match lookup(KEY_RISK_POSTURE) {
        None => notes.push(missing(KEY_RISK_POSTURE)),
        Some(raw) => match raw.parse::<RiskPosture>() {
            Ok(posture) => settings.risk_posture = posture,
            Err(_) => notes.push(invalid(KEY_RISK_POSTURE, raw)),
        },
    }

    match lookup(KEY_NEW_PRODUCT_DEFAULT) {
        None => notes.push(missing(KEY_NEW_PRODUCT_DEFAULT)),
        Some(raw) => match parse_decimal(&raw) {
            Some(value) if value >= 0.0 => settings.new_product_default = value,
            _ => notes.push(invalid(KEY_NEW_PRODUCT_DEFAULT, raw)),
        },
    }

    match lookup(KEY_BUFFER_PCT) {
        None => notes.push(missing(KEY_BUFFER_PCT)),
        Some(raw) => match parse_decimal(raw.trim_end_matches('%')) {
            Some(value) if value >= 0.0 => {
                // Store values are percent points: "1" is 1%, "15" is 15%.
                let fraction = value / 100.0;
                settings.buffer_pct = fraction.min(MAX_BUFFER_PCT);
                if fraction > MAX_BUFFER_PCT {
                    notes.push(clamped(KEY_BUFFER_PCT, raw));
                }
            }
            _ => notes.push(invalid(KEY_BUFFER_PCT, raw)),
        },
    }

    match lookup(KEY_STRATEGY) {
        None => notes.push(missing(KEY_STRATEGY)),
        Some(raw) => match raw.parse::<ForecastStrategy>() {
            Ok(strategy) => settings.strategy = strategy,
            Err(_) => notes.push(invalid(KEY_STRATEGY, raw)),
        },
    }

    SettingsResolution { settings, notes }
}

fn parse_decimal(raw: &str) -> Option<f64> {
    raw.trim().replace(',', ".").parse::<f64>().ok().filter(|value| value.is_finite())
}

fn missing(key: &str) -> SettingNote {
    SettingNote { key: key.to_string(), reason: FallbackReason::Missing }
}

fn invalid(key: &str, value: String) -> SettingNote {
    SettingNote { key: key.to_string(), reason: FallbackReason::Invalid { value } }
}

fn clamped(key: &str, value: String) -> SettingNote {
    SettingNote { key: key.to_string(), reason: FallbackReason::Clamped { value } }
}
