use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::planning::settings::{
    ForecastStrategy, PlanningSettings, RiskPosture, MAX_BUFFER_PCT, MAX_LOOKBACK_WEEKS,
    MIN_LOOKBACK_WEEKS,
};

pub const DEFAULT_CONFIG_FILE: &str = "bakecast.toml";
pub const NESTED_CONFIG_FILE: &str = "config/bakecast.toml";

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    /// Fallback planning settings, used for any key the configuration store lacks.
    pub planning: PlanningSettings,
    pub logging: LoggingConfig,
    pub data: DataConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DataConfig {
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub snapshot_path: Option<PathBuf>,
    pub lookback_weeks: Option<u32>,
    pub risk_posture: Option<RiskPosture>,
    pub strategy: Option<ForecastStrategy>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            planning: PlanningSettings::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            data: DataConfig::default(),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(planning) = patch.planning {
            if let Some(lookback_weeks) = planning.lookback_weeks {
                self.planning.lookback_weeks = lookback_weeks;
            }
            if let Some(risk_posture) = planning.risk_posture {
                self.planning.risk_posture = risk_posture;
            }
            if let Some(new_product_default) = planning.new_product_default {
                self.planning.new_product_default = new_product_default;
            }
            if let Some(buffer_pct) = planning.buffer_pct {
                self.planning.buffer_pct = buffer_pct;
            }
            if let Some(strategy) = planning.strategy {
                self.planning.strategy = strategy;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(data) = patch.data {
            if let Some(snapshot_path) = data.snapshot_path {
                self.data.snapshot_path = Some(snapshot_path);
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("BAKECAST_PLANNING_LOOKBACK_WEEKS") {
            self.planning.lookback_weeks = parse_u32("BAKECAST_PLANNING_LOOKBACK_WEEKS", &value)?;
        }
        if let Some(value) = read_env("BAKECAST_PLANNING_RISK_POSTURE") {
            self.planning.risk_posture = parse_with("BAKECAST_PLANNING_RISK_POSTURE", &value)?;
        }
        if let Some(value) = read_env("BAKECAST_PLANNING_NEW_PRODUCT_DEFAULT") {
            self.planning.new_product_default =
                parse_f64("BAKECAST_PLANNING_NEW_PRODUCT_DEFAULT", &value)?;
        }
        if let Some(value) = read_env("BAKECAST_PLANNING_BUFFER_PCT") {
            self.planning.buffer_pct = parse_f64("BAKECAST_PLANNING_BUFFER_PCT", &value)?;
        }
        if let Some(value) = read_env("BAKECAST_PLANNING_STRATEGY") {
            self.planning.strategy = parse_with("BAKECAST_PLANNING_STRATEGY", &value)?;
        }

        let log_level =
            read_env("BAKECAST_LOGGING_LEVEL").or_else(|| read_env("BAKECAST_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("BAKECAST_LOGGING_FORMAT").or_else(|| read_env("BAKECAST_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        if let Some(value) = read_env("BAKECAST_DATA_SNAPSHOT_PATH") {
            self.data.snapshot_path = Some(PathBuf::from(value));
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(snapshot_path) = overrides.snapshot_path {
            self.data.snapshot_path = Some(snapshot_path);
        }
        if let Some(lookback_weeks) = overrides.lookback_weeks {
            self.planning.lookback_weeks = lookback_weeks;
        }
        if let Some(risk_posture) = overrides.risk_posture {
            self.planning.risk_posture = risk_posture;
        }
        if let Some(strategy) = overrides.strategy {
            self.planning.strategy = strategy;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_planning(&self.planning)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Config file that [`AppConfig::load`] would read, if any.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_planning(planning: &PlanningSettings) -> Result<(), ConfigError> {
    if !(MIN_LOOKBACK_WEEKS..=MAX_LOOKBACK_WEEKS).contains(&planning.lookback_weeks) {
        return Err(ConfigError::Validation(format!(
            "planning.lookback_weeks must be in range {MIN_LOOKBACK_WEEKS}..={MAX_LOOKBACK_WEEKS}"
        )));
    }

    if !planning.new_product_default.is_finite() || planning.new_product_default < 0.0 {
        return Err(ConfigError::Validation(
            "planning.new_product_default must be a non-negative number of units".to_string(),
        ));
    }

    if !planning.buffer_pct.is_finite()
        || planning.buffer_pct < 0.0
        || planning.buffer_pct > MAX_BUFFER_PCT
    {
        return Err(ConfigError::Validation(format!(
            "planning.buffer_pct must be a fraction between 0 and {MAX_BUFFER_PCT} (0.10 means 10%)"
        )));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite())
        .ok_or_else(|| invalid_override(key, value))
}

fn parse_with<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse::<T>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    planning: Option<PlanningPatch>,
    logging: Option<LoggingPatch>,
    data: Option<DataPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct PlanningPatch {
    lookback_weeks: Option<u32>,
    risk_posture: Option<RiskPosture>,
    new_product_default: Option<f64>,
    buffer_pct: Option<f64>,
    strategy: Option<ForecastStrategy>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct DataPatch {
    snapshot_path: Option<PathBuf>,
}
