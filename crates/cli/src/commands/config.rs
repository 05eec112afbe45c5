use std::env;
use std::fs;
use std::path::Path;

use bakecast_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_values(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.push(
        "note: planning.* values are fallbacks; the store's configuration entries win per key"
            .to_string(),
    );
    lines.join("\n")
}

struct ConfigField {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn effective_values(config: &AppConfig) -> Vec<ConfigField> {
    let planning = &config.planning;
    let snapshot_path = config
        .data
        .snapshot_path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        ConfigField {
            key: "planning.lookback_weeks",
            value: planning.lookback_weeks.to_string(),
            env_keys: &["BAKECAST_PLANNING_LOOKBACK_WEEKS"],
        },
        ConfigField {
            key: "planning.risk_posture",
            value: planning.risk_posture.as_str().to_string(),
            env_keys: &["BAKECAST_PLANNING_RISK_POSTURE"],
        },
        ConfigField {
            key: "planning.new_product_default",
            value: planning.new_product_default.to_string(),
            env_keys: &["BAKECAST_PLANNING_NEW_PRODUCT_DEFAULT"],
        },
        ConfigField {
            key: "planning.buffer_pct",
            value: planning.buffer_pct.to_string(),
            env_keys: &["BAKECAST_PLANNING_BUFFER_PCT"],
        },
        ConfigField {
            key: "planning.strategy",
            value: planning.strategy.as_str().to_string(),
            env_keys: &["BAKECAST_PLANNING_STRATEGY"],
        },
        ConfigField {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["BAKECAST_LOGGING_LEVEL", "BAKECAST_LOG_LEVEL"],
        },
        ConfigField {
            key: "logging.format",
            value: format!("{:?}", config.logging.format).to_ascii_lowercase(),
            env_keys: &["BAKECAST_LOGGING_FORMAT", "BAKECAST_LOG_FORMAT"],
        },
        ConfigField {
            key: "data.snapshot_path",
            value: snapshot_path,
            env_keys: &["BAKECAST_DATA_SNAPSHOT_PATH"],
        },
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
