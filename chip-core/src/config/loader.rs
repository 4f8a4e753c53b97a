//! Configuration loading and management

use super::schema::Config;
use super::validate::validate_config;
use crate::{Error, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Prefix of `CHIP__SECTION__KEY` environment overrides
const ENV_PREFIX: &str = "CHIP__";

/// Configuration loader
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// Create a new config loader with the default config directory
    pub fn new() -> Self {
        let config_dir = dirs::home_dir()
            .map(|h| h.join(".chip"))
            .unwrap_or_else(|| PathBuf::from(".chip"));

        Self { config_dir }
    }

    /// Create a new config loader with a custom config directory
    pub fn with_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            config_dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the JSON config file inside the config directory
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    /// Load configuration from file and environment
    ///
    /// Precedence, lowest first: built-in defaults, `config.json`, the
    /// `OPENAI_*` aliases, then `CHIP__SECTION__KEY` overrides.
    pub fn load(&self) -> Result<Config> {
        let mut config = self.read_file()?;
        apply_openai_aliases(&mut config);

        let overrides = env_overrides(std::env::vars());
        if !overrides.is_empty() {
            let mut tree = serde_json::to_value(&config)?;
            for (path, raw) in &overrides {
                apply_override(&mut tree, path, raw)?;
            }
            config = serde_json::from_value(tree)?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &Config) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(self.config_path(), content)?;
        Ok(())
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Every section and field carries a serde default, so a partial file
    /// only replaces the keys it names.
    fn read_file(&self) -> Result<Config> {
        let path = self.config_path();
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_openai_aliases(config: &mut Config) {
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        config.provider.api_key = key;
    }
    if let Ok(base) = std::env::var("OPENAI_BASE_URL") {
        config.provider.api_base = Some(base);
    }
}

/// Collect `CHIP__A__B=value` pairs as (`["a", "b"]`, value), sorted by key
fn env_overrides<I>(vars: I) -> Vec<(Vec<String>, String)>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut overrides: Vec<(Vec<String>, String)> = vars
        .into_iter()
        .filter_map(|(key, value)| {
            let path: Vec<String> = key
                .strip_prefix(ENV_PREFIX)?
                .split("__")
                .filter(|s| !s.is_empty())
                .map(str::to_ascii_lowercase)
                .collect();
            (path.len() >= 2).then_some((path, value))
        })
        .collect();
    overrides.sort();
    overrides
}

/// Write `raw` at `path`, typed after the value it replaces
///
/// Only the last segment may name a key that does not exist yet (map entries
/// such as `logging.overrides.<target>`); those are stored as strings.
fn apply_override(tree: &mut Value, path: &[String], raw: &str) -> Result<()> {
    let Some((leaf, parents)) = path.split_last() else {
        return Ok(());
    };

    let mut node = tree;
    for segment in parents {
        node = match node.get_mut(segment.as_str()) {
            Some(child) => child,
            None => {
                tracing::warn!(
                    "Ignoring {}{}: unknown config section",
                    ENV_PREFIX,
                    path.join("__").to_ascii_uppercase()
                );
                return Ok(());
            }
        };
        if node.is_null() {
            *node = Value::Object(Default::default());
        }
    }

    let Some(map) = node.as_object_mut() else {
        return Err(Error::Config(format!(
            "{} is not a config section",
            parents.join(".")
        )));
    };

    let value = match map.get(leaf.as_str()) {
        Some(current) => coerce(current, raw).ok_or_else(|| {
            Error::Config(format!(
                "invalid value for {}: {:?}",
                path.join("."),
                raw
            ))
        })?,
        None => Value::String(raw.to_string()),
    };
    map.insert(leaf.clone(), value);
    Ok(())
}

fn coerce(current: &Value, raw: &str) -> Option<Value> {
    match current {
        Value::String(_) => Some(Value::String(raw.to_string())),
        Value::Bool(_) => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(Value::Bool(true)),
            "false" | "0" | "no" => Some(Value::Bool(false)),
            _ => None,
        },
        Value::Number(n) if n.is_f64() => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        Value::Number(_) => raw.trim().parse::<u64>().ok().map(Value::from),
        Value::Object(_) | Value::Array(_) => serde_json::from_str(raw).ok(),
        // Unset optionals: a JSON object (extra_headers) or plain text (api_base)
        Value::Null => Some(match serde_json::from_str::<Value>(raw) {
            Ok(parsed @ Value::Object(_)) => parsed,
            _ => Value::String(raw.to_string()),
        }),
    }
}
