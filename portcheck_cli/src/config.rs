use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Deserialize, Serialize, Debug, Default, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub resolver: ResolverSection,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CacheConfig {
    /// SQLite file path; empty string means the XDG data default.
    pub db_path: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SourcesConfig {
    pub gamedb_base_url: String,
    pub gamedb_api_key: String,
    pub gamedb_min_interval_ms: u64,
    pub opencritic_base_url: String,
    pub opencritic_min_interval_ms: u64,
    pub min_confidence: f64,
    pub request_timeout_seconds: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ResolverSection {
    pub ttl_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: String::new(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            gamedb_base_url: "https://api.gamedb.example/v4".to_string(),
            gamedb_api_key: String::new(),
            gamedb_min_interval_ms: 250,
            opencritic_base_url: "https://api.opencritic.com/api".to_string(),
            opencritic_min_interval_ms: 500,
            min_confidence: 0.5,
            request_timeout_seconds: 30,
        }
    }
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self { ttl_days: 7 }
    }
}

impl AppConfig {
    /// Effective cache database path, resolving the XDG default.
    pub fn cache_db_path(&self) -> PathBuf {
        if !self.cache.db_path.is_empty() {
            return PathBuf::from(&self.cache.db_path);
        }
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("portcheck/cache.db")
    }
}

/// Configuration manager that handles XDG-compliant paths and layered
/// configuration
pub struct ConfigManager {
    config_path: PathBuf,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    /// Create a new ConfigManager with default XDG-compliant paths
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a ConfigManager with a specific path (for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn get_config_path(&self) -> PathBuf {
        self.config_path.clone()
    }

    fn default_config_path() -> PathBuf {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg_config).join("portcheck/config.toml");
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("portcheck/config.toml")
    }

    /// Path of the manual overrides table, next to the config file.
    pub fn overrides_path(&self) -> PathBuf {
        self.config_path
            .parent()
            .map(|p| p.join("overrides.toml"))
            .unwrap_or_else(|| PathBuf::from("overrides.toml"))
    }

    /// Load configuration with layered priority: ENV > File > Defaults
    pub fn load(&self) -> Result<AppConfig> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));

        if self.config_path.exists() {
            figment = figment.merge(Toml::file(&self.config_path));
        }

        figment = figment.merge(Env::prefixed("PORTCHECK_").split("__"));

        figment.extract().context("Failed to load configuration")
    }

    /// Get a configuration value by key (dot notation)
    pub fn get(&self, key: &str) -> Result<String> {
        let config = self.load()?;
        let toml_string = toml::to_string(&config)?;
        let value: toml::Value = toml::from_str(&toml_string)?;

        let mut current = &value;
        for part in key.split('.') {
            match current {
                toml::Value::Table(table) => {
                    current = table
                        .get(part)
                        .ok_or_else(|| anyhow::anyhow!("Key '{}' not found", key))?;
                }
                _ => anyhow::bail!("Invalid key path: {}", key),
            }
        }

        match current {
            toml::Value::String(s) => Ok(s.clone()),
            toml::Value::Integer(i) => Ok(i.to_string()),
            toml::Value::Float(f) => Ok(f.to_string()),
            toml::Value::Boolean(b) => Ok(b.to_string()),
            _ => anyhow::bail!("Value at '{}' is not a simple type", key),
        }
    }

    /// Set a configuration value by key (dot notation)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.validate_config_value(key, value)?;

        let mut config = if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path)?;
            toml::from_str(&content)?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };

        let parts: Vec<&str> = key.split('.').collect();
        if parts.is_empty() {
            anyhow::bail!("Empty key");
        }

        let mut current = &mut config;
        for (i, part) in parts.iter().enumerate() {
            if i == parts.len() - 1 {
                if let toml::Value::Table(table) = current {
                    let parsed_value = Self::parse_config_value(key, value);
                    table.insert(part.to_string(), parsed_value);
                } else {
                    anyhow::bail!("Cannot set value on non-table");
                }
            } else {
                if let toml::Value::Table(table) = current {
                    if !table.contains_key(*part) {
                        table.insert(part.to_string(), toml::Value::Table(toml::map::Map::new()));
                    }
                    current = table.get_mut(*part).unwrap();
                } else {
                    anyhow::bail!("Invalid key path: expected table at '{}'", part);
                }
            }
        }

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(&config)?;
        fs::write(&self.config_path, toml_string)?;

        Ok(())
    }

    /// List all configuration values
    pub fn list(&self) -> Result<Vec<(String, String)>> {
        let config = self.load()?;
        let toml_string = toml::to_string(&config)?;
        let value: toml::Value = toml::from_str(&toml_string)?;

        let mut items = Vec::new();
        Self::collect_values(&value, String::new(), &mut items);
        items.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(items)
    }

    fn collect_values(value: &toml::Value, prefix: String, items: &mut Vec<(String, String)>) {
        match value {
            toml::Value::Table(table) => {
                for (key, val) in table {
                    let new_prefix = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    Self::collect_values(val, new_prefix, items);
                }
            }
            toml::Value::String(s) => items.push((prefix, s.clone())),
            toml::Value::Integer(i) => items.push((prefix, i.to_string())),
            toml::Value::Float(f) => items.push((prefix, f.to_string())),
            toml::Value::Boolean(b) => items.push((prefix, b.to_string())),
            _ => {}
        }
    }

    fn validate_config_value(&self, key: &str, value: &str) -> Result<()> {
        match key {
            "resolver.ttl_days" => {
                let days: u32 = value.parse().context("ttl_days must be a positive integer")?;
                if days == 0 {
                    anyhow::bail!("ttl_days must be greater than 0");
                }
            }
            "sources.min_confidence" => {
                let confidence: f64 = value
                    .parse()
                    .context("min_confidence must be a number between 0 and 1")?;
                if !(0.0..=1.0).contains(&confidence) {
                    anyhow::bail!("min_confidence must be between 0 and 1");
                }
            }
            "sources.gamedb_min_interval_ms"
            | "sources.opencritic_min_interval_ms"
            | "sources.request_timeout_seconds" => {
                let _: u64 = value
                    .parse()
                    .context("Value must be a non-negative integer")?;
            }
            _ => {}
        }
        Ok(())
    }

    fn parse_config_value(key: &str, value: &str) -> toml::Value {
        match key {
            k if k.ends_with("_ms") || k.ends_with("_days") || k.ends_with("_seconds") => value
                .parse::<i64>()
                .map(toml::Value::Integer)
                .unwrap_or_else(|_| toml::Value::String(value.to_string())),
            "sources.min_confidence" => value
                .parse::<f64>()
                .map(toml::Value::Float)
                .unwrap_or_else(|_| toml::Value::String(value.to_string())),
            _ => toml::Value::String(value.to_string()),
        }
    }
}

/// Get the default configuration
pub fn get_config() -> Result<AppConfig> {
    ConfigManager::new().load()
}
