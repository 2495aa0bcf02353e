// src/config/loader.rs
//! Layered TOML configuration loader with environment overrides

use crate::config::{constants::paths, DevicesConfig};
use crate::error::{DaqError, DaqResult, IntoDaqError};
use crate::error_context;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Loads `DevicesConfig` from a stack of TOML files.
///
/// Files are merged in order, later files overriding earlier ones key by key,
/// then `DAQ_<SECTION>__<FIELD>` environment variables are applied on top.
pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
    current_config: Arc<RwLock<DevicesConfig>>,
}

impl ConfigLoader {
    /// Loader over the default search paths
    pub fn new() -> Self {
        Self::with_paths(vec![
            PathBuf::from(paths::DEFAULT_CONFIG_FILE),
            PathBuf::from(paths::LOCAL_CONFIG_FILE),
        ])
    }

    /// Create loader with custom paths
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            config_paths: paths,
            current_config: Arc::new(RwLock::new(DevicesConfig::default())),
        }
    }

    /// Parse and validate a configuration held in memory
    pub fn from_toml_str(content: &str) -> DaqResult<DevicesConfig> {
        let config: DevicesConfig = toml::from_str(content).map_err(|e| DaqError::Configuration {
            component: "config_loader".to_string(),
            reason: e.to_string(),
            context: error_context!("config_loader", "from_toml_str"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a single file, ignoring the search paths
    pub fn load_file<P: AsRef<Path>>(path: P) -> DaqResult<DevicesConfig> {
        let content = std::fs::read_to_string(path.as_ref()).daq_err("config_loader", "load_file")?;
        Self::from_toml_str(&content)
    }

    /// Merge every existing file of the search path, apply overrides and validate
    pub fn load(&self) -> DaqResult<DevicesConfig> {
        let mut merged = toml::Value::try_from(DevicesConfig::default())
            .daq_err("config_loader", "load")?;

        for config_path in &self.config_paths {
            if !config_path.exists() {
                continue;
            }
            let content = std::fs::read_to_string(config_path).daq_err("config_loader", "load")?;
            let overlay: toml::Value = toml::from_str(&content).map_err(|e| DaqError::Configuration {
                component: "config_loader".to_string(),
                reason: format!("{}: {}", config_path.display(), e),
                context: error_context!("config_loader", "load"),
            })?;
            merge_toml_values(&mut merged, overlay);
        }

        apply_environment_overrides(&mut merged, std::env::vars());

        let config: DevicesConfig = merged.try_into().map_err(|e: toml::de::Error| {
            DaqError::configuration("config_loader", "load", format!("failed to deserialize config: {}", e))
        })?;
        config.validate()?;

        *self.current_config.write() = config.clone();
        tracing::debug!(paths = ?self.config_paths, "configuration loaded");
        Ok(config)
    }

    /// Last successfully loaded configuration
    pub fn current_config(&self) -> DevicesConfig {
        self.current_config.read().clone()
    }

    /// Export current configuration to file
    pub fn export_config<P: AsRef<Path>>(&self, path: P) -> DaqResult<()> {
        let content = toml::to_string_pretty(&self.current_config())
            .daq_err("config_loader", "export_config")?;
        std::fs::write(path, content).daq_err("config_loader", "export_config")
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_toml_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                if let Some(base_value) = base_table.get_mut(&key) {
                    merge_toml_values(base_value, value);
                } else {
                    base_table.insert(key, value);
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value;
        }
    }
}

fn apply_environment_overrides<I>(config: &mut toml::Value, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        let Some(stripped) = key.strip_prefix(paths::ENV_PREFIX) else {
            continue;
        };
        let path: Vec<String> = stripped
            .split(paths::ENV_SEPARATOR)
            .map(|part| part.to_lowercase())
            .collect();
        set_nested_value(config, &path, parse_env_value(&value));
    }
}

fn parse_env_value(value: &str) -> toml::Value {
    if let Ok(int_val) = value.parse::<i64>() {
        toml::Value::Integer(int_val)
    } else if let Ok(float_val) = value.parse::<f64>() {
        toml::Value::Float(float_val)
    } else if let Ok(bool_val) = value.parse::<bool>() {
        toml::Value::Boolean(bool_val)
    } else {
        toml::Value::String(value.to_string())
    }
}

fn set_nested_value(config: &mut toml::Value, path: &[String], value: toml::Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut current = config;
    for part in parents {
        let toml::Value::Table(table) = current else {
            return;
        };
        current = table
            .entry(part.clone())
            .or_insert_with(|| toml::Value::Table(toml::value::Table::new()));
    }

    if let toml::Value::Table(table) = current {
        table.insert(last.clone(), value);
    }
}
