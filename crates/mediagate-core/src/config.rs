//! Configuration resolution for mediagate.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (`<config dir>/mediagate/settings.json`)
//! 3. Project config (.mediagate/settings.json)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Complete mediagate configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Authorization bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// How long to wait for the OS prompt result (seconds).
    pub prompt_timeout_secs: u64,
    /// First correlation code handed to the OS prompt.
    pub request_code_base: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            prompt_timeout_secs: 60,
            request_code_base: 1001,
        }
    }
}

impl BridgeConfig {
    pub const fn prompt_timeout(&self) -> Duration {
        Duration::from_secs(self.prompt_timeout_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(project_dir: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_config_path()
        && global_path.exists()
    {
        let global = load_config_file(&global_path)?;
        merge_config(&mut config, global);
    }

    if let Some(dir) = project_dir {
        let project_path = project_config_path(dir);
        if project_path.exists() {
            let project = load_config_file(&project_path)?;
            merge_config(&mut config, project);
        }
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("mediagate").join("settings.json"))
}

/// Project config file path under `dir`.
pub fn project_config_path(dir: &Path) -> PathBuf {
    dir.join(".mediagate").join("settings.json")
}

/// Settings present in one config file; absent keys leave lower layers alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigLayer {
    #[serde(default)]
    pub bridge: BridgeLayer,
    #[serde(default)]
    pub log: LogLayer,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BridgeLayer {
    pub prompt_timeout_secs: Option<u64>,
    pub request_code_base: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogLayer {
    pub level: Option<String>,
    pub json: Option<bool>,
}

pub fn load_config_file(path: &Path) -> Result<ConfigLayer> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

/// Fold `overlay` into `base`, key by key.
pub fn merge_config(base: &mut Config, overlay: ConfigLayer) {
    if let Some(secs) = overlay.bridge.prompt_timeout_secs {
        base.bridge.prompt_timeout_secs = secs;
    }
    if let Some(code) = overlay.bridge.request_code_base {
        base.bridge.request_code_base = code;
    }
    if let Some(level) = overlay.log.level {
        base.log.level = level;
    }
    if let Some(json) = overlay.log.json {
        base.log.json = json;
    }
}

/// Apply `MEDIAGATE_*` overrides read through `lookup`.
///
/// Unparseable numeric values are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("MEDIAGATE_PROMPT_TIMEOUT_SECS")
        && let Ok(n) = val.parse()
    {
        config.bridge.prompt_timeout_secs = n;
    }
    if let Some(val) = lookup("MEDIAGATE_REQUEST_CODE_BASE")
        && let Ok(n) = val.parse()
    {
        config.bridge.request_code_base = n;
    }
    if let Some(val) = lookup("MEDIAGATE_LOG_LEVEL") {
        config.log.level = val;
    }
}
