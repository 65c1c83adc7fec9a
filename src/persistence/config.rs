use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// User settings stored in config.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// tracing filter used when RUST_LOG is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Render timestamps in local time instead of UTC
    #[serde(default = "default_local_time")]
    pub local_time: bool,

    /// Where `roadmap report` writes when no --output is given
    #[serde(default)]
    pub report_dir: Option<PathBuf>,
}

fn default_log_filter() -> String {
    "warn".to_string()
}

fn default_local_time() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            local_time: default_local_time(),
            report_dir: None,
        }
    }
}

/// Load config from config.json, falling back to defaults when absent
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();

    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let config: Config = serde_json::from_str(&content)
        .with_context(|| format!("Invalid config: {}", path.display()))?;
    Ok(config)
}

/// Save config to config.json
pub fn save_config<P: AsRef<Path>>(path: P, config: &Config) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    crate::persistence::atomic_write(path, &json)?;
    Ok(())
}
