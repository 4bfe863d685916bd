use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Names a YAML file to load before environment overrides are applied.
pub const CONFIG_PATH_ENV: &str = "RAWHTTP_CONFIG";

const DEFAULT_PORT: u16 = 42069;
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    /// Fallback `tracing` filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Config {
    /// Defaults, overlaid by the file named in `RAWHTTP_CONFIG` (if set),
    /// overlaid by the `PORT` and `LOG_LEVEL` environment variables.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };

        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(contents).context("invalid config yaml")
    }

    /// Applies overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.port = port
                .trim()
                .parse()
                .with_context(|| format!("invalid PORT value {port:?}"))?;
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level;
        }

        Ok(())
    }
}
