//! Configuration for the pipeline.
//!
//! A TOML file at `$XDG_CONFIG_HOME/sheetforge/config.toml` (or
//! `~/.config/sheetforge/config.toml`, or the path in `SHEETFORGE_CONFIG`)
//! with a resolution chain: env var > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::image::ImageCacheConfig;
use crate::quality::QualityGateConfig;
use crate::schema::{Richness, VisualSettings};
use crate::validate::ValidatorConfig;

pub const CONFIG_ENV: &str = "SHEETFORGE_CONFIG";
pub const CACHE_DIR_ENV: &str = "SHEETFORGE_CACHE_DIR";
pub const CACHE_TTL_ENV: &str = "SHEETFORGE_CACHE_TTL_DAYS";
pub const CACHE_MAX_ENTRIES_ENV: &str = "SHEETFORGE_CACHE_MAX_ENTRIES";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },
}

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub cache: CacheSection,
    pub quality: QualityGateConfig,
    pub validation: ValidatorConfig,
    pub images: ImagesSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub ttl_days: u32,
    pub max_entries: usize,
    /// Directory for `cache-index.json`. Unset keeps the cache in memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persist_dir: Option<PathBuf>,
    pub sweep_interval_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        let defaults = ImageCacheConfig::default();
        Self {
            ttl_days: defaults.ttl_days,
            max_entries: defaults.max_entries,
            persist_dir: None,
            sweep_interval_secs: defaults.sweep_interval.as_secs(),
        }
    }
}

impl CacheSection {
    pub fn to_cache_config(&self) -> ImageCacheConfig {
        ImageCacheConfig {
            ttl_days: self.ttl_days,
            max_entries: self.max_entries,
            persist_path: self.persist_dir.clone(),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs.max(1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesSection {
    pub enabled: bool,
    pub richness: Richness,
}

impl Default for ImagesSection {
    fn default() -> Self {
        Self {
            enabled: true,
            richness: Richness::Standard,
        }
    }
}

impl ImagesSection {
    pub fn visual_settings(&self) -> VisualSettings {
        VisualSettings {
            enabled: self.enabled,
            richness: self.richness,
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the sheetforge config directory: `$XDG_CONFIG_HOME/sheetforge`
/// or `~/.config/sheetforge`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("sheetforge");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("sheetforge")
}

/// Path of the config file, honouring `SHEETFORGE_CONFIG`.
pub fn config_path() -> PathBuf {
    match std::env::var(CONFIG_ENV) {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => config_dir().join("config.toml"),
    }
}

// -----------------------------------------------------------------------
// Loading
// -----------------------------------------------------------------------

/// Load a config file. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<ForgeConfig, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(ForgeConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn env_number<T>(var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidEnv {
                var,
                value,
                reason: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

impl ForgeConfig {
    /// Resolve configuration using the chain: env var > config file > default.
    ///
    /// - Cache dir: `SHEETFORGE_CACHE_DIR` > `cache.persist_dir` > in-memory
    /// - TTL: `SHEETFORGE_CACHE_TTL_DAYS` > `cache.ttl_days` > 30
    /// - Cap: `SHEETFORGE_CACHE_MAX_ENTRIES` > `cache.max_entries` > 500
    pub fn resolve() -> Result<Self, ConfigError> {
        let path = config_path();
        let mut config = load_config_from(&path)?;
        config.apply_env()?;
        tracing::debug!(
            path = %path.display(),
            ttl_days = config.cache.ttl_days,
            max_entries = config.cache.max_entries,
            "configuration resolved"
        );
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
            if !dir.is_empty() {
                self.cache.persist_dir = Some(PathBuf::from(dir));
            }
        }
        if let Some(ttl) = env_number(CACHE_TTL_ENV)? {
            self.cache.ttl_days = ttl;
        }
        if let Some(max) = env_number(CACHE_MAX_ENTRIES_ENV)? {
            self.cache.max_entries = max;
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
