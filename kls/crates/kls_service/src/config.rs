use kls_classpath::{ClassIndexCache, ClasspathScanner};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read service config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse service config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// What the registry does with a cached service whose module is no longer live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaleEntryPolicy {
    /// Remove the stale service from the map and destroy it before building
    /// its replacement.
    #[default]
    Dispose,
    /// Leave the stale service untouched until its replacement overwrites
    /// the map entry. It is never destroyed by the registry.
    Retain,
}

/// Persistent class index settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexCacheConfig {
    pub enabled: bool,
    /// Overrides the default cache location.
    pub dir: Option<PathBuf>,
}

/// Back-off settings for connection-retry helpers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay_ms: 5_000,
        }
    }
}

/// Top-level configuration of the analysis service layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Platform installation handed to the analysis engine before classpath
    /// reads. Detected from the environment when unset.
    pub platform_home: Option<PathBuf>,
    /// Boot entries for modules that do not declare a platform of their own.
    pub default_boot_classpath: Vec<PathBuf>,
    pub stale_entries: StaleEntryPolicy,
    pub index_cache: IndexCacheConfig,
    pub reconnect: ReconnectConfig,
}

impl ServiceConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Configured platform home, falling back to `JAVA_HOME` and then to the
    /// installation that owns the `java` binary on `PATH`.
    pub fn resolved_platform_home(&self) -> Option<PathBuf> {
        self.platform_home.clone().or_else(detect_platform_home)
    }

    /// Directory of the persistent class index, if enabled.
    pub fn index_cache_dir(&self) -> Option<PathBuf> {
        if !self.index_cache.enabled {
            return None;
        }
        Some(match &self.index_cache.dir {
            Some(dir) => dir.clone(),
            None => ClassIndexCache::with_default_location().root().to_path_buf(),
        })
    }

    pub fn scanner(&self) -> ClasspathScanner {
        match self.index_cache_dir() {
            Some(dir) => ClasspathScanner::with_cache(ClassIndexCache::new(dir)),
            None => ClasspathScanner::new(),
        }
    }
}

fn detect_platform_home() -> Option<PathBuf> {
    if let Ok(path) = env::var("JAVA_HOME") {
        let candidate = PathBuf::from(path);
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(java_path) = which::which("java") {
        if let Some(bin_dir) = java_path.parent() {
            if let Some(home) = bin_dir.parent() {
                return Some(home.to_path_buf());
            }
        }
    }

    None
}
