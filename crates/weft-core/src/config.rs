use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use weft_util::errors::{WeftError, WeftResult};

/// Environment variable that overrides `registry.url`.
pub const REGISTRY_ENV: &str = "WEFT_REGISTRY";

const DEFAULT_REGISTRY: &str = "https://registry.weft.dev";

/// Global user configuration loaded from `~/.weft/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// `[registry]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_url")]
    pub url: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: default_registry_url(),
        }
    }
}

fn default_registry_url() -> String {
    DEFAULT_REGISTRY.to_string()
}

/// `[network]`: limits applied to registry and git calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout_secs", rename = "timeout-secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            jobs: default_jobs(),
        }
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_retries() -> u32 {
    3
}

fn default_jobs() -> usize {
    8
}

/// `[cache]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Package cache directory; defaults to `<project>/.weft/packages`.
    #[serde(default)]
    pub dir: Option<String>,
}

impl GlobalConfig {
    /// Load `~/.weft/config.toml` (or defaults), then apply environment overrides.
    pub fn load() -> WeftResult<Self> {
        let mut config = Self::load_from(&Self::default_path())?;
        if let Ok(url) = std::env::var(REGISTRY_ENV) {
            if !url.trim().is_empty() {
                config.registry.url = url;
            }
        }
        Ok(config)
    }

    /// Load a config file, returning defaults when it does not exist.
    pub fn load_from(path: &Path) -> WeftResult<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| WeftError::Manifest {
            message: format!("Failed to read global config: {e}"),
        })?;
        toml::from_str(&content).map_err(|e| WeftError::Manifest {
            message: format!("Failed to parse global config: {e}"),
        })
    }

    /// Returns the default path to the global config file.
    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }

    /// Package cache directory for a project.
    pub fn cache_dir(&self, project_root: &Path) -> PathBuf {
        match &self.cache.dir {
            Some(dir) => crate::manifest::resolve_local_path(dir, project_root),
            None => project_root.join(".weft").join("packages"),
        }
    }
}

/// Returns the path to the weft data directory (`~/.weft/`).
pub fn dirs_path() -> PathBuf {
    weft_util::fs::home_dir().join(".weft")
}
