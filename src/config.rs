//! Application configuration: TOML file, then `.env`/environment overrides.

use crate::remote::ResponseShape;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const ENV_CONFIG: &str = "DXSEARCH_CONFIG";
pub const ENV_LOCAL_TABLE: &str = "DXSEARCH_LOCAL_TABLE";
pub const ENV_REMOTE_URL: &str = "DXSEARCH_REMOTE_URL";
pub const ENV_CACHE_DIR: &str = "DXSEARCH_CACHE_DIR";
pub const ENV_LOG: &str = "DXSEARCH_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub search: SearchConfig,
    pub local: LocalConfig,
    pub remote: RemoteConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SearchConfig {
    /// Quiet period before a keystroke turns into a query.
    pub debounce_ms: u64,
    /// Maximum number of entries delivered per query.
    pub result_cap: usize,
    /// Terms shorter than this (in characters) never reach the remote service.
    pub min_remote_chars: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct LocalConfig {
    /// JSON dataset of `{code, display}` rows. No table when unset.
    pub table_path: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RemoteConfig {
    pub enabled: bool,
    pub base_url: String,
    pub shape: ResponseShape,
    pub term_param: String,
    pub count_param: String,
    pub max_results: usize,
    pub extra_params: BTreeMap<String, String>,
    pub timeout_secs: Option<u64>,
    pub user_agent: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// Persist remote results across sessions.
    pub durable: bool,
    /// Durable tier directory; the platform cache dir when unset.
    pub dir: Option<PathBuf>,
    /// Expiry for cached results; `None` keeps them forever.
    pub ttl_secs: Option<u64>,
    /// Bump to invalidate everything written under an older version.
    pub version: u32,
    /// LRU bound for the in-memory tier; unbounded when unset.
    pub memory_capacity: Option<usize>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            result_cap: 25,
            min_remote_chars: 2,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        let mut extra_params = BTreeMap::new();
        extra_params.insert("_format".to_string(), "json".to_string());

        Self {
            enabled: true,
            base_url: "https://clinicaltables.nlm.nih.gov/fhir/R4/ValueSet/icd10cm/$expand"
                .to_string(),
            shape: ResponseShape::Auto,
            term_param: "filter".to_string(),
            count_param: "count".to_string(),
            max_results: 50,
            extra_params,
            timeout_secs: None,
            user_agent: format!("dxsearch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            durable: false,
            dir: None,
            ttl_secs: None,
            version: 1,
            memory_capacity: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl SearchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}

impl AppConfig {
    /// Load `path` (or `$DXSEARCH_CONFIG`), apply environment overrides, validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(ENV_CONFIG).ok().map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Override file values with whatever `lookup` returns for the known variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(ENV_LOCAL_TABLE) {
            self.local.table_path = Some(PathBuf::from(path));
        }
        if let Some(url) = lookup(ENV_REMOTE_URL) {
            self.remote.base_url = url;
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR) {
            self.cache.dir = Some(PathBuf::from(dir));
            self.cache.durable = true;
        }
        if let Some(level) = lookup(ENV_LOG) {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.result_cap == 0 {
            return Err(ConfigError::Invalid("search.result_cap must be > 0".into()));
        }

        if self.remote.enabled {
            if self.search.debounce_ms == 0 {
                return Err(ConfigError::Invalid(
                    "search.debounce_ms must be > 0 when remote lookup is enabled".into(),
                ));
            }
            if self.remote.max_results == 0 {
                return Err(ConfigError::Invalid("remote.max_results must be > 0".into()));
            }
            Url::parse(&self.remote.base_url).map_err(|e| {
                ConfigError::Invalid(format!("remote.base_url {}: {e}", self.remote.base_url))
            })?;
        }

        if self.cache.memory_capacity == Some(0) {
            return Err(ConfigError::Invalid("cache.memory_capacity must be > 0".into()));
        }

        Ok(())
    }
}
