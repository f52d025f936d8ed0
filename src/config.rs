//! Engine configuration
//!
//! Loaded once per process from a YAML file. Every key has a default, so an
//! empty file is a valid configuration (in-memory store, threshold 5,
//! sequential adapters).

use crate::adapter::{Adapter, ReplayAdapter};
use crate::orchestrator::Orchestrator;
use crate::publish::{
    ApiSecret, EvidenceDump, HttpStatusStore, MemoryStatusStore, Publisher, SqliteStatusStore,
    StatusStore, StoreResult, DEFAULT_HTTP_TIMEOUT_SECS,
};
use crate::resolver::{Entity, ZipCountyTable, DEFAULT_KEY_PREFIX};
use crate::status::DEFAULT_LIMITED_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the status API secret unless configured otherwise
pub const DEFAULT_SECRET_ENV: &str = "SLOTWATCH_API_SECRET";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Where published statuses go
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    #[default]
    Memory,
    Sqlite {
        /// Defaults to the platform data directory
        #[serde(default)]
        path: Option<PathBuf>,
    },
    Http {
        url: String,
        #[serde(default = "default_secret_env")]
        secret_env: String,
        #[serde(default = "default_http_timeout")]
        timeout_secs: u64,
    },
}

fn default_secret_env() -> String {
    DEFAULT_SECRET_ENV.to_string()
}

fn default_http_timeout() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

impl StoreConfig {
    /// Open the configured store. `default_db` is used for SQLite without a path.
    pub fn open(&self, default_db: &Path) -> StoreResult<Arc<dyn StatusStore>> {
        Ok(match self {
            StoreConfig::Memory => Arc::new(MemoryStatusStore::new()),
            StoreConfig::Sqlite { path } => {
                Arc::new(SqliteStatusStore::open(path.as_deref().unwrap_or(default_db))?)
            }
            StoreConfig::Http {
                url,
                secret_env,
                timeout_secs,
            } => Arc::new(
                HttpStatusStore::new(url.clone(), ApiSecret::from_env(secret_env)?)?
                    .with_timeout(Duration::from_secs(*timeout_secs)),
            ),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence when set
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// One pre-registered location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationConfig {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub county: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl LocationConfig {
    pub fn to_entity(&self) -> Entity {
        let mut entity = Entity::preregistered(self.key.trim())
            .with_name(&self.name)
            .with_address(&self.address)
            .with_county(&self.county)
            .with_city(&self.city);
        entity.url = self.url.clone();
        entity
    }
}

/// Signal fixture replayed as an adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub id: String,
    pub path: PathBuf,
    #[serde(default)]
    pub covers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// YES/LIMITED boundary for count-based adapters; 0 makes any slot YES
    pub limited_threshold: u32,
    pub key_prefix: String,
    /// 1 runs adapters one at a time
    pub max_concurrent_adapters: usize,
    pub adapter_timeout_secs: Option<u64>,
    pub retry_possible: u32,
    pub publish_unknown: bool,
    pub dry_run: bool,
    pub dump_dir: Option<PathBuf>,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    pub locations: Vec<LocationConfig>,
    /// Zip → county; an empty county marks a zip spanning several counties
    pub zip_counties: BTreeMap<String, String>,
    pub replay: Vec<ReplayConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            limited_threshold: DEFAULT_LIMITED_THRESHOLD,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            max_concurrent_adapters: 1,
            adapter_timeout_secs: None,
            retry_possible: 0,
            publish_unknown: false,
            dry_run: false,
            dump_dir: None,
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
            locations: Vec::new(),
            zip_counties: BTreeMap::new(),
            replay: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Read, parse and validate a config file. Relative replay paths are
    /// resolved against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&text)?;

        if let Some(base) = path.parent() {
            for replay in config.replay.iter_mut() {
                if replay.path.is_relative() {
                    replay.path = base.join(&replay.path);
                }
            }
        }
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(text)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_concurrent_adapters == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_adapters must be at least 1".to_string(),
            ));
        }
        if self.adapter_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "adapter_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.filter cannot be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for location in &self.locations {
            let key = location.key.trim();
            if key.is_empty() {
                return Err(ConfigError::Invalid("location with empty key".to_string()));
            }
            if !seen.insert(key) {
                return Err(ConfigError::Invalid(format!("duplicate location key '{key}'")));
            }
        }

        let mut ids = HashSet::new();
        for replay in &self.replay {
            if !ids.insert(replay.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate replay id '{}'",
                    replay.id
                )));
            }
        }
        Ok(())
    }

    pub fn adapter_timeout(&self) -> Option<Duration> {
        self.adapter_timeout_secs.map(Duration::from_secs)
    }

    pub fn entities(&self) -> Vec<Entity> {
        self.locations.iter().map(LocationConfig::to_entity).collect()
    }

    pub fn region_table(&self) -> ZipCountyTable {
        self.zip_counties
            .iter()
            .map(|(zip, county)| (zip.clone(), county.clone()))
            .collect()
    }

    pub fn replay_adapters(&self) -> Vec<Arc<dyn Adapter>> {
        self.replay
            .iter()
            .map(|r| {
                Arc::new(ReplayAdapter::new(&r.id, &r.path).with_covers(r.covers.clone()))
                    as Arc<dyn Adapter>
            })
            .collect()
    }

    /// Publisher writing to `store` with this config's publishing options
    pub fn publisher(&self, store: Arc<dyn StatusStore>) -> Publisher {
        let mut publisher = Publisher::new(store)
            .with_dry_run(self.dry_run)
            .with_publish_unknown(self.publish_unknown);
        if let Some(dir) = &self.dump_dir {
            publisher = publisher.with_dump(EvidenceDump::new(dir));
        }
        publisher
    }

    /// Orchestrator wired from this config
    pub fn orchestrator(&self, store: Arc<dyn StatusStore>) -> Orchestrator {
        Orchestrator::new(self.publisher(store))
            .with_limited_threshold(self.limited_threshold)
            .with_key_prefix(&self.key_prefix)
            .with_locations(self.entities())
            .with_regions(Arc::new(self.region_table()))
            .with_max_concurrent(self.max_concurrent_adapters)
            .with_adapter_timeout(self.adapter_timeout())
            .with_retry_possible(self.retry_possible)
    }
}
