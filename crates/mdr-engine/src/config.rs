//! Layered configuration
//!
//! Precedence: built-in defaults, then an optional TOML file, then
//! `MDR__<SECTION>__<KEY>` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config as ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use mdr_core::errors::{ExError, ExErrorKind};
use mdr_core::logging_facility::Profile;
use mdr_core::retry::RetryPolicy;
use mdr_core::service::filtering::PageLimits;
use mdr_core::{CacheSettings, ServiceSettings};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MdrConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub lease: LeaseConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file; `:memory:` opens a private in-memory database
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("mdr.db")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,

    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_cache_capacity() -> u64 {
    1000
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseConfig {
    #[serde(default = "default_lease_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_lease_ttl_secs(),
        }
    }
}

fn default_lease_ttl_secs() -> u64 {
    300
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

fn default_page_size() -> u32 {
    10
}

fn default_max_page_size() -> u32 {
    1000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    50
}

fn default_max_backoff_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// development | production | test
    #[serde(default = "default_profile")]
    pub profile: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
        }
    }
}

fn default_profile() -> String {
    "development".to_string()
}

impl MdrConfig {
    /// Reject settings that would make the services unusable
    pub fn validate(&self) -> Result<(), ExError> {
        let invalid = |msg: &str| {
            Err(ExError::new(ExErrorKind::Validation)
                .with_op("config_validate")
                .with_message(msg))
        };
        if self.database.path.as_os_str().is_empty() {
            return invalid("database.path cannot be empty");
        }
        if self.cache.max_capacity == 0 {
            return invalid("cache.max_capacity must be greater than 0");
        }
        if self.cache.ttl_secs == 0 {
            return invalid("cache.ttl_secs must be greater than 0");
        }
        if self.lease.ttl_secs == 0 {
            return invalid("lease.ttl_secs must be greater than 0");
        }
        if self.listing.default_page_size == 0 || self.listing.max_page_size == 0 {
            return invalid("listing page sizes must be greater than 0");
        }
        if self.listing.default_page_size > self.listing.max_page_size {
            return invalid("listing.default_page_size cannot exceed listing.max_page_size");
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be greater than 0");
        }
        self.profile()?;
        Ok(())
    }

    pub fn profile(&self) -> Result<Profile, ExError> {
        Ok(self.logging.profile.parse::<Profile>()?)
    }

    pub fn is_in_memory(&self) -> bool {
        self.database.path.as_os_str() == ":memory:"
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            max_capacity: self.cache.max_capacity,
            time_to_live: Duration::from_secs(self.cache.ttl_secs),
        }
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            lease_ttl: chrono::Duration::seconds(self.lease.ttl_secs as i64),
            page_limits: PageLimits {
                default_page_size: self.listing.default_page_size,
                max_page_size: self.listing.max_page_size,
            },
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
        }
    }
}

/// Load configuration with layered precedence: defaults, file, env vars
///
/// A missing file is not an error; defaults come from the serde annotations.
pub fn load(path: Option<&Path>) -> Result<MdrConfig, ConfigError> {
    let mut builder = ConfigBuilder::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
    }
    builder = builder.add_source(Environment::with_prefix("MDR").separator("__").try_parsing(true));

    builder.build()?.try_deserialize()
}

/// Load from a TOML string, for embedding and tests
pub fn from_toml_str(source: &str) -> Result<MdrConfig, ConfigError> {
    ConfigBuilder::builder()
        .add_source(File::from_str(source, FileFormat::Toml))
        .build()?
        .try_deserialize()
}
