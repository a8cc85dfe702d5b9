//! Runtime configuration read from environment variables.
use std::num::NonZeroU64;
use std::path::PathBuf;
use std::time::Duration;

use crate::manager::HousekeepingConfig;

const CGROUP_ROOT: &str = "CGROUP_ROOT";
const HOUSEKEEPING_INTERVAL_MS: &str = "HOUSEKEEPING_INTERVAL_MS";
const STATS_BUFFER_CAPACITY: &str = "STATS_BUFFER_CAPACITY";
const DISCOVERY_INTERVAL_MS: &str = "DISCOVERY_INTERVAL_MS";
const MEMORY_STORAGE_CAPACITY: &str = "MEMORY_STORAGE_CAPACITY";
const DATABASE_URL: &str = "DATABASE_URL";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid value `{value}` for `{key}`: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Settings of a monitoring service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Mount point of the cgroup v2 hierarchy.
    pub cgroup_root: PathBuf,
    /// Time between two samples of the same container.
    pub housekeeping_interval: Duration,
    /// Samples kept in memory per container.
    pub stats_buffer_capacity: usize,
    /// Time between two subcontainer detection passes.
    pub discovery_interval: Duration,
    /// Samples kept per container by the in-memory storage driver.
    pub memory_storage_capacity: usize,
    /// MySQL connection URL. The in-memory driver is used when unset.
    pub database_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cgroup_root: PathBuf::from("/sys/fs/cgroup"),
            housekeeping_interval: Duration::from_millis(1_000),
            stats_buffer_capacity: 60,
            discovery_interval: Duration::from_millis(10_000),
            memory_storage_capacity: 120,
            database_url: None,
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, falling back to the defaults for
    /// unset or empty variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let cgroup_root = lookup(CGROUP_ROOT)
            .map(PathBuf::from)
            .unwrap_or(defaults.cgroup_root);
        let housekeeping_interval = match lookup(HOUSEKEEPING_INTERVAL_MS) {
            Some(value) => Duration::from_millis(parse_non_zero(HOUSEKEEPING_INTERVAL_MS, &value)?),
            None => defaults.housekeeping_interval,
        };
        let stats_buffer_capacity = match lookup(STATS_BUFFER_CAPACITY) {
            Some(value) => parse_non_zero(STATS_BUFFER_CAPACITY, &value)? as usize,
            None => defaults.stats_buffer_capacity,
        };
        let discovery_interval = match lookup(DISCOVERY_INTERVAL_MS) {
            Some(value) => Duration::from_millis(parse_non_zero(DISCOVERY_INTERVAL_MS, &value)?),
            None => defaults.discovery_interval,
        };
        let memory_storage_capacity = match lookup(MEMORY_STORAGE_CAPACITY) {
            Some(value) => parse_non_zero(MEMORY_STORAGE_CAPACITY, &value)? as usize,
            None => defaults.memory_storage_capacity,
        };

        Ok(Self {
            cgroup_root,
            housekeeping_interval,
            stats_buffer_capacity,
            discovery_interval,
            memory_storage_capacity,
            database_url: lookup(DATABASE_URL),
        })
    }

    pub fn housekeeping(&self) -> HousekeepingConfig {
        HousekeepingConfig {
            interval: self.housekeeping_interval,
            buffer_capacity: self.stats_buffer_capacity,
        }
    }
}

fn parse_non_zero(key: &'static str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<NonZeroU64>()
        .map(NonZeroU64::get)
        .map_err(|err| Error::InvalidValue {
            key,
            value: value.to_owned(),
            reason: err.to_string(),
        })
}
