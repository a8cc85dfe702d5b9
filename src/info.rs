//! Query-facing data model: container specifications, timestamped usage samples and
//! the combined [`ContainerInfo`] answer.
//!
//! Only [`ContainerStats::timestamp`] is interpreted by the monitoring core; the
//! resource sections are carried through as-is.

use crate::container::{ContainerName, ContainerReference};

/// Default number of samples returned when a request does not ask for a specific amount.
pub const DEFAULT_NUM_STATS: usize = 60;

/// Static description of a container's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct ContainerSpec {
    /// Creation time in UNIX epoch milliseconds, if known.
    pub creation_time: Option<u64>,
    pub cpu: Option<CpuSpec>,
    pub memory: Option<MemorySpec>,
}

/// CPU bandwidth limit as configured in `cpu.max`.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct CpuSpec {
    /// Allowed runtime per period in microseconds; `None` means unlimited.
    pub quota: Option<u64>,
    /// Enforcement period in microseconds.
    pub period: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct MemorySpec {
    /// Hard memory limit in bytes; `None` means unlimited.
    pub limit_bytes: Option<u64>,
}

/// One sample of a container's resource usage.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct ContainerStats {
    /// Sample time in UNIX epoch milliseconds.
    pub timestamp: u64,
    pub cpu: Option<CpuStats>,
    pub memory: Option<MemoryStats>,
    pub io: Option<IoStats>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct CpuStats {
    pub usage_usec: u64,
    pub user_usec: u64,
    pub system_usec: u64,
    pub nr_periods: u64,
    pub nr_throttled: u64,
    pub throttled_usec: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct MemoryStats {
    pub usage_bytes: u64,
    pub anon_bytes: u64,
    pub file_bytes: u64,
}

/// I/O counters summed over all block devices.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct IoStats {
    pub rbytes: u64,
    pub wbytes: u64,
    pub rios: u64,
    pub wios: u64,
}

/// Options for a container info query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfoRequest {
    /// Number of most recent samples to return.
    pub num_stats: usize,
}

impl Default for ContainerInfoRequest {
    fn default() -> Self {
        Self {
            num_stats: DEFAULT_NUM_STATS,
        }
    }
}

impl ContainerInfoRequest {
    pub fn with_num_stats(num_stats: usize) -> Self {
        Self { num_stats }
    }
}

/// Answer to a container info query.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ContainerInfo {
    pub name: ContainerName,
    pub spec: ContainerSpec,
    /// Samples ordered from oldest to newest.
    pub stats: Vec<ContainerStats>,
    pub subcontainers: Vec<ContainerReference>,
}

/// Current wall-clock time in UNIX epoch milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
