use crate::container::ContainerName;
use crate::info::ContainerStats;

use super::Result;

/// A time-series backend shared by every monitored container.
///
/// Implementations must tolerate concurrent calls from many sampling loops and
/// queries at once.
pub trait StorageDriver: Send + Sync + 'static {
    /// Persists one sample of `name`.
    fn add_stats(
        &self,
        name: &ContainerName,
        stats: &ContainerStats,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Returns up to `num_stats` of the most recent stored samples of `name`,
    /// ordered from oldest to newest.
    fn recent_stats(
        &self,
        name: &ContainerName,
        num_stats: usize,
    ) -> impl std::future::Future<Output = Result<Vec<ContainerStats>>> + Send;

    /// Releases what is held for `name` once it is no longer monitored.
    ///
    /// Durable backends keep their history and need not override this.
    fn remove(&self, _name: &ContainerName) -> impl std::future::Future<Output = Result<()>> + Send {
        std::future::ready(Ok(()))
    }
}
