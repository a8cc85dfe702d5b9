use std::sync::{Mutex, PoisonError};

use dashmap::DashMap;

use crate::buffer::StatsBuffer;
use crate::container::ContainerName;
use crate::info::ContainerStats;

use super::{Result, StorageDriver};

/// Keeps a bounded history per container in process memory.
#[derive(Debug)]
pub struct MemoryStorage {
    capacity: usize,
    containers: DashMap<ContainerName, Mutex<StatsBuffer>>,
}

impl MemoryStorage {
    /// Creates a store retaining at most `capacity` samples per container.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            containers: DashMap::new(),
        }
    }

    /// Number of containers with stored history.
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}

impl StorageDriver for MemoryStorage {
    /// Stores `stats`, ignoring samples that are not newer than the latest stored one.
    async fn add_stats(&self, name: &ContainerName, stats: &ContainerStats) -> Result<()> {
        let entry = self
            .containers
            .entry(name.clone())
            .or_insert_with(|| Mutex::new(StatsBuffer::new(self.capacity)));
        let mut buffer = entry.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = buffer.push(stats.clone()) {
            log::debug!("memory storage dropped sample of `{}`: {}", name, err);
        }
        Ok(())
    }

    async fn recent_stats(
        &self,
        name: &ContainerName,
        num_stats: usize,
    ) -> Result<Vec<ContainerStats>> {
        Ok(self
            .containers
            .get(name)
            .map(|entry| {
                entry
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .last_n(num_stats)
            })
            .unwrap_or_default())
    }

    /// Drops the stored history of `name`.
    async fn remove(&self, name: &ContainerName) -> Result<()> {
        self.containers.remove(name);
        Ok(())
    }
}
