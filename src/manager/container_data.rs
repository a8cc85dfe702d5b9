use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::buffer::StatsBuffer;
use crate::container::{self, ContainerHandler, ContainerName, ContainerReference, ListType};
use crate::error::ResultOkLogExt;
use crate::info::{ContainerInfo, ContainerInfoRequest, ContainerSpec, ContainerStats};
use crate::storage::StorageDriver;

use super::{Error, Result};

/// Sampling settings shared by every [`ContainerData`] of a manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HousekeepingConfig {
    /// Time between two samples of the same container.
    pub interval: Duration,
    /// Number of samples kept in memory per container.
    pub buffer_capacity: usize,
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            buffer_capacity: 60,
        }
    }
}

/// Lifecycle of a [`ContainerData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Polling,
    Stopped,
}

enum Task {
    Created,
    Polling {
        stop_tx: oneshot::Sender<()>,
        join_handle: JoinHandle<()>,
    },
    Stopped,
}

/// Samples one container on its own schedule and serves its recent history.
pub struct ContainerData<S> {
    name: ContainerName,
    handler: Arc<dyn ContainerHandler>,
    storage: Arc<S>,
    buffer: Arc<Mutex<StatsBuffer>>,
    interval: Duration,
    task: tokio::sync::Mutex<Task>,
}

impl<S: StorageDriver> ContainerData<S> {
    /// Creates the unit after checking that the handler can describe its container.
    ///
    /// The sampling loop is not running until [`ContainerData::start`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandleUnavailable`] if the spec cannot be fetched.
    pub async fn new(
        name: ContainerName,
        handler: Arc<dyn ContainerHandler>,
        storage: Arc<S>,
        config: &HousekeepingConfig,
    ) -> Result<Self> {
        let probe = Arc::clone(&handler);
        tokio::task::spawn_blocking(move || probe.get_spec())
            .await
            .map_err(|source| Error::Task {
                name: name.clone(),
                source,
            })?
            .map_err(|source| Error::HandleUnavailable {
                name: name.clone(),
                source,
            })?;

        Ok(Self {
            name,
            handler,
            storage,
            buffer: Arc::new(Mutex::new(StatsBuffer::new(config.buffer_capacity))),
            interval: config.interval,
            task: tokio::sync::Mutex::new(Task::Created),
        })
    }

    pub fn name(&self) -> &ContainerName {
        &self.name
    }

    pub async fn state(&self) -> ContainerState {
        match *self.task.lock().await {
            Task::Created => ContainerState::Created,
            Task::Polling { .. } => ContainerState::Polling,
            Task::Stopped => ContainerState::Stopped,
        }
    }

    /// Spawns the sampling loop. Does nothing unless the unit is freshly created.
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if !matches!(*task, Task::Created) {
            return;
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let join_handle = tokio::spawn(housekeeping(
            self.name.clone(),
            Arc::clone(&self.handler),
            Arc::clone(&self.storage),
            Arc::clone(&self.buffer),
            self.interval,
            stop_rx,
        ));
        *task = Task::Polling {
            stop_tx,
            join_handle,
        };
        log::debug!("Started housekeeping of `{}`", self.name);
    }

    /// Stops the sampling loop and waits for it to exit.
    ///
    /// A tick that is already running finishes first; once this returns the loop
    /// makes no further handler or storage calls. Calling it again is a no-op.
    pub async fn stop(&self) {
        let mut task = self.task.lock().await;
        if let Task::Polling {
            stop_tx,
            join_handle,
        } = std::mem::replace(&mut *task, Task::Stopped)
        {
            // The loop may already be gone if it panicked.
            let _ = stop_tx.send(());
            join_handle
                .await
                .ok_or_log(format_args!("housekeeping of `{}` ended abnormally", self.name));
            log::debug!("Stopped housekeeping of `{}`", self.name);
        }
    }

    /// Fetches the spec from the handler.
    pub async fn spec(&self) -> Result<ContainerSpec> {
        self.call_handler(|handler| handler.get_spec()).await
    }

    pub async fn list_containers(&self, list_type: ListType) -> Result<Vec<ContainerReference>> {
        self.call_handler(move |handler| handler.list_containers(list_type))
            .await
    }

    /// Returns up to `num_stats` of the most recent samples, oldest first.
    ///
    /// Stored history is extended with buffered samples newer than the latest
    /// stored one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the stored history cannot be read.
    pub async fn recent_stats(&self, num_stats: usize) -> Result<Vec<ContainerStats>> {
        if num_stats == 0 {
            return Ok(Vec::new());
        }

        let mut stats = self
            .storage
            .recent_stats(&self.name, num_stats)
            .await
            .map_err(|source| Error::Storage {
                name: self.name.clone(),
                source,
            })?;
        stats.sort_by_key(|s| s.timestamp);
        stats.dedup_by_key(|s| s.timestamp);

        let latest_stored = stats.last().map(|s| s.timestamp);
        stats.extend(
            self.buffer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .newer_than(latest_stored),
        );

        let excess = stats.len().saturating_sub(num_stats);
        stats.drain(..excess);
        Ok(stats)
    }

    /// Builds the [`ContainerInfo`] answer for this container.
    pub async fn info(&self, request: &ContainerInfoRequest) -> Result<ContainerInfo> {
        let spec = self.spec().await?;
        let subcontainers = self.list_containers(ListType::SelfOnly).await?;
        let stats = self.recent_stats(request.num_stats).await?;

        Ok(ContainerInfo {
            name: self.name.clone(),
            spec,
            stats,
            subcontainers,
        })
    }

    async fn call_handler<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn ContainerHandler) -> container::Result<T> + Send + 'static,
    {
        let handler = Arc::clone(&self.handler);
        tokio::task::spawn_blocking(move || f(handler.as_ref()))
            .await
            .map_err(|source| Error::Task {
                name: self.name.clone(),
                source,
            })?
            .map_err(|source| Error::Handler {
                name: self.name.clone(),
                source,
            })
    }
}

impl<S> std::fmt::Debug for ContainerData<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerData")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

/// Samples `handler` every `interval` until `stop_rx` fires or its sender is dropped.
async fn housekeeping<S: StorageDriver>(
    name: ContainerName,
    handler: Arc<dyn ContainerHandler>,
    storage: Arc<S>,
    buffer: Arc<Mutex<StatsBuffer>>,
    interval: Duration,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {}
        }

        let probe = Arc::clone(&handler);
        let stats = match tokio::task::spawn_blocking(move || probe.get_stats()).await {
            Ok(Ok(stats)) => stats,
            Ok(Err(err)) => {
                log::warn!(
                    target: "housekeeping",
                    "failed to fetch stats: container={}, error={}",
                    name,
                    err
                );
                continue;
            }
            Err(err) => {
                log::error!(
                    target: "housekeeping",
                    "stats task failed: container={}, error={}",
                    name,
                    err
                );
                continue;
            }
        };

        let pushed = buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(stats.clone());
        if let Err(err) = pushed {
            log::warn!(
                target: "housekeeping",
                "dropping sample: container={}, error={}",
                name,
                err
            );
            continue;
        }

        storage
            .add_stats(&name, &stats)
            .await
            .ok_or_log(format_args!("failed to store stats of `{}`", name));
    }
    log::trace!(target: "housekeeping", "loop exited: container={}", name);
}
