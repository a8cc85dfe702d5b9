//! cadmon: a container resource monitor.
//!
//! A [`manager::Manager`] keeps one sampling unit per monitored container. Units
//! poll their container through a [`container::ContainerHandler`], keep the most
//! recent samples in memory and forward every sample to a
//! [`storage::StorageDriver`]. Queries merge the stored history with the
//! in-memory samples.
//!
//! The bundled [`cgroup`] handlers observe a cgroup v2 hierarchy, and
//! [`storage`] provides an in-memory and a MySQL driver.
use std::sync::Arc;

use config::Config;
use container::{ContainerName, FactoryRegistry};
use error::ResultOkLogExt;
use manager::Manager;
use storage::{MemoryStorage, MySqlStorage, StorageDriver};
use tokio::time::MissedTickBehavior;

pub mod buffer;
pub mod cgroup;
pub mod config;
pub mod container;
pub mod error;
pub mod info;
pub mod manager;
pub mod storage;

#[cfg(test)]
mod testing;

/// Runs the monitor until Ctrl-C is received.
///
/// Reads the [`Config`] from the environment, monitors the cgroup root `/` and
/// periodically registers the cgroups found below it.
///
/// # Errors
///
/// Possible errors include:
/// - Invalid configuration values.
/// - Failure to connect to or migrate the database, if `DATABASE_URL` is set.
/// - The root cgroup cannot be monitored (e.g. `CGROUP_ROOT` is not a cgroup v2 mount).
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    log::debug!("Config: {:?}", config);

    let factories = Arc::new(FactoryRegistry::new());
    factories.register(Arc::new(cgroup::CgroupFactory::new(config.cgroup_root.clone())));

    match &config.database_url {
        Some(url) => {
            let storage = MySqlStorage::connect(url).await?;
            log::info!("Storing stats in MySQL");
            serve(&config, factories, storage).await
        }
        None => {
            log::info!(
                "DATABASE_URL not set, keeping {} samples per container in memory",
                config.memory_storage_capacity
            );
            let storage = MemoryStorage::new(config.memory_storage_capacity);
            serve(&config, factories, storage).await
        }
    }
}

async fn serve<S: StorageDriver>(
    config: &Config,
    factories: Arc<FactoryRegistry>,
    storage: S,
) -> Result<(), Box<dyn std::error::Error>> {
    let manager = Manager::new(Arc::new(storage), factories, config.housekeeping());
    let root = ContainerName::root();
    manager.add_container(root.clone()).await?;
    log::info!("Monitoring `{}`", config.cgroup_root.display());

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut interval = tokio::time::interval(config.discovery_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let result = loop {
        tokio::select! {
            signal = &mut shutdown => break signal,
            _ = interval.tick() => {
                manager
                    .detect_subcontainers(&root)
                    .await
                    .ok_or_log("subcontainer detection failed");
                log::trace!("Monitoring {} containers", manager.len());
            }
        }
    };

    log::info!("Shutting down");
    manager.stop_all().await;
    result.map_err(Into::into)
}
