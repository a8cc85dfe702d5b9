//! The container registry and query dispatch.
//!
//! A [`Manager`] owns one [`ContainerData`] per monitored container. Each unit
//! samples its container on its own schedule; the manager routes point queries to
//! a single unit and hierarchical queries to every descendant its handler
//! enumerates.
use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::container::{ContainerName, FactoryRegistry, ListType};
use crate::error::ResultOkLogExt;
use crate::info::{ContainerInfo, ContainerInfoRequest};
use crate::storage::StorageDriver;

mod container_data;
mod error;

pub use container_data::{ContainerData, ContainerState, HousekeepingConfig};
pub use error::{Error, Result};

/// Registry of monitored containers.
pub struct Manager<S> {
    containers: DashMap<ContainerName, Arc<ContainerData<S>>>,
    storage: Arc<S>,
    factories: Arc<FactoryRegistry>,
    config: HousekeepingConfig,
}

impl<S: StorageDriver> Manager<S> {
    /// Creates a manager with an empty registry.
    ///
    /// Containers are only monitored once they are added, either explicitly via
    /// [`Manager::add_container`] or through [`Manager::detect_subcontainers`].
    pub fn new(storage: Arc<S>, factories: Arc<FactoryRegistry>, config: HousekeepingConfig) -> Self {
        Self {
            containers: DashMap::new(),
            storage,
            factories,
            config,
        }
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    pub fn contains(&self, name: &ContainerName) -> bool {
        self.containers.contains_key(name)
    }

    /// Returns the names of all registered containers in lexical order.
    pub fn container_names(&self) -> Vec<ContainerName> {
        let mut names: Vec<_> = self
            .containers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Starts monitoring `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] if the name is registered (the existing unit
    /// is left untouched) and [`Error::HandleUnavailable`] if no handler can be
    /// created for it or the handler cannot describe the container.
    pub async fn add_container(&self, name: ContainerName) -> Result<()> {
        if self.containers.contains_key(&name) {
            return Err(Error::AlreadyExists(name));
        }

        let handler = {
            let factories = Arc::clone(&self.factories);
            let lookup = name.clone();
            tokio::task::spawn_blocking(move || factories.new_handler(&lookup))
                .await
                .map_err(|source| Error::Task {
                    name: name.clone(),
                    source,
                })?
                .map_err(|source| Error::HandleUnavailable {
                    name: name.clone(),
                    source,
                })?
        };
        let data = Arc::new(
            ContainerData::new(
                name.clone(),
                handler,
                Arc::clone(&self.storage),
                &self.config,
            )
            .await?,
        );

        match self.containers.entry(name.clone()) {
            Entry::Occupied(_) => return Err(Error::AlreadyExists(name)),
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&data));
            }
        }
        data.start().await;
        log::info!("Added container `{}`", name);

        Ok(())
    }

    /// Stops monitoring `name`, waits for its sampling loop to exit and lets the
    /// storage driver release what it holds for the container.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the name is not registered.
    pub async fn remove_container(&self, name: &ContainerName) -> Result<()> {
        let (_, data) = self
            .containers
            .remove(name)
            .ok_or_else(|| Error::NotFound(name.clone()))?;
        data.stop().await;
        self.storage
            .remove(name)
            .await
            .ok_or_log(format_args!("failed to release storage of `{}`", name));
        log::info!("Removed container `{}`", name);

        Ok(())
    }

    /// Stops and unregisters every container.
    pub async fn stop_all(&self) {
        for name in self.container_names() {
            if let Some((_, data)) = self.containers.remove(&name) {
                data.stop().await;
            }
        }
    }

    /// Returns spec, sub-containers and recent stats of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for unknown containers and propagates handler and
    /// storage failures.
    pub async fn get_container_info(
        &self,
        name: &ContainerName,
        request: &ContainerInfoRequest,
    ) -> Result<ContainerInfo> {
        self.lookup(name)?.info(request).await
    }

    /// Returns one [`ContainerInfo`] per descendant of `name`, in the order the
    /// container's handler enumerates them.
    ///
    /// The root `/` may be queried without being registered itself; its
    /// descendants are then all registered containers in lexical order. No handler
    /// is consulted in that case, so unregistered cgroups are not reported.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `name` or any enumerated descendant is not
    /// registered, and propagates handler and storage failures.
    pub async fn subcontainers_info(
        &self,
        name: &ContainerName,
        request: &ContainerInfoRequest,
    ) -> Result<Vec<ContainerInfo>> {
        let children: Vec<ContainerName> = match self.lookup(name) {
            Ok(data) => data
                .list_containers(ListType::Recursive)
                .await?
                .into_iter()
                .map(|reference| reference.name)
                .collect(),
            Err(Error::NotFound(_)) if name.is_root() => self.container_names(),
            Err(err) => return Err(err),
        };

        let mut infos = Vec::with_capacity(children.len());
        for child in &children {
            infos.push(self.get_container_info(child, request).await?);
        }
        Ok(infos)
    }

    /// Synchronizes the registry with the descendants of `name` reported by its handler.
    ///
    /// New descendants are added and registered descendants that are no longer
    /// reported are removed. Failures for individual containers are logged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `name` is not registered, or the handler error
    /// if the descendants cannot be listed.
    pub async fn detect_subcontainers(&self, name: &ContainerName) -> Result<()> {
        let data = self.lookup(name)?;
        let found: Vec<ContainerName> = data
            .list_containers(ListType::Recursive)
            .await?
            .into_iter()
            .map(|reference| reference.name)
            .collect();

        for child in &found {
            if self.contains(child) {
                continue;
            }
            match self.add_container(child.clone()).await {
                Ok(()) | Err(Error::AlreadyExists(_)) => {}
                Err(err) => log::warn!("failed to add container `{}`: {}", child, err),
            }
        }

        let found: HashSet<_> = found.into_iter().collect();
        let vanished: Vec<_> = self
            .container_names()
            .into_iter()
            .filter(|registered| name.is_ancestor_of(registered) && !found.contains(registered))
            .collect();
        for gone in &vanished {
            match self.remove_container(gone).await {
                Ok(()) | Err(Error::NotFound(_)) => {}
                Err(err) => log::warn!("failed to remove container `{}`: {}", gone, err),
            }
        }

        Ok(())
    }

    fn lookup(&self, name: &ContainerName) -> Result<Arc<ContainerData<S>>> {
        self.containers
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::NotFound(name.clone()))
    }
}

impl<S> std::fmt::Debug for Manager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("containers", &self.containers.len())
            .field("factories", &self.factories)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
