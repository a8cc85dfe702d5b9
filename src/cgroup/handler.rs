use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use crate::container::{
    ContainerHandler, ContainerHandlerFactory, ContainerName, ContainerReference, Error, ListType,
    Result,
};
use crate::info::{self, ContainerSpec, ContainerStats, CpuStats, IoStats, MemorySpec, MemoryStats};

use super::{parser, utils};

/// Observes one cgroup v2 directory.
#[derive(Debug)]
pub struct CgroupHandler {
    name: ContainerName,
    path: PathBuf,
}

impl CgroupHandler {
    pub fn new(cgroup_root: &Path, name: ContainerName) -> Self {
        let path = utils::cgroup_path(cgroup_root, &name);
        Self { name, path }
    }

    fn ensure_exists(&self) -> Result<std::fs::Metadata> {
        match std::fs::metadata(&self.path) {
            Ok(metadata) if metadata.is_dir() => Ok(metadata),
            Ok(_) => Err(Error::ContainerGone(self.name.to_string())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::ContainerGone(self.name.to_string()))
            }
            Err(source) => Err(Error::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Returns the child cgroups of `(name, path)` sorted by directory name.
    fn child_cgroups(
        &self,
        name: &ContainerName,
        path: &Path,
    ) -> Result<Vec<(ContainerName, PathBuf)>> {
        let entries = std::fs::read_dir(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut children = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| Error::Io {
                path: path.to_path_buf(),
                source,
            })?;
            // Entries may vanish while the directory is being read.
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_dir() {
                continue;
            }

            let file_name = entry.file_name();
            let Some(component) = file_name.to_str() else {
                log::warn!("skipping non UTF-8 cgroup `{}`", entry.path().display());
                continue;
            };
            match name.join(component) {
                Ok(child) => children.push((child, entry.path())),
                Err(err) => log::warn!("skipping cgroup `{}`: {}", entry.path().display(), err),
            }
        }
        children.sort();

        Ok(children)
    }
}

impl ContainerHandler for CgroupHandler {
    /// Lists child cgroups. Recursive listings are in depth-first pre-order.
    fn list_containers(&self, list_type: ListType) -> Result<Vec<ContainerReference>> {
        self.ensure_exists()?;
        let children = self.child_cgroups(&self.name, &self.path)?;
        if list_type == ListType::SelfOnly {
            return Ok(children
                .into_iter()
                .map(|(child, _)| ContainerReference::from(child))
                .collect());
        }

        let mut out = Vec::new();
        let mut stack: Vec<_> = children.into_iter().rev().collect();
        while let Some((name, path)) = stack.pop() {
            let children = match self.child_cgroups(&name, &path) {
                Ok(children) => children,
                // Descendants may be removed during the walk.
                Err(Error::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                    continue;
                }
                Err(err) => return Err(err),
            };
            out.push(ContainerReference::from(name));
            stack.extend(children.into_iter().rev());
        }

        Ok(out)
    }

    fn get_spec(&self) -> Result<ContainerSpec> {
        let metadata = self.ensure_exists()?;
        let creation_time = metadata
            .created()
            .or_else(|_| metadata.modified())
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|elapsed| elapsed.as_millis() as u64);

        let cpu = utils::read_optional(&self.path.join("cpu.max"), parser::parse_cpu_max)?;
        let memory = utils::read_optional(&self.path.join("memory.max"), parser::parse_single_value)?
            .map(|limit_bytes| MemorySpec { limit_bytes });

        Ok(ContainerSpec {
            creation_time,
            cpu,
            memory,
        })
    }

    fn get_stats(&self) -> Result<ContainerStats> {
        self.ensure_exists()?;
        let timestamp = info::now_millis();

        let cpu = utils::read_optional(&self.path.join("cpu.stat"), parser::parse_flat_keyed)?
            .map(|values| {
                let get = |key: &str| values.get(key).copied().unwrap_or_default();
                CpuStats {
                    usage_usec: get("usage_usec"),
                    user_usec: get("user_usec"),
                    system_usec: get("system_usec"),
                    nr_periods: get("nr_periods"),
                    nr_throttled: get("nr_throttled"),
                    throttled_usec: get("throttled_usec"),
                }
            });

        let usage_bytes =
            utils::read_optional(&self.path.join("memory.current"), parser::parse_single_value)?
                .flatten();
        let memory_stat =
            utils::read_optional(&self.path.join("memory.stat"), parser::parse_flat_keyed)?
                .unwrap_or_default();
        let memory = usage_bytes.map(|usage_bytes| MemoryStats {
            usage_bytes,
            anon_bytes: memory_stat.get("anon").copied().unwrap_or_default(),
            file_bytes: memory_stat.get("file").copied().unwrap_or_default(),
        });

        let io = utils::read_optional(&self.path.join("io.stat"), parser::parse_nested_keyed)?
            .map(|values| {
                let get = |key: &str| values.get(key).copied().unwrap_or_default();
                IoStats {
                    rbytes: get("rbytes"),
                    wbytes: get("wbytes"),
                    rios: get("rios"),
                    wios: get("wios"),
                }
            });

        Ok(ContainerStats {
            timestamp,
            cpu,
            memory,
            io,
        })
    }
}

/// Creates [`CgroupHandler`]s for every name that maps to an existing cgroup directory.
#[derive(Debug, Clone)]
pub struct CgroupFactory {
    cgroup_root: PathBuf,
}

impl CgroupFactory {
    pub fn new(cgroup_root: impl Into<PathBuf>) -> Self {
        Self {
            cgroup_root: cgroup_root.into(),
        }
    }
}

impl ContainerHandlerFactory for CgroupFactory {
    fn name(&self) -> &str {
        "cgroup"
    }

    fn can_handle(&self, name: &ContainerName) -> bool {
        utils::cgroup_path(&self.cgroup_root, name).is_dir()
    }

    fn new_handler(&self, name: &ContainerName) -> Result<Arc<dyn ContainerHandler>> {
        Ok(Arc::new(CgroupHandler::new(&self.cgroup_root, name.clone())))
    }
}
