//! Mocks and fixtures shared by the unit tests.
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::container::{
    self, ContainerHandler, ContainerHandlerFactory, ContainerName, ContainerReference, ListType,
};
use crate::info::{
    ContainerInfo, ContainerSpec, ContainerStats, CpuSpec, CpuStats, IoStats, MemorySpec,
    MemoryStats,
};
use crate::storage::{self, StorageDriver};

/// A handler whose answers are configured by the test.
#[derive(Debug)]
pub struct MockHandler {
    name: ContainerName,
    spec: Mutex<Option<ContainerSpec>>,
    direct_children: Mutex<Vec<ContainerReference>>,
    all_children: Mutex<Vec<ContainerReference>>,
    fail_stats: AtomicBool,
    next_timestamp: AtomicU64,
    stats_calls: AtomicUsize,
}

impl MockHandler {
    pub fn new(name: ContainerName) -> Self {
        Self {
            name,
            spec: Mutex::new(Some(ContainerSpec {
                creation_time: Some(1_000),
                ..Default::default()
            })),
            direct_children: Mutex::new(Vec::new()),
            all_children: Mutex::new(Vec::new()),
            fail_stats: AtomicBool::new(false),
            next_timestamp: AtomicU64::new(1_000_000),
            stats_calls: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &ContainerName {
        &self.name
    }

    /// Sets the spec returned by `get_spec`; `None` makes it fail.
    pub fn set_spec(&self, spec: Option<ContainerSpec>) {
        *self.spec.lock().unwrap() = spec;
    }

    pub fn spec(&self) -> Option<ContainerSpec> {
        self.spec.lock().unwrap().clone()
    }

    pub fn set_children(&self, list_type: ListType, children: Vec<ContainerName>) {
        let children = children.into_iter().map(ContainerReference::from).collect();
        match list_type {
            ListType::SelfOnly => *self.direct_children.lock().unwrap() = children,
            ListType::Recursive => *self.all_children.lock().unwrap() = children,
        }
    }

    pub fn set_fail_stats(&self, fail: bool) {
        self.fail_stats.store(fail, Ordering::SeqCst);
    }

    pub fn stats_calls(&self) -> usize {
        self.stats_calls.load(Ordering::SeqCst)
    }
}

impl ContainerHandler for MockHandler {
    fn list_containers(&self, list_type: ListType) -> container::Result<Vec<ContainerReference>> {
        Ok(match list_type {
            ListType::SelfOnly => self.direct_children.lock().unwrap().clone(),
            ListType::Recursive => self.all_children.lock().unwrap().clone(),
        })
    }

    fn get_spec(&self) -> container::Result<ContainerSpec> {
        self.spec()
            .ok_or_else(|| container::Error::Other(format!("no spec for `{}`", self.name)))
    }

    fn get_stats(&self) -> container::Result<ContainerStats> {
        let call = self.stats_calls.fetch_add(1, Ordering::SeqCst) as u64;
        if self.fail_stats.load(Ordering::SeqCst) {
            return Err(container::Error::Other(format!(
                "stats of `{}` unavailable",
                self.name
            )));
        }
        Ok(ContainerStats {
            timestamp: self.next_timestamp.fetch_add(1_000, Ordering::SeqCst),
            cpu: Some(CpuStats {
                usage_usec: call * 100,
                ..Default::default()
            }),
            memory: None,
            io: None,
        })
    }
}

/// A factory serving preconfigured [`MockHandler`]s.
#[derive(Debug)]
pub struct MockFactory {
    name: String,
    handlers: Mutex<HashMap<ContainerName, Arc<MockHandler>>>,
    created: AtomicUsize,
}

impl MockFactory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: Mutex::new(HashMap::new()),
            created: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, handler: Arc<MockHandler>) {
        self.handlers
            .lock()
            .unwrap()
            .insert(handler.name().clone(), handler);
    }

    pub fn handler(&self, name: &ContainerName) -> Option<Arc<MockHandler>> {
        self.handlers.lock().unwrap().get(name).cloned()
    }

    /// Number of handlers handed out so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl ContainerHandlerFactory for MockFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_handle(&self, name: &ContainerName) -> bool {
        self.handlers.lock().unwrap().contains_key(name)
    }

    fn new_handler(&self, name: &ContainerName) -> container::Result<Arc<dyn ContainerHandler>> {
        let handler = self
            .handler(name)
            .ok_or_else(|| container::Error::NoFactory(name.to_string()))?;
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(handler)
    }
}

/// A storage driver that records appends and can be scripted per request.
///
/// Unscripted reads return the latest appended samples.
#[derive(Debug, Default)]
pub struct ScriptedStorage {
    scripted: Mutex<HashMap<(ContainerName, usize), Vec<ContainerStats>>>,
    appended: Mutex<HashMap<ContainerName, Vec<ContainerStats>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl ScriptedStorage {
    /// Answers `recent_stats(name, num_stats)` with `stats`.
    pub fn script_recent(&self, name: &ContainerName, num_stats: usize, stats: Vec<ContainerStats>) {
        self.scripted
            .lock()
            .unwrap()
            .insert((name.clone(), num_stats), stats);
    }

    pub fn appended(&self, name: &ContainerName) -> Vec<ContainerStats> {
        self.appended
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl StorageDriver for ScriptedStorage {
    async fn add_stats(&self, name: &ContainerName, stats: &ContainerStats) -> storage::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(storage::Error::InsertError(sqlx::Error::PoolClosed));
        }
        self.appended
            .lock()
            .unwrap()
            .entry(name.clone())
            .or_default()
            .push(stats.clone());
        Ok(())
    }

    async fn recent_stats(
        &self,
        name: &ContainerName,
        num_stats: usize,
    ) -> storage::Result<Vec<ContainerStats>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(storage::Error::ReadError(sqlx::Error::PoolTimedOut));
        }
        if let Some(stats) = self
            .scripted
            .lock()
            .unwrap()
            .get(&(name.clone(), num_stats))
        {
            return Ok(stats.clone());
        }
        let appended = self.appended(name);
        let skip = appended.len().saturating_sub(num_stats);
        Ok(appended[skip..].to_vec())
    }
}

/// Generates a deterministic [`ContainerInfo`] with `num_stats` samples `period` apart.
pub fn generate_container_info(
    name: ContainerName,
    num_stats: usize,
    period: Duration,
) -> ContainerInfo {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    let mut seed = hasher.finish() | 1;
    let mut next = move || {
        // xorshift64
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        seed
    };

    let start = 1_700_000_000_000;
    let period = period.as_millis() as u64;
    let mut usage = 0;
    let stats = (0..num_stats as u64)
        .map(|i| {
            usage += next() % 1_000_000;
            ContainerStats {
                timestamp: start + i * period,
                cpu: Some(CpuStats {
                    usage_usec: usage,
                    user_usec: usage / 2,
                    system_usec: usage - usage / 2,
                    ..Default::default()
                }),
                memory: Some(MemoryStats {
                    usage_bytes: next() % (1 << 30),
                    ..Default::default()
                }),
                io: Some(IoStats {
                    rbytes: next() % (1 << 20),
                    wbytes: next() % (1 << 20),
                    ..Default::default()
                }),
            }
        })
        .collect();

    ContainerInfo {
        name,
        spec: ContainerSpec {
            creation_time: Some(start - 60_000),
            cpu: Some(CpuSpec {
                quota: Some(next() % 100_000),
                period: 100_000,
            }),
            memory: Some(MemorySpec {
                limit_bytes: Some(next() % (1 << 32)),
            }),
        },
        stats,
        subcontainers: Vec::new(),
    }
}

/// Polls `condition` until it holds, failing the test after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within five seconds"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
