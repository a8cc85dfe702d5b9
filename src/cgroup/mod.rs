//! Container handlers backed by the Linux cgroup v2 filesystem.
//!
//! Every directory below the cgroup root is treated as a container whose name is
//! its path relative to the root, so `/sys/fs/cgroup/system.slice/a.scope` becomes
//! `/system.slice/a.scope` and the root itself is `/`.
//!
//! # Supported Stats
//!
//! The following interface files are read, if available:
//!
//! - `cpu.stat` and `cpu.max`
//! - `memory.stat`, `memory.current`, and `memory.max`
//! - `io.stat`
//!
//! Missing files leave the matching section of the spec or sample empty, as
//! controllers may not be enabled for every cgroup.
//!
//! # Platform Requirements
//!
//! - Linux with cgroup v2 support.
//! - Read access to the cgroup root (`/sys/fs/cgroup` by default).
mod handler;
pub mod parser;
mod utils;

pub use handler::{CgroupFactory, CgroupHandler};
pub use parser::ParseError;
