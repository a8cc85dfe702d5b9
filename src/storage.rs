//! Storage drivers that persist container samples and serve stored history.
mod driver;
mod error;
mod memory;
mod mysql;

pub use driver::StorageDriver;
pub use error::{Error, Result};
pub use memory::MemoryStorage;
pub use mysql::MySqlStorage;
