use crate::container::{self, ContainerName};
use crate::storage;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown container `{0}`")]
    NotFound(ContainerName),
    #[error("container `{0}` is already registered")]
    AlreadyExists(ContainerName),
    #[error("container `{name}` cannot be monitored: {source}")]
    HandleUnavailable {
        name: ContainerName,
        #[source]
        source: container::Error,
    },
    #[error("handler of container `{name}` failed: {source}")]
    Handler {
        name: ContainerName,
        #[source]
        source: container::Error,
    },
    #[error("failed to read stored stats of `{name}`: {source}")]
    Storage {
        name: ContainerName,
        #[source]
        source: storage::Error,
    },
    #[error("handler task of container `{name}` did not complete: {source}")]
    Task {
        name: ContainerName,
        #[source]
        source: tokio::task::JoinError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
