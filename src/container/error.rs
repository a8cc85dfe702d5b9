use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid container name: {0:?}")]
    InvalidContainerName(String),
    #[error("no registered factory can handle container `{0}`")]
    NoFactory(String),
    #[error("container `{0}` does not exist")]
    ContainerGone(String),
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: crate::cgroup::ParseError,
    },
    #[error("handler failure: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
