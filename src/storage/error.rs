#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to database: {0}")]
    ConnectionError(#[source] sqlx::Error),
    #[error("failed to run initial migration: {0}")]
    MigrationError(#[source] sqlx::migrate::MigrateError),
    #[error("failed to insert stats: {0}")]
    InsertError(#[source] sqlx::Error),
    #[error("failed to read stats: {0}")]
    ReadError(#[source] sqlx::Error),
    #[error("failed to encode stats: {0}")]
    EncodeError(#[source] serde_json::Error),
    #[error("failed to decode stored stats: {0}")]
    DecodeError(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
