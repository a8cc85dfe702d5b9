use sqlx::MySqlPool;

use crate::container::ContainerName;
use crate::info::ContainerStats;

use super::{Error, Result, StorageDriver};

/// Persists samples in the `container_stats` MySQL table as JSON documents.
#[derive(Debug, Clone)]
pub struct MySqlStorage {
    db: MySqlPool,
}

impl MySqlStorage {
    pub fn new(db: MySqlPool) -> Self {
        Self { db }
    }

    /// Connects to `url` and applies the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionError`] if no connection can be established and
    /// [`Error::MigrationError`] if the schema cannot be brought up to date.
    pub async fn connect(url: &str) -> Result<Self> {
        let db = sqlx::mysql::MySqlPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_secs(10))
            .max_connections(10)
            .connect(url)
            .await
            .map_err(Error::ConnectionError)?;

        sqlx::migrate!().run(&db).await.map_err(Error::MigrationError)?;
        log::debug!("Connected to MySQL storage and applied migrations");

        Ok(Self::new(db))
    }
}

impl StorageDriver for MySqlStorage {
    /// Upserts one sample keyed by container name and timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EncodeError`] if the sample cannot be serialized and
    /// [`Error::InsertError`] if the insert fails.
    async fn add_stats(&self, name: &ContainerName, stats: &ContainerStats) -> Result<()> {
        const INSERT_QUERY: &str = r#"
INSERT INTO container_stats (
    name, timestamp, stats
) VALUES (
    ?, ?, ?
)
ON DUPLICATE KEY UPDATE
    stats = VALUES(stats)
"#;
        let encoded = serde_json::to_string(stats).map_err(Error::EncodeError)?;
        sqlx::query(INSERT_QUERY)
            .bind(name.as_ref())
            .bind(stats.timestamp)
            .bind(encoded)
            .execute(&self.db)
            .await
            .map_err(Error::InsertError)?;

        Ok(())
    }

    async fn recent_stats(
        &self,
        name: &ContainerName,
        num_stats: usize,
    ) -> Result<Vec<ContainerStats>> {
        const SELECT_QUERY: &str = r#"
SELECT stats FROM container_stats
WHERE name = ?
ORDER BY timestamp DESC
LIMIT ?
"#;
        if num_stats == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_scalar::<_, String>(SELECT_QUERY)
            .bind(name.as_ref())
            .bind(num_stats as u64)
            .fetch_all(&self.db)
            .await
            .map_err(Error::ReadError)?;

        let mut out = rows
            .iter()
            .map(|raw| serde_json::from_str::<ContainerStats>(raw).map_err(Error::DecodeError))
            .collect::<Result<Vec<_>>>()?;
        out.reverse();

        Ok(out)
    }
}
