//! Checkpoint Storage using SQLite

use async_trait::async_trait;
use bridge_traits::{
    checkpoint::CheckpointStore,
    error::{BridgeError, Result},
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::path::PathBuf;
use tracing::debug;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS checkpoints (
        scope_key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
"#;

/// SQLite-backed checkpoint store
///
/// One row per scope key. Writes are single-statement upserts, so concurrent rules
/// touching different keys never interleave and a key is never partially written.
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    /// Open (or create) the store at `db_path`
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(BridgeError::Io)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to connect to DB: {}", e)))?;

        Self::init_schema(&pool).await?;
        debug!(path = ?db_path, "Initialized checkpoint store");

        Ok(Self { pool })
    }

    /// Create an in-memory store (for testing)
    pub async fn in_memory() -> Result<Self> {
        // A single connection keeps every query on the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to connect to DB: {}", e)))?;

        Self::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to create table: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn get_checkpoint(&self, scope_key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM checkpoints WHERE scope_key = ?")
            .bind(scope_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                BridgeError::DatabaseError(format!("Failed to read checkpoint: {}", e))
            })?;

        Ok(row.map(|row| row.get(0)))
    }

    async fn set_checkpoint(&self, scope_key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO checkpoints (scope_key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(scope_key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(scope_key)
        .bind(value)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("Failed to write checkpoint: {}", e)))?;

        debug!(scope_key = scope_key, value = value, "Stored checkpoint");
        Ok(())
    }

    async fn delete_checkpoint(&self, scope_key: &str) -> Result<()> {
        sqlx::query("DELETE FROM checkpoints WHERE scope_key = ?")
            .bind(scope_key)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                BridgeError::DatabaseError(format!("Failed to delete checkpoint: {}", e))
            })?;

        debug!(scope_key = scope_key, "Deleted checkpoint");
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT scope_key FROM checkpoints ORDER BY scope_key")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to list keys: {}", e)))?;

        Ok(rows.into_iter().map(|row| row.get(0)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_checkpoint_is_none() {
        let store = SqliteCheckpointStore::in_memory().await.unwrap();
        assert_eq!(store.get_checkpoint("abc:p1:OR::album").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_overwrites_previous_value() {
        let store = SqliteCheckpointStore::in_memory().await.unwrap();

        store
            .set_checkpoint("key", "2024-01-01T00:00:00.000Z")
            .await
            .unwrap();
        store
            .set_checkpoint("key", "2024-02-01T00:00:00.000Z")
            .await
            .unwrap();

        assert_eq!(
            store.get_checkpoint("key").await.unwrap(),
            Some("2024-02-01T00:00:00.000Z".to_string())
        );
        assert_eq!(store.list_keys().await.unwrap(), vec!["key"]);
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let store = SqliteCheckpointStore::in_memory().await.unwrap();

        store.set_checkpoint("b", "2").await.unwrap();
        store.set_checkpoint("a", "1").await.unwrap();
        store.delete_checkpoint("b").await.unwrap();

        assert_eq!(store.get_checkpoint("a").await.unwrap(), Some("1".to_string()));
        assert_eq!(store.get_checkpoint("b").await.unwrap(), None);
        assert_eq!(store.list_keys().await.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = std::env::temp_dir().join(format!(
            "person-album-sync-test-{}",
            std::process::id()
        ));
        let path = dir.join("checkpoints.db");

        {
            let store = SqliteCheckpointStore::new(path.clone()).await.unwrap();
            store.set_checkpoint("k", "v").await.unwrap();
            store.pool.close().await;
        }

        let reopened = SqliteCheckpointStore::new(path).await.unwrap();
        assert_eq!(reopened.get_checkpoint("k").await.unwrap(), Some("v".to_string()));

        let _ = std::fs::remove_dir_all(dir);
    }
}
