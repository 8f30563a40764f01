use crate::application::ports::key_value_store::KeyValueStore;
use crate::shared::config::StorageConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Executor, Pool, Row, Sqlite};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY NOT NULL,
    value BLOB NOT NULL,
    updated_at INTEGER NOT NULL
)
"#;

/// SQLite-backed durable store. Each `set` is a single-row upsert, which is
/// atomic per key.
#[derive(Clone)]
pub struct SqliteKeyValueStore {
    pool: Pool<Sqlite>,
}

impl SqliteKeyValueStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &StorageConfig) -> Result<Self, AppError> {
        if let Some(path) = sqlite_file_path(&config.database_url) {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;

        let store = Self::new(pool);
        store.ensure_schema().await?;
        tracing::info!(
            target: "offline::storage",
            url = %config.database_url,
            "sqlite key-value store ready"
        );
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<(), AppError> {
        self.pool.execute(SCHEMA).await?;
        Ok(())
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

fn sqlite_file_path(url: &str) -> Option<&str> {
    let rest = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path.starts_with(":memory:") {
        None
    } else {
        Some(path)
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, AppError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let value: Vec<u8> = row.try_get("value")?;
                Ok(Some(Bytes::from(value)))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value.as_ref())
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|err| AppError::Storage(format!("failed to write '{key}': {err}")))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|err| AppError::Storage(format!("failed to remove '{key}': {err}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_store() -> SqliteKeyValueStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteKeyValueStore::new(pool);
        store.ensure_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_set_overwrites_existing_value() {
        let store = setup_store().await;

        store.set("queue", Bytes::from_static(b"[1]")).await.unwrap();
        store.set("queue", Bytes::from_static(b"[1,2]")).await.unwrap();

        assert_eq!(
            store.get("queue").await.unwrap(),
            Some(Bytes::from_static(b"[1,2]"))
        );

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM kv_store")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_remove_missing_key_is_noop() {
        let store = setup_store().await;
        store.remove("nothing").await.unwrap();
        assert!(store.get("nothing").await.unwrap().is_none());
    }

    #[test]
    fn test_sqlite_file_path_parsing() {
        assert_eq!(
            sqlite_file_path("sqlite:/tmp/a/offline.db?mode=rwc"),
            Some("/tmp/a/offline.db")
        );
        assert_eq!(sqlite_file_path("sqlite://data/x.db"), Some("data/x.db"));
        assert_eq!(sqlite_file_path("sqlite::memory:"), None);
        assert_eq!(sqlite_file_path("postgres://x"), None);
    }
}
