//! SQLite-backed session storage.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use sqlx::Row;
use tokio::sync::Mutex;

use super::{SESSION_KEYS, SessionStorage};
use crate::error::StorageError;

/// Session storage in a small `session_kv` table.
///
/// The pool is opened lazily on first use.
#[derive(Debug)]
pub struct SqliteStorage {
    path: PathBuf,
    pool: Mutex<Option<SqlitePool>>,
}

impl SqliteStorage {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pool: Mutex::new(None),
        }
    }

    /// Storage at `{app_data_dir}/flockdesk/session.db`.
    pub fn open_default() -> Result<Self, StorageError> {
        Ok(Self::open(default_db_path()?))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    async fn pool(&self) -> Result<SqlitePool, StorageError> {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Backend(format!(
                        "failed to create session directory at {:?}: {e}",
                        parent
                    ))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        tracing::debug!(path = ?self.path, "opened session storage");
        *guard = Some(pool.clone());
        Ok(pool)
    }
}

#[async_trait]
impl SessionStorage for SqliteStorage {
    async fn read_entries(&self) -> Result<HashMap<String, String>, StorageError> {
        let pool = self.pool().await?;
        let rows = sqlx::query("SELECT key, value FROM session_kv")
            .fetch_all(&pool)
            .await?;

        let mut entries = HashMap::new();
        for row in rows {
            let key: String = row.try_get("key")?;
            if SESSION_KEYS.contains(&key.as_str()) {
                let value: String = row.try_get("value")?;
                entries.insert(key, value);
            }
        }
        Ok(entries)
    }

    async fn write_entries(&self, entries: &[(&'static str, String)]) -> Result<(), StorageError> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;
        for (key, value) in entries {
            sqlx::query(
                r#"
                INSERT INTO session_kv (key, value)
                VALUES (?1, ?2)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
                "#,
            )
            .bind(*key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn remove_entries(&self, keys: &[&'static str]) -> Result<(), StorageError> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;
        for key in keys {
            sqlx::query("DELETE FROM session_kv WHERE key = ?1")
                .bind(*key)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

fn default_db_path() -> Result<PathBuf, StorageError> {
    let mut dir = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .ok_or_else(|| {
            StorageError::Backend(
                "failed to resolve OS app data directory - tried data_dir() and home_dir()/.local/share"
                    .to_string(),
            )
        })?;

    dir.push("flockdesk");
    dir.push("session.db");
    Ok(dir)
}
