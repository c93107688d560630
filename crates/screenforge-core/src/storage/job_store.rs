//! The job state store (C11): a durable key-value map over
//! `assessment:{id}` and `batch:{id}` keys, backed by SQLite.
//!
//! Per §4.11's concurrency contract, writes are full replaces (no
//! field-level overlay) and must refresh TTL on every touch; a reader
//! seeing a slightly stale version is acceptable. `update` therefore
//! reads, applies a patch function, and writes the whole value back
//! inside one transaction, mirroring the read-modify-write pattern in
//! `storage::rate_limits::check_rate_limit`.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::DbPool;
use crate::error::StorageError;

const DEFAULT_ASSESSMENT_TTL: chrono::Duration = chrono::Duration::hours(24);
const DEFAULT_BATCH_TTL: chrono::Duration = chrono::Duration::days(7);

pub fn assessment_ttl() -> chrono::Duration {
    DEFAULT_ASSESSMENT_TTL
}

pub fn batch_ttl() -> chrono::Duration {
    DEFAULT_BATCH_TTL
}

/// The durable job state store.
pub struct JobStore {
    pool: DbPool,
}

impl JobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Store `value` at `key` with the given TTL, replacing any existing value.
    pub async fn put<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: chrono::Duration) -> Result<(), StorageError> {
        let json = serde_json::to_string(value).map_err(|e| StorageError::Serialize { source: e })?;
        let expires_at = Utc::now() + ttl;

        sqlx::query(
            "INSERT INTO job_store (key, value, expires_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
        )
        .bind(key)
        .bind(json)
        .bind(expires_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;

        Ok(())
    }

    /// Fetch the value at `key`, or `None` if absent or expired.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let row: Option<(String, String)> = sqlx::query_as("SELECT value, expires_at FROM job_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Query { source: e })?;

        let Some((value, expires_at)) = row else {
            return Ok(None);
        };

        let expires_at: DateTime<Utc> = expires_at
            .parse()
            .map_err(|_| StorageError::Snapshot {
                message: format!("corrupt expires_at for key {key}"),
            })?;
        if expires_at < Utc::now() {
            return Ok(None);
        }

        serde_json::from_str(&value)
            .map(Some)
            .map_err(|e| StorageError::Serialize { source: e })
    }

    /// Fetch multiple keys in one round trip. Missing/expired keys are simply absent.
    pub async fn get_multi<T: DeserializeOwned>(&self, keys: &[String]) -> Result<Vec<(String, T)>, StorageError> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get::<T>(key).await? {
                out.push((key.clone(), value));
            }
        }
        Ok(out)
    }

    /// Read-modify-write: load the current value (or `None` if absent),
    /// apply `patch`, and persist the result with a refreshed TTL.
    pub async fn update<T, F>(&self, key: &str, ttl: chrono::Duration, patch: F) -> Result<(), StorageError>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce(Option<T>) -> T,
    {
        let mut tx = self.pool.begin().await.map_err(|e| StorageError::Query { source: e })?;

        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM job_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StorageError::Query { source: e })?;

        let current = match row {
            Some((value,)) => Some(serde_json::from_str(&value).map_err(|e| StorageError::Serialize { source: e })?),
            None => None,
        };

        let updated = patch(current);
        let json = serde_json::to_string(&updated).map_err(|e| StorageError::Serialize { source: e })?;
        let expires_at = Utc::now() + ttl;

        sqlx::query(
            "INSERT INTO job_store (key, value, expires_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
        )
        .bind(key)
        .bind(json)
        .bind(expires_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Query { source: e })?;

        tx.commit().await.map_err(|e| StorageError::Query { source: e })?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM job_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Query { source: e })?;
        Ok(())
    }

    pub async fn delete_multi(&self, keys: &[String]) -> Result<(), StorageError> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }

    /// List keys under `prefix`. Operational use only — not on any hot path.
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let pattern = format!("{prefix}%");
        let rows: Vec<(String,)> = sqlx::query_as("SELECT key FROM job_store WHERE key LIKE ? ORDER BY key")
            .bind(pattern)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Query { source: e })?;
        Ok(rows.into_iter().map(|(k,)| k).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::init_test_db;

    #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug, Clone)]
    struct Dummy {
        count: u32,
    }

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let pool = init_test_db().await.unwrap();
        let store = JobStore::new(pool);
        store.put("assessment:1", &Dummy { count: 1 }, assessment_ttl()).await.unwrap();
        let got: Option<Dummy> = store.get("assessment:1").await.unwrap();
        assert_eq!(got, Some(Dummy { count: 1 }));
    }

    #[tokio::test]
    async fn get_missing_key_returns_none() {
        let pool = init_test_db().await.unwrap();
        let store = JobStore::new(pool);
        let got: Option<Dummy> = store.get("assessment:missing").await.unwrap();
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn get_expired_key_returns_none() {
        let pool = init_test_db().await.unwrap();
        let store = JobStore::new(pool);
        store
            .put("assessment:2", &Dummy { count: 1 }, chrono::Duration::seconds(-1))
            .await
            .unwrap();
        let got: Option<Dummy> = store.get("assessment:2").await.unwrap();
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn update_applies_patch_on_existing_value() {
        let pool = init_test_db().await.unwrap();
        let store = JobStore::new(pool);
        store.put("assessment:3", &Dummy { count: 1 }, assessment_ttl()).await.unwrap();

        store
            .update::<Dummy, _>("assessment:3", assessment_ttl(), |current| {
                let mut value = current.expect("value exists");
                value.count += 1;
                value
            })
            .await
            .unwrap();

        let got: Option<Dummy> = store.get("assessment:3").await.unwrap();
        assert_eq!(got, Some(Dummy { count: 2 }));
    }

    #[tokio::test]
    async fn update_on_absent_key_starts_from_none() {
        let pool = init_test_db().await.unwrap();
        let store = JobStore::new(pool);

        store
            .update::<Dummy, _>("assessment:4", assessment_ttl(), |current| {
                assert!(current.is_none());
                Dummy { count: 42 }
            })
            .await
            .unwrap();

        let got: Option<Dummy> = store.get("assessment:4").await.unwrap();
        assert_eq!(got, Some(Dummy { count: 42 }));
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let pool = init_test_db().await.unwrap();
        let store = JobStore::new(pool);
        store.put("assessment:5", &Dummy { count: 1 }, assessment_ttl()).await.unwrap();
        store.delete("assessment:5").await.unwrap();
        let got: Option<Dummy> = store.get("assessment:5").await.unwrap();
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let pool = init_test_db().await.unwrap();
        let store = JobStore::new(pool);
        store.put("assessment:1", &Dummy { count: 1 }, assessment_ttl()).await.unwrap();
        store.put("batch:1", &Dummy { count: 2 }, batch_ttl()).await.unwrap();

        let keys = store.list("assessment:").await.unwrap();
        assert_eq!(keys, vec!["assessment:1".to_string()]);
    }
}
