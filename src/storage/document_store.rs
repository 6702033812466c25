//! SQLite document store.
//!
//! Monitors and hosts are stored as JSON documents keyed by their hex id,
//! with `created_at`/`updated_at` (Unix millis) owned by the store.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::model::{Host, Monitor, ObjectId};
use crate::storage::StorageError;
use crate::storage::db::SqlitePool;
use crate::storage::schema::init_schema;
use crate::storage::traits::{Collection, Store};

/// [`Store`] backed by SQLite through sqlx.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect and create the schema.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let pool = SqlitePool::connect(url).await?;
        Self::from_pool(pool).await
    }

    /// Use an existing pool, creating the schema if needed.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        init_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // =========================================================================
    // Document helpers
    // =========================================================================

    async fn find_all<T: DeserializeOwned>(
        &self,
        collection: Collection,
    ) -> Result<Vec<T>, StorageError> {
        let sql = format!("SELECT document FROM {collection} ORDER BY created_at, id");
        let rows: Vec<(String,)> = sqlx::query_as(&sql).fetch_all(self.pool.inner()).await?;

        rows.iter()
            .map(|(document,)| serde_json::from_str(document).map_err(StorageError::from))
            .collect()
    }

    async fn find_one<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: ObjectId,
    ) -> Result<Option<T>, StorageError> {
        let sql = format!("SELECT document FROM {collection} WHERE id = ?");
        let row: Option<(String,)> = sqlx::query_as(&sql)
            .bind(id.to_hex())
            .fetch_optional(self.pool.inner())
            .await?;

        row.map(|(document,)| serde_json::from_str(&document))
            .transpose()
            .map_err(StorageError::from)
    }

    async fn insert<T: Serialize + Sync>(
        &self,
        collection: Collection,
        id: ObjectId,
        document: &T,
    ) -> Result<(), StorageError> {
        let now = chrono::Utc::now().timestamp_millis();
        let sql = format!(
            "INSERT INTO {collection} (id, document, created_at, updated_at) VALUES (?, ?, ?, ?)"
        );

        let result = sqlx::query(&sql)
            .bind(id.to_hex())
            .bind(serde_json::to_string(document)?)
            .bind(now)
            .bind(now)
            .execute(self.pool.inner())
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                StorageError::InvalidData(format!("duplicate {} {}", collection.singular(), id)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn update<T: Serialize + Sync>(
        &self,
        collection: Collection,
        id: ObjectId,
        document: &T,
    ) -> Result<(), StorageError> {
        let sql = format!("UPDATE {collection} SET document = ?, updated_at = ? WHERE id = ?");
        let result = sqlx::query(&sql)
            .bind(serde_json::to_string(document)?)
            .bind(chrono::Utc::now().timestamp_millis())
            .bind(id.to_hex())
            .execute(self.pool.inner())
            .await?;

        if result.rows_affected() == 0 {
            return Err(collection.not_found(id));
        }
        Ok(())
    }

    async fn remove(&self, collection: Collection, id: ObjectId) -> Result<bool, StorageError> {
        let sql = format!("DELETE FROM {collection} WHERE id = ?");
        let result = sqlx::query(&sql)
            .bind(id.to_hex())
            .execute(self.pool.inner())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    async fn find_monitors(&self) -> Result<Vec<Monitor>, StorageError> {
        self.find_all(Collection::Monitors).await
    }

    async fn find_monitor(&self, id: ObjectId) -> Result<Option<Monitor>, StorageError> {
        self.find_one(Collection::Monitors, id).await
    }

    async fn insert_monitor(&self, monitor: &Monitor) -> Result<(), StorageError> {
        self.insert(Collection::Monitors, monitor.id, monitor).await
    }

    async fn update_monitor(&self, monitor: &Monitor) -> Result<(), StorageError> {
        self.update(Collection::Monitors, monitor.id, monitor).await
    }

    async fn remove_monitor(&self, id: ObjectId) -> Result<bool, StorageError> {
        self.remove(Collection::Monitors, id).await
    }

    async fn find_hosts(&self) -> Result<Vec<Host>, StorageError> {
        self.find_all(Collection::Hosts).await
    }

    async fn find_host(&self, id: ObjectId) -> Result<Option<Host>, StorageError> {
        self.find_one(Collection::Hosts, id).await
    }

    async fn insert_host(&self, host: &Host) -> Result<(), StorageError> {
        self.insert(Collection::Hosts, host.id, host).await
    }

    async fn update_host(&self, host: &Host) -> Result<(), StorageError> {
        self.update(Collection::Hosts, host.id, host).await
    }

    async fn remove_host(&self, id: ObjectId) -> Result<bool, StorageError> {
        self.remove(Collection::Hosts, id).await
    }
}
