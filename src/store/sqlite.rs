use async_trait::async_trait;
use sqlx::{migrate::MigrateDatabase, Row, SqlitePool};
use tracing::info;

use crate::batch::{BatchId, BatchRecord};

use super::{BatchRepository, StoreError};

/// SQLite-backed batch store. One row per batch with the full document in a
/// JSON column; lot number, update time, and revision are mirrored into
/// indexed columns. The conditional `UPDATE ... WHERE revision = ?` is the
/// compare-and-swap that keeps concurrent transitions exclusive.
pub struct SqliteBatchStore {
    pool: SqlitePool,
}

impl SqliteBatchStore {
    /// Connect, creating the database file and running migrations as needed.
    pub async fn connect(database_url: &str, auto_migrate: bool) -> Result<Self, StoreError> {
        if !sqlx::Sqlite::database_exists(database_url)
            .await
            .map_err(backend)?
        {
            info!("Creating batch database at {}", database_url);
            sqlx::Sqlite::create_database(database_url)
                .await
                .map_err(backend)?;
        }

        let pool = SqlitePool::connect(database_url).await.map_err(backend)?;

        if auto_migrate {
            info!("Running batch store migrations");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn shutdown(&self) {
        info!("Closing batch store connections");
        self.pool.close().await;
    }

    fn decode(document: &str) -> Result<BatchRecord, StoreError> {
        serde_json::from_str(document)
            .map_err(|e| StoreError::Backend(format!("corrupt batch document: {e}")))
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl BatchRepository for SqliteBatchStore {
    async fn get(&self, id: &BatchId) -> Result<Option<BatchRecord>, StoreError> {
        let row = sqlx::query("SELECT document FROM batches WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(|r| Self::decode(&r.get::<String, _>("document")))
            .transpose()
    }

    async fn get_by_lot_number(
        &self,
        lot_number: &str,
    ) -> Result<Option<BatchRecord>, StoreError> {
        let row = sqlx::query("SELECT document FROM batches WHERE lot_number = ?1")
            .bind(lot_number)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(|r| Self::decode(&r.get::<String, _>("document")))
            .transpose()
    }

    async fn list_all(&self) -> Result<Vec<BatchRecord>, StoreError> {
        let rows = sqlx::query("SELECT document FROM batches ORDER BY updated_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.iter()
            .map(|r| Self::decode(&r.get::<String, _>("document")))
            .collect()
    }

    async fn save(
        &self,
        mut record: BatchRecord,
        expected_revision: Option<u64>,
    ) -> Result<BatchRecord, StoreError> {
        match expected_revision {
            None => {
                record.revision = 1;
                let document = serde_json::to_string(&record)
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
                let result = sqlx::query(
                    r#"
                    INSERT INTO batches (id, lot_number, revision, updated_at, document)
                    VALUES (?1, ?2, 1, ?3, ?4)
                    "#,
                )
                .bind(record.id.as_str())
                .bind(record.lot_number.as_deref())
                .bind(record.updated_at.to_rfc3339())
                .bind(&document)
                .execute(&self.pool)
                .await;

                match result {
                    Ok(_) => Ok(record),
                    Err(sqlx::Error::Database(db))
                        if db.kind() == sqlx::error::ErrorKind::UniqueViolation =>
                    {
                        Err(StoreError::DuplicateId {
                            id: record.id.to_string(),
                        })
                    }
                    Err(other) => Err(backend(other)),
                }
            }
            Some(expected) => {
                record.revision = expected + 1;
                let document = serde_json::to_string(&record)
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
                let result = sqlx::query(
                    r#"
                    UPDATE batches
                    SET lot_number = ?1, revision = ?2, updated_at = ?3, document = ?4
                    WHERE id = ?5 AND revision = ?6
                    "#,
                )
                .bind(record.lot_number.as_deref())
                .bind(record.revision as i64)
                .bind(record.updated_at.to_rfc3339())
                .bind(&document)
                .bind(record.id.as_str())
                .bind(expected as i64)
                .execute(&self.pool)
                .await
                .map_err(backend)?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::RevisionConflict {
                        id: record.id.to_string(),
                    });
                }
                Ok(record)
            }
        }
    }
}
