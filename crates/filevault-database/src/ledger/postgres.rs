//! PostgreSQL version ledger.

use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgPool};
use sqlx::{Postgres, Transaction};
use tracing::debug;

use filevault_core::error::{AppError, ErrorKind};
use filevault_core::result::AppResult;
use filevault_core::types::{FileId, FileVersionId, OwnerId};
use filevault_entity::file::{File, FileVersion, FileWithVersions};

use super::{LedgerTransaction, VersionLedger, check_next_version_number};

/// SQLSTATE codes that mean "another transaction got there first".
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// Ledger backed by the `files` and `file_versions` tables.
#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    /// Create a new ledger over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Map a sqlx error, turning constraint and serialization failures into conflicts.
fn map_db_error(e: sqlx::Error, context: &str) -> AppError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or("unique").to_string();
            return AppError::with_source(
                ErrorKind::Conflict,
                format!("{context}: concurrent write violated {constraint}"),
                e,
            );
        }
        if db_err.is_foreign_key_violation() {
            return AppError::with_source(
                ErrorKind::Conflict,
                format!("{context}: file was deleted by a concurrent request"),
                e,
            );
        }
        if matches!(
            db_err.code().as_deref(),
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED)
        ) {
            return AppError::with_source(
                ErrorKind::Conflict,
                format!("{context}: transaction lost a write race"),
                e,
            );
        }
    }
    AppError::with_source(ErrorKind::Database, context.to_string(), e)
}

async fn fetch_file(
    conn: &mut PgConnection,
    owner_id: OwnerId,
    file_name: &str,
) -> AppResult<Option<File>> {
    sqlx::query_as::<_, File>("SELECT * FROM files WHERE owner_id = $1 AND file_name = $2")
        .bind(owner_id)
        .bind(file_name)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_db_error(e, "Failed to find file"))
}

async fn fetch_versions(conn: &mut PgConnection, file_id: FileId) -> AppResult<Vec<FileVersion>> {
    sqlx::query_as::<_, FileVersion>(
        "SELECT * FROM file_versions WHERE file_id = $1 ORDER BY version_number ASC",
    )
    .bind(file_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_db_error(e, "Failed to list file versions"))
}

async fn fetch_file_with_versions(
    conn: &mut PgConnection,
    owner_id: OwnerId,
    file_name: &str,
) -> AppResult<Option<FileWithVersions>> {
    let Some(file) = fetch_file(conn, owner_id, file_name).await? else {
        return Ok(None);
    };
    let versions = fetch_versions(conn, file.id).await?;
    Ok(Some(FileWithVersions::new(file, versions)))
}

#[async_trait]
impl VersionLedger for PgLedger {
    fn backend(&self) -> &str {
        "postgres"
    }

    async fn health_check(&self) -> AppResult<bool> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|v| v == 1)
            .map_err(|e| map_db_error(e, "Health check failed"))
    }

    async fn begin(&self) -> AppResult<Box<dyn LedgerTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error(e, "Failed to begin transaction"))?;
        Ok(Box::new(PgLedgerTransaction { tx }))
    }

    async fn find_file_with_versions(
        &self,
        owner_id: OwnerId,
        file_name: &str,
    ) -> AppResult<Option<FileWithVersions>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_db_error(e, "Failed to acquire connection"))?;
        fetch_file_with_versions(&mut conn, owner_id, file_name).await
    }

    async fn list_files(&self, owner_id: OwnerId) -> AppResult<Vec<FileWithVersions>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_db_error(e, "Failed to acquire connection"))?;

        let files = sqlx::query_as::<_, File>(
            "SELECT * FROM files WHERE owner_id = $1 ORDER BY file_name ASC",
        )
        .bind(owner_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_db_error(e, "Failed to list files"))?;

        let mut result = Vec::with_capacity(files.len());
        for file in files {
            let versions = fetch_versions(&mut conn, file.id).await?;
            result.push(FileWithVersions::new(file, versions));
        }
        Ok(result)
    }

    async fn delete_file(&self, file_id: FileId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(file_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "Failed to delete file"))?;
        Ok(result.rows_affected() > 0)
    }
}

/// A ledger transaction on a dedicated pooled connection.
///
/// sqlx rolls the transaction back when it is dropped uncommitted.
pub struct PgLedgerTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTransaction for PgLedgerTransaction {
    async fn lock_file_name(&mut self, owner_id: OwnerId, file_name: &str) -> AppResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text || '/' || $2, 0))")
            .bind(owner_id)
            .bind(file_name)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_db_error(e, "Failed to lock file name"))?;
        debug!(owner_id = %owner_id, file_name, "Acquired file name lock");
        Ok(())
    }

    async fn find_file_with_versions(
        &mut self,
        owner_id: OwnerId,
        file_name: &str,
    ) -> AppResult<Option<FileWithVersions>> {
        fetch_file_with_versions(&mut self.tx, owner_id, file_name).await
    }

    async fn create_file(&mut self, owner_id: OwnerId, file_name: &str) -> AppResult<File> {
        sqlx::query_as::<_, File>(
            "INSERT INTO files (id, owner_id, file_name) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(FileId::new())
        .bind(owner_id)
        .bind(file_name)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_db_error(e, &format!("Failed to create file '{file_name}'")))
    }

    async fn append_version(
        &mut self,
        file_id: FileId,
        version_number: i32,
        content_digest: &str,
        location: Option<&str>,
    ) -> AppResult<FileVersion> {
        let latest: Option<i32> =
            sqlx::query_scalar("SELECT MAX(version_number) FROM file_versions WHERE file_id = $1")
                .bind(file_id)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(|e| map_db_error(e, "Failed to read latest version"))?;
        check_next_version_number(file_id, latest.unwrap_or(0), version_number)?;

        let id = FileVersionId::new();
        let location = location
            .map(str::to_string)
            .unwrap_or_else(|| FileVersion::pending_location(id));

        sqlx::query_as::<_, FileVersion>(
            "INSERT INTO file_versions (id, file_id, version_number, content_digest, storage_location, is_current) \
             VALUES ($1, $2, $3, $4, $5, TRUE) RETURNING *",
        )
        .bind(id)
        .bind(file_id)
        .bind(version_number)
        .bind(content_digest)
        .bind(&location)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_db_error(e, "Failed to create file version"))
    }

    async fn mark_all_not_current(&mut self, file_id: FileId) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE file_versions SET is_current = FALSE WHERE file_id = $1 AND is_current",
        )
        .bind(file_id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_db_error(e, "Failed to clear current version"))?;
        Ok(result.rows_affected())
    }

    async fn set_storage_location(
        &mut self,
        version_id: FileVersionId,
        location: &str,
    ) -> AppResult<()> {
        let result = sqlx::query("UPDATE file_versions SET storage_location = $2 WHERE id = $1")
            .bind(version_id)
            .bind(location)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_db_error(e, "Failed to record storage location"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!(
                "File version {version_id} not found"
            )));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_db_error(e, "Failed to commit transaction"))
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_db_error(e, "Failed to roll back transaction"))
    }
}
