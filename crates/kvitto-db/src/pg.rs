//! Postgres-backed registry and receipt store.
//!
//! Queries are runtime-bound (`sqlx::query_as` + `.bind`), so the crate
//! builds without a live database. The Process commit in `create_for_file`
//! runs the processed-flag compare-and-set and the receipt insert in one
//! transaction; the `receipts.file_id` uniqueness constraint backstops the
//! at-most-one-receipt-per-file invariant.

use async_trait::async_trait;
use chrono::Utc;
use kvitto_core::models::{
    ExtractedReceipt, Receipt, ReceiptFile, ReceiptFileRow, ReceiptRow, Validity,
};
use kvitto_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::repository::{processing_conflict, ReceiptFileRepository, ReceiptRepository};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS receipt_files (
    id UUID PRIMARY KEY,
    file_name TEXT NOT NULL,
    storage_key TEXT NOT NULL,
    is_valid BOOLEAN,
    invalid_reason TEXT,
    is_processed BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS receipts (
    id UUID PRIMARY KEY,
    file_id UUID NOT NULL UNIQUE REFERENCES receipt_files(id),
    merchant_name TEXT NOT NULL,
    total_amount NUMERIC(14, 2) NOT NULL,
    purchased_at TIMESTAMPTZ NOT NULL,
    file_path TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);
"#;

/// Create the two pipeline tables when they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), AppError> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

/// Postgres implementation of the file registry.
#[derive(Clone)]
pub struct PgReceiptFileRepository {
    pool: PgPool,
}

impl PgReceiptFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<ReceiptFile>, AppError> {
        let row: Option<ReceiptFileRow> = sqlx::query_as::<Postgres, ReceiptFileRow>(
            "SELECT * FROM receipt_files WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ReceiptFileRow::into_model))
    }
}

#[async_trait]
impl ReceiptFileRepository for PgReceiptFileRepository {
    #[tracing::instrument(skip(self), fields(db.table = "receipt_files", db.operation = "insert"))]
    async fn create(&self, file_name: String, storage_key: String) -> Result<ReceiptFile, AppError> {
        let now = Utc::now();
        let row: ReceiptFileRow = sqlx::query_as::<Postgres, ReceiptFileRow>(
            r#"
            INSERT INTO receipt_files (
                id, file_name, storage_key,
                is_valid, invalid_reason, is_processed,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, NULL, NULL, FALSE, $4, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&file_name)
        .bind(&storage_key)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_model())
    }

    async fn get(&self, id: Uuid) -> Result<ReceiptFile, AppError> {
        self.fetch(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("receipt file {} not found", id)))
    }

    #[tracing::instrument(skip(self, validity), fields(db.table = "receipt_files", db.operation = "update"))]
    async fn set_validity(&self, id: Uuid, validity: Validity) -> Result<ReceiptFile, AppError> {
        let (is_valid, invalid_reason) = validity.to_columns();
        let row: Option<ReceiptFileRow> = sqlx::query_as::<Postgres, ReceiptFileRow>(
            r#"
            UPDATE receipt_files
            SET is_valid = $2, invalid_reason = $3, updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(is_valid)
        .bind(invalid_reason)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ReceiptFileRow::into_model)
            .ok_or_else(|| AppError::NotFound(format!("receipt file {} not found", id)))
    }

    #[tracing::instrument(skip(self), fields(db.table = "receipt_files", db.operation = "update"))]
    async fn mark_processed(&self, id: Uuid) -> Result<ReceiptFile, AppError> {
        let row: Option<ReceiptFileRow> = sqlx::query_as::<Postgres, ReceiptFileRow>(
            r#"
            UPDATE receipt_files
            SET is_processed = TRUE, updated_at = $2
            WHERE id = $1 AND is_valid IS TRUE AND is_processed = FALSE
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.into_model()),
            // The compare-and-set matched nothing; report why from current state.
            None => match self.fetch(id).await? {
                Some(file) => Err(processing_conflict(&file)),
                None => Err(AppError::NotFound(format!("receipt file {} not found", id))),
            },
        }
    }

    async fn list(&self) -> Result<Vec<ReceiptFile>, AppError> {
        let rows: Vec<ReceiptFileRow> = sqlx::query_as::<Postgres, ReceiptFileRow>(
            "SELECT * FROM receipt_files ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ReceiptFileRow::into_model).collect())
    }
}

/// Postgres implementation of the receipt store.
#[derive(Clone)]
pub struct PgReceiptRepository {
    pool: PgPool,
}

impl PgReceiptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReceiptRepository for PgReceiptRepository {
    #[tracing::instrument(skip(self, extracted), fields(db.table = "receipts", db.operation = "insert"))]
    async fn create_for_file(
        &self,
        file_id: Uuid,
        extracted: &ExtractedReceipt,
        file_path: &str,
    ) -> Result<Receipt, AppError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE receipt_files
            SET is_processed = TRUE, updated_at = $2
            WHERE id = $1 AND is_valid IS TRUE AND is_processed = FALSE
            "#,
        )
        .bind(file_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() != 1 {
            tx.rollback().await.ok();
            let row: Option<ReceiptFileRow> = sqlx::query_as::<Postgres, ReceiptFileRow>(
                "SELECT * FROM receipt_files WHERE id = $1",
            )
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await?;
            return Err(match row {
                Some(row) => processing_conflict(&row.into_model()),
                None => AppError::NotFound(format!("receipt file {} not found", file_id)),
            });
        }

        let insert = sqlx::query_as::<Postgres, ReceiptRow>(
            r#"
            INSERT INTO receipts (
                id, file_id, merchant_name, total_amount,
                purchased_at, file_path, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(file_id)
        .bind(&extracted.merchant_name)
        .bind(extracted.total_amount)
        .bind(extracted.purchased_at)
        .bind(file_path)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await;

        let row = match insert {
            Ok(row) => row,
            Err(e) => {
                tx.rollback().await.ok();
                // Lost a race against another commit for the same file.
                if let sqlx::Error::Database(ref db) = e {
                    if db.is_unique_violation() {
                        return Err(AppError::Conflict("file already processed".to_string()));
                    }
                }
                return Err(e.into());
            }
        };

        tx.commit().await?;
        Ok(row.into_model())
    }

    async fn get(&self, id: Uuid) -> Result<Receipt, AppError> {
        let row: Option<ReceiptRow> =
            sqlx::query_as::<Postgres, ReceiptRow>("SELECT * FROM receipts WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(ReceiptRow::into_model)
            .ok_or_else(|| AppError::NotFound(format!("receipt {} not found", id)))
    }

    async fn list(&self) -> Result<Vec<Receipt>, AppError> {
        let rows: Vec<ReceiptRow> = sqlx::query_as::<Postgres, ReceiptRow>(
            "SELECT * FROM receipts ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ReceiptRow::into_model).collect())
    }
}
