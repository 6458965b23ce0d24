//! Prescription store: CRUD over the `prescriptions` table.
//!
//! Every mutation is a single statement whose affected-row count is the
//! authoritative success check. There is no read-then-write existence probe,
//! so concurrent callers rely on SQLite's own write serialization.

use crate::db::migrations::{init_db, MigrationError};
use crate::domain::{Clock, Prescription};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Extended result codes for `SQLITE_CONSTRAINT_PRIMARYKEY` and `SQLITE_CONSTRAINT_UNIQUE`.
const SQLITE_KEY_VIOLATION_CODES: [&str; 2] = ["1555", "2067"];

const SELECT_SQL: &str = "SELECT name, quantity, rate, updated FROM prescriptions";

/// Store for prescription records.
#[derive(Debug, Clone)]
pub struct PrescriptionStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl PrescriptionStore {
    /// Create a store over an already-migrated pool.
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        PrescriptionStore { pool, clock }
    }

    /// Open the database at `db_path`, applying pending migrations.
    pub async fn open(
        db_path: impl AsRef<Path>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, MigrationError> {
        let pool = init_db(db_path).await?;
        Ok(Self::new(pool, clock))
    }

    /// Close every pooled connection. Later calls fail with `StoreError::Storage`.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Prescription store closed");
    }

    /// Round-trip a trivial query to confirm the database is reachable.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Current instant according to the store's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Insert a new prescription stamped with the current instant.
    ///
    /// # Errors
    /// `AlreadyExists` if `name` is taken.
    pub async fn create(
        &self,
        name: &str,
        quantity: f64,
        rate: f64,
    ) -> Result<Prescription, StoreError> {
        let updated = truncate_to_millis(self.clock.now());

        let result = sqlx::query(
            "INSERT INTO prescriptions (name, quantity, rate, updated) VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(quantity)
        .bind(rate)
        .bind(updated.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, name))?;

        expect_one_affected(result.rows_affected(), || {
            StoreError::AlreadyExists(name.to_string())
        })?;

        info!(name = %name, quantity, rate, "Prescription created");
        Ok(Prescription::new(name, quantity, rate, updated))
    }

    /// Fetch one prescription by name.
    ///
    /// # Errors
    /// `NotFound` if absent.
    pub async fn read(&self, name: &str) -> Result<Prescription, StoreError> {
        let row = sqlx::query(&format!("{} WHERE name = ?", SELECT_SQL))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row_to_prescription(&row),
            None => Err(StoreError::NotFound(name.to_string())),
        }
    }

    /// Fetch every prescription. Order is unspecified.
    pub async fn read_all(&self) -> Result<Vec<Prescription>, StoreError> {
        let rows = sqlx::query(SELECT_SQL).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_prescription).collect()
    }

    /// Set the quantity on hand and restamp `updated`.
    ///
    /// # Errors
    /// `NotFound` unless exactly one row changed.
    pub async fn update_quantity(&self, name: &str, quantity: f64) -> Result<(), StoreError> {
        let updated = truncate_to_millis(self.clock.now());

        let result =
            sqlx::query("UPDATE prescriptions SET quantity = ?, updated = ? WHERE name = ?")
                .bind(quantity)
                .bind(updated.timestamp_millis())
                .bind(name)
                .execute(&self.pool)
                .await?;

        expect_one_affected(result.rows_affected(), || StoreError::NotFound(name.to_string()))?;
        debug!(name = %name, quantity, "Prescription quantity updated");
        Ok(())
    }

    /// Set the consumption rate. `updated` is left untouched.
    ///
    /// # Errors
    /// `NotFound` unless exactly one row changed.
    pub async fn update_rate(&self, name: &str, rate: f64) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE prescriptions SET rate = ? WHERE name = ?")
            .bind(rate)
            .bind(name)
            .execute(&self.pool)
            .await?;

        expect_one_affected(result.rows_affected(), || StoreError::NotFound(name.to_string()))?;
        debug!(name = %name, rate, "Prescription rate updated");
        Ok(())
    }

    /// Remove a prescription.
    ///
    /// # Errors
    /// `NotFound` unless exactly one row was deleted.
    pub async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM prescriptions WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;

        expect_one_affected(result.rows_affected(), || StoreError::NotFound(name.to_string()))?;
        info!(name = %name, "Prescription deleted");
        Ok(())
    }
}

fn expect_one_affected(
    affected: u64,
    otherwise: impl FnOnce() -> StoreError,
) -> Result<(), StoreError> {
    if affected == 1 {
        Ok(())
    } else {
        Err(otherwise())
    }
}

fn map_insert_error(err: sqlx::Error, name: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let key_violation = db_err.is_unique_violation()
            || db_err
                .code()
                .is_some_and(|code| SQLITE_KEY_VIOLATION_CODES.contains(&code.as_ref()));
        if key_violation {
            return StoreError::AlreadyExists(name.to_string());
        }
    }
    StoreError::Storage(err)
}

fn row_to_prescription(row: &SqliteRow) -> Result<Prescription, StoreError> {
    let name: String = row.try_get("name")?;
    let quantity: f64 = row.try_get("quantity")?;
    let rate: f64 = row.try_get("rate")?;
    let updated_ms: i64 = row.try_get("updated")?;

    let updated = DateTime::from_timestamp_millis(updated_ms).ok_or_else(|| {
        sqlx::Error::Decode(format!("updated timestamp out of range: {}", updated_ms).into())
    })?;

    Ok(Prescription {
        name,
        quantity,
        rate,
        updated,
    })
}

/// Timestamps are persisted in milliseconds; trimming up front keeps the value
/// returned by `create` identical to what a later `read` yields.
fn truncate_to_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(instant.timestamp_millis()).unwrap_or(instant)
}
