//! Database migrations and initialization.
//!
//! Migrations are applied in ascending `version` order and the last applied
//! version is mirrored to `PRAGMA user_version`, so reopening a current
//! database is a no-op.

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("schema/0001_create_prescriptions.sql"),
}];

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion { db_version: u32, latest_supported: u32 },
    #[error("empty database path")]
    EmptyPath,
    #[error("failed to create database directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Latest schema version known to this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

/// Open (creating if needed) the SQLite database at `db_path`, configure pragmas
/// and bring the schema up to date.
pub async fn init_db(db_path: impl AsRef<Path>) -> Result<SqlitePool, MigrationError> {
    let db_path = db_path.as_ref();
    // SQLite gives each connection its own temporary database for an empty name
    if db_path.as_os_str().is_empty() {
        return Err(MigrationError::EmptyPath);
    }

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| MigrationError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .after_connect(|conn, _meta| Box::pin(async move { configure_pragmas_conn(conn).await }))
        .connect_with(options)
        .await?;

    if let Err(e) = run_migrations(&pool).await {
        pool.close().await;
        return Err(e);
    }

    info!(path = %db_path.display(), "Database initialized");
    Ok(pool)
}

/// Apply every migration newer than the database's `user_version`.
pub(crate) async fn run_migrations(pool: &SqlitePool) -> Result<(), MigrationError> {
    let current = current_user_version(pool).await?;
    let latest = latest_version();

    if current > latest {
        return Err(MigrationError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: latest,
        });
    }

    if current == latest {
        info!(version = current, "Schema is current");
        return Ok(());
    }

    info!(from = current, to = latest, "Running database migrations...");
    let mut tx = pool.begin().await?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        for statement in migration.sql.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed).execute(&mut *tx).await?;
            }
        }
        sqlx::query(&format!("PRAGMA user_version = {}", migration.version))
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    info!(version = latest, "Migrations completed successfully");
    Ok(())
}

async fn current_user_version(pool: &SqlitePool) -> Result<u32, sqlx::Error> {
    let row = sqlx::query("PRAGMA user_version").fetch_one(pool).await?;
    let version: i64 = row.get(0);
    Ok(u32::try_from(version).unwrap_or(0))
}

async fn configure_pragmas_conn(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    // journal_mode returns the actual mode set; must use fetch to get result
    let row = sqlx::query("PRAGMA journal_mode = WAL")
        .fetch_one(&mut *conn)
        .await?;
    let journal_mode: String = row.get(0);
    tracing::debug!(journal_mode = %journal_mode, "SQLite journal mode set");

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&mut *conn)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&mut *conn)
        .await?;

    Ok(())
}
