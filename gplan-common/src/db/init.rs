//! Database initialization
//!
//! Creates the catalog tables on first run. Every statement is
//! `CREATE TABLE IF NOT EXISTS`, so opening an existing database is a no-op
//! apart from the pragmas.
//!
//! Referential columns (`plant_type_id`, `variety_id`, ...) deliberately carry
//! no FOREIGN KEY constraints: the catalog is known to contain dangling and
//! tombstoned references and the reconciliation routines must be able to
//! load them in order to repair them.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets diagnostics read while a repair pass writes
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_catalog_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the catalog schema
///
/// Each SQLite in-memory connection is its own database, so the pool is
/// pinned to a single connection that is never recycled.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    create_catalog_schema(&pool).await?;

    Ok(pool)
}

/// Create every table the catalog services use (idempotent)
pub async fn create_catalog_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_plant_types_table(pool).await?;
    create_plant_subcategories_table(pool).await?;
    create_varieties_table(pool).await?;
    create_plant_profiles_table(pool).await?;
    create_plant_instances_table(pool).await?;
    create_grow_lists_table(pool).await?;
    Ok(())
}

/// Create the settings table
///
/// Stores application configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_plant_types_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS plant_types (
            id TEXT PRIMARY KEY,
            common_name TEXT NOT NULL,
            type_code TEXT,
            created_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// `subcat_code` is unique per plant type, not globally
pub async fn create_plant_subcategories_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS plant_subcategories (
            id TEXT PRIMARY KEY,
            plant_type_id TEXT NOT NULL,
            subcat_code TEXT NOT NULL,
            name TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_subcategories_plant_type ON plant_subcategories(plant_type_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Array and object fields are JSON text
pub async fn create_varieties_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS varieties (
            id TEXT PRIMARY KEY,
            plant_type_id TEXT,
            variety_name TEXT NOT NULL,
            variety_code TEXT,
            plant_subcategory_id TEXT,
            plant_subcategory_code TEXT,
            plant_subcategory_ids TEXT NOT NULL DEFAULT '[]',
            plant_subcategory_codes TEXT NOT NULL DEFAULT '[]',
            status TEXT NOT NULL DEFAULT 'active',
            merged_into_variety_id TEXT,
            description TEXT,
            days_to_maturity INTEGER,
            spacing TEXT,
            flavor TEXT,
            fruit_shape TEXT,
            fruit_size TEXT,
            fruit_color TEXT,
            growth_habit TEXT,
            images TEXT NOT NULL DEFAULT '[]',
            synonyms TEXT NOT NULL DEFAULT '[]',
            sources TEXT NOT NULL DEFAULT '[]',
            traits TEXT NOT NULL DEFAULT '{}',
            extended_data TEXT NOT NULL DEFAULT '{}',
            created_date TEXT,
            updated_date TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_varieties_plant_type ON varieties(plant_type_id, status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_plant_profiles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS plant_profiles (
            id TEXT PRIMARY KEY,
            owner_id TEXT,
            variety_id TEXT,
            nickname TEXT,
            created_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_plant_instances_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS plant_instances (
            id TEXT PRIMARY KEY,
            garden_id TEXT,
            variety_id TEXT,
            planted_date TEXT,
            created_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// `items` is a JSON array of `{variety_id, ...}` objects
pub async fn create_grow_lists_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS grow_lists (
            id TEXT PRIMARY KEY,
            owner_id TEXT,
            name TEXT NOT NULL DEFAULT '',
            items TEXT NOT NULL DEFAULT '[]',
            created_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
