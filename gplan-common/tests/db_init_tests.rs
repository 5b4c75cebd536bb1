//! Tests for database initialization
//!
//! - Database file is created on first run
//! - Re-opening an existing database is a no-op
//! - Catalog tables exist with their JSON defaults
//! - Shared secret is generated once and then reused

use gplan_common::api::auth::{load_shared_secret, store_shared_secret};
use gplan_common::db::init::{init_database, init_memory_database};

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp = tempfile::tempdir().unwrap();
    let db_path = temp.path().join("gplan.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp = tempfile::tempdir().unwrap();
    let db_path = temp.path().join("gplan.db");

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO plant_types (id, common_name) VALUES ('t1', 'Tomato')")
        .execute(&pool1)
        .await
        .unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plant_types")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(count, 1, "Existing rows must survive re-initialization");
}

#[tokio::test]
async fn test_catalog_tables_created() {
    let pool = init_memory_database().await.unwrap();

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    for expected in [
        "grow_lists",
        "plant_instances",
        "plant_profiles",
        "plant_subcategories",
        "plant_types",
        "settings",
        "varieties",
    ] {
        assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_variety_json_columns_default_to_empty() {
    let pool = init_memory_database().await.unwrap();

    sqlx::query("INSERT INTO varieties (id, variety_name) VALUES ('v1', 'Sungold')")
        .execute(&pool)
        .await
        .unwrap();

    let (ids, traits, status): (String, String, String) = sqlx::query_as(
        "SELECT plant_subcategory_ids, traits, status FROM varieties WHERE id = 'v1'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();

    assert_eq!(ids, "[]");
    assert_eq!(traits, "{}");
    assert_eq!(status, "active");
}

#[tokio::test]
async fn test_shared_secret_generated_once() {
    let pool = init_memory_database().await.unwrap();

    let first = load_shared_secret(&pool).await.unwrap();
    let second = load_shared_secret(&pool).await.unwrap();

    assert_ne!(first, 0);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_shared_secret_zero_is_preserved() {
    let pool = init_memory_database().await.unwrap();

    store_shared_secret(&pool, 0).await.unwrap();
    assert_eq!(load_shared_secret(&pool).await.unwrap(), 0);
}
