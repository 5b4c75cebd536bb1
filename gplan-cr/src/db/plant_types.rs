//! Plant type queries

use gplan_common::db::PlantType;
use gplan_common::Result;
use sqlx::{Row, SqlitePool};

fn row_to_plant_type(row: &sqlx::sqlite::SqliteRow) -> PlantType {
    PlantType {
        id: row.get("id"),
        common_name: row.get("common_name"),
        type_code: row.get("type_code"),
    }
}

pub async fn list_plant_types(pool: &SqlitePool) -> Result<Vec<PlantType>> {
    let rows = sqlx::query("SELECT id, common_name, type_code FROM plant_types ORDER BY common_name, id")
        .fetch_all(pool)
        .await?;

    Ok(rows.iter().map(row_to_plant_type).collect())
}

pub async fn get_plant_type(pool: &SqlitePool, id: &str) -> Result<Option<PlantType>> {
    let row = sqlx::query("SELECT id, common_name, type_code FROM plant_types WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(row_to_plant_type))
}

/// Case-insensitive lookup by common name; oldest row wins if names collide
pub async fn find_plant_type_by_name(pool: &SqlitePool, common_name: &str) -> Result<Option<PlantType>> {
    let row = sqlx::query(
        r#"
        SELECT id, common_name, type_code
        FROM plant_types
        WHERE LOWER(TRIM(common_name)) = LOWER(TRIM(?))
        ORDER BY created_date, id
        LIMIT 1
        "#,
    )
    .bind(common_name)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(row_to_plant_type))
}

pub async fn insert_plant_type(pool: &SqlitePool, plant_type: &PlantType) -> Result<()> {
    sqlx::query("INSERT INTO plant_types (id, common_name, type_code) VALUES (?, ?, ?)")
        .bind(&plant_type.id)
        .bind(&plant_type.common_name)
        .bind(&plant_type.type_code)
        .execute(pool)
        .await?;

    Ok(())
}
