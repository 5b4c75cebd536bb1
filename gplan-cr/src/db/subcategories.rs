//! Plant subcategory queries

use gplan_common::db::PlantSubCategory;
use gplan_common::Result;
use sqlx::{Row, SqlitePool};

const SELECT_SUBCATEGORY: &str =
    "SELECT id, plant_type_id, subcat_code, name, is_active FROM plant_subcategories";

fn row_to_subcategory(row: &sqlx::sqlite::SqliteRow) -> PlantSubCategory {
    let is_active: i64 = row.get("is_active");
    PlantSubCategory {
        id: row.get("id"),
        plant_type_id: row.get("plant_type_id"),
        subcat_code: row.get("subcat_code"),
        name: row.get("name"),
        is_active: is_active != 0,
    }
}

/// All subcategories, or those of one plant type
pub async fn list_subcategories(
    pool: &SqlitePool,
    plant_type_id: Option<&str>,
) -> Result<Vec<PlantSubCategory>> {
    let rows = match plant_type_id {
        Some(type_id) => {
            sqlx::query(&format!("{} WHERE plant_type_id = ? ORDER BY subcat_code, id", SELECT_SUBCATEGORY))
                .bind(type_id)
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query(&format!("{} ORDER BY plant_type_id, subcat_code, id", SELECT_SUBCATEGORY))
                .fetch_all(pool)
                .await?
        }
    };

    Ok(rows.iter().map(row_to_subcategory).collect())
}

/// Overwrite code, name and active flag of an existing subcategory
pub async fn update_subcategory(pool: &SqlitePool, subcat: &PlantSubCategory) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE plant_subcategories
        SET subcat_code = ?, name = ?, is_active = ?, updated_date = ?
        WHERE id = ?
        "#,
    )
    .bind(&subcat.subcat_code)
    .bind(&subcat.name)
    .bind(subcat.is_active as i64)
    .bind(gplan_common::time::now_rfc3339())
    .bind(&subcat.id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(gplan_common::Error::NotFound(format!("subcategory {}", subcat.id)));
    }

    Ok(())
}

pub async fn insert_subcategory(pool: &SqlitePool, subcat: &PlantSubCategory) -> Result<()> {
    sqlx::query(
        "INSERT INTO plant_subcategories (id, plant_type_id, subcat_code, name, is_active) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&subcat.id)
    .bind(&subcat.plant_type_id)
    .bind(&subcat.subcat_code)
    .bind(&subcat.name)
    .bind(subcat.is_active as i64)
    .execute(pool)
    .await?;

    Ok(())
}
