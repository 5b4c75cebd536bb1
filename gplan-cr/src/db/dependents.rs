//! Records that reference varieties: plant profiles, plant instances, grow lists

use super::codec::decode_string_array;
use gplan_common::db::{GrowList, GrowListItem, PlantInstance, PlantProfile};
use gplan_common::Result;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use tracing::warn;

// ========================================
// Plant profiles
// ========================================

pub async fn list_plant_profiles(pool: &SqlitePool) -> Result<Vec<PlantProfile>> {
    let rows = sqlx::query("SELECT id, owner_id, variety_id, nickname FROM plant_profiles ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| PlantProfile {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            variety_id: row.get("variety_id"),
            nickname: row.get("nickname"),
        })
        .collect())
}

pub async fn update_plant_profile_variety(pool: &SqlitePool, id: &str, variety_id: &str) -> Result<()> {
    sqlx::query("UPDATE plant_profiles SET variety_id = ?, updated_date = ? WHERE id = ?")
        .bind(variety_id)
        .bind(gplan_common::time::now_rfc3339())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn insert_plant_profile(pool: &SqlitePool, profile: &PlantProfile) -> Result<()> {
    sqlx::query("INSERT INTO plant_profiles (id, owner_id, variety_id, nickname) VALUES (?, ?, ?, ?)")
        .bind(&profile.id)
        .bind(&profile.owner_id)
        .bind(&profile.variety_id)
        .bind(&profile.nickname)
        .execute(pool)
        .await?;

    Ok(())
}

// ========================================
// Plant instances
// ========================================

pub async fn list_plant_instances(pool: &SqlitePool) -> Result<Vec<PlantInstance>> {
    let rows = sqlx::query("SELECT id, garden_id, variety_id, planted_date FROM plant_instances ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| PlantInstance {
            id: row.get("id"),
            garden_id: row.get("garden_id"),
            variety_id: row.get("variety_id"),
            planted_date: row.get("planted_date"),
        })
        .collect())
}

pub async fn update_plant_instance_variety(pool: &SqlitePool, id: &str, variety_id: &str) -> Result<()> {
    sqlx::query("UPDATE plant_instances SET variety_id = ?, updated_date = ? WHERE id = ?")
        .bind(variety_id)
        .bind(gplan_common::time::now_rfc3339())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn insert_plant_instance(pool: &SqlitePool, instance: &PlantInstance) -> Result<()> {
    sqlx::query("INSERT INTO plant_instances (id, garden_id, variety_id, planted_date) VALUES (?, ?, ?, ?)")
        .bind(&instance.id)
        .bind(&instance.garden_id)
        .bind(&instance.variety_id)
        .bind(&instance.planted_date)
        .execute(pool)
        .await?;

    Ok(())
}

// ========================================
// Grow lists
// ========================================

/// Decode the `items` column
///
/// Array entries keep their stored shape; see [`GrowListItem`]. A column that
/// is not a JSON array is read as a list of bare ids.
fn decode_items(raw: Option<&str>, list_id: &str) -> Vec<GrowListItem> {
    let parsed = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(serde_json::from_str::<Value>);

    match parsed {
        None => Vec::new(),
        Some(Ok(Value::Array(entries))) => entries
            .into_iter()
            .map(|entry| serde_json::from_value(entry.clone()).unwrap_or(GrowListItem::Opaque(entry)))
            .collect(),
        Some(_) => {
            warn!(grow_list_id = %list_id, "Grow list items are not a JSON array; reading as ids");
            decode_string_array(raw, "items", list_id)
                .into_iter()
                .map(GrowListItem::Id)
                .collect()
        }
    }
}

pub async fn list_grow_lists(pool: &SqlitePool) -> Result<Vec<GrowList>> {
    let rows = sqlx::query("SELECT id, owner_id, name, items FROM grow_lists ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let id: String = row.get("id");
            let items = decode_items(row.get::<Option<String>, _>("items").as_deref(), &id);
            GrowList {
                owner_id: row.get("owner_id"),
                name: row.get::<Option<String>, _>("name").unwrap_or_default(),
                items,
                id,
            }
        })
        .collect())
}

/// Replace the whole item array of one grow list
pub async fn update_grow_list_items(pool: &SqlitePool, id: &str, items: &[GrowListItem]) -> Result<()> {
    sqlx::query("UPDATE grow_lists SET items = ?, updated_date = ? WHERE id = ?")
        .bind(serde_json::to_string(items)?)
        .bind(gplan_common::time::now_rfc3339())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn insert_grow_list(pool: &SqlitePool, list: &GrowList) -> Result<()> {
    sqlx::query("INSERT INTO grow_lists (id, owner_id, name, items) VALUES (?, ?, ?, ?)")
        .bind(&list.id)
        .bind(&list.owner_id)
        .bind(&list.name)
        .bind(serde_json::to_string(&list.items)?)
        .execute(pool)
        .await?;

    Ok(())
}
