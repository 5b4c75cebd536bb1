//! Variety queries
//!
//! Rows are decoded into [`Variety`] without validation. Writes always
//! replace every mutable column, so a caller that loaded a record, changed
//! one field, and wrote it back preserves everything else.

use super::codec::{decode_object, decode_string_array};
use gplan_common::db::{RawClassification, Variety, VarietyDetails, VarietyStatus};
use gplan_common::Result;
use serde_json::Value;
use sqlx::{Row, SqlitePool};

const SELECT_VARIETY: &str = r#"
    SELECT id, plant_type_id, variety_name, variety_code,
           plant_subcategory_id, plant_subcategory_code,
           plant_subcategory_ids, plant_subcategory_codes,
           status, merged_into_variety_id,
           description, days_to_maturity, spacing, flavor,
           fruit_shape, fruit_size, fruit_color, growth_habit,
           images, synonyms, sources, traits, extended_data,
           created_date, updated_date
    FROM varieties
"#;

/// Row filter for [`list_varieties`]
#[derive(Debug, Clone, Default)]
pub struct VarietyFilter {
    pub plant_type_id: Option<String>,
    pub active_only: bool,
}

impl VarietyFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Active varieties of one plant type
    pub fn active_of_type(plant_type_id: &str) -> Self {
        Self {
            plant_type_id: Some(plant_type_id.to_string()),
            active_only: true,
        }
    }

    /// Every variety of one plant type, tombstones included
    pub fn of_type(plant_type_id: &str) -> Self {
        Self {
            plant_type_id: Some(plant_type_id.to_string()),
            active_only: false,
        }
    }

    pub fn active() -> Self {
        Self {
            plant_type_id: None,
            active_only: true,
        }
    }

    /// In-memory form of the WHERE clause
    pub fn matches(&self, variety: &Variety) -> bool {
        if self.active_only && !variety.status.is_active() {
            return false;
        }
        match &self.plant_type_id {
            Some(type_id) => variety.plant_type_id.as_deref() == Some(type_id.as_str()),
            None => true,
        }
    }
}

fn row_to_variety(row: &sqlx::sqlite::SqliteRow) -> Variety {
    let id: String = row.get("id");

    let extended_data = decode_object(row.get::<Option<String>, _>("extended_data").as_deref(), "extended_data", &id);
    let status_text: Option<String> = row.get("status");
    let merged_into: Option<String> = row.get("merged_into_variety_id");
    let status = VarietyStatus::from_columns(
        status_text.as_deref().unwrap_or("active"),
        merged_into.as_deref(),
        &extended_data,
    );

    let classification = RawClassification {
        primary_id: row.get("plant_subcategory_id"),
        primary_code: row.get("plant_subcategory_code"),
        ids: decode_string_array(
            row.get::<Option<String>, _>("plant_subcategory_ids").as_deref(),
            "plant_subcategory_ids",
            &id,
        ),
        codes: decode_string_array(
            row.get::<Option<String>, _>("plant_subcategory_codes").as_deref(),
            "plant_subcategory_codes",
            &id,
        ),
    };

    let details = VarietyDetails {
        description: row.get("description"),
        days_to_maturity: row.try_get::<Option<i64>, _>("days_to_maturity").ok().flatten(),
        spacing: row.get("spacing"),
        flavor: row.get("flavor"),
        fruit_shape: row.get("fruit_shape"),
        fruit_size: row.get("fruit_size"),
        fruit_color: row.get("fruit_color"),
        growth_habit: row.get("growth_habit"),
    };

    Variety {
        plant_type_id: row.get("plant_type_id"),
        variety_name: row.get::<Option<String>, _>("variety_name").unwrap_or_default(),
        variety_code: row.get("variety_code"),
        classification,
        status,
        details,
        images: decode_string_array(row.get::<Option<String>, _>("images").as_deref(), "images", &id),
        synonyms: decode_string_array(row.get::<Option<String>, _>("synonyms").as_deref(), "synonyms", &id),
        sources: decode_string_array(row.get::<Option<String>, _>("sources").as_deref(), "sources", &id),
        traits: decode_object(row.get::<Option<String>, _>("traits").as_deref(), "traits", &id),
        extended_data,
        created_date: row.get("created_date"),
        updated_date: row.get("updated_date"),
        id,
    }
}

/// List varieties in stable id order
pub async fn list_varieties(pool: &SqlitePool, filter: &VarietyFilter) -> Result<Vec<Variety>> {
    let mut sql = String::from(SELECT_VARIETY);
    let mut clauses = Vec::new();
    if filter.plant_type_id.is_some() {
        clauses.push("plant_type_id = ?");
    }
    if filter.active_only {
        clauses.push("LOWER(TRIM(COALESCE(status, 'active'))) IN ('active', '')");
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY id");

    let mut query = sqlx::query(&sql);
    if let Some(type_id) = &filter.plant_type_id {
        query = query.bind(type_id);
    }

    let rows = query.fetch_all(pool).await?;
    Ok(rows.iter().map(row_to_variety).collect())
}

pub async fn get_variety(pool: &SqlitePool, id: &str) -> Result<Option<Variety>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_VARIETY))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(row_to_variety))
}

/// Write back every mutable column of an existing variety
pub async fn update_variety(pool: &SqlitePool, variety: &Variety) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE varieties SET
            plant_type_id = ?, variety_name = ?, variety_code = ?,
            plant_subcategory_id = ?, plant_subcategory_code = ?,
            plant_subcategory_ids = ?, plant_subcategory_codes = ?,
            status = ?, merged_into_variety_id = ?,
            description = ?, days_to_maturity = ?, spacing = ?, flavor = ?,
            fruit_shape = ?, fruit_size = ?, fruit_color = ?, growth_habit = ?,
            images = ?, synonyms = ?, sources = ?, traits = ?, extended_data = ?,
            updated_date = ?
        WHERE id = ?
        "#,
    )
    .bind(&variety.plant_type_id)
    .bind(&variety.variety_name)
    .bind(&variety.variety_code)
    .bind(&variety.classification.primary_id)
    .bind(&variety.classification.primary_code)
    .bind(serde_json::to_string(&variety.classification.ids)?)
    .bind(serde_json::to_string(&variety.classification.codes)?)
    .bind(variety.status.status_text())
    .bind(variety.status.merged_into())
    .bind(&variety.details.description)
    .bind(variety.details.days_to_maturity)
    .bind(&variety.details.spacing)
    .bind(&variety.details.flavor)
    .bind(&variety.details.fruit_shape)
    .bind(&variety.details.fruit_size)
    .bind(&variety.details.fruit_color)
    .bind(&variety.details.growth_habit)
    .bind(serde_json::to_string(&variety.images)?)
    .bind(serde_json::to_string(&variety.synonyms)?)
    .bind(serde_json::to_string(&variety.sources)?)
    .bind(Value::Object(variety.traits.clone()).to_string())
    .bind(Value::Object(variety.extended_data.clone()).to_string())
    .bind(gplan_common::time::now_rfc3339())
    .bind(&variety.id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(gplan_common::Error::NotFound(format!("variety {}", variety.id)));
    }

    Ok(())
}

/// Insert a variety exactly as given (seeding and imports)
pub async fn insert_variety(pool: &SqlitePool, variety: &Variety) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO varieties (
            id, plant_type_id, variety_name, variety_code,
            plant_subcategory_id, plant_subcategory_code,
            plant_subcategory_ids, plant_subcategory_codes,
            status, merged_into_variety_id,
            description, days_to_maturity, spacing, flavor,
            fruit_shape, fruit_size, fruit_color, growth_habit,
            images, synonyms, sources, traits, extended_data,
            created_date, updated_date
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&variety.id)
    .bind(&variety.plant_type_id)
    .bind(&variety.variety_name)
    .bind(&variety.variety_code)
    .bind(&variety.classification.primary_id)
    .bind(&variety.classification.primary_code)
    .bind(serde_json::to_string(&variety.classification.ids)?)
    .bind(serde_json::to_string(&variety.classification.codes)?)
    .bind(variety.status.status_text())
    .bind(variety.status.merged_into())
    .bind(&variety.details.description)
    .bind(variety.details.days_to_maturity)
    .bind(&variety.details.spacing)
    .bind(&variety.details.flavor)
    .bind(&variety.details.fruit_shape)
    .bind(&variety.details.fruit_size)
    .bind(&variety.details.fruit_color)
    .bind(&variety.details.growth_habit)
    .bind(serde_json::to_string(&variety.images)?)
    .bind(serde_json::to_string(&variety.synonyms)?)
    .bind(serde_json::to_string(&variety.sources)?)
    .bind(Value::Object(variety.traits.clone()).to_string())
    .bind(Value::Object(variety.extended_data.clone()).to_string())
    .bind(&variety.created_date)
    .bind(&variety.updated_date)
    .execute(pool)
    .await?;

    Ok(())
}
