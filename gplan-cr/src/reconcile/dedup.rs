//! Read-only duplicate report for one plant type
//!
//! Lists exact-code groups plus strict-name groups (records already in a
//! code group excluded), with each record's completeness score and the
//! record a merge would keep.

use super::grouper::{code_groups, grouped_ids, strict_name_groups, DuplicateGroup, GroupKind};
use super::merge::{completeness, rank};
use crate::db::varieties::VarietyFilter;
use crate::store::CatalogStore;
use gplan_common::db::PlantType;
use gplan_common::{Error, Result};
use serde::Serialize;
use tracing::info;

/// Plant type reported when the caller names none
pub const DEFAULT_PLANT_TYPE: &str = "Tomato";

/// Groups returned per report
pub const MAX_GROUPS: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct DedupRecord {
    pub id: String,
    pub variety_name: String,
    pub variety_code: Option<String>,
    pub created_date: Option<String>,
    pub completeness: usize,
    pub is_canonical: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DedupGroup {
    pub kind: GroupKind,
    pub key: String,
    pub records: Vec<DedupRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DedupReport {
    pub plant_type_id: String,
    pub plant_type_name: String,
    pub active_varieties: usize,
    pub total_groups: usize,
    pub truncated: bool,
    pub groups: Vec<DedupGroup>,
}

/// Build the report for a plant type id, or the default type by name
pub async fn dedup_dry_run(store: &dyn CatalogStore, plant_type_id: Option<&str>) -> Result<DedupReport> {
    let plant_type: PlantType = match plant_type_id {
        Some(id) => store
            .get_plant_type(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("plant type {}", id)))?,
        None => store
            .find_plant_type_by_name(DEFAULT_PLANT_TYPE)
            .await?
            .ok_or_else(|| Error::NotFound(format!("plant type {}", DEFAULT_PLANT_TYPE)))?,
    };

    let varieties = store
        .list_varieties(&VarietyFilter::active_of_type(&plant_type.id))
        .await?;

    let by_code = code_groups(&varieties);
    let by_strict = strict_name_groups(&varieties, &grouped_ids(&by_code));
    let total_groups = by_code.len() + by_strict.len();

    let groups: Vec<DedupGroup> = by_code
        .iter()
        .chain(by_strict.iter())
        .take(MAX_GROUPS)
        .map(describe_group)
        .collect();

    info!(plant_type_id = %plant_type.id, total_groups, "Dedup dry run complete");

    Ok(DedupReport {
        plant_type_id: plant_type.id,
        plant_type_name: plant_type.common_name,
        active_varieties: varieties.len(),
        total_groups,
        truncated: total_groups > MAX_GROUPS,
        groups,
    })
}

fn describe_group(group: &DuplicateGroup<'_>) -> DedupGroup {
    let ranked = rank(&group.members);
    let canonical_id = ranked.first().map(|v| v.id.as_str());

    DedupGroup {
        kind: group.kind,
        key: group.key.clone(),
        records: group
            .members
            .iter()
            .map(|v| DedupRecord {
                id: v.id.clone(),
                variety_name: v.variety_name.clone(),
                variety_code: v.variety_code.clone(),
                created_date: v.created_date.clone(),
                completeness: completeness(v),
                is_canonical: Some(v.id.as_str()) == canonical_id,
            })
            .collect(),
    }
}
