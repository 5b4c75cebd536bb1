//! Subcategory repair
//!
//! Two idempotent corrections per plant type:
//!
//! 1. Activation: every inactive subcategory of the type is reactivated.
//! 2. Variety normalization: each active variety gets exactly one primary
//!    subcategory, looked up from its stored id, then its stored code, then
//!    `extended_data.import_subcat_code`, then any code a merge parked in
//!    `extended_data.unresolved_subcat_codes`. The array columns are rewritten
//!    to mirror that primary (or emptied when nothing resolves).
//!
//! A variety is written only when its columns actually change, so a second
//! run over the same catalog issues no writes.
//!
//! The canonical-set pass ([`repair_canonical_set`]) first cleans
//! subcategories whose code or name carries bracket/quote artifacts from a
//! bad import, then runs the generic repair on the result.

use super::index::SubcategoryIndex;
use super::normalize;
use super::rules::{CanonicalSubcategory, RuleTable};
use super::{non_blank, RecordError, Writer};
use crate::db::varieties::VarietyFilter;
use crate::store::CatalogStore;
use gplan_common::db::{
    Classification, PlantSubCategory, PlantType, SubcategoryRef, Variety, IMPORT_SUBCAT_CODE_KEY,
};
use gplan_common::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{info, warn};

/// Outcome of repairing one plant type
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairReport {
    pub plant_type_id: String,
    pub plant_type_name: String,
    pub dry_run: bool,
    pub subcats_activated: usize,
    pub varieties_normalized: usize,
    pub junk_cleared: usize,
    pub missing_code: usize,
    pub errors: Vec<RecordError>,
}

/// Outcome of the canonical-set repair
#[derive(Debug, Clone, Default, Serialize)]
pub struct CanonicalRepairReport {
    pub step1_subcats_cleaned: usize,
    /// Malformed subcategories left alone (no canonical match, or a clean copy exists)
    pub malformed_skipped: usize,
    /// Canonical codes with no subcategory record under the plant type
    pub canonical_missing: Vec<String>,
    #[serde(flatten)]
    pub repair: RepairReport,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairTotals {
    pub subcats_activated: usize,
    pub varieties_normalized: usize,
    pub junk_cleared: usize,
    pub missing_code: usize,
    pub errors: usize,
}

/// Outcome of the catalog-wide repair
#[derive(Debug, Clone, Default, Serialize)]
pub struct CatalogRepairReport {
    pub dry_run: bool,
    pub plant_types: Vec<RepairReport>,
    pub totals: RepairTotals,
    /// Active varieties whose plant type is missing or unknown; never touched
    pub orphan_varieties: usize,
}

/// Repair one plant type
pub async fn repair_plant_type(
    store: &dyn CatalogStore,
    plant_type_id: &str,
    dry_run: bool,
) -> Result<RepairReport> {
    let plant_type = store
        .get_plant_type(plant_type_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("plant type {}", plant_type_id)))?;

    let subcats = store.list_subcategories(Some(&plant_type.id)).await?;
    let varieties = store
        .list_varieties(&VarietyFilter::active_of_type(&plant_type.id))
        .await?;

    let writer = Writer::new(store, dry_run);
    Ok(repair_loaded(&writer, &plant_type, subcats, varieties).await)
}

/// Repair every plant type in turn
pub async fn repair_catalog(store: &dyn CatalogStore, dry_run: bool) -> Result<CatalogRepairReport> {
    info!(dry_run, "Starting catalog-wide repair");

    let plant_types = store.list_plant_types().await?;
    let known_types: HashSet<&str> = plant_types.iter().map(|t| t.id.as_str()).collect();

    let active = store.list_varieties(&VarietyFilter::active()).await?;
    let orphan_varieties = active
        .iter()
        .filter(|v| {
            non_blank(v.plant_type_id.as_deref())
                .map(|id| !known_types.contains(id))
                .unwrap_or(true)
        })
        .count();

    let mut report = CatalogRepairReport {
        dry_run,
        orphan_varieties,
        ..Default::default()
    };

    let writer = Writer::new(store, dry_run);
    for plant_type in &plant_types {
        let subcats = store.list_subcategories(Some(&plant_type.id)).await?;
        let varieties: Vec<Variety> = active
            .iter()
            .filter(|v| v.plant_type_id.as_deref() == Some(plant_type.id.as_str()))
            .cloned()
            .collect();

        let type_report = repair_loaded(&writer, plant_type, subcats, varieties).await;

        report.totals.subcats_activated += type_report.subcats_activated;
        report.totals.varieties_normalized += type_report.varieties_normalized;
        report.totals.junk_cleared += type_report.junk_cleared;
        report.totals.missing_code += type_report.missing_code;
        report.totals.errors += type_report.errors.len();
        report.plant_types.push(type_report);
    }

    info!(
        dry_run,
        plant_types = report.plant_types.len(),
        subcats_activated = report.totals.subcats_activated,
        varieties_normalized = report.totals.varieties_normalized,
        junk_cleared = report.totals.junk_cleared,
        missing_code = report.totals.missing_code,
        orphan_varieties = report.orphan_varieties,
        "Catalog-wide repair complete"
    );

    Ok(report)
}

/// Clean malformed canonical subcategories of one plant type, then repair it
pub async fn repair_canonical_set(
    store: &dyn CatalogStore,
    rules: &RuleTable,
    plant_type_name: &str,
    dry_run: bool,
) -> Result<CanonicalRepairReport> {
    let canonical = rules
        .canonical_set(plant_type_name)
        .ok_or_else(|| Error::NotFound(format!("canonical subcategory set for {}", plant_type_name)))?;

    let plant_type = store
        .find_plant_type_by_name(plant_type_name)
        .await?
        .ok_or_else(|| Error::NotFound(format!("plant type {}", plant_type_name)))?;

    info!(plant_type_id = %plant_type.id, plant_type = %plant_type.common_name, dry_run, "Starting canonical subcategory repair");

    let mut subcats = store.list_subcategories(Some(&plant_type.id)).await?;
    let writer = Writer::new(store, dry_run);

    let mut step1_subcats_cleaned = 0;
    let mut malformed_skipped = 0;
    let mut step1_errors = Vec::new();

    let clean_codes: HashSet<String> = subcats
        .iter()
        .filter(|s| !is_malformed(s))
        .map(|s| s.subcat_code.trim().to_uppercase())
        .collect();

    for subcat in subcats.iter_mut().filter(|s| is_malformed(s)) {
        let Some(target) = canonical_match(subcat, &canonical.subcategories) else {
            warn!(subcategory_id = %subcat.id, code = %subcat.subcat_code, name = %subcat.name, "Malformed subcategory matches no canonical entry");
            malformed_skipped += 1;
            continue;
        };

        if clean_codes.contains(&target.code.to_uppercase()) {
            warn!(subcategory_id = %subcat.id, code = %target.code, "Clean copy of canonical subcategory exists; leaving malformed duplicate");
            malformed_skipped += 1;
            continue;
        }

        let cleaned = PlantSubCategory {
            subcat_code: target.code.clone(),
            name: target.name.clone(),
            is_active: true,
            ..subcat.clone()
        };

        match writer.update_subcategory(&cleaned).await {
            Ok(()) => {
                info!(subcategory_id = %subcat.id, from = %subcat.subcat_code, to = %cleaned.subcat_code, "Cleaned malformed subcategory");
                *subcat = cleaned;
                step1_subcats_cleaned += 1;
            }
            Err(e) => {
                warn!(subcategory_id = %subcat.id, error = %e, "Failed to clean subcategory");
                step1_errors.push(RecordError::new(&subcat.id, &subcat.name, e));
            }
        }
    }

    let present: HashSet<String> = subcats
        .iter()
        .filter(|s| !is_malformed(s))
        .map(|s| s.subcat_code.trim().to_uppercase())
        .collect();
    let canonical_missing: Vec<String> = canonical
        .subcategories
        .iter()
        .filter(|c| !present.contains(&c.code.to_uppercase()))
        .map(|c| c.code.clone())
        .collect();

    let varieties = store
        .list_varieties(&VarietyFilter::active_of_type(&plant_type.id))
        .await?;
    let mut repair = repair_loaded(&writer, &plant_type, subcats, varieties).await;
    step1_errors.append(&mut repair.errors);
    repair.errors = step1_errors;

    info!(
        plant_type_id = %plant_type.id,
        dry_run,
        step1_subcats_cleaned,
        malformed_skipped,
        canonical_missing = canonical_missing.len(),
        "Canonical subcategory repair complete"
    );

    Ok(CanonicalRepairReport {
        step1_subcats_cleaned,
        malformed_skipped,
        canonical_missing,
        repair,
    })
}

/// Activation and normalization over already-loaded records
async fn repair_loaded(
    writer: &Writer<'_>,
    plant_type: &PlantType,
    mut subcats: Vec<PlantSubCategory>,
    varieties: Vec<Variety>,
) -> RepairReport {
    let dry_run = writer.dry_run();
    info!(plant_type_id = %plant_type.id, plant_type = %plant_type.common_name, dry_run, varieties = varieties.len(), "Repairing plant type");

    let mut report = RepairReport {
        plant_type_id: plant_type.id.clone(),
        plant_type_name: plant_type.common_name.clone(),
        dry_run,
        ..Default::default()
    };

    for subcat in subcats.iter_mut().filter(|s| !s.is_active) {
        let activated = PlantSubCategory {
            is_active: true,
            ..subcat.clone()
        };
        match writer.update_subcategory(&activated).await {
            Ok(()) => {
                *subcat = activated;
                report.subcats_activated += 1;
            }
            Err(e) => {
                warn!(subcategory_id = %subcat.id, error = %e, "Failed to activate subcategory");
                report.errors.push(RecordError::new(&subcat.id, &subcat.name, e));
            }
        }
    }

    let index = SubcategoryIndex::new(&subcats);

    for variety in varieties {
        let outcome = normalize_variety(&variety, &index, &plant_type.id);

        if outcome.resolved.is_none() {
            report.missing_code += 1;
        }

        let Some(updated) = outcome.updated else {
            continue;
        };

        match writer.update_variety(&updated).await {
            Ok(()) => {
                if outcome.resolved.is_none() && variety.classification.has_array_content() {
                    report.junk_cleared += 1;
                } else {
                    report.varieties_normalized += 1;
                }
            }
            Err(e) => {
                warn!(variety_id = %variety.id, variety_name = %variety.variety_name, error = %e, "Failed to normalize variety");
                report.errors.push(RecordError::for_variety(&variety, e));
            }
        }
    }

    info!(
        plant_type_id = %plant_type.id,
        dry_run,
        subcats_activated = report.subcats_activated,
        varieties_normalized = report.varieties_normalized,
        junk_cleared = report.junk_cleared,
        missing_code = report.missing_code,
        errors = report.errors.len(),
        "Plant type repair complete"
    );

    report
}

/// Planned normalization of one variety
#[derive(Debug, Clone)]
pub struct NormalizeOutcome {
    pub resolved: Option<SubcategoryRef>,
    /// The record to write, or `None` when nothing changes
    pub updated: Option<Variety>,
}

/// Decide the single primary subcategory of a variety
///
/// When nothing resolves, a stored primary code is moved to
/// `extended_data.import_subcat_code` (unless one is already there) so that
/// a later run can pick it up once the subcategory exists.
pub fn normalize_variety(variety: &Variety, index: &SubcategoryIndex, plant_type_id: &str) -> NormalizeOutcome {
    let raw = &variety.classification;

    let by_id = non_blank(raw.primary_id.as_deref()).and_then(|id| index.get_in_type(id, plant_type_id));
    let by_code = || non_blank(raw.primary_code.as_deref()).and_then(|c| index.find_code_in_type(c, plant_type_id));
    let by_import = || variety.import_subcat_code().and_then(|c| index.find_code_in_type(c, plant_type_id));
    let by_parked = || {
        variety
            .unresolved_subcat_codes()
            .into_iter()
            .find_map(|c| index.find_code_in_type(c, plant_type_id))
    };

    let resolved = by_id
        .or_else(by_code)
        .or_else(by_import)
        .or_else(by_parked)
        .map(SubcategoryRef::from);

    let classification = match &resolved {
        Some(r) => Classification::single(r.clone()),
        None => Classification::none(),
    };

    let mut updated = variety.clone();
    updated.set_classification(&classification);

    if resolved.is_none() && variety.import_subcat_code().is_none() {
        if let Some(code) = non_blank(raw.primary_code.as_deref()) {
            updated
                .extended_data
                .insert(IMPORT_SUBCAT_CODE_KEY.to_string(), Value::String(code.to_string()));
        }
    }

    let changed = updated.classification != variety.classification || updated.extended_data != variety.extended_data;

    NormalizeOutcome {
        resolved,
        updated: changed.then_some(updated),
    }
}

/// Code or name carries bracket or quote artifacts
fn is_malformed(subcat: &PlantSubCategory) -> bool {
    const ARTIFACTS: &[char] = &['[', ']', '{', '}', '"', '\\'];
    subcat.subcat_code.contains(ARTIFACTS) || subcat.name.contains(ARTIFACTS)
}

fn strip_artifacts(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '[' | ']' | '{' | '}' | '"' | '\\'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Canonical entry a malformed subcategory stands for, by cleaned code then cleaned name
fn canonical_match<'a>(
    subcat: &PlantSubCategory,
    canonical: &'a [CanonicalSubcategory],
) -> Option<&'a CanonicalSubcategory> {
    let code = strip_artifacts(&subcat.subcat_code);
    let name = normalize::light(&strip_artifacts(&subcat.name));

    canonical
        .iter()
        .find(|c| !code.is_empty() && c.code.eq_ignore_ascii_case(&code))
        .or_else(|| {
            canonical
                .iter()
                .find(|c| !name.is_empty() && normalize::light(&c.name) == name)
        })
}
