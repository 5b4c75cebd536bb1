//! Bulk subcategory assignment
//!
//! Active varieties with no primary subcategory are run through the
//! resolver. Matches get a single-entry classification; misses and rejected
//! candidates are counted and sampled for follow-up, never guessed.

use super::index::SubcategoryIndex;
use super::resolver::{Resolution, ResolveInput, Resolver, RuleTier};
use super::rules::RuleTable;
use super::{non_blank, RecordError, Writer};
use crate::db::varieties::VarietyFilter;
use crate::store::CatalogStore;
use gplan_common::db::Classification;
use gplan_common::Result;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

/// Entries kept in `no_match_sample`
pub const NO_MATCH_SAMPLE_LIMIT: usize = 50;

#[derive(Debug, Clone, Default, Serialize)]
pub struct AssignSummary {
    pub total_missing: usize,
    pub fixed: usize,
    pub no_match: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignFix {
    pub variety_id: String,
    pub variety_name: String,
    pub subcategory_id: String,
    pub subcat_code: Option<String>,
    pub tier: RuleTier,
}

#[derive(Debug, Clone, Serialize)]
pub struct NoMatchEntry {
    pub variety_id: String,
    pub variety_name: String,
    pub variety_code: Option<String>,
    pub plant_type_id: Option<String>,
    /// Rejected candidate, when a rule matched but the target was unusable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<Resolution>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AssignReport {
    pub dry_run: bool,
    pub summary: AssignSummary,
    pub fixes: Vec<AssignFix>,
    pub no_match_sample: Vec<NoMatchEntry>,
    pub errors: Vec<RecordError>,
}

pub async fn assign_by_code(store: &dyn CatalogStore, rules: &RuleTable, dry_run: bool) -> Result<AssignReport> {
    info!(dry_run, "Starting bulk subcategory assignment");

    let type_names: HashMap<String, String> = store
        .list_plant_types()
        .await?
        .into_iter()
        .map(|t| (t.id, t.common_name))
        .collect();
    let index = SubcategoryIndex::new(&store.list_subcategories(None).await?);
    let varieties = store.list_varieties(&VarietyFilter::active()).await?;

    let resolver = Resolver::new(rules, &index);
    let writer = Writer::new(store, dry_run);
    let mut report = AssignReport {
        dry_run,
        ..Default::default()
    };

    for variety in varieties
        .iter()
        .filter(|v| non_blank(v.classification.primary_id.as_deref()).is_none())
    {
        report.summary.total_missing += 1;

        let type_name = variety
            .plant_type_id
            .as_ref()
            .and_then(|id| type_names.get(id))
            .map(String::as_str);
        let resolution = resolver.resolve(&ResolveInput::from_variety(variety, type_name));

        let (subcategory, tier) = match resolution {
            Resolution::Matched { subcategory, tier } => (subcategory, tier),
            other => {
                report.summary.no_match += 1;
                if report.no_match_sample.len() < NO_MATCH_SAMPLE_LIMIT {
                    report.no_match_sample.push(NoMatchEntry {
                        variety_id: variety.id.clone(),
                        variety_name: variety.variety_name.clone(),
                        variety_code: variety.variety_code.clone(),
                        plant_type_id: variety.plant_type_id.clone(),
                        rejected: matches!(other, Resolution::Rejected { .. }).then_some(other),
                    });
                }
                continue;
            }
        };

        let mut updated = variety.clone();
        updated.set_classification(&Classification::single(subcategory.clone()));

        match writer.update_variety(&updated).await {
            Ok(()) => {
                report.summary.fixed += 1;
                report.fixes.push(AssignFix {
                    variety_id: variety.id.clone(),
                    variety_name: variety.variety_name.clone(),
                    subcategory_id: subcategory.id,
                    subcat_code: subcategory.code,
                    tier,
                });
            }
            Err(e) => {
                warn!(variety_id = %variety.id, variety_name = %variety.variety_name, error = %e, "Failed to assign subcategory");
                report.errors.push(RecordError::for_variety(variety, e));
            }
        }
    }

    info!(
        dry_run,
        total_missing = report.summary.total_missing,
        fixed = report.summary.fixed,
        no_match = report.summary.no_match,
        errors = report.errors.len(),
        "Bulk subcategory assignment complete"
    );

    Ok(report)
}
