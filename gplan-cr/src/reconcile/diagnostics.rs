//! Catalog health diagnostics
//!
//! [`diagnose`] is a pure function over loaded records; it has no store
//! handle and cannot write.

use super::grouper::{code_groups, grouped_ids, name_groups, strict_name_groups, DuplicateGroup};
use super::index::SubcategoryIndex;
use super::non_blank;
use crate::db::varieties::VarietyFilter;
use crate::store::CatalogStore;
use gplan_common::db::{PlantSubCategory, Variety};
use gplan_common::Result;
use serde::Serialize;
use tracing::info;

/// Samples kept per anomaly kind unless configured otherwise
pub const DEFAULT_SAMPLE_LIMIT: usize = 10;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DuplicateCounts {
    pub groups: usize,
    pub records: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateSample {
    pub key: String,
    pub ids: Vec<String>,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationSample {
    pub id: String,
    pub variety_name: String,
    pub plant_type_id: Option<String>,
    /// Ids involved in the anomaly (missing or inactive ones)
    pub subcategory_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiagnosticsSamples {
    pub code_duplicates: Vec<DuplicateSample>,
    pub name_duplicates: Vec<DuplicateSample>,
    pub strict_name_duplicates: Vec<DuplicateSample>,
    pub invalid: Vec<ClassificationSample>,
    pub inactive: Vec<ClassificationSample>,
    pub true_uncategorized: Vec<ClassificationSample>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiagnosticsReport {
    pub total_active_varieties: usize,
    pub total_subcategories: usize,
    pub inactive_subcategories: usize,
    pub code_duplicates: DuplicateCounts,
    pub name_duplicates: DuplicateCounts,
    pub strict_name_duplicates: DuplicateCounts,
    /// Some classification id is not a known subcategory
    pub invalid_classification: usize,
    /// Every classification id is known but inactive (and none is invalid)
    pub inactive_classification: usize,
    /// No usable subcategory can be derived at all
    pub true_uncategorized: usize,
    pub samples: DiagnosticsSamples,
}

/// Load the catalog and diagnose it
pub async fn run_diagnostics(store: &dyn CatalogStore, sample_limit: usize) -> Result<DiagnosticsReport> {
    let varieties = store.list_varieties(&VarietyFilter::active()).await?;
    let subcats = store.list_subcategories(None).await?;
    let report = diagnose(&varieties, &subcats, sample_limit);
    info!(
        "Diagnostics: {} active varieties, {} invalid, {} inactive, {} uncategorized",
        report.total_active_varieties,
        report.invalid_classification,
        report.inactive_classification,
        report.true_uncategorized
    );
    Ok(report)
}

/// Compute health counts over active varieties
pub fn diagnose(varieties: &[Variety], subcats: &[PlantSubCategory], sample_limit: usize) -> DiagnosticsReport {
    let active: Vec<Variety> = varieties.iter().filter(|v| v.status.is_active()).cloned().collect();
    let index = SubcategoryIndex::new(subcats);

    let by_code = code_groups(&active);
    let by_name = name_groups(&active);
    let by_strict = strict_name_groups(&active, &grouped_ids(&by_code));

    let mut report = DiagnosticsReport {
        total_active_varieties: active.len(),
        total_subcategories: subcats.len(),
        inactive_subcategories: subcats.iter().filter(|s| !s.is_active).count(),
        code_duplicates: counts(&by_code),
        name_duplicates: counts(&by_name),
        strict_name_duplicates: counts(&by_strict),
        ..Default::default()
    };
    report.samples.code_duplicates = duplicate_samples(&by_code, sample_limit);
    report.samples.name_duplicates = duplicate_samples(&by_name, sample_limit);
    report.samples.strict_name_duplicates = duplicate_samples(&by_strict, sample_limit);

    for variety in &active {
        let ids = variety.classification.mentioned_ids();

        let missing: Vec<String> = ids.iter().filter(|id| index.get(id).is_none()).cloned().collect();
        if !missing.is_empty() {
            report.invalid_classification += 1;
            push_sample(&mut report.samples.invalid, variety, missing, sample_limit);
        } else if !ids.is_empty() && ids.iter().all(|id| index.get(id).map(|s| !s.is_active).unwrap_or(false)) {
            report.inactive_classification += 1;
            push_sample(&mut report.samples.inactive, variety, ids.clone(), sample_limit);
        }

        if effective_subcategories(variety, &index).is_empty() {
            report.true_uncategorized += 1;
            push_sample(&mut report.samples.true_uncategorized, variety, ids, sample_limit);
        }
    }

    report
}

/// Re-derive usable subcategory ids from every stored hint
///
/// A hint counts when it names an existing, active subcategory of the
/// variety's own plant type. Ids, codes and the import code are all tried.
pub fn effective_subcategories(variety: &Variety, index: &SubcategoryIndex) -> Vec<String> {
    let type_id = non_blank(variety.plant_type_id.as_deref());
    let usable = |s: &&PlantSubCategory| s.is_active && type_id.map(|t| s.plant_type_id == t).unwrap_or(true);

    let mut found: Vec<String> = Vec::new();
    let mut add = |id: &str| {
        if !found.iter().any(|f| f == id) {
            found.push(id.to_string());
        }
    };

    for id in variety.classification.mentioned_ids() {
        if let Some(s) = index.get(&id).filter(usable) {
            add(&s.id);
        }
    }

    let codes = variety
        .classification
        .mentioned_codes()
        .into_iter()
        .chain(variety.import_subcat_code().map(str::to_string));
    for code in codes {
        let candidates = index.with_code(&code);
        if let Some(s) = candidates.into_iter().find(|s| usable(s)) {
            add(&s.id);
        }
    }

    found
}

fn counts(groups: &[DuplicateGroup<'_>]) -> DuplicateCounts {
    DuplicateCounts {
        groups: groups.len(),
        records: groups.iter().map(|g| g.members.len()).sum(),
    }
}

fn duplicate_samples(groups: &[DuplicateGroup<'_>], limit: usize) -> Vec<DuplicateSample> {
    groups
        .iter()
        .take(limit)
        .map(|g| DuplicateSample {
            key: g.key.clone(),
            ids: g.ids(),
            names: g.members.iter().map(|v| v.variety_name.clone()).collect(),
        })
        .collect()
}

fn push_sample(samples: &mut Vec<ClassificationSample>, variety: &Variety, ids: Vec<String>, limit: usize) {
    if samples.len() < limit {
        samples.push(ClassificationSample {
            id: variety.id.clone(),
            variety_name: variety.variety_name.clone(),
            plant_type_id: variety.plant_type_id.clone(),
            subcategory_ids: ids,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gplan_common::db::{RawClassification, IMPORT_SUBCAT_CODE_KEY};
    use serde_json::json;

    fn subcat(id: &str, code: &str, active: bool) -> PlantSubCategory {
        PlantSubCategory {
            id: id.to_string(),
            plant_type_id: "tomato".to_string(),
            subcat_code: code.to_string(),
            name: code.to_string(),
            is_active: active,
        }
    }

    fn variety(id: &str, name: &str, ids: &[&str]) -> Variety {
        let mut v = Variety::new(id, Some("tomato".to_string()), name);
        v.classification = RawClassification {
            primary_id: ids.first().map(|s| s.to_string()),
            primary_code: None,
            ids: ids.iter().map(|s| s.to_string()).collect(),
            codes: vec![],
        };
        v
    }

    fn subcats() -> Vec<PlantSubCategory> {
        vec![subcat("s-ok", "PSC_TOMATO_CHERRY", true), subcat("s-off", "PSC_TOMATO_PASTE", false)]
    }

    #[test]
    fn test_invalid_beats_inactive() {
        let records = vec![
            variety("a", "Alpha", &["s-ok"]),
            variety("b", "Bravo", &["s-gone", "s-off"]),
            variety("c", "Charlie", &["s-off"]),
        ];
        let report = diagnose(&records, &subcats(), 10);

        assert_eq!(report.invalid_classification, 1);
        assert_eq!(report.samples.invalid[0].id, "b");
        assert_eq!(report.samples.invalid[0].subcategory_ids, vec!["s-gone"]);
        assert_eq!(report.inactive_classification, 1);
        assert_eq!(report.samples.inactive[0].id, "c");
    }

    #[test]
    fn test_true_uncategorized_rederives_from_codes() {
        let mut by_code = variety("a", "Alpha", &[]);
        by_code.classification.primary_code = Some("psc_tomato_cherry".to_string());

        let mut by_import = variety("b", "Bravo", &[]);
        by_import
            .extended_data
            .insert(IMPORT_SUBCAT_CODE_KEY.to_string(), json!("PSC_TOMATO_CHERRY"));

        let nothing = variety("c", "Charlie", &["s-off"]);
        let bare = variety("d", "Delta", &[]);

        let report = diagnose(&[by_code, by_import, nothing, bare], &subcats(), 10);
        assert_eq!(report.true_uncategorized, 2);
        let ids: Vec<&str> = report.samples.true_uncategorized.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d"]);
    }

    #[test]
    fn test_duplicate_counts_and_removed_records_ignored() {
        let mut tomb = variety("z", "Brandywine", &["s-ok"]);
        tomb.tombstone("a");
        let records = vec![
            variety("a", "Brandywine", &["s-ok"]),
            variety("b", "brandywine.", &["s-ok"]),
            tomb,
        ];
        let report = diagnose(&records, &subcats(), 10);
        assert_eq!(report.total_active_varieties, 2);
        assert_eq!(report.name_duplicates.groups, 1);
        assert_eq!(report.name_duplicates.records, 2);
        assert_eq!(report.code_duplicates.groups, 0);
        assert_eq!(report.inactive_subcategories, 1);
    }

    #[test]
    fn test_samples_are_bounded() {
        let records: Vec<Variety> = (0..25).map(|i| variety(&format!("v{}", i), &format!("V{}", i), &[])).collect();
        let report = diagnose(&records, &subcats(), 5);
        assert_eq!(report.true_uncategorized, 25);
        assert_eq!(report.samples.true_uncategorized.len(), 5);
    }
}
