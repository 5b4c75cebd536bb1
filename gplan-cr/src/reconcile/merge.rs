//! Canonical selection and duplicate merging
//!
//! Canonical order (earlier criteria win):
//!
//! 1. has a `variety_code`
//! 2. higher completeness score
//! 3. earlier `created_date` (missing dates sort last)
//! 4. lower id
//!
//! Merging never overwrites a non-empty canonical value. Arrays are unioned,
//! objects shallow-merged with canonical keys winning. Subcategory codes that
//! match nothing are parked in `extended_data`. Duplicates become
//! `MergedInto(canonical)` tombstones; nothing is deleted.

use super::cascade::{cascade_references, Redirects};
use super::grouper::{group_for_merge, DuplicateGroup, GroupKind, MatchingMode};
use super::index::SubcategoryIndex;
use super::{non_blank, RecordError, Writer};
use crate::db::varieties::VarietyFilter;
use crate::store::CatalogStore;
use gplan_common::db::{Classification, SubcategoryRef, Variety, IMPORT_SUBCAT_CODE_KEY, MERGED_INTO_KEY};
use gplan_common::{Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{info, warn};

/// Number of non-empty descriptive scalars
pub fn completeness(variety: &Variety) -> usize {
    let d = &variety.details;
    let texts = [
        Some(variety.variety_name.as_str()),
        variety.variety_code.as_deref(),
        d.description.as_deref(),
        d.spacing.as_deref(),
        d.flavor.as_deref(),
        d.fruit_shape.as_deref(),
        d.fruit_size.as_deref(),
        d.fruit_color.as_deref(),
        d.growth_habit.as_deref(),
        variety.classification.primary_id.as_deref(),
        variety.classification.primary_code.as_deref(),
    ];
    texts.iter().filter(|t| non_blank(**t).is_some()).count() + usize::from(d.days_to_maturity.is_some())
}

/// `Less` when `a` should be canonical over `b`
pub fn canonical_order(a: &Variety, b: &Variety) -> Ordering {
    let has_code = |v: &Variety| v.code().is_some();
    let created = |v: &Variety| {
        v.created_date
            .as_deref()
            .and_then(gplan_common::time::parse_stored)
    };

    has_code(b)
        .cmp(&has_code(a))
        .then_with(|| completeness(b).cmp(&completeness(a)))
        .then_with(|| match (created(a), created(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.id.cmp(&b.id))
}

/// Members in canonical-first order
pub fn rank<'a>(members: &[&'a Variety]) -> Vec<&'a Variety> {
    let mut ranked = members.to_vec();
    ranked.sort_by(|a, b| canonical_order(a, b));
    ranked
}

/// The record that survives a merge of `members`
pub fn select_canonical<'a>(members: &[&'a Variety]) -> Option<&'a Variety> {
    members.iter().copied().min_by(|a, b| canonical_order(a, b))
}

/// Writes a merge of one group would perform
#[derive(Debug, Clone)]
pub struct MergePlan {
    pub original: Variety,
    pub canonical: Variety,
    pub tombstones: Vec<Variety>,
}

impl MergePlan {
    pub fn canonical_changed(&self) -> bool {
        self.canonical != self.original
    }
}

/// Fold every member of a group into its canonical record
///
/// `index` supplies codes for subcategory ids that are unioned in; codes
/// that cannot be tied to any id become `import_subcat_code` when the merged
/// record would otherwise have no classification, and
/// `unresolved_subcat_codes` otherwise.
pub fn plan_merge(members: &[&Variety], index: &SubcategoryIndex) -> Option<MergePlan> {
    let ranked = rank(members);
    let (first, dups) = ranked.split_first()?;
    let original = (*first).clone();
    let mut canonical = original.clone();

    for dup in dups {
        fill_text(&mut canonical.variety_code, &dup.variety_code);
        fill_text(&mut canonical.plant_type_id, &dup.plant_type_id);
        if canonical.variety_name.trim().is_empty() {
            canonical.variety_name = dup.variety_name.clone();
        }

        let (c, d) = (&mut canonical.details, &dup.details);
        fill_text(&mut c.description, &d.description);
        fill_text(&mut c.spacing, &d.spacing);
        fill_text(&mut c.flavor, &d.flavor);
        fill_text(&mut c.fruit_shape, &d.fruit_shape);
        fill_text(&mut c.fruit_size, &d.fruit_size);
        fill_text(&mut c.fruit_color, &d.fruit_color);
        fill_text(&mut c.growth_habit, &d.growth_habit);
        if c.days_to_maturity.is_none() {
            c.days_to_maturity = d.days_to_maturity;
        }

        union_into(&mut canonical.images, &dup.images);
        union_into(&mut canonical.synonyms, &dup.synonyms);
        union_into(&mut canonical.sources, &dup.sources);

        fill_object(&mut canonical.traits, &dup.traits);
        fill_object(&mut canonical.extended_data, &dup.extended_data);
    }

    merge_classification(&mut canonical, &ranked, index);

    let tombstones = dups
        .iter()
        .map(|dup| {
            let mut t = (*dup).clone();
            t.tombstone(&canonical.id);
            t
        })
        .collect();

    Some(MergePlan {
        original,
        canonical,
        tombstones,
    })
}

/// Union subcategory ids and codes in rank order, canonical's own first
///
/// Every code any member carried survives: either through a subcategory in
/// the merged classification, as `import_subcat_code`, or in
/// `unresolved_subcat_codes`.
fn merge_classification(canonical: &mut Variety, ranked: &[&Variety], index: &SubcategoryIndex) {
    let mut refs: Vec<SubcategoryRef> = Vec::new();
    let mut stray_codes: Vec<String> = Vec::new();

    for v in ranked {
        let raw = &v.classification;
        for id in raw.mentioned_ids() {
            let code = index
                .get(&id)
                .map(|s| s.subcat_code.clone())
                .or_else(|| (raw.primary_id.as_deref() == Some(id.as_str())).then(|| raw.primary_code.clone()).flatten());
            refs.push(SubcategoryRef::new(id, code));
        }
        let parked = v
            .import_subcat_code()
            .into_iter()
            .chain(v.unresolved_subcat_codes())
            .map(str::to_string);
        for code in raw.mentioned_codes().into_iter().chain(parked) {
            if !stray_codes.iter().any(|c| c.eq_ignore_ascii_case(&code)) {
                stray_codes.push(code);
            }
        }
    }

    let mut classification = Classification::from_refs(refs);

    // codes not carried by any unioned id
    let carried: HashSet<String> = classification
        .entries()
        .iter()
        .filter_map(|e| e.code.as_ref().map(|c| c.to_uppercase()))
        .collect();
    let plant_type_id = canonical.plant_type_id.clone().unwrap_or_default();
    let mut unresolved = Vec::new();
    for code in stray_codes.into_iter().filter(|c| !carried.contains(&c.to_uppercase())) {
        match index.find_code_in_type(&code, &plant_type_id) {
            Some(subcat) => classification.push(SubcategoryRef::from(subcat)),
            None => unresolved.push(code),
        }
    }

    if classification.is_empty() && canonical.import_subcat_code().is_none() && !unresolved.is_empty() {
        let code = unresolved.remove(0);
        canonical
            .extended_data
            .insert(IMPORT_SUBCAT_CODE_KEY.to_string(), Value::String(code));
    }
    let import = canonical.import_subcat_code().map(str::to_uppercase);
    unresolved.retain(|c| Some(c.to_uppercase()) != import);
    canonical.set_unresolved_subcat_codes(unresolved);

    // nothing resolvable: leave the stored columns for repair to judge
    if !classification.is_empty() {
        canonical.set_classification(&classification);
    }
}

fn fill_text(target: &mut Option<String>, source: &Option<String>) {
    if non_blank(target.as_deref()).is_none() {
        if let Some(value) = non_blank(source.as_deref()) {
            *target = Some(value.to_string());
        }
    }
}

fn union_into(target: &mut Vec<String>, source: &[String]) {
    for item in source {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

fn fill_object(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        if key == MERGED_INTO_KEY {
            continue;
        }
        let empty = match target.get(key) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        };
        if empty {
            target.insert(key.clone(), value.clone());
        }
    }
}

// ========================================
// Merge run
// ========================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedGroup {
    pub kind: GroupKind,
    pub key: String,
    pub canonical_id: String,
    pub canonical_name: String,
    pub merged_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub dry_run: bool,
    pub matching_mode: MatchingMode,
    pub plant_type_id: Option<String>,
    pub groups_merged: usize,
    pub records_merged: usize,
    pub references_updated: usize,
    pub remaining_duplicates: usize,
    pub groups: Vec<MergedGroup>,
    pub errors: Vec<RecordError>,
}

/// Merge every duplicate group of a plant type (or of the whole catalog)
///
/// Groups are processed one after another. A group whose canonical write
/// fails is left untouched; a duplicate whose tombstone write fails keeps
/// its dependents. Dependents of the rest are repointed in one cascade pass
/// at the end.
pub async fn run_merge(
    store: &dyn CatalogStore,
    plant_type_id: Option<&str>,
    mode: MatchingMode,
    dry_run: bool,
) -> Result<MergeReport> {
    let filter = match plant_type_id {
        Some(id) => {
            store
                .get_plant_type(id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("plant type {}", id)))?;
            VarietyFilter::active_of_type(id)
        }
        None => VarietyFilter::active(),
    };

    info!(plant_type_id = plant_type_id.unwrap_or("*"), matching_mode = ?mode, dry_run, "Starting duplicate merge");

    let varieties = store.list_varieties(&filter).await?;
    let index = SubcategoryIndex::new(&store.list_subcategories(None).await?);
    let groups = group_for_merge(&varieties, mode);

    let writer = Writer::new(store, dry_run);
    let mut redirects = Redirects::default();
    let mut report = MergeReport {
        dry_run,
        matching_mode: mode,
        plant_type_id: plant_type_id.map(str::to_string),
        groups_merged: 0,
        records_merged: 0,
        references_updated: 0,
        remaining_duplicates: 0,
        groups: Vec::new(),
        errors: Vec::new(),
    };
    let mut merged_canonicals: Vec<Variety> = Vec::new();

    for group in &groups {
        let Some(plan) = plan_merge(&group.members, &index) else {
            continue;
        };
        if let Some(merged) = apply_plan(&writer, group, &plan, &mut redirects, &mut report).await {
            merged_canonicals.push(plan.canonical.clone());
            report.groups.push(merged);
        }
    }

    let cascade = cascade_references(&writer, &redirects).await;
    report.references_updated = cascade.references_updated;
    report.errors.extend(cascade.errors);

    report.remaining_duplicates = if dry_run {
        let projected: Vec<Variety> = varieties
            .iter()
            .filter(|v| !redirects.targets.contains_key(&v.id))
            .map(|v| {
                merged_canonicals
                    .iter()
                    .find(|c| c.id == v.id)
                    .cloned()
                    .unwrap_or_else(|| v.clone())
            })
            .collect();
        group_for_merge(&projected, mode).len()
    } else {
        let reloaded = store.list_varieties(&filter).await?;
        group_for_merge(&reloaded, mode).len()
    };

    info!(
        dry_run,
        groups_merged = report.groups_merged,
        records_merged = report.records_merged,
        references_updated = report.references_updated,
        remaining_duplicates = report.remaining_duplicates,
        errors = report.errors.len(),
        "Duplicate merge complete"
    );

    Ok(report)
}

async fn apply_plan(
    writer: &Writer<'_>,
    group: &DuplicateGroup<'_>,
    plan: &MergePlan,
    redirects: &mut Redirects,
    report: &mut MergeReport,
) -> Option<MergedGroup> {
    let canonical = &plan.canonical;

    if plan.canonical_changed() {
        if let Err(e) = writer.update_variety(canonical).await {
            warn!(variety_id = %canonical.id, variety_name = %canonical.variety_name, error = %e, "Failed to update canonical; group skipped");
            report.errors.push(RecordError::for_variety(canonical, e));
            return None;
        }
    }

    let mut merged_ids = Vec::new();
    for tombstone in &plan.tombstones {
        match writer.update_variety(tombstone).await {
            Ok(()) => {
                redirects.targets.insert(tombstone.id.clone(), canonical.id.clone());
                merged_ids.push(tombstone.id.clone());
            }
            Err(e) => {
                warn!(variety_id = %tombstone.id, variety_name = %tombstone.variety_name, error = %e, "Failed to tombstone duplicate");
                report.errors.push(RecordError::for_variety(tombstone, e));
            }
        }
    }

    if merged_ids.is_empty() {
        return None;
    }

    info!(canonical_id = %canonical.id, key = %group.key, merged = merged_ids.len(), "Merged duplicate group");
    report.groups_merged += 1;
    report.records_merged += merged_ids.len();

    Some(MergedGroup {
        kind: group.kind,
        key: group.key.clone(),
        canonical_id: canonical.id.clone(),
        canonical_name: canonical.variety_name.clone(),
        merged_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gplan_common::db::{PlantSubCategory, RawClassification, VarietyStatus};
    use serde_json::json;

    fn variety(id: &str, name: &str) -> Variety {
        Variety::new(id, Some("tomato".to_string()), name)
    }

    fn index() -> SubcategoryIndex {
        SubcategoryIndex::new(&[
            PlantSubCategory {
                id: "s-cherry".to_string(),
                plant_type_id: "tomato".to_string(),
                subcat_code: "PSC_TOMATO_CHERRY".to_string(),
                name: "Cherry".to_string(),
                is_active: true,
            },
            PlantSubCategory {
                id: "s-beef".to_string(),
                plant_type_id: "tomato".to_string(),
                subcat_code: "PSC_TOMATO_BEEFSTEAK".to_string(),
                name: "Beefsteak".to_string(),
                is_active: true,
            },
        ])
    }

    #[test]
    fn test_code_presence_outranks_completeness() {
        let mut a = variety("a", "Sungold");
        a.variety_code = Some("TOM_CHERRY_SUNGOLD".to_string());
        a.details.flavor = Some("sweet".to_string());

        let mut b = variety("b", "Sungold");
        b.details.description = Some("Orange cherry".to_string());
        b.details.flavor = Some("tropical".to_string());
        b.details.spacing = Some("24in".to_string());
        b.details.fruit_color = Some("orange".to_string());
        b.details.days_to_maturity = Some(57);
        assert!(completeness(&b) > completeness(&a));

        assert_eq!(select_canonical(&[&b, &a]).unwrap().id, "a");
    }

    #[test]
    fn test_completeness_then_oldest_then_id() {
        let mut rich = variety("z", "Brandywine");
        rich.details.description = Some("Pink heirloom".to_string());
        let plain = variety("a", "Brandywine");
        assert_eq!(select_canonical(&[&plain, &rich]).unwrap().id, "z");

        let mut old = variety("y", "Brandywine");
        old.created_date = Some("2021-03-01T00:00:00Z".to_string());
        let mut new = variety("x", "Brandywine");
        new.created_date = Some("2023-03-01T00:00:00Z".to_string());
        let undated = variety("a", "Brandywine");
        assert_eq!(select_canonical(&[&new, &undated, &old]).unwrap().id, "y");

        let twin_b = variety("b", "Brandywine");
        let twin_a = variety("a", "Brandywine");
        assert_eq!(select_canonical(&[&twin_b, &twin_a]).unwrap().id, "a");
    }

    #[test]
    fn test_merge_fills_gaps_without_overwriting() {
        let mut a = variety("a", "Brandywine");
        a.details.description = Some("Canonical text".to_string());
        a.details.flavor = Some("rich".to_string());
        a.traits.insert("heirloom".to_string(), json!(true));

        let mut b = variety("b", "brandywine.");
        b.details.description = Some("Other text".to_string());
        b.details.spacing = Some("36in".to_string());
        b.traits.insert("heirloom".to_string(), json!(false));
        b.traits.insert("potato_leaf".to_string(), json!(true));

        let plan = plan_merge(&[&a, &b], &index()).unwrap();
        let c = &plan.canonical;
        assert_eq!(c.id, "a");
        assert_eq!(c.details.description.as_deref(), Some("Canonical text"));
        assert_eq!(c.details.spacing.as_deref(), Some("36in"));
        assert_eq!(c.traits["heirloom"], json!(true));
        assert_eq!(c.traits["potato_leaf"], json!(true));
        assert!(plan.canonical_changed());
    }

    #[test]
    fn test_merge_conserves_array_values() {
        let mut a = variety("a", "Sungold");
        a.variety_code = Some("TOM_CHERRY_SUNGOLD".to_string());
        a.images = vec!["a.jpg".to_string(), "shared.jpg".to_string()];
        a.synonyms = vec!["Sun Gold".to_string()];

        let mut b = variety("b", "Sungold F1");
        b.images = vec!["shared.jpg".to_string(), "b.jpg".to_string()];
        b.sources = vec!["Johnny's".to_string()];

        let mut c = variety("c", "sungold");
        c.synonyms = vec!["Sungold Select".to_string(), "Sun Gold".to_string()];
        c.sources = vec!["Territorial".to_string()];

        let members = [&a, &b, &c];
        let plan = plan_merge(&members, &index()).unwrap();

        for (field, merged) in [
            ("images", &plan.canonical.images),
            ("synonyms", &plan.canonical.synonyms),
            ("sources", &plan.canonical.sources),
        ] {
            let expected: HashSet<&String> = members
                .iter()
                .flat_map(|v| match field {
                    "images" => v.images.iter(),
                    "synonyms" => v.synonyms.iter(),
                    _ => v.sources.iter(),
                })
                .collect();
            let actual: HashSet<&String> = merged.iter().collect();
            assert_eq!(actual, expected, "{}", field);
            assert_eq!(merged.len(), actual.len(), "{} has duplicates", field);
        }
    }

    #[test]
    fn test_classification_union_keeps_canonical_primary() {
        let mut a = variety("a", "Sungold");
        a.variety_code = Some("TOM_CHERRY_SUNGOLD".to_string());
        a.classification = RawClassification {
            primary_id: Some("s-cherry".to_string()),
            primary_code: Some("PSC_TOMATO_CHERRY".to_string()),
            ids: vec!["s-cherry".to_string()],
            codes: vec!["PSC_TOMATO_CHERRY".to_string()],
        };
        let mut b = variety("b", "Sungold");
        b.classification = RawClassification {
            primary_code: Some("PSC_TOMATO_BEEFSTEAK".to_string()),
            ..Default::default()
        };

        let plan = plan_merge(&[&b, &a], &index()).unwrap();
        let raw = &plan.canonical.classification;
        assert_eq!(raw.primary_id.as_deref(), Some("s-cherry"));
        assert_eq!(raw.ids, vec!["s-cherry", "s-beef"]);
        assert_eq!(raw.codes, vec!["PSC_TOMATO_CHERRY", "PSC_TOMATO_BEEFSTEAK"]);
    }

    #[test]
    fn test_primary_falls_back_to_duplicate_when_canonical_has_none() {
        let mut a = variety("a", "Juliet");
        a.variety_code = Some("TOM_GRAPE_JULIET".to_string());
        let mut b = variety("b", "Juliet");
        b.classification.primary_id = Some("s-cherry".to_string());

        let plan = plan_merge(&[&a, &b], &index()).unwrap();
        assert_eq!(plan.canonical.id, "a");
        assert_eq!(plan.canonical.classification.primary_id.as_deref(), Some("s-cherry"));
    }

    #[test]
    fn test_unresolved_code_kept_as_import_code() {
        let a = variety("a", "Juliet");
        let mut b = variety("b", "juliet");
        b.classification.primary_code = Some("PSC_TOMATO_GRAPE".to_string());

        let plan = plan_merge(&[&a, &b], &index()).unwrap();
        assert!(plan.canonical.classification.primary_id.is_none());
        assert_eq!(plan.canonical.import_subcat_code(), Some("PSC_TOMATO_GRAPE"));
    }

    #[test]
    fn test_unmatched_codes_survive_next_to_a_classification() {
        let mut a = variety("a", "Brandywine");
        a.classification = RawClassification {
            primary_id: Some("s-beef".to_string()),
            primary_code: Some("PSC_TOMATO_BEEFSTEAK".to_string()),
            ids: vec!["s-beef".to_string()],
            codes: vec!["PSC_TOMATO_BEEFSTEAK".to_string()],
        };
        let mut b = variety("b", "brandywine");
        b.classification.codes = vec!["PSC_TOMATO_HEIRLOOM".to_string()];
        let mut c = variety("c", "BRANDYWINE");
        c.set_unresolved_subcat_codes(vec!["PSC_TOMATO_PINK".to_string()]);
        c.classification.primary_code = Some("PSC_TOMATO_HEIRLOOM".to_string());

        let members = [&a, &b, &c];
        let plan = plan_merge(&members, &index()).unwrap();
        let canonical = &plan.canonical;
        assert_eq!(canonical.classification.codes, vec!["PSC_TOMATO_BEEFSTEAK"]);
        assert!(canonical.import_subcat_code().is_none());
        assert_eq!(canonical.unresolved_subcat_codes(), vec!["PSC_TOMATO_HEIRLOOM", "PSC_TOMATO_PINK"]);

        let kept: HashSet<String> = canonical
            .classification
            .codes
            .iter()
            .map(String::as_str)
            .chain(canonical.unresolved_subcat_codes())
            .map(str::to_uppercase)
            .collect();
        for member in members {
            for code in member.classification.mentioned_codes() {
                assert!(kept.contains(&code.to_uppercase()), "{} lost", code);
            }
        }
    }

    #[test]
    fn test_parked_codes_resolve_when_subcategory_appears() {
        let a = variety("a", "Sungold");
        let mut b = variety("b", "sungold");
        b.set_unresolved_subcat_codes(vec!["PSC_TOMATO_CHERRY".to_string(), "PSC_TOMATO_ORANGE".to_string()]);

        let plan = plan_merge(&[&a, &b], &index()).unwrap();
        let canonical = &plan.canonical;
        assert_eq!(canonical.classification.primary_id.as_deref(), Some("s-cherry"));
        assert_eq!(canonical.unresolved_subcat_codes(), vec!["PSC_TOMATO_ORANGE"]);
    }

    #[test]
    fn test_offset_less_dates_still_order_by_age() {
        let mut new = variety("a-new", "Brandywine");
        new.created_date = Some("2024-03-01T00:00:00.000000".to_string());
        let mut old = variety("z-old", "Brandywine");
        old.created_date = Some("2021-03-01T00:00:00.000000".to_string());
        assert_eq!(select_canonical(&[&new, &old]).unwrap().id, "z-old");

        let mut day_only = variety("m-day", "Brandywine");
        day_only.created_date = Some("2020-06-15".to_string());
        assert_eq!(select_canonical(&[&new, &old, &day_only]).unwrap().id, "m-day");
    }

    #[test]
    fn test_tombstones_point_at_canonical() {
        let mut a = variety("a", "Brandywine");
        a.details.flavor = Some("rich".to_string());
        let b = variety("b", "brandywine.");
        let c = variety("c", "Brandywine ");

        let plan = plan_merge(&[&c, &b, &a], &index()).unwrap();
        assert_eq!(plan.canonical.id, "a");
        assert_eq!(plan.tombstones.len(), 2);
        for t in &plan.tombstones {
            assert_eq!(t.status, VarietyStatus::MergedInto("a".to_string()));
            assert_eq!(t.extended_data[MERGED_INTO_KEY], json!("a"));
        }
    }

    #[test]
    fn test_identical_records_leave_canonical_unchanged() {
        let a = variety("a", "Brandywine");
        let b = variety("b", "Brandywine");
        let plan = plan_merge(&[&a, &b], &index()).unwrap();
        assert!(!plan.canonical_changed());
    }
}
