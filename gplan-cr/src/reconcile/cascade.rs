//! Reference cascade
//!
//! Repoints plant profiles, plant instances and grow-list items from merged
//! varieties to their survivors. Every dependent collection is scanned in
//! full; there is no reverse index from variety id to dependents, so cost
//! grows with the size of those collections rather than with the number of
//! merged records.
//!
//! The pass is not transactional. Anything it misses still points at a
//! tombstone, and [`repair_stragglers`] finds it again through the
//! tombstone's `merged_into` pointer.

use super::{RecordError, Writer};
use crate::db::varieties::VarietyFilter;
use crate::store::CatalogStore;
use gplan_common::db::{GrowListItem, VarietyStatus};
use gplan_common::Result;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// Where merged variety ids now lead
#[derive(Debug, Clone, Default)]
pub struct Redirects {
    /// Removed id -> surviving id
    pub targets: HashMap<String, String>,
    /// Tombstoned ids with no reachable survivor
    pub dead_ends: HashSet<String>,
}

impl Redirects {
    /// Final survivor for `id`, following chains; `None` if `id` is not redirected
    ///
    /// A chain that loops back on itself resolves to `None`.
    pub fn resolve(&self, id: &str) -> Option<&str> {
        let mut current = self.targets.get(id)?.as_str();
        let mut seen: HashSet<&str> = HashSet::from([id]);
        while let Some(next) = self.targets.get(current) {
            if !seen.insert(current) {
                return None;
            }
            current = next.as_str();
        }
        if current == id {
            return None;
        }
        Some(current)
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty() && self.dead_ends.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeReport {
    pub references_updated: usize,
    pub profiles_updated: usize,
    pub instances_updated: usize,
    pub grow_lists_updated: usize,
    /// References left pointing at a tombstone with no survivor
    pub unresolved: usize,
    pub errors: Vec<RecordError>,
}

/// Rewrite every dependent reference covered by `redirects`
///
/// Profiles and instances are updated one record at a time. A grow list is
/// written once with its whole rewritten item array. Failures are recorded
/// and the scan continues.
pub async fn cascade_references(writer: &Writer<'_>, redirects: &Redirects) -> CascadeReport {
    let mut report = CascadeReport::default();
    if redirects.is_empty() {
        return report;
    }

    let store = writer.store();
    let lookup = |id: Option<&str>| -> Lookup {
        match id {
            None => Lookup::Untouched,
            Some(id) => match redirects.resolve(id) {
                Some(target) => Lookup::Redirect(target.to_string()),
                None if redirects.dead_ends.contains(id) || redirects.targets.contains_key(id) => Lookup::DeadEnd,
                None => Lookup::Untouched,
            },
        }
    };

    match store.list_plant_profiles().await {
        Ok(profiles) => {
            for profile in profiles {
                match lookup(profile.variety_id.as_deref()) {
                    Lookup::Redirect(target) => {
                        match writer.update_plant_profile_variety(&profile.id, &target).await {
                            Ok(()) => report.profiles_updated += 1,
                            Err(e) => {
                                warn!(plant_profile_id = %profile.id, error = %e, "Failed to repoint plant profile");
                                let name = profile.nickname.clone().unwrap_or_default();
                                report.errors.push(RecordError::new(&profile.id, name, e));
                            }
                        }
                    }
                    Lookup::DeadEnd => report.unresolved += 1,
                    Lookup::Untouched => {}
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to load plant profiles for cascade");
            report.errors.push(RecordError::new("plant_profiles", "plant_profiles", e));
        }
    }

    match store.list_plant_instances().await {
        Ok(instances) => {
            for instance in instances {
                match lookup(instance.variety_id.as_deref()) {
                    Lookup::Redirect(target) => {
                        match writer.update_plant_instance_variety(&instance.id, &target).await {
                            Ok(()) => report.instances_updated += 1,
                            Err(e) => {
                                warn!(plant_instance_id = %instance.id, error = %e, "Failed to repoint plant instance");
                                let name = instance.garden_id.clone().unwrap_or_default();
                                report.errors.push(RecordError::new(&instance.id, name, e));
                            }
                        }
                    }
                    Lookup::DeadEnd => report.unresolved += 1,
                    Lookup::Untouched => {}
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to load plant instances for cascade");
            report.errors.push(RecordError::new("plant_instances", "plant_instances", e));
        }
    }

    let mut grow_list_refs = 0;
    match store.list_grow_lists().await {
        Ok(lists) => {
            for list in lists {
                let mut rewritten: Vec<GrowListItem> = Vec::with_capacity(list.items.len());
                let mut changed = 0;
                for item in &list.items {
                    let mut item = item.clone();
                    match lookup(item.variety_id()) {
                        Lookup::Redirect(target) => {
                            item.set_variety_id(target);
                            changed += 1;
                        }
                        Lookup::DeadEnd => report.unresolved += 1,
                        Lookup::Untouched => {}
                    }
                    rewritten.push(item);
                }
                if changed == 0 {
                    continue;
                }
                match writer.update_grow_list_items(&list.id, &rewritten).await {
                    Ok(()) => {
                        report.grow_lists_updated += 1;
                        grow_list_refs += changed;
                    }
                    Err(e) => {
                        warn!(grow_list_id = %list.id, error = %e, "Failed to rewrite grow list items");
                        report.errors.push(RecordError::new(&list.id, &list.name, e));
                    }
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to load grow lists for cascade");
            report.errors.push(RecordError::new("grow_lists", "grow_lists", e));
        }
    }

    report.references_updated = report.profiles_updated + report.instances_updated + grow_list_refs;

    info!(
        dry_run = writer.dry_run(),
        references_updated = report.references_updated,
        profiles = report.profiles_updated,
        instances = report.instances_updated,
        grow_lists = report.grow_lists_updated,
        unresolved = report.unresolved,
        "Reference cascade complete"
    );

    report
}

enum Lookup {
    Untouched,
    Redirect(String),
    DeadEnd,
}

/// Build redirects from every tombstone in the catalog
///
/// A tombstone whose chain ends at an active variety redirects there. One
/// that ends at a missing, removed or non-active record, or loops, is a
/// dead end.
pub async fn tombstone_redirects(store: &dyn CatalogStore) -> Result<Redirects> {
    let varieties = store.list_varieties(&VarietyFilter::all()).await?;
    let by_id: HashMap<&str, &VarietyStatus> = varieties.iter().map(|v| (v.id.as_str(), &v.status)).collect();

    let mut chain = Redirects::default();
    for v in &varieties {
        if let VarietyStatus::MergedInto(target) = &v.status {
            chain.targets.insert(v.id.clone(), target.clone());
        }
    }

    let mut redirects = Redirects::default();
    for v in &varieties {
        match &v.status {
            VarietyStatus::MergedInto(_) => {
                let survivor = chain
                    .resolve(&v.id)
                    .filter(|target| by_id.get(target).map(|s| s.is_active()).unwrap_or(false));
                match survivor {
                    Some(target) => {
                        redirects.targets.insert(v.id.clone(), target.to_string());
                    }
                    None => {
                        redirects.dead_ends.insert(v.id.clone());
                    }
                }
            }
            VarietyStatus::Removed => {
                redirects.dead_ends.insert(v.id.clone());
            }
            _ => {}
        }
    }

    Ok(redirects)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StragglerReport {
    pub dry_run: bool,
    pub references_updated: usize,
    pub unresolved: usize,
    pub errors: Vec<RecordError>,
}

/// Repoint dependents still referencing tombstoned varieties
pub async fn repair_stragglers(store: &dyn CatalogStore, dry_run: bool) -> Result<StragglerReport> {
    info!(dry_run, "Starting straggler reference repair");

    let redirects = tombstone_redirects(store).await?;
    let writer = Writer::new(store, dry_run);
    let cascade = cascade_references(&writer, &redirects).await;

    Ok(StragglerReport {
        dry_run,
        references_updated: cascade.references_updated,
        unresolved: cascade.unresolved,
        errors: cascade.errors,
    })
}
