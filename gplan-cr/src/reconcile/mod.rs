//! Catalog reconciliation engine
//!
//! Units, leaf first:
//!
//! - [`normalize`]: variety name canonicalization
//! - [`rules`] / [`resolver`]: rule-table classification of a variety
//! - [`repair`]: subcategory activation and classification normalization
//! - [`grouper`]: duplicate partitioning
//! - [`merge`]: canonical selection and folding of duplicates
//! - [`cascade`]: repointing dependents at surviving varieties
//! - [`diagnostics`] / [`dedup`]: read-only health reports
//! - [`assign`]: bulk rule-based subcategory assignment
//!
//! Mutating routines take a `dry_run` flag and route every write through
//! [`Writer`], so a dry run walks exactly the same decisions as a live run.
//! Per-record write failures are collected as [`RecordError`] and never stop
//! a batch.

use crate::store::CatalogStore;
use gplan_common::db::{GrowListItem, PlantSubCategory, Variety};
use gplan_common::Result;
use serde::Serialize;
use tracing::debug;

pub mod assign;
pub mod cascade;
pub mod dedup;
pub mod diagnostics;
pub mod grouper;
pub mod index;
pub mod merge;
pub mod normalize;
pub mod repair;
pub mod resolver;
pub mod rules;

/// A single record that could not be processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordError {
    pub id: String,
    pub name: String,
    pub error: String,
}

impl RecordError {
    pub fn new(id: impl Into<String>, name: impl Into<String>, error: impl ToString) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            error: error.to_string(),
        }
    }

    pub fn for_variety(variety: &Variety, error: impl ToString) -> Self {
        Self::new(&variety.id, &variety.variety_name, error)
    }
}

/// Store write gate shared by every mutating routine
///
/// In dry-run mode each call succeeds without touching the store.
pub struct Writer<'a> {
    store: &'a dyn CatalogStore,
    dry_run: bool,
}

impl<'a> Writer<'a> {
    pub fn new(store: &'a dyn CatalogStore, dry_run: bool) -> Self {
        Self { store, dry_run }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Underlying store, for reads
    pub fn store(&self) -> &'a dyn CatalogStore {
        self.store
    }

    pub async fn update_variety(&self, variety: &Variety) -> Result<()> {
        if self.dry_run {
            debug!(variety_id = %variety.id, "dry run: skipping variety write");
            return Ok(());
        }
        self.store.update_variety(variety).await
    }

    pub async fn update_subcategory(&self, subcat: &PlantSubCategory) -> Result<()> {
        if self.dry_run {
            debug!(subcategory_id = %subcat.id, "dry run: skipping subcategory write");
            return Ok(());
        }
        self.store.update_subcategory(subcat).await
    }

    pub async fn update_plant_profile_variety(&self, id: &str, variety_id: &str) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        self.store.update_plant_profile_variety(id, variety_id).await
    }

    pub async fn update_plant_instance_variety(&self, id: &str, variety_id: &str) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        self.store.update_plant_instance_variety(id, variety_id).await
    }

    pub async fn update_grow_list_items(&self, id: &str, items: &[GrowListItem]) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        self.store.update_grow_list_items(id, items).await
    }
}

/// Trimmed, non-empty view of an optional text field
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
