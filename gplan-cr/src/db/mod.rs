//! Database access layer for gplan-cr
//!
//! Row-level queries for the catalog tables. The reconciliation engine does
//! not call these directly; it goes through [`crate::store::CatalogStore`],
//! which [`crate::store::SqliteCatalog`] implements on top of this module.
//!
//! JSON columns are decoded leniently: the catalog is known to contain
//! malformed arrays and objects, and a row that cannot be decoded must still
//! load so that it can be repaired.

use gplan_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

pub mod dependents;
pub mod plant_types;
pub mod subcategories;
pub mod varieties;

mod codec;

/// Open (or create) the catalog database and ensure its schema
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    gplan_common::db::init::init_database(db_path).await
}
