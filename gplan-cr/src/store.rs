//! Catalog storage abstraction
//!
//! Every reconciliation routine reads and writes through [`CatalogStore`].
//! The SQLite implementation is the production store; tests wrap it to
//! observe or fail individual writes.

use crate::db::{self, varieties::VarietyFilter};
use async_trait::async_trait;
use gplan_common::db::{GrowList, GrowListItem, PlantInstance, PlantProfile, PlantSubCategory, PlantType, Variety};
use gplan_common::Result;
use sqlx::SqlitePool;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_plant_types(&self) -> Result<Vec<PlantType>>;
    async fn get_plant_type(&self, id: &str) -> Result<Option<PlantType>>;
    async fn find_plant_type_by_name(&self, common_name: &str) -> Result<Option<PlantType>>;

    async fn list_subcategories(&self, plant_type_id: Option<&str>) -> Result<Vec<PlantSubCategory>>;
    async fn update_subcategory(&self, subcat: &PlantSubCategory) -> Result<()>;

    async fn list_varieties(&self, filter: &VarietyFilter) -> Result<Vec<Variety>>;
    async fn get_variety(&self, id: &str) -> Result<Option<Variety>>;
    async fn update_variety(&self, variety: &Variety) -> Result<()>;

    async fn list_plant_profiles(&self) -> Result<Vec<PlantProfile>>;
    async fn update_plant_profile_variety(&self, id: &str, variety_id: &str) -> Result<()>;

    async fn list_plant_instances(&self) -> Result<Vec<PlantInstance>>;
    async fn update_plant_instance_variety(&self, id: &str, variety_id: &str) -> Result<()>;

    async fn list_grow_lists(&self) -> Result<Vec<GrowList>>;
    async fn update_grow_list_items(&self, id: &str, items: &[GrowListItem]) -> Result<()>;
}

/// [`CatalogStore`] backed by the shared SQLite database
#[derive(Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn list_plant_types(&self) -> Result<Vec<PlantType>> {
        db::plant_types::list_plant_types(&self.pool).await
    }

    async fn get_plant_type(&self, id: &str) -> Result<Option<PlantType>> {
        db::plant_types::get_plant_type(&self.pool, id).await
    }

    async fn find_plant_type_by_name(&self, common_name: &str) -> Result<Option<PlantType>> {
        db::plant_types::find_plant_type_by_name(&self.pool, common_name).await
    }

    async fn list_subcategories(&self, plant_type_id: Option<&str>) -> Result<Vec<PlantSubCategory>> {
        db::subcategories::list_subcategories(&self.pool, plant_type_id).await
    }

    async fn update_subcategory(&self, subcat: &PlantSubCategory) -> Result<()> {
        db::subcategories::update_subcategory(&self.pool, subcat).await
    }

    async fn list_varieties(&self, filter: &VarietyFilter) -> Result<Vec<Variety>> {
        db::varieties::list_varieties(&self.pool, filter).await
    }

    async fn get_variety(&self, id: &str) -> Result<Option<Variety>> {
        db::varieties::get_variety(&self.pool, id).await
    }

    async fn update_variety(&self, variety: &Variety) -> Result<()> {
        db::varieties::update_variety(&self.pool, variety).await
    }

    async fn list_plant_profiles(&self) -> Result<Vec<PlantProfile>> {
        db::dependents::list_plant_profiles(&self.pool).await
    }

    async fn update_plant_profile_variety(&self, id: &str, variety_id: &str) -> Result<()> {
        db::dependents::update_plant_profile_variety(&self.pool, id, variety_id).await
    }

    async fn list_plant_instances(&self) -> Result<Vec<PlantInstance>> {
        db::dependents::list_plant_instances(&self.pool).await
    }

    async fn update_plant_instance_variety(&self, id: &str, variety_id: &str) -> Result<()> {
        db::dependents::update_plant_instance_variety(&self.pool, id, variety_id).await
    }

    async fn list_grow_lists(&self) -> Result<Vec<GrowList>> {
        db::dependents::list_grow_lists(&self.pool).await
    }

    async fn update_grow_list_items(&self, id: &str, items: &[GrowListItem]) -> Result<()> {
        db::dependents::update_grow_list_items(&self.pool, id, items).await
    }
}
