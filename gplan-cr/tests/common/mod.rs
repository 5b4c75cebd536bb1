//! Shared fixtures for gplan-cr integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use gplan_common::db::init::init_memory_database;
use gplan_common::db::{
    GrowList, GrowListItem, PlantInstance, PlantProfile, PlantSubCategory, PlantType, RawClassification, Variety,
};
use gplan_common::{Error, Result};
use gplan_cr::db::{dependents, plant_types, subcategories, varieties, varieties::VarietyFilter};
use gplan_cr::store::{CatalogStore, SqliteCatalog};
use serde_json::{Map, Value};
use sqlx::SqlitePool;

pub const TOMATO: &str = "pt-tomato";
pub const CARROT: &str = "pt-carrot";

pub async fn empty_db() -> SqlitePool {
    init_memory_database().await.expect("in-memory database")
}

pub fn subcat(id: &str, plant_type_id: &str, code: &str, name: &str, active: bool) -> PlantSubCategory {
    PlantSubCategory {
        id: id.to_string(),
        plant_type_id: plant_type_id.to_string(),
        subcat_code: code.to_string(),
        name: name.to_string(),
        is_active: active,
    }
}

pub fn variety(id: &str, plant_type_id: &str, name: &str) -> Variety {
    Variety::new(id, Some(plant_type_id.to_string()), name)
}

pub fn classified(mut v: Variety, id: Option<&str>, code: Option<&str>) -> Variety {
    v.classification = RawClassification {
        primary_id: id.map(str::to_string),
        primary_code: code.map(str::to_string),
        ids: id.map(|s| vec![s.to_string()]).unwrap_or_default(),
        codes: code.map(|s| vec![s.to_string()]).unwrap_or_default(),
    };
    v
}

/// Tomato and Carrot types with a few tomato subcategories (one inactive)
pub async fn seed_types(pool: &SqlitePool) {
    for (id, name) in [(TOMATO, "Tomato"), (CARROT, "Carrot")] {
        plant_types::insert_plant_type(
            pool,
            &PlantType {
                id: id.to_string(),
                common_name: name.to_string(),
                type_code: None,
            },
        )
        .await
        .unwrap();
    }
    for s in [
        subcat("sc-cherry", TOMATO, "PSC_TOMATO_CHERRY", "Cherry", true),
        subcat("sc-beef", TOMATO, "PSC_TOMATO_BEEFSTEAK", "Beefsteak", true),
        subcat("sc-paste", TOMATO, "PSC_TOMATO_PASTE", "Paste", false),
    ] {
        subcategories::insert_subcategory(pool, &s).await.unwrap();
    }
}

pub async fn insert_varieties(pool: &SqlitePool, list: &[Variety]) {
    for v in list {
        varieties::insert_variety(pool, v).await.unwrap();
    }
}

/// Three spellings of Brandywine; `v-brandy-2` is the most complete
pub async fn seed_brandywine(pool: &SqlitePool) {
    let mut first = variety("v-brandy-1", TOMATO, "Brandywine");
    first.created_date = Some("2023-01-01T00:00:00Z".to_string());
    first.images = vec!["a.jpg".to_string()];

    let mut second = classified(
        variety("v-brandy-2", TOMATO, "brandywine "),
        Some("sc-beef"),
        Some("PSC_TOMATO_BEEFSTEAK"),
    );
    second.created_date = Some("2023-06-01T00:00:00Z".to_string());
    second.details.description = Some("Pink heirloom".to_string());
    second.details.days_to_maturity = Some(80);
    second.images = vec!["b.jpg".to_string()];

    let mut third = variety("v-brandy-3", TOMATO, "BRANDYWINE.");
    third.created_date = Some("2024-01-01T00:00:00Z".to_string());
    third.details.flavor = Some("Rich".to_string());
    third.synonyms = vec!["Brandywine Pink".to_string()];

    insert_varieties(pool, &[first, second, third]).await;
}

pub async fn seed_dependents(pool: &SqlitePool, variety_id: &str) {
    dependents::insert_plant_profile(
        pool,
        &PlantProfile {
            id: "profile-1".to_string(),
            owner_id: Some("user-1".to_string()),
            variety_id: Some(variety_id.to_string()),
            nickname: Some("Big pink".to_string()),
        },
    )
    .await
    .unwrap();
    dependents::insert_plant_instance(
        pool,
        &PlantInstance {
            id: "instance-1".to_string(),
            garden_id: Some("garden-1".to_string()),
            variety_id: Some(variety_id.to_string()),
            planted_date: Some("2024-05-01".to_string()),
        },
    )
    .await
    .unwrap();

    let mut extra = Map::new();
    extra.insert("quantity".to_string(), Value::from(3));
    dependents::insert_grow_list(
        pool,
        &GrowList {
            id: "list-1".to_string(),
            owner_id: Some("user-1".to_string()),
            name: "Spring".to_string(),
            items: vec![
                GrowListItem::entry(variety_id, extra),
                GrowListItem::entry("v-unrelated", Map::new()),
            ],
        },
    )
    .await
    .unwrap();
}

/// Store wrapper counting every write that reaches the database
///
/// Optionally rejects updates of one variety to exercise per-record failures.
pub struct CountingStore {
    inner: SqliteCatalog,
    writes: AtomicUsize,
    failing_variety: Option<String>,
}

impl CountingStore {
    pub fn new(pool: SqlitePool) -> Arc<Self> {
        Arc::new(Self {
            inner: SqliteCatalog::new(pool),
            writes: AtomicUsize::new(0),
            failing_variety: None,
        })
    }

    pub fn failing_on(pool: SqlitePool, variety_id: &str) -> Arc<Self> {
        Arc::new(Self {
            inner: SqliteCatalog::new(pool),
            writes: AtomicUsize::new(0),
            failing_variety: Some(variety_id.to_string()),
        })
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CatalogStore for CountingStore {
    async fn list_plant_types(&self) -> Result<Vec<PlantType>> {
        self.inner.list_plant_types().await
    }

    async fn get_plant_type(&self, id: &str) -> Result<Option<PlantType>> {
        self.inner.get_plant_type(id).await
    }

    async fn find_plant_type_by_name(&self, common_name: &str) -> Result<Option<PlantType>> {
        self.inner.find_plant_type_by_name(common_name).await
    }

    async fn list_subcategories(&self, plant_type_id: Option<&str>) -> Result<Vec<PlantSubCategory>> {
        self.inner.list_subcategories(plant_type_id).await
    }

    async fn update_subcategory(&self, subcat: &PlantSubCategory) -> Result<()> {
        self.count();
        self.inner.update_subcategory(subcat).await
    }

    async fn list_varieties(&self, filter: &VarietyFilter) -> Result<Vec<Variety>> {
        self.inner.list_varieties(filter).await
    }

    async fn get_variety(&self, id: &str) -> Result<Option<Variety>> {
        self.inner.get_variety(id).await
    }

    async fn update_variety(&self, variety: &Variety) -> Result<()> {
        if self.failing_variety.as_deref() == Some(variety.id.as_str()) {
            return Err(Error::Internal(format!("simulated write failure for {}", variety.id)));
        }
        self.count();
        self.inner.update_variety(variety).await
    }

    async fn list_plant_profiles(&self) -> Result<Vec<PlantProfile>> {
        self.inner.list_plant_profiles().await
    }

    async fn update_plant_profile_variety(&self, id: &str, variety_id: &str) -> Result<()> {
        self.count();
        self.inner.update_plant_profile_variety(id, variety_id).await
    }

    async fn list_plant_instances(&self) -> Result<Vec<PlantInstance>> {
        self.inner.list_plant_instances().await
    }

    async fn update_plant_instance_variety(&self, id: &str, variety_id: &str) -> Result<()> {
        self.count();
        self.inner.update_plant_instance_variety(id, variety_id).await
    }

    async fn list_grow_lists(&self) -> Result<Vec<GrowList>> {
        self.inner.list_grow_lists().await
    }

    async fn update_grow_list_items(&self, id: &str, items: &[GrowListItem]) -> Result<()> {
        self.count();
        self.inner.update_grow_list_items(id, items).await
    }
}

/// JSON POST request
pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}
