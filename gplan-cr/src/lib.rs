//! gplan-cr library - Catalog Reconciliation service
//!
//! Administrative routines that repair, merge and audit the plant-variety
//! catalog, plus the axum router that exposes them.

use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod reconcile;
pub mod store;

use reconcile::diagnostics::DEFAULT_SAMPLE_LIMIT;
use reconcile::rules::RuleTable;
use store::{CatalogStore, SqliteCatalog};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Catalog the routines read and write
    pub store: Arc<dyn CatalogStore>,
    /// Classification rule table
    pub rules: Arc<RuleTable>,
    /// Shared secret for API authentication (0 disables checking)
    pub shared_secret: i64,
    /// Default diagnostics sample size
    pub sample_limit: usize,
}

impl AppState {
    /// State over the SQLite catalog
    pub fn new(db: SqlitePool, rules: RuleTable, shared_secret: i64) -> Self {
        Self::with_store(Arc::new(SqliteCatalog::new(db)), rules, shared_secret)
    }

    /// State over any catalog store
    pub fn with_store(store: Arc<dyn CatalogStore>, rules: RuleTable, shared_secret: i64) -> Self {
        Self {
            store,
            rules: Arc::new(rules),
            shared_secret,
            sample_limit: DEFAULT_SAMPLE_LIMIT,
        }
    }

    pub fn with_sample_limit(mut self, sample_limit: usize) -> Self {
        self.sample_limit = sample_limit;
        self
    }
}

/// Build application router
///
/// Reconciliation routes sit behind the auth middleware; health and build
/// info are public.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    // Protected routes (require authentication)
    let protected = Router::new()
        .route("/api/repair/plant-type", post(api::repair_plant_type))
        .route("/api/repair/all", post(api::repair_all))
        .route("/api/repair/carrot", post(api::repair_carrot))
        .route("/api/merge", post(api::merge_duplicates))
        .route("/api/merge/stragglers", post(api::merge_stragglers))
        .route("/api/dedup/dry-run", post(api::dedup_dry_run))
        .route("/api/diagnostics", post(api::run_diagnostics))
        .route("/api/assign/by-code", post(api::assign_by_code))
        .route("/api/resolve", post(api::resolve_variety))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new()
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
