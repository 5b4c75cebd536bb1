//! Integration tests for gplan-cr API endpoints
//!
//! Router-level checks with authentication disabled (shared secret 0):
//! routing, request validation, response envelopes, dry-run semantics.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::*;
use gplan_cr::reconcile::rules::RuleTable;
use gplan_cr::{build_router, AppState};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method

/// Router over a seeded catalog, auth disabled
async fn setup_app() -> (axum::Router, SqlitePool, Arc<CountingStore>) {
    let pool = empty_db().await;
    seed_types(&pool).await;
    seed_brandywine(&pool).await;
    seed_dependents(&pool, "v-brandy-1").await;

    let store = CountingStore::new(pool.clone());
    let state = AppState::with_store(store.clone(), RuleTable::builtin().unwrap(), 0);
    (build_router(state), pool, store)
}

async fn post(app: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app.oneshot(post_json(uri, &body)).await.unwrap();
    let status = response.status();
    (status, extract_json(response.into_body()).await)
}

// =============================================================================
// Public endpoints
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _, _) = setup_app().await;

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = extract_json(response.into_body()).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "gplan-cr");
}

#[tokio::test]
async fn test_buildinfo_reports_rule_counts() {
    let (app, _, _) = setup_app().await;

    let request = Request::builder().uri("/api/buildinfo").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = extract_json(response.into_body()).await;
    assert!(json["version"].is_string());
    assert!(json["prefix_rules"].as_u64().unwrap() > 0);
    assert!(json["name_rules"].as_u64().unwrap() > 0);
}

// =============================================================================
// Repair
// =============================================================================

#[tokio::test]
async fn test_repair_plant_type_requires_id() {
    let (app, _, store) = setup_app().await;

    let (status, json) = post(app, "/api/repair/plant-type", json!({"dry_run": true})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn test_repair_plant_type_unknown_id_is_404() {
    let (app, _, _) = setup_app().await;

    let (status, json) = post(app, "/api/repair/plant-type", json!({"plant_type_id": "pt-nope"})).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_repair_plant_type_dry_run() {
    let (app, _, store) = setup_app().await;

    let (status, json) = post(
        app,
        "/api/repair/plant-type",
        json!({"plant_type_id": TOMATO, "dry_run": true}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["dry_run"], true);
    assert_eq!(json["subcats_activated"], 1);
    assert_eq!(json["plant_type_name"], "Tomato");
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn test_repair_carrot_without_carrot_type_is_404() {
    let pool = empty_db().await;
    let store = CountingStore::new(pool);
    let app = build_router(AppState::with_store(store, RuleTable::builtin().unwrap(), 0));

    let (status, _) = post(app, "/api/repair/carrot", json!({"dry_run": true})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_body_is_400() {
    let (app, _, _) = setup_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/repair/all")
        .header("Content-Type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = extract_json(response.into_body()).await;
    assert_eq!(json["success"], false);
}

// =============================================================================
// Merge, dedup, diagnostics
// =============================================================================

#[tokio::test]
async fn test_merge_dry_run_envelope() {
    let (app, _, store) = setup_app().await;

    let (status, json) = post(
        app,
        "/api/merge",
        json!({"plant_type_id": TOMATO, "matching_mode": "name", "dry_run": true}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["dryRun"], true);
    assert_eq!(json["matchingMode"], "name");
    assert_eq!(json["groupsMerged"], 1);
    assert_eq!(json["recordsMerged"], 2);
    assert_eq!(json["referencesUpdated"], 3);
    assert_eq!(json["groups"][0]["canonicalId"], "v-brandy-2");
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn test_merge_rejects_unknown_matching_mode() {
    let (app, _, _) = setup_app().await;

    let (status, _) = post(app, "/api/merge", json!({"matching_mode": "fuzzy"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_merge_then_stragglers_finds_nothing_left() {
    let (app, pool, _) = setup_app().await;

    let (status, json) = post(app.clone(), "/api/merge", json!({"plant_type_id": TOMATO})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["referencesUpdated"], 3);

    let (status, json) = post(app, "/api/merge/stragglers", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["referencesUpdated"], 0);
    assert_eq!(json["unresolved"], 0);

    let profiles = gplan_cr::db::dependents::list_plant_profiles(&pool).await.unwrap();
    assert_eq!(profiles[0].variety_id.as_deref(), Some("v-brandy-2"));
}

#[tokio::test]
async fn test_dedup_defaults_to_tomato() {
    let (app, _, store) = setup_app().await;

    let (status, json) = post(app, "/api/dedup/dry-run", json!({})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["plant_type_name"], "Tomato");
    assert_eq!(json["total_groups"], 1);
    assert_eq!(json["truncated"], false);

    let records = json["groups"][0]["records"].as_array().unwrap();
    assert_eq!(records.len(), 3);
    let canonical: Vec<&Value> = records.iter().filter(|r| r["is_canonical"] == true).collect();
    assert_eq!(canonical.len(), 1);
    assert_eq!(canonical[0]["id"], "v-brandy-2");
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn test_diagnostics_sample_limit() {
    let (app, _, store) = setup_app().await;

    let (status, json) = post(app, "/api/diagnostics", json!({"sample_limit": 0})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["total_active_varieties"], 3);
    assert_eq!(json["name_duplicates"]["groups"], 1);
    assert_eq!(json["samples"]["name_duplicates"].as_array().unwrap().len(), 0);
    assert_eq!(store.writes(), 0);
}

// =============================================================================
// Assignment and resolver
// =============================================================================

#[tokio::test]
async fn test_assign_by_code_dry_run() {
    let (app, _, store) = setup_app().await;

    let (status, json) = post(app, "/api/assign/by-code", json!({"dry_run": true})).await;

    assert_eq!(status, StatusCode::OK);
    // Brandywine without a code resolves through the name tier
    assert_eq!(json["summary"]["total_missing"], 2);
    assert_eq!(json["summary"]["fixed"], 2);
    assert_eq!(json["fixes"][0]["tier"], "name");
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn test_resolve_ad_hoc_input() {
    let (app, _, store) = setup_app().await;

    let (status, json) = post(
        app,
        "/api/resolve",
        json!({"variety_code": "tom_cherry_sungold", "plant_type_id": TOMATO}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["resolution"]["outcome"], "matched");
    assert_eq!(json["resolution"]["tier"], "prefix");
    assert_eq!(json["resolution"]["subcategory"]["id"], "sc-cherry");
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn test_resolve_stored_variety() {
    let (app, _, _) = setup_app().await;

    let (status, json) = post(app, "/api/resolve", json!({"variety_id": "v-brandy-1"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["variety_id"], "v-brandy-1");
    assert_eq!(json["resolution"]["outcome"], "matched");
    assert_eq!(json["resolution"]["subcategory"]["id"], "sc-beef");
}

#[tokio::test]
async fn test_resolve_requires_some_input() {
    let (app, _, _) = setup_app().await;

    let (status, _) = post(app, "/api/resolve", json!({"plant_type_id": TOMATO})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_resolve_unknown_variety_is_404() {
    let (app, _, _) = setup_app().await;

    let (status, _) = post(app, "/api/resolve", json!({"variety_id": "v-nope"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
