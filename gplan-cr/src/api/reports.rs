//! Read-mostly reports: dedup preview, diagnostics, bulk assignment

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;

use super::repair::DryRunRequest;
use super::{body, success, Success};
use crate::error::ApiResult;
use crate::reconcile::assign::{self, AssignReport};
use crate::reconcile::dedup::{self, DedupReport};
use crate::reconcile::diagnostics::{self, DiagnosticsReport};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DedupRequest {
    pub plant_type_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DiagnosticsRequest {
    pub sample_limit: Option<usize>,
}

/// POST /api/dedup/dry-run
///
/// Never writes. Without a plant type id the default type is looked up by name.
pub async fn dedup_dry_run(
    State(state): State<AppState>,
    payload: Result<Json<DedupRequest>, JsonRejection>,
) -> ApiResult<Json<Success<DedupReport>>> {
    let request = body(payload)?;
    let plant_type_id = request
        .plant_type_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let report = dedup::dedup_dry_run(state.store.as_ref(), plant_type_id).await?;
    Ok(success(report))
}

/// POST /api/diagnostics
pub async fn run_diagnostics(
    State(state): State<AppState>,
    payload: Result<Json<DiagnosticsRequest>, JsonRejection>,
) -> ApiResult<Json<Success<DiagnosticsReport>>> {
    let request = body(payload)?;
    let limit = request.sample_limit.unwrap_or(state.sample_limit);

    let report = diagnostics::run_diagnostics(state.store.as_ref(), limit).await?;
    Ok(success(report))
}

/// POST /api/assign/by-code
pub async fn assign_by_code(
    State(state): State<AppState>,
    payload: Result<Json<DryRunRequest>, JsonRejection>,
) -> ApiResult<Json<Success<AssignReport>>> {
    let request = body(payload)?;
    let report = assign::assign_by_code(state.store.as_ref(), &state.rules, request.dry_run).await?;
    Ok(success(report))
}
