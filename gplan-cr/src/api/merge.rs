//! Duplicate merge endpoints

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;

use super::repair::DryRunRequest;
use super::{body, success, Success};
use crate::error::ApiResult;
use crate::reconcile::cascade::{self, StragglerReport};
use crate::reconcile::grouper::MatchingMode;
use crate::reconcile::merge::{self, MergeReport};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct MergeRequest {
    pub plant_type_id: Option<String>,
    #[serde(default)]
    pub matching_mode: MatchingMode,
    #[serde(default)]
    pub dry_run: bool,
}

/// POST /api/merge
pub async fn merge_duplicates(
    State(state): State<AppState>,
    payload: Result<Json<MergeRequest>, JsonRejection>,
) -> ApiResult<Json<Success<MergeReport>>> {
    let request = body(payload)?;
    let plant_type_id = request
        .plant_type_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let report = merge::run_merge(
        state.store.as_ref(),
        plant_type_id,
        request.matching_mode,
        request.dry_run,
    )
    .await?;
    Ok(success(report))
}

/// POST /api/merge/stragglers
pub async fn merge_stragglers(
    State(state): State<AppState>,
    payload: Result<Json<DryRunRequest>, JsonRejection>,
) -> ApiResult<Json<Success<StragglerReport>>> {
    let request = body(payload)?;
    let report = cascade::repair_stragglers(state.store.as_ref(), request.dry_run).await?;
    Ok(success(report))
}
