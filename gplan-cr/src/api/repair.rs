//! Subcategory repair endpoints

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;

use super::{body, required, success, Success};
use crate::error::ApiResult;
use crate::reconcile::repair::{self, CanonicalRepairReport, CatalogRepairReport, RepairReport};
use crate::AppState;

/// Plant type whose canonical subcategory set `/api/repair/carrot` enforces
pub const CARROT_PLANT_TYPE: &str = "Carrot";

#[derive(Debug, Default, Deserialize)]
pub struct RepairPlantTypeRequest {
    pub plant_type_id: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct DryRunRequest {
    #[serde(default)]
    pub dry_run: bool,
}

/// POST /api/repair/plant-type
pub async fn repair_plant_type(
    State(state): State<AppState>,
    payload: Result<Json<RepairPlantTypeRequest>, JsonRejection>,
) -> ApiResult<Json<Success<RepairReport>>> {
    let request = body(payload)?;
    let plant_type_id = required(request.plant_type_id, "plant_type_id")?;

    let report = repair::repair_plant_type(state.store.as_ref(), &plant_type_id, request.dry_run).await?;
    Ok(success(report))
}

/// POST /api/repair/all
pub async fn repair_all(
    State(state): State<AppState>,
    payload: Result<Json<DryRunRequest>, JsonRejection>,
) -> ApiResult<Json<Success<CatalogRepairReport>>> {
    let request = body(payload)?;
    let report = repair::repair_catalog(state.store.as_ref(), request.dry_run).await?;
    Ok(success(report))
}

/// POST /api/repair/carrot
pub async fn repair_carrot(
    State(state): State<AppState>,
    payload: Result<Json<DryRunRequest>, JsonRejection>,
) -> ApiResult<Json<Success<CanonicalRepairReport>>> {
    let request = body(payload)?;
    let report = repair::repair_canonical_set(
        state.store.as_ref(),
        &state.rules,
        CARROT_PLANT_TYPE,
        request.dry_run,
    )
    .await?;
    Ok(success(report))
}
