//! HTTP API handlers for gplan-cr

use axum::{extract::rejection::JsonRejection, Json};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};

pub mod auth;
pub mod buildinfo;
pub mod health;
pub mod merge;
pub mod repair;
pub mod reports;
pub mod resolve;

pub use auth::auth_middleware;
pub use buildinfo::get_build_info;
pub use health::health_routes;
pub use merge::{merge_duplicates, merge_stragglers};
pub use repair::{repair_all, repair_carrot, repair_plant_type};
pub use reports::{assign_by_code, dedup_dry_run, run_diagnostics};
pub use resolve::resolve_variety;

/// Successful response: `success: true` plus the routine's own fields
#[derive(Debug, Serialize)]
pub struct Success<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

pub fn success<T: Serialize>(data: T) -> Json<Success<T>> {
    Json(Success { success: true, data })
}

/// Unwrap a JSON body, turning extractor rejections into a 400
pub(crate) fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// Required, non-blank string field
pub(crate) fn required(value: Option<String>, field: &str) -> ApiResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Missing required field: {}", field)))
}
