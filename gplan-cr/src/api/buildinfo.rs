//! Build information API endpoint

use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::AppState;

/// Build information response
#[derive(Debug, Serialize)]
pub struct BuildInfo {
    pub version: String,
    pub git_hash: String,
    pub build_timestamp: String,
    pub build_profile: String,
    pub prefix_rules: usize,
    pub attribute_rules: usize,
    pub name_rules: usize,
}

/// GET /api/buildinfo
///
/// Build identification plus the size of the loaded rule table
pub async fn get_build_info(State(state): State<AppState>) -> Json<BuildInfo> {
    Json(BuildInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
        prefix_rules: state.rules.prefix_rules().len(),
        attribute_rules: state.rules.attribute_rules().len(),
        name_rules: state.rules.name_rules().len(),
    })
}
