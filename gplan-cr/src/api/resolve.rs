//! Single-record resolver endpoint

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};

use super::{body, success, Success};
use crate::error::{ApiError, ApiResult};
use crate::reconcile::index::SubcategoryIndex;
use crate::reconcile::resolver::{Resolution, ResolveInput, Resolver};
use crate::AppState;

/// Either a stored variety id or free-form resolver input
#[derive(Debug, Default, Deserialize)]
pub struct ResolveRequest {
    pub variety_id: Option<String>,
    #[serde(flatten)]
    pub input: ResolveInput,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variety_id: Option<String>,
    pub resolution: Resolution,
}

/// POST /api/resolve
///
/// Runs the resolver without writing anything.
pub async fn resolve_variety(
    State(state): State<AppState>,
    payload: Result<Json<ResolveRequest>, JsonRejection>,
) -> ApiResult<Json<Success<ResolveResponse>>> {
    let request = body(payload)?;
    let store = state.store.as_ref();

    let variety_id = request
        .variety_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());

    let input = match &variety_id {
        Some(id) => {
            let variety = store
                .get_variety(id)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("Variety not found: {}", id)))?;
            let type_name = match variety.plant_type_id.as_deref() {
                Some(type_id) => store.get_plant_type(type_id).await?.map(|t| t.common_name),
                None => None,
            };
            ResolveInput::from_variety(&variety, type_name.as_deref())
        }
        None => {
            let input = request.input;
            if input.variety_code.is_none() && input.variety_name.is_none() {
                return Err(ApiError::BadRequest(
                    "Provide variety_id, variety_code or variety_name".to_string(),
                ));
            }
            input
        }
    };

    let index = SubcategoryIndex::new(&store.list_subcategories(None).await?);
    let resolution = Resolver::new(&state.rules, &index).resolve(&input);

    Ok(success(ResolveResponse { variety_id, resolution }))
}
