//! Authentication middleware for gplan-cr
//!
//! Every reconciliation route is admin-only. The JSON body must carry a
//! fresh `timestamp` and a `hash` over the canonical body plus the shared
//! secret. Requests are rejected here, before any handler touches the store.

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use gplan_common::api::auth::{validate_hash, validate_timestamp, ApiAuthError};
use gplan_common::api::AuthRequest;
use serde_json::Value;
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

/// Largest request body accepted for hash validation
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Authentication middleware
///
/// Applied to protected routes only; `/health` and `/api/buildinfo` are public.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // secret = 0 disables all checking
    if state.shared_secret == 0 {
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read body: {}", e)))?;

    let json_value: Value = serde_json::from_slice(&body_bytes)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON: {}", e)))?;

    let auth_fields: AuthRequest = serde_json::from_value(json_value.clone())
        .map_err(|e| ApiError::Unauthorized(format!("Missing auth fields: {}", e)))?;

    validate_timestamp(auth_fields.timestamp).map_err(|e| match e {
        ApiAuthError::InvalidTimestamp { reason, .. } => {
            ApiError::Unauthorized(format!("Invalid timestamp: {}", reason))
        }
        other => ApiError::Internal(other.to_string()),
    })?;

    validate_hash(&auth_fields.hash, &json_value, state.shared_secret).map_err(|e| match e {
        ApiAuthError::InvalidHash { provided, calculated } => {
            warn!(
                "Hash validation failed: provided={}, calculated={}",
                provided, calculated
            );
            ApiError::Unauthorized("Invalid hash".to_string())
        }
        other => ApiError::Internal(other.to_string()),
    })?;

    let request = Request::from_parts(parts, Body::from(body_bytes));
    Ok(next.run(request).await)
}
