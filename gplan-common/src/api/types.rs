//! Shared API request/response types
//!
//! Types used by GardenPlan admin endpoints for authentication.

use serde::{Deserialize, Serialize};

/// Authentication fields every admin request body carries
///
/// Routine-specific fields sit alongside these in the same JSON object;
/// the hash covers the whole object.
///
/// # Examples
///
/// ```
/// use gplan_common::api::types::AuthRequest;
///
/// let request = AuthRequest {
///     timestamp: 1730000000000,
///     hash: "abc123...".to_string(),
/// };
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthRequest {
    /// Unix epoch time in milliseconds
    pub timestamp: i64,

    /// SHA-256 hash (64 hex chars)
    pub hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_request_ignores_routine_fields() {
        let json = r#"{"timestamp": 1730000000000, "hash": "abc123", "plant_type_id": "t1"}"#;
        let request: AuthRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.timestamp, 1730000000000);
        assert_eq!(request.hash, "abc123");
    }
}
