//! Admin request authentication via timestamp and hash validation
//!
//! Every reconciliation routine is admin-only. Requests prove possession of
//! the shared secret without sending it:
//!
//! - The JSON body includes `timestamp` (i64 Unix epoch ms) and `hash` (SHA-256)
//! - Timestamp must be within 30s past and 1s future of server time
//! - Hash is calculated from canonical JSON + shared secret
//! - Shared secret is stored in the `settings` table
//! - A shared secret of 0 disables checking (local development)
//!
//! # Pure Functions
//!
//! This module contains ONLY pure functions and database operations.
//! No HTTP framework dependencies - those live in the service crate.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(feature = "sqlx")]
use sqlx::SqlitePool;

/// Settings key holding the shared secret
pub const SHARED_SECRET_KEY: &str = "api_shared_secret";

/// Oldest acceptable request timestamp, relative to now
pub const MAX_PAST_MS: i64 = 30_000;

/// Furthest acceptable future timestamp (clock drift only)
pub const MAX_FUTURE_MS: i64 = 1_000;

const DUMMY_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Authentication error types
#[derive(Debug, Clone)]
pub enum ApiAuthError {
    /// Timestamp outside acceptable window
    InvalidTimestamp {
        timestamp: i64,
        now: i64,
        reason: String,
    },

    /// Hash does not match calculated value
    InvalidHash { provided: String, calculated: String },

    /// Database error loading shared secret
    DatabaseError(String),

    /// Failed to parse request body
    ParseError(String),
}

impl std::fmt::Display for ApiAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiAuthError::InvalidTimestamp { reason, .. } => {
                write!(f, "Invalid timestamp: {}", reason)
            }
            ApiAuthError::InvalidHash { .. } => write!(f, "Invalid hash"),
            ApiAuthError::DatabaseError(err) => write!(f, "Database error: {}", err),
            ApiAuthError::ParseError(err) => write!(f, "Parse error: {}", err),
        }
    }
}

impl std::error::Error for ApiAuthError {}

// ========================================
// Shared Secret Management
// ========================================

/// Load shared secret from database settings, creating one if absent
///
/// Special value 0 disables auth checking.
#[cfg(feature = "sqlx")]
pub async fn load_shared_secret(db: &SqlitePool) -> Result<i64, ApiAuthError> {
    let result: Option<(Option<String>,)> =
        sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(SHARED_SECRET_KEY)
            .fetch_optional(db)
            .await
            .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    match result {
        Some((Some(value),)) => value
            .trim()
            .parse::<i64>()
            .map_err(|e| ApiAuthError::DatabaseError(format!("Invalid i64: {}", e))),
        _ => initialize_shared_secret(db).await,
    }
}

/// Generate and store a random non-zero shared secret
#[cfg(feature = "sqlx")]
pub async fn initialize_shared_secret(db: &SqlitePool) -> Result<i64, ApiAuthError> {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    let secret: i64 = loop {
        let val = rng.gen::<i64>();
        if val != 0 {
            break val;
        }
    };

    store_shared_secret(db, secret).await?;

    Ok(secret)
}

/// Overwrite the shared secret (0 disables auth)
#[cfg(feature = "sqlx")]
pub async fn store_shared_secret(db: &SqlitePool, secret: i64) -> Result<(), ApiAuthError> {
    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(SHARED_SECRET_KEY)
        .bind(secret.to_string())
        .execute(db)
        .await
        .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    Ok(())
}

// ========================================
// Timestamp Validation
// ========================================

/// Current Unix time in milliseconds
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Validate timestamp against the acceptance window
///
/// # Examples
///
/// ```
/// use gplan_common::api::auth::{now_millis, validate_timestamp};
///
/// let now = now_millis();
/// assert!(validate_timestamp(now).is_ok());
/// assert!(validate_timestamp(now - 5_000).is_ok());
/// assert!(validate_timestamp(now - 120_000).is_err());
/// ```
pub fn validate_timestamp(timestamp: i64) -> Result<(), ApiAuthError> {
    let now = now_millis();
    let diff = now - timestamp;

    if diff > MAX_PAST_MS {
        return Err(ApiAuthError::InvalidTimestamp {
            timestamp,
            now,
            reason: format!("Timestamp {}ms too old (max {}ms past)", diff, MAX_PAST_MS),
        });
    }

    if diff < -MAX_FUTURE_MS {
        return Err(ApiAuthError::InvalidTimestamp {
            timestamp,
            now,
            reason: format!(
                "Timestamp {}ms in future (max {}ms future)",
                diff.abs(),
                MAX_FUTURE_MS
            ),
        });
    }

    Ok(())
}

// ========================================
// Hash Calculation and Validation
// ========================================

/// Calculate the request hash
///
/// # Algorithm
///
/// 1. Replace hash field with dummy hash (64 zeros)
/// 2. Convert to canonical JSON (sorted keys, no whitespace)
/// 3. Append shared secret as decimal i64 string
/// 4. Calculate SHA-256 of concatenated string
/// 5. Return as 64 hex characters
///
/// # Examples
///
/// ```
/// use gplan_common::api::auth::calculate_hash;
/// use serde_json::json;
///
/// let json = json!({
///     "plant_type_id": "tomato",
///     "timestamp": 1730000000000i64,
///     "hash": "dummy"
/// });
///
/// let hash = calculate_hash(&json, 123456789);
/// assert_eq!(hash.len(), 64);
/// ```
pub fn calculate_hash(json_value: &Value, shared_secret: i64) -> String {
    let mut value = json_value.clone();
    if let Some(obj) = value.as_object_mut() {
        obj.insert("hash".to_string(), Value::String(DUMMY_HASH.to_string()));
    }

    let canonical = to_canonical_json(&value);
    let to_hash = format!("{}{}", canonical, shared_secret);

    let mut hasher = Sha256::new();
    hasher.update(to_hash.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Convert JSON to canonical form (sorted keys, no whitespace)
///
/// # Examples
///
/// ```
/// use gplan_common::api::auth::to_canonical_json;
/// use serde_json::json;
///
/// let canonical = to_canonical_json(&json!({"z": 3, "a": 1}));
/// assert_eq!(canonical, "{\"a\":1,\"z\":3}");
/// ```
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let items: Vec<String> = pairs
                .into_iter()
                .map(|(k, v)| format!("\"{}\":{}", k, to_canonical_json(v)))
                .collect();
            format!("{{{}}}", items.join(","))
        }
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
    }
}

/// Validate hash matches calculated value
pub fn validate_hash(
    provided_hash: &str,
    json_value: &Value,
    shared_secret: i64,
) -> Result<(), ApiAuthError> {
    let calculated = calculate_hash(json_value, shared_secret);

    if provided_hash != calculated {
        return Err(ApiAuthError::InvalidHash {
            provided: provided_hash.to_string(),
            calculated,
        });
    }

    Ok(())
}

/// Stamp a request body with a current timestamp and matching hash
///
/// Used by admin tooling and tests to build authenticated requests.
pub fn sign_request(body: &mut Value, shared_secret: i64) {
    if let Some(obj) = body.as_object_mut() {
        obj.insert("timestamp".to_string(), Value::from(now_millis()));
        obj.insert("hash".to_string(), Value::String(DUMMY_HASH.to_string()));
    }
    let hash = calculate_hash(body, shared_secret);
    if let Some(obj) = body.as_object_mut() {
        obj.insert("hash".to_string(), Value::String(hash));
    }
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_timestamp_accepted() {
        let now = now_millis();
        assert!(validate_timestamp(now).is_ok());
        assert!(validate_timestamp(now - 10_000).is_ok());
    }

    #[test]
    fn test_timestamp_too_old_rejected() {
        let now = now_millis();
        assert!(validate_timestamp(now - MAX_PAST_MS - 1_000).is_err());
    }

    #[test]
    fn test_timestamp_future_rejected() {
        let now = now_millis();
        assert!(validate_timestamp(now + MAX_FUTURE_MS + 5_000).is_err());
    }

    #[test]
    fn test_hash_calculation_algorithm() {
        let json = json!({
            "plant_type_id": "t1",
            "timestamp": 1730000000000i64,
            "hash": DUMMY_HASH
        });

        let hash = calculate_hash(&json, 123456789);
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, calculate_hash(&json, 123456789));
        assert_ne!(hash, calculate_hash(&json, 987654321));
    }

    #[test]
    fn test_hash_ignores_provided_hash_value() {
        let a = json!({"timestamp": 1, "hash": "one"});
        let b = json!({"timestamp": 1, "hash": "two"});
        assert_eq!(calculate_hash(&a, 42), calculate_hash(&b, 42));
    }

    #[test]
    fn test_canonical_json_sorting_nested() {
        let json = json!({"z": {"b": 1, "a": [true, null]}, "a": "x"});
        assert_eq!(to_canonical_json(&json), r#"{"a":"x","z":{"a":[true,null],"b":1}}"#);
    }

    #[test]
    fn test_signed_request_validates() {
        let mut body = json!({"dry_run": true});
        sign_request(&mut body, 555);

        let hash = body["hash"].as_str().unwrap().to_string();
        assert!(validate_hash(&hash, &body, 555).is_ok());
        assert!(validate_hash(&hash, &body, 556).is_err());
        assert!(validate_timestamp(body["timestamp"].as_i64().unwrap()).is_ok());
    }
}
