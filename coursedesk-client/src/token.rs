//! Access-token claims decoding
//!
//! The client never verifies signatures; that is the server's job. It only
//! reads the payload segment of the JWT to learn who is signed in and when
//! the token runs out.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use shared::serde_util::opt_string_or_number;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("expected 3 dot-separated segments, found {0}")]
    Segments(usize),

    #[error("payload is not valid base64url")]
    Encoding,

    #[error("malformed claims: {0}")]
    Claims(String),
}

/// Claims the client cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub user_id: Option<String>,
    pub role_name: Option<String>,
    pub role_id: Option<String>,
    pub full_name: Option<String>,
    /// Expiry, Unix seconds
    pub exp: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawClaims {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    user_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    sub: Option<String>,
    #[serde(default)]
    role_name: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    role_id: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(deserialize_with = "unix_timestamp")]
    exp: i64,
}

fn unix_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| serde::de::Error::custom("exp out of range")),
        other => Err(serde::de::Error::custom(format!(
            "exp must be a numeric timestamp, got {other}"
        ))),
    }
}

/// Decode the claims of a JWT without verifying it
pub fn decode_claims(token: &str) -> Result<TokenClaims, TokenError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(TokenError::Segments(parts.len()));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|_| TokenError::Encoding)?;

    let raw: RawClaims =
        serde_json::from_slice(&payload).map_err(|e| TokenError::Claims(e.to_string()))?;

    Ok(TokenClaims {
        user_id: raw.user_id.or(raw.sub),
        role_name: raw.role_name,
        role_id: raw.role_id,
        full_name: raw.full_name,
        exp: raw.exp,
    })
}

impl TokenClaims {
    /// Seconds until expiry (negative once expired)
    pub fn expires_in(&self, now_secs: i64) -> i64 {
        self.exp - now_secs
    }

    pub fn is_expired(&self, now_secs: i64) -> bool {
        self.exp <= now_secs
    }

    /// True when less than `threshold` of lifetime remains
    pub fn needs_refresh(&self, now_secs: i64, threshold: Duration) -> bool {
        self.expires_in(now_secs) < threshold.as_secs() as i64
    }
}

/// Outcome of checking a token during periodic validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    Valid { expires_in: i64 },
    RefreshDue { expires_in: i64 },
    Invalid(TokenError),
}

/// Classify `token` against the refresh threshold
pub fn assess(token: &str, now_secs: i64, threshold: Duration) -> TokenStatus {
    match decode_claims(token) {
        Ok(claims) if claims.needs_refresh(now_secs, threshold) => TokenStatus::RefreshDue {
            expires_in: claims.expires_in(now_secs),
        },
        Ok(claims) => TokenStatus::Valid {
            expires_in: claims.expires_in(now_secs),
        },
        Err(e) => TokenStatus::Invalid(e),
    }
}
