use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use url::Url;
use uuid::Uuid;

use crate::{GoogleError, Result};

pub const AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

pub const SCOPES: [&str; 6] = [
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/userinfo.profile",
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/spreadsheets",
];

/// How long a consent redirect may take before its state is refused.
pub const STATE_MAX_AGE_SECS: i64 = 600;

type HmacSha256 = Hmac<Sha256>;

/// OAuth client registration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Consent URL asking for offline access to every scope in [`SCOPES`].
pub fn authorization_url(config: &OAuthConfig, state: &str) -> String {
    let scope = SCOPES.join(" ");
    let params = [
        ("client_id", config.client_id.as_str()),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("response_type", "code"),
        ("scope", scope.as_str()),
        ("access_type", "offline"),
        ("prompt", "consent"),
        ("include_granted_scopes", "true"),
        ("state", state),
    ];
    match Url::parse_with_params(AUTHORIZATION_ENDPOINT, &params) {
        Ok(url) => url.into(),
        // The endpoint is a constant, so parsing cannot fail
        Err(_) => AUTHORIZATION_ENDPOINT.to_string(),
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatePayload {
    user_id: Uuid,
    issued_at: i64,
}

fn sign(payload: &str, secret: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| GoogleError::InvalidState(e.to_string()))?;
    mac.update(payload.as_bytes());
    Ok(mac)
}

/// Opaque `payload.signature` blob carrying the initiating user through the
/// consent redirect.
pub fn encode_state(user_id: Uuid, secret: &[u8], now: DateTime<Utc>) -> Result<String> {
    let payload = StatePayload {
        user_id,
        issued_at: now.timestamp(),
    };
    let json = serde_json::to_vec(&payload).map_err(|e| GoogleError::InvalidState(e.to_string()))?;
    let encoded = URL_SAFE_NO_PAD.encode(json);
    let signature = sign(&encoded, secret)?.finalize().into_bytes();
    Ok(format!("{encoded}.{}", URL_SAFE_NO_PAD.encode(signature)))
}

/// Recovers the user id from a state blob, checking signature and age.
pub fn decode_state(state: &str, secret: &[u8], now: DateTime<Utc>) -> Result<Uuid> {
    let (encoded, signature) = state
        .split_once('.')
        .ok_or_else(|| GoogleError::InvalidState("missing signature".to_string()))?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| GoogleError::InvalidState("malformed signature".to_string()))?;
    sign(encoded, secret)?
        .verify_slice(&signature)
        .map_err(|_| GoogleError::InvalidState("signature mismatch".to_string()))?;

    let json = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| GoogleError::InvalidState("malformed payload".to_string()))?;
    let payload: StatePayload =
        serde_json::from_slice(&json).map_err(|e| GoogleError::InvalidState(e.to_string()))?;

    let age = now.timestamp() - payload.issued_at;
    if !(0..=STATE_MAX_AGE_SECS).contains(&age) {
        return Err(GoogleError::InvalidState("state expired".to_string()));
    }
    Ok(payload.user_id)
}
