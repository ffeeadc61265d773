//! Bearer-token authentication.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use model::entities::user::{self, Role};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::schemas::AppState;

/// Claims carried by every issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_token(user: &user::Model, secret: &str, expiry_hours: i64) -> ApiResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id,
        id: user.id,
        email: user.email.clone(),
        role: user.role,
        iat: now.timestamp(),
        exp: (now + Duration::hours(expiry_hours)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("Failed to sign token: {e}")))
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

/// The authenticated principal of a request.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.0.id
    }

    /// Exact match; a superadmin does not pass an admin check by rank.
    pub fn require_role(&self, role: Role) -> ApiResult<()> {
        if self.0.role == role {
            Ok(())
        } else {
            warn!("User {} with role {} denied, {} required", self.0.id, self.0.role, role);
            Err(ApiError::Forbidden("Access denied".to_string()))
        }
    }

    /// Passes for the user themself or a superadmin.
    pub fn require_self_or(&self, user_id: Uuid, role: Role) -> ApiResult<()> {
        if self.0.id == user_id {
            Ok(())
        } else {
            self.require_role(role)
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Authorization token required".to_string()))?;

        match decode_token(token, &state.settings.jwt_secret) {
            Ok(claims) => {
                debug!("Authenticated user {}", claims.id);
                Ok(AuthUser(claims))
            }
            Err(e) => {
                warn!("Rejected bearer token: {}", e);
                Err(ApiError::Forbidden("Invalid or expired token".to_string()))
            }
        }
    }
}
