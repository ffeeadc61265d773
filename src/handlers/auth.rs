use axum::{
    extract::State,
    http::StatusCode,
    response::{Json, Redirect},
};
use model::entities::user::{self, Role};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use url::Url;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::issue_token;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ValidatedJson, ValidatedQuery};
use crate::handlers::users::{UserResponse, ensure_unique};
use crate::hasher::{generate_token, hash_password, verify_password};
use crate::mail::verification_mail;
use crate::schemas::{ApiResponse, AppState};

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct SignupRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 4, message = "username must be at least 4 characters"))]
    pub username: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct SigninRequest {
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub user: UserResponse,
    pub verification_email_sent: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SigninResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
pub struct VerifyEmailQuery {
    pub token: String,
    pub email: String,
}

fn verification_url(backend_api_url: &str, token: &str, email: &str) -> ApiResult<String> {
    Url::parse_with_params(
        &format!("{backend_api_url}auth/verify-email"),
        &[("token", token), ("email", email)],
    )
    .map(String::from)
    .map_err(|e| ApiError::Internal(format!("Invalid backend URL: {e}")))
}

/// Register a new account
///
/// The account stays inactive until the emailed link is opened.
#[utoipa::path(
    post,
    path = "/api/v1/auth/signup",
    tag = "auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User registered", body = ApiResponse<SignupResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Email or username taken", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn signup(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<SignupRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<SignupResponse>>)> {
    trace!("Entering signup function");
    ensure_unique(&state.db, Some(&request.email), Some(&request.username), None).await?;

    let token = generate_token();
    let new_user = user::ActiveModel {
        name: Set(request.name),
        email: Set(request.email),
        username: Set(request.username),
        password_hash: Set(hash_password(request.password).await?),
        role: Set(Role::User),
        is_active: Set(false),
        verification_token: Set(Some(token.clone())),
        ..Default::default()
    };
    let user_model = new_user
        .insert(&state.db)
        .await
        .map_err(|e| ApiError::unique_violation(e, "EMAIL_ALREADY_EXISTS", "Email or username already taken"))?;
    info!("Registered user {} ({})", user_model.id, user_model.username);

    let url = verification_url(&state.settings.backend_api_url, &token, &user_model.email)?;
    let mail = verification_mail(&user_model.email, &user_model.name, &url);
    let verification_email_sent = match state.mailer.send(mail).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Verification mail to {} failed: {}", user_model.email, e);
            false
        }
    };

    let response = SignupResponse {
        user: UserResponse::from(user_model),
        verification_email_sent,
    };
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            response,
            "User registered. Please check your email to verify your account.",
        )),
    ))
}

/// Confirm an email address and activate the account
#[utoipa::path(
    get,
    path = "/api/v1/auth/verify-email",
    tag = "auth",
    params(VerifyEmailQuery),
    responses(
        (status = 303, description = "Redirect to the frontend login page"),
        (status = 400, description = "Invalid or expired verification link", body = ErrorResponse)
    )
)]
#[instrument(skip(state, query), fields(email = %query.email))]
pub async fn verify_email(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<VerifyEmailQuery>,
) -> ApiResult<Redirect> {
    trace!("Entering verify_email function");
    let pending = user::Entity::find()
        .filter(user::Column::Email.eq(query.email.as_str()))
        .filter(user::Column::VerificationToken.eq(query.token.as_str()))
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::Validation("Invalid or expired verification link".to_string()))?;

    let mut active = pending.into_active_model();
    active.is_active = Set(true);
    active.verification_token = Set(None);
    let verified = active.update(&state.db).await?;
    info!("Verified email of user {}", verified.id);

    Ok(Redirect::to(&format!("{}login", state.settings.frontend_base_url)))
}

/// Sign in and receive a bearer token
#[utoipa::path(
    post,
    path = "/api/v1/auth/signin",
    tag = "auth",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Signed in", body = ApiResponse<SigninResponse>),
        (status = 401, description = "Invalid email or password", body = ErrorResponse),
        (status = 403, description = "Email not verified or account deactivated", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn signin(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<SigninRequest>,
) -> ApiResult<Json<ApiResponse<SigninResponse>>> {
    trace!("Entering signin function");
    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user_model = user::Entity::find()
        .filter(user::Column::Email.eq(request.email.as_str()))
        .one(&state.db)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(request.password, user_model.password_hash.clone()).await? {
        debug!("Password mismatch for user {}", user_model.id);
        return Err(invalid());
    }
    if !user_model.is_active {
        return Err(ApiError::Forbidden(
            "Account is not active. Please verify your email.".to_string(),
        ));
    }

    let token = issue_token(
        &user_model,
        &state.settings.jwt_secret,
        state.settings.jwt_expiry_hours,
    )?;
    info!("User {} signed in", user_model.id);
    Ok(Json(ApiResponse::ok(
        SigninResponse {
            token,
            user: UserResponse::from(user_model),
        },
        "Signed in successfully",
    )))
}
