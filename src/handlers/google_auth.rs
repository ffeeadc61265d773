use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Json, Redirect},
};
use chrono::{DateTime, Utc};
use google::oauth::{authorization_url, decode_state, encode_state};
use google::{DriveFile, GoogleError};
use model::entities::connected_account;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiPath, ValidatedJson, ValidatedQuery};
use crate::schemas::{ApiResponse, AppState};
use crate::services::credentials::{find_owned_account, run_with_account};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthorizationUrlResponse {
    /// Google consent screen to open in the browser
    pub url: String,
}

/// A connected mailbox. Tokens are never exposed.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedAccountResponse {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub is_active: bool,
    pub token_expiry: Option<DateTime<Utc>>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<connected_account::Model> for ConnectedAccountResponse {
    fn from(model: connected_account::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            name: model.name,
            picture: model.picture,
            is_active: model.is_active,
            token_expiry: model.token_expiry,
            last_synced_at: model.last_synced_at,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DriveFileResponse {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub thumbnail_link: Option<String>,
    pub modified_time: Option<String>,
}

impl From<DriveFile> for DriveFileResponse {
    fn from(file: DriveFile) -> Self {
        Self {
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
            thumbnail_link: file.thumbnail_link,
            modified_time: file.modified_time,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by Google when consent was denied
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct FilesQuery {
    pub folder_id: Option<String>,
}

/// Mailbox fields the owner may change; the address itself comes from Google.
#[derive(Debug, Default, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub name: Option<String>,
    pub is_active: Option<bool>,
}

fn consent_url(state: &AppState, user_id: Uuid) -> ApiResult<String> {
    let signed = encode_state(user_id, state.settings.jwt_secret.as_bytes(), Utc::now())?;
    Ok(authorization_url(&state.settings.oauth_config(), &signed))
}

fn error_redirect(state: &AppState, message: &str) -> Redirect {
    let encoded: String = url::form_urlencoded::byte_serialize(message.as_bytes()).collect();
    Redirect::to(&format!("{}error?message={}", state.settings.frontend_base_url, encoded))
}

/// Start connecting a Google account
#[utoipa::path(
    post,
    path = "/api/v1/google-auth/connect",
    tag = "google-auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Consent URL created", body = ApiResponse<AuthorizationUrlResponse>),
        (status = 401, description = "Missing token", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn connect_account(
    State(state): State<AppState>,
    principal: AuthUser,
) -> ApiResult<Json<ApiResponse<AuthorizationUrlResponse>>> {
    trace!("Entering connect_account function");
    let url = consent_url(&state, principal.id())?;
    debug!("Issued consent URL for user {}", principal.id());
    Ok(Json(ApiResponse::ok(AuthorizationUrlResponse { url }, "Authorization URL created")))
}

/// Creates or refreshes the account for the consenting user.
async fn complete_connection(
    state: &AppState,
    code: Option<String>,
    signed_state: Option<String>,
) -> ApiResult<connected_account::Model> {
    let code = code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::Validation("Authorization code missing".to_string()))?;
    let signed_state = signed_state
        .ok_or_else(|| ApiError::Upstream(GoogleError::InvalidState("state missing".to_string())))?;

    let now = Utc::now();
    let owner = decode_state(&signed_state, state.settings.jwt_secret.as_bytes(), now)?;
    let tokens = state.google.exchange_code(&code).await?;
    let profile = state.google.fetch_user_info(&tokens.access_token).await?;
    debug!("Google account {} consented for user {}", profile.email, owner);

    let existing = connected_account::Entity::find()
        .filter(connected_account::Column::Email.eq(profile.email.as_str()))
        .filter(connected_account::Column::CreatedBy.eq(owner))
        .filter(connected_account::Column::DeletedAt.is_null())
        .one(&state.db)
        .await?;

    let account = match existing {
        Some(account) => {
            let previous_refresh = account.refresh_token.clone();
            let mut active = account.into_active_model();
            active.name = Set(profile.display_name());
            active.picture = Set(profile.picture.clone());
            active.access_token = Set(Some(tokens.access_token.clone()));
            active.refresh_token = Set(tokens.refresh_token.clone().or(previous_refresh));
            active.token_expiry = Set(tokens.expires_at(now));
            active.is_active = Set(true);
            active.last_synced_at = Set(Some(now));
            active.update(&state.db).await?
        }
        None => {
            connected_account::ActiveModel {
                email: Set(profile.email.clone()),
                name: Set(profile.display_name()),
                picture: Set(profile.picture.clone()),
                access_token: Set(Some(tokens.access_token.clone())),
                refresh_token: Set(tokens.refresh_token.clone()),
                token_expiry: Set(tokens.expires_at(now)),
                is_active: Set(true),
                last_synced_at: Set(Some(now)),
                created_by: Set(owner),
                ..Default::default()
            }
            .insert(&state.db)
            .await?
        }
    };
    Ok(account)
}

/// OAuth redirect target
///
/// Always answers with a browser redirect, to the accounts page on success
/// and to the frontend error page otherwise.
#[utoipa::path(
    get,
    path = "/api/v1/google-auth/callback",
    tag = "google-auth",
    params(CallbackQuery),
    responses(
        (status = 303, description = "Redirect to the frontend")
    )
)]
#[instrument(skip(state, query))]
pub async fn oauth_callback(State(state): State<AppState>, Query(query): Query<CallbackQuery>) -> Redirect {
    trace!("Entering oauth_callback function");
    if let Some(denied) = query.error {
        warn!("Google consent denied: {}", denied);
        return error_redirect(&state, &format!("Google authorization failed: {denied}"));
    }

    match complete_connection(&state, query.code, query.state).await {
        Ok(account) => {
            info!("Connected account {} ({}) for user {}", account.id, account.email, account.created_by);
            Redirect::to(&format!("{}admin/email-accounts", state.settings.frontend_base_url))
        }
        Err(e) => {
            error!("Google callback failed: {}", e);
            error_redirect(&state, &e.to_string())
        }
    }
}

/// List the caller's connected accounts
#[utoipa::path(
    get,
    path = "/api/v1/google-auth/accounts",
    tag = "google-auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Accounts retrieved", body = ApiResponse<Vec<ConnectedAccountResponse>>)
    )
)]
#[instrument(skip(state))]
pub async fn list_accounts(
    State(state): State<AppState>,
    principal: AuthUser,
) -> ApiResult<Json<ApiResponse<Vec<ConnectedAccountResponse>>>> {
    trace!("Entering list_accounts function");
    let accounts = connected_account::Entity::find()
        .filter(connected_account::Column::CreatedBy.eq(principal.id()))
        .filter(connected_account::Column::DeletedAt.is_null())
        .order_by_desc(connected_account::Column::CreatedAt)
        .all(&state.db)
        .await?;
    debug!("Retrieved {} accounts for user {}", accounts.len(), principal.id());
    Ok(Json(ApiResponse::ok(
        accounts.into_iter().map(ConnectedAccountResponse::from).collect(),
        "Email accounts retrieved successfully",
    )))
}

/// Get one connected account
#[utoipa::path(
    get,
    path = "/api/v1/google-auth/accounts/{account_id}",
    tag = "google-auth",
    params(("account_id" = Uuid, Path, description = "Connected account ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Account retrieved", body = ApiResponse<ConnectedAccountResponse>),
        (status = 404, description = "Account not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_account(
    ApiPath(account_id): ApiPath<Uuid>,
    State(state): State<AppState>,
    principal: AuthUser,
) -> ApiResult<Json<ApiResponse<ConnectedAccountResponse>>> {
    trace!("Entering get_account function");
    let account = find_owned_account(&state.db, principal.id(), account_id).await?;
    Ok(Json(ApiResponse::ok(
        ConnectedAccountResponse::from(account),
        "Email account retrieved successfully",
    )))
}

/// Rename or pause a connected account
#[utoipa::path(
    put,
    path = "/api/v1/google-auth/accounts/{account_id}",
    tag = "google-auth",
    params(("account_id" = Uuid, Path, description = "Connected account ID")),
    request_body = UpdateAccountRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Account updated", body = ApiResponse<ConnectedAccountResponse>),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_account(
    ApiPath(account_id): ApiPath<Uuid>,
    State(state): State<AppState>,
    principal: AuthUser,
    ValidatedJson(request): ValidatedJson<UpdateAccountRequest>,
) -> ApiResult<Json<ApiResponse<ConnectedAccountResponse>>> {
    trace!("Entering update_account function");
    let account = find_owned_account(&state.db, principal.id(), account_id).await?;

    let mut active = account.into_active_model();
    if let Some(name) = request.name {
        active.name = Set(Some(name));
    }
    if let Some(is_active) = request.is_active {
        active.is_active = Set(is_active);
    }
    let updated = active.update(&state.db).await?;
    info!("Updated account {}", account_id);
    Ok(Json(ApiResponse::ok(
        ConnectedAccountResponse::from(updated),
        "Email account updated successfully",
    )))
}

/// Disconnect an account
#[utoipa::path(
    delete,
    path = "/api/v1/google-auth/accounts/{account_id}",
    tag = "google-auth",
    params(("account_id" = Uuid, Path, description = "Connected account ID")),
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Account disconnected"),
        (status = 404, description = "Account not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn disconnect_account(
    ApiPath(account_id): ApiPath<Uuid>,
    State(state): State<AppState>,
    principal: AuthUser,
) -> ApiResult<StatusCode> {
    trace!("Entering disconnect_account function");
    let account = find_owned_account(&state.db, principal.id(), account_id).await?;

    let mut active = account.into_active_model();
    active.deleted_at = Set(Some(Utc::now()));
    active.is_active = Set(false);
    active.access_token = Set(None);
    active.refresh_token = Set(None);
    active.update(&state.db).await?;
    info!("Disconnected account {}", account_id);
    Ok(StatusCode::NO_CONTENT)
}

/// List a Drive folder through a connected account
#[utoipa::path(
    get,
    path = "/api/v1/google-auth/accounts/{account_id}/files",
    tag = "google-auth",
    params(("account_id" = Uuid, Path, description = "Connected account ID"), FilesQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Files retrieved", body = ApiResponse<Vec<DriveFileResponse>>),
        (status = 400, description = "folderId missing", body = ErrorResponse),
        (status = 401, description = "Reauthentication required", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn list_drive_files(
    ApiPath(account_id): ApiPath<Uuid>,
    State(state): State<AppState>,
    principal: AuthUser,
    ValidatedQuery(query): ValidatedQuery<FilesQuery>,
) -> ApiResult<Json<ApiResponse<Vec<DriveFileResponse>>>> {
    trace!("Entering list_drive_files function");
    let folder_id = query
        .folder_id
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("folderId is required".to_string()))?;
    let account = find_owned_account(&state.db, principal.id(), account_id).await?;

    let google = state.google.as_ref();
    let folder = folder_id.as_str();
    let files = run_with_account(&state, &account, |token| async move {
        google.list_drive_files(&token, folder).await
    })
    .await?;
    debug!("Listed {} entries of folder {}", files.len(), folder_id);

    Ok(Json(ApiResponse::ok(
        files.into_iter().map(DriveFileResponse::from).collect(),
        "Files retrieved successfully",
    )))
}

/// Get a fresh consent URL for an existing account
#[utoipa::path(
    post,
    path = "/api/v1/google-auth/accounts/{account_id}/reauthenticate",
    tag = "google-auth",
    params(("account_id" = Uuid, Path, description = "Connected account ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Consent URL created", body = ApiResponse<AuthorizationUrlResponse>),
        (status = 404, description = "Account not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn reauthenticate_account(
    ApiPath(account_id): ApiPath<Uuid>,
    State(state): State<AppState>,
    principal: AuthUser,
) -> ApiResult<Json<ApiResponse<AuthorizationUrlResponse>>> {
    trace!("Entering reauthenticate_account function");
    let account = find_owned_account(&state.db, principal.id(), account_id).await?;
    let url = consent_url(&state, principal.id())?;
    info!("Issued reauthentication URL for account {}", account.email);
    Ok(Json(ApiResponse::ok(AuthorizationUrlResponse { url }, "Authorization URL created")))
}
