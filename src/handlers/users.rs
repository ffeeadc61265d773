use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use common::{DEFAULT_PAGE_SIZE, PageRequest, Pagination};
use model::entities::user::{self, Role};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiPath, ValidatedJson, ValidatedQuery};
use crate::hasher::hash_password;
use crate::schemas::{ApiResponse, AppState};

/// Request body for creating a user as a superadmin
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    /// Username (must be unique)
    #[validate(length(min = 4, message = "username must be at least 4 characters"))]
    pub username: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
    /// Defaults to `admin`
    #[schema(value_type = Option<String>)]
    pub role: Option<Role>,
}

/// Request body for updating a user
#[derive(Debug, Default, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
    #[validate(length(min = 4, message = "username must be at least 4 characters"))]
    pub username: Option<String>,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: Option<String>,
    /// Superadmin only
    #[schema(value_type = Option<String>)]
    pub role: Option<Role>,
    /// Superadmin only
    pub is_active: Option<bool>,
}

/// User response model
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub username: String,
    #[schema(value_type = String)]
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            username: model.username,
            role: model.role,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Rejects an email or username already held by another user.
pub(crate) async fn ensure_unique(
    db: &DatabaseConnection,
    email: Option<&str>,
    username: Option<&str>,
    except: Option<Uuid>,
) -> ApiResult<()> {
    if let Some(email) = email {
        let mut query = user::Entity::find().filter(user::Column::Email.eq(email));
        if let Some(id) = except {
            query = query.filter(user::Column::Id.ne(id));
        }
        if query.one(db).await?.is_some() {
            return Err(ApiError::conflict("EMAIL_ALREADY_EXISTS", "Email already registered"));
        }
    }
    if let Some(username) = username {
        let mut query = user::Entity::find().filter(user::Column::Username.eq(username));
        if let Some(id) = except {
            query = query.filter(user::Column::Id.ne(id));
        }
        if query.one(db).await?.is_some() {
            return Err(ApiError::conflict("USERNAME_ALREADY_EXISTS", "Username already taken"));
        }
    }
    Ok(())
}

async fn find_user(db: &DatabaseConnection, user_id: Uuid) -> ApiResult<user::Model> {
    user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| {
            warn!("User with ID {} not found", user_id);
            ApiError::NotFound("User not found".to_string())
        })
}

/// Create a new user
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "users",
    request_body = CreateUserRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "User created successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Superadmin role required", body = ErrorResponse),
        (status = 409, description = "Email or username taken", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(username = %request.username))]
pub async fn create_user(
    State(state): State<AppState>,
    principal: AuthUser,
    ValidatedJson(request): ValidatedJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<UserResponse>>)> {
    trace!("Entering create_user function");
    principal.require_role(Role::Superadmin)?;
    ensure_unique(&state.db, Some(&request.email), Some(&request.username), None).await?;

    let new_user = user::ActiveModel {
        name: Set(request.name),
        email: Set(request.email),
        username: Set(request.username.clone()),
        password_hash: Set(hash_password(request.password).await?),
        role: Set(request.role.unwrap_or(Role::Admin)),
        is_active: Set(true),
        verification_token: Set(None),
        ..Default::default()
    };

    let user_model = new_user
        .insert(&state.db)
        .await
        .map_err(|e| ApiError::unique_violation(e, "USERNAME_ALREADY_EXISTS", "Email or username already taken"))?;
    info!("User created successfully with ID: {}, username: {}", user_model.id, user_model.username);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(UserResponse::from(user_model), "User created successfully")),
    ))
}

/// List active users and admins
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    params(ListQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Users retrieved successfully", body = ApiResponse<UserListResponse>),
        (status = 403, description = "Superadmin role required", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_users(
    State(state): State<AppState>,
    principal: AuthUser,
    ValidatedQuery(query): ValidatedQuery<ListQuery>,
) -> ApiResult<Json<ApiResponse<UserListResponse>>> {
    trace!("Entering get_users function");
    principal.require_role(Role::Superadmin)?;

    let page = PageRequest::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
    let paginator = user::Entity::find()
        .filter(user::Column::IsActive.eq(true))
        .filter(user::Column::Role.is_in([Role::User, Role::Admin]))
        .order_by_desc(user::Column::CreatedAt)
        .paginate(&state.db, page.page_size);
    let total = paginator.num_items().await?;
    let users = paginator.fetch_page(page.index()).await?;
    debug!("Retrieved {} of {} users", users.len(), total);

    Ok(Json(ApiResponse::ok(
        UserListResponse {
            users: users.into_iter().map(UserResponse::from).collect(),
            pagination: Pagination::new(page, total),
        },
        "Users retrieved successfully",
    )))
}

/// Get a specific user by ID
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = Uuid, Path, description = "User ID"),
    ),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User retrieved successfully", body = ApiResponse<UserResponse>),
        (status = 403, description = "Not the user or a superadmin", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_user(
    ApiPath(user_id): ApiPath<Uuid>,
    State(state): State<AppState>,
    principal: AuthUser,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    trace!("Entering get_user function for user_id: {}", user_id);
    principal.require_self_or(user_id, Role::Superadmin)?;

    let user_model = find_user(&state.db, user_id).await?;
    Ok(Json(ApiResponse::ok(UserResponse::from(user_model), "User retrieved successfully")))
}

/// Update a user
#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = Uuid, Path, description = "User ID"),
    ),
    request_body = UpdateUserRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User updated successfully", body = ApiResponse<UserResponse>),
        (status = 403, description = "Not allowed to change these fields", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "Email or username taken", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn update_user(
    ApiPath(user_id): ApiPath<Uuid>,
    State(state): State<AppState>,
    principal: AuthUser,
    ValidatedJson(request): ValidatedJson<UpdateUserRequest>,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    trace!("Entering update_user function for user_id: {}", user_id);
    principal.require_self_or(user_id, Role::Superadmin)?;
    if request.role.is_some() || request.is_active.is_some() {
        principal.require_role(Role::Superadmin)?;
    }

    let existing = find_user(&state.db, user_id).await?;
    ensure_unique(
        &state.db,
        request.email.as_deref(),
        request.username.as_deref(),
        Some(user_id),
    )
    .await?;

    let mut active = existing.into_active_model();
    if let Some(name) = request.name {
        active.name = Set(name);
    }
    if let Some(email) = request.email {
        active.email = Set(email);
    }
    if let Some(username) = request.username {
        active.username = Set(username);
    }
    if let Some(password) = request.password {
        debug!("Re-hashing password for user {}", user_id);
        active.password_hash = Set(hash_password(password).await?);
    }
    if let Some(role) = request.role {
        active.role = Set(role);
    }
    if let Some(is_active) = request.is_active {
        active.is_active = Set(is_active);
    }

    let updated = active
        .update(&state.db)
        .await
        .map_err(|e| ApiError::unique_violation(e, "USERNAME_ALREADY_EXISTS", "Email or username already taken"))?;
    info!("User {} updated", updated.id);
    Ok(Json(ApiResponse::ok(UserResponse::from(updated), "User updated successfully")))
}

/// Deactivate a user
#[utoipa::path(
    delete,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = Uuid, Path, description = "User ID"),
    ),
    security(("bearer" = [])),
    responses(
        (status = 204, description = "User deactivated"),
        (status = 403, description = "Superadmin role required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_user(
    ApiPath(user_id): ApiPath<Uuid>,
    State(state): State<AppState>,
    principal: AuthUser,
) -> ApiResult<StatusCode> {
    trace!("Entering delete_user function for user_id: {}", user_id);
    principal.require_role(Role::Superadmin)?;

    let mut active = find_user(&state.db, user_id).await?.into_active_model();
    active.is_active = Set(false);
    active.update(&state.db).await?;
    info!("User {} deactivated", user_id);
    Ok(StatusCode::NO_CONTENT)
}
