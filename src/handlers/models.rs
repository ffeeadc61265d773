use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use common::{DEFAULT_PAGE_SIZE, PageRequest, Pagination};
use model::entities::talent;
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
use crate::schemas::{ApiResponse, AppState};

const COMCARD_TAKEN: &str = "COMCARD_NO_ALREADY_EXISTS";

/// Request body for creating a talent profile
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateModelRequest {
    /// Comcard number (must be unique)
    #[validate(length(min = 1, message = "comcardNo is required"))]
    pub comcard_no: String,
    #[validate(length(min = 1, message = "nameEng is required"))]
    pub name_eng: String,
    pub name_kor: Option<String>,
    pub national: Option<String>,
    pub stage: Option<String>,
    pub additional_pic: Option<String>,
    pub comcard_url: Option<String>,
    pub comcard_pic: Option<String>,
    pub download: Option<String>,
    pub html_url: Option<String>,
}

/// Request body for updating a talent profile; absent fields stay unchanged
#[derive(Debug, Default, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateModelRequest {
    #[validate(length(min = 1, message = "comcardNo must not be empty"))]
    pub comcard_no: Option<String>,
    #[validate(length(min = 1, message = "nameEng must not be empty"))]
    pub name_eng: Option<String>,
    pub name_kor: Option<String>,
    pub national: Option<String>,
    pub stage: Option<String>,
    pub additional_pic: Option<String>,
    pub comcard_url: Option<String>,
    pub comcard_pic: Option<String>,
    pub download: Option<String>,
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelResponse {
    pub id: Uuid,
    pub comcard_no: String,
    pub name_eng: String,
    pub name_kor: Option<String>,
    pub national: Option<String>,
    pub stage: Option<String>,
    pub additional_pic: Option<String>,
    pub comcard_url: Option<String>,
    pub comcard_pic: Option<String>,
    pub download: Option<String>,
    pub html_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<talent::Model> for ModelResponse {
    fn from(model: talent::Model) -> Self {
        Self {
            id: model.id,
            comcard_no: model.comcard_no,
            name_eng: model.name_eng,
            name_kor: model.name_kor,
            national: model.national,
            stage: model.stage,
            additional_pic: model.additional_pic,
            comcard_url: model.comcard_url,
            comcard_pic: model.comcard_pic,
            download: model.download,
            html_url: model.html_url,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ModelListResponse {
    pub models: Vec<ModelResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
pub struct ModelListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

async fn find_live(db: &DatabaseConnection, id: Uuid) -> ApiResult<talent::Model> {
    talent::Entity::find_by_id(id)
        .filter(talent::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or_else(|| {
            warn!("Model with ID {} not found", id);
            ApiError::NotFound("Model not found".to_string())
        })
}

async fn ensure_comcard_free(db: &DatabaseConnection, comcard_no: &str, except: Option<Uuid>) -> ApiResult<()> {
    let mut query = talent::Entity::find()
        .filter(talent::Column::ComcardNo.eq(comcard_no))
        .filter(talent::Column::DeletedAt.is_null());
    if let Some(id) = except {
        query = query.filter(talent::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(ApiError::conflict(
            COMCARD_TAKEN,
            format!("Model with comcard number '{comcard_no}' already exists"),
        ));
    }
    Ok(())
}

/// Create a talent profile
#[utoipa::path(
    post,
    path = "/api/v1/models",
    tag = "models",
    request_body = CreateModelRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Model created successfully", body = ApiResponse<ModelResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Comcard number taken", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(comcard_no = %request.comcard_no))]
pub async fn create_model(
    State(state): State<AppState>,
    principal: AuthUser,
    ValidatedJson(request): ValidatedJson<CreateModelRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ModelResponse>>)> {
    trace!("Entering create_model function");
    ensure_comcard_free(&state.db, &request.comcard_no, None).await?;

    let created = talent::ActiveModel {
        comcard_no: Set(request.comcard_no),
        name_eng: Set(request.name_eng),
        name_kor: Set(request.name_kor),
        national: Set(request.national),
        stage: Set(request.stage),
        additional_pic: Set(request.additional_pic),
        comcard_url: Set(request.comcard_url),
        comcard_pic: Set(request.comcard_pic),
        download: Set(request.download),
        html_url: Set(request.html_url),
        created_by: Set(Some(principal.id())),
        deleted_at: Set(None),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .map_err(|e| ApiError::unique_violation(e, COMCARD_TAKEN, "Comcard number already exists"))?;
    info!("Model created successfully with ID: {}", created.id);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(ModelResponse::from(created), "Model created successfully")),
    ))
}

/// List talent profiles
#[utoipa::path(
    get,
    path = "/api/v1/models",
    tag = "models",
    params(ModelListQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Models retrieved successfully", body = ApiResponse<ModelListResponse>)
    )
)]
#[instrument(skip(state, _principal))]
pub async fn get_models(
    State(state): State<AppState>,
    _principal: AuthUser,
    ValidatedQuery(query): ValidatedQuery<ModelListQuery>,
) -> ApiResult<Json<ApiResponse<ModelListResponse>>> {
    trace!("Entering get_models function");
    let page = PageRequest::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
    let paginator = talent::Entity::find()
        .filter(talent::Column::DeletedAt.is_null())
        .order_by_desc(talent::Column::CreatedAt)
        .order_by_desc(talent::Column::Id)
        .paginate(&state.db, page.page_size);
    let total = paginator.num_items().await?;
    let models = paginator.fetch_page(page.index()).await?;
    debug!("Retrieved {} of {} models", models.len(), total);

    Ok(Json(ApiResponse::ok(
        ModelListResponse {
            models: models.into_iter().map(ModelResponse::from).collect(),
            pagination: Pagination::new(page, total),
        },
        "Models retrieved successfully",
    )))
}

/// Get a talent profile
#[utoipa::path(
    get,
    path = "/api/v1/models/{model_id}",
    tag = "models",
    params(("model_id" = Uuid, Path, description = "Model ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Model retrieved successfully", body = ApiResponse<ModelResponse>),
        (status = 404, description = "Model not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, _principal))]
pub async fn get_model(
    ApiPath(model_id): ApiPath<Uuid>,
    State(state): State<AppState>,
    _principal: AuthUser,
) -> ApiResult<Json<ApiResponse<ModelResponse>>> {
    trace!("Entering get_model function for model_id: {}", model_id);
    let found = find_live(&state.db, model_id).await?;
    Ok(Json(ApiResponse::ok(ModelResponse::from(found), "Model retrieved successfully")))
}

/// Update a talent profile
#[utoipa::path(
    put,
    path = "/api/v1/models/{model_id}",
    tag = "models",
    params(("model_id" = Uuid, Path, description = "Model ID")),
    request_body = UpdateModelRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Model updated successfully", body = ApiResponse<ModelResponse>),
        (status = 404, description = "Model not found", body = ErrorResponse),
        (status = 409, description = "Comcard number taken", body = ErrorResponse)
    )
)]
#[instrument(skip(state, _principal, request))]
pub async fn update_model(
    ApiPath(model_id): ApiPath<Uuid>,
    State(state): State<AppState>,
    _principal: AuthUser,
    ValidatedJson(request): ValidatedJson<UpdateModelRequest>,
) -> ApiResult<Json<ApiResponse<ModelResponse>>> {
    trace!("Entering update_model function for model_id: {}", model_id);
    let existing = find_live(&state.db, model_id).await?;
    if let Some(comcard_no) = request.comcard_no.as_deref() {
        ensure_comcard_free(&state.db, comcard_no, Some(model_id)).await?;
    }

    let mut active = existing.into_active_model();
    if let Some(comcard_no) = request.comcard_no {
        active.comcard_no = Set(comcard_no);
    }
    if let Some(name_eng) = request.name_eng {
        active.name_eng = Set(name_eng);
    }
    let optional = [
        (request.name_kor, &mut active.name_kor),
        (request.national, &mut active.national),
        (request.stage, &mut active.stage),
        (request.additional_pic, &mut active.additional_pic),
        (request.comcard_url, &mut active.comcard_url),
        (request.comcard_pic, &mut active.comcard_pic),
        (request.download, &mut active.download),
        (request.html_url, &mut active.html_url),
    ];
    for (value, field) in optional {
        if let Some(value) = value {
            *field = Set(Some(value).filter(|v| !v.is_empty()));
        }
    }

    let updated = active
        .update(&state.db)
        .await
        .map_err(|e| ApiError::unique_violation(e, COMCARD_TAKEN, "Comcard number already exists"))?;
    info!("Model {} updated", updated.id);
    Ok(Json(ApiResponse::ok(ModelResponse::from(updated), "Model updated successfully")))
}

/// Delete a talent profile
#[utoipa::path(
    delete,
    path = "/api/v1/models/{model_id}",
    tag = "models",
    params(("model_id" = Uuid, Path, description = "Model ID")),
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Model deleted"),
        (status = 404, description = "Model not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, _principal))]
pub async fn delete_model(
    ApiPath(model_id): ApiPath<Uuid>,
    State(state): State<AppState>,
    _principal: AuthUser,
) -> ApiResult<StatusCode> {
    trace!("Entering delete_model function for model_id: {}", model_id);
    let mut active = find_live(&state.db, model_id).await?.into_active_model();
    active.deleted_at = Set(Some(Utc::now()));
    active.update(&state.db).await?;
    info!("Model {} deleted", model_id);
    Ok(StatusCode::NO_CONTENT)
}
