use axum::{
    extract::State,
    response::Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use common::{DEFAULT_PAGE_SIZE, PageRequest, Pagination};
use model::entities::post;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiPath, ValidatedJson, ValidatedQuery};
use crate::schemas::{ApiResponse, AppState};
use crate::services::importer::{PostImport, import_from_sheet};
use crate::services::post_query::{self, PostCriteria, PostPage, PostSortField, SortOrder};

/// Default page size of the combined filter endpoint
const FILTERED_PAGE_SIZE: u64 = 50;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: Uuid,
    /// Natural key from the sheet
    pub post_id: String,
    /// Every sheet column, keyed by normalized header
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
    pub post_date: Option<String>,
    pub is_favorite: bool,
    pub is_email_sent: bool,
    pub memo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<post::Model> for PostResponse {
    fn from(model: post::Model) -> Self {
        Self {
            id: model.id,
            post_id: model.post_id,
            data: model.data,
            post_date: model.post_date,
            is_favorite: model.is_favorite,
            is_email_sent: model.is_email_sent,
            memo: model.memo,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PostListResponse {
    pub posts: Vec<PostResponse>,
    pub pagination: Pagination,
}

impl From<PostPage> for PostListResponse {
    fn from(page: PostPage) -> Self {
        Self {
            posts: page.posts.into_iter().map(PostResponse::from).collect(),
            pagination: page.pagination,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostImportResponse {
    pub processed_count: usize,
    pub inserted_count: usize,
    pub inserted_records: Vec<PostResponse>,
}

#[derive(Debug, Default, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    pub is_favorite: Option<bool>,
    pub is_email_sent: Option<bool>,
    #[validate(length(max = 5000, message = "memo must be at most 5000 characters"))]
    pub memo: Option<String>,
}

/// Parameters shared by every post listing
#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PostListQuery {
    /// 1-based page number
    pub page: Option<u64>,
    /// Page size, 1..=100. `pageSize` is accepted too.
    #[serde(alias = "pageSize")]
    pub limit: Option<u64>,
    /// `createdAt`, `updatedAt` or `id`; anything else sorts by `createdAt`
    pub sort_by: Option<String>,
    /// `ASC` or `DESC` (default)
    pub sort_order: Option<String>,
    /// Case-insensitive text matched against the payload
    #[validate(length(max = 200, message = "query must be at most 200 characters"))]
    pub query: Option<String>,
    /// Exact match on the payload's `recruitmentGender`
    pub recruitment_gender: Option<String>,
    /// Inclusive lower bound on `postDate`, `YYYY-MM-DD`
    #[param(value_type = Option<String>)]
    pub start_date: Option<NaiveDate>,
    /// Inclusive upper bound on `postDate`, `YYYY-MM-DD`
    #[param(value_type = Option<String>)]
    pub end_date: Option<NaiveDate>,
}

impl PostListQuery {
    /// Paging and sorting only.
    fn base_criteria(&self, default_size: u64) -> PostCriteria {
        PostCriteria {
            sort_by: PostSortField::parse(self.sort_by.as_deref()),
            sort_order: SortOrder::parse(self.sort_order.as_deref()),
            page: PageRequest::new(self.page, self.limit, default_size),
            ..Default::default()
        }
    }

    fn required<'q>(value: &'q Option<String>, name: &str) -> ApiResult<&'q str> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::Validation(format!("{name} is required")))
    }

    fn check_range(&self) -> ApiResult<()> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if start > end => Err(ApiError::Validation(
                "startDate must not be after endDate".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

async fn run_search(
    state: &AppState,
    principal: &AuthUser,
    criteria: PostCriteria,
) -> ApiResult<Json<ApiResponse<PostListResponse>>> {
    let page = post_query::search_posts(&state.db, principal.id(), &criteria).await?;
    debug!(
        "Returning {} of {} posts (page {}/{})",
        page.posts.len(),
        page.pagination.total_items,
        page.pagination.current_page,
        page.pagination.total_pages
    );
    Ok(Json(ApiResponse::ok(
        PostListResponse::from(page),
        "Posts retrieved successfully",
    )))
}

/// Import posts from a sheet
#[utoipa::path(
    get,
    path = "/api/v1/posts/{spreadsheet_id}/{sheet_name}/{account_id}",
    tag = "imports",
    params(
        ("spreadsheet_id" = String, Path, description = "Spreadsheet ID"),
        ("sheet_name" = String, Path, description = "Sheet name or A1 range"),
        ("account_id" = Uuid, Path, description = "Connected account used to read the sheet"),
    ),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Import finished", body = ApiResponse<PostImportResponse>),
        (status = 401, description = "Reauthentication required", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn import_posts(
    ApiPath((spreadsheet_id, sheet_name, account_id)): ApiPath<(String, String, Uuid)>,
    State(state): State<AppState>,
    principal: AuthUser,
) -> ApiResult<Json<ApiResponse<PostImportResponse>>> {
    trace!("Entering import_posts function");
    let outcome =
        import_from_sheet::<PostImport>(&state, principal.id(), account_id, &spreadsheet_id, &sheet_name)
            .await?;
    info!(
        "Post import for user {}: {} processed, {} inserted",
        principal.id(),
        outcome.processed_count,
        outcome.inserted_count
    );
    Ok(Json(ApiResponse::ok(
        PostImportResponse {
            processed_count: outcome.processed_count,
            inserted_count: outcome.inserted_count,
            inserted_records: outcome.inserted_records.into_iter().map(PostResponse::from).collect(),
        },
        "Posts imported successfully",
    )))
}

/// List the caller's posts
#[utoipa::path(
    get,
    path = "/api/v1/posts",
    tag = "posts",
    params(PostListQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Posts retrieved", body = ApiResponse<PostListResponse>)
    )
)]
#[instrument(skip(state))]
pub async fn get_posts(
    State(state): State<AppState>,
    principal: AuthUser,
    ValidatedQuery(query): ValidatedQuery<PostListQuery>,
) -> ApiResult<Json<ApiResponse<PostListResponse>>> {
    trace!("Entering get_posts function");
    run_search(&state, &principal, query.base_criteria(DEFAULT_PAGE_SIZE)).await
}

/// Update a post's flags by its natural id
#[utoipa::path(
    put,
    path = "/api/v1/posts/{post_id}",
    tag = "posts",
    params(("post_id" = String, Path, description = "Natural post id")),
    request_body = UpdatePostRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Post updated", body = ApiResponse<PostResponse>),
        (status = 404, description = "Post not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn update_post(
    ApiPath(post_id): ApiPath<String>,
    State(state): State<AppState>,
    principal: AuthUser,
    ValidatedJson(request): ValidatedJson<UpdatePostRequest>,
) -> ApiResult<Json<ApiResponse<PostResponse>>> {
    trace!("Entering update_post function for post {}", post_id);
    let existing = post::Entity::find()
        .filter(post::Column::PostId.eq(post_id.as_str()))
        .filter(post::Column::CreatedBy.eq(principal.id()))
        .filter(post::Column::DeletedAt.is_null())
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    let mut active = existing.into_active_model();
    if let Some(favorite) = request.is_favorite {
        active.is_favorite = Set(favorite);
    }
    if let Some(sent) = request.is_email_sent {
        active.is_email_sent = Set(sent);
    }
    if let Some(memo) = request.memo {
        active.memo = Set(Some(memo).filter(|m| !m.is_empty()));
    }
    let updated = active.update(&state.db).await?;
    info!("Updated post {}", updated.post_id);
    Ok(Json(ApiResponse::ok(PostResponse::from(updated), "Post updated successfully")))
}

/// Free-text search
#[utoipa::path(
    get,
    path = "/api/v1/posts/search",
    tag = "posts",
    params(PostListQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Matching posts", body = ApiResponse<PostListResponse>),
        (status = 400, description = "query missing", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn search_posts(
    State(state): State<AppState>,
    principal: AuthUser,
    ValidatedQuery(query): ValidatedQuery<PostListQuery>,
) -> ApiResult<Json<ApiResponse<PostListResponse>>> {
    trace!("Entering search_posts function");
    let text = PostListQuery::required(&query.query, "query")?.to_string();
    let criteria = PostCriteria {
        query: Some(text),
        ..query.base_criteria(DEFAULT_PAGE_SIZE)
    };
    run_search(&state, &principal, criteria).await
}

/// Filter by recruitment gender
#[utoipa::path(
    get,
    path = "/api/v1/posts/filter",
    tag = "posts",
    params(PostListQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Matching posts", body = ApiResponse<PostListResponse>),
        (status = 400, description = "recruitmentGender missing", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn filter_posts(
    State(state): State<AppState>,
    principal: AuthUser,
    ValidatedQuery(query): ValidatedQuery<PostListQuery>,
) -> ApiResult<Json<ApiResponse<PostListResponse>>> {
    trace!("Entering filter_posts function");
    let gender = PostListQuery::required(&query.recruitment_gender, "recruitmentGender")?.to_string();
    let criteria = PostCriteria {
        recruitment_gender: Some(gender),
        ..query.base_criteria(DEFAULT_PAGE_SIZE)
    };
    run_search(&state, &principal, criteria).await
}

/// Filter by an inclusive post date range
#[utoipa::path(
    get,
    path = "/api/v1/posts/dateFilter",
    tag = "posts",
    params(PostListQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Matching posts", body = ApiResponse<PostListResponse>),
        (status = 400, description = "Dates missing or reversed", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn date_filter_posts(
    State(state): State<AppState>,
    principal: AuthUser,
    ValidatedQuery(query): ValidatedQuery<PostListQuery>,
) -> ApiResult<Json<ApiResponse<PostListResponse>>> {
    trace!("Entering date_filter_posts function");
    let (Some(start), Some(end)) = (query.start_date, query.end_date) else {
        return Err(ApiError::Validation("startDate and endDate are required".to_string()));
    };
    query.check_range()?;
    let criteria = PostCriteria {
        start_date: Some(start),
        end_date: Some(end),
        ..query.base_criteria(DEFAULT_PAGE_SIZE)
    };
    run_search(&state, &principal, criteria).await
}

/// Every criterion at once
#[utoipa::path(
    get,
    path = "/api/v1/posts/filtered-posts",
    tag = "posts",
    params(PostListQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Matching posts", body = ApiResponse<PostListResponse>),
        (status = 400, description = "Reversed date range", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn filtered_posts(
    State(state): State<AppState>,
    principal: AuthUser,
    ValidatedQuery(query): ValidatedQuery<PostListQuery>,
) -> ApiResult<Json<ApiResponse<PostListResponse>>> {
    trace!("Entering filtered_posts function");
    query.check_range()?;
    let criteria = PostCriteria {
        query: query.query.clone(),
        recruitment_gender: query.recruitment_gender.clone(),
        start_date: query.start_date,
        end_date: query.end_date,
        ..query.base_criteria(FILTERED_PAGE_SIZE)
    };
    run_search(&state, &principal, criteria).await
}

/// Favorite posts
#[utoipa::path(
    get,
    path = "/api/v1/posts/favorites",
    tag = "posts",
    params(PostListQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Favorite posts", body = ApiResponse<PostListResponse>)
    )
)]
#[instrument(skip(state))]
pub async fn favorite_posts(
    State(state): State<AppState>,
    principal: AuthUser,
    ValidatedQuery(query): ValidatedQuery<PostListQuery>,
) -> ApiResult<Json<ApiResponse<PostListResponse>>> {
    trace!("Entering favorite_posts function");
    let criteria = PostCriteria {
        is_favorite: Some(true),
        ..query.base_criteria(DEFAULT_PAGE_SIZE)
    };
    run_search(&state, &principal, criteria).await
}

/// Posts that already received an email
#[utoipa::path(
    get,
    path = "/api/v1/posts/sent-emails",
    tag = "posts",
    params(PostListQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Contacted posts", body = ApiResponse<PostListResponse>)
    )
)]
#[instrument(skip(state))]
pub async fn sent_email_posts(
    State(state): State<AppState>,
    principal: AuthUser,
    ValidatedQuery(query): ValidatedQuery<PostListQuery>,
) -> ApiResult<Json<ApiResponse<PostListResponse>>> {
    trace!("Entering sent_email_posts function");
    let criteria = PostCriteria {
        is_email_sent: Some(true),
        ..query.base_criteria(DEFAULT_PAGE_SIZE)
    };
    run_search(&state, &principal, criteria).await
}
