use std::collections::HashMap;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use model::entities::email_template;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiPath, ValidatedJson};
use crate::schemas::{ApiResponse, AppState};
use crate::services::dispatcher::{Dispatch, send_templated};

const NO_SUBJECT: &str = "No Subject";

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTemplateRequest {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "subject is required"))]
    pub subject: String,
    /// Plain-text body with `[placeholder]` markers
    #[validate(length(min = 1, message = "template is required"))]
    pub template: String,
    pub html_template: Option<String>,
    pub is_default: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTemplateRequest {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "subject must not be empty"))]
    pub subject: Option<String>,
    #[validate(length(min = 1, message = "template must not be empty"))]
    pub template: Option<String>,
    /// An empty string removes the HTML variant
    pub html_template: Option<String>,
    pub is_default: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateResponse {
    pub id: i32,
    pub title: String,
    pub subject: String,
    pub template: String,
    pub html_template: Option<String>,
    /// Placeholder names, first-seen order
    pub variables: Vec<String>,
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<email_template::Model> for TemplateResponse {
    fn from(model: email_template::Model) -> Self {
        Self {
            id: model.id,
            variables: model.variable_names(),
            title: model.title,
            subject: model.subject,
            template: model.template,
            html_template: model.html_template,
            is_default: model.is_default,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Send the caller's default template
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendDefaultRequest {
    #[validate(email(message = "recipient must be a valid address"))]
    pub recipient: String,
    pub account_id: Uuid,
    /// Natural id of the post to take values from and flag as contacted
    pub post_id: Option<String>,
    /// Placeholder values; these win over the post's fields
    pub variables: Option<HashMap<String, String>>,
}

/// Send an ad hoc message
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailRequest {
    #[validate(email(message = "recipient must be a valid address"))]
    pub recipient: String,
    pub account_id: Uuid,
    pub subject: Option<String>,
    #[validate(length(min = 1, message = "content is required"))]
    pub content: String,
    /// Defaults to true
    pub is_html: Option<bool>,
    pub post_id: Option<String>,
    pub variables: Option<HashMap<String, String>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    /// Gmail message id
    pub message_id: String,
}

/// A concurrent request made another template the default first.
fn default_taken(err: sea_orm::DbErr) -> ApiError {
    ApiError::unique_violation(err, "DEFAULT_TEMPLATE_CONFLICT", "Another template became the default concurrently")
}

async fn find_owned_template<C: ConnectionTrait>(
    db: &C,
    owner: Uuid,
    template_id: i32,
) -> ApiResult<email_template::Model> {
    email_template::Entity::find_by_id(template_id)
        .filter(email_template::Column::CreatedBy.eq(owner))
        .filter(email_template::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or_else(|| {
            warn!("Template {} not found for user {}", template_id, owner);
            ApiError::NotFound("Email template not found".to_string())
        })
}

/// Create a template
#[utoipa::path(
    post,
    path = "/api/v1/email-templates",
    tag = "email-templates",
    request_body = CreateTemplateRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Template created successfully", body = ApiResponse<TemplateResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(title = %request.title))]
pub async fn create_template(
    State(state): State<AppState>,
    principal: AuthUser,
    ValidatedJson(request): ValidatedJson<CreateTemplateRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<TemplateResponse>>)> {
    trace!("Entering create_template function");
    let txn = state.db.begin().await?;
    let created = email_template::ActiveModel {
        title: Set(request.title),
        subject: Set(request.subject),
        template: Set(request.template),
        html_template: Set(request.html_template.filter(|h| !h.is_empty())),
        is_default: Set(request.is_default.unwrap_or(false)),
        created_by: Set(principal.id()),
        deleted_at: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(default_taken)?;
    txn.commit().await?;
    info!("Template {} created for user {}", created.id, principal.id());

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(TemplateResponse::from(created), "Template created successfully")),
    ))
}

/// List the caller's templates
#[utoipa::path(
    get,
    path = "/api/v1/email-templates",
    tag = "email-templates",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Templates retrieved successfully", body = ApiResponse<Vec<TemplateResponse>>)
    )
)]
#[instrument(skip(state))]
pub async fn get_templates(
    State(state): State<AppState>,
    principal: AuthUser,
) -> ApiResult<Json<ApiResponse<Vec<TemplateResponse>>>> {
    trace!("Entering get_templates function");
    let templates = email_template::Entity::find()
        .filter(email_template::Column::CreatedBy.eq(principal.id()))
        .filter(email_template::Column::DeletedAt.is_null())
        .order_by_desc(email_template::Column::IsDefault)
        .order_by_desc(email_template::Column::CreatedAt)
        .all(&state.db)
        .await?;
    debug!("Retrieved {} templates", templates.len());
    Ok(Json(ApiResponse::ok(
        templates.into_iter().map(TemplateResponse::from).collect(),
        "Templates retrieved successfully",
    )))
}

/// Get a template
#[utoipa::path(
    get,
    path = "/api/v1/email-templates/{template_id}",
    tag = "email-templates",
    params(("template_id" = i32, Path, description = "Template ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Template retrieved successfully", body = ApiResponse<TemplateResponse>),
        (status = 404, description = "Template not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_template(
    ApiPath(template_id): ApiPath<i32>,
    State(state): State<AppState>,
    principal: AuthUser,
) -> ApiResult<Json<ApiResponse<TemplateResponse>>> {
    trace!("Entering get_template function for template_id: {}", template_id);
    let template = find_owned_template(&state.db, principal.id(), template_id).await?;
    Ok(Json(ApiResponse::ok(TemplateResponse::from(template), "Template retrieved successfully")))
}

/// Update a template
#[utoipa::path(
    put,
    path = "/api/v1/email-templates/{template_id}",
    tag = "email-templates",
    params(("template_id" = i32, Path, description = "Template ID")),
    request_body = UpdateTemplateRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Template updated successfully", body = ApiResponse<TemplateResponse>),
        (status = 404, description = "Template not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn update_template(
    ApiPath(template_id): ApiPath<i32>,
    State(state): State<AppState>,
    principal: AuthUser,
    ValidatedJson(request): ValidatedJson<UpdateTemplateRequest>,
) -> ApiResult<Json<ApiResponse<TemplateResponse>>> {
    trace!("Entering update_template function for template_id: {}", template_id);
    let txn = state.db.begin().await?;
    let mut active = find_owned_template(&txn, principal.id(), template_id)
        .await?
        .into_active_model();

    if let Some(title) = request.title {
        active.title = Set(title);
    }
    if let Some(subject) = request.subject {
        active.subject = Set(subject);
    }
    if let Some(template) = request.template {
        active.template = Set(template);
    }
    if let Some(html) = request.html_template {
        active.html_template = Set(Some(html).filter(|h| !h.is_empty()));
    }
    if let Some(is_default) = request.is_default {
        active.is_default = Set(is_default);
    }
    if let Some(is_active) = request.is_active {
        active.is_active = Set(is_active);
    }

    let updated = active.update(&txn).await.map_err(default_taken)?;
    txn.commit().await?;
    info!("Template {} updated", updated.id);
    Ok(Json(ApiResponse::ok(TemplateResponse::from(updated), "Template updated successfully")))
}

/// Delete a template
#[utoipa::path(
    delete,
    path = "/api/v1/email-templates/{template_id}",
    tag = "email-templates",
    params(("template_id" = i32, Path, description = "Template ID")),
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Template deleted"),
        (status = 404, description = "Template not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_template(
    ApiPath(template_id): ApiPath<i32>,
    State(state): State<AppState>,
    principal: AuthUser,
) -> ApiResult<StatusCode> {
    trace!("Entering delete_template function for template_id: {}", template_id);
    let mut active = find_owned_template(&state.db, principal.id(), template_id)
        .await?
        .into_active_model();
    active.deleted_at = Set(Some(Utc::now()));
    active.is_default = Set(false);
    active.update(&state.db).await?;
    info!("Template {} deleted", template_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Make a template the caller's default
#[utoipa::path(
    post,
    path = "/api/v1/email-templates/set-default/{template_id}",
    tag = "email-templates",
    params(("template_id" = i32, Path, description = "Template ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Default template updated", body = ApiResponse<TemplateResponse>),
        (status = 404, description = "Template not found", body = ErrorResponse),
        (status = 409, description = "Another template became the default concurrently", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn set_default_template(
    ApiPath(template_id): ApiPath<i32>,
    State(state): State<AppState>,
    principal: AuthUser,
) -> ApiResult<Json<ApiResponse<TemplateResponse>>> {
    trace!("Entering set_default_template function for template_id: {}", template_id);
    let txn = state.db.begin().await?;
    let mut active = find_owned_template(&txn, principal.id(), template_id)
        .await?
        .into_active_model();
    active.is_default = Set(true);
    let updated = active.update(&txn).await.map_err(default_taken)?;
    txn.commit().await?;
    info!("Template {} is now the default of user {}", updated.id, principal.id());
    Ok(Json(ApiResponse::ok(TemplateResponse::from(updated), "Default template updated successfully")))
}

/// Send the default template
///
/// The HTML variant is used when present. Placeholders without a value are
/// sent as written.
#[utoipa::path(
    post,
    path = "/api/v1/email-templates/default",
    tag = "email-templates",
    request_body = SendDefaultRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Email sent successfully", body = ApiResponse<SendResponse>),
        (status = 401, description = "Reauthentication required", body = ErrorResponse),
        (status = 404, description = "No default template, account or post", body = ErrorResponse),
        (status = 500, description = "Gmail rejected the message", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(to = %request.recipient))]
pub async fn send_default_template(
    State(state): State<AppState>,
    principal: AuthUser,
    ValidatedJson(request): ValidatedJson<SendDefaultRequest>,
) -> ApiResult<Json<ApiResponse<SendResponse>>> {
    trace!("Entering send_default_template function");
    let template = email_template::Entity::find()
        .filter(email_template::Column::CreatedBy.eq(principal.id()))
        .filter(email_template::Column::IsDefault.eq(true))
        .filter(email_template::Column::DeletedAt.is_null())
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("No default email template found".to_string()))?;
    debug!("Sending default template {}", template.id);

    let (body, html) = match template.html_template.filter(|h| !h.trim().is_empty()) {
        Some(html) => (html, true),
        None => (template.template, false),
    };
    let dispatch = Dispatch {
        recipient: request.recipient,
        account_id: request.account_id,
        subject: template.subject,
        body,
        html,
        post_id: request.post_id,
        variables: request.variables.unwrap_or_default(),
    };
    let sent = send_templated(&state, principal.id(), dispatch).await?;
    Ok(Json(ApiResponse::ok(SendResponse { message_id: sent.id }, "Email sent successfully")))
}

/// Send an ad hoc message
#[utoipa::path(
    post,
    path = "/api/v1/email-templates/send",
    tag = "email-templates",
    request_body = SendEmailRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Email sent successfully", body = ApiResponse<SendResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Reauthentication required", body = ErrorResponse),
        (status = 404, description = "Account or post not found", body = ErrorResponse),
        (status = 500, description = "Gmail rejected the message", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(to = %request.recipient))]
pub async fn send_email(
    State(state): State<AppState>,
    principal: AuthUser,
    ValidatedJson(request): ValidatedJson<SendEmailRequest>,
) -> ApiResult<Json<ApiResponse<SendResponse>>> {
    trace!("Entering send_email function");
    let dispatch = Dispatch {
        recipient: request.recipient,
        account_id: request.account_id,
        subject: request
            .subject
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| NO_SUBJECT.to_string()),
        body: request.content,
        html: request.is_html.unwrap_or(true),
        post_id: request.post_id,
        variables: request.variables.unwrap_or_default(),
    };
    let sent = send_templated(&state, principal.id(), dispatch).await?;
    Ok(Json(ApiResponse::ok(SendResponse { message_id: sent.id }, "Email sent successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_utils::{create_user, setup_test_db};
    use model::entities::user::Role;
    use sea_orm::sea_query::Expr;

    #[tokio::test]
    async fn test_second_default_maps_to_conflict() {
        let db = setup_test_db().await;
        let owner = create_user(&db, "writer", Role::Admin).await;
        let insert = |title: &str, is_default: bool| email_template::ActiveModel {
            title: Set(title.to_string()),
            subject: Set("Hi".to_string()),
            template: Set("Body".to_string()),
            html_template: Set(None),
            is_default: Set(is_default),
            created_by: Set(owner.id),
            deleted_at: Set(None),
            ..Default::default()
        };
        insert("A", true).insert(&db).await.unwrap();
        let b = insert("B", false).insert(&db).await.unwrap();

        let err = email_template::Entity::update_many()
            .col_expr(email_template::Column::IsDefault, Expr::value(true))
            .filter(email_template::Column::Id.eq(b.id))
            .exec(&db)
            .await
            .unwrap_err();
        match default_taken(err) {
            ApiError::Conflict { code, .. } => assert_eq!(code, "DEFAULT_TEMPLATE_CONFLICT"),
            other => panic!("expected conflict, got {other:?}"),
        }
    }
}
