use std::sync::Arc;

use google::GoogleApi;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::config::Settings;
use crate::mail::Mailer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    pub settings: Arc<Settings>,
    /// Google APIs; holds client registration only, never user tokens
    pub google: Arc<dyn GoogleApi>,
    /// Outbound verification mail
    pub mailer: Arc<dyn Mailer>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("db", &self.db)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            success: true,
        }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Human readable summary
    pub message: String,
    /// Error detail, including upstream provider messages
    pub error: String,
    /// Stable error code, e.g. `REAUTHENTICATION_REQUIRED`
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::signup,
        crate::handlers::auth::signin,
        crate::handlers::auth::verify_email,
        crate::handlers::users::create_user,
        crate::handlers::users::get_users,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,
        crate::handlers::google_auth::connect_account,
        crate::handlers::google_auth::oauth_callback,
        crate::handlers::google_auth::list_accounts,
        crate::handlers::google_auth::get_account,
        crate::handlers::google_auth::update_account,
        crate::handlers::google_auth::disconnect_account,
        crate::handlers::google_auth::list_drive_files,
        crate::handlers::google_auth::reauthenticate_account,
        crate::handlers::sheets::import_models,
        crate::handlers::posts::import_posts,
        crate::handlers::posts::get_posts,
        crate::handlers::posts::update_post,
        crate::handlers::posts::search_posts,
        crate::handlers::posts::filter_posts,
        crate::handlers::posts::date_filter_posts,
        crate::handlers::posts::filtered_posts,
        crate::handlers::posts::favorite_posts,
        crate::handlers::posts::sent_email_posts,
        crate::handlers::models::create_model,
        crate::handlers::models::get_models,
        crate::handlers::models::get_model,
        crate::handlers::models::update_model,
        crate::handlers::models::delete_model,
        crate::handlers::email_templates::create_template,
        crate::handlers::email_templates::get_templates,
        crate::handlers::email_templates::get_template,
        crate::handlers::email_templates::update_template,
        crate::handlers::email_templates::delete_template,
        crate::handlers::email_templates::set_default_template,
        crate::handlers::email_templates::send_default_template,
        crate::handlers::email_templates::send_email,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            common::Pagination,
            crate::handlers::auth::SignupRequest,
            crate::handlers::auth::SigninRequest,
            crate::handlers::auth::SignupResponse,
            crate::handlers::auth::SigninResponse,
            crate::handlers::users::CreateUserRequest,
            crate::handlers::users::UpdateUserRequest,
            crate::handlers::users::UserResponse,
            crate::handlers::users::UserListResponse,
            crate::handlers::google_auth::AuthorizationUrlResponse,
            crate::handlers::google_auth::ConnectedAccountResponse,
            crate::handlers::google_auth::DriveFileResponse,
            crate::handlers::google_auth::UpdateAccountRequest,
            crate::handlers::posts::PostResponse,
            crate::handlers::posts::PostListResponse,
            crate::handlers::posts::UpdatePostRequest,
            crate::handlers::posts::PostImportResponse,
            crate::handlers::models::CreateModelRequest,
            crate::handlers::models::UpdateModelRequest,
            crate::handlers::models::ModelResponse,
            crate::handlers::models::ModelListResponse,
            crate::handlers::sheets::ModelImportResponse,
            crate::handlers::email_templates::CreateTemplateRequest,
            crate::handlers::email_templates::UpdateTemplateRequest,
            crate::handlers::email_templates::TemplateResponse,
            crate::handlers::email_templates::SendDefaultRequest,
            crate::handlers::email_templates::SendEmailRequest,
            crate::handlers::email_templates::SendResponse,
        )
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Signup, sign-in and email verification"),
        (name = "users", description = "User administration"),
        (name = "google-auth", description = "Connected Google accounts"),
        (name = "imports", description = "Spreadsheet imports"),
        (name = "posts", description = "Imported job postings"),
        (name = "models", description = "Talent profiles"),
        (name = "email-templates", description = "Email templates and sending"),
    ),
    info(
        title = "TalentDesk API",
        description = "Casting administration backend: Google account linking, sheet imports and templated Gmail sends",
        version = "0.1.0",
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` security scheme referenced by protected paths.
pub struct BearerSecurity;

impl utoipa::Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
