use crate::handlers::{
    auth::{signin, signup, verify_email},
    email_templates::{
        create_template, delete_template, get_template, get_templates, send_default_template, send_email,
        set_default_template, update_template,
    },
    google_auth::{
        connect_account, disconnect_account, get_account, list_accounts, list_drive_files, oauth_callback,
        reauthenticate_account, update_account,
    },
    health::health_check,
    models::{create_model, delete_model, get_model, get_models, update_model},
    posts::{
        date_filter_posts, favorite_posts, filter_posts, filtered_posts, get_posts, import_posts,
        search_posts, sent_email_posts, update_post,
    },
    sheets::import_models,
    users::{create_user, delete_user, get_user, get_users, update_user},
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    routing::{get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Routes mounted under `/api/v1`
fn api_routes() -> Router<AppState> {
    Router::new()
        // Auth
        .route("/auth/signup", post(signup))
        .route("/auth/signin", post(signin))
        .route("/auth/verify-email", get(verify_email))
        // Users
        .route("/users", post(create_user).get(get_users))
        .route("/users/:user_id", get(get_user).put(update_user).delete(delete_user))
        // Connected Google accounts
        .route("/google-auth/connect", post(connect_account))
        .route("/google-auth/callback", get(oauth_callback))
        .route("/google-auth/accounts", get(list_accounts))
        .route(
            "/google-auth/accounts/:account_id",
            get(get_account).put(update_account).delete(disconnect_account),
        )
        .route("/google-auth/accounts/:account_id/files", get(list_drive_files))
        .route("/google-auth/accounts/:account_id/reauthenticate", post(reauthenticate_account))
        .route("/google-auth/files/:account_id", get(list_drive_files))
        // Imports
        .route("/sheets/:spreadsheet_id/:sheet_name/:account_id", get(import_models))
        // `:id` is the spreadsheet id; it shares the segment name with `/posts/:id` below
        .route("/posts/:id/:sheet_name/:account_id", get(import_posts))
        // Posts
        .route("/posts", get(get_posts))
        .route("/posts/search", get(search_posts))
        .route("/posts/filter", get(filter_posts))
        .route("/posts/dateFilter", get(date_filter_posts))
        .route("/posts/filtered-posts", get(filtered_posts))
        .route("/posts/favorites", get(favorite_posts))
        .route("/posts/sent-emails", get(sent_email_posts))
        .route("/posts/:id", put(update_post))
        // Models
        .route("/models", get(get_models).post(create_model))
        .route("/models/:model_id", get(get_model).put(update_model).delete(delete_model))
        // Email templates
        .route("/email-templates", get(get_templates).post(create_template))
        .route("/email-templates/send", post(send_email))
        .route("/email-templates/default", post(send_default_template))
        .route("/email-templates/set-default/:template_id", post(set_default_template))
        .route(
            "/email-templates/:template_id",
            get(get_template).put(update_template).delete(delete_template),
        )
}

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
