use axum::{
    extract::State,
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, trace};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::ApiPath;
use crate::handlers::models::ModelResponse;
use crate::schemas::{ApiResponse, AppState};
use crate::services::importer::{TalentImport, import_from_sheet};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelImportResponse {
    pub processed_count: usize,
    pub inserted_count: usize,
    pub inserted_records: Vec<ModelResponse>,
}

/// Import talent profiles from a sheet
///
/// Rows whose comcard number is already stored are skipped, so the import
/// can be re-run safely.
#[utoipa::path(
    get,
    path = "/api/v1/sheets/{spreadsheet_id}/{sheet_name}/{account_id}",
    tag = "imports",
    params(
        ("spreadsheet_id" = String, Path, description = "Spreadsheet ID"),
        ("sheet_name" = String, Path, description = "Sheet name or A1 range"),
        ("account_id" = Uuid, Path, description = "Connected account used to read the sheet"),
    ),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Import finished", body = ApiResponse<ModelImportResponse>),
        (status = 401, description = "Reauthentication required", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse),
        (status = 500, description = "Sheets request failed", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn import_models(
    ApiPath((spreadsheet_id, sheet_name, account_id)): ApiPath<(String, String, Uuid)>,
    State(state): State<AppState>,
    principal: AuthUser,
) -> ApiResult<Json<ApiResponse<ModelImportResponse>>> {
    trace!("Entering import_models function");
    let outcome =
        import_from_sheet::<TalentImport>(&state, principal.id(), account_id, &spreadsheet_id, &sheet_name)
            .await?;
    info!(
        "Model import for user {}: {} processed, {} inserted",
        principal.id(),
        outcome.processed_count,
        outcome.inserted_count
    );
    Ok(Json(ApiResponse::ok(
        ModelImportResponse {
            processed_count: outcome.processed_count,
            inserted_count: outcome.inserted_count,
            inserted_records: outcome.inserted_records.into_iter().map(ModelResponse::from).collect(),
        },
        "Models imported successfully",
    )))
}
