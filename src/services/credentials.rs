//! Connected-account lookup and token persistence.

use std::future::Future;

use async_trait::async_trait;
use chrono::Utc;
use google::{Credentials, GoogleError, RefreshedTokens, TokenSink, with_fresh_credentials};
use model::entities::connected_account;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::schemas::AppState;

/// A live account owned by `owner`, or 404.
pub async fn find_owned_account(
    db: &DatabaseConnection,
    owner: Uuid,
    account_id: Uuid,
) -> ApiResult<connected_account::Model> {
    connected_account::Entity::find_by_id(account_id)
        .filter(connected_account::Column::CreatedBy.eq(owner))
        .filter(connected_account::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or_else(|| {
            warn!("Connected account {} not found for user {}", account_id, owner);
            ApiError::NotFound("Email account not found".to_string())
        })
}

pub fn credentials_of(account: &connected_account::Model) -> Credentials {
    Credentials {
        access_token: account.access_token.clone(),
        refresh_token: account.refresh_token.clone(),
    }
}

/// Writes refreshed tokens back to one `connected_accounts` row.
pub struct AccountTokenSink<'a> {
    db: &'a DatabaseConnection,
    account_id: Uuid,
}

impl<'a> AccountTokenSink<'a> {
    pub fn new(db: &'a DatabaseConnection, account_id: Uuid) -> Self {
        Self { db, account_id }
    }
}

#[async_trait]
impl TokenSink for AccountTokenSink<'_> {
    async fn persist(&self, tokens: &RefreshedTokens) -> google::Result<()> {
        let now = Utc::now();
        let result = connected_account::Entity::update_many()
            .col_expr(connected_account::Column::AccessToken, Expr::value(tokens.access_token.clone()))
            .col_expr(connected_account::Column::RefreshToken, Expr::value(tokens.refresh_token.clone()))
            .col_expr(connected_account::Column::TokenExpiry, Expr::value(tokens.expires_at))
            .col_expr(connected_account::Column::LastSyncedAt, Expr::value(Some(now)))
            .col_expr(connected_account::Column::UpdatedAt, Expr::value(now))
            .filter(connected_account::Column::Id.eq(self.account_id))
            .exec(self.db)
            .await
            .map_err(|e| GoogleError::Store(e.to_string()))?;
        debug!("Persisted refreshed tokens for account {} ({} row)", self.account_id, result.rows_affected);
        Ok(())
    }
}

/// Runs a Google call for `account`, refreshing its tokens once on an
/// auth failure.
pub async fn run_with_account<T, F, Fut>(
    state: &AppState,
    account: &connected_account::Model,
    operation: F,
) -> ApiResult<T>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = google::Result<T>>,
{
    let sink = AccountTokenSink::new(&state.db, account.id);
    let credentials = credentials_of(account);
    Ok(with_fresh_credentials(state.google.as_ref(), &credentials, &sink, operation).await?)
}
