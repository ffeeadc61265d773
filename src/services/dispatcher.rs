//! Templated Gmail sends through a connected account.

use std::collections::HashMap;

use chrono::Utc;
use common::render;
use google::SentMessage;
use google::mime::{MessageParts, build_raw_message};
use model::entities::post;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::schemas::AppState;
use crate::services::credentials::{find_owned_account, run_with_account};

/// A message about to be rendered and sent.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub recipient: String,
    pub account_id: Uuid,
    pub subject: String,
    pub body: String,
    pub html: bool,
    /// Natural id of the post the message is about.
    pub post_id: Option<String>,
    pub variables: HashMap<String, String>,
}

async fn find_owned_post(db: &DatabaseConnection, owner: Uuid, post_id: &str) -> ApiResult<post::Model> {
    post::Entity::find()
        .filter(post::Column::PostId.eq(post_id))
        .filter(post::Column::CreatedBy.eq(owner))
        .filter(post::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))
}

/// String-valued payload fields, usable as template values.
fn payload_values(data: &Value) -> HashMap<String, String> {
    data.as_object()
        .map(|fields| {
            fields
                .iter()
                .filter_map(|(key, value)| match value {
                    Value::String(text) if !text.is_empty() => Some((key.clone(), text.clone())),
                    Value::Number(n) => Some((key.clone(), n.to_string())),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Renders `dispatch`, sends it and flags the post as email-sent.
///
/// Values come from the post's payload, overridden by explicit variables.
/// Placeholders without a value stay in the message as written.
#[instrument(skip(state, dispatch), fields(to = %dispatch.recipient, account = %dispatch.account_id))]
pub async fn send_templated(state: &AppState, owner: Uuid, dispatch: Dispatch) -> ApiResult<SentMessage> {
    let account = find_owned_account(&state.db, owner, dispatch.account_id).await?;

    let mut values = match dispatch.post_id.as_deref() {
        Some(post_id) => payload_values(&find_owned_post(&state.db, owner, post_id).await?.data),
        None => HashMap::new(),
    };
    values.extend(dispatch.variables);

    let subject = render(&dispatch.subject, &values);
    let body = render(&dispatch.body, &values);
    debug!("Rendered message with {} values", values.len());

    let raw = build_raw_message(&MessageParts {
        from: Some(account.email.as_str()),
        to: &dispatch.recipient,
        subject: &subject,
        body: &body,
        html: dispatch.html,
    });

    let google = state.google.as_ref();
    let raw = raw.as_str();
    let sent = run_with_account(state, &account, |token| async move { google.send_message(&token, raw).await })
        .await
        .inspect_err(|e| warn!("Send through {} failed: {}", account.email, e))?;
    info!("Sent message {} to {}", sent.id, dispatch.recipient);

    if let Some(post_id) = dispatch.post_id.as_deref() {
        let flagged = post::Entity::update_many()
            .col_expr(post::Column::IsEmailSent, Expr::value(true))
            .col_expr(post::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(post::Column::PostId.eq(post_id))
            .filter(post::Column::CreatedBy.eq(owner))
            .filter(post::Column::DeletedAt.is_null())
            .exec(&state.db)
            .await?;
        debug!("Flagged {} post(s) {} as email-sent", flagged.rows_affected, post_id);
    }

    Ok(sent)
}
