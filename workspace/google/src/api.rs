use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Tokens returned by the authorization-code and refresh grants.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    /// Only present on the first consent, or when Google rotates it.
    pub refresh_token: Option<String>,
    /// Lifetime in seconds.
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

impl TokenSet {
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in.map(|secs| now + Duration::seconds(secs))
    }
}

/// Basic profile of the Google account that granted consent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserInfo {
    pub email: String,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub picture: Option<String>,
}

impl UserInfo {
    /// `"given family"`, falling back to the full name.
    pub fn display_name(&self) -> Option<String> {
        let joined = [self.given_name.as_deref(), self.family_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if joined.is_empty() {
            self.name.clone()
        } else {
            Some(joined)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub thumbnail_link: Option<String>,
    pub modified_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    pub id: String,
    pub thread_id: Option<String>,
}

/// The Google operations the service depends on.
///
/// Implementations are shared across requests, so they must not keep any
/// per-user token state.
#[async_trait]
pub trait GoogleApi: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<TokenSet>;

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenSet>;

    async fn fetch_user_info(&self, access_token: &str) -> Result<UserInfo>;

    /// Every non-trashed file directly inside `folder_id`, across all pages.
    async fn list_drive_files(&self, access_token: &str, folder_id: &str) -> Result<Vec<DriveFile>>;

    /// Cell values of `range` as displayed strings, row-major.
    async fn get_sheet_values(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>>;

    /// Sends an RFC 2822 message already encoded as unpadded base64url.
    async fn send_message(&self, access_token: &str, raw: &str) -> Result<SentMessage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        let mut info = UserInfo {
            email: "scout@gmail.com".to_string(),
            name: Some("Scout A. Agent".to_string()),
            given_name: Some("Scout".to_string()),
            family_name: Some("Agent".to_string()),
            picture: None,
        };
        assert_eq!(info.display_name().as_deref(), Some("Scout Agent"));

        info.family_name = None;
        assert_eq!(info.display_name().as_deref(), Some("Scout"));

        info.given_name = None;
        assert_eq!(info.display_name().as_deref(), Some("Scout A. Agent"));
    }

    #[test]
    fn test_token_expiry() {
        let now = Utc::now();
        let tokens = TokenSet {
            access_token: "a".to_string(),
            refresh_token: None,
            expires_in: Some(3599),
            scope: None,
            token_type: Some("Bearer".to_string()),
        };
        assert_eq!(tokens.expires_at(now), Some(now + Duration::seconds(3599)));
    }
}
