use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, trace, warn};
use url::Url;

use crate::api::{DriveFile, GoogleApi, SentMessage, TokenSet, UserInfo};
use crate::oauth::OAuthConfig;
use crate::{GoogleError, Result};

const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const DRIVE_FILES_ENDPOINT: &str = "https://www.googleapis.com/drive/v3/files";
const SHEETS_ENDPOINT: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const GMAIL_SEND_ENDPOINT: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

const DRIVE_PAGE_SIZE: &str = "100";
const DRIVE_FIELDS: &str = "nextPageToken, files(id, name, mimeType, thumbnailLink, modifiedTime)";

/// reqwest-backed [`GoogleApi`].
#[derive(Debug, Clone)]
pub struct GoogleClient {
    http: reqwest::Client,
    config: OAuthConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl GoogleClient {
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    async fn token_grant(&self, form: &[(&str, &str)]) -> Result<TokenSet> {
        let response = self.http.post(TOKEN_ENDPOINT).form(form).send().await?;
        let response = check(response).await?;
        response
            .json::<TokenSet>()
            .await
            .map_err(|e| GoogleError::Decode(e.to_string()))
    }
}

/// Maps a non-success response onto the error taxonomy.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify(status, &body))
}

fn classify(status: StatusCode, body: &str) -> GoogleError {
    let json: Option<Value> = serde_json::from_str(body).ok();

    // Token endpoint errors: {"error": "invalid_grant", "error_description": "..."}
    if let Some(error) = json.as_ref().and_then(|j| j.get("error")).and_then(Value::as_str) {
        let description = json
            .as_ref()
            .and_then(|j| j.get("error_description"))
            .and_then(Value::as_str)
            .unwrap_or(error)
            .to_string();
        if error == "invalid_grant" {
            return GoogleError::InvalidGrant(description);
        }
        if status == StatusCode::UNAUTHORIZED {
            return GoogleError::Unauthorized;
        }
        return GoogleError::Api {
            status: status.as_u16(),
            detail: description,
        };
    }

    if status == StatusCode::UNAUTHORIZED {
        return GoogleError::Unauthorized;
    }

    // API errors: {"error": {"code": 404, "message": "..."}}
    let detail = json
        .as_ref()
        .and_then(|j| j.pointer("/error/message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());
    GoogleError::Api {
        status: status.as_u16(),
        detail,
    }
}

fn cell_text(cell: Value) -> String {
    match cell {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl GoogleApi for GoogleClient {
    #[instrument(skip_all)]
    async fn exchange_code(&self, code: &str) -> Result<TokenSet> {
        trace!("Exchanging authorization code for tokens");
        self.token_grant(&[
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    #[instrument(skip_all)]
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenSet> {
        trace!("Refreshing access token");
        self.token_grant(&[
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    #[instrument(skip_all)]
    async fn fetch_user_info(&self, access_token: &str) -> Result<UserInfo> {
        let response = self
            .http
            .get(USERINFO_ENDPOINT)
            .bearer_auth(access_token)
            .send()
            .await?;
        check(response)
            .await?
            .json::<UserInfo>()
            .await
            .map_err(|e| GoogleError::Decode(e.to_string()))
    }

    #[instrument(skip(self, access_token))]
    async fn list_drive_files(&self, access_token: &str, folder_id: &str) -> Result<Vec<DriveFile>> {
        let query = format!("'{}' in parents and trashed = false", folder_id.replace('\'', "\\'"));
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(DRIVE_FILES_ENDPOINT)
                .bearer_auth(access_token)
                .query(&[
                    ("q", query.as_str()),
                    ("pageSize", DRIVE_PAGE_SIZE),
                    ("orderBy", "folder,name"),
                    ("fields", DRIVE_FIELDS),
                    ("supportsAllDrives", "true"),
                    ("includeItemsFromAllDrives", "true"),
                ]);
            if let Some(token) = page_token.as_deref() {
                request = request.query(&[("pageToken", token)]);
            }

            let page: DriveFileList = check(request.send().await?)
                .await?
                .json()
                .await
                .map_err(|e| GoogleError::Decode(e.to_string()))?;
            debug!("Fetched {} Drive entries", page.files.len());
            files.extend(page.files);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(files)
    }

    #[instrument(skip(self, access_token))]
    async fn get_sheet_values(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>> {
        let mut url = Url::parse(SHEETS_ENDPOINT).map_err(|e| GoogleError::Decode(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| GoogleError::Decode("sheets endpoint cannot be a base".to_string()))?
            .push(spreadsheet_id)
            .push("values")
            .push(range);

        let response = self.http.get(url).bearer_auth(access_token).send().await?;
        let values: ValueRange = check(response)
            .await?
            .json()
            .await
            .map_err(|e| GoogleError::Decode(e.to_string()))?;

        let rows: Vec<Vec<String>> = values
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect();
        debug!("Fetched {} rows from sheet", rows.len());
        Ok(rows)
    }

    #[instrument(skip_all)]
    async fn send_message(&self, access_token: &str, raw: &str) -> Result<SentMessage> {
        let response = self
            .http
            .post(GMAIL_SEND_ENDPOINT)
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await?;
        let sent = check(response)
            .await
            .inspect_err(|e| warn!("Gmail send failed: {}", e))?
            .json::<SentMessage>()
            .await
            .map_err(|e| GoogleError::Decode(e.to_string()))?;
        debug!("Gmail accepted message {}", sent.id);
        Ok(sent)
    }
}
